//! Header clause tokenizer and quote/escape-aware list splitter.
//!
//! The clause grammar is the system's wire format: clauses separated by
//! `,`, segments within a clause by `;`, a segment being a bare path, a
//! `directive:=value`, or an `attribute[:Type]=value`. Quoted values may
//! contain `;`, `,` and `"` escaped with a backslash. Quoting interacts
//! with delimiter detection, so this is an explicit-state scanner, not a
//! regex.

use crate::errors::SyntaxError;
use crate::values::{AttrValue, Attrs, Dirs, OrderedMap};
use serde::Serialize;
use std::sync::Arc;

/// One parsed header clause: paths, directives, attributes and the
/// declared attribute type tags. Transient parse-time scratch; discarded
/// once capabilities/requirements are built.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Clause {
    pub paths: Vec<Arc<str>>,
    pub dirs: Dirs,
    pub attrs: Attrs,
    pub types: OrderedMap<Arc<str>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ClauseStart,
    ParamStart,
    Key,
    DirectiveOrType,
    ArgumentStart,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Attrs,
    Dirs,
}

/// Tokenize one header string into its ordered clause list.
///
/// An empty (or all-whitespace) header yields an empty list; this is the
/// common case, not an error. Values keep inner backslash escapes
/// exactly as written; only surrounding quotes are stripped.
pub fn parse_header(header: &str) -> Result<Vec<Clause>, SyntaxError> {
    if header.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = header.chars().collect();
    let substring = |start: usize, end: usize| -> String {
        chars[start..end].iter().collect::<String>().trim().to_string()
    };

    let mut clauses: Vec<Clause> = Vec::new();
    let mut key = String::new();
    let mut target = Target::Attrs;
    let mut state = State::ClauseStart;
    let mut pos = 0usize;
    let mut start = 0usize;
    let mut quoted = false;
    let mut escaped = false;

    loop {
        let current = chars.get(pos).copied();
        match state {
            State::ClauseStart => {
                clauses.push(Clause::default());
                state = State::ParamStart;
                continue;
            }
            State::ParamStart => {
                start = pos;
                state = State::Key;
                continue;
            }
            State::Key => {
                match current {
                    Some(c @ (':' | '=')) => {
                        key = substring(start, pos);
                        start = pos + 1;
                        target = Target::Attrs;
                        state = if c == ':' {
                            State::DirectiveOrType
                        } else {
                            State::ArgumentStart
                        };
                    }
                    None | Some(',' | ';') => {
                        if let Some(clause) = clauses.last_mut() {
                            clause.paths.push(Arc::from(substring(start, pos).as_str()));
                        }
                        state = if current == Some(',') {
                            State::ClauseStart
                        } else {
                            State::ParamStart
                        };
                    }
                    Some(_) => {}
                }
                pos += 1;
            }
            State::DirectiveOrType => {
                if current == Some('=') {
                    if start != pos {
                        if let Some(clause) = clauses.last_mut() {
                            clause
                                .types
                                .insert(Arc::from(key.as_str()), Arc::from(substring(start, pos).as_str()));
                        }
                    } else {
                        target = Target::Dirs;
                    }
                    state = State::ArgumentStart;
                    start = pos + 1;
                }
                pos += 1;
            }
            State::ArgumentStart => {
                if current == Some('"') {
                    quoted = true;
                    pos += 1;
                } else {
                    quoted = false;
                }
                match current {
                    Some(c) if c.is_whitespace() => pos += 1,
                    _ => state = State::Value,
                }
            }
            State::Value => {
                if escaped {
                    escaped = false;
                } else if current == Some('\\') {
                    escaped = true;
                } else if quoted && current == Some('"') {
                    quoted = false;
                } else if !quoted {
                    match current {
                        None | Some(';' | ',') => {
                            let mut value = substring(start, pos);
                            if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
                                value = value[1..value.len() - 1].to_string();
                            }
                            if let Some(clause) = clauses.last_mut() {
                                let replaced = match target {
                                    Target::Attrs => clause
                                        .attrs
                                        .insert(Arc::from(key.as_str()), AttrValue::str(&value))
                                        .is_some(),
                                    Target::Dirs => clause
                                        .dirs
                                        .insert(Arc::from(key.as_str()), Arc::from(value.as_str()))
                                        .is_some(),
                                };
                                if replaced {
                                    return Err(SyntaxError::DuplicateKey {
                                        key: key.clone(),
                                        header: header.to_string(),
                                    });
                                }
                            }
                            state = if current == Some(';') {
                                State::ParamStart
                            } else {
                                State::ClauseStart
                            };
                        }
                        Some(_) => {}
                    }
                }
                pos += 1;
            }
        }
        // The end-of-input sentinel is processed exactly once, so a
        // trailing `,` still opens (and keeps) an empty clause.
        if current.is_none() {
            break;
        }
    }

    if !matches!(state, State::ClauseStart | State::ParamStart) {
        return Err(SyntaxError::UnterminatedHeader(header.to_string()));
    }
    Ok(clauses)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Any,
    CharOrEndQuote,
}

/// Split a delimited string honoring quotes and backslash escapes; the
/// delimiter characters are ignored inside quotes. Assumes `"` is not
/// itself a delimiter.
pub fn split_delimited(value: &str, delimiters: &str, trim: bool) -> Result<Vec<String>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut expect = Expect::Any;
    let mut escaped = false;

    for c in value.chars() {
        let is_delimiter = delimiters.contains(c);

        if !escaped && c == '\\' {
            escaped = true;
            continue;
        }

        if escaped {
            current.push(c);
        } else if is_delimiter && expect == Expect::Any {
            tokens.push(if trim {
                current.trim().to_string()
            } else {
                current.clone()
            });
            current.clear();
        } else if c == '"' {
            current.push(c);
            expect = match expect {
                Expect::Any => Expect::CharOrEndQuote,
                Expect::CharOrEndQuote => Expect::Any,
            };
        } else {
            current.push(c);
        }

        escaped = false;
    }

    if escaped || expect == Expect::CharOrEndQuote {
        return Err(SyntaxError::InvalidDelimitedString(value.to_string()));
    }

    if !current.is_empty() {
        tokens.push(if trim {
            current.trim().to_string()
        } else {
            current
        });
    }

    Ok(tokens)
}
