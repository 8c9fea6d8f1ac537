//! Manifest header file reader.
//!
//! The on-disk format is `Name: value` lines; a line starting with a
//! single space continues the previous value. A blank line ends the
//! main section, anything after it is ignored.

use anyhow::{bail, Context, Result};
use modkit_manifest::HeaderMap;
use std::path::Path;

pub fn read_headers(path: &Path) -> Result<HeaderMap> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading manifest file {}", path.display()))?;
    parse_headers(&text)
}

pub fn parse_headers(text: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let mut current: Option<(String, String)> = None;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() {
            break;
        }
        if let Some(continuation) = line.strip_prefix(' ') {
            match &mut current {
                Some((_, value)) => value.push_str(continuation),
                None => bail!("line {}: continuation without a header", lineno + 1),
            }
            continue;
        }

        if let Some((name, value)) = current.take() {
            insert(&mut headers, name, value, lineno)?;
        }
        let Some((name, value)) = line.split_once(':') else {
            bail!("line {}: expected 'Name: value'", lineno + 1);
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("line {}: empty header name", lineno + 1);
        }
        current = Some((name.to_string(), value.trim_start().to_string()));
    }

    if let Some((name, value)) = current.take() {
        let count = text.lines().count();
        insert(&mut headers, name, value, count)?;
    }
    Ok(headers)
}

fn insert(headers: &mut HeaderMap, name: String, value: String, lineno: usize) -> Result<()> {
    if headers.contains_key(&name) {
        bail!("line {}: duplicate header '{}'", lineno, name);
    }
    headers.insert(name, value);
    Ok(())
}
