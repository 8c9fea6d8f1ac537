//! Native library clauses: parsing, platform matching and selection.
//!
//! `Module-NativeCode` lists alternative sets of native libraries, each
//! guarded by OS/processor/version/language predicates. A trailing `*`
//! clause marks the whole header optional. Selection happens against a
//! platform property map and is deterministic; the tie-break order is
//! load-bearing for modules shipping several platform binaries and must
//! not be reordered.

use crate::errors::{ClauseError, SyntaxError};
use crate::filter::{Filter, FilterOp};
use crate::tokenizer::{parse_header, split_delimited};
use crate::values::{Attrs, Dirs};
use crate::version::{Version, VersionRange};
use crate::wiring::{attr, dir, ns, ModuleHandle, Requirement};
use ahash::AHashMap;
use serde::Serialize;
use std::sync::Arc;

/// Platform property keys consulted during selection.
pub mod platform {
    pub const OS_NAME: &str = "platform.os.name";
    pub const OS_VERSION: &str = "platform.os.version";
    pub const PROCESSOR: &str = "platform.processor";
    pub const LANGUAGE: &str = "platform.language";
}

/// Target platform description: the four well-known keys plus any
/// extras a selection filter may reference.
pub type PlatformProps = AHashMap<String, String>;

/// One alternative from the native-code header. `entries` is `None`
/// only for the `*` sentinel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeLibraryClause {
    pub entries: Option<Vec<Arc<str>>>,
    pub os_names: Vec<Arc<str>>,
    pub os_versions: Vec<VersionRange>,
    pub processors: Vec<Arc<str>>,
    pub languages: Vec<Arc<str>>,
    pub selection_filter: Option<Filter>,
}

/// One selected library file with the predicates it was chosen under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeLibrary {
    pub entry: Arc<str>,
    pub os_names: Vec<Arc<str>>,
    pub processors: Vec<Arc<str>>,
    pub os_versions: Vec<VersionRange>,
    pub languages: Vec<Arc<str>>,
    pub selection_filter: Option<Filter>,
}

/// Outcome of native library selection. An unresolvable manifest is a
/// selection result, not a parse error; the caller decides whether the
/// module may load.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "outcome", content = "libraries")]
pub enum NativeSelection {
    Selected(Vec<NativeLibrary>),
    /// Nothing matched but the header carried the optional sentinel.
    NoneOptional,
    /// Nothing matched and the libraries are required.
    Unresolvable,
}

/// Canonical OS family name for matching purposes.
fn canonical_os(name: &str) -> String {
    let folded: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    if folded.starts_with("win") {
        "windows".to_string()
    } else if folded.starts_with("linux") {
        "linux".to_string()
    } else if folded == "macos" || folded == "macosx" || folded == "darwin" {
        "macosx".to_string()
    } else if folded == "sunos" || folded == "solaris" {
        "solaris".to_string()
    } else {
        folded
    }
}

/// Canonical processor name for matching purposes.
fn canonical_processor(name: &str) -> String {
    let folded = name.trim().to_ascii_lowercase();
    match folded.as_str() {
        "amd64" | "em64t" | "x86_64" | "x86-64" => "x86-64".to_string(),
        "pentium" | "i386" | "i486" | "i586" | "i686" => "x86".to_string(),
        "power" | "ppc" | "powerpc" => "powerpc".to_string(),
        "arm64" | "aarch64" => "aarch64".to_string(),
        _ => folded,
    }
}

/// Reduce a platform-reported OS version to something the version
/// grammar accepts: leading numeric dot-segments, three at most.
/// Unusable input becomes 0.0.0 rather than an error.
fn clean_os_version(raw: &str) -> Version {
    let mut segments: Vec<u32> = Vec::new();
    for part in raw.trim().split('.').take(3) {
        let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
        match digits.parse::<u32>() {
            Ok(n) => {
                let stop = digits.len() != part.len();
                segments.push(n);
                if stop {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    let mut iter = segments.into_iter();
    Version::new(
        iter.next().unwrap_or(0),
        iter.next().unwrap_or(0),
        iter.next().unwrap_or(0),
    )
}

/// Split a multi-valued os-version attribute on the commas between
/// ranges, not the comma inside an interval literal, so
/// `"[1.0,2.0),[3.0,4.0)"` yields two ranges.
fn split_version_ranges(value: &str) -> impl Iterator<Item = &str> {
    let mut in_interval = false;
    value
        .split(move |c| {
            match c {
                '[' | '(' => in_interval = true,
                ']' | ')' => in_interval = false,
                ',' if !in_interval => return true,
                _ => {}
            }
            false
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl NativeLibraryClause {
    fn from_clause(clause: &crate::tokenizer::Clause) -> Result<Self, ClauseError> {
        if clause.paths.len() == 1 && clause.paths[0].as_ref() == "*" && clause.attrs.is_empty() {
            return Ok(Self {
                entries: None,
                os_names: Vec::new(),
                os_versions: Vec::new(),
                processors: Vec::new(),
                languages: Vec::new(),
                selection_filter: None,
            });
        }

        let list = |key: &str| -> Result<Vec<Arc<str>>, SyntaxError> {
            match clause.attrs.get(key) {
                Some(value) => Ok(split_delimited(&value.to_string(), ",", true)?
                    .into_iter()
                    .map(|s| Arc::from(s.as_str()))
                    .collect()),
                None => Ok(Vec::new()),
            }
        };

        let mut os_versions = Vec::new();
        if let Some(value) = clause.attrs.get("osversion") {
            let text = value.to_string();
            for token in split_version_ranges(&text) {
                os_versions.push(VersionRange::parse(token)?);
            }
        }

        let selection_filter = match clause.attrs.get("selection-filter") {
            Some(value) => Some(Filter::parse(&value.to_string())?),
            None => None,
        };

        Ok(Self {
            entries: Some(clause.paths.clone()),
            os_names: list("osname")?,
            os_versions,
            processors: list("processor")?,
            languages: list("language")?,
            selection_filter,
        })
    }

    pub fn is_sentinel(&self) -> bool {
        self.entries.is_none()
    }

    /// Does this clause match the given platform? Absent predicates
    /// match anything.
    pub fn matches(&self, props: &PlatformProps) -> bool {
        if !self.os_names.is_empty() {
            let actual = props
                .get(platform::OS_NAME)
                .map_or_else(String::new, |v| canonical_os(v));
            if !self.os_names.iter().any(|n| canonical_os(n) == actual) {
                return false;
            }
        }
        if !self.processors.is_empty() {
            let actual = props
                .get(platform::PROCESSOR)
                .map_or_else(String::new, |v| canonical_processor(v));
            if !self.processors.iter().any(|p| canonical_processor(p) == actual) {
                return false;
            }
        }
        if !self.os_versions.is_empty() {
            let actual = props
                .get(platform::OS_VERSION)
                .map_or_else(Version::default, |v| clean_os_version(v));
            if !self.os_versions.iter().any(|r| r.contains(&actual)) {
                return false;
            }
        }
        if !self.languages.is_empty() {
            let matched = props.get(platform::LANGUAGE).is_some_and(|actual| {
                self.languages
                    .iter()
                    .any(|l| l.as_ref().eq_ignore_ascii_case(actual))
            });
            if !matched {
                return false;
            }
        }
        if let Some(filter) = &self.selection_filter {
            if !filter.matches_props(props) {
                return false;
            }
        }
        true
    }
}

/// Parse the native-code header into its clause list plus the optional
/// flag from a trailing `*` sentinel.
pub(crate) fn parse_native_header(
    header: &str,
) -> Result<(Vec<NativeLibraryClause>, bool), ClauseError> {
    let mut clauses = Vec::new();
    for raw in parse_header(header)? {
        clauses.push(NativeLibraryClause::from_clause(&raw)?);
    }
    let optional = clauses.last().is_some_and(NativeLibraryClause::is_sentinel);
    if optional {
        clauses.pop();
    }
    Ok((clauses, optional))
}

/// Select the best-matching clause and expand it into its libraries,
/// deduplicated by file basename (first occurrence wins).
pub fn select_libraries(
    clauses: &[NativeLibraryClause],
    optional: bool,
    props: &PlatformProps,
) -> NativeSelection {
    if clauses.is_empty() {
        return NativeSelection::Selected(Vec::new());
    }

    let matched: Vec<&NativeLibraryClause> =
        clauses.iter().filter(|c| c.matches(props)).collect();
    if matched.is_empty() {
        return if optional {
            NativeSelection::NoneOptional
        } else {
            NativeSelection::Unresolvable
        };
    }

    let selected = if matched.len() == 1 {
        matched[0]
    } else {
        matched[first_sorted_clause(&matched)]
    };

    let mut libraries: Vec<NativeLibrary> = Vec::new();
    if let Some(entries) = &selected.entries {
        for entry in entries {
            let name = basename(entry);
            if libraries.iter().any(|lib| basename(&lib.entry) == name) {
                continue;
            }
            libraries.push(NativeLibrary {
                entry: entry.clone(),
                os_names: selected.os_names.clone(),
                processors: selected.processors.clone(),
                os_versions: selected.os_versions.clone(),
                languages: selected.languages.clone(),
                selection_filter: selected.selection_filter.clone(),
            });
        }
    }
    NativeSelection::Selected(libraries)
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Tie-break among several matching clauses; returns an index into
/// `matched`. The pass order (os-version declared, max lower bound,
/// language declared, then first match) is reproduced exactly,
/// including falling back to the first matched clause rather than the
/// last surviving candidate set.
fn first_sorted_clause(matched: &[&NativeLibraryClause]) -> usize {
    let mut index_list: Vec<usize> = (0..matched.len()).collect();
    let mut selection: Vec<usize> = Vec::new();

    // Clauses declaring an os-version range, and the max lower bound
    // observed across all of them.
    let mut max_floor = Version::default();
    for &index in &index_list {
        let ranges = &matched[index].os_versions;
        if !ranges.is_empty() {
            selection.push(index);
        }
        for range in ranges {
            if *range.left() >= max_floor {
                max_floor = range.left().clone();
            }
        }
    }

    if selection.len() == 1 {
        return selection[0];
    } else if selection.len() > 1 {
        index_list = selection;
        selection = Vec::new();
        for &index in &index_list {
            for range in &matched[index].os_versions {
                if *range.left() >= max_floor {
                    selection.push(index);
                }
            }
        }
    }

    if selection.is_empty() {
        index_list = (0..matched.len()).collect();
    } else if selection.len() == 1 {
        return selection[0];
    } else {
        index_list = selection;
    }
    selection = Vec::new();

    // Prefer clauses declaring a language.
    for &index in &index_list {
        if !matched[index].languages.is_empty() {
            selection.push(index);
        }
    }

    if selection.is_empty() {
        0
    } else {
        selection[0]
    }
}

/// Turn the clause list into the single native requirement carried on
/// the module: per-clause predicate filters OR-ed together, plus the
/// optional resolution directive.
pub(crate) fn convert_native(
    clauses: &[NativeLibraryClause],
    optional: bool,
    module: &ModuleHandle,
) -> Option<Requirement> {
    let mut clause_filters: Vec<Filter> = Vec::new();
    for clause in clauses {
        let mut parts: Vec<Filter> = Vec::new();
        if !clause.os_names.is_empty() {
            parts.push(or_leaves(attr::NATIVE_OSNAME, &clause.os_names, FilterOp::Approx));
        }
        if !clause.os_versions.is_empty() {
            let leaves: Vec<Arc<str>> = clause
                .os_versions
                .iter()
                .map(|r| Arc::from(r.to_string().as_str()))
                .collect();
            parts.push(or_leaves(attr::NATIVE_OSVERSION, &leaves, FilterOp::Eq));
        }
        if !clause.processors.is_empty() {
            parts.push(or_leaves(attr::NATIVE_PROCESSOR, &clause.processors, FilterOp::Approx));
        }
        if !clause.languages.is_empty() {
            parts.push(or_leaves(attr::NATIVE_LANGUAGE, &clause.languages, FilterOp::Approx));
        }
        if let Some(filter) = &clause.selection_filter {
            parts.push(filter.clone());
        }
        match parts.len() {
            0 => {}
            1 => clause_filters.push(parts.swap_remove(0)),
            _ => clause_filters.push(Filter::And(parts)),
        }
    }

    let mut dirs = Dirs::new();
    if optional {
        dirs.insert(Arc::from(dir::RESOLUTION), Arc::from(dir::RESOLUTION_OPTIONAL));
    }
    let filter = match clause_filters.len() {
        0 => None,
        1 => Some(clause_filters.swap_remove(0)),
        _ => Some(Filter::Or(clause_filters)),
    };
    if let Some(filter) = &filter {
        dirs.insert(Arc::from(dir::FILTER), Arc::from(filter.to_string().as_str()));
    }
    if dirs.is_empty() {
        return None;
    }
    Some(Requirement::new(module, ns::NATIVE, dirs, Attrs::new(), filter))
}

/// OR of one leaf per value, folding values to lower case the way the
/// platform capability advertises them.
fn or_leaves(attr_name: &str, values: &[Arc<str>], op: FilterOp) -> Filter {
    let mut leaves: Vec<Filter> = values
        .iter()
        .map(|v| Filter::leaf(attr_name, op, &v.to_ascii_lowercase()))
        .collect();
    if leaves.len() == 1 {
        leaves.swap_remove(0)
    } else {
        Filter::Or(leaves)
    }
}
