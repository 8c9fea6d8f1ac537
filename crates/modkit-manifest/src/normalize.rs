//! Per-header normalization and conversion into capabilities and
//! requirements.
//!
//! Each `normalize_*` function validates and defaults the raw clauses
//! of one header kind, schema-aware; each `convert_*` function turns
//! the normalized clauses into their final wiring objects. Normalizers
//! run before converters and neither is called twice for one header.

use crate::errors::{ClauseError, SemanticError, SyntaxError};
use crate::filter::{Filter, FilterOp};
use crate::tokenizer::{split_delimited, Clause};
use crate::values::{AttrValue, Attrs, Dirs};
use crate::version::{Version, VersionRange};
use crate::wiring::{attr, dir, ns, Capability, ModuleHandle, Requirement, Schema};
use ahash::AHashSet;
use std::sync::Arc;
use tracing::warn;

/// Reconcile the `version` and `specification-version` spellings into
/// one raw value, or fail if both are present and disagree.
fn reconciled_version(attrs: &mut Attrs) -> Result<Option<String>, SemanticError> {
    let v = attrs.get(attr::VERSION).map(ToString::to_string);
    let sv = attrs.get(attr::SPECIFICATION_VERSION).map(ToString::to_string);
    if let (Some(v), Some(sv)) = (&v, &sv) {
        if v.trim() != sv.trim() {
            return Err(SemanticError::VersionMismatch);
        }
    }
    if sv.is_some() {
        attrs.remove(attr::SPECIFICATION_VERSION);
    }
    Ok(v.or(sv))
}

/// Coerce a raw `module-version` attribute to a VersionRange in place.
fn coerce_module_version_range(attrs: &mut Attrs) -> Result<(), SyntaxError> {
    if let Some(value) = attrs.get(attr::MODULE_VERSION) {
        let range = VersionRange::parse(&value.to_string())?;
        attrs.insert(Arc::from(attr::MODULE_VERSION), AttrValue::Range(range));
    }
    Ok(())
}

fn validate_package_name(name: &str) -> Result<(), SemanticError> {
    if name == "." {
        return Err(SemanticError::DefaultPackage);
    }
    if name.is_empty() {
        return Err(SemanticError::EmptyPackage);
    }
    Ok(())
}

/// On a legacy clause, keep only the version attribute and warn about
/// the rest. The caller passes the value to keep when none survives.
fn strip_legacy_attrs(attrs: &mut Attrs, header: &str, fallback: AttrValue) {
    if attrs.is_empty() {
        return;
    }
    let version = attrs.remove(attr::VERSION).unwrap_or(fallback);
    for (key, _) in attrs.iter() {
        warn!(header, attribute = key.as_ref(), "dropping unknown legacy attribute");
    }
    attrs.clear();
    attrs.insert(Arc::from(attr::VERSION), version);
}

pub(crate) fn normalize_exports(
    mut clauses: Vec<Clause>,
    schema: Schema,
    module: &ModuleHandle,
    module_version: &Version,
) -> Result<Vec<Clause>, ClauseError> {
    for clause in &mut clauses {
        for path in &clause.paths {
            let name = path.as_ref();
            if name.starts_with(crate::wiring::RESERVED_PACKAGE_PREFIX)
                && !module.is_system()
                && !module.is_adapter()
            {
                return Err(SemanticError::ReservedPackage(
                    crate::wiring::RESERVED_PACKAGE_PREFIX.to_string(),
                    name.to_string(),
                )
                .into());
            }
            validate_package_name(name)?;
        }

        // Exports always end up with one canonical Version attribute,
        // defaulting to 0.0.0.
        let version = match reconciled_version(&mut clause.attrs)? {
            Some(text) => Version::parse(&text)?,
            None => Version::default(),
        };
        clause
            .attrs
            .insert(Arc::from(attr::VERSION), AttrValue::Version(version));

        match schema {
            Schema::Modern => {
                if clause.attrs.contains_key(attr::MODULE_VERSION)
                    || clause.attrs.contains_key(attr::MODULE_SYMBOLIC_NAME)
                {
                    return Err(SemanticError::ExportsModuleIdentity.into());
                }
                // The module's own identity is implicit on every export.
                clause.attrs.insert(
                    Arc::from(attr::MODULE_SYMBOLIC_NAME),
                    AttrValue::str(module.id()),
                );
                clause.attrs.insert(
                    Arc::from(attr::MODULE_VERSION),
                    AttrValue::Version(module_version.clone()),
                );
            }
            Schema::Legacy => {
                if !clause.dirs.is_empty() {
                    return Err(SemanticError::LegacyDirectives("export").into());
                }
                strip_legacy_attrs(
                    &mut clause.attrs,
                    "Export-Package",
                    AttrValue::Version(Version::default()),
                );
            }
        }
    }
    Ok(clauses)
}

pub(crate) fn normalize_imports(
    mut clauses: Vec<Clause>,
    schema: Schema,
) -> Result<Vec<Clause>, ClauseError> {
    let mut seen: AHashSet<Arc<str>> = AHashSet::new();
    for clause in &mut clauses {
        if let Some(text) = reconciled_version(&mut clause.attrs)? {
            let range = VersionRange::parse(&text)?;
            clause
                .attrs
                .insert(Arc::from(attr::VERSION), AttrValue::Range(range));
        }
        coerce_module_version_range(&mut clause.attrs)?;

        for path in &clause.paths {
            if !seen.insert(path.clone()) {
                return Err(SemanticError::DuplicateImport(path.to_string()).into());
            }
            validate_package_name(path)?;
        }

        if schema.is_legacy() {
            if !clause.dirs.is_empty() {
                return Err(SemanticError::LegacyDirectives("import").into());
            }
            strip_legacy_attrs(
                &mut clause.attrs,
                "Import-Package",
                AttrValue::Range(VersionRange::at_least(Version::default())),
            );
        }
    }
    Ok(clauses)
}

pub(crate) fn normalize_dynamic_imports(
    mut clauses: Vec<Clause>,
    schema: Schema,
) -> Result<Vec<Clause>, ClauseError> {
    for clause in &mut clauses {
        if schema.is_legacy() && !clause.dirs.is_empty() {
            return Err(SemanticError::LegacyDirectives("dynamic import").into());
        }

        clause.dirs.insert(
            Arc::from(dir::RESOLUTION),
            Arc::from(dir::RESOLUTION_DYNAMIC),
        );

        if let Some(text) = reconciled_version(&mut clause.attrs)? {
            let range = VersionRange::parse(&text)?;
            clause
                .attrs
                .insert(Arc::from(attr::VERSION), AttrValue::Range(range));
        }
        coerce_module_version_range(&mut clause.attrs)?;

        // Duplicates are fine here, partial wildcards are not.
        for path in &clause.paths {
            let name = path.as_ref();
            if name != "*" && name.ends_with('*') && !name.ends_with(".*") {
                return Err(SemanticError::PartialWildcard(name.to_string()).into());
            }
        }
    }
    Ok(clauses)
}

pub(crate) fn normalize_requires(
    mut clauses: Vec<Clause>,
    schema: Schema,
) -> Result<Vec<Clause>, ClauseError> {
    if schema.is_legacy() {
        // Legacy manifests predate module-level requirements.
        if !clauses.is_empty() {
            warn!("ignoring Require-Module clauses in a legacy manifest");
        }
        clauses.clear();
        return Ok(clauses);
    }
    for clause in &mut clauses {
        coerce_module_version_range(&mut clause.attrs)?;
    }
    Ok(clauses)
}

/// Prepend an identity attribute so it lands first in iteration (and
/// so re-inserting it survives a clause that tried to override it).
fn attrs_with_identity(attrs: &Attrs, key: &str, value: &str) -> Attrs {
    let mut merged = Attrs::new();
    merged.insert(Arc::from(key), AttrValue::str(value));
    merged.extend_from(attrs);
    merged.insert(Arc::from(key), AttrValue::str(value));
    merged
}

pub(crate) fn convert_exports(clauses: &[Clause], module: &ModuleHandle) -> Vec<Capability> {
    let mut caps = Vec::new();
    for clause in clauses {
        for path in &clause.paths {
            let mut attrs = clause.attrs.clone();
            attrs.insert(Arc::from(ns::PACKAGE), AttrValue::Str(path.clone()));
            caps.push(Capability::new(
                module,
                ns::PACKAGE,
                clause.dirs.clone(),
                attrs,
            ));
        }
    }
    caps
}

pub(crate) fn convert_imports(clauses: &[Clause], module: &ModuleHandle) -> Vec<Requirement> {
    let mut reqs = Vec::new();
    for clause in clauses {
        for path in &clause.paths {
            let attrs = attrs_with_identity(&clause.attrs, ns::PACKAGE, path);
            reqs.push(Requirement::with_synthesized_filter(
                module,
                ns::PACKAGE,
                clause.dirs.clone(),
                &attrs,
            ));
        }
    }
    reqs
}

pub(crate) fn convert_requires(clauses: &[Clause], module: &ModuleHandle) -> Vec<Requirement> {
    let mut reqs = Vec::new();
    for clause in clauses {
        for path in &clause.paths {
            let attrs = attrs_with_identity(&clause.attrs, ns::MODULE, path);
            let filter = Filter::from_attrs(&attrs);
            let mut dirs = clause.dirs.clone();
            dirs.insert(Arc::from(dir::FILTER), Arc::from(filter.to_string().as_str()));
            // Unlike package requirements, module requirements keep
            // their attributes alongside the synthesized filter.
            reqs.push(Requirement::new(module, ns::MODULE, dirs, attrs, Some(filter)));
        }
    }
    reqs
}

pub(crate) fn convert_require_capabilities(
    clauses: &[Clause],
    module: &ModuleHandle,
) -> Result<Vec<Requirement>, ClauseError> {
    let mut reqs = Vec::new();
    for clause in clauses {
        let filter = match clause.dirs.get(dir::FILTER) {
            Some(text) => Filter::parse(text)?,
            None => Filter::MatchAll,
        };
        for path in &clause.paths {
            if path.starts_with(ns::WIRING_PREFIX) || path.as_ref() == ns::IDENTITY {
                return Err(SemanticError::ReservedNamespace(path.to_string()).into());
            }
            reqs.push(Requirement::new(
                module,
                path,
                clause.dirs.clone(),
                clause.attrs.clone(),
                Some(filter.clone()),
            ));
        }
    }
    Ok(reqs)
}

pub(crate) fn convert_provide_capabilities(
    clauses: &[Clause],
    module: &ModuleHandle,
) -> Result<Vec<Capability>, ClauseError> {
    let mut caps = Vec::new();
    for clause in clauses {
        for path in &clause.paths {
            if path.starts_with(ns::WIRING_PREFIX) || path.as_ref() == ns::IDENTITY {
                return Err(SemanticError::ReservedNamespace(path.to_string()).into());
            }
            if (path.starts_with(ns::EXECUTION_ENVIRONMENT) || path.starts_with(ns::NATIVE))
                && !module.is_system()
            {
                return Err(SemanticError::SystemOnlyNamespace(path.to_string()).into());
            }
            caps.push(Capability::new(
                module,
                path,
                clause.dirs.clone(),
                clause.attrs.clone(),
            ));
        }
    }
    Ok(caps)
}

/// Sibling-header values folded into the identity capability.
#[derive(Debug, Default, Clone)]
pub(crate) struct IdentityInfo {
    pub fragment: bool,
    pub copyright: Option<String>,
    pub description: Option<String>,
    pub documentation: Option<String>,
    pub license: Option<String>,
}

/// The three capabilities derived from a module's symbolic name.
#[derive(Debug)]
pub(crate) struct SymbolicNameCaps {
    pub name: Arc<str>,
    pub module_cap: Capability,
    pub host_cap: Option<Capability>,
    pub identity_cap: Capability,
}

/// Validate the symbolic-name clause and derive the module, host and
/// identity capabilities. `make_module` lets the caller mint the
/// module handle once the name is known.
pub(crate) fn build_symbolic_name_caps(
    header: &str,
    mut clauses: Vec<Clause>,
    version: &Version,
    make_module: impl FnOnce(&str) -> ModuleHandle,
    info: &IdentityInfo,
) -> Result<Option<(ModuleHandle, SymbolicNameCaps)>, ClauseError> {
    if clauses.is_empty() {
        return Ok(None);
    }
    if clauses.len() > 1 || clauses[0].paths.len() > 1 {
        return Err(SemanticError::MultipleSymbolicNames(header.to_string()).into());
    }
    let mut clause = clauses.swap_remove(0);
    if clause.paths.is_empty() || clause.paths[0].is_empty() {
        return Err(SemanticError::EmptyPackage.into());
    }
    if clause.attrs.contains_key(attr::MODULE_VERSION) {
        return Err(SemanticError::VersionOnSymbolicName.into());
    }

    let name = clause.paths[0].clone();
    let module = make_module(&name);

    normalize_tags(header, &mut clause.attrs, &module)?;

    clause
        .attrs
        .insert(Arc::from(ns::MODULE), AttrValue::Str(name.clone()));
    clause.attrs.insert(
        Arc::from(attr::MODULE_VERSION),
        AttrValue::Version(version.clone()),
    );
    let module_cap = Capability::new(&module, ns::MODULE, clause.dirs.clone(), clause.attrs.clone());

    // Fragments attach to hosts; they are not hosts themselves. A
    // module can also opt out of hosting.
    let host_cap = if info.fragment {
        None
    } else {
        let attachment = clause
            .dirs
            .get(dir::FRAGMENT_ATTACHMENT)
            .map_or(dir::ATTACHMENT_RESOLVE_TIME, AsRef::as_ref);
        if attachment.eq_ignore_ascii_case(dir::ATTACHMENT_NEVER) {
            None
        } else {
            let mut host_attrs = module_cap.attrs.clone();
            if let Some(value) = host_attrs.remove(ns::MODULE) {
                host_attrs.insert(Arc::from(ns::HOST), value);
            }
            Some(Capability::new(
                &module,
                ns::HOST,
                clause.dirs.clone(),
                host_attrs,
            ))
        }
    };

    let identity_cap = build_identity_cap(&module, &module_cap, version, info);

    Ok(Some((
        module,
        SymbolicNameCaps {
            name,
            module_cap,
            host_cap,
            identity_cap,
        },
    )))
}

/// The tags attribute must be a string or a list of strings; the
/// adapter tag may only appear when the platform minted the module as
/// an adapter, in which case it is injected rather than declared.
fn normalize_tags(
    header: &str,
    attrs: &mut Attrs,
    module: &ModuleHandle,
) -> Result<(), SemanticError> {
    let mut tags: Vec<Arc<str>> = Vec::new();
    match attrs.get(attr::TAGS) {
        None => {}
        Some(AttrValue::Str(tag)) => tags.push(tag.clone()),
        Some(AttrValue::List(members)) => {
            for member in members {
                match member {
                    AttrValue::Str(tag) => {
                        if !tags.contains(tag) {
                            tags.push(tag.clone());
                        }
                    }
                    _ => return Err(SemanticError::InvalidTags(header.to_string())),
                }
            }
        }
        Some(_) => return Err(SemanticError::InvalidTags(header.to_string())),
    }

    if tags.iter().any(|t| t.as_ref() == crate::wiring::ADAPTER_TAG) {
        return Err(SemanticError::ReservedTag(crate::wiring::ADAPTER_TAG.to_string()));
    }
    if module.is_adapter() {
        tags.push(Arc::from(crate::wiring::ADAPTER_TAG));
    }

    if !tags.is_empty() {
        attrs.insert(
            Arc::from(attr::TAGS),
            AttrValue::List(tags.into_iter().map(AttrValue::Str).collect()),
        );
    }
    Ok(())
}

fn build_identity_cap(
    module: &ModuleHandle,
    module_cap: &Capability,
    version: &Version,
    info: &IdentityInfo,
) -> Capability {
    let mut attrs = module_cap.attrs.clone();
    attrs.insert(Arc::from(ns::IDENTITY), AttrValue::str(module.id()));
    attrs.insert(
        Arc::from(attr::TYPE),
        AttrValue::str(if info.fragment { "fragment" } else { "module" }),
    );
    attrs.insert(Arc::from(attr::VERSION), AttrValue::Version(version.clone()));
    for (key, value) in [
        (attr::COPYRIGHT, &info.copyright),
        (attr::DESCRIPTION, &info.description),
        (attr::DOCUMENTATION, &info.documentation),
        (attr::LICENSE, &info.license),
    ] {
        if let Some(value) = value {
            attrs.insert(Arc::from(key), AttrValue::str(value));
        }
    }

    let mut dirs = Dirs::new();
    if let Some(singleton) = module_cap.dirs.get(dir::SINGLETON) {
        dirs.insert(Arc::from(dir::SINGLETON), singleton.clone());
    }
    Capability::new(module, ns::IDENTITY, dirs, attrs)
}

pub(crate) fn parse_fragment_host(
    header: &str,
    schema: Schema,
    module: &ModuleHandle,
) -> Result<Option<Requirement>, ClauseError> {
    if schema.is_legacy() {
        if !header.trim().is_empty() {
            warn!(module = module.id(), "only modern modules can be fragments");
        }
        return Ok(None);
    }
    let mut clauses = crate::tokenizer::parse_header(header)?;
    if clauses.is_empty() {
        return Ok(None);
    }
    if clauses.len() > 1 || clauses[0].paths.len() > 1 {
        return Err(SemanticError::MultipleFragmentHosts(header.to_string()).into());
    }
    let mut clause = clauses.swap_remove(0);
    if clause.paths.is_empty() {
        return Err(SemanticError::EmptyPackage.into());
    }

    // Absent host version means any.
    let raw = clause
        .attrs
        .get(attr::MODULE_VERSION)
        .map_or_else(|| "0.0.0".to_string(), ToString::to_string);
    clause.attrs.insert(
        Arc::from(attr::MODULE_VERSION),
        AttrValue::Range(VersionRange::parse(&raw)?),
    );

    let host = clause.paths[0].clone();
    let mut attrs = Attrs::new();
    attrs.insert(Arc::from(ns::HOST), AttrValue::Str(host.clone()));
    attrs.extend_from(&clause.attrs);
    attrs.insert(Arc::from(ns::HOST), AttrValue::Str(host));

    let filter = Filter::from_attrs(&attrs);
    let mut dirs = clause.dirs.clone();
    dirs.insert(Arc::from(dir::FILTER), Arc::from(filter.to_string().as_str()));

    Ok(Some(Requirement::new(
        module,
        ns::HOST,
        dirs,
        attrs,
        Some(filter),
    )))
}

/// Parse the required-execution-environment header into at most one
/// requirement whose filter ORs the listed environments together.
pub(crate) fn parse_execution_environments(
    header: &str,
    module: &ModuleHandle,
) -> Result<Option<Requirement>, ClauseError> {
    let mut filters: Vec<Filter> = Vec::new();
    for entry in split_delimited(header, ",", true)? {
        let names = split_delimited(&entry, "/", true)?;
        let Some(first) = names.first() else {
            continue;
        };
        let (mut left_name, left_version) = split_environment(first)?;
        let right = match names.get(1) {
            Some(second) => Some(split_environment(second)?),
            None => None,
        };

        let version = match (&left_version, right.as_ref().and_then(|(_, v)| v.as_ref())) {
            (Some(l), Some(r)) if l != r => None,
            (Some(l), _) => Some(l.clone()),
            (None, r) => r.cloned(),
        };
        let (left_name, right_name) = match version {
            // Disagreeing versions fold back into the names.
            None if left_version.is_some() => (
                first.clone(),
                names.get(1).cloned(),
            ),
            _ => {
                if left_name == "J2SE" {
                    left_name = "JavaSE".to_string();
                }
                (left_name, right.map(|(n, _)| n))
            }
        };

        let ee_name = match &right_name {
            Some(right_name) => format!("{left_name}/{right_name}"),
            None => left_name,
        };
        let name_leaf = Filter::leaf(ns::EXECUTION_ENVIRONMENT, FilterOp::Eq, &ee_name);
        filters.push(match version {
            Some(version) => Filter::And(vec![
                name_leaf,
                Filter::leaf(attr::VERSION, FilterOp::Eq, &version.to_string()),
            ]),
            None => name_leaf,
        });
    }

    if filters.is_empty() {
        return Ok(None);
    }
    let filter = if filters.len() == 1 {
        filters.swap_remove(0)
    } else {
        Filter::Or(filters)
    };
    let mut dirs = Dirs::new();
    dirs.insert(Arc::from(dir::FILTER), Arc::from(filter.to_string().as_str()));
    Ok(Some(Requirement::new(
        module,
        ns::EXECUTION_ENVIRONMENT,
        dirs,
        Attrs::new(),
        Some(filter),
    )))
}

/// Split `Name-1.8` into name and version; a version that does not
/// parse stays part of the name.
fn split_environment(token: &str) -> Result<(String, Option<Version>), SyntaxError> {
    let parts = split_delimited(token, "-", true)?;
    match parts.get(1).map(|v| Version::parse(v)) {
        Some(Ok(version)) => Ok((parts[0].clone(), Some(version))),
        _ => Ok((token.to_string(), None)),
    }
}

/// Every legacy export implies an import of the same package.
pub(crate) fn implicit_imports(exports: &[Capability], imports: &[Clause]) -> Vec<Clause> {
    let declared: AHashSet<&str> = imports
        .iter()
        .flat_map(|c| c.paths.iter().map(AsRef::as_ref))
        .collect();

    let mut clauses = Vec::new();
    for cap in exports {
        let Some(AttrValue::Str(package)) = cap.attrs.get(ns::PACKAGE) else {
            continue;
        };
        if declared.contains(package.as_ref()) {
            continue;
        }
        let mut clause = Clause::default();
        clause.paths.push(package.clone());
        if let Some(version) = cap.attrs.get(attr::VERSION).and_then(AttrValue::as_version) {
            clause.attrs.insert(
                Arc::from(attr::VERSION),
                AttrValue::Range(VersionRange::at_least(version.clone())),
            );
        }
        clauses.push(clause);
    }
    clauses
}

/// Legacy manifests assume one shared class space, so every export
/// carries a uses directive naming every imported package.
pub(crate) fn implicit_uses(exports: &mut [Capability], all_imports: &[Clause]) {
    let uses = all_imports
        .iter()
        .flat_map(|c| c.paths.iter().map(AsRef::as_ref))
        .collect::<Vec<_>>()
        .join(",");
    for cap in exports {
        let mut dirs = Dirs::new();
        dirs.insert(Arc::from(dir::USES), Arc::from(uses.as_str()));
        cap.dirs = dirs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::parse_header;

    fn clauses(header: &str) -> Vec<Clause> {
        match parse_header(header) {
            Ok(c) => c,
            Err(e) => panic!("header '{header}' should tokenize: {e}"),
        }
    }

    fn ordinary() -> ModuleHandle {
        ModuleHandle::ordinary("acme.core")
    }

    #[test]
    fn test_export_version_default_and_identity_injection() {
        let module = ordinary();
        let version = match Version::parse("2.1") {
            Ok(v) => v,
            Err(e) => panic!("version should parse: {e}"),
        };
        let normalized = match normalize_exports(
            clauses("com.acme.api;foo=bar"),
            Schema::Modern,
            &module,
            &version,
        ) {
            Ok(c) => c,
            Err(e) => panic!("export should normalize: {e}"),
        };
        let attrs = &normalized[0].attrs;
        assert!(matches!(attrs.get(attr::VERSION), Some(AttrValue::Version(v)) if v.major() == 0));
        assert_eq!(
            attrs.get(attr::MODULE_SYMBOLIC_NAME).and_then(AttrValue::as_str),
            Some("acme.core")
        );
        assert!(matches!(
            attrs.get(attr::MODULE_VERSION),
            Some(AttrValue::Version(v)) if v.major() == 2
        ));
        assert_eq!(attrs.get("foo").and_then(AttrValue::as_str), Some("bar"));
    }

    #[test]
    fn test_export_rejects_identity_respecification() {
        let module = ordinary();
        let result = normalize_exports(
            clauses("com.acme.api;module-version=1.0"),
            Schema::Modern,
            &module,
            &Version::default(),
        );
        assert!(matches!(
            result,
            Err(ClauseError::Semantic(SemanticError::ExportsModuleIdentity))
        ));
    }

    #[test]
    fn test_export_reserved_package() {
        let result = normalize_exports(
            clauses("java.lang"),
            Schema::Modern,
            &ordinary(),
            &Version::default(),
        );
        assert!(matches!(
            result,
            Err(ClauseError::Semantic(SemanticError::ReservedPackage(_, _)))
        ));
        let system = ModuleHandle::new(crate::wiring::SYSTEM_MODULE, crate::wiring::ModuleKind::System);
        assert!(normalize_exports(
            clauses("java.lang"),
            Schema::Modern,
            &system,
            &Version::default()
        )
        .is_ok());
    }

    #[test]
    fn test_legacy_export_drops_attrs_keeps_version() {
        let normalized = match normalize_exports(
            clauses("com.acme;foo=bar"),
            Schema::Legacy,
            &ordinary(),
            &Version::default(),
        ) {
            Ok(c) => c,
            Err(e) => panic!("legacy export should normalize: {e}"),
        };
        let attrs = &normalized[0].attrs;
        assert_eq!(attrs.len(), 1);
        assert!(matches!(attrs.get(attr::VERSION), Some(AttrValue::Version(_))));
    }

    #[test]
    fn test_legacy_export_rejects_directives() {
        let result = normalize_exports(
            clauses("com.acme;uses:=\"a.b\""),
            Schema::Legacy,
            &ordinary(),
            &Version::default(),
        );
        assert!(matches!(
            result,
            Err(ClauseError::Semantic(SemanticError::LegacyDirectives(_)))
        ));
    }

    #[test]
    fn test_import_duplicate_rejected_dynamic_allowed() {
        assert!(matches!(
            normalize_imports(clauses("a.b, a.b"), Schema::Modern),
            Err(ClauseError::Semantic(SemanticError::DuplicateImport(_)))
        ));
        assert!(normalize_dynamic_imports(clauses("a.b, a.b"), Schema::Modern).is_ok());
    }

    #[test]
    fn test_version_reconciliation() {
        assert!(matches!(
            normalize_imports(
                clauses("a.b;version=1.0;specification-version=2.0"),
                Schema::Modern
            ),
            Err(ClauseError::Semantic(SemanticError::VersionMismatch))
        ));
        let ok = match normalize_imports(
            clauses("a.b;version=1.0;specification-version=\"1.0\""),
            Schema::Modern,
        ) {
            Ok(c) => c,
            Err(e) => panic!("matching versions should normalize: {e}"),
        };
        assert!(!ok[0].attrs.contains_key(attr::SPECIFICATION_VERSION));
        assert!(matches!(ok[0].attrs.get(attr::VERSION), Some(AttrValue::Range(_))));
    }

    #[test]
    fn test_dynamic_import_wildcards() {
        assert!(normalize_dynamic_imports(clauses("*"), Schema::Modern).is_ok());
        assert!(normalize_dynamic_imports(clauses("a.b.*"), Schema::Modern).is_ok());
        assert!(matches!(
            normalize_dynamic_imports(clauses("a.b*"), Schema::Modern),
            Err(ClauseError::Semantic(SemanticError::PartialWildcard(_)))
        ));
        let normalized = match normalize_dynamic_imports(clauses("a.b"), Schema::Modern) {
            Ok(c) => c,
            Err(e) => panic!("dynamic import should normalize: {e}"),
        };
        assert_eq!(
            normalized[0].dirs.get(dir::RESOLUTION).map(AsRef::as_ref),
            Some(dir::RESOLUTION_DYNAMIC)
        );
    }

    #[test]
    fn test_convert_imports_identity_first_and_empty_attrs() {
        let module = ordinary();
        let normalized = match normalize_imports(
            clauses("com.acme.api;version=\"[1.0,2.0)\";other=x"),
            Schema::Modern,
        ) {
            Ok(c) => c,
            Err(e) => panic!("import should normalize: {e}"),
        };
        let reqs = convert_imports(&normalized, &module);
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].attrs.is_empty());
        let filter_text = match reqs[0].dirs.get(dir::FILTER) {
            Some(f) => f.as_ref(),
            None => panic!("filter directive should be present"),
        };
        assert!(filter_text.starts_with("(&(wiring.package=com.acme.api)"));
    }

    #[test]
    fn test_convert_requires_keeps_attrs() {
        let module = ordinary();
        let normalized = match normalize_requires(
            clauses("acme.util;module-version=\"[1.0,2.0)\""),
            Schema::Modern,
        ) {
            Ok(c) => c,
            Err(e) => panic!("require should normalize: {e}"),
        };
        let reqs = convert_requires(&normalized, &module);
        assert_eq!(reqs.len(), 1);
        assert_eq!(
            reqs[0].attrs.keys().next().map(AsRef::as_ref),
            Some(ns::MODULE)
        );
        assert!(reqs[0].attrs.contains_key(attr::MODULE_VERSION));
    }

    #[test]
    fn test_legacy_requires_dropped() {
        let normalized = match normalize_requires(clauses("acme.util"), Schema::Legacy) {
            Ok(c) => c,
            Err(e) => panic!("legacy require should normalize: {e}"),
        };
        assert!(normalized.is_empty());
    }

    #[test]
    fn test_provide_capability_namespace_rules() {
        let module = ordinary();
        assert!(matches!(
            convert_provide_capabilities(&clauses("wiring.package;x=1"), &module),
            Err(ClauseError::Semantic(SemanticError::ReservedNamespace(_)))
        ));
        assert!(matches!(
            convert_provide_capabilities(&clauses("native;native.osname=linux"), &module),
            Err(ClauseError::Semantic(SemanticError::SystemOnlyNamespace(_)))
        ));
        let system = ModuleHandle::new(crate::wiring::SYSTEM_MODULE, crate::wiring::ModuleKind::System);
        assert!(convert_provide_capabilities(&clauses("native;native.osname=linux"), &system).is_ok());
        assert!(convert_provide_capabilities(&clauses("com.acme.service;x=1"), &module).is_ok());
    }

    #[test]
    fn test_identity_namespace_is_reserved() {
        // Only the symbolic-name header mints identity capabilities;
        // declaring one directly would let a module impersonate another.
        let module = ordinary();
        assert!(matches!(
            convert_provide_capabilities(&clauses("identity;identity=spoofed.module"), &module),
            Err(ClauseError::Semantic(SemanticError::ReservedNamespace(_)))
        ));
        assert!(matches!(
            convert_require_capabilities(&clauses("identity"), &module),
            Err(ClauseError::Semantic(SemanticError::ReservedNamespace(_)))
        ));
        let system = ModuleHandle::new(crate::wiring::SYSTEM_MODULE, crate::wiring::ModuleKind::System);
        assert!(matches!(
            convert_provide_capabilities(&clauses("identity;identity=x"), &system),
            Err(ClauseError::Semantic(SemanticError::ReservedNamespace(_)))
        ));
    }

    #[test]
    fn test_require_capability_filter_parsed() {
        let module = ordinary();
        let reqs = match convert_require_capabilities(
            &clauses("com.acme.feature;filter:=\"(level>=3)\""),
            &module,
        ) {
            Ok(r) => r,
            Err(e) => panic!("require capability should convert: {e}"),
        };
        assert!(matches!(reqs[0].filter, Some(Filter::Leaf { .. })));
        let bare = match convert_require_capabilities(&clauses("com.acme.feature"), &module) {
            Ok(r) => r,
            Err(e) => panic!("bare require capability should convert: {e}"),
        };
        assert_eq!(bare[0].filter, Some(Filter::MatchAll));
    }

    #[test]
    fn test_symbolic_name_caps() {
        let version = match Version::parse("1.2.3") {
            Ok(v) => v,
            Err(e) => panic!("version should parse: {e}"),
        };
        let info = IdentityInfo::default();
        let built = match build_symbolic_name_caps(
            "acme.core;singleton:=true",
            clauses("acme.core;singleton:=true"),
            &version,
            ModuleHandle::ordinary,
            &info,
        ) {
            Ok(Some(b)) => b,
            Ok(None) => panic!("symbolic name should yield capabilities"),
            Err(e) => panic!("symbolic name should build: {e}"),
        };
        let (module, caps) = built;
        assert_eq!(module.id(), "acme.core");
        assert_eq!(caps.module_cap.namespace.as_ref(), ns::MODULE);
        let host = match &caps.host_cap {
            Some(h) => h,
            None => panic!("host capability expected by default"),
        };
        assert!(host.attrs.contains_key(ns::HOST));
        assert!(!host.attrs.contains_key(ns::MODULE));
        assert_eq!(
            caps.identity_cap.attrs.get(attr::TYPE).and_then(AttrValue::as_str),
            Some("module")
        );
        assert_eq!(
            caps.identity_cap.dirs.get(dir::SINGLETON).map(AsRef::as_ref),
            Some("true")
        );
    }

    #[test]
    fn test_symbolic_name_attachment_never_and_fragment() {
        let info = IdentityInfo::default();
        let built = match build_symbolic_name_caps(
            "acme.core;fragment-attachment:=never",
            clauses("acme.core;fragment-attachment:=never"),
            &Version::default(),
            ModuleHandle::ordinary,
            &info,
        ) {
            Ok(Some(b)) => b,
            other => panic!("expected capabilities, got {other:?}"),
        };
        assert!(built.1.host_cap.is_none());

        let fragment_info = IdentityInfo {
            fragment: true,
            ..IdentityInfo::default()
        };
        let built = match build_symbolic_name_caps(
            "acme.frag",
            clauses("acme.frag"),
            &Version::default(),
            ModuleHandle::ordinary,
            &fragment_info,
        ) {
            Ok(Some(b)) => b,
            other => panic!("expected capabilities, got {other:?}"),
        };
        assert!(built.1.host_cap.is_none());
        assert_eq!(
            built.1.identity_cap.attrs.get(attr::TYPE).and_then(AttrValue::as_str),
            Some("fragment")
        );
    }

    #[test]
    fn test_symbolic_name_rejections() {
        assert!(matches!(
            build_symbolic_name_caps(
                "a, b",
                clauses("a, b"),
                &Version::default(),
                ModuleHandle::ordinary,
                &IdentityInfo::default()
            ),
            Err(ClauseError::Semantic(SemanticError::MultipleSymbolicNames(_)))
        ));
        assert!(matches!(
            build_symbolic_name_caps(
                "a;module-version=1.0",
                clauses("a;module-version=1.0"),
                &Version::default(),
                ModuleHandle::ordinary,
                &IdentityInfo::default()
            ),
            Err(ClauseError::Semantic(SemanticError::VersionOnSymbolicName))
        ));
    }

    #[test]
    fn test_adapter_tag_rules() {
        assert!(matches!(
            build_symbolic_name_caps(
                "acme.shim;tags=adapter",
                clauses("acme.shim;tags=adapter"),
                &Version::default(),
                ModuleHandle::ordinary,
                &IdentityInfo::default()
            ),
            Err(ClauseError::Semantic(SemanticError::ReservedTag(_)))
        ));
        let built = match build_symbolic_name_caps(
            "acme.shim",
            clauses("acme.shim"),
            &Version::default(),
            |name| ModuleHandle::new(name, crate::wiring::ModuleKind::Adapter),
            &IdentityInfo::default(),
        ) {
            Ok(Some(b)) => b,
            other => panic!("expected capabilities, got {other:?}"),
        };
        match built.1.module_cap.attrs.get(attr::TAGS) {
            Some(AttrValue::List(tags)) => {
                assert!(tags
                    .iter()
                    .any(|t| t.as_str() == Some(crate::wiring::ADAPTER_TAG)));
            }
            other => panic!("adapter tag should be injected, got {other:?}"),
        }
    }

    #[test]
    fn test_fragment_host() {
        let module = ordinary();
        let req = match parse_fragment_host("acme.host", Schema::Modern, &module) {
            Ok(Some(r)) => r,
            other => panic!("fragment host should parse, got {other:?}"),
        };
        assert_eq!(req.namespace.as_ref(), ns::HOST);
        assert!(matches!(
            req.attrs.get(attr::MODULE_VERSION),
            Some(AttrValue::Range(_))
        ));
        let filter_text = match req.dirs.get(dir::FILTER) {
            Some(f) => f.as_ref(),
            None => panic!("filter directive expected"),
        };
        assert!(filter_text.contains("wiring.host=acme.host"));

        assert!(matches!(
            parse_fragment_host("a, b", Schema::Modern, &module),
            Err(ClauseError::Semantic(SemanticError::MultipleFragmentHosts(_)))
        ));
        assert!(matches!(
            parse_fragment_host("acme.host", Schema::Legacy, &module),
            Ok(None)
        ));
    }

    #[test]
    fn test_execution_environments() {
        let module = ordinary();
        let req = match parse_execution_environments("J2SE-1.4, JavaSE-1.8", &module) {
            Ok(Some(r)) => r,
            other => panic!("environments should parse, got {other:?}"),
        };
        let text = match req.dirs.get(dir::FILTER) {
            Some(f) => f.as_ref(),
            None => panic!("filter directive expected"),
        };
        assert_eq!(
            text,
            "(|(&(execution.environment=JavaSE)(version=1.4.0))\
             (&(execution.environment=JavaSE)(version=1.8.0)))"
        );

        assert!(matches!(parse_execution_environments("", &module), Ok(None)));

        // A version that does not parse folds into the name.
        let req = match parse_execution_environments("CDC-1.0/Foundation-1.0", &module) {
            Ok(Some(r)) => r,
            other => panic!("environments should parse, got {other:?}"),
        };
        let text = match req.dirs.get(dir::FILTER) {
            Some(f) => f.as_ref(),
            None => panic!("filter directive expected"),
        };
        assert_eq!(
            text,
            "(&(execution.environment=CDC/Foundation)(version=1.0.0))"
        );
    }

    #[test]
    fn test_implicit_imports_and_uses() {
        let module = ordinary();
        let version = Version::default();
        let exports = match normalize_exports(
            clauses("com.acme.a;version=1.5, com.acme.b"),
            Schema::Legacy,
            &module,
            &version,
        ) {
            Ok(c) => c,
            Err(e) => panic!("exports should normalize: {e}"),
        };
        let mut export_caps = convert_exports(&exports, &module);
        let imports = match normalize_imports(clauses("com.acme.a, org.other"), Schema::Legacy) {
            Ok(c) => c,
            Err(e) => panic!("imports should normalize: {e}"),
        };

        let implicit = implicit_imports(&export_caps, &imports);
        assert_eq!(implicit.len(), 1);
        assert_eq!(implicit[0].paths[0].as_ref(), "com.acme.b");
        assert!(matches!(
            implicit[0].attrs.get(attr::VERSION),
            Some(AttrValue::Range(_))
        ));

        let mut all = imports.clone();
        all.extend(implicit);
        implicit_uses(&mut export_caps, &all);
        assert_eq!(
            export_caps[0].uses(),
            Some("com.acme.a,org.other,com.acme.b")
        );
    }
}
