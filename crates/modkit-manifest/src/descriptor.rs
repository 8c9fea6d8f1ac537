//! Whole-manifest orchestration.
//!
//! `ModuleDescriptor::parse` drives every header through its
//! normalizer and converter in a fixed order and assembles the final
//! capability and requirement lists. Construction is atomic: the first
//! error from any sub-step aborts the build, tagged with the header it
//! came from.

use crate::errors::{ManifestError, SemanticError};
use crate::intern::InternPool;
use crate::native::{
    convert_native, parse_native_header, select_libraries, NativeLibraryClause, NativeSelection,
    PlatformProps,
};
use crate::normalize::{
    self, build_symbolic_name_caps, implicit_imports, implicit_uses, parse_execution_environments,
    parse_fragment_host, IdentityInfo,
};
use crate::tokenizer::{parse_header, Clause};
use crate::values::{coerce_typed_attrs, CoercionMode};
use crate::version::Version;
use crate::wiring::{dir, Capability, ModuleHandle, ModuleKind, Requirement, Schema, SYSTEM_MODULE};
use ahash::AHashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Manifest header names. Case-sensitive, matching the loader's map.
pub mod header {
    pub const SCHEMA_VERSION: &str = "Module-SchemaVersion";
    pub const SYMBOLIC_NAME: &str = "Module-SymbolicName";
    pub const VERSION: &str = "Module-Version";
    pub const EXPORT_PACKAGE: &str = "Export-Package";
    pub const IMPORT_PACKAGE: &str = "Import-Package";
    pub const DYNAMIC_IMPORT_PACKAGE: &str = "DynamicImport-Package";
    pub const REQUIRE_MODULE: &str = "Require-Module";
    pub const REQUIRE_CAPABILITY: &str = "Require-Capability";
    pub const PROVIDE_CAPABILITY: &str = "Provide-Capability";
    pub const FRAGMENT_HOST: &str = "Fragment-Host";
    pub const NATIVE_CODE: &str = "Module-NativeCode";
    pub const REQUIRED_EXECUTION_ENVIRONMENT: &str = "Module-RequiredExecutionEnvironment";
    pub const ACTIVATION_POLICY: &str = "Module-ActivationPolicy";
    pub const ACTIVATOR: &str = "Module-Activator";
    pub const NAME: &str = "Module-Name";
    pub const COPYRIGHT: &str = "Module-Copyright";
    pub const DESCRIPTION: &str = "Module-Description";
    pub const DOC_URL: &str = "Module-DocURL";
    pub const LICENSE: &str = "Module-License";
}

/// Raw header-name to raw-value map for one module.
pub type HeaderMap = AHashMap<String, String>;

/// When and how the module's activator runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "policy")]
pub enum ActivationPolicy {
    Eager,
    Lazy {
        include: Option<Arc<str>>,
        exclude: Option<Arc<str>>,
    },
}

/// Where an extension module attaches to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    Framework,
    BootPath,
}

/// Fully parsed manifest for one module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleDescriptor {
    symbolic_name: Option<Arc<str>>,
    version: Version,
    schema: Schema,
    extension: Option<ExtensionKind>,
    activation: ActivationPolicy,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
    native_clauses: Vec<NativeLibraryClause>,
    native_optional: bool,
    #[serde(skip)]
    module: ModuleHandle,
}

impl ModuleDescriptor {
    /// Parse an ordinary module's manifest.
    pub fn parse(headers: &HeaderMap) -> Result<Self, ManifestError> {
        Self::parse_as(headers, ModuleKind::Ordinary, None)
    }

    /// Parse with an explicit module kind (system or platform-adapter
    /// modules are minted by the platform, not self-declared) and an
    /// optional interning pool shared across many modules.
    pub fn parse_as(
        headers: &HeaderMap,
        kind: ModuleKind,
        pool: Option<&InternPool>,
    ) -> Result<Self, ManifestError> {
        let builder = Builder {
            headers,
            kind,
            schema: parse_schema(headers)?,
        };
        let mut descriptor = builder.build()?;
        if let Some(pool) = pool {
            pool.intern_descriptor(&mut descriptor);
        }
        Ok(descriptor)
    }

    pub fn symbolic_name(&self) -> Option<&str> {
        self.symbolic_name.as_deref()
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn module(&self) -> &ModuleHandle {
        &self.module
    }

    pub fn is_extension(&self) -> bool {
        self.extension.is_some()
    }

    pub fn extension(&self) -> Option<ExtensionKind> {
        self.extension
    }

    pub fn activation(&self) -> &ActivationPolicy {
        &self.activation
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn native_clauses(&self) -> &[NativeLibraryClause] {
        &self.native_clauses
    }

    /// Run native library selection against a platform description.
    pub fn select_native_libraries(&self, props: &PlatformProps) -> NativeSelection {
        select_libraries(&self.native_clauses, self.native_optional, props)
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Vec<Capability>, &mut Vec<Requirement>) {
        (&mut self.capabilities, &mut self.requirements)
    }
}

fn parse_schema(headers: &HeaderMap) -> Result<Schema, ManifestError> {
    match headers.get(header::SCHEMA_VERSION).map(|v| v.trim()) {
        None | Some("1") => Ok(Schema::Legacy),
        Some("2") => Ok(Schema::Modern),
        Some(other) => Err(ManifestError::in_header(
            header::SCHEMA_VERSION,
            SemanticError::UnknownSchemaVersion(other.to_string()),
        )),
    }
}

struct Builder<'a> {
    headers: &'a HeaderMap,
    kind: ModuleKind,
    schema: Schema,
}

impl Builder<'_> {
    fn raw(&self, name: &str) -> &str {
        self.headers.get(name).map_or("", String::as_str)
    }

    fn clauses(&self, name: &str, mode: CoercionMode) -> Result<Vec<Clause>, ManifestError> {
        let mut clauses =
            parse_header(self.raw(name)).map_err(|e| ManifestError::in_header(name, e))?;
        for clause in &mut clauses {
            coerce_typed_attrs(&mut clause.attrs, &clause.types, mode)
                .map_err(|e| ManifestError::in_header(name, e))?;
        }
        Ok(clauses)
    }

    /// The lenient mode only applies to legacy package clauses.
    fn package_mode(&self) -> CoercionMode {
        if self.schema.is_legacy() {
            CoercionMode::LegacyLenient
        } else {
            CoercionMode::Strict
        }
    }

    fn build(self) -> Result<ModuleDescriptor, ManifestError> {
        let schema = self.schema;
        let version = self.parse_version()?;
        let fragment = !self.raw(header::FRAGMENT_HOST).trim().is_empty() && !schema.is_legacy();

        // Symbolic name and the three capabilities it induces.
        let info = IdentityInfo {
            fragment,
            copyright: self.headers.get(header::COPYRIGHT).cloned(),
            description: self.headers.get(header::DESCRIPTION).cloned(),
            documentation: self.headers.get(header::DOC_URL).cloned(),
            license: self.headers.get(header::LICENSE).cloned(),
        };
        let kind = self.kind;
        let name_clauses = self.clauses(header::SYMBOLIC_NAME, CoercionMode::Strict)?;
        let named = build_symbolic_name_caps(
            self.raw(header::SYMBOLIC_NAME),
            name_clauses,
            &version,
            |name| {
                // The platform's own module is recognized by name.
                let kind = if kind == ModuleKind::Ordinary && name == SYSTEM_MODULE {
                    ModuleKind::System
                } else {
                    kind
                };
                ModuleHandle::new(name, kind)
            },
            &info,
        )
        .map_err(|e| ManifestError::in_header(header::SYMBOLIC_NAME, e))?;

        let (module, symbolic_name, mut capabilities) = match named {
            Some((module, caps)) => {
                let mut list = Vec::new();
                if !fragment {
                    list.push(caps.module_cap);
                    if let Some(host) = caps.host_cap {
                        list.push(host);
                    }
                }
                list.push(caps.identity_cap);
                (module, Some(caps.name), list)
            }
            None => {
                if !schema.is_legacy() {
                    return Err(ManifestError::in_header(
                        header::SYMBOLIC_NAME,
                        SemanticError::MissingSymbolicName,
                    ));
                }
                (ModuleHandle::new("", kind), None, Vec::new())
            }
        };

        let extension = self.parse_extension()?;

        let mut requirements: Vec<Requirement> = Vec::new();

        if let Some(req) = parse_fragment_host(self.raw(header::FRAGMENT_HOST), schema, &module)
            .map_err(|e| ManifestError::in_header(header::FRAGMENT_HOST, e))?
        {
            requirements.push(req);
        }

        let require_clauses = self.clauses(header::REQUIRE_MODULE, CoercionMode::Strict)?;
        let require_clauses = normalize::normalize_requires(require_clauses, schema)
            .map_err(|e| ManifestError::in_header(header::REQUIRE_MODULE, e))?;
        requirements.extend(normalize::convert_requires(&require_clauses, &module));

        let import_clauses = self.clauses(header::IMPORT_PACKAGE, self.package_mode())?;
        let import_clauses = normalize::normalize_imports(import_clauses, schema)
            .map_err(|e| ManifestError::in_header(header::IMPORT_PACKAGE, e))?;
        requirements.extend(normalize::convert_imports(&import_clauses, &module));

        let dynamic_clauses =
            self.clauses(header::DYNAMIC_IMPORT_PACKAGE, self.package_mode())?;
        let dynamic_clauses = normalize::normalize_dynamic_imports(dynamic_clauses, schema)
            .map_err(|e| ManifestError::in_header(header::DYNAMIC_IMPORT_PACKAGE, e))?;
        requirements.extend(normalize::convert_imports(&dynamic_clauses, &module));

        let require_cap_clauses = self.clauses(header::REQUIRE_CAPABILITY, CoercionMode::Strict)?;
        requirements.extend(
            normalize::convert_require_capabilities(&require_cap_clauses, &module)
                .map_err(|e| ManifestError::in_header(header::REQUIRE_CAPABILITY, e))?,
        );

        if let Some(req) = parse_execution_environments(
            self.raw(header::REQUIRED_EXECUTION_ENVIRONMENT),
            &module,
        )
        .map_err(|e| ManifestError::in_header(header::REQUIRED_EXECUTION_ENVIRONMENT, e))?
        {
            requirements.push(req);
        }

        let export_clauses = self.clauses(header::EXPORT_PACKAGE, self.package_mode())?;
        let export_clauses =
            normalize::normalize_exports(export_clauses, schema, &module, &version)
                .map_err(|e| ManifestError::in_header(header::EXPORT_PACKAGE, e))?;
        let mut export_caps = normalize::convert_exports(&export_clauses, &module);

        let provide_clauses = self.clauses(header::PROVIDE_CAPABILITY, CoercionMode::Strict)?;
        let provide_caps = normalize::convert_provide_capabilities(&provide_clauses, &module)
            .map_err(|e| ManifestError::in_header(header::PROVIDE_CAPABILITY, e))?;

        // Legacy manifests imply an import for every export and one
        // shared class space.
        if schema.is_legacy() {
            let implicit = implicit_imports(&export_caps, &import_clauses);
            requirements.extend(normalize::convert_imports(&implicit, &module));

            let mut all_imports = import_clauses;
            all_imports.extend(implicit);
            implicit_uses(&mut export_caps, &all_imports);
        }

        capabilities.extend(export_caps);
        capabilities.extend(provide_caps);

        let (native_clauses, native_optional) = parse_native_header(self.raw(header::NATIVE_CODE))
            .map_err(|e| ManifestError::in_header(header::NATIVE_CODE, e))?;
        if let Some(req) = convert_native(&native_clauses, native_optional, &module) {
            requirements.push(req);
        }

        let activation = self.parse_activation_policy()?;

        debug!(
            module = module.id(),
            schema = %schema,
            capabilities = capabilities.len(),
            requirements = requirements.len(),
            "parsed module manifest"
        );

        Ok(ModuleDescriptor {
            symbolic_name,
            version,
            schema,
            extension,
            activation,
            capabilities,
            requirements,
            native_clauses,
            native_optional,
            module,
        })
    }

    fn parse_version(&self) -> Result<Version, ManifestError> {
        let raw = self.raw(header::VERSION).trim();
        if raw.is_empty() {
            return Ok(Version::default());
        }
        match Version::parse(raw) {
            Ok(version) => Ok(version),
            // Legacy module versions were never validated; modern ones
            // must parse.
            Err(_) if self.schema.is_legacy() => Ok(Version::default()),
            Err(e) => Err(ManifestError::in_header(header::VERSION, e)),
        }
    }

    fn parse_extension(&self) -> Result<Option<ExtensionKind>, ManifestError> {
        if self.schema.is_legacy() {
            return Ok(None);
        }
        let clauses = parse_header(self.raw(header::FRAGMENT_HOST))
            .map_err(|e| ManifestError::in_header(header::FRAGMENT_HOST, e))?;
        let [clause] = clauses.as_slice() else {
            return Ok(None);
        };
        let mut declared = clause.dirs.get(dir::EXTENSION).cloned();
        let host_is_system = clause
            .paths
            .first()
            .is_some_and(|p| p.as_ref() == SYSTEM_MODULE);
        if host_is_system {
            declared = declared.or_else(|| Some(Arc::from(dir::EXTENSION_FRAMEWORK)));
        } else if declared.is_some() {
            return Err(ManifestError::in_header(
                header::FRAGMENT_HOST,
                SemanticError::NonSystemExtension,
            ));
        }

        let Some(declared) = declared else {
            return Ok(None);
        };
        let kind = if declared.as_ref() == dir::EXTENSION_FRAMEWORK {
            ExtensionKind::Framework
        } else if declared.as_ref() == dir::EXTENSION_BOOTPATH {
            ExtensionKind::BootPath
        } else {
            return Err(ManifestError::in_header(
                header::FRAGMENT_HOST,
                SemanticError::InvalidExtension,
            ));
        };

        for forbidden in [
            header::REQUIRE_MODULE,
            header::NATIVE_CODE,
            header::DYNAMIC_IMPORT_PACKAGE,
            header::ACTIVATOR,
        ] {
            if self.headers.contains_key(forbidden) {
                return Err(ManifestError::in_header(
                    header::FRAGMENT_HOST,
                    SemanticError::ExtensionForbiddenHeader(forbidden),
                ));
            }
        }
        Ok(Some(kind))
    }

    fn parse_activation_policy(&self) -> Result<ActivationPolicy, ManifestError> {
        let clauses = parse_header(self.raw(header::ACTIVATION_POLICY))
            .map_err(|e| ManifestError::in_header(header::ACTIVATION_POLICY, e))?;
        let Some(clause) = clauses.first() else {
            return Ok(ActivationPolicy::Eager);
        };
        if !clause.paths.iter().any(|p| p.as_ref() == "lazy") {
            return Ok(ActivationPolicy::Eager);
        }
        Ok(ActivationPolicy::Lazy {
            include: clause.dirs.get(dir::INCLUDE).cloned(),
            exclude: clause.dirs.get(dir::EXCLUDE).cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::values::AttrValue;
    use crate::wiring::{attr, ns};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn parse_ok(pairs: &[(&str, &str)]) -> ModuleDescriptor {
        match ModuleDescriptor::parse(&headers(pairs)) {
            Ok(d) => d,
            Err(e) => panic!("manifest should parse: {e}"),
        }
    }

    fn parse_modern(pairs: &[(&str, &str)]) -> ModuleDescriptor {
        let mut all = vec![
            (header::SCHEMA_VERSION, "2"),
            (header::SYMBOLIC_NAME, "acme.core"),
        ];
        all.extend_from_slice(pairs);
        parse_ok(&all)
    }

    #[test]
    fn test_minimal_modern_manifest() {
        let descriptor = parse_modern(&[]);
        assert_eq!(descriptor.symbolic_name(), Some("acme.core"));
        assert_eq!(descriptor.schema(), Schema::Modern);
        assert_eq!(descriptor.version().to_string(), "0.0.0");
        // Module, host and identity capabilities.
        assert_eq!(descriptor.capabilities().len(), 3);
        let namespaces: Vec<&str> = descriptor
            .capabilities()
            .iter()
            .map(|c| c.namespace.as_ref())
            .collect();
        assert_eq!(namespaces, [ns::MODULE, ns::HOST, ns::IDENTITY]);
        assert!(descriptor.requirements().is_empty());
        assert_eq!(*descriptor.activation(), ActivationPolicy::Eager);
    }

    #[test]
    fn test_modern_requires_symbolic_name() {
        let result = ModuleDescriptor::parse(&headers(&[(header::SCHEMA_VERSION, "2")]));
        match result {
            Err(e) => {
                assert_eq!(e.header(), header::SYMBOLIC_NAME);
                assert!(e.is_semantic());
            }
            Ok(_) => panic!("missing symbolic name should fail"),
        }
    }

    #[test]
    fn test_legacy_manifest_without_name() {
        let descriptor = parse_ok(&[(header::EXPORT_PACKAGE, "com.acme")]);
        assert_eq!(descriptor.schema(), Schema::Legacy);
        assert_eq!(descriptor.symbolic_name(), None);
        // Export capability plus its implicit import.
        assert_eq!(descriptor.capabilities().len(), 1);
        assert_eq!(descriptor.requirements().len(), 1);
        assert_eq!(descriptor.requirements()[0].namespace.as_ref(), ns::PACKAGE);
        assert_eq!(
            descriptor.capabilities()[0].uses(),
            Some("com.acme")
        );
    }

    #[test]
    fn test_unknown_schema_version() {
        let result = ModuleDescriptor::parse(&headers(&[(header::SCHEMA_VERSION, "3")]));
        match result {
            Err(e) => assert_eq!(e.header(), header::SCHEMA_VERSION),
            Ok(_) => panic!("unknown schema should fail"),
        }
    }

    #[test]
    fn test_version_leniency_by_schema() {
        let descriptor = parse_ok(&[(header::VERSION, "not-a-version")]);
        assert_eq!(descriptor.version().to_string(), "0.0.0");

        let result = ModuleDescriptor::parse(&headers(&[
            (header::SCHEMA_VERSION, "2"),
            (header::SYMBOLIC_NAME, "acme.core"),
            (header::VERSION, "not-a-version"),
        ]));
        match result {
            Err(e) => {
                assert_eq!(e.header(), header::VERSION);
                assert!(e.is_syntax());
            }
            Ok(_) => panic!("modern manifests must have a parsable version"),
        }
    }

    #[test]
    fn test_full_modern_manifest() {
        let descriptor = parse_modern(&[
            (header::VERSION, "1.2.3"),
            (header::IMPORT_PACKAGE, "org.dep;version=\"[1.0,2.0)\""),
            (header::EXPORT_PACKAGE, "com.acme.api;version=1.2"),
            (header::REQUIRE_MODULE, "acme.util;module-version=\"[1,2)\""),
            (header::PROVIDE_CAPABILITY, "com.acme.feature;level:Long=3"),
            (header::REQUIRE_CAPABILITY, "com.acme.other;filter:=\"(level>=2)\""),
        ]);

        let reqs = descriptor.requirements();
        assert_eq!(reqs.len(), 3);
        assert_eq!(reqs[0].namespace.as_ref(), ns::MODULE);
        assert_eq!(reqs[1].namespace.as_ref(), ns::PACKAGE);
        assert_eq!(reqs[2].namespace.as_ref(), "com.acme.other");

        let caps = descriptor.capabilities();
        assert_eq!(caps.len(), 5);
        let export = &caps[3];
        assert_eq!(export.namespace.as_ref(), ns::PACKAGE);
        assert_eq!(
            export.attrs.get(attr::MODULE_SYMBOLIC_NAME).and_then(AttrValue::as_str),
            Some("acme.core")
        );
        let provide = &caps[4];
        assert!(matches!(provide.attrs.get("level"), Some(AttrValue::Long(3))));
        assert!(descriptor
            .capabilities()
            .iter()
            .all(|c| c.module.id() == "acme.core"));
    }

    #[test]
    fn test_fragment_manifest() {
        let descriptor = parse_modern(&[(header::FRAGMENT_HOST, "acme.host")]);
        // Fragments have no module or host capability, only identity.
        assert_eq!(descriptor.capabilities().len(), 1);
        assert_eq!(descriptor.capabilities()[0].namespace.as_ref(), ns::IDENTITY);
        assert_eq!(
            descriptor.capabilities()[0]
                .attrs
                .get(attr::TYPE)
                .and_then(AttrValue::as_str),
            Some("fragment")
        );
        assert_eq!(descriptor.requirements().len(), 1);
        assert_eq!(descriptor.requirements()[0].namespace.as_ref(), ns::HOST);
        assert!(!descriptor.is_extension());
    }

    #[test]
    fn test_extension_manifest() {
        let descriptor = parse_modern(&[(
            header::FRAGMENT_HOST,
            "system.module;extension:=framework",
        )]);
        assert_eq!(descriptor.extension(), Some(ExtensionKind::Framework));

        let default_kind = parse_modern(&[(header::FRAGMENT_HOST, "system.module")]);
        assert_eq!(default_kind.extension(), Some(ExtensionKind::Framework));

        let result = ModuleDescriptor::parse(&headers(&[
            (header::SCHEMA_VERSION, "2"),
            (header::SYMBOLIC_NAME, "acme.ext"),
            (header::FRAGMENT_HOST, "acme.host;extension:=framework"),
        ]));
        match result {
            Err(e) => {
                assert_eq!(e.header(), header::FRAGMENT_HOST);
            }
            Ok(_) => panic!("non-system extension host should fail"),
        }
    }

    #[test]
    fn test_extension_forbidden_headers() {
        let result = ModuleDescriptor::parse(&headers(&[
            (header::SCHEMA_VERSION, "2"),
            (header::SYMBOLIC_NAME, "acme.ext"),
            (header::FRAGMENT_HOST, "system.module;extension:=bootpath"),
            (header::ACTIVATOR, "com.acme.Activator"),
        ]));
        match result {
            Err(e) => assert_eq!(e.header(), header::FRAGMENT_HOST),
            Ok(_) => panic!("extension with activator should fail"),
        }
    }

    #[test]
    fn test_activation_policy() {
        let lazy = parse_modern(&[(
            header::ACTIVATION_POLICY,
            "lazy;include:=\"com.acme.early\";exclude:=\"com.acme.late\"",
        )]);
        match lazy.activation() {
            ActivationPolicy::Lazy { include, exclude } => {
                assert_eq!(include.as_deref(), Some("com.acme.early"));
                assert_eq!(exclude.as_deref(), Some("com.acme.late"));
            }
            ActivationPolicy::Eager => panic!("policy should be lazy"),
        }

        let eager = parse_modern(&[(header::ACTIVATION_POLICY, "whenever")]);
        assert_eq!(*eager.activation(), ActivationPolicy::Eager);
    }

    #[test]
    fn test_system_module_by_name() {
        let descriptor = parse_ok(&[
            (header::SCHEMA_VERSION, "2"),
            (header::SYMBOLIC_NAME, SYSTEM_MODULE),
            (header::EXPORT_PACKAGE, "java.lang"),
            (header::PROVIDE_CAPABILITY, "native;native.osname=linux"),
        ]);
        assert!(descriptor.module().is_system());
    }

    #[test]
    fn test_error_is_tagged_with_header() {
        let result = ModuleDescriptor::parse(&headers(&[
            (header::SCHEMA_VERSION, "2"),
            (header::SYMBOLIC_NAME, "acme.core"),
            (header::IMPORT_PACKAGE, "a.b, a.b"),
        ]));
        match result {
            Err(e) => {
                assert_eq!(e.header(), header::IMPORT_PACKAGE);
                assert!(e.is_semantic());
            }
            Ok(_) => panic!("duplicate import should fail"),
        }
    }

    #[test]
    fn test_identity_enrichment() {
        let descriptor = parse_modern(&[
            (header::COPYRIGHT, "Copyright Acme"),
            (header::DESCRIPTION, "Core services"),
            (header::DOC_URL, "https://acme.example/docs"),
            (header::LICENSE, "Apache-2.0"),
        ]);
        let identity = descriptor
            .capabilities()
            .iter()
            .find(|c| c.namespace.as_ref() == ns::IDENTITY);
        let identity = match identity {
            Some(c) => c,
            None => panic!("identity capability expected"),
        };
        assert_eq!(
            identity.attrs.get(attr::COPYRIGHT).and_then(AttrValue::as_str),
            Some("Copyright Acme")
        );
        assert_eq!(
            identity.attrs.get(attr::LICENSE).and_then(AttrValue::as_str),
            Some("Apache-2.0")
        );
    }

    #[test]
    fn test_native_selection_through_descriptor() {
        let descriptor = parse_modern(&[(
            header::NATIVE_CODE,
            "lib/a.so;osname=Linux;osversion=\"[2.0,3.0)\", \
             lib/b.so;osname=Linux;osversion=\"[3.0,4.0)\"",
        )]);
        let mut props = PlatformProps::new();
        props.insert(
            crate::native::platform::OS_NAME.to_string(),
            "Linux".to_string(),
        );
        props.insert(
            crate::native::platform::OS_VERSION.to_string(),
            "3.5".to_string(),
        );
        match descriptor.select_native_libraries(&props) {
            NativeSelection::Selected(libs) => {
                assert_eq!(libs[0].entry.as_ref(), "lib/b.so");
            }
            other => panic!("expected selection, got {other:?}"),
        }
        // The native requirement itself is carried on the descriptor.
        let native_req = descriptor
            .requirements()
            .iter()
            .find(|r| r.namespace.as_ref() == ns::NATIVE);
        assert!(matches!(
            native_req.map(|r| &r.filter),
            Some(Some(Filter::Or(_)))
        ));
    }
}
