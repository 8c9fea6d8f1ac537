//! Wiring vocabulary and the capability/requirement model.
//!
//! Namespaces, attribute keys and directive names are the contract
//! between a module's manifest and the resolver; they are collected
//! here so normalizers and the descriptor share one spelling.

use crate::filter::Filter;
use crate::values::{Attrs, Dirs};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Capability/requirement namespaces.
pub mod ns {
    /// Package wiring between exporters and importers.
    pub const PACKAGE: &str = "wiring.package";
    /// Whole-module wiring (require-module dependencies).
    pub const MODULE: &str = "wiring.module";
    /// Fragment attachment points.
    pub const HOST: &str = "wiring.host";
    /// Module identity, one capability per module.
    pub const IDENTITY: &str = "identity";
    /// Required execution environments.
    pub const EXECUTION_ENVIRONMENT: &str = "execution.environment";
    /// Native library selection.
    pub const NATIVE: &str = "native";

    /// Everything under this prefix is managed by the wiring layer and
    /// may not be declared through the generic capability headers.
    pub const WIRING_PREFIX: &str = "wiring.";
}

/// Well-known attribute keys.
pub mod attr {
    pub const VERSION: &str = "version";
    pub const SPECIFICATION_VERSION: &str = "specification-version";
    pub const MODULE_VERSION: &str = "module-version";
    pub const MODULE_SYMBOLIC_NAME: &str = "module-symbolic-name";
    pub const TYPE: &str = "type";
    pub const TAGS: &str = "tags";
    pub const COPYRIGHT: &str = "copyright";
    pub const DESCRIPTION: &str = "description";
    pub const DOCUMENTATION: &str = "documentation";
    pub const LICENSE: &str = "license";

    pub const NATIVE_OSNAME: &str = "native.osname";
    pub const NATIVE_OSVERSION: &str = "native.osversion";
    pub const NATIVE_PROCESSOR: &str = "native.processor";
    pub const NATIVE_LANGUAGE: &str = "native.language";
}

/// Well-known directive names and values.
pub mod dir {
    pub const FILTER: &str = "filter";
    pub const RESOLUTION: &str = "resolution";
    pub const RESOLUTION_DYNAMIC: &str = "dynamic";
    pub const RESOLUTION_OPTIONAL: &str = "optional";
    pub const SINGLETON: &str = "singleton";
    pub const FRAGMENT_ATTACHMENT: &str = "fragment-attachment";
    pub const ATTACHMENT_ALWAYS: &str = "always";
    pub const ATTACHMENT_RESOLVE_TIME: &str = "resolve-time";
    pub const ATTACHMENT_NEVER: &str = "never";
    pub const USES: &str = "uses";
    pub const EXTENSION: &str = "extension";
    pub const EXTENSION_FRAMEWORK: &str = "framework";
    pub const EXTENSION_BOOTPATH: &str = "bootpath";
    pub const INCLUDE: &str = "include";
    pub const EXCLUDE: &str = "exclude";
}

/// Symbolic name of the module backing the platform itself.
pub const SYSTEM_MODULE: &str = "system.module";

/// Identity tag marking a platform-adapter module.
pub const ADAPTER_TAG: &str = "adapter";

/// Package prefix exportable only by the system module or an adapter.
pub const RESERVED_PACKAGE_PREFIX: &str = "java.";

/// Manifest schema generation, from `Module-SchemaVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    /// Pre-directive manifests; several headers are ignored or
    /// loosened for compatibility.
    Legacy,
    /// Current manifests, `Module-SchemaVersion: 2`.
    Modern,
}

impl Schema {
    pub fn is_legacy(self) -> bool {
        matches!(self, Self::Legacy)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        out.write_str(match self {
            Self::Legacy => "legacy",
            Self::Modern => "modern",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Ordinary,
    System,
    Adapter,
}

/// Non-owning identity of the module a capability or requirement
/// belongs to. Cheap to clone; the descriptor stamps it onto everything
/// it builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHandle {
    id: Arc<str>,
    kind: ModuleKind,
}

impl ModuleHandle {
    pub fn new(id: &str, kind: ModuleKind) -> Self {
        Self {
            id: Arc::from(id),
            kind,
        }
    }

    pub fn ordinary(id: &str) -> Self {
        Self::new(id, ModuleKind::Ordinary)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn is_system(&self) -> bool {
        self.kind == ModuleKind::System
    }

    pub fn is_adapter(&self) -> bool {
        self.kind == ModuleKind::Adapter
    }
}

/// Something a module offers to the wiring layer. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capability {
    pub namespace: Arc<str>,
    pub dirs: Dirs,
    pub attrs: Attrs,
    #[serde(skip)]
    pub module: ModuleHandle,
}

impl Capability {
    pub fn new(module: &ModuleHandle, namespace: &str, dirs: Dirs, attrs: Attrs) -> Self {
        Self {
            namespace: Arc::from(namespace),
            dirs,
            attrs,
            module: module.clone(),
        }
    }

    pub fn uses(&self) -> Option<&str> {
        self.dirs.get(dir::USES).map(AsRef::as_ref)
    }
}

/// Something a module needs from the wiring layer. The `filter`
/// directive always holds the rendered form of `filter` when one was
/// synthesized. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Requirement {
    pub namespace: Arc<str>,
    pub dirs: Dirs,
    pub attrs: Attrs,
    pub filter: Option<Filter>,
    #[serde(skip)]
    pub module: ModuleHandle,
}

impl Requirement {
    pub fn new(
        module: &ModuleHandle,
        namespace: &str,
        dirs: Dirs,
        attrs: Attrs,
        filter: Option<Filter>,
    ) -> Self {
        Self {
            namespace: Arc::from(namespace),
            dirs,
            attrs,
            filter,
            module: module.clone(),
        }
    }

    /// Build a requirement whose filter is synthesized from `attrs` and
    /// recorded in the `filter` directive, with `attrs` themselves left
    /// empty. This is how package and module requirements are encoded.
    pub fn with_synthesized_filter(
        module: &ModuleHandle,
        namespace: &str,
        mut dirs: Dirs,
        attrs: &Attrs,
    ) -> Self {
        let filter = Filter::from_attrs(attrs);
        dirs.insert(Arc::from(dir::FILTER), Arc::from(filter.to_string().as_str()));
        Self::new(module, namespace, dirs, Attrs::new(), Some(filter))
    }

    pub fn is_optional(&self) -> bool {
        self.dirs
            .get(dir::RESOLUTION)
            .is_some_and(|r| r.as_ref() == dir::RESOLUTION_OPTIONAL)
    }

    pub fn is_dynamic(&self) -> bool {
        self.dirs
            .get(dir::RESOLUTION)
            .is_some_and(|r| r.as_ref() == dir::RESOLUTION_DYNAMIC)
    }
}
