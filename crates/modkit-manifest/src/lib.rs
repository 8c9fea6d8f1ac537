//! Modkit Manifest Parsing
//!
//! This crate turns a module's raw manifest headers into the typed
//! capabilities and requirements the wiring layer resolves against.
//! It covers header tokenization, attribute typing, LDAP-style filters,
//! version ranges, native library selection and the full descriptor
//! build with its legacy/modern schema split.

pub mod descriptor;
pub mod errors;
pub mod filter;
pub mod intern;
pub mod native;
pub mod normalize;
pub mod tokenizer;
pub mod values;
pub mod version;
pub mod wiring;

pub use descriptor::{header, ActivationPolicy, ExtensionKind, HeaderMap, ModuleDescriptor};
pub use errors::{ClauseError, ManifestError, SemanticError, SyntaxError};
pub use filter::{Filter, FilterOp};
pub use intern::InternPool;
pub use native::{NativeLibrary, NativeLibraryClause, NativeSelection, PlatformProps};
pub use values::{AttrValue, Attrs, CoercionMode, Dirs, OrderedMap};
pub use version::{Bound, Version, VersionRange};
pub use wiring::{Capability, ModuleHandle, ModuleKind, Requirement, Schema};

// Re-export the clause-level API for tooling that inspects single headers.
pub use tokenizer::{parse_header, split_delimited, Clause};
