use thiserror::Error;

/// Malformed manifest text: the tokenizer, version grammar, filter
/// grammar or delimited-list grammar could not make sense of the input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("unable to parse header: {0}")]
    UnterminatedHeader(String),

    #[error("duplicate '{key}' in: {header}")]
    DuplicateKey { key: String, header: String },

    #[error("invalid delimited string: {0}")]
    InvalidDelimitedString(String),

    #[error("invalid version '{text}': {reason}")]
    InvalidVersion { text: String, reason: String },

    #[error("invalid version range '{text}': {reason}")]
    InvalidVersionRange { text: String, reason: String },

    #[error("invalid filter '{text}': {reason}")]
    InvalidFilter { text: String, reason: String },

    #[error("invalid {tag} value for attribute '{key}': {value}")]
    InvalidNumber {
        key: String,
        tag: &'static str,
        value: String,
    },

    #[error("invalid attribute list type for '{key}': {tag}")]
    InvalidListType { key: String, tag: String },

    #[error("unknown attribute type for '{key}': {tag}")]
    UnknownAttributeType { key: String, tag: String },
}

/// Well-formed manifest text that violates a header-specific rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("unknown schema version: {0}")]
    UnknownSchemaVersion(String),

    #[error("modern manifests must declare a module symbolic name")]
    MissingSymbolicName,

    #[error("cannot have multiple symbolic names: {0}")]
    MultipleSymbolicNames(String),

    #[error("symbolic name clause cannot carry an explicit version attribute")]
    VersionOnSymbolicName,

    #[error("invalid tags list: {0}")]
    InvalidTags(String),

    #[error("tag '{0}' is reserved for platform-adapter modules")]
    ReservedTag(String),

    #[error("importing or exporting '.' is invalid")]
    DefaultPackage,

    #[error("package names cannot be zero length")]
    EmptyPackage,

    #[error("exporting {0}* packages is not allowed: {1}")]
    ReservedPackage(String, String),

    #[error("duplicate import: {0}")]
    DuplicateImport(String),

    #[error("partial package name wild carding is not allowed: {0}")]
    PartialWildcard(String),

    #[error("legacy {0} clauses cannot contain directives")]
    LegacyDirectives(&'static str),

    #[error("both version and specification-version are specified, but they are not equal")]
    VersionMismatch,

    #[error("exports must not specify module symbolic name or module version")]
    ExportsModuleIdentity,

    #[error("cannot use the '{0}' namespace here")]
    ReservedNamespace(String),

    #[error("only the system module can provide the '{0}' namespace")]
    SystemOnlyNamespace(String),

    #[error("fragments cannot have multiple hosts: {0}")]
    MultipleFragmentHosts(String),

    #[error("extension modules must have either 'extension:=framework' or 'extension:=bootpath'")]
    InvalidExtension,

    #[error("only the system module can host extension modules")]
    NonSystemExtension,

    #[error("extension modules cannot declare '{0}'")]
    ExtensionForbiddenHeader(&'static str),
}

/// Internal carrier for errors raised below the descriptor layer, before
/// the offending header name is known.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClauseError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

/// Error surfaced from a full descriptor build, tagged with the header it
/// came from. Construction is atomic: the first of these aborts the build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("header '{header}': {source}")]
    Syntax {
        header: String,
        #[source]
        source: SyntaxError,
    },
    #[error("header '{header}': {source}")]
    Semantic {
        header: String,
        #[source]
        source: SemanticError,
    },
}

impl ManifestError {
    pub(crate) fn in_header(header: &str, err: impl Into<ClauseError>) -> Self {
        match err.into() {
            ClauseError::Syntax(source) => ManifestError::Syntax {
                header: header.to_string(),
                source,
            },
            ClauseError::Semantic(source) => ManifestError::Semantic {
                header: header.to_string(),
                source,
            },
        }
    }

    /// The manifest header this error was raised for.
    pub fn header(&self) -> &str {
        match self {
            ManifestError::Syntax { header, .. } | ManifestError::Semantic { header, .. } => header,
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, ManifestError::Syntax { .. })
    }

    pub fn is_semantic(&self) -> bool {
        matches!(self, ManifestError::Semantic { .. })
    }
}
