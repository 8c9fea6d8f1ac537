//! Subcommand bodies. Each returns the JSON it would print so tests
//! can assert on output without capturing stdout.

use crate::headers::read_headers;
use anyhow::{Context, Result};
use modkit_manifest::native::platform;
use modkit_manifest::{parse_header, ModuleDescriptor, ModuleKind, PlatformProps};
use std::path::Path;
use tracing::debug;

/// Parse a manifest file into a full descriptor and render it as JSON.
pub fn parse(path: &Path, kind: ModuleKind) -> Result<String> {
    let headers = read_headers(path)?;
    let descriptor = ModuleDescriptor::parse_as(&headers, kind, None)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    debug!(
        module = descriptor.symbolic_name().unwrap_or("<anonymous>"),
        "descriptor built"
    );
    Ok(serde_json::to_string_pretty(&descriptor)?)
}

/// Dump the raw clauses of a single header: paths, directives,
/// attributes and declared type tags.
pub fn clauses(path: &Path, header_name: &str) -> Result<String> {
    let headers = read_headers(path)?;
    let raw = headers.get(header_name).map_or("", String::as_str);
    let clauses = parse_header(raw)
        .with_context(|| format!("parsing header '{header_name}'"))?;
    Ok(serde_json::to_string_pretty(&clauses)?)
}

/// Platform description assembled from command-line flags.
#[derive(Debug, Default, Clone)]
pub struct PlatformFlags {
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub processor: Option<String>,
    pub language: Option<String>,
}

impl PlatformFlags {
    fn into_props(self) -> PlatformProps {
        let mut props = PlatformProps::new();
        if let Some(v) = self.os_name {
            props.insert(platform::OS_NAME.to_string(), v);
        }
        if let Some(v) = self.os_version {
            props.insert(platform::OS_VERSION.to_string(), v);
        }
        if let Some(v) = self.processor {
            props.insert(platform::PROCESSOR.to_string(), v);
        }
        if let Some(v) = self.language {
            props.insert(platform::LANGUAGE.to_string(), v);
        }
        props
    }
}

/// Run native library selection for the given platform and render the
/// outcome as JSON.
pub fn native(path: &Path, kind: ModuleKind, flags: PlatformFlags) -> Result<String> {
    let headers = read_headers(path)?;
    let descriptor = ModuleDescriptor::parse_as(&headers, kind, None)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    let selection = descriptor.select_native_libraries(&flags.into_props());
    Ok(serde_json::to_string_pretty(&selection)?)
}
