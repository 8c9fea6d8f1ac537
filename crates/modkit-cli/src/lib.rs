//! Modkit inspector library - expose modules for testing
//!
//! The binary is a thin wrapper; header-file reading and the command
//! bodies live here so integration tests can drive them directly.

pub mod commands;
pub mod headers;

use clap::Args;

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Parse as the system module (lifts reserved-namespace checks)
    #[arg(long, global = true, conflicts_with = "adapter")]
    pub system: bool,

    /// Parse as a platform-adapter module
    #[arg(long, global = true, conflicts_with = "system")]
    pub adapter: bool,
}

impl GlobalOpts {
    pub fn module_kind(&self) -> modkit_manifest::ModuleKind {
        if self.system {
            modkit_manifest::ModuleKind::System
        } else if self.adapter {
            modkit_manifest::ModuleKind::Adapter
        } else {
            modkit_manifest::ModuleKind::Ordinary
        }
    }

    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "modkit=info,modkit_manifest=info",
            1 => "modkit=debug,modkit_manifest=debug",
            _ => "modkit=trace,modkit_manifest=trace",
        }
    }
}
