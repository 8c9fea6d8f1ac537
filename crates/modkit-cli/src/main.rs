use clap::{Parser, Subcommand};
use modkit::{
    commands::{self, PlatformFlags},
    GlobalOpts,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modkit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Module manifest inspector",
    long_about = "Parses module manifest headers and prints the resulting \
                  capabilities, requirements and native code selection as JSON."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a manifest file and print the full descriptor
    Parse {
        /// Path to a 'Name: value' manifest file
        file: PathBuf,
    },
    /// Print the parsed clauses of a single header
    Clauses {
        /// Path to a 'Name: value' manifest file
        file: PathBuf,
        /// Header name, e.g. Import-Package
        header: String,
    },
    /// Run native library selection against a platform description
    Native {
        /// Path to a 'Name: value' manifest file
        file: PathBuf,
        /// Platform operating system name, e.g. linux
        #[arg(long)]
        os_name: Option<String>,
        /// Platform operating system version, e.g. 6.1.0
        #[arg(long)]
        os_version: Option<String>,
        /// Platform processor, e.g. x86-64
        #[arg(long)]
        processor: Option<String>,
        /// Platform language code, e.g. en
        #[arg(long)]
        language: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.global.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let kind = cli.global.module_kind();
    let result = match cli.command {
        Commands::Parse { file } => commands::parse(&file, kind),
        Commands::Clauses { file, header } => commands::clauses(&file, &header),
        Commands::Native {
            file,
            os_name,
            os_version,
            processor,
            language,
        } => commands::native(
            &file,
            kind,
            PlatformFlags {
                os_name,
                os_version,
                processor,
                language,
            },
        ),
    };

    match result {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
