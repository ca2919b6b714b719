//! rowscout CLI: automate a paginated web table from the command line
//!
//! ## Usage
//!
//! ```bash
//! rowscout validate --config rowscout.yaml --client jvg --table-id 25704
//! rowscout find --client jvg --field Kennzeichen --value "A-BC 123"
//! rowscout upload --client jvg --field Gutachten --search-field Kennzeichen \
//!     --value "A-BC 123" --file report.pdf
//! rowscout check-parts --client jvg --search-field Kennzeichen --value "A-BC 123"
//! ```

use clap::Parser;
use rowscout_cli::{handlers, logging, Cli, CliConfig, CliResult, Commands, Verbosity};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_reported() => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init(&config);

    match cli.command {
        Commands::Validate(args) => handlers::execute_validate(&config, &args),
        #[cfg(feature = "browser")]
        Commands::Upload(args) => handlers::execute_upload(&config, &args),
        #[cfg(feature = "browser")]
        Commands::Find(args) => handlers::execute_find(&config, &args),
        #[cfg(feature = "browser")]
        Commands::Parts(args) => handlers::execute_parts(&config, &args),
        #[cfg(feature = "browser")]
        Commands::CheckParts(args) => handlers::execute_check_parts(&config, &args),
        #[cfg(not(feature = "browser"))]
        Commands::Upload(_) | Commands::Find(_) | Commands::Parts(_) | Commands::CheckParts(_) => {
            Err(rowscout_cli::CliError::feature_disabled("browser"))
        }
        #[cfg(feature = "http")]
        Commands::Probe(args) => handlers::execute_probe(&config, &args),
        #[cfg(not(feature = "http"))]
        Commands::Probe(_) => Err(rowscout_cli::CliError::feature_disabled("http")),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
        .with_log_json(cli.log_json)
}
