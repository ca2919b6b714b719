//! Probe command handler

use std::time::Duration;

use crate::commands::ProbeArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;

/// Execute the probe command
pub fn execute_probe(cli: &CliConfig, args: &ProbeArgs) -> CliResult<()> {
    if args.timeout == 0 {
        return Err(CliError::invalid_argument("timeout must be at least 1 second"));
    }
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::config(format!("Failed to create runtime: {e}")))?;
    let report = runtime.block_on(rowscout::probe::probe(
        &args.url,
        Duration::from_secs(args.timeout),
    ))?;
    Reporter::new(cli).emit(
        &report,
        report.class.is_success(),
        &format!("{} answered {} ({})", report.url, report.status, report.class),
    )
}
