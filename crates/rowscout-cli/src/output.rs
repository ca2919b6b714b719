//! Result output: JSON on stdout, a one-line status on stderr

use console::{style, Term};
use serde::Serialize;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Render a report as pretty JSON
pub fn to_json<T: Serialize>(report: &T) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Status line printer
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    use_color: bool,
    quiet: bool,
}

impl Reporter {
    /// Reporter writing to stderr
    #[must_use]
    pub fn new(config: &CliConfig) -> Self {
        Self {
            term: Term::stderr(),
            use_color: config.color.should_color(),
            quiet: config.verbosity.is_quiet(),
        }
    }

    /// Print a success line
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure line, even in quiet mode
    pub fn failure(&self, message: &str) {
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print the report on stdout and a status line on stderr.
    ///
    /// A failed report is still printed in full, then returned as
    /// [`CliError::ReportFailed`] so the process exits non-zero.
    pub fn emit<T: Serialize>(&self, report: &T, ok: bool, message: &str) -> CliResult<()> {
        println!("{}", to_json(report)?);
        if ok {
            self.success(message);
            Ok(())
        } else {
            self.failure(message);
            Err(CliError::report_failed(message))
        }
    }
}
