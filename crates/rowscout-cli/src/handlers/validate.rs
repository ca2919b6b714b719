//! Validate command handler

use rowscout::config::{self, ClientConfig, TimeoutSettings};
use serde::Serialize;

use crate::commands::{ConfigArgs, ValidateArgs};
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::Reporter;

/// What a resolved client configuration contains
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidateSummary {
    /// Client key
    pub client: String,
    /// Entry URL
    pub base_url: String,
    /// Logout URL
    pub logout_url: String,
    /// Display names with a field attribute
    pub fields: Vec<String>,
    /// Number of selectors
    pub locators: usize,
    /// Wait budgets
    pub timeouts: TimeoutSettings,
}

/// Summarize a resolved configuration
#[must_use]
pub fn summarize(client: &str, config: &ClientConfig) -> ValidateSummary {
    ValidateSummary {
        client: client.to_string(),
        base_url: config.base_url.clone(),
        logout_url: config.logout_url.clone(),
        fields: config.field_attributes.keys().cloned().collect(),
        locators: config.locators().len(),
        timeouts: config.timeouts,
    }
}

/// Load and resolve the configuration named by `args`
pub fn load_client(args: &ConfigArgs) -> CliResult<ClientConfig> {
    Ok(config::load(&args.config, &args.client, &args.tokens())?)
}

/// Execute the validate command
pub fn execute_validate(cli: &CliConfig, args: &ValidateArgs) -> CliResult<()> {
    let resolved = load_client(&args.config)?;
    let summary = summarize(&args.config.client, &resolved);
    Reporter::new(cli).emit(
        &summary,
        true,
        &format!(
            "client '{}' resolved with {} selectors",
            summary.client, summary.locators
        ),
    )
}
