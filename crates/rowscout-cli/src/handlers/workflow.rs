//! Browser-backed workflow handlers
//!
//! Each handler launches Chromium in a fresh profile, runs one flow and
//! prints its report. Ctrl-C drops the running flow, which closes the
//! browser and removes the profile directory.

use rowscout::{
    check_parts_flow, find_flow, parts_flow, upload_flow, CheckPartsRequest, ChromiumDriver,
    Credentials, FindRequest, PartsRequest, Session, UploadRequest,
};
use std::future::Future;
use tracing::warn;

use super::validate::load_client;
use crate::commands::{CheckPartsArgs, FindArgs, PartsArgs, SessionArgs, UploadArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::config(format!("Failed to create runtime: {e}")))
}

/// Launch a session and run `flow` on it until it finishes or Ctrl-C
fn execute<R, F, Fut>(args: &SessionArgs, flow: F) -> CliResult<R>
where
    F: FnOnce(Session<ChromiumDriver>) -> Fut,
    Fut: Future<Output = R>,
{
    let config = load_client(&args.config)?;
    let credentials = Credentials::new(args.username.clone(), args.password.clone());
    let options = args.browser_options();

    runtime()?.block_on(async move {
        let session = Session::launch(config, credentials, &options).await?;
        tokio::select! {
            report = flow(session) => Ok(report),
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, closing the browser");
                Err(CliError::Interrupted)
            }
        }
    })
}

/// Execute the upload command
pub fn execute_upload(cli: &CliConfig, args: &UploadArgs) -> CliResult<()> {
    if !args.file.is_file() {
        return Err(CliError::invalid_argument(format!(
            "{} is not a file",
            args.file.display()
        )));
    }
    let request = UploadRequest {
        field: args.field.clone(),
        search_field: args.search_field.clone(),
        search_value: args.value.clone(),
        path: args.file.clone(),
        mode: args.mode.into(),
    };
    let report = execute(&args.session, move |session| upload_flow(session, request))?;
    Reporter::new(cli).emit(&report, report.outcome.is_success(), &report.message)
}

/// Execute the find command
pub fn execute_find(cli: &CliConfig, args: &FindArgs) -> CliResult<()> {
    let request = FindRequest {
        field: args.field.clone(),
        value: args.value.clone(),
        mode: args.mode.into(),
    };
    let report = execute(&args.session, move |session| find_flow(session, request))?;
    Reporter::new(cli).emit(&report, report.row.is_some(), &report.message)
}

/// Execute the parts command
pub fn execute_parts(cli: &CliConfig, args: &PartsArgs) -> CliResult<()> {
    let request = PartsRequest {
        search_field: args.search_field.clone(),
        search_value: args.value.clone(),
        mode: args.mode.into(),
    };
    let report = execute(&args.session, move |session| parts_flow(session, request))?;
    Reporter::new(cli).emit(&report, report.parts.is_some(), &report.message)
}

/// Execute the check-parts command
pub fn execute_check_parts(cli: &CliConfig, args: &CheckPartsArgs) -> CliResult<()> {
    let request = CheckPartsRequest {
        search_field: args.search_field.clone(),
        search_value: args.value.clone(),
        positions: args.positions.iter().cloned().collect(),
        mode: args.mode.into(),
    };
    let report = execute(&args.session, move |session| {
        check_parts_flow(session, request)
    })?;
    Reporter::new(cli).emit(&report, !report.parts.is_empty(), &report.message)
}
