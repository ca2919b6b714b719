//! End-to-end workflows.
//!
//! Each flow takes a freshly constructed [`Session`], logs in, navigates,
//! runs one core operation and always logs out and closes through
//! [`run_scoped`]. Flows never return errors: a failed login, a missing row
//! or a driver failure all become a report with a message, so the caller
//! can serialize the outcome as-is.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{info, info_span, warn, Instrument};

use crate::actions::{CheckStatus, PartsSummary, UploadOutcome};
use crate::driver::Driver;
use crate::result::ScoutResult;
use crate::search::{RowDescriptor, SearchMode};
use crate::session::{run_scoped, Session};

const LOGIN_FAILED: &str = "login failed";

fn not_found(field: &str, value: &str) -> String {
    format!("'{value}' not found in field '{field}'")
}

async fn open_and_login<D: Driver>(session: &Session<D>) -> ScoutResult<bool> {
    session.open().await?;
    Ok(session.login().await)
}

/// Quick access, orga list, row search, details and parts tab
async fn open_parts_of<D: Driver>(
    session: &Session<D>,
    field: &str,
    value: &str,
    mode: SearchMode,
) -> ScoutResult<Option<RowDescriptor>> {
    session.open_quick_access().await?;
    session.open_orga_list().await?;
    let Some(row) = session.find_row(field, value, mode).await? else {
        return Ok(None);
    };
    session.open_details(row.row_index).await?;
    session.open_parts().await?;
    Ok(Some(row))
}

// =============================================================================
// UPLOAD
// =============================================================================

/// Upload a file into one cell of the row matching a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Field that receives the file
    pub field: String,
    /// Field searched for the row
    pub search_field: String,
    /// Value searched for
    pub search_value: String,
    /// Local file to upload
    pub path: PathBuf,
    /// Search mode
    #[serde(default = "filtered")]
    pub mode: SearchMode,
}

const fn filtered() -> SearchMode {
    SearchMode::Filtered
}

/// Result of [`upload_flow`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    /// Human-readable summary
    pub message: String,
    /// Outcome reported by the UI
    pub outcome: UploadOutcome,
    /// Row the file went to
    pub row: Option<RowDescriptor>,
}

impl UploadReport {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            outcome: UploadOutcome::Failed,
            row: None,
        }
    }
}

/// Log in, open the table, find the row and upload the file
pub async fn upload_flow<D: Driver>(session: Session<D>, request: UploadRequest) -> UploadReport {
    let span = info_span!("upload_flow", field = %request.field, value = %request.search_value);
    let result = run_scoped(session, move |s| {
        Box::pin(async move {
            if !open_and_login(s).await? {
                return Ok(UploadReport::failed(LOGIN_FAILED));
            }
            s.open_navigation().await?;
            s.open_table().await?;
            let Some(row) = s
                .find_row(&request.search_field, &request.search_value, request.mode)
                .await?
            else {
                return Ok(UploadReport::failed(not_found(
                    &request.search_field,
                    &request.search_value,
                )));
            };
            let outcome = s.perform_upload(&request.path, &row, &request.field).await?;
            info!(%outcome, "upload flow finished");
            Ok(UploadReport {
                message: outcome.to_string(),
                outcome,
                row: Some(row),
            })
        })
    })
    .instrument(span)
    .await;

    result.unwrap_or_else(|e| {
        warn!(error = %e, "upload flow failed");
        UploadReport::failed(e.to_string())
    })
}

// =============================================================================
// FIND
// =============================================================================

/// Locate one row in the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindRequest {
    /// Field searched
    pub field: String,
    /// Value searched for
    pub value: String,
    /// Search mode
    #[serde(default)]
    pub mode: SearchMode,
}

/// Result of [`find_flow`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindReport {
    /// Human-readable summary
    pub message: String,
    /// Located row
    pub row: Option<RowDescriptor>,
}

/// Log in, open the table and locate a row
pub async fn find_flow<D: Driver>(session: Session<D>, request: FindRequest) -> FindReport {
    let span = info_span!("find_flow", field = %request.field, value = %request.value);
    let result = run_scoped(session, move |s| {
        Box::pin(async move {
            if !open_and_login(s).await? {
                return Ok(FindReport {
                    message: LOGIN_FAILED.to_string(),
                    row: None,
                });
            }
            s.open_navigation().await?;
            s.open_table().await?;
            let row = s.find_row(&request.field, &request.value, request.mode).await?;
            let message = match &row {
                Some(row) => format!("found on page {} row {}", row.page, row.row_index),
                None => not_found(&request.field, &request.value),
            };
            Ok(FindReport { message, row })
        })
    })
    .instrument(span)
    .await;

    result.unwrap_or_else(|e| {
        warn!(error = %e, "find flow failed");
        FindReport {
            message: e.to_string(),
            row: None,
        }
    })
}

// =============================================================================
// PARTS
// =============================================================================

/// Read the parts of the orga list entry matching a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartsRequest {
    /// Field searched
    pub search_field: String,
    /// Value searched for
    pub search_value: String,
    /// Search mode
    #[serde(default = "filtered")]
    pub mode: SearchMode,
}

/// Result of [`parts_flow`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartsReport {
    /// Human-readable summary
    pub message: String,
    /// Parts tab content
    pub parts: Option<PartsSummary>,
}

/// Log in, open the orga list entry and read its parts tab
pub async fn parts_flow<D: Driver>(session: Session<D>, request: PartsRequest) -> PartsReport {
    let span = info_span!("parts_flow", value = %request.search_value);
    let result = run_scoped(session, move |s| {
        Box::pin(async move {
            if !open_and_login(s).await? {
                return Ok(PartsReport {
                    message: LOGIN_FAILED.to_string(),
                    parts: None,
                });
            }
            let opened =
                open_parts_of(s, &request.search_field, &request.search_value, request.mode)
                    .await?;
            if opened.is_none() {
                return Ok(PartsReport {
                    message: not_found(&request.search_field, &request.search_value),
                    parts: None,
                });
            }
            let parts = s.read_parts().await?;
            Ok(PartsReport {
                message: format!("{} positions", parts.positions.len()),
                parts: Some(parts),
            })
        })
    })
    .instrument(span)
    .await;

    result.unwrap_or_else(|e| {
        warn!(error = %e, "parts flow failed");
        PartsReport {
            message: e.to_string(),
            parts: None,
        }
    })
}

/// Mark parts of the orga list entry matching a search as ok
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPartsRequest {
    /// Field searched
    pub search_field: String,
    /// Value searched for
    pub search_value: String,
    /// Position ids or names; empty checks every position
    #[serde(default)]
    pub positions: BTreeSet<String>,
    /// Search mode
    #[serde(default = "filtered")]
    pub mode: SearchMode,
}

/// Result of [`check_parts_flow`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    /// Human-readable summary
    pub message: String,
    /// Position id -> status
    pub parts: BTreeMap<String, CheckStatus>,
}

/// Log in, open the orga list entry and check its part boxes
pub async fn check_parts_flow<D: Driver>(
    session: Session<D>,
    request: CheckPartsRequest,
) -> CheckReport {
    let span = info_span!("check_parts_flow", value = %request.search_value);
    let result = run_scoped(session, move |s| {
        Box::pin(async move {
            if !open_and_login(s).await? {
                return Ok(CheckReport {
                    message: LOGIN_FAILED.to_string(),
                    parts: BTreeMap::new(),
                });
            }
            let opened =
                open_parts_of(s, &request.search_field, &request.search_value, request.mode)
                    .await?;
            if opened.is_none() {
                return Ok(CheckReport {
                    message: not_found(&request.search_field, &request.search_value),
                    parts: BTreeMap::new(),
                });
            }
            let parts = s.toggle_checkboxes(&request.positions).await?;
            let newly = parts
                .values()
                .filter(|status| **status == CheckStatus::Checked)
                .count();
            Ok(CheckReport {
                message: format!("{newly} of {} positions checked", parts.len()),
                parts,
            })
        })
    })
    .instrument(span)
    .await;

    result.unwrap_or_else(|e| {
        warn!(error = %e, "check parts flow failed");
        CheckReport {
            message: e.to_string(),
            parts: BTreeMap::new(),
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        assert_eq!(
            not_found("Kennzeichen", "A-BC 123"),
            "'A-BC 123' not found in field 'Kennzeichen'"
        );
    }

    #[test]
    fn test_request_defaults() {
        let request: UploadRequest = serde_json::from_value(serde_json::json!({
            "field": "Gutachten",
            "search_field": "Kennzeichen",
            "search_value": "A-BC 123",
            "path": "/tmp/report.pdf"
        }))
        .unwrap();
        assert_eq!(request.mode, SearchMode::Filtered);

        let request: CheckPartsRequest = serde_json::from_value(serde_json::json!({
            "search_field": "Kennzeichen",
            "search_value": "A-BC 123"
        }))
        .unwrap();
        assert!(request.positions.is_empty());
    }

    #[test]
    fn test_upload_report_wire_format() {
        let report = UploadReport::failed("login failed");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert!(json["row"].is_null());
    }
}
