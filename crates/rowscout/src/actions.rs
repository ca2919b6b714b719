//! Action sequencing: uploads and checkbox toggling.
//!
//! A mutating action runs through fixed stages:
//!
//! ```text
//! LOCATE_ROW ──► TRIGGER ──► RELOCATE ──► APPLY ──► OBSERVE_OUTCOME
//! ```
//!
//! The trigger click re-renders the row, so every handle taken before it is
//! dropped and the row is located again. A failure in any stage is wrapped in
//! [`ScoutError::Action`] naming the stage. A conflict reported by the UI
//! ("file exists") is an [`UploadOutcome`], not an error.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, OutcomePhrase};
use crate::driver::{Driver, ElementHandle};
use crate::locator::{find_first, require};
use crate::result::{ScoutError, ScoutResult};
use crate::search::{RowDescriptor, TableView};

/// Script that checks `arguments[0]` and notifies listeners
pub const CHECK_SCRIPT: &str = "arguments[0].checked = true; \
     arguments[0].dispatchEvent(new Event('change', { bubbles: true }));";

// =============================================================================
// STAGES AND OUTCOMES
// =============================================================================

/// Stage of a mutating action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStage {
    /// Find the target row
    LocateRow,
    /// Click the control that opens the editor
    Trigger,
    /// Find the row again after the re-render
    Relocate,
    /// Apply the change
    Apply,
    /// Wait for and classify the UI response
    ObserveOutcome,
}

impl fmt::Display for ActionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LocateRow => "LOCATE_ROW",
            Self::Trigger => "TRIGGER",
            Self::Relocate => "RELOCATE",
            Self::Apply => "APPLY",
            Self::ObserveOutcome => "OBSERVE_OUTCOME",
        })
    }
}

/// Result of an upload as reported by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadOutcome {
    /// No alert was shown
    #[serde(rename = "success")]
    Success,
    /// The UI confirmed the upload
    #[serde(rename = "upload")]
    Upload,
    /// A file already exists in that cell
    #[serde(rename = "file exists")]
    FileExists,
    /// An alert with unrecognised text
    #[serde(rename = "unknown")]
    Unknown,
    /// The action did not complete
    #[serde(rename = "failed")]
    Failed,
}

impl UploadOutcome {
    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Upload => "upload",
            Self::FileExists => "file exists",
            Self::Unknown => "unknown",
            Self::Failed => "failed",
        }
    }

    /// Whether the file ended up in the cell
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Upload)
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify alert text with the configured phrase table.
///
/// Matching is a case-insensitive substring test; the first phrase that
/// matches wins. Empty text and text matching nothing are
/// [`UploadOutcome::Unknown`].
#[must_use]
pub fn classify_alert(text: &str, phrases: &[OutcomePhrase]) -> UploadOutcome {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return UploadOutcome::Unknown;
    }
    phrases
        .iter()
        .find(|p| text.contains(&p.phrase.to_lowercase()))
        .map_or(UploadOutcome::Unknown, |p| p.outcome)
}

/// State of one checkbox after [`toggle_checkboxes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    /// Was unchecked and is now checked
    #[serde(rename = "checked")]
    Checked,
    /// Was checked before
    #[serde(rename = "already checked")]
    AlreadyChecked,
}

/// One position of the parts tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartPosition {
    /// Stable position id
    pub id: String,
    /// Display name
    pub name: String,
    /// Price text as shown
    pub price: String,
    /// Whether the position is marked ok
    pub checked: bool,
}

/// Contents of the parts tab
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartsSummary {
    /// Positions in display order
    pub positions: Vec<PartPosition>,
    /// Total price text, when shown
    pub total: Option<String>,
}

fn staged<T>(stage: ActionStage, result: ScoutResult<T>) -> ScoutResult<T> {
    result.map_err(|source| ScoutError::Action {
        stage,
        source: Box::new(source),
    })
}

// =============================================================================
// UPLOAD
// =============================================================================

/// Upload `path` into `field` of `row`.
///
/// The close-dialog control is clicked afterwards whatever the outcome.
pub async fn perform_upload<D: Driver + ?Sized>(
    table: &TableView<'_, D>,
    path: &Path,
    row: &RowDescriptor,
    field: &str,
) -> ScoutResult<UploadOutcome> {
    let (driver, config) = (table.driver(), table.config());
    let attribute = config.field_attribute(field)?;
    info!(field, page = row.page, row_index = row.row_index, path = %path.display(), "uploading");

    let result = upload_stages(table, driver, config, path, row, attribute).await;
    dismiss_dialog(driver, config).await;

    match &result {
        Ok(outcome) => info!(%outcome, "upload finished"),
        Err(e) => warn!(error = %e, "upload failed"),
    }
    result
}

async fn upload_stages<D: Driver + ?Sized>(
    table: &TableView<'_, D>,
    driver: &D,
    config: &ClientConfig,
    path: &Path,
    row: &RowDescriptor,
    attribute: &str,
) -> ScoutResult<UploadOutcome> {
    let upload = &config.upload;
    let waiter = table.waiter();

    let handle = staged(ActionStage::LocateRow, table.locate(row).await)?;

    staged(ActionStage::Trigger, async {
        let trigger = require(driver, &upload.trigger.bind_field(attribute), Some(&handle)).await?;
        driver.click(&trigger).await
    }
    .await)?;

    let input = staged(ActionStage::Relocate, async {
        let handle = table.locate(row).await?;
        waiter.await_presence_in(&handle, &upload.file_input).await?;
        require(driver, &upload.file_input, Some(&handle)).await
    }
    .await)?;

    staged(ActionStage::Apply, async {
        if !path.is_file() {
            return Err(ScoutError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a file", path.display()),
            )));
        }
        driver.upload(&input, path).await
    }
    .await)?;

    staged(ActionStage::ObserveOutcome, async {
        waiter.await_invisibility(&upload.uploading_indicator).await?;
        if !waiter
            .appears_within(&upload.alert_overlay, config.timeouts.alert_ms)
            .await?
        {
            return Ok(UploadOutcome::Success);
        }
        let text = match find_first(driver, &upload.alert_text, None).await? {
            Some(element) => driver.read_text(&element).await?,
            None => String::new(),
        };
        debug!(alert = %text, "upload alert");
        Ok::<_, ScoutError>(classify_alert(&text, &config.outcome_phrases))
    }
    .await)
}

/// Click the close-dialog control when present; failures are only logged
async fn dismiss_dialog<D: Driver + ?Sized>(driver: &D, config: &ClientConfig) {
    match find_first(driver, &config.upload.close_dialog, None).await {
        Ok(Some(button)) => {
            if let Err(e) = driver.click(&button).await {
                debug!(error = %e, "close dialog click failed");
            }
        }
        Ok(None) => {}
        Err(e) => debug!(error = %e, "close dialog lookup failed"),
    }
}

// =============================================================================
// CHECKBOXES
// =============================================================================

struct PartRow {
    id: String,
    name: String,
}

async fn inspect_part<D: Driver + ?Sized>(
    driver: &D,
    config: &ClientConfig,
    row: &ElementHandle,
) -> ScoutResult<PartRow> {
    let parts = &config.parts;
    let id = driver
        .read_attribute(row, &parts.id_attribute)
        .await?
        .unwrap_or_default();
    let name = match find_first(driver, &parts.name_cell, Some(row)).await? {
        Some(cell) => driver.read_text(&cell).await?.trim().to_string(),
        None => String::new(),
    };
    Ok(PartRow { id, name })
}

async fn is_checked<D: Driver + ?Sized>(driver: &D, checkbox: &ElementHandle) -> ScoutResult<bool> {
    Ok(driver
        .read_attribute(checkbox, "checked")
        .await?
        .is_some_and(|v| v != "false"))
}

async fn toggle_one<D: Driver + ?Sized>(
    driver: &D,
    config: &ClientConfig,
    row: &ElementHandle,
) -> ScoutResult<CheckStatus> {
    let checkbox = require(driver, &config.parts.checkbox, Some(row)).await?;
    if is_checked(driver, &checkbox).await? {
        return Ok(CheckStatus::AlreadyChecked);
    }
    driver
        .run_script(CHECK_SCRIPT, std::slice::from_ref(&checkbox))
        .await?;
    if is_checked(driver, &checkbox).await? {
        Ok(CheckStatus::Checked)
    } else {
        Err(ScoutError::UnexpectedContent {
            what: "checkbox state".to_string(),
            content: "unchecked after toggle".to_string(),
        })
    }
}

/// Check every unchecked part position selected by `filter`.
///
/// `filter` holds position ids or display names; empty selects every row.
/// Rows that fail inspection are logged and left out of the result.
pub async fn toggle_checkboxes<D: Driver + ?Sized>(
    driver: &D,
    config: &ClientConfig,
    filter: &BTreeSet<String>,
) -> ScoutResult<BTreeMap<String, CheckStatus>> {
    let rows = driver.find_all(&config.parts.rows, None).await?;
    let mut statuses = BTreeMap::new();

    for (index, row) in rows.iter().enumerate() {
        let part = match inspect_part(driver, config, row).await {
            Ok(part) => part,
            Err(e) => {
                warn!(row_index = index, error = %e, "skipping part row");
                continue;
            }
        };
        if !filter.is_empty() && !filter.contains(&part.id) && !filter.contains(&part.name) {
            continue;
        }
        let key = if part.id.is_empty() { part.name } else { part.id };
        match toggle_one(driver, config, row).await {
            Ok(status) => {
                debug!(id = %key, ?status, "part checkbox");
                statuses.insert(key, status);
            }
            Err(e) => warn!(id = %key, error = %e, "skipping part row"),
        }
    }
    info!(toggled = statuses.len(), "checkboxes processed");
    Ok(statuses)
}

async fn read_position<D: Driver + ?Sized>(
    driver: &D,
    config: &ClientConfig,
    row: &ElementHandle,
) -> ScoutResult<PartPosition> {
    let parts = &config.parts;
    let PartRow { id, name } = inspect_part(driver, config, row).await?;
    let price = match find_first(driver, &parts.price_cell, Some(row)).await? {
        Some(cell) => driver.read_text(&cell).await?.trim().to_string(),
        None => String::new(),
    };
    let checked = match find_first(driver, &parts.checkbox, Some(row)).await? {
        Some(checkbox) => is_checked(driver, &checkbox).await?,
        None => false,
    };
    Ok(PartPosition {
        id,
        name,
        price,
        checked,
    })
}

/// Read every position of the parts tab; unreadable positions are skipped
pub async fn read_parts<D: Driver + ?Sized>(
    driver: &D,
    config: &ClientConfig,
) -> ScoutResult<PartsSummary> {
    let parts = &config.parts;
    let rows = driver.find_all(&parts.rows, None).await?;
    let mut positions = Vec::with_capacity(rows.len());

    for (row_index, row) in rows.iter().enumerate() {
        match read_position(driver, config, row).await {
            Ok(position) => positions.push(position),
            Err(e) => warn!(row_index, error = %e, "skipping part row"),
        }
    }

    let total = match find_first(driver, &parts.total_price, None).await? {
        Some(element) => Some(driver.read_text(&element).await?.trim().to_string()),
        None => None,
    };
    Ok(PartsSummary { positions, total })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::default_outcome_phrases;
    use crate::mock::{fast_sample_config, MockTargetSystem, PartFixture, TableFixture};
    use crate::search::SearchMode;

    mod classify_tests {
        use super::*;

        #[test]
        fn test_default_phrases() {
            let phrases = default_outcome_phrases();
            assert_eq!(
                classify_alert("Die Datei wird hochgeladen", &phrases),
                UploadOutcome::Upload
            );
            assert_eq!(
                classify_alert("Upload NICHT MÖGLICH: Datei existiert", &phrases),
                UploadOutcome::FileExists
            );
            assert_eq!(classify_alert("Server busy", &phrases), UploadOutcome::Unknown);
            assert_eq!(classify_alert("   ", &phrases), UploadOutcome::Unknown);
        }

        #[test]
        fn test_first_phrase_wins() {
            let phrases = default_outcome_phrases();
            assert_eq!(
                classify_alert("wird hochgeladen, nicht möglich", &phrases),
                UploadOutcome::Upload
            );
        }

        #[test]
        fn test_outcome_wire_names() {
            assert_eq!(
                serde_json::to_string(&UploadOutcome::FileExists).unwrap(),
                "\"file exists\""
            );
            assert_eq!(
                serde_json::to_string(&CheckStatus::AlreadyChecked).unwrap(),
                "\"already checked\""
            );
            assert_eq!(ActionStage::ObserveOutcome.to_string(), "OBSERVE_OUTCOME");
        }
    }

    mod upload_tests {
        use super::*;

        fn fixture() -> TableFixture {
            let plates: Vec<String> = (0..12).map(|i| format!("U-{i}")).collect();
            TableFixture::plates(&plates, 5)
        }

        #[tokio::test]
        async fn test_upload_success_announced() {
            let config = fast_sample_config().unwrap();
            let mock = MockTargetSystem::new(&config, fixture()).with_table_open();
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "U-7", SearchMode::ScanAllPages)
                .await
                .unwrap()
                .unwrap();
            let file = tempfile::NamedTempFile::new().unwrap();
            let outcome = perform_upload(&table, file.path(), &row, "Gutachten")
                .await
                .unwrap();
            assert_eq!(outcome, UploadOutcome::Upload);
            assert_eq!(mock.uploads().len(), 1);
            assert_eq!(mock.uploads()[0].0, "8");
            assert_eq!(mock.uploads()[0].1, "fld_report");
            assert!(!mock.dialog_open());
        }

        #[tokio::test]
        async fn test_second_upload_conflicts() {
            let config = fast_sample_config().unwrap();
            let mock = MockTargetSystem::new(&config, fixture()).with_table_open();
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "U-2", SearchMode::ScanAllPages)
                .await
                .unwrap()
                .unwrap();
            let file = tempfile::NamedTempFile::new().unwrap();
            let first = perform_upload(&table, file.path(), &row, "Gutachten")
                .await
                .unwrap();
            let second = perform_upload(&table, file.path(), &row, "Gutachten")
                .await
                .unwrap();
            assert_eq!(first, UploadOutcome::Upload);
            assert_eq!(second, UploadOutcome::FileExists);
            assert_eq!(mock.uploads().len(), 1);
        }

        #[tokio::test]
        async fn test_silent_upload_is_success() {
            let config = fast_sample_config().unwrap();
            let mock = MockTargetSystem::new(&config, fixture().with_upload_alert(None))
                .with_table_open();
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "U-0", SearchMode::ScanAllPages)
                .await
                .unwrap()
                .unwrap();
            let file = tempfile::NamedTempFile::new().unwrap();
            let outcome = perform_upload(&table, file.path(), &row, "Gutachten")
                .await
                .unwrap();
            assert_eq!(outcome, UploadOutcome::Success);
        }

        #[tokio::test]
        async fn test_missing_file_fails_in_apply_and_closes_dialog() {
            let config = fast_sample_config().unwrap();
            let mock = MockTargetSystem::new(&config, fixture()).with_table_open();
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "U-1", SearchMode::ScanAllPages)
                .await
                .unwrap()
                .unwrap();
            let err = perform_upload(
                &table,
                Path::new("/nonexistent/report.pdf"),
                &row,
                "Gutachten",
            )
            .await
            .unwrap_err();
            match err {
                ScoutError::Action { stage, .. } => assert_eq!(stage, ActionStage::Apply),
                other => panic!("expected action error, got {other:?}"),
            }
            assert!(!mock.dialog_open());
        }

        #[tokio::test]
        async fn test_missing_trigger_fails_in_trigger_stage() {
            let config = fast_sample_config().unwrap();
            let mock = MockTargetSystem::new(&config, fixture()).with_table_open();
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "U-1", SearchMode::ScanAllPages)
                .await
                .unwrap()
                .unwrap();
            mock.fail_lookups_of(&config.upload.trigger.bind_field("fld_report").selector);
            let file = tempfile::NamedTempFile::new().unwrap();
            let err = perform_upload(&table, file.path(), &row, "Gutachten")
                .await
                .unwrap_err();
            match err {
                ScoutError::Action { stage, .. } => assert_eq!(stage, ActionStage::Trigger),
                other => panic!("expected action error, got {other:?}"),
            }
        }
    }

    mod checkbox_tests {
        use super::*;

        fn parts() -> Vec<PartFixture> {
            vec![
                PartFixture::new("p1", "Stoßfänger", "120,00"),
                PartFixture::new("p2", "Scheinwerfer", "310,50").checked(),
                PartFixture::new("p3", "Kotflügel", "95,00"),
                PartFixture::new("p4", "Spiegel", "40,00").broken(),
            ]
        }

        async fn parts_open() -> (MockTargetSystem, ClientConfig) {
            let config = fast_sample_config().unwrap();
            let fixture = TableFixture::plates(&["A".to_string()], 10).with_parts(parts());
            let mock = MockTargetSystem::new(&config, fixture)
                .with_table_open()
                .with_parts_open();
            (mock, config)
        }

        #[tokio::test]
        async fn test_empty_filter_checks_all_and_is_idempotent() {
            let (mock, config) = parts_open().await;
            let first = toggle_checkboxes(&mock, &config, &BTreeSet::new())
                .await
                .unwrap();
            assert_eq!(first.get("p1"), Some(&CheckStatus::Checked));
            assert_eq!(first.get("p2"), Some(&CheckStatus::AlreadyChecked));
            assert_eq!(first.get("p3"), Some(&CheckStatus::Checked));
            assert!(!first.contains_key("p4"));

            let second = toggle_checkboxes(&mock, &config, &BTreeSet::new())
                .await
                .unwrap();
            assert!(second.values().all(|s| *s == CheckStatus::AlreadyChecked));
            assert_eq!(second.len(), 3);
            assert_eq!(mock.check_scripts_run(), 2);
        }

        #[tokio::test]
        async fn test_filter_by_id_or_name() {
            let (mock, config) = parts_open().await;
            let filter: BTreeSet<String> = ["p1".to_string(), "Kotflügel".to_string()].into();
            let result = toggle_checkboxes(&mock, &config, &filter).await.unwrap();
            assert_eq!(result.len(), 2);
            assert_eq!(result.get("p3"), Some(&CheckStatus::Checked));
        }

        #[tokio::test]
        async fn test_read_parts() {
            let (mock, config) = parts_open().await;
            let summary = read_parts(&mock, &config).await.unwrap();
            assert_eq!(summary.positions.len(), 4);
            assert_eq!(summary.positions[1].name, "Scheinwerfer");
            assert!(summary.positions[1].checked);
            assert!(!summary.positions[3].checked);
            assert_eq!(summary.total.as_deref(), Some("565,50"));
        }

        #[tokio::test]
        async fn test_read_parts_skips_unreadable_position() {
            let (mock, config) = parts_open().await;
            mock.stale_once("p2");
            let summary = read_parts(&mock, &config).await.unwrap();
            let ids: Vec<&str> = summary.positions.iter().map(|p| p.id.as_str()).collect();
            assert_eq!(ids, vec!["p1", "p3", "p4"]);
            assert_eq!(summary.total.as_deref(), Some("565,50"));

            let again = read_parts(&mock, &config).await.unwrap();
            assert_eq!(again.positions.len(), 4);
        }
    }
}
