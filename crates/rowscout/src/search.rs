//! Pagination and row search.
//!
//! [`TableView`] wraps the driver, the resolved configuration and a waiter,
//! and exposes the table helpers (page count, page switching, page size) and
//! [`TableView::find_row`], which turns a `(field, value)` request into a
//! [`RowDescriptor`].
//!
//! Two modes are supported:
//!
//! - [`SearchMode::ScanAllPages`] walks pages `1..=P` and scans the rows of
//!   each one. A row matches when its text contains the value; a row that
//!   cannot be read is logged and skipped. The column of the requested field
//!   is resolved once, on the second row of a page (the first when a page
//!   has a single row).
//! - [`SearchMode::Filtered`] drives the in-app search control with the
//!   "equals" operator and reads the first result row.
//!
//! A value that is not in the table is `Ok(None)`, never an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::driver::{Driver, ElementHandle};
use crate::locator::{find_first, require};
use crate::result::{ScoutError, ScoutResult};
use crate::wait::Waiter;

// =============================================================================
// ROW DESCRIPTOR
// =============================================================================

/// Position of a located row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDescriptor {
    /// 0-based index of the row on its page
    pub row_index: usize,
    /// Text of the row's id cell (empty when the table has none)
    pub id: String,
    /// Text of the searched field in this row
    pub primary_value: String,
    /// 0-based column of the searched field; `None` until determined
    #[serde(with = "field_index_sentinel")]
    pub field_index: Option<usize>,
    /// Rows per page when the row was found
    pub page_size: usize,
    /// 1-based page number
    pub page: usize,
}

/// `None` is written as `-1`
mod field_index_sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(index) => serializer.serialize_u64(*index as u64),
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Ok(usize::try_from(raw).ok())
    }
}

// =============================================================================
// SEARCH MODE
// =============================================================================

/// How [`TableView::find_row`] looks for a value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Walk every page and scan row text
    #[default]
    ScanAllPages,
    /// Use the in-app column filter
    Filtered,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ScanAllPages => "scan",
            Self::Filtered => "filter",
        })
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scan" | "scan_all_pages" => Ok(Self::ScanAllPages),
            "filter" | "filtered" => Ok(Self::Filtered),
            other => Err(format!("unknown search mode '{other}' (expected scan or filter)")),
        }
    }
}

// =============================================================================
// TABLE VIEW
// =============================================================================

/// The paginated table of one session
#[derive(Debug)]
pub struct TableView<'a, D: Driver + ?Sized> {
    driver: &'a D,
    config: &'a ClientConfig,
    waiter: Waiter<'a, D>,
}

impl<'a, D: Driver + ?Sized> TableView<'a, D> {
    /// Bind a view to a driver and resolved configuration
    #[must_use]
    pub const fn new(driver: &'a D, config: &'a ClientConfig) -> Self {
        Self {
            driver,
            config,
            waiter: Waiter::new(driver, config.wait_options()),
        }
    }

    /// Driver behind the view
    #[must_use]
    pub const fn driver(&self) -> &'a D {
        self.driver
    }

    /// Resolved configuration
    #[must_use]
    pub const fn config(&self) -> &'a ClientConfig {
        self.config
    }

    /// Waiter using the session timeouts
    #[must_use]
    pub const fn waiter(&self) -> &Waiter<'a, D> {
        &self.waiter
    }

    /// Wait for a reload to settle.
    ///
    /// The load indicator may flash faster than a poll, so its appearance is
    /// only looked for briefly. Returns `true` when rows are shown and
    /// `false` for the empty state.
    pub async fn wait_for_table(&self) -> ScoutResult<bool> {
        let table = &self.config.table;
        let flashed = self
            .waiter
            .appears_within(&table.load_indicator, self.config.timeouts.indicator_appear_ms)
            .await?;
        if flashed {
            self.waiter.await_invisibility(&table.load_indicator).await?;
        }
        let index = self
            .waiter
            .await_first_of(&[table.rows.clone(), table.no_results.clone()])
            .await?;
        debug!(has_rows = index == 0, "table settled");
        Ok(index == 0)
    }

    /// Number of pages the table reports
    pub async fn page_count(&self) -> ScoutResult<usize> {
        let element = require(self.driver, &self.config.table.page_count, None).await?;
        let text = self.driver.read_text(&element).await?;
        parse_last_number(&text).ok_or(ScoutError::UnexpectedContent {
            what: "page count".to_string(),
            content: text,
        })
    }

    /// Page shown in the page input
    pub async fn current_page(&self) -> ScoutResult<usize> {
        let input = require(self.driver, &self.config.table.page_input, None).await?;
        let value = self
            .driver
            .read_attribute(&input, "value")
            .await?
            .unwrap_or_default();
        value
            .trim()
            .parse()
            .map_err(|_| ScoutError::UnexpectedContent {
                what: "page input".to_string(),
                content: value,
            })
    }

    /// Jump to `page` through the page input and wait for the reload
    pub async fn set_page(&self, page: usize) -> ScoutResult<()> {
        let input = require(self.driver, &self.config.table.page_input, None).await?;
        self.driver.type_text(&input, &page.to_string(), true).await?;
        self.wait_for_table().await?;
        debug!(page, "page set");
        Ok(())
    }

    /// Advance one page and wait for the reload
    pub async fn next_page(&self) -> ScoutResult<()> {
        let next = require(self.driver, &self.config.table.next_page, None).await?;
        self.driver.click(&next).await?;
        self.wait_for_table().await?;
        Ok(())
    }

    /// Rows per page
    pub async fn page_size(&self) -> ScoutResult<usize> {
        let select = require(self.driver, &self.config.table.page_size, None).await?;
        let value = self.driver.get_select(&select).await?;
        value
            .trim()
            .parse()
            .map_err(|_| ScoutError::UnexpectedContent {
                what: "page size".to_string(),
                content: value,
            })
    }

    /// Change rows per page and wait for the reload
    pub async fn set_page_size(&self, size: usize) -> ScoutResult<()> {
        let select = require(self.driver, &self.config.table.page_size, None).await?;
        self.driver.set_select(&select, &size.to_string()).await?;
        self.wait_for_table().await?;
        Ok(())
    }

    /// Rows currently shown
    pub async fn rows(&self) -> ScoutResult<Vec<ElementHandle>> {
        self.driver.find_all(&self.config.table.rows, None).await
    }

    /// Locate `(field, value)`
    pub async fn find_row(
        &self,
        field: &str,
        value: &str,
        mode: SearchMode,
    ) -> ScoutResult<Option<RowDescriptor>> {
        let attribute = self.config.field_attribute(field)?;
        info!(field, value, %mode, "searching row");
        let found = match mode {
            SearchMode::ScanAllPages => self.scan_all_pages(attribute, value).await?,
            SearchMode::Filtered => self.filtered(field, attribute, value).await?,
        };
        match &found {
            Some(row) => info!(page = row.page, row_index = row.row_index, "row found"),
            None => info!(field, value, "row not found"),
        }
        Ok(found)
    }

    async fn scan_all_pages(
        &self,
        attribute: &str,
        value: &str,
    ) -> ScoutResult<Option<RowDescriptor>> {
        let pages = self.page_count().await?.max(1);
        if pages > 1 && self.current_page().await? != 1 {
            self.set_page(1).await?;
        }
        let page_size = self.page_size().await?;
        let mut field_index = None;

        for page in 1..=pages {
            let rows = self.rows().await?;
            debug!(page, rows = rows.len(), "scanning page");

            if field_index.is_none() {
                let sample = if rows.len() > 1 { rows.get(1) } else { rows.first() };
                if let Some(row) = sample {
                    field_index = self
                        .resolve_field_index(row, attribute)
                        .await
                        .unwrap_or_else(|e| {
                            warn!(page, error = %e, "field index lookup failed");
                            None
                        });
                }
            }

            for (row_index, row) in rows.iter().enumerate() {
                match self.match_row(row, attribute, value).await {
                    Ok(Some((id, primary_value))) => {
                        return Ok(Some(RowDescriptor {
                            row_index,
                            id,
                            primary_value,
                            field_index,
                            page_size,
                            page,
                        }));
                    }
                    Ok(None) => {}
                    Err(e) => warn!(page, row_index, error = %e, "row skipped"),
                }
            }

            if page < pages {
                self.next_page().await?;
            }
        }
        Ok(None)
    }

    /// `(id, primary value)` when the row text contains `value`; the primary
    /// value falls back to `value` when the row has no cell for `attribute`
    async fn match_row(
        &self,
        row: &ElementHandle,
        attribute: &str,
        value: &str,
    ) -> ScoutResult<Option<(String, String)>> {
        let text = self.driver.read_text(row).await?;
        if !text.contains(value) {
            return Ok(None);
        }
        let primary = self
            .field_text(row, attribute)
            .await?
            .unwrap_or_else(|| value.to_string());
        Ok(Some((self.row_id(row).await?, primary)))
    }

    async fn filtered(
        &self,
        field: &str,
        attribute: &str,
        value: &str,
    ) -> ScoutResult<Option<RowDescriptor>> {
        let search = &self.config.search;

        self.waiter.await_visibility(&search.column_menu).await?;
        let menu = require(self.driver, &search.column_menu, None).await?;
        self.driver.click(&menu).await?;

        let option_locator = search.column_option.bind_field(field);
        self.waiter.await_visibility(&option_locator).await?;
        let option = require(self.driver, &option_locator, None).await?;
        self.driver.click(&option).await?;

        let operator = require(self.driver, &search.operator_select, None).await?;
        self.driver.set_select(&operator, &search.equals_value).await?;

        let input = require(self.driver, &search.input, None).await?;
        self.driver.type_text(&input, value, true).await?;

        if !self.wait_for_table().await? {
            return Ok(None);
        }

        let Some(row) = self.rows().await?.into_iter().next() else {
            return Ok(None);
        };
        let primary = self.field_text(&row, attribute).await?;
        let text = match &primary {
            Some(text) => text.clone(),
            None => self.driver.read_text(&row).await?,
        };
        if !text.contains(value) {
            debug!(text = %text, "first filtered row does not carry the value");
            return Ok(None);
        }

        Ok(Some(RowDescriptor {
            row_index: 0,
            id: self.row_id(&row).await?,
            primary_value: primary.unwrap_or_else(|| value.to_string()),
            field_index: self.resolve_field_index(&row, attribute).await?,
            page_size: self.page_size().await?,
            page: 1,
        }))
    }

    /// Column whose stable attribute equals `attribute`; the first match wins
    async fn resolve_field_index(
        &self,
        row: &ElementHandle,
        attribute: &str,
    ) -> ScoutResult<Option<usize>> {
        let table = &self.config.table;
        let cells = self.driver.find_all(&table.cells, Some(row)).await?;
        for (index, cell) in cells.iter().enumerate() {
            let attr = self.driver.read_attribute(cell, &table.cell_attribute).await?;
            if attr.as_deref() == Some(attribute) {
                debug!(field_index = index, attribute, "field column resolved");
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    async fn field_text(&self, row: &ElementHandle, attribute: &str) -> ScoutResult<Option<String>> {
        let locator = self.config.table.field_cell.bind_field(attribute);
        match find_first(self.driver, &locator, Some(row)).await? {
            Some(cell) => Ok(Some(self.driver.read_text(&cell).await?.trim().to_string())),
            None => Ok(None),
        }
    }

    async fn row_id(&self, row: &ElementHandle) -> ScoutResult<String> {
        match find_first(self.driver, &self.config.table.row_id, Some(row)).await? {
            Some(cell) => Ok(self.driver.read_text(&cell).await?.trim().to_string()),
            None => Ok(String::new()),
        }
    }

    /// Fresh handle for a previously found row.
    ///
    /// Switches to the row's page when needed. When the row at `row_index`
    /// no longer carries the recorded id, the page is searched for the id.
    pub async fn locate(&self, row: &RowDescriptor) -> ScoutResult<ElementHandle> {
        if self.page_count().await? > 1 && self.current_page().await? != row.page {
            self.set_page(row.page).await?;
        }
        let rows = self.rows().await?;
        if let Some(handle) = rows.get(row.row_index) {
            if row.id.is_empty() || self.row_id(handle).await? == row.id {
                return Ok(handle.clone());
            }
        }
        for handle in &rows {
            if !row.id.is_empty() && self.row_id(handle).await? == row.id {
                debug!(id = %row.id, "row moved on its page");
                return Ok(handle.clone());
            }
        }
        Err(ScoutError::ElementNotFound {
            locator: format!(
                "row {} on page {} (id '{}')",
                row.row_index, row.page, row.id
            ),
        })
    }
}

/// Last run of ASCII digits in `text` ("Seite 1 von 12" -> 12)
fn parse_last_number(text: &str) -> Option<usize> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .last()
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{fast_sample_config, MockTargetSystem, TableFixture};

    fn plates(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("P-{i:03}")).collect()
    }

    async fn opened(fixture: TableFixture) -> (MockTargetSystem, ClientConfig) {
        let config = fast_sample_config().unwrap();
        let mock = MockTargetSystem::new(&config, fixture).with_table_open();
        (mock, config)
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_last_number() {
            assert_eq!(parse_last_number("Seite 1 von 12"), Some(12));
            assert_eq!(parse_last_number("3"), Some(3));
            assert_eq!(parse_last_number("von"), None);
        }

        #[test]
        fn test_search_mode_from_str() {
            assert_eq!("scan".parse::<SearchMode>().unwrap(), SearchMode::ScanAllPages);
            assert_eq!("filter".parse::<SearchMode>().unwrap(), SearchMode::Filtered);
            assert!("fuzzy".parse::<SearchMode>().is_err());
        }
    }

    mod descriptor_tests {
        use super::*;

        #[test]
        fn test_undetermined_field_index_serializes_as_minus_one() {
            let row = RowDescriptor {
                row_index: 0,
                id: "7".to_string(),
                primary_value: "x".to_string(),
                field_index: None,
                page_size: 10,
                page: 1,
            };
            let json = serde_json::to_value(&row).unwrap();
            assert_eq!(json["field_index"], -1);
            let back: RowDescriptor = serde_json::from_value(json).unwrap();
            assert_eq!(back.field_index, None);
        }

        #[test]
        fn test_field_index_serializes_as_number() {
            let json = serde_json::json!({
                "row_index": 4, "id": "1", "primary_value": "v",
                "field_index": 2, "page_size": 5, "page": 2
            });
            let row: RowDescriptor = serde_json::from_value(json).unwrap();
            assert_eq!(row.field_index, Some(2));
        }
    }

    mod table_tests {
        use super::*;

        #[tokio::test]
        async fn test_page_helpers() {
            let (mock, config) = opened(TableFixture::plates(&plates(23), 10)).await;
            let table = TableView::new(&mock, &config);
            assert_eq!(table.page_count().await.unwrap(), 3);
            assert_eq!(table.current_page().await.unwrap(), 1);
            assert_eq!(table.page_size().await.unwrap(), 10);
            table.next_page().await.unwrap();
            assert_eq!(table.current_page().await.unwrap(), 2);
            table.set_page(3).await.unwrap();
            assert_eq!(table.rows().await.unwrap().len(), 3);
            table.set_page_size(25).await.unwrap();
            assert_eq!(table.page_count().await.unwrap(), 1);
        }

        #[tokio::test]
        async fn test_scan_finds_match_on_later_page() {
            let (mock, config) = opened(TableFixture::plates(&plates(23), 10)).await;
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "P-014", SearchMode::ScanAllPages)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(row.page, 2);
            assert_eq!(row.row_index, 4);
            assert_eq!(row.field_index, Some(1));
            assert_eq!(row.primary_value, "P-014");
            assert_eq!(row.id, "15");
        }

        #[tokio::test]
        async fn test_scan_matches_value_outside_field_cell() {
            let (mock, config) = opened(TableFixture::plates(&plates(13), 5)).await;
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "Kunde 10", SearchMode::ScanAllPages)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(row.page, 2);
            assert_eq!(row.row_index, 4);
            assert_eq!(row.id, "10");
            assert_eq!(row.primary_value, "P-009");
        }

        #[tokio::test]
        async fn test_scan_skips_unreadable_row() {
            let (mock, config) = opened(TableFixture::plates(&plates(13), 5)).await;
            mock.stale_once("2");
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "P-009", SearchMode::ScanAllPages)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(row.page, 2);
            assert_eq!(row.row_index, 4);
            assert_eq!(row.id, "10");
        }

        #[tokio::test]
        async fn test_scan_skipped_row_is_not_a_match() {
            let (mock, config) = opened(TableFixture::plates(&plates(13), 5)).await;
            mock.stale_once("3");
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "P-002", SearchMode::ScanAllPages)
                .await
                .unwrap();
            assert!(row.is_none());
            assert_eq!(mock.pages_viewed(), vec![1, 2, 3]);
        }

        #[tokio::test]
        async fn test_scan_visits_exactly_all_pages_when_absent() {
            let (mock, config) = opened(TableFixture::plates(&plates(23), 10)).await;
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "Z-999", SearchMode::ScanAllPages)
                .await
                .unwrap();
            assert!(row.is_none());
            assert_eq!(mock.pages_viewed(), vec![1, 2, 3]);
        }

        #[tokio::test]
        async fn test_scan_is_idempotent() {
            let (mock, config) = opened(TableFixture::plates(&plates(23), 10)).await;
            let table = TableView::new(&mock, &config);
            let first = table
                .find_row("Kennzeichen", "P-021", SearchMode::ScanAllPages)
                .await
                .unwrap();
            let second = table
                .find_row("Kennzeichen", "P-021", SearchMode::ScanAllPages)
                .await
                .unwrap();
            assert_eq!(first, second);
            assert_eq!(first.unwrap().page, 3);
        }

        #[tokio::test]
        async fn test_unknown_field_is_config_error() {
            let (mock, config) = opened(TableFixture::plates(&plates(3), 10)).await;
            let table = TableView::new(&mock, &config);
            let err = table
                .find_row("Farbe", "rot", SearchMode::ScanAllPages)
                .await
                .unwrap_err();
            assert!(matches!(err, ScoutError::Config(_)));
        }

        #[tokio::test]
        async fn test_filtered_search() {
            let (mock, config) = opened(TableFixture::plates(&plates(23), 10)).await;
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "P-017", SearchMode::Filtered)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(row.page, 1);
            assert_eq!(row.row_index, 0);
            assert_eq!(row.id, "18");
        }

        #[tokio::test]
        async fn test_filtered_search_empty_state() {
            let (mock, config) = opened(TableFixture::plates(&plates(23), 10)).await;
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "nope", SearchMode::Filtered)
                .await
                .unwrap();
            assert!(row.is_none());
        }

        #[tokio::test]
        async fn test_locate_switches_page() {
            let (mock, config) = opened(TableFixture::plates(&plates(23), 10)).await;
            let table = TableView::new(&mock, &config);
            let row = table
                .find_row("Kennzeichen", "P-004", SearchMode::ScanAllPages)
                .await
                .unwrap()
                .unwrap();
            table.set_page(3).await.unwrap();
            let handle = table.locate(&row).await.unwrap();
            assert_eq!(table.current_page().await.unwrap(), 1);
            assert!(mock.read_text(&handle).await.unwrap().contains("P-004"));
        }
    }
}
