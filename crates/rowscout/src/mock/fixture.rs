//! Table and parts data served by [`super::MockTargetSystem`].

use crate::config::{from_yaml_str, ClientConfig, TimeoutSettings, Tokens};
use crate::result::ScoutResult;

/// Sample configuration shipped with the crate
pub const SAMPLE_CONFIG: &str = include_str!("../../fixtures/sample_config.yaml");

/// Client key used in [`SAMPLE_CONFIG`]
pub const SAMPLE_CLIENT: &str = "jvg";

/// Alert shown when an upload is refused
pub const CONFLICT_ALERT: &str = "Upload nicht möglich: Datei existiert bereits";

/// Alert shown when an upload is accepted
pub const UPLOAD_ALERT: &str = "Die Datei wird hochgeladen";

/// Session tokens matching [`SAMPLE_CONFIG`]
#[must_use]
pub fn sample_tokens() -> Tokens {
    Tokens::session("25704", "Auftragsplanung", "311")
}

/// [`SAMPLE_CONFIG`] resolved with millisecond timeouts
pub fn fast_sample_config() -> ScoutResult<ClientConfig> {
    let mut config = from_yaml_str(SAMPLE_CONFIG, SAMPLE_CLIENT, &sample_tokens())?;
    config.timeouts = TimeoutSettings {
        default_ms: 1_000,
        poll_interval_ms: 1,
        indicator_appear_ms: 15,
        alert_ms: 15,
    };
    Ok(config)
}

/// One position of the parts tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartFixture {
    /// Stable id
    pub id: String,
    /// Display name
    pub name: String,
    /// Price text, decimal comma
    pub price: String,
    /// Initial checkbox state
    pub checked: bool,
    /// Row renders without a checkbox
    pub broken: bool,
}

impl PartFixture {
    /// Unchecked position
    #[must_use]
    pub fn new(id: &str, name: &str, price: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price: price.to_string(),
            checked: false,
            broken: false,
        }
    }

    /// Start checked
    #[must_use]
    pub const fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    /// Render without a checkbox
    #[must_use]
    pub const fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

/// Content and behavior of the simulated table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFixture {
    /// Cell attribute value of every column; a column named `id` holds row ids
    pub columns: Vec<String>,
    /// Cell texts, one vector per row
    pub rows: Vec<Vec<String>>,
    /// Initial rows per page
    pub page_size: usize,
    /// Polls for which load and upload indicators stay visible
    pub latency: u32,
    /// Accepted username and password; `None` accepts anything
    pub credentials: Option<(String, String)>,
    /// Alert shown after an accepted upload; `None` shows nothing
    pub upload_alert: Option<String>,
    /// Parts tab content
    pub parts: Vec<PartFixture>,
}

impl TableFixture {
    /// Table with explicit columns and rows
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>, page_size: usize) -> Self {
        Self {
            columns,
            rows,
            page_size: page_size.max(1),
            latency: 2,
            credentials: None,
            upload_alert: Some(UPLOAD_ALERT.to_string()),
            parts: Vec::new(),
        }
    }

    /// Table keyed by plate number, matching the sample field map.
    ///
    /// Row `i` has id `i + 1`.
    #[must_use]
    pub fn plates(plates: &[String], page_size: usize) -> Self {
        let columns = ["id", "fld_plate", "fld_customer", "fld_report"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let rows = plates
            .iter()
            .enumerate()
            .map(|(i, plate)| {
                vec![
                    (i + 1).to_string(),
                    plate.clone(),
                    format!("Kunde {}", i + 1),
                    String::new(),
                ]
            })
            .collect();
        Self::new(columns, rows, page_size)
    }

    /// Set indicator latency
    #[must_use]
    pub const fn with_latency(mut self, polls: u32) -> Self {
        self.latency = polls;
        self
    }

    /// Only accept these credentials
    #[must_use]
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    /// Alert text after an accepted upload
    #[must_use]
    pub fn with_upload_alert(mut self, alert: Option<&str>) -> Self {
        self.upload_alert = alert.map(ToString::to_string);
        self
    }

    /// Parts tab content
    #[must_use]
    pub fn with_parts(mut self, parts: Vec<PartFixture>) -> Self {
        self.parts = parts;
        self
    }

    /// Column position of a cell attribute
    #[must_use]
    pub fn column(&self, attribute: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == attribute)
    }

    /// Sum of part prices formatted with a decimal comma
    #[must_use]
    pub fn parts_total(&self) -> Option<String> {
        if self.parts.is_empty() {
            return None;
        }
        let cents: i64 = self.parts.iter().filter_map(|p| parse_cents(&p.price)).sum();
        Some(format!("{},{:02}", cents / 100, cents % 100))
    }
}

fn parse_cents(price: &str) -> Option<i64> {
    let (euros, cents) = price.trim().split_once(',').unwrap_or((price.trim(), "0"));
    let euros: i64 = euros.replace('.', "").parse().ok()?;
    let cents: i64 = format!("{cents:0<2}").get(..2)?.parse().ok()?;
    Some(euros * 100 + cents)
}
