//! Client configuration: loading, placeholder substitution and the typed tree.
//!
//! A configuration file maps client names to selector descriptions. Loading
//! one client is a pure pipeline:
//!
//! ```text
//! file ──► YAML document ──► client template ──► substitute tokens ──► check ──► ClientConfig
//! ```
//!
//! Substitution is an exact substring replace over every string leaf,
//! including occurrences inside unrelated words: a placeholder embedded in
//! `MY_TABLE_IDS` is replaced too. That is how selectors have always been
//! written for this system and is kept on purpose.
//!
//! [`Token::SearchField`] is the only per-call placeholder. It survives
//! loading and is bound with [`Locator::bind_field`] at the point of use;
//! any other placeholder left after substitution is a
//! [`ConfigError::UnresolvedToken`].

use serde::{Deserialize, Serialize};
use serde_yaml_ng::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::actions::UploadOutcome;
use crate::locator::Locator;
use crate::result::{ConfigError, ScoutResult};
use crate::wait::{WaitOptions, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};

// =============================================================================
// TOKENS
// =============================================================================

/// Placeholders understood by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Token {
    /// Numeric id of the table view
    TableId,
    /// Display name of the table in the navigation
    TableName,
    /// Id of the organisation list reached via quick access
    OrgaListId,
    /// Field attribute or display name, bound per call
    SearchField,
}

impl Token {
    /// Tokens that must be resolved when a session starts
    pub const SESSION: [Self; 3] = [Self::TableId, Self::TableName, Self::OrgaListId];

    /// Placeholder text as it appears in the file
    #[must_use]
    pub const fn placeholder(self) -> &'static str {
        match self {
            Self::TableId => "TABLE_ID",
            Self::TableName => "TABLE_NAME",
            Self::OrgaListId => "ORGA_LIST_ID",
            Self::SearchField => crate::locator::FIELD_PLACEHOLDER,
        }
    }

    /// Whether the token is bound per call instead of at load time
    #[must_use]
    pub const fn is_per_call(self) -> bool {
        matches!(self, Self::SearchField)
    }
}

/// Token values for one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    values: BTreeMap<Token, String>,
}

impl Tokens {
    /// Empty token set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All session tokens at once; empty strings are valid values
    #[must_use]
    pub fn session(
        table_id: impl Into<String>,
        table_name: impl Into<String>,
        orga_list_id: impl Into<String>,
    ) -> Self {
        Self::new()
            .with(Token::TableId, table_id)
            .with(Token::TableName, table_name)
            .with(Token::OrgaListId, orga_list_id)
    }

    /// Set one token
    #[must_use]
    pub fn with(mut self, token: Token, value: impl Into<String>) -> Self {
        self.values.insert(token, value.into());
        self
    }

    /// Value of one token
    #[must_use]
    pub fn get(&self, token: Token) -> Option<&str> {
        self.values.get(&token).map(String::as_str)
    }

    fn iter(&self) -> impl Iterator<Item = (Token, &str)> {
        self.values.iter().map(|(t, v)| (*t, v.as_str()))
    }
}

// =============================================================================
// SUBSTITUTION
// =============================================================================

/// Replace `placeholder` in every string leaf, returning a new tree.
///
/// Mapping keys are left alone; mapping values, sequence items, tagged
/// values and scalar strings are all rewritten.
#[must_use]
pub fn substitute(value: &Value, placeholder: &str, replacement: &str) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace(placeholder, replacement)),
        Value::Sequence(items) => Value::Sequence(
            items
                .iter()
                .map(|v| substitute(v, placeholder, replacement))
                .collect(),
        ),
        Value::Mapping(map) => Value::Mapping(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, placeholder, replacement)))
                .collect::<Mapping>(),
        ),
        Value::Tagged(tagged) => {
            let mut tagged = tagged.clone();
            tagged.value = substitute(&tagged.value, placeholder, replacement);
            Value::Tagged(tagged)
        }
        other => other.clone(),
    }
}

/// Apply every token in `tokens`, in token order
#[must_use]
pub fn substitute_all(value: &Value, tokens: &Tokens) -> Value {
    tokens.iter().fold(value.clone(), |tree, (token, replacement)| {
        substitute(&tree, token.placeholder(), replacement)
    })
}

/// First session placeholder still present in a string leaf
fn find_unresolved(value: &Value, path: &str) -> Option<(Token, String)> {
    match value {
        Value::String(s) => Token::SESSION
            .into_iter()
            .find(|t| s.contains(t.placeholder()))
            .map(|t| (t, path.to_string())),
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, v)| find_unresolved(v, &format!("{path}[{i}]"))),
        Value::Mapping(map) => map.iter().find_map(|(k, v)| {
            let key = k.as_str().map_or_else(|| format!("{k:?}"), str::to_string);
            let child = if path.is_empty() {
                key
            } else {
                format!("{path}.{key}")
            };
            find_unresolved(v, &child)
        }),
        Value::Tagged(tagged) => find_unresolved(&tagged.value, path),
        _ => None,
    }
}

// =============================================================================
// LOADING
// =============================================================================

/// Read and parse a configuration file
pub fn load_document(path: &Path) -> Result<Value, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::MissingFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_yaml_ng::from_str(&text).map_err(|e| ConfigError::Malformed {
        message: e.to_string(),
    })
}

/// Template for one client inside a parsed document
pub fn client_template<'a>(document: &'a Value, client: &str) -> Result<&'a Value, ConfigError> {
    document
        .get(client)
        .ok_or_else(|| ConfigError::MissingClient {
            client: client.to_string(),
        })
}

/// Substitute tokens into a client template and freeze it into a typed config
pub fn resolve(template: &Value, tokens: &Tokens) -> ScoutResult<ClientConfig> {
    let tree = substitute_all(template, tokens);
    if let Some((token, path)) = find_unresolved(&tree, "") {
        return Err(ConfigError::UnresolvedToken {
            token: token.placeholder().to_string(),
            path,
        }
        .into());
    }
    let config: ClientConfig =
        serde_yaml_ng::from_value(tree).map_err(|e| ConfigError::Malformed {
            message: e.to_string(),
        })?;
    config.validate()?;
    Ok(config)
}

/// Load one client from a configuration file
pub fn load(path: &Path, client: &str, tokens: &Tokens) -> ScoutResult<ClientConfig> {
    let document = load_document(path)?;
    let template = client_template(&document, client)?;
    resolve(template, tokens)
}

/// Load one client from YAML text
pub fn from_yaml_str(yaml: &str, client: &str, tokens: &Tokens) -> ScoutResult<ClientConfig> {
    let document: Value = serde_yaml_ng::from_str(yaml).map_err(|e| ConfigError::Malformed {
        message: e.to_string(),
    })?;
    let template = client_template(&document, client)?;
    resolve(template, tokens)
}

// =============================================================================
// TYPED TREE
// =============================================================================

/// Resolved, read-only configuration of one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Entry URL with the login form
    pub base_url: String,
    /// URL that ends the session server-side
    pub logout_url: String,
    /// Wait budgets
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    /// Login form
    pub login: LoginSelectors,
    /// Menus leading to the tables
    pub navigation: NavigationSelectors,
    /// Paginated table view
    pub table: TableSelectors,
    /// In-app search control
    pub search: SearchSelectors,
    /// File upload editor
    pub upload: UploadSelectors,
    /// Details view with the parts tab
    pub parts: PartsSelectors,
    /// Field display name -> stable cell attribute value
    pub field_attributes: BTreeMap<String, String>,
    /// Alert phrase -> upload outcome, first match wins
    #[serde(default = "default_outcome_phrases")]
    pub outcome_phrases: Vec<OutcomePhrase>,
}

/// Wait budgets in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimeoutSettings {
    /// Budget for every ordinary wait
    pub default_ms: u64,
    /// Poll interval for every wait
    pub poll_interval_ms: u64,
    /// How long to look for a load indicator that may never show
    pub indicator_appear_ms: u64,
    /// How long to look for an alert after an upload
    pub alert_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            default_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            indicator_appear_ms: 2_000,
            alert_ms: 3_000,
        }
    }
}

/// Login form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginSelectors {
    /// Username input
    pub username_field: Locator,
    /// Password input
    pub password_field: Locator,
    /// Login submit button
    pub submit_button: Locator,
    /// Element that only exists once logged in
    pub confirmation: Locator,
    /// Splash video that hides the UI after login
    pub preload_video: Locator,
}

/// Navigation menus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NavigationSelectors {
    /// Main menu toggle
    pub menu: Locator,
    /// Menu entry opening the configured table
    pub table_link: Locator,
    /// Quick access panel toggle
    pub quick_access: Locator,
    /// Orga list entry in the quick access panel
    pub orga_list: Locator,
}

/// Paginated table view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSelectors {
    /// Overlay shown while the table reloads
    pub load_indicator: Locator,
    /// Table container
    pub table_element: Locator,
    /// Data rows of the current page
    pub rows: Locator,
    /// Empty-state element shown instead of rows
    pub no_results: Locator,
    /// Cells of a row, scoped to the row
    pub cells: Locator,
    /// Attribute on each cell naming its column
    pub cell_attribute: String,
    /// Cell carrying the row id, scoped to the row
    pub row_id: Locator,
    /// Cell for one field; placeholder is the field attribute
    pub field_cell: Locator,
    /// Text holding the page count as its last number
    pub page_count: Locator,
    /// Current page number input
    pub page_input: Locator,
    /// Next page button
    pub next_page: Locator,
    /// Rows-per-page select
    pub page_size: Locator,
}

/// In-app search control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchSelectors {
    /// Button opening the column menu
    pub column_menu: Locator,
    /// Menu entry for one column; placeholder is the display name
    pub column_option: Locator,
    /// Comparison operator select
    pub operator_select: Locator,
    /// `<option>` value meaning "equals"
    #[serde(default = "default_equals_value")]
    pub equals_value: String,
    /// Search text input; the value is submitted with Enter
    pub input: Locator,
}

/// Upload editor and its overlays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadSelectors {
    /// Clickable part of a field cell; placeholder is the field attribute
    pub trigger: Locator,
    /// File input, scoped to the row after re-render
    pub file_input: Locator,
    /// Indicator shown while a file uploads
    pub uploading_indicator: Locator,
    /// Overlay that holds the outcome alert
    pub alert_overlay: Locator,
    /// Alert message text
    pub alert_text: Locator,
    /// Button closing the alert or the upload editor
    pub close_dialog: Locator,
}

/// Details view and parts tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartsSelectors {
    /// Details link, scoped to a table row
    pub details_button: Locator,
    /// Parts tab of the details view
    pub parts_tab: Locator,
    /// Position rows of the parts tab
    pub rows: Locator,
    /// Attribute on each position row holding its stable id
    pub id_attribute: String,
    /// Position name, scoped to the position row
    pub name_cell: Locator,
    /// Position price, scoped to the position row
    pub price_cell: Locator,
    /// Ok checkbox, scoped to the position row
    pub checkbox: Locator,
    /// Sum of all position prices
    pub total_price: Locator,
}

/// One entry of the alert classification table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutcomePhrase {
    /// Case-insensitive substring of the alert text
    pub phrase: String,
    /// Outcome reported when the phrase matches
    pub outcome: UploadOutcome,
}

fn default_equals_value() -> String {
    "=".to_string()
}

/// Phrases used by the German UI
#[must_use]
pub fn default_outcome_phrases() -> Vec<OutcomePhrase> {
    vec![
        OutcomePhrase {
            phrase: "wird hochgeladen".to_string(),
            outcome: UploadOutcome::Upload,
        },
        OutcomePhrase {
            phrase: "nicht möglich".to_string(),
            outcome: UploadOutcome::FileExists,
        },
    ]
}

impl ClientConfig {
    /// Stable cell attribute for a field display name
    pub fn field_attribute(&self, field: &str) -> Result<&str, ConfigError> {
        self.field_attributes
            .get(field)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownField {
                field: field.to_string(),
            })
    }

    /// Session-wide wait options
    #[must_use]
    pub const fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout_ms: self.timeouts.default_ms,
            poll_interval_ms: self.timeouts.poll_interval_ms,
        }
    }

    /// Every locator with its dotted path
    #[must_use]
    pub fn locators(&self) -> Vec<(&'static str, &Locator)> {
        vec![
            ("login.username_field", &self.login.username_field),
            ("login.password_field", &self.login.password_field),
            ("login.submit_button", &self.login.submit_button),
            ("login.confirmation", &self.login.confirmation),
            ("login.preload_video", &self.login.preload_video),
            ("navigation.menu", &self.navigation.menu),
            ("navigation.table_link", &self.navigation.table_link),
            ("navigation.quick_access", &self.navigation.quick_access),
            ("navigation.orga_list", &self.navigation.orga_list),
            ("table.load_indicator", &self.table.load_indicator),
            ("table.table_element", &self.table.table_element),
            ("table.rows", &self.table.rows),
            ("table.no_results", &self.table.no_results),
            ("table.cells", &self.table.cells),
            ("table.row_id", &self.table.row_id),
            ("table.field_cell", &self.table.field_cell),
            ("table.page_count", &self.table.page_count),
            ("table.page_input", &self.table.page_input),
            ("table.next_page", &self.table.next_page),
            ("table.page_size", &self.table.page_size),
            ("search.column_menu", &self.search.column_menu),
            ("search.column_option", &self.search.column_option),
            ("search.operator_select", &self.search.operator_select),
            ("search.input", &self.search.input),
            ("upload.trigger", &self.upload.trigger),
            ("upload.file_input", &self.upload.file_input),
            ("upload.uploading_indicator", &self.upload.uploading_indicator),
            ("upload.alert_overlay", &self.upload.alert_overlay),
            ("upload.alert_text", &self.upload.alert_text),
            ("upload.close_dialog", &self.upload.close_dialog),
            ("parts.details_button", &self.parts.details_button),
            ("parts.parts_tab", &self.parts.parts_tab),
            ("parts.rows", &self.parts.rows),
            ("parts.name_cell", &self.parts.name_cell),
            ("parts.price_cell", &self.parts.price_cell),
            ("parts.checkbox", &self.parts.checkbox),
            ("parts.total_price", &self.parts.total_price),
        ]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (path, locator) in self.locators() {
            if locator.selector.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    path: path.to_string(),
                    message: "empty selector".to_string(),
                });
            }
        }
        if self.field_attributes.is_empty() {
            return Err(ConfigError::Invalid {
                path: "field_attributes".to_string(),
                message: "at least one field is required".to_string(),
            });
        }
        if self.timeouts.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                path: "timeouts.poll_interval_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.table.cell_attribute.trim().is_empty() {
            return Err(ConfigError::Invalid {
                path: "table.cell_attribute".to_string(),
                message: "empty attribute name".to_string(),
            });
        }
        Ok(())
    }
}
