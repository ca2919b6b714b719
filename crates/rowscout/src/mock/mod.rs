//! In-memory simulation of the target system.
//!
//! [`MockTargetSystem`] implements [`Driver`] over a [`TableFixture`]. It
//! knows which UI element a locator means by comparing it with the resolved
//! [`ClientConfig`], so the same selectors drive both the simulation and a
//! real browser.
//!
//! Simulated behavior:
//!
//! - login form, navigation menu, quick access and orga list
//! - pagination, page size and the in-app column filter
//! - a load indicator that stays visible for `latency` polls after every
//!   reload, with no rows rendered meanwhile
//! - stale row handles after every reload and after the upload trigger
//! - the upload editor, the uploading indicator, alerts and file conflicts
//! - the details view with a parts tab and script-driven checkboxes
//!
//! Clones share state, so a test can keep a clone to inspect history after
//! handing the driver to a session.

mod fixture;

pub use fixture::{
    fast_sample_config, sample_tokens, PartFixture, TableFixture, CONFLICT_ALERT, SAMPLE_CLIENT,
    SAMPLE_CONFIG, UPLOAD_ALERT,
};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::actions::CHECK_SCRIPT;
use crate::config::ClientConfig;
use crate::driver::{Driver, ElementHandle};
use crate::locator::{Locator, Strategy, FIELD_PLACEHOLDER};
use crate::result::{ScoutError, ScoutResult};

// =============================================================================
// ROLES
// =============================================================================

/// What a locator points at
#[derive(Debug, Clone, PartialEq, Eq)]
enum Role {
    Username,
    Password,
    Submit,
    Menu,
    TableLink,
    QuickAccess,
    OrgaList,
    LoadIndicator,
    TableElement,
    Rows,
    NoResults,
    Cells,
    RowId,
    FieldCell(String),
    PageCount,
    PageInput,
    NextPage,
    PageSize,
    ColumnMenu,
    ColumnOption(String),
    OperatorSelect,
    SearchInput,
    UploadTrigger(String),
    FileInput,
    UploadingIndicator,
    AlertOverlay,
    AlertText,
    CloseDialog,
    DetailsButton,
    PartsTab,
    PartRows,
    PartName,
    PartPrice,
    PartCheckbox,
    TotalPrice,
}

#[derive(Debug, Clone, Copy)]
enum Template {
    FieldCell,
    UploadTrigger,
    ColumnOption,
}

#[derive(Debug)]
struct RoleTable {
    exact: Vec<(Locator, Role)>,
    templates: Vec<(Strategy, String, String, Template)>,
}

impl RoleTable {
    fn from_config(config: &ClientConfig) -> Self {
        let (login, nav, table) = (&config.login, &config.navigation, &config.table);
        let (search, upload, parts) = (&config.search, &config.upload, &config.parts);
        let exact = vec![
            (login.username_field.clone(), Role::Username),
            (login.password_field.clone(), Role::Password),
            (login.submit_button.clone(), Role::Submit),
            (login.confirmation.clone(), Role::Menu),
            (nav.menu.clone(), Role::Menu),
            (nav.table_link.clone(), Role::TableLink),
            (nav.quick_access.clone(), Role::QuickAccess),
            (nav.orga_list.clone(), Role::OrgaList),
            (table.load_indicator.clone(), Role::LoadIndicator),
            (table.table_element.clone(), Role::TableElement),
            (table.rows.clone(), Role::Rows),
            (table.no_results.clone(), Role::NoResults),
            (table.cells.clone(), Role::Cells),
            (table.row_id.clone(), Role::RowId),
            (table.page_count.clone(), Role::PageCount),
            (table.page_input.clone(), Role::PageInput),
            (table.next_page.clone(), Role::NextPage),
            (table.page_size.clone(), Role::PageSize),
            (search.column_menu.clone(), Role::ColumnMenu),
            (search.operator_select.clone(), Role::OperatorSelect),
            (search.input.clone(), Role::SearchInput),
            (upload.file_input.clone(), Role::FileInput),
            (upload.uploading_indicator.clone(), Role::UploadingIndicator),
            (upload.alert_overlay.clone(), Role::AlertOverlay),
            (upload.alert_text.clone(), Role::AlertText),
            (upload.close_dialog.clone(), Role::CloseDialog),
            (parts.details_button.clone(), Role::DetailsButton),
            (parts.parts_tab.clone(), Role::PartsTab),
            (parts.rows.clone(), Role::PartRows),
            (parts.name_cell.clone(), Role::PartName),
            (parts.price_cell.clone(), Role::PartPrice),
            (parts.checkbox.clone(), Role::PartCheckbox),
            (parts.total_price.clone(), Role::TotalPrice),
        ];
        let templates = [
            (&upload.trigger, Template::UploadTrigger),
            (&search.column_option, Template::ColumnOption),
            (&table.field_cell, Template::FieldCell),
        ]
        .into_iter()
        .filter_map(|(locator, template)| {
            let (prefix, suffix) = locator.selector.split_once(FIELD_PLACEHOLDER)?;
            Some((
                locator.strategy,
                prefix.to_string(),
                suffix.to_string(),
                template,
            ))
        })
        .collect();
        Self { exact, templates }
    }

    fn resolve(&self, locator: &Locator) -> Option<Role> {
        if let Some((_, role)) = self.exact.iter().find(|(l, _)| l == locator) {
            return Some(role.clone());
        }
        self.templates
            .iter()
            .find_map(|(strategy, prefix, suffix, template)| {
                if *strategy != locator.strategy || locator.selector.len() < prefix.len() + suffix.len()
                {
                    return None;
                }
                let bound = locator
                    .selector
                    .strip_prefix(prefix.as_str())?
                    .strip_suffix(suffix.as_str())?
                    .to_string();
                Some(match template {
                    Template::FieldCell => Role::FieldCell(bound),
                    Template::UploadTrigger => Role::UploadTrigger(bound),
                    Template::ColumnOption => Role::ColumnOption(bound),
                })
            })
    }
}

// =============================================================================
// STATE
// =============================================================================

/// A node behind an issued handle
#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    /// Page-level element
    Static(Role),
    Row { gen: u64, row: usize },
    Cell { gen: u64, row: usize, col: usize },
    Trigger { gen: u64, row: usize, col: usize },
    FileInput { gen: u64, row: usize },
    Details { gen: u64, row: usize },
    Part(usize),
    PartName(usize),
    PartPrice(usize),
    PartCheckbox(usize),
}

impl Node {
    const fn generation(&self) -> Option<u64> {
        match self {
            Self::Row { gen, .. }
            | Self::Cell { gen, .. }
            | Self::Trigger { gen, .. }
            | Self::FileInput { gen, .. }
            | Self::Details { gen, .. } => Some(*gen),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Filter {
    column: Option<usize>,
    value: String,
    exact: bool,
}

#[derive(Debug)]
struct State {
    fixture: TableFixture,
    field_attributes: BTreeMap<String, String>,
    cell_attribute: String,
    part_id_attribute: String,
    equals_value: String,
    base_url: String,
    logout_url: String,

    url: Option<String>,
    closed: bool,
    typed_username: String,
    typed_password: String,
    logged_in: bool,
    nav_open: bool,
    quick_open: bool,
    table_open: bool,
    page: usize,
    page_size: usize,
    filter: Option<Filter>,
    menu_open: bool,
    pending_column: Option<usize>,
    operator: String,
    generation: u64,
    loading: u32,
    editing: Option<(usize, usize)>,
    uploading: u32,
    alert: Option<String>,
    existing: BTreeSet<(String, String)>,
    uploads: Vec<(String, String, PathBuf)>,
    details_open: bool,
    parts_open: bool,
    check_scripts: usize,
    pages_viewed: Vec<usize>,
    history: Vec<String>,
    failing: BTreeSet<String>,
    stale_once: BTreeSet<String>,
    handles: HashMap<String, Node>,
    next_handle: u64,
}

impl State {
    fn visible_rows(&self) -> Vec<usize> {
        let rows = &self.fixture.rows;
        (0..rows.len())
            .filter(|&i| {
                let Some(filter) = &self.filter else {
                    return true;
                };
                let matches = |cell: &String| {
                    if filter.exact {
                        cell.trim() == filter.value
                    } else {
                        cell.contains(&filter.value)
                    }
                };
                match filter.column {
                    Some(col) => rows[i].get(col).is_some_and(matches),
                    None => rows[i].iter().any(matches),
                }
            })
            .collect()
    }

    fn page_count(&self) -> usize {
        self.visible_rows().len().div_ceil(self.page_size).max(1)
    }

    /// Fixture indices of the rows on the current page
    fn page_rows(&self) -> Vec<usize> {
        self.visible_rows()
            .into_iter()
            .skip((self.page - 1) * self.page_size)
            .take(self.page_size)
            .collect()
    }

    fn row_fixture(&self, view_row: usize) -> ScoutResult<&Vec<String>> {
        self.page_rows()
            .get(view_row)
            .and_then(|&i| self.fixture.rows.get(i))
            .ok_or_else(|| ScoutError::driver(format!("row {view_row} is not rendered")))
    }

    fn row_id(&self, view_row: usize) -> ScoutResult<String> {
        let row = self.row_fixture(view_row)?;
        Ok(self
            .fixture
            .column("id")
            .and_then(|col| row.get(col).cloned())
            .unwrap_or_default())
    }

    fn reload(&mut self) {
        self.generation += 1;
        self.loading = self.fixture.latency;
        self.editing = None;
        self.pages_viewed.push(self.page);
        self.history.push(format!("page {}", self.page));
    }

    fn issue(&mut self, node: Node) -> ElementHandle {
        self.next_handle += 1;
        let id = format!("m{}", self.next_handle);
        self.handles.insert(id.clone(), node);
        ElementHandle::new(id)
    }

    fn take_stale(&mut self, id: &str, handle: &ElementHandle) -> ScoutResult<()> {
        if self.stale_once.remove(id) {
            return Err(ScoutError::StaleElement {
                handle: handle.id().to_string(),
            });
        }
        Ok(())
    }

    fn node(&self, handle: &ElementHandle) -> ScoutResult<Node> {
        let node = self
            .handles
            .get(handle.id())
            .cloned()
            .ok_or_else(|| ScoutError::driver(format!("unknown handle {handle}")))?;
        if node.generation().is_some_and(|g| g != self.generation) {
            return Err(ScoutError::StaleElement {
                handle: handle.id().to_string(),
            });
        }
        Ok(node)
    }

    fn present(&self, role: &Role) -> bool {
        let login_page = self.url.is_some() && !self.logged_in;
        match role {
            Role::Username | Role::Password | Role::Submit => login_page,
            Role::Menu | Role::QuickAccess => self.logged_in,
            Role::TableLink => self.logged_in && self.nav_open,
            Role::OrgaList => self.logged_in && self.quick_open,
            Role::LoadIndicator
            | Role::TableElement
            | Role::NoResults
            | Role::PageCount
            | Role::PageInput
            | Role::NextPage
            | Role::PageSize
            | Role::ColumnMenu
            | Role::OperatorSelect
            | Role::SearchInput
            | Role::UploadingIndicator => self.table_open,
            Role::ColumnOption(name) => {
                self.table_open && self.menu_open && self.field_attributes.contains_key(name)
            }
            Role::AlertOverlay | Role::AlertText => self.alert.is_some(),
            Role::CloseDialog => self.alert.is_some() || self.editing.is_some(),
            Role::PartsTab => self.details_open,
            Role::TotalPrice => self.parts_open && !self.fixture.parts.is_empty(),
            _ => false,
        }
    }

    fn lookup(&self, role: &Role, scope: Option<&Node>) -> Vec<Node> {
        let row_scope = match scope {
            Some(Node::Row { row, .. }) => Some(*row),
            _ => None,
        };
        let part_scope = match scope {
            Some(Node::Part(k)) => Some(*k),
            _ => None,
        };
        let gen = self.generation;
        let columns = &self.fixture.columns;

        match role {
            Role::Rows if self.table_open && self.loading == 0 => (0..self.page_rows().len())
                .map(|row| Node::Row { gen, row })
                .collect(),
            Role::Cells => row_scope
                .map(|row| {
                    (0..columns.len())
                        .map(|col| Node::Cell { gen, row, col })
                        .collect()
                })
                .unwrap_or_default(),
            Role::RowId => row_scope
                .zip(self.fixture.column("id"))
                .map(|(row, col)| vec![Node::Cell { gen, row, col }])
                .unwrap_or_default(),
            Role::FieldCell(attr) => row_scope
                .zip(self.fixture.column(attr))
                .map(|(row, col)| vec![Node::Cell { gen, row, col }])
                .unwrap_or_default(),
            Role::UploadTrigger(attr) => row_scope
                .zip(self.fixture.column(attr))
                .map(|(row, col)| vec![Node::Trigger { gen, row, col }])
                .unwrap_or_default(),
            Role::FileInput => match (self.editing, row_scope) {
                (Some((row, _)), None) => vec![Node::FileInput { gen, row }],
                (Some((row, _)), Some(scoped)) if row == scoped => {
                    vec![Node::FileInput { gen, row }]
                }
                _ => vec![],
            },
            Role::DetailsButton => row_scope
                .map(|row| vec![Node::Details { gen, row }])
                .unwrap_or_default(),
            Role::PartRows if self.parts_open => {
                (0..self.fixture.parts.len()).map(Node::Part).collect()
            }
            Role::PartName => part_scope.map(|k| vec![Node::PartName(k)]).unwrap_or_default(),
            Role::PartPrice => part_scope.map(|k| vec![Node::PartPrice(k)]).unwrap_or_default(),
            Role::PartCheckbox => part_scope
                .filter(|&k| self.fixture.parts.get(k).is_some_and(|p| !p.broken))
                .map(|k| vec![Node::PartCheckbox(k)])
                .unwrap_or_default(),
            role if self.present(role) => vec![Node::Static(role.clone())],
            _ => vec![],
        }
    }
}

// =============================================================================
// MOCK TARGET SYSTEM
// =============================================================================

/// Simulated target system implementing [`Driver`]
#[derive(Debug, Clone)]
pub struct MockTargetSystem {
    state: Arc<Mutex<State>>,
    roles: Arc<RoleTable>,
}

impl MockTargetSystem {
    /// Simulation of `fixture` addressed through the selectors of `config`
    #[must_use]
    pub fn new(config: &ClientConfig, fixture: TableFixture) -> Self {
        let state = State {
            page_size: fixture.page_size,
            field_attributes: config.field_attributes.clone(),
            cell_attribute: config.table.cell_attribute.clone(),
            part_id_attribute: config.parts.id_attribute.clone(),
            equals_value: config.search.equals_value.clone(),
            base_url: config.base_url.clone(),
            logout_url: config.logout_url.clone(),
            fixture,
            url: None,
            closed: false,
            typed_username: String::new(),
            typed_password: String::new(),
            logged_in: false,
            nav_open: false,
            quick_open: false,
            table_open: false,
            page: 1,
            filter: None,
            menu_open: false,
            pending_column: None,
            operator: String::new(),
            generation: 0,
            loading: 0,
            editing: None,
            uploading: 0,
            alert: None,
            existing: BTreeSet::new(),
            uploads: Vec::new(),
            details_open: false,
            parts_open: false,
            check_scripts: 0,
            pages_viewed: Vec::new(),
            history: Vec::new(),
            failing: BTreeSet::new(),
            stale_once: BTreeSet::new(),
            handles: HashMap::new(),
            next_handle: 0,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            roles: Arc::new(RoleTable::from_config(config)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> ScoutResult<MutexGuard<'_, State>> {
        let state = self.lock();
        if state.closed {
            return Err(ScoutError::driver("session closed"));
        }
        Ok(state)
    }

    /// Start logged in with the table loaded on page 1
    #[must_use]
    pub fn with_table_open(self) -> Self {
        {
            let mut state = self.lock();
            let base_url = state.base_url.clone();
            state.url = Some(base_url);
            state.logged_in = true;
            state.nav_open = true;
            state.table_open = true;
            state.page = 1;
            state.reload();
            state.loading = 0;
        }
        self
    }

    /// Start with the details view and its parts tab open
    #[must_use]
    pub fn with_parts_open(self) -> Self {
        {
            let mut state = self.lock();
            state.details_open = true;
            state.parts_open = true;
        }
        self
    }

    /// Make every lookup of `selector` fail with a driver error
    pub fn fail_lookups_of(&self, selector: &str) {
        self.lock().failing.insert(selector.to_string());
    }

    /// Make the next read of the table row or part position with `id`
    /// fail as if its element had gone stale
    pub fn stale_once(&self, id: &str) {
        self.lock().stale_once.insert(id.to_string());
    }

    /// Events in order: `open`, `login`, `page N`, `upload`, `logout`, `close`, ...
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Page number after every reload
    #[must_use]
    pub fn pages_viewed(&self) -> Vec<usize> {
        self.lock().pages_viewed.clone()
    }

    /// Accepted uploads as `(row id, cell attribute, path)`
    #[must_use]
    pub fn uploads(&self) -> Vec<(String, String, PathBuf)> {
        self.lock().uploads.clone()
    }

    /// Whether an alert or the upload editor is still open
    #[must_use]
    pub fn dialog_open(&self) -> bool {
        let state = self.lock();
        state.alert.is_some() || state.editing.is_some()
    }

    /// Number of checkbox scripts executed
    #[must_use]
    pub fn check_scripts_run(&self) -> usize {
        self.lock().check_scripts
    }

    /// Whether a login succeeded and no logout followed
    #[must_use]
    pub fn logged_in(&self) -> bool {
        self.lock().logged_in
    }

    /// Whether [`Driver::close`] was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Current checkbox states of the parts tab
    #[must_use]
    pub fn part_states(&self) -> Vec<(String, bool)> {
        self.lock()
            .fixture
            .parts
            .iter()
            .map(|p| (p.id.clone(), p.checked))
            .collect()
    }
}

#[async_trait]
impl Driver for MockTargetSystem {
    async fn open(&self, url: &str) -> ScoutResult<()> {
        let mut state = self.live()?;
        if url == state.logout_url {
            state.logged_in = false;
            state.nav_open = false;
            state.quick_open = false;
            state.table_open = false;
            state.details_open = false;
            state.parts_open = false;
            state.history.push("logout".to_string());
        } else {
            state.history.push(format!("open {url}"));
        }
        state.url = Some(url.to_string());
        Ok(())
    }

    async fn find_all(
        &self,
        locator: &Locator,
        scope: Option<&ElementHandle>,
    ) -> ScoutResult<Vec<ElementHandle>> {
        let mut state = self.live()?;
        if state.failing.contains(&locator.selector) {
            return Err(ScoutError::driver(format!("lookup of {locator} failed")));
        }
        let Some(role) = self.roles.resolve(locator) else {
            return Ok(vec![]);
        };
        let scope = scope.map(|handle| state.node(handle)).transpose()?;
        let nodes = state.lookup(&role, scope.as_ref());
        Ok(nodes.into_iter().map(|node| state.issue(node)).collect())
    }

    async fn click(&self, element: &ElementHandle) -> ScoutResult<()> {
        let mut state = self.live()?;
        match state.node(element)? {
            Node::Static(Role::Submit) => {
                let accepted = state.fixture.credentials.as_ref().map_or(true, |(u, p)| {
                    *u == state.typed_username && *p == state.typed_password
                });
                if accepted {
                    state.logged_in = true;
                    state.history.push("login".to_string());
                } else {
                    state.history.push("login rejected".to_string());
                }
            }
            Node::Static(Role::Menu) => state.nav_open = true,
            Node::Static(Role::QuickAccess) => state.quick_open = true,
            Node::Static(Role::TableLink | Role::OrgaList) => {
                state.table_open = true;
                state.page = 1;
                state.filter = None;
                state.reload();
            }
            Node::Static(Role::NextPage) => {
                if state.page < state.page_count() {
                    state.page += 1;
                    state.reload();
                }
            }
            Node::Static(Role::ColumnMenu) => state.menu_open = true,
            Node::Static(Role::ColumnOption(name)) => {
                let column = state
                    .field_attributes
                    .get(&name)
                    .and_then(|attr| state.fixture.column(attr));
                state.pending_column = column;
                state.menu_open = false;
            }
            Node::Trigger { row, col, .. } => {
                state.editing = Some((row, col));
                state.generation += 1;
            }
            Node::Static(Role::CloseDialog) => {
                state.alert = None;
                if state.editing.take().is_some() {
                    state.generation += 1;
                }
            }
            Node::Details { row, .. } => {
                let id = state.row_id(row)?;
                state.details_open = true;
                state.history.push(format!("details {id}"));
            }
            Node::Static(Role::PartsTab) => state.parts_open = true,
            _ => {}
        }
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str, submit: bool) -> ScoutResult<()> {
        let mut state = self.live()?;
        match state.node(element)? {
            Node::Static(Role::Username) => state.typed_username = text.to_string(),
            Node::Static(Role::Password) => state.typed_password = text.to_string(),
            Node::Static(Role::PageInput) if submit => {
                if let Ok(page) = text.trim().parse::<usize>() {
                    if (1..=state.page_count()).contains(&page) {
                        state.page = page;
                        state.reload();
                    }
                }
            }
            Node::Static(Role::SearchInput) if submit => {
                let exact = state.operator == state.equals_value;
                let column = state.pending_column.take();
                state.filter = Some(Filter {
                    column,
                    value: text.to_string(),
                    exact,
                });
                state.page = 1;
                state.reload();
            }
            _ => {}
        }
        Ok(())
    }

    async fn read_text(&self, element: &ElementHandle) -> ScoutResult<String> {
        let mut state = self.live()?;
        let node = state.node(element)?;
        if let Node::Row { row, .. } = &node {
            let id = state.row_id(*row)?;
            state.take_stale(&id, element)?;
        }
        Ok(match node {
            Node::Row { row, .. } => state.row_fixture(row)?.join(" "),
            Node::Cell { row, col, .. } => state
                .row_fixture(row)?
                .get(col)
                .cloned()
                .unwrap_or_default(),
            Node::Static(Role::PageCount) => {
                format!("Seite {} von {}", state.page, state.page_count())
            }
            Node::Static(Role::AlertText | Role::AlertOverlay) => {
                state.alert.clone().unwrap_or_default()
            }
            Node::Static(Role::TotalPrice) => state.fixture.parts_total().unwrap_or_default(),
            Node::Part(k) | Node::PartName(k) => state
                .fixture
                .parts
                .get(k)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            Node::PartPrice(k) => state
                .fixture
                .parts
                .get(k)
                .map(|p| p.price.clone())
                .unwrap_or_default(),
            _ => String::new(),
        })
    }

    async fn read_attribute(&self, element: &ElementHandle, name: &str) -> ScoutResult<Option<String>> {
        let mut state = self.live()?;
        let node = state.node(element)?;
        if let Node::Part(k) = &node {
            if let Some(id) = state.fixture.parts.get(*k).map(|p| p.id.clone()) {
                state.take_stale(&id, element)?;
            }
        }
        Ok(match node {
            Node::Cell { col, .. } if name == state.cell_attribute => {
                state.fixture.columns.get(col).cloned()
            }
            Node::Static(Role::PageInput) if name == "value" => Some(state.page.to_string()),
            Node::Part(k) if name == state.part_id_attribute => {
                state.fixture.parts.get(k).map(|p| p.id.clone())
            }
            Node::PartCheckbox(k) if name == "checked" => state
                .fixture
                .parts
                .get(k)
                .filter(|p| p.checked)
                .map(|_| "true".to_string()),
            _ => None,
        })
    }

    async fn is_displayed(&self, element: &ElementHandle) -> ScoutResult<bool> {
        let mut state = self.live()?;
        Ok(match state.node(element)? {
            Node::Static(Role::LoadIndicator) => {
                let shown = state.loading > 0;
                state.loading = state.loading.saturating_sub(1);
                shown
            }
            Node::Static(Role::UploadingIndicator) => {
                let shown = state.uploading > 0;
                state.uploading = state.uploading.saturating_sub(1);
                shown
            }
            Node::Static(Role::AlertOverlay) => state.alert.is_some() && state.uploading == 0,
            Node::Static(Role::NoResults) => {
                state.table_open && state.loading == 0 && state.page_rows().is_empty()
            }
            _ => true,
        })
    }

    async fn set_select(&self, element: &ElementHandle, value: &str) -> ScoutResult<()> {
        let mut state = self.live()?;
        match state.node(element)? {
            Node::Static(Role::OperatorSelect) => state.operator = value.to_string(),
            Node::Static(Role::PageSize) => {
                let size: usize = value
                    .parse()
                    .map_err(|_| ScoutError::driver(format!("no option '{value}'")))?;
                state.page_size = size.max(1);
                state.page = 1;
                state.reload();
            }
            other => return Err(ScoutError::driver(format!("{other:?} is not a select"))),
        }
        Ok(())
    }

    async fn get_select(&self, element: &ElementHandle) -> ScoutResult<String> {
        let state = self.live()?;
        match state.node(element)? {
            Node::Static(Role::OperatorSelect) => Ok(state.operator.clone()),
            Node::Static(Role::PageSize) => Ok(state.page_size.to_string()),
            other => Err(ScoutError::driver(format!("{other:?} is not a select"))),
        }
    }

    async fn upload(&self, element: &ElementHandle, path: &Path) -> ScoutResult<()> {
        let mut state = self.live()?;
        let Node::FileInput { row, .. } = state.node(element)? else {
            return Err(ScoutError::driver("not a file input"));
        };
        let Some((_, col)) = state.editing else {
            return Err(ScoutError::driver("upload editor is closed"));
        };
        let id = state.row_id(row)?;
        let attr = state.fixture.columns.get(col).cloned().unwrap_or_default();
        state.uploading = state.fixture.latency;
        if state.existing.insert((id.clone(), attr.clone())) {
            state.alert = state.fixture.upload_alert.clone();
            state.history.push(format!("upload {id} {attr}"));
            state.uploads.push((id, attr, path.to_path_buf()));
        } else {
            state.alert = Some(CONFLICT_ALERT.to_string());
            state.history.push(format!("upload conflict {id} {attr}"));
        }
        Ok(())
    }

    async fn run_script(&self, script: &str, args: &[ElementHandle]) -> ScoutResult<Value> {
        let mut state = self.live()?;
        let target = args.first().map(|h| state.node(h)).transpose()?;
        match target {
            Some(Node::PartCheckbox(k)) if script == CHECK_SCRIPT => {
                if let Some(part) = state.fixture.parts.get_mut(k) {
                    part.checked = true;
                }
                state.check_scripts += 1;
                Ok(Value::Null)
            }
            _ => Err(ScoutError::driver("unsupported script")),
        }
    }

    async fn close(&self) -> ScoutResult<()> {
        let mut state = self.lock();
        state.closed = true;
        state.history.push("close".to_string());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn mock() -> (MockTargetSystem, ClientConfig) {
        let config = fast_sample_config().unwrap();
        let plates: Vec<String> = (0..7).map(|i| format!("M-{i}")).collect();
        let mock = MockTargetSystem::new(&config, TableFixture::plates(&plates, 3).with_latency(0))
            .with_table_open();
        (mock, config)
    }

    mod role_tests {
        use super::*;

        #[test]
        fn test_templates_resolve_bound_locators() {
            let config = fast_sample_config().unwrap();
            let roles = RoleTable::from_config(&config);
            assert_eq!(
                roles.resolve(&config.table.field_cell.bind_field("fld_plate")),
                Some(Role::FieldCell("fld_plate".to_string()))
            );
            assert_eq!(
                roles.resolve(&config.upload.trigger.bind_field("fld_report")),
                Some(Role::UploadTrigger("fld_report".to_string()))
            );
            assert_eq!(
                roles.resolve(&config.search.column_option.bind_field("Kunde")),
                Some(Role::ColumnOption("Kunde".to_string()))
            );
            // exact entries win over templates
            assert_eq!(roles.resolve(&config.table.row_id), Some(Role::RowId));
            assert_eq!(roles.resolve(&Locator::css("div.unknown")), None);
        }
    }

    mod behavior_tests {
        use super::*;

        #[tokio::test]
        async fn test_handles_go_stale_after_reload() {
            let (mock, config) = mock();
            let rows = mock.find_all(&config.table.rows, None).await.unwrap();
            assert_eq!(rows.len(), 3);
            let next = mock.find_all(&config.table.next_page, None).await.unwrap();
            mock.click(&next[0]).await.unwrap();
            let err = mock.read_text(&rows[0]).await.unwrap_err();
            assert!(matches!(err, ScoutError::StaleElement { .. }));
        }

        #[tokio::test]
        async fn test_next_page_stops_at_last() {
            let (mock, config) = mock();
            let next = mock.find_all(&config.table.next_page, None).await.unwrap();
            for _ in 0..5 {
                mock.click(&next[0]).await.unwrap();
            }
            assert_eq!(mock.pages_viewed(), vec![1, 2, 3]);
            let rows = mock.find_all(&config.table.rows, None).await.unwrap();
            assert_eq!(rows.len(), 1);
        }

        #[tokio::test]
        async fn test_closed_session_rejects_calls() {
            let (mock, config) = mock();
            mock.close().await.unwrap();
            assert!(mock.is_closed());
            assert!(mock.find_all(&config.table.rows, None).await.is_err());
        }

        #[tokio::test]
        async fn test_unsupported_script() {
            let (mock, _config) = mock();
            assert!(mock.run_script("window.scrollTo(0, 0)", &[]).await.is_err());
        }

        #[tokio::test]
        async fn test_load_indicator_latency() {
            let config = fast_sample_config().unwrap();
            let mock = MockTargetSystem::new(
                &config,
                TableFixture::plates(&["X".to_string()], 3).with_latency(2),
            )
            .with_table_open();
            let page_input = mock.find_all(&config.table.page_input, None).await.unwrap();
            mock.type_text(&page_input[0], "1", true).await.unwrap();
            assert!(mock.find_all(&config.table.rows, None).await.unwrap().is_empty());
            let indicator = mock.find_all(&config.table.load_indicator, None).await.unwrap();
            assert!(mock.is_displayed(&indicator[0]).await.unwrap());
            assert!(mock.is_displayed(&indicator[0]).await.unwrap());
            assert!(!mock.is_displayed(&indicator[0]).await.unwrap());
            assert_eq!(mock.find_all(&config.table.rows, None).await.unwrap().len(), 1);
        }
    }
}
