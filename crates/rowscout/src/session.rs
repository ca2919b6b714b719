//! Session lifecycle.
//!
//! ```text
//! open ──► login ──► navigate ──► [search / act]* ──► logout ──► close
//! ```
//!
//! A [`Session`] owns its driver, the resolved configuration, the
//! credentials and, for real browsers, the temporary profile directory.
//! [`run_scoped`] runs a body against a session and always logs out and
//! closes afterwards; cleanup failures are logged and never replace the
//! body's own result. Dropping a session without closing it still removes
//! the profile directory.

use futures::future::BoxFuture;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::actions::{self, CheckStatus, PartsSummary, UploadOutcome};
use crate::config::ClientConfig;
use crate::driver::Driver;
use crate::locator::require;
use crate::result::{ScoutError, ScoutResult};
use crate::search::{RowDescriptor, SearchMode, TableView};
use crate::wait::Waiter;

/// Login credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Account password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// One logged-in conversation with the target system
#[derive(Debug)]
pub struct Session<D: Driver> {
    driver: D,
    config: ClientConfig,
    credentials: Credentials,
    profile: Option<TempDir>,
}

impl<D: Driver> Session<D> {
    /// Session over an already running driver
    #[must_use]
    pub const fn new(driver: D, config: ClientConfig, credentials: Credentials) -> Self {
        Self {
            driver,
            config,
            credentials,
            profile: None,
        }
    }

    /// Attach a profile directory removed on close
    #[must_use]
    pub fn with_profile(mut self, profile: TempDir) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Driver behind the session
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Resolved configuration
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Profile directory, when the session owns one
    #[must_use]
    pub fn profile_dir(&self) -> Option<&Path> {
        self.profile.as_ref().map(TempDir::path)
    }

    /// Table view over the current page
    #[must_use]
    pub const fn table(&self) -> TableView<'_, D> {
        TableView::new(&self.driver, &self.config)
    }

    fn waiter(&self) -> Waiter<'_, D> {
        Waiter::new(&self.driver, self.config.wait_options())
    }

    // ===== LIFECYCLE =====

    /// Load the entry page
    pub async fn open(&self) -> ScoutResult<()> {
        info!(url = %self.config.base_url, "opening target");
        self.driver.open(&self.config.base_url).await
    }

    /// Log in. Failures are logged and reported as `false`.
    pub async fn login(&self) -> bool {
        info!(username = %self.credentials.username, "logging in");
        match self.try_login().await {
            Ok(()) => {
                info!("login succeeded");
                true
            }
            Err(e) => {
                error!(error = %e, "login failed");
                false
            }
        }
    }

    async fn try_login(&self) -> ScoutResult<()> {
        let login = &self.config.login;
        let waiter = self.waiter();

        waiter.await_visibility(&login.username_field).await?;
        let username = require(&self.driver, &login.username_field, None).await?;
        self.driver
            .type_text(&username, &self.credentials.username, false)
            .await?;
        let password = require(&self.driver, &login.password_field, None).await?;
        self.driver
            .type_text(&password, &self.credentials.password, false)
            .await?;
        let submit = require(&self.driver, &login.submit_button, None).await?;
        self.driver.click(&submit).await?;

        debug!("waiting for login confirmation");
        waiter.await_presence(&login.confirmation).await?;
        waiter.await_invisibility(&login.preload_video).await?;
        Ok(())
    }

    /// End the session server-side
    pub async fn logout(&self) -> ScoutResult<()> {
        info!("logging out");
        self.driver.open(&self.config.logout_url).await
    }

    /// Close the driver and remove the profile directory
    pub async fn close(&mut self) -> ScoutResult<()> {
        let closed = self.driver.close().await;
        if let Some(profile) = self.profile.take() {
            let path = profile.path().display().to_string();
            match profile.close() {
                Ok(()) => debug!(profile = %path, "profile removed"),
                Err(e) => warn!(profile = %path, error = %e, "profile removal failed"),
            }
        }
        closed
    }

    // ===== NAVIGATION =====

    async fn click_visible(&self, locator: &crate::locator::Locator) -> ScoutResult<()> {
        self.waiter().await_visibility(locator).await?;
        let element = require(&self.driver, locator, None).await?;
        self.driver.click(&element).await
    }

    /// Open the main navigation menu
    pub async fn open_navigation(&self) -> ScoutResult<()> {
        info!("opening navigation");
        let nav = &self.config.navigation;
        self.click_visible(&nav.menu).await?;
        self.waiter().await_presence(&nav.table_link).await?;
        Ok(())
    }

    /// Open the configured table from the navigation
    pub async fn open_table(&self) -> ScoutResult<()> {
        info!("opening table");
        self.click_visible(&self.config.navigation.table_link).await?;
        self.table().wait_for_table().await?;
        Ok(())
    }

    /// Open the quick access panel
    pub async fn open_quick_access(&self) -> ScoutResult<()> {
        info!("opening quick access");
        let nav = &self.config.navigation;
        self.click_visible(&nav.quick_access).await?;
        self.waiter().await_presence(&nav.orga_list).await?;
        Ok(())
    }

    /// Open the configured orga list from quick access
    pub async fn open_orga_list(&self) -> ScoutResult<()> {
        info!("opening orga list");
        self.click_visible(&self.config.navigation.orga_list).await?;
        self.table().wait_for_table().await?;
        Ok(())
    }

    /// Open the details view of the row at `row_index` on the current page
    pub async fn open_details(&self, row_index: usize) -> ScoutResult<()> {
        info!(row_index, "opening details");
        let rows = self.table().rows().await?;
        let row = rows.get(row_index).ok_or_else(|| ScoutError::ElementNotFound {
            locator: format!("{} #{row_index}", self.config.table.rows),
        })?;
        let details = require(&self.driver, &self.config.parts.details_button, Some(row)).await?;
        self.driver.click(&details).await?;
        self.waiter().await_visibility(&self.config.parts.parts_tab).await?;
        Ok(())
    }

    /// Switch the details view to the parts tab
    pub async fn open_parts(&self) -> ScoutResult<()> {
        info!("opening parts tab");
        let parts = &self.config.parts;
        self.click_visible(&parts.parts_tab).await?;
        self.waiter().await_presence(&parts.total_price).await?;
        Ok(())
    }

    // ===== TABLE =====

    /// See [`TableView::find_row`]
    pub async fn find_row(
        &self,
        field: &str,
        value: &str,
        mode: SearchMode,
    ) -> ScoutResult<Option<RowDescriptor>> {
        self.table().find_row(field, value, mode).await
    }

    /// See [`TableView::page_count`]
    pub async fn page_count(&self) -> ScoutResult<usize> {
        self.table().page_count().await
    }

    /// See [`TableView::current_page`]
    pub async fn current_page(&self) -> ScoutResult<usize> {
        self.table().current_page().await
    }

    /// See [`TableView::set_page`]
    pub async fn set_page(&self, page: usize) -> ScoutResult<()> {
        self.table().set_page(page).await
    }

    /// See [`TableView::next_page`]
    pub async fn next_page(&self) -> ScoutResult<()> {
        self.table().next_page().await
    }

    /// See [`TableView::page_size`]
    pub async fn page_size(&self) -> ScoutResult<usize> {
        self.table().page_size().await
    }

    /// See [`TableView::set_page_size`]
    pub async fn set_page_size(&self, size: usize) -> ScoutResult<()> {
        self.table().set_page_size(size).await
    }

    /// See [`TableView::wait_for_table`]
    pub async fn wait_for_table(&self) -> ScoutResult<bool> {
        self.table().wait_for_table().await
    }

    // ===== ACTIONS =====

    /// See [`actions::perform_upload`]
    pub async fn perform_upload(
        &self,
        path: &Path,
        row: &RowDescriptor,
        field: &str,
    ) -> ScoutResult<UploadOutcome> {
        actions::perform_upload(&self.table(), path, row, field).await
    }

    /// See [`actions::toggle_checkboxes`]
    pub async fn toggle_checkboxes(
        &self,
        filter: &BTreeSet<String>,
    ) -> ScoutResult<BTreeMap<String, CheckStatus>> {
        actions::toggle_checkboxes(&self.driver, &self.config, filter).await
    }

    /// See [`actions::read_parts`]
    pub async fn read_parts(&self) -> ScoutResult<PartsSummary> {
        actions::read_parts(&self.driver, &self.config).await
    }
}

#[cfg(feature = "browser")]
impl Session<crate::browser::ChromiumDriver> {
    /// Launch Chromium in a fresh profile directory
    pub async fn launch(
        config: ClientConfig,
        credentials: Credentials,
        options: &crate::browser::BrowserOptions,
    ) -> ScoutResult<Self> {
        let profile = tempfile::Builder::new()
            .prefix("rowscout-profile-")
            .tempdir()?;
        let driver = crate::browser::ChromiumDriver::launch(options, profile.path()).await?;
        Ok(Self::new(driver, config, credentials).with_profile(profile))
    }
}

/// Run `body` against `session`, then log out and close.
///
/// Cleanup runs whatever `body` returned. Cleanup failures are logged and
/// the body's result is returned unchanged.
pub async fn run_scoped<D, T, F>(mut session: Session<D>, body: F) -> ScoutResult<T>
where
    D: Driver,
    F: for<'s> FnOnce(&'s mut Session<D>) -> BoxFuture<'s, ScoutResult<T>>,
{
    let result = body(&mut session).await;
    if let Err(e) = &result {
        error!(error = %e, "session body failed");
    }
    if let Err(e) = session.logout().await {
        warn!(error = %e, "logout failed");
    }
    if let Err(e) = session.close().await {
        warn!(error = %e, "close failed");
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{fast_sample_config, MockTargetSystem, TableFixture};

    fn session(fixture: TableFixture) -> (Session<MockTargetSystem>, MockTargetSystem) {
        let config = fast_sample_config().unwrap();
        let mock = MockTargetSystem::new(&config, fixture);
        let session = Session::new(mock.clone(), config, Credentials::new("anna", "geheim"));
        (session, mock)
    }

    fn plates() -> TableFixture {
        let plates: Vec<String> = (0..9).map(|i| format!("S-{i}")).collect();
        TableFixture::plates(&plates, 4).with_credentials("anna", "geheim")
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let text = format!("{:?}", Credentials::new("anna", "geheim"));
        assert!(text.contains("anna"));
        assert!(!text.contains("geheim"));
    }

    #[tokio::test]
    async fn test_login_and_navigation() {
        let (session, mock) = session(plates());
        session.open().await.unwrap();
        assert!(session.login().await);
        session.open_navigation().await.unwrap();
        session.open_table().await.unwrap();
        assert_eq!(session.page_count().await.unwrap(), 3);
        assert!(mock.history().contains(&"login".to_string()));
    }

    #[tokio::test]
    async fn test_wrong_password_returns_false() {
        let config = fast_sample_config().unwrap();
        let mock = MockTargetSystem::new(&config, plates());
        let session = Session::new(mock.clone(), config, Credentials::new("anna", "falsch"));
        session.open().await.unwrap();
        assert!(!session.login().await);
        assert!(!mock.logged_in());
    }

    #[tokio::test]
    async fn test_close_removes_profile() {
        let (session, mock) = session(plates());
        let profile = tempfile::Builder::new()
            .prefix("rowscout-profile-")
            .tempdir()
            .unwrap();
        let path = profile.path().to_path_buf();
        let mut session = session.with_profile(profile);
        assert_eq!(session.profile_dir(), Some(path.as_path()));
        session.close().await.unwrap();
        assert!(!path.exists());
        assert!(mock.is_closed());
    }

    #[tokio::test]
    async fn test_drop_removes_profile() {
        let (session, _mock) = session(plates());
        let profile = tempfile::tempdir().unwrap();
        let path = profile.path().to_path_buf();
        drop(session.with_profile(profile));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_run_scoped_cleans_up_after_failure() {
        let (session, mock) = session(plates());
        let result: ScoutResult<()> = run_scoped(session, |s| {
            Box::pin(async move {
                s.open().await?;
                Err(ScoutError::driver("boom"))
            })
        })
        .await;
        assert!(result.unwrap_err().to_string().contains("boom"));
        let history = mock.history();
        assert_eq!(history.last().map(String::as_str), Some("close"));
        assert!(history.contains(&"logout".to_string()));
    }

    #[tokio::test]
    async fn test_run_scoped_keeps_body_error_when_cleanup_fails() {
        let (session, mock) = session(plates());
        let result: ScoutResult<()> = run_scoped(session, |s| {
            Box::pin(async move {
                // closing early makes logout fail too
                s.driver().close().await?;
                Err(ScoutError::driver("original"))
            })
        })
        .await;
        assert!(result.unwrap_err().to_string().contains("original"));
        assert!(mock.is_closed());
    }

    #[tokio::test]
    async fn test_open_details_and_parts() {
        let config = fast_sample_config().unwrap();
        let fixture = plates().with_parts(vec![crate::mock::PartFixture::new("p1", "Tür", "10,00")]);
        let mock = MockTargetSystem::new(&config, fixture).with_table_open();
        let session = Session::new(mock.clone(), config, Credentials::new("anna", "geheim"));
        session.open_details(2).await.unwrap();
        session.open_parts().await.unwrap();
        let parts = session.read_parts().await.unwrap();
        assert_eq!(parts.positions.len(), 1);
        assert!(mock.history().contains(&"details 3".to_string()));
    }
}
