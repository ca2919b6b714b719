//! Wait Mechanisms
//!
//! Polling conditions that gate every step against the remote UI.
//!
//! Each wait re-evaluates its [`WaitCondition`] once per poll interval until
//! it holds or the timeout is exhausted. A wait never gives up early: the
//! full timeout elapses before [`ScoutError::Timeout`] is returned, and the
//! caller decides whether that is fatal or just a negative answer
//! ("no rows appeared").
//!
//! Driver errors raised while polling, typically a stale handle while the
//! table re-renders, count as "not yet" for that tick.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::driver::{Driver, ElementHandle};
use crate::locator::{find_first, Locator};
use crate::result::{ScoutError, ScoutResult};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// WAIT CONDITION
// =============================================================================

/// A condition over the current DOM
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// At least one match exists
    Presence(Locator),
    /// The first match is displayed
    Visibility(Locator),
    /// Nothing matches, or the first match is hidden
    Invisibility(Locator),
    /// Nothing matches
    Absence(Locator),
    /// The first alternative whose first match is displayed; list order is priority
    FirstOf(Vec<Locator>),
}

impl WaitCondition {
    /// Get description for error messages
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Presence(l) => format!("presence of {l}"),
            Self::Visibility(l) => format!("visibility of {l}"),
            Self::Invisibility(l) => format!("invisibility of {l}"),
            Self::Absence(l) => format!("absence of {l}"),
            Self::FirstOf(ls) => {
                let names: Vec<String> = ls.iter().map(ToString::to_string).collect();
                format!("first visible of [{}]", names.join(", "))
            }
        }
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Result of a successful wait
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
    /// Index of the alternative that matched (0 for single conditions)
    pub matched_index: usize,
}

// =============================================================================
// WAITER IMPLEMENTATION
// =============================================================================

/// Waiter bound to one driver
#[derive(Debug)]
pub struct Waiter<'a, D: Driver + ?Sized> {
    driver: &'a D,
    options: WaitOptions,
}

impl<'a, D: Driver + ?Sized> Waiter<'a, D> {
    /// Create a waiter with session-wide default options
    #[must_use]
    pub const fn new(driver: &'a D, options: WaitOptions) -> Self {
        Self { driver, options }
    }

    /// Default options used by the `await_*` shortcuts
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Poll `condition` (inside `scope` when given) until it holds or `options` expire
    pub async fn wait_for(
        &self,
        condition: &WaitCondition,
        scope: Option<&ElementHandle>,
        options: &WaitOptions,
    ) -> ScoutResult<WaitResult> {
        let start = Instant::now();
        let mut last_error: Option<String> = None;

        loop {
            match self.check(condition, scope).await {
                Ok(Some(index)) => {
                    return Ok(WaitResult {
                        elapsed: start.elapsed(),
                        waited_for: condition.description(),
                        matched_index: index,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    trace!(condition = %condition.description(), error = %e, "poll error");
                    last_error = Some(e.to_string());
                }
            }
            if start.elapsed() >= options.timeout() {
                break;
            }
            tokio::time::sleep(options.poll_interval()).await;
        }

        let condition = match last_error {
            Some(e) => format!("{} (last error: {e})", condition.description()),
            None => condition.description(),
        };
        Err(ScoutError::Timeout {
            condition,
            ms: options.timeout_ms,
        })
    }

    /// Evaluate once. `Some(index)` when the condition holds.
    async fn check(
        &self,
        condition: &WaitCondition,
        scope: Option<&ElementHandle>,
    ) -> ScoutResult<Option<usize>> {
        let held = match condition {
            WaitCondition::Presence(locator) => {
                !self.driver.find_all(locator, scope).await?.is_empty()
            }
            WaitCondition::Absence(locator) => {
                self.driver.find_all(locator, scope).await?.is_empty()
            }
            WaitCondition::Visibility(locator) => self.first_visible(locator, scope).await?,
            WaitCondition::Invisibility(locator) => {
                match find_first(self.driver, locator, scope).await? {
                    None => true,
                    Some(element) => match self.driver.is_displayed(&element).await {
                        Ok(shown) => !shown,
                        // re-rendered away between lookup and check
                        Err(ScoutError::StaleElement { .. }) => true,
                        Err(e) => return Err(e),
                    },
                }
            }
            WaitCondition::FirstOf(alternatives) => {
                for (index, locator) in alternatives.iter().enumerate() {
                    match self.first_visible(locator, scope).await {
                        Ok(true) => return Ok(Some(index)),
                        Ok(false) => {}
                        Err(e) => trace!(alternative = index, error = %e, "alternative not ready"),
                    }
                }
                false
            }
        };
        Ok(held.then_some(0))
    }

    async fn first_visible(
        &self,
        locator: &Locator,
        scope: Option<&ElementHandle>,
    ) -> ScoutResult<bool> {
        match find_first(self.driver, locator, scope).await? {
            Some(element) => self.driver.is_displayed(&element).await,
            None => Ok(false),
        }
    }

    /// At least one match exists in the DOM
    pub async fn await_presence(&self, locator: &Locator) -> ScoutResult<WaitResult> {
        self.wait_for(&WaitCondition::Presence(locator.clone()), None, &self.options)
            .await
    }

    /// At least one match exists inside `scope`
    pub async fn await_presence_in(
        &self,
        scope: &ElementHandle,
        locator: &Locator,
    ) -> ScoutResult<WaitResult> {
        self.wait_for(
            &WaitCondition::Presence(locator.clone()),
            Some(scope),
            &self.options,
        )
        .await
    }

    /// The first match is displayed
    pub async fn await_visibility(&self, locator: &Locator) -> ScoutResult<WaitResult> {
        self.wait_for(&WaitCondition::Visibility(locator.clone()), None, &self.options)
            .await
    }

    /// Nothing matches or the first match is hidden
    pub async fn await_invisibility(&self, locator: &Locator) -> ScoutResult<WaitResult> {
        self.wait_for(
            &WaitCondition::Invisibility(locator.clone()),
            None,
            &self.options,
        )
        .await
    }

    /// Nothing matches
    pub async fn await_absence(&self, locator: &Locator) -> ScoutResult<WaitResult> {
        self.wait_for(&WaitCondition::Absence(locator.clone()), None, &self.options)
            .await
    }

    /// Index of the first alternative whose first match is displayed.
    ///
    /// All alternatives are polled each tick; when several are visible in the
    /// same tick the lowest index wins.
    pub async fn await_first_of(&self, alternatives: &[Locator]) -> ScoutResult<usize> {
        let result = self
            .wait_for(
                &WaitCondition::FirstOf(alternatives.to_vec()),
                None,
                &self.options,
            )
            .await?;
        Ok(result.matched_index)
    }

    /// Visibility wait with its own timeout where a timeout means "no".
    ///
    /// Used for transient elements that may or may not show up, such as a
    /// load indicator that flashes faster than the poll interval.
    pub async fn appears_within(&self, locator: &Locator, timeout_ms: u64) -> ScoutResult<bool> {
        let options = self.options.with_timeout(timeout_ms);
        match self
            .wait_for(&WaitCondition::Visibility(locator.clone()), None, &options)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_timeout() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    /// Element that shows up after a number of lookups
    #[derive(Debug, Clone, Copy)]
    struct Stub {
        present_after: u32,
        visible_after: u32,
        hidden_after: Option<u32>,
    }

    impl Stub {
        const fn visible_now() -> Self {
            Self {
                present_after: 0,
                visible_after: 0,
                hidden_after: None,
            }
        }
    }

    #[derive(Debug, Default)]
    struct StubDriver {
        stubs: HashMap<String, Stub>,
        lookups: Mutex<HashMap<String, u32>>,
    }

    impl StubDriver {
        fn with(mut self, selector: &str, stub: Stub) -> Self {
            self.stubs.insert(selector.to_string(), stub);
            self
        }

        fn count(&self, selector: &str) -> u32 {
            *self.lookups.lock().unwrap().get(selector).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl Driver for StubDriver {
        async fn open(&self, _url: &str) -> ScoutResult<()> {
            Ok(())
        }

        async fn find_all(
            &self,
            locator: &Locator,
            _scope: Option<&ElementHandle>,
        ) -> ScoutResult<Vec<ElementHandle>> {
            let mut lookups = self.lookups.lock().unwrap();
            let n = lookups.entry(locator.selector.clone()).or_insert(0);
            *n += 1;
            match self.stubs.get(&locator.selector) {
                Some(stub) if *n > stub.present_after => {
                    Ok(vec![ElementHandle::new(locator.selector.clone())])
                }
                _ => Ok(vec![]),
            }
        }

        async fn click(&self, _element: &ElementHandle) -> ScoutResult<()> {
            Ok(())
        }

        async fn type_text(&self, _e: &ElementHandle, _t: &str, _s: bool) -> ScoutResult<()> {
            Ok(())
        }

        async fn read_text(&self, _element: &ElementHandle) -> ScoutResult<String> {
            Ok(String::new())
        }

        async fn read_attribute(
            &self,
            _element: &ElementHandle,
            _name: &str,
        ) -> ScoutResult<Option<String>> {
            Ok(None)
        }

        async fn is_displayed(&self, element: &ElementHandle) -> ScoutResult<bool> {
            let stub = self.stubs[element.id()];
            let n = self.count(element.id());
            let shown = n > stub.visible_after;
            let hidden = stub.hidden_after.is_some_and(|h| n > h);
            Ok(shown && !hidden)
        }

        async fn set_select(&self, _e: &ElementHandle, _v: &str) -> ScoutResult<()> {
            Ok(())
        }

        async fn get_select(&self, _e: &ElementHandle) -> ScoutResult<String> {
            Ok(String::new())
        }

        async fn upload(&self, _e: &ElementHandle, _p: &Path) -> ScoutResult<()> {
            Ok(())
        }

        async fn run_script(
            &self,
            _script: &str,
            _args: &[ElementHandle],
        ) -> ScoutResult<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }

        async fn close(&self) -> ScoutResult<()> {
            Ok(())
        }
    }

    fn fast() -> WaitOptions {
        WaitOptions::new().with_timeout(200).with_poll_interval(5)
    }

    mod wait_options_tests {
        use super::*;

        #[test]
        fn test_wait_options_default() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout_ms, DEFAULT_WAIT_TIMEOUT_MS);
            assert_eq!(opts.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        }

        #[test]
        fn test_wait_options_chained() {
            let opts = WaitOptions::new().with_timeout(10_000).with_poll_interval(200);
            assert_eq!(opts.timeout(), Duration::from_millis(10_000));
            assert_eq!(opts.poll_interval(), Duration::from_millis(200));
        }
    }

    mod condition_tests {
        use super::*;

        #[test]
        fn test_descriptions() {
            let rows = Locator::css("tr.row");
            assert_eq!(
                WaitCondition::Presence(rows.clone()).description(),
                "presence of css:tr.row"
            );
            assert_eq!(
                WaitCondition::FirstOf(vec![rows, Locator::id("empty")]).description(),
                "first visible of [css:tr.row, id:empty]"
            );
        }
    }

    mod waiter_tests {
        use super::*;

        #[tokio::test]
        async fn test_presence_after_delay() {
            let driver = StubDriver::default().with(
                "#nav",
                Stub {
                    present_after: 3,
                    ..Stub::visible_now()
                },
            );
            let waiter = Waiter::new(&driver, fast());
            let result = waiter.await_presence(&Locator::css("#nav")).await.unwrap();
            assert_eq!(result.matched_index, 0);
            assert_eq!(driver.count("#nav"), 4);
        }

        #[tokio::test]
        async fn test_presence_times_out_after_full_timeout() {
            let driver = StubDriver::default();
            let waiter = Waiter::new(&driver, fast());
            let started = Instant::now();
            let err = waiter.await_presence(&Locator::css("#nav")).await.unwrap_err();
            assert!(started.elapsed() >= Duration::from_millis(200));
            match err {
                ScoutError::Timeout { ms, condition } => {
                    assert_eq!(ms, 200);
                    assert!(condition.contains("css:#nav"));
                }
                other => panic!("expected timeout, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_absence_and_invisibility_of_missing_element() {
            let driver = StubDriver::default();
            let waiter = Waiter::new(&driver, fast());
            assert!(waiter.await_absence(&Locator::css(".dialog")).await.is_ok());
            assert!(waiter.await_invisibility(&Locator::css(".dialog")).await.is_ok());
        }

        #[tokio::test]
        async fn test_invisibility_waits_for_hide() {
            let driver = StubDriver::default().with(
                ".blockUI",
                Stub {
                    hidden_after: Some(3),
                    ..Stub::visible_now()
                },
            );
            let waiter = Waiter::new(&driver, fast());
            waiter
                .await_invisibility(&Locator::css(".blockUI"))
                .await
                .unwrap();
            assert!(driver.count(".blockUI") >= 3);
        }

        #[tokio::test]
        async fn test_first_of_prefers_lowest_index_in_same_tick() {
            let driver = StubDriver::default()
                .with("tr.row", Stub::visible_now())
                .with("#empty", Stub::visible_now());
            let waiter = Waiter::new(&driver, fast());
            let index = waiter
                .await_first_of(&[Locator::css("tr.row"), Locator::css("#empty")])
                .await
                .unwrap();
            assert_eq!(index, 0);
        }

        #[tokio::test]
        async fn test_first_of_returns_second_alternative() {
            let driver = StubDriver::default().with("#empty", Stub::visible_now());
            let waiter = Waiter::new(&driver, fast());
            let index = waiter
                .await_first_of(&[Locator::css("tr.row"), Locator::css("#empty")])
                .await
                .unwrap();
            assert_eq!(index, 1);
        }

        #[tokio::test]
        async fn test_first_of_ignores_present_but_hidden() {
            let driver = StubDriver::default()
                .with(
                    "tr.row",
                    Stub {
                        visible_after: 1000,
                        ..Stub::visible_now()
                    },
                )
                .with(
                    "#empty",
                    Stub {
                        visible_after: 2,
                        ..Stub::visible_now()
                    },
                );
            let waiter = Waiter::new(&driver, fast());
            let index = waiter
                .await_first_of(&[Locator::css("tr.row"), Locator::css("#empty")])
                .await
                .unwrap();
            assert_eq!(index, 1);
        }

        #[tokio::test]
        async fn test_appears_within_timeout_is_negative() {
            let driver = StubDriver::default();
            let waiter = Waiter::new(&driver, fast());
            let shown = waiter
                .appears_within(&Locator::css(".loading"), 20)
                .await
                .unwrap();
            assert!(!shown);
        }
    }
}
