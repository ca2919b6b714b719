//! Browser control over the Chrome `DevTools` Protocol.
//!
//! [`BrowserOptions`] is always available so callers can describe a launch
//! without the `browser` feature. [`ChromiumDriver`] needs the feature and
//! implements [`Driver`](crate::driver::Driver) with chromiumoxide.
//!
//! Every session runs in its own profile directory, passed in by the caller
//! and removed by [`Session::close`](crate::session::Session::close).

use std::path::PathBuf;

/// Browser launch options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Chromium sandbox (disable for containers)
    pub sandbox: bool,
    /// Path to the Chromium binary (None = auto-detect)
    pub executable_path: Option<PathBuf>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            executable_path: None,
        }
    }
}

impl BrowserOptions {
    /// Default options: headless, sandboxed, auto-detected binary
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set the Chromium binary
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(
    clippy::significant_drop_tightening,
    clippy::missing_errors_doc,
    clippy::items_after_statements
)]
mod cdp {
    use super::BrowserOptions;
    use crate::driver::{Driver, ElementHandle};
    use crate::locator::{Locator, Strategy};
    use crate::result::{ScoutError, ScoutResult};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
    use chromiumoxide::element::Element;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde_json::Value;
    use std::collections::{HashMap, VecDeque};
    use std::path::Path;
    use std::sync::{Arc, Mutex, PoisonError};
    use tokio::sync::Mutex as AsyncMutex;
    use tracing::{debug, warn};

    /// Attribute used to address a scope element from XPath
    const SCOPE_ATTRIBUTE: &str = "data-rowscout-scope";

    /// Live element handles kept per page
    const HANDLE_CAPACITY: usize = 4096;

    fn driver_err(e: impl std::fmt::Display) -> ScoutError {
        ScoutError::driver(e.to_string())
    }

    /// Quote `text` as an XPath string literal
    fn xpath_literal(text: &str) -> String {
        if !text.contains('\'') {
            format!("'{text}'")
        } else if !text.contains('"') {
            format!("\"{text}\"")
        } else {
            let parts: Vec<String> = text.split('\'').map(|p| format!("'{p}'")).collect();
            format!("concat({})", parts.join(", \"'\", "))
        }
    }

    /// Quote `text` as a CSS attribute value
    fn css_literal(text: &str) -> String {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    }

    /// A locator rewritten into one of the two query languages CDP offers
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Query {
        Css(String),
        Xpath(String),
    }

    fn query_for(locator: &Locator) -> Query {
        let s = locator.selector.as_str();
        match locator.strategy {
            Strategy::Css | Strategy::Tag => Query::Css(s.to_string()),
            Strategy::Id => Query::Css(format!("[id={}]", css_literal(s))),
            Strategy::Class => Query::Css(format!("[class~={}]", css_literal(s))),
            Strategy::Name => Query::Css(format!("[name={}]", css_literal(s))),
            Strategy::Xpath => Query::Xpath(s.to_string()),
            Strategy::Link => Query::Xpath(format!("//a[normalize-space(.)={}]", xpath_literal(s))),
            Strategy::PartialLink => Query::Xpath(format!(
                "//a[contains(normalize-space(.), {})]",
                xpath_literal(s)
            )),
        }
    }

    /// XPath relative to the element tagged with `scope_id`
    fn scoped_xpath(scope_id: &str, xpath: &str) -> String {
        let root = format!("(//*[@{SCOPE_ATTRIBUTE}={}])[1]", xpath_literal(scope_id));
        let relative = xpath.trim_start_matches('.');
        if relative.starts_with('/') {
            format!("{root}{relative}")
        } else {
            format!("{root}//{relative}")
        }
    }

    /// Wrap a function body so it reports detached nodes and returns JSON text
    fn element_fn(body: &str) -> String {
        format!(
            "function() {{ if (!this.isConnected) {{ return JSON.stringify({{ stale: true }}); }} \
             const value = (function() {{ {body} }}).call(this); \
             return JSON.stringify({{ stale: false, value: value === undefined ? null : value }}); }}"
        )
    }

    /// Issued element handles in issue order.
    ///
    /// Polling and pagination issue a fresh handle for every lookup, so once
    /// more than `capacity` are live the oldest are dropped. A dropped handle
    /// reads as [`ScoutError::StaleElement`], which callers already answer
    /// with a new lookup. Ids are never reused, not even after [`clear`].
    ///
    /// [`clear`]: HandleRegistry::clear
    #[derive(Debug)]
    struct HandleRegistry<T> {
        entries: HashMap<String, T>,
        order: VecDeque<String>,
        next: u64,
        capacity: usize,
    }

    impl<T: Clone> HandleRegistry<T> {
        fn new(capacity: usize) -> Self {
            Self {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next: 0,
                capacity: capacity.max(1),
            }
        }

        fn insert(&mut self, value: T) -> String {
            let id = format!("c{}", self.next);
            self.next += 1;
            self.entries.insert(id.clone(), value);
            self.order.push_back(id.clone());
            while self.order.len() > self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
            id
        }

        fn get(&self, id: &str) -> Option<T> {
            self.entries.get(id).cloned()
        }

        fn clear(&mut self) {
            self.entries.clear();
            self.order.clear();
        }

        fn len(&self) -> usize {
            self.entries.len()
        }
    }

    /// Chromium driven over CDP
    #[derive(Debug)]
    pub struct ChromiumDriver {
        browser: AsyncMutex<CdpBrowser>,
        page: CdpPage,
        handler: tokio::task::JoinHandle<()>,
        elements: Mutex<HandleRegistry<Arc<Element>>>,
    }

    impl ChromiumDriver {
        /// Launch Chromium with its profile in `profile_dir`
        pub async fn launch(options: &BrowserOptions, profile_dir: &Path) -> ScoutResult<Self> {
            let mut builder = CdpConfig::builder().user_data_dir(profile_dir);
            if !options.headless {
                builder = builder.with_head();
            }
            if !options.sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(ref path) = options.executable_path {
                builder = builder.chrome_executable(path);
            }
            let config = builder
                .build()
                .map_err(|message| ScoutError::BrowserLaunch { message })?;

            let (browser, mut handler) =
                CdpBrowser::launch(config)
                    .await
                    .map_err(|e| ScoutError::BrowserLaunch {
                        message: e.to_string(),
                    })?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| ScoutError::BrowserLaunch {
                    message: e.to_string(),
                })?;
            debug!(profile = %profile_dir.display(), headless = options.headless, "browser launched");

            Ok(Self {
                browser: AsyncMutex::new(browser),
                page,
                handler,
                elements: Mutex::new(HandleRegistry::new(HANDLE_CAPACITY)),
            })
        }

        fn register(&self, elements: Vec<Element>) -> Vec<ElementHandle> {
            let mut registry = self.elements.lock().unwrap_or_else(PoisonError::into_inner);
            elements
                .into_iter()
                .map(|element| ElementHandle::new(registry.insert(Arc::new(element))))
                .collect()
        }

        fn element(&self, handle: &ElementHandle) -> ScoutResult<Arc<Element>> {
            self.elements
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(handle.id())
                .ok_or_else(|| ScoutError::StaleElement {
                    handle: handle.id().to_string(),
                })
        }

        /// Run `body` with `this` bound to the element
        async fn eval_on(&self, handle: &ElementHandle, body: &str) -> ScoutResult<Value> {
            let element = self.element(handle)?;
            let returned = element
                .call_js_fn(element_fn(body), false)
                .await
                .map_err(driver_err)?;
            let text = returned
                .result
                .value
                .as_ref()
                .and_then(Value::as_str)
                .ok_or_else(|| ScoutError::driver("element script returned no value"))?;
            let mut envelope: Value = serde_json::from_str(text)?;
            if envelope["stale"].as_bool().unwrap_or(false) {
                return Err(ScoutError::StaleElement {
                    handle: handle.id().to_string(),
                });
            }
            Ok(envelope["value"].take())
        }

        async fn query(&self, query: &Query) -> ScoutResult<Vec<Element>> {
            match query {
                Query::Css(css) => self.page.find_elements(css.as_str()).await,
                Query::Xpath(xpath) => self.page.find_xpaths(xpath.as_str()).await,
            }
            .or_else(|e| {
                // chromiumoxide reports "no node found" as an error
                debug!(error = %e, "query matched nothing");
                Ok(Vec::new())
            })
        }
    }

    #[async_trait]
    impl Driver for ChromiumDriver {
        async fn open(&self, url: &str) -> ScoutResult<()> {
            self.page.goto(url).await.map_err(driver_err)?;
            let mut registry = self.elements.lock().unwrap_or_else(PoisonError::into_inner);
            debug!(released = registry.len(), url, "element handles released");
            registry.clear();
            Ok(())
        }

        async fn find_all(
            &self,
            locator: &Locator,
            scope: Option<&ElementHandle>,
        ) -> ScoutResult<Vec<ElementHandle>> {
            let query = query_for(locator);
            let found = match (scope, &query) {
                (None, query) => self.query(query).await?,
                (Some(scope), Query::Css(css)) => {
                    let element = self.element(scope)?;
                    element
                        .find_elements(css.as_str())
                        .await
                        .unwrap_or_default()
                }
                (Some(scope), Query::Xpath(xpath)) => {
                    let tag = format!(
                        "this.setAttribute({}, {}); return true;",
                        serde_json::to_string(SCOPE_ATTRIBUTE)?,
                        serde_json::to_string(scope.id())?
                    );
                    self.eval_on(scope, &tag).await?;
                    self.query(&Query::Xpath(scoped_xpath(scope.id(), xpath)))
                        .await?
                }
            };
            Ok(self.register(found))
        }

        async fn click(&self, element: &ElementHandle) -> ScoutResult<()> {
            self.element(element)?.click().await.map_err(driver_err)?;
            Ok(())
        }

        async fn type_text(
            &self,
            element: &ElementHandle,
            text: &str,
            submit: bool,
        ) -> ScoutResult<()> {
            self.eval_on(element, "this.value = ''; this.focus(); return true;")
                .await?;
            let el = self.element(element)?;
            el.type_str(text).await.map_err(driver_err)?;
            if submit {
                el.press_key("Enter").await.map_err(driver_err)?;
            }
            Ok(())
        }

        async fn read_text(&self, element: &ElementHandle) -> ScoutResult<String> {
            let value = self
                .eval_on(element, "return this.innerText || this.textContent || '';")
                .await?;
            Ok(value.as_str().unwrap_or_default().to_string())
        }

        async fn read_attribute(
            &self,
            element: &ElementHandle,
            name: &str,
        ) -> ScoutResult<Option<String>> {
            let name = serde_json::to_string(name)?;
            let body = format!(
                "const p = this[{name}]; \
                 if (p !== undefined && p !== null && typeof p !== 'object' && typeof p !== 'function') {{ return String(p); }} \
                 return this.getAttribute({name});"
            );
            let value = self.eval_on(element, &body).await?;
            Ok(value.as_str().map(ToString::to_string))
        }

        async fn is_displayed(&self, element: &ElementHandle) -> ScoutResult<bool> {
            let value = self
                .eval_on(
                    element,
                    "const s = window.getComputedStyle(this); \
                     return s.display !== 'none' && s.visibility !== 'hidden' && \
                     !!(this.offsetWidth || this.offsetHeight || this.getClientRects().length);",
                )
                .await?;
            Ok(value.as_bool().unwrap_or(false))
        }

        async fn set_select(&self, element: &ElementHandle, value: &str) -> ScoutResult<()> {
            let literal = serde_json::to_string(value)?;
            let body = format!(
                "this.value = {literal}; \
                 this.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                 return this.value === {literal};"
            );
            if self.eval_on(element, &body).await?.as_bool() == Some(true) {
                Ok(())
            } else {
                Err(ScoutError::driver(format!("select has no option '{value}'")))
            }
        }

        async fn get_select(&self, element: &ElementHandle) -> ScoutResult<String> {
            let value = self.eval_on(element, "return this.value;").await?;
            Ok(value.as_str().unwrap_or_default().to_string())
        }

        async fn upload(&self, element: &ElementHandle, path: &Path) -> ScoutResult<()> {
            let el = self.element(element)?;
            let absolute = std::fs::canonicalize(path)?;
            let params = SetFileInputFilesParams::builder()
                .files(vec![absolute.display().to_string()])
                .backend_node_id(el.backend_node_id)
                .build()
                .map_err(ScoutError::driver)?;
            self.page.execute(params).await.map_err(driver_err)?;
            Ok(())
        }

        async fn run_script(&self, script: &str, args: &[ElementHandle]) -> ScoutResult<Value> {
            match args {
                [] => {
                    let expression = format!("(function() {{ {script} }}).apply(null, [])");
                    let result = self.page.evaluate(expression).await.map_err(driver_err)?;
                    Ok(result.value().cloned().unwrap_or(Value::Null))
                }
                [target] => {
                    let body = format!("return (function() {{ {script} }}).apply(null, [this]);");
                    self.eval_on(target, &body).await
                }
                _ => Err(ScoutError::driver(
                    "scripts take at most one element argument",
                )),
            }
        }

        async fn close(&self) -> ScoutResult<()> {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                warn!(error = %e, "browser close failed");
            }
            if let Err(e) = browser.wait().await {
                warn!(error = %e, "browser did not exit cleanly");
            }
            self.handler.abort();
            Ok(())
        }
    }

    // chromiumoxide kills the child process when the browser is dropped
    impl Drop for ChromiumDriver {
        fn drop(&mut self) {
            self.handler.abort();
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_query_translation() {
            assert_eq!(
                query_for(&Locator::id("main")),
                Query::Css("[id=\"main\"]".to_string())
            );
            assert_eq!(
                query_for(&Locator::new(Strategy::Class, "blockUI")),
                Query::Css("[class~=\"blockUI\"]".to_string())
            );
            assert_eq!(
                query_for(&Locator::new(Strategy::Link, "Teile")),
                Query::Xpath("//a[normalize-space(.)='Teile']".to_string())
            );
        }

        #[test]
        fn test_xpath_literal_quoting() {
            assert_eq!(xpath_literal("abc"), "'abc'");
            assert_eq!(xpath_literal("it's"), "\"it's\"");
            assert_eq!(
                xpath_literal("a'b\"c"),
                "concat('a', \"'\", 'b\"c')"
            );
        }

        #[test]
        fn test_registry_evicts_oldest_past_capacity() {
            let mut registry = HandleRegistry::new(3);
            let ids: Vec<String> = (0..5).map(|n| registry.insert(n)).collect();
            assert_eq!(registry.len(), 3);
            assert_eq!(registry.get(&ids[0]), None);
            assert_eq!(registry.get(&ids[1]), None);
            assert_eq!(registry.get(&ids[2]), Some(2));
            assert_eq!(registry.get(&ids[4]), Some(4));
        }

        #[test]
        fn test_registry_stays_bounded_under_polling() {
            let mut registry = HandleRegistry::new(HANDLE_CAPACITY);
            for n in 0..HANDLE_CAPACITY * 3 {
                registry.insert(n);
            }
            assert_eq!(registry.len(), HANDLE_CAPACITY);
        }

        #[test]
        fn test_registry_clear_never_reuses_ids() {
            let mut registry = HandleRegistry::new(8);
            let before = registry.insert("row");
            registry.clear();
            assert_eq!(registry.len(), 0);
            assert_eq!(registry.get(&before), None);
            let after = registry.insert("row");
            assert_ne!(before, after);
        }

        #[test]
        fn test_scoped_xpath() {
            assert_eq!(
                scoped_xpath("c4", ".//td"),
                "(//*[@data-rowscout-scope='c4'])[1]//td"
            );
            assert_eq!(
                scoped_xpath("c4", "td[2]"),
                "(//*[@data-rowscout-scope='c4'])[1]//td[2]"
            );
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;
