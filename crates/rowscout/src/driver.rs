//! Driver - Abstract Browser Capability Trait
//!
//! Everything rowscout does to the target system goes through [`Driver`].
//! The trait is deliberately narrow: element lookup, a handful of element
//! interactions, script execution and teardown.
//!
//! # Implementations
//!
//! - [`crate::browser::ChromiumDriver`] - real browser over CDP (`browser` feature)
//! - [`crate::mock::MockTargetSystem`] - in-memory simulation used by tests
//!
//! # Handle lifetime
//!
//! An [`ElementHandle`] is only valid until the next navigation or table
//! re-render. Implementations report stale use as
//! [`ScoutError::StaleElement`](crate::result::ScoutError::StaleElement);
//! callers must re-resolve after every page change instead of caching handles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::locator::Locator;
use crate::result::ScoutResult;

/// Opaque reference to a located UI node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    id: String,
}

impl ElementHandle {
    /// Create a handle from a driver-specific id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Driver-specific id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Capability interface consumed by the locator, wait and action layers
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigate to URL
    async fn open(&self, url: &str) -> ScoutResult<()>;

    /// All elements matching `locator`, inside `scope` when given
    async fn find_all(
        &self,
        locator: &Locator,
        scope: Option<&ElementHandle>,
    ) -> ScoutResult<Vec<ElementHandle>>;

    /// Click element
    async fn click(&self, element: &ElementHandle) -> ScoutResult<()>;

    /// Clear the element, type `text`, and optionally press Enter
    async fn type_text(&self, element: &ElementHandle, text: &str, submit: bool)
        -> ScoutResult<()>;

    /// Rendered text content
    async fn read_text(&self, element: &ElementHandle) -> ScoutResult<String>;

    /// Property or attribute value (property wins, as in WebDriver)
    async fn read_attribute(&self, element: &ElementHandle, name: &str)
        -> ScoutResult<Option<String>>;

    /// Whether the element is rendered and not hidden by CSS
    async fn is_displayed(&self, element: &ElementHandle) -> ScoutResult<bool>;

    /// Select the `<option>` with the given value
    async fn set_select(&self, element: &ElementHandle, value: &str) -> ScoutResult<()>;

    /// Value of the selected `<option>`
    async fn get_select(&self, element: &ElementHandle) -> ScoutResult<String>;

    /// Hand a local file to an `<input type=file>`
    async fn upload(&self, element: &ElementHandle, path: &Path) -> ScoutResult<()>;

    /// Run a script; `args` are exposed to it as `arguments[0..]`
    async fn run_script(
        &self,
        script: &str,
        args: &[ElementHandle],
    ) -> ScoutResult<serde_json::Value>;

    /// Close the browser
    async fn close(&self) -> ScoutResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_handle_roundtrip_id() {
        let handle = ElementHandle::new("g2/row/4");
        assert_eq!(handle.id(), "g2/row/4");
        assert_eq!(handle.to_string(), "g2/row/4");
    }

    #[test]
    fn test_element_handle_equality() {
        assert_eq!(ElementHandle::new("a"), ElementHandle::new("a"));
        assert_ne!(ElementHandle::new("a"), ElementHandle::new("b"));
    }
}
