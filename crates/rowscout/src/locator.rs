//! Locators and one-shot element resolution.
//!
//! A [`Locator`] is a `(strategy, selector)` pair as written in the client
//! configuration. Resolution against the driver happens through
//! [`find_all`], [`find_first`] and [`require`]; none of them wait or retry.
//! Waiting is the job of [`crate::wait::Waiter`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::driver::{Driver, ElementHandle};
use crate::result::{ScoutError, ScoutResult};

/// Placeholder bound per call when a locator targets a specific field
pub const FIELD_PLACEHOLDER: &str = "SEARCH_FIELD_STRING";

/// Strategy used to interpret a selector string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Element id attribute
    Id,
    /// XPath expression
    Xpath,
    /// CSS selector
    Css,
    /// Single class name
    Class,
    /// `name` attribute
    Name,
    /// Tag name
    Tag,
    /// Exact link text
    Link,
    /// Partial link text
    PartialLink,
}

impl Strategy {
    /// Short name used in configuration files and log output
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Xpath => "xpath",
            Self::Css => "css",
            Self::Class => "class",
            Self::Name => "name",
            Self::Tag => "tag",
            Self::Link => "link",
            Self::PartialLink => "partial_link",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(strategy, selector)` pair identifying UI elements.
///
/// Locators are plain data; they carry no element state and can be cloned
/// freely. Templates containing [`FIELD_PLACEHOLDER`] are bound with
/// [`Locator::bind_field`] before use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Locator {
    /// How to interpret `selector`
    #[serde(alias = "locator_strategie")]
    pub strategy: Strategy,
    /// Selector text
    pub selector: String,
}

impl Locator {
    /// Create a locator
    #[must_use]
    pub fn new(strategy: Strategy, selector: impl Into<String>) -> Self {
        Self {
            strategy,
            selector: selector.into(),
        }
    }

    /// CSS locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Css, selector)
    }

    /// XPath locator
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Xpath, selector)
    }

    /// Id locator
    #[must_use]
    pub fn id(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Id, selector)
    }

    /// Replace every occurrence of `token` in the selector.
    ///
    /// Plain substring replacement, same as configuration loading.
    #[must_use]
    pub fn bind(&self, token: &str, value: &str) -> Self {
        Self {
            strategy: self.strategy,
            selector: self.selector.replace(token, value),
        }
    }

    /// Bind the per-call field placeholder
    #[must_use]
    pub fn bind_field(&self, value: &str) -> Self {
        self.bind(FIELD_PLACEHOLDER, value)
    }

    /// Whether the selector still contains `token`
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.selector.contains(token)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strategy, self.selector)
    }
}

/// All elements matching `locator`, optionally inside `scope`
pub async fn find_all<D: Driver + ?Sized>(
    driver: &D,
    locator: &Locator,
    scope: Option<&ElementHandle>,
) -> ScoutResult<Vec<ElementHandle>> {
    driver.find_all(locator, scope).await
}

/// First element matching `locator`, or `None`
pub async fn find_first<D: Driver + ?Sized>(
    driver: &D,
    locator: &Locator,
    scope: Option<&ElementHandle>,
) -> ScoutResult<Option<ElementHandle>> {
    Ok(driver.find_all(locator, scope).await?.into_iter().next())
}

/// First element matching `locator`, or [`ScoutError::ElementNotFound`]
pub async fn require<D: Driver + ?Sized>(
    driver: &D,
    locator: &Locator,
    scope: Option<&ElementHandle>,
) -> ScoutResult<ElementHandle> {
    find_first(driver, locator, scope)
        .await?
        .ok_or_else(|| ScoutError::ElementNotFound {
            locator: locator.to_string(),
        })
}
