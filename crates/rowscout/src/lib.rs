//! rowscout: config-driven automation of paginated web tables
//!
//! rowscout drives a web application through a browser: it logs in, walks
//! a paginated data table to find the row holding a value, and acts on
//! that row (file uploads, parts checklists). Every selector comes from a
//! per-client YAML configuration, so the same code serves several
//! deployments of the target system.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    ROWSCOUT Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ YAML       │    │ Session    │    │ Driver     │            │
//! │   │ Config     │───►│ + Flows    │───►│ (chromium  │            │
//! │   │ (tokens)   │    │            │    │  or mock)  │            │
//! │   └────────────┘    └─────┬──────┘    └─────▲──────┘            │
//! │                           │                 │                   │
//! │                     ┌─────▼──────┐    ┌─────┴──────┐            │
//! │                     │ TableView  │───►│ Waiter     │            │
//! │                     │ + Actions  │    │ (polling)  │            │
//! │                     └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - `browser`: [`ChromiumDriver`] over the Chrome `DevTools` Protocol
//! - `http`: [`probe`](probe::probe) reachability check with reqwest
//!
//! Without features the crate still runs every flow against
//! [`MockTargetSystem`].

#![warn(missing_docs)]

/// Atomic UI actions: uploads, checkboxes and the parts tab
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod actions;

/// Browser launch options and the CDP driver
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]
pub mod browser;

/// Per-client configuration with token substitution
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod config;

/// Driver abstraction over a browser page
pub mod driver;

/// End-to-end workflows
pub mod flows;

/// Locators and lookup helpers
pub mod locator;

/// In-memory target system for tests and dry runs
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod mock;

/// HTTP reachability probe
pub mod probe;

mod result;

/// Row search across pages
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod search;

/// Session lifecycle
pub mod session;

/// Polling wait engine
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod wait;

pub use actions::{
    classify_alert, ActionStage, CheckStatus, PartPosition, PartsSummary, UploadOutcome,
};
#[cfg(feature = "browser")]
pub use browser::ChromiumDriver;
pub use browser::BrowserOptions;
pub use config::{ClientConfig, Token, Tokens};
pub use driver::{Driver, ElementHandle};
pub use flows::{
    check_parts_flow, find_flow, parts_flow, upload_flow, CheckPartsRequest, CheckReport,
    FindReport, FindRequest, PartsReport, PartsRequest, UploadReport, UploadRequest,
};
pub use locator::{Locator, Strategy, FIELD_PLACEHOLDER};
pub use mock::{MockTargetSystem, TableFixture};
pub use probe::{classify_status, ProbeReport, StatusClass};
pub use result::{ConfigError, ScoutError, ScoutResult};
pub use search::{RowDescriptor, SearchMode, TableView};
pub use session::{run_scoped, Credentials, Session};
pub use wait::{WaitCondition, WaitOptions, WaitResult, Waiter};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        run_scoped, ClientConfig, Credentials, Driver, Locator, RowDescriptor, ScoutError,
        ScoutResult, SearchMode, Session, Tokens, UploadOutcome, WaitOptions,
    };
}
