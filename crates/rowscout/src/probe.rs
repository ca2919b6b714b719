//! HTTP reachability probe for the target system.
//!
//! [`classify_status`] is always available. [`probe`] needs the `http`
//! feature and issues one GET without following redirects, so a login
//! redirect shows up as [`StatusClass::Redirect`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse meaning of an HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// 2xx
    Success,
    /// 301 or 302
    Redirect,
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 429
    RateLimited,
    /// 5xx
    ServerError,
    /// Anything else
    Unexpected,
}

impl StatusClass {
    /// Whether the target answered normally
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Redirect => "redirect",
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::RateLimited => "rate limited",
            Self::ServerError => "server error",
            Self::Unexpected => "unexpected",
        })
    }
}

/// Classify an HTTP status code
#[must_use]
pub const fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        301 | 302 => StatusClass::Redirect,
        400 => StatusClass::BadRequest,
        401 => StatusClass::Unauthorized,
        403 => StatusClass::Forbidden,
        404 => StatusClass::NotFound,
        429 => StatusClass::RateLimited,
        500..=599 => StatusClass::ServerError,
        _ => StatusClass::Unexpected,
    }
}

/// Outcome of [`probe`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Requested URL
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Classified status
    pub class: StatusClass,
    /// `Location` header of a redirect
    pub location: Option<String>,
}

#[cfg(feature = "http")]
mod http {
    use super::{classify_status, ProbeReport, StatusClass};
    use crate::result::{ScoutError, ScoutResult};
    use std::time::Duration;
    use tracing::{error, info, warn};

    /// GET `url` once and classify the answer
    pub async fn probe(url: &str, timeout: Duration) -> ScoutResult<ProbeReport> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ScoutError::driver(format!("HTTP client: {e}")))?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ScoutError::driver(format!("GET {url}: {e}")))?;

        let status = response.status().as_u16();
        let class = classify_status(status);
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        match class {
            StatusClass::Success => info!(url, status, "target reachable"),
            StatusClass::Redirect | StatusClass::Unexpected => {
                warn!(url, status, location = location.as_deref().unwrap_or("-"), %class, "target answered");
            }
            _ => error!(url, status, %class, "target answered with an error"),
        }

        Ok(ProbeReport {
            url: url.to_string(),
            status,
            class,
            location,
        })
    }
}

#[cfg(feature = "http")]
pub use http::probe;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_codes() {
        assert_eq!(classify_status(200), StatusClass::Success);
        assert_eq!(classify_status(204), StatusClass::Success);
        assert_eq!(classify_status(301), StatusClass::Redirect);
        assert_eq!(classify_status(302), StatusClass::Redirect);
        assert_eq!(classify_status(400), StatusClass::BadRequest);
        assert_eq!(classify_status(401), StatusClass::Unauthorized);
        assert_eq!(classify_status(403), StatusClass::Forbidden);
        assert_eq!(classify_status(404), StatusClass::NotFound);
        assert_eq!(classify_status(429), StatusClass::RateLimited);
        assert_eq!(classify_status(503), StatusClass::ServerError);
    }

    #[test]
    fn test_classify_other_codes() {
        assert_eq!(classify_status(307), StatusClass::Unexpected);
        assert_eq!(classify_status(418), StatusClass::Unexpected);
        assert_eq!(classify_status(100), StatusClass::Unexpected);
        assert!(!classify_status(404).is_success());
    }

    #[test]
    fn test_status_class_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&StatusClass::RateLimited).unwrap_or_default(),
            "\"rate_limited\""
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_every_5xx_is_server_error(status in 500u16..600) {
                prop_assert_eq!(classify_status(status), StatusClass::ServerError);
            }

            #[test]
            fn prop_only_2xx_is_success(status in 100u16..600) {
                prop_assert_eq!(
                    classify_status(status).is_success(),
                    (200..300).contains(&status)
                );
            }
        }
    }
}
