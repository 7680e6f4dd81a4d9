//! Deep links into the companion source viewer.
//!
//! A deep link carries everything the viewer needs to open a source
//! location:
//!
//! ```text
//! <base>/?url=<source>&lineNumber=<n>&columnNumber=<n>&functionName=<name>&
//! ```
//!
//! Values are `application/x-www-form-urlencoded`, which is what the
//! viewer's `URLSearchParams` decodes.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::form_urlencoded::byte_serialize;
use url::Url;

pub const DEFAULT_VIEWER_BASE_URL: &str = "http://localhost:3000";

pub const PARAM_URL: &str = "url";
pub const PARAM_LINE_NUMBER: &str = "lineNumber";
pub const PARAM_COLUMN_NUMBER: &str = "columnNumber";
pub const PARAM_FUNCTION_NAME: &str = "functionName";

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid viewer base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Not a deep link: {0}")]
    NotADeepLink(String),
}

/// A source position as the viewer sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub url: String,
    pub line_number: i64,
    pub column_number: i64,
    pub function_name: String,
}

/// Values the viewer falls back to when a query parameter is absent or, for
/// the numeric ones, not an integer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerDefaults {
    pub url: String,
    pub line_number: i64,
    pub column_number: i64,
    pub function_name: String,
}

/// Builder for deep links rooted at one viewer base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerLink {
    base: String,
    prefix: String,
}

impl ViewerLink {
    /// `base` must be an absolute http(s) URL. Trailing slashes are dropped so
    /// the path separator is never doubled.
    pub fn new(base: &str) -> Result<Self> {
        let trimmed = base.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|err| ProtocolError::InvalidBaseUrl {
            url: base.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProtocolError::InvalidBaseUrl {
                url: base.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(ProtocolError::InvalidBaseUrl {
                url: base.to_string(),
                reason: "base URL must not carry a query or fragment".to_string(),
            });
        }

        Ok(Self {
            base: trimmed.to_string(),
            prefix: format!("{trimmed}/?"),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn link(&self, location: &SourceLocation) -> String {
        format!(
            "{}{}={}&{}={}&{}={}&{}={}&",
            self.prefix,
            PARAM_URL,
            encode(&location.url),
            PARAM_LINE_NUMBER,
            location.line_number,
            PARAM_COLUMN_NUMBER,
            location.column_number,
            PARAM_FUNCTION_NAME,
            encode(&location.function_name),
        )
    }

    /// Whether `url` already points at this viewer.
    pub fn is_deep_link(&self, url: &str) -> bool {
        url.starts_with(&self.prefix)
    }

    /// Decode a link produced by [`ViewerLink::link`], resolving absent
    /// parameters the way the viewer does.
    pub fn parse(&self, link: &str, defaults: &ViewerDefaults) -> Result<SourceLocation> {
        if !self.is_deep_link(link) {
            return Err(ProtocolError::NotADeepLink(link.to_string()));
        }
        let parsed = Url::parse(link).map_err(|_| ProtocolError::NotADeepLink(link.to_string()))?;

        let (mut url, mut line, mut column, mut function) = (None, None, None, None);
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                PARAM_URL => url = Some(value.into_owned()),
                PARAM_LINE_NUMBER => line = value.trim().parse::<i64>().ok(),
                PARAM_COLUMN_NUMBER => column = value.trim().parse::<i64>().ok(),
                PARAM_FUNCTION_NAME => function = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(SourceLocation {
            url: url.unwrap_or_else(|| defaults.url.clone()),
            line_number: line.unwrap_or(defaults.line_number),
            column_number: column.unwrap_or(defaults.column_number),
            function_name: function.unwrap_or_else(|| defaults.function_name.clone()),
        })
    }
}

impl Default for ViewerLink {
    fn default() -> Self {
        Self {
            base: DEFAULT_VIEWER_BASE_URL.to_string(),
            prefix: format!("{DEFAULT_VIEWER_BASE_URL}/?"),
        }
    }
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}
