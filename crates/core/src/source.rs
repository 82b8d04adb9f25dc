//! Extract source definitions and validation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChurroError, Result};
use crate::schedule::parse_cron;

// ── Scheme ────────────────────────────────────────────────────

/// Data-format scheme of an extract source.
///
/// Closed set: the worker launcher matches exhaustively over this enum,
/// so adding a scheme is a compile-time-checked change everywhere one
/// is dispatched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Csv,
    Xml,
    Json,
    Jsonpath,
    Spreadsheet,
    Api,
    #[serde(rename = "http-post")]
    HttpPost,
}

impl Scheme {
    /// True for polling-style sources driven by one long-lived worker.
    pub fn is_api(&self) -> bool {
        matches!(self, Scheme::Api)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Csv => "csv",
            Scheme::Xml => "xml",
            Scheme::Json => "json",
            Scheme::Jsonpath => "jsonpath",
            Scheme::Spreadsheet => "spreadsheet",
            Scheme::Api => "api",
            Scheme::HttpPost => "http-post",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = ChurroError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csv" => Ok(Scheme::Csv),
            "xml" => Ok(Scheme::Xml),
            "json" => Ok(Scheme::Json),
            "jsonpath" => Ok(Scheme::Jsonpath),
            "spreadsheet" => Ok(Scheme::Spreadsheet),
            "api" => Ok(Scheme::Api),
            "http-post" => Ok(Scheme::HttpPost),
            other => Err(ChurroError::InvalidSource(format!(
                "unsupported scheme '{}'",
                other
            ))),
        }
    }
}

// ── Per-column rules and extensions ───────────────────────────

/// One per-column extraction rule. The scheduler carries these opaquely;
/// only the extraction worker interprets them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractRule {
    pub id: String,
    pub column_name: String,
    pub column_path: String,
    pub column_type: String,
    #[serde(default)]
    pub match_values: Vec<String>,
}

/// A post-processing extension attached to a source. Opaque here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Extension {
    pub id: String,
    pub extension_path: String,
}

// ── ExtractSource ─────────────────────────────────────────────

/// Configuration for one ingestion point.
///
/// Drop-style sources (`scheme != api`) name a watched directory and a
/// file-matching regex; API-style sources name a poll URL and a cron
/// expression. `initialized` and `running` are derived at read time and
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSource {
    pub id: String,
    pub name: String,
    /// Watched directory (drop-style) or poll URL (api-style).
    pub path: String,
    pub scheme: Scheme,
    /// File-name match expression; required unless `scheme == api`.
    #[serde(default)]
    pub regex: String,
    pub tablename: String,
    /// Poll schedule; required when `scheme == api`.
    #[serde(default)]
    pub cron_expression: Option<String>,
    #[serde(default)]
    pub skip_headers: u32,
    #[serde(default)]
    pub extract_rules: BTreeMap<String, ExtractRule>,
    #[serde(default)]
    pub extensions: BTreeMap<String, Extension>,

    /// Destination table exists. Derived, not persisted.
    #[serde(skip)]
    pub initialized: bool,
    /// An API-source worker is currently active. Derived, not persisted.
    #[serde(skip)]
    pub running: bool,
}

impl ExtractSource {
    /// Validate the source definition.
    ///
    /// Invariants: `regex` is required (and must compile) unless
    /// `scheme == api`; `cron_expression` is required (and must parse)
    /// when `scheme == api`. Rejected sources never reach the watcher.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ChurroError::InvalidSource("source name is empty".into()));
        }
        if self.tablename.trim().is_empty() {
            return Err(ChurroError::InvalidSource(format!(
                "source '{}' has no tablename",
                self.name
            )));
        }
        if self.path.trim().is_empty() {
            return Err(ChurroError::InvalidSource(format!(
                "source '{}' has no path",
                self.name
            )));
        }

        if self.scheme.is_api() {
            match self.cron_expression.as_deref() {
                Some(expr) if !expr.trim().is_empty() => {
                    parse_cron(expr).map_err(|e| {
                        ChurroError::InvalidSource(format!("source '{}': {}", self.name, e))
                    })?;
                }
                _ => {
                    return Err(ChurroError::InvalidSource(format!(
                        "api source '{}' requires a cron_expression",
                        self.name
                    )));
                }
            }
        } else {
            if self.regex.trim().is_empty() {
                return Err(ChurroError::InvalidSource(format!(
                    "source '{}' ({}) requires a regex",
                    self.name, self.scheme
                )));
            }
            regex::Regex::new(&self.regex).map_err(|e| {
                ChurroError::InvalidSource(format!(
                    "source '{}' has an invalid regex '{}': {}",
                    self.name, self.regex, e
                ))
            })?;
        }

        Ok(())
    }
}
