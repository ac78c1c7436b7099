use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of network entity a rule filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Ip,
    Url,
    Port,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Ip => "ip",
            RuleKind::Url => "url",
            RuleKind::Port => "port",
        }
    }

    /// Parse from the singular text form stored in the database.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ip" => Some(RuleKind::Ip),
            "url" => Some(RuleKind::Url),
            "port" => Some(RuleKind::Port),
            _ => None,
        }
    }

    /// Parse from the plural form used by the listing query parameter
    /// and the toggle request sections (`ips`, `urls`, `ports`).
    pub fn from_plural(s: &str) -> Option<Self> {
        match s {
            "ips" => Some(RuleKind::Ip),
            "urls" => Some(RuleKind::Url),
            "ports" => Some(RuleKind::Port),
            _ => None,
        }
    }

    /// Plural form used as the listing bucket key.
    pub fn plural(&self) -> &'static str {
        match self {
            RuleKind::Ip => "ips",
            RuleKind::Url => "urls",
            RuleKind::Port => "ports",
        }
    }

    /// Whether rules of this kind are pushed to the enforcement point.
    ///
    /// URL rules are persisted and listed but the enforcement point
    /// filters at L3/L4 and has no URL hook, so they never dispatch.
    pub fn dispatchable(&self) -> bool {
        !matches!(self, RuleKind::Url)
    }

    /// Wire and listing representation of a stored value.
    ///
    /// Port values travel as JSON numbers; everything else stays a string.
    pub fn wire_value(&self, value: &str) -> serde_json::Value {
        match self {
            RuleKind::Port => value
                .parse::<u64>()
                .map(serde_json::Value::from)
                .unwrap_or_else(|_| serde_json::Value::from(value)),
            _ => serde_json::Value::from(value),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a rule blocks or allows its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMode {
    Blacklist,
    Whitelist,
}

impl RuleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleMode::Blacklist => "blacklist",
            RuleMode::Whitelist => "whitelist",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "blacklist" => Some(RuleMode::Blacklist),
            "whitelist" => Some(RuleMode::Whitelist),
            _ => None,
        }
    }
}

impl fmt::Display for RuleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored filtering rule.
///
/// `value` is unique across the whole table regardless of kind or mode.
/// `(kind, mode)` never change after creation; only `active` is mutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub value: String,
    pub mode: RuleMode,
    pub active: bool,
}
