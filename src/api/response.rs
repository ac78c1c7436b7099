use serde::Serialize;

use crate::domain::{Rule, RuleKind, RuleMode};

/// One rule entry in a listing bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleEntry {
    pub id: i64,
    /// Ports listed as numbers, everything else as strings.
    pub value: serde_json::Value,
    pub active: bool,
}

impl RuleEntry {
    fn from_rule(rule: &Rule) -> Self {
        RuleEntry {
            id: rule.id,
            value: rule.kind.wire_value(&rule.value),
            active: rule.active,
        }
    }
}

/// Rules of one kind split by mode.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ModeBuckets {
    pub blacklist: Vec<RuleEntry>,
    pub whitelist: Vec<RuleEntry>,
}

/// Full listing shape: all three kind buckets, each split by mode,
/// present (and empty) even when no rows of that kind exist.
#[derive(Debug, Default, Serialize)]
pub struct RuleListing {
    pub ips: ModeBuckets,
    pub urls: ModeBuckets,
    pub ports: ModeBuckets,
}

impl RuleListing {
    pub fn from_rows(rows: &[Rule]) -> Self {
        let mut listing = RuleListing::default();

        for rule in rows {
            let buckets = match rule.kind {
                RuleKind::Ip => &mut listing.ips,
                RuleKind::Url => &mut listing.urls,
                RuleKind::Port => &mut listing.ports,
            };
            let bucket = match rule.mode {
                RuleMode::Blacklist => &mut buckets.blacklist,
                RuleMode::Whitelist => &mut buckets.whitelist,
            };
            bucket.push(RuleEntry::from_rule(rule));
        }

        listing
    }

    pub fn section(&self, kind: RuleKind) -> &ModeBuckets {
        match kind {
            RuleKind::Ip => &self.ips,
            RuleKind::Url => &self.urls,
            RuleKind::Port => &self.ports,
        }
    }
}

/// Echo returned by add/delete mutations.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub status: &'static str,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub mode: RuleMode,
    pub values: Vec<serde_json::Value>,
}

impl MutationResponse {
    pub fn success(kind: RuleKind, mode: RuleMode, values: &[String]) -> Self {
        MutationResponse {
            status: "success",
            kind,
            mode,
            values: values.iter().map(|v| kind.wire_value(v)).collect(),
        }
    }
}

/// Result of a toggle: every row that changed, with its new state.
#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub updated: Vec<Rule>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Advisory reachability of the enforcement point.
    pub enforcer_connected: bool,
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: i64, kind: RuleKind, value: &str, mode: RuleMode, active: bool) -> Rule {
        Rule {
            id,
            kind,
            value: value.to_string(),
            mode,
            active,
        }
    }

    #[test]
    fn test_empty_listing_has_all_buckets() {
        let json = serde_json::to_value(RuleListing::from_rows(&[])).unwrap();

        for kind in ["ips", "urls", "ports"] {
            assert_eq!(json[kind]["blacklist"], serde_json::json!([]));
            assert_eq!(json[kind]["whitelist"], serde_json::json!([]));
        }
    }

    #[test]
    fn test_listing_groups_by_kind_and_mode() {
        let rows = vec![
            rule(1, RuleKind::Ip, "10.0.0.1", RuleMode::Blacklist, true),
            rule(2, RuleKind::Ip, "10.0.0.2", RuleMode::Whitelist, true),
            rule(3, RuleKind::Url, "https://example.com", RuleMode::Blacklist, false),
            rule(4, RuleKind::Port, "8080", RuleMode::Blacklist, true),
        ];

        let listing = RuleListing::from_rows(&rows);

        assert_eq!(listing.ips.blacklist.len(), 1);
        assert_eq!(listing.ips.whitelist.len(), 1);
        assert_eq!(listing.urls.blacklist.len(), 1);
        assert!(!listing.urls.blacklist[0].active);
        assert!(listing.urls.whitelist.is_empty());
        assert_eq!(listing.ports.blacklist[0].value, serde_json::json!(8080));
    }

    #[test]
    fn test_mutation_echo_shape() {
        let resp = MutationResponse::success(
            RuleKind::Port,
            RuleMode::Blacklist,
            &["22".to_string()],
        );

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["type"], "port");
        assert_eq!(json["mode"], "blacklist");
        assert_eq!(json["values"], serde_json::json!([22]));
    }
}
