use serde_json::json;

use crate::domain::{RuleKind, RuleMode};

/// One command for the enforcement point.
///
/// The wire protocol is value-set oriented: the enforcement point has no
/// concept of rule ids, only of `(type, mode)` value sets. `add` means
/// "ensure present" and `delete` means "ensure absent"; both are
/// idempotent on the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcementCommand {
    Add {
        kind: RuleKind,
        mode: RuleMode,
        values: Vec<String>,
    },
    Delete {
        kind: RuleKind,
        mode: RuleMode,
        values: Vec<String>,
    },
    Clear,
    Ping,
}

impl EnforcementCommand {
    pub fn add(kind: RuleKind, mode: RuleMode, values: Vec<String>) -> Self {
        EnforcementCommand::Add { kind, mode, values }
    }

    pub fn delete(kind: RuleKind, mode: RuleMode, values: Vec<String>) -> Self {
        EnforcementCommand::Delete { kind, mode, values }
    }

    /// Short action name, used for logging.
    pub fn action(&self) -> &'static str {
        match self {
            EnforcementCommand::Add { .. } => "add",
            EnforcementCommand::Delete { .. } => "delete",
            EnforcementCommand::Clear => "clear",
            EnforcementCommand::Ping => "ping",
        }
    }

    /// Serialize to the wire JSON the enforcement point expects.
    ///
    /// `clear` is a fixed sentinel payload meaning "drop everything",
    /// not a value-set operation.
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            EnforcementCommand::Add { kind, mode, values } => json!({
                "action": "add",
                "type": kind.as_str(),
                "mode": mode.as_str(),
                "values": wire_values(*kind, values),
            }),
            EnforcementCommand::Delete { kind, mode, values } => json!({
                "action": "delete",
                "type": kind.as_str(),
                "mode": mode.as_str(),
                "values": wire_values(*kind, values),
            }),
            EnforcementCommand::Clear => json!({
                "action": "clear",
                "cmd": "C",
                "rule_type": "A",
            }),
            EnforcementCommand::Ping => json!({ "action": "ping" }),
        }
    }
}

fn wire_values(kind: RuleKind, values: &[String]) -> Vec<serde_json::Value> {
    values.iter().map(|v| kind.wire_value(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_wire_shape() {
        let cmd = EnforcementCommand::add(
            RuleKind::Ip,
            RuleMode::Blacklist,
            vec!["10.0.0.50".to_string()],
        );

        assert_eq!(
            cmd.to_wire(),
            json!({
                "action": "add",
                "type": "ip",
                "mode": "blacklist",
                "values": ["10.0.0.50"],
            })
        );
    }

    #[test]
    fn test_delete_ports_as_numbers() {
        let cmd = EnforcementCommand::delete(
            RuleKind::Port,
            RuleMode::Whitelist,
            vec!["8080".to_string(), "443".to_string()],
        );

        assert_eq!(cmd.to_wire()["values"], json!([8080, 443]));
        assert_eq!(cmd.to_wire()["action"], "delete");
    }

    #[test]
    fn test_clear_sentinel_ignores_nothing_else() {
        assert_eq!(
            EnforcementCommand::Clear.to_wire(),
            json!({ "action": "clear", "cmd": "C", "rule_type": "A" })
        );
    }

    #[test]
    fn test_ping_wire_shape() {
        assert_eq!(
            EnforcementCommand::Ping.to_wire(),
            json!({ "action": "ping" })
        );
    }
}
