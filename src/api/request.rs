use std::net::Ipv4Addr;

use serde::Deserialize;

use crate::domain::{RuleKind, RuleMode};
use crate::service::ToggleSection;

/// A rule value as it appears in a request body.
///
/// Ports arrive as JSON numbers, IPs and URLs as strings; both normalize
/// to the text form stored in the database.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(u64),
    Text(String),
}

impl RawValue {
    fn into_text(self) -> String {
        match self {
            RawValue::Number(n) => n.to_string(),
            RawValue::Text(s) => s,
        }
    }
}

/// Body of `POST /api/firewall/:kind`.
#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub values: Vec<RawValue>,
    pub mode: RuleMode,
}

impl AddRequest {
    pub fn validated_values(&self, kind: RuleKind) -> Result<Vec<String>, String> {
        validate_values(kind, &self.values)
    }
}

/// Body of `DELETE /api/firewall/:kind`.
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub values: Vec<RawValue>,
    pub mode: RuleMode,
}

impl DeleteRequest {
    pub fn validated_values(&self, kind: RuleKind) -> Result<Vec<String>, String> {
        validate_values(kind, &self.values)
    }
}

/// Body of `PUT /api/firewall/rules`.
///
/// Each section is optional and may arrive as an empty object `{}`;
/// both forms mean "no toggles for this kind".
#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {
    #[serde(default)]
    pub ips: Option<ToggleSectionBody>,
    #[serde(default)]
    pub ports: Option<ToggleSectionBody>,
    #[serde(default)]
    pub urls: Option<ToggleSectionBody>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ToggleSectionBody {
    #[serde(default)]
    pub ids: Vec<i64>,
    #[serde(default)]
    pub mode: Option<RuleMode>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl ToggleRequest {
    /// Flatten the non-empty sections into service toggle sections.
    pub fn into_sections(self) -> Result<Vec<ToggleSection>, String> {
        let mut sections = Vec::new();

        for (kind, body) in [
            (RuleKind::Ip, self.ips),
            (RuleKind::Port, self.ports),
            (RuleKind::Url, self.urls),
        ] {
            let Some(body) = body else { continue };
            if body.ids.is_empty() {
                continue;
            }

            let mode = body
                .mode
                .ok_or_else(|| format!("missing \"mode\" in {} toggle section", kind.plural()))?;
            let active = body
                .active
                .ok_or_else(|| format!("missing \"active\" in {} toggle section", kind.plural()))?;

            sections.push(ToggleSection {
                ids: body.ids,
                mode,
                active,
            });
        }

        Ok(sections)
    }
}

/// Validate and normalize request values for one rule kind.
///
/// IPs must be strict dotted-quad IPv4, ports must be 1-65535, URLs must
/// be non-empty without whitespace.
pub fn validate_values(kind: RuleKind, values: &[RawValue]) -> Result<Vec<String>, String> {
    if values.is_empty() {
        return Err("expected \"values\" to be a non-empty array".to_string());
    }

    values
        .iter()
        .cloned()
        .map(|raw| {
            let text = raw.into_text();
            match kind {
                RuleKind::Ip => {
                    // from_str rejects leading zeros and short forms.
                    text.parse::<Ipv4Addr>()
                        .map_err(|_| format!("invalid IP address in values: {text:?}"))?;
                }
                RuleKind::Port => {
                    let port: u32 = text
                        .parse()
                        .map_err(|_| format!("invalid port in values: {text:?}"))?;
                    if port == 0 || port > 65535 {
                        return Err(format!("port out of range in values: {port}"));
                    }
                }
                RuleKind::Url => {
                    if text.is_empty() || text.contains(char::is_whitespace) {
                        return Err(format!("invalid URL in values: {text:?}"));
                    }
                }
            }
            Ok(text)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_request_deserialization() {
        let req: AddRequest =
            serde_json::from_str(r#"{"values": ["10.0.0.1", "10.0.0.2"], "mode": "blacklist"}"#)
                .unwrap();

        assert_eq!(req.mode, RuleMode::Blacklist);
        assert_eq!(
            req.validated_values(RuleKind::Ip).unwrap(),
            vec!["10.0.0.1", "10.0.0.2"]
        );
    }

    #[test]
    fn test_numeric_port_values_normalize() {
        let req: AddRequest =
            serde_json::from_str(r#"{"values": [8080, "443"], "mode": "whitelist"}"#).unwrap();

        assert_eq!(
            req.validated_values(RuleKind::Port).unwrap(),
            vec!["8080", "443"]
        );
    }

    #[test]
    fn test_invalid_ip_rejected() {
        let req: AddRequest =
            serde_json::from_str(r#"{"values": ["999.0.0.1"], "mode": "blacklist"}"#).unwrap();
        assert!(req.validated_values(RuleKind::Ip).is_err());

        let req: AddRequest =
            serde_json::from_str(r#"{"values": ["10.0.0"], "mode": "blacklist"}"#).unwrap();
        assert!(req.validated_values(RuleKind::Ip).is_err());
    }

    #[test]
    fn test_port_range_enforced() {
        for bad in [r#"[0]"#, r#"[70000]"#, r#"["http"]"#] {
            let req: AddRequest =
                serde_json::from_str(&format!(r#"{{"values": {bad}, "mode": "blacklist"}}"#))
                    .unwrap();
            assert!(req.validated_values(RuleKind::Port).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_empty_values_rejected() {
        let req: AddRequest =
            serde_json::from_str(r#"{"values": [], "mode": "blacklist"}"#).unwrap();
        assert!(req.validated_values(RuleKind::Ip).is_err());
    }

    #[test]
    fn test_unknown_mode_fails_deserialization() {
        let result: Result<AddRequest, _> =
            serde_json::from_str(r#"{"values": ["10.0.0.1"], "mode": "graylist"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_toggle_empty_sections_skipped() {
        let req: ToggleRequest = serde_json::from_str(
            r#"{"ips": {"ids": [1], "mode": "blacklist", "active": false}, "ports": {}, "urls": {}}"#,
        )
        .unwrap();

        let sections = req.into_sections().unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].ids, vec![1]);
        assert_eq!(sections[0].mode, RuleMode::Blacklist);
        assert!(!sections[0].active);
    }

    #[test]
    fn test_toggle_omitted_sections_skipped() {
        let req: ToggleRequest =
            serde_json::from_str(r#"{"urls": {"ids": [3], "mode": "blacklist", "active": true}}"#)
                .unwrap();

        let sections = req.into_sections().unwrap();
        assert_eq!(sections.len(), 1);
    }

    #[test]
    fn test_toggle_section_with_ids_requires_mode_and_active() {
        let req: ToggleRequest = serde_json::from_str(r#"{"ips": {"ids": [1]}}"#).unwrap();
        assert!(req.into_sections().is_err());
    }
}
