use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Severity ladder used by the scanner database, lowest first.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum Severity {
    Unknown,
    Negligible,
    Low,
    #[default]
    Medium,
    High,
    Critical,
    Defcon1,
}

impl Severity {
    pub const ALL: [Severity; 7] = [
        Severity::Unknown,
        Severity::Negligible,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
        Severity::Defcon1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unknown => "Unknown",
            Severity::Negligible => "Negligible",
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
            Severity::Defcon1 => "Defcon1",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let needle = raw.trim();
        Severity::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ModelError::UnknownSeverity(raw.to_string()))
    }
}

/// One finding as reported by the out-of-process scanner. The scanner owns
/// the schema, so every field is optional and unknown metadata is kept
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Vulnerability {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fixed_by: String,
    #[serde(alias = "featureName", skip_serializing_if = "String::is_empty")]
    pub feature_name: String,
    #[serde(alias = "featureVersion", skip_serializing_if = "String::is_empty")]
    pub feature_version: String,
}

impl Vulnerability {
    /// Parsed severity; anything the ladder does not know maps to `Unknown`.
    pub fn severity(&self) -> Severity {
        self.severity.parse().unwrap_or(Severity::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("high".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!("DEFCON1".parse::<Severity>().unwrap(), Severity::Defcon1);
        assert!("severe".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_orders_from_unknown_to_defcon() {
        assert!(Severity::Unknown < Severity::Low);
        assert!(Severity::Critical < Severity::Defcon1);
        assert_eq!(Severity::ALL.iter().max(), Some(&Severity::Defcon1));
    }

    #[test]
    fn vulnerability_decodes_scanner_shape() {
        let raw = r#"{
            "Name": "CVE-2024-0001",
            "NamespaceName": "debian:12",
            "Severity": "High",
            "FixedBy": "1.2.3",
            "featureName": "openssl",
            "featureVersion": "1.1.1",
            "Metadata": {"NVD": {"CVSSv3": {"Score": 7.5}}}
        }"#;
        let vuln: Vulnerability = serde_json::from_str(raw).unwrap();
        assert_eq!(vuln.name, "CVE-2024-0001");
        assert_eq!(vuln.feature_name, "openssl");
        assert_eq!(vuln.severity(), Severity::High);
        assert!(vuln.metadata.is_some());
    }

    #[test]
    fn unrecognised_severity_is_unknown() {
        let vuln = Vulnerability {
            severity: "spicy".into(),
            ..Default::default()
        };
        assert_eq!(vuln.severity(), Severity::Unknown);
    }
}
