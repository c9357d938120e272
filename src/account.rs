//! Account balance model returned by `GET /account`

use serde::{Deserialize, Serialize};

/// Credit balances
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub subscription: f64,
    #[serde(default)]
    pub payg: f64,
    #[serde(default)]
    pub enterprise: f64,
}

/// Free API call allowance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiAllowance {
    #[serde(default)]
    pub free_calls: u64,
    #[serde(default)]
    pub sizes: String,
}

/// Account attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub credits: Credits,
    #[serde(default)]
    pub api: ApiAllowance,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountEnvelope {
    pub(crate) data: AccountData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountData {
    pub(crate) attributes: AccountInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_envelope_decoding() {
        let json = r#"{
            "data": {
                "attributes": {
                    "credits": {"total": 200, "subscription": 150, "payg": 50, "enterprise": 0},
                    "api": {"free_calls": 50, "sizes": "all"}
                }
            }
        }"#;
        let envelope: AccountEnvelope = serde_json::from_str(json).unwrap();
        let info = envelope.data.attributes;
        assert!((info.credits.total - 200.0).abs() < f64::EPSILON);
        assert!((info.credits.payg - 50.0).abs() < f64::EPSILON);
        assert_eq!(info.api.free_calls, 50);
        assert_eq!(info.api.sizes, "all");
    }

    #[test]
    fn test_account_defaults_for_missing_fields() {
        let envelope: AccountEnvelope =
            serde_json::from_str(r#"{"data": {"attributes": {}}}"#).unwrap();
        assert_eq!(envelope.data.attributes, AccountInfo::default());
    }
}
