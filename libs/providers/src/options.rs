use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use engage_sdk::{Credentials, TransferIdentity};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Provider options as the host supplies them: everything lives under
/// `notifications`, shared by the notification and analytics providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderOptions {
    #[serde(default)]
    pub notifications: NotificationOptions,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationOptions {
    #[serde(default)]
    pub key_id: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub integration_id: String,
    #[serde(default)]
    pub from_email: String,
    #[serde(default)]
    pub from_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_sms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_identity: Option<TransferIdentity>,
    /// Abstract template name -> platform template id.
    #[serde(default)]
    pub template_mappings: HashMap<String, String>,
    /// Abstract template name -> platform campaign name.
    #[serde(default)]
    pub campaign_mappings: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl fmt::Debug for NotificationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationOptions")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("integration_id", &self.integration_id)
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("from_sms", &self.from_sms)
            .field("transfer_identity", &self.transfer_identity)
            .field("template_mappings", &self.template_mappings)
            .field("campaign_mappings", &self.campaign_mappings)
            .field("language", &self.language)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl NotificationOptions {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.key_id.clone(), self.secret.clone())
    }

    /// Platform template id and campaign name for an abstract template name.
    /// Both must be configured (and non-empty) for a send to happen.
    pub fn mapping_for(&self, template: &str) -> Option<(&str, &str)> {
        let template_id = self
            .template_mappings
            .get(template)
            .map(String::as_str)
            .filter(|v| !v.is_empty())?;
        let campaign = self
            .campaign_mappings
            .get(template)
            .map(String::as_str)
            .filter(|v| !v.is_empty())?;
        Some((template_id, campaign))
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref().filter(|v| !v.is_empty())
    }

    pub fn from_sms(&self) -> Option<&str> {
        self.from_sms.as_deref().filter(|v| !v.is_empty())
    }
}

impl ProviderOptions {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ProviderError> {
        serde_yaml_bw::from_str(raw).map_err(|err| {
            ProviderError::invalid_configuration(format!("invalid provider options: {err}"))
        })
    }

    /// Reads YAML (or JSON, which parses as YAML) options from disk.
    pub fn from_path(path: &Path) -> Result<Self, ProviderError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ProviderError::invalid_configuration(format!(
                "failed to read provider options {}: {err}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds options from `BLOOMREACH_*` keys. Mappings use `name=value` pairs
    /// separated by commas.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).unwrap_or_default();
        let transfer_identity = match lookup("BLOOMREACH_TRANSFER_IDENTITY") {
            Some(raw) if !raw.trim().is_empty() => Some(
                raw.parse::<TransferIdentity>()
                    .map_err(ProviderError::InvalidConfiguration)?,
            ),
            _ => None,
        };

        Ok(Self {
            notifications: NotificationOptions {
                key_id: get("BLOOMREACH_KEY_ID"),
                secret: get("BLOOMREACH_SECRET"),
                project_id: get("BLOOMREACH_PROJECT_ID"),
                integration_id: get("BLOOMREACH_INTEGRATION_ID"),
                from_email: get("BLOOMREACH_FROM_EMAIL"),
                from_name: get("BLOOMREACH_FROM_NAME"),
                from_sms: lookup("BLOOMREACH_FROM_SMS"),
                transfer_identity,
                template_mappings: parse_pairs(&get("BLOOMREACH_TEMPLATE_MAPPINGS"))?,
                campaign_mappings: parse_pairs(&get("BLOOMREACH_CAMPAIGN_MAPPINGS"))?,
                language: lookup("BLOOMREACH_LANGUAGE"),
                api_base: lookup("BLOOMREACH_API_BASE"),
            },
        })
    }
}

fn parse_pairs(raw: &str) -> Result<HashMap<String, String>, ProviderError> {
    let mut out = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            ProviderError::invalid_configuration(format!("mapping `{pair}` must be name=value"))
        })?;
        out.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(out)
}

/// Checks the options required by the notification provider, reporting the
/// first missing one. `from_sms` is only checked when an SMS is sent.
pub fn validate_options(options: &ProviderOptions) -> Result<(), ProviderError> {
    let n = &options.notifications;
    require(&n.key_id, "Key ID")?;
    require(&n.secret, "Secret")?;
    require(&n.project_id, "Project ID")?;
    require(&n.integration_id, "Integration ID")?;
    require(&n.from_email, "From email")?;
    require(&n.from_name, "From name")?;
    Ok(())
}

/// Subset of [`validate_options`] needed for event tracking.
pub fn validate_analytics_options(options: &ProviderOptions) -> Result<(), ProviderError> {
    let n = &options.notifications;
    require(&n.key_id, "Key ID")?;
    require(&n.secret, "Secret")?;
    require(&n.project_id, "Project ID")?;
    Ok(())
}

fn require(value: &str, label: &str) -> Result<(), ProviderError> {
    if value.trim().is_empty() {
        return Err(ProviderError::invalid_configuration(format!(
            "{label} is required in the provider's options."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn complete() -> ProviderOptions {
        ProviderOptions::from_yaml_str(
            r#"
notifications:
  key_id: key
  secret: secret
  project_id: P
  integration_id: int-1
  from_email: noreply@shop.test
  from_name: Shop
  transfer_identity: first_click
  template_mappings:
    order-placed: tmpl_1
  campaign_mappings:
    order-placed: Order Campaign
  language: en
"#,
        )
        .unwrap()
    }

    #[test]
    fn parses_yaml_shape() {
        let options = complete();
        let n = &options.notifications;
        assert_eq!(n.project_id, "P");
        assert_eq!(n.transfer_identity, Some(TransferIdentity::FirstClick));
        assert_eq!(n.mapping_for("order-placed"), Some(("tmpl_1", "Order Campaign")));
        assert_eq!(n.language(), Some("en"));
        assert!(n.from_sms().is_none());
        validate_options(&options).unwrap();
    }

    #[test]
    fn json_is_accepted_too() {
        let options = ProviderOptions::from_yaml_str(
            r#"{"notifications": {"key_id": "k", "secret": "s", "project_id": "P"}}"#,
        )
        .unwrap();
        validate_analytics_options(&options).unwrap();
        let err = validate_options(&options).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Integration ID is required in the provider's options."
        );
    }

    #[test]
    fn validation_reports_first_missing_field() {
        let cases: [(&str, fn(&mut NotificationOptions)); 6] = [
            ("Key ID", |n| n.key_id.clear()),
            ("Secret", |n| n.secret.clear()),
            ("Project ID", |n| n.project_id.clear()),
            ("Integration ID", |n| n.integration_id.clear()),
            ("From email", |n| n.from_email.clear()),
            ("From name", |n| n.from_name.clear()),
        ];
        for (label, clear) in cases {
            let mut options = complete();
            clear(&mut options.notifications);
            let err = validate_options(&options).unwrap_err();
            assert!(matches!(err, ProviderError::InvalidConfiguration(_)));
            assert_eq!(
                err.to_string(),
                format!("{label} is required in the provider's options.")
            );
        }
    }

    #[test]
    fn mapping_requires_both_sides() {
        let mut options = complete();
        options
            .notifications
            .template_mappings
            .insert("cart-updated".into(), "tmpl_2".into());
        options
            .notifications
            .campaign_mappings
            .insert("customer-created".into(), "Welcome".into());
        options
            .notifications
            .template_mappings
            .insert("user-created".into(), String::new());
        options
            .notifications
            .campaign_mappings
            .insert("user-created".into(), "Staff".into());
        assert!(options.notifications.mapping_for("cart-updated").is_none());
        assert!(options.notifications.mapping_for("customer-created").is_none());
        assert!(options.notifications.mapping_for("user-created").is_none());
        assert!(options.notifications.mapping_for("unknown").is_none());
    }

    #[test]
    fn env_lookup_builds_options() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BLOOMREACH_KEY_ID", "k"),
            ("BLOOMREACH_SECRET", "s"),
            ("BLOOMREACH_PROJECT_ID", "P"),
            ("BLOOMREACH_INTEGRATION_ID", "int"),
            ("BLOOMREACH_FROM_EMAIL", "noreply@shop.test"),
            ("BLOOMREACH_FROM_NAME", "Shop"),
            ("BLOOMREACH_FROM_SMS", "+100"),
            ("BLOOMREACH_TRANSFER_IDENTITY", "disabled"),
            (
                "BLOOMREACH_TEMPLATE_MAPPINGS",
                "order-placed=tmpl_1, cart-updated=tmpl_2",
            ),
            ("BLOOMREACH_CAMPAIGN_MAPPINGS", "order-placed=Orders"),
        ]);
        let options =
            ProviderOptions::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        validate_options(&options).unwrap();
        let n = &options.notifications;
        assert_eq!(n.from_sms(), Some("+100"));
        assert_eq!(n.transfer_identity, Some(TransferIdentity::Disabled));
        assert_eq!(n.template_mappings.len(), 2);
        assert_eq!(n.mapping_for("order-placed"), Some(("tmpl_1", "Orders")));
        assert!(n.api_base.is_none());
    }

    #[test]
    fn malformed_env_values_are_rejected() {
        let bad_mode = ProviderOptions::from_lookup(|key| {
            (key == "BLOOMREACH_TRANSFER_IDENTITY").then(|| "sometimes".to_string())
        });
        assert!(matches!(bad_mode, Err(ProviderError::InvalidConfiguration(_))));

        let bad_pairs = ProviderOptions::from_lookup(|key| {
            (key == "BLOOMREACH_TEMPLATE_MAPPINGS").then(|| "order-placed".to_string())
        });
        assert!(matches!(bad_pairs, Err(ProviderError::InvalidConfiguration(_))));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", complete());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("secret: \"secret\""));
    }

    #[test]
    fn reads_options_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bloomreach.yaml");
        std::fs::write(&path, "notifications:\n  key_id: k\n  secret: s\n  project_id: P\n")
            .unwrap();
        let options = ProviderOptions::from_path(&path).unwrap();
        assert_eq!(options.notifications.project_id, "P");
        assert!(ProviderOptions::from_path(&dir.path().join("missing.yaml")).is_err());
    }
}
