//! Partner integrations authenticated by API key.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use ecom_core::{Email, PartnerId};

/// An external seller or payment partner.
///
/// The secret key is needed server-side to verify partner signatures, so it
/// is stored, but it is only ever shown once: in the create and
/// regenerate-keys responses.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Partner {
    pub id: PartnerId,
    pub name: String,
    pub email: Email,
    pub api_key: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub webhook_url: Option<String>,
    pub is_active: bool,
    pub commission_rate: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_key_is_never_serialized() {
        let partner = Partner {
            id: PartnerId::new(1),
            name: "Acme".to_string(),
            email: Email::parse("ops@acme.test").unwrap(),
            api_key: "ak_123".to_string(),
            secret_key: "very-private-value".to_string(),
            webhook_url: None,
            is_active: true,
            commission_rate: Decimal::new(5, 2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&partner).unwrap();
        assert!(json.contains("ak_123"));
        assert!(!json.contains("very-private-value"));
        assert!(!json.contains("secret_key"));
    }
}
