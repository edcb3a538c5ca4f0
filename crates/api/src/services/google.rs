//! Google Sign-In ID token verification via the tokeninfo endpoint.

use serde::Deserialize;
use tracing::{debug, instrument};

use ecom_core::Email;

use crate::config::GoogleConfig;
use crate::services::auth::AuthError;

/// Subset of the tokeninfo response we rely on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenInfo {
    pub aud: Option<String>,
    pub email: Option<String>,
    /// Google sends `"true"` as a string; a JSON boolean is accepted too.
    pub email_verified: Option<serde_json::Value>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub name: Option<String>,
}

/// A verified Google identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
}

/// Ask Google to verify an ID token and check the result.
///
/// # Errors
///
/// Returns `AuthError::GoogleToken` if Google rejects the token or the claims
/// fail validation, and `AuthError::GoogleUnavailable` on transport errors.
#[instrument(skip(client, config, id_token))]
pub async fn verify_id_token(
    client: &reqwest::Client,
    config: &GoogleConfig,
    id_token: &str,
) -> Result<GoogleIdentity, AuthError> {
    if id_token.trim().is_empty() {
        return Err(AuthError::GoogleToken("ID token is required".to_string()));
    }

    let response = client
        .get(&config.tokeninfo_url)
        .query(&[("id_token", id_token)])
        .send()
        .await?;

    if !response.status().is_success() {
        debug!(status = %response.status(), "Google rejected ID token");
        return Err(AuthError::GoogleToken("Invalid Google token".to_string()));
    }

    let info: TokenInfo = response.json().await?;
    validate_token_info(info, config.client_id.as_deref())
}

/// Check the claims returned by tokeninfo.
///
/// # Errors
///
/// Returns `AuthError::GoogleToken` when the audience does not match, the
/// email is missing or unverified.
pub fn validate_token_info(
    info: TokenInfo,
    expected_audience: Option<&str>,
) -> Result<GoogleIdentity, AuthError> {
    if let Some(expected) = expected_audience
        && info.aud.as_deref() != Some(expected)
    {
        return Err(AuthError::GoogleToken("Token audience mismatch".to_string()));
    }

    let verified = matches!(
        &info.email_verified,
        Some(serde_json::Value::Bool(true))
    ) || matches!(&info.email_verified, Some(serde_json::Value::String(s)) if s == "true");
    if !verified {
        return Err(AuthError::GoogleToken("Email not verified".to_string()));
    }

    let email = info
        .email
        .as_deref()
        .ok_or_else(|| AuthError::GoogleToken("Token has no email".to_string()))?;
    let email = Email::parse(email)?;

    let (first_name, last_name) = match (info.given_name, info.family_name) {
        (Some(first), Some(last)) => (first, last),
        (first, last) => {
            let full = info.name.unwrap_or_default();
            let mut parts = full.splitn(2, ' ');
            let fallback_first = parts.next().unwrap_or_default().to_string();
            let fallback_last = parts.next().unwrap_or_default().to_string();
            (
                first.unwrap_or(fallback_first),
                last.unwrap_or(fallback_last),
            )
        }
    };
    let first_name = if first_name.is_empty() {
        email.local_part().to_string()
    } else {
        first_name
    };

    Ok(GoogleIdentity {
        email,
        first_name,
        last_name,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn info() -> TokenInfo {
        TokenInfo {
            aud: Some("client-123.apps.googleusercontent.com".to_string()),
            email: Some("Minh@Example.com".to_string()),
            email_verified: Some(serde_json::Value::String("true".to_string())),
            given_name: Some("Minh".to_string()),
            family_name: Some("Le".to_string()),
            name: Some("Minh Le".to_string()),
        }
    }

    #[test]
    fn test_valid_token_info() {
        let identity =
            validate_token_info(info(), Some("client-123.apps.googleusercontent.com")).unwrap();
        assert_eq!(identity.email.as_str(), "minh@example.com");
        assert_eq!(identity.first_name, "Minh");
        assert_eq!(identity.last_name, "Le");
    }

    #[test]
    fn test_audience_is_only_checked_when_configured() {
        let mut other = info();
        other.aud = Some("someone-else".to_string());
        assert!(validate_token_info(other.clone(), None).is_ok());
        assert!(matches!(
            validate_token_info(other, Some("client-123.apps.googleusercontent.com")),
            Err(AuthError::GoogleToken(_))
        ));
    }

    #[test]
    fn test_unverified_email_is_rejected() {
        let mut unverified = info();
        unverified.email_verified = Some(serde_json::Value::String("false".to_string()));
        assert!(validate_token_info(unverified, None).is_err());

        let mut missing = info();
        missing.email_verified = None;
        assert!(validate_token_info(missing, None).is_err());

        let mut boolean = info();
        boolean.email_verified = Some(serde_json::Value::Bool(true));
        assert!(validate_token_info(boolean, None).is_ok());
    }

    #[test]
    fn test_name_falls_back_to_full_name() {
        let mut partial = info();
        partial.given_name = None;
        partial.family_name = None;
        partial.name = Some("Thu Ha Nguyen".to_string());

        let identity = validate_token_info(partial, None).unwrap();
        assert_eq!(identity.first_name, "Thu");
        assert_eq!(identity.last_name, "Ha Nguyen");
    }

    #[test]
    fn test_missing_email_is_rejected() {
        let mut no_email = info();
        no_email.email = None;
        assert!(validate_token_info(no_email, None).is_err());
    }
}
