//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `JWT_SECRET` - Access token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8080)
//! - `ENVIRONMENT` - Deployment environment name (default: development)
//! - `ACCESS_TOKEN_TTL_MINUTES` - Access token lifetime (default: 60)
//! - `REFRESH_TOKEN_TTL_DAYS` - Refresh token lifetime (default: 7)
//! - `CORS_ORIGINS` - Comma-separated allowed origins
//! - `TAX_RATE` - Tax as a decimal fraction of the subtotal (default: 0.1)
//! - `SHIPPING_COST` - Flat shipping charge (default: 25000)
//! - `FREE_SHIPPING_THRESHOLD` - Subtotal at which shipping becomes free
//! - `CURRENCY` - Store currency (default: VND)
//! - `VNPAY_TMN_CODE`, `VNPAY_HASH_KEY` - VNPay merchant credentials
//! - `VNPAY_URL` - VNPay payment page (default: sandbox)
//! - `VNPAY_RETURN_URL` - Where VNPay sends the shopper back to
//! - `GOOGLE_CLIENT_ID` - Expected audience of Google ID tokens
//! - `GOOGLE_TOKENINFO_URL` - Google token verification endpoint
//! - `USE_WEBHOOK_LAMBDA`, `LAMBDA_WEBHOOK_URL` - Forward VNPay IPN to a function
//! - `PRODUCT_CACHE_TTL_SECONDS` - Product list cache lifetime (default: 600)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Sentry error tracking

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use ecom_core::CurrencyCode;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_VNPAY_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";
const DEFAULT_VNPAY_RETURN_URL: &str = "http://localhost:3000/payment/return";
const DEFAULT_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:3001";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Deployment environment (development, staging, production)
    pub environment: String,
    /// Token issuing settings
    pub auth: AuthConfig,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
    /// Checkout pricing rules
    pub pricing: PricingConfig,
    /// VNPay gateway settings
    pub vnpay: VnpayConfig,
    /// Google sign-in settings
    pub google: GoogleConfig,
    /// VNPay IPN forwarding
    pub webhook_proxy: WebhookProxyConfig,
    /// Product list cache lifetime
    pub product_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Access and refresh token configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for HS256 access tokens
    pub jwt_secret: SecretString,
    /// Access token lifetime
    pub access_token_ttl: chrono::Duration,
    /// Refresh token lifetime
    pub refresh_token_ttl: chrono::Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish()
    }
}

/// Tax, shipping and currency used when totalling orders.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub tax_rate: Decimal,
    pub shipping_cost: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub currency: CurrencyCode,
}

/// VNPay merchant configuration.
///
/// Implements `Debug` manually to redact the hash key.
#[derive(Clone)]
pub struct VnpayConfig {
    /// Merchant terminal code (`vnp_TmnCode`)
    pub tmn_code: String,
    /// HMAC key used to sign and verify gateway parameters
    pub hash_key: SecretString,
    /// Payment page URL
    pub pay_url: String,
    /// URL the shopper returns to after paying
    pub return_url: String,
}

impl VnpayConfig {
    /// VNPay is usable only with both merchant credentials present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.tmn_code.is_empty() && !self.hash_key.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for VnpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VnpayConfig")
            .field("tmn_code", &self.tmn_code)
            .field("hash_key", &"[REDACTED]")
            .field("pay_url", &self.pay_url)
            .field("return_url", &self.return_url)
            .finish()
    }
}

/// Google ID token verification settings.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth client ID; when set, tokens for other audiences are rejected
    pub client_id: Option<String>,
    /// Token introspection endpoint
    pub tokeninfo_url: String,
}

/// Forwarding of VNPay IPN callbacks to an external function.
#[derive(Debug, Clone, Default)]
pub struct WebhookProxyConfig {
    /// Target URL when forwarding is enabled
    pub lambda_url: Option<String>,
}

impl WebhookProxyConfig {
    /// The proxy target, if forwarding is enabled.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.lambda_url.as_deref()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_required_secret("DATABASE_URL")?;
        let host = parse_env("API_HOST", "0.0.0.0")?;
        let port = parse_env("PORT", "8080")?;
        let environment = get_env_or_default("ENVIRONMENT", "development");

        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "JWT_SECRET")?;
        let auth = AuthConfig {
            jwt_secret,
            access_token_ttl: chrono::Duration::minutes(parse_env(
                "ACCESS_TOKEN_TTL_MINUTES",
                "60",
            )?),
            refresh_token_ttl: chrono::Duration::days(parse_env("REFRESH_TOKEN_TTL_DAYS", "7")?),
        };

        let cors_origins = parse_list(&get_env_or_default("CORS_ORIGINS", DEFAULT_CORS_ORIGINS));

        let pricing = PricingConfig::from_env()?;
        let vnpay = VnpayConfig {
            tmn_code: get_env_or_default("VNPAY_TMN_CODE", ""),
            hash_key: SecretString::from(get_env_or_default("VNPAY_HASH_KEY", "")),
            pay_url: get_env_or_default("VNPAY_URL", DEFAULT_VNPAY_URL),
            return_url: get_env_or_default("VNPAY_RETURN_URL", DEFAULT_VNPAY_RETURN_URL),
        };
        let google = GoogleConfig {
            client_id: get_optional_env("GOOGLE_CLIENT_ID"),
            tokeninfo_url: get_env_or_default("GOOGLE_TOKENINFO_URL", DEFAULT_TOKENINFO_URL),
        };

        let use_lambda: bool = parse_env("USE_WEBHOOK_LAMBDA", "false")?;
        let webhook_proxy = WebhookProxyConfig {
            lambda_url: get_optional_env("LAMBDA_WEBHOOK_URL").filter(|_| use_lambda),
        };

        let product_cache_ttl =
            Duration::from_secs(parse_env("PRODUCT_CACHE_TTL_SECONDS", "600")?);

        Ok(Self {
            database_url,
            host,
            port,
            environment,
            auth,
            cors_origins,
            pricing,
            vnpay,
            google,
            webhook_proxy,
            product_cache_ttl,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether this is a production deployment.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl PricingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let tax_rate: Decimal = parse_env("TAX_RATE", "0.1")?;
        if tax_rate.is_sign_negative() || tax_rate > Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar(
                "TAX_RATE".to_string(),
                "must be between 0 and 1".to_string(),
            ));
        }

        let shipping_cost: Decimal = parse_env("SHIPPING_COST", "25000")?;
        if shipping_cost.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "SHIPPING_COST".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let free_shipping_threshold = get_optional_env("FREE_SHIPPING_THRESHOLD")
            .map(|v| {
                Decimal::from_str(&v).map_err(|e| {
                    ConfigError::InvalidEnvVar("FREE_SHIPPING_THRESHOLD".to_string(), e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            tax_rate,
            shipping_cost,
            free_shipping_threshold,
            currency: parse_env("CURRENCY", "VND")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Configuration for unit tests: no VNPay, no proxy, VND pricing.
#[cfg(test)]
pub(crate) fn test_config() -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://localhost/ecom_test"),
        host: IpAddr::from([127, 0, 0, 1]),
        port: 8080,
        environment: "test".to_string(),
        auth: AuthConfig {
            jwt_secret: SecretString::from("k7Qp2Zr9Lx4Vb8Nm1Tc6Hy3Jd5Fw0Gs!"),
            access_token_ttl: chrono::Duration::minutes(60),
            refresh_token_ttl: chrono::Duration::days(7),
        },
        cors_origins: vec!["http://localhost:3000".to_string()],
        pricing: PricingConfig {
            tax_rate: Decimal::new(1, 1),
            shipping_cost: Decimal::from(25_000),
            free_shipping_threshold: None,
            currency: CurrencyCode::VND,
        },
        vnpay: VnpayConfig {
            tmn_code: String::new(),
            hash_key: SecretString::from(""),
            pay_url: DEFAULT_VNPAY_URL.to_string(),
            return_url: DEFAULT_VNPAY_RETURN_URL.to_string(),
        },
        google: GoogleConfig {
            client_id: None,
            tokeninfo_url: DEFAULT_TOKENINFO_URL.to_string(),
        },
        webhook_proxy: WebhookProxyConfig::default(),
        product_cache_ttl: Duration::from_secs(600),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-secret-key-change-in-production", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "JWT_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "JWT_SECRET").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_parse_list_trims_and_drops_blanks() {
        assert_eq!(
            parse_list(" http://localhost:3000 , ,http://localhost:3001"),
            vec!["http://localhost:3000", "http://localhost:3001"]
        );
    }

    #[test]
    fn test_socket_addr() {
        let config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_vnpay_is_configured() {
        let mut vnpay = test_config().vnpay;
        assert!(!vnpay.is_configured());

        vnpay.tmn_code = "DEMOTMN1".to_string();
        vnpay.hash_key = SecretString::from("HASHKEY123");
        assert!(vnpay.is_configured());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = test_config();
        config.vnpay.hash_key = SecretString::from("super_secret_hash_key");

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_hash_key"));
        assert!(!debug_output.contains("k7Qp2Zr9Lx4Vb8Nm1Tc6Hy3Jd5Fw0Gs!"));
    }
}
