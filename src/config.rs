use std::{net::SocketAddr, str::FromStr};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub jwks_url: String,
    pub timeout_secs: u64,
    pub link_policy: LinkPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: usize,
    /// Require lower case, upper case, a digit and a symbol.
    pub require_classes: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 6,
            require_classes: true,
        }
    }
}

/// What a Google login does when the email already belongs to a local account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPolicy {
    Link,
    Reject,
}

impl FromStr for LinkPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "link" => Ok(Self::Link),
            "reject" => Ok(Self::Reject),
            other => anyhow::bail!("unknown GOOGLE_LINK_POLICY {other:?}"),
        }
    }
}

/// Which session mechanism the process runs. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Stateless signed JWT in the `jwt` cookie.
    Token,
    /// Opaque id in the `sid` cookie, resolved through the in-process registry.
    Registry,
}

impl SessionMode {
    pub fn cookie_name(self) -> &'static str {
        match self {
            SessionMode::Token => "jwt",
            SessionMode::Registry => "sid",
        }
    }
}

impl FromStr for SessionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "token" | "jwt" => Ok(Self::Token),
            "registry" | "memory" => Ok(Self::Registry),
            other => anyhow::bail!("unknown SESSION_MODE {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub google: GoogleConfig,
    pub password: PasswordPolicy,
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub admin_emails: Vec<String>,
    pub session_mode: SessionMode,
    pub session_sweep_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "authgate".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authgate-web".into()),
            ttl_minutes: parsed_or("JWT_TTL_MINUTES", 60 * 24)?,
        };
        let google = GoogleConfig {
            client_id: std::env::var("GOOGLE_CLIENT_ID").context("GOOGLE_CLIENT_ID must be set")?,
            jwks_url: std::env::var("GOOGLE_JWKS_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/oauth2/v3/certs".into()),
            timeout_secs: parsed_or("GOOGLE_VERIFY_TIMEOUT_SECS", 10)?,
            link_policy: match std::env::var("GOOGLE_LINK_POLICY") {
                Ok(v) => v.parse()?,
                Err(_) => LinkPolicy::Link,
            },
        };
        let password = PasswordPolicy {
            min_length: parsed_or("PASSWORD_MIN_LENGTH", 6)?,
            require_classes: parsed_or("PASSWORD_REQUIRE_CLASSES", true)?,
        };
        let environment = match std::env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            _ => Environment::Development,
        };
        let session_mode = match std::env::var("SESSION_MODE") {
            Ok(v) => v.parse()?,
            Err(_) => SessionMode::Token,
        };

        Ok(Self {
            database_url,
            jwt,
            google,
            password,
            environment,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parsed_or("APP_PORT", 3000)?,
            admin_emails: parse_email_list(&std::env::var("ADMIN_EMAILS").unwrap_or_default()),
            session_mode,
            session_sweep_secs: parsed_or("SESSION_SWEEP_SECS", 300)?,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails.contains(&email.to_lowercase())
    }
}

/// Unset keys take the default; set but unparsable keys are a startup error.
fn parsed_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, std::env::var(key).ok(), default)
}

fn parse_value<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key} {v:?}: {e}")),
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_list_is_trimmed_and_case_insensitive() {
        let emails = parse_email_list(" Root@Example.com, ,ops@example.com ");
        assert_eq!(emails, vec!["root@example.com", "ops@example.com"]);
    }

    #[test]
    fn session_mode_parses_aliases() {
        assert_eq!("JWT".parse::<SessionMode>().unwrap(), SessionMode::Token);
        assert_eq!("registry".parse::<SessionMode>().unwrap(), SessionMode::Registry);
        assert!("cookie".parse::<SessionMode>().is_err());
        assert_eq!(SessionMode::Registry.cookie_name(), "sid");
    }

    #[test]
    fn malformed_numbers_and_flags_are_rejected() {
        assert_eq!(parse_value("JWT_TTL_MINUTES", None, 1440i64).unwrap(), 1440);
        assert_eq!(parse_value("JWT_TTL_MINUTES", Some(" 60 ".into()), 1440i64).unwrap(), 60);
        let err = parse_value("JWT_TTL_MINUTES", Some("abc".into()), 1440i64).unwrap_err();
        assert!(err.to_string().contains("JWT_TTL_MINUTES"));
        assert!(parse_value("PASSWORD_REQUIRE_CLASSES", Some("yes".into()), true).is_err());
        assert!(!parse_value("PASSWORD_REQUIRE_CLASSES", Some("false".into()), true).unwrap());
    }

    #[test]
    fn link_policy_rejects_unknown_values() {
        assert_eq!("Reject".parse::<LinkPolicy>().unwrap(), LinkPolicy::Reject);
        assert!("merge".parse::<LinkPolicy>().is_err());
    }
}
