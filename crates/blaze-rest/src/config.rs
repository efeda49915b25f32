//! Project configuration.
//!
//! Values come from the environment (`NEXT_PUBLIC_FIREBASE_*`, then
//! `FIREBASE_*`), from the config object the vendor console hands out, or are
//! set explicitly. Nothing here is global: configs are plain values passed to
//! the client constructors.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Identity-toolkit accounts endpoint used when none is configured.
pub const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts";

const PUBLIC_PREFIX: &str = "NEXT_PUBLIC_FIREBASE_";
const PRIVATE_PREFIX: &str = "FIREBASE_";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{component} configuration is incomplete: missing {missing}")]
    Incomplete {
        component: &'static str,
        missing: String,
    },

    #[error("{component} URL '{url}' is invalid: {reason}")]
    InvalidUrl {
        component: &'static str,
        url: String,
        reason: String,
    },
}

/// Everything the console config object carries, plus the auth endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    #[serde(rename = "databaseURL")]
    pub database_url: Option<String>,
    pub project_id: Option<String>,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
    pub auth_url: Option<String>,
}

impl ProjectConfig {
    /// Read from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read through `lookup`, preferring `NEXT_PUBLIC_FIREBASE_<X>` over
    /// `FIREBASE_<X>`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |suffix: &str| {
            lookup(&format!("{PUBLIC_PREFIX}{suffix}"))
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(&format!("{PRIVATE_PREFIX}{suffix}")).filter(|v| !v.is_empty()))
        };

        Self {
            api_key: var("API_KEY"),
            auth_domain: var("AUTH_DOMAIN"),
            database_url: var("DATABASE_URL"),
            project_id: var("PROJECT_ID"),
            storage_bucket: var("STORAGE_BUCKET"),
            messaging_sender_id: var("MESSAGING_SENDER_ID"),
            app_id: var("APP_ID"),
            auth_url: var("AUTH_URL"),
        }
    }

    /// Extract `key: "value"` pairs from a pasted console config object, e.g.
    ///
    /// ```text
    /// const firebaseConfig = {
    ///   apiKey: "AIza...",
    ///   authDomain: "demo.firebaseapp.com",
    /// };
    /// ```
    ///
    /// Missing keys stay unset; single and double quotes are accepted.
    pub fn from_config_snippet(snippet: &str) -> Self {
        let field = |key: &str| snippet_value(snippet, key);
        Self {
            api_key: field("apiKey"),
            auth_domain: field("authDomain"),
            database_url: field("databaseURL"),
            project_id: field("projectId"),
            storage_bucket: field("storageBucket"),
            messaging_sender_id: field("messagingSenderId"),
            app_id: field("appId"),
            auth_url: None,
        }
    }

    /// Render as `.env` lines with the public prefix. Unset values are
    /// written empty; the auth endpoint falls back to [`DEFAULT_AUTH_URL`].
    pub fn to_env_file(&self) -> String {
        let entries = [
            ("API_KEY", self.api_key.as_deref()),
            ("AUTH_DOMAIN", self.auth_domain.as_deref()),
            ("DATABASE_URL", self.database_url.as_deref()),
            ("PROJECT_ID", self.project_id.as_deref()),
            ("STORAGE_BUCKET", self.storage_bucket.as_deref()),
            ("MESSAGING_SENDER_ID", self.messaging_sender_id.as_deref()),
            ("APP_ID", self.app_id.as_deref()),
            (
                "AUTH_URL",
                Some(self.auth_url.as_deref().unwrap_or(DEFAULT_AUTH_URL)),
            ),
        ];

        entries
            .iter()
            .map(|(suffix, value)| format!("{PUBLIC_PREFIX}{suffix}=\"{}\"", value.unwrap_or("")))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Overlay the values `partial` sets.
    pub fn merge(self, partial: ProjectConfig) -> Self {
        Self {
            api_key: partial.api_key.or(self.api_key),
            auth_domain: partial.auth_domain.or(self.auth_domain),
            database_url: partial.database_url.or(self.database_url),
            project_id: partial.project_id.or(self.project_id),
            storage_bucket: partial.storage_bucket.or(self.storage_bucket),
            messaging_sender_id: partial.messaging_sender_id.or(self.messaging_sender_id),
            app_id: partial.app_id.or(self.app_id),
            auth_url: partial.auth_url.or(self.auth_url),
        }
    }

    /// Settings for [`IdentityToolkitClient`](crate::IdentityToolkitClient).
    pub fn auth_config(&self) -> RestAuthConfig {
        RestAuthConfig {
            auth_url: self
                .auth_url
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            api_key: self.api_key.clone().unwrap_or_default(),
        }
    }

    /// Settings for [`RestDatabase`](crate::RestDatabase).
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone().unwrap_or_default())
    }
}

fn snippet_value(snippet: &str, key: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r#"{key}\s*:\s*["']([^"']+)["']"#)).ok()?;
    pattern
        .captures(snippet)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Identity-toolkit endpoint and API key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestAuthConfig {
    pub auth_url: String,
    pub api_key: String,
}

impl RestAuthConfig {
    pub fn new(auth_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Both values from the environment, with no default endpoint.
    pub fn from_env() -> Self {
        let config = ProjectConfig::from_env();
        Self {
            auth_url: config.auth_url.unwrap_or_default(),
            api_key: config.api_key.unwrap_or_default(),
        }
    }

    /// Overlay the non-empty values of `partial`.
    pub fn merge(self, partial: RestAuthConfig) -> Self {
        let pick = |new: String, old: String| if new.is_empty() { old } else { new };
        Self {
            auth_url: pick(partial.auth_url, self.auth_url),
            api_key: pick(partial.api_key, self.api_key),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<&str> = [("auth_url", &self.auth_url), ("api_key", &self.api_key)]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Incomplete {
                component: "Auth",
                missing: missing.join(", "),
            })
        }
    }
}

/// Realtime database base URL and optional auth token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    /// Sent as the `auth` query parameter (an ID token or database secret)
    pub auth_token: Option<String>,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Incomplete {
                component: "Database",
                missing: "url".to_string(),
            });
        }
        Ok(())
    }
}
