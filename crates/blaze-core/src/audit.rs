//! Audit records stamped into every create / update payload.
//!
//! A record names the actor, the instant, and a best-effort description of
//! the client environment. Environment probing never fails: descriptors the
//! host cannot report become empty strings and the browser family becomes
//! `"Unknown"`.

use blaze_api::Value;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Actor recorded when a request does not name one.
pub const ANONYMOUS_ACTOR: &str = "anonymous";

/// Browser family reported when the user agent matches no known family.
pub const UNKNOWN_BROWSER: &str = "Unknown";

/// Environment variable consulted by [`ProcessEnvironment`] for a user agent.
pub const USER_AGENT_ENV: &str = "BLAZE_USER_AGENT";

/// Environment descriptors recorded with each audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContext {
    pub user_agent: String,
    pub platform: String,
    pub language: String,
    pub screen_resolution: String,
    pub browser: String,
}

/// The `createdBy` / `updatedBy` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// ISO-8601, UTC, millisecond precision
    pub timestamp: String,
    pub actor_id: String,
    pub client_context: ClientContext,
}

impl AuditRecord {
    /// The record as a store value.
    pub fn to_value(&self) -> Value {
        Value::object([
            ("timestamp", Value::from(self.timestamp.as_str())),
            ("actorId", Value::from(self.actor_id.as_str())),
            (
                "clientContext",
                Value::object([
                    ("userAgent", self.client_context.user_agent.as_str()),
                    ("platform", self.client_context.platform.as_str()),
                    ("language", self.client_context.language.as_str()),
                    (
                        "screenResolution",
                        self.client_context.screen_resolution.as_str(),
                    ),
                    ("browser", self.client_context.browser.as_str()),
                ]),
            ),
        ])
    }

    /// Parse the timestamp back into an instant.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Read-only probes of the host the client runs on.
///
/// Each probe returns `None` when the host cannot tell.
pub trait HostEnvironment: Send + Sync {
    fn user_agent(&self) -> Option<String>;
    fn platform(&self) -> Option<String>;
    fn language(&self) -> Option<String>;
    fn screen_resolution(&self) -> Option<String>;
}

/// Probes the current process: there is no screen, the platform is the
/// compile target, the language comes from the locale variables.
#[derive(Debug, Clone, Default)]
pub struct ProcessEnvironment {
    user_agent: Option<String>,
}

impl ProcessEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a fixed user agent instead of reading `BLAZE_USER_AGENT`.
    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
        }
    }
}

impl HostEnvironment for ProcessEnvironment {
    fn user_agent(&self) -> Option<String> {
        self.user_agent
            .clone()
            .or_else(|| std::env::var(USER_AGENT_ENV).ok())
            .filter(|ua| !ua.trim().is_empty())
    }

    fn platform(&self) -> Option<String> {
        Some(format!(
            "{} {}",
            std::env::consts::OS,
            std::env::consts::ARCH
        ))
    }

    fn language(&self) -> Option<String> {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
            .and_then(|locale| locale_to_language_tag(&locale))
    }

    fn screen_resolution(&self) -> Option<String> {
        None
    }
}

/// Fixed descriptors, e.g. forwarded from a browser request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticEnvironment {
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub language: Option<String>,
    pub screen_resolution: Option<String>,
}

impl HostEnvironment for StaticEnvironment {
    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }

    fn platform(&self) -> Option<String> {
        self.platform.clone()
    }

    fn language(&self) -> Option<String> {
        self.language.clone()
    }

    fn screen_resolution(&self) -> Option<String> {
        self.screen_resolution.clone()
    }
}

/// Builds audit records. Cheap to clone; holds no mutable state.
#[derive(Clone)]
pub struct AuditStamper {
    environment: Arc<dyn HostEnvironment>,
}

impl Default for AuditStamper {
    fn default() -> Self {
        Self::new(Arc::new(ProcessEnvironment::new()))
    }
}

impl std::fmt::Debug for AuditStamper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditStamper").finish_non_exhaustive()
    }
}

impl AuditStamper {
    pub fn new(environment: Arc<dyn HostEnvironment>) -> Self {
        Self { environment }
    }

    /// Stamp with the current wall-clock time.
    pub fn stamp(&self, actor_id: &str) -> AuditRecord {
        self.stamp_at(actor_id, Utc::now())
    }

    /// Stamp with an explicit instant.
    pub fn stamp_at(&self, actor_id: &str, at: DateTime<Utc>) -> AuditRecord {
        let user_agent = self.environment.user_agent().unwrap_or_default();
        let browser = classify_browser(&user_agent).to_string();

        AuditRecord {
            timestamp: format_timestamp(at),
            actor_id: actor_id.to_string(),
            client_context: ClientContext {
                platform: self.environment.platform().unwrap_or_default(),
                language: self.environment.language().unwrap_or_default(),
                screen_resolution: self.environment.screen_resolution().unwrap_or_default(),
                browser,
                user_agent,
            },
        }
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Browser family from a user-agent string. First match wins.
pub fn classify_browser(user_agent: &str) -> &'static str {
    if user_agent.contains("Firefox") {
        "Firefox"
    } else if user_agent.contains("Opera") || user_agent.contains("OPR") {
        "Opera"
    } else if user_agent.contains("Chrome") {
        "Chrome"
    } else if user_agent.contains("Safari") {
        "Safari"
    } else if user_agent.contains("MSIE") || user_agent.contains("Trident/") {
        "Internet Explorer"
    } else {
        UNKNOWN_BROWSER
    }
}

/// `en_US.UTF-8` -> `en-US`. `C` and `POSIX` carry no language.
fn locale_to_language_tag(locale: &str) -> Option<String> {
    let base = locale
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serial_test::serial;

    const CHROME_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const OPERA_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 OPR/106.0.0.0";
    const FIREFOX_UA: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const SAFARI_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15";
    const IE_UA: &str = "Mozilla/5.0 (Windows NT 6.1; Trident/7.0; rv:11.0) like Gecko";

    fn browser_environment() -> StaticEnvironment {
        StaticEnvironment {
            user_agent: Some(CHROME_UA.to_string()),
            platform: Some("Linux x86_64".to_string()),
            language: Some("en-US".to_string()),
            screen_resolution: Some("1920x1080".to_string()),
        }
    }

    #[test]
    fn test_classify_browser_precedence() {
        assert_eq!(classify_browser(FIREFOX_UA), "Firefox");
        // Opera UAs also mention Chrome and Safari
        assert_eq!(classify_browser(OPERA_UA), "Opera");
        assert_eq!(classify_browser(CHROME_UA), "Chrome");
        assert_eq!(classify_browser(SAFARI_UA), "Safari");
        assert_eq!(classify_browser(IE_UA), "Internet Explorer");
        assert_eq!(classify_browser("MSIE 9.0"), "Internet Explorer");
        assert_eq!(classify_browser("curl/8.0"), UNKNOWN_BROWSER);
        assert_eq!(classify_browser(""), UNKNOWN_BROWSER);
    }

    #[test]
    fn test_stamp_shape() {
        let stamper = AuditStamper::new(Arc::new(browser_environment()));
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();

        let record = stamper.stamp_at("user1", at);

        assert_eq!(record.actor_id, "user1");
        assert_eq!(record.timestamp, "2024-05-01T12:30:00.000Z");
        assert_eq!(record.instant(), Some(at));
        assert_eq!(record.client_context.browser, "Chrome");
        assert_eq!(record.client_context.screen_resolution, "1920x1080");
        assert_eq!(record.client_context.language, "en-US");
    }

    #[test]
    fn test_stamp_without_environment_degrades() {
        let stamper = AuditStamper::new(Arc::new(StaticEnvironment::default()));
        let record = stamper.stamp("svc");

        assert_eq!(record.client_context.user_agent, "");
        assert_eq!(record.client_context.platform, "");
        assert_eq!(record.client_context.language, "");
        assert_eq!(record.client_context.screen_resolution, "");
        assert_eq!(record.client_context.browser, UNKNOWN_BROWSER);
        assert!(record.instant().is_some());
    }

    #[test]
    fn test_consecutive_stamps_are_non_decreasing() {
        let stamper = AuditStamper::new(Arc::new(StaticEnvironment::default()));
        let first = stamper.stamp("user1");
        let second = stamper.stamp("user1");

        assert_eq!(first.actor_id, second.actor_id);
        assert!(first.instant().unwrap() <= second.instant().unwrap());
    }

    #[test]
    fn test_record_value_matches_serde_form() {
        let stamper = AuditStamper::new(Arc::new(browser_environment()));
        let record = stamper.stamp("admin");

        let via_serde = Value::from(serde_json::to_value(&record).unwrap());
        assert_eq!(record.to_value(), via_serde);
        assert_eq!(
            record.to_value().pointer("clientContext/screenResolution"),
            Some(&Value::from("1920x1080"))
        );
    }

    #[test]
    fn test_locale_to_language_tag() {
        assert_eq!(
            locale_to_language_tag("en_US.UTF-8").as_deref(),
            Some("en-US")
        );
        assert_eq!(locale_to_language_tag("de_DE@euro").as_deref(), Some("de-DE"));
        assert_eq!(locale_to_language_tag("fr").as_deref(), Some("fr"));
        assert_eq!(locale_to_language_tag("C"), None);
        assert_eq!(locale_to_language_tag("POSIX.UTF-8"), None);
    }

    #[test]
    #[serial]
    fn test_process_environment_reads_user_agent_variable() {
        std::env::set_var(USER_AGENT_ENV, FIREFOX_UA);
        let record = AuditStamper::default().stamp("cli");
        std::env::remove_var(USER_AGENT_ENV);

        assert_eq!(record.client_context.user_agent, FIREFOX_UA);
        assert_eq!(record.client_context.browser, "Firefox");
        assert_eq!(record.client_context.screen_resolution, "");
        assert!(!record.client_context.platform.is_empty());
    }

    #[test]
    #[serial]
    fn test_process_environment_without_user_agent() {
        std::env::remove_var(USER_AGENT_ENV);
        let record = AuditStamper::default().stamp("cli");
        assert_eq!(record.client_context.user_agent, "");
        assert_eq!(record.client_context.browser, UNKNOWN_BROWSER);

        let fixed = AuditStamper::new(Arc::new(ProcessEnvironment::with_user_agent(SAFARI_UA)));
        assert_eq!(fixed.stamp("cli").client_context.browser, "Safari");
    }
}
