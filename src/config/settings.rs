//! Application settings loaded from config.toml
//!
//! Every value can also be supplied through the environment (after `.env` is
//! loaded), which is how the bot is usually deployed. Environment values win
//! over the file. The token and database URL are deliberately not part of
//! [`AppConfig`]; they are read directly where they are used.

use crate::core::publisher::AnnounceSettings;
use crate::core::retry::RetryPolicy;
use crate::core::service::LifecycleSettings;
use crate::core::staff_poll::PollSettings;
use crate::core::suggestion::{ChannelId, RoleId};
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Public suggestion settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SuggestionsConfig {
    /// Channel suggestions are posted in
    pub channel_id: u64,
    /// Distinct upvotes (excluding the bot) needed for staff review
    pub upvote_threshold: u32,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            channel_id: 0,
            upvote_threshold: 2,
        }
    }
}

/// Staff review settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StaffConfig {
    /// Channel staff polls are posted in
    pub channel_id: u64,
    /// Role whose members may vote
    pub role_id: u64,
    /// Hours a poll stays open before the timeout sweep resolves it
    pub poll_duration_hours: u32,
}

impl Default for StaffConfig {
    fn default() -> Self {
        Self {
            channel_id: 0,
            role_id: 0,
            poll_duration_hours: 24,
        }
    }
}

/// Announcement settings
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnnouncementsConfig {
    /// Channel results are announced in
    pub channel_id: u64,
    /// Role mentioned in each announcement
    pub role_id: Option<u64>,
}

/// Background sweep settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between sweeps
    pub sweep_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
        }
    }
}

/// Retry settings for platform calls
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per call, the first included
    pub max_attempts: u32,
    /// Delay before the first retry, doubling afterwards
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

/// The whole config.toml file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Guild the bot serves; staff role members are read from it
    pub guild_id: u64,
    /// `[suggestions]`
    pub suggestions: SuggestionsConfig,
    /// `[staff]`
    pub staff: StaffConfig,
    /// `[announcements]`
    pub announcements: AnnouncementsConfig,
    /// `[scheduler]`
    pub scheduler: SchedulerConfig,
    /// `[retry]`
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Overrides file values with environment variables. `lookup` returns
    /// the raw value of a variable, if set.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let id = |name: &str| parse_var::<u64>(&lookup, name);

        if let Some(v) = id("GUILD_ID")? {
            self.guild_id = v;
        }
        if let Some(v) = id("SUGGESTION_CHANNEL_ID")? {
            self.suggestions.channel_id = v;
        }
        if let Some(v) = id("STAFF_CHANNEL_ID")? {
            self.staff.channel_id = v;
        }
        if let Some(v) = id("STAFF_ROLE_ID")? {
            self.staff.role_id = v;
        }
        if let Some(v) = id("ANNOUNCEMENT_CHANNEL_ID")? {
            self.announcements.channel_id = v;
        }
        if let Some(v) = id("ANNOUNCE_ROLE_ID")? {
            self.announcements.role_id = Some(v);
        }
        if let Some(v) = parse_var::<u32>(&lookup, "UPVOTE_THRESHOLD")? {
            self.suggestions.upvote_threshold = v;
        }
        if let Some(v) = parse_var::<u32>(&lookup, "POLL_DURATION_HOURS")? {
            self.staff.poll_duration_hours = v;
        }
        Ok(())
    }

    /// Checks that every required id is set and every limit is sane.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("guild_id / GUILD_ID", self.guild_id),
            (
                "suggestions.channel_id / SUGGESTION_CHANNEL_ID",
                self.suggestions.channel_id,
            ),
            ("staff.channel_id / STAFF_CHANNEL_ID", self.staff.channel_id),
            ("staff.role_id / STAFF_ROLE_ID", self.staff.role_id),
            (
                "announcements.channel_id / ANNOUNCEMENT_CHANNEL_ID",
                self.announcements.channel_id,
            ),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| *value == 0) {
            return Err(config_error(format!("{name} is not set")));
        }

        if self.suggestions.upvote_threshold == 0 {
            return Err(config_error("upvote_threshold must be at least 1"));
        }
        if self.staff.poll_duration_hours == 0 {
            return Err(config_error("poll_duration_hours must be at least 1"));
        }
        if self.scheduler.sweep_interval_secs == 0 {
            return Err(config_error("sweep_interval_secs must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(config_error("retry.max_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Read-only settings handed to the lifecycle core.
    #[must_use]
    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            suggestion_channel: ChannelId(self.suggestions.channel_id),
            upvote_threshold: self.suggestions.upvote_threshold,
            poll: PollSettings {
                staff_channel: ChannelId(self.staff.channel_id),
                staff_role: RoleId(self.staff.role_id),
                duration: chrono::Duration::hours(i64::from(self.staff.poll_duration_hours)),
            },
            announce: AnnounceSettings {
                channel: ChannelId(self.announcements.channel_id),
                role: self.announcements.role_id.map(RoleId),
            },
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
            },
        }
    }

    /// Read-only overview shown by `/settings`.
    #[must_use]
    pub fn summary(&self) -> String {
        let announce_role = self
            .announcements
            .role_id
            .map_or_else(|| "none".to_string(), |id| format!("<@&{id}>"));
        format!(
            "**Suggestion settings**\n\
             • Suggestion channel: <#{}>\n\
             • Upvotes needed for staff review: {}\n\
             • Staff poll channel: <#{}>\n\
             • Staff role: <@&{}>\n\
             • Staff poll duration: {} hours\n\
             • Announcement channel: <#{}>\n\
             • Announcement role: {announce_role}",
            self.suggestions.channel_id,
            self.suggestions.upvote_threshold,
            self.staff.channel_id,
            self.staff.role_id,
            self.staff.poll_duration_hours,
            self.announcements.channel_id,
        )
    }

    /// Time between scheduler sweeps.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.sweep_interval_secs)
    }
}

fn config_error(message: impl Into<String>) -> Error {
    Error::Config {
        message: message.into(),
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|e| config_error(format!("{name}={raw:?} is invalid: {e}")))
}

/// Parses a config.toml file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path.display()),
    })
}

/// Loads `CONFIG_PATH` (default `config.toml`), applies environment
/// overrides, and validates the result.
///
/// A missing file is not an error; the bot can be configured entirely from
/// the environment.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

    let mut config = if Path::new(&path).exists() {
        load_config(&path)?
    } else {
        warn!(
            "Config file {} not found; using defaults and environment variables",
            path
        );
        AppConfig::default()
    };

    config.apply_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;

    info!(
        "Configuration loaded: threshold {}, poll duration {}h, sweep every {}s",
        config.suggestions.upvote_threshold,
        config.staff.poll_duration_hours,
        config.scheduler.sweep_interval_secs
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    const FULL: &str = r#"
        guild_id = 1

        [suggestions]
        channel_id = 10
        upvote_threshold = 5

        [staff]
        channel_id = 20
        role_id = 21
        poll_duration_hours = 48

        [announcements]
        channel_id = 30
        role_id = 31

        [scheduler]
        sweep_interval_secs = 15

        [retry]
        max_attempts = 4
        base_delay_ms = 250
    "#;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(FULL).unwrap();
        assert!(config.validate().is_ok());

        let settings = config.lifecycle_settings();
        assert_eq!(settings.upvote_threshold, 5);
        assert_eq!(settings.poll.duration, chrono::Duration::hours(48));
        assert_eq!(settings.announce.role, Some(RoleId(31)));
        assert_eq!(settings.retry.max_attempts, 4);
        assert_eq!(settings.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.sweep_interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: AppConfig = toml::from_str(
            r"
            guild_id = 1
            [suggestions]
            channel_id = 10
            [staff]
            channel_id = 20
            role_id = 21
            [announcements]
            channel_id = 30
            ",
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.suggestions.upvote_threshold, 2);
        assert_eq!(config.staff.poll_duration_hours, 24);
        assert_eq!(config.scheduler.sweep_interval_secs, 60);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.announcements.role_id, None);
    }

    #[test]
    fn test_environment_overrides_file() -> Result<()> {
        let mut config: AppConfig = toml::from_str(FULL).unwrap();
        let vars = env(&[
            ("STAFF_ROLE_ID", "99"),
            ("UPVOTE_THRESHOLD", "3"),
            ("ANNOUNCE_ROLE_ID", " 77 "),
            ("POLL_DURATION_HOURS", ""),
        ]);
        config.apply_overrides(|name| vars.get(name).cloned())?;

        assert_eq!(config.staff.role_id, 99);
        assert_eq!(config.suggestions.upvote_threshold, 3);
        assert_eq!(config.announcements.role_id, Some(77));
        assert_eq!(config.staff.poll_duration_hours, 48);
        Ok(())
    }

    #[test]
    fn test_environment_only_configuration() -> Result<()> {
        let mut config = AppConfig::default();
        let vars = env(&[
            ("GUILD_ID", "1"),
            ("SUGGESTION_CHANNEL_ID", "10"),
            ("STAFF_CHANNEL_ID", "20"),
            ("STAFF_ROLE_ID", "21"),
            ("ANNOUNCEMENT_CHANNEL_ID", "30"),
        ]);
        config.apply_overrides(|name| vars.get(name).cloned())?;
        config.validate()
    }

    #[test]
    fn test_malformed_override_is_config_error() {
        let mut config = AppConfig::default();
        let vars = env(&[("STAFF_CHANNEL_ID", "general")]);
        let result = config.apply_overrides(|name| vars.get(name).cloned());
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_missing_ids_and_zero_limits() {
        assert!(matches!(
            AppConfig::default().validate(),
            Err(Error::Config { .. })
        ));

        let mut config: AppConfig = toml::from_str(FULL).unwrap();
        config.suggestions.upvote_threshold = 0;
        assert!(config.validate().is_err());

        let mut config: AppConfig = toml::from_str(FULL).unwrap();
        config.staff.poll_duration_hours = 0;
        assert!(config.validate().is_err());

        let mut config: AppConfig = toml::from_str(FULL).unwrap();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_shows_channels_and_limits() {
        let config: AppConfig = toml::from_str(FULL).unwrap();
        let summary = config.summary();
        assert!(summary.contains("Suggestion channel: <#10>"));
        assert!(summary.contains("Upvotes needed for staff review: 5"));
        assert!(summary.contains("Staff poll duration: 48 hours"));
        assert!(summary.contains("Announcement role: <@&31>"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("definitely/not/here.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
