use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Text length above which a response must be split across messages.
/// Discord rejects message bodies longer than 2000 characters.
pub const TEXT_SPLIT_THRESHOLD: usize = 2000;

/// Top-level config (relaybot.toml + RELAYBOT_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub discord: DiscordConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub format: FormatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// When true, guild messages are only processed when the bot is @mentioned.
    #[serde(default)]
    pub require_mention: bool,
    /// When true, direct messages (DMs) are accepted.
    #[serde(default = "bool_true")]
    pub dm_allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Identities (upstream accounts) the bot can cycle through.
    /// Must contain at least one entry; fixed for the process lifetime.
    pub identities: Vec<IdentityConfig>,
}

/// A single upstream identity (account/profile).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub name: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Minutes of inactivity after which the upstream session is reset
    /// before the next turn. The remote service expires idle sessions on
    /// roughly this horizon.
    #[serde(default = "default_idle_reset_minutes")]
    pub idle_reset_minutes: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_reset_minutes: default_idle_reset_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    #[serde(default = "bool_true")]
    pub show_citations: bool,
    #[serde(default)]
    pub show_links: bool,
    #[serde(default = "bool_true")]
    pub show_limits: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            show_citations: true,
            show_links: false,
            show_limits: true,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_base_url() -> String {
    "http://localhost:8800".to_string()
}
fn default_idle_reset_minutes() -> i64 {
    30
}

impl RelayConfig {
    /// Load config from a TOML file with RELAYBOT_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.relaybot/relaybot.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RelayConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("RELAYBOT_").split("_"))
            .extract()
            .map_err(|e| crate::error::ConfigError::Load(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Startup invariants the rest of the system relies on.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.upstream.identities.is_empty() {
            return Err(crate::error::ConfigError::Invalid(
                "upstream.identities must contain at least one identity".to_string(),
            ));
        }
        if self.session.idle_reset_minutes <= 0 {
            return Err(crate::error::ConfigError::Invalid(
                "session.idle_reset_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.relaybot/relaybot.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> RelayConfig {
        RelayConfig {
            discord: DiscordConfig {
                bot_token: "t".into(),
                require_mention: false,
                dm_allowed: true,
            },
            upstream: UpstreamConfig {
                base_url: default_base_url(),
                identities: vec![IdentityConfig {
                    name: "primary".into(),
                    token: "k".into(),
                }],
            },
            session: SessionConfig::default(),
            format: FormatConfig::default(),
        }
    }

    #[test]
    fn defaults_match_original_toggles() {
        let f = FormatConfig::default();
        assert!(f.show_citations);
        assert!(!f.show_links);
        assert!(f.show_limits);
        assert_eq!(SessionConfig::default().idle_reset_minutes, 30);
    }

    #[test]
    fn empty_identity_list_is_rejected() {
        let mut cfg = minimal();
        cfg.upstream.identities.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn minimal_config_validates() {
        assert!(minimal().validate().is_ok());
    }
}
