mod gateway;
mod observability;
mod server;
mod sessions;

pub use gateway::*;
pub use observability::*;
pub use server::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut error = |field: &str, message: &str| {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: field.into(),
                message: message.into(),
            });
        };

        if self.server.port == 0 {
            error("server.port", "port must be greater than 0");
        }
        if self.server.host.is_empty() {
            error("server.host", "host must not be empty");
        }

        let sessions = &self.sessions;
        if sessions.state_path.as_os_str().is_empty() {
            error("sessions.state_path", "state_path must not be empty");
        }
        if !is_key_segment(&sessions.default_agent) {
            error(
                "sessions.default_agent",
                "default_agent must be a non-empty key segment without ':'",
            );
        }
        if !is_key_segment(&sessions.main_key) {
            error(
                "sessions.main_key",
                "main_key must be a non-empty key segment without ':'",
            );
        }
        if sessions.compact_max_lines == 0 {
            error("sessions.compact_max_lines", "compact_max_lines must be at least 1");
        }
        if sessions.delete_wait_ms == 0 {
            error("sessions.delete_wait_ms", "delete_wait_ms must be greater than 0");
        }
        if sessions.abort_flag_ttl_secs == 0 {
            error(
                "sessions.abort_flag_ttl_secs",
                "abort_flag_ttl_secs must be greater than 0",
            );
        }

        if !self.observability.sample_rate_in_range() {
            error(
                "observability.sample_rate",
                "sample_rate must be between 0.0 and 1.0",
            );
        }

        if let Some(cmd) = &self.gateway.restart_command {
            if cmd.is_empty() || cmd[0].trim().is_empty() {
                error("gateway.restart_command", "restart_command needs a program");
            }
        }

        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if self.gateway.restart_enabled && self.gateway.restart_command.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "gateway.restart_command".into(),
                message: "restart is enabled but only the in-process listener can serve it"
                    .into(),
            });
        }

        errors
    }
}

fn is_key_segment(s: &str) -> bool {
    !s.trim().is_empty() && !s.contains(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let issues = Config::default().validate();
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn colon_in_main_key_is_an_error() {
        let mut cfg = Config::default();
        cfg.sessions.main_key = "a:b".into();
        let issues = cfg.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "sessions.main_key");
        assert_eq!(issues[0].severity, ConfigSeverity::Error);
    }

    #[test]
    fn sample_rate_above_one_is_an_error() {
        let mut cfg = Config::default();
        cfg.observability.sample_rate = Some(1.5);
        let issues = cfg.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "observability.sample_rate");
        assert_eq!(issues[0].severity, ConfigSeverity::Error);
    }

    #[test]
    fn restart_without_command_warns() {
        let mut cfg = Config::default();
        cfg.gateway.restart_enabled = true;
        let issues = cfg.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, ConfigSeverity::Warning);
    }
}
