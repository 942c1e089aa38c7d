use std::path::PathBuf;

use tk_domain::config::{Config, StoreScope};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config.server.cors.allowed_origins.contains(&"http://localhost:*".to_string()));
    assert!(config.server.cors.allowed_origins.contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn restart_is_disabled_by_default() {
    let config = Config::default();
    assert!(!config.gateway.restart_enabled);
    assert!(config.gateway.restart_command.is_none());
}

#[test]
fn full_file_parses() {
    let toml_str = r#"
[server]
port = 4000

[sessions]
state_path = "/var/lib/threadkeeper"
default_agent = "ops"
scope = "global"
delete_wait_ms = 5000

[gateway]
restart_enabled = true
restart_command = ["systemctl", "restart", "threadkeeper"]

[observability]
otlp_endpoint = "http://localhost:4317"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 4000);
    assert_eq!(config.sessions.state_path, PathBuf::from("/var/lib/threadkeeper"));
    assert_eq!(config.sessions.default_agent, "ops");
    assert_eq!(config.sessions.main_key, "main");
    assert_eq!(config.sessions.scope, StoreScope::Global);
    assert_eq!(config.sessions.delete_wait_ms, 5000);
    assert_eq!(config.sessions.compact_max_lines, 400);
    assert!(config.gateway.restart_enabled);
    assert_eq!(config.gateway.restart_command.as_ref().map(Vec::len), Some(3));
    assert_eq!(config.observability.export_endpoint(), Some("http://localhost:4317"));
    assert!(config.validate().is_empty());
}

#[test]
fn show_output_round_trips() {
    let config = Config::default();
    let rendered = toml::to_string_pretty(&config).unwrap();
    let parsed: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed.sessions.delete_wait_ms, config.sessions.delete_wait_ms);
    assert_eq!(parsed.server.port, config.server.port);
}
