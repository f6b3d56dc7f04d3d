//! Coverage for config parsing and override precedence.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use persona_relay::config::AppConfig;

const FULL_TOML: &str = r#"
[server]
bind_addr = "0.0.0.0:9000"
log_level = "debug"
logs_dir = "/var/log/persona"
poll_interval_ms = 25

[llm]
base_url = "http://localhost:8080/v1"
model = "gpt-4o-mini"
temperature = 0.3
request_timeout_secs = 30

[telemetry]
host = "https://langfuse.internal"
public_key = "pk-lf-1234"
secret_key = "sk-lf-5678"
"#;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn parse_full_config() {
    let config = AppConfig::from_toml(FULL_TOML).expect("full config should parse");
    assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
    assert_eq!(config.server.logs_dir.as_deref(), Some(Path::new("/var/log/persona")));
    assert_eq!(config.server.poll_interval(), Duration::from_millis(25));
    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert_eq!(config.llm.request_timeout(), Duration::from_secs(30));
    assert!(config.telemetry.is_enabled());
}

#[test]
fn env_overrides_win_over_file_values() {
    let mut config = AppConfig::from_toml(FULL_TOML).expect("full config should parse");
    config.apply_overrides(env_from(&[
        ("PERSONA_MODEL", "gpt-5-nano"),
        ("PERSONA_TEMPERATURE", "1.0"),
        ("LANGFUSE_HOST", "https://cloud.langfuse.com"),
    ]));

    assert_eq!(config.llm.model, "gpt-5-nano");
    assert!((config.llm.temperature - 1.0).abs() < f32::EPSILON);
    assert_eq!(config.telemetry.host, "https://cloud.langfuse.com");
    // Untouched values keep their file settings.
    assert_eq!(config.llm.base_url, "http://localhost:8080/v1");
}

#[test]
fn mistyped_value_is_rejected() {
    let bad = "[server]\npoll_interval_ms = \"fast\"\n";
    assert!(AppConfig::from_toml(bad).is_err());
}

#[test]
fn empty_file_yields_defaults() {
    let config = AppConfig::from_toml("").expect("empty config should parse");
    assert_eq!(config.server.bind_addr, "127.0.0.1:8000");
    assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    assert!(!config.telemetry.is_enabled());
}
