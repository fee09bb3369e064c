// tests/integration/config_test.rs

//! Integration tests for loading and validating configuration files

use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tether::config::Config;
use tether::core::reconnect::Backoff;
use tether::core::transport::{ProtocolTypes, ProxyKind};
use tracing::level_filters::LevelFilter;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn load(contents: &str) -> anyhow::Result<Config> {
    let file = write_config(contents);
    Config::from_file(file.path().to_str().unwrap())
}

fn load_err(contents: &str) -> String {
    format!("{:#}", load(contents).unwrap_err())
}

#[test]
fn test_empty_file_uses_defaults() {
    let config = load("").unwrap();

    assert_eq!(config, Config::default());
    assert_eq!(config.log_level, "info");
    assert_eq!(config.session.wait_timeout, Duration::from_secs(1));
    assert_eq!(config.session.shutdown_timeout, Duration::from_secs(5));
    assert_eq!(config.reconnect.delay, Duration::from_secs(2));
    assert_eq!(config.reconnect.max_attempts, None);
    assert_eq!(config.transport.protocols, ProtocolTypes::TCP);
    assert!(config.transport.proxy.is_none());
}

#[test]
fn test_full_file() {
    let config = load(
        r#"
log_level = "debug"

[session]
login_id = 42
wait_timeout = "250ms"
shutdown_timeout = "3s"

[reconnect]
delay = "500ms"
backoff = "exponential"
max_delay = "30s"
jitter = "100ms"
max_attempts = 5

[transport]
protocols = ["websocket"]

[transport.proxy]
host = "proxy.internal"
port = 3128
kind = "http"
"#,
    )
    .unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.session.login_id, 42);
    assert_eq!(config.session.wait_timeout, Duration::from_millis(250));
    assert_eq!(config.session.shutdown_timeout, Duration::from_secs(3));
    assert_eq!(config.reconnect.delay, Duration::from_millis(500));
    assert_eq!(config.reconnect.backoff, Backoff::Exponential);
    assert_eq!(config.reconnect.max_delay, Duration::from_secs(30));
    assert_eq!(config.reconnect.jitter, Duration::from_millis(100));
    assert_eq!(config.reconnect.max_attempts, Some(5));
    assert_eq!(config.transport.protocols, ProtocolTypes::WEB_SOCKET);

    let proxy = config.transport.proxy.unwrap();
    assert_eq!(proxy.host, "proxy.internal");
    assert_eq!(proxy.port, 3128);
    assert_eq!(proxy.kind, ProxyKind::Http);
}

#[test]
fn test_multiple_protocols() {
    let config = load(
        r#"
[transport]
protocols = ["tcp", "udp", "web_socket"]
"#,
    )
    .unwrap();

    assert_eq!(config.transport.protocols, ProtocolTypes::all());
}

#[test]
fn test_missing_file() {
    let err = Config::from_file("/nonexistent/tether.toml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_malformed_toml() {
    let err = load_err("log_level = ");
    assert!(err.contains("Failed to parse TOML"), "{err}");
}

#[test]
fn test_unknown_backoff() {
    let err = load_err("[reconnect]\nbackoff = \"linear\"\n");
    assert!(err.contains("Failed to parse TOML"), "{err}");
}

#[test]
fn test_zero_wait_timeout_rejected() {
    let err = load_err("[session]\nwait_timeout = \"0s\"\n");
    assert!(err.contains("session.wait_timeout cannot be 0"), "{err}");
}

#[test]
fn test_zero_reconnect_delay_rejected() {
    let err = load_err("[reconnect]\ndelay = \"0s\"\n");
    assert!(err.contains("reconnect.delay cannot be 0"), "{err}");
}

#[test]
fn test_exponential_ceiling_below_delay_rejected() {
    let err = load_err(
        r#"
[reconnect]
delay = "10s"
backoff = "exponential"
max_delay = "5s"
"#,
    );
    assert!(err.contains("reconnect.max_delay"), "{err}");
}

#[test]
fn test_fixed_backoff_ignores_ceiling() {
    let config = load(
        r#"
[reconnect]
delay = "10s"
max_delay = "5s"
"#,
    )
    .unwrap();
    assert_eq!(config.reconnect.backoff, Backoff::Fixed);
}

#[test]
fn test_empty_protocols_rejected() {
    let err = load_err("[transport]\nprotocols = []\n");
    assert!(err.contains("at least one protocol"), "{err}");
}

#[test]
fn test_http_proxy_with_tcp_rejected() {
    let err = load_err(
        r#"
[transport]
protocols = ["tcp", "websocket"]

[transport.proxy]
host = "127.0.0.1"
port = 8080
kind = "http"
"#,
    );
    assert!(err.contains("HTTP proxy"), "{err}");
}

#[test]
fn test_socks_proxy_with_tcp_accepted() {
    let config = load(
        r#"
[transport.proxy]
host = "127.0.0.1"
port = 1080
kind = "socks"
"#,
    )
    .unwrap();
    assert_eq!(config.transport.proxy.unwrap().kind, ProxyKind::Socks);
}

#[test]
fn test_proxy_port_zero_rejected() {
    let err = load_err(
        r#"
[transport.proxy]
host = "127.0.0.1"
port = 0
kind = "socks"
"#,
    );
    assert!(err.contains("proxy port cannot be 0"), "{err}");
}

#[test]
fn test_proxy_empty_host_rejected() {
    let err = load_err(
        r#"
[transport.proxy]
host = "  "
port = 1080
kind = "socks"
"#,
    );
    assert!(err.contains("proxy host cannot be empty"), "{err}");
}

#[test]
fn test_log_level_exposed_as_filter() {
    let config = load("log_level = \"debug\"\n").unwrap();
    assert_eq!(config.level_filter(), LevelFilter::DEBUG);
    assert_eq!(Config::default().level_filter(), LevelFilter::INFO);
}

#[test]
fn test_invalid_log_level_rejected() {
    let err = load_err("log_level = \"chatty\"\n");
    assert!(err.contains("log_level 'chatty' is not a valid level"), "{err}");
}
