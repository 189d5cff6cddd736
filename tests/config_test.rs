use robodash::config::{Config, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_READ_TIMEOUT};
use robodash::config::secrets::{ExposeSecret, authorization_value};
use std::time::Duration;

const VARS: [&str; 5] = [
    "ROBODASH_API_TOKEN",
    "ROBODASH_HOST",
    "ROBODASH_ENABLED",
    "ROBODASH_CONNECT_TIMEOUT_MS",
    "ROBODASH_READ_TIMEOUT_MS",
];

fn clear_env() {
    for var in VARS {
        unsafe { std::env::remove_var(var) };
    }
}

// Environment variables are process-wide, so every env scenario runs in
// this one test to avoid racing the test harness's threads.
#[test]
fn config_from_env() {
    clear_env();

    // Nothing set: defaults, and no token is not an error.
    let config = Config::from_env().unwrap();
    assert!(!config.has_token());
    assert!(config.enabled);
    assert_eq!(config.host, DEFAULT_HOST);
    assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);

    unsafe {
        std::env::set_var("ROBODASH_API_TOKEN", "tok-123");
        std::env::set_var("ROBODASH_HOST", "http://localhost:3000");
        std::env::set_var("ROBODASH_ENABLED", "false");
        std::env::set_var("ROBODASH_CONNECT_TIMEOUT_MS", "250");
        std::env::set_var("ROBODASH_READ_TIMEOUT_MS", "1500");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(
        config.api_token.as_ref().map(|t| t.expose_secret().to_string()),
        Some("tok-123".to_string())
    );
    assert_eq!(config.host, "http://localhost:3000");
    assert!(!config.enabled);
    assert_eq!(config.connect_timeout, Duration::from_millis(250));
    assert_eq!(config.read_timeout, Duration::from_millis(1500));

    unsafe { std::env::set_var("ROBODASH_ENABLED", "sometimes") };
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("ROBODASH_ENABLED", "yes");
        std::env::set_var("ROBODASH_READ_TIMEOUT_MS", "five");
    }
    assert!(Config::from_env().is_err());

    clear_env();
}

#[test]
fn token_is_redacted_from_debug_output() {
    let config = Config::with_token("super-secret");
    assert!(!format!("{config:?}").contains("super-secret"));
}

#[test]
fn authorization_uses_dashboard_token_scheme() {
    let config = Config::with_token("abc");
    let token = config.api_token.as_ref().unwrap();
    assert_eq!(authorization_value(token), "dashboard-token abc");
}
