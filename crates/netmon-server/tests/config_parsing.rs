use std::time::Duration;
use std::{env, fs};

use netmon_server::StoreBackend;
use netmon_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("netmon.toml");

    let toml_content = r#"
secrets_file = "/etc/netmon/secrets.json"

[server]
host = "0.0.0.0"
port = 8080

[logging]
level = "debug"

[session]
cookie_name = "nm"
secure = true
max_age = "12h"

[provider]
public_url = "https://netmon.example.com"
request_timeout = "5s"

[store]
backend = "dynamodb"

[store.dynamodb]
region = "us-west-2"
endpoint = "http://localhost:8000"
max_pages = 3

[gateway]
collection = "lab_devices"
contact_email = "ops@example.com"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.addr().to_string(), "0.0.0.0:8080");
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.session.cookie_name, "nm");
    assert!(cfg.session.secure);
    assert_eq!(cfg.session.max_age, Duration::from_secs(12 * 3600));
    assert_eq!(cfg.provider.request_timeout, Duration::from_secs(5));
    assert_eq!(
        cfg.provider.redirect_uri().expect("redirect uri").as_str(),
        "https://netmon.example.com/login/google/authorized"
    );
    assert_eq!(cfg.store.backend, StoreBackend::Dynamodb);
    assert_eq!(cfg.store.dynamodb.region, "us-west-2");
    assert_eq!(cfg.store.dynamodb.max_pages, 3);
    assert_eq!(cfg.gateway.collection, "lab_devices");
    assert_eq!(cfg.gateway.contact_email, "ops@example.com");
    assert_eq!(cfg.secrets_file.to_str(), Some("/etc/netmon/secrets.json"));

    // 2) Env override should win over file
    unsafe {
        env::set_var("NETMON__SERVER__PORT", "9090");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9090);
    unsafe {
        env::remove_var("NETMON__SERVER__PORT");
    }

    // 3) Memory backend without seed data is rejected
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[store]
backend = "memory"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("seed_file"));

    // 4) Missing file falls back to defaults
    let cfg_default =
        load_config(dir.path().join("absent.toml").to_str()).expect("defaults should load");
    assert_eq!(cfg_default.server.port, 5000);
    assert_eq!(cfg_default.gateway.collection, "netmon_devices");
}
