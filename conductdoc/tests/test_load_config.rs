use conductdoc::load_config::{apply_env_overrides, load_config, load_config_or_default, CliConfig};
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const OVERRIDE_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "OUTPUT_DIR",
    "CACHE_DB_PATH",
    "CACHE_DURATION_DAYS",
    "OPENAI_API_KEY",
];

fn clear_overrides() {
    for key in OVERRIDE_KEYS {
        env::remove_var(key);
    }
}

#[tokio::test]
#[serial]
async fn test_load_config_full_file() {
    clear_overrides();
    let config_yaml = r#"
server:
  host: 127.0.0.1
  port: 9000
generator:
  output_dir: ./tmp/site
  extract_concurrency: 2
  cache:
    db_path: ./tmp/cache.db
    ttl_days: 3
  extraction:
    flatten_nested_functions: false
  synthesis:
    concurrency: 8
    timeout_secs: 30
openai:
  model: gpt-4o-mini
  base_url: http://localhost:8080/v1
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.generator.output_dir, PathBuf::from("./tmp/site"));
    assert_eq!(config.generator.extract_concurrency, 2);
    assert_eq!(config.generator.cache.db_path, PathBuf::from("./tmp/cache.db"));
    assert_eq!(config.generator.cache.ttl_days, 3);
    assert!(!config.generator.extraction.flatten_nested_functions);
    assert_eq!(config.generator.synthesis.concurrency, 8);
    assert_eq!(
        config.generator.synthesis.timeout(),
        Some(std::time::Duration::from_secs(30))
    );
    assert_eq!(config.openai.model, "gpt-4o-mini");
    assert_eq!(config.openai.api_key, None);
}

#[tokio::test]
#[serial]
async fn test_missing_sections_take_defaults() {
    clear_overrides();
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "server:\n  port: 8123\n").unwrap();

    let config = load_config(config_file.path()).expect("Partial config should load");
    assert_eq!(config.server.port, 8123);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.generator.output_dir, PathBuf::from("sample_output"));
    assert_eq!(config.generator.cache.db_path, PathBuf::from("cache.db"));
    assert_eq!(config.generator.cache.ttl_days, 7);
    assert!(config.generator.extraction.flatten_nested_functions);
    assert_eq!(config.openai.model, "gpt-4");
}

#[tokio::test]
#[serial]
async fn test_environment_overrides_file() {
    clear_overrides();
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "server:\n  port: 9000\ngenerator:\n  output_dir: from_file\n").unwrap();

    env::set_var("PORT", "7777");
    env::set_var("OUTPUT_DIR", "from_env");
    env::set_var("CACHE_DB_PATH", "/var/tmp/docs-cache.db");
    env::set_var("CACHE_DURATION_DAYS", "14");
    env::set_var("OPENAI_API_KEY", "sk-test");

    let config = load_config(config_file.path()).expect("Config should load");
    clear_overrides();

    assert_eq!(config.server.port, 7777);
    assert_eq!(config.generator.output_dir, PathBuf::from("from_env"));
    assert_eq!(
        config.generator.cache.db_path,
        PathBuf::from("/var/tmp/docs-cache.db")
    );
    assert_eq!(config.generator.cache.ttl_days, 14);
    assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
}

#[test]
fn test_invalid_override_values_are_errors() {
    struct TestCase {
        name: &'static str,
        key: &'static str,
        value: &'static str,
    }

    let cases = vec![
        TestCase {
            name: "port out of range",
            key: "PORT",
            value: "70000",
        },
        TestCase {
            name: "non-numeric ttl",
            key: "CACHE_DURATION_DAYS",
            value: "a week",
        },
    ];

    for case in cases {
        let result = apply_env_overrides(CliConfig::default(), |key| {
            (key == case.key).then(|| case.value.to_string())
        });
        assert!(result.is_err(), "case {}: expected an error", case.name);
    }
}

#[test]
fn test_blank_override_values_are_ignored() {
    let config = apply_env_overrides(CliConfig::default(), |_| Some("  ".to_string()))
        .expect("blank values should be skipped");
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.openai.api_key, None);
}

#[tokio::test]
#[serial]
async fn test_load_config_errors() {
    clear_overrides();
    let missing = load_config("/definitely/not/here.yaml");
    assert!(missing.is_err());
    assert!(missing
        .unwrap_err()
        .to_string()
        .contains("Failed to read config file"));

    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "server: [not, a, map]\n").unwrap();
    let invalid = load_config(config_file.path());
    assert!(invalid
        .unwrap_err()
        .to_string()
        .contains("Failed to parse config YAML"));

    let defaults = load_config_or_default(None).expect("defaults always load");
    assert_eq!(defaults.server.port, 8000);
}
