//! Configuration loading tests

use logscope::config::{ConfigLoader, ENV_API_KEY, ENV_BASE_URL};
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_explicit_file() {
    let file = write_config(
        r#"
[datadog]
site = "us3.datadoghq.com"
api_key = "file-api"
app_key = "file-app"

[fetch]
gate_capacity = 2
max_retries = 4

[query]
default_limit = 250

[logging]
level = "logscope=debug"
json = true
"#,
    );
    let config = ConfigLoader::with_path(file.path()).load().unwrap();
    assert_eq!(config.datadog.site, "us3.datadoghq.com");
    assert_eq!(config.fetch.gate_capacity, 2);
    assert_eq!(config.fetch.max_retries, 4);
    assert_eq!(config.query.default_limit, 250);
    assert!(config.logging.json);
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConfigLoader::with_path(dir.path().join("absent.toml"))
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_malformed_file_is_an_error() {
    let file = write_config("[fetch\nmax_pages = ");
    let err = ConfigLoader::with_path(file.path()).load().unwrap_err();
    assert!(err.to_string().contains("Failed to parse"));
}

#[test]
fn test_invalid_values_rejected() {
    let file = write_config("[fetch]\npage_size = 0\n");
    assert!(ConfigLoader::with_path(file.path()).load().is_err());

    let file = write_config("[query]\ndefault_limit = 0\n");
    assert!(ConfigLoader::with_path(file.path()).load().is_err());
}

#[test]
fn test_overrides_win_over_file() {
    let file = write_config("[datadog]\napi_key = \"file-api\"\n");
    let mut config = ConfigLoader::parse(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
    ConfigLoader::apply_overrides(&mut config, |name| match name {
        n if n == ENV_API_KEY => Some("env-api".to_string()),
        n if n == ENV_BASE_URL => Some("http://localhost:8080".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.datadog.api_key, "env-api");
    assert_eq!(config.datadog.base_url.as_deref(), Some("http://localhost:8080"));
}
