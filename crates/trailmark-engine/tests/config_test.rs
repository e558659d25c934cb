use std::io::Write;
use tempfile::NamedTempFile;
use trailmark_engine::config::{ConfigError, ConfigLoader, RecorderConfig};

#[tokio::test]
async fn test_partial_config_keeps_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "server:\n  port: 9100\nsecurity:\n  sensitive_fields:\n    - iban\n    - pin_code"
    )
    .unwrap();

    let config = ConfigLoader::load_from(file.path()).await.unwrap();
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.security.sensitive_fields, vec!["iban", "pin_code"]);
    assert_eq!(config.logging.filter, "info");
}

#[tokio::test]
async fn test_empty_mapping_is_default() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{{}}").unwrap();

    let config = ConfigLoader::load_from(file.path()).await.unwrap();
    let default = RecorderConfig::default();
    assert_eq!(config.server.port, default.server.port);
    assert_eq!(config.security.sensitive_fields, default.security.sensitive_fields);
    assert!(config.security.sensitive_fields.iter().any(|f| f == "password"));
}

#[tokio::test]
async fn test_invalid_yaml_is_a_parse_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "server: [unclosed").unwrap();

    let err = ConfigLoader::load_from(file.path()).await.unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[tokio::test]
async fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConfigLoader::load_from(&dir.path().join("absent.yaml"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
