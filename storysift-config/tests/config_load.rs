use serial_test::serial;
use std::{fs, path::PathBuf};
use storysift_config::{SiftConfigLoader, StorageBackend};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn test_config_load() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
version: "0.1"
login:
  username: "${SIFT_LOGIN_USER}"
  password: "${SIFT_LOGIN_PASS}"
capture:
  observation_window_secs: 7
  max_login_attempts: 2
  headless: true
storage:
  backend: gcs
  bucket: "projeto-meli-teste"
  json_prefix: "json_ext"
  csv_prefix: "csv_output"
roster:
  primary: "perfis_hyeser.csv"
  secondary: "perfis_fabio.csv"
  "#;
    let p = write_yaml(&tmp, "storysift.yaml", file_yaml);

    temp_env::with_vars(
        [
            ("SIFT_LOGIN_USER", Some("scrape_account")),
            ("SIFT_LOGIN_PASS", Some("pw-from-env")),
        ],
        || {
            let config = SiftConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load system config");

            assert_eq!(config.login.username, "scrape_account");
            assert_eq!(config.login.password, "pw-from-env");
            assert_eq!(config.capture.observation_window_secs, 7);
            assert_eq!(config.capture.max_login_attempts, 2);
            // Unset knobs keep their defaults.
            assert_eq!(config.capture.login_backoff_secs, 10);
            match &config.storage.backend {
                StorageBackend::Gcs { bucket, .. } => assert_eq!(bucket, "projeto-meli-teste"),
                other => panic!("expected gcs backend, got {other:?}"),
            }
            assert_eq!(config.storage.debug_prefix, "debug");
            assert_eq!(
                config.roster.secondary.as_deref(),
                Some(std::path::Path::new("perfis_fabio.csv"))
            );
        },
    );
}
