//! Loader for workspace configuration with YAML + environment overlays.
//!
//! `storysift.yaml` carries everything the pipeline needs: login
//! credentials (usually injected via `${VAR}` placeholders), capture tuning,
//! storage layout, and roster locations; the core crates never read
//! ambient process state themselves.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct SiftConfig {
    pub version: Option<String>,
    pub login: LoginConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
    pub roster: RosterConfig,
}

/// Login credentials for the scraping account.
#[derive(Debug, Deserialize)]
pub struct LoginConfig {
    pub username: String,
    pub password: String,
}

/// Tuning knobs for the capture loop.
#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    /// Fixed wait, in seconds, used to let asynchronous page activity settle
    /// before inspection.
    #[serde(default = "default_observation_window")]
    pub observation_window_secs: u64,
    /// Upper bound on login attempts before the batch is abandoned.
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,
    /// Fixed delay between failed (non-challenge) login attempts.
    #[serde(default = "default_login_backoff")]
    pub login_backoff_secs: u64,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Chromedriver endpoint the driver connects to.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            observation_window_secs: default_observation_window(),
            max_login_attempts: default_max_login_attempts(),
            login_backoff_secs: default_login_backoff(),
            headless: default_headless(),
            webdriver_url: default_webdriver_url(),
        }
    }
}

/// Where artifacts land. The tag is `backend`; prefixes apply to both.
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(flatten)]
    pub backend: StorageBackend,
    #[serde(default = "default_json_prefix")]
    pub json_prefix: String,
    #[serde(default = "default_csv_prefix")]
    pub csv_prefix: String,
    #[serde(default = "default_debug_prefix")]
    pub debug_prefix: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageBackend {
    Gcs {
        bucket: String,
        /// OAuth bearer token; when absent the store falls back to the
        /// `STORYSIFT_STORAGE_TOKEN` environment variable at build time.
        #[serde(default)]
        token: Option<String>,
    },
    Local {
        root: PathBuf,
    },
}

/// Roster inputs: a primary profile list plus an optional secondary list
/// that is filtered to Instagram rows before the union.
#[derive(Debug, Deserialize)]
pub struct RosterConfig {
    pub primary: PathBuf,
    #[serde(default)]
    pub secondary: Option<PathBuf>,
}

fn default_observation_window() -> u64 {
    5
}
fn default_max_login_attempts() -> u32 {
    3
}
fn default_login_backoff() -> u64 {
    10
}
fn default_headless() -> bool {
    true
}
fn default_webdriver_url() -> String {
    "http://localhost:9515".into()
}
fn default_json_prefix() -> String {
    "json_ext".into()
}
fn default_csv_prefix() -> String {
    "csv_output".into()
}
fn default_debug_prefix() -> String {
    "debug".into()
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct SiftConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for SiftConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SiftConfigLoader {
    /// Start with sensible defaults: YAML file + `STORYSIFT_` env overrides.
    ///
    /// ```
    /// use storysift_config::SiftConfigLoader;
    ///
    /// let config = SiftConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// version: "1"
    /// login:
    ///   username: "ana"
    ///   password: "pw"
    /// storage:
    ///   backend: local
    ///   root: "/tmp/storysift"
    /// roster:
    ///   primary: "roster.csv"
    /// "#,
    ///     )
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.capture.observation_window_secs, 5);
    /// assert_eq!(config.storage.json_prefix, "json_ext");
    /// ```
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("STORYSIFT").separator("__"));
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self.builder.add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// The loader combines YAML snippets with `STORYSIFT_`-prefixed environment
    /// variables and expands `${VAR}` placeholders before materialising
    /// strongly typed structs.
    ///
    /// ```
    /// use storysift_config::{SiftConfigLoader, StorageBackend};
    ///
    /// unsafe { std::env::set_var("SCRAPE_PASSWORD", "injected-from-env"); }
    ///
    /// let config = SiftConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// login:
    ///   username: "ana"
    ///   password: "${SCRAPE_PASSWORD}"
    /// storage:
    ///   backend: gcs
    ///   bucket: "projeto-meli-teste"
    /// roster:
    ///   primary: "roster.csv"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.login.password, "injected-from-env");
    /// match &config.storage.backend {
    ///     StorageBackend::Gcs { bucket, token } => {
    ///         assert_eq!(bucket, "projeto-meli-teste");
    ///         assert!(token.is_none());
    ///     }
    ///     _ => panic!("expected GCS backend"),
    /// }
    ///
    /// unsafe { std::env::remove_var("SCRAPE_PASSWORD"); }
    /// ```
    pub fn load(self) -> Result<SiftConfig, ConfigError> {
        let cfg = self.builder.build()?;

        // Convert to serde_json::Value first
        let mut v: Value = cfg.try_deserialize()?;
        // Recursively expand environment variables
        expand_env_in_value(&mut v);

        let typed: SiftConfig =
            serde_json::from_value(v).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use temp_env;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("CITY", Some("Recife")), ("UF", Some("PE"))], || {
            let mut v = json!([
                "hello-$CITY",
                { "loc": "${CITY}-${UF}" },
                42,
                true,
                null
            ]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!(["hello-Recife", { "loc": "Recife-PE" }, 42, true, null])
            );
        });
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                // BAR references BAZ; FOO references BAR — two hops.
                ("BAZ", Some("qux")),
                ("BAR", Some("mid-${BAZ}")),
                ("FOO", Some("start-${BAR}-end")),
            ],
            || {
                let mut v = json!("X=${FOO}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("X=start-mid-qux-end"));
            },
        );
    }

    #[test]
    fn stops_on_cycles_and_leaves_value_reasonable() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            // We don't care about the exact final string, only that the
            // function terminates. With the depth cap, this stops.
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST}"));
    }

    #[test]
    fn capture_defaults_apply_when_section_missing() {
        let cfg = SiftConfigLoader::new()
            .with_yaml_str(
                r#"
login:
  username: "ana"
  password: "pw"
storage:
  backend: local
  root: "/tmp/sift"
roster:
  primary: "roster.csv"
"#,
            )
            .load()
            .expect("load");
        assert_eq!(cfg.capture.max_login_attempts, 3);
        assert_eq!(cfg.capture.login_backoff_secs, 10);
        assert!(cfg.capture.headless);
        assert_eq!(cfg.capture.webdriver_url, "http://localhost:9515");
    }
}
