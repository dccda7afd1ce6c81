use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use encoding_rs::Encoding;
use prefsync_core::client::{DEFAULT_BASE_URL, DEFAULT_WSAPI_VERSION};
use prefsync_core::{Credentials, IntegrationHeaders, RallyConfig};
use serde::{Deserialize, Serialize};

use crate::cli::RunArgs;

const DEFAULT_INPUT: &str = "rally-copy-kanban-prefs.csv";
const DEFAULT_LOG_FILE: &str = "rally-copy-storykanban-prefs.log";
const DEFAULT_ENCODING: &str = "windows-1251";
const LOCAL_CONFIG: &str = "prefsync.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_wsapi_version")]
    pub wsapi_version: String,
    #[serde(default = "default_input")]
    pub input: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Character encoding of the input file, as a WHATWG label
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub integration: IntegrationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: Option<String>,
    /// Prefer PREFSYNC__AUTH__PASSWORD over storing this in a file
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Values for the X-RallyIntegration* request headers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_wsapi_version() -> String {
    DEFAULT_WSAPI_VERSION.to_string()
}

fn default_input() -> PathBuf {
    PathBuf::from(DEFAULT_INPUT)
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            wsapi_version: default_wsapi_version(),
            input: default_input(),
            delimiter: default_delimiter(),
            encoding: default_encoding(),
            log_file: default_log_file(),
            log_level: default_log_level(),
            auth: AuthConfig::default(),
            integration: IntegrationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Command-line flags win over file and environment values.
    pub fn apply_overrides(&mut self, args: &RunArgs) {
        if let Some(input) = &args.input {
            self.input = input.clone();
        }
        if let Some(delimiter) = args.delimiter {
            self.delimiter = delimiter.to_string();
        }
        if let Some(encoding) = &args.encoding {
            self.encoding = encoding.clone();
        }
        if let Some(base_url) = &args.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(log_file) = &args.log_file {
            self.log_file = log_file.clone();
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
        if let Some(username) = &args.username {
            self.auth.username = Some(username.clone());
        }
        if let Some(password) = &args.password {
            self.auth.password = Some(password.clone());
        }
        if let Some(api_key) = &args.api_key {
            self.auth.api_key = Some(api_key.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            anyhow::bail!("base_url must not be empty");
        }
        if self.wsapi_version.trim().is_empty() {
            anyhow::bail!("wsapi_version must not be empty");
        }
        self.delimiter_byte()?;
        self.input_encoding()?;
        self.credentials()?;
        Ok(())
    }

    /// The input delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter.as_bytes() {
            [b] => Ok(*b),
            _ => anyhow::bail!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            ),
        }
    }

    pub fn input_encoding(&self) -> Result<&'static Encoding> {
        Encoding::for_label(self.encoding.trim().as_bytes())
            .with_context(|| format!("Unknown input encoding: {:?}", self.encoding))
    }

    /// API key wins when both an API key and a username are configured.
    pub fn credentials(&self) -> Result<Credentials> {
        let auth = &self.auth;
        if let Some(key) = auth.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(Credentials::ApiKey {
                key: key.to_string(),
            });
        }
        match (auth.username.as_deref(), auth.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() => Ok(Credentials::Basic {
                username: username.to_string(),
                password: password.to_string(),
            }),
            (Some(_), None) => anyhow::bail!("auth.password is required with auth.username"),
            _ => anyhow::bail!(
                "No credentials configured. Set auth.api_key or auth.username/auth.password, \
                 use --api-key, or set PREFSYNC__AUTH__API_KEY"
            ),
        }
    }

    pub fn rally_config(&self) -> Result<RallyConfig> {
        Ok(RallyConfig::new(self.credentials()?)
            .with_base_url(self.base_url.trim())
            .with_wsapi_version(self.wsapi_version.trim())
            .with_integration(IntegrationHeaders {
                name: self.integration.name.clone(),
                vendor: self.integration.vendor.clone(),
                version: self.integration.version.clone(),
            }))
    }
}

fn home_config() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".prefsync").join("config.toml"))
}

/// Resolves the config file: the explicit path (which must exist), else
/// `./prefsync.toml`, else `~/.prefsync/config.toml`.
fn config_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = path {
        if !p.exists() {
            anyhow::bail!("Config file not found: {}", p.display());
        }
        return Ok(Some(p.to_path_buf()));
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Ok(Some(local));
    }
    Ok(home_config().filter(|p| p.exists()))
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = Config::builder();
    if let Some(file) = config_file(path)? {
        builder = builder.add_source(File::from(file));
    }
    // Environment variable overrides, e.g. PREFSYNC__AUTH__API_KEY=_abc
    builder = builder.add_source(
        Environment::with_prefix("PREFSYNC")
            .try_parsing(true)
            .separator("__"),
    );
    let cfg = builder.build().context("config build error")?;
    let merged: AppConfig = cfg
        .try_deserialize()
        .context("config deserialize error")?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.base_url, "https://rally1.rallydev.com/slm");
        assert_eq!(cfg.wsapi_version, "v2.0");
        assert_eq!(cfg.input, PathBuf::from("rally-copy-kanban-prefs.csv"));
        assert_eq!(cfg.delimiter_byte().unwrap(), b',');
        assert_eq!(cfg.input_encoding().unwrap(), encoding_rs::WINDOWS_1251);
        assert_eq!(cfg.log_file, PathBuf::from("rally-copy-storykanban-prefs.log"));
        assert!(cfg.validate().is_err(), "no credentials by default");
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
base_url = "https://rally.example.com/slm"
delimiter = ";"
input = "prefs.csv"

[auth]
username = "user@company.com"
password = "password"

[integration]
name = "Kanban Policy Copier"
"#,
        );
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.base_url, "https://rally.example.com/slm");
        assert_eq!(cfg.delimiter_byte().unwrap(), b';');
        assert_eq!(cfg.input, PathBuf::from("prefs.csv"));
        assert_eq!(cfg.wsapi_version, "v2.0");
        assert!(matches!(cfg.credentials().unwrap(), Credentials::Basic { .. }));
        assert_eq!(cfg.integration.name.as_deref(), Some("Kanban Policy Copier"));
        cfg.validate().unwrap();
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(load_config(Some(Path::new("/definitely/not/here.toml"))).is_err());
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut cfg = AppConfig::default();
        cfg.auth.username = Some("file-user".into());
        cfg.auth.password = Some("file-pass".into());
        let args = RunArgs {
            delimiter: Some('\t'),
            api_key: Some("_key".into()),
            base_url: Some("https://other.example.com/slm".into()),
            ..RunArgs::default()
        };
        cfg.apply_overrides(&args);

        assert_eq!(cfg.delimiter_byte().unwrap(), b'\t');
        assert_eq!(cfg.base_url, "https://other.example.com/slm");
        assert!(matches!(cfg.credentials().unwrap(), Credentials::ApiKey { .. }));
    }

    #[test]
    fn test_rejects_bad_delimiter() {
        let cfg = AppConfig {
            delimiter: ";;".into(),
            ..AppConfig::default()
        };
        assert!(cfg.delimiter_byte().is_err());
        let cfg = AppConfig {
            delimiter: "§".into(),
            ..AppConfig::default()
        };
        assert!(cfg.delimiter_byte().is_err());
    }

    #[test]
    fn test_input_encoding_labels() {
        let mut cfg = AppConfig::default();
        cfg.encoding = "utf-8".into();
        assert_eq!(cfg.input_encoding().unwrap(), encoding_rs::UTF_8);
        cfg.encoding = " cp1251 ".into();
        assert_eq!(cfg.input_encoding().unwrap(), encoding_rs::WINDOWS_1251);
        cfg.encoding = "klingon".into();
        assert!(cfg.input_encoding().is_err());

        let args = RunArgs {
            encoding: Some("UTF-8".into()),
            ..RunArgs::default()
        };
        cfg.apply_overrides(&args);
        assert_eq!(cfg.input_encoding().unwrap(), encoding_rs::UTF_8);
    }

    #[test]
    fn test_username_without_password() {
        let mut cfg = AppConfig::default();
        cfg.auth.username = Some("user".into());
        let err = cfg.credentials().unwrap_err();
        assert!(err.to_string().contains("auth.password"));
    }

    #[test]
    fn test_rally_config_carries_settings() {
        let mut cfg = AppConfig::default();
        cfg.auth.api_key = Some("_key".into());
        cfg.base_url = " https://rally.example.com/slm ".into();
        cfg.integration.vendor = Some("Acme".into());
        let rally = cfg.rally_config().unwrap();
        assert_eq!(rally.base_url, "https://rally.example.com/slm");
        assert_eq!(rally.integration.vendor.as_deref(), Some("Acme"));
    }
}
