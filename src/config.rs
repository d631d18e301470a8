use crate::guard::Route;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_PROMPT: &str = "vaportal";

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// Backend connection settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct UiConfig {
    /// Route shown after login and for `/`
    #[serde(default)]
    pub landing_route: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EventsConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.vaportal/config.local.toml) > project (.vaportal/config.toml) > user (~/.vaportal/config.toml)
    pub fn load() -> Result<Self> {
        Self::load_layers(dirs::home_dir().as_deref(), Path::new("."))
    }

    /// Layered load with explicit roots
    pub fn load_layers(home: Option<&Path>, project: &Path) -> Result<Self> {
        let mut config = Self::default();

        let mut layers = Vec::new();
        if let Some(home) = home {
            layers.push(home.join(".vaportal").join("config.toml"));
        }
        layers.push(project.join(".vaportal").join("config.toml"));
        layers.push(project.join(".vaportal").join("config.local.toml"));

        for path in layers {
            if path.exists() {
                let layer = Self::load_from(&path)?;
                config.merge(layer);
            }
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority for every key it sets)
    pub fn merge(&mut self, other: Config) {
        if other.server.base_url.is_some() {
            self.server.base_url = other.server.base_url;
        }
        if other.server.timeout_ms.is_some() {
            self.server.timeout_ms = other.server.timeout_ms;
        }
        if other.ui.landing_route.is_some() {
            self.ui.landing_route = other.ui.landing_route;
        }
        if other.ui.prompt.is_some() {
            self.ui.prompt = other.ui.prompt;
        }
        if other.events.enabled.is_some() {
            self.events.enabled = other.events.enabled;
        }
        if other.events.dir.is_some() {
            self.events.dir = other.events.dir;
        }
    }

    pub fn base_url(&self) -> &str {
        self.server.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.server.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    /// Falls back to the dashboard when unset or invalid
    pub fn landing_route(&self) -> Route {
        self.ui
            .landing_route
            .as_deref()
            .and_then(Route::from_path)
            .filter(|r| !r.admin_only())
            .unwrap_or(Route::Dashboard)
    }

    pub fn prompt(&self) -> &str {
        self.ui.prompt.as_deref().unwrap_or(DEFAULT_PROMPT)
    }

    pub fn events_enabled(&self) -> bool {
        self.events.enabled.unwrap_or(true)
    }

    pub fn events_dir(&self) -> PathBuf {
        self.events
            .dir
            .clone()
            .unwrap_or_else(|| Path::new(".vaportal").join("events"))
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let base_url = self.base_url();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(ValidationError {
                field: "server.base_url".to_string(),
                message: format!("Must start with http:// or https://, got '{}'", base_url),
            });
        }

        if self.server.timeout_ms == Some(0) {
            errors.push(ValidationError {
                field: "server.timeout_ms".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        // Every role lands here after login, so it must exist and not be admin-only
        if let Some(landing) = &self.ui.landing_route {
            match Route::from_path(landing) {
                None => errors.push(ValidationError {
                    field: "ui.landing_route".to_string(),
                    message: format!("Unknown route '{}'", landing),
                }),
                Some(route) if route.admin_only() => errors.push(ValidationError {
                    field: "ui.landing_route".to_string(),
                    message: format!("'{}' is admin-only", landing),
                }),
                Some(_) => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_layer(root: &Path, name: &str, content: &str) {
        let dir = root.join(".vaportal");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.landing_route(), Route::Dashboard);
        assert_eq!(config.prompt(), "vaportal");
        assert!(config.events_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layer_priority() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        write_layer(
            home.path(),
            "config.toml",
            "[server]\nbase_url = \"https://portal.example.com\"\ntimeout_ms = 5000\n",
        );
        write_layer(
            project.path(),
            "config.toml",
            "[server]\nbase_url = \"https://staging.example.com\"\n[ui]\nlanding_route = \"/announcements\"\n",
        );
        write_layer(
            project.path(),
            "config.local.toml",
            "[events]\nenabled = false\n",
        );

        let config = Config::load_layers(Some(home.path()), project.path()).unwrap();
        assert_eq!(config.base_url(), "https://staging.example.com");
        assert_eq!(config.timeout(), Duration::from_millis(5000));
        assert_eq!(config.landing_route(), Route::Announcements);
        assert!(!config.events_enabled());
    }

    #[test]
    fn test_missing_layers_are_fine() {
        let project = tempfile::tempdir().unwrap();
        let config = Config::load_layers(None, project.path()).unwrap();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let project = tempfile::tempdir().unwrap();
        write_layer(project.path(), "config.toml", "[server\nbase_url = 1");
        assert!(Config::load_layers(None, project.path()).is_err());
    }

    #[test]
    fn test_validate_bad_base_url() {
        let mut config = Config::default();
        config.server.base_url = Some("localhost:5000".to_string());
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].field.contains("base_url"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.server.timeout_ms = Some(0);
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("greater than 0"));
    }

    #[test]
    fn test_validate_landing_route() {
        let mut config = Config::default();
        config.ui.landing_route = Some("/users".to_string());
        let errors = config.validate().unwrap_err();
        assert!(errors[0].message.contains("admin-only"));
        assert_eq!(config.landing_route(), Route::Dashboard);

        config.ui.landing_route = Some("/reports".to_string());
        let errors = config.validate().unwrap_err();
        assert!(errors[0].message.contains("Unknown route"));
    }
}
