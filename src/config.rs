use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PagePlusError, PagePlusResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub school: SchoolConfig,
    pub remote: RemoteConfig,
    pub appearance: AppearanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Where options are persisted; `~` is expanded.
    pub options_path: String,
    /// Fallback tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchoolConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    /// URL of the remotely disabled module list; unset disables the fetch.
    pub disabled_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppearanceConfig {
    pub accent_color: String,
    /// Fade duration of notification popups.
    pub transition_ms: u64,
}

#[allow(clippy::derivable_impls)]
impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            school: SchoolConfig::default(),
            remote: RemoteConfig::default(),
            appearance: AppearanceConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            options_path: "~/.local/share/pageplus/options.json".to_string(),
            log_filter: "pageplus=info".to_string(),
        }
    }
}

impl Default for SchoolConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gannacademy.myschoolapp.com".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            disabled_url: None,
            timeout_secs: 5,
        }
    }
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            accent_color: "#cba6f7".to_string(),
            transition_ms: 300,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                // Fallback: ~ is not expanded by PathBuf, so use dirs::home_dir
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
            })
            .join("pageplus")
            .join("config.toml")
    }

    /// Load config from the default path, or return defaults if not found
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, falling back to defaults on any problem
    pub fn load_from(path: &Path) -> Self {
        let mut config = if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to parse config");
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read config");
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.validate();
        config
    }

    /// Validate and clamp config values to acceptable ranges
    fn validate(&mut self) {
        self.school.timeout_secs = self.school.timeout_secs.clamp(1, 120);
        self.remote.timeout_secs = self.remote.timeout_secs.clamp(1, 60);
        self.appearance.transition_ms = self.appearance.transition_ms.min(2000);

        let base = self.school.base_url.trim_end_matches('/').to_string();
        self.school.base_url = base;

        if self.general.log_filter.trim().is_empty() {
            self.general.log_filter = GeneralConfig::default().log_filter;
        }
    }

    /// Save config to the default path
    pub fn save(&self) -> PagePlusResult<()> {
        self.save_to(&Self::config_path())
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> PagePlusResult<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PagePlusError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)?;
        Ok(())
    }

    /// Options file path with `~` expanded
    pub fn options_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.general.options_path).as_ref())
    }

    pub fn school_timeout(&self) -> Duration {
        Duration::from_secs(self.school.timeout_secs)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }
}

impl AppearanceConfig {
    /// CSS custom properties set on the document root at startup
    pub fn css_vars(&self) -> Vec<(String, String)> {
        let (r, g, b) = parse_hex_color(&self.accent_color);
        vec![
            ("--pageplus-accent".to_string(), self.accent_color.clone()),
            ("--pageplus-accent-rgb".to_string(), format!("{}, {}, {}", r, g, b)),
            (
                "--pageplus-transition-time".to_string(),
                format!("{}ms", self.transition_ms),
            ),
        ]
    }
}

/// Parse a hex color string like "#cba6f7" to (r, g, b)
pub fn parse_hex_color(hex: &str) -> (u8, u8, u8) {
    let hex = hex.trim_start_matches('#');
    if hex.len() >= 6 && hex.is_ascii() {
        let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(203);
        let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(166);
        let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(247);
        (r, g, b)
    } else {
        (203, 166, 247) // Default to catppuccin mauve
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_missing() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(&temp.path().join("config.toml"));
        assert_eq!(config, Config::default());
        assert!(config.remote.disabled_url.is_none());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[school]
base_url = "https://other.myschoolapp.com/"

[remote]
disabled_url = "https://example.com/disabled.json"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.school.base_url, "https://other.myschoolapp.com");
        assert_eq!(config.school.timeout_secs, 10);
        assert_eq!(
            config.remote.disabled_url.as_deref(),
            Some("https://example.com/disabled.json")
        );
        assert_eq!(config.appearance.transition_ms, 300);
    }

    #[test]
    fn test_broken_config_falls_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[school\nbase_url = ").unwrap();

        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_values_clamped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[school]\ntimeout_secs = 0\n[appearance]\ntransition_ms = 99999\n",
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.school.timeout_secs, 1);
        assert_eq!(config.appearance.transition_ms, 2000);
    }

    #[test]
    fn test_save_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.appearance.accent_color = "#112233".to_string();
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_css_vars() {
        let appearance = AppearanceConfig {
            accent_color: "#ff8000".to_string(),
            transition_ms: 250,
        };
        let vars = appearance.css_vars();
        assert!(vars.contains(&("--pageplus-accent-rgb".to_string(), "255, 128, 0".to_string())));
        assert!(vars.contains(&("--pageplus-transition-time".to_string(), "250ms".to_string())));
    }

    #[test]
    fn test_parse_hex_color_fallback() {
        assert_eq!(parse_hex_color("#000000"), (0, 0, 0));
        assert_eq!(parse_hex_color("zz"), (203, 166, 247));
    }

    #[test]
    fn test_non_ascii_accent_falls_back() {
        assert_eq!(parse_hex_color("#aéfff"), (203, 166, 247));
        assert_eq!(parse_hex_color("#ffé0000"), (203, 166, 247));

        let appearance = AppearanceConfig {
            accent_color: "#aéfff".to_string(),
            transition_ms: 300,
        };
        assert!(appearance
            .css_vars()
            .contains(&("--pageplus-accent-rgb".to_string(), "203, 166, 247".to_string())));
    }

    #[test]
    fn test_options_path() {
        let config = Config::default();
        let path = config.options_path();
        assert!(path.ends_with("pageplus/options.json"));
    }
}
