use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::app::PlayState;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "NoteKiosk";
const APP_NAME: &str = "notekiosk";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths);
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths);
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub notes_dir: PathBuf,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("NOTEKIOSK_CONFIG").ok().map(PathBuf::from);
        let override_notes = env::var("NOTEKIOSK_NOTES").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let notes_dir =
            override_notes.unwrap_or_else(|| project_dirs.data_dir().join("notes"));

        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dirs.data_dir().join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            notes_dir,
            state_dir,
            log_dir,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.notes_dir,
            &self.state_dir,
            &self.log_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the note tree. Empty means "use the platform data directory".
    pub notes_path: PathBuf,
    /// Most recently modified note first within each category.
    pub new_first: bool,
    /// Whether the kiosk starts auto-advancing.
    pub play_state: PlayState,
    /// Category to open at startup. Empty means stay on the menu.
    pub category: String,
    /// Seconds between automatic note advances.
    pub paginate_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            notes_path: PathBuf::new(),
            new_first: true,
            play_state: PlayState::Play,
            category: String::new(),
            paginate_interval_secs: 15,
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) {
        if self.notes_path.as_os_str().is_empty() {
            self.notes_path = paths.notes_dir.clone();
        }
        if self.paginate_interval_secs == 0 {
            tracing::warn!("paginate_interval_secs of 0 is invalid, using default");
            self.paginate_interval_secs = Self::default().paginate_interval_secs;
        }
    }

    pub fn paginate_interval(&self) -> Duration {
        Duration::from_secs(self.paginate_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert!(cfg.new_first);
        assert_eq!(cfg.play_state, PlayState::Play);
        assert!(cfg.category.is_empty());
        assert_eq!(cfg.paginate_interval(), Duration::from_secs(15));
    }

    #[test]
    fn play_state_parses_lowercase() {
        let cfg: AppConfig = toml::from_str("play_state = \"pause\"").unwrap();
        assert_eq!(cfg.play_state, PlayState::Pause);
    }
}
