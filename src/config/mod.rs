use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Chatdex";
const APP_NAME: &str = "chatdex";

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
    pub data_dir: PathBuf,
    pub library_path: PathBuf,
    pub log_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("CHATDEX_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("CHATDEX_DATA").ok().map(PathBuf::from);

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

        let data_dir = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let library_path = data_dir.join("conversations.json");
        let log_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_dir.join("state"))
            .join("logs");

        Ok(Self {
            config_dir,
            config_file,
            data_dir,
            library_path,
            log_dir,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.log_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchOptions,
    pub library: LibraryOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search: SearchOptions::default(),
            library: LibraryOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) {
        self.library.resolve(paths);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Settle time before a changed query is applied to the visible set.
    pub debounce_ms: u64,
    pub max_results: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            max_results: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryOptions {
    /// JSON file the CLI reads the conversation collection from. Empty
    /// until resolved against the discovered data directory.
    #[serde(skip)]
    pub conversations_file: PathBuf,
}

impl Default for LibraryOptions {
    fn default() -> Self {
        Self {
            conversations_file: PathBuf::new(),
        }
    }
}

impl LibraryOptions {
    fn resolve(&mut self, paths: &ConfigPaths) {
        if self.conversations_file.as_os_str().is_empty() {
            self.conversations_file = paths.library_path.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        let data_dir = base.join("data");
        ConfigPaths {
            config_dir: config_dir.clone(),
            config_file: config_dir.join("config.toml"),
            data_dir: data_dir.clone(),
            library_path: data_dir.join("conversations.json"),
            log_dir: base.join("logs"),
        }
    }

    #[test]
    fn load_or_init_writes_defaults_and_resolves_library_path() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        let loader = ConfigLoader {
            paths: paths.clone(),
        };

        let config = loader.load_or_init()?;
        assert!(paths.config_file.exists());
        assert_eq!(config.search.debounce_ms, 300);
        assert_eq!(config.search.max_results, 200);
        assert_eq!(config.library.conversations_file, paths.library_path);
        Ok(())
    }

    #[test]
    fn load_reads_overrides_from_toml() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        fs::create_dir_all(&paths.config_dir)?;
        fs::write(
            &paths.config_file,
            "[search]\ndebounce_ms = 50\nmax_results = 10\n",
        )?;

        let loader = ConfigLoader {
            paths: paths.clone(),
        };
        let config = loader.load()?;
        assert_eq!(config.search.debounce_ms, 50);
        assert_eq!(config.search.max_results, 10);
        Ok(())
    }

    #[test]
    fn unknown_or_missing_sections_fall_back_to_defaults() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        fs::create_dir_all(&paths.config_dir)?;
        fs::write(&paths.config_file, "")?;

        let loader = ConfigLoader { paths };
        let config = loader.load()?;
        assert_eq!(config.search.debounce_ms, 300);
        Ok(())
    }
}
