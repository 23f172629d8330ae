//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const PROJECT_FILES: [&str; 2] = ["ensemble.toml", ".ensemble.toml"];
const ENV_PREFIX: &str = "ENSEMBLE_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `ENSEMBLE_`-prefixed environment variables (`__` separates keys)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./ensemble.toml` or `./.ensemble.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/llm-ensemble/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(
            Self::global_config_path().as_deref(),
            Self::project_config_path().as_deref(),
            config_path,
        )
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(Box::new)
    }

    /// File layers only, lowest priority first
    fn figment(global: Option<&Path>, project: Option<&Path>, explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        for path in [global, project].into_iter().flatten() {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // An explicit path must exist; a missing file is an error
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file_exact(path));
        }

        figment
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// `$XDG_CONFIG_HOME/llm-ensemble/config.toml`, or the platform equivalent
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("llm-ensemble").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(config_path: Option<&Path>) {
        println!("Configuration sources (in priority order):");

        let overrides: Vec<String> = std::env::vars()
            .map(|(key, _)| key)
            .filter(|key| key.starts_with(ENV_PREFIX))
            .collect();
        if overrides.is_empty() {
            println!("  [     ] Env:     {}<SECTION>__<KEY>", ENV_PREFIX);
        } else {
            println!("  [FOUND] Env:     {}", overrides.join(", "));
        }

        if let Some(path) = config_path {
            let mark = if path.exists() { "FOUND" } else { "MISSING" };
            println!("  [{:<5}] Explicit: {}", mark, path.display());
        }

        if let Some(path) = Self::project_config_path() {
            println!("  [FOUND] Project: {}", path.display());
        } else {
            println!("  [     ] Project: ./ensemble.toml or ./.ensemble.toml");
        }

        if let Some(path) = Self::global_config_path() {
            if path.exists() {
                println!("  [FOUND] Global:  {}", path.display());
            } else {
                println!("  [     ] Global:  {}", path.display());
            }
        }

        println!("  [     ] Default: built-in defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn extract(figment: Figment) -> FileConfig {
        figment.extract().unwrap()
    }

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.server.port, 8000);
        assert!(config.models.ensemble.is_none());
        assert!(config.time_travel.enabled);
    }

    #[test]
    fn test_global_config_path_names_the_app() {
        let path = ConfigLoader::global_config_path().unwrap();
        assert!(path.to_string_lossy().contains("llm-ensemble"));
    }

    #[test]
    fn test_later_layers_override_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let global = write(
            dir.path(),
            "global.toml",
            "[server]\nport = 7000\nhost = \"127.0.0.1\"\n[gateway]\nmax_concurrent_calls = 2\n",
        );
        let project = write(dir.path(), "ensemble.toml", "[server]\nport = 7100\n");
        let explicit = write(dir.path(), "custom.toml", "[gateway]\nmax_concurrent_calls = 9\n");

        let config = extract(ConfigLoader::figment(
            Some(&global),
            Some(&project),
            Some(&explicit),
        ));
        assert_eq!(config.server.port, 7100);
        // Untouched keys survive from lower layers
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.gateway.max_concurrent_calls, 9);
        assert_eq!(config.gateway.call_timeout_seconds, 30);
    }

    #[test]
    fn test_missing_optional_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.toml");
        let config = extract(ConfigLoader::figment(Some(&absent), Some(&absent), None));
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.toml");
        let result: Result<FileConfig, _> =
            ConfigLoader::figment(None, None, Some(&absent)).extract();
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_value_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "bad.toml", "[server]\nport = \"eighty\"\n");
        let result: Result<FileConfig, _> = ConfigLoader::figment(None, None, Some(&bad)).extract();
        assert!(result.is_err());
    }
}
