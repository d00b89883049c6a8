//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const PROJECT_FILES: [&str; 2] = ["council.toml", ".council.toml"];

/// Environment variables with this prefix override file values;
/// `__` separates nested keys (`COUNCIL_RUN__MAX_HISTORY=10`).
pub const ENV_PREFIX: &str = "COUNCIL_";

/// The files that take part in one load, lowest priority first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSources {
    pub global: Option<PathBuf>,
    pub project: Option<PathBuf>,
    pub explicit: Option<PathBuf>,
}

impl ConfigSources {
    /// Find the global and project files that exist right now
    pub fn discover(explicit: Option<&Path>) -> Self {
        Self {
            global: ConfigLoader::global_config_path().filter(|p| p.exists()),
            project: ConfigLoader::project_config_path(Path::new(".")),
            explicit: explicit.map(Path::to_path_buf),
        }
    }

    /// Defaults merged with every file, without the environment layer
    pub fn figment(&self) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));
        for path in [&self.global, &self.project, &self.explicit].into_iter().flatten() {
            figment = figment.merge(Toml::file(path));
        }
        figment
    }

    /// One line per source, for `council validate`
    pub fn describe(&self) -> Vec<String> {
        let line = |label: &str, path: &Option<PathBuf>, missing: String| match path {
            Some(path) => format!("  [FOUND] {:<8} {}", label, path.display()),
            None => format!("  [     ] {:<8} {}", label, missing),
        };

        let global_hint = ConfigLoader::global_config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(no config directory)".to_string());
        vec![
            line("Explicit", &self.explicit, "--config <path>".to_string()),
            line("Project", &self.project, PROJECT_FILES.join(" or ")),
            line("Global", &self.global, global_hint),
            format!("  [     ] {:<8} {}*", "Env", ENV_PREFIX),
            "  [     ] Default  built-in defaults".to_string(),
        ]
    }
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `COUNCIL_*` environment variables
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./council.toml` or `./.council.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/council/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        if let Some(path) = config_path
            && !path.exists()
        {
            return Err(Box::new(figment::Error::from(format!(
                "config file not found: {}",
                path.display()
            ))));
        }
        let sources = ConfigSources::discover(config_path);
        sources
            .figment()
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("council").join("config.toml"))
    }

    /// The first project file found in `dir`
    pub fn project_config_path(dir: &Path) -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }
}
