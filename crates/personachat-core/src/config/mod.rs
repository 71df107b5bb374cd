mod model_settings;

pub use model_settings::ModelSettings;

use std::path::{Path, PathBuf};

use crate::error::{PersonaError, Result};

pub const CONFIG_DIR_ENV: &str = "ASSISTANT_CONFIG";
pub const MODEL_SETTINGS_DIR_ENV: &str = "MODEL_SETTINGS_DIR";
pub const PROMPT_FILE_ENV: &str = "ASSISTANT_PROMPT";

const DEFAULT_CONFIG_DIR: &str = ".assistant_config";
const DEFAULT_MODEL_SETTINGS_DIR: &str = "modelSettings";
const DEFAULT_PROMPT_FILE: &str = "prompt.txt";
const HISTORY_FILE_NAME: &str = "conversation_history.json";

/// Resolved filesystem locations. Pure path computation; nothing is touched
/// on disk until a caller asks for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    config_dir: PathBuf,
    model_settings_dir: PathBuf,
    prompt_file: PathBuf,
}

impl ConfigStore {
    /// Resolve paths from the environment, falling back to the working-directory defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve paths through an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let resolve = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(|v| expand_home(&v))
                .unwrap_or_else(|| PathBuf::from(default))
        };

        Self {
            config_dir: resolve(CONFIG_DIR_ENV, DEFAULT_CONFIG_DIR),
            model_settings_dir: resolve(MODEL_SETTINGS_DIR_ENV, DEFAULT_MODEL_SETTINGS_DIR),
            prompt_file: resolve(PROMPT_FILE_ENV, DEFAULT_PROMPT_FILE),
        }
    }

    pub fn with_paths(
        config_dir: impl Into<PathBuf>,
        model_settings_dir: impl Into<PathBuf>,
        prompt_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config_dir: config_dir.into(),
            model_settings_dir: model_settings_dir.into(),
            prompt_file: prompt_file.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn history_file(&self) -> PathBuf {
        self.config_dir.join(HISTORY_FILE_NAME)
    }

    pub fn model_settings_dir(&self) -> &Path {
        &self.model_settings_dir
    }

    pub fn prompt_file(&self) -> &Path {
        &self.prompt_file
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir).map_err(|e| {
            PersonaError::Config(format!(
                "Failed to create config directory {}: {}",
                self.config_dir.display(),
                e
            ))
        })
    }

    /// Startup self-check: the model settings directory must exist and hold at least one entry.
    pub fn check_readiness(&self) -> Result<()> {
        if !self.model_settings_dir.is_dir() {
            return Err(PersonaError::NotFound(self.model_settings_dir.clone()));
        }
        let mut entries = std::fs::read_dir(&self.model_settings_dir)?;
        if entries.next().is_none() {
            return Err(PersonaError::Config(format!(
                "Model settings directory is empty: {}",
                self.model_settings_dir.display()
            )));
        }
        Ok(())
    }

    /// Read the system persona text. Missing file yields `NotFound`.
    pub fn read_system_prompt(&self) -> Result<String> {
        match std::fs::read_to_string(&self.prompt_file) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PersonaError::NotFound(self.prompt_file.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::from_env()
    }
}

fn expand_home(value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let store = ConfigStore::from_lookup(lookup(&[]));
        assert_eq!(store.config_dir(), Path::new(".assistant_config"));
        assert_eq!(
            store.history_file(),
            Path::new(".assistant_config").join("conversation_history.json")
        );
        assert_eq!(store.model_settings_dir(), Path::new("modelSettings"));
        assert_eq!(store.prompt_file(), Path::new("prompt.txt"));
    }

    #[test]
    fn test_env_overrides() {
        let store = ConfigStore::from_lookup(lookup(&[
            (CONFIG_DIR_ENV, "/tmp/cfg"),
            (MODEL_SETTINGS_DIR_ENV, "/tmp/models"),
            (PROMPT_FILE_ENV, "   "),
        ]));
        assert_eq!(store.config_dir(), Path::new("/tmp/cfg"));
        assert_eq!(store.model_settings_dir(), Path::new("/tmp/models"));
        // Blank values fall back to the default
        assert_eq!(store.prompt_file(), Path::new("prompt.txt"));
    }

    #[test]
    fn test_home_expansion() {
        let store = ConfigStore::from_lookup(lookup(&[(CONFIG_DIR_ENV, "~/chat")]));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(store.config_dir(), home.join("chat"));
        }
    }

    #[test]
    fn test_check_readiness() {
        let temp = TempDir::new().unwrap();
        let models = temp.path().join("models");
        let store = ConfigStore::with_paths(temp.path(), &models, temp.path().join("p.txt"));

        assert!(matches!(
            store.check_readiness(),
            Err(PersonaError::NotFound(_))
        ));

        std::fs::create_dir(&models).unwrap();
        assert!(matches!(store.check_readiness(), Err(PersonaError::Config(_))));

        std::fs::write(models.join("a.json"), "{}").unwrap();
        assert!(store.check_readiness().is_ok());
    }

    #[test]
    fn test_read_system_prompt_missing() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::with_paths(temp.path(), temp.path(), temp.path().join("none.txt"));
        assert!(matches!(
            store.read_system_prompt(),
            Err(PersonaError::NotFound(_))
        ));
    }
}
