use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{PersonaError, Result};

const REQUIRED_FIELDS: [&str; 3] = ["model", "api_key", "url"];

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://\S+|localhost(?::\d+)?(?:/\S*)?$)").expect("URL pattern compiles")
});

/// Connection settings for one chat-completion endpoint, as stored in a
/// model settings file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model: String,
    pub api_key: String,
    pub url: String,
}

impl ModelSettings {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            url: url.into(),
        }
    }

    /// Parse and validate settings text. `.toml` files are read as TOML,
    /// everything else as JSON.
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let fields = if is_toml(path) {
            let value: toml::Value =
                toml::from_str(text).map_err(|e| PersonaError::parse(path, e.to_string()))?;
            serde_json::to_value(value).map_err(|e| PersonaError::parse(path, e.to_string()))?
        } else {
            serde_json::from_str::<Value>(text)
                .map_err(|e| PersonaError::parse(path, e.to_string()))?
        };

        let Value::Object(fields) = fields else {
            return Err(PersonaError::parse(path, "expected a top-level object"));
        };

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|name| !fields.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PersonaError::MissingField { fields: missing });
        }

        let settings = Self {
            model: string_field(path, &fields, "model")?,
            api_key: string_field(path, &fields, "api_key")?,
            url: string_field(path, &fields, "url")?,
        };
        settings.validate_url()?;
        Ok(settings)
    }

    pub fn validate_url(&self) -> Result<()> {
        if URL_PATTERN.is_match(&self.url) {
            Ok(())
        } else {
            Err(PersonaError::InvalidUrl(self.url.clone()))
        }
    }

    /// Base URL for API requests. Bare `localhost` values get an `http://` scheme.
    pub fn endpoint(&self) -> String {
        let url = self.url.trim_end_matches('/');
        if url.starts_with("localhost") {
            format!("http://{url}")
        } else {
            url.to_string()
        }
    }

    /// One-line summary with the API key masked.
    pub fn introduce(&self) -> String {
        format!("{} {} {}", self.model, mask_key(&self.api_key), self.url)
    }

    /// File name a new settings file for `model` is stored under.
    pub fn file_name_for(model: &str) -> String {
        let base = model.split(':').next().unwrap_or(model);
        format!("{}_config.json", base.replace(' ', "_").replace('/', "-"))
    }

    /// Write these settings as a new JSON file in `dir`. An existing file is
    /// only replaced when `overwrite` is set.
    pub fn write_new(&self, dir: &Path, overwrite: bool) -> Result<PathBuf> {
        if self.model.trim().is_empty() {
            return Err(PersonaError::MissingField {
                fields: vec!["model".to_string()],
            });
        }
        self.validate_url()?;

        std::fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name_for(&self.model));
        if path.exists() && !overwrite {
            return Err(PersonaError::Config(format!(
                "Settings file already exists: {}",
                path.display()
            )));
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

impl fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSettings")
            .field("model", &self.model)
            .field("api_key", &mask_key(&self.api_key))
            .field("url", &self.url)
            .finish()
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

fn string_field(path: &Path, fields: &Map<String, Value>, name: &str) -> Result<String> {
    match fields.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(PersonaError::parse(
            path,
            format!("field `{name}` must be a string"),
        )),
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    format!("{}***{}", head, chars[chars.len() - 1])
}
