//! Renderer Configuration
//!
//! Lists the features attached to a renderer and their settings. Features
//! are built in file order, which is also their enqueue order for passes
//! sharing a stage.
//!
//! # Example Config File
//!
//! ```json
//! {
//!   "features": [
//!     { "name": "Blur", "kind": "blur",
//!       "settings": { "horizontal_blur": 0.2, "vertical_blur": 0.1, "shader": "Hidden/Blur" } },
//!     { "name": "Outlines", "kind": "outline", "enabled": false }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use postfx_render::RendererFeature;

use crate::blur::{BlurFeature, BlurSettings};
use crate::desaturation::{DesaturationFeature, DesaturationSettings};
use crate::outline::{OutlineFeature, OutlineSettings};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate feature name: {0}")]
    DuplicateFeature(String),

    #[error("Invalid settings for '{name}': {source}")]
    InvalidSettings {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Which effect a feature entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Blur,
    Desaturation,
    Outline,
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blur => write!(f, "blur"),
            Self::Desaturation => write!(f, "desaturation"),
            Self::Outline => write!(f, "outline"),
        }
    }
}

impl std::str::FromStr for FeatureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blur" => Ok(Self::Blur),
            "desaturation" | "desaturate" => Ok(Self::Desaturation),
            "outline" | "outlines" => Ok(Self::Outline),
            _ => Err(format!("Unknown feature kind: {}", s)),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// One feature entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub kind: FeatureKind,
    /// Kind-specific settings; missing fields take their defaults
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl FeatureConfig {
    pub fn new(name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            kind,
            settings: serde_json::Value::Null,
        }
    }

    fn parse_settings<T>(&self) -> ConfigResult<T>
    where
        T: Default + for<'de> Deserialize<'de>,
    {
        if self.settings.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.settings.clone()).map_err(|source| ConfigError::InvalidSettings {
            name: self.name.clone(),
            source,
        })
    }

    /// Construct the feature this entry describes. The feature is not yet
    /// created against a backend.
    pub fn build(&self) -> ConfigResult<Box<dyn RendererFeature>> {
        let mut feature: Box<dyn RendererFeature> = match self.kind {
            FeatureKind::Blur => Box::new(BlurFeature::new(&self.name, self.parse_settings::<BlurSettings>()?)),
            FeatureKind::Desaturation => Box::new(DesaturationFeature::new(
                &self.name,
                self.parse_settings::<DesaturationSettings>()?,
            )),
            FeatureKind::Outline => {
                Box::new(OutlineFeature::new(&self.name, self.parse_settings::<OutlineSettings>()?))
            }
        };
        feature.set_enabled(self.enabled);
        Ok(feature)
    }
}

/// Features attached to one renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    #[serde(default)]
    pub features: Vec<FeatureConfig>,
}

impl RendererConfig {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        log::info!("Loaded renderer config from {} ({} features)", path.display(), config.features.len());
        Ok(config)
    }

    pub fn to_json_string(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Feature names must be unique
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for feature in &self.features {
            if !seen.insert(feature.name.as_str()) {
                return Err(ConfigError::DuplicateFeature(feature.name.clone()));
            }
        }
        Ok(())
    }

    /// Build every feature in file order
    pub fn build_features(&self) -> ConfigResult<Vec<Box<dyn RendererFeature>>> {
        self.validate()?;
        self.features.iter().map(FeatureConfig::build).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "features": [
            { "name": "Blur", "kind": "blur",
              "settings": { "horizontal_blur": 0.2, "vertical_blur": 0.1, "shader": "Hidden/Blur" } },
            { "name": "Desaturation", "kind": "desaturation",
              "settings": { "saturation": 0.5, "layer_mask": 1, "render_layer_mask": 3 } },
            { "name": "Outlines", "kind": "outline", "enabled": false }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = RendererConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.features.len(), 3);
        assert_eq!(config.features[0].kind, FeatureKind::Blur);
        assert!(config.features[0].enabled);
        assert!(!config.features[2].enabled);
        assert!(config.features[2].settings.is_null());
    }

    #[test]
    fn test_build_features_in_order() {
        let features = RendererConfig::from_json_str(SAMPLE).unwrap().build_features().unwrap();
        let names: Vec<&str> = features.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["Blur", "Desaturation", "Outlines"]);
        assert!(features[0].is_enabled());
        assert!(!features[2].is_enabled());
        assert!(features.iter().all(|f| !f.is_active()));
    }

    #[test]
    fn test_settings_reach_feature() {
        let features = RendererConfig::from_json_str(SAMPLE).unwrap().build_features().unwrap();
        let config = features[1].get_config().unwrap();
        assert_eq!(config.config["saturation"], 0.5);
        assert_eq!(config.config["render_layer_mask"], 3);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let json = r#"{ "features": [
            { "name": "A", "kind": "blur" },
            { "name": "A", "kind": "outline" }
        ] }"#;
        assert!(matches!(
            RendererConfig::from_json_str(json),
            Err(ConfigError::DuplicateFeature(name)) if name == "A"
        ));
    }

    #[test]
    fn test_bad_settings_name_the_feature() {
        let json = r#"{ "features": [
            { "name": "Blur", "kind": "blur", "settings": { "horizontal_blur": "wide" } }
        ] }"#;
        let err = RendererConfig::from_json_str(json).unwrap().build_features().err().unwrap();
        assert!(matches!(&err, ConfigError::InvalidSettings { name, .. } if name == "Blur"));
        assert!(err.to_string().contains("Blur"));
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let json = r#"{ "features": [ { "name": "Bloom", "kind": "bloom" } ] }"#;
        assert!(matches!(RendererConfig::from_json_str(json), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let config = RendererConfig::from_json_str(SAMPLE).unwrap();
        let restored = RendererConfig::from_json_str(&config.to_json_string().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Outlines".parse::<FeatureKind>(), Ok(FeatureKind::Outline));
        assert!("bloom".parse::<FeatureKind>().is_err());
        assert_eq!(FeatureKind::Desaturation.to_string(), "desaturation");
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            RendererConfig::load("/nonexistent/renderer.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
