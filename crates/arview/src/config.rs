//! Application configuration.
//!
//! ```toml
//! [viewer]
//! frame_budget_us = 11111
//! optional_features = ["light-estimation"]
//!
//! [viewer.indicator]
//! color = 0x3399ff
//!
//! [[products]]
//! id = "1"
//! name = "Modern Chair"
//! price = 199.99
//! model_url = "/models/sofa.glb"
//! ```
//!
//! Every field is optional. Without a `[[products]]` array the stock catalog
//! is used.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use arview_core::ViewerConfig;

use crate::catalog::{Catalog, CatalogError, Product};

/// Config failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid config TOML.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The product list is unusable.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Result type for config loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Everything read at startup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Viewer tunables.
    pub viewer: ViewerConfig,
    /// Catalog override; empty means the stock products.
    pub products: Vec<Product>,
}

impl AppConfig {
    /// Parses a config document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML or unknown feature names.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file exists but cannot be read,
    /// [`ConfigError::Parse`] if it is malformed.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config = Self::from_toml_str(&text)?;
                tracing::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// The catalog this config describes.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Catalog`] for duplicate or unusable products.
    pub fn catalog(&self) -> ConfigResult<Catalog> {
        if self.products.is_empty() {
            return Ok(Catalog::seeded());
        }
        Ok(Catalog::new(self.products.iter().cloned())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arview_core::XrFeature;

    #[test]
    fn test_empty_document_is_default() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.catalog().unwrap().len(), 2);
    }

    #[test]
    fn test_viewer_overrides_keep_other_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [viewer]
            frame_budget_us = 11111
            optional_features = ["light-estimation"]

            [viewer.indicator]
            color = 0x3399ff
            "#,
        )
        .unwrap();

        assert_eq!(config.viewer.frame_budget_us, 11_111);
        assert_eq!(config.viewer.optional_features, vec![XrFeature::LightEstimation]);
        assert_eq!(config.viewer.required_features, vec![XrFeature::HitTest, XrFeature::DomOverlay]);
        assert_eq!(config.viewer.indicator.color, 0x0033_99ff);
        assert_eq!(config.viewer.indicator.segments, 32);
    }

    #[test]
    fn test_products_replace_catalog() {
        let config = AppConfig::from_toml_str(
            r#"
            [[products]]
            id = "7"
            name = "Floor Lamp"
            price = 89.5
            model_url = "/models/lamp.glb"
            "#,
        )
        .unwrap();

        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        let lamp = catalog.get("7").unwrap();
        assert_eq!(lamp.price_label(), "$89.50");
        assert!(lamp.description.is_empty());
    }

    #[test]
    fn test_empty_required_list_still_negotiates_viewer_features() {
        let config = AppConfig::from_toml_str("[viewer]\nrequired_features = []\n").unwrap();
        assert!(config.viewer.required_features.is_empty());
        assert_eq!(
            config.viewer.session_init().required_features,
            vec![XrFeature::HitTest, XrFeature::DomOverlay]
        );
    }

    #[test]
    fn test_unknown_feature_is_parse_error() {
        let result = AppConfig::from_toml_str("[viewer]\nrequired_features = [\"teleport\"]\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = AppConfig::load(Path::new("/nonexistent/arview.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
