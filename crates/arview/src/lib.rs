//! # ARVIEW
//!
//! Product viewer application: a small catalog, a TOML config file and the
//! glue that opens the AR view for a product.
//!
//! The AR pipeline itself lives in `arview_core`.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod product_page;

use thiserror::Error;

pub use catalog::{Catalog, CatalogError, Product};
pub use config::{AppConfig, ConfigError};
pub use product_page::{ProductCard, ProductPage};

/// Top-level application failure.
#[derive(Error, Debug)]
pub enum AppError {
    /// Config could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Product lookup failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The AR view failed.
    #[error("{}", .0.user_message())]
    Viewer(#[from] arview_core::ViewerError),
}
