//! # Product Catalog
//!
//! Product id → display data and model location. Seeded with the two default
//! products; the config file may replace the list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalog failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// No product with this id.
    #[error("product not found: {0}")]
    NotFound(String),

    /// Two entries share an id.
    #[error("duplicate product id: {0}")]
    Duplicate(String),

    /// An entry is unusable.
    #[error("product {id}: {reason}")]
    Invalid {
        /// Offending product id.
        id: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// One product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Route id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Price in dollars.
    pub price: f64,
    /// Product photo.
    #[serde(default)]
    pub image: String,
    /// 3D model location handed to the model resolver.
    pub model_url: String,
}

impl Product {
    /// Price as shown on the product card.
    #[must_use]
    pub fn price_label(&self) -> String {
        format!("${:.2}", self.price)
    }

    fn validate(&self) -> CatalogResult<()> {
        let invalid = |reason| CatalogError::Invalid {
            id: self.id.clone(),
            reason,
        };
        if self.id.is_empty() {
            return Err(invalid("empty id"));
        }
        if self.model_url.is_empty() {
            return Err(invalid("no model location"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(invalid("price must be a non-negative number"));
        }
        Ok(())
    }
}

/// Products by id.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    products: BTreeMap<String, Product>,
}

impl Catalog {
    /// Builds a catalog, rejecting duplicates and unusable entries.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Duplicate`] or [`CatalogError::Invalid`].
    pub fn new(products: impl IntoIterator<Item = Product>) -> CatalogResult<Self> {
        let mut by_id = BTreeMap::new();
        for product in products {
            product.validate()?;
            if by_id.contains_key(&product.id) {
                return Err(CatalogError::Duplicate(product.id));
            }
            by_id.insert(product.id.clone(), product);
        }
        Ok(Self { products: by_id })
    }

    /// The two default products.
    #[must_use]
    pub fn seeded() -> Self {
        let products = default_products()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        Self { products }
    }

    /// Looks up a product.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`] for unknown ids.
    pub fn get(&self, id: &str) -> CatalogResult<&Product> {
        self.products.get(id).ok_or_else(|| CatalogError::NotFound(id.to_owned()))
    }

    /// Products in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::seeded()
    }
}

/// The stock product list.
#[must_use]
pub fn default_products() -> Vec<Product> {
    vec![
        Product {
            id: "1".into(),
            name: "Modern Chair".into(),
            description: "Comfortable modern chair for your home".into(),
            price: 199.99,
            image: "/images/chair.jpg".into(),
            model_url: "/models/sofa.glb".into(),
        },
        Product {
            id: "2".into(),
            name: "Coffee Table".into(),
            description: "Elegant coffee table for your living room".into(),
            price: 249.99,
            image: "/images/chair.jpg".into(),
            model_url: "/models/sofa.glb".into(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_catalog() {
        let catalog = Catalog::seeded();
        assert_eq!(catalog.len(), 2);
        let chair = catalog.get("1").unwrap();
        assert_eq!(chair.name, "Modern Chair");
        assert_eq!(chair.price_label(), "$199.99");
        assert_eq!(catalog.get("2").map(Product::price_label), Ok("$249.99".to_owned()));
    }

    #[test]
    fn test_unknown_id() {
        assert_eq!(Catalog::seeded().get("9"), Err(CatalogError::NotFound("9".into())));
    }

    #[test]
    fn test_iter_in_id_order() {
        let catalog = Catalog::seeded();
        let ids: Vec<&str> = catalog.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut products = default_products();
        products.push(products[0].clone());
        assert_eq!(Catalog::new(products), Err(CatalogError::Duplicate("1".into())));
    }

    #[test]
    fn test_missing_model_rejected() {
        let mut product = default_products().remove(0);
        product.model_url.clear();
        assert!(matches!(Catalog::new([product]), Err(CatalogError::Invalid { .. })));
    }

    #[test]
    fn test_price_label_rounds_to_cents() {
        let mut product = default_products().remove(0);
        product.price = 5.0;
        assert_eq!(product.price_label(), "$5.00");
    }
}
