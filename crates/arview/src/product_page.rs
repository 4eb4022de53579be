//! Product page: the card shown before AR, and the hand-off to the viewer.

use arview_core::{ArViewer, ModelResolver, Renderer, ViewerHandle, ViewerResult, XrSystem};

use crate::catalog::{Catalog, CatalogResult, Product};

/// Display data of the product card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductCard {
    /// Product name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Formatted price.
    pub price: String,
    /// Product photo.
    pub image: String,
}

/// One product route.
#[derive(Clone, Copy, Debug)]
pub struct ProductPage<'a> {
    product: &'a Product,
}

impl<'a> ProductPage<'a> {
    /// Resolves the route `id`.
    ///
    /// # Errors
    ///
    /// [`crate::catalog::CatalogError::NotFound`] for unknown products.
    pub fn open(catalog: &'a Catalog, id: &str) -> CatalogResult<Self> {
        Ok(Self {
            product: catalog.get(id)?,
        })
    }

    /// The product behind the page.
    #[must_use]
    pub const fn product(&self) -> &'a Product {
        self.product
    }

    /// Card contents.
    #[must_use]
    pub fn card(&self) -> ProductCard {
        ProductCard {
            name: self.product.name.clone(),
            description: self.product.description.clone(),
            price: self.product.price_label(),
            image: self.product.image.clone(),
        }
    }

    /// "View in AR": launches `viewer` on this product's model.
    ///
    /// # Errors
    ///
    /// Whatever terminal error the viewer reports.
    pub async fn view_in_ar<P, M, R, F>(&self, viewer: ArViewer<P, M>, make_renderer: F) -> ViewerResult<ViewerHandle<P::Session>>
    where
        P: XrSystem,
        M: ModelResolver,
        R: Renderer,
        F: FnOnce() -> R,
    {
        tracing::info!("Opening AR view for product {} ({})", self.product.id, self.product.name);
        viewer.launch(&self.product.model_url, make_renderer).await
    }
}
