use crate::models::{Listing, SearchFilters};
use async_trait::async_trait;

/// Retrieval boundary. The pipeline treats listing retrieval as an opaque
/// function of the extracted filters and never parses retrieval internals.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn search(&self, filters: &SearchFilters) -> anyhow::Result<Vec<Listing>>;
}

/// Adapter for callers that already hold the listings (the HTTP surface
/// receives them in the request body; scraping happens upstream).
pub struct ProvidedListings(pub Vec<Listing>);

#[async_trait]
impl ListingSource for ProvidedListings {
    async fn search(&self, _filters: &SearchFilters) -> anyhow::Result<Vec<Listing>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provided_listings_ignore_filters() {
        let listing = Listing {
            title: "Honda Civic 1.4i S".to_string(),
            price: 3500,
            year: 2001,
            km: 107_000,
            fuel: "Gasolina".to_string(),
            image_url: None,
            link: None,
            ai_description: None,
        };
        let source = ProvidedListings(vec![listing.clone()]);

        let filters = SearchFilters {
            brand: Some("BMW".to_string()),
            ..Default::default()
        };
        let results = source.search(&filters).await.unwrap();
        assert_eq!(results, vec![listing]);
    }
}
