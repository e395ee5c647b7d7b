#![allow(dead_code)]

pub mod mocks;

use mocks::{MapSource, MockEmbedder};
use partition_rag::partition::{
    CatalogBuilder, IndexBuilder, IndexConfig, PartitionCatalog, PartitionKey, PartitionStore,
};
use partition_rag::types::Document;
use std::path::Path;
use std::sync::Arc;

pub const COLLECTION: &str = "collection";

pub fn keys(keys: &[&str]) -> Vec<PartitionKey> {
    keys.iter().map(|k| PartitionKey::from(*k)).collect()
}

/// Two short filings per year, phrased so each year retrieves differently.
pub fn annual_reports(years: &[&str]) -> MapSource {
    let mut source = MapSource::default();
    for year in years {
        source.insert(
            year,
            vec![
                Document::new(
                    format!("UBER_{}.html", year),
                    format!("In fiscal {} revenue grew and gross bookings increased.", year),
                ),
                Document::new(
                    format!("UBER_{}_risk.html", year),
                    format!("Risk factors for {} include regulation and driver classification.", year),
                ),
            ],
        );
    }
    source
}

pub fn index_builder() -> IndexBuilder {
    IndexBuilder::new(Arc::new(MockEmbedder::new()), IndexConfig::default())
        .expect("default index config is valid")
}

pub async fn build_catalog(root: &Path, source: MapSource, keys: &[PartitionKey]) -> PartitionCatalog {
    CatalogBuilder::new(
        PartitionStore::new(root, COLLECTION),
        index_builder(),
        Arc::new(source),
    )
    .build(keys)
    .await
}
