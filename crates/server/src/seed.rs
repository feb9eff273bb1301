use std::{fs, path::Path};

use anyhow::{Context, Result};
use server_api::{seed_catalog, ApiContext};
use shared::domain::Category;
use tracing::info;

/// Loads seed categories from a JSON file and inserts them when the
/// catalog is empty. A missing file is fine; a fresh checkout runs with an
/// empty catalog.
pub async fn seed_from_file(api: &ApiContext, path: &str) -> Result<()> {
    if !Path::new(path).exists() {
        info!(%path, "no seed file, starting with the catalog as stored");
        return Ok(());
    }

    let raw = fs::read_to_string(path).with_context(|| format!("failed to read seed file '{path}'"))?;
    let categories: Vec<Category> =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse seed file '{path}'"))?;

    let seeded = seed_catalog(api, &categories)
        .await
        .context("seeding failed")?;
    if !seeded {
        info!("catalog already populated, seed skipped");
    }
    Ok(())
}
