use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::{Category, Item, ItemId, ItemStatus},
    protocol::{NewCategory, NewItem},
};

use crate::{CatalogStore, StatusStore};

/// Versioned key holding the current pairs format.
pub const STATUS_STATE_KEY: &str = "wishlist.statuses.v2";
/// Key used by the first release, holding a plain array of purchased ids.
pub const LEGACY_PURCHASED_KEY: &str = "wishlist.purchased";

/// File-backed status store used when no network store is available. The
/// file holds one JSON object used as a small key-value store; the status
/// mapping lives under [`STATUS_STATE_KEY`] as an array of
/// `[item_id, status]` pairs. A missing or corrupt file reads as empty.
pub struct LocalStatusFile {
    path: PathBuf,
}

impl LocalStatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_doc(&self) -> serde_json::Map<String, Value> {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return serde_json::Map::new();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    fn write_doc(&self, doc: &serde_json::Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create state directory '{}'", parent.display())
            })?;
        }
        let raw = serde_json::to_string_pretty(&Value::Object(doc.clone()))?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write state file '{}'", self.path.display()))
    }

    /// Reads the mapping, upgrading the legacy purchased-ids format in
    /// place on first encounter; the legacy key is removed afterwards.
    fn load(&self) -> Result<HashMap<ItemId, ItemStatus>> {
        let mut doc = self.read_doc();

        if let Some(value) = doc.get(STATUS_STATE_KEY) {
            return Ok(parse_pairs(value));
        }

        if let Some(legacy) = doc.remove(LEGACY_PURCHASED_KEY) {
            let statuses: HashMap<ItemId, ItemStatus> = legacy
                .as_array()
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| id.as_str())
                        .map(|id| (ItemId::from(id), ItemStatus::Purchased))
                        .collect()
                })
                .unwrap_or_default();
            doc.insert(STATUS_STATE_KEY.to_string(), pairs_value(&statuses));
            self.write_doc(&doc)?;
            return Ok(statuses);
        }

        Ok(HashMap::new())
    }

    fn store(&self, statuses: &HashMap<ItemId, ItemStatus>) -> Result<()> {
        let mut doc = self.read_doc();
        doc.remove(LEGACY_PURCHASED_KEY);
        doc.insert(STATUS_STATE_KEY.to_string(), pairs_value(statuses));
        self.write_doc(&doc)
    }
}

fn parse_pairs(value: &Value) -> HashMap<ItemId, ItemStatus> {
    let Some(pairs) = value.as_array() else {
        return HashMap::new();
    };
    pairs
        .iter()
        .filter_map(|pair| {
            let pair = pair.as_array()?;
            if pair.len() != 2 {
                return None;
            }
            let id = pair[0].as_str()?;
            let status = ItemStatus::from_stored(pair[1].as_str()?);
            status.is_set().then(|| (ItemId::from(id), status))
        })
        .collect()
}

fn pairs_value(statuses: &HashMap<ItemId, ItemStatus>) -> Value {
    let mut pairs: Vec<_> = statuses.iter().collect();
    pairs.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    Value::Array(
        pairs
            .into_iter()
            .filter_map(|(id, status)| {
                status.as_stored().map(|stored| {
                    Value::Array(vec![
                        Value::String(id.as_str().to_string()),
                        Value::String(stored.to_string()),
                    ])
                })
            })
            .collect(),
    )
}

#[async_trait]
impl StatusStore for LocalStatusFile {
    async fn list_statuses(&self) -> Result<HashMap<ItemId, ItemStatus>> {
        self.load()
    }

    async fn upsert_status(&self, item_id: &ItemId, status: ItemStatus) -> Result<()> {
        if !status.is_set() {
            bail!("cannot persist an unset status for item '{item_id}'");
        }
        let mut statuses = self.load()?;
        statuses.insert(item_id.clone(), status);
        self.store(&statuses)
    }

    async fn delete_status(&self, item_id: &ItemId) -> Result<()> {
        let mut statuses = self.load()?;
        statuses.remove(item_id);
        self.store(&statuses)
    }

    async fn delete_all_statuses(&self) -> Result<()> {
        self.store(&HashMap::new())
    }
}

/// File-backed catalog for offline use: a JSON array of categories with
/// nested items, the same shape the server's seed file uses.
pub struct LocalCatalogFile {
    path: PathBuf,
}

impl LocalCatalogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<Vec<Category>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read catalog file '{}'", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse catalog file '{}'", self.path.display()))
    }

    fn store(&self, categories: &[Category]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create catalog directory '{}'", parent.display())
            })?;
        }
        let raw = serde_json::to_string_pretty(categories)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write catalog file '{}'", self.path.display()))
    }
}

#[async_trait]
impl CatalogStore for LocalCatalogFile {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        self.load()
    }

    async fn create_category(&self, req: NewCategory) -> Result<()> {
        let mut categories = if self.path.exists() {
            self.load()?
        } else {
            Vec::new()
        };
        if categories.iter().any(|c| c.id == req.id) {
            bail!("category '{}' already exists", req.id);
        }
        categories.push(Category {
            id: req.id,
            name: req.name,
            icon: req.icon,
            purchase_deadline: req.purchase_deadline,
            items: Vec::new(),
        });
        self.store(&categories)
    }

    async fn add_item(&self, req: NewItem) -> Result<()> {
        let mut categories = self.load()?;
        let Some(category) = categories.iter_mut().find(|c| c.id == req.category_id) else {
            bail!("unknown category '{}'", req.category_id);
        };
        category.items.push(Item {
            id: req.id,
            name: req.name,
            url: req.url,
            price: req.price,
            image_url: req.image_url,
            is_preferred: req.is_preferred,
            notes: req.notes,
        });
        self.store(&categories)
    }
}
