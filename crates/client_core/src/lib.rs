use std::{collections::HashMap, sync::Arc};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{Category, CategoryId, Item, ItemId, ItemStatus},
    protocol::{CategoryPayload, NewCategory, NewItem, SetStatusRequest},
};
use tokio::{sync::Mutex, task::JoinSet};
use tracing::warn;

pub mod filter;
pub mod local_store;
pub mod summary;

pub use filter::{filtered_categories, StatusFilter};
pub use local_store::{LocalCatalogFile, LocalStatusFile};
pub use summary::{summarize, BudgetSummary};

/// Spending ceiling used until the user sets one.
pub const DEFAULT_BUDGET: f64 = 2000.0;

/// Fresh unique id for a client-created item.
pub fn new_item_id() -> ItemId {
    ItemId(uuid::Uuid::new_v4().to_string())
}

/// Durable mapping from category to ordered items.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn create_category(&self, req: NewCategory) -> Result<()>;
    async fn add_item(&self, req: NewItem) -> Result<()>;
}

/// Durable mapping from item id to a set status mark. Absence of a key
/// means unset; upsert and delete are keyed by item id and idempotent.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn list_statuses(&self) -> Result<HashMap<ItemId, ItemStatus>>;
    async fn upsert_status(&self, item_id: &ItemId, status: ItemStatus) -> Result<()>;
    async fn delete_status(&self, item_id: &ItemId) -> Result<()>;
    async fn delete_all_statuses(&self) -> Result<()>;
}

/// HTTP backend for both stores, speaking the server's REST interface.
#[derive(Clone)]
pub struct WishlistApi {
    http: Client,
    server_url: String,
}

impl WishlistApi {
    pub fn new(server_url: impl Into<String>) -> Self {
        let server_url: String = server_url.into();
        Self {
            http: Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_categories(&self) -> Result<Vec<CategoryPayload>> {
        let res = self
            .http
            .get(format!("{}/categories", self.server_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }
}

#[async_trait]
impl CatalogStore for WishlistApi {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self
            .fetch_categories()
            .await?
            .into_iter()
            .map(|payload| Category {
                id: payload.id,
                name: payload.name,
                icon: payload.icon,
                purchase_deadline: payload.purchase_deadline,
                items: payload.items.into_iter().map(|entry| entry.item).collect(),
            })
            .collect())
    }

    async fn create_category(&self, req: NewCategory) -> Result<()> {
        self.http
            .post(format!("{}/categories", self.server_url))
            .json(&req)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn add_item(&self, req: NewItem) -> Result<()> {
        self.http
            .post(format!("{}/items", self.server_url))
            .json(&req)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for WishlistApi {
    /// The server embeds statuses in the category listing, so the
    /// snapshot is extracted from there.
    async fn list_statuses(&self) -> Result<HashMap<ItemId, ItemStatus>> {
        let mut statuses = HashMap::new();
        for payload in self.fetch_categories().await? {
            for entry in payload.items {
                if entry.status.is_set() {
                    statuses.insert(entry.item.id, entry.status);
                }
            }
        }
        Ok(statuses)
    }

    async fn upsert_status(&self, item_id: &ItemId, status: ItemStatus) -> Result<()> {
        if !status.is_set() {
            bail!("cannot upsert an unset status for item '{item_id}'");
        }
        self.http
            .put(format!("{}/items/{}/status", self.server_url, item_id))
            .json(&SetStatusRequest { status })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete_status(&self, item_id: &ItemId) -> Result<()> {
        self.http
            .delete(format!("{}/items/{}/status", self.server_url, item_id))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete_all_statuses(&self) -> Result<()> {
        self.http
            .post(format!("{}/reset", self.server_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Client-local cache of item statuses kept consistent with a remote
/// status store under optimistic, fire-and-forget writes.
///
/// The cache is authoritative for readers: a failed remote write is logged
/// and never rolls local state back. Writes to the same item are not
/// sequenced, so concurrent editors race with last-local-write-wins
/// semantics on the remote copy.
pub struct StatusReconciler {
    statuses: Mutex<HashMap<ItemId, ItemStatus>>,
    store: Arc<dyn StatusStore>,
    pending: Mutex<JoinSet<()>>,
}

impl StatusReconciler {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            store,
            pending: Mutex::new(JoinSet::new()),
        }
    }

    /// Replaces the cache wholesale with a fetched snapshot, dropping
    /// entries that are not a set mark.
    pub async fn init_from_remote(&self, remote: HashMap<ItemId, ItemStatus>) {
        let filtered = remote
            .into_iter()
            .filter(|(_, status)| status.is_set())
            .collect();
        *self.statuses.lock().await = filtered;
    }

    pub async fn status_of(&self, item_id: &ItemId) -> ItemStatus {
        self.statuses
            .lock()
            .await
            .get(item_id)
            .copied()
            .unwrap_or_default()
    }

    pub async fn snapshot(&self) -> HashMap<ItemId, ItemStatus> {
        self.statuses.lock().await.clone()
    }

    /// Applies the toggle semantics locally and forwards the change to the
    /// store without awaiting it. Setting `Unset`, or the status the item
    /// already has, clears the entry; anything else overwrites it. Returns
    /// the resulting status.
    pub async fn set_status(&self, item_id: &ItemId, new_status: ItemStatus) -> ItemStatus {
        let resulting = {
            let mut statuses = self.statuses.lock().await;
            let current = statuses.get(item_id).copied().unwrap_or_default();
            if !new_status.is_set() || new_status == current {
                statuses.remove(item_id);
                ItemStatus::Unset
            } else {
                statuses.insert(item_id.clone(), new_status);
                new_status
            }
        };

        let store = Arc::clone(&self.store);
        let item_id = item_id.clone();
        self.spawn_write(async move {
            let result = if resulting.is_set() {
                store.upsert_status(&item_id, resulting).await
            } else {
                store.delete_status(&item_id).await
            };
            if let Err(err) = result {
                warn!(item_id = %item_id, %err, "status write to store failed; local state kept");
            }
        })
        .await;

        resulting
    }

    /// Clears the cache and issues a detached delete-all.
    pub async fn reset_all(&self) {
        self.statuses.lock().await.clear();
        let store = Arc::clone(&self.store);
        self.spawn_write(async move {
            if let Err(err) = store.delete_all_statuses().await {
                warn!(%err, "status reset on store failed; local state kept");
            }
        })
        .await;
    }

    async fn spawn_write(&self, write: impl std::future::Future<Output = ()> + Send + 'static) {
        let mut pending = self.pending.lock().await;
        // Reap whatever already finished so the set stays small.
        while pending.try_join_next().is_some() {}
        pending.spawn(write);
    }

    /// Waits for every detached write issued so far. Failures were already
    /// logged as they happened; this only bounds shutdown.
    pub async fn drain_pending(&self) {
        let mut pending = self.pending.lock().await;
        while pending.join_next().await.is_some() {}
    }
}

/// Client-side session state: the catalog cache, the status reconciler
/// and the session budget, wired to store handles passed in at
/// construction.
pub struct WishlistClient {
    catalog: Arc<dyn CatalogStore>,
    statuses: Arc<dyn StatusStore>,
    reconciler: StatusReconciler,
    categories: Mutex<Vec<Category>>,
    budget: Mutex<f64>,
    pending: Mutex<JoinSet<()>>,
}

impl WishlistClient {
    pub fn new(catalog: Arc<dyn CatalogStore>, statuses: Arc<dyn StatusStore>) -> Self {
        Self {
            catalog,
            statuses: Arc::clone(&statuses),
            reconciler: StatusReconciler::new(statuses),
            categories: Mutex::new(Vec::new()),
            budget: Mutex::new(DEFAULT_BUDGET),
            pending: Mutex::new(JoinSet::new()),
        }
    }

    /// Fetches catalog and status snapshot, committing both only when both
    /// succeed; a failure leaves the client unloaded rather than partially
    /// rendered.
    pub async fn load(&self) -> Result<()> {
        let categories = self
            .catalog
            .list_categories()
            .await
            .context("failed to load catalog")?;
        let statuses = self
            .statuses
            .list_statuses()
            .await
            .context("failed to load statuses")?;

        *self.categories.lock().await = categories;
        self.reconciler.init_from_remote(statuses).await;
        Ok(())
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.categories.lock().await.clone()
    }

    pub async fn status_of(&self, item_id: &ItemId) -> ItemStatus {
        self.reconciler.status_of(item_id).await
    }

    pub async fn set_status(&self, item_id: &ItemId, status: ItemStatus) -> ItemStatus {
        self.reconciler.set_status(item_id, status).await
    }

    pub async fn reset_all(&self) {
        self.reconciler.reset_all().await;
    }

    /// Appends the item locally and forwards the add to the catalog store
    /// without awaiting it, the same write policy statuses get.
    pub async fn add_item(&self, category_id: &CategoryId, item: Item) -> Result<()> {
        {
            let mut categories = self.categories.lock().await;
            let Some(category) = categories.iter_mut().find(|c| &c.id == category_id) else {
                bail!("unknown category '{category_id}'");
            };
            category.items.push(item.clone());
        }

        let catalog = Arc::clone(&self.catalog);
        let category_id = category_id.clone();
        let mut pending = self.pending.lock().await;
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            let item_id = item.id.clone();
            let req = NewItem {
                id: item.id,
                category_id,
                name: item.name,
                url: item.url,
                price: item.price,
                image_url: item.image_url,
                is_preferred: item.is_preferred,
                notes: item.notes,
            };
            if let Err(err) = catalog.add_item(req).await {
                warn!(item_id = %item_id, %err, "item add on catalog store failed; local state kept");
            }
        });
        Ok(())
    }

    pub async fn set_budget(&self, budget: f64) {
        *self.budget.lock().await = budget.max(0.0);
    }

    pub async fn budget(&self) -> f64 {
        *self.budget.lock().await
    }

    pub async fn summary(&self) -> BudgetSummary {
        let categories = self.categories.lock().await;
        let statuses = self.reconciler.snapshot().await;
        let budget = *self.budget.lock().await;
        summarize(&categories, &statuses, budget)
    }

    pub async fn filtered(&self, search: &str, filter: StatusFilter) -> Vec<Category> {
        let categories = self.categories.lock().await;
        let statuses = self.reconciler.snapshot().await;
        filtered_categories(&categories, &statuses, search, filter)
    }

    /// Waits for detached catalog and status writes. Presentation layers
    /// call this before exiting so a short-lived process does not drop
    /// writes that are still in flight.
    pub async fn drain_pending(&self) {
        {
            let mut pending = self.pending.lock().await;
            while pending.join_next().await.is_some() {}
        }
        self.reconciler.drain_pending().await;
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
