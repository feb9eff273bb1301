use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};

use shared::domain::{Category, CategoryId, Item, ItemId, ItemStatus};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn count_categories(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Inserts a category at the end of the display order.
    pub async fn create_category(
        &self,
        id: &CategoryId,
        name: &str,
        icon: &str,
        purchase_deadline: Option<&str>,
    ) -> Result<()> {
        let position = self.count_categories().await?;
        sqlx::query(
            "INSERT INTO categories (id, name, icon, purchase_deadline, sort_order)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(name)
        .bind(icon)
        .bind(purchase_deadline)
        .bind(position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts an item at the end of its category's display order.
    pub async fn insert_item(&self, category_id: &CategoryId, item: &Item) -> Result<()> {
        let position: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE category_id = ?")
            .bind(category_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        let notes = if item.notes.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&item.notes)?)
        };
        sqlx::query(
            "INSERT INTO items (id, category_id, name, url, price, image_url, is_preferred, notes, sort_order)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(item.id.as_str())
        .bind(category_id.as_str())
        .bind(&item.name)
        .bind(item.url.as_deref())
        .bind(item.price)
        .bind(item.image_url.as_deref())
        .bind(item.is_preferred)
        .bind(notes)
        .bind(position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn category_exists(&self, id: &CategoryId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM categories WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn item_exists(&self, id: &ItemId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM items WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Returns every category with its items nested, both in stored display
    /// order.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let category_rows = sqlx::query(
            "SELECT id, name, icon, purchase_deadline
             FROM categories
             ORDER BY sort_order ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let item_rows = sqlx::query(
            "SELECT id, category_id, name, url, price, image_url, is_preferred, notes
             FROM items
             ORDER BY sort_order ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_category: HashMap<String, Vec<Item>> = HashMap::new();
        for row in item_rows {
            let notes = row
                .get::<Option<String>, _>(7)
                .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
                .unwrap_or_default();
            items_by_category
                .entry(row.get::<String, _>(1))
                .or_default()
                .push(Item {
                    id: ItemId(row.get::<String, _>(0)),
                    name: row.get::<String, _>(2),
                    url: row.get::<Option<String>, _>(3),
                    price: row.get::<Option<f64>, _>(4),
                    image_url: row.get::<Option<String>, _>(5),
                    is_preferred: row.get::<bool, _>(6),
                    notes,
                });
        }

        Ok(category_rows
            .into_iter()
            .map(|row| {
                let id: String = row.get(0);
                let items = items_by_category.remove(&id).unwrap_or_default();
                Category {
                    id: CategoryId(id),
                    name: row.get::<String, _>(1),
                    icon: row.get::<String, _>(2),
                    purchase_deadline: row.get::<Option<String>, _>(3),
                    items,
                }
            })
            .collect())
    }

    /// Returns the status mapping. Rows whose status does not parse as a
    /// set mark are dropped; absence means unset.
    pub async fn list_statuses(&self) -> Result<HashMap<ItemId, ItemStatus>> {
        let rows = sqlx::query("SELECT item_id, status FROM item_statuses")
            .fetch_all(&self.pool)
            .await?;

        let mut statuses = HashMap::with_capacity(rows.len());
        for row in rows {
            let status = ItemStatus::from_stored(&row.get::<String, _>(1));
            if status.is_set() {
                statuses.insert(ItemId(row.get::<String, _>(0)), status);
            }
        }
        Ok(statuses)
    }

    pub async fn upsert_status(&self, item_id: &ItemId, status: ItemStatus) -> Result<()> {
        let Some(stored) = status.as_stored() else {
            bail!("cannot persist an unset status for item '{item_id}'");
        };
        sqlx::query(
            "INSERT INTO item_statuses (item_id, status, updated_at)
             VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(item_id) DO UPDATE SET status = excluded.status, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(item_id.as_str())
        .bind(stored)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_status(&self, item_id: &ItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM item_statuses WHERE item_id = ?")
            .bind(item_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_statuses(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM item_statuses")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
