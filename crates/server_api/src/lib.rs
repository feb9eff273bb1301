use shared::{
    domain::{Category, Item, ItemId, ItemStatus},
    error::{ApiError, ErrorCode},
    protocol::{CategoryPayload, ItemPayload, NewCategory, NewItem},
};
use storage::Storage;
use tracing::info;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

/// Categories with items nested in display order, each item carrying its
/// status joined in from the status table (absence means unset).
pub async fn list_categories(ctx: &ApiContext) -> Result<Vec<CategoryPayload>, ApiError> {
    let categories = ctx.storage.list_categories().await.map_err(internal)?;
    let statuses = ctx.storage.list_statuses().await.map_err(internal)?;

    Ok(categories
        .into_iter()
        .map(|category| CategoryPayload {
            id: category.id,
            name: category.name,
            icon: category.icon,
            purchase_deadline: category.purchase_deadline,
            items: category
                .items
                .into_iter()
                .map(|item| {
                    let status = statuses.get(&item.id).copied().unwrap_or_default();
                    ItemPayload { item, status }
                })
                .collect(),
        })
        .collect())
}

pub async fn create_category(ctx: &ApiContext, req: NewCategory) -> Result<(), ApiError> {
    if req.id.as_str().trim().is_empty() || req.name.trim().is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "category id and name are required",
        ));
    }
    if ctx
        .storage
        .category_exists(&req.id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("category '{}' already exists", req.id),
        ));
    }
    ctx.storage
        .create_category(&req.id, &req.name, &req.icon, req.purchase_deadline.as_deref())
        .await
        .map_err(internal)
}

pub async fn add_item(ctx: &ApiContext, req: NewItem) -> Result<(), ApiError> {
    if req.id.as_str().trim().is_empty() || req.name.trim().is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "item id and name are required",
        ));
    }
    if let Some(price) = req.price {
        if !price.is_finite() || price < 0.0 {
            return Err(ApiError::new(
                ErrorCode::Validation,
                "price must be a non-negative number",
            ));
        }
    }
    if !ctx
        .storage
        .category_exists(&req.category_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::new(
            ErrorCode::NotFound,
            format!("category '{}' not found", req.category_id),
        ));
    }
    if ctx.storage.item_exists(&req.id).await.map_err(internal)? {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("item '{}' already exists", req.id),
        ));
    }

    let item = Item {
        id: req.id,
        name: req.name,
        url: req.url,
        price: req.price,
        image_url: req.image_url,
        is_preferred: req.is_preferred,
        notes: req.notes,
    };
    ctx.storage
        .insert_item(&req.category_id, &item)
        .await
        .map_err(internal)
}

pub async fn set_item_status(
    ctx: &ApiContext,
    item_id: &ItemId,
    status: ItemStatus,
) -> Result<(), ApiError> {
    if !status.is_set() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "status must be 'shortlisted' or 'purchased'",
        ));
    }
    if !ctx.storage.item_exists(item_id).await.map_err(internal)? {
        return Err(ApiError::new(
            ErrorCode::NotFound,
            format!("item '{item_id}' not found"),
        ));
    }
    ctx.storage
        .upsert_status(item_id, status)
        .await
        .map_err(internal)
}

/// Clearing an absent status is a no-op; delete-by-key is idempotent.
pub async fn clear_item_status(ctx: &ApiContext, item_id: &ItemId) -> Result<(), ApiError> {
    ctx.storage
        .delete_status(item_id)
        .await
        .map(|_| ())
        .map_err(internal)
}

pub async fn reset_statuses(ctx: &ApiContext) -> Result<u64, ApiError> {
    ctx.storage.delete_all_statuses().await.map_err(internal)
}

/// Inserts the given categories and items, but only into an empty catalog;
/// returns whether anything was written.
pub async fn seed_catalog(ctx: &ApiContext, categories: &[Category]) -> Result<bool, ApiError> {
    if ctx.storage.count_categories().await.map_err(internal)? > 0 {
        return Ok(false);
    }

    for category in categories {
        ctx.storage
            .create_category(
                &category.id,
                &category.name,
                &category.icon,
                category.purchase_deadline.as_deref(),
            )
            .await
            .map_err(internal)?;
        for item in &category.items {
            ctx.storage
                .insert_item(&category.id, item)
                .await
                .map_err(internal)?;
        }
    }
    info!(categories = categories.len(), "seeded catalog");
    Ok(true)
}
