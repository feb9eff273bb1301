use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use server_api::{
    add_item, clear_item_status, create_category, list_categories, reset_statuses,
    set_item_status, ApiContext,
};
use shared::{
    domain::ItemId,
    error::{ApiError, ErrorCode},
    protocol::{CategoryPayload, NewCategory, NewItem, OkResponse, ResetResponse, SetStatusRequest},
};
use storage::Storage;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

mod config;
mod seed;

use config::{load_settings, prepare_database_url};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|err| {
        error!(
            %database_url,
            %err,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        err
    })?;
    let api = ApiContext { storage };

    if let Some(seed_path) = settings.seed_path.as_deref() {
        seed::seed_from_file(&api, seed_path).await?;
    }

    let state = AppState { api };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/categories",
            get(http_list_categories).post(http_create_category),
        )
        .route("/items", post(http_add_item))
        .route(
            "/items/:item_id/status",
            put(http_set_status).delete(http_clear_status),
        )
        .route("/reset", post(http_reset))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state.api.storage.health_check().await.map_err(|err| {
        error!(%err, "health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}

async fn http_list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryPayload>>, (StatusCode, Json<ApiError>)> {
    let categories = list_categories(&state.api).await.map_err(reject)?;
    Ok(Json(categories))
}

async fn http_create_category(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewCategory>,
) -> Result<(StatusCode, Json<OkResponse>), (StatusCode, Json<ApiError>)> {
    create_category(&state.api, req).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(OkResponse::ok())))
}

async fn http_add_item(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewItem>,
) -> Result<(StatusCode, Json<OkResponse>), (StatusCode, Json<ApiError>)> {
    add_item(&state.api, req).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(OkResponse::ok())))
}

async fn http_set_status(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<OkResponse>, (StatusCode, Json<ApiError>)> {
    set_item_status(&state.api, &ItemId(item_id), req.status)
        .await
        .map_err(reject)?;
    Ok(Json(OkResponse::ok()))
}

async fn http_clear_status(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> Result<Json<OkResponse>, (StatusCode, Json<ApiError>)> {
    clear_item_status(&state.api, &ItemId(item_id))
        .await
        .map_err(reject)?;
    Ok(Json(OkResponse::ok()))
}

async fn http_reset(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResetResponse>, (StatusCode, Json<ApiError>)> {
    let cleared = reset_statuses(&state.api).await.map_err(reject)?;
    Ok(Json(ResetResponse { ok: true, cleared }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use shared::domain::CategoryId;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        let api = ApiContext { storage };
        create_category(
            &api,
            NewCategory {
                id: CategoryId::from("lighting"),
                name: "Lighting".to_string(),
                icon: "💡".to_string(),
                purchase_deadline: None,
            },
        )
        .await
        .expect("category");
        add_item(
            &api,
            NewItem {
                id: ItemId::from("lamp"),
                category_id: CategoryId::from("lighting"),
                name: "Floor lamp".to_string(),
                url: None,
                price: Some(49.99),
                image_url: None,
                is_preferred: false,
                notes: Vec::new(),
            },
        )
        .await
        .expect("item");
        build_router(Arc::new(AppState { api }))
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn healthz_responds_ok() {
        let app = test_app().await;
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn healthz_reports_unavailable_when_the_pool_is_closed() {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        storage.pool().close().await;
        let app = build_router(Arc::new(AppState {
            api: ApiContext { storage },
        }));
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn categories_listing_embeds_statuses() {
        let app = test_app().await;

        let put = json_request("PUT", "/items/lamp/status", r#"{"status":"shortlisted"}"#);
        let response = app.clone().oneshot(put).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/categories")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["items"][0]["status"], "shortlisted");
    }

    #[tokio::test]
    async fn status_write_for_unknown_item_is_not_found() {
        let app = test_app().await;
        let put = json_request("PUT", "/items/ghost/status", r#"{"status":"purchased"}"#);
        let response = app.oneshot(put).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unset_status_write_is_rejected() {
        let app = test_app().await;
        let put = json_request("PUT", "/items/lamp/status", r#"{"status":"unset"}"#);
        let response = app.oneshot(put).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn clear_and_reset_remove_statuses() {
        let app = test_app().await;

        let put = json_request("PUT", "/items/lamp/status", r#"{"status":"purchased"}"#);
        let response = app.clone().oneshot(put).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let delete = Request::delete("/items/lamp/status")
            .body(Body::empty())
            .expect("request");
        let response = app.clone().oneshot(delete).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let put = json_request("PUT", "/items/lamp/status", r#"{"status":"purchased"}"#);
        app.clone().oneshot(put).await.expect("response");
        let reset = Request::post("/reset").body(Body::empty()).expect("request");
        let response = app.clone().oneshot(reset).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["cleared"], 1);

        let response = app
            .oneshot(
                Request::get("/categories")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let body = body_json(response).await;
        assert!(body[0]["items"][0].get("status").is_none());
    }

    #[tokio::test]
    async fn added_items_append_to_their_category() {
        let app = test_app().await;
        let post = json_request(
            "POST",
            "/items",
            r#"{"id":"sconce","category_id":"lighting","name":"Wall sconce","price":29.5}"#,
        );
        let response = app.clone().oneshot(post).await.expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::get("/categories")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let body = body_json(response).await;
        let items = body[0]["items"].as_array().expect("items");
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["id"], "sconce");
    }

    #[tokio::test]
    async fn duplicate_category_is_rejected() {
        let app = test_app().await;
        let post = json_request(
            "POST",
            "/categories",
            r#"{"id":"lighting","name":"Lighting","icon":"💡"}"#,
        );
        let response = app.oneshot(post).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
