//! HTTP routes
//!
//! Document endpoints are a thin pass-through to [`DataOperations`]; every
//! successful write is announced on the `{project_id}/{collection}` channel.
//!
//! [`DataOperations`]: crate::data::DataOperations

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use super::websocket::websocket_handler;
use crate::registry::ChannelName;
use crate::stats::RegistryStats;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/stats", get(stats))
        .route("/ws/{project_id}/{collection}", get(websocket_handler))
        .route(
            "/projects/{project_id}/collections/{collection}/documents",
            post(create_document),
        )
        .route(
            "/projects/{project_id}/collections/{collection}/documents/{document_id}",
            get(get_document)
                .patch(update_document)
                .delete(delete_document),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Channel for a project's collection
///
/// Path segments are percent-decoded, so `b%2Fc` arrives as `b/c`. Segments
/// containing the separator are rejected to keep `("a", "b/c")` and
/// `("a/b", "c")` apart.
pub(super) fn scoped_channel(project_id: &str, collection: &str) -> ApiResult<ChannelName> {
    ChannelName::try_scoped(project_id, collection).ok_or_else(|| {
        ApiError::bad_request("project_id and collection must be non-empty and contain no '/'")
    })
}

async fn health() -> Json<Value> {
    Json(json!({ "message": "Realtime API is running" }))
}

async fn stats(State(state): State<AppState>) -> Json<RegistryStats> {
    Json(state.registry.stats().await)
}

async fn create_document(
    State(state): State<AppState>,
    Path((project_id, collection)): Path<(String, String)>,
    Json(document): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let channel = scoped_channel(&project_id, &collection)?;
    let stored = state.data.create_document(&channel, document).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn get_document(
    State(state): State<AppState>,
    Path((project_id, collection, document_id)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    let channel = scoped_channel(&project_id, &collection)?;
    let document = state.data.get_document(&channel, &document_id)?;
    Ok(Json(document))
}

async fn update_document(
    State(state): State<AppState>,
    Path((project_id, collection, document_id)): Path<(String, String, String)>,
    Json(update): Json<Value>,
) -> ApiResult<Json<Value>> {
    let channel = scoped_channel(&project_id, &collection)?;
    let updated = state
        .data
        .update_document(&channel, &document_id, update)
        .await?;
    Ok(Json(updated))
}

async fn delete_document(
    State(state): State<AppState>,
    Path((project_id, collection, document_id)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    let channel = scoped_channel(&project_id, &collection)?;
    state.data.delete_document(&channel, &document_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::data::{DataOperations, MemoryStore};
    use crate::registry::{Event, Registry};
    use crate::server::ServerConfig;

    fn app() -> (Router, Arc<Registry>) {
        let registry = Arc::new(Registry::new());
        let data = DataOperations::new(Arc::new(MemoryStore::new()), Arc::clone(&registry));
        let state = AppState::new(Arc::clone(&registry), data, ServerConfig::default());
        (router(state), registry)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"message": "Realtime API is running"})
        );
    }

    #[tokio::test]
    async fn test_create_notifies_subscribers() {
        let (app, registry) = app();
        let mut sub = registry.connect().await;
        registry
            .subscribe(sub.id(), ChannelName::scoped("p1", "notes"))
            .await
            .unwrap();

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/projects/p1/collections/notes/documents",
                json!({"id": "1", "text": "hi"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await, json!({"id": "1", "text": "hi"}));
        assert_eq!(
            sub.recv().await.unwrap().event,
            Event::create(json!({"id": "1", "text": "hi"}))
        );
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (app, registry) = app();
        let mut sub = registry.connect().await;
        registry
            .subscribe(sub.id(), ChannelName::scoped("p1", "notes"))
            .await
            .unwrap();

        let created = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/projects/p1/collections/notes/documents",
                json!({"id": "1", "text": "hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);

        let updated = app
            .clone()
            .oneshot(json_request(
                Method::PATCH,
                "/projects/p1/collections/notes/documents/1",
                json!({"text": "bye"}),
            ))
            .await
            .unwrap();
        assert_eq!(updated.status(), StatusCode::OK);
        assert_eq!(body_json(updated).await, json!({"id": "1", "text": "bye"}));

        let deleted = app
            .oneshot(
                Request::delete("/projects/p1/collections/notes/documents/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let actions: Vec<_> = [
            sub.recv().await.unwrap(),
            sub.recv().await.unwrap(),
            sub.recv().await.unwrap(),
        ]
        .iter()
        .map(|n| n.event.action().as_str())
        .collect();
        assert_eq!(actions, ["create", "update", "delete"]);
    }

    #[tokio::test]
    async fn test_delete_unknown_document() {
        let (app, registry) = app();

        let response = app
            .oneshot(
                Request::delete("/projects/p1/collections/notes/documents/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["status"], 404);
        assert_eq!(registry.stats().await.events_published, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_non_object() {
        let (app, _) = app();

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/projects/p1/collections/notes/documents",
                json!([1, 2, 3]),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_document() {
        let (app, registry) = app();
        let created = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/projects/p1/collections/notes/documents",
                json!({"id": "1", "text": "hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);

        let found = app
            .clone()
            .oneshot(
                Request::get("/projects/p1/collections/notes/documents/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(found.status(), StatusCode::OK);
        assert_eq!(body_json(found).await, json!({"id": "1", "text": "hi"}));

        let missing = app
            .oneshot(
                Request::get("/projects/p2/collections/notes/documents/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        // Reads are not announced
        assert_eq!(registry.stats().await.events_published, 1);
    }

    #[tokio::test]
    async fn test_encoded_separator_rejected() {
        let (app, registry) = app();
        let mut sub = registry.connect().await;
        registry
            .subscribe(sub.id(), ChannelName::scoped("a/b", "c"))
            .await
            .unwrap();

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/projects/a/collections/b%2Fc/documents",
                json!({"id": "1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(sub.try_recv().is_err());
        assert_eq!(registry.stats().await.events_published, 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let (app, registry) = app();
        let a = registry.connect().await;
        registry.subscribe(a.id(), "notes").await.unwrap();

        let response = app
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let stats = body_json(response).await;
        assert_eq!(stats["active_connections"], 1);
        assert_eq!(stats["channel_count"], 1);
        assert_eq!(stats["subscriptions"], 1);
    }
}
