use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use omnicore_store::ResourceStore;
use tower_http::trace::TraceLayer;

use crate::auth::require_token;
use crate::handlers;
use crate::state::{AppState, ControllerInfo};

pub fn build_app(store: Arc<dyn ResourceStore>, controllers: Vec<ControllerInfo>, auth_token: Arc<String>) -> Router {
    let state = AppState { store, controllers: Arc::new(controllers), auth_token };

    Router::new()
        // Health
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        // Resources
        .route(
            "/resources/:type/:namespace",
            get(handlers::list_resources).post(handlers::create_resource),
        )
        .route(
            "/resources/:type/:namespace/:id",
            get(handlers::get_resource).put(handlers::update_resource).delete(handlers::destroy_resource),
        )
        .route("/resources/:type/:namespace/:id/teardown", axum::routing::post(handlers::teardown_resource))
        .route("/resources/:type/:namespace/watch", get(handlers::watch_resources))
        // Controller introspection
        .route("/controllers", get(handlers::list_controllers))
        .route("/dependency-graph", get(handlers::dependency_graph))
        // Auth middleware applies to all routes above
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use base64::Engine as _;
    use omnicore_store::InMemoryStore;
    use tower::util::ServiceExt;

    const TEST_TOKEN: &str = "test-token";

    fn test_app() -> Router {
        let store = Arc::new(InMemoryStore::new());
        build_app(store, Vec::new(), Arc::new(TEST_TOKEN.to_string()))
    }

    fn authed(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.header("Authorization", format!("Bearer {}", TEST_TOKEN))
    }

    #[tokio::test]
    async fn unauthenticated_request_returns_401() {
        let app = test_app();
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_token_returns_401() {
        let app = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Authorization", "Bearer wrong-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn basic_auth_with_correct_token_returns_200() {
        // Terraform's HTTP state backend sends the token as the Basic auth password.
        let app = test_app();
        let credentials = base64::engine::general_purpose::STANDARD.encode(format!("omnicore:{}", TEST_TOKEN));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Authorization", format!("Basic {}", credentials))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn basic_auth_with_wrong_token_returns_401() {
        let app = test_app();
        let credentials = base64::engine::general_purpose::STANDARD.encode("omnicore:wrong-token");
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Authorization", format!("Basic {}", credentials))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_returns_200() {
        let app = test_app();
        let resp = app
            .oneshot(authed(Request::builder().uri("/health")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_returns_200_with_empty_store() {
        let app = test_app();
        let resp = app
            .oneshot(authed(Request::builder().uri("/ready")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_resources_empty() {
        let app = test_app();
        let resp = app
            .oneshot(
                authed(Request::builder().uri("/resources/MachineRequest/default"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_resource_not_found_returns_404() {
        let app = test_app();
        let resp = app
            .oneshot(
                authed(Request::builder().uri("/resources/MachineRequest/default/nonexistent"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_then_get_resource_round_trips() {
        let app = test_app();
        let body = serde_json::json!({
            "pointer": {"resource_type": "MachineRequest", "namespace": "default", "id": "m1"},
            "metadata": {
                "version": null,
                "created": "2026-01-01T00:00:00Z",
                "updated": "2026-01-01T00:00:00Z",
                "owner": "tester",
                "phase": "running",
                "finalizers": [],
                "labels": {},
                "annotations": {},
            },
            "spec": {"infra_provider_id": "p1", "extensions": [], "kernel_args": [], "meta_values": {}, "talos_version": "v1.7.0"},
        });
        let resp = app
            .clone()
            .oneshot(
                authed(
                    Request::builder()
                        .method(Method::POST)
                        .uri("/resources/MachineRequest/default")
                        .header("content-type", "application/json"),
                )
                .body(Body::from(body.to_string()))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let created: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let id = created["pointer"]["id"].as_str().unwrap().to_string();

        let resp = app
            .oneshot(
                authed(Request::builder().uri(format!("/resources/MachineRequest/default/{id}")))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn controllers_returns_200() {
        let app = test_app();
        let resp = app
            .oneshot(authed(Request::builder().uri("/controllers")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn dependency_graph_returns_200() {
        let app = test_app();
        let resp = app
            .oneshot(authed(Request::builder().uri("/dependency-graph")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
