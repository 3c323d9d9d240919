use std::collections::HashSet;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use omnicore_domain::{AnyResource, LabelSelector, Namespace, Pointer, ResourceType};
use omnicore_graph::{DependencyGraphBuilder, EdgeKind};
use omnicore_store::{ListFilter, WatchRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;
use crate::wire::WireEvent;

pub async fn health() -> &'static str {
    "ok\n"
}

pub async fn ready(State(state): State<AppState>) -> Response {
    // A cheap list against a namespace that is always legal to query proves
    // the store is reachable without requiring any resource to exist.
    match state.store.list(&"health".into(), &"health".into(), ListFilter::default()).await {
        Ok(_) => (axum::http::StatusCode::OK, "ready\n").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path((resource_type, namespace, id)): Path<(String, String, String)>,
) -> Result<Json<AnyResource>, ApiError> {
    let pointer = Pointer::new(resource_type.as_str(), namespace.as_str(), id.as_str());
    let resource = state.store.get(&pointer).await?;
    Ok(Json(resource))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub label_selector: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub sort_field: Option<String>,
    #[serde(default)]
    pub sort_descending: Option<bool>,
}

/// `GET /resources/:type/:namespace`'s response: the page of matching
/// resources plus the total match count before `offset`/`limit` were
/// applied, so a paging client knows when it has reached the end.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<AnyResource>,
    pub total: usize,
}

pub async fn list_resources(
    State(state): State<AppState>,
    Path((resource_type, namespace)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let label_selectors = parse_selectors(query.label_selector.as_deref())?;
    let resource_type: ResourceType = resource_type.as_str().into();
    let namespace: Namespace = namespace.as_str().into();
    let filter = ListFilter {
        label_selectors,
        search: query.search,
        offset: query.offset.unwrap_or(0),
        limit: query.limit,
        sort_field: query.sort_field,
        sort_descending: query.sort_descending.unwrap_or(false),
    };
    let (items, total) = state.store.list(&resource_type, &namespace, filter).await?;
    Ok(Json(ListResponse { items, total }))
}

fn parse_selectors(raw: Option<&str>) -> Result<Vec<LabelSelector>, ApiError> {
    let Some(raw) = raw else { return Ok(Vec::new()) };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| LabelSelector::parse(s).map_err(|e| ApiError::bad_request(e.to_string())))
        .collect()
}

pub async fn create_resource(
    State(state): State<AppState>,
    Path((resource_type, namespace)): Path<(String, String)>,
    Json(mut resource): Json<AnyResource>,
) -> Result<Json<AnyResource>, ApiError> {
    resource.pointer.resource_type = resource_type.as_str().into();
    resource.pointer.namespace = namespace.as_str().into();
    let created = state.store.create(resource).await?;
    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    pub expected_version: Option<u64>,
    pub resource: AnyResource,
}

pub async fn update_resource(
    State(state): State<AppState>,
    Path((resource_type, namespace, id)): Path<(String, String, String)>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<AnyResource>, ApiError> {
    let pointer = Pointer::new(resource_type.as_str(), namespace.as_str(), id.as_str());
    let updated = state.store.update(&pointer, body.expected_version, body.resource).await?;
    Ok(Json(updated))
}

pub async fn teardown_resource(
    State(state): State<AppState>,
    Path((resource_type, namespace, id)): Path<(String, String, String)>,
) -> Result<Json<AnyResource>, ApiError> {
    let pointer = Pointer::new(resource_type.as_str(), namespace.as_str(), id.as_str());
    let resource = state.store.teardown(&pointer).await?;
    Ok(Json(resource))
}

pub async fn destroy_resource(
    State(state): State<AppState>,
    Path((resource_type, namespace, id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let pointer = Pointer::new(resource_type.as_str(), namespace.as_str(), id.as_str());
    state.store.destroy(&pointer).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct WatchQuery {
    #[serde(default)]
    pub label_selector: Option<String>,
    #[serde(default)]
    pub tail_from: Option<u64>,
}

/// Streams watch events for a resource type/namespace as newline-delimited
/// JSON. The connection stays open until the client disconnects.
pub async fn watch_resources(
    State(state): State<AppState>,
    Path((resource_type, namespace)): Path<(String, String)>,
    Query(query): Query<WatchQuery>,
) -> Result<Response, ApiError> {
    let selector = parse_selectors(query.label_selector.as_deref())?;
    let request = WatchRequest {
        resource_type: resource_type.as_str().into(),
        namespace: namespace.as_str().into(),
        selector,
        tail_from: query.tail_from,
    };
    let stream = state.store.watch(request).await?;

    let body_stream = stream.map(|event| {
        let wire = WireEvent::from(&event);
        let mut line = serde_json::to_vec(&wire).unwrap_or_default();
        line.push(b'\n');
        Ok::<_, std::io::Error>(line)
    });

    let body = Body::from_stream(body_stream);
    Ok(Response::builder()
        .header(axum::http::header::CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .unwrap())
}

pub async fn list_controllers(State(state): State<AppState>) -> Json<serde_json::Value> {
    let controllers: Vec<_> = state
        .controllers
        .iter()
        .map(|c| {
            json!({
                "name": c.name,
                "inputs": c.inputs.iter().map(|i| json!({
                    "resource_type": i.resource_type.to_string(),
                    "kind": format!("{:?}", i.kind),
                })).collect::<Vec<_>>(),
                "outputs": c.outputs.iter().map(|o| json!({
                    "resource_type": o.resource_type.to_string(),
                    "kind": format!("{:?}", o.kind),
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    Json(json!({ "controllers": controllers }))
}

/// Renders which controllers watch or write which resource types, for
/// operators to understand the reconcile topology at a glance. This is
/// presentation only — it never gates a reconcile.
pub async fn dependency_graph(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let mut builder = DependencyGraphBuilder::new();
    let mut known_types: HashSet<String> = HashSet::new();

    for controller in state.controllers.iter() {
        builder.add_controller_node(controller.name.clone()).map_err(|e| ApiError::internal(e.to_string()))?;
        for resource_type in controller.inputs.iter().map(|i| &i.resource_type).chain(controller.outputs.iter().map(|o| &o.resource_type)) {
            if known_types.insert(resource_type.to_string()) {
                builder.add_resource_type_node(resource_type).map_err(|e| ApiError::internal(e.to_string()))?;
            }
        }
    }

    for controller in state.controllers.iter() {
        let controller_id = DependencyGraphBuilder::controller_node_id(&controller.name);
        for input in &controller.inputs {
            let type_id = DependencyGraphBuilder::resource_type_node_id(&input.resource_type);
            builder
                .add_edge(type_id, controller_id.clone(), EdgeKind::Watches)
                .map_err(|e| ApiError::internal(e.to_string()))?;
        }
        for output in &controller.outputs {
            let type_id = DependencyGraphBuilder::resource_type_node_id(&output.resource_type);
            builder
                .add_edge(controller_id.clone(), type_id, EdgeKind::Writes)
                .map_err(|e| ApiError::internal(e.to_string()))?;
        }
    }

    let graph = builder.build();
    Ok(Json(serde_json::to_value(graph).map_err(|e| ApiError::internal(e.to_string()))?))
}
