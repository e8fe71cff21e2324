//! HTTP adapter.
//!
//! Maps method and path onto engine operations and engine responses onto
//! `(StatusCode, Json<Envelope>)`. Every table route requires a resolved actor.

use crate::connection::{ActorResolver, SeedPool};
use crate::core::Actor;
use crate::domain::Tables;
use crate::engine::{Data, Record, Response, Table, UNAUTHENTICATED};
use crate::storage::{Model, Persistable};
use axum::{Json, Router};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

pub const API_PREFIX: &str = "/api/v1";

/// Fallback message for paths no table answers.
pub const NO_ROUTE: &str = "No handler is available for the provided URL";

impl IntoResponse for Response {
    fn into_response(self) -> HttpResponse {
        let status =
            StatusCode::from_u16(self.status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.envelope)).into_response()
    }
}

struct TableState<R, S> {
    table: Table<R, S>,
    resolver: Arc<dyn ActorResolver>,
    seeds: Arc<dyn SeedPool>,
}

impl<R, S> Clone for TableState<R, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            resolver: Arc::clone(&self.resolver),
            seeds: Arc::clone(&self.seeds),
        }
    }
}

impl<R: Model, S: Persistable<R>> TableState<R, S> {
    async fn actor(&self, headers: &HeaderMap) -> Result<Actor, Response> {
        self.resolver
            .resolve(headers)
            .await
            .ok_or_else(|| Response::unauthorized(UNAUTHENTICATED))
    }
}

/// Mounts the CRUD and seed routes of one table.
pub fn table_router<R, S>(
    table: Table<R, S>,
    resolver: Arc<dyn ActorResolver>,
    seeds: Arc<dyn SeedPool>,
) -> Router
where
    R: Model,
    S: Persistable<R> + 'static,
{
    Router::new()
        .route("/", get(read_many::<R, S>).post(create::<R, S>))
        .route("/seed", post(seed_default::<R, S>))
        .route("/seed/:pool", post(seed_named::<R, S>))
        .route(
            "/:id",
            get(read_one::<R, S>)
                .put(update::<R, S>)
                .delete(delete::<R, S>),
        )
        .with_state(TableState {
            table,
            resolver,
            seeds,
        })
}

/// Every domain table under `/api/v1/<endpoint>`, the endpoint listing and
/// the catch-all fallback.
pub fn api_router(
    tables: &Tables,
    resolver: Arc<dyn ActorResolver>,
    seeds: Arc<dyn SeedPool>,
) -> Router {
    let mounts = [
        (
            "users",
            table_router(tables.users.clone(), resolver.clone(), seeds.clone()),
        ),
        (
            "quizzes",
            table_router(tables.quizzes.clone(), resolver.clone(), seeds.clone()),
        ),
        (
            "questions",
            table_router(tables.questions.clone(), resolver.clone(), seeds.clone()),
        ),
        (
            "submissions",
            table_router(tables.submissions.clone(), resolver.clone(), seeds.clone()),
        ),
        (
            "results",
            table_router(tables.results.clone(), resolver, seeds),
        ),
    ];

    let endpoints: Vec<Record> = mounts
        .iter()
        .flat_map(|(endpoint, _)| endpoint_listing(endpoint))
        .collect();

    let mut api = Router::new();
    for (endpoint, router) in mounts {
        api = api.nest(&format!("/{endpoint}"), router);
    }

    let root = move || {
        let endpoints = endpoints.clone();
        async move { Response::success("API Available Endpoints").with_data(Data::Many(endpoints)) }
    };

    Router::new()
        .nest(API_PREFIX, api.route("/", get(root)))
        .fallback(fallback)
}

fn endpoint_listing(endpoint: &str) -> Vec<Record> {
    let base = format!("{API_PREFIX}/{endpoint}");
    [
        (base.clone(), json!(["GET", "POST"])),
        (format!("{base}/:id"), json!(["GET", "PUT", "DELETE"])),
        (format!("{base}/seed"), json!(["POST"])),
        (format!("{base}/seed/:pool"), json!(["POST"])),
    ]
    .into_iter()
    .map(|(path, methods)| {
        let mut entry = Record::new();
        entry.insert("path".to_string(), JsonValue::String(path));
        entry.insert("methods".to_string(), methods);
        entry
    })
    .collect()
}

async fn fallback() -> Response {
    Response::not_found(NO_ROUTE)
}

fn body(payload: Result<Json<JsonValue>, JsonRejection>) -> Result<Record, Response> {
    match payload {
        Ok(Json(JsonValue::Object(record))) => Ok(record),
        Ok(Json(_)) => Err(Response::bad_request("Request body must be a JSON object")),
        Err(rejection) => Err(Response::bad_request(rejection.body_text())),
    }
}

async fn read_many<R: Model, S: Persistable<R>>(
    State(state): State<TableState<R, S>>,
    headers: HeaderMap,
) -> Response {
    match state.actor(&headers).await {
        Ok(actor) => state.table.read_many(Some(&actor)).await,
        Err(response) => response,
    }
}

async fn read_one<R: Model, S: Persistable<R>>(
    State(state): State<TableState<R, S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let actor = match state.actor(&headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match id.parse::<i64>() {
        Ok(id) => state.table.read_one(Some(&actor), id).await,
        Err(_) => state.table.not_found(id),
    }
}

async fn create<R: Model, S: Persistable<R>>(
    State(state): State<TableState<R, S>>,
    headers: HeaderMap,
    payload: Result<Json<JsonValue>, JsonRejection>,
) -> Response {
    let actor = match state.actor(&headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match body(payload) {
        Ok(record) => state.table.create(Some(&actor), &record).await,
        Err(response) => response,
    }
}

async fn update<R: Model, S: Persistable<R>>(
    State(state): State<TableState<R, S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<JsonValue>, JsonRejection>,
) -> Response {
    let actor = match state.actor(&headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let record = match body(payload) {
        Ok(record) => record,
        Err(response) => return response,
    };
    match id.parse::<i64>() {
        Ok(id) => state.table.update(Some(&actor), id, &record).await,
        Err(_) => state.table.not_found(id),
    }
}

async fn delete<R: Model, S: Persistable<R>>(
    State(state): State<TableState<R, S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let actor = match state.actor(&headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match id.parse::<i64>() {
        Ok(id) => state.table.delete(Some(&actor), id).await,
        Err(_) => state.table.not_found(id),
    }
}

async fn seed_default<R: Model, S: Persistable<R>>(
    State(state): State<TableState<R, S>>,
    headers: HeaderMap,
) -> Response {
    match state.actor(&headers).await {
        Ok(actor) => state.table.seed(Some(&actor), None, &*state.seeds).await,
        Err(response) => response,
    }
}

async fn seed_named<R: Model, S: Persistable<R>>(
    State(state): State<TableState<R, S>>,
    headers: HeaderMap,
    Path(pool): Path<String>,
) -> Response {
    match state.actor(&headers).await {
        Ok(actor) => state.table.seed(Some(&actor), Some(&pool), &*state.seeds).await,
        Err(response) => response,
    }
}
