//! Route handlers

use super::error::bad_request;
use super::state::AppState;
use crate::error::{RecommendError, Result};
use crate::types::{Event, EventContext, EventType, ObjectId, Product, User, UserId};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Optional `?limit=` on list routes
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// POST /recommend
///
/// The body is parsed by hand so that a missing or malformed `user_id`
/// answers with the same 400 message whatever the cause.
pub async fn recommend(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let user_id = match serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("user_id").cloned())
    {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => return Ok(bad_request("Missing user_id in request")),
        Some(other) => other.to_string(),
    };
    debug!("Received user_id: {}", user_id);

    let Ok(user) = ObjectId::parse(&user_id) else {
        return Ok(bad_request(
            "Invalid user_id format. It must be a 24-character hex string.",
        ));
    };

    let recommendations = state.recommender.single_user(&user).await?;
    Ok(Json(recommendations).into_response())
}

/// OPTIONS /recommend without CORS preflight headers
pub async fn recommend_preflight() -> Json<Value> {
    Json(json!({ "message": "CORS preflight request success" }))
}

/// GET /get_recommendations/:user_id
pub async fn get_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Product>>> {
    let user = UserId::parse(&user_id)?;
    let n = state.config().models.limits.hybrid;
    Ok(Json(state.recommender.hybrid_products(&user, n).await?))
}

/// GET /products/popular
pub async fn popular_products(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Product>>> {
    let n = query.limit.unwrap_or(state.config().models.limits.hybrid);
    Ok(Json(state.recommender.popular(n).await?))
}

/// GET /products/:product_id/pairings
pub async fn product_pairings(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ObjectId>>> {
    let product = ObjectId::parse(&product_id)?;
    let n = query.limit.unwrap_or(state.config().models.limits.pairing);
    Ok(Json(state.recommender.pairings(&product, n).await?))
}

/// GET /products/:product_id/similar
pub async fn similar_products(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ObjectId>>> {
    let product = ObjectId::parse(&product_id)?;
    let n = query.limit.unwrap_or(state.config().models.limits.content);
    Ok(Json(state.recommender.similar(&product, n).await?))
}

/// GET /products
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.store().list_products().await?))
}

/// POST /products
pub async fn create_product(
    State(state): State<AppState>,
    Json(product): Json<Product>,
) -> Result<impl IntoResponse> {
    if product.title.trim().is_empty() {
        return Err(RecommendError::InvalidOperation(
            "Product title is required".to_string(),
        ));
    }
    state.store().upsert_product(&product).await?;
    info!("Created product {} ({})", product.id, product.title);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Product created successfully", "product": product })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

/// GET /products/search?query=
pub async fn search_products(
    State(state): State<AppState>,
    Query(search): Query<SearchQuery>,
) -> Result<Response> {
    let Some(query) = search.query.filter(|q| !q.is_empty()) else {
        return Ok(bad_request("Search query is required"));
    };
    let products = state.store().search_products(&query).await?;
    Ok(Json(products).into_response())
}

/// PUT /users/:user_id
///
/// The path id wins over any id in the body.
pub async fn upsert_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(mut body): Json<Value>,
) -> Result<Json<User>> {
    let id = UserId::parse(&user_id)?;
    let Some(fields) = body.as_object_mut() else {
        return Err(RecommendError::InvalidOperation(
            "User profile must be a JSON object".to_string(),
        ));
    };
    fields.remove("_id");
    fields.remove("userId");
    fields.insert("userid".to_string(), Value::String(id.to_string()));

    let user: User = serde_json::from_value(body)
        .map_err(|e| RecommendError::InvalidOperation(format!("Invalid user profile: {}", e)))?;
    state.store().upsert_user(&user).await?;
    Ok(Json(user))
}

/// Body of POST and DELETE /events
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    pub user_id: String,
    pub product_id: String,
    pub event_type: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub context: Option<EventContext>,
}

impl EventRequest {
    fn keys(&self) -> Result<(UserId, ObjectId, EventType)> {
        Ok((
            UserId::parse(&self.user_id)?,
            ObjectId::parse(&self.product_id)?,
            self.event_type.parse()?,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /events
pub async fn track_event(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EventRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload?;
    let (user, product, event_type) = request.keys()?;
    if let Some(rating) = request.rating {
        if !(1..=5).contains(&rating) {
            return Err(RecommendError::InvalidOperation(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }
    }

    let weight = state.config().events.weight_for(event_type);
    let mut event = Event::new(user, product, event_type, weight);
    event.session_id = request.session_id;
    event.rating = request.rating;
    event.context = request.context;

    let id = state.store().insert_event(&event).await?;
    debug!("Tracked {} event {} for {}", event_type, id, event.user_id);
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Event tracked successfully".to_string(),
        }),
    ))
}

/// DELETE /events
pub async fn remove_event(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EventRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(request) = payload?;
    let (user, product, event_type) = request.keys()?;
    state.store().remove_event(&user, &product, event_type).await?;
    Ok(Json(MessageResponse {
        message: "Event removed successfully".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub user_id: Option<String>,
}

/// GET /events
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<Event>>> {
    let events = match query.user_id {
        Some(user_id) => {
            let user = UserId::parse(&user_id)?;
            state.store().events_for_user(&user).await?
        }
        None => state.store().list_events().await?,
    };
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
pub struct RetrainQuery {
    #[serde(default)]
    pub force: bool,
}

/// POST /admin/retrain
pub async fn retrain(
    State(state): State<AppState>,
    Query(query): Query<RetrainQuery>,
) -> Result<Json<crate::engine::RetrainOutcome>> {
    Ok(Json(state.recommender.retrain(query.force).await?))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub instance_id: String,
    pub revision: u64,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        instance_id: state.instance_id.clone(),
        revision: state.store().revision().await?,
    }))
}
