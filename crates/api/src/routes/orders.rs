//! Order command and query endpoints.
//!
//! Every mutating request carries the `version` the client last saw; a
//! stale version is answered with 409 and the client reloads.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use common::{OrderId, PositionId, RestaurantId};
use domain::{
    BroadcastNotifier, CommandResult, CreateOrder, Money, NewPosition, Order, OrderInfos,
    OrderPosition, OrderService, OrderState, OrderSummary, PositionPatch, StateManagement,
    Trigger,
};
use order_store::{OrderStore, Version};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub service: Arc<OrderService<S>>,
    pub notifier: BroadcastNotifier,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub restaurant_id: RestaurantId,
    pub target_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct SetInfosRequest {
    pub version: Version,
    pub infos: OrderInfos,
}

#[derive(Debug, Deserialize)]
pub struct AddPositionRequest {
    pub version: Version,
    #[serde(flatten)]
    pub position: NewPosition,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePositionRequest {
    pub version: Version,
    #[serde(flatten)]
    pub patch: PositionPatch,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub version: Version,
    pub trigger: Trigger,
}

#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    pub version: Version,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub version: Version,
    pub restaurant_id: RestaurantId,
    pub target_date: NaiveDate,
    pub state: OrderState,
    pub infos: OrderInfos,
    pub positions: Vec<OrderPosition>,
    pub state_management: StateManagement,
    pub summary: OrderSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            version: order.version(),
            restaurant_id: order.restaurant_id(),
            target_date: order.target_date(),
            state: order.state(),
            infos: order.infos().clone(),
            positions: order.positions().to_vec(),
            state_management: order.state_management().clone(),
            summary: order.summary(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub order_id: OrderId,
    pub removed: bool,
    /// Absent once the order has been removed.
    pub order: Option<OrderResponse>,
}

impl From<CommandResult> for TransitionResponse {
    fn from(result: CommandResult) -> Self {
        Self {
            order_id: result.order.id(),
            removed: result.removed,
            order: (!result.removed).then(|| OrderResponse::from(&result.order)),
        }
    }
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub order_id: OrderId,
    pub version: Version,
    pub order_fee: Money,
    #[serde(flatten)]
    pub summary: OrderSummary,
}

// -- Handlers --

/// POST /orders: create a new order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let cmd = CreateOrder::new(req.restaurant_id, req.target_date);
    let order = state.service.create_order(cmd).await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders: list orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.service.list_orders().await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/:id: load one order.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.service.get_order(parse_order_id(&id)?).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders/:id/summary: the financial reconciliation of one order.
#[tracing::instrument(skip(state))]
pub async fn summary<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let order = state.service.get_order(parse_order_id(&id)?).await?;
    Ok(Json(SummaryResponse {
        order_id: order.id(),
        version: order.version(),
        order_fee: order.infos().order_fee,
        summary: order.summary(),
    }))
}

/// PUT /orders/:id/infos: replace the order infos.
#[tracing::instrument(skip(state, req))]
pub async fn set_infos<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<SetInfosRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .service
        .set_infos(parse_order_id(&id)?, req.version, req.infos)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/:id/positions: add a line item.
#[tracing::instrument(skip(state, req))]
pub async fn add_position<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AddPositionRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .service
        .add_position(parse_order_id(&id)?, req.version, req.position)
        .await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// PATCH /orders/:id/positions/:position_id: change a line item.
#[tracing::instrument(skip(state, req))]
pub async fn update_position<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, position_id)): Path<(String, String)>,
    Json(req): Json<UpdatePositionRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .service
        .update_position(
            parse_order_id(&id)?,
            req.version,
            parse_position_id(&position_id)?,
            req.patch,
        )
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// DELETE /orders/:id/positions/:position_id?version=N: remove a line item.
#[tracing::instrument(skip(state))]
pub async fn remove_position<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, position_id)): Path<(String, String)>,
    Query(query): Query<VersionQuery>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .service
        .remove_position(
            parse_order_id(&id)?,
            query.version,
            parse_position_id(&position_id)?,
        )
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/:id/transitions: fire a state machine trigger.
#[tracing::instrument(skip(state, req))]
pub async fn transition<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let result = state
        .service
        .transition(parse_order_id(&id)?, req.version, req.trigger)
        .await?;
    Ok(Json(TransitionResponse::from(result)))
}

/// DELETE /orders/:id?version=N: delete an order nobody has joined.
#[tracing::instrument(skip(state))]
pub async fn delete<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(query): Query<VersionQuery>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete(parse_order_id(&id)?, query.version)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID format: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}

fn parse_position_id(id: &str) -> Result<PositionId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid position ID format: {e}")))?;
    Ok(PositionId::from_uuid(uuid))
}
