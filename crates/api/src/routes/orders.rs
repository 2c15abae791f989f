//! Order creation and query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use common::{AggregateId, RequestContext};
use domain::{AggregateRoot, CustomerId, Money, Order, OrderLine};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::{AppCore, AppState};

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Option<String>,
    pub currency: String,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_minor: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub customer_id: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderProjection {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub saga_status: String,
    pub total_amount_minor: i64,
    pub currency: String,
    pub failure_reason: Option<String>,
    pub lines: Vec<OrderLineProjection>,
}

#[derive(Serialize)]
pub struct OrderLineProjection {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_minor: i64,
    pub line_total_minor: i64,
}

impl OrderProjection {
    pub(crate) fn from_order(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            customer_id: order.customer_id().to_string(),
            status: order.status().to_string(),
            saga_status: order.saga_status().to_string(),
            total_amount_minor: order.total_amount().minor(),
            currency: order.total_amount().currency().code().to_string(),
            failure_reason: order.failure_reason().map(String::from),
            lines: order
                .lines()
                .iter()
                .map(|line| OrderLineProjection {
                    product_id: line.product_id.to_string(),
                    quantity: line.quantity,
                    unit_price_minor: line.unit_price.minor(),
                    line_total_minor: line.line_total.minor(),
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// POST /orders — create an order and drive its saga to completion.
///
/// Returns 201 with the final projection even when the saga failed; the
/// failure travels in `status`/`failure_reason`.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<S: AppCore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderProjection>), ApiError> {
    let ctx = request_context(&headers);

    let customer_id = match req.customer_id {
        Some(ref id) => CustomerId::from_uuid(parse_uuid(id, "customer_id")?),
        None => CustomerId::new(),
    };

    let currency = req
        .currency
        .parse()
        .map_err(|e: domain::MoneyError| ApiError::BadRequest(e.to_string()))?;

    let lines: Vec<OrderLine> = req
        .lines
        .iter()
        .map(|line| {
            OrderLine::new(
                line.product_id.as_str(),
                line.quantity,
                Money::from_minor(line.unit_price_minor, currency),
            )
        })
        .collect();

    let order = state
        .orchestrator
        .create_order(&ctx, customer_id, lines)
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(OrderProjection::from_order(&order)),
    ))
}

/// GET /orders/:id — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S: AppCore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderProjection>, ApiError> {
    let order_id = AggregateId::from(parse_uuid(&id, "order id")?);
    let order = state
        .orchestrator
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {id} not found")))?;

    Ok(Json(OrderProjection::from_order(&order)))
}

/// GET /orders?customer_id= — list a customer's orders.
#[tracing::instrument(skip(state))]
pub async fn list<S: AppCore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderProjection>>, ApiError> {
    let customer_id = CustomerId::from_uuid(parse_uuid(&query.customer_id, "customer_id")?);
    let orders = state.orchestrator.customer_orders(customer_id).await?;

    Ok(Json(
        orders.iter().map(OrderProjection::from_order).collect(),
    ))
}

/// Builds the request context from inbound headers.
pub(crate) fn request_context(headers: &HeaderMap) -> RequestContext {
    headers
        .get("x-correlation-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .map(RequestContext::with_correlation_id)
        .unwrap_or_default()
}

pub(crate) fn parse_uuid(value: &str, field: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(value)
        .map_err(|e| ApiError::BadRequest(format!("invalid {field}: {e}")))
}
