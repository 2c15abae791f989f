//! Procurement workflow endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AggregateRoot, BidId, BuyerId, Money, Procurement, Quantity, VendorId};
use procurement::{CreateProcurement, SubmitBid};
use serde::{Deserialize, Serialize};
use store::ProcurementFilter;

use crate::error::ApiError;
use crate::routes::orders::{parse_uuid, request_context};
use crate::state::{AppCore, AppState};

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProcurementRequest {
    pub title: String,
    pub description: String,
    pub quantity_amount: u32,
    pub quantity_unit: String,
    pub budget_minor: i64,
    pub currency: String,
    pub deadline: DateTime<Utc>,
    pub buyer_id: String,
}

#[derive(Deserialize)]
pub struct SubmitBidRequest {
    pub vendor_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct AwardRequest {
    pub bid_id: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListProcurementsQuery {
    pub status: Option<String>,
    pub buyer_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProcurementProjection {
    pub id: String,
    pub title: String,
    pub description: String,
    pub quantity_amount: u32,
    pub quantity_unit: String,
    pub budget_minor: i64,
    pub currency: String,
    pub deadline: DateTime<Utc>,
    pub buyer_id: String,
    pub status: String,
    pub awarded_bid_id: Option<String>,
    pub bids: Vec<BidProjection>,
}

#[derive(Serialize)]
pub struct BidProjection {
    pub id: String,
    pub vendor_id: String,
    pub amount_minor: i64,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl ProcurementProjection {
    pub(crate) fn from_procurement(p: &Procurement) -> Self {
        Self {
            id: p.id().to_string(),
            title: p.title().to_string(),
            description: p.description().to_string(),
            quantity_amount: p.quantity().amount(),
            quantity_unit: p.quantity().unit().symbol().to_string(),
            budget_minor: p.budget().minor(),
            currency: p.budget().currency().code().to_string(),
            deadline: p.deadline(),
            buyer_id: p.buyer_id().to_string(),
            status: p.status().to_string(),
            awarded_bid_id: p.awarded_bid_id().map(|id| id.to_string()),
            bids: p
                .bids()
                .iter()
                .map(|bid| BidProjection {
                    id: bid.id().to_string(),
                    vendor_id: bid.vendor_id().to_string(),
                    amount_minor: bid.amount().minor(),
                    status: bid.status().to_string(),
                    submitted_at: bid.submitted_at(),
                    notes: bid.notes().map(String::from),
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// POST /procurements — create a draft procurement.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<S: AppCore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<CreateProcurementRequest>,
) -> Result<(axum::http::StatusCode, Json<ProcurementProjection>), ApiError> {
    let ctx = request_context(&headers);

    let unit = req
        .quantity_unit
        .parse()
        .map_err(ApiError::BadRequest)?;
    let quantity = Quantity::new(req.quantity_amount, unit)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let currency = req
        .currency
        .parse()
        .map_err(|e: domain::MoneyError| ApiError::BadRequest(e.to_string()))?;

    let procurement = state
        .procurements
        .create_procurement(
            &ctx,
            CreateProcurement {
                title: req.title,
                description: req.description,
                quantity,
                budget: Money::from_minor(req.budget_minor, currency),
                deadline: req.deadline,
                buyer_id: BuyerId::new(req.buyer_id),
            },
        )
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(ProcurementProjection::from_procurement(&procurement)),
    ))
}

/// GET /procurements/:id — load a procurement with its bids.
#[tracing::instrument(skip(state))]
pub async fn get<S: AppCore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProcurementProjection>, ApiError> {
    let procurement_id = AggregateId::from(parse_uuid(&id, "procurement id")?);
    let procurement = state
        .procurements
        .get_procurement(procurement_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("procurement {id} not found")))?;

    Ok(Json(ProcurementProjection::from_procurement(&procurement)))
}

/// GET /procurements — list procurements, optionally filtered.
#[tracing::instrument(skip(state))]
pub async fn list<S: AppCore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListProcurementsQuery>,
) -> Result<Json<Vec<ProcurementProjection>>, ApiError> {
    let mut filter = ProcurementFilter::new();
    if let Some(ref status) = query.status {
        let status = status
            .parse()
            .map_err(ApiError::BadRequest)?;
        filter = filter.with_status(status);
    }
    if let Some(ref buyer_id) = query.buyer_id {
        filter = filter.with_buyer(BuyerId::new(buyer_id.as_str()));
    }

    let procurements = state.procurements.list_procurements(&filter).await?;
    Ok(Json(
        procurements
            .iter()
            .map(ProcurementProjection::from_procurement)
            .collect(),
    ))
}

/// POST /procurements/:id/publish — publish and open bidding.
#[tracing::instrument(skip(state, headers))]
pub async fn publish<S: AppCore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ProcurementProjection>, ApiError> {
    let ctx = request_context(&headers);
    let procurement_id = AggregateId::from(parse_uuid(&id, "procurement id")?);

    let procurement = state
        .procurements
        .publish_procurement(&ctx, procurement_id)
        .await?;
    Ok(Json(ProcurementProjection::from_procurement(&procurement)))
}

/// POST /procurements/:id/bids — submit a bid.
#[tracing::instrument(skip(state, headers, req))]
pub async fn submit_bid<S: AppCore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<SubmitBidRequest>,
) -> Result<(axum::http::StatusCode, Json<ProcurementProjection>), ApiError> {
    let ctx = request_context(&headers);
    let procurement_id = AggregateId::from(parse_uuid(&id, "procurement id")?);
    let currency = req
        .currency
        .parse()
        .map_err(|e: domain::MoneyError| ApiError::BadRequest(e.to_string()))?;

    let procurement = state
        .procurements
        .submit_bid(
            &ctx,
            SubmitBid {
                procurement_id,
                vendor_id: VendorId::new(req.vendor_id),
                amount: Money::from_minor(req.amount_minor, currency),
                notes: req.notes,
            },
        )
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(ProcurementProjection::from_procurement(&procurement)),
    ))
}

/// POST /procurements/:id/close-bidding — close bidding.
#[tracing::instrument(skip(state, headers))]
pub async fn close_bidding<S: AppCore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ProcurementProjection>, ApiError> {
    let ctx = request_context(&headers);
    let procurement_id = AggregateId::from(parse_uuid(&id, "procurement id")?);

    let procurement = state.procurements.close_bidding(&ctx, procurement_id).await?;
    Ok(Json(ProcurementProjection::from_procurement(&procurement)))
}

/// POST /procurements/:id/award — award the procurement to a bid.
#[tracing::instrument(skip(state, headers, req))]
pub async fn award<S: AppCore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<AwardRequest>,
) -> Result<Json<ProcurementProjection>, ApiError> {
    let ctx = request_context(&headers);
    let procurement_id = AggregateId::from(parse_uuid(&id, "procurement id")?);
    let bid_id = BidId::from_uuid(parse_uuid(&req.bid_id, "bid_id")?);

    let procurement = state
        .procurements
        .award_procurement(&ctx, procurement_id, bid_id)
        .await?;
    Ok(Json(ProcurementProjection::from_procurement(&procurement)))
}

/// POST /procurements/:id/cancel — cancel the procurement.
#[tracing::instrument(skip(state, headers))]
pub async fn cancel<S: AppCore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ProcurementProjection>, ApiError> {
    let ctx = request_context(&headers);
    let procurement_id = AggregateId::from(parse_uuid(&id, "procurement id")?);

    let procurement = state
        .procurements
        .cancel_procurement(&ctx, procurement_id)
        .await?;
    Ok(Json(ProcurementProjection::from_procurement(&procurement)))
}
