//! Watched-address registry routes.

use alloy::primitives::Address;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use sentinel_common::error::AppError;
use sentinel_common::types::WatchedAddress;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/addresses", get(list_addresses).post(add_address))
        .route("/api/addresses/{address}", get(get_address))
}

#[derive(Debug, Deserialize)]
pub struct AddAddressRequest {
    pub address: String,
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddAddressResponse {
    pub address: Address,
    pub label: String,
    pub added: bool,
}

/// GET /api/addresses — Every watched address with its label.
async fn list_addresses(State(state): State<AppState>) -> Json<Vec<WatchedAddress>> {
    Json(state.watch.entries())
}

/// GET /api/addresses/:address
async fn get_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<WatchedAddress>, AppError> {
    let address = parse_address(&address)?;
    if !state.watch.is_watched(&address) {
        return Err(AppError::NotFound(format!("{address} is not watched")));
    }
    Ok(Json(WatchedAddress {
        address,
        label: state.watch.label(&address),
    }))
}

/// POST /api/addresses — Start watching an address.
///
/// Live log filters are built at startup, so a new address is picked up by
/// relevance checks and native scanning immediately but only joins the
/// subscription filters after a restart.
async fn add_address(
    State(state): State<AppState>,
    Json(req): Json<AddAddressRequest>,
) -> Result<(StatusCode, Json<AddAddressResponse>), AppError> {
    let address = parse_address(&req.address)?;
    let label = req
        .label
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());
    let added = state.watch.insert(address, label);

    if added {
        tracing::info!(address = %address, label = ?label, "Watched address added");
    }
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(AddAddressResponse {
            address,
            label: state.watch.label(&address),
            added,
        }),
    ))
}

fn parse_address(raw: &str) -> Result<Address, AppError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|_| AppError::Validation(format!("invalid address: {raw}")))
}
