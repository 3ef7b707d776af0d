//! Wallet handlers
//!
//! Input validation happens here; the ledger only ever sees user IDs and
//! amounts that are at least 1.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, UserId};

use super::AppState;
use super::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: Amount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub user_id: UserId,
    pub amount: Amount,
}

impl WithdrawRequest {
    fn validate(&self) -> ApiResult<()> {
        if self.user_id < 1 || self.amount < 1 {
            return Err(ApiError::InvalidRequest);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceQuery {
    pub user_id: Option<String>,
}

impl BalanceQuery {
    fn user_id(&self) -> ApiResult<UserId> {
        let raw = match self.user_id.as_deref() {
            None | Some("") => return Err(ApiError::MissingUserId),
            Some(raw) => raw,
        };

        match raw.parse::<UserId>() {
            Ok(user_id) if user_id >= 1 => Ok(user_id),
            _ => Err(ApiError::InvalidUserId),
        }
    }
}

/// Liveness probe
pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::new("ok"))
}

/// POST /api/v1/wallet/withdraw
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(%rejection, "rejected withdraw body");
        ApiError::InvalidRequest
    })?;
    request.validate()?;

    state.ledger.withdraw(request.user_id, request.amount).await?;

    Ok(Json(StatusResponse::new("success")))
}

/// GET /api/v1/wallet/balance?user_id=<id>
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    query: Result<Query<BalanceQuery>, QueryRejection>,
) -> ApiResult<Json<BalanceResponse>> {
    let Query(query) = query.map_err(|_| ApiError::InvalidUserId)?;
    let user_id = query.user_id()?;

    let balance = state.ledger.get_balance(user_id).await?;

    Ok(Json(BalanceResponse { balance }))
}
