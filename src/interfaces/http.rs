//! JSON over HTTP front end for [`LedgerService`].
//!
//! Every route is a `POST` with a JSON body. Failures are reported as
//! `{"err": "<message>"}` with a status code matching the error class.

use crate::application::ledger::LedgerService;
use crate::domain::account::{Account, AccountId};
use crate::domain::money::{Currency, Money};
use crate::domain::payment::{AccountPayment, PaymentId};
use crate::error::LedgerError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Builds the ledger router with all routes bound to `ledger`.
pub fn router(ledger: Arc<LedgerService>) -> Router {
    Router::new()
        .route("/account/create", post(create_account))
        .route("/account/get", post(get_account))
        .route("/account/list", post(get_accounts))
        .route("/transfer", post(transfer))
        .route("/payment/list", post(get_payments))
        .with_state(ledger)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub err: String,
}

/// A [`LedgerError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            LedgerError::BadAccountId
            | LedgerError::IncompatibleCurrency
            | LedgerError::InsufficientFunds
            | LedgerError::BadTransferTarget
            | LedgerError::InvalidAmount => StatusCode::BAD_REQUEST,
            LedgerError::AccountDoesNotExist => StatusCode::NOT_FOUND,
            LedgerError::AccountAlreadyExists => StatusCode::CONFLICT,
            LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Display of `Internal` is opaque, so the storage cause never reaches the client.
        let body = ErrorResponse {
            err: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Success body without payload, serialized as `{}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EmptyResponse {}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub id: AccountId,
    pub balance: Money,
    pub currency: Currency,
}

#[derive(Debug, Deserialize)]
pub struct GetAccountRequest {
    pub id: AccountId,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Money,
    pub currency: Currency,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferResponse {
    pub payment_id: PaymentId,
}

#[derive(Debug, Deserialize)]
pub struct GetAccountsRequest {
    pub currency: Currency,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetAccountsResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<AccountId>,
}

#[derive(Debug, Deserialize)]
pub struct GetPaymentsRequest {
    pub account_id: AccountId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentView {
    pub id: PaymentId,
    pub time: DateTime<Utc>,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Money,
    pub currency: Currency,
    pub outgoing: bool,
}

impl From<AccountPayment> for PaymentView {
    fn from(entry: AccountPayment) -> Self {
        let payment = entry.payment;
        Self {
            id: payment.id,
            time: payment.time,
            from: payment.from,
            to: payment.to,
            amount: payment.amount,
            currency: payment.currency,
            outgoing: entry.outgoing,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetPaymentsResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payments: Vec<PaymentView>,
}

async fn create_account(
    State(ledger): State<Arc<LedgerService>>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<EmptyResponse> {
    ledger
        .create_account(req.id, req.balance, req.currency)
        .await?;
    Ok(Json(EmptyResponse {}))
}

async fn get_account(
    State(ledger): State<Arc<LedgerService>>,
    Json(req): Json<GetAccountRequest>,
) -> ApiResult<Account> {
    Ok(Json(ledger.get_account(&req.id).await?))
}

async fn transfer(
    State(ledger): State<Arc<LedgerService>>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<TransferResponse> {
    let payment_id = ledger
        .transfer(&req.from, &req.to, req.amount, &req.currency)
        .await?;
    Ok(Json(TransferResponse { payment_id }))
}

async fn get_accounts(
    State(ledger): State<Arc<LedgerService>>,
    Json(req): Json<GetAccountsRequest>,
) -> ApiResult<GetAccountsResponse> {
    let accounts = ledger.get_accounts(&req.currency).await?;
    Ok(Json(GetAccountsResponse { accounts }))
}

async fn get_payments(
    State(ledger): State<Arc<LedgerService>>,
    Json(req): Json<GetPaymentsRequest>,
) -> ApiResult<GetPaymentsResponse> {
    let payments = ledger.get_payments(&req.account_id).await?;
    Ok(Json(GetPaymentsResponse {
        payments: payments.into_iter().map(PaymentView::from).collect(),
    }))
}
