use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures raised by the spreadsheet store.
///
/// Every variant is terminal for the request that triggered it; callers do
/// not retry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("spreadsheet read error: {0}")]
    Read(#[from] calamine::XlsxError),

    #[error("spreadsheet write error: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("no worksheets in spreadsheet")]
    NoSheets,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not replace spreadsheet: {0}")]
    Replace(#[from] tempfile::PersistError),
}

/// Request-level error taxonomy, mapped onto HTTP statuses.
///
/// Messages are literal strings surfaced to the caller as
/// `{"message": "..."}`; there is no structured error code scheme.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("barcode already exists")]
    DuplicateBarcode,

    #[error("product not found")]
    NotFound,

    #[error("no authorization")]
    MissingToken,

    #[error("invalid token")]
    InvalidToken,

    /// Token was valid but its subject is not the administrator.
    #[error("no authorization")]
    Forbidden,

    #[error("wrong username or password")]
    WrongCredentials,

    /// Password hashing or token signing infrastructure failed.
    #[error("authentication error")]
    Auth,

    #[error("internal error")]
    Store(#[from] StoreError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateBarcode => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MissingToken | AppError::InvalidToken | AppError::WrongCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Auth | AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Store(cause) = &self {
            tracing::error!("store failure: {cause}");
        }

        (self.status(), Json(json!({ "message": self.to_string() }))).into_response()
    }
}
