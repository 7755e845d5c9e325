use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::domain::value_objects::payment_errors::PaymentError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    /// Same text as `message`; browser clients read this key.
    pub error: String,
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::Validation(_) | PaymentError::CallbackValidation(_) => {
                StatusCode::BAD_REQUEST
            }
            PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::GatewayAuth { .. }
            | PaymentError::GatewayRequest { .. }
            | PaymentError::GatewayProtocol(_)
            | PaymentError::GatewayUnavailable(_)
            | PaymentError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_client_error() {
            warn!(status = %status, error = %self, "http: request rejected");
        } else {
            error!(status = %status, error = ?self, "http: request failed");
        }

        let message = match &self {
            // Don't leak store details to the client
            PaymentError::Persistence(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            error: message.clone(),
            message,
        });

        (status, body).into_response()
    }
}
