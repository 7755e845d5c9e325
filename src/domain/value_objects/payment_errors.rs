use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("invalid payment request: {0}")]
    Validation(String),
    #[error("payment gateway rejected credentials (status {status})")]
    GatewayAuth { status: u16 },
    #[error("STK push failed: {status} - {body}")]
    GatewayRequest { status: u16, body: String },
    #[error("unexpected payment gateway response: {0}")]
    GatewayProtocol(String),
    #[error("payment gateway unreachable: {0}")]
    GatewayUnavailable(String),
    #[error("invalid callback payload: {0}")]
    CallbackValidation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("payment store failure")]
    Persistence(#[source] anyhow::Error),
}

impl PaymentError {
    pub fn validation(message: impl Into<String>) -> Self {
        PaymentError::Validation(message.into())
    }

    /// Errors that surface to the caller before any outbound request was made.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PaymentError::Validation(_)
                | PaymentError::CallbackValidation(_)
                | PaymentError::NotFound(_)
        )
    }
}

pub type PaymentResult<T> = std::result::Result<T, PaymentError>;
