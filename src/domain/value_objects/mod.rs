pub mod correlation_token;
pub mod enums;
pub mod mpesa;
pub mod payment_errors;
pub mod payments;
pub mod unreconciled_callbacks;
