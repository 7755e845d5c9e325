pub mod axum_http;
pub mod mpesa;
pub mod postgres;
pub mod unreconciled_callbacks;
