pub mod mpesa_client;
pub mod request_signer;
