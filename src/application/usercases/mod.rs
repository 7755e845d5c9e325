pub mod payment_callback;
pub mod payment_initiation;
pub mod payments;
