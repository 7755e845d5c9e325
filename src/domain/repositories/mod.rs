pub mod payments;
pub mod unreconciled_callbacks;
