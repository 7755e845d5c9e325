pub mod appointment_statuses;
pub mod payment_statuses;
