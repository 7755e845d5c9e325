use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use crate::infrastructure::postgres::schema::payments;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments, primary_key(payment_id))]
pub struct PaymentEntity {
    pub payment_id: i32,
    pub appointment_id: i32,
    pub amount: Decimal,
    pub payment_status: String,
    pub user_id: Option<i32>,
    pub transaction_id: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub appointment_id: i32,
    pub amount: Decimal,
    pub payment_status: String,
    pub user_id: Option<i32>,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Applied when a success callback settles a pending payment.
/// `amount` is left untouched when the gateway did not report one.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = payments)]
pub struct SettlePaymentEntity {
    pub payment_status: String,
    pub transaction_id: String,
    pub amount: Option<Decimal>,
    pub payment_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = payments)]
pub struct FailPaymentEntity {
    pub payment_status: String,
    pub updated_at: DateTime<Utc>,
}
