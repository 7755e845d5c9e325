use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::{
    domain::{
        entities::payments::{
            FailPaymentEntity, InsertPaymentEntity, PaymentEntity, SettlePaymentEntity,
        },
        repositories::payments::PaymentRepository,
        value_objects::{
            correlation_token::CorrelationToken,
            enums::{appointment_statuses::AppointmentStatus, payment_statuses::PaymentStatus},
        },
    },
    infrastructure::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{appointments, payments},
    },
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn insert_pending(&self, payment: InsertPaymentEntity) -> Result<i32> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment_id = insert_into(payments::table)
            .values(&payment)
            .returning(payments::payment_id)
            .get_result::<i32>(&mut conn)?;

        Ok(payment_id)
    }

    async fn settle_pending(
        &self,
        token: CorrelationToken,
        changeset: SettlePaymentEntity,
    ) -> Result<Option<PaymentEntity>> {
        let Some(checkout_request_id) = token.pending_checkout_request() else {
            return Ok(None);
        };
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Duplicate pending ids are not prevented; like the UPDATE itself, every match is
        // settled and the first returned row drives the appointment update.
        let updated = update(
            payments::table
                .filter(payments::transaction_id.eq(checkout_request_id))
                .filter(payments::payment_status.eq(PaymentStatus::Pending.to_string())),
        )
        .set(&changeset)
        .returning(PaymentEntity::as_returning())
        .get_results::<PaymentEntity>(&mut conn)?;

        Ok(updated.into_iter().next())
    }

    async fn fail_pending(
        &self,
        token: CorrelationToken,
        changeset: FailPaymentEntity,
    ) -> Result<Vec<i32>> {
        let Some(checkout_request_id) = token.pending_checkout_request() else {
            return Ok(Vec::new());
        };
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let failed = update(
            payments::table
                .filter(payments::transaction_id.eq(checkout_request_id))
                .filter(payments::payment_status.eq(PaymentStatus::Pending.to_string())),
        )
        .set(&changeset)
        .returning(payments::payment_id)
        .get_results::<i32>(&mut conn)?;

        Ok(failed)
    }

    async fn update_appointment_status(
        &self,
        appointment_id: i32,
        status: AppointmentStatus,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(appointments::table.filter(appointments::appointment_id.eq(appointment_id)))
            .set((
                appointments::appointment_status.eq(status.to_string()),
                appointments::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn find_by_transaction_id(&self, transaction_id: String) -> Result<Vec<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = payments::table
            .filter(payments::transaction_id.eq(&transaction_id))
            .select(PaymentEntity::as_select())
            .load::<PaymentEntity>(&mut conn)?;

        Ok(results)
    }

    async fn find_by_id(&self, payment_id: i32) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment = payments::table
            .filter(payments::payment_id.eq(payment_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(payment)
    }

    async fn list_by_appointment(&self, appointment_id: i32) -> Result<Vec<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = payments::table
            .filter(payments::appointment_id.eq(appointment_id))
            .order(payments::created_at.desc())
            .select(PaymentEntity::as_select())
            .load::<PaymentEntity>(&mut conn)?;

        Ok(results)
    }

    async fn list_all(&self) -> Result<Vec<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = payments::table
            .order(payments::created_at.desc())
            .select(PaymentEntity::as_select())
            .load::<PaymentEntity>(&mut conn)?;

        Ok(results)
    }
}
