use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;
use url::Url;

use crate::{
    domain::{
        repositories::unreconciled_callbacks::UnreconciledCallbackSink,
        value_objects::unreconciled_callbacks::{
            ReportedResult, UnreconciledCallback, UnreconciledReason,
        },
    },
    observability,
};

/// Reports unreconciled callbacks as structured warnings and, when configured, as a
/// Discord alert for whoever reconciles payments by hand.
pub struct UnreconciledCallbackLog {
    alert_webhook_url: Option<Url>,
}

impl UnreconciledCallbackLog {
    pub fn new(alert_webhook_url: Option<Url>) -> Self {
        Self { alert_webhook_url }
    }
}

#[async_trait]
impl UnreconciledCallbackSink for UnreconciledCallbackLog {
    async fn record(&self, event: UnreconciledCallback) -> Result<()> {
        let event_json = serde_json::to_string(&event)?;
        warn!(
            event_id = %event.id,
            checkout_request_id = %event.checkout_request_id,
            reason = ?event.reason,
            event = %event_json,
            "payment_callback: unreconciled callback recorded"
        );

        if let Some(webhook_url) = self.alert_webhook_url.clone() {
            observability::send_discord_webhook(webhook_url, alert_content(&event)).await?;
        }

        Ok(())
    }
}

fn alert_content(event: &UnreconciledCallback) -> String {
    let result = match &event.result {
        ReportedResult::Paid { receipt, amount } => format!(
            "paid, receipt `{}`, amount `{}`",
            receipt.as_deref().unwrap_or("missing"),
            amount
                .map(|amount| amount.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        ),
        ReportedResult::Failed {
            result_code,
            result_desc,
        } => format!(
            "failed, code `{}` ({})",
            result_code,
            result_desc.as_deref().unwrap_or("no description")
        ),
    };
    let reason = match &event.reason {
        UnreconciledReason::NoMatchingPayment => "no payment matches the checkout request".to_string(),
        UnreconciledReason::MissingReceipt => "success reported without a receipt".to_string(),
        UnreconciledReason::PaymentNotPending { payment_id, status } => {
            format!("payment {payment_id} is already {status}")
        }
        UnreconciledReason::StoreFailure(detail) => format!("store failure: {detail}"),
    };

    format!(
        "**Unreconciled M-Pesa callback**\nid: `{}`\nreceived: `{}`\ncheckout: `{}`\nresult: {}\nreason: {}",
        event.id,
        event.received_at.to_rfc3339(),
        event.checkout_request_id,
        result,
        reason
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn alert_names_the_checkout_request_and_receipt() {
        let event = UnreconciledCallback::new(
            "ws_CO_123".to_string(),
            None,
            ReportedResult::Paid {
                receipt: Some("QAX123".to_string()),
                amount: Some(dec!(1200)),
            },
            UnreconciledReason::NoMatchingPayment,
            Utc.with_ymd_and_hms(2025, 3, 14, 6, 30, 0).unwrap(),
        );

        let content = alert_content(&event);

        assert!(content.contains("`ws_CO_123`"));
        assert!(content.contains("receipt `QAX123`"));
        assert!(content.contains("no payment matches"));
    }

    #[test]
    fn alert_names_the_status_of_a_payment_that_already_left_pending() {
        let event = UnreconciledCallback::new(
            "ws_CO_123".to_string(),
            None,
            ReportedResult::Failed {
                result_code: 1032,
                result_desc: Some("Request cancelled by user".to_string()),
            },
            UnreconciledReason::PaymentNotPending {
                payment_id: 42,
                status: PaymentStatus::Cancelled,
            },
            Utc.with_ymd_and_hms(2025, 3, 14, 6, 30, 0).unwrap(),
        );

        let content = alert_content(&event);

        assert!(content.contains("payment 42 is already cancelled"));
        assert!(content.contains("code `1032`"));
    }

    #[tokio::test]
    async fn records_without_an_alert_url() {
        let sink = UnreconciledCallbackLog::new(None);
        let event = UnreconciledCallback::new(
            "ws_CO_9".to_string(),
            None,
            ReportedResult::Failed {
                result_code: 1032,
                result_desc: None,
            },
            UnreconciledReason::NoMatchingPayment,
            Utc::now(),
        );

        assert!(sink.record(event).await.is_ok());
    }
}
