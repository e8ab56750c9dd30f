pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{BookingDetail, BookingStatus};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingEvent {
    pub kind: &'static str,
    pub booking_id: i64,
    pub service_id: i64,
    pub provider_id: i64,
    pub booked_by: i64,
    pub status: BookingStatus,
}

impl BookingEvent {
    pub fn new(kind: &'static str, detail: &BookingDetail) -> Self {
        Self {
            kind,
            booking_id: detail.booking.id,
            service_id: detail.service.id,
            provider_id: detail.provider.id,
            booked_by: detail.booking.booked_by,
            status: detail.booking.status,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()>;
}

pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
        tracing::debug!(kind = event.kind, booking_id = event.booking_id, "notification skipped");
        Ok(())
    }
}

pub async fn dispatch(notifier: &dyn Notifier, event: BookingEvent) {
    if let Err(e) = notifier.notify(&event).await {
        tracing::error!(error = %e, kind = event.kind, booking_id = event.booking_id, "failed to deliver booking notification");
    }
}
