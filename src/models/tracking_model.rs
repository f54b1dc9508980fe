//! models/tracking_model.rs
//! Eventos de tracking (aperturas de pixel y clicks) y su forma persistida.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tipo de evento observado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Open,
    Click,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::Click => "click",
        }
    }
}

/// Evento inmutable: se crea en cada request al pixel o al link.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingEvent {
    pub recipient_id: String,
    pub origin_address: String,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl TrackingEvent {
    pub fn new(
        recipient_id: impl Into<String>,
        origin_address: impl Into<String>,
        kind: EventKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            origin_address: origin_address.into(),
            kind,
            timestamp,
        }
    }
}

/// Fila leída de `tracking_events` (para el visor de logs).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TrackingEventRecord {
    pub id: i64,
    pub recipient_id: String,
    pub origin_address: String,
    pub event_kind: String,
    pub created_at: String,
}
