//! services/tracking_service.rs
//! Núcleo de los endpoints de tracking: despacha efectos y devuelve siempre la misma respuesta.

use chrono::{DateTime, Utc};

use crate::{
    models::{
        status_model::SheetHandle,
        tracking_model::{EventKind, TrackingEvent},
    },
    services::dispatch_service::{Dispatcher, TrackingJob},
};

/// GIF89a de 1x1 transparente (43 bytes).
pub const TRACKING_PIXEL: &[u8; 43] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

pub const CLICK_ACK: &str = "Action logged. You can be redirected.";

#[derive(Clone)]
pub struct TrackingService {
    dispatcher: Dispatcher,
}

impl TrackingService {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Apertura de email. Nunca falla: los errores de encolado solo se registran.
    pub fn handle_pixel(
        &self,
        recipient_id: &str,
        handle: Option<SheetHandle>,
        origin_address: &str,
        now: DateTime<Utc>,
    ) -> &'static [u8] {
        self.dispatch(recipient_id, handle, origin_address, EventKind::Open, now);
        TRACKING_PIXEL
    }

    /// Click en un link. Con `handle` también actualiza la fila de estado.
    pub fn handle_click(
        &self,
        recipient_id: &str,
        handle: Option<SheetHandle>,
        origin_address: &str,
        now: DateTime<Utc>,
    ) -> &'static str {
        self.dispatch(recipient_id, handle, origin_address, EventKind::Click, now);
        CLICK_ACK
    }

    fn dispatch(
        &self,
        recipient_id: &str,
        handle: Option<SheetHandle>,
        origin_address: &str,
        kind: EventKind,
        now: DateTime<Utc>,
    ) {
        let event = TrackingEvent::new(recipient_id, origin_address, kind, now);
        if let Err(e) = self.dispatcher.submit(TrackingJob::LogEvent(event)) {
            log::error!(
                "(tracking) No se pudo encolar el log de '{}' ({}): {}",
                recipient_id,
                kind.as_str(),
                e
            );
        }

        if let Some(handle) = handle {
            let job = TrackingJob::UpdateStatus {
                recipient_id: recipient_id.to_string(),
                handle: handle.clone(),
                observed_at: now,
            };
            if let Err(e) = self.dispatcher.submit(job) {
                log::error!(
                    "(tracking) No se pudo encolar la actualización de '{}' en {}: {}",
                    recipient_id,
                    handle,
                    e
                );
            }
        }
    }
}
