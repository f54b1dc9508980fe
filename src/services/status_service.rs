//! services/status_service.rs
//! Actualiza la fila de estado de un destinatario a partir de un evento de apertura.
//!
//! Lectura y escritura no son atómicas entre sí: dos eventos simultáneos para el
//! mismo destinatario pueden leer el mismo contador y ambos escribir count+1.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    config::tracker_config::TimestampFormat,
    errors::UpdateError,
    models::status_model::{
        Ack, CellWrite, SheetHandle, StatusRow, COL_EMAIL, COL_FIRST_OPENED, COL_LAST_OPENED,
        COL_OPEN_COUNT, COL_STATUS, OPENED_STATUS, STATUS_HEADER,
    },
    services::sheet_client::SheetConnector,
};

#[derive(Clone)]
pub struct StatusUpdater {
    connector: Arc<dyn SheetConnector>,
    timestamp_format: TimestampFormat,
}

impl StatusUpdater {
    pub fn new(connector: Arc<dyn SheetConnector>, timestamp_format: TimestampFormat) -> Self {
        Self {
            connector,
            timestamp_format,
        }
    }

    /// Registra una apertura de `recipient_id` en la hoja `handle`.
    pub async fn apply_open_event(
        &self,
        recipient_id: &str,
        handle: &SheetHandle,
        now: DateTime<Utc>,
    ) -> Result<Ack, UpdateError> {
        let sheet = self
            .connector
            .open(handle)
            .await
            .map_err(UpdateError::from_sheet)?;

        // 1) Snapshot completo
        let mut rows = sheet
            .read_all_rows()
            .await
            .map_err(UpdateError::from_sheet)?;
        if rows.is_empty() {
            return Err(UpdateError::NotConfigured(format!(
                "la hoja {} no tiene filas",
                handle
            )));
        }

        // 2) Cabecera: si no coincide exactamente, se inserta y se antepone al snapshot
        if !is_status_header(&rows[0]) {
            let header: Vec<String> = STATUS_HEADER.iter().map(|h| h.to_string()).collect();
            log::info!(
                "(apply_open_event) La hoja {} no tiene cabecera esperada; insertando fila 1",
                handle
            );
            sheet
                .insert_row(&header, 1)
                .await
                .map_err(UpdateError::UpdateFailed)?;
            rows.insert(0, header);
        }

        // 3) Primera fila cuyo email coincide
        let (idx, row) = match find_recipient_row(&rows, recipient_id) {
            Some(found) => found,
            None => {
                return Err(UpdateError::NotFound {
                    recipient_id: recipient_id.to_string(),
                })
            }
        };
        let row_number = idx + 1;

        // 4) Nuevos valores
        let new_count = row.open_count() + 1;
        let now_fmt = self.timestamp_format.format(now);
        let first_opened = if row.first_opened().is_empty() {
            now_fmt.clone()
        } else {
            row.first_opened().to_string()
        };

        // 5) Una sola escritura en lote; first_opened se reescribe siempre
        let writes = vec![
            CellWrite::at(row_number, COL_STATUS, OPENED_STATUS),
            CellWrite::at(row_number, COL_OPEN_COUNT, new_count.to_string()),
            CellWrite::at(row_number, COL_FIRST_OPENED, first_opened),
            CellWrite::at(row_number, COL_LAST_OPENED, now_fmt),
        ];
        sheet
            .batch_update(&writes)
            .await
            .map_err(UpdateError::UpdateFailed)?;

        log::info!(
            "(apply_open_event) {} -> fila {} de {}, open_count={}",
            recipient_id,
            row_number,
            handle,
            new_count
        );
        Ok(Ack {
            row_number,
            new_count,
        })
    }
}

pub fn is_status_header(row: &[String]) -> bool {
    row.len() == STATUS_HEADER.len() && row.iter().zip(STATUS_HEADER).all(|(a, b)| a == b)
}

/// Busca después de la cabecera; gana la primera coincidencia.
fn find_recipient_row<'a>(
    rows: &'a [Vec<String>],
    recipient_id: &str,
) -> Option<(usize, StatusRow<'a>)> {
    rows.iter()
        .enumerate()
        .skip(1)
        .find(|(_, cells)| cells.get(COL_EMAIL).map(String::as_str) == Some(recipient_id))
        .map(|(idx, cells)| (idx, StatusRow::new(cells)))
}
