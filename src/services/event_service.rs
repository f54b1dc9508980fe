//! services/event_service.rs
//! Log durable (append-only) de eventos de tracking en SQLite.

use anyhow::{Context, Result};
use sqlx::{Pool, Sqlite};

use crate::models::tracking_model::{TrackingEvent, TrackingEventRecord};

#[derive(Clone, Debug)]
pub struct EventService {
    db_pool: Pool<Sqlite>,
}

impl EventService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        EventService { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Fallo al correr migraciones de 'tracking_events'")?;
        Ok(())
    }

    /// Inserta un evento y devuelve su id.
    pub async fn log_event(&self, event: &TrackingEvent) -> Result<i64> {
        let created_at = event.timestamp.to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO tracking_events (recipient_id, origin_address, event_kind, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&event.recipient_id)
        .bind(&event.origin_address)
        .bind(event.kind.as_str())
        .bind(created_at)
        .execute(&self.db_pool)
        .await
        .with_context(|| {
            format!(
                "Fallo al insertar evento de '{}' desde {}",
                event.recipient_id, event.origin_address
            )
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Últimos `limit` eventos, del más reciente al más antiguo.
    pub async fn list_events(&self, limit: u32) -> Result<Vec<TrackingEventRecord>> {
        let rows = sqlx::query_as::<_, TrackingEventRecord>(
            r#"
            SELECT id, recipient_id, origin_address, event_kind, created_at
            FROM tracking_events
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al listar eventos")?;

        Ok(rows)
    }

    pub async fn count_events(&self) -> Result<i64> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracking_events")
            .fetch_one(&self.db_pool)
            .await
            .context("Fallo al contar eventos")?;
        Ok(total)
    }
}
