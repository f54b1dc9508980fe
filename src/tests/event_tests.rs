//! tests/event_tests.rs
//! Pruebas del log durable de eventos.

#[cfg(test)]
mod tests {
    use sqlx::{Pool, Sqlite};

    use crate::models::tracking_model::{EventKind, TrackingEvent};
    use crate::services::event_service::EventService;
    use crate::tests::support::{at, event_service};

    #[actix_rt::test]
    async fn test_log_and_list_newest_first() {
        let service = event_service().await;

        let first = service
            .log_event(&TrackingEvent::new("ann@x.com", "10.0.0.1", EventKind::Open, at(9, 0, 0)))
            .await
            .unwrap();
        let second = service
            .log_event(&TrackingEvent::new("bob@x.com", "10.0.0.2", EventKind::Click, at(9, 1, 0)))
            .await
            .unwrap();
        assert!(second > first);

        let events = service.list_events(10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].recipient_id, "bob@x.com");
        assert_eq!(events[0].event_kind, "click");
        assert_eq!(events[1].recipient_id, "ann@x.com");
        assert_eq!(events[1].origin_address, "10.0.0.1");
        assert_eq!(events[1].event_kind, "open");
        assert!(events[1].created_at.starts_with("2024-03-15T09:00:00"));

        assert_eq!(service.count_events().await.unwrap(), 2);
    }

    #[actix_rt::test]
    async fn test_list_respects_limit() {
        let service = event_service().await;
        for minute in 0..5 {
            service
                .log_event(&TrackingEvent::new(
                    format!("user{}@x.com", minute),
                    "127.0.0.1",
                    EventKind::Open,
                    at(9, minute, 0),
                ))
                .await
                .unwrap();
        }

        let events = service.list_events(3).await.unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.recipient_id.as_str()).collect();
        assert_eq!(ids, vec!["user4@x.com", "user3@x.com", "user2@x.com"]);
        assert_eq!(service.count_events().await.unwrap(), 5);
    }

    #[actix_rt::test]
    async fn test_events_survive_reconnect_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("tracking.db").display());

        {
            let pool = Pool::<Sqlite>::connect(&url).await.unwrap();
            let service = EventService::new(pool.clone());
            service.run_migrations().await.unwrap();
            service
                .log_event(&TrackingEvent::new("ann@x.com", "10.0.0.1", EventKind::Open, at(9, 0, 0)))
                .await
                .unwrap();
            pool.close().await;
        }

        let pool = Pool::<Sqlite>::connect(&url).await.unwrap();
        let service = EventService::new(pool);
        // Migrar de nuevo no debe duplicar ni borrar nada
        service.run_migrations().await.unwrap();
        let events = service.list_events(10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].recipient_id, "ann@x.com");
    }
}
