//! tests/support.rs
//! Helpers compartidos: base en memoria, hojas en memoria, espera del despachador.

use std::{sync::Arc, time::Duration};

use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    web, App,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::{
    app,
    config::tracker_config::{SheetsBackend, TimestampFormat, TrackerConfig},
    errors::SheetError,
    logger::init_test_logger,
    models::status_model::{CellWrite, SheetHandle, STATUS_HEADER},
    services::{
        dashboard_service::DashboardService,
        dispatch_service::{DispatchContext, DispatchStats, Dispatcher},
        event_service::EventService,
        sheet_client::{MemorySheetStore, SheetConnector, StatusSheet},
        status_service::StatusUpdater,
        tracking_service::TrackingService,
    },
};

pub fn handle() -> SheetHandle {
    SheetHandle::new("Campaign", "Recipients")
}

pub fn header_row() -> Vec<String> {
    STATUS_HEADER.iter().map(|h| h.to_string()).collect()
}

pub fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

/// Hoja con cabecera y la fila de Ann sin aperturas.
pub fn ann_store() -> MemorySheetStore {
    let store = MemorySheetStore::new();
    store.put_tab(
        &handle(),
        vec![
            header_row(),
            row(&["Ann", "ann@x.com", "sent", "", "", "", "", ""]),
        ],
    );
    store
}

pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, h, m, s)
        .single()
        .expect("fecha válida")
}

pub fn updater(store: &MemorySheetStore) -> StatusUpdater {
    StatusUpdater::new(Arc::new(store.clone()), TimestampFormat::default())
}

/// Pool SQLite en memoria con una sola conexión (cada conexión sería otra base).
pub async fn memory_pool() -> Pool<Sqlite> {
    init_test_logger();
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("pool en memoria")
}

pub async fn event_service() -> EventService {
    let service = EventService::new(memory_pool().await);
    service.run_migrations().await.expect("migraciones");
    service
}

pub async fn start_dispatcher(
    store: &MemorySheetStore,
    capacity: usize,
    workers: usize,
) -> (
    Dispatcher,
    tokio::task::JoinHandle<DispatchStats>,
    EventService,
) {
    let events = event_service().await;
    let ctx = DispatchContext {
        event_service: events.clone(),
        status_updater: updater(store),
    };
    let (dispatcher, supervisor) = Dispatcher::start(ctx, capacity, workers);
    (dispatcher, supervisor, events)
}

/// Espera hasta que `completed` trabajos hayan terminado (o 5 s).
pub async fn wait_completed(dispatcher: &Dispatcher, completed: u64) -> DispatchStats {
    for _ in 0..500 {
        let stats = dispatcher.stats();
        if stats.completed() >= completed {
            return stats;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "el despachador no completó {} trabajos: {:?}",
        completed,
        dispatcher.stats()
    );
}

/// Conector cuya hoja falla al escribir.
pub struct FailingWriteConnector {
    pub rows: Vec<Vec<String>>,
}

struct FailingWriteSheet {
    rows: Vec<Vec<String>>,
}

#[async_trait]
impl SheetConnector for FailingWriteConnector {
    async fn open(&self, _handle: &SheetHandle) -> Result<Box<dyn StatusSheet>, SheetError> {
        Ok(Box::new(FailingWriteSheet {
            rows: self.rows.clone(),
        }))
    }
}

#[async_trait]
impl StatusSheet for FailingWriteSheet {
    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>, SheetError> {
        Ok(self.rows.clone())
    }

    async fn insert_row(&self, _values: &[String], _position: usize) -> Result<(), SheetError> {
        Err(SheetError::Transport("connection reset".to_string()))
    }

    async fn batch_update(&self, _writes: &[CellWrite]) -> Result<(), SheetError> {
        Err(SheetError::Transport("connection reset".to_string()))
    }
}

/// Conector que rechaza las credenciales.
pub struct UnauthorizedConnector;

#[async_trait]
impl SheetConnector for UnauthorizedConnector {
    async fn open(&self, _handle: &SheetHandle) -> Result<Box<dyn StatusSheet>, SheetError> {
        Err(SheetError::Auth("invalid_grant".to_string()))
    }
}

/// Todo lo que necesita la app HTTP, montado sobre hojas y base en memoria.
pub struct TestStack {
    pub store: MemorySheetStore,
    pub events: EventService,
    pub dispatcher: Dispatcher,
    pub config: TrackerConfig,
    pub tracking: TrackingService,
    pub dashboard: DashboardService,
}

pub async fn test_stack(default_sheet: Option<SheetHandle>) -> TestStack {
    let store = ann_store();
    let (dispatcher, _supervisor, events) = start_dispatcher(&store, 64, 2).await;
    let config = TrackerConfig {
        default_sheet,
        sheets_backend: SheetsBackend::Memory,
        ..TrackerConfig::default()
    };
    let dashboard = DashboardService::new(events.clone(), Arc::new(store.clone()))
        .expect("templates válidos");

    TestStack {
        tracking: TrackingService::new(dispatcher.clone()),
        store,
        events,
        dispatcher,
        config,
        dashboard,
    }
}

impl TestStack {
    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Response = ServiceResponse<impl MessageBody>,
            Config = (),
            InitError = (),
            Error = actix_web::Error,
        >,
    > {
        App::new()
            .app_data(web::Data::new(self.config.clone()))
            .app_data(web::Data::new(self.tracking.clone()))
            .app_data(web::Data::new(self.dashboard.clone()))
            .configure(app::init_app)
    }
}
