use std::{sync::Arc, time::Duration};

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use dotenv::dotenv;
use sqlx::{Pool, Sqlite};

use crate::config::tracker_config::{SheetsBackend, TrackerConfig};
use crate::logger::init_logger;
use crate::services::dashboard_service::DashboardService;
use crate::services::dispatch_service::{DispatchContext, Dispatcher};
use crate::services::event_service::EventService;
use crate::services::google_sheets::GoogleSheetsConnector;
use crate::services::sheet_client::{MemorySheetStore, SeedTab, SheetConnector};
use crate::services::status_service::StatusUpdater;
use crate::services::tracking_service::TrackingService;

/// Tiempo máximo para vaciar la cola al apagar
const SUPERVISOR_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

mod app;
mod config;
mod errors;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

async fn setup_database(config: &TrackerConfig) -> Result<Pool<Sqlite>> {
    // Con la base por defecto hay que crear la carpeta "data"
    if config.uses_default_database() {
        std::fs::create_dir_all("data").context("No se pudo crear directorio 'data'")?;
    }

    let options = config
        .database_url
        .parse::<sqlx::sqlite::SqliteConnectOptions>()
        .context("DATABASE_URL inválida")?
        .create_if_missing(true);

    log::info!("Conectando a SQLite en {}", config.database_url);
    let db_pool = Pool::<Sqlite>::connect_with(options)
        .await
        .context("No se pudo conectar a la base de datos SQLite.")?;

    Ok(db_pool)
}

fn load_memory_store(config: &TrackerConfig) -> Result<MemorySheetStore> {
    let Some(path) = &config.memory_seed_path else {
        return Ok(MemorySheetStore::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("No se pudo leer SHEETS_MEMORY_SEED en {:?}", path))?;
    let tabs: Vec<SeedTab> =
        serde_json::from_str(&raw).context("SHEETS_MEMORY_SEED no es un JSON válido")?;
    log::info!("Hojas en memoria: {} pestañas cargadas de {:?}", tabs.len(), path);
    Ok(MemorySheetStore::from_seed(tabs))
}

/// Conector según backend; en modo memoria también devuelve el store para reportarlo al final.
fn build_connector(
    config: &TrackerConfig,
) -> Result<(Arc<dyn SheetConnector>, Option<MemorySheetStore>)> {
    match config.sheets_backend {
        SheetsBackend::Google => {
            if config.google_credentials.is_none() {
                log::warn!("No hay credenciales de Google; las actualizaciones de hoja fallarán");
            }
            Ok((
                Arc::new(GoogleSheetsConnector::new(config.google_credentials.clone())),
                None,
            ))
        }
        SheetsBackend::Memory => {
            log::warn!("SHEETS_BACKEND=memory: las hojas viven solo en este proceso");
            let store = load_memory_store(config)?;
            Ok((Arc::new(store.clone()), Some(store)))
        }
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = TrackerConfig::from_env().context("Configuración inválida")?;

    let db_pool = setup_database(&config).await?;
    let event_service = EventService::new(db_pool.clone());
    event_service.run_migrations().await?;

    let (connector, memory_store) = build_connector(&config)?;
    let status_updater = StatusUpdater::new(connector.clone(), config.timestamp_format.clone());

    let (dispatcher, supervisor) = Dispatcher::start(
        DispatchContext {
            event_service: event_service.clone(),
            status_updater,
        },
        config.dispatch_queue_capacity,
        config.dispatch_workers,
    );

    let tracking_service = TrackingService::new(dispatcher.clone());
    let dashboard_service = DashboardService::new(event_service.clone(), connector)?;

    if let Some(handle) = &config.default_sheet {
        log::info!("/track/{{id}} actualizará la hoja {}", handle);
    }

    // Levantar servidor
    let bind = (config.bind_host.clone(), config.bind_port);
    log::info!("Levantando servidor en {}:{}", bind.0, bind.1);

    let app_config = config.clone();
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_config.clone()))
            .app_data(web::Data::new(tracking_service.clone()))
            .app_data(web::Data::new(dashboard_service.clone()))
            .configure(app::init_app)
    });
    if let Some(workers) = config.http_workers {
        server = server.workers(workers);
    }
    server.bind(bind)?.run().await?;

    // Soltar el último sender para que el supervisor vacíe la cola y termine
    drop(dispatcher);
    match tokio::time::timeout(SUPERVISOR_DRAIN_TIMEOUT, supervisor).await {
        Ok(Ok(stats)) => log::info!("Despachador detenido: {:?}", stats),
        Ok(Err(e)) => log::error!("El supervisor terminó con error: {}", e),
        Err(_) => log::warn!("El despachador no terminó de vaciarse a tiempo"),
    }

    if let Some(store) = memory_store {
        log::info!(
            "Hojas en memoria: {} escrituras en lote, {} filas insertadas",
            store.batch_writes(),
            store.inserted_rows()
        );
    }

    db_pool.close().await;
    Ok(())
}
