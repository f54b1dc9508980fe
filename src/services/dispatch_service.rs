//! services/dispatch_service.rs
//! Cola acotada de trabajo en segundo plano con un consumidor dedicado.
//!
//! Los handlers encolan con `try_send` y responden de inmediato. El supervisor
//! ejecuta cada trabajo en un `JoinSet` (concurrencia limitada por semáforo),
//! recoge el resultado y lo registra en logs y contadores.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{mpsc, Semaphore},
    task::{JoinHandle, JoinSet},
};
use uuid::Uuid;

use crate::{
    errors::{DispatchError, UpdateError},
    models::{status_model::SheetHandle, tracking_model::TrackingEvent},
    services::{event_service::EventService, status_service::StatusUpdater},
};

/// Trabajo encolado por un request de tracking.
#[derive(Debug, Clone)]
pub enum TrackingJob {
    LogEvent(TrackingEvent),
    UpdateStatus {
        recipient_id: String,
        handle: SheetHandle,
        observed_at: DateTime<Utc>,
    },
}

impl TrackingJob {
    /// Resultado que se cuenta si el trabajo termina en panic.
    pub(crate) fn failure_outcome(&self) -> JobOutcome {
        match self {
            TrackingJob::LogEvent(_) => JobOutcome::LogFailed,
            TrackingJob::UpdateStatus { .. } => JobOutcome::UpdateFailed,
        }
    }
}

#[derive(Debug)]
struct Envelope {
    job_id: Uuid,
    job: TrackingJob,
}

/// Cómo terminó un trabajo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Logged,
    LogFailed,
    Updated,
    NotFound,
    NotConfigured,
    UpdateFailed,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    logged: AtomicU64,
    log_failed: AtomicU64,
    updated: AtomicU64,
    not_found: AtomicU64,
    not_configured: AtomicU64,
    update_failed: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: JobOutcome) {
        let counter = match outcome {
            JobOutcome::Logged => &self.logged,
            JobOutcome::LogFailed => &self.log_failed,
            JobOutcome::Updated => &self.updated,
            JobOutcome::NotFound => &self.not_found,
            JobOutcome::NotConfigured => &self.not_configured,
            JobOutcome::UpdateFailed => &self.update_failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Foto de los contadores del despachador.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub submitted: u64,
    pub rejected: u64,
    pub logged: u64,
    pub log_failed: u64,
    pub updated: u64,
    pub not_found: u64,
    pub not_configured: u64,
    pub update_failed: u64,
}

impl DispatchStats {
    /// Trabajos que ya terminaron, con cualquier resultado.
    pub fn completed(&self) -> u64 {
        self.logged
            + self.log_failed
            + self.updated
            + self.not_found
            + self.not_configured
            + self.update_failed
    }
}

/// Lo que necesita el supervisor para ejecutar trabajos.
#[derive(Clone)]
pub struct DispatchContext {
    pub event_service: EventService,
    pub status_updater: StatusUpdater,
}

#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Envelope>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Arranca el supervisor. El `JoinHandle` devuelve las estadísticas finales
    /// cuando todos los `Dispatcher` se sueltan y la cola se vacía.
    pub fn start(
        ctx: DispatchContext,
        capacity: usize,
        workers: usize,
    ) -> (Self, JoinHandle<DispatchStats>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let supervisor = tokio::spawn(supervise(ctx, rx, counters.clone(), workers.max(1)));
        (Self { tx, counters }, supervisor)
    }

    /// Encola sin esperar. Un rechazo se cuenta y se devuelve al llamador.
    pub fn submit(&self, job: TrackingJob) -> Result<Uuid, DispatchError> {
        let job_id = Uuid::new_v4();
        match self.tx.try_send(Envelope { job_id, job }) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::SeqCst);
                Ok(job_id)
            }
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::SeqCst);
                Err(match e {
                    mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
                    mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
                })
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        snapshot(&self.counters)
    }
}

fn snapshot(c: &Counters) -> DispatchStats {
    DispatchStats {
        submitted: c.submitted.load(Ordering::SeqCst),
        rejected: c.rejected.load(Ordering::SeqCst),
        logged: c.logged.load(Ordering::SeqCst),
        log_failed: c.log_failed.load(Ordering::SeqCst),
        updated: c.updated.load(Ordering::SeqCst),
        not_found: c.not_found.load(Ordering::SeqCst),
        not_configured: c.not_configured.load(Ordering::SeqCst),
        update_failed: c.update_failed.load(Ordering::SeqCst),
    }
}

async fn supervise(
    ctx: DispatchContext,
    mut rx: mpsc::Receiver<Envelope>,
    counters: Arc<Counters>,
    workers: usize,
) -> DispatchStats {
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut running: JoinSet<JobOutcome> = JoinSet::new();

    log::info!("(dispatcher) Supervisor iniciado con {} workers", workers);

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(envelope) = received else { break };
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => break,
                };
                let ctx = ctx.clone();
                running.spawn(async move {
                    let outcome = guarded_job(ctx, envelope).await;
                    drop(permit);
                    outcome
                });
            }
            Some(joined) = running.join_next(), if !running.is_empty() => {
                reap(&counters, joined);
            }
        }
    }

    // Cola cerrada: esperar lo que sigue en vuelo
    while let Some(joined) = running.join_next().await {
        reap(&counters, joined);
    }

    let stats = snapshot(&counters);
    log::info!("(dispatcher) Supervisor detenido: {:?}", stats);
    stats
}

/// Ejecuta el trabajo en su propia tarea para que un panic se cuente según su tipo.
async fn guarded_job(ctx: DispatchContext, envelope: Envelope) -> JobOutcome {
    let job_id = envelope.job_id;
    let on_panic = envelope.job.failure_outcome();
    match tokio::spawn(run_job(ctx, envelope)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("(dispatcher) [{}] Trabajo terminó con panic: {}", job_id, e);
            on_panic
        }
    }
}

fn reap(counters: &Counters, joined: Result<JobOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => counters.record(outcome),
        // guarded_job no hace panic; solo llega aquí si la tarea fue cancelada
        Err(e) => log::error!("(dispatcher) Tarea del supervisor cancelada: {}", e),
    }
}

async fn run_job(ctx: DispatchContext, envelope: Envelope) -> JobOutcome {
    let job_id = envelope.job_id;
    match envelope.job {
        TrackingJob::LogEvent(event) => match ctx.event_service.log_event(&event).await {
            Ok(id) => {
                log::info!(
                    "(dispatcher) [{}] Evento '{}' de {} desde {} guardado con id={}",
                    job_id,
                    event.kind.as_str(),
                    event.recipient_id,
                    event.origin_address,
                    id
                );
                JobOutcome::Logged
            }
            Err(e) => {
                log::error!("(dispatcher) [{}] Error guardando evento: {:?}", job_id, e);
                JobOutcome::LogFailed
            }
        },
        TrackingJob::UpdateStatus {
            recipient_id,
            handle,
            observed_at,
        } => match ctx
            .status_updater
            .apply_open_event(&recipient_id, &handle, observed_at)
            .await
        {
            Ok(ack) => {
                log::info!(
                    "(dispatcher) [{}] Estado actualizado para {} en {} (fila {}, count={})",
                    job_id,
                    recipient_id,
                    handle,
                    ack.row_number,
                    ack.new_count
                );
                JobOutcome::Updated
            }
            Err(UpdateError::NotFound { .. }) => {
                log::info!(
                    "(dispatcher) [{}] {} no está registrado en {}; sin escritura",
                    job_id,
                    recipient_id,
                    handle
                );
                JobOutcome::NotFound
            }
            Err(e @ UpdateError::NotConfigured(_)) => {
                log::error!(
                    "(dispatcher) [{}] Hoja {} no configurada ({}): {}",
                    job_id,
                    handle,
                    recipient_id,
                    e
                );
                JobOutcome::NotConfigured
            }
            Err(e) => {
                log::error!(
                    "(dispatcher) [{}] Falló la actualización de {} en {}: {:?}",
                    job_id,
                    recipient_id,
                    handle,
                    e
                );
                JobOutcome::UpdateFailed
            }
        },
    }
}
