//! services/sheet_client.rs
//! Interfaz mínima hacia la hoja de estado (colaborador externo):
//! abrir hoja+pestaña, leer todas las filas, insertar una fila, escribir celdas en lote.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, RwLock,
    },
};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    errors::SheetError,
    models::status_model::{parse_a1_cell, CellWrite, SheetHandle},
};

/// Una pestaña abierta. Cada instancia vive lo que dura una operación.
#[async_trait]
pub trait StatusSheet: Send + Sync {
    /// Todas las filas, en orden. Las filas pueden venir con distinta longitud.
    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>, SheetError>;

    /// Inserta `values` como fila en `position` (1-based); las siguientes bajan una posición.
    async fn insert_row(&self, values: &[String], position: usize) -> Result<(), SheetError>;

    /// Escribe todas las celdas en una sola petición.
    async fn batch_update(&self, writes: &[CellWrite]) -> Result<(), SheetError>;
}

/// Resuelve un `SheetHandle` a una pestaña abierta.
#[async_trait]
pub trait SheetConnector: Send + Sync {
    async fn open(&self, handle: &SheetHandle) -> Result<Box<dyn StatusSheet>, SheetError>;
}

// ========================================================================
// Implementación en memoria
// ========================================================================

/// Pestaña inicial para el backend en memoria (archivo JSON de semillas).
#[derive(Debug, Clone, Deserialize)]
pub struct SeedTab {
    pub sheet: String,
    pub tab: String,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

#[derive(Default, Debug)]
struct MemoryCounters {
    batch_writes: AtomicUsize,
    inserted_rows: AtomicUsize,
}

/// Hojas en memoria del proceso. Clonar comparte el mismo contenido.
#[derive(Clone, Default, Debug)]
pub struct MemorySheetStore {
    tabs: Arc<RwLock<HashMap<SheetHandle, Vec<Vec<String>>>>>,
    counters: Arc<MemoryCounters>,
}

fn poisoned() -> SheetError {
    SheetError::Transport("lock de la hoja en memoria envenenado".to_string())
}

impl MemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crea (o reemplaza) una pestaña con las filas dadas.
    pub fn put_tab<R, C>(&self, handle: &SheetHandle, rows: R)
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(Into::into).collect())
            .collect();
        if let Ok(mut tabs) = self.tabs.write() {
            tabs.insert(handle.clone(), rows);
        }
    }

    pub fn from_seed(tabs: Vec<SeedTab>) -> Self {
        let store = Self::new();
        for seed in tabs {
            store.put_tab(&SheetHandle::new(seed.sheet, seed.tab), seed.rows);
        }
        store
    }

    /// Copia del contenido actual de una pestaña.
    #[cfg(test)]
    pub fn rows(&self, handle: &SheetHandle) -> Option<Vec<Vec<String>>> {
        self.tabs.read().ok()?.get(handle).cloned()
    }

    pub fn batch_writes(&self) -> usize {
        self.counters.batch_writes.load(Ordering::SeqCst)
    }

    pub fn inserted_rows(&self) -> usize {
        self.counters.inserted_rows.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SheetConnector for MemorySheetStore {
    async fn open(&self, handle: &SheetHandle) -> Result<Box<dyn StatusSheet>, SheetError> {
        let exists = self
            .tabs
            .read()
            .map_err(|_| poisoned())?
            .contains_key(handle);
        if !exists {
            return Err(SheetError::NotFound(format!("hoja {}", handle)));
        }
        Ok(Box::new(MemorySheet {
            store: self.clone(),
            handle: handle.clone(),
        }))
    }
}

pub struct MemorySheet {
    store: MemorySheetStore,
    handle: SheetHandle,
}

impl MemorySheet {
    fn with_rows<T>(
        &self,
        f: impl FnOnce(&mut Vec<Vec<String>>) -> Result<T, SheetError>,
    ) -> Result<T, SheetError> {
        let mut tabs = self.store.tabs.write().map_err(|_| poisoned())?;
        let rows = tabs
            .get_mut(&self.handle)
            .ok_or_else(|| SheetError::NotFound(format!("hoja {}", self.handle)))?;
        f(rows)
    }
}

#[async_trait]
impl StatusSheet for MemorySheet {
    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>, SheetError> {
        self.with_rows(|rows| Ok(rows.clone()))
    }

    async fn insert_row(&self, values: &[String], position: usize) -> Result<(), SheetError> {
        self.with_rows(|rows| {
            let idx = position.saturating_sub(1).min(rows.len());
            rows.insert(idx, values.to_vec());
            Ok(())
        })?;
        self.store
            .counters
            .inserted_rows
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn batch_update(&self, writes: &[CellWrite]) -> Result<(), SheetError> {
        // Validar todo antes de tocar nada: el lote se aplica completo o no se aplica.
        let targets = writes
            .iter()
            .map(|w| {
                parse_a1_cell(&w.cell)
                    .map(|(row, col)| (row, col, w.value.clone()))
                    .ok_or_else(|| SheetError::Api {
                        status: 400,
                        message: format!("celda inválida: {}", w.cell),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.with_rows(|rows| {
            for (row, col, value) in targets {
                if rows.len() < row {
                    rows.resize(row, Vec::new());
                }
                let cells = &mut rows[row - 1];
                if cells.len() <= col {
                    cells.resize(col + 1, String::new());
                }
                cells[col] = value;
            }
            Ok(())
        })?;
        self.store
            .counters
            .batch_writes
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
