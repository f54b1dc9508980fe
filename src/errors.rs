//! errors.rs
//! Errores tipados de las rutas con lógica de decisión (hoja de estado y despacho).
//! El resto del servicio usa `anyhow` con `.context(...)`.

use thiserror::Error;

/// Fallos del cliente de hojas de cálculo (colaborador externo).
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("credenciales inválidas o ausentes: {0}")]
    Credentials(String),

    #[error("autenticación rechazada: {0}")]
    Auth(String),

    #[error("no encontrado: {0}")]
    NotFound(String),

    #[error("error de transporte: {0}")]
    Transport(String),

    #[error("la API respondió {status}: {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for SheetError {
    fn from(e: reqwest::Error) -> Self {
        SheetError::Transport(e.to_string())
    }
}

/// Resultado no exitoso de `StatusUpdater::apply_open_event`.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// La hoja no tiene filas, no existe o las credenciales no sirven.
    #[error("hoja no configurada: {0}")]
    NotConfigured(String),

    /// El destinatario no está pre-registrado. Es un resultado normal.
    #[error("destinatario '{recipient_id}' no encontrado en la hoja")]
    NotFound { recipient_id: String },

    #[error("fallo al actualizar la hoja: {0}")]
    UpdateFailed(#[source] SheetError),
}

impl UpdateError {
    /// Clasifica un fallo del colaborador según el paso donde ocurrió.
    pub fn from_sheet(err: SheetError) -> Self {
        match err {
            SheetError::Credentials(_) | SheetError::Auth(_) | SheetError::NotFound(_) => {
                UpdateError::NotConfigured(err.to_string())
            }
            other => UpdateError::UpdateFailed(other),
        }
    }
}

/// Fallos al encolar trabajo en segundo plano.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("la cola de despacho está llena")]
    QueueFull,

    #[error("la cola de despacho está cerrada")]
    Closed,
}
