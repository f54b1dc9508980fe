//! config/tracker_config.rs
//! Configuración del servicio, leída del entorno (y de `.env` vía dotenv).

use std::{env, fs, path::PathBuf, str::FromStr};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{
    format::{Item, StrftimeItems},
    DateTime, Utc,
};
use chrono_tz::Tz;

use crate::models::status_model::SheetHandle;

const DEFAULT_DATABASE_URL: &str = "sqlite:data/tracking.db";
const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Backend de hojas de cálculo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetsBackend {
    Google,
    /// Hojas en memoria del proceso, para desarrollo local sin credenciales.
    Memory,
}

impl FromStr for SheetsBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(SheetsBackend::Google),
            "memory" => Ok(SheetsBackend::Memory),
            other => Err(anyhow!("SHEETS_BACKEND desconocido: {}", other)),
        }
    }
}

/// Zona horaria + patrón con el que se escriben los timestamps en la hoja.
#[derive(Debug, Clone)]
pub struct TimestampFormat {
    pub tz: Tz,
    pub pattern: String,
}

impl TimestampFormat {
    pub fn new(tz: Tz, pattern: impl Into<String>) -> Self {
        Self {
            tz,
            pattern: pattern.into(),
        }
    }

    /// Como `new`, pero rechaza patrones strftime inválidos (chrono hace panic al formatearlos).
    pub fn checked(tz: Tz, pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        validate_timestamp_pattern(&pattern)?;
        Ok(Self::new(tz, pattern))
    }

    pub fn format(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.tz)
            .format(&self.pattern)
            .to_string()
    }
}

impl Default for TimestampFormat {
    fn default() -> Self {
        Self::new(chrono_tz::UTC, DEFAULT_TIMESTAMP_FORMAT)
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub database_url: String,
    pub bind_host: String,
    pub bind_port: u16,
    pub http_workers: Option<usize>,
    pub timestamp_format: TimestampFormat,
    pub sheets_backend: SheetsBackend,
    /// JSON de la service account de Google, ya decodificado.
    pub google_credentials: Option<String>,
    pub default_sheet: Option<SheetHandle>,
    /// JSON con las pestañas iniciales cuando `sheets_backend` es `Memory`.
    pub memory_seed_path: Option<PathBuf>,
    pub dispatch_queue_capacity: usize,
    pub dispatch_workers: usize,
    /// Hosts a los que `?to=` puede redirigir. Vacío: nunca se redirige.
    pub redirect_allowed_hosts: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_host: "0.0.0.0".to_string(),
            bind_port: 5000,
            http_workers: None,
            timestamp_format: TimestampFormat::default(),
            sheets_backend: SheetsBackend::Google,
            google_credentials: None,
            default_sheet: None,
            memory_seed_path: None,
            dispatch_queue_capacity: 1024,
            dispatch_workers: 4,
            redirect_allowed_hosts: Vec::new(),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("Valor inválido para {}: {} ({})", key, raw, e)),
        None => Ok(None),
    }
}

impl TrackerConfig {
    /// Lee la configuración del entorno. Se espera que `dotenv()` ya se haya llamado.
    pub fn from_env() -> Result<Self> {
        let defaults = TrackerConfig::default();

        let tz = match optional_env("TRACKER_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow!("TRACKER_TIMEZONE inválida '{}': {}", name, e))?,
            None => chrono_tz::UTC,
        };
        let pattern = optional_env("TIMESTAMP_FORMAT")
            .unwrap_or_else(|| DEFAULT_TIMESTAMP_FORMAT.to_string());
        let timestamp_format = TimestampFormat::checked(tz, pattern)?;

        let default_sheet = match (optional_env("DEFAULT_SHEET_NAME"), optional_env("DEFAULT_TAB_NAME")) {
            (Some(sheet), Some(tab)) => Some(SheetHandle::new(sheet, tab)),
            (None, None) => None,
            _ => bail!("DEFAULT_SHEET_NAME y DEFAULT_TAB_NAME deben definirse juntos"),
        };

        let dispatch_workers = require_positive(
            "DISPATCH_WORKERS",
            parse_env::<usize>("DISPATCH_WORKERS")?.unwrap_or(defaults.dispatch_workers),
        )?;
        let dispatch_queue_capacity = require_positive(
            "DISPATCH_QUEUE_CAPACITY",
            parse_env::<usize>("DISPATCH_QUEUE_CAPACITY")?
                .unwrap_or(defaults.dispatch_queue_capacity),
        )?;
        // actix hace assert de workers > 0
        let http_workers = parse_env::<usize>("HTTP_WORKERS")?
            .map(|n| require_positive("HTTP_WORKERS", n))
            .transpose()?;

        Ok(TrackerConfig {
            database_url: optional_env("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_host: optional_env("BIND_HOST").unwrap_or(defaults.bind_host),
            bind_port: parse_env::<u16>("BIND_PORT")?.unwrap_or(defaults.bind_port),
            http_workers,
            timestamp_format,
            sheets_backend: parse_env::<SheetsBackend>("SHEETS_BACKEND")?
                .unwrap_or(defaults.sheets_backend),
            google_credentials: load_google_credentials()?,
            default_sheet,
            memory_seed_path: optional_env("SHEETS_MEMORY_SEED").map(PathBuf::from),
            dispatch_queue_capacity,
            dispatch_workers,
            redirect_allowed_hosts: optional_env("REDIRECT_ALLOWED_HOSTS")
                .map(|raw| parse_host_list(&raw))
                .unwrap_or_default(),
        })
    }

    /// true si la base es el archivo por defecto (hay que crear `data/`).
    pub fn uses_default_database(&self) -> bool {
        self.database_url == DEFAULT_DATABASE_URL
    }
}

pub fn require_positive(key: &str, value: usize) -> Result<usize> {
    if value == 0 {
        bail!("{} debe ser mayor que 0", key);
    }
    Ok(value)
}

pub fn validate_timestamp_pattern(pattern: &str) -> Result<()> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        bail!("TIMESTAMP_FORMAT inválido: '{}'", pattern);
    }
    Ok(())
}

/// Lista separada por comas; se normaliza a minúsculas y sin espacios.
pub fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .collect()
}

/// Credenciales en orden: base64, JSON directo, ruta a archivo.
fn load_google_credentials() -> Result<Option<String>> {
    if let Some(encoded) = optional_env("GOOGLE_CREDENTIALS_BASE64") {
        return decode_credentials_base64(&encoded).map(Some);
    }
    if let Some(json) = optional_env("GOOGLE_CREDENTIALS_JSON") {
        return Ok(Some(json));
    }
    if let Some(path) = optional_env("GOOGLE_APPLICATION_CREDENTIALS") {
        let json = fs::read_to_string(&path)
            .with_context(|| format!("No se pudo leer credenciales en {}", path))?;
        return Ok(Some(json));
    }
    Ok(None)
}

pub fn decode_credentials_base64(encoded: &str) -> Result<String> {
    let compact: String = encoded.split_whitespace().collect();
    let bytes = base64::decode(compact).context("GOOGLE_CREDENTIALS_BASE64 no es base64 válido")?;
    String::from_utf8(bytes).context("GOOGLE_CREDENTIALS_BASE64 no contiene UTF-8")
}
