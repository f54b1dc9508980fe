//! services/mod.rs
//! Módulo que agrupa los distintos "servicios" o "capas de negocio" de la app.

pub mod dashboard_service;
pub mod dispatch_service;
pub mod event_service;
pub mod google_sheets;
pub mod sheet_client;
pub mod status_service;
pub mod tracking_service;
