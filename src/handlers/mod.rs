//! handlers/mod.rs
//! Módulo que agrupa los handlers HTTP (tracking y vistas).

pub mod dashboard_handler;
pub mod tracking_handler;
