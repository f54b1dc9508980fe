//! config/mod.rs
//! Configuración global del servicio.

pub mod tracker_config;
