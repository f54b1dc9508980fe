//! tests/mod.rs
//! Pruebas del servicio de tracking.

mod event_tests;
mod support;
mod tracking_tests;
