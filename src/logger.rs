//! logger.rs
//! Configuración del logger usando env_logger.

const DEFAULT_FILTER: &str = "info,sqlx=warn";

pub fn init_logger() {
    // RUST_LOG manda; si no está, logs de la app en info y sqlx solo warnings.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
        .format_timestamp_secs()
        .init();
}

/// Logger para tests: captura por test y tolera inicializaciones repetidas.
#[cfg(test)]
pub fn init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
