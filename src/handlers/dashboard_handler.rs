//! handlers/dashboard_handler.rs
//! Visor de logs y dashboard de la hoja. Siempre 200; los errores van en el HTML.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{models::status_model::SheetHandle, services::dashboard_service::DashboardService};

const DEFAULT_LOG_LIMIT: u32 = 100;
const MAX_LOG_LIMIT: u32 = 1000;

/// `limit` llega como texto: un valor inválido no debe convertirse en 400.
#[derive(Deserialize)]
pub struct LogsQuery {
    limit: Option<String>,
}

/// Límite del visor: por defecto 100, acotado a [1, 1000].
pub fn parse_log_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .clamp(1, MAX_LOG_LIMIT)
}

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

/// GET /logs
pub async fn logs_endpoint(
    dashboard: web::Data<DashboardService>,
    query: web::Query<LogsQuery>,
) -> HttpResponse {
    let limit = parse_log_limit(query.limit.as_deref());
    html(dashboard.render_logs(limit).await)
}

/// GET /dashboard/{sheet}/{tab}
pub async fn sheet_dashboard_endpoint(
    dashboard: web::Data<DashboardService>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (sheet, tab) = path.into_inner();
    html(dashboard.render_sheet(&SheetHandle::new(sheet, tab)).await)
}

/// GET /health
pub async fn health_endpoint() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
