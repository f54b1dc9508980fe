//! handlers/tracking_handler.rs
//! Endpoints de pixel y de click. Siempre responden 200 con el mismo contenido.

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;

use crate::{
    config::tracker_config::TrackerConfig, models::status_model::SheetHandle,
    services::tracking_service::TrackingService,
};

#[derive(Deserialize)]
pub struct ClickQuery {
    /// Destino opcional; solo http(s) absoluto hacia un host permitido.
    to: Option<String>,
}

fn origin_address(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}

fn pixel_response(body: &'static [u8]) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("image/gif")
        .append_header((header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"))
        .append_header((header::PRAGMA, "no-cache"))
        .append_header((header::EXPIRES, "0"))
        .body(Bytes::from_static(body))
}

/// GET /track/{recipient_id}
pub async fn track_pixel_endpoint(
    req: HttpRequest,
    path: web::Path<String>,
    config: web::Data<TrackerConfig>,
    tracking: web::Data<TrackingService>,
) -> HttpResponse {
    let recipient_id = path.into_inner();
    let origin = origin_address(&req);
    log::info!("Email abierto: {} desde {}", recipient_id, origin);

    let body = tracking.handle_pixel(
        &recipient_id,
        config.default_sheet.clone(),
        &origin,
        Utc::now(),
    );
    pixel_response(body)
}

/// GET /track/{sheet}/{tab}/{recipient_id}
pub async fn track_sheet_pixel_endpoint(
    req: HttpRequest,
    path: web::Path<(String, String, String)>,
    tracking: web::Data<TrackingService>,
) -> HttpResponse {
    let (sheet, tab, recipient_id) = path.into_inner();
    let origin = origin_address(&req);
    log::info!(
        "Email abierto: {} desde {} (hoja {}/{})",
        recipient_id,
        origin,
        sheet,
        tab
    );

    let body = tracking.handle_pixel(
        &recipient_id,
        Some(SheetHandle::new(sheet, tab)),
        &origin,
        Utc::now(),
    );
    pixel_response(body)
}

/// GET /action/{recipient_id} y /click/{recipient_id}
pub async fn click_endpoint(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ClickQuery>,
    config: web::Data<TrackerConfig>,
    tracking: web::Data<TrackingService>,
) -> HttpResponse {
    let recipient_id = path.into_inner();
    let origin = origin_address(&req);
    log::info!("Click de {} desde {}", recipient_id, origin);

    let ack = tracking.handle_click(&recipient_id, None, &origin, Utc::now());
    click_response(ack, query.into_inner().to, &config.redirect_allowed_hosts)
}

/// GET /click/{sheet}/{tab}/{recipient_id}
pub async fn click_sheet_endpoint(
    req: HttpRequest,
    path: web::Path<(String, String, String)>,
    query: web::Query<ClickQuery>,
    config: web::Data<TrackerConfig>,
    tracking: web::Data<TrackingService>,
) -> HttpResponse {
    let (sheet, tab, recipient_id) = path.into_inner();
    let origin = origin_address(&req);
    log::info!(
        "Click de {} desde {} (hoja {}/{})",
        recipient_id,
        origin,
        sheet,
        tab
    );

    let ack = tracking.handle_click(
        &recipient_id,
        Some(SheetHandle::new(sheet, tab)),
        &origin,
        Utc::now(),
    );
    click_response(ack, query.into_inner().to, &config.redirect_allowed_hosts)
}

fn click_response(ack: &'static str, to: Option<String>, allowed_hosts: &[String]) -> HttpResponse {
    match to.filter(|url| is_redirect_target(url, allowed_hosts)) {
        Some(url) => HttpResponse::Found()
            .append_header((header::LOCATION, url))
            .finish(),
        None => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(ack),
    }
}

/// Evita un redirect abierto: el host debe estar en `REDIRECT_ALLOWED_HOSTS`.
pub fn is_redirect_target(url: &str, allowed_hosts: &[String]) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let allowed = parsed
        .host_str()
        .map_or(false, |host| allowed_hosts.iter().any(|h| h == host));
    if !allowed {
        log::warn!("Redirect a host no permitido ignorado: {}", url);
    }
    allowed
}
