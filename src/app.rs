//! app.rs
use crate::handlers::{dashboard_handler, tracking_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(dashboard_handler::health_endpoint))
        .service(
            web::scope("/track")
                .route(
                    "/{recipient_id}",
                    web::get().to(tracking_handler::track_pixel_endpoint),
                )
                .route(
                    "/{sheet}/{tab}/{recipient_id}",
                    web::get().to(tracking_handler::track_sheet_pixel_endpoint),
                ),
        )
        .route(
            "/action/{recipient_id}",
            web::get().to(tracking_handler::click_endpoint),
        )
        .service(
            web::scope("/click")
                .route(
                    "/{recipient_id}",
                    web::get().to(tracking_handler::click_endpoint),
                )
                .route(
                    "/{sheet}/{tab}/{recipient_id}",
                    web::get().to(tracking_handler::click_sheet_endpoint),
                ),
        )
        .route("/logs", web::get().to(dashboard_handler::logs_endpoint))
        .route(
            "/dashboard/{sheet}/{tab}",
            web::get().to(dashboard_handler::sheet_dashboard_endpoint),
        );
}
