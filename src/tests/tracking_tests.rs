//! tests/tracking_tests.rs
//! Pruebas de los endpoints de pixel y click.

#[cfg(test)]
mod tests {
    use actix_web::{http::header, test};

    use crate::services::tracking_service::{CLICK_ACK, TRACKING_PIXEL};
    use crate::tests::support::{handle, test_stack, wait_completed};

    #[actix_web::test]
    async fn test_pixel_is_fixed_gif_and_logs_event() {
        let stack = test_stack(None).await;
        let app = test::init_service(stack.app()).await;

        let req = test::TestRequest::get()
            .uri("/track/ann@x.com")
            .peer_addr("10.1.2.3:5555".parse().unwrap())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/gif"
        );
        assert!(resp
            .headers()
            .get(header::CACHE_CONTROL)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("no-store"));
        let body = test::read_body(resp).await;
        assert_eq!(body.len(), 43);
        assert_eq!(&body[..], &TRACKING_PIXEL[..]);
        assert!(body.starts_with(b"GIF89a"));

        // Sin hoja por defecto solo se guarda el evento
        let stats = wait_completed(&stack.dispatcher, 1).await;
        assert_eq!(stats.logged, 1);
        assert_eq!(stats.submitted, 1);
        let events = stack.events.list_events(10).await.unwrap();
        assert_eq!(events[0].recipient_id, "ann@x.com");
        assert!(events[0].origin_address.starts_with("10.1.2.3"));
        assert_eq!(stack.store.batch_writes(), 0);
    }

    #[actix_web::test]
    async fn test_sheet_pixel_updates_status_row() {
        let stack = test_stack(None).await;
        let app = test::init_service(stack.app()).await;

        let req = test::TestRequest::get()
            .uri("/track/Campaign/Recipients/ann@x.com")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let stats = wait_completed(&stack.dispatcher, 2).await;
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.logged, 1);

        let rows = stack.store.rows(&handle()).unwrap();
        assert_eq!(rows[1][4], "Opened");
        assert_eq!(rows[1][5], "1");
        assert!(!rows[1][6].is_empty());
        assert_eq!(rows[1][6], rows[1][7]);
    }

    #[actix_web::test]
    async fn test_default_sheet_is_used_for_short_route() {
        let stack = test_stack(Some(handle())).await;
        let app = test::init_service(stack.app()).await;

        let req = test::TestRequest::get().uri("/track/ann@x.com").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let stats = wait_completed(&stack.dispatcher, 2).await;
        assert_eq!(stats.updated, 1);
        assert_eq!(stack.store.rows(&handle()).unwrap()[1][5], "1");
    }

    #[actix_web::test]
    async fn test_unregistered_recipient_still_gets_pixel() {
        let stack = test_stack(None).await;
        let app = test::init_service(stack.app()).await;

        let req = test::TestRequest::get()
            .uri("/track/Campaign/Recipients/nobody@x.com")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], &TRACKING_PIXEL[..]);

        let stats = wait_completed(&stack.dispatcher, 2).await;
        assert_eq!(stats.not_found, 1);
        assert_eq!(stack.store.batch_writes(), 0);
    }

    #[actix_web::test]
    async fn test_unknown_sheet_does_not_change_response() {
        let stack = test_stack(None).await;
        let app = test::init_service(stack.app()).await;

        let req = test::TestRequest::get()
            .uri("/track/Missing/Tab/ann@x.com")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(test::read_body(resp).await.len(), 43);

        let stats = wait_completed(&stack.dispatcher, 2).await;
        assert_eq!(stats.not_configured, 1);
    }

    #[actix_web::test]
    async fn test_click_routes_return_plain_ack() {
        let stack = test_stack(None).await;
        let app = test::init_service(stack.app()).await;

        for uri in ["/action/ann@x.com", "/click/ann@x.com"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 200, "{}", uri);
            assert!(resp
                .headers()
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/plain"));
            let body = test::read_body(resp).await;
            assert_eq!(body, CLICK_ACK.as_bytes());
        }

        wait_completed(&stack.dispatcher, 2).await;
        let events = stack.events.list_events(10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_kind == "click"));
    }

    #[actix_web::test]
    async fn test_sheet_click_updates_row() {
        let stack = test_stack(None).await;
        let app = test::init_service(stack.app()).await;

        let req = test::TestRequest::get()
            .uri("/click/Campaign/Recipients/ann@x.com")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let stats = wait_completed(&stack.dispatcher, 2).await;
        assert_eq!(stats.updated, 1);
        assert_eq!(stack.store.rows(&handle()).unwrap()[1][4], "Opened");
    }

    #[actix_web::test]
    async fn test_click_redirects_only_to_allowed_hosts() {
        let mut stack = test_stack(None).await;
        stack.config.redirect_allowed_hosts = vec!["example.com".to_string()];
        let app = test::init_service(stack.app()).await;

        let req = test::TestRequest::get()
            .uri("/click/ann@x.com?to=https%3A%2F%2Fexample.com%2Foffer")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 302);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "https://example.com/offer"
        );

        for uri in [
            "/click/ann@x.com?to=https%3A%2F%2Fevil.example.net%2Flogin",
            "/click/Campaign/Recipients/ann@x.com?to=https%3A%2F%2Fevil.example.net",
            "/click/ann@x.com?to=javascript%3Aalert(1)",
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 200, "{}", uri);
            assert!(resp.headers().get(header::LOCATION).is_none());
            assert_eq!(test::read_body(resp).await, CLICK_ACK.as_bytes());
        }

        // Todos los clicks se registran igual; el de hoja además actualiza la fila
        let stats = wait_completed(&stack.dispatcher, 5).await;
        assert_eq!(stats.logged, 4);
        assert_eq!(stats.updated, 1);
    }

    #[actix_web::test]
    async fn test_click_never_redirects_without_allowlist() {
        let stack = test_stack(None).await;
        let app = test::init_service(stack.app()).await;

        let req = test::TestRequest::get()
            .uri("/click/ann@x.com?to=https%3A%2F%2Fexample.com%2Foffer")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(test::read_body(resp).await, CLICK_ACK.as_bytes());
    }
}

#[cfg(test)]
mod redirect_tests {
    use crate::handlers::tracking_handler::is_redirect_target;

    #[test]
    fn test_redirect_target_validation() {
        let allowed = vec!["example.com".to_string()];
        assert!(is_redirect_target("https://example.com", &allowed));
        assert!(is_redirect_target("http://EXAMPLE.com/a?b=c", &allowed));
        assert!(!is_redirect_target("https://evil.com/example.com", &allowed));
        assert!(!is_redirect_target("https://example.com.evil.com", &allowed));
        assert!(!is_redirect_target("javascript:alert(1)", &allowed));
        assert!(!is_redirect_target("/relative/path", &allowed));
        assert!(!is_redirect_target("ftp://example.com/file", &allowed));
        assert!(!is_redirect_target("", &allowed));
        assert!(!is_redirect_target("https://example.com", &[]));
    }
}
