#[cfg(test)]
mod tests {
    use actix_web::{test, App};

    #[actix_rt::test]
    async fn test_status_get() {
        let mut app = test::init_service(App::new().service(gffft::status::view_status)).await;
        let req = test::TestRequest::default().uri("/status").to_request();
        let resp = test::call_service(&mut app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_rt::test]
    async fn test_unknown_route_is_404() {
        let mut app = test::init_service(App::new().service(gffft::status::view_status)).await;
        let req = test::TestRequest::default().uri("/nope").to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status().as_u16(), 404);
    }
}
