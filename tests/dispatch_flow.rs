//! End-to-end dispatch over a real socket.

use std::time::Duration;

use route_cache::config::RouteConfig;

mod common;

#[tokio::test]
async fn routes_rewrite_to_controllers() {
    let dir = tempfile::tempdir().unwrap();
    let server = common::start_server(common::app_config(dir.path())).await;
    let client = common::client();

    let res = client.get(server.url("/page/intro/2")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert!(res.text().await.unwrap().contains("intro (page 2)"));

    let res = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.text().await.unwrap().contains("It works."));
}

#[tokio::test]
async fn unknown_paths_use_the_error_controller() {
    let dir = tempfile::tempdir().unwrap();
    let server = common::start_server(common::app_config(dir.path())).await;

    let res = common::client()
        .get(server.url("/nowhere/at/all"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert!(res.text().await.unwrap().contains("Nothing lives at"));
}

#[tokio::test]
async fn arity_violation_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::app_config(dir.path());
    config.application.error_controller = None;
    let server = common::start_server(config).await;

    let res = common::client()
        .get(server.url("/pages/show"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert!(res.text().await.unwrap().contains("Error 1"));
}

#[tokio::test]
async fn production_mode_hides_failures() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::app_config(dir.path());
    config.application.debug = false;
    config.application.error_controller = Some("missing".into());
    let server = common::start_server(config).await;

    let res = common::client()
        .get(server.url("/nowhere"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    let body = res.text().await.unwrap();
    assert!(body.contains("could not be found"));
    assert!(!body.contains("missing"));
}

#[tokio::test]
async fn form_post_redirects_to_base_url() {
    let dir = tempfile::tempdir().unwrap();
    let server = common::start_server(common::app_config(dir.path())).await;

    let res = common::client()
        .post(server.url("/pages/contact"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("message=hello")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 302);
    assert_eq!(res.headers()["location"], "http://localhost/pages/index");
}

#[tokio::test]
async fn config_reload_changes_routes() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::app_config(dir.path());
    config.cache.use_cache = false;
    let server = common::start_server(config.clone()).await;
    let client = common::client();

    assert_eq!(
        client.get(server.url("/info")).send().await.unwrap().status(),
        404
    );

    config.routes.push(RouteConfig::new("info", "pages/about"));
    server.config_tx.send(config).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        client.get(server.url("/info")).send().await.unwrap().status(),
        200
    );
}
