use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::Value;

use gridstore::api::{delete_object, get_object, list_versions, put_object};
use gridstore::app_state::AppState;

macro_rules! test_app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new_for_testing()))
                .route("/objects/{name}/versions", web::get().to(list_versions))
                .route("/objects/{name}", web::put().to(put_object))
                .route("/objects/{name}", web::get().to(get_object))
                .route("/objects/{id}", web::delete().to(delete_object)),
        )
        .await
    };
}

#[actix_web::test]
async fn test_put_then_get_round_trips_bytes() {
    let app = test_app!();
    let payload = b"integration payload bytes".to_vec();

    let req = test::TestRequest::put()
        .uri("/objects/report.pdf")
        .insert_header(("content-type", "application/pdf"))
        .insert_header(("x-meta-origin", "scanner-3"))
        .set_payload(payload.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let descriptor: Value = test::read_body_json(resp).await;
    println!("PUT descriptor: {}", descriptor);
    assert_eq!(descriptor["filename"], "report.pdf");
    assert_eq!(descriptor["content_type"], "application/pdf");
    assert_eq!(descriptor["metadata"]["version"], "1");
    assert_eq!(descriptor["metadata"]["origin"], "scanner-3");
    assert!(descriptor["metadata"].get("$multipart").is_none());

    let req = test::TestRequest::get()
        .uri("/objects/report.pdf")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(body.to_vec(), payload);
}

#[actix_web::test]
async fn test_second_put_becomes_current_version() {
    let app = test_app!();

    for (payload, expected_version) in [(&b"first draft"[..], "1"), (&b"final copy"[..], "2")] {
        let req = test::TestRequest::put()
            .uri("/objects/draft.txt")
            .set_payload(payload.to_vec())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let descriptor: Value = test::read_body_json(resp).await;
        assert_eq!(descriptor["metadata"]["version"], expected_version);
    }

    let req = test::TestRequest::get().uri("/objects/draft.txt").to_request();
    let body = test::read_body(test::call_service(&app, req).await).await;
    assert_eq!(body.to_vec(), b"final copy");

    let req = test::TestRequest::get()
        .uri("/objects/draft.txt/versions")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let lineage: Value = test::read_body_json(resp).await;
    let lineage = lineage.as_array().unwrap();
    assert_eq!(lineage.len(), 2);
    assert_eq!(lineage[0]["metadata"]["version"], "2");
    assert_eq!(lineage[1]["metadata"]["version"], "1");
}

#[actix_web::test]
async fn test_get_missing_object_is_structured_404() {
    let app = test_app!();

    let req = test::TestRequest::get().uri("/objects/ghost.bin").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    println!("404 body: {}", body);
    assert_eq!(body["code"], "ERR_NOT_FOUND");
    assert_eq!(body["status"], 404);
}

#[actix_web::test]
async fn test_delete_acknowledges_id() {
    let app = test_app!();

    let req = test::TestRequest::put()
        .uri("/objects/victim.bin")
        .set_payload(b"bytes".to_vec())
        .to_request();
    let descriptor: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let id = descriptor["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::delete()
        .uri(&format!("/objects/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let removed: Value = test::read_body_json(resp).await;
    assert_eq!(removed["id"].as_str().unwrap(), id);

    // Malformed id is a client fault.
    let req = test::TestRequest::delete()
        .uri("/objects/not-a-uuid")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "E_BAD_REQUEST");
}

#[actix_web::test]
async fn test_empty_body_stores_empty_object() {
    let app = test_app!();

    let req = test::TestRequest::put().uri("/objects/empty.bin").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let descriptor: Value = test::read_body_json(resp).await;
    assert_eq!(descriptor["length"], 0);

    let req = test::TestRequest::get().uri("/objects/empty.bin").to_request();
    let body = test::read_body(test::call_service(&app, req).await).await;
    assert!(body.is_empty());
}
