//! Single statement requests.

use super::common::*;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;

#[tokio::test]
async fn test_healthz() {
    let app = TestApp::new();
    let (status, body) = app.get("/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn test_public_read() {
    let app = TestApp::new();
    let (status, body) = app
        .get(&sql_uri("mapcentia", "SELECT * FROM public.parcels", ""))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"], json!([{ "id": 1 }]));
    assert_eq!(body["auth_check"]["auth_level"], json!("write_protected"));
    assert!(body.get("cache_hit").is_none());
    assert_eq!(
        app.recorder.calls(),
        vec![Call::Execute("SELECT * FROM public.parcels".to_string())]
    );
}

#[tokio::test]
async fn test_missing_query() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/v2/sql/mapcentia").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body,
        json!({
            "success": false,
            "code": 403,
            "message": "Query is missing (the 'q' parameter)"
        })
    );
}

#[tokio::test]
async fn test_drop_is_forbidden() {
    let app = TestApp::new();
    let (status, body) = app
        .get(&sql_uri("mapcentia", "DROP TABLE public.parcels", "key=owner-key"))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], json!("DROP is not allowed through the API"));
    assert!(app.recorder.calls().is_empty());
}

#[tokio::test]
async fn test_unrecognized_statement_is_bad_request() {
    let app = TestApp::new();
    let (status, _) = app
        .get(&sql_uri("mapcentia", "TRUNCATE public.parcels", ""))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsupported_format() {
    let app = TestApp::new();
    let (status, body) = app
        .get(&sql_uri("mapcentia", "SELECT 1", "format=xml"))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("xml is not a supported format."));
}

#[tokio::test]
async fn test_unknown_account() {
    let app = TestApp::new();
    let (status, body) = app.get(&sql_uri("nobody", "SELECT 1", "")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Account 'nobody' not found"));
}

#[tokio::test]
async fn test_private_relation_needs_key() {
    let app = TestApp::new();

    let (status, body) = app
        .get(&sql_uri("mapcentia", "SELECT * FROM public.secret", ""))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        json!("Forbidden. Not the right key for relation 'public.secret'")
    );
    assert_eq!(body["auth_check"]["success"], json!(false));
    assert!(app.recorder.calls().is_empty());

    let (status, body) = app
        .get(&sql_uri(
            "mapcentia",
            "SELECT * FROM public.secret",
            "key=owner-key",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["auth_check"]["auth_level"], json!("private"));
}

#[tokio::test]
async fn test_subuser_privileges() {
    let app = TestApp::new();

    let (status, _) = app
        .get(&sql_uri(
            "surveyor@mapcentia",
            "SELECT * FROM public.parcels",
            "key=sub-key",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .get(&sql_uri(
            "surveyor@mapcentia",
            "UPDATE public.parcels SET owner = 'x' WHERE id = 1",
            "key=sub-key",
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        json!("Forbidden. Subuser 'surveyor' lacks write privilege on 'public.parcels'")
    );
}

#[tokio::test]
async fn test_write_with_owner_key() {
    let app = TestApp::new();
    let (status, body) = app
        .get(&sql_uri(
            "mapcentia",
            "INSERT INTO public.parcels (id) VALUES (7)",
            "key=owner-key",
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affected_rows"], json!(1));
}

#[tokio::test]
async fn test_database_error_maps_to_status() {
    let app = TestApp::new();
    let (status, body) = app
        .get(&sql_uri("mapcentia", "SELECT * FROM public.broken", ""))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("relation \"broken\" does not exist"));
}

#[tokio::test]
async fn test_json_body() {
    let app = TestApp::new();
    let request = Request::post("/api/v2/sql/mapcentia?q=SELECT%201")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "q": "SELECT * FROM public.secret", "key": OWNER_KEY }).to_string(),
        ))
        .unwrap();
    let (status, _) = app.json(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.recorder.calls(),
        vec![Call::Execute("SELECT * FROM public.secret".to_string())]
    );
}

#[tokio::test]
async fn test_form_body() {
    let app = TestApp::new();
    let request = Request::post("/api/v2/sql/mapcentia")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("q=SELECT+*+FROM+public.parcels"))
        .unwrap();
    let (status, _) = app.json(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.recorder.calls(),
        vec![Call::Execute("SELECT * FROM public.parcels".to_string())]
    );
}

#[tokio::test]
async fn test_base64_query() {
    let app = TestApp::new();
    let encoded = urlencoding::encode(&STANDARD.encode("SELECT * FROM public.parcels")).into_owned();
    let (status, _) = app
        .get(&format!("/api/v2/sql/mapcentia?q={}&base64=true", encoded))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.recorder.calls(),
        vec![Call::Execute("SELECT * FROM public.parcels".to_string())]
    );
}

#[tokio::test]
async fn test_cache_hit_on_second_request() {
    let app = TestApp::new();
    let uri = sql_uri("mapcentia", "SELECT * FROM public.parcels", "lifetime=60");

    let (_, first) = app.get(&uri).await;
    assert_eq!(first["cache_hit"], json!(false));

    let (status, second) = app.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert!(second["cache_hit"]["signature"].is_string());
    assert_eq!(second["data"], json!([{ "id": 1 }]));
    assert_eq!(app.recorder.calls().len(), 1);
}
