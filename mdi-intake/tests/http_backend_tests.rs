//! HTTP Backend Client Tests
//! Test File: http_backend_tests.rs
//!
//! Runs `HttpProcessingBackend` against an in-process axum server that plays
//! the Processing Backend and the object store.

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use mdi_intake::error::IntakeError;
use mdi_intake::models::{Chunk, ImageItem};
use mdi_intake::services::{AdminToken, HttpProcessingBackend, ProcessingBackend, SaveParagraphRequest};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Seen = Arc<Mutex<Vec<Value>>>;

/// Serve `router` on an ephemeral port and return its base URL
async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn seen() -> Seen {
    Arc::new(Mutex::new(Vec::new()))
}

fn recorded(seen: &Seen) -> Vec<Value> {
    seen.lock().unwrap().clone()
}

#[tokio::test]
async fn test_catalog_decoded_from_envelope() {
    let router = Router::new().route(
        "/pdf_process/get_brands_and_device_types",
        get(|| async {
            Json(json!({
                "success": true,
                "data": {
                    "deviceTypes": [{"device_type_id": 1, "type_name": "Washer"}],
                    "brands": [{"brand_id": 10, "brand_name": "Acme"}]
                }
            }))
        }),
    );
    let backend = HttpProcessingBackend::new(&spawn_server(router).await).unwrap();

    let catalog = backend.get_brands_and_device_types().await.unwrap();

    assert_eq!(catalog.device_types[0].id, 1);
    assert_eq!(catalog.device_types[0].name, "Washer");
    assert_eq!(catalog.brands[0].id, 10);
    assert_eq!(catalog.brands[0].name, "Acme");
}

#[tokio::test]
async fn test_new_device_sends_query_and_reads_id() {
    let seen = seen();
    let router = Router::new().route(
        "/pdf_process/new_device",
        get({
            let seen = seen.clone();
            move |Query(query): Query<HashMap<String, String>>| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(json!(query));
                    Json(json!({"success": true, "data": {"device_id": 42}}))
                }
            }
        }),
    );
    let backend = HttpProcessingBackend::new(&spawn_server(router).await).unwrap();

    let device_id = backend.new_device("WM 200", 1, 10).await.unwrap();

    assert_eq!(device_id, 42);
    assert_eq!(
        recorded(&seen),
        vec![json!({"label": "WM 200", "device_type_id": "1", "brand_id": "10"})]
    );
}

#[tokio::test]
async fn test_non_numeric_device_id_is_malformed() {
    let router = Router::new().route(
        "/pdf_process/new_device",
        get(|| async { Json(json!({"success": true, "data": {"device_id": "42"}})) }),
    );
    let backend = HttpProcessingBackend::new(&spawn_server(router).await).unwrap();

    let result = backend.new_device("WM-200", 1, 10).await;

    assert!(matches!(result, Err(IntakeError::Malformed { .. })));
}

#[tokio::test]
async fn test_success_false_is_rejection_with_message() {
    let router = Router::new().route(
        "/pdf_process/pdf_upload",
        get(|| async { Json(json!({"success": false, "message": "Device not found"})) }),
    );
    let backend = HttpProcessingBackend::new(&spawn_server(router).await).unwrap();

    let err = backend.pdf_upload(99).await.unwrap_err();

    assert!(matches!(&err, IntakeError::Rejected { message: Some(m), .. } if m == "Device not found"));
    assert_eq!(err.user_message(), "Device not found");
}

#[tokio::test]
async fn test_error_status_keeps_backend_message() {
    let router = Router::new().route(
        "/pdf_process/extract_pdf",
        get(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "message": "Extractor crashed"})),
            )
        }),
    );
    let backend = HttpProcessingBackend::new(&spawn_server(router).await).unwrap();

    let err = backend.extract_pdf(7).await.unwrap_err();

    assert!(matches!(
        &err,
        IntakeError::Status { status: 500, message: Some(m), .. } if m == "Extractor crashed"
    ));
}

#[tokio::test]
async fn test_extract_requires_explicit_success() {
    let router = Router::new()
        .route(
            "/pdf_process/extract_pdf",
            get(|Query(query): Query<HashMap<String, String>>| async move {
                if query.get("pdf_id").map(String::as_str) == Some("7") {
                    Json(json!({"success": true}))
                } else {
                    Json(json!({"data": null}))
                }
            }),
        );
    let backend = HttpProcessingBackend::new(&spawn_server(router).await).unwrap();

    assert!(backend.extract_pdf(7).await.is_ok());
    assert!(matches!(
        backend.extract_pdf(8).await,
        Err(IntakeError::Rejected { message: None, .. })
    ));
}

#[tokio::test]
async fn test_signed_upload_carries_pdf_id() {
    let router = Router::new().route(
        "/pdf_process/pdf_upload",
        get(|| async {
            Json(json!({
                "success": true,
                "data": {"signed_url": "https://storage.test/u?sig=1", "pdf_id": 7}
            }))
        }),
    );
    let backend = HttpProcessingBackend::new(&spawn_server(router).await).unwrap();

    let signed = backend.pdf_upload(42).await.unwrap();

    assert_eq!(signed.signed_url, "https://storage.test/u?sig=1");
    assert_eq!(signed.pdf_id, Some(7));
}

#[tokio::test]
async fn test_page_state_endpoints() {
    let seen = seen();
    let router = Router::new()
        .route(
            "/pdf_process/get_pdf_initial_state",
            get(|| async {
                Json(json!({
                    "success": true,
                    "data": {
                        "pdf_gcs_signed_read_url": "https://storage.test/r.pdf",
                        "images": [{"pdf_image_id": 3, "img_alt": null}],
                        "page_paragraph_chunks": [
                            {"chunk_id": 5, "pdf_paragraph_id": 9, "chunk_context": "Open the door."}
                        ]
                    }
                }))
            }),
        )
        .route(
            "/pdf_process/get_pdf_state",
            get({
                let seen = seen.clone();
                move |Query(query): Query<HashMap<String, String>>| {
                    let seen = seen.clone();
                    async move {
                        seen.lock().unwrap().push(json!(query));
                        Json(json!({"success": true, "data": {"images": [], "page_paragraph_chunks": []}}))
                    }
                }
            }),
        );
    let backend = HttpProcessingBackend::new(&spawn_server(router).await).unwrap();

    let initial = backend.get_pdf_initial_state(7).await.unwrap();
    assert_eq!(initial.read_url, "https://storage.test/r.pdf");
    assert_eq!(initial.page.images, vec![ImageItem::new(3, "")]);
    assert_eq!(initial.page.paragraph_id, Some(9));
    assert_eq!(
        initial.page.chunks,
        vec![Chunk::Saved {
            id: 5,
            paragraph_id: Some(9),
            value: "Open the door.".to_string()
        }]
    );

    let page = backend.get_pdf_state(7, 4).await.unwrap();
    assert!(page.chunks.is_empty());
    assert_eq!(
        recorded(&seen),
        vec![json!({"pdf_id": "7", "page_number": "4"})]
    );
}

#[tokio::test]
async fn test_save_paragraph_posts_json_body() {
    let seen = seen();
    let router = Router::new().route(
        "/pdf_process/save_and_embed_paragraph",
        post({
            let seen = seen.clone();
            move |Json(body): Json<Value>| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(body);
                    Json(json!({"success": true, "data": {"chunk_id": 77}}))
                }
            }
        }),
    );
    let backend = HttpProcessingBackend::new(&spawn_server(router).await).unwrap();

    let request = SaveParagraphRequest::for_chunk(&Chunk::Unsaved {
        paragraph_id: Some(9),
        value: "Descale monthly.".to_string(),
    });
    let chunk_id = backend.save_and_embed_paragraph(&request).await.unwrap();

    assert_eq!(chunk_id, Some(77));
    assert_eq!(
        recorded(&seen),
        vec![json!({"pdf_paragraph_id": 9, "chunk_context": "Descale monthly.", "chunk_id": -1})]
    );
}

#[tokio::test]
async fn test_image_endpoints_send_expected_bodies() {
    let seen = seen();
    let record = |seen: Seen, reply: Value| {
        move |Json(body): Json<Value>| {
            let seen = seen.clone();
            let reply = reply.clone();
            async move {
                seen.lock().unwrap().push(body);
                Json(reply)
            }
        }
    };
    let router = Router::new()
        .route(
            "/pdf_process/create_new_image",
            post(record(
                seen.clone(),
                json!({"success": true, "data": {"signed_url": "https://storage.test/i?sig=2", "image_id": 900, "sequence": 3}}),
            )),
        )
        .route(
            "/pdf_process/save_and_embed_img_alt",
            post(record(seen.clone(), json!({"success": true}))),
        )
        .route(
            "/pdf_process/delete_chunk",
            post(record(seen.clone(), json!({"success": true}))),
        );
    let backend = HttpProcessingBackend::new(&spawn_server(router).await).unwrap();

    let target = backend.create_new_image(7, 2).await.unwrap();
    backend.save_and_embed_img_alt(900, "Door latch").await.unwrap();
    backend.delete_chunk(5).await.unwrap();

    assert_eq!(target.image_id, 900);
    assert_eq!(target.sequence, Some(3));
    assert_eq!(
        recorded(&seen),
        vec![
            json!({"pdf_id": 7, "page_number": 2}),
            json!({"pdf_image_id": 900, "img_alt": "Door latch"}),
            json!({"chunk_id": 5}),
        ]
    );
}

#[tokio::test]
async fn test_put_signed_sends_content_type_and_bytes() {
    let seen = seen();
    let router = Router::new()
        .route(
            "/upload",
            put({
                let seen = seen.clone();
                move |headers: HeaderMap, body: Bytes| {
                    let seen = seen.clone();
                    async move {
                        let content_type = headers
                            .get("content-type")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        seen.lock()
                            .unwrap()
                            .push(json!({"content_type": content_type, "len": body.len()}));
                        StatusCode::OK
                    }
                }
            }),
        )
        .route("/expired", put(|| async { StatusCode::FORBIDDEN }));
    let base = spawn_server(router).await;
    let backend = HttpProcessingBackend::new(&base).unwrap();

    backend
        .put_signed(&format!("{}/upload", base), "application/pdf", vec![1, 2, 3, 4])
        .await
        .unwrap();
    let refused = backend
        .put_signed(&format!("{}/expired", base), "image/png", vec![0])
        .await;

    assert_eq!(
        recorded(&seen),
        vec![json!({"content_type": "application/pdf", "len": 4})]
    );
    assert!(matches!(refused, Err(IntakeError::UploadFailed { status: 403 })));
}

#[tokio::test]
async fn test_bearer_token_attached_after_login() {
    let seen = seen();
    let router = Router::new()
        .route(
            "/auth/admin_login",
            post(|| async { Json(json!({"success": true, "data": {"token": "tok-123"}})) }),
        )
        .route(
            "/pdf_process/get_img_signed_url",
            get({
                let seen = seen.clone();
                move |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| {
                    let seen = seen.clone();
                    async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        seen.lock().unwrap().push(json!({"auth": auth, "query": query}));
                        Json(json!({"success": true, "data": {"signed_url": "https://storage.test/img"}}))
                    }
                }
            }),
        );
    let backend = HttpProcessingBackend::new(&spawn_server(router).await).unwrap();

    backend.get_img_signed_url(3).await.unwrap();
    let token = backend.admin_login("admin", "secret").await.unwrap();
    assert_eq!(token, AdminToken("tok-123".to_string()));
    backend.set_auth_token(Some(token));
    let url = backend.get_img_signed_url(3).await.unwrap();

    assert_eq!(url, "https://storage.test/img");
    assert_eq!(
        recorded(&seen),
        vec![
            json!({"auth": null, "query": {"img_id": "3"}}),
            json!({"auth": "Bearer tok-123", "query": {"img_id": "3"}}),
        ]
    );
}

#[tokio::test]
async fn test_sign_in_authenticates_later_calls() {
    let seen = seen();
    let router = Router::new()
        .route(
            "/auth/admin_login",
            post(|Json(body): Json<Value>| async move {
                if body["username"] == "admin" && body["password"] == "secret" {
                    Json(json!({"success": true, "data": {"token": "tok-456"}}))
                } else {
                    Json(json!({"success": false, "message": "Invalid credentials"}))
                }
            }),
        )
        .route(
            "/pdf_process/get_brands_and_device_types",
            get({
                let seen = seen.clone();
                move |headers: HeaderMap| {
                    let seen = seen.clone();
                    async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        seen.lock().unwrap().push(json!({"auth": auth}));
                        Json(json!({"success": true, "data": {"deviceTypes": [], "brands": []}}))
                    }
                }
            }),
        );
    let backend = HttpProcessingBackend::new(&spawn_server(router).await).unwrap();

    let refused = backend.sign_in("admin", "wrong").await;
    assert!(matches!(refused, Err(IntakeError::Rejected { .. })));
    backend.get_brands_and_device_types().await.unwrap();

    backend.sign_in("admin", "secret").await.unwrap();
    backend.get_brands_and_device_types().await.unwrap();

    assert_eq!(
        recorded(&seen),
        vec![json!({"auth": null}), json!({"auth": "Bearer tok-456"})]
    );
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpProcessingBackend::new(&format!("http://{}", addr)).unwrap();
    let err = backend.get_brands_and_device_types().await.unwrap_err();

    assert!(matches!(err, IntakeError::Network { .. }));
    assert_eq!(
        err.user_message(),
        "Could not reach the processing server. Please try again."
    );
}
