use axum::body::{to_bytes, Body};
use axum::extract::Path;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use lms_backend::{create_router, initialize_backend, BackendConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn upstream_relations(Path(guardian_id): Path<String>, headers: HeaderMap) -> impl IntoResponse {
    match guardian_id.as_str() {
        "missing" => (StatusCode::NOT_FOUND, Json(json!({"message": "No guardian"}))).into_response(),
        "garbled" => (StatusCode::OK, "<html>oops</html>").into_response(),
        "secure" if headers.get("authorization").is_none() => {
            (StatusCode::UNAUTHORIZED, Json(json!({"message": "No token"}))).into_response()
        }
        _ => Json(json!({"data": [{
            "id": "r1",
            "guardianId": guardian_id,
            "student": {"id": "s1", "name": "John Doe", "email": "john@example.com"},
            "relationship": "father",
            "isPrimary": true,
            "permissionLevel": "full",
            "isActive": true,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-10T00:00:00Z"
        }]}))
        .into_response(),
    }
}

async fn upstream_create(Json(body): Json<Value>) -> impl IntoResponse {
    if body["studentId"] == "taken" {
        return (StatusCode::CONFLICT, Json(json!({"message": "Already linked"})));
    }
    (StatusCode::CREATED, Json(json!({"id": "r9", "relationship": body["relationship"]})))
}

async fn upstream_legacy_children() -> Json<Value> {
    Json(json!([{"id": "c1", "name": "Jane"}]))
}

async fn start_upstream() -> String {
    let app = Router::new()
        .route("/guardian-student/guardian/:guardian_id", get(upstream_relations))
        .route("/users/children", get(upstream_legacy_children))
        .route("/guardian-student", post(upstream_create));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn app(backend_url: String) -> Router {
    let config = BackendConfig {
        backend_url,
        image_base_url: Some("https://cdn.example.org/".to_string()),
        upstream_timeout_seconds: 5,
        ..BackendConfig::default()
    };
    create_router(initialize_backend(config).unwrap())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/guardian-student")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_list_maps_relations_into_children() {
    let app = app(start_upstream().await);

    let (status, body) = send(app, get_request("/api/guardian-student/guardian/g1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalChildren"], 1);
    let child = &body["children"][0];
    assert_eq!(child["id"], "s1");
    assert_eq!(child["name"], "John Doe");
    assert_eq!(child["avatarUrl"], "https://cdn.example.org/avatars/s1.png");
    let subjects = child["quickStats"]["subjectsEnrolled"].as_u64().unwrap();
    assert!((3..=5).contains(&subjects));
    assert!(body["metadata"]["lastUpdated"].is_string());
}

#[tokio::test]
async fn test_authorization_header_is_forwarded() {
    let upstream = start_upstream().await;

    let (status, _) = send(app(upstream.clone()), get_request("/api/guardian-student/guardian/secure")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let request = Request::builder()
        .uri("/api/guardian-student/guardian/secure")
        .header("authorization", "Bearer abc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(upstream), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalChildren"], 1);
}

#[tokio::test]
async fn test_upstream_failures_become_error_envelope() {
    let upstream = start_upstream().await;

    for guardian in ["missing", "garbled"] {
        let uri = format!("/api/guardian-student/guardian/{}", guardian);
        let (status, body) = send(app(upstream.clone()), get_request(&uri)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", guardian);
        assert!(body["error"].is_string());
        assert!(body["details"].is_string());
        assert!(body["timestamp"].is_string());
    }
}

#[tokio::test]
async fn test_unreachable_upstream_becomes_error_envelope() {
    let app = app("http://127.0.0.1:9".to_string());

    let (status, body) = send(app, get_request("/api/guardian-student/guardian/g1")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to reach backend");
}

#[tokio::test]
async fn test_create_relation_rejects_missing_fields() {
    let app = app(start_upstream().await);

    let (status, body) = send(app, post_request(json!({"guardianId": "g1", "relationship": ""}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");
    assert_eq!(body["details"], "Required: studentId, relationship");
}

#[tokio::test]
async fn test_create_relation_relays_upstream_status() {
    let upstream = start_upstream().await;

    let (status, body) = send(
        app(upstream.clone()),
        post_request(json!({"guardianId": "g1", "studentId": "s1", "relationship": "mother"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["relationship"], "mother");

    let (status, body) = send(
        app(upstream),
        post_request(json!({"guardianId": "g1", "studentId": "taken", "relationship": "mother"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Already linked");
}

#[tokio::test]
async fn test_create_relation_rejects_malformed_json() {
    let app = app(start_upstream().await);
    let request = Request::builder()
        .method("POST")
        .uri("/api/guardian-student")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");
}

#[tokio::test]
async fn test_guardian_id_cannot_leave_relation_endpoint() {
    let app = app(start_upstream().await);

    let (status, body) = send(
        app,
        get_request("/api/guardian-student/guardian/..%2F..%2Fusers%2Fchildren%3Fx%3D"),
    )
    .await;

    // The encoded id reaches the relation route as one segment, never /users/children
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalChildren"], 1);
    assert_eq!(body["children"][0]["name"], "John Doe");
}

#[tokio::test]
async fn test_dot_segment_guardian_id_is_rejected() {
    let app = app(start_upstream().await);

    let (status, body) = send(app, get_request("/api/guardian-student/guardian/..")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_create_relation_accepts_numeric_ids() {
    let app = app(start_upstream().await);

    let (status, body) = send(
        app,
        post_request(json!({"guardianId": 7, "studentId": 42, "relationship": "mother"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["relationship"], "mother");
}
