use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

mod common;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_returns_envelope() {
    let app = common::create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Server is healthy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn root_returns_service_info() {
    let app = common::create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "APTX Learning Platform API");
    assert_eq!(body["data"]["version"], "v1");
}

#[tokio::test]
async fn unknown_route_is_enveloped_404() {
    let app = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nonexistent/path")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Route not found: /nonexistent/path");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn me_without_token_is_401() {
    let app = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "No authentication token provided");
}

#[tokio::test]
async fn garbage_bearer_token_is_401() {
    let app = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .header(header::AUTHORIZATION, "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn valid_access_token_passes_middleware() {
    let app = common::create_test_app();

    let token = aptx_backend::token::sign_access_token(
        "user-1",
        "kid@example.com",
        "student",
        common::TEST_JWT_SECRET,
        "1h",
    )
    .unwrap();

    // Logout is protected but store-free, so it proves the auth path
    // end to end.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/logout")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Logout successful");
}

#[tokio::test]
async fn token_signed_with_wrong_secret_is_401() {
    let app = common::create_test_app();

    let token = aptx_backend::token::sign_access_token(
        "user-1",
        "kid@example.com",
        "student",
        "some-other-secret",
        "1h",
    )
    .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/logout")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_with_missing_fields_is_400_with_field_errors() {
    let app = common::create_test_app();

    let response = app
        .oneshot(json_request(
            "/api/v1/auth/register",
            serde_json::json!({ "email": "", "password": "", "role": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    let errors = body["errors"].as_array().unwrap();
    assert!(errors.iter().any(|e| e == "email is required"));
    assert!(errors.iter().any(|e| e == "password is required"));
    assert!(errors.iter().any(|e| e == "role is required"));
}

#[tokio::test]
async fn register_with_invalid_role_is_400() {
    let app = common::create_test_app();

    let response = app
        .oneshot(json_request(
            "/api/v1/auth/register",
            serde_json::json!({
                "email": "t@example.com",
                "password": "str0ng-pass!",
                "role": "admin"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(
        body["message"],
        "Invalid role. Must be teacher, guardian, or student"
    );
}

#[tokio::test]
async fn login_with_empty_payload_is_400() {
    let app = common::create_test_app();

    let response = app
        .oneshot(json_request(
            "/api/v1/auth/login",
            serde_json::json!({ "email": "", "password": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Email and password are required");
}

#[tokio::test]
async fn refresh_with_garbage_token_is_401() {
    let app = common::create_test_app();

    let response = app
        .oneshot(json_request(
            "/api/v1/auth/refresh",
            serde_json::json!({ "refreshToken": "bogus.token.here" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid or expired refresh token");
}

#[tokio::test]
async fn refresh_with_missing_token_is_400() {
    let app = common::create_test_app();

    let response = app
        .oneshot(json_request(
            "/api/v1/auth/refresh",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn google_sign_in_requires_id_token() {
    let app = common::create_test_app();

    let response = app
        .oneshot(json_request(
            "/api/v1/auth/google",
            serde_json::json!({ "idToken": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "idToken is required");
}

#[tokio::test]
async fn curriculum_upload_requires_auth() {
    let app = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/curricula")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn curriculum_upload_requires_teacher_role() {
    let app = common::create_test_app();

    let token = aptx_backend::token::sign_access_token(
        "student-1",
        "kid@example.com",
        "student",
        common::TEST_JWT_SECRET,
        "1h",
    )
    .unwrap();

    let boundary = "test-boundary";
    let multipart_body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nPlants\r\n--{boundary}--\r\n"
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/curricula")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(multipart_body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(
        body["message"],
        "You do not have permission to access this resource"
    );
}

#[tokio::test]
async fn teacher_cannot_read_another_students_results() {
    let app = common::create_test_app();

    let token = aptx_backend::token::sign_access_token(
        "teacher-1",
        "t@example.com",
        "teacher",
        common::TEST_JWT_SECRET,
        "1h",
    )
    .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/students/student-9/results")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["message"], "You do not have access to this student");
}

#[tokio::test]
async fn support_requires_emotional_state() {
    let app = common::create_test_app();

    let token = aptx_backend::token::sign_access_token(
        "student-1",
        "kid@example.com",
        "student",
        common::TEST_JWT_SECRET,
        "1h",
    )
    .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/support")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "emotionalState is required");
}

#[tokio::test]
async fn exam_analysis_rejects_out_of_range_score() {
    let app = common::create_test_app();

    let token = aptx_backend::token::sign_access_token(
        "student-1",
        "kid@example.com",
        "student",
        common::TEST_JWT_SECRET,
        "1h",
    )
    .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/exams/e1/analyze")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({ "scorePercent": 140.0 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "scorePercent must be between 0 and 100");
}
