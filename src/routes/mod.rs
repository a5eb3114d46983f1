use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{field, info_span, Level};

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{self, auth, category, event, file, ticket, user};
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(user::list_users))
        .route(
            "/verify-email",
            get(user::send_email_verification).post(user::verify_email),
        )
        .route("/update-profile", patch(user::update_profile))
        .route("/:id", get(user::get_user))
}

fn category_routes() -> Router<AppState> {
    Router::new().route(
        "/",
        get(category::list_categories).post(category::create_category),
    )
}

fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(event::list_events).post(event::create_event))
        .route(
            "/:id",
            get(event::get_event)
                .patch(event::update_event)
                .delete(event::delete_event),
        )
}

fn ticket_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(ticket::create_ticket))
        .route("/event/:event_id", get(ticket::tickets_of_event))
        .route("/:id", get(ticket::get_ticket))
}

fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(file::list_files))
        .route("/upload", post(file::upload_file))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

pub fn create_routes(state: AppState) -> Router {
    let security = create_security_headers_layer(state.config.is_production());
    let cors = create_cors_layer(&state.config.cors_allowed_origins);

    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
                user_id = field::Empty,
            )
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/auth", auth_routes())
        .nest("/user", user_routes())
        .nest("/category", category_routes())
        .nest("/event", event_routes())
        .nest("/ticket", ticket_routes())
        .nest("/file", file_routes())
        .with_state(state)
        .layer(trace)
        .layer(security)
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, UserRole};
    use crate::state::testing::test_state;
    use axum::body::Body;
    use axum::http::{header, Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn seed_user(state: &AppState, email: &str, roles: &str) -> String {
        let mut session = state.store.begin().await.unwrap();
        let user = session
            .insert_user(&NewUser {
                email: email.to_string(),
                password: "unused".into(),
                full_name: Some("Test User".into()),
                dob: None,
                roles: roles.to_string(),
                phone_number: None,
            })
            .await
            .unwrap();
        session.commit().await.unwrap();
        state.tokens.sign(user.id).unwrap()
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health_check() {
        let (state, _) = test_state();
        let app = create_routes(state);

        let (status, body) = send(&app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_event_lifecycle_over_http() {
        let (state, _) = test_state();
        let admin = seed_user(&state, "admin@example.com", "user,admin").await;
        let app = create_routes(state);

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/category",
                Some(&admin),
                json!({"name": "Music"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let music = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/event",
                Some(&admin),
                json!({
                    "name": "Live Show",
                    "date": "2030-06-01T20:00:00Z",
                    "category_ids": [music],
                    "tickets": [{"name": "VIP", "price": 100, "total_qty": 10}]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["slug"], "live-show");
        assert_eq!(body["data"]["status"], "draft");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, get_request(&format!("/event/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["categories"][0]["name"], "Music");
        assert_eq!(body["data"]["tickets"][0]["name"], "VIP");

        let (status, body) = send(
            &app,
            get_request(&format!("/event?category_ids={music}&limit=5")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["total_page"], 1);

        let (status, body) = send(
            &app,
            json_request(
                Method::PATCH,
                &format!("/event/{id}"),
                Some(&admin),
                json!({"venue": null, "status": "active"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "active");

        let (status, _) = send(
            &app,
            json_request(Method::DELETE, &format!("/event/{id}"), Some(&admin), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, get_request(&format!("/ticket/event/{id}"))).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_envelopes() {
        let (state, _) = test_state();
        let user = seed_user(&state, "user@example.com", UserRole::User.as_str()).await;
        let app = create_routes(state);

        let (status, body) = send(&app, get_request("/event/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INVALID_ID");

        let (status, body) = send(&app, get_request(&format!("/event/{}", Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (status, body) = send(&app, get_request("/event?statuses=archived")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/event",
                None,
                json!({"name": "x", "date": "2030-06-01T20:00:00Z"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "AUTH_ERROR");

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/event",
                Some(&user),
                json!({"name": "x", "date": "2030-06-01T20:00:00Z"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/auth/login", None, json!({"password": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_register_login_and_me() {
        let (state, _) = test_state();
        let app = create_routes(state);

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/auth/register",
                None,
                json!({
                    "full_name": "John Rai",
                    "email": "John@Example.com",
                    "password": "Str0ng!pass",
                    "dob": "2001-09-06"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["data"].get("password").is_none());

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/auth/login",
                None,
                json!({"email": "john@example.com", "password": "Str0ng!pass"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["access_token"].as_str().unwrap().to_string();

        let request = Request::builder()
            .uri("/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "john@example.com");
    }

    #[tokio::test]
    async fn test_multipart_upload() {
        let (state, _) = test_state();
        let user = seed_user(&state, "user@example.com", "user").await;
        let app = create_routes(state);

        let boundary = "X-BOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"folder\"\r\n\r\nevents\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.png\"\r\n\
             Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/file/upload")
            .header(header::AUTHORIZATION, format!("Bearer {user}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["type"], "image/png");
        assert_eq!(body["data"]["size"], 7);
        assert!(body["data"]["file_path"].as_str().unwrap().starts_with("events/"));
        assert!(body["data"]["link"].is_string());
    }

    #[tokio::test]
    async fn test_security_headers_are_applied() {
        let (state, _) = test_state();
        let app = create_routes(state);
        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert!(response.headers().get("strict-transport-security").is_none());
    }
}
