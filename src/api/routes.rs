use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::handlers::{admin, auth, chapter, komik};
use super::types::AppState;
use crate::upload::Category;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_origin(AllowOrigin::list(
            state
                .config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok()),
        ))
        .max_age(Duration::from_secs(86400));

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let komik_routes = Router::new()
        .route("/", get(komik::list_komik).post(komik::create_komik))
        .route("/search", get(komik::search_komik))
        .route("/slug/:slug", get(komik::get_komik_by_slug))
        .route("/ganti-id/:id", patch(komik::ganti_id))
        .route(
            "/:id",
            get(komik::get_komik)
                .put(komik::update_komik)
                .delete(komik::soft_delete_komik),
        )
        .route("/:id/restore", put(komik::restore_komik))
        .route("/:id/permanent", delete(komik::purge_komik));

    let chapter_routes = Router::new()
        .route(
            "/",
            get(chapter::list_chapters).post(chapter::create_chapter),
        )
        .route("/komik/:komik_id", get(chapter::list_chapters_by_komik))
        .route(
            "/:id",
            get(chapter::get_chapter)
                .put(chapter::update_chapter)
                .delete(chapter::delete_chapter),
        );

    let admin_routes = Router::new().route("/orphans", get(admin::list_orphans));

    // Multipart bodies carry several page files; allow headroom above the
    // per-file ceiling enforced by the pipeline.
    let body_limit = DefaultBodyLimit::max(state.uploads.max_bytes() * 8);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/komik", komik_routes)
        .nest("/api/chapter", chapter_routes)
        .nest("/api/admin", admin_routes)
        .nest_service("/covers", ServeDir::new(state.uploads.dir(Category::Covers)))
        .nest_service("/chapter", ServeDir::new(state.uploads.dir(Category::Chapter)))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "Komik catalog API"
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db = if state.storage.ping().await {
        "connected"
    } else {
        "disconnected"
    };
    Json(json!({
        "status": "OK",
        "db": db
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::issue_token;
    use crate::config::Config;
    use crate::storage::models::User;
    use crate::storage::Storage;
    use crate::upload::UploadPipeline;

    async fn test_state(root: &std::path::Path) -> AppState {
        let config = Arc::new(Config::for_tests());
        AppState {
            storage: Storage::in_memory().await.expect("in-memory storage"),
            uploads: Arc::new(UploadPipeline::new(root.to_path_buf(), &config)),
            config,
        }
    }

    fn token_for(config: &Config, role: &str) -> String {
        let user = User {
            id: "user-1".to_string(),
            username: "tester".to_string(),
            password_hash: String::new(),
            role: role.to_string(),
            created_at: 0,
        };
        issue_token(config, &user).expect("token")
    }

    #[tokio::test]
    async fn health_reports_connected_db() {
        let tmp = tempfile::TempDir::new().unwrap();
        let app = create_router(test_state(tmp.path()).await);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["db"], "connected");
    }

    #[tokio::test]
    async fn mutation_without_token_is_unauthorized() {
        let tmp = tempfile::TempDir::new().unwrap();
        let app = create_router(test_state(tmp.path()).await);

        let response = app
            .oneshot(
                Request::post("/api/komik")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expired_token_is_unauthorized() {
        let tmp = tempfile::TempDir::new().unwrap();
        let state = test_state(tmp.path()).await;
        let expired = {
            use crate::auth::{Claims, Role};
            let claims = Claims {
                sub: "user-1".to_string(),
                username: "tester".to_string(),
                role: Role::User,
                exp: chrono::Utc::now().timestamp() - 24 * 3600,
            };
            jsonwebtoken::encode(
                &jsonwebtoken::Header::default(),
                &claims,
                &jsonwebtoken::EncodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            )
            .unwrap()
        };
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::delete("/api/komik/some-id")
                    .header(header::AUTHORIZATION, format!("Bearer {expired}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_reject_plain_users() {
        let tmp = tempfile::TempDir::new().unwrap();
        let state = test_state(tmp.path()).await;
        let token = token_for(&state.config, "user");
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::get("/api/chapter")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_token_passes_the_role_gate() {
        let tmp = tempfile::TempDir::new().unwrap();
        let state = test_state(tmp.path()).await;
        let token = token_for(&state.config, "admin");
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::get("/api/admin/orphans")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_komik_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let app = create_router(test_state(tmp.path()).await);

        let response = app
            .oneshot(
                Request::get("/api/komik/slug/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn search_requires_a_query() {
        let tmp = tempfile::TempDir::new().unwrap();
        let app = create_router(test_state(tmp.path()).await);

        let response = app
            .oneshot(
                Request::get("/api/komik/search")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
