use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{Method, StatusCode, header},
    middleware,
    routing::{get, post, put},
};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::login;
use crate::product::{NewProduct, Product, ProductPatch};
use crate::registry::ProductRegistry;
use crate::store::SpreadsheetStore;

pub struct AppState {
    pub registry: Mutex<ProductRegistry>,
    pub config: Config,
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Load the catalog
    let store = SpreadsheetStore::new(&config.catalog_path);
    let registry = ProductRegistry::open(store)?;
    info!(
        "loaded {} products from {}",
        registry.len(),
        config.catalog_path.display()
    );

    // Setup app state
    let app_state = Arc::new(AppState {
        registry: Mutex::new(registry),
        config,
    });

    // Build router
    let app = router(app_state.clone());

    // Start server
    let address = format!("0.0.0.0:{}", app_state.config.port);
    let listener = TcpListener::bind(&address).await?;
    info!("listening on http://{address}");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Assembles the full application router, static fallback included.
///
/// Split out of [`run`] so tests can drive the service without binding a
/// socket.
pub fn router(state: Arc<AppState>) -> Router {
    let mut open = Router::new().route("/api/login", post(login::handle_login));
    let mut admin = Router::new()
        .route("/api/check-auth", get(login::check_auth))
        .route("/api/products", post(create_product))
        .route("/api/products/:barcode", put(update_product).delete(delete_product));

    // The listing is public by default; PROTECT_LISTING moves it behind the
    // session check.
    if state.config.protect_listing {
        admin = admin.route("/api/products", get(list_products));
    } else {
        open = open.route("/api/products", get(list_products));
    }

    let admin = admin.route_layer(middleware::from_fn_with_state(
        state.clone(),
        login::require_admin,
    ));

    // Anything that is not an API route falls through to the front-end, with
    // unknown paths rewritten to index.html.
    let front_end = ServeDir::new(&state.config.public_dir)
        .not_found_service(ServeFile::new(state.config.public_dir.join("index.html")));

    Router::new()
        .merge(open)
        .merge(admin)
        .fallback_service(front_end)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    // Credentialed requests forbid the wildcard origin, so echo the caller's
    // origin back instead.
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn list_products(State(state): State<Arc<AppState>>) -> Json<Vec<Product>> {
    let registry = state.registry.lock().unwrap();
    Json(registry.products().to_vec())
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let Json(draft) = payload.map_err(|_| AppError::Validation("invalid fields".into()))?;

    let mut registry = state.registry.lock().unwrap();
    let product = registry.insert(draft)?;
    info!("created product {} ({})", product.id, product.barcode);

    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    Path(barcode): Path<String>,
    payload: Result<Json<ProductPatch>, JsonRejection>,
) -> Result<Json<Product>, AppError> {
    let Json(patch) = payload.map_err(|_| AppError::Validation("invalid fields".into()))?;

    let mut registry = state.registry.lock().unwrap();
    let product = registry.update(&barcode, patch)?;
    info!("updated product {}", barcode);

    Ok(Json(product))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path(barcode): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut registry = state.registry.lock().unwrap();
    registry.remove(&barcode)?;
    info!("deleted product {}", barcode);

    Ok(Json(serde_json::json!({ "message": "deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_config(dir: &TempDir, protect_listing: bool) -> Config {
        Config {
            port: 0,
            catalog_path: dir.path().join("products.xlsx"),
            public_dir: dir.path().join("public"),
            admin_username: "admin".to_string(),
            admin_password_hash: login::hash_password("admin123").unwrap(),
            token_secret: b"router-test-secret".to_vec(),
            protect_listing,
        }
    }

    fn test_app(dir: &TempDir, protect_listing: bool) -> Router {
        let config = test_config(dir, protect_listing);
        let store = SpreadsheetStore::new(&config.catalog_path);
        let registry = ProductRegistry::open(store).unwrap();
        router(Arc::new(AppState {
            registry: Mutex::new(registry),
            config,
        }))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn login_token(app: &Router) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "admin", "password": "admin123" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn full_admin_round_trip() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);
        let token = login_token(&app).await;

        // Create
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/products",
            Some(&token),
            Some(json!({ "barcode": "123456789", "name": "Test", "price": 99.99, "unit": "pcs" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], 1);
        assert_eq!(body["price"], 99.99);

        // Duplicate barcode
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/products",
            Some(&token),
            Some(json!({ "barcode": "123456789", "name": "Other", "price": 1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "barcode already exists");

        // Delete
        let (status, body) = send(
            &app,
            Method::DELETE,
            "/api/products/123456789",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "deleted");

        // Listing is empty again
        let (status, body) = send(&app, Method::GET, "/api/products", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn login_rejects_wrong_credentials() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "admin", "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "wrong username or password");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "root", "password": "admin123" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "wrong username or password");
    }

    #[tokio::test]
    async fn mutations_require_a_token() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/products",
            None,
            Some(json!({ "barcode": "1", "name": "X", "price": 1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "no authorization");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/products",
            Some("not.a.token"),
            Some(json!({ "barcode": "1", "name": "X", "price": 1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "invalid token");
    }

    #[tokio::test]
    async fn token_for_another_subject_is_forbidden() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);

        // Signed with the right secret but the wrong subject.
        let token = login::issue_token("intruder", b"router-test-secret").unwrap();
        let (status, body) = send(&app, Method::GET, "/api/check-auth", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "no authorization");
    }

    #[tokio::test]
    async fn check_auth_names_the_administrator() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);
        let token = login_token(&app).await;

        let (status, body) = send(&app, Method::GET, "/api/check-auth", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "admin");
    }

    #[tokio::test]
    async fn update_merges_partial_payloads() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);
        let token = login_token(&app).await;

        send(
            &app,
            Method::POST,
            "/api/products",
            Some(&token),
            Some(json!({ "barcode": "555", "name": "Coffee", "price": 250.0, "unit": "kg" })),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/products/555",
            Some(&token),
            Some(json!({ "price": 270.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Coffee");
        assert_eq!(body["unit"], "kg");
        assert_eq!(body["price"], 270.0);

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/products/404404",
            Some(&token),
            Some(json!({ "price": 1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "product not found");
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);
        let token = login_token(&app).await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/products")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"barcode\": \"1\", \"name\":"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // A numeric string price fails deserialization too.
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/products",
            Some(&token),
            Some(json!({ "barcode": "1", "name": "X", "price": "99.99" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn protected_listing_requires_a_session() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, true);

        let (status, body) = send(&app, Method::GET, "/api/products", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "no authorization");

        let token = login_token(&app).await;
        let (status, body) = send(&app, Method::GET, "/api/products", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn login_sets_the_session_cookie() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, false);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "username": "admin", "password": "admin123" }).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("HttpOnly"));

        // The cookie alone authenticates a protected route.
        let token_pair = cookie.split(';').next().unwrap();
        let request = Request::builder()
            .method(Method::GET)
            .uri("/api/check-auth")
            .header(header::COOKIE, token_pair)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_paths_fall_back_to_index_html() {
        let dir = TempDir::new().unwrap();
        let public = dir.path().join("public");
        fs::create_dir_all(&public).unwrap();
        fs::write(public.join("index.html"), "<html>catalog</html>").unwrap();

        let app = test_app(&dir, false);
        let request = Request::builder()
            .method(Method::GET)
            .uri("/some/deep/client-route")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<html>catalog</html>");
    }

    #[tokio::test]
    async fn catalog_survives_a_restart() {
        let dir = TempDir::new().unwrap();
        {
            let app = test_app(&dir, false);
            let token = login_token(&app).await;
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/products",
                Some(&token),
                Some(json!({ "barcode": "777", "name": "Persistent", "price": 10.0 })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        // A fresh router over the same directory sees the product.
        let app = test_app(&dir, false);
        let (status, body) = send(&app, Method::GET, "/api/products", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["barcode"], "777");
        assert_eq!(body[0]["name"], "Persistent");
    }
}
