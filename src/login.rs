use crate::app::AppState;
use crate::error::AppError;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Request, State, rejection::JsonRejection},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the session cookie carrying the signed token.
pub const TOKEN_COOKIE: &str = "token";

const TOKEN_TTL_SECONDS: i64 = 2 * 60 * 60; // 2 hours in seconds

/// Claims carried inside a session token
///
/// The subject is the administrator username the token was issued for;
/// `exp` is a unix timestamp checked on every verification.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token belongs to
    pub sub: String,

    /// Expiration time as seconds since the unix epoch
    pub exp: i64,
}

/// Credential data received from the login form
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username to authenticate as
    pub username: String,

    /// Password in plaintext (only transmitted, never stored)
    pub password: String,
}

/// Body returned on a successful login
///
/// The same token is also set as an http-only cookie; the body copy exists
/// for clients that prefer an `Authorization: Bearer` header.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// The authenticated username, inserted into request extensions by
/// [`require_admin`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

/// Hash a password using Argon2
///
/// Creates a cryptographically secure hash of a password using Argon2id.
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Returns
/// * `Result<String, AppError>` - The password hash or an error
///
/// # Examples
/// ```
/// use product_admin::login::hash_password;
///
/// let hash = hash_password("admin123").unwrap();
/// assert!(hash.starts_with("$argon2"));
/// ```
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err(AppError::Auth),
    }
}

/// Verify a password against a stored hash
///
/// # Arguments
/// * `password` - The plaintext password to verify
/// * `hash` - The stored password hash to check against
///
/// # Returns
/// * `Result<bool, AppError>` - True if the password matches, false if not
///
/// # Errors
/// * Returns an error if the hash is in an invalid format
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err(AppError::Auth),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// Issue a signed session token for `username`, valid for two hours.
///
/// # Arguments
/// * `username` - Subject to embed in the token
/// * `secret` - HMAC key the token is signed with
pub fn issue_token(username: &str, secret: &[u8]) -> Result<String, AppError> {
    let claims = Claims {
        sub: username.to_string(),
        exp: Utc::now().timestamp() + TOKEN_TTL_SECONDS,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .map_err(|_| AppError::Auth)
}

/// Decode and validate a session token.
///
/// Any defect, whether a bad signature, garbage input or an expired
/// timestamp, comes back as [`AppError::InvalidToken`].
pub fn verify_token(token: &str, secret: &[u8]) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::InvalidToken)
}

/// Handle administrator login requests
///
/// Validates the submitted credentials against the configured account and,
/// when they match, issues a token both as an http-only cookie and in the
/// response body.
///
/// # Arguments
/// * `jar` - Cookie jar the session cookie is added to
/// * `payload` - JSON body containing the username and password
///
/// # Returns
/// * `Result<(CookieJar, Json<LoginResponse>), AppError>` - Cookie and token,
///   or a rejection
#[axum::debug_handler]
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let Json(credentials) = payload.map_err(|_| AppError::Validation("invalid fields".into()))?;
    let config = &state.config;

    if credentials.username != config.admin_username
        || !verify_password(&credentials.password, &config.admin_password_hash)?
    {
        debug!("rejected login attempt for {:?}", credentials.username);
        return Err(AppError::WrongCredentials);
    }

    let token = issue_token(&config.admin_username, &config.token_secret)?;
    let cookie = Cookie::build((TOKEN_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .build();

    info!("administrator logged in");
    Ok((jar.add(cookie), Json(LoginResponse { token })))
}

/// Report who the current session belongs to
///
/// Reachable only through [`require_admin`], so the extension is always
/// present here.
pub async fn check_auth(Extension(user): Extension<CurrentUser>) -> Json<serde_json::Value> {
    Json(json!({ "username": user.0 }))
}

/// Authentication middleware for the admin routes
///
/// Accepts a token from the session cookie or, failing that, from an
/// `Authorization: Bearer` header. The request proceeds only when the
/// token verifies and names the configured administrator.
///
/// # Arguments
/// * `jar` - Cookie jar possibly holding the session cookie
/// * `request` - The incoming request
/// * `next` - Next service in the chain
///
/// # Returns
/// * `Result<Response, AppError>` - The downstream response, or the
///   rejection mapped to 401/403
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1) cookie first, then the bearer header
    let token = jar
        .get(TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| bearer_token(request.headers()));
    let Some(token) = token else {
        return Err(AppError::MissingToken);
    };

    // 2) the token must verify and belong to the administrator
    let claims = verify_token(&token, &state.config.token_secret)?;
    if claims.sub != state.config.admin_username {
        debug!("token subject {:?} is not the administrator", claims.sub);
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(CurrentUser(claims.sub));
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}
