use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use rand_core::{OsRng, RngCore};
use tracing::{info, warn};

use crate::error::AppError;
use crate::login;

/// Runtime configuration, resolved from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub catalog_path: PathBuf,
    pub public_dir: PathBuf,
    pub admin_username: String,
    /// Argon2 hash of the administrator password. The plain password is
    /// dropped as soon as the configuration is built.
    pub admin_password_hash: String,
    pub token_secret: Vec<u8>,
    /// When set, `GET /api/products` requires a valid session like the
    /// mutating routes do.
    pub protect_listing: bool,
}

impl Config {
    /// Load the configuration, hashing the administrator password.
    ///
    /// Every variable has a default so a bare start comes up with the
    /// stock `admin` account. Deployments are expected to override at
    /// least `ADMIN_PASSWORD` and `SECRET_KEY`.
    pub fn load() -> Result<Self, AppError> {
        let password = secret_var("ADMIN_PASSWORD", "admin123");
        Ok(Self {
            port: try_load("PORT", "3000"),
            catalog_path: try_load("CATALOG_PATH", "uploads/products.xlsx"),
            public_dir: try_load("PUBLIC_DIR", "public"),
            admin_username: try_load("ADMIN_USERNAME", "admin"),
            admin_password_hash: login::hash_password(&password)?,
            token_secret: token_secret(),
            protect_listing: try_load("PROTECT_LISTING", "false"),
        })
    }
}

fn var(key: &str) -> Result<String, env::VarError> {
    env::var(key)
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

/// Like [`try_load`] but never echoes the default into the logs.
fn secret_var(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| {
        warn!("{key} not set, using the built-in default");
        default.to_string()
    })
}

/// Signing key for session tokens.
///
/// Without `SECRET_KEY` a random key is generated, which keeps issued
/// tokens valid within one process lifetime only.
fn token_secret() -> Vec<u8> {
    match var("SECRET_KEY") {
        Ok(key) if !key.is_empty() => key.into_bytes(),
        _ => {
            warn!("SECRET_KEY not set, generating a random one; tokens will not survive a restart");
            let mut key = [0u8; 32];
            OsRng.fill_bytes(&mut key);
            key.to_vec()
        }
    }
}
