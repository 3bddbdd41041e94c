//! Admin authentication - Credential check and the per-session lockout counter.
//!
//! There is exactly one administrative account. Its password is stored only as an
//! argon2 PHC string (salt included). Each browser session counts its own
//! consecutive login failures; after [`MAX_FAILED_LOGINS`] the session refuses
//! further attempts until it is discarded.

use crate::errors::{Error, Result};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Consecutive failures after which a session is locked out.
pub const MAX_FAILED_LOGINS: u32 = 5;

/// Hashes a password into an argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// The administrative credential
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    username: String,
    password_hash: String,
}

impl AdminCredentials {
    /// Builds credentials, rejecting a hash that is not a valid PHC string.
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Result<Self> {
        let password_hash = password_hash.into();
        PasswordHash::new(&password_hash)?;
        Ok(Self {
            username: username.into(),
            password_hash,
        })
    }

    /// Whether `username`/`password` match.
    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.password_hash) else {
            return false;
        };
        // Always run the hash so a wrong username costs the same as a wrong password
        let password_ok = Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
        password_ok && username == self.username
    }
}

/// Runs [`AdminCredentials::verify`] on the blocking pool so the hash does not
/// stall a runtime worker.
///
/// # Errors
/// [`Error::PasswordHash`] if the blocking task could not complete.
pub async fn verify_in_background(
    credentials: Arc<AdminCredentials>,
    username: String,
    password: String,
) -> Result<bool> {
    tokio::task::spawn_blocking(move || credentials.verify(&username, &password))
        .await
        .map_err(|e| {
            error!("Password check task failed: {}", e);
            Error::PasswordHash {
                message: e.to_string(),
            }
        })
}

/// Per-session authentication state
#[derive(Debug, Clone)]
pub struct Session {
    /// Whether the admin has logged in on this session
    pub authenticated: bool,
    /// Consecutive failed logins
    pub failed_logins: u32,
    /// Anti-forgery token clients must echo on mutating admin calls
    pub csrf_token: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh anonymous session with its own anti-forgery token
    #[must_use]
    pub fn new() -> Self {
        Self {
            authenticated: false,
            failed_logins: 0,
            csrf_token: new_token(),
        }
    }

    /// Whether further login attempts are refused
    #[must_use]
    pub const fn is_locked_out(&self) -> bool {
        self.failed_logins >= MAX_FAILED_LOGINS
    }

    /// Whether the session carries nothing worth remembering
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        !self.authenticated && self.failed_logins == 0
    }

    /// Applies the outcome of a credential check to this session.
    ///
    /// `verified` comes from [`AdminCredentials::verify`], which is slow enough
    /// that callers run it before taking any shared lock. Success clears the
    /// failure count and rotates the anti-forgery token.
    ///
    /// # Errors
    /// - [`Error::LockedOut`] once [`MAX_FAILED_LOGINS`] failures have accumulated,
    ///   whether or not the credentials were correct.
    /// - [`Error::InvalidCredentials`] if `verified` is false; the failure is counted.
    pub fn record_login(&mut self, verified: bool) -> Result<()> {
        if self.is_locked_out() {
            warn!("Login refused: session locked out");
            return Err(Error::LockedOut);
        }

        if verified {
            self.authenticated = true;
            self.failed_logins = 0;
            self.csrf_token = new_token();
            info!("Admin logged in");
            Ok(())
        } else {
            self.failed_logins += 1;
            warn!(
                "Failed admin login ({}/{})",
                self.failed_logins, MAX_FAILED_LOGINS
            );
            Err(Error::InvalidCredentials)
        }
    }

    /// Checks that the session may perform a mutating admin call.
    ///
    /// # Errors
    /// [`Error::Unauthorized`] if not logged in (checked first), then
    /// [`Error::Forbidden`] if `presented` does not match the session token.
    pub fn authorize(&self, presented: Option<&str>) -> Result<()> {
        if !self.authenticated {
            return Err(Error::Unauthorized);
        }
        match presented {
            Some(token) if constant_time_eq(token.as_bytes(), self.csrf_token.as_bytes()) => {
                Ok(())
            }
            _ => Err(Error::Forbidden),
        }
    }
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
