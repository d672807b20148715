use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, HeaderValue, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::{Account, Role},
    password::{verify_against_dummy, verify_password},
    repository::Repository,
};

/// Name of the cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "portal_session";

/// Claims
///
/// Payload of the session token. Signed with the configured session secret (HS256) and
/// validated on every request that carries the session cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account email, which is the login identifier.
    pub sub: String,
    /// Role resolved at login. A session never changes role.
    pub role: Role,
    /// Issued At (iat), seconds since the epoch.
    pub iat: i64,
    /// Expiration Time (exp). Tokens past this instant resolve to "no principal".
    pub exp: i64,
    /// Session id, only used to correlate log lines.
    pub jti: Uuid,
}

/// Principal
///
/// The authenticated identity and role of the current session. Handlers take it as an
/// extractor argument; when no valid session exists the extractor rejects with
/// `AppError::Unauthenticated`, which redirects to the login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
    pub role: Role,
}

impl Principal {
    /// Handler-level role check, a second line behind the access-control middleware.
    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// authenticate
///
/// The authentication gate. Students are consulted first, then teachers. Email uniqueness
/// across both tables is enforced at write time, so the order never hides an account.
///
/// An unknown email and a wrong password both yield `InvalidCredentials` after one Argon2
/// verification each, so neither the answer nor its latency tells which addresses exist.
pub async fn authenticate(
    repo: &dyn Repository,
    email: &str,
    password: &str,
) -> Result<Principal, AppError> {
    let account = match repo.find_student_by_email(email).await? {
        Some(student) => Some(Account::Student(student)),
        None => repo.find_teacher_by_email(email).await?.map(Account::Teacher),
    };

    let Some(account) = account else {
        verify_against_dummy(password);
        tracing::info!("login rejected: unknown account");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, account.password_hash()) {
        tracing::info!(role = %account.role(), "login rejected: password mismatch");
        return Err(AppError::InvalidCredentials);
    }

    Ok(Principal {
        email: account.email().to_string(),
        role: account.role(),
    })
}

/// issue_session_token
///
/// Signs a fresh session token for the principal, valid for `session_ttl_secs`.
pub fn issue_session_token(principal: &Principal, config: &AppConfig) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: principal.email.clone(),
        role: principal.role,
        iat: now,
        exp: now + config.session_ttl_secs,
        jti: Uuid::new_v4(),
    };
    tracing::debug!(session_id = %claims.jti, role = %claims.role, "session issued");

    let key = EncodingKey::from_secret(config.session_secret.as_bytes());
    encode(&Header::default(), &claims, &key)
        .map_err(|e| AppError::Internal(format!("session signing failed: {e}")))
}

/// decode_session_token
///
/// Returns `None` for any expired, tampered or malformed token. Callers treat that exactly
/// like a missing session.
pub fn decode_session_token(token: &str, secret: &str) -> Option<Principal> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &key, &validation) {
        Ok(data) => Some(Principal {
            email: data.claims.sub,
            role: data.claims.role,
        }),
        Err(e) => {
            tracing::debug!(error = %e, "session token rejected");
            None
        }
    }
}

/// session_cookie
///
/// `Set-Cookie` value for a new session. `Secure` is only added in production so the
/// local HTTP server keeps working.
pub fn session_cookie(token: &str, config: &AppConfig) -> Result<HeaderValue, AppError> {
    let secure = if config.env == Env::Production { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{secure}",
        config.session_ttl_secs
    ))
    .map_err(|e| AppError::Internal(format!("invalid session cookie: {e}")))
}

/// Expires the session cookie immediately.
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static(
        "portal_session=deleted; HttpOnly; SameSite=Lax; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
    )
}

/// parse_cookie
///
/// Finds a single cookie by name in the request's `Cookie` headers.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Resolves the principal carried by the request's session cookie, if any.
pub fn principal_from_headers(headers: &HeaderMap, config: &AppConfig) -> Option<Principal> {
    let token = parse_cookie(headers, SESSION_COOKIE)?;
    decode_session_token(&token, &config.session_secret)
}

/// Principal Extractor Implementation
///
/// The access-control middleware stores the resolved principal in the request extensions;
/// the extractor reuses it. Routers mounted without that middleware (unit tests, for
/// instance) fall back to decoding the cookie directly.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }
        let config = AppConfig::from_ref(state);
        principal_from_headers(&parts.headers, &config).ok_or(AppError::Unauthenticated)
    }
}
