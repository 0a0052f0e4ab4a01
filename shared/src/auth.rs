use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use lambda_http::http::HeaderMap;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use hyrax_atoms::users::model::{LoginPayload, User};
use hyrax_atoms::users::service as users;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_TTL_SECS: i64 = 12 * 60 * 60;

/// Claims carried inside the bearer token. The token is opaque to clients;
/// they pass it back verbatim in the Authorization header.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User email, the directory's unique key.
    pub sub: String,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

fn sign(secret: &str, payload: &[u8]) -> Result<Vec<u8>, String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("Bad auth secret: {}", e))?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Issue a signed token: `base64url(claims).base64url(hmac)`.
pub fn issue_token(secret: &str, email: &str) -> Result<String, String> {
    let claims = TokenClaims {
        sub: email.to_string(),
        exp: chrono::Utc::now().timestamp() + TOKEN_TTL_SECS,
    };
    let payload = serde_json::to_vec(&claims).map_err(|e| e.to_string())?;
    let signature = sign(secret, &payload)?;
    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(payload),
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Verify signature and expiry, returning the claims.
pub fn verify_token(secret: &str, token: &str) -> Result<TokenClaims, String> {
    let (payload_b64, signature_b64) = token
        .split_once('.')
        .ok_or_else(|| "Malformed token".to_string())?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| "Malformed token".to_string())?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| "Malformed token".to_string())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("Bad auth secret: {}", e))?;
    mac.update(&payload);
    mac.verify_slice(&signature)
        .map_err(|_| "Invalid token signature".to_string())?;

    let claims: TokenClaims =
        serde_json::from_slice(&payload).map_err(|_| "Malformed token".to_string())?;
    if claims.exp < chrono::Utc::now().timestamp() {
        return Err("Token expired".to_string());
    }
    Ok(claims)
}

fn unauthorized(message: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(
            serde_json::json!({"success": false, "message": message})
                .to_string()
                .into(),
        )
        .unwrap_or_default()
}

/// Handle POST /login: case-insensitive email lookup, verbatim password
/// comparison, then a profile plus bearer token on success.
pub async fn login(
    secret: &str,
    directory_users: &[User],
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let payload: LoginPayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Malformed login payload: {}", e);
            return Ok(unauthorized("Invalid email or password"));
        }
    };

    match users::verify_login(directory_users, &payload.email, &payload.password) {
        Some(user) => {
            let token = match issue_token(secret, &user.email) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to issue token: {}", e);
                    return Ok(unauthorized("Login unavailable"));
                }
            };
            tracing::info!(email = %user.email, "Login succeeded");
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json")
                .header("Access-Control-Allow-Origin", "*")
                .body(
                    serde_json::json!({
                        "success": true,
                        "token": token,
                        "user": user.sanitized(),
                    })
                    .to_string()
                    .into(),
                )
                .map_err(Box::new)?)
        }
        None => {
            tracing::info!(email = %payload.email, "Login rejected");
            Ok(unauthorized("Invalid email or password"))
        }
    }
}

/// Authenticate a protected request from its Authorization header,
/// resolving the calling user from the directory. Failure hands back the
/// ready-made 401 response so route arms can return it directly.
pub fn authenticate_request<'a>(
    secret: &str,
    directory_users: &'a [User],
    headers: &HeaderMap,
) -> Result<&'a User, Response<Body>> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| unauthorized("Missing bearer token"))?;

    let claims = verify_token(secret, token).map_err(|e| unauthorized(&e))?;

    users::find_by_email(directory_users, &claims.sub)
        .ok_or_else(|| unauthorized("Unknown user"))
}
