use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::utils::token::TokenIssuer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Student,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Student => "student",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

/// Verified caller, inserted as a request extension by [`require_role`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}

impl CurrentUser {
    /// Students may only read their own records; admins read everything.
    pub fn ensure_self_or_admin(&self, student_id: Uuid) -> Result<()> {
        match self.role {
            Role::Admin => Ok(()),
            _ if self.id == student_id => Ok(()),
            _ => Err(Error::Forbidden("Cannot access another student's records".into())),
        }
    }
}

#[derive(Clone)]
pub struct RoleGate {
    issuer: TokenIssuer,
    allowed: &'static [Role],
}

impl RoleGate {
    pub fn new(issuer: TokenIssuer, allowed: &'static [Role]) -> Self {
        Self { issuer, allowed }
    }
}

fn reject(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}

fn bearer_token(headers: &HeaderMap) -> std::result::Result<String, Response> {
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(reject(StatusCode::UNAUTHORIZED, "missing_authorization"));
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return Err(reject(StatusCode::UNAUTHORIZED, "bad_authorization"));
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err(reject(StatusCode::UNAUTHORIZED, "unsupported_scheme"));
    };
    Ok(token.trim().to_string())
}

pub async fn require_role(State(gate): State<RoleGate>, mut req: Request, next: Next) -> Response {
    let token = match bearer_token(req.headers()) {
        Ok(token) => token,
        Err(resp) => return resp,
    };

    let Ok(claims) = gate.issuer.verify(&token) else {
        return reject(StatusCode::UNAUTHORIZED, "invalid_token");
    };
    let Ok(id) = Uuid::parse_str(&claims.sub) else {
        return reject(StatusCode::UNAUTHORIZED, "invalid_token");
    };
    if !gate.allowed.is_empty() && !gate.allowed.contains(&claims.role) {
        tracing::warn!(user = %id, role = %claims.role, "role not allowed on route");
        return reject(StatusCode::FORBIDDEN, "forbidden");
    }

    req.extensions_mut().insert(CurrentUser { id, role: claims.role });
    next.run(req).await
}
