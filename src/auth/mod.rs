//! Authentication boundary.
//!
//! Credentials are verified by the upstream gateway, which forwards the
//! authenticated identity in `X-Actor-Id` and `X-Actor-Role`. This module only
//! turns those headers into an [`Actor`] and decides which roles may mutate.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Role {
    Admin,
    Staff,
    Dealer,
}

/// Authenticated caller, recorded on every history and ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Internal staff may mutate orders and stock; dealers only read.
    pub fn is_privileged(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Staff)
    }

    pub fn require_privileged(&self) -> Result<(), ServiceError> {
        if self.is_privileged() {
            Ok(())
        } else {
            warn!(actor_id = %self.id, role = %self.role, "Mutation refused for role");
            Err(ServiceError::Forbidden(format!(
                "Role {} may not perform this operation",
                self.role
            )))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ServiceError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| ServiceError::Unauthorized(format!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| ServiceError::Unauthorized(format!("Malformed {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = Uuid::parse_str(header(parts, ACTOR_ID_HEADER)?.trim())
            .map_err(|_| ServiceError::Unauthorized("Invalid actor id".to_string()))?;
        let role = Role::from_str(header(parts, ACTOR_ROLE_HEADER)?.trim())
            .map_err(|_| ServiceError::Unauthorized("Unknown actor role".to_string()))?;
        Ok(Actor { id, role })
    }
}
