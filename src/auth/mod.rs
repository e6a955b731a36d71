//! Identity and role resolution.
//!
//! Every command carries the identity of its caller. The identity is resolved
//! once per command into a [`Caller`], and services pattern-match on that
//! value instead of re-checking registries piecemeal.

use std::fmt;

use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::{Deserialize, Serialize};

use crate::entities::role_assignment::{self, RoleKind};
use crate::errors::ServiceError;

/// Header carrying the caller identity on HTTP requests.
pub const CALLER_HEADER: &str = "x-ledger-caller";

/// Opaque caller identity, e.g. a wallet address. Never empty, never padded.
///
/// Hex addresses (`0x` followed only by hex digits) are lowercased, so the
/// checksummed and plain spellings of one wallet are the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::InvalidInput(
                "identity must not be empty".to_string(),
            ));
        }
        if is_hex_address(trimmed) {
            return Ok(Self(trimmed.to_ascii_lowercase()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_hex_address(raw: &str) -> bool {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(digits) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

impl TryFrom<String> for Identity {
    type Error = ServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The single role an identity holds, with its registry id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id")]
pub enum Caller {
    Owner,
    Vendor(i32),
    Manufacturer(i32),
    Distributor(i32),
    Retailer(i32),
    Unregistered,
}

impl Caller {
    pub fn is_owner(&self) -> bool {
        matches!(self, Caller::Owner)
    }

    pub fn role_name(&self) -> &'static str {
        match self {
            Caller::Owner => "owner",
            Caller::Vendor(_) => "vendor",
            Caller::Manufacturer(_) => "manufacturer",
            Caller::Distributor(_) => "distributor",
            Caller::Retailer(_) => "retailer",
            Caller::Unregistered => "unregistered",
        }
    }

    fn from_assignment(assignment: role_assignment::Model) -> Self {
        match assignment.role {
            RoleKind::Vendor => Caller::Vendor(assignment.role_id),
            RoleKind::Manufacturer => Caller::Manufacturer(assignment.role_id),
            RoleKind::Distributor => Caller::Distributor(assignment.role_id),
            RoleKind::Retailer => Caller::Retailer(assignment.role_id),
        }
    }
}

/// A resolved caller: who is acting and in which role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub identity: Identity,
    pub caller: Caller,
}

impl Actor {
    pub fn require_owner(&self, operation: &str) -> Result<(), ServiceError> {
        if self.caller.is_owner() {
            Ok(())
        } else {
            Err(self.denied(operation))
        }
    }

    /// Rejection for a caller whose role does not permit `operation`.
    pub fn denied(&self, operation: &str) -> ServiceError {
        ServiceError::Unauthorized(format!(
            "{} ({}) may not {}",
            self.identity,
            self.caller.role_name(),
            operation
        ))
    }
}

/// Resolves `identity` to its role. The configured owner always wins.
pub async fn resolve_caller<C>(
    conn: &C,
    owner: &Identity,
    identity: &Identity,
) -> Result<Caller, ServiceError>
where
    C: ConnectionTrait,
{
    if identity == owner {
        return Ok(Caller::Owner);
    }

    let assignment = role_assignment::Entity::find_by_id(identity.as_str().to_owned())
        .one(conn)
        .await?;

    Ok(assignment
        .map(Caller::from_assignment)
        .unwrap_or(Caller::Unregistered))
}

/// Caller identity taken from the `x-ledger-caller` request header.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("missing {} header", CALLER_HEADER))
            })?;

        Identity::parse(raw)
            .map(CallerIdentity)
            .map_err(|_| ServiceError::Unauthorized(format!("empty {} header", CALLER_HEADER)))
    }
}
