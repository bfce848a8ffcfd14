//! Actor identity supplied by the upstream gateway
//!
//! Authentication happens before requests reach this service. The gateway
//! forwards the authenticated actor as three headers; this module turns them
//! into an [`Actor`] and answers role questions. Tenant isolation itself is
//! enforced by the store, whose reads never cross tenants.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use procura_core::{ActorId, TenantId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{ACTOR_HEADER, ROLE_HEADER, TENANT_HEADER};
use crate::error::{ApiError, ApiResult};

/// Role of the acting user within their tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Read-only access.
    Viewer,
    /// Runs negotiations: send, accept, reject, reopen.
    Buyer,
    Admin,
}

impl Role {
    pub fn can_mutate(&self) -> bool {
        matches!(self, Role::Buyer | Role::Admin)
    }
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VIEWER" => Ok(Role::Viewer),
            "BUYER" => Ok(Role::Buyer),
            "ADMIN" => Ok(Role::Admin),
            other => Err(ApiError::unauthorized(format!("Unknown role '{}'", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Viewer => "VIEWER",
            Role::Buyer => "BUYER",
            Role::Admin => "ADMIN",
        };
        write!(f, "{}", s)
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub actor_id: ActorId,
    pub tenant_id: TenantId,
    pub role: Role,
}

impl Actor {
    pub fn new(actor_id: ActorId, tenant_id: TenantId, role: Role) -> Self {
        Self {
            actor_id,
            tenant_id,
            role,
        }
    }

    /// Fail with `Forbidden` unless the actor may change state.
    pub fn require_mutation(&self) -> ApiResult<()> {
        if self.role.can_mutate() {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "Role {} may not modify procurement records",
                self.role
            )))
        }
    }

    /// Read the actor from request headers.
    pub fn from_headers(headers: &HeaderMap) -> ApiResult<Self> {
        let tenant_id = header_str(headers, TENANT_HEADER)?
            .parse::<TenantId>()
            .map_err(|_| ApiError::invalid_format(TENANT_HEADER, "UUID"))?;
        let actor_id = header_str(headers, ACTOR_HEADER)?
            .parse::<ActorId>()
            .map_err(|_| ApiError::invalid_format(ACTOR_HEADER, "UUID"))?;
        let role = header_str(headers, ROLE_HEADER)?.parse::<Role>()?;

        Ok(Self::new(actor_id, tenant_id, role))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> ApiResult<&'a str> {
    headers
        .get(name)
        .ok_or_else(|| ApiError::unauthorized(format!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| ApiError::unauthorized(format!("Unreadable {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Actor::from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use axum::http::HeaderValue;
    use procura_core::EntityIdType;

    fn headers(tenant: &str, actor: &str, role: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(TENANT_HEADER, HeaderValue::from_str(tenant).unwrap());
        map.insert(ACTOR_HEADER, HeaderValue::from_str(actor).unwrap());
        map.insert(ROLE_HEADER, HeaderValue::from_str(role).unwrap());
        map
    }

    #[test]
    fn test_actor_from_headers() {
        let tenant = TenantId::now_v7();
        let actor_id = ActorId::now_v7();
        let actor = Actor::from_headers(&headers(
            &tenant.to_string(),
            &actor_id.to_string(),
            "buyer",
        ))
        .unwrap();
        assert_eq!(actor.tenant_id, tenant);
        assert_eq!(actor.actor_id, actor_id);
        assert_eq!(actor.role, Role::Buyer);
    }

    #[test]
    fn test_missing_header_is_unauthorized() {
        let err = Actor::from_headers(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert!(err.message.contains(TENANT_HEADER));
    }

    #[test]
    fn test_malformed_tenant_is_invalid_format() {
        let err = Actor::from_headers(&headers(
            "tenant-7",
            &ActorId::now_v7().to_string(),
            "ADMIN",
        ))
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFormat);
    }

    #[test]
    fn test_unknown_role_is_unauthorized() {
        let err = Actor::from_headers(&headers(
            &TenantId::now_v7().to_string(),
            &ActorId::now_v7().to_string(),
            "OWNER",
        ))
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }

    #[test]
    fn test_viewer_cannot_mutate() {
        let viewer = Actor::new(ActorId::now_v7(), TenantId::now_v7(), Role::Viewer);
        assert_eq!(
            viewer.require_mutation().unwrap_err().code,
            ErrorCode::Forbidden
        );

        let buyer = Actor {
            role: Role::Buyer,
            ..viewer
        };
        assert!(buyer.require_mutation().is_ok());
        assert!(Role::Admin.can_mutate());
    }
}
