//! Tenant/user resolution for the three public operations.
//!
//! Authentication, tenant provisioning, and request routing live outside
//! this core — by the time a request reaches it, the caller has already
//! authorized it and resolved the tenant identity. This extractor is the
//! seam where that resolved identity enters: a production deployment
//! replaces it with whatever `Extension` its own auth middleware injects,
//! but the core itself only ever requires the two headers below.

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;

use crate::models::TenantId;

pub struct RequestContext {
    pub tenant: TenantId,
    pub user: Option<String>,
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .headers
            .get("x-tenant-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or((StatusCode::UNAUTHORIZED, "missing X-Tenant-Id header"))?;

        let user = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Ok(Self { tenant: TenantId::from(tenant), user })
    }
}
