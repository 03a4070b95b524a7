//! Per-request identity of a trusted peer service. Never persisted.

use serde::Serialize;

/// Which mechanisms actually authenticated the peer.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AuthenticatedVia {
    pub certificate: bool,
    pub header_secret: bool,
}

/// Computed by the internal auth broker and attached to request extensions.
#[derive(Debug, Clone, Serialize)]
pub struct InternalServiceIdentity {
    pub service_id: String,
    pub service_name: String,
    pub certificate_fingerprint: Option<String>,
    pub authenticated_via: AuthenticatedVia,
    pub is_internal_request: bool,
}
