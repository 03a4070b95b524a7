//! Internal surface gatekeeper.
//!
//! Peers reach `/internal/*` through the edge TLS terminator, which forwards
//! the client certificate (when one was presented) as a URL-encoded PEM in
//! `X-Internal-Client-Cert`. The broker inspects that certificate, then
//! requires `X-Internal-Service-ID` plus either a matching
//! `X-Internal-Service-Secret` or, if configured, a valid certificate alone.
//! Any failure is a uniform 401; the response never says which check failed.

use service_core::{
    axum::{
        async_trait,
        extract::{FromRequestParts, Request, State},
        http::request::Parts,
        middleware::Next,
        response::Response,
    },
    error::AppError,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use x509_parser::pem::Pem;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::models::{AuthenticatedVia, InternalServiceIdentity};
use crate::AppState;

const CLIENT_CERT_HEADER: &str = "x-internal-client-cert";
const SERVICE_ID_HEADER: &str = "x-internal-service-id";
const SERVICE_SECRET_HEADER: &str = "x-internal-service-secret";

/// What the forwarded client certificate told us.
struct CertificateInfo {
    fingerprint: String,
    subject: String,
}

/// Parse the forwarded PEM and check its validity window. An unparseable or
/// out-of-window certificate counts as absent, not as an error response.
fn inspect_client_cert(raw_header: &str) -> Option<CertificateInfo> {
    let pem_text = urlencoding::decode(raw_header).ok()?;

    let (pem, _) = Pem::read(std::io::Cursor::new(pem_text.as_bytes()))
        .map_err(|e| tracing::warn!(error = %e, "Unparseable client certificate PEM"))
        .ok()?;

    let (_, cert) = X509Certificate::from_der(&pem.contents)
        .map_err(|e| tracing::warn!(error = %e, "Unparseable client certificate DER"))
        .ok()?;

    if !cert.validity().is_valid() {
        tracing::warn!(
            subject = %cert.subject(),
            "Client certificate outside validity window"
        );
        return None;
    }

    let fingerprint = hex::encode(Sha256::digest(&pem.contents));

    Some(CertificateInfo {
        fingerprint,
        subject: cert.subject().to_string(),
    })
}

pub async fn internal_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let endpoint = req.uri().path().to_string();

    // Step 1: certificate inspection, independent of the header checks.
    let cert_info = req
        .headers()
        .get(CLIENT_CERT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(inspect_client_cert);

    if let Some(info) = &cert_info {
        tracing::debug!(
            subject = %info.subject,
            fingerprint = %info.fingerprint,
            "Client certificate accepted"
        );
    }

    // Step 2: the service must say who it is.
    let service_id = req
        .headers()
        .get(SERVICE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(service_id) = service_id else {
        tracing::warn!(endpoint = %endpoint, "Internal request without service id");
        return Err(AppError::AuthFailed(anyhow::anyhow!(
            "Missing internal service id header"
        )));
    };

    let Some(peer) = state
        .config
        .internal
        .peers
        .iter()
        .find(|p| p.service_id == service_id)
    else {
        tracing::warn!(service_id = %service_id, endpoint = %endpoint, "Unknown internal peer");
        return Err(AppError::AuthFailed(anyhow::anyhow!(
            "Unknown internal service"
        )));
    };

    // Step 3: prove it, by shared secret or by certificate alone if policy
    // allows.
    let presented_secret = req
        .headers()
        .get(SERVICE_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    let secret_ok = presented_secret
        .map(|s| s.as_bytes().ct_eq(peer.secret.as_bytes()).into())
        .unwrap_or(false);

    let has_valid_cert = cert_info.is_some();
    let cert_ok = has_valid_cert && state.config.internal.allow_certificate_only;

    if !secret_ok && !cert_ok {
        tracing::warn!(service_id = %service_id, endpoint = %endpoint, "Internal auth rejected");
        return Err(AppError::AuthFailed(anyhow::anyhow!(
            "Internal service authentication failed"
        )));
    }

    // Step 4: attach the authenticated identity for handlers.
    let identity = InternalServiceIdentity {
        service_id: peer.service_id.clone(),
        service_name: peer.service_name.clone(),
        certificate_fingerprint: cert_info.map(|i| i.fingerprint),
        authenticated_via: AuthenticatedVia {
            certificate: has_valid_cert,
            header_secret: secret_ok,
        },
        is_internal_request: true,
    };

    tracing::info!(
        service_id = %identity.service_id,
        service_name = %identity.service_name,
        via_certificate = identity.authenticated_via.certificate,
        via_secret = identity.authenticated_via.header_secret,
        endpoint = %endpoint,
        "Internal peer authenticated"
    );

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Extractor for the authenticated peer identity in internal handlers.
pub struct CurrentService(pub InternalServiceIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentService
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<InternalServiceIdentity>()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Internal identity missing from request extensions"
                ))
            })?;

        Ok(CurrentService(identity.clone()))
    }
}
