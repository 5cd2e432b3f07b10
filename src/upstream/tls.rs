//! TLS client configuration for upstream connections.
//!
//! Two configs exist: a verifying one built from the system root store,
//! and a trust-all one for routes that opt out of certificate
//! verification (`secure = false`). The trust-all config is never the
//! default and is only reachable through an explicit per-route flag.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use thiserror::Error;

/// Error type for TLS client setup.
#[derive(Debug, Error)]
pub enum TlsInitError {
    #[error("failed to load system root certificates: {0}")]
    RootCerts(#[from] std::io::Error),

    #[error(transparent)]
    Rustls(#[from] rustls::Error),
}

/// Build a client config that verifies upstream certificates against the
/// system root store.
pub fn verifying_client_config() -> Result<ClientConfig, TlsInitError> {
    let mut roots = RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs()? {
        // Skip platform certs rustls cannot parse; the store is still usable.
        let _ = roots.add(cert);
    }

    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(config)
}

/// Build a client config that accepts any upstream certificate.
///
/// Used only by routes configured with `secure = false`; signatures are
/// still checked so the session is encrypted, just not authenticated.
pub fn trust_all_client_config() -> Result<ClientConfig, TlsInitError> {
    let provider = rustls::crypto::ring::default_provider();
    let verifier = Arc::new(NoVerification {
        provider: provider.clone(),
    });

    let config = ClientConfig::builder_with_provider(Arc::new(provider))
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();

    Ok(config)
}

/// Certificate verifier that asserts validity for every presented chain.
#[derive(Debug)]
struct NoVerification {
    provider: CryptoProvider,
}

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
