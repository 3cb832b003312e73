//! Peer TLS trust.
//!
//! Peers authenticate each other through the signature header, not through
//! certificates. By default the peer certificate is therefore not verified;
//! a pinned CA bundle can be configured instead.

use std::fs::File;
use std::io::BufReader;
use std::sync::{Arc, Once};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::config::PeerConfig;
use crate::proxy::error::ForwardError;

static PROVIDER: Once = Once::new();

/// Install the process-wide rustls crypto provider once.
pub fn ensure_crypto_provider() {
    PROVIDER.call_once(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Client TLS settings shared by the HTTP and WebSocket relays.
#[derive(Debug, Clone)]
pub struct PeerTls {
    config: Arc<ClientConfig>,
}

impl PeerTls {
    pub fn from_config(peer: &PeerConfig) -> Result<Self, ForwardError> {
        match &peer.ca_cert_path {
            Some(path) => Self::pinned(path),
            None if peer.insecure_skip_verify => Self::insecure(),
            None => Err(ForwardError::PeerTrust(
                "either insecure_skip_verify or ca_cert_path must be set".to_string(),
            )),
        }
    }

    /// Accept any peer certificate.
    pub fn insecure() -> Result<Self, ForwardError> {
        let provider = provider();
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| ForwardError::PeerTrust(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
            .with_no_client_auth();

        tracing::warn!("Peer certificate verification disabled; trust relies on the signature header");
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Trust only certificates chaining to the PEM bundle at `path`.
    pub fn pinned(path: &str) -> Result<Self, ForwardError> {
        let file = File::open(path)
            .map_err(|e| ForwardError::PeerTrust(format!("cannot open CA bundle {path}: {e}")))?;

        let mut roots = RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
            let cert = cert
                .map_err(|e| ForwardError::PeerTrust(format!("cannot parse CA bundle {path}: {e}")))?;
            roots
                .add(cert)
                .map_err(|e| ForwardError::PeerTrust(format!("rejected CA certificate: {e}")))?;
        }
        if roots.is_empty() {
            return Err(ForwardError::PeerTrust(format!("no certificates in {path}")));
        }

        let config = ClientConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()
            .map_err(|e| ForwardError::PeerTrust(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();

        tracing::info!(ca_bundle = %path, "Peer certificates pinned to CA bundle");
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config)
    }
}

fn provider() -> Arc<CryptoProvider> {
    ensure_crypto_provider();
    Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

/// Skips chain and name validation but still checks handshake signatures,
/// so the peer must hold the key for the certificate it presents.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
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
            &self.0.signature_verification_algorithms,
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
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
