//! TLS socket wrapping.
//!
//! Connections to `https` URLs are wrapped by a [`SocketFactory`] that
//! receives the connected TCP stream and a certificate verifier. The default
//! factory uses rustls with the ring provider; the default verifier accepts
//! any certificate, so callers that need real verification must install one
//! (see [`webpki_verifier`]).

use std::fmt;
use std::io;
use std::net::TcpStream;
use std::sync::Arc;

use log::debug;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{VerifierBuilderError, WebPkiServerVerifier};
use rustls::crypto::{ring::default_provider, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore};
use rustls::{SignatureScheme, StreamOwned, SupportedProtocolVersion};

use super::transport::Transport;

/// Wraps a connected TCP stream into an encrypted transport.
pub trait SocketFactory: fmt::Debug + Send + Sync {
    /// Performs the handshake with `host` over `tcp` and returns the
    /// encrypted stream. The handshake must be complete on return.
    ///
    /// `protocol` is the version pinned on the request, if any. The socket
    /// already carries the handshake timeouts.
    fn wrap(
        &self,
        host: &str,
        tcp: TcpStream,
        verifier: Arc<dyn ServerCertVerifier>,
        protocol: Option<TlsProtocol>,
    ) -> io::Result<Box<dyn Transport>>;
}

/// TLS protocol version to pin a connection to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsProtocol {
    /// TLS 1.2 only.
    Tls12,
    /// TLS 1.3 only.
    Tls13,
}

static TLS12_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS12];
static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

impl TlsProtocol {
    fn versions(&self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            TlsProtocol::Tls12 => TLS12_ONLY,
            TlsProtocol::Tls13 => TLS13_ONLY,
        }
    }
}

/// Default [`SocketFactory`] built on rustls.
#[derive(Debug, Clone, Default)]
pub struct RustlsSocketFactory {
    protocol: Option<TlsProtocol>,
}

impl RustlsSocketFactory {
    /// Factory negotiating any version the provider supports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory restricted to a single protocol version. A version pinned on
    /// the request takes precedence.
    pub fn with_protocol(protocol: TlsProtocol) -> Self {
        Self {
            protocol: Some(protocol),
        }
    }

    fn client_config(
        &self,
        verifier: Arc<dyn ServerCertVerifier>,
        protocol: Option<TlsProtocol>,
    ) -> io::Result<ClientConfig> {
        let builder = ClientConfig::builder_with_provider(Arc::new(default_provider()));
        let builder = match protocol.or(self.protocol) {
            Some(protocol) => builder.with_protocol_versions(protocol.versions()),
            None => builder.with_safe_default_protocol_versions(),
        }
        .map_err(tls_error)?;
        Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth())
    }
}

impl SocketFactory for RustlsSocketFactory {
    fn wrap(
        &self,
        host: &str,
        mut tcp: TcpStream,
        verifier: Arc<dyn ServerCertVerifier>,
        protocol: Option<TlsProtocol>,
    ) -> io::Result<Box<dyn Transport>> {
        let config = self.client_config(verifier, protocol)?;
        // url::Url::host_str keeps the brackets around IPv6 literals
        let bare_host = host.trim_start_matches('[').trim_end_matches(']');
        let server_name = ServerName::try_from(bare_host.to_string())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut conn = ClientConnection::new(Arc::new(config), server_name).map_err(tls_error)?;
        while conn.is_handshaking() {
            conn.complete_io(&mut tcp)?;
        }
        debug!(
            "TLS handshake with {host} complete ({:?})",
            conn.protocol_version()
        );
        Ok(Box::new(StreamOwned::new(conn, tcp)))
    }
}

/// Certificate verifier that accepts any server certificate.
///
/// Handshake signatures are still checked, so the peer must hold the key of
/// the certificate it presents; only the chain of trust is skipped.
#[derive(Debug)]
pub struct TrustAllVerifier {
    provider: Arc<CryptoProvider>,
}

impl TrustAllVerifier {
    /// Creates a verifier backed by the ring provider's algorithms.
    pub fn new() -> Self {
        Self {
            provider: Arc::new(default_provider()),
        }
    }
}

impl Default for TrustAllVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerCertVerifier for TrustAllVerifier {
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

/// Builds a verifier that checks certificates against the Mozilla root set
/// bundled by `webpki-roots`.
pub fn webpki_verifier() -> Result<Arc<dyn ServerCertVerifier>, VerifierBuilderError> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let verifier: Arc<dyn ServerCertVerifier> =
        WebPkiServerVerifier::builder_with_provider(Arc::new(root_store), Arc::new(default_provider()))
            .build()?;
    Ok(verifier)
}

/// TLS overrides carried by a request.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Certificate verifier; [`TrustAllVerifier`] when unset.
    pub hostname_verifier: Option<Arc<dyn ServerCertVerifier>>,
    /// Socket factory; [`RustlsSocketFactory`] when unset.
    pub socket_factory: Option<Arc<dyn SocketFactory>>,
    /// Protocol version handed to the socket factory.
    pub protocol: Option<TlsProtocol>,
}

impl TlsOptions {
    pub(crate) fn verifier(&self) -> Arc<dyn ServerCertVerifier> {
        match &self.hostname_verifier {
            Some(verifier) => Arc::clone(verifier),
            None => Arc::new(TrustAllVerifier::new()),
        }
    }

    pub(crate) fn factory(&self) -> Arc<dyn SocketFactory> {
        match &self.socket_factory {
            Some(factory) => Arc::clone(factory),
            None => Arc::new(RustlsSocketFactory::new()),
        }
    }
}

fn tls_error(e: rustls::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webpki_verifier_builds() {
        assert!(webpki_verifier().is_ok());
    }

    #[test]
    fn test_trust_all_supports_common_schemes() {
        let schemes = TrustAllVerifier::new().supported_verify_schemes();
        assert!(schemes.contains(&SignatureScheme::ECDSA_NISTP256_SHA256));
        assert!(schemes.contains(&SignatureScheme::RSA_PSS_SHA256));
    }

    #[test]
    fn test_client_config_for_each_protocol() {
        let verifier: Arc<dyn ServerCertVerifier> = Arc::new(TrustAllVerifier::new());
        for factory in [
            RustlsSocketFactory::new(),
            RustlsSocketFactory::with_protocol(TlsProtocol::Tls12),
            RustlsSocketFactory::with_protocol(TlsProtocol::Tls13),
        ] {
            assert!(factory.client_config(Arc::clone(&verifier), None).is_ok());
            assert!(factory
                .client_config(Arc::clone(&verifier), Some(TlsProtocol::Tls12))
                .is_ok());
        }
    }

    #[test]
    fn test_tls_options_defaults() {
        let options = TlsOptions::default();
        assert!(format!("{:?}", options.factory()).contains("RustlsSocketFactory"));
        assert!(format!("{:?}", options.verifier()).contains("TrustAllVerifier"));
        assert_eq!(options.protocol, None);
    }

    #[test]
    fn test_pinned_versions_are_single() {
        assert_eq!(TlsProtocol::Tls12.versions().len(), 1);
        assert_eq!(TlsProtocol::Tls12.versions()[0].version, rustls::ProtocolVersion::TLSv1_2);
        assert_eq!(TlsProtocol::Tls13.versions()[0].version, rustls::ProtocolVersion::TLSv1_3);
    }
}
