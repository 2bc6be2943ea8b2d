//! TLS transport
//!
//! Secured variant of [`Transport`]: plain TCP connect followed by a rustls
//! client handshake. By default the server certificate is not validated.

use crate::io::transport::{connect_tcp, Transport, TransportFuture};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use std::fs::File;
use std::io::{self, BufReader};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

/// TLS-over-TCP transport
///
/// # Examples
///
/// ```no_run
/// use asynctcp::io::tls::TlsTransport;
///
/// // Accept any certificate, use "device.local" for SNI
/// let transport = TlsTransport::new().server_name("device.local");
/// ```
#[derive(Clone)]
pub struct TlsTransport {
    connector: TlsConnector,
    server_name: Option<String>,
    keep_alive: bool,
}

impl TlsTransport {
    /// TLS transport that accepts any server certificate
    pub fn new() -> Self {
        Self::with_config(Arc::new(insecure_tls_config()))
    }

    /// TLS transport with a caller-supplied rustls configuration
    pub fn with_config(config: Arc<rustls::ClientConfig>) -> Self {
        Self {
            connector: TlsConnector::from(config),
            server_name: None,
            keep_alive: true,
        }
    }

    /// Name presented for SNI; defaults to the endpoint's IP address
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Enable or disable `SO_KEEPALIVE` on new connections
    pub fn keep_alive(mut self, enable: bool) -> Self {
        self.keep_alive = enable;
        self
    }

    fn resolve_server_name(&self, endpoint: SocketAddr) -> io::Result<ServerName<'static>> {
        match &self.server_name {
            Some(name) => ServerName::try_from(name.clone()).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Invalid hostname: {}", e),
                )
            }),
            None => Ok(ServerName::from(endpoint.ip())),
        }
    }
}

impl Default for TlsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTransport")
            .field("server_name", &self.server_name)
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}

impl Transport for TlsTransport {
    type Socket = TcpStream;
    type Stream = TlsStream<TcpStream>;

    fn is_secure(&self) -> bool {
        true
    }

    fn connect(&self, endpoint: SocketAddr) -> TransportFuture<'_, TcpStream> {
        Box::pin(connect_tcp(endpoint, self.keep_alive))
    }

    fn handshake(
        &self,
        socket: TcpStream,
        endpoint: SocketAddr,
    ) -> TransportFuture<'_, TlsStream<TcpStream>> {
        Box::pin(async move {
            let server_name = self.resolve_server_name(endpoint)?;
            let stream = self
                .connector
                .connect(server_name, socket)
                .await
                .map_err(|e| {
                    warn!(endpoint = %endpoint, error = %e, "TLS handshake failed");
                    e
                })?;
            debug!(endpoint = %endpoint, "TLS session established");
            Ok(stream)
        })
    }
}

/// Verifier that accepts every server certificate
///
/// Signature schemes are advertised from the active crypto provider.
#[derive(Debug)]
struct AcceptAnyCertificate {
    schemes: Vec<SignatureScheme>,
}

impl AcceptAnyCertificate {
    fn new() -> Self {
        let schemes = match CryptoProvider::get_default() {
            Some(provider) => provider.signature_verification_algorithms.supported_schemes(),
            None => rustls::crypto::aws_lc_rs::default_provider()
                .signature_verification_algorithms
                .supported_schemes(),
        };
        Self { schemes }
    }
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer,
        _intermediates: &[CertificateDer],
        _server_name: &ServerName,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes.clone()
    }
}

/// Create a TLS client configuration that accepts any certificate (INSECURE)
///
/// Peers are typically devices with self-signed certificates.
pub fn insecure_tls_config() -> rustls::ClientConfig {
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate::new()))
        .with_no_client_auth()
}

/// Create a TLS client configuration that validates against the system roots
///
/// Certificates the platform store holds but rustls cannot parse are skipped.
pub fn native_roots_tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();
    let native_certs = rustls_native_certs::load_native_certs();

    if !native_certs.errors.is_empty() {
        warn!(
            error_count = native_certs.errors.len(),
            "Some native certificates failed to load"
        );
    }

    let (added, ignored) = root_store.add_parsable_certificates(native_certs.certs);
    debug!(added = added, ignored = ignored, "Loaded native root certificates");

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Create a TLS client configuration trusting the CA certificates in a PEM file
///
/// # Errors
///
/// - `NotFound` and other open errors from the file system
/// - `InvalidData` - The file is not PEM, or no certificate was accepted
pub fn tls_config_from_pem(path: impl AsRef<Path>) -> io::Result<rustls::ClientConfig> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Failed to open certificate file {}: {}", path.display(), e),
        )
    })?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to parse certificates: {}", e),
            )
        })?;

    let mut root_store = rustls::RootCertStore::empty();
    let (added, _) = root_store.add_parsable_certificates(certs);
    if added == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("No usable certificate in {}", path.display()),
        ));
    }

    Ok(rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth())
}
