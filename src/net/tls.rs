//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;

/// Error type for certificate loading.
#[derive(Debug)]
pub enum TlsError {
    Io(std::io::Error),
    NoPrivateKey,
    Rustls(rustls::Error),
}

impl std::fmt::Display for TlsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsError::Io(e) => write!(f, "Failed to read certificate material: {}", e),
            TlsError::NoPrivateKey => write!(f, "No private key found in key file"),
            TlsError::Rustls(e) => write!(f, "Invalid certificate or key: {}", e),
        }
    }
}

impl std::error::Error for TlsError {}

/// Load the certificate chain and private key and build a TLS acceptor.
///
/// Called once at startup; the resulting acceptor is shared read-only by the
/// accept loop for the life of the process.
pub fn load_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, TlsError> {
    // Basic validation
    if !cert_path.exists() {
        return Err(TlsError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        )));
    }
    if !key_path.exists() {
        return Err(TlsError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        )));
    }

    let mut cert_reader = BufReader::new(File::open(cert_path).map_err(TlsError::Io)?);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsError::Io)?;

    let mut key_reader = BufReader::new(File::open(key_path).map_err(TlsError::Io)?);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(TlsError::Io)?
        .ok_or(TlsError::NoPrivateKey)?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(TlsError::Rustls)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
