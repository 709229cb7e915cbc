use std::fmt;

use boring2::{
    ssl::SslConnectorBuilder,
    x509::{store::X509StoreBuilder, X509},
};

use crate::{Error, Result};

/// A trusted root certificate.
///
/// Added to a client with
/// [`ClientBuilder::add_root_certificate`](crate::ClientBuilder::add_root_certificate).
#[derive(Clone)]
pub struct Certificate(X509);

impl Certificate {
    /// Parses a DER encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Certificate> {
        X509::from_der(der).map(Certificate).map_err(Error::builder)
    }

    /// Parses a PEM encoded certificate.
    pub fn from_pem(pem: &[u8]) -> Result<Certificate> {
        X509::from_pem(pem).map(Certificate).map_err(Error::builder)
    }

    /// Parses every certificate of a PEM bundle.
    pub fn from_pem_bundle(pem: &[u8]) -> Result<Vec<Certificate>> {
        X509::stack_from_pem(pem)
            .map(|certs| certs.into_iter().map(Certificate).collect())
            .map_err(Error::builder)
    }

    /// The DER encoding of the certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.0.to_der().map_err(Error::builder)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate").finish()
    }
}

/// The trust anchors a connector verifies servers against.
#[derive(Clone, Debug)]
pub(crate) struct RootCerts {
    pub(crate) built_in: bool,
    pub(crate) extra: Vec<Certificate>,
}

impl Default for RootCerts {
    fn default() -> Self {
        RootCerts {
            built_in: true,
            extra: Vec::new(),
        }
    }
}

impl RootCerts {
    pub(crate) fn apply(&self, builder: &mut SslConnectorBuilder) -> Result<()> {
        if self.extra.is_empty() {
            if self.built_in {
                builder.set_default_verify_paths().map_err(Error::tls)?;
            }
            return Ok(());
        }

        let mut store = X509StoreBuilder::new().map_err(Error::tls)?;
        if self.built_in {
            store.set_default_paths().map_err(Error::tls)?;
        }
        for cert in &self.extra {
            store.add_cert(cert.0.clone()).map_err(Error::tls)?;
        }
        builder
            .set_verify_cert_store(store.build())
            .map_err(Error::tls)
    }
}
