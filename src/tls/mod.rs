//! TLS configuration
//!
//! Every `https` connection is made with BoringSSL, configured from the
//! client's [`FingerprintProfile`] so that the ClientHello matches the
//! browser the profile was captured from.
//!
//! [`FingerprintProfile`]: crate::profile::FingerprintProfile

mod cache;
mod cert;
mod compress;
mod connector;
mod fingerprint;
mod hello;
mod names;

use std::fmt;

use boring2::ssl::SslVersion;
use serde::{Deserialize, Serialize};

pub use self::{
    cert::Certificate,
    fingerprint::{Ja3, Ja4},
    hello::{is_grease, ClientHello, HelloExtension, GREASE_VALUES},
};
pub(crate) use self::{
    cert::RootCerts,
    connector::{TlsConnector, TlsOptions},
};

/// A TLS protocol version the engine negotiates.
///
/// Only TLS 1.2 and TLS 1.3 are ever accepted as a handshake outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TlsVersion {
    /// TLS 1.2 (`0x0303`).
    #[serde(rename = "tls1.2")]
    Tls12,
    /// TLS 1.3 (`0x0304`).
    #[serde(rename = "tls1.3")]
    Tls13,
}

impl TlsVersion {
    /// The wire code point.
    pub const fn code(self) -> u16 {
        match self {
            TlsVersion::Tls12 => 0x0303,
            TlsVersion::Tls13 => 0x0304,
        }
    }

    /// Maps a wire code point; anything but TLS 1.2/1.3 is `None`.
    pub const fn from_code(code: u16) -> Option<TlsVersion> {
        match code {
            0x0303 => Some(TlsVersion::Tls12),
            0x0304 => Some(TlsVersion::Tls13),
            _ => None,
        }
    }

    pub(crate) fn to_ssl(self) -> SslVersion {
        match self {
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    pub(crate) fn from_ssl(version: SslVersion) -> Option<TlsVersion> {
        if version == SslVersion::TLS1_3 {
            Some(TlsVersion::Tls13)
        } else if version == SslVersion::TLS1_2 {
            Some(TlsVersion::Tls12)
        } else {
            None
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsVersion::Tls12 => f.write_str("TLSv1.2"),
            TlsVersion::Tls13 => f.write_str("TLSv1.3"),
        }
    }
}

/// An ALPN protocol identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlpnProtocol {
    /// `http/1.1`
    #[serde(rename = "http/1.1")]
    Http1,
    /// `h2`
    #[serde(rename = "h2")]
    Http2,
    /// `h3`
    #[serde(rename = "h3")]
    Http3,
}

impl AlpnProtocol {
    /// The protocol name as sent on the wire.
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            AlpnProtocol::Http1 => b"http/1.1",
            AlpnProtocol::Http2 => b"h2",
            AlpnProtocol::Http3 => b"h3",
        }
    }

    /// Looks up a protocol by its wire name.
    pub fn from_bytes(name: &[u8]) -> Option<AlpnProtocol> {
        match name {
            b"http/1.1" => Some(AlpnProtocol::Http1),
            b"h2" => Some(AlpnProtocol::Http2),
            b"h3" => Some(AlpnProtocol::Http3),
            _ => None,
        }
    }

    /// Protocols this engine can speak after the handshake.
    pub(crate) const fn is_supported(self) -> bool {
        matches!(self, AlpnProtocol::Http1)
    }

    /// Encodes a protocol list in the length-prefixed ALPN wire format.
    pub(crate) fn encode_sequence(protos: &[AlpnProtocol]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(protos.len() * 9);
        for proto in protos {
            let name = proto.as_bytes();
            buf.push(name.len() as u8);
            buf.extend_from_slice(name);
        }
        buf
    }
}

/// Facts about the TLS session a response was received on.
///
/// Available through [`Response::tls_info`](crate::Response::tls_info) for
/// `https` responses.
#[derive(Debug, Clone)]
pub struct TlsInfo {
    pub(crate) version: TlsVersion,
    pub(crate) alpn: Option<AlpnProtocol>,
    pub(crate) ja3: Ja3,
    pub(crate) ja4: Ja4,
    pub(crate) peer_certificate: Option<Vec<u8>>,
    pub(crate) resumed: bool,
    pub(crate) client_hello: ClientHello,
}

impl TlsInfo {
    /// The negotiated protocol version.
    pub fn version(&self) -> TlsVersion {
        self.version
    }

    /// The protocol selected through ALPN, if the server selected one.
    pub fn alpn(&self) -> Option<AlpnProtocol> {
        self.alpn
    }

    /// JA3 of the ClientHello sent on this connection.
    ///
    /// Unlike [`FingerprintProfile::ja3`](crate::profile::FingerprintProfile::ja3)
    /// this reflects the real handshake: no SNI for IP literals, padding only when
    /// BoringSSL added it, and `pre_shared_key` on resumed sessions.
    pub fn ja3(&self) -> &Ja3 {
        &self.ja3
    }

    /// JA4 of the ClientHello sent on this connection.
    pub fn ja4(&self) -> &Ja4 {
        &self.ja4
    }

    /// The ClientHello sent on this connection.
    pub fn client_hello(&self) -> &ClientHello {
        &self.client_hello
    }

    /// The DER encoding of the leaf certificate presented by the server.
    pub fn peer_certificate(&self) -> Option<&[u8]> {
        self.peer_certificate.as_deref()
    }

    /// Returns true if the session was resumed from the session cache.
    pub fn session_reused(&self) -> bool {
        self.resumed
    }
}
