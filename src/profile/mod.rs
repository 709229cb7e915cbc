//! Browser fingerprint profiles.
//!
//! A [`FingerprintProfile`] is plain data: the ordered cipher suites, extensions,
//! groups and signature algorithms a browser puts in its ClientHello, plus the
//! request headers it sends. The TLS connector is configured from this data
//! alone, so adding a browser means adding a profile to a [`Catalog`], never
//! touching the handshake code.

mod browser;
mod catalog;
mod selector;

use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

pub use self::{catalog::Catalog, selector::ProfileSelector};
use crate::{
    header::{parse_header, HeaderMap, OrigHeaderMap},
    tls::{AlpnProtocol, ClientHello, Ja3, Ja4, TlsVersion},
    Result,
};

/// The name of a profile in a [`Catalog`], e.g. `chrome_120`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(Cow<'static, str>);

impl ProfileId {
    /// The id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for ProfileId {
    fn from(id: &'static str) -> Self {
        ProfileId(Cow::Borrowed(id))
    }
}

impl From<String> for ProfileId {
    fn from(id: String) -> Self {
        ProfileId(Cow::Owned(id))
    }
}

impl PartialEq<str> for ProfileId {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for ProfileId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A ClientHello extension a profile can place in its extension order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extension {
    /// `server_name` (0)
    ServerName,
    /// `status_request` (5)
    StatusRequest,
    /// `supported_groups` (10)
    SupportedGroups,
    /// `ec_point_formats` (11)
    EcPointFormats,
    /// `signature_algorithms` (13)
    SignatureAlgorithms,
    /// `application_layer_protocol_negotiation` (16)
    #[serde(rename = "alpn")]
    ApplicationLayerProtocolNegotiation,
    /// `signed_certificate_timestamp` (18)
    SignedCertificateTimestamp,
    /// `padding` (21)
    Padding,
    /// `extended_master_secret` (23)
    ExtendedMasterSecret,
    /// `compress_certificate` (27)
    CompressCertificate,
    /// `record_size_limit` (28)
    RecordSizeLimit,
    /// `delegated_credentials` (34)
    DelegatedCredentials,
    /// `session_ticket` (35)
    SessionTicket,
    /// `supported_versions` (43)
    SupportedVersions,
    /// `psk_key_exchange_modes` (45)
    PskKeyExchangeModes,
    /// `key_share` (51)
    KeyShare,
    /// `application_settings` (17513)
    ApplicationSettings,
    /// `renegotiation_info` (65281)
    RenegotiationInfo,
    /// `encrypted_client_hello` (65037), sent as GREASE
    EncryptedClientHello,
}

impl Extension {
    /// The IANA code point.
    pub const fn code(self) -> u16 {
        match self {
            Extension::ServerName => 0,
            Extension::StatusRequest => 5,
            Extension::SupportedGroups => 10,
            Extension::EcPointFormats => 11,
            Extension::SignatureAlgorithms => 13,
            Extension::ApplicationLayerProtocolNegotiation => 16,
            Extension::SignedCertificateTimestamp => 18,
            Extension::Padding => 21,
            Extension::ExtendedMasterSecret => 23,
            Extension::CompressCertificate => 27,
            Extension::RecordSizeLimit => 28,
            Extension::DelegatedCredentials => 34,
            Extension::SessionTicket => 35,
            Extension::SupportedVersions => 43,
            Extension::PskKeyExchangeModes => 45,
            Extension::KeyShare => 51,
            Extension::ApplicationSettings => 17513,
            Extension::RenegotiationInfo => 65281,
            Extension::EncryptedClientHello => 65037,
        }
    }

    /// Looks up an extension by code point.
    pub fn from_code(code: u16) -> Option<Extension> {
        const ALL: [Extension; 19] = [
            Extension::ServerName,
            Extension::StatusRequest,
            Extension::SupportedGroups,
            Extension::EcPointFormats,
            Extension::SignatureAlgorithms,
            Extension::ApplicationLayerProtocolNegotiation,
            Extension::SignedCertificateTimestamp,
            Extension::Padding,
            Extension::ExtendedMasterSecret,
            Extension::CompressCertificate,
            Extension::RecordSizeLimit,
            Extension::DelegatedCredentials,
            Extension::SessionTicket,
            Extension::SupportedVersions,
            Extension::PskKeyExchangeModes,
            Extension::KeyShare,
            Extension::ApplicationSettings,
            Extension::RenegotiationInfo,
            Extension::EncryptedClientHello,
        ];
        ALL.into_iter().find(|ext| ext.code() == code)
    }
}

/// A certificate compression algorithm (RFC 8879).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertCompression {
    /// zlib (1)
    Zlib,
    /// brotli (2)
    Brotli,
    /// zstd (3)
    Zstd,
}

impl CertCompression {
    /// The IANA code point.
    pub const fn code(self) -> u16 {
        match self {
            CertCompression::Zlib => 1,
            CertCompression::Brotli => 2,
            CertCompression::Zstd => 3,
        }
    }
}

fn default_versions() -> Vec<TlsVersion> {
    vec![TlsVersion::Tls13, TlsVersion::Tls12]
}

fn default_point_formats() -> Vec<u8> {
    vec![0]
}

fn default_alpn() -> Vec<AlpnProtocol> {
    vec![AlpnProtocol::Http2, AlpnProtocol::Http1]
}

/// The raw parameters of a profile.
///
/// Lists are in the order the browser sends them. Code points are IANA values;
/// GREASE is not listed explicitly and is controlled by `grease`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct ProfileParams {
    /// Catalog name.
    #[builder(setter(into))]
    pub id: ProfileId,

    /// `supported_versions`, most preferred first.
    #[builder(default = default_versions())]
    #[serde(default = "default_versions")]
    pub supported_versions: Vec<TlsVersion>,

    /// Cipher suite code points.
    #[builder(setter(into))]
    pub cipher_suites: Vec<u16>,

    /// Extension order.
    #[builder(setter(into))]
    pub extensions: Vec<Extension>,

    /// `supported_groups` code points.
    #[builder(setter(into))]
    pub supported_groups: Vec<u16>,

    /// `ec_point_formats`.
    #[builder(default = default_point_formats(), setter(into))]
    #[serde(default = "default_point_formats")]
    pub point_formats: Vec<u8>,

    /// `signature_algorithms` code points.
    #[builder(setter(into))]
    pub signature_algorithms: Vec<u16>,

    /// The ALPN list the browser declares.
    #[builder(default = default_alpn(), setter(into))]
    #[serde(default = "default_alpn")]
    pub alpn: Vec<AlpnProtocol>,

    /// `compress_certificate` algorithms.
    #[builder(default, setter(into))]
    #[serde(default)]
    pub cert_compression: Vec<CertCompression>,

    /// `delegated_credentials` signature algorithms.
    #[builder(default, setter(into))]
    #[serde(default)]
    pub delegated_credentials: Vec<u16>,

    /// `record_size_limit` value, `0x4001` when unset.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub record_size_limit: Option<u16>,

    /// Whether GREASE values are inserted.
    #[builder(default)]
    #[serde(default)]
    pub grease: bool,

    /// Default request headers, spelled and ordered as the browser sends them.
    #[builder(default, setter(into))]
    #[serde(default)]
    pub headers: Vec<(Cow<'static, str>, Cow<'static, str>)>,

    /// Order of header names on the wire, including names that only appear on
    /// some requests (`Content-Length`, `Cookie`, ..). Empty means `Host`
    /// followed by the order of `headers`.
    #[builder(default, setter(into))]
    #[serde(default)]
    pub header_order: Vec<Cow<'static, str>>,
}

/// An immutable browser fingerprint with its derived JA3 and JA4.
///
/// The fingerprints describe the ClientHello the engine offers for this profile
/// to a named host: the declared ALPN list is narrowed to `http/1.1` and
/// application settings are dropped with `h2`, so a profile declaring `h2`
/// reports `h1` in its JA4. Fingerprints of the hello actually sent on a
/// connection, padding and resumption included, are on
/// [`TlsInfo`](crate::tls::TlsInfo).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ProfileParams", into = "ProfileParams")]
pub struct FingerprintProfile {
    params: ProfileParams,
    ja3: Ja3,
    ja4: Ja4,
}

impl FingerprintProfile {
    /// Derives the fingerprints of `params`.
    pub fn new(params: ProfileParams) -> FingerprintProfile {
        let hello = ClientHello::from_profile(&params, Some("example.com"), &offered_alpn(&params));
        FingerprintProfile {
            ja3: Ja3::from_hello(&hello),
            ja4: Ja4::from_hello(&hello),
            params,
        }
    }

    /// The catalog name.
    pub fn id(&self) -> &ProfileId {
        &self.params.id
    }

    /// All parameters.
    pub fn params(&self) -> &ProfileParams {
        &self.params
    }

    /// Cipher suites in offered order.
    pub fn cipher_suites(&self) -> &[u16] {
        &self.params.cipher_suites
    }

    /// Extensions in offered order.
    pub fn extensions(&self) -> &[Extension] {
        &self.params.extensions
    }

    /// Supported groups in offered order.
    pub fn supported_groups(&self) -> &[u16] {
        &self.params.supported_groups
    }

    /// The declared ALPN list.
    pub fn alpn(&self) -> &[AlpnProtocol] {
        &self.params.alpn
    }

    /// JA3 of the offered ClientHello.
    pub fn ja3(&self) -> &Ja3 {
        &self.ja3
    }

    /// JA4 of the offered ClientHello.
    pub fn ja4(&self) -> &Ja4 {
        &self.ja4
    }

    /// The ClientHello this profile offers to `server_name` on the wire.
    pub fn client_hello(&self, server_name: Option<&str>) -> ClientHello {
        ClientHello::from_profile(&self.params, server_name, &self.offered_alpn())
    }

    /// The declared ALPN list without the protocols the engine cannot speak.
    pub fn offered_alpn(&self) -> Vec<AlpnProtocol> {
        offered_alpn(&self.params)
    }

    /// Parses the default headers, keeping their spelling.
    pub(crate) fn default_headers(&self) -> Result<(HeaderMap, OrigHeaderMap)> {
        let mut headers = HeaderMap::with_capacity(self.params.headers.len());
        let mut casing = OrigHeaderMap::with_capacity(self.params.headers.len());
        for (name, value) in &self.params.headers {
            let (name, orig, value) = parse_header(name, value)?;
            headers.append(name, value);
            casing.set(orig);
        }
        Ok((headers, casing))
    }

    /// The wire order of header names.
    pub(crate) fn header_order(&self) -> OrigHeaderMap {
        let mut order = OrigHeaderMap::with_capacity(self.params.header_order.len() + 1);
        if self.params.header_order.is_empty() {
            order.insert("Host");
            for (name, _) in &self.params.headers {
                order.insert(name.to_string());
            }
        } else {
            for name in &self.params.header_order {
                order.insert(name.to_string());
            }
        }
        order
    }
}

fn offered_alpn(params: &ProfileParams) -> Vec<AlpnProtocol> {
    params
        .alpn
        .iter()
        .copied()
        .filter(|p| p.is_supported())
        .collect()
}

impl From<ProfileParams> for FingerprintProfile {
    fn from(params: ProfileParams) -> Self {
        FingerprintProfile::new(params)
    }
}

impl From<FingerprintProfile> for ProfileParams {
    fn from(profile: FingerprintProfile) -> Self {
        profile.params
    }
}

impl PartialEq for FingerprintProfile {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params
    }
}

impl Eq for FingerprintProfile {}
