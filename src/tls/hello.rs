//! The TLS ClientHello as a value.
//!
//! [`ClientHello::from_profile`] lays out the hello a [`FingerprintProfile`] offers to a
//! given host: cipher order, extension order and every extension body. The same type is
//! produced by [`ClientHello::parse`] from captured bytes, so fingerprints of offered and
//! observed hellos are computed by one code path.
//!
//! [`FingerprintProfile`]: crate::profile::FingerprintProfile

use bytes::{BufMut, Bytes, BytesMut};
use rand::{Rng, RngCore};

use crate::{
    profile::{Extension, ProfileParams},
    tls::AlpnProtocol,
    Error, Result,
};

/// Reserved GREASE values (RFC 8701) used for cipher suites, extensions,
/// groups and versions.
pub const GREASE_VALUES: [u16; 16] = [
    0x0a0a, 0x1a1a, 0x2a2a, 0x3a3a, 0x4a4a, 0x5a5a, 0x6a6a, 0x7a7a, 0x8a8a, 0x9a9a, 0xaaaa, 0xbaba,
    0xcaca, 0xdada, 0xeaea, 0xfafa,
];

/// Returns true if `value` is a GREASE value.
#[inline]
pub fn is_grease(value: u16) -> bool {
    value & 0x0f0f == 0x0a0a && value >> 8 == value & 0xff
}

const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
const RECORD_VERSION: u16 = 0x0301;
const LEGACY_VERSION: u16 = 0x0303;
const DEFAULT_RECORD_SIZE_LIMIT: u16 = 0x4001;

/// A single extension: its code point and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloExtension {
    code: u16,
    data: Bytes,
}

impl HelloExtension {
    /// Creates an extension from its code point and body.
    pub fn new(code: u16, data: impl Into<Bytes>) -> HelloExtension {
        HelloExtension {
            code,
            data: data.into(),
        }
    }

    /// The extension code point.
    #[inline]
    pub fn code(&self) -> u16 {
        self.code
    }

    /// The raw extension body.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A TLS ClientHello message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    legacy_version: u16,
    random: [u8; 32],
    session_id: Bytes,
    cipher_suites: Vec<u16>,
    compression_methods: Vec<u8>,
    extensions: Vec<HelloExtension>,
}

impl ClientHello {
    /// Lays out the ClientHello `profile` offers.
    ///
    /// `server_name` is `None` when connecting to an IP literal, in which case no SNI is
    /// sent. `alpn` is the list actually offered; an empty list omits the ALPN extension,
    /// and application settings are only offered together with `h2`.
    pub fn from_profile(
        profile: &ProfileParams,
        server_name: Option<&str>,
        alpn: &[AlpnProtocol],
    ) -> ClientHello {
        let mut rng = rand::rng();
        let mut grease = GreasePicker::new(&mut rng);

        let mut random = [0u8; 32];
        rng.fill_bytes(&mut random);
        let mut session_id = [0u8; 32];
        rng.fill_bytes(&mut session_id);

        let mut cipher_suites = Vec::with_capacity(profile.cipher_suites.len() + 1);
        if profile.grease {
            cipher_suites.push(grease.next());
        }
        cipher_suites.extend_from_slice(&profile.cipher_suites);

        let mut extensions = Vec::with_capacity(profile.extensions.len() + 2);
        if profile.grease {
            extensions.push(HelloExtension::new(grease.next(), Bytes::new()));
        }

        for ext in &profile.extensions {
            if *ext == Extension::Padding {
                continue;
            }
            if let Some(data) = extension_body(*ext, profile, server_name, alpn, &mut grease) {
                extensions.push(HelloExtension::new(ext.code(), data));
            }
        }

        if profile.grease {
            extensions.push(HelloExtension::new(grease.next(), Bytes::from_static(&[0])));
        }

        let mut hello = ClientHello {
            legacy_version: LEGACY_VERSION,
            random,
            session_id: Bytes::copy_from_slice(&session_id),
            cipher_suites,
            compression_methods: vec![0],
            extensions,
        };
        hello.fill_padding();
        hello
    }

    /// Parses a ClientHello from a TLS record (`0x16 ..`) or a bare handshake
    /// message (`0x01 ..`).
    pub fn parse(buf: &[u8]) -> Result<ClientHello> {
        let mut reader = Reader::new(buf);

        let mut handshake = match buf.first() {
            Some(&CONTENT_TYPE_HANDSHAKE) => {
                reader.u8()?;
                reader.u16()?;
                let len = reader.u16()? as usize;
                Reader::new(reader.take(len)?)
            }
            Some(&HANDSHAKE_CLIENT_HELLO) => reader,
            _ => return Err(Error::decode("not a TLS handshake record")),
        };

        if handshake.u8()? != HANDSHAKE_CLIENT_HELLO {
            return Err(Error::decode("handshake message is not a ClientHello"));
        }
        let len = handshake.u24()? as usize;
        let mut body = Reader::new(handshake.take(len)?);

        let legacy_version = body.u16()?;
        let mut random = [0u8; 32];
        random.copy_from_slice(body.take(32)?);
        let session_id = Bytes::copy_from_slice(body.vec8()?);

        let mut ciphers = Reader::new(body.vec16()?);
        let mut cipher_suites = Vec::new();
        while !ciphers.is_empty() {
            cipher_suites.push(ciphers.u16()?);
        }

        let compression_methods = body.vec8()?.to_vec();

        let mut extensions = Vec::new();
        if !body.is_empty() {
            let mut exts = Reader::new(body.vec16()?);
            while !exts.is_empty() {
                let code = exts.u16()?;
                let data = exts.vec16()?;
                extensions.push(HelloExtension::new(code, Bytes::copy_from_slice(data)));
            }
        }

        Ok(ClientHello {
            legacy_version,
            random,
            session_id,
            cipher_suites,
            compression_methods,
            extensions,
        })
    }

    /// Serializes the hello as a single TLS handshake record.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(512);
        buf.put_u8(CONTENT_TYPE_HANDSHAKE);
        buf.put_u16(RECORD_VERSION);
        with_len(&mut buf, 2, |buf| {
            buf.put_u8(HANDSHAKE_CLIENT_HELLO);
            with_len(buf, 3, |buf| self.encode_body(buf));
        });
        buf.freeze()
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u16(self.legacy_version);
        buf.put_slice(&self.random);
        with_len(buf, 1, |buf| buf.put_slice(&self.session_id));
        with_len(buf, 2, |buf| {
            self.cipher_suites.iter().for_each(|c| buf.put_u16(*c))
        });
        with_len(buf, 1, |buf| buf.put_slice(&self.compression_methods));
        with_len(buf, 2, |buf| {
            for ext in &self.extensions {
                buf.put_u16(ext.code);
                with_len(buf, 2, |buf| buf.put_slice(&ext.data));
            }
        });
    }

    /// Appends the padding extension the way BoringSSL does.
    ///
    /// A hello whose handshake message would fall between 256 and 511 bytes is
    /// padded to exactly 512. Outside that range a single padding byte is added
    /// only when the last extension has an empty body. Padding is never part of
    /// the configured extension order, it always comes last.
    fn fill_padding(&mut self) {
        let len = padding_len(self.handshake_len(), self.last_was_empty());
        if len != 0 {
            self.extensions.push(HelloExtension::new(
                Extension::Padding.code(),
                Bytes::from(vec![0u8; len]),
            ));
        }
    }

    /// Length of the handshake message: header, body and every extension.
    pub fn handshake_len(&self) -> usize {
        let mut len = 4 + 2 + 32 + 1 + self.session_id.len();
        len += 2 + self.cipher_suites.len() * 2;
        len += 1 + self.compression_methods.len();
        len += 2;
        len + self
            .extensions
            .iter()
            .map(|e| 4 + e.data.len())
            .sum::<usize>()
    }

    fn last_was_empty(&self) -> bool {
        self.extensions
            .last()
            .is_some_and(|e| e.data.is_empty())
    }
}

/// Size of the padding body for a hello of `unpadded` bytes; zero omits the extension.
fn padding_len(unpadded: usize, last_was_empty: bool) -> usize {
    if unpadded > 0xff && unpadded < 0x200 {
        let len = 0x200 - unpadded;
        if len >= 5 {
            len - 4
        } else {
            1
        }
    } else if last_was_empty {
        1
    } else {
        0
    }
}

impl ClientHello {
    /// The `legacy_version` field (0x0303 for every modern client).
    #[inline]
    pub fn legacy_version(&self) -> u16 {
        self.legacy_version
    }

    /// Offered cipher suites, GREASE included, in wire order.
    #[inline]
    pub fn cipher_suites(&self) -> &[u16] {
        &self.cipher_suites
    }

    /// Extensions in wire order.
    #[inline]
    pub fn extensions(&self) -> &[HelloExtension] {
        &self.extensions
    }

    /// Returns the first extension with the given code point.
    pub fn extension(&self, code: u16) -> Option<&HelloExtension> {
        self.extensions.iter().find(|e| e.code == code)
    }

    /// The host name from the `server_name` extension.
    pub fn server_name(&self) -> Option<String> {
        let ext = self.extension(Extension::ServerName.code())?;
        let mut list = Reader::new(Reader::new(ext.data()).vec16().ok()?);
        while !list.is_empty() {
            let kind = list.u8().ok()?;
            let name = list.vec16().ok()?;
            if kind == 0 {
                return String::from_utf8(name.to_vec()).ok();
            }
        }
        None
    }

    /// Groups from `supported_groups`, GREASE included.
    pub fn supported_groups(&self) -> Vec<u16> {
        self.u16_list(Extension::SupportedGroups.code(), 2)
    }

    /// Formats from `ec_point_formats`.
    pub fn point_formats(&self) -> Vec<u8> {
        self.extension(Extension::EcPointFormats.code())
            .and_then(|e| Reader::new(e.data()).vec8().ok())
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }

    /// Algorithms from `signature_algorithms`, in offered order.
    pub fn signature_algorithms(&self) -> Vec<u16> {
        self.u16_list(Extension::SignatureAlgorithms.code(), 2)
    }

    /// Versions from `supported_versions`, GREASE included.
    pub fn supported_versions(&self) -> Vec<u16> {
        self.u16_list(Extension::SupportedVersions.code(), 1)
    }

    /// Protocol names from the ALPN extension, in offered order.
    pub fn alpn_protocols(&self) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let Some(ext) = self.extension(Extension::ApplicationLayerProtocolNegotiation.code())
        else {
            return out;
        };
        if let Ok(list) = Reader::new(ext.data()).vec16() {
            let mut list = Reader::new(list);
            while let Ok(name) = list.vec8() {
                out.push(name.to_vec());
            }
        }
        out
    }

    fn u16_list(&self, code: u16, prefix: usize) -> Vec<u16> {
        let Some(ext) = self.extension(code) else {
            return Vec::new();
        };
        let mut reader = Reader::new(ext.data());
        let list = match prefix {
            1 => reader.vec8(),
            _ => reader.vec16(),
        };
        let mut out = Vec::new();
        if let Ok(list) = list {
            let mut list = Reader::new(list);
            while let Ok(v) = list.u16() {
                out.push(v);
            }
        }
        out
    }
}

/// Hands out distinct GREASE values for each slot of one hello.
struct GreasePicker {
    start: usize,
    next: usize,
}

impl GreasePicker {
    fn new<R: Rng>(rng: &mut R) -> GreasePicker {
        GreasePicker {
            start: rng.random_range(0..GREASE_VALUES.len()),
            next: 0,
        }
    }

    fn next(&mut self) -> u16 {
        let value = GREASE_VALUES[(self.start + self.next) % GREASE_VALUES.len()];
        self.next += 1;
        value
    }
}

fn extension_body(
    ext: Extension,
    profile: &ProfileParams,
    server_name: Option<&str>,
    alpn: &[AlpnProtocol],
    grease: &mut GreasePicker,
) -> Option<Bytes> {
    let mut buf = BytesMut::new();
    match ext {
        Extension::ServerName => {
            let host = server_name?;
            with_len(&mut buf, 2, |buf| {
                buf.put_u8(0);
                with_len(buf, 2, |buf| buf.put_slice(host.as_bytes()));
            });
        }
        Extension::StatusRequest => buf.put_slice(&[1, 0, 0, 0, 0]),
        Extension::SupportedGroups => with_len(&mut buf, 2, |buf| {
            if profile.grease {
                buf.put_u16(grease.next());
            }
            profile.supported_groups.iter().for_each(|g| buf.put_u16(*g));
        }),
        Extension::EcPointFormats => {
            with_len(&mut buf, 1, |buf| buf.put_slice(&profile.point_formats))
        }
        Extension::SignatureAlgorithms => with_len(&mut buf, 2, |buf| {
            profile
                .signature_algorithms
                .iter()
                .for_each(|s| buf.put_u16(*s))
        }),
        Extension::ApplicationLayerProtocolNegotiation => {
            if alpn.is_empty() {
                return None;
            }
            with_len(&mut buf, 2, |buf| {
                for proto in alpn {
                    with_len(buf, 1, |buf| buf.put_slice(proto.as_bytes()));
                }
            });
        }
        Extension::SignedCertificateTimestamp
        | Extension::ExtendedMasterSecret
        | Extension::SessionTicket
        | Extension::Padding => {}
        Extension::CompressCertificate => {
            if profile.cert_compression.is_empty() {
                return None;
            }
            with_len(&mut buf, 1, |buf| {
                profile
                    .cert_compression
                    .iter()
                    .for_each(|c| buf.put_u16(c.code()))
            });
        }
        Extension::RecordSizeLimit => {
            buf.put_u16(profile.record_size_limit.unwrap_or(DEFAULT_RECORD_SIZE_LIMIT))
        }
        Extension::DelegatedCredentials => {
            if profile.delegated_credentials.is_empty() {
                return None;
            }
            with_len(&mut buf, 2, |buf| {
                profile
                    .delegated_credentials
                    .iter()
                    .for_each(|s| buf.put_u16(*s))
            });
        }
        Extension::SupportedVersions => with_len(&mut buf, 1, |buf| {
            if profile.grease {
                buf.put_u16(grease.next());
            }
            profile
                .supported_versions
                .iter()
                .for_each(|v| buf.put_u16(v.code()));
        }),
        Extension::PskKeyExchangeModes => buf.put_slice(&[1, 1]),
        Extension::KeyShare => {
            let mut rng = rand::rng();
            with_len(&mut buf, 2, |buf| {
                if profile.grease {
                    buf.put_u16(grease.next());
                    with_len(buf, 2, |buf| buf.put_u8(0));
                }
                if let Some(group) = profile.supported_groups.first() {
                    buf.put_u16(*group);
                    let mut key = vec![0u8; key_share_len(*group)];
                    rng.fill_bytes(&mut key);
                    with_len(buf, 2, |buf| buf.put_slice(&key));
                }
            });
        }
        Extension::ApplicationSettings => {
            if !alpn.contains(&AlpnProtocol::Http2) {
                return None;
            }
            with_len(&mut buf, 2, |buf| {
                with_len(buf, 1, |buf| buf.put_slice(AlpnProtocol::Http2.as_bytes()))
            });
        }
        Extension::RenegotiationInfo => buf.put_u8(0),
        Extension::EncryptedClientHello => {
            let mut rng = rand::rng();
            let mut enc = [0u8; 32];
            rng.fill_bytes(&mut enc);
            let mut payload = [0u8; 144];
            rng.fill_bytes(&mut payload);
            // outer hello, HKDF-SHA256, AES-128-GCM
            buf.put_u8(0);
            buf.put_u16(0x0001);
            buf.put_u16(0x0001);
            buf.put_u8(rng.random());
            with_len(&mut buf, 2, |buf| buf.put_slice(&enc));
            with_len(&mut buf, 2, |buf| buf.put_slice(&payload));
        }
    }
    Some(buf.freeze())
}

fn key_share_len(group: u16) -> usize {
    match group {
        0x0017 => 65,
        0x0018 => 97,
        0x0019 => 133,
        0x0100 => 256,
        0x0101 => 384,
        0x11ec => 1216,
        _ => 32,
    }
}

/// Writes a big-endian length prefix of `width` bytes covering whatever `f` writes.
fn with_len<F>(buf: &mut BytesMut, width: usize, f: F)
where
    F: FnOnce(&mut BytesMut),
{
    let start = buf.len();
    buf.put_bytes(0, width);
    f(buf);
    let len = buf.len() - start - width;
    for i in 0..width {
        buf[start + i] = (len >> (8 * (width - 1 - i))) as u8;
    }
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(Error::decode("truncated ClientHello"));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    fn vec8(&mut self) -> Result<&'a [u8]> {
        let len = self.u8()? as usize;
        self.take(len)
    }

    fn vec16(&mut self) -> Result<&'a [u8]> {
        let len = self.u16()? as usize;
        self.take(len)
    }
}
