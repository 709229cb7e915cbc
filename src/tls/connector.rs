use std::{
    ffi::c_void,
    fmt,
    net::{IpAddr, Ipv6Addr, TcpStream},
    os::raw::c_int,
    sync::Arc,
};

use boring2::{
    error::ErrorStack,
    ex_data::Index,
    ssl::{
        ExtensionType, HandshakeError, Ssl, SslConnector, SslConnectorBuilder, SslMethod,
        SslOptions, SslRef, SslSessionCacheMode, SslStream, SslVerifyMode,
    },
};
use boring_sys2 as ffi;
use foreign_types::ForeignTypeRef;
use once_cell::sync::Lazy;

use super::{
    cache::{SessionCache, SessionKey},
    compress, names, AlpnProtocol, ClientHello, Ja3, Ja4, RootCerts, TlsInfo, TlsVersion,
};
use crate::{
    error::TimedOut,
    profile::{CertCompression, Extension, FingerprintProfile},
    sync::Mutex,
    Error, Result,
};

const SESSION_CACHE_CAPACITY: usize = 8;

fn key_index() -> Result<Index<Ssl, SessionKey>> {
    static IDX: Lazy<std::result::Result<Index<Ssl, SessionKey>, ErrorStack>> =
        Lazy::new(Ssl::new_ex_index);
    IDX.clone().map_err(Error::tls)
}

/// The first ClientHello written on a connection, as a bare handshake message.
#[derive(Default)]
struct SentHello(Option<Vec<u8>>);

fn hello_index() -> Result<Index<Ssl, SentHello>> {
    static IDX: Lazy<std::result::Result<Index<Ssl, SentHello>, ErrorStack>> =
        Lazy::new(Ssl::new_ex_index);
    IDX.clone().map_err(Error::tls)
}

const SSL3_RT_HANDSHAKE: c_int = 22;
const HANDSHAKE_CLIENT_HELLO: u8 = 1;

/// Message callback that copies the outgoing ClientHello into the connection's
/// [`SentHello`] slot.
unsafe extern "C" fn record_client_hello(
    write_p: c_int,
    _version: c_int,
    content_type: c_int,
    buf: *const c_void,
    len: usize,
    ssl: *mut ffi::SSL,
    _arg: *mut c_void,
) {
    if write_p != 1 || content_type != SSL3_RT_HANDSHAKE || buf.is_null() || len == 0 {
        return;
    }

    // SAFETY: BoringSSL passes `len` readable bytes that live for the duration of the call.
    let msg = unsafe { std::slice::from_raw_parts(buf.cast::<u8>(), len) };
    if msg[0] != HANDSHAKE_CLIENT_HELLO {
        return;
    }

    let Ok(idx) = hello_index() else { return };
    // SAFETY: `ssl` is the connection currently running the handshake.
    let ssl = unsafe { SslRef::from_ptr_mut(ssl) };
    if let Some(sent) = ssl.ex_data_mut(idx) {
        if sent.0.is_none() {
            sent.0 = Some(msg.to_vec());
        }
    }
}

/// The captured ClientHello of a finished handshake.
fn sent_hello(ssl: &SslRef) -> Option<ClientHello> {
    let bytes = ssl.ex_data(hello_index().ok()?)?.0.as_deref()?;
    match ClientHello::parse(bytes) {
        Ok(hello) => Some(hello),
        Err(e) => {
            log::debug!("tls: captured ClientHello does not parse: {e}");
            None
        }
    }
}

/// Connector settings that are not part of the fingerprint.
#[derive(Debug, Clone)]
pub(crate) struct TlsOptions {
    pub(crate) roots: RootCerts,
    pub(crate) verify: bool,
    pub(crate) session_cache: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        TlsOptions {
            roots: RootCerts::default(),
            verify: true,
            session_cache: true,
        }
    }
}

/// Performs handshakes whose ClientHello follows one fingerprint profile.
#[derive(Clone)]
pub(crate) struct TlsConnector {
    inner: Arc<Inner>,
}

struct Inner {
    ssl: SslConnector,
    cache: Option<Arc<Mutex<SessionCache>>>,
    profile: Arc<FingerprintProfile>,
    verify: bool,
    ech_grease: bool,
}

impl TlsConnector {
    pub(crate) fn new(profile: Arc<FingerprintProfile>, options: &TlsOptions) -> Result<TlsConnector> {
        let params = profile.params();
        let alpn = profile.offered_alpn();

        let mut builder = SslConnector::no_default_verify_builder(SslMethod::tls_client())
            .map_err(Error::tls)?;

        if options.verify {
            options.roots.apply(&mut builder)?;
            builder.set_verify(SslVerifyMode::PEER);
        } else {
            builder.set_verify(SslVerifyMode::NONE);
        }

        configure_profile(&mut builder, &profile, &alpn)?;

        let cache = if options.session_cache {
            let cache = Arc::new(Mutex::new(SessionCache::with_capacity(
                SESSION_CACHE_CAPACITY,
            )));

            builder.set_session_cache_mode(SslSessionCacheMode::CLIENT);
            builder.set_new_session_callback({
                let cache = cache.clone();
                move |ssl, session| {
                    if let Ok(Some(key)) = key_index().map(|idx| ssl.ex_data(idx)) {
                        cache.lock().insert(key.clone(), session);
                    }
                }
            });

            Some(cache)
        } else {
            None
        };

        // SAFETY: the callback only touches the `SentHello` slot of the connection it is handed.
        unsafe {
            ffi::SSL_CTX_set_msg_callback(builder.as_ptr(), Some(record_client_hello));
        }

        Ok(TlsConnector {
            inner: Arc::new(Inner {
                ssl: builder.build(),
                cache,
                ech_grease: params.extensions.contains(&Extension::EncryptedClientHello),
                verify: options.verify,
                profile,
            }),
        })
    }

    pub(crate) fn profile(&self) -> &Arc<FingerprintProfile> {
        &self.inner.profile
    }

    /// Runs the handshake over `stream`.
    ///
    /// The negotiated version must be TLS 1.2 or 1.3 and the server may only
    /// select `http/1.1` through ALPN; anything else fails the connection.
    pub(crate) fn connect(
        &self,
        host: &str,
        port: u16,
        stream: TcpStream,
    ) -> Result<(SslStream<TcpStream>, TlsInfo)> {
        let host = strip_brackets(host);
        let is_ip = host.parse::<IpAddr>().is_ok();

        let mut conf = self.inner.ssl.configure().map_err(Error::tls)?;
        conf.set_use_server_name_indication(!is_ip);
        conf.set_verify_hostname(self.inner.verify);
        conf.set_enable_ech_grease(self.inner.ech_grease);

        let key = SessionKey(format!("{host}:{port}"));
        if let Some(ref cache) = self.inner.cache {
            if let Some(session) = cache.lock().get(&key) {
                log::trace!("tls: resuming session for {}", key.0);
                // SAFETY: the session was produced by a connection of this same `SslContext`.
                unsafe {
                    conf.set_session(&session).map_err(Error::tls)?;
                }
            }
        }
        conf.set_ex_data(key_index()?, key);
        conf.set_ex_data(hello_index()?, SentHello::default());

        let stream = conf.connect(host, stream).map_err(|e| match e {
            HandshakeError::WouldBlock(_) => Error::tls(TimedOut),
            e => Error::tls(e),
        })?;

        let ssl = stream.ssl();
        let version = ssl
            .version2()
            .and_then(TlsVersion::from_ssl)
            .ok_or_else(|| Error::tls("negotiated protocol version is not TLS 1.2 or TLS 1.3"))?;

        let alpn = match ssl.selected_alpn_protocol() {
            None => None,
            Some(proto) => match AlpnProtocol::from_bytes(proto) {
                Some(proto) if proto.is_supported() => Some(proto),
                _ => return Err(Error::tls("server selected an unsupported ALPN protocol")),
            },
        };

        let client_hello = sent_hello(ssl).unwrap_or_else(|| {
            log::debug!("tls: no ClientHello captured for {host}:{port}, using the modeled one");
            self.inner.profile.client_hello((!is_ip).then_some(host))
        });

        let info = TlsInfo {
            version,
            alpn,
            peer_certificate: ssl.peer_certificate().and_then(|cert| cert.to_der().ok()),
            resumed: ssl.session_reused(),
            ja3: Ja3::from_hello(&client_hello),
            ja4: Ja4::from_hello(&client_hello),
            client_hello,
        };

        log::debug!(
            "tls: {host}:{port} negotiated {version}, alpn {:?}, ja3 {}, resumed {}",
            info.alpn,
            info.ja3.hash(),
            info.resumed,
        );

        Ok((stream, info))
    }
}

impl fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnector")
            .field("profile", &self.inner.profile.id())
            .field("verify", &self.inner.verify)
            .field("session_cache", &self.inner.cache.is_some())
            .finish()
    }
}

fn configure_profile(
    builder: &mut SslConnectorBuilder,
    profile: &FingerprintProfile,
    alpn: &[AlpnProtocol],
) -> Result<()> {
    let params = profile.params();

    let versions = &params.supported_versions;
    if let (Some(min), Some(max)) = (versions.iter().min(), versions.iter().max()) {
        builder
            .set_min_proto_version(Some(min.to_ssl()))
            .map_err(Error::tls)?;
        builder
            .set_max_proto_version(Some(max.to_ssl()))
            .map_err(Error::tls)?;
    }

    let ciphers = names::name_list(&params.cipher_suites, names::cipher_name);
    builder.set_cipher_list(&ciphers).map_err(Error::tls)?;

    let curves: Vec<_> = params
        .supported_groups
        .iter()
        .filter_map(|id| names::curve(*id))
        .collect();
    if !curves.is_empty() {
        builder.set_curves(&curves).map_err(Error::tls)?;
    }

    let sigalgs = names::name_list(&params.signature_algorithms, names::sigalg_name);
    if !sigalgs.is_empty() {
        builder.set_sigalgs_list(&sigalgs).map_err(Error::tls)?;
    }

    builder.set_grease_enabled(params.grease);

    let declared = |ext: Extension| params.extensions.contains(&ext);

    if declared(Extension::StatusRequest) {
        builder.enable_ocsp_stapling();
    }
    if declared(Extension::SignedCertificateTimestamp) {
        builder.enable_signed_cert_timestamps();
    }
    if !declared(Extension::SessionTicket) {
        builder.set_options(SslOptions::NO_TICKET);
    }
    if declared(Extension::RecordSizeLimit) {
        builder.set_record_size_limit(params.record_size_limit.unwrap_or(0x4001));
    }
    if declared(Extension::DelegatedCredentials) {
        let list = names::name_list(&params.delegated_credentials, names::sigalg_name);
        if !list.is_empty() {
            builder
                .set_delegated_credentials(&list)
                .map_err(Error::tls)?;
        }
    }
    if declared(Extension::CompressCertificate) {
        for algorithm in &params.cert_compression {
            add_cert_compression(builder, *algorithm)?;
        }
    }

    if !alpn.is_empty() {
        builder
            .set_alpn_protos(&AlpnProtocol::encode_sequence(alpn))
            .map_err(Error::tls)?;
    }

    let permutation: Vec<ExtensionType> = params
        .extensions
        .iter()
        .map(|ext| extension_type(*ext))
        .collect();
    builder
        .set_extension_permutation(&permutation)
        .map_err(Error::tls)?;

    Ok(())
}

fn add_cert_compression(builder: &mut SslConnectorBuilder, algorithm: CertCompression) -> Result<()> {
    match algorithm {
        CertCompression::Zlib => builder
            .add_certificate_compression_algorithm(compress::ZlibCompressor)
            .map_err(Error::tls),
        CertCompression::Brotli => builder
            .add_certificate_compression_algorithm(compress::BrotliCompressor)
            .map_err(Error::tls),
        #[cfg(feature = "zstd")]
        CertCompression::Zstd => builder
            .add_certificate_compression_algorithm(compress::ZstdCompressor::default())
            .map_err(Error::tls),
        #[cfg(not(feature = "zstd"))]
        CertCompression::Zstd => {
            log::debug!("tls: zstd certificate compression needs the `zstd` feature, skipped");
            Ok(())
        }
    }
}

fn extension_type(ext: Extension) -> ExtensionType {
    match ext {
        Extension::ServerName => ExtensionType::SERVER_NAME,
        Extension::StatusRequest => ExtensionType::STATUS_REQUEST,
        Extension::SupportedGroups => ExtensionType::SUPPORTED_GROUPS,
        Extension::EcPointFormats => ExtensionType::EC_POINT_FORMATS,
        Extension::SignatureAlgorithms => ExtensionType::SIGNATURE_ALGORITHMS,
        Extension::ApplicationLayerProtocolNegotiation => {
            ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION
        }
        Extension::SignedCertificateTimestamp => ExtensionType::CERTIFICATE_TIMESTAMP,
        Extension::Padding => ExtensionType::PADDING,
        Extension::ExtendedMasterSecret => ExtensionType::EXTENDED_MASTER_SECRET,
        Extension::CompressCertificate => ExtensionType::CERT_COMPRESSION,
        Extension::RecordSizeLimit => ExtensionType::RECORD_SIZE_LIMIT,
        Extension::DelegatedCredentials => ExtensionType::DELEGATED_CREDENTIAL,
        Extension::SessionTicket => ExtensionType::SESSION_TICKET,
        Extension::SupportedVersions => ExtensionType::SUPPORTED_VERSIONS,
        Extension::PskKeyExchangeModes => ExtensionType::PSK_KEY_EXCHANGE_MODES,
        Extension::KeyShare => ExtensionType::KEY_SHARE,
        Extension::ApplicationSettings => ExtensionType::APPLICATION_SETTINGS,
        Extension::RenegotiationInfo => ExtensionType::RENEGOTIATE,
        Extension::EncryptedClientHello => ExtensionType::ENCRYPTED_CLIENT_HELLO,
    }
}

/// `[::1]` → `::1`; BoringSSL would otherwise fail hostname verification for IPv6 literals.
fn strip_brackets(host: &str) -> &str {
    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        if inner.parse::<Ipv6Addr>().is_ok() {
            return inner;
        }
    }
    host
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Catalog;

    #[test]
    fn ipv6_brackets_are_stripped() {
        assert_eq!(strip_brackets("[::1]"), "::1");
        assert_eq!(strip_brackets("example.com"), "example.com");
        assert_eq!(strip_brackets("[not-ip]"), "[not-ip]");
    }

    #[test]
    fn every_builtin_profile_configures() {
        for profile in Catalog::builtin().iter() {
            let connector = TlsConnector::new(profile.clone(), &TlsOptions::default());
            assert!(connector.is_ok(), "{} failed to configure", profile.id());
        }
    }

    #[test]
    fn first_outgoing_client_hello_is_recorded() {
        let profile = Catalog::builtin().get("chrome_120").unwrap().clone();
        let connector = TlsConnector::new(profile.clone(), &TlsOptions::default()).unwrap();
        let idx = hello_index().unwrap();

        let mut conf = connector.inner.ssl.configure().unwrap();
        conf.set_ex_data(idx, SentHello::default());

        let first = profile.client_hello(Some("localhost")).encode();
        let second = profile.client_hello(Some("other.example")).encode();
        let record = |write_p: c_int, content_type: c_int, msg: &[u8]| unsafe {
            record_client_hello(
                write_p,
                0x0303,
                content_type,
                msg.as_ptr().cast(),
                msg.len(),
                conf.as_ptr(),
                std::ptr::null_mut(),
            )
        };

        record(0, SSL3_RT_HANDSHAKE, &first[5..]);
        record(1, 23, &first[5..]);
        record(1, SSL3_RT_HANDSHAKE, &[11, 0, 0, 0]);
        assert!(conf.ex_data(idx).unwrap().0.is_none());

        record(1, SSL3_RT_HANDSHAKE, &first[5..]);
        record(1, SSL3_RT_HANDSHAKE, &second[5..]);

        let hello = sent_hello(&conf).unwrap();
        assert_eq!(hello.server_name().as_deref(), Some("localhost"));
        assert_eq!(hello.encode(), first);
        assert!(Ja4::from_hello(&hello).as_str().starts_with("t13d1515h1_"));
    }
}
