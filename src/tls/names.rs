//! Code point to BoringSSL name tables.
//!
//! Profiles are written in IANA code points; BoringSSL is configured with
//! names. Code points without an entry here cannot be configured.

use boring2::ssl::SslCurve;

pub(super) fn cipher_name(id: u16) -> Option<&'static str> {
    let name = match id {
        0x1301 => "TLS_AES_128_GCM_SHA256",
        0x1302 => "TLS_AES_256_GCM_SHA384",
        0x1303 => "TLS_CHACHA20_POLY1305_SHA256",
        0xc02b => "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        0xc02f => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        0xc02c => "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
        0xc030 => "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        0xcca9 => "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
        0xcca8 => "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
        0xc009 => "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
        0xc00a => "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
        0xc013 => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        0xc014 => "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
        0xc008 => "TLS_ECDHE_ECDSA_WITH_3DES_EDE_CBC_SHA",
        0xc012 => "TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA",
        0x009c => "TLS_RSA_WITH_AES_128_GCM_SHA256",
        0x009d => "TLS_RSA_WITH_AES_256_GCM_SHA384",
        0x002f => "TLS_RSA_WITH_AES_128_CBC_SHA",
        0x0035 => "TLS_RSA_WITH_AES_256_CBC_SHA",
        0x000a => "TLS_RSA_WITH_3DES_EDE_CBC_SHA",
        _ => return None,
    };
    Some(name)
}

pub(super) fn sigalg_name(id: u16) -> Option<&'static str> {
    let name = match id {
        0x0403 => "ecdsa_secp256r1_sha256",
        0x0503 => "ecdsa_secp384r1_sha384",
        0x0603 => "ecdsa_secp521r1_sha512",
        0x0203 => "ecdsa_sha1",
        0x0804 => "rsa_pss_rsae_sha256",
        0x0805 => "rsa_pss_rsae_sha384",
        0x0806 => "rsa_pss_rsae_sha512",
        0x0401 => "rsa_pkcs1_sha256",
        0x0501 => "rsa_pkcs1_sha384",
        0x0601 => "rsa_pkcs1_sha512",
        0x0201 => "rsa_pkcs1_sha1",
        0x0807 => "ed25519",
        _ => return None,
    };
    Some(name)
}

pub(super) fn curve(id: u16) -> Option<SslCurve> {
    let curve = match id {
        0x001d => SslCurve::X25519,
        0x0017 => SslCurve::SECP256R1,
        0x0018 => SslCurve::SECP384R1,
        0x0019 => SslCurve::SECP521R1,
        0x11ec => SslCurve::X25519_MLKEM768,
        _ => return None,
    };
    Some(curve)
}

/// Joins the names of `ids` with `:`, skipping code points without a name.
pub(super) fn name_list(ids: &[u16], lookup: fn(u16) -> Option<&'static str>) -> String {
    ids.iter()
        .filter_map(|id| {
            let name = lookup(*id);
            if name.is_none() {
                log::debug!("tls: no name for code point {id:#06x}, skipped");
            }
            name
        })
        .collect::<Vec<_>>()
        .join(":")
}
