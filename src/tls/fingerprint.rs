//! JA3 and JA4 client fingerprints.
//!
//! Both are computed from a [`ClientHello`], either the one a profile offers or
//! one parsed from captured bytes.

use std::fmt::{self, Write as _};

use sha2::{Digest, Sha256};

use super::hello::{is_grease, ClientHello};
use crate::profile::Extension;

/// A JA3 fingerprint: the descriptor string and its MD5 hash.
///
/// The string is `version,ciphers,extensions,groups,point_formats`, each list
/// in wire order with GREASE values removed and joined by `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ja3 {
    string: String,
    hash: String,
}

impl Ja3 {
    /// Computes the fingerprint of `hello`.
    pub fn from_hello(hello: &ClientHello) -> Ja3 {
        let ciphers = join_dec(hello.cipher_suites().iter().copied());
        let extensions = join_dec(hello.extensions().iter().map(|e| e.code()));
        let groups = join_dec(hello.supported_groups().into_iter());
        let formats = join_dec(hello.point_formats().into_iter().map(u16::from));

        let string = format!(
            "{},{ciphers},{extensions},{groups},{formats}",
            hello.legacy_version()
        );
        let hash = format!("{:x}", md5::compute(string.as_bytes()));
        Ja3 { string, hash }
    }

    /// The descriptor string.
    pub fn as_str(&self) -> &str {
        &self.string
    }

    /// Lowercase hex MD5 of the descriptor string.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for Ja3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash)
    }
}

/// A JA4 fingerprint (TCP variant).
///
/// `t{version}{d|i}{ciphers:02}{extensions:02}{alpn}_{cipher_hash}_{extension_hash}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ja4 {
    fingerprint: String,
    raw: String,
}

impl Ja4 {
    /// Computes the fingerprint of `hello`.
    pub fn from_hello(hello: &ClientHello) -> Ja4 {
        let ciphers: Vec<u16> = hello
            .cipher_suites()
            .iter()
            .copied()
            .filter(|c| !is_grease(*c))
            .collect();
        let extensions: Vec<u16> = hello
            .extensions()
            .iter()
            .map(|e| e.code())
            .filter(|c| !is_grease(*c))
            .collect();

        let version = hello
            .supported_versions()
            .into_iter()
            .filter(|v| !is_grease(*v))
            .max()
            .unwrap_or(hello.legacy_version());

        let sni = if hello.extension(Extension::ServerName.code()).is_some() {
            'd'
        } else {
            'i'
        };

        let alpn = hello
            .alpn_protocols()
            .first()
            .map(|p| alpn_chars(p))
            .unwrap_or_else(|| "00".to_owned());

        let prefix = format!(
            "t{}{sni}{:02}{:02}{alpn}",
            version_code(version),
            ciphers.len().min(99),
            extensions.len().min(99),
        );

        let mut sorted_ciphers = ciphers;
        sorted_ciphers.sort_unstable();
        let cipher_list = join_hex(&sorted_ciphers);

        let mut sorted_exts: Vec<u16> = extensions
            .into_iter()
            .filter(|c| {
                *c != Extension::ServerName.code()
                    && *c != Extension::ApplicationLayerProtocolNegotiation.code()
            })
            .collect();
        sorted_exts.sort_unstable();
        let mut ext_list = join_hex(&sorted_exts);
        let sigalgs = hello.signature_algorithms();
        if !sigalgs.is_empty() {
            ext_list.push('_');
            ext_list.push_str(&join_hex(&sigalgs));
        }

        let fingerprint = format!(
            "{prefix}_{}_{}",
            truncated_sha256(&cipher_list, sorted_ciphers.is_empty()),
            truncated_sha256(&ext_list, sorted_exts.is_empty()),
        );
        let raw = format!("{prefix}_{cipher_list}_{ext_list}");

        Ja4 { fingerprint, raw }
    }

    /// The hashed fingerprint.
    pub fn as_str(&self) -> &str {
        &self.fingerprint
    }

    /// The unhashed form, with the sorted cipher and extension lists in clear.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Ja4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint)
    }
}

fn version_code(version: u16) -> &'static str {
    match version {
        0x0304 => "13",
        0x0303 => "12",
        0x0302 => "11",
        0x0301 => "10",
        0x0300 => "s3",
        _ => "00",
    }
}

/// First and last character of an ALPN value, falling back to its hex form
/// when either is not alphanumeric.
fn alpn_chars(proto: &[u8]) -> String {
    let (Some(first), Some(last)) = (proto.first(), proto.last()) else {
        return "00".to_owned();
    };
    if first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric() {
        return format!("{}{}", *first as char, *last as char);
    }
    let hex: String = proto.iter().fold(String::new(), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    });
    let bytes = hex.as_bytes();
    format!("{}{}", bytes[0] as char, bytes[bytes.len() - 1] as char)
}

fn join_dec(values: impl Iterator<Item = u16>) -> String {
    let mut out = String::new();
    for value in values.filter(|v| !is_grease(*v)) {
        if !out.is_empty() {
            out.push('-');
        }
        let _ = write!(out, "{value}");
    }
    out
}

fn join_hex(values: &[u16]) -> String {
    let mut out = String::with_capacity(values.len() * 5);
    for value in values {
        if !out.is_empty() {
            out.push(',');
        }
        let _ = write!(out, "{value:04x}");
    }
    out
}

fn truncated_sha256(input: &str, empty: bool) -> String {
    if empty {
        return "000000000000".to_owned();
    }
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(12);
    for byte in &digest[..6] {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        profile::{Catalog, ProfileParams},
        tls::AlpnProtocol,
    };

    const CHROME_JA3: &str = "771,4865-4866-4867-49195-49199-49196-49200-52393-52392-49171-49172-156-157-47-53,0-23-65281-10-11-35-16-5-13-18-51-45-43-27-17513-21,29-23-24,0";

    fn chrome() -> ProfileParams {
        Catalog::builtin()
            .get("chrome_120")
            .expect("chrome_120 is built in")
            .params()
            .clone()
    }

    #[test]
    fn ja3_of_declared_chrome_hello() {
        let params = chrome();
        let hello = ClientHello::from_profile(&params, Some("example.com"), &params.alpn);
        let ja3 = Ja3::from_hello(&hello);

        assert_eq!(ja3.as_str(), CHROME_JA3);
        assert_eq!(ja3.hash(), format!("{:x}", md5::compute(CHROME_JA3)));
        assert_eq!(ja3.hash().len(), 32);
        assert_eq!(ja3.to_string(), ja3.hash());
    }

    #[test]
    fn ja3_ignores_grease_and_randomness() {
        let params = chrome();
        let a = ClientHello::from_profile(&params, Some("a.example"), &params.alpn);
        let b = ClientHello::from_profile(&params, Some("b.example"), &params.alpn);
        assert_ne!(a.encode(), b.encode());
        assert_eq!(Ja3::from_hello(&a), Ja3::from_hello(&b));
        assert_eq!(Ja4::from_hello(&a), Ja4::from_hello(&b));
    }

    #[test]
    fn ja4_of_declared_chrome_hello() {
        let params = chrome();
        let hello = ClientHello::from_profile(&params, Some("example.com"), &params.alpn);
        let ja4 = Ja4::from_hello(&hello);

        let parts: Vec<_> = ja4.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "t13d1516h2");
        assert_eq!(parts[1], "8daaf6152771");
        assert_eq!(parts[2].len(), 12);

        let raw: Vec<_> = ja4.raw().split('_').collect();
        assert_eq!(
            raw[1],
            "002f,0035,009c,009d,1301,1302,1303,c013,c014,c02b,c02c,c02f,c030,cca8,cca9"
        );
        assert_eq!(
            raw[2],
            "0005,000a,000b,000d,0012,0015,0017,001b,0023,002b,002d,0033,4469,ff01"
        );
        assert_eq!(raw[3], "0403,0804,0401,0503,0805,0501,0806,0601");
    }

    #[test]
    fn ja4_follows_offered_hello() {
        let params = chrome();

        let http1 = ClientHello::from_profile(&params, Some("example.com"), &[AlpnProtocol::Http1]);
        assert!(Ja4::from_hello(&http1).as_str().starts_with("t13d1515h1_"));

        let ip = ClientHello::from_profile(&params, None, &[AlpnProtocol::Http1]);
        assert!(Ja4::from_hello(&ip).as_str().starts_with("t13i1514h1_"));

        let none = ClientHello::from_profile(&params, None, &[]);
        assert!(Ja4::from_hello(&none).as_str().starts_with("t13i1513"));
        assert!(Ja4::from_hello(&none).as_str()[8..].starts_with("00_"));
    }

    #[test]
    fn alpn_chars_fall_back_to_hex() {
        assert_eq!(alpn_chars(b"h2"), "h2");
        assert_eq!(alpn_chars(b"http/1.1"), "h1");
        assert_eq!(alpn_chars(&[0xab, b'x']), "a8");
        assert_eq!(alpn_chars(b""), "00");
    }

    #[test]
    fn version_codes() {
        assert_eq!(version_code(0x0304), "13");
        assert_eq!(version_code(0x0303), "12");
        assert_eq!(version_code(0x0300), "s3");
        assert_eq!(version_code(0x7f17), "00");
    }

    #[test]
    fn empty_lists_hash_to_zeros() {
        assert_eq!(truncated_sha256("", true), "000000000000");
        assert_eq!(truncated_sha256("1301", false).len(), 12);
    }
}
