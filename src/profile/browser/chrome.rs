use super::{headers, names};
use crate::profile::{CertCompression, Extension, ProfileParams};

const CIPHER_SUITES: &[u16] = &[
    0x1301, 0x1302, 0x1303, 0xc02b, 0xc02f, 0xc02c, 0xc030, 0xcca9, 0xcca8, 0xc013, 0xc014,
    0x009c, 0x009d, 0x002f, 0x0035,
];

const GROUPS: &[u16] = &[0x001d, 0x0017, 0x0018];

const SIGALGS: &[u16] = &[
    0x0403, 0x0804, 0x0401, 0x0503, 0x0805, 0x0501, 0x0806, 0x0601,
];

const HEADER_ORDER: &[&str] = &[
    "Host",
    "Connection",
    "Content-Length",
    "Cache-Control",
    "sec-ch-ua",
    "sec-ch-ua-mobile",
    "sec-ch-ua-platform",
    "Upgrade-Insecure-Requests",
    "Origin",
    "Content-Type",
    "User-Agent",
    "Accept",
    "Sec-Fetch-Site",
    "Sec-Fetch-Mode",
    "Sec-Fetch-User",
    "Sec-Fetch-Dest",
    "Referer",
    "Accept-Encoding",
    "Accept-Language",
    "Cookie",
    "Authorization",
];

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

// Chrome randomizes its extension order per connection; each profile pins
// one captured order.
const EXTENSIONS_120: &[Extension] = &[
    Extension::ServerName,
    Extension::ExtendedMasterSecret,
    Extension::RenegotiationInfo,
    Extension::SupportedGroups,
    Extension::EcPointFormats,
    Extension::SessionTicket,
    Extension::ApplicationLayerProtocolNegotiation,
    Extension::StatusRequest,
    Extension::SignatureAlgorithms,
    Extension::SignedCertificateTimestamp,
    Extension::KeyShare,
    Extension::PskKeyExchangeModes,
    Extension::SupportedVersions,
    Extension::CompressCertificate,
    Extension::ApplicationSettings,
    Extension::Padding,
];

const EXTENSIONS_117: &[Extension] = &[
    Extension::CompressCertificate,
    Extension::SupportedVersions,
    Extension::ApplicationLayerProtocolNegotiation,
    Extension::PskKeyExchangeModes,
    Extension::ServerName,
    Extension::SupportedGroups,
    Extension::ExtendedMasterSecret,
    Extension::RenegotiationInfo,
    Extension::SessionTicket,
    Extension::SignatureAlgorithms,
    Extension::KeyShare,
    Extension::SignedCertificateTimestamp,
    Extension::EcPointFormats,
    Extension::ApplicationSettings,
    Extension::StatusRequest,
    Extension::Padding,
];

const EXTENSIONS_EDGE_122: &[Extension] = &[
    Extension::SignatureAlgorithms,
    Extension::ServerName,
    Extension::SessionTicket,
    Extension::PskKeyExchangeModes,
    Extension::SupportedVersions,
    Extension::ApplicationLayerProtocolNegotiation,
    Extension::EncryptedClientHello,
    Extension::ExtendedMasterSecret,
    Extension::KeyShare,
    Extension::RenegotiationInfo,
    Extension::StatusRequest,
    Extension::SupportedGroups,
    Extension::CompressCertificate,
    Extension::EcPointFormats,
    Extension::SignedCertificateTimestamp,
    Extension::ApplicationSettings,
];

fn chromium(
    id: &'static str,
    extensions: &[Extension],
    sec_ch_ua: &'static str,
    user_agent: &'static str,
) -> ProfileParams {
    ProfileParams::builder()
        .id(id)
        .cipher_suites(CIPHER_SUITES)
        .extensions(extensions)
        .supported_groups(GROUPS)
        .signature_algorithms(SIGALGS)
        .cert_compression(vec![CertCompression::Brotli])
        .grease(true)
        .headers(headers(&[
            ("Connection", "keep-alive"),
            ("sec-ch-ua", sec_ch_ua),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", "\"Windows\""),
            ("Upgrade-Insecure-Requests", "1"),
            ("User-Agent", user_agent),
            ("Accept", ACCEPT),
            ("Sec-Fetch-Site", "none"),
            ("Sec-Fetch-Mode", "navigate"),
            ("Sec-Fetch-User", "?1"),
            ("Sec-Fetch-Dest", "document"),
            ("Accept-Encoding", "gzip, deflate, br"),
            ("Accept-Language", "en-US,en;q=0.9"),
        ]))
        .header_order(names(HEADER_ORDER))
        .build()
}

pub(super) fn chrome_117() -> ProfileParams {
    chromium(
        "chrome_117",
        EXTENSIONS_117,
        "\"Google Chrome\";v=\"117\", \"Not;A=Brand\";v=\"8\", \"Chromium\";v=\"117\"",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36",
    )
}

pub(super) fn chrome_120() -> ProfileParams {
    chromium(
        "chrome_120",
        EXTENSIONS_120,
        "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\"",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    )
}

pub(super) fn edge_122() -> ProfileParams {
    chromium(
        "edge_122",
        EXTENSIONS_EDGE_122,
        "\"Chromium\";v=\"122\", \"Not(A:Brand\";v=\"24\", \"Microsoft Edge\";v=\"122\"",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36 Edg/122.0.0.0",
    )
}
