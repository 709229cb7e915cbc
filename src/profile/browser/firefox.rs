use super::{headers, names};
use crate::profile::{Extension, ProfileParams};

pub(super) fn firefox_121() -> ProfileParams {
    ProfileParams::builder()
        .id("firefox_121")
        .cipher_suites(vec![
            0x1301, 0x1303, 0x1302, 0xc02b, 0xc02f, 0xcca9, 0xcca8, 0xc02c, 0xc030, 0xc00a,
            0xc009, 0xc013, 0xc014, 0x009c, 0x009d, 0x002f, 0x0035,
        ])
        .extensions(vec![
            Extension::ServerName,
            Extension::ExtendedMasterSecret,
            Extension::RenegotiationInfo,
            Extension::SupportedGroups,
            Extension::EcPointFormats,
            Extension::SessionTicket,
            Extension::ApplicationLayerProtocolNegotiation,
            Extension::StatusRequest,
            Extension::DelegatedCredentials,
            Extension::KeyShare,
            Extension::SupportedVersions,
            Extension::SignatureAlgorithms,
            Extension::PskKeyExchangeModes,
            Extension::RecordSizeLimit,
            Extension::EncryptedClientHello,
        ])
        .supported_groups(vec![0x001d, 0x0017, 0x0018, 0x0019, 0x0100, 0x0101])
        .signature_algorithms(vec![
            0x0403, 0x0503, 0x0603, 0x0804, 0x0805, 0x0806, 0x0401, 0x0501, 0x0601, 0x0203,
            0x0201,
        ])
        .delegated_credentials(vec![0x0403, 0x0503, 0x0603, 0x0203])
        .record_size_limit(0x4001)
        .headers(headers(&[
            (
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
            ),
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
            ("Accept-Language", "en-US,en;q=0.5"),
            ("Accept-Encoding", "gzip, deflate, br"),
            ("Connection", "keep-alive"),
            ("Upgrade-Insecure-Requests", "1"),
            ("Sec-Fetch-Dest", "document"),
            ("Sec-Fetch-Mode", "navigate"),
            ("Sec-Fetch-Site", "none"),
            ("Sec-Fetch-User", "?1"),
        ]))
        .header_order(names(&[
            "Host",
            "User-Agent",
            "Accept",
            "Accept-Language",
            "Accept-Encoding",
            "Content-Type",
            "Content-Length",
            "Origin",
            "Authorization",
            "Connection",
            "Referer",
            "Cookie",
            "Upgrade-Insecure-Requests",
            "Sec-Fetch-Dest",
            "Sec-Fetch-Mode",
            "Sec-Fetch-Site",
            "Sec-Fetch-User",
        ]))
        .build()
}
