use super::{headers, names};
use crate::profile::{CertCompression, Extension, ProfileParams};

pub(super) fn safari_17() -> ProfileParams {
    ProfileParams::builder()
        .id("safari_17")
        .cipher_suites(vec![
            0x1301, 0x1302, 0x1303, 0xc02c, 0xc02b, 0xcca9, 0xc030, 0xc02f, 0xcca8, 0xc00a,
            0xc009, 0xc014, 0xc013, 0x009d, 0x009c, 0x0035, 0x002f, 0xc008, 0xc012, 0x000a,
        ])
        .extensions(vec![
            Extension::ServerName,
            Extension::ExtendedMasterSecret,
            Extension::RenegotiationInfo,
            Extension::SupportedGroups,
            Extension::EcPointFormats,
            Extension::ApplicationLayerProtocolNegotiation,
            Extension::StatusRequest,
            Extension::SignatureAlgorithms,
            Extension::SignedCertificateTimestamp,
            Extension::KeyShare,
            Extension::PskKeyExchangeModes,
            Extension::SupportedVersions,
            Extension::CompressCertificate,
            Extension::Padding,
        ])
        .supported_groups(vec![0x001d, 0x0017, 0x0018, 0x0019])
        .signature_algorithms(vec![
            0x0403, 0x0804, 0x0401, 0x0503, 0x0203, 0x0805, 0x0501, 0x0806, 0x0601, 0x0201,
        ])
        .cert_compression(vec![CertCompression::Zlib])
        .grease(true)
        .headers(headers(&[
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
            ("Sec-Fetch-Site", "none"),
            ("Sec-Fetch-Dest", "document"),
            ("Accept-Language", "en-US,en;q=0.9"),
            ("Sec-Fetch-Mode", "navigate"),
            (
                "User-Agent",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
            ),
            ("Accept-Encoding", "gzip, deflate, br"),
            ("Connection", "keep-alive"),
        ]))
        .header_order(names(&[
            "Host",
            "Content-Type",
            "Origin",
            "Accept",
            "Sec-Fetch-Site",
            "Cookie",
            "Sec-Fetch-Dest",
            "Content-Length",
            "Accept-Language",
            "Sec-Fetch-Mode",
            "User-Agent",
            "Referer",
            "Accept-Encoding",
            "Authorization",
            "Connection",
        ]))
        .build()
}
