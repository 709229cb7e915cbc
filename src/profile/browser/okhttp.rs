use super::{headers, names};
use crate::profile::{Extension, ProfileParams};

pub(super) fn okhttp_4_12() -> ProfileParams {
    ProfileParams::builder()
        .id("okhttp_4_12")
        .cipher_suites(vec![
            0x1301, 0x1302, 0x1303, 0xc02b, 0xc02c, 0xcca9, 0xc02f, 0xc030, 0xcca8, 0xc013,
            0xc014, 0x009c, 0x009d, 0x002f, 0x0035,
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
            Extension::SignatureAlgorithms,
            Extension::KeyShare,
            Extension::PskKeyExchangeModes,
            Extension::SupportedVersions,
            Extension::Padding,
        ])
        .supported_groups(vec![0x001d, 0x0017, 0x0018])
        .signature_algorithms(vec![
            0x0403, 0x0804, 0x0401, 0x0503, 0x0805, 0x0501, 0x0806, 0x0601, 0x0201,
        ])
        .headers(headers(&[
            ("Connection", "Keep-Alive"),
            ("Accept-Encoding", "gzip"),
            ("User-Agent", "okhttp/4.12.0"),
        ]))
        .header_order(names(&[
            "Content-Type",
            "Content-Length",
            "Host",
            "Connection",
            "Accept-Encoding",
            "Cookie",
            "User-Agent",
        ]))
        .build()
}
