//! Firefox 133 on Windows.

use crate::emulation::{BrowserProfile, H2Profile, ProfileId};
use crate::socket::tls::hello::{
    ciphers, groups, sigschemes, AlpnProtocol, ClientHelloSpec, RenegotiateMode, TlsExtension,
    PSK_MODE_DHE, POINT_FORMAT_UNCOMPRESSED, VERSION_TLS12, VERSION_TLS13,
};
use http2::frame::{SettingId, SettingsOrder};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0";

pub fn profile() -> BrowserProfile {
    BrowserProfile {
        id: ProfileId::Firefox,
        hello: client_hello(),
        alpn: vec![AlpnProtocol::HTTP2, AlpnProtocol::HTTP1],
        headers: default_headers(),
        user_agent: USER_AGENT,
        h2: h2_profile(),
    }
}

/// Firefox sends no GREASE and keeps the ffdhe groups in its advertised
/// list.
fn client_hello() -> ClientHelloSpec {
    ClientHelloSpec {
        min_version: VERSION_TLS12,
        max_version: VERSION_TLS13,
        cipher_suites: vec![
            ciphers::TLS_AES_128_GCM_SHA256,
            ciphers::TLS_CHACHA20_POLY1305_SHA256,
            ciphers::TLS_AES_256_GCM_SHA384,
            ciphers::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            ciphers::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            ciphers::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
            ciphers::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
            ciphers::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            ciphers::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            ciphers::TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
            ciphers::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
            ciphers::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
            ciphers::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
            ciphers::TLS_RSA_WITH_AES_128_GCM_SHA256,
            ciphers::TLS_RSA_WITH_AES_256_GCM_SHA384,
            ciphers::TLS_RSA_WITH_AES_128_CBC_SHA,
            ciphers::TLS_RSA_WITH_AES_256_CBC_SHA,
        ],
        compression_methods: vec![0x00],
        extensions: vec![
            TlsExtension::ServerName,
            TlsExtension::ExtendedMasterSecret,
            TlsExtension::RenegotiationInfo { mode: RenegotiateMode::OnceAsClient },
            TlsExtension::SupportedGroups {
                groups: vec![
                    groups::X25519,
                    groups::SECP256R1,
                    groups::SECP384R1,
                    groups::SECP521R1,
                    groups::FFDHE2048,
                    groups::FFDHE3072,
                ],
            },
            TlsExtension::EcPointFormats { formats: vec![POINT_FORMAT_UNCOMPRESSED] },
            TlsExtension::SessionTicket,
            TlsExtension::Alpn,
            TlsExtension::StatusRequest,
            TlsExtension::SignatureAlgorithms {
                schemes: vec![
                    sigschemes::ECDSA_SECP256R1_SHA256,
                    sigschemes::ECDSA_SECP384R1_SHA384,
                    sigschemes::ECDSA_SECP521R1_SHA512,
                    sigschemes::RSA_PSS_RSAE_SHA256,
                    sigschemes::RSA_PSS_RSAE_SHA384,
                    sigschemes::RSA_PSS_RSAE_SHA512,
                    sigschemes::RSA_PKCS1_SHA256,
                    sigschemes::RSA_PKCS1_SHA384,
                    sigschemes::RSA_PKCS1_SHA512,
                    sigschemes::ECDSA_SHA1,
                    sigschemes::RSA_PKCS1_SHA1,
                ],
            },
            TlsExtension::SignedCertificateTimestamp,
            TlsExtension::KeyShare { groups: vec![groups::X25519, groups::SECP256R1] },
            TlsExtension::PskKeyExchangeModes { modes: vec![PSK_MODE_DHE] },
            TlsExtension::SupportedVersions { versions: vec![VERSION_TLS13, VERSION_TLS12] },
            TlsExtension::RecordSizeLimit { limit: 0x4001 },
            TlsExtension::Padding,
        ],
    }
}

/// `Host` goes directly after the request line, and `DNT` is part of the
/// default set.
fn default_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Host", ""),
        ("User-Agent", USER_AGENT),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.5"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("DNT", "1"),
        ("Connection", "keep-alive"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
    ]
}

fn h2_profile() -> H2Profile {
    H2Profile {
        header_table_size: Some(65536),
        enable_push: None,
        max_concurrent_streams: None,
        initial_window_size: 131072,
        initial_conn_window_size: 12582912,
        max_frame_size: Some(16384),
        max_header_list_size: None,
        settings_order: Some(
            SettingsOrder::builder()
                .push(SettingId::HeaderTableSize)
                .push(SettingId::InitialWindowSize)
                .push(SettingId::MaxFrameSize)
                .build(),
        ),
    }
}
