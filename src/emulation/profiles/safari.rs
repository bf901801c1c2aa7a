//! Safari 17 on macOS.

use crate::emulation::{BrowserProfile, H2Profile, ProfileId};
use crate::socket::tls::hello::{
    certcompress, ciphers, groups, sigschemes, AlpnProtocol, ClientHelloSpec, RenegotiateMode,
    TlsExtension, GREASE, PSK_MODE_DHE, POINT_FORMAT_UNCOMPRESSED, VERSION_TLS10, VERSION_TLS11,
    VERSION_TLS12, VERSION_TLS13,
};
use http2::frame::{SettingId, SettingsOrder};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15";

pub fn profile() -> BrowserProfile {
    BrowserProfile {
        id: ProfileId::Safari,
        hello: client_hello(),
        alpn: vec![AlpnProtocol::HTTP2, AlpnProtocol::HTTP1],
        headers: default_headers(),
        user_agent: USER_AGENT,
        h2: h2_profile(),
    }
}

/// Safari still offers the legacy CBC and 3DES suites and a TLS 1.0 floor,
/// and sends no session_ticket extension.
fn client_hello() -> ClientHelloSpec {
    ClientHelloSpec {
        min_version: VERSION_TLS10,
        max_version: VERSION_TLS13,
        cipher_suites: vec![
            GREASE,
            ciphers::TLS_AES_128_GCM_SHA256,
            ciphers::TLS_AES_256_GCM_SHA384,
            ciphers::TLS_CHACHA20_POLY1305_SHA256,
            ciphers::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            ciphers::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            ciphers::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
            ciphers::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            ciphers::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            ciphers::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
            ciphers::TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384,
            ciphers::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,
            ciphers::TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
            ciphers::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
            ciphers::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384,
            ciphers::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256,
            ciphers::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
            ciphers::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
            ciphers::TLS_RSA_WITH_AES_256_GCM_SHA384,
            ciphers::TLS_RSA_WITH_AES_128_GCM_SHA256,
            ciphers::TLS_RSA_WITH_AES_256_CBC_SHA256,
            ciphers::TLS_RSA_WITH_AES_128_CBC_SHA256,
            ciphers::TLS_RSA_WITH_AES_256_CBC_SHA,
            ciphers::TLS_RSA_WITH_AES_128_CBC_SHA,
            ciphers::TLS_ECDHE_ECDSA_WITH_3DES_EDE_CBC_SHA,
            ciphers::TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA,
            ciphers::TLS_RSA_WITH_3DES_EDE_CBC_SHA,
        ],
        compression_methods: vec![0x00],
        extensions: vec![
            TlsExtension::Grease,
            TlsExtension::ServerName,
            TlsExtension::ExtendedMasterSecret,
            TlsExtension::RenegotiationInfo { mode: RenegotiateMode::OnceAsClient },
            TlsExtension::SupportedGroups {
                groups: vec![
                    GREASE,
                    groups::X25519,
                    groups::SECP256R1,
                    groups::SECP384R1,
                    groups::SECP521R1,
                ],
            },
            TlsExtension::EcPointFormats { formats: vec![POINT_FORMAT_UNCOMPRESSED] },
            TlsExtension::Alpn,
            TlsExtension::StatusRequest,
            TlsExtension::SignatureAlgorithms {
                schemes: vec![
                    sigschemes::ECDSA_SECP256R1_SHA256,
                    sigschemes::RSA_PSS_RSAE_SHA256,
                    sigschemes::RSA_PKCS1_SHA256,
                    sigschemes::ECDSA_SECP384R1_SHA384,
                    sigschemes::ECDSA_SHA1,
                    sigschemes::RSA_PSS_RSAE_SHA384,
                    sigschemes::RSA_PKCS1_SHA384,
                    sigschemes::RSA_PSS_RSAE_SHA512,
                    sigschemes::RSA_PKCS1_SHA512,
                    sigschemes::RSA_PKCS1_SHA1,
                ],
            },
            TlsExtension::SignedCertificateTimestamp,
            TlsExtension::KeyShare { groups: vec![GREASE, groups::X25519] },
            TlsExtension::PskKeyExchangeModes { modes: vec![PSK_MODE_DHE] },
            TlsExtension::SupportedVersions {
                versions: vec![GREASE, VERSION_TLS13, VERSION_TLS12, VERSION_TLS11, VERSION_TLS10],
            },
            TlsExtension::CompressCertificate { algorithms: vec![certcompress::ZLIB] },
            TlsExtension::GreaseTrailing,
            TlsExtension::Padding,
        ],
    }
}

fn default_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Host", ""),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        ("User-Agent", USER_AGENT),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Connection", "keep-alive"),
    ]
}

fn h2_profile() -> H2Profile {
    H2Profile {
        header_table_size: Some(4096),
        enable_push: Some(false),
        max_concurrent_streams: Some(100),
        initial_window_size: 65535,
        initial_conn_window_size: 10485760,
        max_frame_size: Some(16384),
        max_header_list_size: None,
        settings_order: Some(
            SettingsOrder::builder()
                .push(SettingId::EnablePush)
                .push(SettingId::MaxConcurrentStreams)
                .push(SettingId::InitialWindowSize)
                .push(SettingId::HeaderTableSize)
                .push(SettingId::MaxFrameSize)
                .build(),
        ),
    }
}
