//! Edge 131 on Windows. Chromium-based: the TLS shape matches Chrome; the
//! identity differs in the UA string and the `sec-ch-ua` brand list.

use crate::emulation::{BrowserProfile, H2Profile, ProfileId};
use crate::socket::tls::hello::{
    certcompress, ciphers, groups, sigschemes, AlpnProtocol, ClientHelloSpec, RenegotiateMode,
    TlsExtension, GREASE, PSK_MODE_DHE, POINT_FORMAT_UNCOMPRESSED, VERSION_TLS12, VERSION_TLS13,
};
use http2::frame::{SettingId, SettingsOrder};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0";

pub fn profile() -> BrowserProfile {
    BrowserProfile {
        id: ProfileId::Edge,
        hello: client_hello(),
        alpn: vec![AlpnProtocol::HTTP2, AlpnProtocol::HTTP1],
        headers: default_headers(),
        user_agent: USER_AGENT,
        h2: h2_profile(),
    }
}

fn client_hello() -> ClientHelloSpec {
    ClientHelloSpec {
        min_version: VERSION_TLS12,
        max_version: VERSION_TLS13,
        cipher_suites: vec![
            GREASE,
            ciphers::TLS_AES_128_GCM_SHA256,
            ciphers::TLS_AES_256_GCM_SHA384,
            ciphers::TLS_CHACHA20_POLY1305_SHA256,
            ciphers::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            ciphers::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            ciphers::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            ciphers::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            ciphers::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
            ciphers::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
            ciphers::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
            ciphers::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
            ciphers::TLS_RSA_WITH_AES_128_GCM_SHA256,
            ciphers::TLS_RSA_WITH_AES_256_GCM_SHA384,
            ciphers::TLS_RSA_WITH_AES_128_CBC_SHA,
            ciphers::TLS_RSA_WITH_AES_256_CBC_SHA,
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
                    groups::X25519_MLKEM768,
                    groups::X25519,
                    groups::SECP256R1,
                    groups::SECP384R1,
                ],
            },
            TlsExtension::EcPointFormats { formats: vec![POINT_FORMAT_UNCOMPRESSED] },
            TlsExtension::SessionTicket,
            TlsExtension::Alpn,
            TlsExtension::StatusRequest,
            TlsExtension::SignatureAlgorithms {
                schemes: vec![
                    sigschemes::ECDSA_SECP256R1_SHA256,
                    sigschemes::RSA_PSS_RSAE_SHA256,
                    sigschemes::RSA_PKCS1_SHA256,
                    sigschemes::ECDSA_SECP384R1_SHA384,
                    sigschemes::RSA_PSS_RSAE_SHA384,
                    sigschemes::RSA_PKCS1_SHA384,
                    sigschemes::RSA_PSS_RSAE_SHA512,
                    sigschemes::RSA_PKCS1_SHA512,
                ],
            },
            TlsExtension::SignedCertificateTimestamp,
            TlsExtension::KeyShare {
                groups: vec![GREASE, groups::X25519_MLKEM768, groups::X25519],
            },
            TlsExtension::PskKeyExchangeModes { modes: vec![PSK_MODE_DHE] },
            TlsExtension::SupportedVersions { versions: vec![GREASE, VERSION_TLS13, VERSION_TLS12] },
            TlsExtension::CompressCertificate { algorithms: vec![certcompress::BROTLI] },
            TlsExtension::ApplicationSettings { protocols: vec![AlpnProtocol::HTTP2] },
            TlsExtension::GreaseTrailing,
            TlsExtension::Padding,
        ],
    }
}

fn default_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Connection", "keep-alive"),
        ("Host", ""),
        ("Cache-Control", "max-age=0"),
        ("sec-ch-ua", "\"Microsoft Edge\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\""),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", "\"Windows\""),
        ("Upgrade-Insecure-Requests", "1"),
        ("User-Agent", USER_AGENT),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-User", "?1"),
        ("Sec-Fetch-Dest", "document"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Accept-Language", "en-US,en;q=0.9"),
    ]
}

fn h2_profile() -> H2Profile {
    H2Profile {
        header_table_size: Some(65536),
        enable_push: Some(false),
        max_concurrent_streams: Some(1000),
        initial_window_size: 6291456,
        initial_conn_window_size: 15728640,
        max_frame_size: Some(16384),
        max_header_list_size: Some(262144),
        settings_order: Some(
            SettingsOrder::builder()
                .push(SettingId::HeaderTableSize)
                .push(SettingId::EnablePush)
                .push(SettingId::MaxConcurrentStreams)
                .push(SettingId::InitialWindowSize)
                .push(SettingId::MaxFrameSize)
                .push(SettingId::MaxHeaderListSize)
                .build(),
        ),
    }
}
