//! ClientHello specification.
//!
//! A [`ClientHelloSpec`] is the complete, ordered description of the TLS
//! ClientHello a browser profile emits: version bounds, cipher suites by
//! IANA code point, and the extension list as a closed sum where every
//! variant carries its own payload shape. The same spec drives two things:
//!
//! - [`ClientHelloSpec::encode`], a deterministic serializer producing the
//!   handshake-message bytes the golden tests pin, and
//! - [`ClientHelloSpec::apply_to_connector`], which shapes the BoringSSL
//!   connector that performs the live handshake.
//!
//! Fields a real handshake randomizes (client random, session id, key-share
//! material, GREASE draws) are fixed placeholders in the encoded form so the
//! bytes are identical across runs.

use crate::base::error::NetError;
use boring::ssl::{SslConnectorBuilder, SslOptions, SslVerifyMode, SslVersion};

/// TLS protocol version code points.
pub const VERSION_TLS10: u16 = 0x0301;
pub const VERSION_TLS11: u16 = 0x0302;
pub const VERSION_TLS12: u16 = 0x0303;
pub const VERSION_TLS13: u16 = 0x0304;

/// Fixed GREASE placeholder (RFC 8701). Real stacks draw these per
/// connection; the encoded form pins one so golden bytes are stable.
pub const GREASE: u16 = 0x0a0a;
/// Second GREASE placeholder used for the trailing extension.
pub const GREASE_TRAILING: u16 = 0x1a1a;

/// Supported-group code points (RFC 8446 + drafts).
pub mod groups {
    pub const X25519_MLKEM768: u16 = 0x11ec;
    pub const X25519: u16 = 0x001d;
    pub const SECP256R1: u16 = 0x0017;
    pub const SECP384R1: u16 = 0x0018;
    pub const SECP521R1: u16 = 0x0019;
    pub const FFDHE2048: u16 = 0x0100;
    pub const FFDHE3072: u16 = 0x0101;
}

/// Cipher suite code points (IANA).
pub mod ciphers {
    pub const TLS_AES_128_GCM_SHA256: u16 = 0x1301;
    pub const TLS_AES_256_GCM_SHA384: u16 = 0x1302;
    pub const TLS_CHACHA20_POLY1305_SHA256: u16 = 0x1303;
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256: u16 = 0xc02b;
    pub const TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: u16 = 0xc02f;
    pub const TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384: u16 = 0xc02c;
    pub const TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: u16 = 0xc030;
    pub const TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256: u16 = 0xcca9;
    pub const TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256: u16 = 0xcca8;
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA: u16 = 0xc009;
    pub const TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA: u16 = 0xc00a;
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256: u16 = 0xc023;
    pub const TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384: u16 = 0xc024;
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA: u16 = 0xc013;
    pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA: u16 = 0xc014;
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256: u16 = 0xc027;
    pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384: u16 = 0xc028;
    pub const TLS_RSA_WITH_AES_128_GCM_SHA256: u16 = 0x009c;
    pub const TLS_RSA_WITH_AES_256_GCM_SHA384: u16 = 0x009d;
    pub const TLS_RSA_WITH_AES_128_CBC_SHA: u16 = 0x002f;
    pub const TLS_RSA_WITH_AES_256_CBC_SHA: u16 = 0x0035;
    pub const TLS_RSA_WITH_AES_128_CBC_SHA256: u16 = 0x003c;
    pub const TLS_RSA_WITH_AES_256_CBC_SHA256: u16 = 0x003d;
    pub const TLS_ECDHE_ECDSA_WITH_3DES_EDE_CBC_SHA: u16 = 0xc008;
    pub const TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA: u16 = 0xc012;
    pub const TLS_RSA_WITH_3DES_EDE_CBC_SHA: u16 = 0x000a;
}

/// Signature scheme code points (RFC 8446).
pub mod sigschemes {
    pub const ECDSA_SECP256R1_SHA256: u16 = 0x0403;
    pub const ECDSA_SECP384R1_SHA384: u16 = 0x0503;
    pub const ECDSA_SECP521R1_SHA512: u16 = 0x0603;
    pub const RSA_PSS_RSAE_SHA256: u16 = 0x0804;
    pub const RSA_PSS_RSAE_SHA384: u16 = 0x0805;
    pub const RSA_PSS_RSAE_SHA512: u16 = 0x0806;
    pub const RSA_PKCS1_SHA256: u16 = 0x0401;
    pub const RSA_PKCS1_SHA384: u16 = 0x0501;
    pub const RSA_PKCS1_SHA512: u16 = 0x0601;
    pub const ECDSA_SHA1: u16 = 0x0203;
    pub const RSA_PKCS1_SHA1: u16 = 0x0201;
}

/// Certificate compression algorithms (RFC 8879).
pub mod certcompress {
    pub const ZLIB: u16 = 0x0001;
    pub const BROTLI: u16 = 0x0002;
    pub const ZSTD: u16 = 0x0003;
}

/// PSK key exchange mode (RFC 8446).
pub const PSK_MODE_DHE: u8 = 0x01;
/// Uncompressed EC point format.
pub const POINT_FORMAT_UNCOMPRESSED: u8 = 0x00;

/// TLS ALPN protocol.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct AlpnProtocol(pub(crate) &'static [u8]);

impl AlpnProtocol {
    /// HTTP/1.1
    pub const HTTP1: AlpnProtocol = AlpnProtocol(b"http/1.1");
    /// HTTP/2
    pub const HTTP2: AlpnProtocol = AlpnProtocol(b"h2");

    pub const fn as_bytes(&self) -> &'static [u8] {
        self.0
    }

    pub fn as_str(&self) -> &'static str {
        std::str::from_utf8(self.0).unwrap_or("unknown")
    }

    /// Encode a protocol sequence in ALPN wire format.
    pub fn encode_wire_format(protocols: &[AlpnProtocol]) -> Vec<u8> {
        let mut buf = Vec::new();
        for proto in protocols {
            buf.push(proto.0.len() as u8);
            buf.extend_from_slice(proto.0);
        }
        buf
    }

    /// Match a server-selected protocol against the known constants.
    pub fn from_wire(bytes: &[u8]) -> Option<AlpnProtocol> {
        match bytes {
            b"h2" => Some(AlpnProtocol::HTTP2),
            b"http/1.1" => Some(AlpnProtocol::HTTP1),
            _ => None,
        }
    }
}

/// Renegotiation indication mode carried by the renegotiation_info extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenegotiateMode {
    Never,
    OnceAsClient,
}

/// One ClientHello extension with its payload, in the profile's wire order.
///
/// This is a closed sum: byte-faithfulness is encoded by matching on the
/// variant, not by virtual dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsExtension {
    /// Leading GREASE extension (empty payload).
    Grease,
    /// server_name; the host is substituted at dial time.
    ServerName,
    ExtendedMasterSecret,
    RenegotiationInfo { mode: RenegotiateMode },
    SupportedGroups { groups: Vec<u16> },
    EcPointFormats { formats: Vec<u8> },
    SessionTicket,
    /// application_layer_protocol_negotiation; the effective list (profile
    /// order, possibly narrowed by the caller) is substituted at encode time.
    Alpn,
    StatusRequest,
    SignatureAlgorithms { schemes: Vec<u16> },
    SignedCertificateTimestamp,
    KeyShare { groups: Vec<u16> },
    PskKeyExchangeModes { modes: Vec<u8> },
    SupportedVersions { versions: Vec<u16> },
    CompressCertificate { algorithms: Vec<u16> },
    /// application_settings (ALPS), old codepoint.
    ApplicationSettings { protocols: Vec<AlpnProtocol> },
    RecordSizeLimit { limit: u16 },
    /// Trailing GREASE extension (single zero byte payload).
    GreaseTrailing,
    /// Pads the hello to a 512-byte handshake body when it would otherwise
    /// land in the fingerprintable 256..512 range.
    Padding,
}

impl TlsExtension {
    fn ext_type(&self) -> u16 {
        match self {
            TlsExtension::Grease => GREASE,
            TlsExtension::ServerName => 0x0000,
            TlsExtension::ExtendedMasterSecret => 0x0017,
            TlsExtension::RenegotiationInfo { .. } => 0xff01,
            TlsExtension::SupportedGroups { .. } => 0x000a,
            TlsExtension::EcPointFormats { .. } => 0x000b,
            TlsExtension::SessionTicket => 0x0023,
            TlsExtension::Alpn => 0x0010,
            TlsExtension::StatusRequest => 0x0005,
            TlsExtension::SignatureAlgorithms { .. } => 0x000d,
            TlsExtension::SignedCertificateTimestamp => 0x0012,
            TlsExtension::KeyShare { .. } => 0x0033,
            TlsExtension::PskKeyExchangeModes { .. } => 0x002d,
            TlsExtension::SupportedVersions { .. } => 0x002b,
            TlsExtension::CompressCertificate { .. } => 0x001b,
            TlsExtension::ApplicationSettings { .. } => 0x4469,
            TlsExtension::RecordSizeLimit { .. } => 0x001c,
            TlsExtension::GreaseTrailing => GREASE_TRAILING,
            TlsExtension::Padding => 0x0015,
        }
    }

    fn encode_payload(&self, sni: &str, alpn: &[AlpnProtocol], out: &mut Vec<u8>) {
        match self {
            TlsExtension::Grease
            | TlsExtension::ExtendedMasterSecret
            | TlsExtension::SessionTicket
            | TlsExtension::SignedCertificateTimestamp
            | TlsExtension::Padding => {}
            TlsExtension::GreaseTrailing => out.push(0x00),
            TlsExtension::ServerName => {
                // server_name_list: one host_name entry.
                let name = sni.as_bytes();
                put_u16(out, (name.len() + 3) as u16);
                out.push(0x00);
                put_u16(out, name.len() as u16);
                out.extend_from_slice(name);
            }
            TlsExtension::RenegotiationInfo { .. } => {
                // renegotiated_connection: empty on initial handshake.
                out.push(0x00);
            }
            TlsExtension::SupportedGroups { groups } => {
                put_u16(out, (groups.len() * 2) as u16);
                for g in groups {
                    put_u16(out, *g);
                }
            }
            TlsExtension::EcPointFormats { formats } => {
                out.push(formats.len() as u8);
                out.extend_from_slice(formats);
            }
            TlsExtension::Alpn => {
                let wire = AlpnProtocol::encode_wire_format(alpn);
                put_u16(out, wire.len() as u16);
                out.extend_from_slice(&wire);
            }
            TlsExtension::StatusRequest => {
                // OCSP, empty responder id list, empty request extensions.
                out.push(0x01);
                put_u16(out, 0);
                put_u16(out, 0);
            }
            TlsExtension::SignatureAlgorithms { schemes } => {
                put_u16(out, (schemes.len() * 2) as u16);
                for s in schemes {
                    put_u16(out, *s);
                }
            }
            TlsExtension::KeyShare { groups } => {
                let mut shares = Vec::new();
                for g in groups {
                    put_u16(&mut shares, *g);
                    let len = key_share_len(*g);
                    put_u16(&mut shares, len as u16);
                    shares.resize(shares.len() + len, 0x00);
                }
                put_u16(out, shares.len() as u16);
                out.extend_from_slice(&shares);
            }
            TlsExtension::PskKeyExchangeModes { modes } => {
                out.push(modes.len() as u8);
                out.extend_from_slice(modes);
            }
            TlsExtension::SupportedVersions { versions } => {
                out.push((versions.len() * 2) as u8);
                for v in versions {
                    put_u16(out, *v);
                }
            }
            TlsExtension::CompressCertificate { algorithms } => {
                out.push((algorithms.len() * 2) as u8);
                for a in algorithms {
                    put_u16(out, *a);
                }
            }
            TlsExtension::ApplicationSettings { protocols } => {
                let wire = AlpnProtocol::encode_wire_format(protocols);
                put_u16(out, wire.len() as u16);
                out.extend_from_slice(&wire);
            }
            TlsExtension::RecordSizeLimit { limit } => put_u16(out, *limit),
        }
    }
}

/// Placeholder key-exchange lengths per group, zero-filled in encoded form.
fn key_share_len(group: u16) -> usize {
    match group {
        groups::X25519_MLKEM768 => 1216,
        groups::X25519 => 32,
        groups::SECP256R1 => 65,
        groups::SECP384R1 => 97,
        groups::SECP521R1 => 133,
        GREASE => 1,
        _ => 32,
    }
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// The full ClientHello description for one browser profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHelloSpec {
    pub min_version: u16,
    pub max_version: u16,
    /// Ordered cipher suites, GREASE placeholder included where the browser
    /// sends one.
    pub cipher_suites: Vec<u16>,
    pub compression_methods: Vec<u8>,
    /// Ordered extension list; order is part of the fingerprint.
    pub extensions: Vec<TlsExtension>,
}

impl ClientHelloSpec {
    /// Serialize the ClientHello handshake message (type + length + body)
    /// with `sni` and the effective `alpn` list substituted in.
    ///
    /// Randomized fields are fixed placeholders; the output is byte-identical
    /// across runs and is what the golden tests pin.
    pub fn encode(&self, sni: &str, alpn: &[AlpnProtocol]) -> Vec<u8> {
        let mut body = Vec::with_capacity(512);

        put_u16(&mut body, VERSION_TLS12); // legacy_version
        body.resize(body.len() + 32, 0x00); // random (placeholder)
        body.push(32);
        body.resize(body.len() + 32, 0x00); // legacy_session_id (placeholder)

        put_u16(&mut body, (self.cipher_suites.len() * 2) as u16);
        for suite in &self.cipher_suites {
            put_u16(&mut body, *suite);
        }

        body.push(self.compression_methods.len() as u8);
        body.extend_from_slice(&self.compression_methods);

        // Encode extensions; padding is sized after everything else.
        let mut entries: Vec<(u16, Vec<u8>)> = Vec::with_capacity(self.extensions.len());
        let mut padding_slot = None;
        for ext in &self.extensions {
            let mut payload = Vec::new();
            ext.encode_payload(sni, alpn, &mut payload);
            if matches!(ext, TlsExtension::Padding) {
                padding_slot = Some(entries.len());
            }
            entries.push((ext.ext_type(), payload));
        }

        if let Some(slot) = padding_slot {
            let unpadded = body.len() + 2 + entries.iter().map(|(_, p)| 4 + p.len()).sum::<usize>();
            if unpadded > 0x100 && unpadded < 0x200 {
                entries[slot].1 = vec![0x00; 0x200 - unpadded];
            }
        }

        let ext_len: usize = entries.iter().map(|(_, p)| 4 + p.len()).sum();
        put_u16(&mut body, ext_len as u16);
        for (ext_type, payload) in entries {
            put_u16(&mut body, ext_type);
            put_u16(&mut body, payload.len() as u16);
            body.extend_from_slice(&payload);
        }

        let mut msg = Vec::with_capacity(body.len() + 4);
        msg.push(0x01); // handshake type: client_hello
        msg.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
        msg.extend_from_slice(&body);
        msg
    }

    /// Shape a BoringSSL connector builder from this spec, advertising the
    /// effective `alpn` list.
    pub fn apply_to_connector(
        &self,
        builder: &mut SslConnectorBuilder,
        alpn: &[AlpnProtocol],
    ) -> Result<(), NetError> {
        builder.set_verify(SslVerifyMode::PEER);

        builder
            .set_min_proto_version(Some(ssl_version(self.min_version)))
            .map_err(|e| NetError::TlsHandshakeFailed(e.to_string()))?;
        builder
            .set_max_proto_version(Some(ssl_version(self.max_version)))
            .map_err(|e| NetError::TlsHandshakeFailed(e.to_string()))?;

        let cipher_list = self.cipher_list_string();
        if !cipher_list.is_empty() {
            builder
                .set_cipher_list(&cipher_list)
                .map_err(|e| NetError::TlsHandshakeFailed(e.to_string()))?;
        }

        if !alpn.is_empty() {
            let wire = AlpnProtocol::encode_wire_format(alpn);
            builder
                .set_alpn_protos(&wire)
                .map_err(|e| NetError::TlsHandshakeFailed(e.to_string()))?;
        }

        let mut grease = false;
        let mut session_ticket = false;
        for ext in &self.extensions {
            match ext {
                TlsExtension::Grease | TlsExtension::GreaseTrailing => grease = true,
                TlsExtension::SessionTicket => session_ticket = true,
                TlsExtension::SupportedGroups { groups } => {
                    let list = curves_list_string(groups);
                    if !list.is_empty() {
                        builder
                            .set_curves_list(&list)
                            .map_err(|e| NetError::TlsHandshakeFailed(e.to_string()))?;
                    }
                }
                TlsExtension::SignatureAlgorithms { schemes } => {
                    let list = sigalgs_list_string(schemes);
                    if !list.is_empty() {
                        builder
                            .set_sigalgs_list(&list)
                            .map_err(|e| NetError::TlsHandshakeFailed(e.to_string()))?;
                    }
                }
                _ => {}
            }
        }

        builder.set_grease_enabled(grease);
        if !session_ticket {
            builder.set_options(SslOptions::NO_TICKET);
        }

        Ok(())
    }

    /// BoringSSL cipher configuration string from the IANA list.
    fn cipher_list_string(&self) -> String {
        self.cipher_suites
            .iter()
            .filter_map(|id| cipher_name(*id))
            .collect::<Vec<_>>()
            .join(":")
    }
}

fn ssl_version(code: u16) -> SslVersion {
    match code {
        VERSION_TLS10 => SslVersion::TLS1,
        VERSION_TLS11 => SslVersion::TLS1_1,
        VERSION_TLS13 => SslVersion::TLS1_3,
        _ => SslVersion::TLS1_2,
    }
}

fn cipher_name(id: u16) -> Option<&'static str> {
    use ciphers::*;
    Some(match id {
        TLS_AES_128_GCM_SHA256 => "TLS_AES_128_GCM_SHA256",
        TLS_AES_256_GCM_SHA384 => "TLS_AES_256_GCM_SHA384",
        TLS_CHACHA20_POLY1305_SHA256 => "TLS_CHACHA20_POLY1305_SHA256",
        TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 => "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 => "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
        TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 => "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256 => {
            "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256"
        }
        TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256 => {
            "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256"
        }
        TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA => "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
        TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA => "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
        TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA => "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
        TLS_RSA_WITH_AES_128_GCM_SHA256 => "TLS_RSA_WITH_AES_128_GCM_SHA256",
        TLS_RSA_WITH_AES_256_GCM_SHA384 => "TLS_RSA_WITH_AES_256_GCM_SHA384",
        TLS_RSA_WITH_AES_128_CBC_SHA => "TLS_RSA_WITH_AES_128_CBC_SHA",
        TLS_RSA_WITH_AES_256_CBC_SHA => "TLS_RSA_WITH_AES_256_CBC_SHA",
        _ => return None,
    })
}

/// Curve names BoringSSL understands; GREASE and the ffdhe groups appear in
/// the advertised list only.
fn curves_list_string(groups_list: &[u16]) -> String {
    groups_list
        .iter()
        .filter_map(|g| {
            Some(match *g {
                groups::X25519_MLKEM768 => "X25519MLKEM768",
                groups::X25519 => "X25519",
                groups::SECP256R1 => "P-256",
                groups::SECP384R1 => "P-384",
                groups::SECP521R1 => "P-521",
                _ => return None,
            })
        })
        .collect::<Vec<_>>()
        .join(":")
}

fn sigalgs_list_string(schemes: &[u16]) -> String {
    use sigschemes::*;
    schemes
        .iter()
        .filter_map(|s| {
            Some(match *s {
                ECDSA_SECP256R1_SHA256 => "ecdsa_secp256r1_sha256",
                ECDSA_SECP384R1_SHA384 => "ecdsa_secp384r1_sha384",
                ECDSA_SECP521R1_SHA512 => "ecdsa_secp521r1_sha512",
                RSA_PSS_RSAE_SHA256 => "rsa_pss_rsae_sha256",
                RSA_PSS_RSAE_SHA384 => "rsa_pss_rsae_sha384",
                RSA_PSS_RSAE_SHA512 => "rsa_pss_rsae_sha512",
                RSA_PKCS1_SHA256 => "rsa_pkcs1_sha256",
                RSA_PKCS1_SHA384 => "rsa_pkcs1_sha384",
                RSA_PKCS1_SHA512 => "rsa_pkcs1_sha512",
                ECDSA_SHA1 => "ecdsa_sha1",
                RSA_PKCS1_SHA1 => "rsa_pkcs1_sha1",
                _ => return None,
            })
        })
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_spec() -> ClientHelloSpec {
        ClientHelloSpec {
            min_version: VERSION_TLS12,
            max_version: VERSION_TLS13,
            cipher_suites: vec![ciphers::TLS_AES_128_GCM_SHA256],
            compression_methods: vec![0x00],
            extensions: vec![
                TlsExtension::ServerName,
                TlsExtension::Alpn,
                TlsExtension::SupportedVersions {
                    versions: vec![VERSION_TLS13, VERSION_TLS12],
                },
            ],
        }
    }

    #[test]
    fn encode_is_deterministic() {
        let spec = minimal_spec();
        let a = spec.encode("example.test", &[AlpnProtocol::HTTP2]);
        let b = spec.encode("example.test", &[AlpnProtocol::HTTP2]);
        assert_eq!(a, b);
    }

    #[test]
    fn encode_embeds_sni() {
        let spec = minimal_spec();
        let bytes = spec.encode("example.test", &[AlpnProtocol::HTTP2]);
        let needle = b"example.test";
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn encode_embeds_alpn() {
        let spec = minimal_spec();
        let h2_only = spec.encode("a.test", &[AlpnProtocol::HTTP2]);
        let h1_only = spec.encode("a.test", &[AlpnProtocol::HTTP1]);
        assert_ne!(h2_only, h1_only);
        assert!(h1_only.windows(8).any(|w| w == b"http/1.1"));
        assert!(!h2_only.windows(8).any(|w| w == b"http/1.1"));
    }

    #[test]
    fn handshake_header_length_matches() {
        let spec = minimal_spec();
        let bytes = spec.encode("a.test", &[AlpnProtocol::HTTP2]);
        assert_eq!(bytes[0], 0x01);
        let len = u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(len, bytes.len() - 4);
    }

    #[test]
    fn alpn_wire_format() {
        let wire = AlpnProtocol::encode_wire_format(&[AlpnProtocol::HTTP2, AlpnProtocol::HTTP1]);
        assert_eq!(wire, b"\x02h2\x08http/1.1");
    }

    #[test]
    fn key_share_lengths() {
        let ext = TlsExtension::KeyShare { groups: vec![GREASE, groups::X25519] };
        let mut payload = Vec::new();
        ext.encode_payload("", &[], &mut payload);
        // 2 (list len) + (2+2+1) GREASE share + (2+2+32) x25519 share.
        assert_eq!(payload.len(), 2 + 5 + 36);
    }
}
