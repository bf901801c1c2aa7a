//! TCP connection establishment and proxy tunneling.
//!
//! Produces the raw byte stream the TLS dialer hands to BoringSSL: a direct
//! TCP connection, or a tunnel through an HTTP, HTTPS (TLS-to-proxy), or
//! SOCKS5 upstream. Every I/O exchange is bounded by the per-step timeout
//! and the job's cancel token.

use crate::base::cancel::JobCtx;
use crate::base::error::{NetError, TransportCause};
use crate::socket::proxy::{ProxyEndpoint, ProxyScheme};
use crate::socket::stream::BoxedSocket;
use boring::ssl::{SslConnector, SslMethod};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

const MAX_CONNECT_RESPONSE: usize = 8192;

const SOCKS5_VERSION: u8 = 0x05;
const SOCKS5_NO_AUTH: u8 = 0x00;
const SOCKS5_USERPASS: u8 = 0x02;
const SOCKS5_CMD_CONNECT: u8 = 0x01;
const SOCKS5_ADDR_DOMAIN: u8 = 0x03;

/// Open a byte stream to `host:port`, directly or through `proxy`.
pub async fn open_tunnel(
    host: &str,
    port: u16,
    proxy: Option<&ProxyEndpoint>,
    ctx: &JobCtx,
    io_timeout: Duration,
) -> Result<BoxedSocket, NetError> {
    match proxy {
        None => {
            let stream = tcp_connect(host, port, ctx, io_timeout)
                .await
                .map_err(|e| NetError::TransportFailure(TransportCause::Io(e)))?;
            Ok(BoxedSocket::new(stream))
        }
        Some(proxy) => {
            let mut stream = tcp_connect(proxy.host(), proxy.port(), ctx, io_timeout)
                .await
                .map_err(|e| NetError::ProxyUnreachable(format!("{proxy}: {e}")))?;

            match proxy.scheme() {
                ProxyScheme::Http => {
                    http_connect(&mut stream, host, port, proxy, ctx, io_timeout).await?;
                    Ok(BoxedSocket::new(stream))
                }
                ProxyScheme::Https => {
                    let mut tls = proxy_tls(stream, proxy, ctx, io_timeout).await?;
                    http_connect(&mut tls, host, port, proxy, ctx, io_timeout).await?;
                    Ok(BoxedSocket::new(tls))
                }
                ProxyScheme::Socks5 => {
                    socks5_handshake(&mut stream, host, port, proxy, ctx, io_timeout).await?;
                    Ok(BoxedSocket::new(stream))
                }
            }
        }
    }
}

/// Resolve and connect, trying each address in resolver order.
async fn tcp_connect(
    host: &str,
    port: u16,
    ctx: &JobCtx,
    io_timeout: Duration,
) -> Result<TcpStream, String> {
    let addrs: Vec<SocketAddr> = ctx
        .run(io_timeout, async {
            tokio::net::lookup_host((host, port))
                .await
                .map_err(NetError::from)
        })
        .await
        .map_err(|e| e.to_string())?
        .collect();

    if addrs.is_empty() {
        return Err(format!("no addresses for {host}"));
    }

    let mut last = String::from("connect failed");
    for addr in addrs {
        match ctx
            .run(io_timeout, async {
                TcpStream::connect(addr).await.map_err(NetError::from)
            })
            .await
        {
            Ok(stream) => return Ok(stream),
            Err(e) => last = e.to_string(),
        }
    }
    Err(last)
}

/// TLS handshake to the proxy itself (HTTPS proxies). Uses a stock
/// connector: the browser fingerprint applies to the origin handshake, not
/// the proxy hop.
async fn proxy_tls(
    stream: TcpStream,
    proxy: &ProxyEndpoint,
    ctx: &JobCtx,
    io_timeout: Duration,
) -> Result<tokio_boring::SslStream<TcpStream>, NetError> {
    let builder = SslConnector::builder(SslMethod::tls())
        .map_err(|e| NetError::ProxyUnreachable(format!("{proxy}: tls setup: {e}")))?;
    let config = builder
        .build()
        .configure()
        .map_err(|e| NetError::ProxyUnreachable(format!("{proxy}: tls setup: {e}")))?;

    let host = proxy.host().to_string();
    ctx.run(io_timeout, async move {
        tokio_boring::connect(config, &host, stream)
            .await
            .map_err(|e| NetError::ProxyUnreachable(format!("tls to proxy: {e:?}")))
    })
    .await
}

/// `CONNECT host:port` exchange over an established proxy stream.
async fn http_connect<S>(
    stream: &mut S,
    host: &str,
    port: u16,
    proxy: &ProxyEndpoint,
    ctx: &JobCtx,
    io_timeout: Duration,
) -> Result<(), NetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let target = format!("{host}:{port}");
    let mut request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n");
    if let Some(auth) = proxy.basic_auth_header() {
        request.push_str(&format!("Proxy-Authorization: {auth}\r\n"));
    }
    request.push_str("\r\n");

    ctx.run(io_timeout, async {
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| NetError::ProxyUnreachable(format!("{proxy}: connect write: {e}")))
    })
    .await?;

    // Read the response head; anything past the blank line belongs to TLS.
    let mut response = Vec::with_capacity(256);
    let mut buf = [0u8; 256];
    loop {
        let n = ctx
            .run(io_timeout, async {
                stream
                    .read(&mut buf)
                    .await
                    .map_err(|e| NetError::ProxyUnreachable(format!("{proxy}: connect read: {e}")))
            })
            .await?;
        if n == 0 {
            return Err(NetError::ProxyUnreachable(format!("{proxy}: closed during CONNECT")));
        }
        response.extend_from_slice(&buf[..n]);
        if response.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if response.len() > MAX_CONNECT_RESPONSE {
            return Err(NetError::ProxyUnreachable(format!("{proxy}: oversized CONNECT reply")));
        }
    }

    let head = String::from_utf8_lossy(&response);
    let status: Option<u16> = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok());
    match status {
        Some(code) if (200..300).contains(&code) => Ok(()),
        Some(code) => Err(NetError::ProxyUnreachable(format!("{proxy}: CONNECT returned {code}"))),
        None => Err(NetError::ProxyUnreachable(format!("{proxy}: malformed CONNECT reply"))),
    }
}

/// SOCKS5 handshake (RFC 1928) with username/password subnegotiation
/// (RFC 1929) when the endpoint carries credentials.
async fn socks5_handshake(
    stream: &mut TcpStream,
    host: &str,
    port: u16,
    proxy: &ProxyEndpoint,
    ctx: &JobCtx,
    io_timeout: Duration,
) -> Result<(), NetError> {
    if host.len() > 255 {
        return Err(NetError::ConfigurationInvalid(format!("hostname too long: {host}")));
    }
    let fail = |msg: String| NetError::ProxyUnreachable(format!("{proxy}: {msg}"));

    // Greeting: offer userpass only when we actually have credentials.
    let greeting: &[u8] = if proxy.socks_auth().is_some() {
        &[SOCKS5_VERSION, 0x02, SOCKS5_NO_AUTH, SOCKS5_USERPASS]
    } else {
        &[SOCKS5_VERSION, 0x01, SOCKS5_NO_AUTH]
    };
    ctx.run(io_timeout, async {
        stream.write_all(greeting).await.map_err(|e| fail(format!("greeting write: {e}")))
    })
    .await?;

    let mut reply = [0u8; 2];
    ctx.run(io_timeout, async {
        stream.read_exact(&mut reply).await.map_err(|e| fail(format!("greeting read: {e}")))
    })
    .await?;
    if reply[0] != SOCKS5_VERSION {
        return Err(fail(format!("bad socks version {}", reply[0])));
    }

    match reply[1] {
        SOCKS5_NO_AUTH => {}
        SOCKS5_USERPASS => {
            let (user, pass) = proxy
                .socks_auth()
                .ok_or_else(|| fail("server demands auth, none configured".into()))?;
            let mut msg = Vec::with_capacity(3 + user.len() + pass.len());
            msg.push(0x01); // subnegotiation version
            msg.push(user.len() as u8);
            msg.extend_from_slice(user.as_bytes());
            msg.push(pass.len() as u8);
            msg.extend_from_slice(pass.as_bytes());
            ctx.run(io_timeout, async {
                stream.write_all(&msg).await.map_err(|e| fail(format!("auth write: {e}")))
            })
            .await?;

            let mut auth_reply = [0u8; 2];
            ctx.run(io_timeout, async {
                stream
                    .read_exact(&mut auth_reply)
                    .await
                    .map_err(|e| fail(format!("auth read: {e}")))
            })
            .await?;
            if auth_reply[1] != 0x00 {
                return Err(fail("authentication rejected".into()));
            }
        }
        method => return Err(fail(format!("unsupported auth method {method}"))),
    }

    // CONNECT request with domain address type; the proxy resolves.
    let mut request = Vec::with_capacity(7 + host.len());
    request.push(SOCKS5_VERSION);
    request.push(SOCKS5_CMD_CONNECT);
    request.push(0x00); // reserved
    request.push(SOCKS5_ADDR_DOMAIN);
    request.push(host.len() as u8);
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    ctx.run(io_timeout, async {
        stream.write_all(&request).await.map_err(|e| fail(format!("connect write: {e}")))
    })
    .await?;

    let mut head = [0u8; 5];
    ctx.run(io_timeout, async {
        stream.read_exact(&mut head).await.map_err(|e| fail(format!("connect read: {e}")))
    })
    .await?;
    if head[0] != SOCKS5_VERSION {
        return Err(fail(format!("bad socks version {}", head[0])));
    }
    if head[1] != 0x00 {
        return Err(fail(format!("connect rejected, status {}", head[1])));
    }

    // Drain the bound address; length depends on the address type.
    let remaining = match head[3] {
        0x01 => 4 + 2 - 1,
        SOCKS5_ADDR_DOMAIN => head[4] as usize + 2,
        0x04 => 16 + 2 - 1,
        other => return Err(fail(format!("bad address type {other}"))),
    };
    let mut rest = vec![0u8; remaining];
    ctx.run(io_timeout, async {
        stream.read_exact(&mut rest).await.map_err(|e| fail(format!("connect read: {e}")))
    })
    .await?;

    Ok(())
}
