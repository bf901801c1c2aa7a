//! Hand-written HTTP/1.1 codec.
//!
//! The request writer emits the header block byte-for-byte as given; order
//! and casing are the fingerprint, so nothing here may normalize them. The
//! response reader handles Content-Length, chunked, and read-to-EOF framing
//! with the body ceiling enforced while reading.

use crate::base::cancel::JobCtx;
use crate::base::error::{NetError, TransportCause};
use crate::http::orderedheaders::OrderedHeaders;
use http::Method;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const MAX_HEAD_BYTES: usize = 65536;

fn bad_framing(msg: impl Into<String>) -> NetError {
    NetError::TransportFailure(TransportCause::BadFraming(msg.into()))
}

/// Write one request. `target` is the origin-form request target
/// (path plus query).
pub async fn write_request<S>(
    sock: &mut S,
    method: &Method,
    target: &str,
    headers: &OrderedHeaders,
    body: Option<&[u8]>,
    ctx: &JobCtx,
    io_timeout: Duration,
) -> Result<(), NetError>
where
    S: AsyncWrite + Unpin,
{
    let mut head = String::with_capacity(256);
    head.push_str(method.as_str());
    head.push(' ');
    head.push_str(target);
    head.push_str(" HTTP/1.1\r\n");
    for (name, value) in headers.iter() {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    ctx.run(io_timeout, async {
        sock.write_all(head.as_bytes()).await?;
        if let Some(body) = body {
            sock.write_all(body).await?;
        }
        sock.flush().await?;
        Ok(())
    })
    .await
}

/// One parsed HTTP/1.1 response.
#[derive(Debug)]
pub struct H1Response {
    pub status: u16,
    pub headers: OrderedHeaders,
    pub body: Vec<u8>,
    /// Whether the connection may carry another request afterwards.
    pub keep_alive: bool,
}

/// Read one response. `head_request` suppresses the body per RFC 9110.
pub async fn read_response<S>(
    sock: &mut S,
    head_request: bool,
    max_body: usize,
    ctx: &JobCtx,
    io_timeout: Duration,
) -> Result<H1Response, NetError>
where
    S: AsyncRead + Unpin,
{
    let mut pending: Vec<u8> = Vec::with_capacity(4096);

    loop {
        let (status, headers, http10) = read_head(sock, &mut pending, ctx, io_timeout).await?;
        if status == 100 {
            // Interim response; the real one follows.
            continue;
        }

        let mut keep_alive = !http10;
        if let Some(conn) = headers.get("connection") {
            if conn.to_ascii_lowercase().contains("close") {
                keep_alive = false;
            } else if conn.to_ascii_lowercase().contains("keep-alive") {
                keep_alive = true;
            }
        }

        let no_body = head_request || status < 200 || status == 204 || status == 304;
        if no_body {
            return Ok(H1Response { status, headers, body: Vec::new(), keep_alive });
        }

        let chunked = headers
            .get("transfer-encoding")
            .map(|te| te.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);

        let body = if chunked {
            read_chunked(sock, &mut pending, max_body, ctx, io_timeout).await?
        } else if let Some(len) = headers.get("content-length") {
            let len: usize = len
                .trim()
                .parse()
                .map_err(|_| bad_framing(format!("content-length {len:?}")))?;
            if len > max_body {
                return Err(NetError::ResponseTooLarge { limit: max_body });
            }
            read_exact_body(sock, &mut pending, len, ctx, io_timeout).await?
        } else {
            // No framing: the body runs to EOF and the connection dies.
            keep_alive = false;
            read_to_eof(sock, &mut pending, max_body, ctx, io_timeout).await?
        };

        return Ok(H1Response { status, headers, body, keep_alive });
    }
}

async fn fill<S>(
    sock: &mut S,
    pending: &mut Vec<u8>,
    ctx: &JobCtx,
    io_timeout: Duration,
) -> Result<usize, NetError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 8192];
    let n = ctx
        .run(io_timeout, async { sock.read(&mut buf).await.map_err(NetError::from) })
        .await?;
    pending.extend_from_slice(&buf[..n]);
    Ok(n)
}

/// Parse the status line and header block, consuming them from `pending`.
async fn read_head<S>(
    sock: &mut S,
    pending: &mut Vec<u8>,
    ctx: &JobCtx,
    io_timeout: Duration,
) -> Result<(u16, OrderedHeaders, bool), NetError>
where
    S: AsyncRead + Unpin,
{
    let head_end = loop {
        if let Some(pos) = find_double_crlf(pending) {
            break pos;
        }
        if pending.len() > MAX_HEAD_BYTES {
            return Err(bad_framing("response head too large"));
        }
        if fill(sock, pending, ctx, io_timeout).await? == 0 {
            return Err(bad_framing("connection closed before response head"));
        }
    };

    let head = String::from_utf8_lossy(&pending[..head_end]).into_owned();
    pending.drain(..head_end + 4);

    let mut lines = head.split("\r\n");
    let status_line = lines.next().ok_or_else(|| bad_framing("empty response head"))?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(bad_framing(format!("unexpected version {version:?}")));
    }
    let http10 = version == "HTTP/1.0";
    let status: u16 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| bad_framing(format!("status line {status_line:?}")))?;

    let mut headers = OrderedHeaders::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| bad_framing(format!("header line {line:?}")))?;
        headers.append(name.trim(), value.trim_start());
    }

    Ok((status, headers, http10))
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn read_exact_body<S>(
    sock: &mut S,
    pending: &mut Vec<u8>,
    len: usize,
    ctx: &JobCtx,
    io_timeout: Duration,
) -> Result<Vec<u8>, NetError>
where
    S: AsyncRead + Unpin,
{
    while pending.len() < len {
        if fill(sock, pending, ctx, io_timeout).await? == 0 {
            return Err(bad_framing("connection closed mid-body"));
        }
    }
    let body = pending[..len].to_vec();
    pending.drain(..len);
    Ok(body)
}

async fn read_to_eof<S>(
    sock: &mut S,
    pending: &mut Vec<u8>,
    max_body: usize,
    ctx: &JobCtx,
    io_timeout: Duration,
) -> Result<Vec<u8>, NetError>
where
    S: AsyncRead + Unpin,
{
    loop {
        if pending.len() > max_body {
            return Err(NetError::ResponseTooLarge { limit: max_body });
        }
        if fill(sock, pending, ctx, io_timeout).await? == 0 {
            return Ok(std::mem::take(pending));
        }
    }
}

async fn read_chunked<S>(
    sock: &mut S,
    pending: &mut Vec<u8>,
    max_body: usize,
    ctx: &JobCtx,
    io_timeout: Duration,
) -> Result<Vec<u8>, NetError>
where
    S: AsyncRead + Unpin,
{
    let mut body = Vec::new();

    loop {
        // Chunk size line.
        let line_end = loop {
            if let Some(pos) = pending.windows(2).position(|w| w == b"\r\n") {
                break pos;
            }
            if fill(sock, pending, ctx, io_timeout).await? == 0 {
                return Err(bad_framing("connection closed in chunk header"));
            }
        };
        let size_line = String::from_utf8_lossy(&pending[..line_end]).into_owned();
        pending.drain(..line_end + 2);

        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| bad_framing(format!("chunk size {size_line:?}")))?;

        if size == 0 {
            // Trailer section: lines until the terminating blank line.
            loop {
                let end = loop {
                    if let Some(pos) = pending.windows(2).position(|w| w == b"\r\n") {
                        break pos;
                    }
                    if fill(sock, pending, ctx, io_timeout).await? == 0 {
                        return Err(bad_framing("connection closed in trailers"));
                    }
                };
                let empty = end == 0;
                pending.drain(..end + 2);
                if empty {
                    return Ok(body);
                }
            }
        }

        if body.len() + size > max_body {
            return Err(NetError::ResponseTooLarge { limit: max_body });
        }

        while pending.len() < size + 2 {
            if fill(sock, pending, ctx, io_timeout).await? == 0 {
                return Err(bad_framing("connection closed mid-chunk"));
            }
        }
        body.extend_from_slice(&pending[..size]);
        if &pending[size..size + 2] != b"\r\n" {
            return Err(bad_framing("missing chunk terminator"));
        }
        pending.drain(..size + 2);
    }
}
