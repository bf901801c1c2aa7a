//! Polymorphic socket handling.
//!
//! A dial may produce plain TCP, TLS over TCP, or TLS nested inside a TLS
//! tunnel to an HTTPS proxy. [`StreamSocket`] lets every later stage (the
//! TLS handshake, the H1 codec, the H2 handshake) treat them uniformly, and
//! [`BoxedSocket`] erases the concrete type at the layer boundaries.

use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_boring::SslStream;

/// Any async socket a TLS handshake or HTTP exchange can run over.
pub trait StreamSocket: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl StreamSocket for TcpStream {}

// TLS over any socket is itself a socket; this is what makes TLS-in-TLS
// (HTTPS proxy tunnels) compose.
impl<S: StreamSocket> StreamSocket for SslStream<S> {}

/// Object-safe wrapper around a boxed [`StreamSocket`].
pub struct BoxedSocket {
    inner: Pin<Box<dyn StreamSocket>>,
}

impl BoxedSocket {
    pub fn new<S: StreamSocket>(socket: S) -> Self {
        Self { inner: Box::pin(socket) }
    }
}

impl StreamSocket for BoxedSocket {}

impl AsyncRead for BoxedSocket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for BoxedSocket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.inner.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_shutdown(cx)
    }
}

impl Unpin for BoxedSocket {}
