use thiserror::Error;

/// How a failed attempt reflects on the proxy that carried it.
///
/// Transport-layer failures (TCP, CONNECT, TLS) mean the proxy itself is in
/// trouble; HTTP-layer failures may be the origin's fault and only count
/// lightly against the proxy. A detected challenge page penalizes hard even
/// though the transport succeeded: the effective outcome is that this exit
/// identity was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyPenalty {
    Hard,
    Transient,
}

/// The reason behind a [`NetError::TransportFailure`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportCause {
    #[error("i/o: {0}")]
    Io(String),
    #[error("malformed response: {0}")]
    BadFraming(String),
    #[error("too many redirects")]
    TooManyRedirects,
    #[error("server returned status {0}")]
    Status(u16),
}

/// Engine-wide error type.
///
/// Every variant has a single meaning the dispatcher can switch on; the
/// retry and proxy-feedback decisions live in [`NetError::is_retryable`] and
/// [`NetError::proxy_penalty`] so no caller re-derives the classification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    /// The request or pool configuration is self-inconsistent. Fatal.
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// The named browser profile is not registered. Fatal.
    #[error("unknown profile `{0}`")]
    UnknownProfile(String),

    /// TCP connect to the proxy, the CONNECT exchange, or the SOCKS5
    /// handshake failed. Retryable; proxy penalized hard.
    #[error("proxy unreachable: {0}")]
    ProxyUnreachable(String),

    /// TLS alert or I/O error during the handshake. Retryable; proxy
    /// penalized hard.
    #[error("TLS handshake failed: {0}")]
    TlsHandshakeFailed(String),

    /// HTTP I/O, bad framing, or an exhausted redirect budget. Retryable;
    /// proxy penalized transiently.
    #[error("transport failure: {0}")]
    TransportFailure(#[from] TransportCause),

    /// The response body exceeded the configured ceiling. Fatal.
    #[error("response body exceeded {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// The redirect chain revisited a URL. Fatal.
    #[error("redirect loop detected at {0}")]
    RedirectLoop(String),

    /// A timer elapsed. Retryable unless the job deadline itself expired,
    /// which the dispatcher decides.
    #[error("timed out")]
    TimedOut,

    /// The job's cancel token fired. Fatal; never retried.
    #[error("canceled")]
    Canceled,

    /// The worker pool's queue is at capacity. The job was not accepted.
    #[error("submission queue is full")]
    QueueFull,

    /// Admission is paused while memory usage is above the soft limit.
    #[error("submissions paused under memory pressure")]
    MemoryPressure,

    /// The response matched a challenge heuristic (body marker or redirect
    /// to a challenge host). Retryable; proxy penalized hard.
    #[error("challenge page detected (status {status}, marker {marker:?})")]
    ChallengeDetected { status: u16, marker: String },
}

impl NetError {
    /// Whether the dispatcher may retry the job after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NetError::ProxyUnreachable(_)
                | NetError::TlsHandshakeFailed(_)
                | NetError::TransportFailure(_)
                | NetError::TimedOut
                | NetError::ChallengeDetected { .. }
        )
    }

    /// How this error reflects on the proxy that carried the attempt, if a
    /// proxy was in effect.
    pub fn proxy_penalty(&self) -> Option<ProxyPenalty> {
        match self {
            NetError::ProxyUnreachable(_)
            | NetError::TlsHandshakeFailed(_)
            | NetError::ChallengeDetected { .. } => Some(ProxyPenalty::Hard),
            NetError::TransportFailure(_) | NetError::TimedOut => Some(ProxyPenalty::Transient),
            _ => None,
        }
    }

    /// Stable kind label for user-facing reports.
    pub fn kind(&self) -> &'static str {
        match self {
            NetError::ConfigurationInvalid(_) => "configuration_invalid",
            NetError::UnknownProfile(_) => "unknown_profile",
            NetError::ProxyUnreachable(_) => "proxy_unreachable",
            NetError::TlsHandshakeFailed(_) => "tls_handshake_failed",
            NetError::TransportFailure(_) => "transport_failure",
            NetError::ResponseTooLarge { .. } => "response_too_large",
            NetError::RedirectLoop(_) => "redirect_loop",
            NetError::TimedOut => "timed_out",
            NetError::Canceled => "canceled",
            NetError::QueueFull => "queue_full",
            NetError::MemoryPressure => "memory_pressure",
            NetError::ChallengeDetected { .. } => "challenge_detected",
        }
    }

    /// The HTTP status embedded in this error, if the exchange got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            NetError::TransportFailure(TransportCause::Status(code)) => Some(*code),
            NetError::ChallengeDetected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<std::io::Error> for NetError {
    fn from(err: std::io::Error) -> Self {
        NetError::TransportFailure(TransportCause::Io(err.to_string()))
    }
}
