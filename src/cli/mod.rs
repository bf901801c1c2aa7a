//! Command-line front end.
//!
//! Thin glue around the engine: flag parsing, file loaders (URL lists,
//! proxy lists, header/body JSON), output formatting, and exit codes.
//! Exit codes: 0 when every job succeeded, 1 on configuration errors,
//! 2 when at least one job failed after retries.

mod input;
mod output;

use crate::base::error::NetError;
use crate::cookies::persistence;
use crate::dispatch::{ChallengeConfig, DispatchConfig, DispatchRequest, Dispatcher};
use crate::emulation::ProfileId;
use crate::http::engine::{EngineConfig, HttpEngine, ProtocolSelector};
use crate::pool::{Job, MemoryConfig, PoolConfig, Priority, WorkerPool};
use crate::proxy::{Prober, ProxyPool, ProxyPoolConfig, RotationPolicy};
use crate::session::SessionMap;
use crate::socket::proxy::ProxyEndpoint;
use clap::{Parser, ValueEnum};
use http::Method;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HttpVersionArg {
    #[value(name = "1.1")]
    V11,
    #[value(name = "2")]
    V2,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileArg {
    Chrome,
    Firefox,
    Safari,
    Edge,
}

impl From<ProfileArg> for ProfileId {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Chrome => ProfileId::Chrome,
            ProfileArg::Firefox => ProfileId::Firefox,
            ProfileArg::Safari => ProfileId::Safari,
            ProfileArg::Edge => ProfileId::Edge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HeaderProfileArg {
    Auto,
    Chrome,
    Firefox,
    Safari,
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CookiePersistenceArg {
    Session,
    Proxy,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RotationArg {
    PerRequest,
    OnError,
    HealthAware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputArg {
    Text,
    Json,
}

/// Browser-faithful HTTPS client with proxy rotation.
#[derive(Debug, Parser)]
#[command(name = "mimicnet", version, about)]
pub struct Args {
    /// Single target URL.
    #[arg(long)]
    pub url: Option<String>,
    /// Newline-delimited URL list file; `#` starts a comment.
    #[arg(long)]
    pub urls_file: Option<PathBuf>,
    /// Requests to issue per URL.
    #[arg(long, default_value_t = 1)]
    pub num_requests: u32,

    /// HTTP version to negotiate.
    #[arg(long, value_enum, default_value = "auto")]
    pub http_version: HttpVersionArg,

    /// Browser identity for the TLS ClientHello and default headers.
    #[arg(long, value_enum, default_value = "chrome")]
    pub tls_profile: ProfileArg,
    /// Draw a random profile per request.
    #[arg(long)]
    pub tls_randomize: bool,

    /// Emit the profile's full default header set.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub header_mimicry: bool,
    /// Header identity; `auto` follows --tls-profile.
    #[arg(long, value_enum, default_value = "auto")]
    pub header_profile: HeaderProfileArg,
    /// Override the User-Agent header.
    #[arg(long)]
    pub custom_user_agent: Option<String>,
    /// Override the Accept-Language header.
    #[arg(long)]
    pub accept_language: Option<String>,
    /// Override the Accept-Encoding header.
    #[arg(long)]
    pub accept_encoding: Option<String>,
    /// Keep the Sec-Fetch-* and sec-ch-* headers.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub enable_sec_headers: bool,

    /// Request method.
    #[arg(long, value_enum, default_value = "get")]
    pub method: MethodArg,
    /// Request body: inline JSON, or @path to read a file.
    #[arg(long)]
    pub data: Option<String>,
    /// Extra headers: inline JSON object, or @path to read a file.
    #[arg(long)]
    pub headers: Option<String>,

    /// Keep cookies across requests.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub cookie_jar: bool,
    /// Cookie sharing scope.
    #[arg(long, value_enum, default_value = "session")]
    pub cookie_persistence: CookiePersistenceArg,
    /// Cookie file, loaded on startup and rewritten on shutdown.
    #[arg(long)]
    pub cookie_file: Option<PathBuf>,
    /// Start with an empty jar even when --cookie-file exists.
    #[arg(long)]
    pub clear_cookies: bool,

    /// Follow 3xx redirects.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub follow_redirects: bool,
    /// Redirect hops before giving up; 0 returns 3xx as-is.
    #[arg(long, default_value_t = 10)]
    pub max_redirects: u32,
    /// Budget in seconds for a single hop including its redirect target.
    #[arg(long)]
    pub redirect_timeout: Option<u64>,

    /// Single proxy URL (http, https, or socks5 scheme).
    #[arg(long)]
    pub proxy: Option<String>,
    /// Comma-separated proxy URLs.
    #[arg(long)]
    pub proxies: Option<String>,
    /// Proxy list file, one URL per line, `#` comments.
    #[arg(long)]
    pub proxy_file: Option<PathBuf>,
    /// Rotation policy.
    #[arg(long, value_enum, default_value = "per-request")]
    pub proxy_rotation: RotationArg,
    /// Run background health probes.
    #[arg(long)]
    pub enable_proxy_health: bool,
    /// Seconds between health passes.
    #[arg(long, default_value_t = 60)]
    pub proxy_health_interval: u64,
    /// Per-probe timeout in seconds.
    #[arg(long, default_value_t = 5)]
    pub proxy_health_timeout: u64,
    /// URL fetched through each proxy as the health probe.
    #[arg(long, default_value = "http://www.gstatic.com/generate_204")]
    pub proxy_health_test_url: String,
    /// Consecutive hard failures before a proxy is marked failed.
    #[arg(long, default_value_t = 3)]
    pub proxy_max_failures: u32,

    /// Global requests-per-second limit.
    #[arg(long)]
    pub rate_limit: Option<f64>,
    /// Minimum inter-request delay in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub delay_min: u64,
    /// Maximum inter-request delay in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub delay_max: u64,
    /// Draw the delay uniformly from [delay-min, delay-max].
    #[arg(long)]
    pub delay_randomize: bool,
    /// Per-job deadline in seconds.
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,
    /// Retry attempts after the first; 0 means exactly one attempt.
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Dispatch jobs concurrently.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub enable_concurrent: bool,
    /// Upper bound on in-flight dispatches.
    #[arg(long, default_value_t = 8)]
    pub max_concurrent: usize,
    /// Worker task count.
    #[arg(long, default_value_t = 8)]
    pub worker_pool_size: usize,
    /// Pool-level token bucket rate.
    #[arg(long)]
    pub requests_per_second: Option<f64>,
    /// Submission queue capacity.
    #[arg(long, default_value_t = 1024)]
    pub queue_size: usize,
    /// Idle connections kept per (host, proxy, profile) key.
    #[arg(long)]
    pub connection_pool_size: Option<usize>,
    /// Alias for --connection-pool-size.
    #[arg(long)]
    pub max_idle_conns: Option<usize>,
    /// Seconds an idle connection stays reusable.
    #[arg(long, default_value_t = 90)]
    pub idle_conn_timeout: u64,

    /// Pause admission above the memory soft limit.
    #[arg(long)]
    pub enable_memory_optimization: bool,
    /// Memory soft limit in megabytes.
    #[arg(long, default_value_t = 512)]
    pub max_memory_mb: u64,
    /// Prioritize the first request to each URL so later ones reuse its
    /// session state.
    #[arg(long)]
    pub enable_intelligent_queue: bool,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputArg,
    /// Include response headers in the output.
    #[arg(long)]
    pub show_headers: bool,
    /// Verbose logging.
    #[arg(long, short)]
    pub verbose: bool,
}

struct ResolvedInput {
    urls: Vec<Url>,
    method: Method,
    body: Option<bytes::Bytes>,
    overrides: Vec<(String, String)>,
    proxies: Vec<ProxyEndpoint>,
}

fn resolve_input(args: &Args) -> Result<ResolvedInput, NetError> {
    let urls = match (&args.url, &args.urls_file) {
        (Some(_), Some(_)) => {
            return Err(NetError::ConfigurationInvalid(
                "--url and --urls-file are mutually exclusive".into(),
            ))
        }
        (None, None) => {
            return Err(NetError::ConfigurationInvalid("one of --url or --urls-file is required".into()))
        }
        (Some(single), None) => vec![input::parse_url(single)?],
        (None, Some(path)) => input::load_urls_file(path)?,
    };

    let method = match args.method {
        MethodArg::Get => Method::GET,
        MethodArg::Post => Method::POST,
    };

    let body = match &args.data {
        Some(spec) => Some(bytes::Bytes::from(input::load_inline_or_file(spec)?)),
        None => None,
    };
    if body.is_some() && method == Method::GET {
        return Err(NetError::ConfigurationInvalid("--data requires --method post".into()));
    }

    let mut overrides: Vec<(String, String)> = Vec::new();
    if let Some(spec) = &args.headers {
        overrides.extend(input::load_header_map(spec)?);
    }
    if let Some(ua) = &args.custom_user_agent {
        overrides.push(("User-Agent".into(), ua.clone()));
    }
    if let Some(lang) = &args.accept_language {
        overrides.push(("Accept-Language".into(), lang.clone()));
    }
    if let Some(enc) = &args.accept_encoding {
        overrides.push(("Accept-Encoding".into(), enc.clone()));
    }
    if body.is_some() && !overrides.iter().any(|(n, _)| n.eq_ignore_ascii_case("content-type")) {
        overrides.push(("Content-Type".into(), "application/json".into()));
    }

    let mut proxies = Vec::new();
    if let Some(single) = &args.proxy {
        proxies.push(ProxyEndpoint::parse(single)?);
    }
    if let Some(list) = &args.proxies {
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            proxies.push(ProxyEndpoint::parse(part)?);
        }
    }
    if let Some(path) = &args.proxy_file {
        proxies.extend(input::load_proxies_file(path)?);
    }

    Ok(ResolvedInput { urls, method, body, overrides, proxies })
}

fn selector_for(version: HttpVersionArg) -> ProtocolSelector {
    match version {
        HttpVersionArg::V11 => ProtocolSelector::ForceHttp1,
        HttpVersionArg::V2 => ProtocolSelector::ForceHttp2,
        HttpVersionArg::Auto => ProtocolSelector::Auto,
    }
}

fn profile_for(args: &Args) -> ProfileId {
    match args.header_profile {
        HeaderProfileArg::Auto => args.tls_profile.into(),
        HeaderProfileArg::Chrome => ProfileId::Chrome,
        HeaderProfileArg::Firefox => ProfileId::Firefox,
        HeaderProfileArg::Safari => ProfileId::Safari,
        HeaderProfileArg::Edge => ProfileId::Edge,
    }
}

/// Run the tool; the returned code is the process exit status.
pub async fn run(args: Args) -> ExitCode {
    let input = match resolve_input(&args) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(1);
        }
    };

    let engine_config = EngineConfig {
        follow_redirects: args.follow_redirects,
        max_redirects: args.max_redirects,
        round_trip_timeout: Duration::from_secs(args.redirect_timeout.unwrap_or(30)),
        io_timeout: Duration::from_secs(10),
        max_idle_per_key: args
            .connection_pool_size
            .or(args.max_idle_conns)
            .unwrap_or(6),
        idle_timeout: Duration::from_secs(args.idle_conn_timeout),
        ..Default::default()
    };
    let engine = Arc::new(HttpEngine::new(engine_config));

    let proxy_pool = if input.proxies.is_empty() {
        None
    } else {
        let config = ProxyPoolConfig {
            policy: match args.proxy_rotation {
                RotationArg::PerRequest => RotationPolicy::PerRequest,
                RotationArg::OnError => RotationPolicy::StickyUntilError,
                RotationArg::HealthAware => RotationPolicy::HealthAware,
            },
            max_failures: args.proxy_max_failures,
            probe_interval: Duration::from_secs(args.proxy_health_interval),
            probe_timeout: Duration::from_secs(args.proxy_health_timeout),
            probe_url: args.proxy_health_test_url.clone(),
            ..Default::default()
        };
        Some(Arc::new(ProxyPool::new(config, input.proxies.clone())))
    };

    let shutdown = CancellationToken::new();
    let prober = match (&proxy_pool, args.enable_proxy_health) {
        (Some(pool), true) => Some(Prober::new(pool.clone()).spawn(shutdown.clone())),
        _ => None,
    };

    let dispatch_config = DispatchConfig {
        default_profile: profile_for(&args),
        randomize_profile: args.tls_randomize,
        retry_limit: args.retries,
        delay_min: Duration::from_millis(args.delay_min),
        delay_max: Duration::from_millis(args.delay_max),
        randomize_delay: args.delay_randomize,
        global_rate: args.rate_limit,
        per_host_rate: None,
        challenge: ChallengeConfig::default(),
        ..Default::default()
    };

    let sessions = Arc::new(SessionMap::new(None));
    let session_tag = if args.cookie_jar && args.cookie_persistence != CookiePersistenceArg::None {
        Some("cli".to_string())
    } else {
        None
    };

    // Load the persisted jar before anything dispatches.
    if let (Some(tag), Some(path), false) = (&session_tag, &args.cookie_file, args.clear_cookies) {
        if path.exists() {
            match persistence::load_cookies(path) {
                Ok(cookies) => sessions.resolve(tag).jar.replace_all(cookies),
                Err(err) => {
                    eprintln!("configuration error: {err}");
                    return ExitCode::from(1);
                }
            }
        }
    }

    let dispatcher =
        Arc::new(Dispatcher::new(dispatch_config, engine.clone(), sessions.clone(), proxy_pool));

    let (workers, max_concurrent) = if args.enable_concurrent {
        (args.worker_pool_size, args.max_concurrent)
    } else {
        (1, 1)
    };
    let pool_config = PoolConfig {
        workers,
        queue_capacity: args.queue_size,
        max_concurrent,
        requests_per_second: args.requests_per_second,
        memory: args
            .enable_memory_optimization
            .then(|| MemoryConfig::with_limit_mb(args.max_memory_mb)),
        ..Default::default()
    };
    let pool = WorkerPool::new(pool_config, dispatcher);

    // Submit every job up front; the queue applies priority and capacity.
    let mut receivers = Vec::new();
    let deadline = Duration::from_secs(args.timeout);
    for url in &input.urls {
        for round in 0..args.num_requests {
            let mut request = DispatchRequest::get(url.clone());
            request.method = input.method.clone();
            request.body = input.body.clone();
            request.headers = input.overrides.clone();
            request.session_tag = session_tag.clone();
            request.selector = selector_for(args.http_version);
            request.header_mimicry = args.header_mimicry;
            request.strip_sec_headers = !args.enable_sec_headers;

            let priority = if args.enable_intelligent_queue && round == 0 {
                Priority::High
            } else {
                Priority::Normal
            };
            let (job, receiver) = Job::new(request, priority, Some(Instant::now() + deadline));
            match pool.submit(job) {
                Ok(()) => receivers.push((url.clone(), receiver)),
                Err(err) => {
                    eprintln!("submit failed for {url}: {err}");
                    return ExitCode::from(1);
                }
            }
        }
    }

    let mut any_failed = false;
    let mut printer = output::Printer::new(args.output == OutputArg::Json, args.show_headers);
    for (url, receiver) in receivers {
        match receiver.await {
            Ok(outcome) => {
                if outcome.result.is_err() {
                    any_failed = true;
                }
                printer.print(&url, &outcome);
            }
            Err(_) => {
                any_failed = true;
                eprintln!("no result received for {url}");
            }
        }
    }
    printer.finish();

    // Persist the jar on the way out.
    if let (Some(tag), Some(path)) = (&session_tag, &args.cookie_file) {
        let cookies = sessions.resolve(tag).jar.snapshot();
        if let Err(err) = persistence::save_cookies(path, &cookies) {
            eprintln!("failed to write cookie file: {err}");
        }
    }

    shutdown.cancel();
    if let Some(prober) = prober {
        let _ = prober.await;
    }
    pool.shutdown().await;

    if any_failed {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}
