use crate::relay::StatusBoard;
use crate::signaling::SignalingBridge;
use anyhow::{anyhow, bail, Context};
use relay_media::{SelectionPolicy, SourceKind, DEFAULT_QUEUE_CAPACITY};
use std::str::FromStr;
use std::time::Duration;
use webrtc::ice_transport::ice_server::RTCIceServer;

const DEFAULT_STUN_SERVERS: [&str; 3] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
];

/// How offers reach the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingMode {
    /// `POST /offer` with a JSON session description
    Http,
    /// base64 session descriptions over stdin / stdout
    Console,
}

impl FromStr for SignalingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(SignalingMode::Http),
            "console" | "stdio" => Ok(SignalingMode::Console),
            other => Err(anyhow!("unknown signaling mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub signaling_mode: SignalingMode,
    pub stun_servers: Vec<String>,
    pub turn_servers: Vec<TurnServer>,
    pub queue_capacity: usize,
    pub answer_timeout: Duration,
    pub selection_policy: SelectionPolicy,
}

#[derive(Debug, Clone)]
pub struct TurnServer {
    pub url: String,
    pub username: String,
    pub credential: String,
}

impl Config {
    /// Load from environment variables
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source; missing keys take defaults
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let signaling_mode = match lookup("SIGNALING_MODE") {
            Some(mode) => mode.parse()?,
            None => SignalingMode::Http,
        };

        let stun_servers = lookup("STUN_SERVERS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect());

        let turn_servers = match lookup("TURN_URL") {
            Some(url) => vec![TurnServer {
                url,
                username: lookup("TURN_USERNAME").unwrap_or_default(),
                credential: lookup("TURN_CREDENTIAL").unwrap_or_default(),
            }],
            None => vec![],
        };

        let queue_capacity = parse_or("QUEUE_CAPACITY", &lookup, DEFAULT_QUEUE_CAPACITY)?;
        if queue_capacity == 0 {
            bail!("QUEUE_CAPACITY must be at least 1");
        }

        let answer_timeout = Duration::from_secs(parse_or("ANSWER_TIMEOUT_SECS", &lookup, 10u64)?);

        let rotation_interval =
            Duration::from_secs(parse_or("ROTATION_INTERVAL_SECS", &lookup, 5u64)?);
        if rotation_interval.is_zero() {
            bail!("ROTATION_INTERVAL_SECS must be at least 1");
        }

        let selection_policy = match lookup("SELECTION_POLICY") {
            Some(name) => parse_policy(&name, rotation_interval)?,
            None => SelectionPolicy::default(),
        };

        Ok(Config {
            bind_address,
            signaling_mode,
            stun_servers,
            turn_servers,
            queue_capacity,
            answer_timeout,
            selection_policy,
        })
    }

    /// ICE server list handed to every peer connection
    pub fn ice_servers(&self) -> Vec<RTCIceServer> {
        let mut ice_servers = vec![];

        if !self.stun_servers.is_empty() {
            ice_servers.push(RTCIceServer {
                urls: self.stun_servers.clone(),
                ..Default::default()
            });
        }

        for turn in &self.turn_servers {
            ice_servers.push(RTCIceServer {
                urls: vec![turn.url.clone()],
                username: turn.username.clone(),
                credential: turn.credential.clone(),
                ..Default::default()
            });
        }

        ice_servers
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

fn parse_policy(name: &str, rotation_interval: Duration) -> anyhow::Result<SelectionPolicy> {
    match name.trim().to_ascii_lowercase().as_str() {
        "fixed-primary" | "primary" | "camera" => Ok(SelectionPolicy::Fixed(SourceKind::Primary)),
        "fixed-secondary" | "secondary" | "screen" => {
            Ok(SelectionPolicy::Fixed(SourceKind::Secondary))
        }
        "rotate" => Ok(SelectionPolicy::Rotate {
            interval: rotation_interval,
        }),
        "prefer-secondary" | "prefer-screen" => Ok(SelectionPolicy::PreferSecondary),
        other => Err(anyhow!("unknown selection policy '{}'", other)),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub signaling: SignalingBridge,
    pub status: StatusBoard,
}

impl AppState {
    pub fn new(config: Config, signaling: SignalingBridge, status: StatusBoard) -> Self {
        Self {
            config,
            signaling,
            status,
        }
    }
}
