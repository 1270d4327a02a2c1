use std::{collections::HashMap, fs::read_to_string, net::SocketAddr, path::PathBuf};

use clap::Parser;
use serde::*;

#[derive(Deserialize, Debug)]
pub struct Server {
    /// authentication listen address
    ///
    /// the address and port the authentication socket binds. RADIUS
    /// authentication traffic conventionally uses port 1812.
    #[serde(default = "Server::auth_listen")]
    pub auth_listen: SocketAddr,

    /// accounting listen address
    ///
    /// the address and port the accounting socket binds, port 1813 by
    /// convention. both sockets run the same pipeline; the split
    /// follows deployment practice.
    #[serde(default = "Server::acct_listen")]
    pub acct_listen: SocketAddr,

    /// worker number
    ///
    /// how many receive loops each socket runs. UDP receives are
    /// serialized by the kernel either way, so more workers mainly
    /// help when handlers do real work per packet.
    #[serde(default = "num_cpus::get")]
    pub threads: usize,

    /// extra dictionary files
    ///
    /// loaded on top of the built-in RFC attribute tables at startup.
    /// see the dictionary file grammar in the codec crate.
    #[serde(default)]
    pub dictionaries: Vec<PathBuf>,
}

impl Server {
    fn auth_listen() -> SocketAddr {
        "0.0.0.0:1812".parse().unwrap()
    }

    fn acct_listen() -> SocketAddr {
        "0.0.0.0:1813".parse().unwrap()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            auth_listen: Self::auth_listen(),
            acct_listen: Self::acct_listen(),
            threads: num_cpus::get(),
            dictionaries: Vec::new(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Dedup {
    /// retransmit window in milliseconds
    ///
    /// responses are cached this long so identical retransmits get
    /// identical octets back without running a handler again.
    #[serde(default = "Dedup::ttl_ms")]
    pub ttl_ms: u64,

    /// cache entry bound
    #[serde(default = "Dedup::capacity")]
    pub capacity: usize,

    /// per-packet handler budget in milliseconds
    #[serde(default = "Dedup::budget_ms")]
    pub budget_ms: u64,
}

impl Dedup {
    fn ttl_ms() -> u64 {
        30_000
    }

    fn capacity() -> usize {
        4096
    }

    fn budget_ms() -> u64 {
        10_000
    }
}

impl Default for Dedup {
    fn default() -> Self {
        Self {
            ttl_ms: Self::ttl_ms(),
            capacity: Self::capacity(),
            budget_ms: Self::budget_ms(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Proxy {
    /// enable the forwarding proxy
    #[serde(default)]
    pub enabled: bool,

    /// proxy listen address
    #[serde(default = "Proxy::listen")]
    pub listen: SocketAddr,

    /// upstream server address
    ///
    /// every request arriving on the proxy socket is forwarded here.
    pub upstream: Option<SocketAddr>,

    /// shared secret toward the upstream server
    #[serde(default)]
    pub upstream_secret: String,

    /// upstream attempts per request
    #[serde(default = "Proxy::attempts")]
    pub attempts: usize,

    /// per-attempt upstream timeout in milliseconds
    #[serde(default = "Proxy::timeout_ms")]
    pub timeout_ms: u64,
}

impl Proxy {
    fn listen() -> SocketAddr {
        "0.0.0.0:1814".parse().unwrap()
    }

    fn attempts() -> usize {
        3
    }

    fn timeout_ms() -> u64 {
        6000
    }
}

impl Default for Proxy {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: Self::listen(),
            upstream: None,
            upstream_secret: String::new(),
            attempts: Self::attempts(),
            timeout_ms: Self::timeout_ms(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct Log {
    /// log level
    ///
    /// An enum representing the available verbosity levels of the logger.
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub dedup: Dedup,
    #[serde(default)]
    pub proxy: Proxy,
    #[serde(default)]
    pub log: Log,

    /// shared secrets
    ///
    /// peers allowed to talk to this server: "ip" or "ip:port" keys
    /// mapping to the shared secret for that peer. datagrams from
    /// unknown peers are dropped before parsing.
    #[serde(default)]
    pub secrets: HashMap<String, String>,

    /// static user credentials
    ///
    /// the user name to plaintext password table the authentication
    /// handler verifies against.
    #[serde(default)]
    pub users: HashMap<String, String>,
}

#[derive(Parser)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    /// specify the configuration file path.
    #[arg(long)]
    config: Option<String>,
}

impl Config {
    /// Load command line parameters, if the configuration file path is
    /// specified, the configuration is read from the configuration file,
    /// otherwise the default configuration is used.
    pub fn load() -> anyhow::Result<Self> {
        let cfg_str = Cli::parse()
            .config
            .map(read_to_string)
            .transpose()?
            .unwrap_or_default();
        Ok(toml::from_str(&cfg_str)?)
    }
}
