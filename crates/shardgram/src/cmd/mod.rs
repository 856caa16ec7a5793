use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{io_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod envinfo;
pub mod listen;
pub mod send;
pub mod stream_listen;
pub mod stream_send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fragment a message and send it over UDP.
    Send(SendArgs),
    /// Reassemble and print messages arriving over UDP.
    Listen(ListenArgs),
    /// Send one length-prefixed message over TCP.
    StreamSend(StreamSendArgs),
    /// Accept TCP connections and print length-prefixed messages.
    StreamListen(StreamListenArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::StreamSend(args) => stream_send::run(args, format),
        Command::StreamListen(args) => stream_listen::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(path) = &self.file {
            return fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
        }
        Err(CliError::new(USAGE, "one of --data or --file is required"))
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination address (host:port).
    pub addr: SocketAddr,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Transmission unit in bytes, header included (512..=4096).
    #[arg(long, default_value_t = 1024, env = "SHARDGRAM_MTU")]
    pub mtu: usize,
    /// Session tag stamped on every fragment.
    #[arg(long, default_value_t = 1234, env = "SHARDGRAM_SESSION_ID")]
    pub session_id: u32,
    /// Send the message this many times, each under a new message id.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (host:port).
    pub bind: SocketAddr,
    /// Maximum number of messages tracked at once.
    #[arg(long, default_value_t = 64, env = "SHARDGRAM_WINDOW")]
    pub window: usize,
    /// Ingestion worker threads.
    #[arg(
        long,
        default_value_t = 8,
        env = "SHARDGRAM_WORKERS",
        value_parser = clap::value_parser!(u8).range(1..=8)
    )]
    pub workers: u8,
    /// Largest datagram accepted, header included (512..=4096).
    #[arg(long, default_value_t = 1024, env = "SHARDGRAM_MTU")]
    pub mtu: usize,
    /// Only accept fragments carrying this session tag.
    #[arg(long, env = "SHARDGRAM_SESSION_FILTER")]
    pub session_filter: Option<u32>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Discard incomplete messages older than each delivered one.
    #[arg(long)]
    pub drop_stale: bool,
    /// How long each read waits for a message (e.g. 100ms, 1s).
    #[arg(long, default_value = "100ms")]
    pub poll_interval: String,
    /// Print receiver counters on exit.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct StreamSendArgs {
    /// Destination address (host:port).
    pub addr: SocketAddr,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Session tag written into the frame header.
    #[arg(long, default_value_t = 1234, env = "SHARDGRAM_SESSION_ID")]
    pub session_id: u32,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct StreamListenArgs {
    /// Address to bind (host:port).
    pub bind: SocketAddr,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Reads without progress tolerated mid-message before dropping the connection.
    #[arg(long, default_value_t = 30)]
    pub max_retries: u32,
    /// Largest accepted message in bytes.
    #[arg(long, default_value_t = shardgram_frame::DEFAULT_MAX_STREAM_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix("us") {
        (num, "us")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "us" => Duration::from_micros(value),
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

/// Flag cleared by Ctrl-C.
pub fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}
