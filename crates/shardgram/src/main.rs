mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "shardgram",
    version,
    about = "Fragmented datagram messaging CLI"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "SHARDGRAM_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "shardgram",
            "send",
            "127.0.0.1:9000",
            "--data",
            "hello",
            "--mtu",
            "512",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.mtu, 512);
                assert_eq!(args.session_id, 1234);
                assert_eq!(args.repeat, 1);
            }
            other => panic!("expected send, got {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "shardgram",
            "send",
            "127.0.0.1:9000",
            "--file",
            "/tmp/x",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_listen_defaults() {
        let cli = Cli::try_parse_from(["shardgram", "listen", "0.0.0.0:9000"])
            .expect("listen args should parse");

        match cli.command {
            Command::Listen(args) => {
                assert_eq!(args.window, 64);
                assert_eq!(args.workers, 8);
                assert_eq!(args.mtu, 1024);
                assert!(args.session_filter.is_none());
                assert!(!args.drop_stale);
            }
            other => panic!("expected listen, got {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_workers() {
        let err = Cli::try_parse_from(["shardgram", "listen", "0.0.0.0:9000", "--workers", "9"])
            .expect_err("worker count above 8 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_bad_socket_address() {
        let err = Cli::try_parse_from(["shardgram", "send", "not-an-addr", "--data", "x"])
            .expect_err("invalid address should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_stream_listen_subcommand() {
        let cli = Cli::try_parse_from([
            "shardgram",
            "stream-listen",
            "127.0.0.1:9100",
            "--count",
            "2",
            "--max-retries",
            "5",
        ])
        .expect("stream-listen args should parse");

        match cli.command {
            Command::StreamListen(args) => {
                assert_eq!(args.count, Some(2));
                assert_eq!(args.max_retries, 5);
            }
            other => panic!("expected stream-listen, got {other:?}"),
        }
    }
}
