use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use shardgram_frame::{FrameError, StreamConfig, StreamReader};
use shardgram_transport::{StreamListener, TransportError};
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, StreamListenArgs};
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_stream_frame, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(args: StreamListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener =
        StreamListener::bind(args.bind).map_err(|err| transport_error("bind failed", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| transport_error("bind failed", err))?;

    let running = install_ctrlc_handler()?;
    let config = StreamConfig {
        max_payload_size: args.max_payload,
        max_retries: args.max_retries,
        read_timeout: Some(POLL_INTERVAL),
        ..StreamConfig::default()
    };

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(TransportError::Accept(err)) if err.kind() == ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(err) => return Err(transport_error("accept failed", err)),
        };

        let remaining = args.count.map(|count| count - printed);
        printed += serve_connection(stream, peer, &config, remaining, &running, format)?;

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    Ok(SUCCESS)
}

/// Print frames from one connection until it closes, stalls, or `limit` is hit.
fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: &StreamConfig,
    limit: Option<usize>,
    running: &AtomicBool,
    format: OutputFormat,
) -> CliResult<usize> {
    // Accepted sockets may inherit the listener's non-blocking mode.
    stream
        .set_nonblocking(false)
        .map_err(|err| crate::exit::io_error("accept failed", err))?;
    let mut reader = StreamReader::with_config_tcp(stream, config.clone())
        .map_err(|err| frame_error("accept failed", err))?;
    info!(%peer, "connection accepted");

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match reader.read_frame() {
            Ok(frame) => {
                print_stream_frame(&frame, peer, format);
                printed += 1;
                if limit.is_some_and(|limit| printed >= limit) {
                    break;
                }
            }
            Err(err) if err.is_idle() => continue,
            Err(FrameError::ConnectionClosed) => {
                debug!(%peer, "connection closed");
                break;
            }
            Err(err) => {
                warn!(%peer, error = %err, "dropping connection");
                break;
            }
        }
    }
    Ok(printed)
}
