//! In-process loopback: fragment a few messages and reassemble them.
//!
//! Run with:
//!   cargo run --example loopback

use std::time::Duration;

use shardgram::frame::{FragmentConfig, FragmentSender};
use shardgram::reassembly::{Receiver, ReceiverConfig};
use shardgram::transport::MemoryChannel;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (tx_end, rx_end) = MemoryChannel::pair(Duration::from_millis(20));

    let sender = FragmentSender::new(
        tx_end,
        FragmentConfig {
            mtu: 512,
            session_id: 1234,
        },
    )?;
    let mut receiver = Receiver::start(
        rx_end,
        ReceiverConfig {
            mtu: 512,
            workers: 4,
            ..ReceiverConfig::default()
        },
    )?;

    let sizes = [0usize, 100, 496, 497, 5_000, 64 * 1024];
    for size in sizes {
        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let message_id = sender.send(&payload)?;
        eprintln!("sent message {message_id} ({size} bytes)");
    }

    let mut received = 0;
    while received < sizes.len() {
        match receiver.read_timeout(false, Duration::from_secs(2)) {
            Some(message) => {
                eprintln!(
                    "received message {} ({} bytes in {} fragments)",
                    message.message_id,
                    message.payload.len(),
                    message.total_fragments
                );
                received += 1;
            }
            None => {
                eprintln!("timed out waiting for messages");
                break;
            }
        }
    }

    receiver.shutdown();
    let stats = receiver.stats();
    eprintln!(
        "datagrams={} delivered={} discarded={}",
        stats.datagrams,
        stats.messages_delivered,
        stats.discarded()
    );
    Ok(())
}
