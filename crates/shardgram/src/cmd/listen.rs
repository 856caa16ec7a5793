use std::sync::atomic::Ordering;

use shardgram_reassembly::{Receiver, ReceiverConfig};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, ListenArgs};
use crate::exit::{reassembly_error, CliResult, SUCCESS};
use crate::output::{print_message, print_stats, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let poll_interval = parse_duration(&args.poll_interval)?;
    let config = ReceiverConfig {
        window: args.window,
        workers: usize::from(args.workers),
        mtu: args.mtu,
        session_filter: args.session_filter,
        ..ReceiverConfig::default()
    };

    let mut receiver =
        Receiver::bind(args.bind, config).map_err(|err| reassembly_error("listen failed", err))?;
    info!(addr = %receiver.local_addr(), "waiting for messages");

    let running = install_ctrlc_handler()?;
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let Some(message) = receiver.read_timeout(args.drop_stale, poll_interval) else {
            continue;
        };

        print_message(&message, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    receiver.shutdown();
    let stats = receiver.stats();
    info!(
        delivered = stats.messages_delivered,
        evicted = stats.groups_evicted,
        stale = stats.stale_dropped,
        discarded = stats.discarded(),
        "listener stopped"
    );
    if args.stats {
        print_stats(&stats, format);
    }

    Ok(SUCCESS)
}
