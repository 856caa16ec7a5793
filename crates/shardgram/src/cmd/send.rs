use shardgram_frame::{FragmentConfig, FragmentSender};
use shardgram_transport::{UdpChannel, UdpOptions};
use tracing::debug;

use crate::cmd::SendArgs;
use crate::exit::{frame_error, send_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_send_report, OutputFormat, SendReport};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = args.payload.resolve()?;
    let config = FragmentConfig {
        mtu: args.mtu,
        session_id: args.session_id,
    };

    let channel = UdpChannel::connect(args.addr, &UdpOptions::default())
        .map_err(|err| transport_error("connect failed", err))?;
    let sender =
        FragmentSender::new(channel, config).map_err(|err| frame_error("invalid config", err))?;
    let fragments = sender
        .fragmenter()
        .fragment_count(payload.len())
        .map_err(|err| frame_error("send failed", err))?;

    for _ in 0..args.repeat {
        let message_id = sender
            .send(&payload)
            .map_err(|err| send_error("send failed", err))?;
        debug!(message_id, fragments, "message sent");

        print_send_report(
            &SendReport {
                kind: "message-sent",
                destination: args.addr.to_string(),
                message_id: Some(message_id),
                fragments: Some(fragments),
                payload_size: payload.len(),
            },
            format,
        );
    }

    Ok(SUCCESS)
}
