use shardgram_frame::{StreamConfig, StreamWriter};
use shardgram_transport::StreamListener;

use crate::cmd::{parse_duration, StreamSendArgs};
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_send_report, OutputFormat, SendReport};

pub fn run(args: StreamSendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = args.payload.resolve()?;
    let timeout = parse_duration(&args.connect_timeout)?;

    let stream = StreamListener::connect(args.addr, Some(timeout))
        .map_err(|err| transport_error("connect failed", err))?;
    let config = StreamConfig {
        session_id: args.session_id,
        write_timeout: Some(timeout),
        ..StreamConfig::default()
    };
    let mut writer = StreamWriter::with_config_tcp(stream, config)
        .map_err(|err| frame_error("connect failed", err))?;
    writer
        .send(&payload)
        .map_err(|err| frame_error("send failed", err))?;

    print_send_report(
        &SendReport {
            kind: "stream-message-sent",
            destination: args.addr.to_string(),
            message_id: None,
            fragments: None,
            payload_size: payload.len(),
        },
        format,
    );

    Ok(SUCCESS)
}
