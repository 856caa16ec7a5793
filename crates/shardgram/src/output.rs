use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use shardgram_frame::StreamFrame;
use shardgram_reassembly::{ReassembledMessage, StatsSnapshot};

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<u64>,
    session_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    fragments: Option<u16>,
    payload_size: usize,
    payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer: Option<&'a str>,
    timestamp: String,
}

/// Print one reassembled datagram message.
pub fn print_message(message: &ReassembledMessage, format: OutputFormat) {
    print_received(
        MessageOutput {
            kind: "message-received",
            message_id: Some(message.message_id),
            session_id: message.session_id,
            fragments: Some(message.total_fragments),
            payload_size: message.payload.len(),
            payload: payload_preview(message.payload.as_ref()),
            peer: None,
            timestamp: now_unix_seconds(),
        },
        message.payload.as_ref(),
        format,
    );
}

/// Print one frame read from a stream connection.
pub fn print_stream_frame(frame: &StreamFrame, peer: SocketAddr, format: OutputFormat) {
    let peer = peer.to_string();
    print_received(
        MessageOutput {
            kind: "stream-frame-received",
            message_id: None,
            session_id: frame.session_id,
            fragments: None,
            payload_size: frame.payload.len(),
            payload: payload_preview(frame.payload.as_ref()),
            peer: Some(&peer),
            timestamp: now_unix_seconds(),
        },
        frame.payload.as_ref(),
        format,
    );
}

fn print_received(out: MessageOutput<'_>, payload: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MESSAGE", "SESSION", "FRAGMENTS", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    or_dash(out.message_id),
                    out.session_id.to_string(),
                    or_dash(out.fragments),
                    out.payload_size.to_string(),
                    out.payload,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "message={} session={} fragments={} size={} peer={} payload={}",
                or_dash(out.message_id),
                out.session_id,
                or_dash(out.fragments),
                out.payload_size,
                out.peer.unwrap_or("-"),
                out.payload
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

#[derive(Debug, Serialize)]
pub struct SendReport {
    pub kind: &'static str,
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragments: Option<u16>,
    pub payload_size: usize,
}

pub fn print_send_report(report: &SendReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DESTINATION", "MESSAGE", "FRAGMENTS", "SIZE"])
                .add_row(vec![
                    report.destination.clone(),
                    or_dash(report.message_id),
                    or_dash(report.fragments),
                    report.payload_size.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "sent message={} fragments={} size={} to {}",
            or_dash(report.message_id),
            or_dash(report.fragments),
            report.payload_size,
            report.destination
        ),
        OutputFormat::Raw => {}
    }
}

/// Print receiver counters when a listener stops.
pub fn print_stats(stats: &StatsSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct StatsOutput<'a> {
                kind: &'static str,
                #[serde(flatten)]
                stats: &'a StatsSnapshot,
            }
            println!(
                "{}",
                serde_json::to_string(&StatsOutput {
                    kind: "receiver-stats",
                    stats,
                })
                .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in [
                ("datagrams", stats.datagrams),
                ("malformed", stats.malformed),
                ("inconsistent", stats.inconsistent),
                ("session mismatches", stats.session_mismatches),
                ("duplicates", stats.duplicates),
                ("rejected", stats.rejected),
                ("groups created", stats.groups_created),
                ("groups evicted", stats.groups_evicted),
                ("messages delivered", stats.messages_delivered),
                ("stale dropped", stats.stale_dropped),
                ("receive errors", stats.recv_errors),
            ] {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
