use std::io::IsTerminal;

use brickpi_frame::{command::command_name, FrameEvent, Request};
use brickpi_link::BoardSnapshot;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use crate::hex;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

#[derive(Serialize)]
struct RequestOutput<'a> {
    address: u8,
    command: u8,
    command_name: &'a str,
    checksum: u8,
    data_len: usize,
    wire: String,
}

pub fn print_request(request: &Request, wire: &[u8], format: OutputFormat) {
    let out = RequestOutput {
        address: request.address,
        command: request.command,
        command_name: command_name(request.command),
        checksum: request.checksum(),
        data_len: request.data.len(),
        wire: hex::encode(wire),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = table(vec!["ADDRESS", "COMMAND", "CHECKSUM", "WIRE"]);
            table.add_row(vec![
                out.address.to_string(),
                format!("{:#04x} {}", out.command, out.command_name),
                format!("{:#04x}", out.checksum),
                out.wire,
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", out.wire),
    }
}

#[derive(Serialize)]
pub struct EventOutput {
    kind: &'static str,
    command: Option<u8>,
    command_name: Option<&'static str>,
    payload: Option<String>,
    fault: Option<String>,
}

impl From<&FrameEvent> for EventOutput {
    fn from(event: &FrameEvent) -> Self {
        let command = event.command();
        let (kind, payload, fault) = match event {
            FrameEvent::Response(response) => {
                ("response", Some(hex::encode(response.payload())), None)
            }
            FrameEvent::Rejected { fault, .. } => ("rejected", None, Some(fault.to_string())),
        };
        Self {
            kind,
            command,
            command_name: command.map(command_name),
            payload,
            fault,
        }
    }
}

#[derive(Serialize)]
struct DecodeOutput<'a> {
    events: &'a [EventOutput],
    leftover_state: &'a str,
}

pub fn print_events(events: &[EventOutput], leftover_state: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&DecodeOutput {
            events,
            leftover_state,
        }),
        OutputFormat::Table => {
            let mut table = table(vec!["#", "KIND", "COMMAND", "PAYLOAD / FAULT"]);
            for (index, event) in events.iter().enumerate() {
                table.add_row(vec![
                    index.to_string(),
                    event.kind.to_string(),
                    event.command_name.unwrap_or("-").to_string(),
                    event
                        .payload
                        .clone()
                        .or_else(|| event.fault.clone())
                        .unwrap_or_default(),
                ]);
            }
            println!("{table}");
            println!("assembler: {leftover_state}");
        }
        OutputFormat::Pretty => {
            for event in events {
                match (&event.payload, &event.fault) {
                    (Some(payload), _) => println!("response {payload}"),
                    (None, Some(fault)) => println!("rejected {fault}"),
                    (None, None) => println!("{}", event.kind),
                }
            }
            println!("assembler: {leftover_state}");
        }
    }
}

#[derive(Serialize)]
struct PollOutput<'a> {
    poll: u64,
    #[serde(flatten)]
    snapshot: &'a BoardSnapshot,
}

pub fn print_snapshot(poll: u64, snapshot: &BoardSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&PollOutput { poll, snapshot }),
        OutputFormat::Table => {
            let mut table = table(vec!["PORT", "DEVICE", "VALUE"]);
            for reading in &snapshot.sensors {
                table.add_row(vec![
                    reading.port.to_string(),
                    json_text(&reading.sensor),
                    json_text(&reading.value),
                ]);
            }
            for motor in &snapshot.motors {
                table.add_row(vec![
                    motor.port.to_string(),
                    format!("motor speed={}", motor.state.requested_speed()),
                    format!(
                        "encoder={} rpm={:.1}",
                        motor
                            .state
                            .encoder()
                            .map_or_else(|| "-".to_string(), |e| e.to_string()),
                        motor.state.rpm()
                    ),
                ]);
            }
            println!("poll {poll}");
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let mut parts = Vec::new();
            for reading in &snapshot.sensors {
                parts.push(format!("{}={}", reading.port, json_text(&reading.value)));
            }
            for motor in &snapshot.motors {
                parts.push(format!(
                    "{}={}",
                    motor.port,
                    motor
                        .state
                        .encoder()
                        .map_or_else(|| "-".to_string(), |e| e.to_string())
                ));
            }
            println!("poll {poll}: {}", parts.join(" "));
        }
    }
}

fn json_text<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "?".to_string())
}
