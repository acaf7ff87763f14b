use std::time::Instant;

use brickpi_frame::{AssemblerState, FrameAssembler, FrameEvent};

use crate::cmd::DecodeArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::hex;
use crate::output::{print_events, EventOutput, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = hex::decode(&args.hex).map_err(CliError::usage)?;
    let chunk = args.chunk.map_or(bytes.len().max(1), usize::from);

    let (events, state) = assemble(&bytes, chunk);
    let outputs: Vec<EventOutput> = events.iter().map(EventOutput::from).collect();
    print_events(&outputs, state_name(state), format);

    let rejected = events
        .iter()
        .any(|event| matches!(event, FrameEvent::Rejected { .. }));
    if rejected {
        return Err(CliError::new(DATA_INVALID, "one or more frames were rejected"));
    }
    Ok(SUCCESS)
}

/// Feed `bytes` to a fresh assembler `chunk` bytes at a time.
fn assemble(bytes: &[u8], chunk: usize) -> (Vec<FrameEvent>, AssemblerState) {
    let mut assembler = FrameAssembler::new();
    let now = Instant::now();
    let mut events = Vec::new();
    for piece in bytes.chunks(chunk) {
        tracing::trace!(len = piece.len(), "feeding chunk");
        events.extend(assembler.push(piece, now));
    }
    (events, assembler.state())
}

fn state_name(state: AssemblerState) -> &'static str {
    match state {
        AssemblerState::Idle => "idle",
        AssemblerState::AwaitingLength => "awaiting-length",
        AssemblerState::Accumulating => "accumulating",
    }
}
