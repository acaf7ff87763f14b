use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use brickpi_link::{Board, BoardConfig, Exchanger};

use crate::cmd::PollArgs;
use crate::exit::{link_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_snapshot, OutputFormat};

pub fn run(args: PollArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let config = load_config(&args)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let exchanger = Exchanger::open(&config.serial_path, config.baud_rate, config.link_config())
        .map_err(|err| link_error("open failed", err))?;
    let mut board = Board::new(exchanger).map_err(|err| link_error("board setup failed", err))?;
    board
        .apply_config(&config)
        .map_err(|err| link_error("invalid board config", err))?;
    for (port, speed) in &args.speed {
        board
            .add_motor(*port)
            .map_err(|err| link_error("invalid --speed", err))?
            .set_speed(*speed);
    }

    board
        .set_communication_timeout(config.communication_timeout())
        .map_err(|err| link_error("setting communication timeout failed", err))?;

    let mut polls = 0u64;
    while running.load(Ordering::SeqCst) {
        if let Err(err) = board.update_values() {
            stop(&mut board);
            return Err(link_error("poll failed", err));
        }
        polls += 1;
        print_snapshot(polls, &board.snapshot(), format);

        for report in board.exchanger_mut().take_unsolicited() {
            tracing::debug!(%report, "unsolicited frame during poll");
        }
        if args.count.is_some_and(|count| polls >= count) {
            break;
        }
        std::thread::sleep(interval);
    }

    stop(&mut board);
    Ok(SUCCESS)
}

fn load_config(args: &PollArgs) -> CliResult<BoardConfig> {
    let mut config = match &args.config {
        Some(path) => {
            BoardConfig::from_path(path).map_err(|err| link_error("invalid board config", err))?
        }
        None => BoardConfig::default(),
    };
    if let Some(port) = &args.port {
        config.serial_path = port.clone();
    }
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }
    config
        .validate()
        .map_err(|err| link_error("invalid board config", err))?;
    Ok(config)
}

/// Stop the motors on the way out. A failure here is logged, not returned,
/// so the error that ended the poll loop is the one reported.
fn stop<L: brickpi_transport::SerialLink>(board: &mut Board<L>) {
    if let Err(err) = board.emergency_stop() {
        tracing::error!(error = %err, "emergency stop failed");
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };
    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
