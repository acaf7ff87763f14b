use brickpi_frame::EMERGENCY_STOP;
use brickpi_link::{Exchanger, LinkConfig};

use crate::cmd::EstopArgs;
use crate::exit::{link_error, CliResult, SUCCESS};

pub fn run(args: EstopArgs) -> CliResult<i32> {
    let mut exchanger = Exchanger::open(&args.port, args.baud, LinkConfig::default())
        .map_err(|err| link_error("open failed", err))?;
    exchanger
        .broadcast(EMERGENCY_STOP, &[])
        .map_err(|err| link_error("emergency stop failed", err))?;

    tracing::info!(port = %args.port, "emergency stop sent");
    Ok(SUCCESS)
}
