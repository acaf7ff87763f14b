use brickpi_frame::{encode_request, Request};
use bytes::BytesMut;

use crate::cmd::FrameArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS};
use crate::hex;
use crate::output::{print_request, OutputFormat};

pub fn run(args: FrameArgs, format: OutputFormat) -> CliResult<i32> {
    let data = hex::decode(&args.data).map_err(|err| CliError::usage(format!("--data: {err}")))?;
    let request = Request::new(args.address, args.command, data);

    let mut wire = BytesMut::with_capacity(request.wire_size());
    encode_request(request.address, request.command, &request.data, &mut wire)
        .map_err(|err| frame_error("encode failed", err))?;

    print_request(&request, &wire, format);
    Ok(SUCCESS)
}
