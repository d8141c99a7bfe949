use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("telemlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: telemlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", env!("TELEMLINK_BUILD_TARGET"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "frame: preamble={:#04x} header={}B crc=CRC-16/XMODEM max_payload={}",
        telemlink_frame::PREAMBLE,
        telemlink_frame::HEADER_SIZE,
        telemlink_frame::MAX_PAYLOAD
    );
    println!("features: async={}, cli=true", cfg!(feature = "async"));

    Ok(SUCCESS)
}
