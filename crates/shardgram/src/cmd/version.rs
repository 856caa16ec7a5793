use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("shardgram {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: shardgram");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", crate::cmd::envinfo::target_triple());
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "wire: header={}B mtu={}..={} default_mtu={}",
        shardgram_frame::HEADER_SIZE,
        shardgram_frame::MIN_MTU,
        shardgram_frame::MAX_MTU,
        shardgram_frame::DEFAULT_MTU
    );
    println!(
        "features: reassembly={}, cli=true",
        cfg!(feature = "reassembly")
    );

    Ok(SUCCESS)
}
