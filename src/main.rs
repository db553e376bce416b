use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use stickercut::cli::{self, CliArgs};
use stickercut::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    logger::init(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info });
    log::info!("stickercut {} starting", env!("CARGO_PKG_VERSION"));
    cli::run(args)
}
