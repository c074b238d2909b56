use std::process::ExitCode;

use clap::Parser;

use pixelfe::cli::CliArgs;

fn main() -> ExitCode {
    pixelfe::logger::init();
    let args = CliArgs::parse();
    pixelfe::cli::run(args)
}
