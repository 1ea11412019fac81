use clap::Parser;
use pairtrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    pairtrader::cli::init_tracing(&cli.log_level);
    run(cli)
}
