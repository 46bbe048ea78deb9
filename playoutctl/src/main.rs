use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = playoutctl::Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = playoutctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
