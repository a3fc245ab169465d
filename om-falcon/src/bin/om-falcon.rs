use anyhow::Result;
use clap::{error::ErrorKind, CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use om_falcon::{
    sync::{Bridge, Delivery},
    transport::MetricSource,
};

/// Pushes the samples of a Prometheus exposition to Open-Falcon
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// URL of the metrics source API, or `-` to read standard input
    source_url: String,

    /// The reporting interval in seconds
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    step: u64,

    /// URL of the Open-Falcon push API
    #[clap(long, alias = "falcon_push_api", env = "FALCON_PUSH_API")]
    falcon_push_api: Option<String>,

    /// Endpoint of the Open-Falcon samples
    #[clap(long, default_value = "test")]
    endpoint: String,

    /// Output the transformed samples without actually pushing
    #[clap(long, alias = "output_only")]
    output_only: bool,

    /// Sync periodically in a loop.  Failed passes are logged and retried, without it a failed
    /// pass exits with a non-zero status.
    #[clap(long = "loop")]
    repeat: bool,

    /// Log level, used when RUST_LOG isn't set
    #[clap(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&args.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let delivery = match (args.output_only, args.falcon_push_api) {
        (true, _) => Delivery::Print,
        (false, Some(url)) => Delivery::Push(url),
        (false, None) => Args::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "falcon_push_api not provided",
            )
            .exit(),
    };

    let source: MetricSource = args.source_url.parse()?;
    let bridge = Bridge::new(source, delivery, args.endpoint, args.step)?;
    let mut stdout = std::io::stdout();

    if args.repeat {
        bridge.run(&mut stdout)
    }

    bridge.sync(&mut stdout)?;

    Ok(())
}
