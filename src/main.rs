use std::process::ExitCode;

use clap::Parser;
use creo_stats::StatsOptions;
use creo_stats::runtime::Filter;
use creo_stats::runtime::docker::DEFAULT_HOST;
use tokio_util::sync::CancellationToken;

/// Display a live stream of container resource usage statistics.
#[derive(Parser, Debug)]
#[command(name = "creo-stats", version)]
#[command(about = "Display a live stream of container resource usage statistics")]
struct Cli {
    /// Show all containers (default shows just running)
    #[arg(short, long)]
    all: bool,

    /// Disable streaming stats and only pull the first result
    #[arg(long)]
    no_stream: bool,

    /// Do not truncate output
    #[arg(long)]
    no_trunc: bool,

    /// Format output using a custom template: 'table', 'table TEMPLATE', 'json' or TEMPLATE
    #[arg(long, default_value = "")]
    format: String,

    /// Filter output based on conditions provided (key=value)
    #[arg(short, long = "filter", value_name = "FILTER")]
    filters: Vec<Filter>,

    /// Daemon socket to connect to
    #[arg(short = 'H', long, env = "DOCKER_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Containers to show (default shows all)
    #[arg(value_name = "CONTAINER")]
    containers: Vec<String>,
}

impl Cli {
    fn options(self) -> StatsOptions {
        StatsOptions {
            all: self.all,
            no_stream: self.no_stream,
            no_trunc: self.no_trunc,
            format: self.format,
            containers: self.containers,
            filters: self.filters.into_iter().collect(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let host = cli.host.clone();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::debug!("Received Ctrl-C, shutting down");
                cancel.cancel();
            }
        }
    });

    match creo_stats::run(&host, cli.options(), cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
