use std::{ path::PathBuf, time::Duration };

use anyhow::{ Context, Error, Result };
use clap::{ Args, Parser, Subcommand };
use tokio::{ sync::broadcast, time::interval };
use tracing::{ debug, error, info };

use crate::{
    identity::Resolver,
    probe::{ Prober, Site },
    render::Summary,
    transport::TransportOpt,
};

mod config;
mod error;
mod identity;
mod logger;
mod probe;
mod purity;
mod render;
mod transport;
mod utils;

#[derive(Parser)]
#[command(
    version,
    about = "Network identity and reachability checker",
    long_about = "Network identity and reachability checker\n\n\
    Reports the externally visible IP address with its location and carrier, estimates\n\
    how likely that address is a VPN, proxy or datacenter exit, and measures latency\n\
    to a list of sites concurrently."
)]
struct Cli {
    #[command(subcommand)]
    subcommand: SubCommands,
    /// Increase logging verbosity
    #[arg(short('v'), long, action = clap::ArgAction::Count, global = true)]
    verbosity: u8,
    /// Proxy to send all requests through (http://, https:// or socks5://)
    #[arg(short('p'), long, env = "NETSPEED_PROXY", value_name = "url", global = true)]
    proxy: Option<String>,
    /// JSON file with the sites to probe, e.g. [{"Name": "Example", "URL": "https://example.com"}]
    #[arg(short('c'), long, env = "NETSPEED_CONFIG", value_name = "file", global = true)]
    config: Option<PathBuf>,
    /// JSON file replacing the built-in identity provider table
    #[arg(long, env = "NETSPEED_PROVIDERS", value_name = "file", global = true)]
    providers: Option<PathBuf>,
    /// Request timeout, also the per-site probe deadline
    #[arg(
        short('t'),
        long,
        env = "NETSPEED_TIMEOUT",
        value_name = "seconds",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    timeout: u64,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    /// Emit logs as JSON lines
    #[arg(long = "log_json", env = "NETSPEED_LOG_JSON", global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum SubCommands {
    #[command(about = "Show the current IP address with its location and carrier", name = "ip")]
    Ip(IpArgs),
    #[command(about = "Estimate the purity of the current IP address", name = "purity")]
    Purity,
    #[command(about = "Measure latency to every site once", name = "test")]
    Test,
    #[command(about = "Measure latency repeatedly until interrupted", name = "watch")]
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct IpArgs {
    /// Bypass every proxy to reveal the origin address
    #[arg(long)]
    origin: bool,
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Refresh interval
    #[arg(
        short('i'),
        long,
        value_name = "seconds",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let level = logger::verbosity_to_level_filter(args.verbosity);
    let sub = logger::setup_logger(level, args.log_json);
    tracing::subscriber::set_global_default(sub)?;
    run(args).await.map_err(log_err)
}

fn log_err(err: Error) -> Error {
    error!("{:?}", err);
    err
}

async fn run(args: Cli) -> Result<()> {
    let mut opt = TransportOpt {
        proxy: args.proxy.clone(),
        timeout: Duration::from_secs(args.timeout),
        origin: false,
    };
    match &args.subcommand {
        SubCommands::Ip(ip_args) => {
            opt.origin = ip_args.origin;
            let resolver = resolver(&args, &opt)?;
            let identity = resolver.resolve().await.context("cannot resolve ip identity")?;
            render::emit(args.json, &identity, |i| render::identity(i, ip_args.origin))
        }
        SubCommands::Purity => {
            let resolver = resolver(&args, &opt)?;
            let identity = resolver.resolve().await.context("cannot resolve ip identity")?;
            let report = purity::score(&identity);
            render::emit(args.json, &report, render::score_report)
        }
        SubCommands::Test => {
            let (prober, sites) = prober(&args, &opt)?;
            info!("probing {} sites", sites.len());
            probe_round(&prober, &sites, args.json).await
        }
        SubCommands::Watch(watch_args) => {
            let (prober, sites) = prober(&args, &opt)?;
            watch(&prober, &sites, watch_args.interval, args.json).await
        }
    }
}

fn resolver(args: &Cli, opt: &TransportOpt) -> Result<Resolver> {
    let client = transport::build_client(opt)?;
    let providers = config::load_providers(args.providers.as_deref())?;
    let resolver = Resolver::new(client, providers);
    debug!("resolving identity through {} providers", resolver.providers().len());
    Ok(resolver)
}

fn prober(args: &Cli, opt: &TransportOpt) -> Result<(Prober, Vec<Site>)> {
    let client = transport::build_client(opt)?;
    let sites = config::load_sites(args.config.as_deref())?;
    Ok((Prober::new(client, opt.timeout), sites))
}

async fn probe_round(prober: &Prober, sites: &[Site], json: bool) -> Result<()> {
    let results = prober.probe_all(sites).await;
    let summary = Summary::from_results(&results);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(
                &serde_json::json!({ "results": results, "summary": summary })
            )?
        );
    } else {
        print!("{}", render::probe_table(&results));
        print!("{}", render::summary(&summary));
    }
    Ok(())
}

async fn watch(prober: &Prober, sites: &[Site], every: u64, json: bool) -> Result<()> {
    let (cancel_tx, cancel_rx) = broadcast::channel::<()>(1);
    ctrlc
        ::set_handler(move || {
            let _ = cancel_tx.send(());
        })
        .context("cannot install Ctrl-C handler")?;
    info!("watching {} sites every {} seconds, press Ctrl+C to exit", sites.len(), every);
    watch_until_cancelled(prober, sites, Duration::from_secs(every), json, cancel_rx).await
}

/// Runs probing rounds on every tick. A cancel signal also aborts the round
/// in flight.
async fn watch_until_cancelled(
    prober: &Prober,
    sites: &[Site],
    every: Duration,
    json: bool,
    mut cancel_rx: broadcast::Receiver<()>
) -> Result<()> {
    let mut ticker = interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !json {
                    print!("\x1b[2J\x1b[H");
                    println!("Last update: {}\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
                }
                tokio::select! {
                    res = probe_round(prober, sites, json) => res?,
                    _ = cancel_rx.recv() => {
                        info!("cancel signal received, abandoning current round");
                        break;
                    },
                }
            },
            _ = cancel_rx.recv() => {
                info!("cancel signal received, leaving watch mode");
                break;
            },
        }
    }
    Ok(())
}
