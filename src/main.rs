mod metrics;
mod output;

use clap::Parser;
use std::process::exit;
use std::sync::mpsc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tlsplain::config::{Config, OutputFormat};
use tlsplain::FetchOptions;

use crate::metrics::prom::prometheus_metrics;
use crate::output::HostReport;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Hosts to check, e.g. example.com or example.com:8443
    hosts: Vec<String>,

    /// Output format
    #[arg(short, long, value_parser = ["json", "text", "summary"])]
    output: Option<String>,

    /// Configuration file (defaults to ./tlsplain.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Per-connection timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Exit code to use when a host is unverified or could not be assessed
    #[arg(long)]
    exit_code: Option<i32>,

    /// Push metrics to a Prometheus Push Gateway
    #[arg(long)]
    prometheus: bool,

    /// Prometheus Push Gateway address
    #[arg(long)]
    prometheus_address: Option<String>,

    /// Print an example configuration file and exit
    #[arg(long)]
    generate_config: bool,

    /// Log every connection attempt
    #[arg(short, long)]
    verbose: bool,
}

const DEFAULT_CONFIG_FILE: &str = "tlsplain.toml";

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
    }

    if args.generate_config {
        println!("{}", Config::example_toml());
        return;
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            exit(2);
        }
    };
    let hosts = match config.validate() {
        Ok(hosts) => hosts,
        Err(e) => {
            error!("{}", e);
            exit(2);
        }
    };
    // validate() has already checked the format
    let format = config.output_format().unwrap_or(OutputFormat::Summary);

    let reports = check_hosts(hosts, config.fetch_options());

    match format {
        OutputFormat::Json => match output::render_json(&reports) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize results: {}", e),
        },
        OutputFormat::Text => print!("{}", output::render_text(&reports)),
        OutputFormat::Summary => println!("{}", output::render_summary(&reports)),
    }

    if let Some(address) = config.prometheus_address() {
        prometheus_metrics(&reports, &address);
    }

    let all_verified = reports.iter().all(HostReport::is_verified);
    if !all_verified {
        exit(config.exit_code.unwrap_or(0));
    }
}

fn load_config(args: &Args) -> Result<Config, tlsplain::config::ConfigError> {
    let file_config = match &args.config {
        Some(path) => Some(Config::from_file(path)?),
        None if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Some(Config::from_file(DEFAULT_CONFIG_FILE)?)
        }
        None => None,
    };

    let hosts = if args.hosts.is_empty() {
        None
    } else {
        Some(args.hosts.clone())
    };
    let cli_config = Config::from_cli_args(
        hosts,
        args.output.clone(),
        args.timeout,
        args.exit_code,
        args.prometheus.then_some(true),
        args.prometheus_address.clone(),
    );

    let mut config = Config::default();
    if let Some(file_config) = file_config {
        config = config.merge_with(file_config);
    }
    Ok(config.merge_with(cli_config))
}

/// Checks every host on its own thread and collects reports in input order.
fn check_hosts(hosts: Vec<String>, options: FetchOptions) -> Vec<HostReport> {
    let (sender, receiver): (Sender<(usize, HostReport)>, Receiver<(usize, HostReport)>) =
        mpsc::channel();
    let hosts_len = hosts.len();

    for (index, host) in hosts.into_iter().enumerate() {
        let thread_tx = sender.clone();
        let options = options.clone();
        thread::spawn(move || {
            let result = tlsplain::fetch_with(&host, &options);
            match &result {
                Ok(description) => info!(
                    host = %description.host,
                    subject = %description.subject,
                    verified = description.verified(),
                    cipher = %description.negotiated_cipher,
                    "assessed"
                ),
                Err(e) => warn!(host = %host, error = %e, "couldn't connect to the server"),
            }
            let _ = thread_tx.send((index, HostReport::new(host, result)));
        });
    }
    drop(sender);

    let mut indexed: Vec<(usize, HostReport)> = Vec::with_capacity(hosts_len);
    for report in receiver {
        indexed.push(report);
    }
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, report)| report).collect()
}
