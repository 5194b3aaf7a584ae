//! CLI entry point for the crossnet host scanner.

use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use crossnet_core::config::{load_section, DEFAULT_FILE_PREFIX};
use crossnet_core::{ProbeResult, ScanEvent, ScanType};
use crossnet_scan::{HostnameResolver, ScanConfig, ScanController, ScanOutcome};
use crossnet_system::{interfaces, SystemCollaborators, SystemConfig};

#[derive(Parser)]
#[command(name = "crossnet")]
#[command(version, about = "Discover live hosts on a local IPv4 network")]
struct Cli {
    /// Config file prefix (default: crossnet).
    #[arg(short, long, global = true, default_value = DEFAULT_FILE_PREFIX)]
    config: String,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    debug: bool,

    /// Write logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a network block.
    Scan(ScanArgs),
    /// Show this machine's address and the block around it.
    CurrentIp,
    /// Resolve host names for the given addresses.
    Resolve {
        #[arg(required = true)]
        addresses: Vec<Ipv4Addr>,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Network to scan in CIDR notation (e.g., 192.168.1.0/24).
    #[arg(short, long)]
    network: Option<String>,

    /// Scan type: ping, arp, both.
    #[arg(short = 's', long)]
    scan_type: Option<ScanType>,

    /// Maximum hosts probed at once.
    #[arg(short = 'T', long)]
    threads: Option<usize>,

    /// Per-probe timeout in seconds.
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Also show hosts that did not answer.
    #[arg(short, long, visible_alias = "report-down")]
    verbose: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

impl ScanArgs {
    fn apply(&self, config: &mut ScanConfig) {
        if let Some(network) = &self.network {
            config.network = network.clone();
        }
        if let Some(scan_type) = self.scan_type {
            config.scan_type = scan_type;
        }
        if let Some(threads) = self.threads {
            config.concurrency = threads;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if self.verbose {
            config.report_down = true;
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Aligned columns, progress on stderr.
    Table,
    /// One JSON event per line.
    Json,
    /// Event-stream frames (`data: {...}`).
    Sse,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_json);

    match &cli.command {
        Command::Scan(args) => run_scan(&cli.config, args).await,
        Command::CurrentIp => {
            let current = interfaces::current_address();
            println!("{}", serde_json::to_string_pretty(&current)?);
            Ok(())
        }
        Command::Resolve { addresses } => run_resolve(&cli.config, addresses).await,
    }
}

fn init_logging(debug: bool, json: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = fmt().with_env_filter(filter).with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_scan(config_prefix: &str, args: &ScanArgs) -> anyhow::Result<()> {
    let mut scan_config: ScanConfig = load_section(config_prefix, "scan")?;
    let system_config: SystemConfig = load_section(config_prefix, "system")?;
    args.apply(&mut scan_config);

    let system = SystemCollaborators::detect(&system_config);
    tracing::info!(platform = %system.platform, network = %scan_config.network, "Preparing scan");

    let resolver = Arc::new(HostnameResolver::new(system.naming));
    let controller = ScanController::new(Arc::new(system.probe), resolver, &scan_config);

    let mut observer = controller.subscribe();
    let handle = controller.start_scan(scan_config.to_request())?;

    let mut printer = Printer::new(args.format);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = observer.recv() => match event {
                Some(event) => printer.print(&event)?,
                None => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                tracing::info!("Interrupted, stopping scan");
                controller.stop_scan();
            }
        }
    }

    let outcome = handle.await?;
    printer.finish(&outcome)?;

    if let ScanOutcome::Failed { message } = outcome {
        anyhow::bail!(message);
    }
    Ok(())
}

async fn run_resolve(config_prefix: &str, addresses: &[Ipv4Addr]) -> anyhow::Result<()> {
    let system_config: SystemConfig = load_section(config_prefix, "system")?;
    let system = SystemCollaborators::detect(&system_config);
    let resolver = HostnameResolver::new(system.naming);

    for address in addresses {
        let name = resolver.resolve(*address).await;
        let shown = if name.is_empty() { "-" } else { name.as_str() };
        println!("{address:<16} {shown}");
    }

    let stats = resolver.stats().await;
    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}

/// Renders scan events on stdout.
struct Printer {
    format: OutputFormat,
    started: Instant,
    header_printed: bool,
    hosts: usize,
}

impl Printer {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            started: Instant::now(),
            header_printed: false,
            hosts: 0,
        }
    }

    fn print(&mut self, event: &ScanEvent) -> anyhow::Result<()> {
        if let ScanEvent::Result(_) = event {
            self.hosts += 1;
        }

        let mut out = io::stdout().lock();
        match self.format {
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(event)?)?,
            OutputFormat::Sse => write!(out, "data: {}\n\n", serde_json::to_string(event)?)?,
            OutputFormat::Table => self.print_row(&mut out, event)?,
        }
        out.flush()?;
        Ok(())
    }

    fn print_row(&mut self, out: &mut impl Write, event: &ScanEvent) -> io::Result<()> {
        match event {
            ScanEvent::Progress { percent, message } => {
                eprint!("\r[{percent:>3}%] {message:<48}");
                Ok(())
            }
            ScanEvent::Result(result) => {
                if !self.header_printed {
                    eprintln!();
                    writeln!(out, "{:<16} {:<18} {:<10} {}", "IP", "MAC", "STATUS", "HOSTNAME")?;
                    self.header_printed = true;
                }
                writeln!(out, "{}", table_row(result))
            }
            ScanEvent::Error { message } => {
                eprintln!();
                eprintln!("error: {message}");
                Ok(())
            }
            ScanEvent::Complete { message } => {
                eprintln!();
                eprintln!("{message}");
                Ok(())
            }
        }
    }

    fn finish(&self, outcome: &ScanOutcome) -> io::Result<()> {
        if self.format != OutputFormat::Table {
            return Ok(());
        }
        if let ScanOutcome::Completed { .. } = outcome {
            eprintln!(
                "{} host(s) reported in {:.1}s",
                self.hosts,
                self.started.elapsed().as_secs_f64()
            );
        }
        Ok(())
    }
}

fn table_row(result: &ProbeResult) -> String {
    let hostname = result.hostname().unwrap_or("-");
    match result {
        ProbeResult::Ping(ping) => {
            let status = if ping.alive {
                format!("{:.1}ms", ping.rtt.as_secs_f64() * 1000.0)
            } else {
                "down".to_string()
            };
            format!("{:<16} {:<18} {:<10} {}", ping.address, "-", status, hostname)
        }
        ProbeResult::Link(entry) => {
            let status = match entry.source {
                crossnet_core::LinkSource::CachedTable => "cached",
                crossnet_core::LinkSource::ActiveScan => "active",
            };
            format!(
                "{:<16} {:<18} {:<10} {}",
                entry.address, entry.link_address, status, hostname
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_args(argv: &[&str]) -> ScanArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Scan(args) => args,
            _ => panic!("expected the scan subcommand"),
        }
    }

    #[test]
    fn test_scan_verbose_reports_down_hosts() {
        let mut config = ScanConfig::default();
        scan_args(&["crossnet", "scan", "--verbose"]).apply(&mut config);
        assert!(config.report_down);

        let mut config = ScanConfig::default();
        scan_args(&["crossnet", "scan", "-v", "-n", "10.2.0.0/24"]).apply(&mut config);
        assert!(config.report_down);
        assert_eq!(config.network, "10.2.0.0/24");
    }

    #[test]
    fn test_report_down_alias_and_default() {
        let mut config = ScanConfig::default();
        scan_args(&["crossnet", "scan", "--report-down"]).apply(&mut config);
        assert!(config.report_down);

        let mut config = ScanConfig::default();
        scan_args(&["crossnet", "scan", "-T", "8"]).apply(&mut config);
        assert!(!config.report_down);
        assert_eq!(config.concurrency, 8);
    }

    #[test]
    fn test_debug_is_a_global_flag() {
        let cli = Cli::try_parse_from(["crossnet", "scan", "--debug", "-v"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(cli.command, Command::Scan(ref args) if args.verbose));
    }
}
