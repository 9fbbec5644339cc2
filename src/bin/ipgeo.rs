//! ipgeo: serve or query IPv4 geolocation from network and location feeds.

use clap::{Args, Parser, Subcommand};
use ipgeo::{server, Config, Resolver, DEFAULT_LISTEN, DEFAULT_LOCATIONS, DEFAULT_NETWORKS};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ipgeo")]
#[command(version)]
#[command(about = "Resolve IPv4 addresses to locations from CIDR and location feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct FeedArgs {
    /// Network feed mapping CIDR networks to location ids
    #[arg(long, env = "IPGEO_NETWORKS", default_value = DEFAULT_NETWORKS)]
    networks: PathBuf,

    /// Location feed mapping ids to locations
    #[arg(long, env = "IPGEO_LOCATIONS", default_value = DEFAULT_LOCATIONS)]
    locations: PathBuf,

    /// Both feeds start with a column header row
    #[arg(long)]
    header: bool,
}

impl FeedArgs {
    fn config(&self) -> Config {
        Config::new(&self.networks, &self.locations).with_header(self.header)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serve lookups over HTTP at /ip/{addr}
    Serve {
        #[command(flatten)]
        feeds: FeedArgs,

        /// Address to bind the HTTP server to
        #[arg(short, long, env = "IPGEO_LISTEN", default_value = DEFAULT_LISTEN)]
        listen: String,

        /// Seconds allowed to answer one request before replying 408
        #[arg(long, env = "IPGEO_REQUEST_TIMEOUT", default_value_t = 5)]
        request_timeout: u64,
    },

    /// Resolve addresses and print one JSON line per address
    Lookup {
        #[command(flatten)]
        feeds: FeedArgs,

        /// IPv4 addresses to resolve
        #[arg(required = true)]
        addrs: Vec<Ipv4Addr>,
    },

    /// Load both feeds and report counts and dangling location references
    Check {
        #[command(flatten)]
        feeds: FeedArgs,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let result = match cli.command {
        Commands::Serve {
            feeds,
            listen,
            request_timeout,
        } => serve(&feeds, &listen, request_timeout),
        Commands::Lookup { feeds, addrs } => lookup(&feeds, &addrs),
        Commands::Check { feeds } => check(&feeds),
    };

    match result {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn serve(
    feeds: &FeedArgs,
    listen: &str,
    request_timeout: u64,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = feeds.config().with_listen(listen)?;
    config.timeouts.request = Duration::from_secs(request_timeout);
    log::debug!("options: {:?}", config);

    let resolver = Arc::new(config.load()?);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(resolver, config.listen, config.timeouts))?;
    Ok(true)
}

#[derive(Serialize)]
#[serde(untagged)]
enum LookupLine<'a> {
    Found {
        addr: Ipv4Addr,
        #[serde(flatten)]
        location: &'a ipgeo::Location,
    },
    Failed {
        addr: Ipv4Addr,
        error: &'static str,
    },
}

fn lookup(feeds: &FeedArgs, addrs: &[Ipv4Addr]) -> Result<bool, Box<dyn std::error::Error>> {
    let resolver: Resolver = feeds.config().load()?;

    let mut all_found = true;
    for &addr in addrs {
        let line = match resolver.resolve(addr) {
            Ok(location) => LookupLine::Found { addr, location },
            Err(e) => {
                all_found = false;
                LookupLine::Failed {
                    addr,
                    error: e.kind(),
                }
            }
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(all_found)
}

fn check(feeds: &FeedArgs) -> Result<bool, Box<dyn std::error::Error>> {
    let resolver: Resolver = feeds.config().load()?;
    let stats = resolver.networks().stats();

    println!("networks:  {} ({} malformed rows skipped)", stats.accepted, stats.skipped);
    println!("locations: {}", resolver.locations().len());

    let dangling = resolver.dangling_references();
    if dangling.is_empty() {
        println!("all referenced locations exist");
        return Ok(true);
    }

    println!("{} referenced locations are missing:", dangling.len());
    for id in &dangling {
        println!("  {}", id);
    }
    Ok(false)
}
