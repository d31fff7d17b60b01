use std::path::PathBuf;

use anyhow::{Context, Result};
use bitcoin::Network;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use mergewatch::config::Settings;
use mergewatch::esplora::JsonFile;
use mergewatch::rawtx::decode_with_prevouts;
use mergewatch::utils::validate_address;
use mergewatch::{telemetry, Address, EsploraClient, Report, TransactionSource};

#[derive(Parser)]
#[clap(author, version, about = "Detect UTXO input merges for a Bitcoin address", long_about = None)]
struct Cli {
    /// config file, defaults to ./mergewatch.toml when present
    #[clap(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// bitcoin, testnet, signet or regtest
    #[clap(long)]
    network: Option<String>,

    /// print the report as JSON
    #[clap(long)]
    json: bool,

    /// list the addresses of every merge
    #[clap(short, long)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// fetch the address history from an Esplora API
    Address {
        address: String,

        #[clap(long, value_name = "URL")]
        api_url: Option<String>,

        /// pages of confirmed history to fetch, 0 for all
        #[clap(long, value_name = "N")]
        max_pages: Option<usize>,
    },
    /// analyse a saved /address/:addr/txs response
    File {
        path: PathBuf,

        #[clap(long)]
        address: String,
    },
    /// analyse one raw transaction against the transactions it spends
    Raw {
        tx_hex: String,

        #[clap(long)]
        address: String,

        /// hex of a spent transaction, repeat for each
        #[clap(long = "prev", value_name = "HEX")]
        prev: Vec<String>,
    },
}

impl Cli {
    /// Flags win over every configuration layer.
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(network) = &self.network {
            settings.network = network.clone();
        }
        if let Command::Address {
            api_url, max_pages, ..
        } = &self.command
        {
            if let Some(api_url) = api_url {
                settings.api_url = api_url.clone();
            }
            if let Some(max_pages) = max_pages {
                settings.max_pages = *max_pages;
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply_overrides(&mut settings);
    if let Err(e) = telemetry::init_tracing(&settings) {
        eprintln!("logging disabled: {}", e);
    }

    let network = settings.network()?;

    let report = match cli.command {
        Command::Address { address, .. } => {
            let target = validate_address(&address, network)?;
            let client = EsploraClient::from_settings(&settings)?;
            info!(address = %target, api = client.base_url(), "fetching address history");
            analyse(&client, target)?
        }
        Command::File { path, address } => {
            let target = checked_target(&address, network);
            analyse(&JsonFile(path), target)?
        }
        Command::Raw {
            tx_hex,
            address,
            prev,
        } => {
            let target = checked_target(&address, network);
            let txn = decode_with_prevouts(&tx_hex, prev.as_slice(), network).context("failed to decode transaction")?;
            Report::new(target, &[txn])
        }
    };

    info!(
        transactions = report.transactions_scanned,
        merges = report.merges.len(),
        "analysis complete"
    );

    if cli.json {
        println!("{}", report.render_json()?);
    } else {
        print!("{}", report.render_text(cli.verbose));
    }
    Ok(())
}

fn analyse(source: &dyn TransactionSource, target: Address) -> Result<Report> {
    let txns = source
        .address_transactions(&target)
        .with_context(|| format!("failed to get transactions for {}", target))?;
    Ok(Report::new(target, &txns))
}

// Offline inputs are analysed even when the address does not parse, the
// analysis treats it as an opaque string.
fn checked_target(address: &str, network: Network) -> Address {
    match validate_address(address, network) {
        Ok(target) => target,
        Err(e) => {
            warn!("{}", e);
            Address::from(address)
        }
    }
}
