//! Address history from an Esplora block explorer (blockstream.info,
//! mempool.space) or from a saved copy of its JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::{Address, PrevOut, Transaction, Vin};

/// Confirmed transactions per page of `/address/:addr/txs/chain`. Only
/// transactions with `status.confirmed` count towards a full page, so an
/// explorer that omits `status` is read one page deep.
pub const CHAIN_PAGE_SIZE: usize = 25;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that can produce the transaction history of an address.
pub trait TransactionSource {
    fn address_transactions(&self, address: &Address) -> Result<Vec<Transaction>, Error>;
}

/* wire types: everything but the txid may be missing or malformed */

#[derive(Debug, Clone, Deserialize)]
pub struct EsploraTx {
    pub txid: String,
    #[serde(default, deserialize_with = "lenient_vin")]
    pub vin: Vec<EsploraVin>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<EsploraStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EsploraVin {
    #[serde(default, deserialize_with = "lenient")]
    pub prevout: Option<EsploraPrevout>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EsploraPrevout {
    #[serde(default, deserialize_with = "lenient")]
    pub scriptpubkey_address: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct EsploraStatus {
    #[serde(default)]
    pub confirmed: bool,
}

// A value of the wrong shape is dropped instead of failing the whole array.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

// Entries that are not input objects become inputs without a prevout.
fn lenient_vin<'de, D>(deserializer: D) -> Result<Vec<EsploraVin>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = match Value::deserialize(deserializer)? {
        Value::Array(values) => values,
        _ => Vec::new(),
    };
    Ok(values
        .into_iter()
        .map(|value| serde_json::from_value(value).unwrap_or_default())
        .collect())
}

impl EsploraTx {
    pub fn is_confirmed(&self) -> bool {
        self.status.map_or(false, |s| s.confirmed)
    }
}

impl From<EsploraVin> for Vin {
    fn from(vin: EsploraVin) -> Self {
        Vin {
            prevout: vin.prevout.map(|prevout| PrevOut {
                address: prevout
                    .scriptpubkey_address
                    .filter(|addr| !addr.is_empty())
                    .map(Address::from),
            }),
        }
    }
}

impl From<EsploraTx> for Transaction {
    fn from(tx: EsploraTx) -> Self {
        Transaction {
            txid: tx.txid,
            vin: tx.vin.into_iter().map(Vin::from).collect(),
        }
    }
}

pub fn parse_transactions(body: &str) -> Result<Vec<Transaction>, Error> {
    let txs: Vec<EsploraTx> = serde_json::from_str(body)?;
    Ok(txs.into_iter().map(Transaction::from).collect())
}

/// Reads a saved `/address/:addr/txs` response.
pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>, Error> {
    let body = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_transactions(&body)
}

/// A saved Esplora response on disk. The file is assumed to already belong
/// to the address being analysed.
pub struct JsonFile(pub PathBuf);

impl TransactionSource for JsonFile {
    fn address_transactions(&self, _address: &Address) -> Result<Vec<Transaction>, Error> {
        load_transactions(&self.0)
    }
}

pub struct EsploraClient {
    client: reqwest::blocking::Client,
    base_url: String,
    max_pages: usize,
}

impl EsploraClient {
    /// `max_pages == 0` follows the confirmed history to the end.
    pub fn new(base_url: &str, timeout: Duration, max_pages: usize) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mergewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(EsploraClient {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            max_pages,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        EsploraClient::new(
            &settings.api_url,
            Duration::from_secs(settings.timeout_secs),
            settings.max_pages,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn page_url(&self, address: &Address, last_seen: Option<&str>) -> String {
        match last_seen {
            None => format!("{}/address/{}/txs", self.base_url, address),
            Some(txid) => format!("{}/address/{}/txs/chain/{}", self.base_url, address, txid),
        }
    }

    fn get_page(&self, url: &str) -> Result<Vec<EsploraTx>, Error> {
        debug!(%url, "fetching transactions");
        let resp = self.client.get(url).send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::Status {
                url: url.to_owned(),
                status: status.as_u16(),
                body: body.trim().to_owned(),
            });
        }

        let body = resp.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Raw history of `address`, newest first, mempool transactions included.
    pub fn fetch_history(&self, address: &Address) -> Result<Vec<EsploraTx>, Error> {
        collect_pages(self.max_pages, |last_seen| {
            self.get_page(&self.page_url(address, last_seen))
        })
    }
}

impl TransactionSource for EsploraClient {
    fn address_transactions(&self, address: &Address) -> Result<Vec<Transaction>, Error> {
        let txs = self.fetch_history(address)?;
        Ok(txs.into_iter().map(Transaction::from).collect())
    }
}

// The first page carries mempool transactions plus the newest confirmed
// ones. Further pages are keyed by the last confirmed txid seen and end with
// a page shorter than CHAIN_PAGE_SIZE.
fn collect_pages<F>(max_pages: usize, mut fetch: F) -> Result<Vec<EsploraTx>, Error>
where
    F: FnMut(Option<&str>) -> Result<Vec<EsploraTx>, Error>,
{
    let mut txs = Vec::new();
    let mut last_seen: Option<String> = None;
    let mut pages = 0;

    loop {
        let page = fetch(last_seen.as_deref())?;
        pages += 1;

        let missing_status = page.iter().filter(|tx| tx.status.is_none()).count();
        if missing_status > 0 {
            debug!(pages, missing_status, "transactions without status counted as unconfirmed");
        }
        let confirmed = page.iter().filter(|tx| tx.is_confirmed()).count();
        let next = page
            .iter()
            .rev()
            .find(|tx| tx.is_confirmed())
            .map(|tx| tx.txid.clone());
        txs.extend(page);

        if confirmed < CHAIN_PAGE_SIZE {
            break;
        }
        if max_pages != 0 && pages >= max_pages {
            warn!(pages, "page limit reached, older history not analysed");
            break;
        }
        last_seen = next;
    }

    debug!(pages, transactions = txs.len(), "history fetched");
    Ok(txs)
}
