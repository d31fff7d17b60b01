//! Detects input merges for a single Bitcoin address: transactions that spend
//! the address's UTXOs together with UTXOs of other addresses, linking them
//! to a common owner.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod common_input_ownership;
pub mod config;
pub mod esplora;
pub mod rawtx;
pub mod report;
pub mod telemetry;
pub mod utils;

pub use common_input_ownership::{analyze_merges, check_common_input_ownership};
pub use esplora::{EsploraClient, TransactionSource};
pub use report::Report;

/// Opaque owner of an output script. Never validated by the analysis.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Address(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_owned())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

/// The output spent by an input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrevOut {
    /// `None` when the script has no standard address encoding.
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vin {
    pub prevout: Option<PrevOut>,
}

impl Vin {
    pub fn from_address(address: impl Into<Address>) -> Self {
        Vin {
            prevout: Some(PrevOut {
                address: Some(address.into()),
            }),
        }
    }

    /// An input whose previous output could not be resolved to an address.
    pub fn unresolved() -> Self {
        Vin { prevout: None }
    }

    pub fn address(&self) -> Option<&Address> {
        self.prevout.as_ref().and_then(|p| p.address.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub txid: String,
    pub vin: Vec<Vin>,
}

/// A transaction whose inputs spend from the target and at least one other
/// address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeEvent {
    pub txid: String,
    pub addresses: BTreeSet<Address>,
    pub count: usize,
}
