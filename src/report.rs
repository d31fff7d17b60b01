use std::fmt;

use serde::Serialize;

use crate::{analyze_merges, Address, MergeEvent, Transaction};

/// Merge analysis of one address history, ready to print.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub address: Address,
    pub transactions_scanned: usize,
    pub merges: Vec<MergeEvent>,
}

impl Report {
    pub fn new(address: Address, txns: &[Transaction]) -> Self {
        let merges = analyze_merges(txns, &address);
        Report {
            address,
            transactions_scanned: txns.len(),
            merges,
        }
    }

    pub fn has_merges(&self) -> bool {
        !self.merges.is_empty()
    }

    /// One line per merge. `verbose` also lists the merged addresses, the
    /// analysed one marked with `*`.
    pub fn render_text(&self, verbose: bool) -> String {
        TextReport {
            report: self,
            verbose,
        }
        .to_string()
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = TextReport {
            report: self,
            verbose: false,
        };
        fmt::Display::fmt(&text, f)
    }
}

struct TextReport<'a> {
    report: &'a Report,
    verbose: bool,
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        writeln!(
            f,
            "Checking address {} for UTXO merges ({} transactions scanned)",
            report.address, report.transactions_scanned
        )?;

        if !report.has_merges() {
            return writeln!(f, "No input merges found. Good privacy!");
        }

        let plural = if report.merges.len() == 1 { "" } else { "s" };
        writeln!(f, "Found {} input merge{}:", report.merges.len(), plural)?;
        for merge in report.merges.iter() {
            writeln!(f, " - TXID: {}, inputs: {} addresses", merge.txid, merge.count)?;
            if self.verbose {
                for addr in merge.addresses.iter() {
                    let mark = if *addr == report.address { '*' } else { ' ' };
                    writeln!(f, "     {} {}", mark, addr)?;
                }
            }
        }
        Ok(())
    }
}
