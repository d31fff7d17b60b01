//! Builds analysis transactions from consensus-encoded transactions. Each
//! input is resolved against the transaction that created the output it
//! spends.

use std::collections::HashMap;

use bitcoin::{Network, Txid};
use thiserror::Error;

use crate::utils::{decode_txn, script_to_addr};
use crate::{PrevOut, Transaction, Vin};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid transaction hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid transaction encoding: {0}")]
    Consensus(#[from] bitcoin::consensus::encode::Error),
}

/// Inputs spending outputs we have no previous transaction for, coinbase
/// inputs, and non-standard scripts all come out without an address.
pub fn transaction_from_raw(
    txn: &bitcoin::Transaction,
    prev_txns: &HashMap<Txid, bitcoin::Transaction>,
    network: Network,
) -> Transaction {
    let vin = txn
        .input
        .iter()
        .map(|input| {
            if input.previous_output.is_null() {
                return Vin::unresolved();
            }
            //for every outpoint (txid, vout) find the funding transaction
            //and take the script of the output at vout
            let prev_output = prev_txns
                .get(&input.previous_output.txid)
                .and_then(|prev| prev.output.get(input.previous_output.vout as usize));

            match prev_output {
                Some(output) => Vin {
                    prevout: Some(PrevOut {
                        address: script_to_addr(&output.script_pubkey, network),
                    }),
                },
                None => Vin::unresolved(),
            }
        })
        .collect();

    Transaction {
        txid: txn.txid().to_string(),
        vin,
    }
}

/// Decodes `tx_hex` and the hex of the transactions it spends from.
pub fn decode_with_prevouts<S: AsRef<str>>(
    tx_hex: &str,
    prev_hexes: &[S],
    network: Network,
) -> Result<Transaction, Error> {
    let txn = decode_txn(tx_hex)?;

    let mut prev_txns = HashMap::new();
    for prev_hex in prev_hexes {
        let prev = decode_txn(prev_hex.as_ref())?;
        prev_txns.insert(prev.txid(), prev);
    }

    Ok(transaction_from_raw(&txn, &prev_txns, network))
}

#[cfg(test)]
mod tests {

    use std::str::FromStr;

    use bitcoin::consensus::encode::serialize_hex;
    use bitcoin::{OutPoint, Script, TxIn, TxOut, Witness};

    use super::*;
    use crate::{analyze_merges, Address};

    const ALICE: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";
    const BOB: &str = "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy";
    const CAROL: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

    fn script(addr: &str) -> Script {
        bitcoin::Address::from_str(addr).unwrap().script_pubkey()
    }

    fn funding_tx(scripts: Vec<Script>, lock_time: u32) -> bitcoin::Transaction {
        bitcoin::Transaction {
            version: 2,
            lock_time,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: Script::new(),
                sequence: 0xFFFFFFFF,
                witness: Witness::default(),
            }],
            output: scripts
                .into_iter()
                .map(|script_pubkey| TxOut {
                    value: 50_000,
                    script_pubkey,
                })
                .collect(),
        }
    }

    fn spending_tx(outpoints: Vec<OutPoint>) -> bitcoin::Transaction {
        bitcoin::Transaction {
            version: 2,
            lock_time: 0,
            input: outpoints
                .into_iter()
                .map(|previous_output| TxIn {
                    previous_output,
                    script_sig: Script::new(),
                    sequence: 0xFFFFFFFF,
                    witness: Witness::default(),
                })
                .collect(),
            output: vec![TxOut {
                value: 90_000,
                script_pubkey: script(CAROL),
            }],
        }
    }

    #[test]
    fn test_resolves_inputs_through_prev_txns() {
        let prev_a = funding_tx(vec![script(CAROL), script(ALICE)], 1);
        let prev_b = funding_tx(vec![script(BOB)], 2);
        let tx = spending_tx(vec![
            OutPoint::new(prev_a.txid(), 1),
            OutPoint::new(prev_b.txid(), 0),
        ]);

        let mut prev_txns = HashMap::new();
        prev_txns.insert(prev_a.txid(), prev_a);
        prev_txns.insert(prev_b.txid(), prev_b);

        let resolved = transaction_from_raw(&tx, &prev_txns, Network::Bitcoin);
        assert_eq!(resolved.txid, tx.txid().to_string());
        assert_eq!(resolved.vin[0].address(), Some(&Address::from(ALICE)));
        assert_eq!(resolved.vin[1].address(), Some(&Address::from(BOB)));

        let merges = analyze_merges(&[resolved], &Address::from(ALICE));
        assert_eq!(merges.len(), 1);
        assert_eq!(merges[0].count, 2);
    }

    #[test]
    fn test_unknown_outpoints_are_unresolved() {
        let prev = funding_tx(vec![script(ALICE)], 1);
        let tx = spending_tx(vec![
            OutPoint::new(prev.txid(), 0),
            // vout past the end of the funding transaction
            OutPoint::new(prev.txid(), 7),
            OutPoint::null(),
        ]);

        let mut prev_txns = HashMap::new();
        prev_txns.insert(prev.txid(), prev);

        let resolved = transaction_from_raw(&tx, &prev_txns, Network::Bitcoin);
        assert_eq!(resolved.vin.len(), 3);
        assert!(resolved.vin[0].address().is_some());
        assert_eq!(resolved.vin[1], Vin::unresolved());
        assert_eq!(resolved.vin[2], Vin::unresolved());
        assert!(analyze_merges(&[resolved], &Address::from(ALICE)).is_empty());
    }

    #[test]
    fn test_non_standard_script_has_no_address() {
        let prev = funding_tx(vec![Script::new(), script(ALICE)], 3);
        let tx = spending_tx(vec![OutPoint::new(prev.txid(), 0), OutPoint::new(prev.txid(), 1)]);

        let mut prev_txns = HashMap::new();
        prev_txns.insert(prev.txid(), prev);

        let resolved = transaction_from_raw(&tx, &prev_txns, Network::Bitcoin);
        assert_eq!(resolved.vin[0].prevout, Some(PrevOut { address: None }));
        assert!(analyze_merges(&[resolved], &Address::from(ALICE)).is_empty());
    }

    #[test]
    fn test_decode_with_prevouts() {
        let prev_a = funding_tx(vec![script(ALICE)], 1);
        let prev_b = funding_tx(vec![script(CAROL)], 2);
        let tx = spending_tx(vec![
            OutPoint::new(prev_a.txid(), 0),
            OutPoint::new(prev_b.txid(), 0),
        ]);

        let prev_hexes = vec![serialize_hex(&prev_a), serialize_hex(&prev_b)];
        let resolved = decode_with_prevouts(&serialize_hex(&tx), &prev_hexes, Network::Bitcoin).unwrap();

        let merges = analyze_merges(&[resolved], &Address::from(CAROL));
        assert_eq!(merges.len(), 1);
        assert!(merges[0].addresses.contains(&Address::from(ALICE)));
    }

    #[test]
    fn test_decode_with_bad_prev_hex() {
        let tx = spending_tx(vec![OutPoint::null()]);
        let result = decode_with_prevouts(&serialize_hex(&tx), &["abc"], Network::Bitcoin);
        assert!(matches!(result, Err(Error::Hex(_))));
    }
}
