use std::collections::BTreeSet;

use crate::{Address, MergeEvent, Transaction};

/// Distinct addresses spent by the transaction. Inputs without a resolvable
/// address are skipped.
pub fn input_addresses(txn: &Transaction) -> BTreeSet<Address> {
    txn.vin
        .iter()
        .filter_map(|input| input.address())
        .cloned()
        .collect()
}

/// Returns a merge event when `target` is spent alongside at least one other
/// address in the same input set.
pub fn check_common_input_ownership(txn: &Transaction, target: &Address) -> Option<MergeEvent> {
    let addresses = input_addresses(txn);

    if addresses.len() < 2 || !addresses.contains(target) {
        return None;
    }

    Some(MergeEvent {
        txid: txn.txid.clone(),
        count: addresses.len(),
        addresses,
    })
}

/// Runs the common-input-ownership check over an address history, keeping
/// the order of `txns`.
pub fn analyze_merges(txns: &[Transaction], target: &Address) -> Vec<MergeEvent> {
    txns.iter()
        .filter_map(|txn| check_common_input_ownership(txn, target))
        .collect()
}
