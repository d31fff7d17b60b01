use std::str::FromStr;

use bitcoin::consensus::deserialize;
use bitcoin::{Network, Script, Transaction};
use thiserror::Error;

use crate::rawtx;
use crate::Address;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("invalid bitcoin address {0:?}: {1}")]
    Parse(String, bitcoin::util::address::Error),

    #[error("address {address} is for {found}, expected {expected}")]
    NetworkMismatch {
        address: String,
        found: Network,
        expected: Network,
    },
}

pub fn decode_txn(hex_str: &str) -> Result<Transaction, rawtx::Error> {
    let tx_bytes = hex::decode(hex_str.trim())?;
    let tx = deserialize(&tx_bytes)?;
    Ok(tx)
}

/// `None` for scripts with no standard address form (bare multisig,
/// OP_RETURN, non-standard).
pub fn script_to_addr(script: &Script, network: Network) -> Option<Address> {
    bitcoin::Address::from_script(script, network).map(|addr| Address::new(addr.to_string()))
}

/// Checks a user supplied address before it is sent to a block explorer.
/// The analysis itself treats addresses as opaque strings.
pub fn validate_address(address: &str, network: Network) -> Result<Address, AddressError> {
    let parsed = bitcoin::Address::from_str(address)
        .map_err(|e| AddressError::Parse(address.to_owned(), e))?;

    if !network_matches(parsed.network, network) {
        return Err(AddressError::NetworkMismatch {
            address: address.to_owned(),
            found: parsed.network,
            expected: network,
        });
    }

    Ok(Address::new(address))
}

// Testnet, signet and regtest share base58 prefixes and the tb hrp, so the
// parser reports them all as testnet. Only bcrt is specific to regtest.
fn network_matches(found: Network, expected: Network) -> bool {
    match (found, expected) {
        (a, b) if a == b => true,
        (Network::Testnet, Network::Signet) | (Network::Testnet, Network::Regtest) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    const TX_HEX: &str = "0200000001d79d2c25924044abb3692ed921dde899178db39897f3205074251f0e9f8e55710000000000ffffffff01f0e90f2401000000160014885ba915d7135763d23b3cbcb5a5486f9f6acb5900000000";

    #[test]
    fn test_decode_txn() {
        let tx = decode_txn(TX_HEX).unwrap();
        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.output.len(), 1);
        assert_eq!(tx.input[0].previous_output.vout, 0);
    }

    #[test]
    fn test_decode_txn_rejects_garbage() {
        assert!(matches!(decode_txn("zz"), Err(rawtx::Error::Hex(_))));
        assert!(matches!(decode_txn("0200"), Err(rawtx::Error::Consensus(_))));
    }

    #[test]
    fn test_script_to_addr() {
        let tx = decode_txn(TX_HEX).unwrap();
        let addr = script_to_addr(&tx.output[0].script_pubkey, Network::Bitcoin).unwrap();
        assert!(addr.as_str().starts_with("bc1q"));

        let addr = script_to_addr(&tx.output[0].script_pubkey, Network::Testnet).unwrap();
        assert!(addr.as_str().starts_with("tb1q"));

        assert_eq!(script_to_addr(&Script::new(), Network::Bitcoin), None);
    }

    #[test]
    fn test_validate_address() {
        let addr = validate_address("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2", Network::Bitcoin).unwrap();
        assert_eq!(addr.as_str(), "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2");

        assert!(validate_address("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq", Network::Bitcoin).is_ok());
        assert!(matches!(
            validate_address("not-an-address", Network::Bitcoin),
            Err(AddressError::Parse(..))
        ));
        assert!(matches!(
            validate_address("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2", Network::Testnet),
            Err(AddressError::NetworkMismatch { .. })
        ));
    }

    #[test]
    fn test_testnet_addresses_accepted_on_signet() {
        let tb = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
        assert!(validate_address(tb, Network::Testnet).is_ok());
        assert!(validate_address(tb, Network::Signet).is_ok());
        assert!(validate_address(tb, Network::Bitcoin).is_err());
    }
}
