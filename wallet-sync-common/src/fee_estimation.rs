//! Fee rate derivation for Bitcoin spends
//!
//! The query endpoint reports current fee percentiles in millisatoshi per
//! virtual byte. This module turns them into the integer
//! satoshi-per-byte rate consumed by fee-aware UTXO selection, clamped to
//! network-specific bounds.

use bitcoin::Network;

/// Millisatoshis per satoshi
pub const MILLISATS_PER_SAT: u64 = 1_000;

/// Network-specific fee rate bounds (in sat/byte)
pub mod defaults {
    use bitcoin::Network;

    /// Minimum reasonable fee rate by network
    ///
    /// One sat/byte is the relay floor on every supported network.
    pub fn min_reasonable_fee_rate(_network: Network) -> u64 {
        1
    }

    /// Maximum reasonable fee rate by network
    pub fn max_reasonable_fee_rate(network: Network) -> u64 {
        match network {
            Network::Bitcoin => 2_000,
            Network::Regtest => 100,
            _ => 1_000,
        }
    }
}

/// Derive a sat/byte fee rate from the endpoint's fee percentiles
///
/// Takes the median percentile, converts it from millisatoshi/vbyte to
/// satoshi/byte rounding up, and clamps the result to the network bounds.
/// An empty percentile set (typical on regtest) yields the minimum.
pub fn fee_rate_from_percentiles(millisat_per_vbyte: &[u64], network: Network) -> u64 {
    let min_fee = defaults::min_reasonable_fee_rate(network);

    if millisat_per_vbyte.is_empty() {
        return min_fee;
    }

    let mut sorted = millisat_per_vbyte.to_vec();
    sorted.sort_unstable();
    let median = sorted[sorted.len() / 2];

    let sat_per_byte = median / MILLISATS_PER_SAT + u64::from(median % MILLISATS_PER_SAT != 0);
    sanitize_fee_rate(sat_per_byte, network)
}

/// Apply minimum and maximum bounds to a fee rate
pub fn sanitize_fee_rate(fee_rate: u64, network: Network) -> u64 {
    let min_fee = defaults::min_reasonable_fee_rate(network);
    let max_fee = defaults::max_reasonable_fee_rate(network);

    if fee_rate < min_fee {
        log::warn!("Fee rate {} too low, using minimum {}", fee_rate, min_fee);
        return min_fee;
    }

    if fee_rate > max_fee {
        log::warn!("Fee rate {} too high, capping at {}", fee_rate, max_fee);
        return max_fee;
    }

    fee_rate
}
