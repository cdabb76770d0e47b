//! Transaction size and fee arithmetic
//!
//! All amounts are satoshis held in `u64` and all arithmetic is checked:
//! an overflow is reported as `None` rather than wrapping, so callers can
//! treat it as an unaffordable spend.
//!
//! The size estimate approximates a single-signature P2WPKH transaction.
//! It is a deliberate simplification, not a byte-exact serializer.
//!
//! ```
//! use wallet_sync_common::math::{estimate_transaction_size, calculate_fee};
//!
//! assert_eq!(estimate_transaction_size(1, 1), 109);
//! assert_eq!(calculate_fee(2, 2, 10), Some(2_080));
//! ```

/// Fixed transaction overhead in bytes
pub const TX_OVERHEAD_BYTES: u32 = 10;

/// Approximate size of a P2WPKH input in bytes
pub const INPUT_SIZE_BYTES: u32 = 68;

/// Approximate size of a P2WPKH output in bytes
pub const OUTPUT_SIZE_BYTES: u32 = 31;

/// Outputs assumed by fee-aware selection: destination and change
pub const DEFAULT_OUTPUT_COUNT: u32 = 2;

/// Estimates the size of a transaction from its input and output counts
///
/// `size = 10 + 68 * inputs + 31 * outputs`, saturating at `u32::MAX`.
pub fn estimate_transaction_size(num_inputs: u32, num_outputs: u32) -> u32 {
    TX_OVERHEAD_BYTES
        .saturating_add(INPUT_SIZE_BYTES.saturating_mul(num_inputs))
        .saturating_add(OUTPUT_SIZE_BYTES.saturating_mul(num_outputs))
}

/// Calculates the fee for a transaction with the given shape
///
/// # Returns
/// * `Some(fee)` in satoshis, or `None` if the product overflows `u64`
pub fn calculate_fee(num_inputs: u32, num_outputs: u32, fee_rate_sat_per_byte: u64) -> Option<u64> {
    fee_rate_sat_per_byte.checked_mul(u64::from(estimate_transaction_size(num_inputs, num_outputs)))
}

/// Sum of values, or `None` on overflow
pub fn checked_sum<I>(values: I) -> Option<u64>
where
    I: IntoIterator<Item = u64>,
{
    values
        .into_iter()
        .try_fold(0u64, |acc, value| acc.checked_add(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_transaction_size() {
        assert_eq!(estimate_transaction_size(1, 1), 109);
        assert_eq!(estimate_transaction_size(2, 2), 208);
        assert_eq!(estimate_transaction_size(0, 0), TX_OVERHEAD_BYTES);
        assert_eq!(estimate_transaction_size(u32::MAX, 2), u32::MAX);
    }

    #[test]
    fn test_calculate_fee() {
        assert_eq!(calculate_fee(1, 2, 10), Some(1_400));
        assert_eq!(calculate_fee(3, 2, 100), Some(27_600));
        assert_eq!(calculate_fee(1, 2, 0), Some(0));
        assert_eq!(calculate_fee(1, 2, u64::MAX), None);
    }

    #[test]
    fn test_checked_sum() {
        assert_eq!(checked_sum(vec![1, 2, 3]), Some(6));
        assert_eq!(checked_sum(Vec::new()), Some(0));
        assert_eq!(checked_sum(vec![u64::MAX, 1]), None);
    }
}
