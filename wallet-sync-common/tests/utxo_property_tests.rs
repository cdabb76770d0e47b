//! Property-based tests for UTXO selection
//!
//! Values are generated as `u32` so sums never approach `u64::MAX`.


use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use test_utils::utxo;
use wallet_sync_common::math::calculate_fee;
use wallet_sync_common::types::Utxo;
use wallet_sync_common::utxo_selection::{select_utxos, select_utxos_with_fee, SelectionError};

fn candidates(values: &[u32]) -> Vec<Utxo> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| utxo(i as u8, u64::from(*value), 10))
        .collect()
}

fn total(values: &[u32]) -> u64 {
    values.iter().map(|v| u64::from(*v)).sum()
}

#[quickcheck]
fn selection_covers_amount(values: Vec<u32>, amount: u64) -> TestResult {
    if values.is_empty() || values.len() > 255 {
        return TestResult::discard();
    }
    let amount = amount % (total(&values) + 1);
    let utxos = candidates(&values);

    match select_utxos(&utxos, amount) {
        Ok(result) => TestResult::from_bool(
            result.total_input_value >= amount
                && result.change_amount == result.total_input_value - amount
                && result.total_input_value == result.selected_utxos.iter().map(|u| u.value).sum::<u64>(),
        ),
        Err(_) => TestResult::failed(),
    }
}

#[quickcheck]
fn selection_is_largest_first(values: Vec<u32>, amount: u64) -> TestResult {
    if values.is_empty() || values.len() > 255 {
        return TestResult::discard();
    }
    let amount = amount % (total(&values) + 1);
    let utxos = candidates(&values);

    let Ok(result) = select_utxos(&utxos, amount) else {
        return TestResult::failed();
    };

    let mut sorted = utxos.clone();
    sorted.sort_by(|a, b| b.value.cmp(&a.value));
    TestResult::from_bool(result.selected_utxos[..] == sorted[..result.selected_utxos.len()])
}

#[quickcheck]
fn selection_fails_above_total(values: Vec<u32>, excess: u32) -> TestResult {
    if values.len() > 255 {
        return TestResult::discard();
    }
    let utxos = candidates(&values);
    let amount = total(&values) + u64::from(excess) + 1;

    let expected = if values.is_empty() {
        Err(SelectionError::NoUtxosAvailable)
    } else {
        Err(SelectionError::InsufficientFunds {
            available: total(&values),
            required: amount,
        })
    };
    TestResult::from_bool(select_utxos(&utxos, amount) == expected)
}

#[quickcheck]
fn fee_selection_covers_amount_and_fee(values: Vec<u32>, amount: u32, fee_rate: u8) -> TestResult {
    if values.is_empty() || values.len() > 255 {
        return TestResult::discard();
    }
    let utxos = candidates(&values);
    let amount = u64::from(amount);
    let fee_rate = u64::from(fee_rate);

    match select_utxos_with_fee(&utxos, amount, fee_rate) {
        Ok(result) => {
            let fee = calculate_fee(result.selected_utxos.len() as u32, 2, fee_rate).unwrap();
            TestResult::from_bool(
                result.total_input_value >= amount + fee
                    && result.change_amount == result.total_input_value - amount - fee,
            )
        }
        Err(SelectionError::InsufficientFunds { available, required }) => {
            // even every candidate cannot pay for itself
            let fee_all = calculate_fee(values.len() as u32, 2, fee_rate).unwrap();
            TestResult::from_bool(available == total(&values) && available < amount + fee_all && required == amount + fee_all)
        }
        Err(SelectionError::NoUtxosAvailable) => TestResult::failed(),
    }
}
