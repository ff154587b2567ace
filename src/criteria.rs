//! Payment Match Criteria
//!
//! The (sender, receiver, amount) triple a monitoring session scans for, plus
//! the wei/native-unit arithmetic backing it. Amounts are integer wei
//! throughout matching; `rust_decimal` conversions exist only for display.

use alloy::primitives::{Address, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::LazyLock;

use crate::rpc::CandidateTransaction;

/// Decimal places of the native asset
pub const NATIVE_DECIMALS: u32 = 18;

/// Wei per whole native-asset unit (10^18)
static WEI_PER_NATIVE: LazyLock<Decimal> =
    LazyLock::new(|| Decimal::new(1_000_000_000_000_000_000, 0));

/// Convert a wei amount to whole native-asset units
///
/// Returns `None` when the value exceeds the decimal type's 96-bit mantissa
/// (far beyond any realistic transfer).
pub fn wei_to_native(value: U256) -> Option<Decimal> {
    let wei = u128::try_from(value).ok()?;
    let wei = i128::try_from(wei).ok()?;
    Decimal::try_from_i128_with_scale(wei, NATIVE_DECIMALS)
        .ok()
        .map(|d| d.normalize())
}

/// Convert a whole native-asset amount to wei
///
/// Negative amounts and amounts with sub-wei precision return `None`.
pub fn native_to_wei(amount: Decimal) -> Option<U256> {
    if amount.is_sign_negative() {
        return None;
    }
    let scaled = amount.checked_mul(*WEI_PER_NATIVE)?;
    if scaled.fract() != Decimal::ZERO {
        return None;
    }
    scaled.to_u128().map(U256::from)
}

/// The expected transfer a monitoring session matches pending transactions
/// against
///
/// Immutable once a session starts. Addresses are canonical 20-byte values,
/// so comparisons are case-insensitive by construction; parse mixed-case hex
/// with `Address::parse_checksummed` or plain `str::parse`. Direction is
/// strict: only `from == sender` and `to == receiver` counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCriteria {
    /// Expected sender address
    pub sender: Address,
    /// Expected receiver address
    pub receiver: Address,
    /// Expected transfer value in wei
    pub amount: U256,
    /// Accepted deviation from `amount`, in wei (zero = exact match)
    pub tolerance: U256,
}

impl MatchCriteria {
    /// Create criteria requiring an exact amount match
    pub fn new(sender: Address, receiver: Address, amount: U256) -> Self {
        Self {
            sender,
            receiver,
            amount,
            tolerance: U256::ZERO,
        }
    }

    /// Accept values within `tolerance` wei of the target amount
    pub fn with_tolerance(mut self, tolerance: U256) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Check whether a value satisfies the amount requirement
    pub fn amount_matches(&self, value: U256) -> bool {
        value.abs_diff(self.amount) <= self.tolerance
    }

    /// Check whether a pending transaction satisfies all three criteria
    pub fn matches(&self, tx: &CandidateTransaction) -> bool {
        tx.from == self.sender && tx.to == Some(self.receiver) && self.amount_matches(tx.value)
    }
}
