use alloy_primitives::{ruint::UintTryTo, U256};
use serde::{Deserialize, Serialize};

#[inline]
fn try_to_u128(value: U256) -> Option<u128> {
    value.uint_try_to().ok()
}

#[inline]
fn widen(value: u128) -> U256 {
    U256::from_limbs([value as u64, (value >> 64) as u64, 0, 0])
}

/// Token amount with 18 fractional decimals, stored as a raw `u128`.
///
/// All conversion between the chain's integer base-unit representation and
/// ledger amounts goes through [`Amount::from_base_units`] and
/// [`Amount::to_base_units`]; nothing else in the codebase rescales by a
/// token's decimal exponent.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const ONE: Amount = Amount(Self::SCALE);
    pub const MAX: Amount = Amount(u128::MAX);
    pub const SCALE: u128 = 1_000_000_000_000_000_000;
    pub const DECIMALS: u8 = 18;

    /// Convert an on-chain base-unit value into a ledger amount, rescaling
    /// from the token's declared decimal exponent. Excess precision is
    /// truncated toward zero. Returns `None` if the rescaled value does not
    /// fit in a `u128`.
    pub fn from_base_units(value: U256, token_decimals: u8) -> Option<Self> {
        let rescaled = if token_decimals <= Self::DECIMALS {
            let factor = U256::from(10u64).pow(U256::from(Self::DECIMALS - token_decimals));
            value.checked_mul(factor)?
        } else {
            let divisor = U256::from(10u64).pow(U256::from(token_decimals - Self::DECIMALS));
            value / divisor
        };
        Some(Self(try_to_u128(rescaled)?))
    }

    /// Convert back to base units for on-chain consumption. Truncates any
    /// precision the token cannot represent.
    pub fn to_base_units(&self, token_decimals: u8) -> U256 {
        let value = widen(self.0);
        if token_decimals <= Self::DECIMALS {
            let divisor = U256::from(10u64).pow(U256::from(Self::DECIMALS - token_decimals));
            value / divisor
        } else {
            let factor = U256::from(10u64).pow(U256::from(token_decimals - Self::DECIMALS));
            value.saturating_mul(factor)
        }
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        Some(Self(self.0.checked_add(rhs.0)?))
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        Some(Self(self.0.checked_sub(rhs.0)?))
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Apply a signed raw delta, as used by ledger entries. `None` when the
    /// result would be negative or overflow.
    pub fn checked_add_signed(self, delta: i128) -> Option<Self> {
        if delta >= 0 {
            self.checked_add(Self(delta as u128))
        } else {
            self.checked_sub(Self(delta.unsigned_abs()))
        }
    }

    /// Raw value as a signed delta. `None` for values above `i128::MAX`.
    pub fn to_i128_raw(&self) -> Option<i128> {
        i128::try_from(self.0).ok()
    }

    pub fn from_u128_with_scale(value: u128, scale: u8) -> Self {
        let result = widen(value) * widen(Self::SCALE) / U256::from(10u64).pow(U256::from(scale));
        Self(try_to_u128(result).expect("scaled literal fits u128"))
    }

    #[inline]
    pub fn from_u128_raw(value: u128) -> Self {
        Self(value)
    }

    #[inline]
    pub fn to_u128_raw(&self) -> u128 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_less_than(&self, other: &Self) -> bool {
        self.0 < other.0
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let integral = self.0 / Self::SCALE;
        let fraction = self.0 % Self::SCALE;

        let frac_str = format!("{:0>width$}", fraction, width = Self::DECIMALS as usize);
        let final_frac = match f.precision() {
            Some(p) => &frac_str[0..p.min(Self::DECIMALS as usize)],
            None => {
                let trimmed = frac_str.trim_end_matches('0');
                if trimmed.is_empty() { "0" } else { trimmed }
            }
        };

        write!(f, "{}.{}", integral, final_frac)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_base_unit_conversion() {
        // 18-decimal token: raw value passes through unchanged
        assert_eq!(
            Amount::from_base_units(U256::from(Amount::SCALE), 18),
            Some(Amount::ONE)
        );

        // 6-decimal token (USDC-like): 1_000_000 base units == 1.0
        assert_eq!(
            Amount::from_base_units(U256::from(1_000_000u64), 6),
            Some(Amount::ONE)
        );

        // 24-decimal token: excess precision truncates toward zero
        let one_and_dust = U256::from(10u64).pow(U256::from(24u64)) + U256::from(999_999u64);
        assert_eq!(Amount::from_base_units(one_and_dust, 24), Some(Amount::ONE));

        // does not fit u128
        assert_eq!(Amount::from_base_units(U256::MAX, 18), None);
    }

    #[test]
    fn test_base_unit_round_trip() {
        let amount = Amount::from_u128_with_scale(5_25, 2);
        assert_eq!(amount.to_base_units(6), U256::from(5_250_000u64));
        assert_eq!(
            Amount::from_base_units(amount.to_base_units(6), 6),
            Some(amount)
        );
    }

    #[test]
    fn test_signed_delta() {
        let one = Amount::ONE;
        assert_eq!(
            one.checked_add_signed(Amount::ONE.to_i128_raw().unwrap()),
            Some(Amount::from_u128_with_scale(2, 0))
        );
        assert_eq!(one.checked_add_signed(-(Amount::SCALE as i128)), Some(Amount::ZERO));
        // would go negative
        assert_eq!(Amount::ZERO.checked_add_signed(-1), None);
    }

    #[test]
    fn test_scale_literals() {
        assert_eq!(Amount::from_u128_with_scale(1_00, 2), Amount::ONE);
        assert_eq!(Amount::from_u128_with_scale(1_000_000, 6), Amount::ONE);
        assert_eq!(
            Amount::from_u128_with_scale(1, 6),
            Amount::from_u128_with_scale(1_000, 9)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Amount::ONE), "1.0");
        assert_eq!(format!("{}", Amount::from_u128_with_scale(2_5, 1)), "2.5");
        assert_eq!(format!("{:.2}", Amount::from_u128_with_scale(1_234, 3)), "1.23");
    }
}
