use alloy::primitives::U256;
use fastnum::{
    UD256, bint,
    decimal::{Context, RoundingMode, UnsignedDecimal},
};
use serde::Serializer;

/// Decimal type used for all normalized amounts.
pub type Amount = UD256;

/// Fixed-point to decimal converter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Converter {
    decimals: i32,
}

impl Converter {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals: decimals as i32,
        }
    }

    /// Scales raw integer `value` by `10^-decimals` without loss of precision.
    ///
    /// Returns `None` if the value does not fit into `N` 64-bit words.
    pub fn from_unsigned<const N: usize>(&self, value: U256) -> Option<UnsignedDecimal<N>> {
        let unscaled = bint::UInt::<N>::from_le_slice(value.as_le_slice())?;
        Some(UnsignedDecimal::<N>::from_parts(
            unscaled,
            -self.decimals,
            Context::default().with_rounding_mode(RoundingMode::Floor),
        ))
    }

    /// [`Self::from_unsigned`] into [`Amount`], which always fits a `U256`.
    pub fn to_amount(&self, value: U256) -> Amount {
        self.from_unsigned::<4>(value)
            .expect("Converter: U256 -> UInt::<4>")
    }
}

pub(crate) fn serialize_amount<S: Serializer>(value: &Amount, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

pub(crate) fn serialize_opt_amount<S: Serializer>(
    value: &Option<Amount>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => s.collect_str(v),
        None => s.serialize_none(),
    }
}
