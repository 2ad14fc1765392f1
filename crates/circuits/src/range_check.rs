//! Range check gadgets for preventing field arithmetic wrap-around.
//!
//! Grades, thresholds and question counts are small integers, but in the
//! circuit they are field elements: `a - b` with `b > a` wraps to a value
//! near the modulus. Comparisons therefore first bound both operands to
//! `RANGE_BITS` and then inspect the bits of a shifted difference.

use ark_ff::PrimeField;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

/// Number of bits for range checks (32-bit values)
///
/// `100 * 2^test_height` stays far below this for every supported height.
pub const RANGE_BITS: usize = 32;

/// Enforce that a field element fits in `num_bits` bits.
///
/// This decomposes the value into bits and verifies each bit is 0 or 1.
/// If the value is >= 2^num_bits, this constraint cannot be satisfied.
pub fn enforce_range<F: PrimeField>(
    _cs: ConstraintSystemRef<F>,
    value: &FpVar<F>,
    num_bits: usize,
) -> Result<(), SynthesisError> {
    let value_bits = value.to_bits_le()?;

    for bit in value_bits.iter().skip(num_bits) {
        bit.enforce_equal(&Boolean::FALSE)?;
    }

    Ok(())
}

/// Enforce that a value is non-negative and fits in 32 bits.
pub fn enforce_u32_range<F: PrimeField>(
    cs: ConstraintSystemRef<F>,
    value: &FpVar<F>,
) -> Result<(), SynthesisError> {
    enforce_range(cs, value, RANGE_BITS)
}

/// Enforce that a >= b (non-negative difference).
///
/// This is done by checking that (a - b) fits in 32 bits.
/// If b > a, then (a - b) would wrap around to a huge number that doesn't fit.
pub fn enforce_geq<F: PrimeField>(
    cs: ConstraintSystemRef<F>,
    a: &FpVar<F>,
    b: &FpVar<F>,
) -> Result<(), SynthesisError> {
    let diff = a - b;
    enforce_u32_range(cs, &diff)
}

/// Return a boolean that is true iff a >= b.
///
/// Both operands are constrained to 32 bits. Then `a - b + 2^32` lies in
/// `[1, 2^33)` and its bit 32 is set exactly when `a >= b`.
pub fn is_geq<F: PrimeField>(
    cs: ConstraintSystemRef<F>,
    a: &FpVar<F>,
    b: &FpVar<F>,
) -> Result<Boolean<F>, SynthesisError> {
    enforce_u32_range(cs.clone(), a)?;
    enforce_u32_range(cs.clone(), b)?;

    let offset = FpVar::constant(F::from(1u64 << RANGE_BITS));
    let shifted = a - b + offset;
    let bits = shifted.to_bits_le()?;
    for bit in bits.iter().skip(RANGE_BITS + 1) {
        bit.enforce_equal(&Boolean::FALSE)?;
    }

    Ok(bits[RANGE_BITS].clone())
}
