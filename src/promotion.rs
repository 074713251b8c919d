//! The promotion engine (component B): a precomputed, symmetric 11x11
//! lookup table plus the value-driven "smallest common type" inference used
//! when a tensor is built from literal data without an explicit dtype.

use crate::dtype::{DType, Scalar, ALL_DTYPES};
use crate::error::{Error, Result};
use std::sync::OnceLock;

const N: usize = 11;

fn index(d: DType) -> usize {
    ALL_DTYPES.iter().position(|x| *x == d).expect("DType is always one of ALL_DTYPES")
}

/// Encodes rules 1-7 of §4.B for a single pair. The full table is just this
/// function applied to every pair and cached; `promote` never calls it
/// directly so a bad entry can never reach a caller without first tripping
/// [`validate_table`].
fn promote_raw(a: DType, b: DType) -> DType {
    if a == b {
        return a;
    }
    if a == DType::Bool {
        return b;
    }
    if b == DType::Bool {
        return a;
    }

    let (ma, mb) = (a.meta(), b.meta());

    if a.is_integer() && b.is_integer() {
        if ma.signed == mb.signed {
            // Rule 3: same-signed integers of different widths -> the wider.
            return if ma.byte_size >= mb.byte_size { a } else { b };
        }
        // Rule 4/5: mixed signedness. Find the narrowest signed integer type
        // whose range is a superset of both operands'; fall back to float64
        // if none exists (any uint64 mixture lands here).
        let (lo_a, hi_a) = ma.int_range.unwrap();
        let (lo_b, hi_b) = mb.int_range.unwrap();
        let lo = lo_a.min(lo_b);
        let hi = hi_a.max(hi_b);
        for candidate in [DType::I16, DType::I32, DType::I64] {
            let (clo, chi) = candidate.meta().int_range.unwrap();
            if lo >= clo && hi <= chi {
                return candidate;
            }
        }
        return DType::F64;
    }

    // Rule 6/7: at least one side is a float.
    let (int_side, float_side) = if a.is_float() { (b, a) } else { (a, b) };
    if !int_side.is_float() {
        // integer (or bool, already handled above) + float
        if float_side == DType::F64 {
            return DType::F64;
        }
        // float_side == F32
        return if int_side.byte_size() <= 2 { DType::F32 } else { DType::F64 };
    }
    // Rule 7: float32 + float64 -> float64 (the only remaining case, since
    // a == b and the bool cases were already handled).
    DType::F64
}

type Table = [[DType; N]; N];

fn build_table() -> Table {
    let mut table = [[DType::Bool; N]; N];
    for (i, a) in ALL_DTYPES.iter().enumerate() {
        for (j, b) in ALL_DTYPES.iter().enumerate() {
            table[i][j] = promote_raw(*a, *b);
        }
    }
    table
}

fn validate_table(table: &Table) -> Result<()> {
    for (i, a) in ALL_DTYPES.iter().enumerate() {
        for (j, b) in ALL_DTYPES.iter().enumerate() {
            if table[i][j] != table[j][i] {
                return Err(Error::PromotionTableInvalid(format!(
                    "asymmetric entry: promote({a:?}, {b:?}) = {:?} but promote({b:?}, {a:?}) = {:?}",
                    table[i][j], table[j][i]
                )));
            }
        }
        if table[i][i] != *a {
            return Err(Error::PromotionTableInvalid(format!(
                "promote({a:?}, {a:?}) = {:?}, expected {a:?}",
                table[i][i]
            )));
        }
    }
    Ok(())
}

fn table() -> &'static Table {
    static TABLE: OnceLock<Table> = OnceLock::new();
    TABLE.get_or_init(|| {
        let table = build_table();
        // A broken table is a fatal initialization error: every caller of
        // `promote` trusts the table without re-checking its invariants.
        validate_table(&table).expect("promotion table failed startup validation");
        table
    })
}

/// `promote(a, b)`, §4.B.
pub fn promote(a: DType, b: DType) -> DType {
    table()[index(a)][index(b)]
}

/// `promote_many`, §4.B: left fold over the list, erroring on empty input.
pub fn promote_many(dtypes: &[DType]) -> Result<DType> {
    let mut iter = dtypes.iter().copied();
    let first = iter.next().ok_or(Error::OpRequiresAtLeastOneTensor { op: "promote_many" })?;
    Ok(iter.fold(first, promote))
}

/// `can_promote`, §4.B: always true in this system — every pair has a
/// well-defined entry in the table.
pub fn can_promote(_a: DType, _b: DType) -> bool {
    true
}

/// Smallest signed integer dtype (from `I8` up to `I64`) whose range holds
/// `v`, or `None` if `v` exceeds even `I64`'s range (only possible for very
/// large finite doubles).
fn smallest_signed_int_for(v: f64) -> Option<DType> {
    for d in [DType::I8, DType::I16, DType::I32, DType::I64] {
        let (lo, hi) = d.meta().int_range.unwrap();
        if v >= lo as f64 && v <= hi as f64 {
            return Some(d);
        }
    }
    None
}

/// Per-value smallest holder for a plain number literal, §4.B's
/// value-inference sub-algorithm.
fn smallest_dtype_for_number(v: f64) -> DType {
    if !v.is_finite() {
        return DType::F32;
    }
    if v.fract() == 0.0 {
        if let Some(d) = smallest_signed_int_for(v) {
            return d;
        }
        if v >= 0.0 && v <= u64::MAX as f64 {
            return DType::U64;
        }
    }
    let as_f32 = v as f32;
    if (as_f32 as f64) == v {
        DType::F32
    } else {
        DType::F64
    }
}

/// Smallest holder for one literal, before folding with its neighbours.
fn smallest_dtype_for_value(value: &Scalar) -> DType {
    match value {
        Scalar::Bool(_) => DType::Bool,
        Scalar::BigInt(v) if *v >= 0 => DType::U64,
        Scalar::BigInt(_) => DType::I64,
        Scalar::Number(v) => smallest_dtype_for_number(*v),
    }
}

/// `common_type_of_values`, §4.B: infer each value's smallest holder, then
/// fold the results through `promote`.
pub fn common_type_of_values(values: &[Scalar]) -> Result<DType> {
    if values.is_empty() {
        return Err(Error::OpRequiresAtLeastOneTensor { op: "common_type_of_values" });
    }
    let dtypes: Vec<DType> = values.iter().map(smallest_dtype_for_value).collect();
    promote_many(&dtypes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_is_symmetric_and_reflexive() {
        for a in ALL_DTYPES {
            for b in ALL_DTYPES {
                assert_eq!(promote(a, b), promote(b, a));
            }
            assert_eq!(promote(a, a), a);
        }
    }

    #[test]
    fn bool_is_neutral() {
        for d in ALL_DTYPES {
            assert_eq!(promote(DType::Bool, d), d);
        }
    }

    #[test]
    fn mixed_signedness_examples_from_spec() {
        assert_eq!(promote(DType::I8, DType::U8), DType::I16);
        assert_eq!(promote(DType::I64, DType::U64), DType::F64);
        assert_eq!(promote(DType::I32, DType::F32), DType::F64);
        assert_eq!(promote(DType::I8, DType::F32), DType::F32);
    }

    #[test]
    fn value_inference_examples_from_spec() {
        let v = [Scalar::Bool(true), Scalar::Number(1.0), Scalar::Number(2.5)];
        assert_eq!(common_type_of_values(&v).unwrap(), DType::F32);

        let v = [Scalar::Number(1.0), Scalar::Number(2.0), Scalar::Number(128.0)];
        assert_eq!(common_type_of_values(&v).unwrap(), DType::I16);

        let v = [Scalar::BigInt(1), Scalar::BigInt(-2), Scalar::BigInt(3)];
        assert_eq!(common_type_of_values(&v).unwrap(), DType::F64);

        let v = [Scalar::Number(1.0), Scalar::Number(f64::MAX)];
        assert_eq!(common_type_of_values(&v).unwrap(), DType::F64);
    }

    #[test]
    fn promote_many_errors_on_empty() {
        assert!(promote_many(&[]).is_err());
    }
}
