//! The conversion engine (component C): element and array conversion
//! between any two dtypes under a configurable policy, plus the compile-time
//! safe-cast lattice used to validate static casts.

use crate::dtype::{DType, Scalar, ValueKind};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NanHandling {
    Error,
    Zero,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfinityHandling {
    Error,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowHandling {
    Error,
    Clamp,
    Wrap,
}

/// The five knobs described in §4.C.
#[derive(Debug, Clone, Copy)]
pub struct ConvertPolicy {
    pub allow_precision_loss: bool,
    pub allow_overflow: bool,
    pub nan_handling: NanHandling,
    pub infinity_handling: InfinityHandling,
    pub overflow_handling: OverflowHandling,
}

impl ConvertPolicy {
    pub fn strict() -> Self {
        Self {
            allow_precision_loss: false,
            allow_overflow: false,
            nan_handling: NanHandling::Error,
            infinity_handling: InfinityHandling::Error,
            overflow_handling: OverflowHandling::Error,
        }
    }

    pub fn permissive() -> Self {
        Self {
            allow_precision_loss: true,
            allow_overflow: true,
            nan_handling: NanHandling::Clamp,
            infinity_handling: InfinityHandling::Clamp,
            overflow_handling: OverflowHandling::Clamp,
        }
    }
}

fn fmt_scalar(v: &Scalar) -> String {
    match v {
        Scalar::Bool(b) => b.to_string(),
        Scalar::BigInt(i) => i.to_string(),
        Scalar::Number(n) => n.to_string(),
    }
}

fn to_f64(v: &Scalar) -> f64 {
    match v {
        Scalar::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Scalar::BigInt(i) => *i as f64,
        Scalar::Number(n) => *n,
    }
}

fn to_i128(v: &Scalar) -> i128 {
    match v {
        Scalar::Bool(b) => {
            if *b {
                1
            } else {
                0
            }
        }
        Scalar::BigInt(i) => *i,
        Scalar::Number(n) => n.trunc() as i128,
    }
}

/// Applies `overflow_handling` once a value is known to be an exact integer
/// outside of `to`'s range.
fn apply_overflow(v: i128, from: DType, to: DType, policy: &ConvertPolicy) -> Result<(i128, Option<String>)> {
    let (lo, hi) = to.meta().int_range.expect("to is an integer/bool dtype");
    if v >= lo && v <= hi {
        return Ok((v, None));
    }
    if !policy.allow_overflow || policy.overflow_handling == OverflowHandling::Error {
        return Err(Error::ConversionOverflow { value: v.to_string(), from, to });
    }
    match policy.overflow_handling {
        OverflowHandling::Clamp => {
            let clamped = v.clamp(lo, hi);
            Ok((clamped, Some(format!("overflow: {v} clamped to {clamped}"))))
        }
        OverflowHandling::Wrap => {
            let range = hi - lo + 1;
            let wrapped = (v - lo).rem_euclid(range) + lo;
            Ok((wrapped, Some(format!("overflow: {v} wrapped to {wrapped}"))))
        }
        OverflowHandling::Error => unreachable!("handled above"),
    }
}

/// `convert`, §4.C. Returns the converted value plus any warnings that
/// accompanied a successful (possibly lossy, under a permissive policy)
/// conversion.
pub fn convert(value: Scalar, from: DType, to: DType, policy: &ConvertPolicy) -> Result<(Scalar, Vec<String>)> {
    if from == to {
        return Ok((value, Vec::new()));
    }
    let mut warnings = Vec::new();
    let from_kind = from.meta().value_kind;
    let to_kind = to.meta().value_kind;

    match (from_kind, to_kind) {
        (ValueKind::Boolean, ValueKind::Integer) => {
            let b = matches!(value, Scalar::Bool(true));
            Ok((Scalar::BigInt(if b { 1 } else { 0 }), warnings))
        }
        (ValueKind::Boolean, ValueKind::Float) => {
            let b = matches!(value, Scalar::Bool(true));
            Ok((Scalar::Number(if b { 1.0 } else { 0.0 }), warnings))
        }
        (ValueKind::Integer, ValueKind::Boolean) => {
            let v = to_f64(&value);
            Ok((Scalar::Bool(v != 0.0), warnings))
        }
        (ValueKind::Float, ValueKind::Boolean) => {
            let v = to_f64(&value);
            if !v.is_finite() {
                let is_nan = v.is_nan();
                let errors = (is_nan && policy.nan_handling == NanHandling::Error)
                    || (!is_nan && policy.infinity_handling == InfinityHandling::Error);
                if errors {
                    return Err(Error::ConversionSpecialValue { value: fmt_scalar(&value), from, to });
                }
                // NumPy/PyTorch rule: any non-finite number is truthy.
                return Ok((Scalar::Bool(true), warnings));
            }
            Ok((Scalar::Bool(v != 0.0), warnings))
        }
        (ValueKind::Float, ValueKind::Integer) => {
            let v = to_f64(&value);
            if !v.is_finite() {
                if v.is_nan() {
                    if policy.nan_handling == NanHandling::Error {
                        return Err(Error::ConversionSpecialValue { value: fmt_scalar(&value), from, to });
                    }
                    warnings.push("NaN mapped to 0".to_string());
                    return Ok((Scalar::BigInt(0), warnings));
                }
                if policy.infinity_handling == InfinityHandling::Error {
                    return Err(Error::ConversionSpecialValue { value: fmt_scalar(&value), from, to });
                }
                let (lo, hi) = to.meta().int_range.unwrap();
                let clamped = if v > 0.0 { hi } else { lo };
                warnings.push(format!("infinity clamped to {clamped}"));
                return Ok((Scalar::BigInt(clamped), warnings));
            }
            if v.fract() != 0.0 {
                if !policy.allow_precision_loss {
                    return Err(Error::ConversionPrecisionLoss { value: fmt_scalar(&value), from, to });
                }
                warnings.push(format!("precision loss: {v} truncated to {}", v.trunc()));
            }
            let (result, overflow_warn) = apply_overflow(v.trunc() as i128, from, to, policy)?;
            warnings.extend(overflow_warn);
            Ok((Scalar::BigInt(result), warnings))
        }
        (ValueKind::Integer, ValueKind::Float) => {
            let v = to_i128(&value);
            if v.unsigned_abs() > 9_007_199_254_740_991u128 {
                if !policy.allow_precision_loss {
                    return Err(Error::ConversionPrecisionLoss { value: v.to_string(), from, to });
                }
                warnings.push(format!("{v} exceeds the f64 safe-integer range"));
            }
            let as_f64 = v as f64;
            let narrowed = if to == DType::F32 {
                let as_f32 = as_f64 as f32;
                if (as_f32 as f64) != as_f64 {
                    if !policy.allow_precision_loss {
                        return Err(Error::ConversionPrecisionLoss { value: v.to_string(), from, to });
                    }
                    warnings.push(format!("{v} is not exactly representable in float32"));
                }
                as_f32 as f64
            } else {
                as_f64
            };
            Ok((Scalar::Number(narrowed), warnings))
        }
        (ValueKind::Integer, ValueKind::Integer) => {
            let v = to_i128(&value);
            let (result, overflow_warn) = apply_overflow(v, from, to, policy)?;
            warnings.extend(overflow_warn);
            Ok((Scalar::BigInt(result), warnings))
        }
        (ValueKind::Float, ValueKind::Float) => {
            let v = to_f64(&value);
            if to == DType::F32 {
                let as_f32 = v as f32;
                if v.is_finite() && (as_f32 as f64) != v {
                    if !policy.allow_precision_loss {
                        return Err(Error::ConversionPrecisionLoss { value: fmt_scalar(&value), from, to });
                    }
                    warnings.push(format!("{v} rounded to {as_f32} by float32 conversion"));
                }
                Ok((Scalar::Number(as_f32 as f64), warnings))
            } else {
                // float32 -> float64 never loses precision.
                Ok((Scalar::Number(v), warnings))
            }
        }
        (ValueKind::Boolean, ValueKind::Boolean) => unreachable!("from == to handled above"),
    }
}

/// `convert_array`, §4.C: element-wise conversion; the whole call fails if
/// any element fails, with the error (and any warning) prefixed by index.
pub fn convert_array(values: &[Scalar], from: DType, to: DType, policy: &ConvertPolicy) -> Result<(Vec<Scalar>, Vec<String>)> {
    let mut out = Vec::with_capacity(values.len());
    let mut warnings = Vec::new();
    for (index, value) in values.iter().enumerate() {
        let (converted, elem_warnings) =
            convert(*value, from, to, policy).map_err(|e| Error::ConversionElement { index, source: Box::new(e) })?;
        out.push(converted);
        warnings.extend(elem_warnings.into_iter().map(|w| format!("[{index}] {w}")));
    }
    Ok((out, warnings))
}

/// The static safe-cast lattice, §4.C. Used to validate casts that must
/// never lose information for *any* value of the source dtype.
pub fn is_safe_cast(from: DType, to: DType) -> bool {
    if from == to || from == DType::Bool {
        return true;
    }
    if from.is_float() {
        return from == DType::F32 && to == DType::F64;
    }
    if to.is_float() {
        return match to {
            DType::F32 => from.byte_size() <= 2,
            DType::F64 => true,
            _ => false,
        };
    }
    let (fm, tm) = (from.meta(), to.meta());
    if fm.signed == tm.signed {
        return tm.byte_size >= fm.byte_size;
    }
    // uintN -> int(2N) or wider signed.
    !fm.signed && tm.signed && tm.byte_size >= fm.byte_size * 2
}

/// `safe_cast`: strict conversion, defined only when the lattice permits it.
pub fn safe_cast(value: Scalar, from: DType, to: DType) -> Result<Scalar> {
    if !is_safe_cast(from, to) {
        return Err(Error::BackendError(format!("{from:?} -> {to:?} is not a safe cast")));
    }
    convert(value, from, to, &ConvertPolicy::strict()).map(|(v, _)| v)
}

/// `would_be_lossy`: strict conversion fails.
pub fn would_be_lossy(value: Scalar, from: DType, to: DType) -> bool {
    convert(value, from, to, &ConvertPolicy::strict()).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_vs_permissive_truncation() {
        let v = Scalar::Number(3.14);
        assert!(convert(v, DType::F32, DType::I32, &ConvertPolicy::strict()).is_err());
        let (out, warnings) = convert(v, DType::F32, DType::I32, &ConvertPolicy::permissive()).unwrap();
        assert_eq!(out, Scalar::BigInt(3));
        assert!(!warnings.is_empty());
    }

    #[test]
    fn infinity_clamps_under_permissive() {
        let (out, _) = convert(Scalar::Number(f64::INFINITY), DType::F32, DType::I32, &ConvertPolicy::permissive()).unwrap();
        assert_eq!(out, Scalar::BigInt(i32::MAX as i128));
    }

    #[test]
    fn nan_to_bool_is_true_under_permissive() {
        let (out, _) = convert(Scalar::Number(f64::NAN), DType::F32, DType::Bool, &ConvertPolicy::permissive()).unwrap();
        assert_eq!(out, Scalar::Bool(true));
    }

    #[test]
    fn would_be_lossy_matches_strict_failure() {
        assert!(would_be_lossy(Scalar::Number(3.14), DType::F32, DType::I32));
        assert!(!would_be_lossy(Scalar::Number(3.0), DType::F32, DType::I32));
    }

    #[test]
    fn safe_cast_lattice_examples() {
        assert!(is_safe_cast(DType::Bool, DType::I8));
        assert!(is_safe_cast(DType::U8, DType::I16));
        assert!(!is_safe_cast(DType::U8, DType::I8));
        assert!(is_safe_cast(DType::I32, DType::F64));
        assert!(!is_safe_cast(DType::I32, DType::F32));
        assert!(is_safe_cast(DType::F32, DType::F64));
        assert!(!is_safe_cast(DType::F64, DType::F32));
    }

    #[test]
    fn overflow_wrap_matches_modular_formula() {
        let (result, _) = apply_overflow(300, DType::I8, DType::I8, &ConvertPolicy {
            overflow_handling: OverflowHandling::Wrap,
            ..ConvertPolicy::permissive()
        })
        .unwrap();
        // ((300 - (-128)) mod 256) - 128 = 44
        assert_eq!(result, 44);
    }
}
