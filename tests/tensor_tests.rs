//! Integration tests against the public `Tensor` facade: creation, casting,
//! broadcasting, matmul, views/slices, reductions and the device/lifecycle
//! surface. Unit tests for the lower layers (dtype, promotion, conversion,
//! shape, layout) live alongside their modules; these exercise the whole
//! stack the way a caller actually would.

use std::sync::Arc;

use tensorkit::prelude::*;
use tensorkit::shape::SliceAxis;
use tensorkit::Scalar;

fn cpu() -> Arc<dyn Backend> {
    Arc::new(CpuBackend::new())
}

fn int(v: i64) -> Nested {
    Nested::from(Scalar::BigInt(v as i128))
}

fn list(items: Vec<Nested>) -> Nested {
    Nested::List(items)
}

fn row(values: &[i64]) -> Nested {
    list(values.iter().map(|&v| int(v)).collect())
}

fn matrix(rows: &[&[i64]]) -> Nested {
    list(rows.iter().map(|r| row(r)).collect())
}

fn tensor_i32(data: &Nested, backend: &Arc<dyn Backend>) -> Result<Tensor> {
    Tensor::from_nested(data, CreateOptions { dtype: Some(DType::I32), ..Default::default() }, backend.clone())
}

// ---- creation / round-trip -------------------------------------------

#[test]
fn from_nested_round_trips_for_lossless_dtype() -> Result<()> {
    let backend = cpu();
    let data = matrix(&[&[1, 2, 3], &[4, 5, 6]]);
    let t = tensor_i32(&data, &backend)?;
    assert_eq!(t.shape().dims(), &[2, 3]);
    assert_eq!(t.dtype(), DType::I32);
    assert_eq!(t.format()?, "[\n  [1, 2, 3],\n  [4, 5, 6]\n]");
    Ok(())
}

#[test]
fn from_nested_rejects_ragged_input() {
    let backend = cpu();
    let data = list(vec![row(&[1, 2]), row(&[1])]);
    let err = Tensor::from_nested(&data, CreateOptions::default(), backend).unwrap_err();
    assert!(matches!(err, Error::InconsistentDimensions { .. }));
}

#[test]
fn zeros_ones_identity() -> Result<()> {
    let backend = cpu();
    let z = Tensor::zeros(vec![2, 2], DType::F32, backend.clone())?;
    assert_eq!(z.sum(None, false)?.item()?, Scalar::Number(0.0));

    let o = Tensor::ones(vec![3], DType::I32, backend.clone())?;
    assert_eq!(o.sum(None, false)?.item()?, Scalar::BigInt(3));

    let eye = Tensor::identity(3, DType::F32, backend)?;
    assert_eq!(eye.sum(None, false)?.item()?, Scalar::Number(3.0));
    Ok(())
}

// ---- S3: conversion policies ------------------------------------------

#[test]
fn cast_strict_rejects_precision_loss_permissive_truncates() -> Result<()> {
    let backend = cpu();
    let t = Tensor::from_nested(&Nested::from(Scalar::Number(3.14)), CreateOptions { dtype: Some(DType::F32), ..Default::default() }, backend)?;

    assert!(t.cast(DType::I32, &ConvertPolicy::strict()).is_err());

    let truncated = t.cast(DType::I32, &ConvertPolicy::permissive())?;
    assert_eq!(truncated.item()?, Scalar::BigInt(3));
    Ok(())
}

#[test]
fn cast_permissive_clamps_infinity_and_maps_nan_to_bool() -> Result<()> {
    let backend = cpu();
    let inf = Tensor::from_nested(&Nested::from(Scalar::Number(f64::INFINITY)), CreateOptions { dtype: Some(DType::F32), ..Default::default() }, backend.clone())?;
    let clamped = inf.cast(DType::I32, &ConvertPolicy::permissive())?;
    assert_eq!(clamped.item()?, Scalar::BigInt(i32::MAX as i128));

    let nan = Tensor::from_nested(&Nested::from(Scalar::Number(f64::NAN)), CreateOptions { dtype: Some(DType::F32), ..Default::default() }, backend)?;
    let as_bool = nan.cast(DType::Bool, &ConvertPolicy::permissive())?;
    assert_eq!(as_bool.item()?, Scalar::Bool(true));
    Ok(())
}

// ---- S4: broadcast + matmul -------------------------------------------

#[test]
fn add_broadcasts_a_row_across_a_matrix() -> Result<()> {
    let backend = cpu();
    let a = tensor_i32(&matrix(&[&[1, 2, 3], &[4, 5, 6]]), &backend)?;
    let b = tensor_i32(&row(&[10, 20, 30]), &backend)?;
    let b = b.reshape(&[1, 3])?;
    let sum = a.add(&b)?;
    assert_eq!(sum.shape().dims(), &[2, 3]);
    assert_eq!(sum.to_nested()?, matrix(&[&[11, 22, 33], &[14, 25, 36]]));
    Ok(())
}

#[test]
fn matmul_matrix_times_vector_drops_trailing_dim() -> Result<()> {
    let backend = cpu();
    let a = tensor_i32(&matrix(&[&[1, 2, 3], &[4, 5, 6]]), &backend)?;
    let v = tensor_i32(&row(&[1, 1, 1]), &backend)?;
    let out = a.matmul(&v)?;
    assert_eq!(out.shape().dims(), &[2]);
    Ok(())
}

#[test]
fn matmul_batches_independently() -> Result<()> {
    let backend = cpu();
    let lhs_data: Vec<i64> = (0..12).collect();
    let rhs_data: Vec<i64> = (0..24).collect();
    let lhs = tensor_i32(&list((0..2).map(|b| matrix(&[&lhs_data[b * 6..b * 6 + 3], &lhs_data[b * 6 + 3..b * 6 + 6]])).collect()), &backend)?;
    let rhs = tensor_i32(
        &list(
            (0..2)
                .map(|b| list((0..3).map(|r| row(&rhs_data[b * 12 + r * 4..b * 12 + r * 4 + 4])).collect()))
                .collect(),
        ),
        &backend,
    )?;
    let out = lhs.matmul(&rhs)?;
    assert_eq!(out.shape().dims(), &[2, 2, 4]);
    Ok(())
}

#[test]
fn matmul_rejects_incompatible_inner_dims() -> Result<()> {
    let backend = cpu();
    let a = tensor_i32(&matrix(&[&[1, 2, 3], &[4, 5, 6]]), &backend)?;
    let b = tensor_i32(&matrix(&[&[1, 2, 3, 4], &[5, 6, 7, 8]]), &backend)?;
    assert!(matches!(a.matmul(&b).unwrap_err(), Error::ShapeMismatch { .. }));
    Ok(())
}

// ---- S5: view / slice ---------------------------------------------------

#[test]
fn slice_with_integer_index_drops_that_axis() -> Result<()> {
    let backend = cpu();
    let t = tensor_i32(&matrix(&[&[1, 2, 3], &[4, 5, 6]]), &backend)?;

    let col = t.slice(&[SliceAxis::Full, SliceAxis::Index(1)])?;
    assert_eq!(col.shape().dims(), &[2]);
    assert_eq!(col.to_nested()?, row(&[2, 5]));

    let first_row = t.slice(&[SliceAxis::Index(0)])?;
    assert_eq!(first_row.shape().dims(), &[3]);
    assert_eq!(first_row.to_nested()?, row(&[1, 2, 3]));

    let stepped = t.slice(&[SliceAxis::Range { start: None, stop: None, step: Some(2) }, SliceAxis::Full])?;
    assert_eq!(stepped.shape().dims(), &[1, 3]);
    Ok(())
}

#[test]
fn slice_with_negative_step_reverses_the_axis() -> Result<()> {
    let backend = cpu();
    let t = tensor_i32(&row(&[1, 2, 3, 4, 5]), &backend)?;

    let reversed = t.slice(&[SliceAxis::Range { start: None, stop: None, step: Some(-1) }])?;
    assert_eq!(reversed.shape().dims(), &[5]);
    assert_eq!(reversed.to_nested()?, row(&[5, 4, 3, 2, 1]));
    Ok(())
}

#[test]
fn view_resolves_one_wildcard_dim_and_rejects_ambiguity() -> Result<()> {
    let backend = cpu();
    let t = Tensor::zeros(vec![6], DType::F32, backend)?;
    let v = t.view(&[-1, 2])?;
    assert_eq!(v.shape().dims(), &[3, 2]);

    assert!(matches!(t.view(&[-1, 4]).unwrap_err(), Error::ViewAmbiguous { .. }));
    Ok(())
}

#[test]
fn reshape_of_contiguous_input_is_a_view() -> Result<()> {
    let backend = cpu();
    let t = Tensor::zeros(vec![2, 3], DType::F32, backend)?;
    let reshaped = t.reshape(&[3, 2])?;
    assert!(reshaped.is_view());
    assert_eq!(reshaped.shape().dims(), &[3, 2]);
    Ok(())
}

#[test]
fn permute_identity_is_a_no_op() -> Result<()> {
    let backend = cpu();
    let t = tensor_i32(&matrix(&[&[1, 2, 3], &[4, 5, 6]]), &backend)?;
    let same = t.permute(&[0, 1])?;
    assert_eq!(same.shape().dims(), t.shape().dims());
    assert_eq!(same.to_nested()?, t.to_nested()?);
    Ok(())
}

#[test]
fn transpose_last_two_is_an_involution() -> Result<()> {
    let backend = cpu();
    let t = tensor_i32(&matrix(&[&[1, 2, 3], &[4, 5, 6]]), &backend)?;
    let back = t.transpose_last_two()?.transpose_last_two()?;
    assert_eq!(back.shape().dims(), t.shape().dims());
    assert_eq!(back.to_nested()?, t.to_nested()?);
    Ok(())
}

// ---- S6: reductions ------------------------------------------------------

#[test]
fn sum_over_last_axis() -> Result<()> {
    let backend = cpu();
    let t = tensor_i32(&matrix(&[&[1, 2, 3], &[4, 5, 6]]), &backend)?;

    let summed = t.sum(Some(&[1]), false)?;
    assert_eq!(summed.shape().dims(), &[2]);
    assert_eq!(summed.to_nested()?, row(&[6, 15]));

    let kept = t.sum(Some(&[1]), true)?;
    assert_eq!(kept.shape().dims(), &[2, 1]);
    Ok(())
}

#[test]
fn mean_over_all_axes_promotes_to_float32() -> Result<()> {
    let backend = cpu();
    let t = tensor_i32(&matrix(&[&[1, 2, 3], &[4, 5, 6]]), &backend)?;
    let mean = t.mean(None, false)?;
    assert_eq!(mean.dtype(), DType::F32);
    assert_eq!(mean.item()?, Scalar::Number(3.5));
    Ok(())
}

#[test]
fn max_over_first_axis() -> Result<()> {
    let backend = cpu();
    let t = tensor_i32(&matrix(&[&[1, 5, 3], &[4, 2, 6]]), &backend)?;
    let maxed = t.max(Some(&[0]), false)?;
    assert_eq!(maxed.to_nested()?, row(&[4, 5, 6]));
    Ok(())
}

#[test]
fn sum_all_axes_matches_sum_with_none() -> Result<()> {
    let backend = cpu();
    let t = tensor_i32(&matrix(&[&[1, 2, 3], &[4, 5, 6]]), &backend)?;
    let via_none = t.sum(None, false)?.item()?;
    let via_all = t.sum(Some(&[0, 1]), false)?.item()?;
    assert_eq!(via_none, via_all);
    Ok(())
}

// ---- device / lifecycle -------------------------------------------------

#[test]
fn move_to_same_backend_is_a_cheap_share() -> Result<()> {
    let backend = cpu();
    let t = Tensor::zeros(vec![2], DType::F32, backend.clone())?;
    let moved = t.move_to(backend)?;
    assert_eq!(moved.shape().dims(), t.shape().dims());
    Ok(())
}

#[test]
fn move_to_other_backend_round_trips_values() -> Result<()> {
    let backend_a = cpu();
    let backend_b = cpu();
    let t = tensor_i32(&row(&[1, 2, 3]), &backend_a)?;
    let moved = t.move_to(backend_b)?;
    assert_eq!(moved.to_nested()?, t.to_nested()?);
    Ok(())
}

#[test]
fn clone_decouples_from_the_source_buffer() -> Result<()> {
    let backend = cpu();
    let t = tensor_i32(&row(&[1, 2, 3]), &backend)?;
    let cloned = t.clone()?;
    assert_eq!(cloned.to_nested()?, t.to_nested()?);
    Ok(())
}

#[test]
fn dispose_is_idempotent_and_blocks_further_use() -> Result<()> {
    let backend = cpu();
    let t = Tensor::zeros(vec![2], DType::F32, backend)?;
    t.dispose()?;
    t.dispose()?;
    assert!(matches!(t.item().unwrap_err(), Error::UseAfterDispose));
    Ok(())
}

