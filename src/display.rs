//! `Tensor::format`'s human-readable renderer (§4.G): nested bracket
//! notation with truncation beyond 1000 elements, edge items = 3.

use crate::dtype::Scalar;

const TRUNCATE_THRESHOLD: usize = 1000;
const EDGE_ITEMS: usize = 3;

fn fmt_scalar(v: &Scalar) -> String {
    match v {
        Scalar::Bool(b) => b.to_string(),
        Scalar::BigInt(i) => i.to_string(),
        Scalar::Number(n) => {
            if n.is_finite() && n.fract() == 0.0 {
                format!("{n:.1}")
            } else {
                n.to_string()
            }
        }
    }
}

fn axis_indices(len: usize, truncate: bool) -> Vec<Option<usize>> {
    if truncate && len > 2 * EDGE_ITEMS + 1 {
        let mut out: Vec<Option<usize>> = (0..EDGE_ITEMS).map(Some).collect();
        out.push(None);
        out.extend((len - EDGE_ITEMS..len).map(Some));
        out
    } else {
        (0..len).map(Some).collect()
    }
}

fn strides_for(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

fn render_axis(dims: &[usize], strides: &[usize], values: &[Scalar], axis: usize, offset: usize, truncate: bool, depth: usize) -> String {
    if axis == dims.len() {
        return fmt_scalar(&values[offset]);
    }
    let indent = "  ".repeat(depth + 1);
    let closing_indent = "  ".repeat(depth);
    let last_axis = axis + 1 == dims.len();
    let indices = axis_indices(dims[axis], truncate);

    let items: Vec<String> = indices
        .iter()
        .map(|entry| match entry {
            None => "...".to_string(),
            Some(i) => render_axis(dims, strides, values, axis + 1, offset + i * strides[axis], truncate, depth + 1),
        })
        .collect();

    if last_axis {
        format!("[{}]", items.join(", "))
    } else {
        let body = items.iter().map(|item| format!("{indent}{item}")).collect::<Vec<_>>().join(",\n");
        format!("[\n{body}\n{closing_indent}]")
    }
}

/// Renders a tensor already flattened to logical (row-major) order.
pub(crate) fn format_nested(dims: &[usize], values: &[Scalar]) -> String {
    if dims.is_empty() {
        return fmt_scalar(&values[0]);
    }
    let truncate = values.len() > TRUNCATE_THRESHOLD;
    let strides = strides_for(dims);
    render_axis(dims, &strides, values, 0, 0, truncate, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_matrix_renders_without_truncation() {
        let values = vec![Scalar::BigInt(1), Scalar::BigInt(2), Scalar::BigInt(3), Scalar::BigInt(4)];
        let s = format_nested(&[2, 2], &values);
        assert_eq!(s, "[\n  [1, 2],\n  [3, 4]\n]");
    }

    #[test]
    fn scalar_renders_as_bare_value() {
        assert_eq!(format_nested(&[], &[Scalar::Number(2.5)]), "2.5");
    }

    #[test]
    fn long_vector_is_truncated_with_edge_items() {
        let values: Vec<Scalar> = (0..1200).map(Scalar::BigInt).collect();
        let s = format_nested(&[1200], &values);
        assert!(s.contains("..."));
        assert!(s.starts_with("[0, 1, 2, ..."));
    }
}
