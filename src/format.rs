// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response serialization: token lists and unabridged array text.
//!
//! The array rendering is debugging-oriented, not transport-efficient:
//! every element is printed at default precision, nothing is elided with
//! ellipses, and no line is wrapped regardless of array size.  Innermost
//! rows take one line each, nested numpy-style in brackets.

use candle_core::{DType, Tensor};

use crate::error::{Result, ServeError};

/// Join token strings with single spaces.
#[must_use]
pub fn join_tokens(tokens: &[String]) -> String {
    tokens.join(" ")
}

/// Render an ordered embedding result as one array whose outer dimension
/// is the number of entries.
///
/// # Errors
///
/// Returns [`ServeError::Model`] if the entries cannot be stacked (shape
/// mismatch) or extracted.
pub fn format_embedding(entries: &[Tensor]) -> Result<String> {
    let stacked = Tensor::stack(entries, 0)?;
    format_tensor(&stacked)
}

/// Render a tensor of rank 1–3 as unabridged text.
///
/// # Errors
///
/// Returns [`ServeError::Model`] on extraction failures or unsupported
/// rank.
pub fn format_tensor(tensor: &Tensor) -> Result<String> {
    let tensor = tensor.to_dtype(DType::F32)?;
    match tensor.dims().len() {
        1 => Ok(render_row(&tensor.to_vec1()?)),
        2 => Ok(render_matrix(&tensor.to_vec2()?, 1)),
        3 => Ok(render_cube(&tensor.to_vec3()?)),
        rank => Err(ServeError::Model(candle_core::Error::Msg(format!(
            "cannot render rank-{rank} tensor"
        )))),
    }
}

/// `[1 2 3]`: one line, space-separated.
fn render_row(values: &[f32]) -> String {
    let cells: Vec<String> = values.iter().map(|v| format!("{v}")).collect();
    format!("[{}]", cells.join(" "))
}

/// `[[1 2]\n [3 4]]`: one row per line, continuation rows indented to
/// align under the first.
fn render_matrix(rows: &[Vec<f32>], indent: usize) -> String {
    let sep = format!("\n{}", " ".repeat(indent));
    let cells: Vec<String> = rows.iter().map(|row| render_row(row)).collect();
    format!("[{}]", cells.join(&sep))
}

/// Rank-3 rendering: matrices separated by a blank line.
fn render_cube(mats: &[Vec<Vec<f32>>]) -> String {
    let cells: Vec<String> = mats.iter().map(|m| render_matrix(m, 2)).collect();
    format!("[{}]", cells.join("\n\n "))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    #[test]
    fn tokens_join_with_single_spaces() {
        let tokens = vec!["hello".to_owned(), "world".to_owned()];
        assert_eq!(join_tokens(&tokens), "hello world");
        assert_eq!(join_tokens(&[]), "");
    }

    #[test]
    fn row_rendering() {
        assert_eq!(render_row(&[1.0, 2.5, -3.0]), "[1 2.5 -3]");
    }

    #[test]
    fn matrix_rendering_aligns_rows() {
        let m = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(render_matrix(&m, 1), "[[1 2]\n [3 4]]");
    }

    #[test]
    fn cube_rendering_separates_matrices() {
        let c = vec![
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            vec![vec![5.0, 6.0], vec![7.0, 8.0]],
        ];
        assert_eq!(
            render_cube(&c),
            "[[[1 2]\n  [3 4]]\n\n [[5 6]\n  [7 8]]]"
        );
    }

    #[test]
    fn large_array_is_never_elided() {
        let values: Vec<f32> = (0..5000).map(|i| f32::from(i16::try_from(i % 100).unwrap())).collect();
        let tensor = Tensor::from_vec(values, (50, 100), &Device::Cpu).unwrap();
        let text = format_tensor(&tensor).unwrap();
        assert!(!text.contains("..."));
        // 50 rows of 100 elements: every row on its own unwrapped line.
        assert_eq!(text.lines().count(), 50);
        assert_eq!(text.matches("99").count(), 50);
    }

    #[test]
    fn embedding_outer_dimension_is_entry_count() {
        let a = Tensor::from_vec(vec![1.0_f32, 2.0, 3.0, 4.0], (2, 2), &Device::Cpu).unwrap();
        let b = Tensor::from_vec(vec![5.0_f32, 6.0, 7.0, 8.0], (2, 2), &Device::Cpu).unwrap();
        let text = format_embedding(&[a, b]).unwrap();
        assert_eq!(text, "[[[1 2]\n  [3 4]]\n\n [[5 6]\n  [7 8]]]");
    }
}
