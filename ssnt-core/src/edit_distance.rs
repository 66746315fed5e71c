//! Levenshtein distance between label sequences.

use crate::error::{Error, Result, ensure_non_negative, ensure_shape};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

/// Minimum number of unit-cost insertions, deletions and substitutions
/// turning `a` into `b`.
///
/// Keeps two rows of the `(a.len() + 1) x (b.len() + 1)` table.
pub fn levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (m, x) in a.iter().enumerate() {
        current[0] = m + 1;
        for (n, y) in b.iter().enumerate() {
            let substitute = previous[n] + usize::from(x != y);
            let delete = previous[n + 1] + 1;
            let insert = current[n] + 1;
            current[n + 1] = substitute.min(delete).min(insert);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Batched [`levenshtein`] over padded sequences.
///
/// `a` and `b` are `(batch, max_length)` with the true lengths in `a_lengths`
/// and `b_lengths`; padding past a length is ignored.
pub fn levenshtein_edit_distance(
    a: ArrayView2<'_, i32>,
    b: ArrayView2<'_, i32>,
    a_lengths: ArrayView1<'_, i32>,
    b_lengths: ArrayView1<'_, i32>,
) -> Result<Array1<i32>> {
    let batch_size = a.nrows();
    ensure_shape("b", &[batch_size], &b.shape()[..1])?;
    ensure_shape("a_lengths", &[batch_size], a_lengths.shape())?;
    ensure_shape("b_lengths", &[batch_size], b_lengths.shape())?;
    check_lengths("a_lengths", a_lengths, a.ncols())?;
    check_lengths("b_lengths", b_lengths, b.ncols())?;

    let distances: Vec<i32> = (0..batch_size)
        .into_par_iter()
        .map(|i| {
            let a = prefix(a.index_axis(Axis(0), i), a_lengths[i]);
            let b = prefix(b.index_axis(Axis(0), i), b_lengths[i]);
            levenshtein(&a, &b) as i32
        })
        .collect();

    tracing::debug!(batch_size, "computed edit distances");

    Ok(Array1::from(distances))
}

fn prefix(row: ArrayView1<'_, i32>, length: i32) -> Vec<i32> {
    row.iter().take(length as usize).copied().collect()
}

fn check_lengths(
    name: &'static str,
    lengths: ArrayView1<'_, i32>,
    max_length: usize,
) -> Result<()> {
    ensure_non_negative(name, lengths)?;
    match lengths.iter().position(|&l| l as usize > max_length) {
        Some(i) => Err(Error::value(
            name,
            &[i],
            lengths[i],
            "exceeds the padded length",
        )),
        None => Ok(()),
    }
}
