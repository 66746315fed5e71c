//! Path reconstruction from the per-step beam branch trail.
//!
//! Hypotheses never store their ancestry. Each decode step records, for every
//! new slot, the slot of its parent in the previous beam; a path is recovered
//! by walking that table backwards from a final slot.

use crate::error::{Error, Result, ensure_shape};
use crate::types::stack_batches;
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

/// Every slot's ancestry, plus the row picked by the final branch.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderedBranches {
    /// Parent slot per step for every final slot, `(batch, beam_width, steps)`
    pub paths: Array3<i32>,
    /// `paths[b, final_branch[b]]`, `(batch, steps)`
    pub selected: Array2<i32>,
}

/// Branch and `t` sequence of one best path.
#[derive(Clone, Debug, PartialEq)]
pub struct BestPath {
    pub branch: Array1<i32>,
    pub t: Array1<i32>,
}

/// Best paths of a batch, each `(batch, max_u)`.
#[derive(Clone, Debug, PartialEq)]
pub struct BestPaths {
    pub branch: Array2<i32>,
    pub t: Array2<i32>,
}

/// Map a branch value to a slot, failing on anything outside the beam.
fn checked_slot(
    value: i32,
    batch: usize,
    step: usize,
    slot: usize,
    beam_width: usize,
) -> Result<usize> {
    if value >= 0 && (value as usize) < beam_width {
        Ok(value as usize)
    } else {
        Err(Error::CorruptBacktrace {
            batch,
            step,
            slot,
            value,
            beam_width,
        })
    }
}

fn check_final_branch(final_branch: ArrayView1<'_, i32>, beam_width: usize) -> Result<()> {
    match final_branch
        .iter()
        .position(|&w| w < 0 || w as usize >= beam_width)
    {
        Some(b) => Err(Error::value(
            "final_branch",
            &[b],
            final_branch[b],
            "not a slot of the beam",
        )),
        None => Ok(()),
    }
}

/// Reorder the branch trail into per-slot ancestry lines.
///
/// `beam_branch` is `(batch, steps, beam_width)` and `final_branch` holds one
/// winning slot per batch element. For every final slot the walk starts at the
/// slot itself and visits steps from last to first, writing the parent read at
/// each step and following it.
pub fn order_beam_branch(
    final_branch: ArrayView1<'_, i32>,
    beam_branch: ArrayView3<'_, i32>,
) -> Result<OrderedBranches> {
    let (batch_size, steps, beam_width) = beam_branch.dim();
    ensure_shape("final_branch", &[batch_size], final_branch.shape())?;
    check_final_branch(final_branch, beam_width)?;

    let parts: Vec<Array2<i32>> = (0..batch_size)
        .into_par_iter()
        .map(|b| order_batch(b, beam_branch.index_axis(Axis(0), b)))
        .collect::<Result<_>>()?;

    let paths = stack_batches(parts, beam_width, steps)?;
    let selected = Array2::from_shape_fn((batch_size, steps), |(b, s)| {
        paths[[b, final_branch[b] as usize, s]]
    });

    tracing::debug!(batch_size, steps, beam_width, "ordered beam branches");

    Ok(OrderedBranches { paths, selected })
}

/// Ancestry of every slot of one batch element. `trail` is `(steps, beam_width)`,
/// the result `(beam_width, steps)`.
fn order_batch(batch: usize, trail: ArrayView2<'_, i32>) -> Result<Array2<i32>> {
    let (steps, beam_width) = trail.dim();
    let mut paths = Array2::zeros((beam_width, steps));

    for slot in 0..beam_width {
        let mut pointer = slot;
        for step in (0..steps).rev() {
            let parent = trail[[step, pointer]];
            paths[[slot, step]] = parent;
            pointer = checked_slot(parent, batch, step, pointer, beam_width)?;
        }
    }

    Ok(paths)
}

/// Extract the best path from a `(max_u, beam_width)` branch trail.
///
/// Starting at `best_final_branch`, walks `u` from last to first, recording
/// the branch and `t` stored at the current slot and following the branch.
pub fn extract_best_beam_branch(
    best_final_branch: i32,
    beam_branch: ArrayView2<'_, i32>,
    t_history: ArrayView2<'_, i32>,
) -> Result<BestPath> {
    ensure_shape("t_history", beam_branch.shape(), t_history.shape())?;
    check_final_branch(
        ArrayView1::from(std::slice::from_ref(&best_final_branch)),
        beam_branch.ncols(),
    )?;
    best_path(0, best_final_branch as usize, beam_branch, t_history)
}

/// Batched [`extract_best_beam_branch`]: `beam_branch` and `t_history` are
/// `(batch, max_u, beam_width)`, `best_final_branch` is `(batch,)`.
pub fn extract_best_paths(
    best_final_branch: ArrayView1<'_, i32>,
    beam_branch: ArrayView3<'_, i32>,
    t_history: ArrayView3<'_, i32>,
) -> Result<BestPaths> {
    let (batch_size, max_u, beam_width) = beam_branch.dim();
    ensure_shape("t_history", beam_branch.shape(), t_history.shape())?;
    ensure_shape("best_final_branch", &[batch_size], best_final_branch.shape())?;
    check_final_branch(best_final_branch, beam_width)?;

    let paths: Vec<BestPath> = (0..batch_size)
        .into_par_iter()
        .map(|b| {
            best_path(
                b,
                best_final_branch[b] as usize,
                beam_branch.index_axis(Axis(0), b),
                t_history.index_axis(Axis(0), b),
            )
        })
        .collect::<Result<_>>()?;

    let branch = Array2::from_shape_fn((batch_size, max_u), |(b, u)| paths[b].branch[u]);
    let t = Array2::from_shape_fn((batch_size, max_u), |(b, u)| paths[b].t[u]);

    Ok(BestPaths { branch, t })
}

fn best_path(
    batch: usize,
    best_final_branch: usize,
    beam_branch: ArrayView2<'_, i32>,
    t_history: ArrayView2<'_, i32>,
) -> Result<BestPath> {
    let (max_u, beam_width) = beam_branch.dim();
    let mut branch = Array1::zeros(max_u);
    let mut t = Array1::zeros(max_u);

    let mut pointer = best_final_branch;
    for u in (0..max_u).rev() {
        let parent = beam_branch[[u, pointer]];
        branch[u] = parent;
        t[u] = t_history[[u, pointer]];
        pointer = checked_slot(parent, batch, u, pointer, beam_width)?;
    }

    Ok(BestPath { branch, t })
}
