//! JSON input/output and conversions between nested lists and arrays.

use eyre::{Context, Result, ensure};
use ndarray::{Array1, Array2, Array3};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Read and parse a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {:?}", path.display()))?;

    serde_json::from_str(&text).wrap_err_with(|| format!("failed to parse {:?}", path.display()))
}

/// Write pretty JSON to `output`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value).wrap_err("failed to serialize output")?;

    match output {
        Some(path) => {
            tracing::info!(path = ?path.display(), "write output");
            std::fs::write(path, text + "\n")
                .wrap_err_with(|| format!("failed to write {:?}", path.display()))
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

/// Build a 2-D array from rows of equal length.
pub fn to_array2<T: Clone>(name: &str, rows: Vec<Vec<T>>) -> Result<Array2<T>> {
    let cols = rows.first().map_or(0, Vec::len);
    ensure!(
        rows.iter().all(|row| row.len() == cols),
        "{name}: rows have different lengths"
    );

    let shape = (rows.len(), cols);
    Array2::from_shape_vec(shape, rows.concat()).wrap_err_with(|| format!("{name}: bad shape"))
}

/// Build a 3-D array from a rectangular nested list.
pub fn to_array3<T: Clone>(name: &str, blocks: Vec<Vec<Vec<T>>>) -> Result<Array3<T>> {
    let rows = blocks.first().map_or(0, Vec::len);
    let cols = blocks
        .first()
        .and_then(|block| block.first())
        .map_or(0, Vec::len);
    ensure!(
        blocks
            .iter()
            .all(|block| block.len() == rows && block.iter().all(|row| row.len() == cols)),
        "{name}: nested lists are not rectangular"
    );

    let shape = (blocks.len(), rows, cols);
    let data: Vec<T> = blocks.into_iter().flatten().flatten().collect();
    Array3::from_shape_vec(shape, data).wrap_err_with(|| format!("{name}: bad shape"))
}

pub fn rows<T: Clone>(array: &Array2<T>) -> Vec<Vec<T>> {
    array.outer_iter().map(|row| row.to_vec()).collect()
}

/// Pad ragged sequences with `pad`, returning the padded rows and their lengths.
pub fn pad_sequences(sequences: &[Vec<i32>], pad: i32) -> (Array2<i32>, Array1<i32>) {
    let width = sequences.iter().map(Vec::len).max().unwrap_or(0);
    let padded = Array2::from_shape_fn((sequences.len(), width), |(i, j)| {
        sequences[i].get(j).copied().unwrap_or(pad)
    });
    let lengths = sequences.iter().map(|s| s.len() as i32).collect();

    (padded, lengths)
}
