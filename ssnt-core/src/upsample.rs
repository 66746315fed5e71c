//! Expansion of per-unit durations into a frame-level source alignment.

use crate::error::{Error, Result, ensure_non_negative, ensure_shape};
use ndarray::{Array3, ArrayView1, ArrayView2, ArrayView3, ArrayViewMut1, Axis, Zip, s};

/// Map every output frame to the source unit that owns it.
///
/// `duration` is `(batch, beam_width, max_t)` frame counts per unit and
/// `output_length` is `(batch, beam_width)`. Unit `u` owns frames
/// `[sum(duration[..u]), sum(duration[..=u]))`; owned frames below
/// `output_length` receive `u`. Everything else, including frames a short
/// duration sequence never reaches, keeps `out_of_range_source_index`.
///
/// The result is `(batch, beam_width, max_u)`.
pub fn upsample_source_indexes(
    duration: ArrayView3<'_, i32>,
    output_length: ArrayView2<'_, i32>,
    max_u: usize,
    out_of_range_source_index: i32,
) -> Result<Array3<i32>> {
    let (batch_size, beam_width, max_t) = duration.dim();
    ensure_shape(
        "output_length",
        &[batch_size, beam_width],
        output_length.shape(),
    )?;
    ensure_non_negative("duration", duration)?;
    ensure_non_negative("output_length", output_length)?;

    if out_of_range_source_index >= 0 && (out_of_range_source_index as usize) < max_t {
        return Err(Error::value(
            "out_of_range_source_index",
            &[],
            out_of_range_source_index,
            "collides with a valid source index",
        ));
    }

    let mut upsampled = Array3::from_elem(
        (batch_size, beam_width, max_u),
        out_of_range_source_index,
    );

    Zip::from(upsampled.lanes_mut(Axis(2)))
        .and(duration.lanes(Axis(2)))
        .and(output_length)
        .par_for_each(|out, duration, &output_length| {
            upsample_lane(duration, output_length as usize, out)
        });

    tracing::debug!(batch_size, beam_width, max_t, max_u, "upsampled source indexes");

    Ok(upsampled)
}

fn upsample_lane(
    duration: ArrayView1<'_, i32>,
    output_length: usize,
    mut out: ArrayViewMut1<'_, i32>,
) {
    let end = output_length.min(out.len());
    let mut start = 0;

    for (u, &d) in duration.iter().enumerate() {
        if start >= end {
            break;
        }
        let stop = (start + d as usize).min(end);
        out.slice_mut(s![start..stop]).fill(u as i32);
        start += d as usize;
    }
}
