use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::Shape;

/// Memory ordering of rank-4 feature maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Layout {
    #[default]
    Unknown,
    NHWC,
    NCHW,
}

impl Layout {
    /// `Unknown` behaves as NHWC.
    pub fn canonical(self) -> Layout {
        match self {
            Layout::Unknown => Layout::NHWC,
            other => other,
        }
    }

    pub fn matches(self, other: Layout) -> bool {
        self.canonical() == other.canonical()
    }
}

/// Batch/channel/height/width view of a rank-4 shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureShape {
    pub n: usize,
    pub c: usize,
    pub h: usize,
    pub w: usize,
}

impl FeatureShape {
    pub fn new(n: usize, h: usize, w: usize, c: usize) -> Self {
        Self { n, c, h, w }
    }

    /// Interprets `dims` under `layout`. `Unknown` is read as NHWC.
    pub fn from_dims(dims: &[usize], layout: Layout) -> Option<Self> {
        let [a, b, c, d] = <[usize; 4]>::try_from(dims).ok()?;
        Some(match layout {
            Layout::NCHW => Self { n: a, c: b, h: c, w: d },
            Layout::NHWC | Layout::Unknown => Self { n: a, h: b, w: c, c: d },
        })
    }

    /// `None` unless the shape is rank 4 with every extent known.
    pub fn from_shape(shape: &Shape, layout: Layout) -> Option<Self> {
        Self::from_dims(&shape.known_dims()?, layout)
    }

    pub fn to_dims(self, layout: Layout) -> [usize; 4] {
        match layout {
            Layout::NCHW => [self.n, self.c, self.h, self.w],
            Layout::NHWC | Layout::Unknown => [self.n, self.h, self.w, self.c],
        }
    }
}

impl FeatureShape {
    fn offset(&self, layout: Layout, n: usize, c: usize, h: usize, w: usize) -> usize {
        match layout.canonical() {
            Layout::NCHW => ((n * self.c + c) * self.h + h) * self.w + w,
            _ => ((n * self.h + h) * self.w + w) * self.c + c,
        }
    }
}

/// Re-expresses rank-4 `dims` from one layout in another. Other ranks pass through.
pub fn convert_dims(dims: &[usize], from: Layout, to: Layout) -> Vec<usize> {
    match FeatureShape::from_dims(dims, from) {
        Some(feature) if !from.matches(to) => feature.to_dims(to).to_vec(),
        _ => dims.to_vec(),
    }
}

/// Source positions that reorder a rank-4 buffer laid out as `from` into `to`.
///
/// `None` when no reordering is needed.
pub fn convert_indices(dims: &[usize], from: Layout, to: Layout) -> Option<Vec<usize>> {
    if from.matches(to) {
        return None;
    }
    let feature = FeatureShape::from_dims(dims, from)?;
    let mut indices = Vec::with_capacity(feature.n * feature.c * feature.h * feature.w);
    for n in 0..feature.n {
        match to.canonical() {
            Layout::NCHW => {
                for c in 0..feature.c {
                    for h in 0..feature.h {
                        for w in 0..feature.w {
                            indices.push(feature.offset(from, n, c, h, w));
                        }
                    }
                }
            }
            _ => {
                for h in 0..feature.h {
                    for w in 0..feature.w {
                        for c in 0..feature.c {
                            indices.push(feature.offset(from, n, c, h, w));
                        }
                    }
                }
            }
        }
    }
    Some(indices)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("axis {axis} is out of range for rank {rank}")]
pub struct AxisError {
    pub axis: i64,
    pub rank: usize,
}

/// Maps a possibly negative axis into `[0, rank)`.
pub fn normalize_axis(axis: i64, rank: usize) -> Result<usize, AxisError> {
    let signed_rank = rank as i64;
    let resolved = if axis < 0 { axis + signed_rank } else { axis };
    if (0..signed_rank).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(AxisError { axis, rank })
    }
}

/// Normalizes `axis` and translates it from the frontend layout to the backend one.
///
/// Only rank-4 tensors are layout dependent: an NCHW axis lands on its NHWC
/// position through the permutation `[0, 3, 1, 2]` and vice versa.
pub fn resolve_axis(
    axis: i64,
    rank: usize,
    frontend: Layout,
    backend: Layout,
) -> Result<usize, AxisError> {
    const NCHW_TO_NHWC: [usize; 4] = [0, 3, 1, 2];
    const NHWC_TO_NCHW: [usize; 4] = [0, 2, 3, 1];

    let resolved = normalize_axis(axis, rank)?;
    if rank != 4 {
        return Ok(resolved);
    }
    Ok(match (frontend.canonical(), backend.canonical()) {
        (Layout::NCHW, Layout::NHWC) => NCHW_TO_NHWC[resolved],
        (Layout::NHWC, Layout::NCHW) => NHWC_TO_NCHW[resolved],
        _ => resolved,
    })
}
