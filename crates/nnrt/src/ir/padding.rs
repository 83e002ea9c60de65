use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::layout::FeatureShape;
use super::types::Stride;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExplicitPadding {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

/// Padding policy declared on a convolution or pooling operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Padding {
    Explicit(ExplicitPadding),
    Same,
    #[default]
    Valid,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaddingError {
    #[error("stride must be positive, got {vertical}x{horizontal}")]
    ZeroStride { vertical: u32, horizontal: u32 },
    #[error("SAME padding expects {axis} output extent {expected}, got {actual}")]
    OutputMismatch {
        axis: &'static str,
        expected: usize,
        actual: usize,
    },
}

fn same_total(input: usize, output: usize, stride: usize, kernel: usize) -> usize {
    let needed = (output.saturating_sub(1)) * stride + kernel;
    needed.saturating_sub(input)
}

/// Resolves a padding policy into concrete amounts.
///
/// SAME requires the output extents to equal `ceil(input / stride)`.
pub fn calculate_padding(
    padding: &Padding,
    ifm: &FeatureShape,
    ofm: &FeatureShape,
    stride: &Stride,
    kernel_width: usize,
    kernel_height: usize,
) -> Result<ExplicitPadding, PaddingError> {
    if stride.vertical == 0 || stride.horizontal == 0 {
        return Err(PaddingError::ZeroStride {
            vertical: stride.vertical,
            horizontal: stride.horizontal,
        });
    }
    match padding {
        Padding::Explicit(explicit) => Ok(*explicit),
        Padding::Valid => Ok(ExplicitPadding::default()),
        Padding::Same => {
            let sv = stride.vertical as usize;
            let sh = stride.horizontal as usize;
            let expected_h = ifm.h.div_ceil(sv);
            let expected_w = ifm.w.div_ceil(sh);
            if expected_h != ofm.h {
                return Err(PaddingError::OutputMismatch {
                    axis: "height",
                    expected: expected_h,
                    actual: ofm.h,
                });
            }
            if expected_w != ofm.w {
                return Err(PaddingError::OutputMismatch {
                    axis: "width",
                    expected: expected_w,
                    actual: ofm.w,
                });
            }
            let vertical = same_total(ifm.h, expected_h, sv, kernel_height);
            let horizontal = same_total(ifm.w, expected_w, sh, kernel_width);
            Ok(ExplicitPadding {
                top: (vertical / 2) as u32,
                bottom: vertical.div_ceil(2) as u32,
                left: (horizontal / 2) as u32,
                right: horizontal.div_ceil(2) as u32,
            })
        }
    }
}

/// Output extent along one spatial axis for a window of `kernel` elements.
pub fn output_extent(
    padding: &Padding,
    input: usize,
    kernel: usize,
    stride: u32,
    vertical: bool,
) -> Option<usize> {
    let stride = stride as usize;
    if stride == 0 {
        return None;
    }
    match padding {
        Padding::Same => Some(input.div_ceil(stride)),
        Padding::Valid => Some(input.checked_sub(kernel)? / stride + 1),
        Padding::Explicit(explicit) => {
            let (before, after) = if vertical {
                (explicit.top, explicit.bottom)
            } else {
                (explicit.left, explicit.right)
            };
            let padded = input + before as usize + after as usize;
            Some(padded.checked_sub(kernel)? / stride + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn same_padding_splits_extra_row_to_bottom() {
        let ifm = FeatureShape::new(1, 5, 5, 1);
        let ofm = FeatureShape::new(1, 3, 3, 1);
        let padding = calculate_padding(&Padding::Same, &ifm, &ofm, &Stride::new(2, 2), 2, 2)
            .expect("same padding");
        assert_eq!(
            padding,
            ExplicitPadding {
                left: 0,
                right: 1,
                top: 0,
                bottom: 1
            }
        );
    }

    #[test]
    fn same_padding_rejects_inconsistent_output() {
        let ifm = FeatureShape::new(1, 4, 4, 1);
        let ofm = FeatureShape::new(1, 3, 4, 1);
        let err = calculate_padding(&Padding::Same, &ifm, &ofm, &Stride::default(), 3, 3)
            .expect_err("mismatched output height");
        assert!(matches!(err, PaddingError::OutputMismatch { axis: "height", .. }));
    }

    #[test]
    fn valid_and_explicit_are_taken_verbatim() {
        let ifm = FeatureShape::new(1, 4, 4, 1);
        let ofm = FeatureShape::new(1, 2, 2, 1);
        let valid = calculate_padding(&Padding::Valid, &ifm, &ofm, &Stride::default(), 3, 3)
            .expect("valid");
        assert_eq!(valid, ExplicitPadding::default());

        let explicit = ExplicitPadding {
            left: 1,
            right: 2,
            top: 3,
            bottom: 4,
        };
        let resolved = calculate_padding(
            &Padding::Explicit(explicit),
            &ifm,
            &ofm,
            &Stride::default(),
            3,
            3,
        )
        .expect("explicit");
        assert_eq!(resolved, explicit);
    }

    #[test]
    fn output_extent_matches_policies() {
        assert_eq!(output_extent(&Padding::Same, 5, 3, 2, true), Some(3));
        assert_eq!(output_extent(&Padding::Valid, 5, 3, 2, true), Some(2));
        assert_eq!(output_extent(&Padding::Valid, 2, 3, 1, true), None);
        assert_eq!(output_extent(&Padding::Valid, 3, 3, 1, true), Some(1));
        assert_eq!(output_extent(&Padding::Valid, 4, 6, 2, false), None);
        let explicit = Padding::Explicit(ExplicitPadding {
            left: 1,
            right: 1,
            top: 0,
            bottom: 0,
        });
        assert_eq!(output_extent(&explicit, 4, 3, 1, false), Some(4));
    }

    proptest! {
        #[test]
        fn same_padding_is_deterministic(
            h in 1usize..32,
            w in 1usize..32,
            sv in 1u32..4,
            sh in 1u32..4,
            kh in 1usize..6,
            kw in 1usize..6,
        ) {
            let ifm = FeatureShape::new(1, h, w, 3);
            let ofm = FeatureShape::new(1, h.div_ceil(sv as usize), w.div_ceil(sh as usize), 3);
            let stride = Stride::new(sv, sh);
            let first = calculate_padding(&Padding::Same, &ifm, &ofm, &stride, kw, kh)
                .expect("first");
            let second = calculate_padding(&Padding::Same, &ifm, &ofm, &stride, kw, kh)
                .expect("second");
            prop_assert_eq!(first, second);
            prop_assert!(first.bottom >= first.top && first.bottom - first.top <= 1);
            prop_assert!(first.right >= first.left && first.right - first.left <= 1);
        }
    }
}
