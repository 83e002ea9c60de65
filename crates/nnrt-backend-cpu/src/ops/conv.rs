//! NHWC convolutions. Kernels are `[out, kh, kw, in]` for regular
//! convolution and `[1, kh, kw, in * multiplier]` for depthwise.

use std::sync::Arc;

use nnrt::ir::{
    calculate_padding, Activation, Conv2DParams, DepthwiseConv2DParams, ExplicitPadding,
    FeatureShape, Layout, Padding, Stride,
};
use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::{apply_activation, f32_values, require_float};

/// Window geometry shared by convolutions and pooling.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Window {
    pub padding: Padding,
    pub stride: Stride,
    /// Resolved at generation time when every extent was known.
    pub explicit: Option<ExplicitPadding>,
}

impl Window {
    pub(crate) fn resolve(
        &self,
        kernel: &'static str,
        ifm: &FeatureShape,
        ofm: &FeatureShape,
        kernel_width: usize,
        kernel_height: usize,
    ) -> KernelResult<ExplicitPadding> {
        match self.explicit {
            Some(padding) => Ok(padding),
            None => calculate_padding(
                &self.padding,
                ifm,
                ofm,
                &self.stride,
                kernel_width,
                kernel_height,
            )
            .map_err(|err| KernelError::execution(kernel, err.to_string())),
        }
    }
}

pub(crate) fn feature_shape(kernel: &'static str, tensor: &Tensor) -> KernelResult<FeatureShape> {
    let dims = tensor.resolved_dims()?;
    FeatureShape::from_dims(&dims, Layout::NHWC).ok_or_else(|| {
        KernelError::execution(kernel, format!("{} must be rank 4, got {dims:?}", tensor.index()))
    })
}

pub struct ConvolutionKernel {
    input: Arc<Tensor>,
    kernel: Arc<Tensor>,
    bias: Arc<Tensor>,
    output: Arc<Tensor>,
    window: Window,
    activation: Activation,
}

impl ConvolutionKernel {
    pub fn configure(
        input: Arc<Tensor>,
        kernel: Arc<Tensor>,
        bias: Arc<Tensor>,
        output: Arc<Tensor>,
        params: &Conv2DParams,
        explicit: Option<ExplicitPadding>,
    ) -> KernelResult<Self> {
        require_float("Conv2D", &[&input, &kernel, &bias, &output])?;
        Ok(Self {
            input,
            kernel,
            bias,
            output,
            window: Window {
                padding: params.padding,
                stride: params.stride,
                explicit,
            },
            activation: params.activation,
        })
    }
}

impl Kernel for ConvolutionKernel {
    fn name(&self) -> &'static str {
        "Conv2D"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let ifm = feature_shape("Conv2D", &self.input)?;
        let ofm = feature_shape("Conv2D", &self.output)?;
        let ker = self.kernel.resolved_dims()?;
        let [out_c, kh, kw, in_c] = <[usize; 4]>::try_from(ker.as_slice())
            .map_err(|_| KernelError::execution("Conv2D", "kernel must be rank 4"))?;
        if in_c != ifm.c || out_c != ofm.c {
            return Err(KernelError::execution(
                "Conv2D",
                format!("kernel {ker:?} does not map {} to {} channels", ifm.c, ofm.c),
            ));
        }
        let pad = self.window.resolve("Conv2D", &ifm, &ofm, kw, kh)?;

        let input = self.input.data()?;
        let weights = self.kernel.data()?;
        let bias = self.bias.data()?;
        let (x, w, b) = (
            f32_values("Conv2D", &input)?,
            f32_values("Conv2D", &weights)?,
            f32_values("Conv2D", &bias)?,
        );
        let (sv, sh) = (
            self.window.stride.vertical as isize,
            self.window.stride.horizontal as isize,
        );

        let mut result = vec![0.0f32; ofm.n * ofm.h * ofm.w * ofm.c];
        for n in 0..ofm.n {
            for oy in 0..ofm.h {
                for ox in 0..ofm.w {
                    let base_y = oy as isize * sv - pad.top as isize;
                    let base_x = ox as isize * sh - pad.left as isize;
                    for oc in 0..out_c {
                        let mut acc = b.get(oc).copied().unwrap_or(0.0);
                        for ky in 0..kh {
                            let iy = base_y + ky as isize;
                            if iy < 0 || iy >= ifm.h as isize {
                                continue;
                            }
                            for kx in 0..kw {
                                let ix = base_x + kx as isize;
                                if ix < 0 || ix >= ifm.w as isize {
                                    continue;
                                }
                                let in_base =
                                    ((n * ifm.h + iy as usize) * ifm.w + ix as usize) * ifm.c;
                                let w_base = ((oc * kh + ky) * kw + kx) * in_c;
                                for ic in 0..in_c {
                                    acc += x[in_base + ic] * w[w_base + ic];
                                }
                            }
                        }
                        result[((n * ofm.h + oy) * ofm.w + ox) * ofm.c + oc] =
                            apply_activation(acc, self.activation);
                    }
                }
            }
        }
        self.output.store(result.into())
    }
}

pub struct DepthwiseConvolutionKernel {
    input: Arc<Tensor>,
    kernel: Arc<Tensor>,
    bias: Arc<Tensor>,
    output: Arc<Tensor>,
    window: Window,
    multiplier: usize,
    activation: Activation,
}

impl DepthwiseConvolutionKernel {
    pub fn configure(
        input: Arc<Tensor>,
        kernel: Arc<Tensor>,
        bias: Arc<Tensor>,
        output: Arc<Tensor>,
        params: &DepthwiseConv2DParams,
        explicit: Option<ExplicitPadding>,
    ) -> KernelResult<Self> {
        require_float("DepthwiseConv2D", &[&input, &kernel, &bias, &output])?;
        if params.multiplier == 0 {
            return Err(KernelError::execution(
                "DepthwiseConv2D",
                "depth multiplier must be positive",
            ));
        }
        Ok(Self {
            input,
            kernel,
            bias,
            output,
            window: Window {
                padding: params.padding,
                stride: params.stride,
                explicit,
            },
            multiplier: params.multiplier as usize,
            activation: params.activation,
        })
    }
}

impl Kernel for DepthwiseConvolutionKernel {
    fn name(&self) -> &'static str {
        "DepthwiseConv2D"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let ifm = feature_shape("DepthwiseConv2D", &self.input)?;
        let ofm = feature_shape("DepthwiseConv2D", &self.output)?;
        let ker = self.kernel.resolved_dims()?;
        let [_, kh, kw, out_c] = <[usize; 4]>::try_from(ker.as_slice())
            .map_err(|_| KernelError::execution("DepthwiseConv2D", "kernel must be rank 4"))?;
        if out_c != ifm.c * self.multiplier || out_c != ofm.c {
            return Err(KernelError::execution(
                "DepthwiseConv2D",
                format!(
                    "kernel {ker:?} does not expand {} channels by {}",
                    ifm.c, self.multiplier
                ),
            ));
        }
        let pad = self.window.resolve("DepthwiseConv2D", &ifm, &ofm, kw, kh)?;

        let input = self.input.data()?;
        let weights = self.kernel.data()?;
        let bias = self.bias.data()?;
        let (x, w, b) = (
            f32_values("DepthwiseConv2D", &input)?,
            f32_values("DepthwiseConv2D", &weights)?,
            f32_values("DepthwiseConv2D", &bias)?,
        );
        let (sv, sh) = (
            self.window.stride.vertical as isize,
            self.window.stride.horizontal as isize,
        );

        let mut result = vec![0.0f32; ofm.n * ofm.h * ofm.w * ofm.c];
        for n in 0..ofm.n {
            for oy in 0..ofm.h {
                for ox in 0..ofm.w {
                    let base_y = oy as isize * sv - pad.top as isize;
                    let base_x = ox as isize * sh - pad.left as isize;
                    for oc in 0..out_c {
                        let ic = oc / self.multiplier;
                        let mut acc = b.get(oc).copied().unwrap_or(0.0);
                        for ky in 0..kh {
                            let iy = base_y + ky as isize;
                            if iy < 0 || iy >= ifm.h as isize {
                                continue;
                            }
                            for kx in 0..kw {
                                let ix = base_x + kx as isize;
                                if ix < 0 || ix >= ifm.w as isize {
                                    continue;
                                }
                                let xi = ((n * ifm.h + iy as usize) * ifm.w + ix as usize) * ifm.c
                                    + ic;
                                acc += x[xi] * w[(ky * kw + kx) * out_c + oc];
                            }
                        }
                        result[((n * ofm.h + oy) * ofm.w + ox) * ofm.c + oc] =
                            apply_activation(acc, self.activation);
                    }
                }
            }
        }
        self.output.store(result.into())
    }
}
