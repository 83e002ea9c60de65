use std::sync::Arc;

use nnrt::ir::{Activation, ExplicitPadding, Pool2DParams};
use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::conv::{feature_shape, Window};
use super::utils::{apply_activation, f32_values, require_float};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolType {
    Max,
    Avg,
}

impl PoolType {
    fn name(self) -> &'static str {
        match self {
            PoolType::Max => "MaxPool2D",
            PoolType::Avg => "AvgPool2D",
        }
    }
}

/// Spatial pooling over NHWC tensors. Padded positions never contribute;
/// averages divide by the number of in-bounds elements.
pub struct PoolKernel {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
    pool: PoolType,
    window: Window,
    kernel_height: usize,
    kernel_width: usize,
    activation: Activation,
}

impl PoolKernel {
    pub fn configure(
        input: Arc<Tensor>,
        output: Arc<Tensor>,
        pool: PoolType,
        params: &Pool2DParams,
        explicit: Option<ExplicitPadding>,
    ) -> KernelResult<Self> {
        require_float(pool.name(), &[&input, &output])?;
        if params.kernel_height == 0 || params.kernel_width == 0 {
            return Err(KernelError::execution(pool.name(), "empty pooling window"));
        }
        Ok(Self {
            input,
            output,
            pool,
            window: Window {
                padding: params.padding,
                stride: params.stride,
                explicit,
            },
            kernel_height: params.kernel_height as usize,
            kernel_width: params.kernel_width as usize,
            activation: params.activation,
        })
    }
}

impl Kernel for PoolKernel {
    fn name(&self) -> &'static str {
        self.pool.name()
    }

    fn execute(&mut self) -> KernelResult<()> {
        let name = self.pool.name();
        let ifm = feature_shape(name, &self.input)?;
        let ofm = feature_shape(name, &self.output)?;
        if ifm.n != ofm.n || ifm.c != ofm.c {
            return Err(KernelError::execution(name, "pooling cannot change batch or depth"));
        }
        let pad = self
            .window
            .resolve(name, &ifm, &ofm, self.kernel_width, self.kernel_height)?;
        let data = self.input.data()?;
        let x = f32_values(name, &data)?;
        let (sv, sh) = (
            self.window.stride.vertical as isize,
            self.window.stride.horizontal as isize,
        );

        let mut result = vec![0.0f32; ofm.n * ofm.h * ofm.w * ofm.c];
        for n in 0..ofm.n {
            for oy in 0..ofm.h {
                let y0 = oy as isize * sv - pad.top as isize;
                let y_range = y0.max(0)..(y0 + self.kernel_height as isize).min(ifm.h as isize);
                for ox in 0..ofm.w {
                    let x0 = ox as isize * sh - pad.left as isize;
                    let x_range =
                        x0.max(0)..(x0 + self.kernel_width as isize).min(ifm.w as isize);
                    for c in 0..ofm.c {
                        let mut count = 0usize;
                        let mut acc = match self.pool {
                            PoolType::Max => f32::NEG_INFINITY,
                            PoolType::Avg => 0.0,
                        };
                        for iy in y_range.clone() {
                            for ix in x_range.clone() {
                                let value =
                                    x[((n * ifm.h + iy as usize) * ifm.w + ix as usize) * ifm.c + c];
                                acc = match self.pool {
                                    PoolType::Max => acc.max(value),
                                    PoolType::Avg => acc + value,
                                };
                                count += 1;
                            }
                        }
                        let value = match self.pool {
                            PoolType::Max if count == 0 => 0.0,
                            PoolType::Max => acc,
                            PoolType::Avg if count == 0 => 0.0,
                            PoolType::Avg => acc / count as f32,
                        };
                        result[((n * ofm.h + oy) * ofm.w + ox) * ofm.c + c] =
                            apply_activation(value, self.activation);
                    }
                }
            }
        }
        self.output.store(result.into())
    }
}
