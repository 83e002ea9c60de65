//! Reference kernels. Every kernel is configured by an inherent `configure`
//! constructor and run through [`nnrt::Kernel::execute`].

pub mod binary;
pub mod concat;
pub mod conv;
pub mod fill;
pub mod fully_connected;
pub mod gather;
pub mod one_hot;
pub mod pad;
pub mod pool;
pub mod reduce;
pub mod reshape;
pub mod select;
pub mod slice;
pub mod softmax;
pub mod tile;
pub mod transpose;
pub mod unary;
mod utils;

pub use binary::{ArithmeticType, BinaryArithmeticKernel, ComparisonKernel, LogicalOrKernel};
pub use concat::{ConcatKernel, JoinMode, SplitKernel, SplitMode};
pub use conv::{ConvolutionKernel, DepthwiseConvolutionKernel};
pub use fill::{FillKernel, RangeKernel, ShapeKernel};
pub use fully_connected::FullyConnectedKernel;
pub use gather::GatherKernel;
pub use one_hot::OneHotKernel;
pub use pad::PadKernel;
pub use pool::{PoolKernel, PoolType};
pub use reduce::{ArgMaxKernel, ReduceKernel};
pub use reshape::ReshapeKernel;
pub use select::SelectKernel;
pub use slice::{SliceKernel, StridedSliceKernel};
pub use softmax::SoftmaxKernel;
pub use tile::{ReverseKernel, TileKernel};
pub use transpose::TransposeKernel;
pub use unary::{CastKernel, ElementwiseUnaryKernel, LogicalNotKernel, UnaryType, ZerosLikeKernel};
