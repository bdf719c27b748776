//! Tiled single-precision matrix multiply on the GPU via wgpu.
//!
//! The multiply runs as a family of generated WGSL compute kernels: the
//! operands are zero-padded to tile multiples, B is transposed through a
//! blocked shared-scratch kernel, a register-blocked tiled kernel computes
//! the product over the aligned buffers, and the padding is stripped from
//! the result. Tiling parameters live in [`TileConfig`]; each distinct
//! configuration compiles to its own cached kernel variants.

mod buffer;
mod config;
mod device;
mod error;
mod gemm;
mod kernel;
mod matmul;
mod matrix;
mod pad;
mod shader;
mod transpose;

pub use buffer::GpuBuffer;
pub use config::TileConfig;
pub use device::{GpuDevice, GpuError};
pub use error::GemmError;
pub use gemm::gemm;
pub use kernel::KernelCache;
pub use matmul::matmul;
pub use matrix::{matmul_naive, Matrix};
pub use pad::{pad, unpad};
pub use transpose::transpose;
