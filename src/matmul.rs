//! Orchestration: validate, pad, transpose, multiply, unpad.

use tracing::debug;

use crate::buffer::GpuBuffer;
use crate::config::TileConfig;
use crate::device::GpuDevice;
use crate::error::GemmError;
use crate::gemm::gemm;
use crate::kernel::KernelCache;
use crate::matrix::Matrix;
use crate::pad::{pad, unpad};
use crate::transpose::transpose;

/// GPU matrix multiply: C = A·B for arbitrary dimensions.
///
/// A is M×K and B is K×N, both column-major. The operands are zero-padded
/// to tile multiples, padded B is transposed, the tiled kernel runs over
/// the aligned buffers, and the padding is stripped from the result.
/// When a dimension is already aligned the corresponding pad or unpad
/// stage is skipped; the result is identical either way.
///
/// Launches are issued in dependency order on a single queue: the two pad
/// stages share no resources and may overlap, everything downstream waits
/// on its inputs through submission ordering.
pub fn matmul(
    device: &GpuDevice,
    cache: &mut KernelCache,
    config: &TileConfig,
    a: &Matrix,
    b: &Matrix,
) -> Result<Matrix, GemmError> {
    config.validate()?;

    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    if m == 0 || n == 0 || k == 0 {
        return Err(GemmError::Dimension(format!(
            "all dimensions must be positive, got {m}x{k} * {}x{n}",
            b.rows()
        )));
    }
    if b.rows() != k {
        return Err(GemmError::Dimension(format!(
            "inner dimensions do not match: {m}x{k} * {}x{n}",
            b.rows()
        )));
    }
    config.check_limits(&device.limits())?;

    let (mp, np, kp) = config.padded_dims(m, n, k);
    debug!("gemm {}x{}x{}, padded to {}x{}x{}", m, n, k, mp, np, kp);

    let a_buf = GpuBuffer::from_slice(device, a.data());
    let b_buf = GpuBuffer::from_slice(device, b.data());

    let a_padded = if mp == m && kp == k {
        a_buf
    } else {
        pad(device, cache, config, &a_buf, m, k, mp, kp)?
    };
    let b_padded = if kp == k && np == n {
        b_buf
    } else {
        pad(device, cache, config, &b_buf, k, n, kp, np)?
    };

    let b_transposed = transpose(device, cache, config, &b_padded, kp, np)?;
    let c_padded = gemm(device, cache, config, mp, np, kp, &a_padded, &b_transposed)?;

    let c_buf = if mp == m && np == n {
        c_padded
    } else {
        unpad(device, cache, config, &c_padded, mp, np, m, n)?
    };

    cache.flush(device);
    let data = c_buf.to_vec_sync(device);
    Ok(Matrix::from_vec(m, n, data))
}
