//! The core tiled GEMM launch.

use crate::buffer::GpuBuffer;
use crate::config::TileConfig;
use crate::device::GpuDevice;
use crate::error::GemmError;
use crate::kernel::KernelCache;
use crate::shader;

/// Launch the register-blocked GEMM over tile-aligned operands.
///
/// `a_padded` is Mp×Kp and `b_transposed` is Np×Kp (the transposed, padded
/// B), both column-major; the result is the padded Mp×Np product. The
/// dimensions must be exact multiples of the configured tile sizes; the
/// caller guarantees this and the kernel itself performs no bounds checks.
pub fn gemm(
    device: &GpuDevice,
    cache: &mut KernelCache,
    config: &TileConfig,
    mp: usize,
    np: usize,
    kp: usize,
    a_padded: &GpuBuffer,
    b_transposed: &GpuBuffer,
) -> Result<GpuBuffer, GemmError> {
    assert_eq!(
        (mp % config.tsm as usize, np % config.tsn as usize, kp % config.tsk as usize),
        (0, 0, 0),
        "padded dims {mp}x{np}x{kp} are not tile multiples"
    );
    assert_eq!(a_padded.len(), mp * kp, "A buffer is not {mp}x{kp}");
    assert_eq!(b_transposed.len(), np * kp, "B^T buffer is not {np}x{kp}");
    config.validate()?;
    config.check_limits(&device.limits())?;

    let output = GpuBuffer::uninit(device, mp * np);
    let wgsl = shader::gemm_wgsl(config);
    let groups = (mp as u32 / config.tsm, np as u32 / config.tsn);
    cache.dispatch_rr_w(
        device,
        &wgsl,
        a_padded,
        b_transposed,
        &output,
        &[mp as u32, np as u32, kp as u32, 0],
        groups,
    );
    Ok(output)
}
