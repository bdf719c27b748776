//! Blocked transpose launch.

use crate::buffer::GpuBuffer;
use crate::config::TileConfig;
use crate::device::GpuDevice;
use crate::error::GemmError;
use crate::kernel::KernelCache;
use crate::shader;

/// Transpose a P×Q column-major buffer into a Q×P one.
///
/// Each workgroup stages one square block through workgroup scratch so
/// both the read and the write side stay coalesced; edge blocks clip to
/// the valid region.
pub fn transpose(
    device: &GpuDevice,
    cache: &mut KernelCache,
    config: &TileConfig,
    input: &GpuBuffer,
    p: usize,
    q: usize,
) -> Result<GpuBuffer, GemmError> {
    assert_eq!(input.len(), p * q, "input buffer is not {p}x{q}");
    config.validate()?;
    config.check_limits(&device.limits())?;

    let output = GpuBuffer::uninit(device, q * p);
    let wgsl = shader::transpose_wgsl(config);
    let groups = (
        (p as u32).div_ceil(config.transposex),
        (q as u32).div_ceil(config.transposey),
    );
    cache.dispatch_r_w(
        device,
        &wgsl,
        input,
        &output,
        &[p as u32, q as u32, 0, 0],
        groups,
    );
    Ok(output)
}
