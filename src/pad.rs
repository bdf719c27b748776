//! Zero-padding and un-padding launches.

use crate::buffer::GpuBuffer;
use crate::config::TileConfig;
use crate::device::GpuDevice;
use crate::error::GemmError;
use crate::kernel::KernelCache;
use crate::shader;

/// Zero-extend a P×Q column-major buffer to Pxl×Qxl.
///
/// `output[i, j] = input[i, j]` inside the valid region, `0.0` outside.
/// Every output element is computed by an independent thread; there is no
/// ordering requirement between them.
pub fn pad(
    device: &GpuDevice,
    cache: &mut KernelCache,
    config: &TileConfig,
    input: &GpuBuffer,
    p: usize,
    q: usize,
    pxl: usize,
    qxl: usize,
) -> Result<GpuBuffer, GemmError> {
    assert!(pxl >= p && qxl >= q, "padded extent smaller than input");
    assert_eq!(input.len(), p * q, "input buffer is not {p}x{q}");
    config.validate()?;
    config.check_limits(&device.limits())?;

    let output = GpuBuffer::uninit(device, pxl * qxl);
    let wgsl = shader::pad_wgsl(config);
    let groups = (
        (pxl as u32).div_ceil(config.paddingx),
        (qxl as u32).div_ceil(config.paddingy),
    );
    cache.dispatch_r_w(
        device,
        &wgsl,
        input,
        &output,
        &[p as u32, q as u32, pxl as u32, qxl as u32],
        groups,
    );
    Ok(output)
}

/// Strip padding: copy the leading M×N block of an Mp×Np buffer.
pub fn unpad(
    device: &GpuDevice,
    cache: &mut KernelCache,
    config: &TileConfig,
    input: &GpuBuffer,
    mp: usize,
    np: usize,
    m: usize,
    n: usize,
) -> Result<GpuBuffer, GemmError> {
    assert!(mp >= m && np >= n, "padded extent smaller than output");
    assert_eq!(input.len(), mp * np, "input buffer is not {mp}x{np}");
    config.validate()?;
    config.check_limits(&device.limits())?;

    let output = GpuBuffer::uninit(device, m * n);
    let wgsl = shader::unpad_wgsl(config);
    let groups = (
        (m as u32).div_ceil(config.paddingx),
        (n as u32).div_ceil(config.paddingy),
    );
    cache.dispatch_r_w(
        device,
        &wgsl,
        input,
        &output,
        &[mp as u32, np as u32, m as u32, n as u32],
        groups,
    );
    Ok(output)
}
