//! WGSL source generation for the four kernels.
//!
//! Tiling parameters are substituted into the shader text as constants, so
//! each distinct `TileConfig` yields a distinct shader variant. The kernel
//! cache deduplicates compilation by hashing the generated source.

use crate::config::TileConfig;

/// Storage-binding element type for a given vector width.
fn vec_ty(width: u32) -> &'static str {
    match width {
        1 => "f32",
        2 => "vec2<f32>",
        4 => "vec4<f32>",
        _ => unreachable!("vector width validated to 1, 2, or 4"),
    }
}

/// The staging loop that moves one operand tile from storage into scratch.
///
/// Each thread performs `lpt / width` loads; the source index is derived
/// from the linearized thread id so that consecutive threads touch
/// consecutive addresses. Wide loads are unpacked component-wise into
/// scratch, which is addressed `[k][spatial]` with stride `stride`.
fn staging_loop(
    buf: &str,
    scratch: &str,
    tile_span: u32,
    stride: u32,
    lead_dim: &str,
    offset: &str,
    loads: u32,
    width: u32,
) -> String {
    let body = match width {
        1 => format!(
            "            {scratch}[col * {stride}u + row] = \
{buf}[(t * TSK + col) * {lead_dim} + {offset} + row];"
        ),
        2 => format!(
            "            let v = {buf}[(t * TSK + col) * ({lead_dim} / 2u) + {offset} / 2u + row];\n\
             \x20           {scratch}[col * {stride}u + 2u * row + 0u] = v.x;\n\
             \x20           {scratch}[col * {stride}u + 2u * row + 1u] = v.y;"
        ),
        4 => format!(
            "            let v = {buf}[(t * TSK + col) * ({lead_dim} / 4u) + {offset} / 4u + row];\n\
             \x20           {scratch}[col * {stride}u + 4u * row + 0u] = v.x;\n\
             \x20           {scratch}[col * {stride}u + 4u * row + 1u] = v.y;\n\
             \x20           {scratch}[col * {stride}u + 4u * row + 2u] = v.z;\n\
             \x20           {scratch}[col * {stride}u + 4u * row + 3u] = v.w;"
        ),
        _ => unreachable!(),
    };
    let vec_span = tile_span / width;
    format!(
        "        for (var l = 0u; l < {loads}u; l = l + 1u) {{\n\
         \x20           let id = l * THREADS + tid;\n\
         \x20           let row = id % {vec_span}u;\n\
         \x20           let col = id / {vec_span}u;\n\
         {body}\n\
         \x20       }}"
    )
}

/// Register-blocked GEMM over tile-aligned operands: C = A·Bᵗ.
///
/// Bindings: 0 = padded A (Mp×Kp), 1 = transposed padded B (Np×Kp),
/// 2 = padded C (Mp×Np), 3 = dims uniform. All column-major. The kernel
/// assumes the dims are exact tile multiples and performs no bounds checks.
pub(crate) fn gemm_wgsl(config: &TileConfig) -> String {
    let w = config.vector_width;
    let rtsm = config.rtsm();
    let rtsn = config.rtsn();
    let bstride = config.b_stride();
    let a_loads = config.lpta() / w;
    let b_loads = config.lptb() / w;
    let a_stage = staging_loop("a", "asub", config.tsm, config.tsm, "dims.mp", "offset_m", a_loads, w);
    let b_stage = staging_loop("bt", "bsub", config.tsn, bstride, "dims.np", "offset_n", b_loads, w);
    format!(
        r#"// Tiled register-blocked GEMM: C = A * B^T over padded column-major buffers.

struct Dims {{
    mp: u32,
    np: u32,
    kp: u32,
    _pad: u32,
}}

@group(0) @binding(0) var<storage, read> a: array<{elem}>;
@group(0) @binding(1) var<storage, read> bt: array<{elem}>;
@group(0) @binding(2) var<storage, read_write> c: array<f32>;
@group(0) @binding(3) var<uniform> dims: Dims;

const TSM: u32 = {tsm}u;
const TSN: u32 = {tsn}u;
const TSK: u32 = {tsk}u;
const WPTM: u32 = {wptm}u;
const WPTN: u32 = {wptn}u;
const RTSM: u32 = {rtsm}u;
const RTSN: u32 = {rtsn}u;
const THREADS: u32 = {threads}u;
const BSTRIDE: u32 = {bstride}u;

var<workgroup> asub: array<f32, {a_scratch}>;
var<workgroup> bsub: array<f32, {b_scratch}>;

@compute @workgroup_size({rtsm}, {rtsn})
fn main(
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(local_invocation_id) lid: vec3<u32>,
) {{
    let tidm = lid.x;
    let tidn = lid.y;
    let offset_m = wid.x * TSM;
    let offset_n = wid.y * TSN;
    let tid = tidn * RTSM + tidm;

    var breg: array<f32, WPTN>;
    var acc: array<f32, {acc_len}>;
    for (var i = 0u; i < {acc_len}u; i = i + 1u) {{
        acc[i] = 0.0;
    }}

    let num_tiles = dims.kp / TSK;
    for (var t = 0u; t < num_tiles; t = t + 1u) {{
{a_stage}
{b_stage}

        workgroupBarrier();

        for (var kk = 0u; kk < TSK; kk = kk + 1u) {{
            for (var wn = 0u; wn < WPTN; wn = wn + 1u) {{
                breg[wn] = bsub[kk * BSTRIDE + tidn + wn * RTSN];
            }}
            for (var wm = 0u; wm < WPTM; wm = wm + 1u) {{
                let areg = asub[kk * TSM + tidm + wm * RTSM];
                for (var wn = 0u; wn < WPTN; wn = wn + 1u) {{
                    acc[wm * WPTN + wn] = fma(areg, breg[wn], acc[wm * WPTN + wn]);
                }}
            }}
        }}

        workgroupBarrier();
    }}

    for (var wm = 0u; wm < WPTM; wm = wm + 1u) {{
        let grow = offset_m + tidm + wm * RTSM;
        for (var wn = 0u; wn < WPTN; wn = wn + 1u) {{
            let gcol = offset_n + tidn + wn * RTSN;
            c[gcol * dims.mp + grow] = acc[wm * WPTN + wn];
        }}
    }}
}}
"#,
        elem = vec_ty(w),
        tsm = config.tsm,
        tsn = config.tsn,
        tsk = config.tsk,
        wptm = config.wptm,
        wptn = config.wptn,
        rtsm = rtsm,
        rtsn = rtsn,
        threads = config.threads(),
        bstride = bstride,
        a_scratch = config.tsk * config.tsm,
        b_scratch = config.tsk * bstride,
        acc_len = config.wptm * config.wptn,
        a_stage = a_stage,
        b_stage = b_stage,
    )
}

/// Blocked transpose through workgroup scratch: input P×Q → output Q×P.
///
/// Each block is read with stride-1 loads, barriered, then written with
/// thread roles swapped across the diagonal so the stores are stride-1 as
/// well. Edge blocks clip both phases to the valid extents.
pub(crate) fn transpose_wgsl(config: &TileConfig) -> String {
    let tx = config.transposex;
    format!(
        r#"// Blocked transpose: output[j, i] = input[i, j], column-major.

struct Dims {{
    p: u32,
    q: u32,
    _pad0: u32,
    _pad1: u32,
}}

@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;
@group(0) @binding(2) var<uniform> dims: Dims;

const TX: u32 = {tx}u;

var<workgroup> tile: array<f32, {scratch}>;

@compute @workgroup_size({tx}, {tx})
fn main(
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(local_invocation_id) lid: vec3<u32>,
) {{
    let tx = lid.x;
    let ty = lid.y;
    let row = wid.x * TX + tx;
    let col = wid.y * TX + ty;
    if (row < dims.p && col < dims.q) {{
        tile[ty * TX + tx] = src[col * dims.p + row];
    }}

    workgroupBarrier();

    let t_row = wid.y * TX + tx;
    let t_col = wid.x * TX + ty;
    if (t_row < dims.q && t_col < dims.p) {{
        dst[t_col * dims.q + t_row] = tile[tx * TX + ty];
    }}
}}
"#,
        tx = tx,
        scratch = tx * tx,
    )
}

/// Zero-extend a P×Q matrix to Pxl×Qxl. One thread per output element.
pub(crate) fn pad_wgsl(config: &TileConfig) -> String {
    format!(
        r#"// Zero padding: copy the valid region, zero-fill the extension.

struct Dims {{
    p: u32,
    q: u32,
    pxl: u32,
    qxl: u32,
}}

@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;
@group(0) @binding(2) var<uniform> dims: Dims;

@compute @workgroup_size({px}, {py})
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let i = gid.x;
    let j = gid.y;
    if (i >= dims.pxl || j >= dims.qxl) {{
        return;
    }}
    var value = 0.0;
    if (i < dims.p && j < dims.q) {{
        value = src[j * dims.p + i];
    }}
    dst[j * dims.pxl + i] = value;
}}
"#,
        px = config.paddingx,
        py = config.paddingy,
    )
}

/// Strip the padded region: copy the leading M×N block of an Mp×Np buffer.
pub(crate) fn unpad_wgsl(config: &TileConfig) -> String {
    format!(
        r#"// Remove padding: output is the leading MxN block of the padded input.

struct Dims {{
    mp: u32,
    np: u32,
    m: u32,
    n: u32,
}}

@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;
@group(0) @binding(2) var<uniform> dims: Dims;

@compute @workgroup_size({px}, {py})
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let i = gid.x;
    let j = gid.y;
    if (i >= dims.m || j >= dims.n) {{
        return;
    }}
    dst[j * dims.m + i] = src[j * dims.mp + i];
}}
"#,
        px = config.paddingx,
        py = config.paddingy,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemm_shader_reflects_config() {
        let cfg = TileConfig::default();
        let wgsl = gemm_wgsl(&cfg);
        assert!(wgsl.contains("@workgroup_size(16, 16)"));
        assert!(wgsl.contains("array<vec4<f32>>"));
        assert!(wgsl.contains("const BSTRIDE: u32 = 66u;"));
        assert!(wgsl.contains("var<workgroup> asub: array<f32, 1024>;"));
        assert!(wgsl.contains("var<workgroup> bsub: array<f32, 1056>;"));
    }

    #[test]
    fn gemm_shader_scalar_loads() {
        let cfg = TileConfig {
            tsm: 16,
            tsn: 16,
            tsk: 8,
            wptm: 2,
            wptn: 2,
            vector_width: 1,
            ..TileConfig::default()
        };
        let wgsl = gemm_wgsl(&cfg);
        assert!(wgsl.contains("var<storage, read> a: array<f32>;"));
        assert!(!wgsl.contains("vec4"));
        // 16 not a bank multiple: no layout padding.
        assert!(wgsl.contains("const BSTRIDE: u32 = 16u;"));
    }

    #[test]
    fn gemm_shader_has_both_barriers() {
        let wgsl = gemm_wgsl(&TileConfig::default());
        assert_eq!(wgsl.matches("workgroupBarrier();").count(), 2);
    }

    #[test]
    fn transpose_shader_square_block() {
        let wgsl = transpose_wgsl(&TileConfig::default());
        assert!(wgsl.contains("@workgroup_size(16, 16)"));
        assert!(wgsl.contains("var<workgroup> tile: array<f32, 256>;"));
    }

    #[test]
    fn pad_shaders_guard_bounds() {
        let cfg = TileConfig::default();
        assert!(pad_wgsl(&cfg).contains("if (i >= dims.pxl || j >= dims.qxl)"));
        assert!(unpad_wgsl(&cfg).contains("if (i >= dims.m || j >= dims.n)"));
    }
}
