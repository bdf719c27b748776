//! End-to-end correctness tests for the GPU multiply pipeline.
//!
//! Every test that launches kernels acquires a device first and skips
//! (with a note on stderr) when no adapter is available.

use sgemm_wgpu::{
    gemm, matmul, matmul_naive, pad, transpose, unpad, GemmError, GpuBuffer, GpuDevice,
    KernelCache, Matrix, TileConfig,
};

fn get_device() -> Option<GpuDevice> {
    match GpuDevice::new_sync() {
        Ok(d) => Some(d),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

/// Deterministic pseudo-random matrix with entries in [-1, 1).
fn random_matrix(rows: usize, cols: usize, seed: u32) -> Matrix {
    let mut state = seed;
    let data = (0..rows * cols)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
        })
        .collect();
    Matrix::from_vec(rows, cols, data)
}

/// Small integer-valued matrix; products and short sums are exact in f32.
fn integer_matrix(rows: usize, cols: usize, seed: u32) -> Matrix {
    let mut state = seed;
    let data = (0..rows * cols)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            ((state >> 16) % 9) as f32 - 4.0
        })
        .collect();
    Matrix::from_vec(rows, cols, data)
}

fn assert_close(actual: &Matrix, expected: &Matrix, context: &str) {
    assert_eq!(actual.rows(), expected.rows(), "{context}: row mismatch");
    assert_eq!(actual.cols(), expected.cols(), "{context}: col mismatch");
    for (i, (&a, &e)) in actual
        .data()
        .iter()
        .zip(expected.data().iter())
        .enumerate()
    {
        let tol = 1e-3 * e.abs().max(1.0);
        assert!(
            (a - e).abs() <= tol,
            "{context}: element {i}: got {a}, expected {e}"
        );
    }
}

/// Tiny scalar configuration, no vectorization, 2-wide tiles.
fn tile2() -> TileConfig {
    TileConfig {
        tsm: 2,
        tsn: 2,
        tsk: 2,
        wptm: 1,
        wptn: 1,
        vector_width: 1,
        transposex: 8,
        transposey: 8,
        paddingx: 8,
        paddingy: 8,
    }
}

fn tile4() -> TileConfig {
    TileConfig {
        tsm: 4,
        tsn: 4,
        tsk: 4,
        ..tile2()
    }
}

#[test]
fn matches_reference_for_assorted_dims() {
    let Some(device) = get_device() else { return };
    let mut cache = KernelCache::new();
    let config = TileConfig::default();

    for &(m, n, k) in &[
        (64usize, 64usize, 64usize),
        (33, 17, 45),
        (100, 3, 7),
        (1, 1, 1),
        (65, 129, 31),
    ] {
        let a = random_matrix(m, k, 11 + m as u32);
        let b = random_matrix(k, n, 23 + n as u32);
        let c = matmul(&device, &mut cache, &config, &a, &b).unwrap();
        assert_close(&c, &matmul_naive(&a, &b), &format!("{m}x{n}x{k}"));
    }
}

#[test]
fn tile_aligned_identity_times_b_is_exact() {
    let Some(device) = get_device() else { return };
    let mut cache = KernelCache::new();

    // 4x4 with 2-wide tiles needs no padding; identity must reproduce B
    // bit for bit.
    let a = Matrix::identity(4);
    let b = random_matrix(4, 4, 7);
    let c = matmul(&device, &mut cache, &tile2(), &a, &b).unwrap();
    assert_eq!(c.data(), b.data());
}

#[test]
fn padding_scenario_3x3_with_4_wide_tiles() {
    let Some(device) = get_device() else { return };
    let mut cache = KernelCache::new();
    let config = tile4();

    // The padded buffer must be the input with exactly-zero extensions.
    let x = integer_matrix(3, 3, 42);
    let x_buf = GpuBuffer::from_slice(&device, x.data());
    let padded = pad(&device, &mut cache, &config, &x_buf, 3, 3, 4, 4).unwrap();
    let padded_host = padded.to_vec_sync(&device);
    for i in 0..4 {
        for j in 0..4 {
            let expected = if i < 3 && j < 3 { x.get(i, j) } else { 0.0 };
            assert_eq!(padded_host[j * 4 + i], expected, "padded[{i},{j}]");
        }
    }

    // The full pipeline over integer values is exact, and unpadding
    // recovers a 3x3 result.
    let a = integer_matrix(3, 3, 5);
    let b = integer_matrix(3, 3, 6);
    let c = matmul(&device, &mut cache, &config, &a, &b).unwrap();
    assert_eq!((c.rows(), c.cols()), (3, 3));
    assert_eq!(c.data(), matmul_naive(&a, &b).data());
}

#[test]
fn pad_unpad_left_inverse() {
    let Some(device) = get_device() else { return };
    let mut cache = KernelCache::new();
    let config = tile4();

    for &(p, q, pxl, qxl) in &[(3usize, 5usize, 8usize, 8usize), (4, 4, 4, 4), (7, 2, 12, 16)] {
        let x = random_matrix(p, q, (p * 31 + q) as u32);
        let x_buf = GpuBuffer::from_slice(&device, x.data());
        let padded = pad(&device, &mut cache, &config, &x_buf, p, q, pxl, qxl).unwrap();
        let restored = unpad(&device, &mut cache, &config, &padded, pxl, qxl, p, q).unwrap();
        assert_eq!(
            restored.to_vec_sync(&device),
            x.data(),
            "round trip {p}x{q} via {pxl}x{qxl}"
        );
    }
}

#[test]
fn double_transpose_restores_input() {
    let Some(device) = get_device() else { return };
    let mut cache = KernelCache::new();
    let config = TileConfig::default();

    for &(p, q) in &[(5usize, 9usize), (16, 16), (33, 2)] {
        let x = random_matrix(p, q, (p + q * 13) as u32);
        let x_buf = GpuBuffer::from_slice(&device, x.data());
        let t = transpose(&device, &mut cache, &config, &x_buf, p, q).unwrap();
        assert_eq!(t.len(), q * p);
        let tt = transpose(&device, &mut cache, &config, &t, q, p).unwrap();
        assert_eq!(tt.to_vec_sync(&device), x.data(), "transpose^2 {p}x{q}");
    }
}

#[test]
fn aligned_path_is_bit_identical_to_explicit_padding() {
    let Some(device) = get_device() else { return };
    let mut cache = KernelCache::new();
    let config = tile4();

    // 8x8x8 is tile-aligned, so matmul skips pad and unpad entirely.
    let a = random_matrix(8, 8, 3);
    let b = random_matrix(8, 8, 4);
    let via_skip = matmul(&device, &mut cache, &config, &a, &b).unwrap();

    // The explicit path runs pad and unpad as identity copies.
    let a_buf = GpuBuffer::from_slice(&device, a.data());
    let b_buf = GpuBuffer::from_slice(&device, b.data());
    let a_padded = pad(&device, &mut cache, &config, &a_buf, 8, 8, 8, 8).unwrap();
    let b_padded = pad(&device, &mut cache, &config, &b_buf, 8, 8, 8, 8).unwrap();
    let b_t = transpose(&device, &mut cache, &config, &b_padded, 8, 8).unwrap();
    let c_padded = gemm(&device, &mut cache, &config, 8, 8, 8, &a_padded, &b_t).unwrap();
    let c = unpad(&device, &mut cache, &config, &c_padded, 8, 8, 8, 8).unwrap();
    let via_explicit = c.to_vec_sync(&device);

    let skip_bits: Vec<u32> = via_skip.data().iter().map(|v| v.to_bits()).collect();
    let explicit_bits: Vec<u32> = via_explicit.iter().map(|v| v.to_bits()).collect();
    assert_eq!(skip_bits, explicit_bits);
}

#[test]
fn config_sweep_holds_result() {
    let Some(device) = get_device() else { return };
    let mut cache = KernelCache::new();

    let configs = [
        tile4(),
        TileConfig {
            tsm: 16,
            tsn: 16,
            tsk: 8,
            wptm: 2,
            wptn: 2,
            vector_width: 1,
            ..TileConfig::default()
        },
        TileConfig {
            tsm: 32,
            tsn: 32,
            tsk: 16,
            wptm: 4,
            wptn: 2,
            vector_width: 2,
            ..TileConfig::default()
        },
        // Rectangular output tiles: TSM and TSN are independent.
        TileConfig {
            tsm: 32,
            tsn: 16,
            tsk: 8,
            wptm: 2,
            wptn: 2,
            vector_width: 1,
            ..TileConfig::default()
        },
        TileConfig::default(),
    ];

    let a = random_matrix(40, 24, 101);
    let b = random_matrix(24, 36, 102);
    let expected = matmul_naive(&a, &b);
    for (i, config) in configs.iter().enumerate() {
        config.validate().unwrap();
        let c = matmul(&device, &mut cache, config, &a, &b).unwrap();
        assert_close(&c, &expected, &format!("config {i}"));
    }
}

#[test]
fn vector_width_variants_agree_exactly() {
    let Some(device) = get_device() else { return };
    let mut cache = KernelCache::new();

    // Integer-valued inputs make every partial sum exact, so the three
    // vectorization variants must agree bit for bit: wide loads change
    // the instruction count, not the logical content.
    let a = integer_matrix(33, 17, 8);
    let b = integer_matrix(17, 20, 9);
    let expected = matmul_naive(&a, &b);

    for width in [1u32, 2, 4] {
        let config = TileConfig {
            tsm: 32,
            tsn: 32,
            tsk: 16,
            wptm: 4,
            wptn: 4,
            vector_width: width,
            ..TileConfig::default()
        };
        config.validate().unwrap();
        let c = matmul(&device, &mut cache, &config, &a, &b).unwrap();
        assert_eq!(c.data(), expected.data(), "vector width {width}");
    }
}

#[test]
fn zero_dimension_is_an_error() {
    let Some(device) = get_device() else { return };
    let mut cache = KernelCache::new();
    let config = TileConfig::default();

    let a = Matrix::zeros(4, 0);
    let b = Matrix::zeros(0, 4);
    let err = matmul(&device, &mut cache, &config, &a, &b).unwrap_err();
    assert!(matches!(err, GemmError::Dimension(_)), "got {err}");
}

#[test]
fn mismatched_inner_dimension_is_an_error() {
    let Some(device) = get_device() else { return };
    let mut cache = KernelCache::new();
    let config = TileConfig::default();

    let a = Matrix::zeros(4, 5);
    let b = Matrix::zeros(6, 4);
    let err = matmul(&device, &mut cache, &config, &a, &b).unwrap_err();
    assert!(matches!(err, GemmError::Dimension(_)), "got {err}");
}

#[test]
fn invalid_config_fails_before_launch() {
    let Some(device) = get_device() else { return };
    let mut cache = KernelCache::new();

    let config = TileConfig {
        wptm: 5,
        ..TileConfig::default()
    };
    let a = Matrix::zeros(4, 4);
    let b = Matrix::zeros(4, 4);
    let err = matmul(&device, &mut cache, &config, &a, &b).unwrap_err();
    assert!(matches!(err, GemmError::Config(_)), "got {err}");
}

#[test]
fn oversized_config_is_a_launch_error() {
    let Some(device) = get_device() else { return };
    let mut cache = KernelCache::new();

    // 32x32 threads per group exceeds the default 256-invocation limit.
    let config = TileConfig {
        tsm: 128,
        tsn: 128,
        wptm: 4,
        wptn: 4,
        vector_width: 2,
        ..TileConfig::default()
    };
    config.validate().unwrap();
    let a = Matrix::zeros(4, 4);
    let b = Matrix::zeros(4, 4);
    let err = matmul(&device, &mut cache, &config, &a, &b).unwrap_err();
    assert!(matches!(err, GemmError::Launch(_)), "got {err}");
}
