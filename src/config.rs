//! Tiling configuration: tile sizes, work-per-thread, vector width.

use crate::error::GemmError;

/// Number of shared-memory banks assumed when deciding whether the B-tile
/// needs layout padding to detune its stride.
const SCRATCH_BANKS: u32 = 32;

/// Extra elements appended to the B-tile minor dimension when its extent
/// lands on a bank-width multiple.
const BANK_PAD: u32 = 2;

/// Immutable tiling configuration for one multiply invocation.
///
/// Each distinct configuration compiles to a distinct set of WGSL kernel
/// variants; the values are substituted into the shader text as constants.
///
/// * `tsm`/`tsn`/`tsk`: tile sizes along M, N, and the reduction dim.
/// * `wptm`/`wptn`: outputs computed per thread along M and N.
/// * `vector_width`: elements per staged load instruction (1, 2, or 4).
/// * `transposex`/`transposey`: transpose kernel block shape.
/// * `paddingx`/`paddingy`: pad/unpad kernel workgroup shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileConfig {
    pub tsm: u32,
    pub tsn: u32,
    pub tsk: u32,
    pub wptm: u32,
    pub wptn: u32,
    pub vector_width: u32,
    pub transposex: u32,
    pub transposey: u32,
    pub paddingx: u32,
    pub paddingy: u32,
}

impl Default for TileConfig {
    /// A throughput-oriented configuration that fits the default wgpu
    /// limits (256 invocations, 16 KiB workgroup storage).
    fn default() -> Self {
        Self {
            tsm: 64,
            tsn: 64,
            tsk: 16,
            wptm: 4,
            wptn: 4,
            vector_width: 4,
            transposex: 16,
            transposey: 16,
            paddingx: 16,
            paddingy: 16,
        }
    }
}

impl TileConfig {
    /// Threads along M in one workgroup.
    pub(crate) fn rtsm(&self) -> u32 {
        self.tsm / self.wptm
    }

    /// Threads along N in one workgroup.
    pub(crate) fn rtsn(&self) -> u32 {
        self.tsn / self.wptn
    }

    /// Total threads per GEMM workgroup.
    pub(crate) fn threads(&self) -> u32 {
        self.rtsm() * self.rtsn()
    }

    /// A-tile elements staged per thread per K step.
    pub(crate) fn lpta(&self) -> u32 {
        self.tsk * self.tsm / self.threads()
    }

    /// B-tile elements staged per thread per K step.
    pub(crate) fn lptb(&self) -> u32 {
        self.tsk * self.tsn / self.threads()
    }

    /// Minor-dimension stride of the B scratch tile. Detuned by a couple of
    /// elements when `tsn` lands exactly on the bank width, so concurrent
    /// threads stop hitting the same bank.
    pub(crate) fn b_stride(&self) -> u32 {
        if self.tsn % SCRATCH_BANKS == 0 {
            self.tsn + BANK_PAD
        } else {
            self.tsn
        }
    }

    /// Bytes of workgroup scratch used by the GEMM kernel variant.
    pub(crate) fn gemm_scratch_bytes(&self) -> u32 {
        4 * (self.tsk * self.tsm + self.tsk * self.b_stride())
    }

    /// Smallest multiples of the tile sizes covering `m`, `n`, `k`.
    pub fn padded_dims(&self, m: usize, n: usize, k: usize) -> (usize, usize, usize) {
        let round = |x: usize, t: u32| x.div_ceil(t as usize) * t as usize;
        (round(m, self.tsm), round(n, self.tsn), round(k, self.tsk))
    }

    /// Check every structural invariant of the configuration.
    ///
    /// Runs before any buffer is allocated or kernel launched.
    pub fn validate(&self) -> Result<(), GemmError> {
        let fields = [
            ("tsm", self.tsm),
            ("tsn", self.tsn),
            ("tsk", self.tsk),
            ("wptm", self.wptm),
            ("wptn", self.wptn),
            ("transposex", self.transposex),
            ("transposey", self.transposey),
            ("paddingx", self.paddingx),
            ("paddingy", self.paddingy),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(GemmError::Config(format!("{name} must be positive")));
            }
        }
        if self.tsm % self.wptm != 0 {
            return Err(GemmError::Config(format!(
                "tsm {} not divisible by wptm {}",
                self.tsm, self.wptm
            )));
        }
        if self.tsn % self.wptn != 0 {
            return Err(GemmError::Config(format!(
                "tsn {} not divisible by wptn {}",
                self.tsn, self.wptn
            )));
        }
        let threads = self.threads();
        if (self.tsk * self.tsm) % threads != 0 {
            return Err(GemmError::Config(format!(
                "A tile ({}x{}) does not distribute over {} threads",
                self.tsk, self.tsm, threads
            )));
        }
        if (self.tsk * self.tsn) % threads != 0 {
            return Err(GemmError::Config(format!(
                "B tile ({}x{}) does not distribute over {} threads",
                self.tsk, self.tsn, threads
            )));
        }
        if !matches!(self.vector_width, 1 | 2 | 4) {
            return Err(GemmError::Config(format!(
                "vector_width {} not one of 1, 2, 4",
                self.vector_width
            )));
        }
        if self.tsm % self.vector_width != 0 || self.tsn % self.vector_width != 0 {
            return Err(GemmError::Config(format!(
                "tile sizes {}x{} not divisible by vector_width {}",
                self.tsm, self.tsn, self.vector_width
            )));
        }
        if self.lpta() % self.vector_width != 0 || self.lptb() % self.vector_width != 0 {
            return Err(GemmError::Config(format!(
                "per-thread loads ({}, {}) not divisible by vector_width {}",
                self.lpta(),
                self.lptb(),
                self.vector_width
            )));
        }
        if self.transposex != self.transposey {
            // The blocked transpose swaps thread roles across the block
            // diagonal, which only works for square blocks.
            return Err(GemmError::Config(format!(
                "transpose block must be square, got {}x{}",
                self.transposex, self.transposey
            )));
        }
        Ok(())
    }

    /// Check the configuration against the device's compute limits.
    ///
    /// A configuration that passes `validate` can still ask for more
    /// threads or scratch than the device supports; that is a launch
    /// failure and is surfaced before the dispatch, never retried.
    pub fn check_limits(&self, limits: &wgpu::Limits) -> Result<(), GemmError> {
        let shapes = [
            ("gemm", self.rtsm(), self.rtsn()),
            ("transpose", self.transposex, self.transposey),
            ("pad", self.paddingx, self.paddingy),
        ];
        for (kernel, x, y) in shapes {
            if x > limits.max_compute_workgroup_size_x || y > limits.max_compute_workgroup_size_y {
                return Err(GemmError::Launch(format!(
                    "{kernel} workgroup {x}x{y} exceeds device maximum {}x{}",
                    limits.max_compute_workgroup_size_x, limits.max_compute_workgroup_size_y
                )));
            }
            if x * y > limits.max_compute_invocations_per_workgroup {
                return Err(GemmError::Launch(format!(
                    "{kernel} workgroup {x}x{y} exceeds {} invocations",
                    limits.max_compute_invocations_per_workgroup
                )));
            }
        }
        let scratch = self
            .gemm_scratch_bytes()
            .max(4 * self.transposex * self.transposey);
        if scratch > limits.max_compute_workgroup_storage_size {
            return Err(GemmError::Launch(format!(
                "{scratch} bytes of workgroup scratch exceeds device maximum {}",
                limits.max_compute_workgroup_storage_size
            )));
        }
        Ok(())
    }
}
