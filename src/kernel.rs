//! Kernel cache: compile WGSL to compute pipelines, dispatch.

use std::collections::HashMap;

use tracing::debug;

use crate::buffer::GpuBuffer;
use crate::device::GpuDevice;

/// A cached compute pipeline.
pub(crate) struct CachedPipeline {
    pub pipeline: wgpu::ComputePipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

/// Cache of compiled WGSL compute pipelines, keyed by source hash.
///
/// Since the shader text is a pure function of the tiling configuration,
/// hashing the source deduplicates compilation across invocations: each
/// distinct configuration compiles once and is reused afterwards.
///
/// Supports command batching: when `batching` is true, dispatches are
/// accumulated and submitted together on `flush()`.
pub struct KernelCache {
    pipelines: HashMap<u64, CachedPipeline>,
    /// Pending command buffers to be submitted together.
    pending: Vec<wgpu::CommandBuffer>,
    /// When true, dispatches are batched instead of submitted immediately.
    batching: bool,
}

impl KernelCache {
    /// Create an empty kernel cache.
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
            pending: Vec::new(),
            batching: false,
        }
    }

    /// Enable command batching. Dispatches will accumulate until `flush()`.
    pub fn begin_batch(&mut self) {
        self.batching = true;
    }

    /// Submit all pending command buffers to the GPU queue.
    /// Must be called before any buffer readback.
    pub fn flush(&mut self, device: &GpuDevice) {
        if !self.pending.is_empty() {
            device.queue.submit(self.pending.drain(..));
        }
    }

    /// Submit or enqueue a command buffer depending on batching mode.
    pub(crate) fn submit_or_enqueue(&mut self, device: &GpuDevice, cmd: wgpu::CommandBuffer) {
        if self.batching {
            self.pending.push(cmd);
        } else {
            device.queue.submit(std::iter::once(cmd));
        }
    }

    fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }

    fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }

    fn compile(
        device: &GpuDevice,
        wgsl: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> CachedPipeline {
        let module = device
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("sgemm kernel"),
                source: wgpu::ShaderSource::Wgsl(wgsl.into()),
            });

        let bind_group_layout =
            device
                .device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("sgemm bgl"),
                    entries,
                });

        let pipeline_layout =
            device
                .device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("sgemm pipeline layout"),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });

        let pipeline =
            device
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some("sgemm pipeline"),
                    layout: Some(&pipeline_layout),
                    module: &module,
                    entry_point: Some("main"),
                    compilation_options: Default::default(),
                    cache: None,
                });

        CachedPipeline {
            pipeline,
            bind_group_layout,
        }
    }

    /// Get or compile a pipeline with the 3-binding layout
    /// (read storage, read-write storage, uniform).
    fn get_or_compile_r_w(&mut self, device: &GpuDevice, wgsl: &str, hash: u64) -> &CachedPipeline {
        self.pipelines.entry(hash).or_insert_with(|| {
            debug!("compiling kernel variant {:016x}", hash);
            Self::compile(
                device,
                wgsl,
                &[
                    Self::storage_entry(0, true),
                    Self::storage_entry(1, false),
                    Self::uniform_entry(2),
                ],
            )
        })
    }

    /// Get or compile a pipeline with the 4-binding layout
    /// (read storage, read storage, read-write storage, uniform).
    fn get_or_compile_rr_w(&mut self, device: &GpuDevice, wgsl: &str, hash: u64) -> &CachedPipeline {
        self.pipelines.entry(hash).or_insert_with(|| {
            debug!("compiling kernel variant {:016x}", hash);
            Self::compile(
                device,
                wgsl,
                &[
                    Self::storage_entry(0, true),
                    Self::storage_entry(1, true),
                    Self::storage_entry(2, false),
                    Self::uniform_entry(3),
                ],
            )
        })
    }

    fn params_buffer(device: &GpuDevice, params: &[u32; 4]) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        device
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sgemm params"),
                contents: bytemuck::cast_slice(params),
                usage: wgpu::BufferUsages::UNIFORM,
            })
    }

    fn encode_pass(
        device: &GpuDevice,
        cached: &CachedPipeline,
        bind_group: &wgpu::BindGroup,
        groups: (u32, u32),
    ) -> wgpu::CommandBuffer {
        let mut encoder = device
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sgemm dispatch"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("sgemm compute"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&cached.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(groups.0, groups.1, 1);
        }

        encoder.finish()
    }

    /// Dispatch a kernel reading one buffer and writing another, with a
    /// 2-D grid of workgroups. The workgroup shape is baked into the WGSL.
    pub(crate) fn dispatch_r_w(
        &mut self,
        device: &GpuDevice,
        wgsl: &str,
        input: &GpuBuffer,
        output: &GpuBuffer,
        params: &[u32; 4],
        groups: (u32, u32),
    ) {
        let hash = Self::hash_wgsl(wgsl);
        let params_buf = Self::params_buffer(device, params);
        self.get_or_compile_r_w(device, wgsl, hash);

        let cached = &self.pipelines[&hash];
        let bind_group = device.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sgemm bind group"),
            layout: &cached.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });
        let cmd = Self::encode_pass(device, cached, &bind_group, groups);

        self.submit_or_enqueue(device, cmd);
    }

    /// Dispatch a kernel reading two buffers and writing a third, with a
    /// 2-D grid of workgroups.
    pub(crate) fn dispatch_rr_w(
        &mut self,
        device: &GpuDevice,
        wgsl: &str,
        input_a: &GpuBuffer,
        input_b: &GpuBuffer,
        output: &GpuBuffer,
        params: &[u32; 4],
        groups: (u32, u32),
    ) {
        let hash = Self::hash_wgsl(wgsl);
        let params_buf = Self::params_buffer(device, params);
        self.get_or_compile_rr_w(device, wgsl, hash);

        let cached = &self.pipelines[&hash];
        let bind_group = device.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sgemm bind group"),
            layout: &cached.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input_a.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: input_b.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: output.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });
        let cmd = Self::encode_pass(device, cached, &bind_group, groups);

        self.submit_or_enqueue(device, cmd);
    }

    fn hash_wgsl(wgsl: &str) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        wgsl.hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for KernelCache {
    fn default() -> Self {
        Self::new()
    }
}
