//! OpenCL batch kernel.
//!
//! Runs `kernels/derive.cl`: one work item per lane, each performing the
//! SHA-256 derivation, base58 rendering and suffix comparison, with the first
//! match claimed through `atomic_cmpxchg`. Only suffix patterns are
//! implemented on the device.

use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::{get_all_devices, Device, CL_DEVICE_TYPE_GPU};
use opencl3::error_codes::ClError;
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE};
use opencl3::program::Program;
use opencl3::types::{cl_mem_flags, cl_uchar, cl_uint, CL_BLOCKING};

use crate::crypto::{MAX_ADDRESS_LEN, MAX_SEED_LEN};
use crate::matcher::{Pattern, Position};

use super::kernel::{BatchJob, BatchKernel, KernelError};

/// OpenCL kernel source
const KERNEL_SOURCE: &str = include_str!("../../kernels/derive.cl");

const KERNEL_NAME: &str = "derive_and_match";

/// Errors that can occur while setting up the GPU.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No GPU device found")]
    DeviceNotFound,

    #[error("GPU initialization failed: {0}")]
    InitFailed(String),

    #[error("Kernel compilation failed: {0}")]
    KernelCompile(String),

    #[error("Buffer operation failed: {0}")]
    BufferError(String),
}

/// Lists available OpenCL GPU devices.
pub fn list_devices() -> Vec<String> {
    match get_all_devices(CL_DEVICE_TYPE_GPU) {
        Ok(device_ids) => device_ids
            .iter()
            .filter_map(|&id| Device::new(id).name().ok())
            .collect(),
        Err(_) => vec![],
    }
}

/// Batch kernel executing on an OpenCL GPU.
pub struct GpuKernel {
    device_name: String,
    queue: CommandQueue,
    kernel: Kernel,
    lanes: usize,
    base_buf: Buffer<cl_uchar>,
    program_buf: Buffer<cl_uchar>,
    template_buf: Buffer<cl_uchar>,
    pattern_buf: Buffer<cl_uchar>,
    /// [claimed flag, winning lane]
    result_buf: Buffer<cl_uint>,
    // Keeps the context alive for the buffers and queue.
    _context: Context,
}

impl GpuKernel {
    /// Compiles the kernel on device `device_index` and allocates its buffers.
    pub fn new(device_index: usize, lanes: usize) -> Result<Self, GpuError> {
        let device_ids =
            get_all_devices(CL_DEVICE_TYPE_GPU).map_err(|e| GpuError::InitFailed(e.to_string()))?;
        let device_id = *device_ids.get(device_index).ok_or(GpuError::DeviceNotFound)?;

        let device = Device::new(device_id);
        let device_name = device.name().unwrap_or_else(|_| "Unknown".into());
        log::info!("GPU: using device {}", device_name);

        let context =
            Context::from_device(&device).map_err(|e| GpuError::InitFailed(e.to_string()))?;
        let queue = CommandQueue::create_default_with_properties(&context, 0, 0)
            .map_err(|e| GpuError::InitFailed(e.to_string()))?;

        log::info!("GPU: compiling OpenCL kernel...");
        let program = Program::create_and_build_from_source(&context, KERNEL_SOURCE, "")
            .map_err(GpuError::KernelCompile)?;
        let kernel = Kernel::create(&program, KERNEL_NAME)
            .map_err(|e| GpuError::KernelCompile(e.to_string()))?;

        let base_buf = Self::create_buffer::<cl_uchar>(&context, CL_MEM_READ_ONLY, 32)?;
        let program_buf = Self::create_buffer::<cl_uchar>(&context, CL_MEM_READ_ONLY, 32)?;
        let template_buf =
            Self::create_buffer::<cl_uchar>(&context, CL_MEM_READ_ONLY, MAX_SEED_LEN)?;
        let pattern_buf =
            Self::create_buffer::<cl_uchar>(&context, CL_MEM_READ_ONLY, MAX_ADDRESS_LEN)?;
        let result_buf = Self::create_buffer::<cl_uint>(&context, CL_MEM_READ_WRITE, 2)?;

        Ok(Self {
            device_name,
            queue,
            kernel,
            lanes,
            base_buf,
            program_buf,
            template_buf,
            pattern_buf,
            result_buf,
            _context: context,
        })
    }

    fn create_buffer<T>(
        context: &Context,
        flags: cl_mem_flags,
        count: usize,
    ) -> Result<Buffer<T>, GpuError> {
        unsafe {
            Buffer::<T>::create(context, flags, count, std::ptr::null_mut())
                .map_err(|e| GpuError::BufferError(e.to_string()))
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn write_inputs(&mut self, job: &BatchJob<'_>) -> Result<(), ClError> {
        let mut template = [0u8; MAX_SEED_LEN];
        template[..job.template.len()].copy_from_slice(job.template.as_bytes());

        let mut pattern = [0u8; MAX_ADDRESS_LEN];
        let pattern_bytes = job.pattern.pattern().as_bytes();
        pattern[..pattern_bytes.len()].copy_from_slice(pattern_bytes);

        let reset: [cl_uint; 2] = [0, 0];

        let base = job.base_pubkey.as_bytes();
        let program_id = job.program_id.as_bytes();

        unsafe {
            self.queue
                .enqueue_write_buffer(&mut self.base_buf, CL_BLOCKING, 0, base, &[])?;
            self.queue
                .enqueue_write_buffer(&mut self.program_buf, CL_BLOCKING, 0, program_id, &[])?;
            self.queue
                .enqueue_write_buffer(&mut self.template_buf, CL_BLOCKING, 0, &template, &[])?;
            self.queue
                .enqueue_write_buffer(&mut self.pattern_buf, CL_BLOCKING, 0, &pattern, &[])?;
            self.queue
                .enqueue_write_buffer(&mut self.result_buf, CL_BLOCKING, 0, &reset, &[])?;
        }
        Ok(())
    }
}

impl BatchKernel for GpuKernel {
    fn name(&self) -> &str {
        "opencl"
    }

    fn lanes(&self) -> usize {
        self.lanes
    }

    fn supports(&self, pattern: &Pattern) -> bool {
        pattern.position() == Position::End
            && pattern.pattern().is_ascii()
            && pattern.pattern().len() <= MAX_ADDRESS_LEN
    }

    fn dispatch(&mut self, job: &BatchJob<'_>) -> Result<Option<u64>, KernelError> {
        if !self.supports(job.pattern) {
            return Err(KernelError::Unsupported);
        }

        self.write_inputs(job)
            .map_err(|e| KernelError::Dispatch(e.to_string()))?;

        let seed_len = job.template.len() as cl_uint;
        let pattern_len = job.pattern.pattern().len() as cl_uint;
        let case_insensitive = job.pattern.case_insensitive() as cl_uint;

        let event = unsafe {
            ExecuteKernel::new(&self.kernel)
                .set_arg(&self.base_buf)
                .set_arg(&self.program_buf)
                .set_arg(&self.template_buf)
                .set_arg(&seed_len)
                .set_arg(&self.pattern_buf)
                .set_arg(&pattern_len)
                .set_arg(&case_insensitive)
                .set_arg(&self.result_buf)
                .set_global_work_size(job.lanes.min(self.lanes))
                .enqueue_nd_range(&self.queue)
                .map_err(|e| KernelError::Dispatch(e.to_string()))?
        };
        event
            .wait()
            .map_err(|e| KernelError::Dispatch(e.to_string()))?;

        let mut result: [cl_uint; 2] = [0, 0];
        unsafe {
            self.queue
                .enqueue_read_buffer(&self.result_buf, CL_BLOCKING, 0, &mut result, &[])
                .map_err(|e| KernelError::Dispatch(e.to_string()))?;
        }

        Ok((result[0] != 0).then_some(result[1] as u64))
    }
}
