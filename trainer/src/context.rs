use log::{debug, warn};
use nl_codebase::utils::GenericResult;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Where the model runs. Fixed before the compute context is created.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceConfig {
    Cpu,
    Accelerator(usize),
}

impl DeviceConfig {
    pub fn from_gpu(gpu: Option<usize>) -> Self {
        match gpu {
            Some(index) => DeviceConfig::Accelerator(index),
            None => DeviceConfig::Cpu,
        }
    }
}

/// Process-wide resources of the model computations, created once per run and closed at its end
pub struct ComputeContext {
    device: DeviceConfig,
    pool: ThreadPool,
}

impl ComputeContext {
    /// **num_threads** = 0 uses one thread per core
    pub fn new(device: DeviceConfig, num_threads: usize) -> GenericResult<Self> {
        let device = match device {
            DeviceConfig::Accelerator(index) => {
                warn!("No accelerator backend in this build, ignoring gpu {} and running on the CPU", index);
                DeviceConfig::Cpu
            }
            DeviceConfig::Cpu => DeviceConfig::Cpu,
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("compute-{}", index))
            .build()?;
        debug!("Created compute context on {:?} with {} threads", device, pool.current_num_threads());
        Ok(Self { device, pool })
    }

    pub fn device(&self) -> DeviceConfig {
        self.device
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs **op** with the parallel array operations scheduled on this context's threads
    pub fn install<R, F>(&self, op: F) -> R
        where F: FnOnce() -> R + Send,
              R: Send {
        self.pool.install(op)
    }

    pub fn close(self) {
        debug!("Closing compute context");
    }
}
