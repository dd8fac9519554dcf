use cudarc::driver::CudaContext;
use procgroup::{DeviceAdapter, DistError};
use std::sync::{Arc, OnceLock};

/// CUDA GPUs visible to this process.
pub struct CudaDevices {
    count: u32,
    bound: OnceLock<(u32, Arc<CudaContext>)>,
}

impl CudaDevices {
    /// Count the visible GPUs. A missing driver counts as zero devices.
    pub fn detect() -> Self {
        Self {
            count: probe_device_count(),
            bound: OnceLock::new(),
        }
    }

    /// Context of the bound device.
    pub fn context(&self) -> Option<&Arc<CudaContext>> {
        self.bound.get().map(|(_, ctx)| ctx)
    }
}

fn probe_device_count() -> u32 {
    // With dynamic loading, cudarc panics when libcuda cannot be found.
    match std::panic::catch_unwind(CudaContext::device_count) {
        Ok(Ok(n)) => u32::try_from(n).unwrap_or(0),
        Ok(Err(e)) => {
            tracing::debug!("cuDeviceGetCount failed: {e}");
            0
        }
        Err(_) => {
            tracing::debug!("CUDA driver library not found");
            0
        }
    }
}

impl DeviceAdapter for CudaDevices {
    fn name(&self) -> &str {
        "cuda"
    }

    fn device_count(&self) -> u32 {
        self.count
    }

    fn bind(&self, index: u32) -> procgroup::Result<()> {
        if let Some((bound, _)) = self.bound.get() {
            if *bound == index {
                return Ok(());
            }
            return Err(DistError::DeviceBind {
                index,
                reason: format!("process already bound to GPU {bound}"),
            });
        }
        if index >= self.count {
            return Err(DistError::DeviceBind {
                index,
                reason: format!("only {} CUDA devices visible", self.count),
            });
        }

        let ctx = CudaContext::new(index as usize).map_err(|e| {
            DistError::device_with_source(format!("create CUDA context for GPU {index}"), e)
        })?;
        ctx.bind_to_thread()
            .map_err(|e| DistError::device_with_source("CUDA bind_to_thread", e))?;
        self.bound
            .set((index, ctx))
            .map_err(|_| DistError::DeviceBind {
                index,
                reason: "bound concurrently".into(),
            })?;
        tracing::info!(gpu = index, "bound CUDA device");
        Ok(())
    }

    fn bound(&self) -> Option<u32> {
        self.bound.get().map(|(i, _)| *i)
    }
}
