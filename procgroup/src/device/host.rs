use crate::device::adapter::DeviceAdapter;
use crate::error::{DistError, Result};
use crate::types::Backend;
use std::sync::OnceLock;

/// Host-memory stand-in for an accelerator, with a fixed number of slots.
#[derive(Debug)]
pub struct HostDevice {
    /// Unset until the first query for a device built by [`HostDevice::from_env`].
    slots: OnceLock<u32>,
    bound: OnceLock<u32>,
}

impl HostDevice {
    pub fn new(slots: u32) -> Self {
        Self {
            slots: OnceLock::from(slots),
            bound: OnceLock::new(),
        }
    }

    /// Slot count from `PROCGROUP_HOST_DEVICES`, else the available
    /// parallelism. Read on the first device query.
    pub fn from_env() -> Self {
        Self {
            slots: OnceLock::new(),
            bound: OnceLock::new(),
        }
    }

    fn slots(&self) -> u32 {
        *self.slots.get_or_init(|| {
            std::env::var("PROCGROUP_HOST_DEVICES")
                .ok()
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or_else(|| {
                    std::thread::available_parallelism()
                        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
                        .unwrap_or(1)
                })
        })
    }
}

impl DeviceAdapter for HostDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn device_count(&self) -> u32 {
        self.slots()
    }

    /// Host memory only carries the TCP runtime.
    fn supports(&self, backend: Backend) -> bool {
        backend == Backend::Gloo
    }

    fn bind(&self, index: u32) -> Result<()> {
        let slots = self.slots();
        if index >= slots {
            return Err(DistError::DeviceBind {
                index,
                reason: format!("only {slots} host slots"),
            });
        }
        let bound = *self.bound.get_or_init(|| index);
        if bound != index {
            return Err(DistError::DeviceBind {
                index,
                reason: format!("process already bound to slot {bound}"),
            });
        }
        tracing::debug!(index, "bound host device slot");
        Ok(())
    }

    fn bound(&self) -> Option<u32> {
        self.bound.get().copied()
    }
}
