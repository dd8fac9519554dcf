use crate::error::Result;
use crate::types::Backend;

/// Accelerator devices visible to this process.
///
/// Init binds exactly one of them, chosen by local rank, so that processes
/// sharing a machine never share a device.
///
/// - `HostDevice` (built-in): host-memory slots for CPU-only runs.
/// - GPU adapters: implemented externally (see `procgroup-nccl`).
pub trait DeviceAdapter: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Number of devices visible to this process. Zero when the driver or
    /// hardware is missing.
    fn device_count(&self) -> u32;

    /// Whether at least one compatible device is present.
    fn is_available(&self) -> bool {
        self.device_count() > 0
    }

    /// Whether these devices can carry `backend`'s collectives.
    fn supports(&self, backend: Backend) -> bool {
        let _ = backend;
        true
    }

    /// Bind this process to device `index`.
    ///
    /// Binding the already-bound index again is a no-op; binding a
    /// different one is an error.
    fn bind(&self, index: u32) -> Result<()>;

    /// Index bound by a previous [`bind`](Self::bind), if any.
    fn bound(&self) -> Option<u32>;
}
