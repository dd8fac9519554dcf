mod adapter;
mod host;

pub use adapter::DeviceAdapter;
pub use host::HostDevice;
