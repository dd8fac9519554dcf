use crate::bootstrap::{BootstrapConfig, ExplicitParams, InitMethod};
use crate::device::{DeviceAdapter, HostDevice};
use crate::env::EnvSnapshot;
use crate::error::{DistError, Result};
use crate::group::TcpRuntime;
use crate::runtime::{CollectiveRuntime, GroupRequest, ProcessGroup};
use crate::types::{Backend, Element, Rank};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

struct State {
    config: BootstrapConfig,
    /// `None` when `world_size == 1`.
    group: Option<Arc<dyn ProcessGroup>>,
}

/// Distributed-training bootstrap helper.
///
/// Resolves the bootstrap parameters once, forms the process group through
/// the runtime registered for the requested backend, and binds this process
/// to one device. Before init, or when the world size is 1, the queries
/// answer as a single process: rank 0, world size 1, master.
pub struct Distributed {
    runtimes: HashMap<Backend, Arc<dyn CollectiveRuntime>>,
    device: Arc<dyn DeviceAdapter>,
    started: AtomicBool,
    state: OnceLock<State>,
}

impl Default for Distributed {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Distributed {
    /// Helper with the TCP runtime for `gloo` and host device slots.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> DistributedBuilder {
        DistributedBuilder::default()
    }

    /// Initialize from the process environment.
    ///
    /// The resolved `MASTER_ADDR`, `RANK` and `WORLD_SIZE` are written back
    /// to the environment before the group is formed. Returns the bound
    /// local rank.
    pub async fn init_from_env(&self, backend: Backend) -> Result<u32> {
        self.ensure_device(backend)?;
        let env = EnvSnapshot::capture();
        self.init_env_inner(&env, backend, BootstrapConfig::apply_to_process_env)
            .await
    }

    /// Initialize from an environment snapshot without touching the process
    /// environment. Returns the bound local rank.
    pub async fn init_with_env(&self, env: &EnvSnapshot, backend: Backend) -> Result<u32> {
        self.ensure_device(backend)?;
        self.init_env_inner(env, backend, |_| {}).await
    }

    async fn init_env_inner(
        &self,
        env: &EnvSnapshot,
        backend: Backend,
        on_resolved: impl FnOnce(&BootstrapConfig),
    ) -> Result<u32> {
        self.claim()?;
        let config = BootstrapConfig::from_env(env)?;
        on_resolved(&config);

        let group = if config.is_distributed() {
            let formed = async {
                let init_method = config.env_init_method()?;
                let group = self.form(backend, init_method, &config).await?;
                // Nobody proceeds until every rank has joined.
                group.barrier().await?;
                Ok::<_, DistError>(group)
            };
            match formed.await {
                Ok(group) => Some(group),
                Err(e) => {
                    tracing::error!("dist url: {}", config.display_addr());
                    return Err(e);
                }
            }
        } else {
            None
        };

        self.finish(config, group)
    }

    /// Initialize from an explicit machine layout. Returns the bound local rank.
    pub async fn init_with_params(&self, params: &ExplicitParams, backend: Backend) -> Result<u32> {
        self.ensure_device(backend)?;
        self.claim()?;
        let (config, init_method) = params.resolve()?;

        let formed = async {
            let group = if config.is_distributed() {
                Some(self.form(backend, init_method.clone(), &config).await?)
            } else {
                None
            };
            if let Some(group) = &group {
                group.barrier().await?;
            }
            Ok::<_, DistError>(group)
        };
        let group = match formed.await {
            Ok(group) => group,
            Err(e) => {
                tracing::error!("dist url: {init_method}");
                return Err(e);
            }
        };

        self.finish(config, group)
    }

    async fn form(
        &self,
        backend: Backend,
        init_method: InitMethod,
        config: &BootstrapConfig,
    ) -> Result<Arc<dyn ProcessGroup>> {
        let runtime = self
            .runtimes
            .get(&backend)
            .ok_or(DistError::UnsupportedBackend { backend })?;
        let req = GroupRequest {
            backend,
            init_method,
            world_size: config.world_size,
            rank: config.rank,
        };
        tracing::info!(
            %backend,
            rank = config.rank,
            world_size = config.world_size,
            "initializing process group at {}",
            req.init_method
        );
        runtime.init_process_group(&req).await
    }

    fn finish(&self, config: BootstrapConfig, group: Option<Arc<dyn ProcessGroup>>) -> Result<u32> {
        let local_rank = config.local_rank;
        self.device.bind(local_rank)?;
        tracing::info!(
            rank = config.rank,
            local_rank,
            device = self.device.name(),
            "bound device"
        );
        self.state
            .set(State { config, group })
            .map_err(|_| DistError::AlreadyInitialized)?;
        Ok(local_rank)
    }

    fn ensure_device(&self, backend: Backend) -> Result<()> {
        if self.device.is_available() && self.device.supports(backend) {
            Ok(())
        } else {
            Err(DistError::DeviceUnavailable {
                device: format!("{} for {backend}", self.device.name()),
            })
        }
    }

    /// There is no re-initialization within a process.
    fn claim(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DistError::AlreadyInitialized);
        }
        Ok(())
    }

    /// The formed group, if init created one.
    pub fn group(&self) -> Option<&Arc<dyn ProcessGroup>> {
        self.state.get().and_then(|s| s.group.as_ref())
    }

    /// Whether a process group was formed.
    pub fn is_initialized(&self) -> bool {
        self.group().is_some()
    }

    /// Resolved bootstrap parameters, once init has succeeded.
    pub fn config(&self) -> Option<&BootstrapConfig> {
        self.state.get().map(|s| &s.config)
    }

    pub fn device(&self) -> &Arc<dyn DeviceAdapter> {
        &self.device
    }

    /// Number of processes in the group, 1 without a group.
    pub fn world_size(&self) -> u32 {
        self.group().map_or(1, |g| g.world_size())
    }

    /// Rank of this process, 0 without a group.
    pub fn rank(&self) -> Rank {
        self.group().map_or(0, |g| g.rank())
    }

    /// Whether this is the master process (rank 0). Always true for a
    /// single process.
    pub fn is_master(&self) -> bool {
        self.rank() == 0
    }

    /// Local rank bound at init, 0 before init.
    pub fn local_rank(&self) -> u32 {
        self.config().map_or(0, |c| c.local_rank)
    }

    /// Barrier across the group. No-op without a group.
    pub async fn synchronize(&self) -> Result<()> {
        match self.group() {
            Some(group) => group.barrier().await,
            None => Ok(()),
        }
    }

    /// Average `data` across all processes, in place. Every process ends
    /// with the same values. Untouched without a group.
    pub async fn mean_reduce<T: Element>(&self, data: &mut [T]) -> Result<()> {
        let Some(group) = self.group() else {
            return Ok(());
        };
        group.all_reduce_sum(T::tensor_mut(data)).await?;
        let n = group.world_size();
        for v in data.iter_mut() {
            *v = v.div_count(n);
        }
        Ok(())
    }
}

/// Builder for [`Distributed`].
pub struct DistributedBuilder {
    runtimes: HashMap<Backend, Arc<dyn CollectiveRuntime>>,
    device: Option<Arc<dyn DeviceAdapter>>,
}

impl Default for DistributedBuilder {
    fn default() -> Self {
        let mut runtimes: HashMap<Backend, Arc<dyn CollectiveRuntime>> = HashMap::new();
        runtimes.insert(Backend::Gloo, Arc::new(TcpRuntime::from_env()));
        Self {
            runtimes,
            device: None,
        }
    }
}

impl DistributedBuilder {
    /// Register a runtime, replacing any previous one for the same backend.
    pub fn runtime(mut self, runtime: Arc<dyn CollectiveRuntime>) -> Self {
        self.runtimes.insert(runtime.backend(), runtime);
        self
    }

    /// Device adapter to check and bind. Defaults to [`HostDevice::from_env`].
    pub fn device(mut self, device: Arc<dyn DeviceAdapter>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn build(self) -> Distributed {
        Distributed {
            runtimes: self.runtimes,
            device: self
                .device
                .unwrap_or_else(|| Arc::new(HostDevice::from_env())),
            started: AtomicBool::new(false),
            state: OnceLock::new(),
        }
    }
}
