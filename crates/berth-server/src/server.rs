//! The container server: registry, name reservation, and state persistence.

use std::collections::HashMap;
use std::sync::Arc;

use berth_oci::{Container, Runtime};
use berth_resource::ResourceCache;
use parking_lot::{Mutex as PlMutex, RwLock};
use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::storage::ContainerStorage;

/// File name of a container's persisted state snapshot.
const STATE_FILE: &str = "state.json";

/// Shared handle to one container's record.
///
/// The mutex is held across an entire lifecycle operation, which is how the
/// server serializes concurrent operations on a single container while
/// letting distinct containers proceed in parallel.
pub type ContainerHandle = Arc<Mutex<Container>>;

/// The lifecycle-coordination core of the daemon.
///
/// Owns the in-process view of every known container, the name registrar,
/// and the reservation cache, and orchestrates state transitions against the
/// external runtime and storage collaborators.
pub struct ContainerServer {
    config: ServerConfig,
    pub(crate) runtime: Arc<dyn Runtime>,
    pub(crate) storage: Arc<dyn ContainerStorage>,
    containers: RwLock<HashMap<String, ContainerHandle>>,
    names: PlMutex<HashMap<String, String>>,
    resources: ResourceCache,
}

impl ContainerServer {
    /// Creates a server over the given runtime and storage collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be created.
    pub fn new(
        config: ServerConfig,
        runtime: Arc<dyn Runtime>,
        storage: Arc<dyn ContainerStorage>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.state_dir)?;
        let resources = ResourceCache::with_ttl(config.resource_ttl());

        Ok(Self {
            config,
            runtime,
            storage,
            containers: RwLock::new(HashMap::new()),
            names: PlMutex::new(HashMap::new()),
            resources,
        })
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the reservation cache request handlers park resources in.
    #[must_use]
    pub const fn resource_cache(&self) -> &ResourceCache {
        &self.resources
    }

    /// Adds a container record to the registry.
    ///
    /// An existing record with the same id is replaced; id collisions are
    /// prevented upstream by name and id reservation.
    pub fn add_container(&self, ctr: Container) {
        let id = ctr.id.clone();
        self.containers
            .write()
            .insert(id, Arc::new(Mutex::new(ctr)));
    }

    /// Looks up a container handle by id.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotFound`] if the id is unknown.
    pub fn get_container(&self, id: &str) -> Result<ContainerHandle> {
        self.containers
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ServerError::NotFound(id.to_string()))
    }

    /// Returns whether a container with the given id exists.
    #[must_use]
    pub fn has_container(&self, id: &str) -> bool {
        self.containers.read().contains_key(id)
    }

    /// Removes a container record from the registry.
    pub fn remove_container(&self, id: &str) {
        self.containers.write().remove(id);
    }

    /// Returns a point-in-time snapshot of every known container.
    pub async fn list_containers(&self) -> Vec<Container> {
        let handles: Vec<ContainerHandle> = self.containers.read().values().cloned().collect();

        let mut snapshot = Vec::with_capacity(handles.len());
        for handle in handles {
            snapshot.push(handle.lock().await.clone());
        }
        snapshot
    }

    /// Reserves `name` for the container `id`.
    ///
    /// Re-reserving a name for the container that already holds it succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NameReserved`] if another container holds the
    /// name.
    pub fn reserve_container_name(&self, id: &str, name: &str) -> Result<String> {
        let mut names = self.names.lock();
        match names.get(name) {
            Some(owner) if owner == id => Ok(name.to_string()),
            Some(owner) => Err(ServerError::NameReserved {
                name: name.to_string(),
                id: owner.clone(),
            }),
            None => {
                names.insert(name.to_string(), id.to_string());
                Ok(name.to_string())
            }
        }
    }

    /// Releases a reserved container name.
    pub fn release_container_name(&self, name: &str) {
        self.names.lock().remove(name);
    }

    /// Persists a container's state snapshot to disk.
    ///
    /// Best-effort by design: a failed write leaves memory and disk diverged
    /// until the next successful write, which is accepted as a recoverable
    /// condition. Failures are logged, never surfaced.
    pub fn container_state_to_disk(&self, ctr: &Container) {
        if let Err(err) = self.write_state(ctr) {
            tracing::warn!("failed to persist state of container {}: {err}", ctr.id);
        }
    }

    /// Writes the snapshot atomically: temp file in the target directory,
    /// then rename.
    fn write_state(&self, ctr: &Container) -> Result<()> {
        let dir = self.config.container_dir(&ctr.id);
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, ctr)?;
        tmp.as_file().sync_all()?;
        tmp.persist(dir.join(STATE_FILE))
            .map_err(|err| ServerError::Io(err.error))?;
        Ok(())
    }

    /// Restores a container's state fields from its on-disk snapshot.
    ///
    /// Only the runtime-derived fields (state, pid, exit data) are taken
    /// from disk; identity fields stay as registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown, the snapshot is
    /// missing, or it cannot be decoded.
    pub async fn container_state_from_disk(&self, id: &str) -> Result<()> {
        let handle = self.get_container(id)?;
        let path = self.config.container_dir(id).join(STATE_FILE);

        let bytes = tokio::fs::read(&path).await?;
        let snapshot: Container = serde_json::from_slice(&bytes)?;

        let mut ctr = handle.lock().await;
        ctr.state = snapshot.state;
        ctr.pid = snapshot.pid;
        ctr.finished_at = snapshot.finished_at;
        ctr.exit_code = snapshot.exit_code;
        Ok(())
    }

    /// Persists the state of every known container.
    ///
    /// Called on daemon shutdown so a restart can restore the last known
    /// view from disk.
    pub async fn shutdown(&self) {
        let handles: Vec<ContainerHandle> = self.containers.read().values().cloned().collect();
        for handle in handles {
            let ctr = handle.lock().await;
            self.container_state_to_disk(&ctr);
        }
        tracing::info!("container server shut down");
    }

    /// Returns the path of a container's persisted snapshot.
    #[must_use]
    pub fn container_state_path(&self, id: &str) -> std::path::PathBuf {
        self.config.container_dir(id).join(STATE_FILE)
    }
}
