//! PorkDb Module
//!
//! The root resource. Owns a directory and the containers opened under it:
//!
//! ```text
//! {root}/
//!   ├── users/          (one directory per container)
//!   │     ├── index.tbl
//!   │     └── data.sec
//!   └── blobs/
//!         ├── index.bkt
//!         └── values/
//! ```
//!
//! Containers are opened through [`PorkDb::get_container`], typed by the
//! [`Container`] implementation requested. `close()` closes each open
//! container exactly once; containers share no state, so their order is
//! arbitrary.

use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{PorkError, Result};

// =============================================================================
// Container Trait
// =============================================================================

/// A named, independently durable store living in one directory
///
/// [`crate::DbMap`] is the built-in implementation; another back end can be
/// plugged in by implementing this trait.
pub trait Container: Send + Sync + Sized + 'static {
    /// Everything needed to open the container
    type Options;

    /// Open or create the container in `dir`
    fn open(name: &str, dir: &Path, options: Self::Options) -> Result<Self>;

    fn name(&self) -> &str;

    /// Persist pending changes
    fn flush(&self) -> Result<()>;

    /// Flush and release all resources
    fn close(&self) -> Result<()>;
}

/// Type-erased lifecycle view of an open container
trait Lifecycle: Send + Sync {
    fn flush(&self) -> Result<()>;
    fn close(&self) -> Result<()>;
    fn type_name(&self) -> &'static str;
}

impl<C: Container> Lifecycle for C {
    fn flush(&self) -> Result<()> {
        Container::flush(self)
    }

    fn close(&self) -> Result<()> {
        Container::close(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<C>()
    }
}

/// An open container, held both typed (for lookup) and erased (for shutdown)
struct OpenContainer {
    instance: Arc<dyn Any + Send + Sync>,
    lifecycle: Arc<dyn Lifecycle>,
}

// =============================================================================
// PorkDb
// =============================================================================

/// Root of a set of containers
pub struct PorkDb {
    root: PathBuf,
    containers: Mutex<HashMap<String, OpenContainer>>,
}

impl PorkDb {
    /// Create a builder rooted at `root`
    pub fn builder(root: impl Into<PathBuf>) -> PorkDbBuilder {
        PorkDbBuilder {
            root: root.into(),
            create_if_missing: true,
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the open container `name`, or open it with `configure()`
    ///
    /// `configure` runs only when the container is not open yet. Asking for
    /// an open container as a different type is an error.
    pub fn get_container<C, F>(&self, name: &str, configure: F) -> Result<Arc<C>>
    where
        C: Container,
        F: FnOnce() -> Result<C::Options>,
    {
        Self::validate_name(name)?;
        let mut containers = self.containers.lock();

        if let Some(open) = containers.get(name) {
            return Arc::clone(&open.instance).downcast::<C>().map_err(|_| {
                PorkError::ContainerType(format!(
                    "container '{}' is open as {}, requested {}",
                    name,
                    open.lifecycle.type_name(),
                    std::any::type_name::<C>()
                ))
            });
        }

        let options = configure()?;
        let container = Arc::new(C::open(name, &self.root.join(name), options)?);

        containers.insert(
            name.to_string(),
            OpenContainer {
                instance: container.clone(),
                lifecycle: container.clone(),
            },
        );
        debug!(container = name, "registered container");
        Ok(container)
    }

    /// Whether `name` is currently open
    pub fn is_open(&self, name: &str) -> bool {
        self.containers.lock().contains_key(name)
    }

    /// Names of all open containers, sorted
    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.containers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Close one container; returns whether it was open
    pub fn close_container(&self, name: &str) -> Result<bool> {
        let open = self.containers.lock().remove(name);
        match open {
            Some(open) => {
                open.lifecycle.close()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Flush every open container
    pub fn flush(&self) -> Result<()> {
        for open in self.containers.lock().values() {
            open.lifecycle.flush()?;
        }
        Ok(())
    }

    /// Close every open container exactly once
    ///
    /// All containers are closed even if some fail; the first error is
    /// returned.
    pub fn close(self) -> Result<()> {
        let (closed, first_error) = self.close_all();
        info!(root = %self.root.display(), containers = closed, "closed database");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn close_all(&self) -> (usize, Option<PorkError>) {
        let drained: Vec<(String, OpenContainer)> = self.containers.lock().drain().collect();
        let count = drained.len();
        let mut first_error = None;

        for (name, open) in drained {
            if let Err(e) = open.lifecycle.close() {
                warn!(container = %name, error = %e, "failed to close container");
                first_error.get_or_insert(e);
            }
        }
        (count, first_error)
    }

    /// Container names become directory names
    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0'])
        {
            return Err(PorkError::Config(format!(
                "invalid container name '{}'",
                name
            )));
        }
        Ok(())
    }
}

impl Drop for PorkDb {
    fn drop(&mut self) {
        if !self.containers.get_mut().is_empty() {
            warn!(root = %self.root.display(), "database dropped without close, closing containers");
            self.close_all();
        }
    }
}

/// Builder for PorkDb
pub struct PorkDbBuilder {
    root: PathBuf,
    create_if_missing: bool,
}

impl PorkDbBuilder {
    /// Whether to create the root directory when absent (default: true)
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn build(self) -> Result<PorkDb> {
        if !self.root.is_dir() {
            if !self.create_if_missing {
                return Err(PorkError::Config(format!(
                    "root directory {} does not exist",
                    self.root.display()
                )));
            }
            fs::create_dir_all(&self.root)?;
        }

        debug!(root = %self.root.display(), "opened database");
        Ok(PorkDb {
            root: self.root,
            containers: Mutex::new(HashMap::new()),
        })
    }
}
