//! Session: owns the worker pool and a session identifier
//! used as the default namespace for intermediate/output tables. Submits
//! tasks via the pool and is responsible for sweeping its own namespace
//! on shutdown.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::catalog::{Catalog, TableMeta};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::partition_path::namespace_dir;
use crate::table::Table;
use crate::worker::WorkerPool;

/// The state a `Session` and every `Table` it hands out share. Kept
/// behind an `Arc` so a `Table` can keep submitting work to the same
/// pool and catalog after the `Session` handle that created it has been
/// passed around or cloned.
///
/// `pool` is `None` once `Session::stop`/`Session::kill` has run: the
/// pool is gone and every handle still holding this `Arc` (a `Table`
/// obtained before shutdown, say) gets `Error::SessionStopped` on its
/// next task submission instead of silently reaching a live pool.
pub(crate) struct SessionInner {
    pub session_id: String,
    pub options: Options,
    pub catalog: Catalog,
    pool: Mutex<Option<WorkerPool>>,
}

pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, options: Options) -> Session {
        let session_id = session_id.into();
        log::info!("starting session {session_id}");
        let catalog = Catalog::new(&options.data_root, options.map_size);
        let pool = WorkerPool::new(options.threads);
        Session {
            inner: Arc::new(SessionInner {
                session_id,
                options,
                catalog,
                pool: Mutex::new(Some(pool)),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Loads an existing table. Fails with [`Error::NotFound`] if no
    /// catalog entry exists for `(namespace, name)`.
    pub fn load(&self, namespace: &str, name: &str) -> Result<Table> {
        self.inner.load_table(namespace, name, false)
    }

    /// A handle onto this session's federation rendezvous.
    pub fn federation(&self) -> crate::federation::Federation {
        crate::federation::Federation::new(self.inner.clone())
    }

    /// Creates (or, unless `error_if_exist`, adopts) a table. The catalog
    /// entry is authoritative once it exists: if the table is already
    /// registered, the returned handle reflects the *existing* metadata,
    /// not the values passed here: these fields are immutable once a
    /// table is created.
    #[allow(clippy::too_many_arguments)]
    pub fn create_table(
        &self,
        namespace: &str,
        name: &str,
        num_partitions: u32,
        need_cleanup: bool,
        error_if_exist: bool,
        key_serdes_type: u32,
        value_serdes_type: u32,
        partitioner_type: u32,
    ) -> Result<Table> {
        self.inner.register_table(
            namespace,
            name,
            num_partitions,
            key_serdes_type,
            value_serdes_type,
            partitioner_type,
            need_cleanup,
            error_if_exist,
        )
    }

    /// Bulk-loads `data` into a fresh table under this session's
    /// namespace, partitioned with `partitioner`.
    pub fn parallelize(
        &self,
        data: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
        num_partitions: u32,
        partitioner: &crate::partitioner::Partitioner,
        key_serdes_type: u32,
        value_serdes_type: u32,
        partitioner_type: u32,
    ) -> Result<Table> {
        let name = Uuid::new_v4().to_string();
        let table = self.inner.register_table(
            &self.inner.session_id,
            &name,
            num_partitions,
            key_serdes_type,
            value_serdes_type,
            partitioner_type,
            true,
            false,
        )?;
        table.put_all(data, partitioner)?;
        Ok(table)
    }

    /// Recursively removes every table directory under `namespace` whose
    /// name matches the `*`-wildcard glob `name_glob` (only `"*"` -- "all
    /// tables" -- is used internally).
    pub fn cleanup(&self, namespace: &str, name_glob: &str) {
        let dir = namespace_dir(&self.inner.options.data_root, namespace);
        if !dir.is_dir() {
            return;
        }
        if name_glob == "*" {
            if let Err(err) = std::fs::remove_dir_all(&dir) {
                log::warn!("failed to clean up namespace {namespace}: {err}");
            }
            crate::storage::evict_under(&dir);
            return;
        }
        // Only the "*" glob is exercised anywhere in this crate; a literal
        // name is treated as an exact match rather than pulling in a glob
        // matching crate for a single call site.
        let table_dir = dir.join(name_glob);
        if table_dir.is_dir() {
            if let Err(err) = std::fs::remove_dir_all(&table_dir) {
                log::warn!("failed to clean up table {name_glob}: {err}");
            }
            crate::storage::evict_under(&table_dir);
        }
    }

    /// Sweeps this session's own namespace and shuts the pool down:
    /// after this returns, every `Table`/`Session` handle sharing this
    /// session -- including ones obtained before the call -- gets
    /// `Error::SessionStopped` from any further task submission rather
    /// than reaching a pool that's still alive behind its back.
    /// `stop()` and `kill()` are behaviorally identical; `kill` is kept
    /// as a distinct entry point for API parity in case a future caller
    /// needs to special-case forceful shutdown.
    pub fn stop(&self) {
        log::info!("stopping session {}", self.inner.session_id);
        self.cleanup(&self.inner.session_id, "*");
        self.inner.pool.lock().unwrap().take();
    }

    pub fn kill(&self) {
        log::info!("killing session {}", self.inner.session_id);
        self.cleanup(&self.inner.session_id, "*");
        self.inner.pool.lock().unwrap().take();
    }
}

impl SessionInner {
    /// Submits `job(p)` for every partition via the session's pool,
    /// tagging failures with `op` for context. Fails with
    /// [`Error::SessionStopped`] if the session has already been
    /// stopped/killed -- there is no pool left to submit to.
    pub(crate) fn run_partitioned<T, F>(&self, op: &'static str, num_partitions: u32, job: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(u32) -> Result<T> + Send + Sync + 'static,
    {
        let guard = self.pool.lock().unwrap();
        match guard.as_ref() {
            Some(pool) => pool.run_partitioned(op, num_partitions, job),
            None => Err(Error::SessionStopped(self.session_id.clone())),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn register_table(
        self: &Arc<Self>,
        namespace: &str,
        name: &str,
        num_partitions: u32,
        key_serdes_type: u32,
        value_serdes_type: u32,
        partitioner_type: u32,
        need_cleanup: bool,
        error_if_exist: bool,
    ) -> Result<Table> {
        let meta = match self.catalog.get_table_meta(namespace, name)? {
            Some(existing) => {
                if error_if_exist {
                    return Err(Error::AlreadyExists {
                        namespace: namespace.to_string(),
                        name: name.to_string(),
                    });
                }
                existing
            }
            None => {
                let meta = TableMeta::new(
                    num_partitions,
                    key_serdes_type,
                    value_serdes_type,
                    partitioner_type,
                );
                self.catalog.add_table_meta(namespace, name, meta)?;
                meta
            }
        };
        Ok(Table::from_meta(
            self.clone(),
            namespace.to_string(),
            name.to_string(),
            meta,
            need_cleanup,
        ))
    }

    /// Generates a fresh unique table name, used whenever an
    /// output/intermediate table has no caller-given name.
    pub(crate) fn fresh_name(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Loads an existing table without creating one if it's missing,
    /// unlike [`SessionInner::register_table`]. `need_cleanup` is set by
    /// the caller: federation receives own the tables they load
    /// (cleanup-on-drop), while an ordinary user `load` does not.
    pub(crate) fn load_table(
        self: &Arc<Self>,
        namespace: &str,
        name: &str,
        need_cleanup: bool,
    ) -> Result<Table> {
        let meta = self
            .catalog
            .get_table_meta(namespace, name)?
            .ok_or_else(|| Error::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
        Ok(Table::from_meta(
            self.clone(),
            namespace.to_string(),
            name.to_string(),
            meta,
            need_cleanup,
        ))
    }
}
