//! Storage substrate: one memory-mapped, single-database LMDB
//! environment per partition, opened from a filesystem path derived from
//! `(namespace, name, partition)`. Transactions are multi-reader /
//! single-writer, enforced by LMDB itself; a read-write transaction on one
//! partition never blocks readers of a different partition because each
//! partition is a distinct environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use heed::types::Bytes;
use heed::Env;

use crate::error::{Error, Result};
use crate::partition_path::partition_dir;

pub type Db = heed::Database<Bytes, Bytes>;

const OPEN_RETRY_ATTEMPTS: u32 = 100;
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(10);

type EnvCache = Mutex<HashMap<PathBuf, Arc<Env>>>;

static ENV_CACHE: OnceLock<EnvCache> = OnceLock::new();

fn cache() -> &'static EnvCache {
    ENV_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Opens (or returns a cached handle to) the environment at `path`,
/// creating the directory if needed. Retries a transient "directory just
/// created by a concurrent opener" race with a short backoff, bounded at
/// [`OPEN_RETRY_ATTEMPTS`]; any other failure surfaces immediately.
pub fn open_env(path: &Path, map_size: usize) -> Result<Arc<Env>> {
    if let Some(env) = cache().lock().unwrap().get(path) {
        return Ok(env.clone());
    }
    std::fs::create_dir_all(path)?;

    let mut attempt = 0;
    loop {
        // Safety: each path is exclusive to one environment for the
        // lifetime of the process; callers never hand out raw `Env`
        // handles for a path outside of this cache.
        let opened = unsafe {
            heed::EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .max_readers(1024)
                .open(path)
        };
        match opened {
            Ok(env) => {
                let env = Arc::new(env);
                cache()
                    .lock()
                    .unwrap()
                    .insert(path.to_path_buf(), env.clone());
                return Ok(env);
            }
            Err(err) => {
                let transient = err.to_string().contains("No such file or directory");
                attempt += 1;
                if !transient || attempt >= OPEN_RETRY_ATTEMPTS {
                    return Err(Error::StorageOpen {
                        path: path.to_path_buf(),
                        source: err,
                    });
                }
                log::warn!(
                    "transient open failure for {}: {err} (retry {attempt}/{OPEN_RETRY_ATTEMPTS})",
                    path.display()
                );
                std::thread::sleep(OPEN_RETRY_DELAY);
            }
        }
    }
}

/// Drops every cached environment handle whose path lives under `dir`.
/// Called after a directory tree has been removed from disk so a later
/// `open_env` for a reused path (or a resurrected table under the same
/// namespace/name) does not hand back a stale, no-longer-backed `Env`.
pub fn evict_under(dir: &Path) {
    cache().lock().unwrap().retain(|path, _| !path.starts_with(dir));
}

/// Returns the environment's lone database, creating it if this is the
/// first time the environment is opened.
pub fn open_db(env: &Env) -> Result<Db> {
    {
        let rtxn = env.read_txn()?;
        if let Some(db) = env.open_database(&rtxn, None)? {
            return Ok(db);
        }
    }
    let mut wtxn = env.write_txn()?;
    let db = env.create_database(&mut wtxn, None)?;
    wtxn.commit()?;
    Ok(db)
}

/// A handle to one partition's environment and its single database. Cheap
/// to clone: `env` is reference-counted and `db` is a lightweight handle
/// into it.
#[derive(Clone)]
pub struct Partition {
    pub env: Arc<Env>,
    pub db: Db,
    pub path: PathBuf,
}

impl Partition {
    pub fn open(
        data_root: &Path,
        namespace: &str,
        name: &str,
        partition: &str,
        map_size: usize,
    ) -> Result<Partition> {
        let path = partition_dir(data_root, namespace, name, partition);
        let env = open_env(&path, map_size)?;
        let db = open_db(&env)?;
        Ok(Partition { env, db, path })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn()?;
        Ok(self.db.get(&rtxn, key)?.map(|v| v.to_vec()))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, key, value)?;
        wtxn.commit()?;
        Ok(())
    }

    /// Deletes `key`, returning the value that was removed (if any).
    pub fn delete(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut wtxn = self.env.write_txn()?;
        let old = self.db.get(&wtxn, key)?.map(|v| v.to_vec());
        if old.is_some() {
            self.db.delete(&mut wtxn, key)?;
        }
        wtxn.commit()?;
        Ok(old)
    }

    /// Number of entries currently stored, without a full scan.
    pub fn count(&self) -> Result<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.db.len(&rtxn)?)
    }

    /// All entries, in ascending byte-lexicographic key order (LMDB's
    /// native iteration order).
    pub fn scan(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let rtxn = self.env.read_txn()?;
        let mut out = Vec::with_capacity(self.db.len(&rtxn)? as usize);
        for entry in self.db.iter(&rtxn)? {
            let (k, v) = entry?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    /// Empties the database (keeps the environment and directory; callers
    /// that also want the directory gone should follow up with a
    /// `remove_dir_all`).
    pub fn clear(&self) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.db.clear(&mut wtxn)?;
        wtxn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let p = Partition::open(dir.path(), "ns", "t", "0", 10 * 1024 * 1024).unwrap();
        assert_eq!(p.get(b"a").unwrap(), None);
        p.put(b"a", b"1").unwrap();
        assert_eq!(p.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(p.count().unwrap(), 1);
        assert_eq!(p.delete(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(p.get(b"a").unwrap(), None);
    }

    #[test]
    fn scan_is_key_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let p = Partition::open(dir.path(), "ns", "t", "0", 10 * 1024 * 1024).unwrap();
        for k in [b"c", b"a", b"b"] {
            p.put(k, b"v").unwrap();
        }
        let keys: Vec<_> = p.scan().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn reopening_the_same_path_reuses_the_cached_environment() {
        let dir = tempfile::tempdir().unwrap();
        let a = Partition::open(dir.path(), "ns", "t", "0", 10 * 1024 * 1024).unwrap();
        a.put(b"k", b"v").unwrap();
        let b = Partition::open(dir.path(), "ns", "t", "0", 10 * 1024 * 1024).unwrap();
        assert_eq!(b.get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
