use std::path::PathBuf;
use std::time::Duration;

/// Default max message size before a federated object is split into a
/// sharded table: 1 MiB.
pub const DEFAULT_MESSAGE_MAX_SIZE: usize = 1_048_576;

/// Default LMDB map size per partition environment: 10 GiB.
pub const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024 * 1024;

const DATA_DIR_ENV: &str = "STANDALONE_DATA_PATH";
const DEFAULT_DATA_DIR: &str = "__standalone_data__";

/// Process-wide tunables for the table engine, session and federation
/// layer: a plain struct with a `Default` impl that resolves
/// environment-derived values once.
#[derive(Clone, Debug)]
pub struct Options {
    /// Root directory under which `<namespace>/<name>/<partition>/`
    /// LMDB environments live.
    pub data_root: PathBuf,
    /// Number of worker threads backing the session's task pool.
    pub threads: usize,
    /// LMDB map size for each partition environment.
    pub map_size: usize,
    /// Inline payload threshold above which federation `remote()` shards
    /// the value into a throwaway single-partition table.
    pub message_max_size: usize,
    /// Sleep interval used while polling for a federation status entry.
    pub federation_poll_interval: Duration,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            data_root: resolve_data_root(),
            threads: num_cpus::get(),
            map_size: DEFAULT_MAP_SIZE,
            message_max_size: DEFAULT_MESSAGE_MAX_SIZE,
            federation_poll_interval: Duration::from_millis(100),
        }
    }
}

fn resolve_data_root() -> PathBuf {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            log::debug!(
                "env {DATA_DIR_ENV} is set, using {} as data dir",
                path.display()
            );
            path
        }
        None => {
            let path = PathBuf::from(DEFAULT_DATA_DIR);
            log::debug!(
                "env {DATA_DIR_ENV} is not set, using {} as data dir",
                path.display()
            );
            path
        }
    }
}
