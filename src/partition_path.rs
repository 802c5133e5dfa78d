use std::path::{Path, PathBuf};

/// Directory a single partition's LMDB environment lives in:
/// `<data_root>/<namespace>/<name>/<partition_index>/`.
pub fn partition_dir(data_root: &Path, namespace: &str, name: &str, partition: &str) -> PathBuf {
    data_root.join(namespace).join(name).join(partition)
}

/// Directory holding every partition of a table:
/// `<data_root>/<namespace>/<name>/`.
pub fn table_dir(data_root: &Path, namespace: &str, name: &str) -> PathBuf {
    data_root.join(namespace).join(name)
}

/// Directory holding every table of a namespace: `<data_root>/<namespace>/`.
pub fn namespace_dir(data_root: &Path, namespace: &str) -> PathBuf {
    data_root.join(namespace)
}

pub const META_NAMESPACE: &str = "__META__";
pub const META_NAME: &str = "fragments";
pub const META_NUM_PARTITIONS: u32 = 11;

pub const FEDERATION_STATUS_PREFIX: &str = "__federation_status__";
pub const FEDERATION_OBJECT_PREFIX: &str = "__federation_object__";
