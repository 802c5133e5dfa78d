use std::path::Path;

use crate::error::Result;
use crate::storage::Partition;

/// Transient descriptor pointing a worker task at one partition of a
/// table. Plain data -- cheap to move into a task closure; this is what
/// actually crosses into a worker job, re-opening its partition from the
/// filesystem substrate rather than carrying a live handle.
#[derive(Clone, Debug)]
pub struct Operand {
    pub namespace: String,
    pub name: String,
    pub partition: u32,
    pub num_partitions: u32,
}

impl Operand {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, partition: u32, num_partitions: u32) -> Operand {
        Operand {
            namespace: namespace.into(),
            name: name.into(),
            partition,
            num_partitions,
        }
    }

    /// Re-opens the partition this operand points at.
    pub(crate) fn open(&self, data_root: &Path, map_size: usize) -> Result<Partition> {
        Partition::open(data_root, &self.namespace, &self.name, &self.partition.to_string(), map_size)
    }

    /// The same table, a different partition -- used to address an
    /// intermediate shuffle shard or a sibling output partition without
    /// re-deriving namespace/name.
    pub(crate) fn with_partition(&self, partition: u32) -> Operand {
        Operand {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            partition,
            num_partitions: self.num_partitions,
        }
    }
}
