//! Table-meta catalog: a process-wide catalog whose own
//! storage is a fixed, internally sharded set of [`META_NUM_PARTITIONS`]
//! key-value partitions at the reserved `(__META__, fragments)`
//! namespace/name. Maps `(namespace, name) -> TableMeta`.

use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::partition_path::{META_NAME, META_NAMESPACE, META_NUM_PARTITIONS};
use crate::storage::Partition;

/// Fixed-layout table metadata: four big-endian `u32`s, immutable once a
/// table is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableMeta {
    pub num_partitions: u32,
    pub key_serdes_type: u32,
    pub value_serdes_type: u32,
    pub partitioner_type: u32,
}

impl TableMeta {
    pub fn new(
        num_partitions: u32,
        key_serdes_type: u32,
        value_serdes_type: u32,
        partitioner_type: u32,
    ) -> TableMeta {
        TableMeta {
            num_partitions,
            key_serdes_type,
            value_serdes_type,
            partitioner_type,
        }
    }

    /// Current fixed layout: `[num_partitions, key_serdes_type,
    /// value_serdes_type, partitioner_type]`, each a big-endian `u32`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        buf.write_u32::<BigEndian>(self.num_partitions).unwrap();
        buf.write_u32::<BigEndian>(self.key_serdes_type).unwrap();
        buf.write_u32::<BigEndian>(self.value_serdes_type).unwrap();
        buf.write_u32::<BigEndian>(self.partitioner_type).unwrap();
        buf
    }

    /// Decodes either the current 16-byte fixed layout or a legacy
    /// 4-byte record holding only `num_partitions` (the type tags then
    /// read as zero). Record length is the disambiguator, since a typed
    /// field layout has no natural tag byte to branch on otherwise.
    pub fn deserialize(bytes: &[u8]) -> Result<TableMeta> {
        if bytes.len() == 16 {
            let mut cursor = bytes;
            let num_partitions = cursor.read_u32::<BigEndian>()?;
            let key_serdes_type = cursor.read_u32::<BigEndian>()?;
            let value_serdes_type = cursor.read_u32::<BigEndian>()?;
            let partitioner_type = cursor.read_u32::<BigEndian>()?;
            Ok(TableMeta {
                num_partitions,
                key_serdes_type,
                value_serdes_type,
                partitioner_type,
            })
        } else {
            let num_partitions: u32 = bincode::deserialize(bytes)?;
            Ok(TableMeta {
                num_partitions,
                key_serdes_type: 0,
                value_serdes_type: 0,
                partitioner_type: 0,
            })
        }
    }
}

/// Hashes `"{name}.{namespace}"` with SHA-256 and reduces it modulo
/// `partitions` to pick the catalog shard that owns this table's
/// metadata entry.
fn hash_to_partition(namespace: &str, name: &str, partitions: u32) -> (Vec<u8>, u32) {
    let key = format!("{name}.{namespace}").into_bytes();
    let digest = Sha256::digest(&key);
    // Reduce the 256-bit digest modulo `partitions` exactly the way the
    // original does: interpret the whole digest as one big big-endian
    // unsigned integer, not just its low bits.
    let mut acc: u64 = 0;
    for byte in digest.iter() {
        acc = (acc * 256 + u64::from(*byte)) % u64::from(partitions);
    }
    (key, acc as u32)
}

pub struct Catalog {
    data_root: std::path::PathBuf,
    map_size: usize,
}

impl Catalog {
    pub fn new(data_root: &Path, map_size: usize) -> Catalog {
        Catalog {
            data_root: data_root.to_path_buf(),
            map_size,
        }
    }

    fn shard(&self, namespace: &str, name: &str) -> Result<(Vec<u8>, Partition)> {
        let (key, partition_id) = hash_to_partition(namespace, name, META_NUM_PARTITIONS);
        let partition = Partition::open(
            &self.data_root,
            META_NAMESPACE,
            META_NAME,
            &partition_id.to_string(),
            self.map_size,
        )?;
        Ok((key, partition))
    }

    pub fn add_table_meta(&self, namespace: &str, name: &str, meta: TableMeta) -> Result<()> {
        let (key, partition) = self.shard(namespace, name)?;
        partition.put(&key, &meta.serialize())
    }

    pub fn get_table_meta(&self, namespace: &str, name: &str) -> Result<Option<TableMeta>> {
        let (key, partition) = self.shard(namespace, name)?;
        match partition.get(&key)? {
            Some(bytes) => Ok(Some(TableMeta::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Removes the catalog entry and recursively deletes the table's
    /// on-disk directory. Best-effort: directory removal failures are
    /// logged and swallowed rather than propagated.
    pub fn destroy_table(&self, namespace: &str, name: &str) -> Result<()> {
        let (key, partition) = self.shard(namespace, name)?;
        partition.delete(&key)?;
        let dir = crate::partition_path::table_dir(&self.data_root, namespace, name);
        if let Err(err) = std::fs::remove_dir_all(&dir) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to remove table directory {}: {err}", dir.display());
            }
        }
        crate::storage::evict_under(&dir);
        Ok(())
    }
}
