//! Table operations: point access, bulk load, ordered
//! scan/collect/take/count, reduce, the three map-reduce-with-index
//! modes, and the binary set operations.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use itertools::Itertools;

use crate::catalog::TableMeta;
use crate::error::{Error, Result};
use crate::operand::Operand;
use crate::partitioner::Partitioner;
use crate::session::SessionInner;
use crate::storage::Partition;

/// `(partition_index, rows_in_that_partition) -> emitted_rows`. Runs once
/// per input partition; emitted rows need not reuse the input keys.
pub type MapPartitionOp =
    dyn Fn(u32, Vec<(Vec<u8>, Vec<u8>)>) -> Vec<(Vec<u8>, Vec<u8>)> + Send + Sync;

/// Associative value combinator used by both `Table::reduce` and the
/// shuffle+reduce mode of `map_reduce_partitions_with_index`.
pub type ReduceOp = dyn Fn(Vec<u8>, Vec<u8>) -> Vec<u8> + Send + Sync;

/// Per-key combinator for `join`/`union`. Fallible: any error raised here
/// is wrapped with both raw byte payloads and re-raised, see
/// [`Error::merge_failed`].
pub type MergeOp =
    dyn Fn(&[u8], &[u8]) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>
        + Send
        + Sync;

/// Always keeps the left value on key collision; the default used when a
/// caller doesn't need a custom merge for `union`.
pub fn default_union_merge() -> Arc<MergeOp> {
    Arc::new(|left: &[u8], _right: &[u8]| Ok(left.to_vec()))
}

/// A partitioned key-value table. Point ops and
/// `collect`/`count`/`take` run directly against the storage substrate
/// from the calling thread; `reduce`, `map_reduce_partitions_with_index`
/// and the binary set operations fan out across the session's worker
/// pool, one task per partition.
pub struct Table {
    session: Arc<SessionInner>,
    namespace: String,
    name: String,
    meta: TableMeta,
    need_cleanup: bool,
}

impl Table {
    pub(crate) fn from_meta(
        session: Arc<SessionInner>,
        namespace: String,
        name: String,
        meta: TableMeta,
        need_cleanup: bool,
    ) -> Table {
        Table {
            session,
            namespace,
            name,
            meta,
            need_cleanup,
        }
    }

    /// A second handle onto the same on-disk table that does not own its
    /// lifecycle -- dropping it never triggers cleanup. Used internally
    /// wherever a binary operation needs to pass one of its operands
    /// through unchanged.
    fn as_view(&self) -> Table {
        Table {
            session: self.session.clone(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            meta: self.meta,
            need_cleanup: false,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_partitions(&self) -> u32 {
        self.meta.num_partitions
    }

    pub fn key_serdes_type(&self) -> u32 {
        self.meta.key_serdes_type
    }

    pub fn value_serdes_type(&self) -> u32 {
        self.meta.value_serdes_type
    }

    pub fn partitioner_type(&self) -> u32 {
        self.meta.partitioner_type
    }

    /// This table's operand descriptor for partition `p`: what actually
    /// crosses into a worker job.
    fn operand(&self, p: u32) -> Operand {
        Operand::new(self.namespace.clone(), self.name.clone(), p, self.meta.num_partitions)
    }

    fn partition(&self, p: u32) -> Result<Partition> {
        self.operand(p)
            .open(&self.session.options.data_root, self.session.options.map_size)
    }

    pub fn get(&self, key: &[u8], partitioner: &Partitioner) -> Result<Option<Vec<u8>>> {
        let p = partitioner(key, self.meta.num_partitions);
        self.partition(p)?.get(key)
    }

    pub fn put(&self, key: &[u8], value: &[u8], partitioner: &Partitioner) -> Result<()> {
        let p = partitioner(key, self.meta.num_partitions);
        self.partition(p)?.put(key, value)
    }

    pub fn delete(&self, key: &[u8], partitioner: &Partitioner) -> Result<Option<Vec<u8>>> {
        let p = partitioner(key, self.meta.num_partitions);
        self.partition(p)?.delete(key)
    }

    /// Bulk-loads `kvs`, routed by `partitioner`. All touched partitions'
    /// writes are staged before any of them commit, so a failure partway
    /// through leaves every partition as it was before the call -- the
    /// stronger all-or-nothing guarantee rather than a best-effort
    /// partial commit.
    pub fn put_all(
        &self,
        kvs: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
        partitioner: &Partitioner,
    ) -> Result<()> {
        let n = self.meta.num_partitions;
        let mut buckets: Vec<Vec<(Vec<u8>, Vec<u8>)>> = (0..n).map(|_| Vec::new()).collect();
        for (k, v) in kvs {
            let d = partitioner(&k, n) as usize;
            buckets[d].push((k, v));
        }

        let mut staged = Vec::new();
        for (p, bucket) in buckets.iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let partition = self.partition(p as u32)?;
            let mut wtxn = partition.env.write_txn()?;
            for (k, v) in bucket {
                partition.db.put(&mut wtxn, k, v)?;
            }
            staged.push(wtxn);
        }
        for wtxn in staged {
            wtxn.commit()?;
        }
        Ok(())
    }

    /// Total entry count across every partition, from LMDB's own stats --
    /// no scan.
    pub fn count(&self) -> Result<u64> {
        let mut total = 0u64;
        for p in 0..self.meta.num_partitions {
            total += self.partition(p)?.count()?;
        }
        Ok(total)
    }

    /// Every entry, merged from each partition's ordered scan into one
    /// global key-ordered sequence.
    pub fn collect(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut scans = Vec::with_capacity(self.meta.num_partitions as usize);
        for p in 0..self.meta.num_partitions {
            scans.push(self.partition(p)?.scan()?);
        }
        Ok(scans.into_iter().kmerge_by(|a, b| a.0 < b.0).collect())
    }

    /// The first `n` entries of [`Table::collect`]'s order. `n` must be
    /// positive.
    pub fn take(&self, n: i64) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        if n <= 0 {
            return Err(Error::InvalidArgument(
                "take size must be positive".to_string(),
            ));
        }
        Ok(self.collect()?.into_iter().take(n as usize).collect())
    }

    /// Folds every value with `reduce_op`: each partition first folds its
    /// own values (in that partition's scan order) in its own task, then
    /// the driver folds the per-partition partial results together.
    /// `None` if the table is empty.
    pub fn reduce(&self, reduce_op: Arc<ReduceOp>) -> Result<Option<Vec<u8>>> {
        let data_root = self.session.options.data_root.clone();
        let map_size = self.session.options.map_size;
        let operand = self.operand(0);
        let task_reducer = reduce_op.clone();
        let partials = self.session.run_partitioned(
            "reduce",
            self.meta.num_partitions,
            move |p| {
                let partition = operand.with_partition(p).open(&data_root, map_size)?;
                let mut acc: Option<Vec<u8>> = None;
                for (_, v) in partition.scan()? {
                    acc = Some(match acc {
                        None => v,
                        Some(prev) => task_reducer(prev, v),
                    });
                }
                Ok(acc)
            },
        )?;

        let mut result: Option<Vec<u8>> = None;
        for partial in partials.into_iter().flatten() {
            result = Some(match result {
                None => partial,
                Some(prev) => reduce_op(prev, partial),
            });
        }
        Ok(result)
    }

    /// The three map-reduce-with-index modes:
    ///
    /// - `shuffle == false`: each input partition `p` is mapped in place
    ///   and written straight to output partition `p`.
    /// - `shuffle == true`, `reduce_op.is_none()`: each emitted row is
    ///   routed by `output_partitioner` directly into the output table.
    /// - `shuffle == true`, `reduce_op.is_some()`: a two-stage shuffle.
    ///   Stage 1 writes an intermediate `"<src>_<dst>"`-partitioned table
    ///   keyed by `be_u32(emit_index) ++ original_key`; stage 2 folds each
    ///   destination's intermediate shards down with `reduce_op` into the
    ///   real output partition, then the intermediate table is cleared
    ///   and removed from disk.
    #[allow(clippy::too_many_arguments)]
    pub fn map_reduce_partitions_with_index(
        &self,
        map_op: Arc<MapPartitionOp>,
        reduce_op: Option<Arc<ReduceOp>>,
        output_partitioner: Option<Arc<Partitioner>>,
        shuffle: bool,
        output_key_serdes_type: u32,
        output_value_serdes_type: u32,
        output_partitioner_type: u32,
        need_cleanup: bool,
        output_name: Option<String>,
        output_namespace: Option<String>,
    ) -> Result<Table> {
        let output_namespace = output_namespace.unwrap_or_else(|| self.session.session_id.clone());
        let output_name = output_name.unwrap_or_else(|| self.session.fresh_name());
        let data_root = self.session.options.data_root.clone();
        let map_size = self.session.options.map_size;
        let in_operand = self.operand(0);
        let num_partitions = self.meta.num_partitions;

        if !shuffle {
            let out_operand = Operand::new(output_namespace.clone(), output_name.clone(), 0, num_partitions);
            self.session.run_partitioned("map", num_partitions, move |p| {
                let input = in_operand.with_partition(p).open(&data_root, map_size)?;
                let rows = input.scan()?;
                let emitted = map_op(p, rows);
                let output = out_operand.with_partition(p).open(&data_root, map_size)?;
                let mut wtxn = output.env.write_txn()?;
                for (k, v) in emitted {
                    output.db.put(&mut wtxn, &k, &v)?;
                }
                wtxn.commit()?;
                Ok(())
            })?;
            return self.session.register_table(
                &output_namespace,
                &output_name,
                num_partitions,
                output_key_serdes_type,
                output_value_serdes_type,
                output_partitioner_type,
                need_cleanup,
                false,
            );
        }

        let output_partitioner = output_partitioner.ok_or_else(|| {
            Error::InvalidArgument("output_partitioner is required when shuffle is true".to_string())
        })?;

        match reduce_op {
            None => {
                let out_namespace = output_namespace.clone();
                let out_name = output_name.clone();
                let partitioner = output_partitioner.clone();
                self.session.run_partitioned("map_shuffle", num_partitions, move |p| {
                    let input = in_operand.with_partition(p).open(&data_root, map_size)?;
                    let rows = input.scan()?;
                    let emitted = map_op(p, rows);
                    let mut buckets: Vec<Vec<(Vec<u8>, Vec<u8>)>> =
                        (0..num_partitions).map(|_| Vec::new()).collect();
                    for (k, v) in emitted {
                        let d = partitioner(&k, num_partitions) as usize;
                        buckets[d].push((k, v));
                    }
                    // One destination's writer lock at a time: every
                    // source partition touches every destination here, and
                    // holding all of them open at once across
                    // concurrently-running source tasks would be a
                    // classic lock-ordering deadlock against LMDB's
                    // single-writer-per-environment rule.
                    for (d, bucket) in buckets.into_iter().enumerate() {
                        if bucket.is_empty() {
                            continue;
                        }
                        let output =
                            Partition::open(&data_root, &out_namespace, &out_name, &d.to_string(), map_size)?;
                        let mut wtxn = output.env.write_txn()?;
                        for (k, v) in bucket {
                            output.db.put(&mut wtxn, &k, &v)?;
                        }
                        wtxn.commit()?;
                    }
                    Ok(())
                })?;
                self.session.register_table(
                    &output_namespace,
                    &output_name,
                    num_partitions,
                    output_key_serdes_type,
                    output_value_serdes_type,
                    output_partitioner_type,
                    need_cleanup,
                    false,
                )
            }
            Some(reduce_op) => {
                let intermediate_namespace = self.session.session_id.clone();
                let intermediate_name = self.session.fresh_name();

                {
                    let intermediate_namespace = intermediate_namespace.clone();
                    let intermediate_name = intermediate_name.clone();
                    let data_root = data_root.clone();
                    let partitioner = output_partitioner.clone();
                    self.session.run_partitioned("map_shuffle_reduce_stage1", num_partitions, move |p| {
                        let input = in_operand.with_partition(p).open(&data_root, map_size)?;
                        let rows = input.scan()?;
                        let emitted = map_op(p, rows);
                        let mut buckets: Vec<Vec<(Vec<u8>, Vec<u8>)>> =
                            (0..num_partitions).map(|_| Vec::new()).collect();
                        // The emit index is global across the producing
                        // partition (not per destination), so two
                        // emissions that land on the same destination
                        // never collide even if their original keys are
                        // equal.
                        for (idx, (k, v)) in emitted.into_iter().enumerate() {
                            let d = partitioner(&k, num_partitions) as usize;
                            let mut shuffle_key = Vec::with_capacity(4 + k.len());
                            shuffle_key.extend_from_slice(&(idx as u32).to_be_bytes());
                            shuffle_key.extend_from_slice(&k);
                            buckets[d].push((shuffle_key, v));
                        }
                        for (d, bucket) in buckets.into_iter().enumerate() {
                            if bucket.is_empty() {
                                continue;
                            }
                            let shuffle_id = format!("{p}_{d}");
                            let output = Partition::open(
                                &data_root,
                                &intermediate_namespace,
                                &intermediate_name,
                                &shuffle_id,
                                map_size,
                            )?;
                            let mut wtxn = output.env.write_txn()?;
                            for (k, v) in bucket {
                                output.db.put(&mut wtxn, &k, &v)?;
                            }
                            wtxn.commit()?;
                        }
                        Ok(())
                    })?;
                }

                let out_namespace = output_namespace.clone();
                let out_name = output_name.clone();
                {
                    let intermediate_namespace = intermediate_namespace.clone();
                    let intermediate_name = intermediate_name.clone();
                    let data_root = data_root.clone();
                    self.session.run_partitioned("map_shuffle_reduce_stage2", num_partitions, move |d| {
                        let output =
                            Partition::open(&data_root, &out_namespace, &out_name, &d.to_string(), map_size)?;
                        let mut wtxn = output.env.write_txn()?;
                        for s in 0..num_partitions {
                            let shuffle_id = format!("{s}_{d}");
                            let intermediate = Partition::open(
                                &data_root,
                                &intermediate_namespace,
                                &intermediate_name,
                                &shuffle_id,
                                map_size,
                            )?;
                            let rtxn = intermediate.env.read_txn()?;
                            for entry in intermediate.db.iter(&rtxn)? {
                                let (shuffle_key, v) = entry?;
                                let key = &shuffle_key[4..];
                                match output.db.get(&wtxn, key)? {
                                    Some(existing) => {
                                        let existing = existing.to_vec();
                                        let reduced = reduce_op(existing, v.to_vec());
                                        output.db.put(&mut wtxn, key, &reduced)?;
                                    }
                                    None => {
                                        output.db.put(&mut wtxn, key, v)?;
                                    }
                                }
                            }
                        }
                        wtxn.commit()?;
                        Ok(())
                    })?;
                }

                // Drop the intermediate table: clear every "<src>_<dst>"
                // shard, then remove the directory tree and evict any
                // cached environment handles under it.
                for s in 0..num_partitions {
                    for d in 0..num_partitions {
                        let shuffle_id = format!("{s}_{d}");
                        if let Ok(partition) = Partition::open(
                            &data_root,
                            &intermediate_namespace,
                            &intermediate_name,
                            &shuffle_id,
                            map_size,
                        ) {
                            let _ = partition.clear();
                        }
                    }
                }
                let intermediate_dir = crate::partition_path::table_dir(
                    &data_root,
                    &intermediate_namespace,
                    &intermediate_name,
                );
                if let Err(err) = std::fs::remove_dir_all(&intermediate_dir) {
                    if err.kind() != std::io::ErrorKind::NotFound {
                        log::warn!(
                            "failed to remove intermediate shuffle table {}: {err}",
                            intermediate_dir.display()
                        );
                    }
                }
                crate::storage::evict_under(&intermediate_dir);

                self.session.register_table(
                    &output_namespace,
                    &output_name,
                    num_partitions,
                    output_key_serdes_type,
                    output_value_serdes_type,
                    output_partitioner_type,
                    need_cleanup,
                    false,
                )
            }
        }
    }

    /// Aligns `self` and `other` to the same partition count ahead of a
    /// binary operation. If the counts already match, both sides pass
    /// through unchanged; otherwise the side with fewer total rows is
    /// repartitioned to match the other's partition count.
    fn aligned_with(&self, other: &Table, partitioner: Arc<Partitioner>) -> Result<(Table, Table)> {
        if self.meta.num_partitions == other.meta.num_partitions {
            return Ok((self.as_view(), other.as_view()));
        }
        if other.count()? > self.count()? {
            let left = self.repartition(other.meta.num_partitions, partitioner)?;
            Ok((left, other.as_view()))
        } else {
            let right = other.repartition(self.meta.num_partitions, partitioner)?;
            Ok((self.as_view(), right))
        }
    }

    /// Inner join on key: for each key present in both tables, emits
    /// `merge_op(left_value, right_value)`. Any error from `merge_op` is
    /// wrapped with both raw byte payloads.
    pub fn join(&self, other: &Table, merge_op: Arc<MergeOp>, partitioner: Arc<Partitioner>) -> Result<Table> {
        let (left, right) = self.aligned_with(other, partitioner)?;
        let num_partitions = left.meta.num_partitions;
        let output_namespace = self.session.session_id.clone();
        let output_name = self.session.fresh_name();

        let data_root = self.session.options.data_root.clone();
        let map_size = self.session.options.map_size;
        let left_namespace = left.namespace.clone();
        let left_name = left.name.clone();
        let right_namespace = right.namespace.clone();
        let right_name = right.name.clone();
        let out_namespace = output_namespace.clone();
        let out_name = output_name.clone();

        self.session.run_partitioned("join", num_partitions, move |p| {
            let left_partition =
                Partition::open(&data_root, &left_namespace, &left_name, &p.to_string(), map_size)?;
            let right_partition =
                Partition::open(&data_root, &right_namespace, &right_name, &p.to_string(), map_size)?;
            let output = Partition::open(&data_root, &out_namespace, &out_name, &p.to_string(), map_size)?;
            let rtxn_right = right_partition.env.read_txn()?;
            let mut wtxn = output.env.write_txn()?;
            for (k, v1) in left_partition.scan()? {
                if let Some(v2) = right_partition.db.get(&rtxn_right, &k)? {
                    let merged = merge_op(&v1, v2).map_err(|source| Error::merge_failed("join", p, source, &v1, v2))?;
                    output.db.put(&mut wtxn, &k, &merged)?;
                }
            }
            wtxn.commit()?;
            Ok(())
        })?;

        self.session.register_table(
            &output_namespace,
            &output_name,
            num_partitions,
            self.meta.key_serdes_type,
            self.meta.value_serdes_type,
            self.meta.partitioner_type,
            true,
            false,
        )
    }

    /// Union on key: keys unique to either side pass through unchanged,
    /// keys present in both are combined with `merge_op`.
    pub fn union(&self, other: &Table, merge_op: Arc<MergeOp>, partitioner: Arc<Partitioner>) -> Result<Table> {
        let (left, right) = self.aligned_with(other, partitioner)?;
        let num_partitions = left.meta.num_partitions;
        let output_namespace = self.session.session_id.clone();
        let output_name = self.session.fresh_name();

        let data_root = self.session.options.data_root.clone();
        let map_size = self.session.options.map_size;
        let left_namespace = left.namespace.clone();
        let left_name = left.name.clone();
        let right_namespace = right.namespace.clone();
        let right_name = right.name.clone();
        let out_namespace = output_namespace.clone();
        let out_name = output_name.clone();

        self.session.run_partitioned("union", num_partitions, move |p| {
            let left_partition =
                Partition::open(&data_root, &left_namespace, &left_name, &p.to_string(), map_size)?;
            let right_partition =
                Partition::open(&data_root, &right_namespace, &right_name, &p.to_string(), map_size)?;
            let output = Partition::open(&data_root, &out_namespace, &out_name, &p.to_string(), map_size)?;

            let left_rows = left_partition.scan()?;
            let mut right_map: HashMap<Vec<u8>, Vec<u8>> = right_partition.scan()?.into_iter().collect();
            let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
            for (k, lv) in left_rows {
                let v = match right_map.remove(&k) {
                    Some(rv) => {
                        merge_op(&lv, &rv).map_err(|source| Error::merge_failed("union", p, source, &lv, &rv))?
                    }
                    None => lv,
                };
                merged.insert(k, v);
            }
            merged.extend(right_map);

            let mut wtxn = output.env.write_txn()?;
            for (k, v) in merged {
                output.db.put(&mut wtxn, &k, &v)?;
            }
            wtxn.commit()?;
            Ok(())
        })?;

        self.session.register_table(
            &output_namespace,
            &output_name,
            num_partitions,
            self.meta.key_serdes_type,
            self.meta.value_serdes_type,
            self.meta.partitioner_type,
            true,
            false,
        )
    }

    /// `union` with the default "left wins" merge.
    pub fn union_default(&self, other: &Table, partitioner: Arc<Partitioner>) -> Result<Table> {
        self.union(other, default_union_merge(), partitioner)
    }

    /// Keys present in `self` but absent from `other`.
    pub fn subtract_by_key(&self, other: &Table, partitioner: Arc<Partitioner>) -> Result<Table> {
        let (left, right) = self.aligned_with(other, partitioner)?;
        let num_partitions = left.meta.num_partitions;
        let output_namespace = self.session.session_id.clone();
        let output_name = self.session.fresh_name();

        let data_root = self.session.options.data_root.clone();
        let map_size = self.session.options.map_size;
        let left_namespace = left.namespace.clone();
        let left_name = left.name.clone();
        let right_namespace = right.namespace.clone();
        let right_name = right.name.clone();
        let out_namespace = output_namespace.clone();
        let out_name = output_name.clone();

        self.session.run_partitioned("subtract_by_key", num_partitions, move |p| {
            let left_partition =
                Partition::open(&data_root, &left_namespace, &left_name, &p.to_string(), map_size)?;
            let right_partition =
                Partition::open(&data_root, &right_namespace, &right_name, &p.to_string(), map_size)?;
            let output = Partition::open(&data_root, &out_namespace, &out_name, &p.to_string(), map_size)?;
            let rtxn_right = right_partition.env.read_txn()?;
            let mut wtxn = output.env.write_txn()?;
            for (k, v) in left_partition.scan()? {
                if right_partition.db.get(&rtxn_right, &k)?.is_none() {
                    output.db.put(&mut wtxn, &k, &v)?;
                }
            }
            wtxn.commit()?;
            Ok(())
        })?;

        self.session.register_table(
            &output_namespace,
            &output_name,
            num_partitions,
            self.meta.key_serdes_type,
            self.meta.value_serdes_type,
            self.meta.partitioner_type,
            true,
            false,
        )
    }

    /// Builds a fresh table with `partitions` partitions holding the same
    /// entries, reshuffled by `partitioner`.
    pub fn repartition(&self, partitions: u32, partitioner: Arc<Partitioner>) -> Result<Table> {
        let name = self.session.fresh_name();
        let table = self.session.register_table(
            &self.namespace,
            &name,
            partitions,
            self.meta.key_serdes_type,
            self.meta.value_serdes_type,
            self.meta.partitioner_type,
            true,
            false,
        )?;
        table.put_all(self.collect()?, &partitioner)?;
        Ok(table)
    }

    /// Identity copy under a new `(namespace, name)`, same partition
    /// count and type tags.
    pub fn copy_as(&self, name: String, namespace: String, need_cleanup: bool) -> Result<Table> {
        self.map_reduce_partitions_with_index(
            Arc::new(|_p: u32, rows: Vec<(Vec<u8>, Vec<u8>)>| rows),
            None,
            None,
            false,
            self.meta.key_serdes_type,
            self.meta.value_serdes_type,
            self.meta.partitioner_type,
            need_cleanup,
            Some(name),
            Some(namespace),
        )
    }

    /// `copy_as`, optionally repartitioning first when `partitions`
    /// differs from this table's current partition count.
    pub fn save_as(
        &self,
        name: String,
        namespace: String,
        partitions: Option<u32>,
        need_cleanup: bool,
        partitioner: Arc<Partitioner>,
    ) -> Result<Table> {
        match partitions {
            Some(p) if p != self.meta.num_partitions => {
                let repartitioned = self.repartition(p, partitioner)?;
                repartitioned.copy_as(name, namespace, need_cleanup)
            }
            _ => self.copy_as(name, namespace, need_cleanup),
        }
    }

    /// Clears every partition and removes the catalog entry and the
    /// table's on-disk directory. Safe to call more than once.
    pub fn destroy(&self) -> Result<()> {
        for p in 0..self.meta.num_partitions {
            if let Ok(partition) = self.partition(p) {
                if let Err(err) = partition.clear() {
                    log::warn!(
                        "failed to clear partition {p} of {}.{}: {err}",
                        self.namespace,
                        self.name
                    );
                }
            }
        }
        self.session.catalog.destroy_table(&self.namespace, &self.name)
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        if self.need_cleanup {
            if let Err(err) = self.destroy() {
                log::warn!("failed to clean up table {}.{}: {err}", self.namespace, self.name);
            }
        }
    }
}
