//! Federation rendezvous: layered on the same partitioned table engine as
//! its transport. Producers write a *status* entry (and, for small
//! objects, an *object* entry) into tables owned by the destination
//! party; the destination's driver polls its own status table until the
//! entry appears, then acknowledges by deleting it.
//!
//! Status and object tables are reserved, single-partition tables under
//! the session namespace, named `__federation_status__.<role>_<id>` and
//! `__federation_object__.<role>_<id>`. They are ordinary
//! catalog-registered tables -- no separate storage path.

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::partition_path::{FEDERATION_OBJECT_PREFIX, FEDERATION_STATUS_PREFIX};
use crate::partitioner::{shared, Partitioner};
use crate::session::SessionInner;
use crate::table::Table;

const DTYPE_TABLE: &str = "Table";
const DTYPE_OBJECT: &str = "obj";
const DTYPE_SPLIT_OBJECT: &str = "split_obj";

/// A federation endpoint role. Roles are drawn from
/// `{guest, host, arbiter, local}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Guest,
    Host,
    Arbiter,
    Local,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Host => "host",
            Role::Arbiter => "arbiter",
            Role::Local => "local",
        }
    }
}

/// A federation endpoint: `(role, id)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Party {
    pub role: Role,
    pub id: String,
}

impl Party {
    pub fn new(role: Role, id: impl Into<String>) -> Party {
        Party { role, id: id.into() }
    }

    fn table_suffix(&self) -> String {
        format!("{}_{}", self.role.as_str(), self.id)
    }
}

/// What travels across the rendezvous: either a handle onto an existing
/// table, or a caller-serialized byte payload. Federation imposes no
/// codec on the payload bytes -- serializing and deserializing the object
/// is the caller's concern, user-supplied codecs being out of scope for
/// the core engine. [`FederationValue::value`]/[`FederationValue::into_value`]
/// offer a `bincode`-based convenience for callers who don't need a
/// different wire format.
pub enum FederationValue {
    Table(Table),
    Object(Vec<u8>),
}

impl FederationValue {
    pub fn value<T: Serialize>(v: &T) -> Result<FederationValue> {
        Ok(FederationValue::Object(bincode::serialize(v)?))
    }

    pub fn into_table(self) -> Result<Table> {
        match self {
            FederationValue::Table(t) => Ok(t),
            FederationValue::Object(_) => Err(Error::InvalidArgument(
                "federation value is an object, not a table".to_string(),
            )),
        }
    }

    pub fn into_object(self) -> Result<Vec<u8>> {
        match self {
            FederationValue::Object(bytes) => Ok(bytes),
            FederationValue::Table(_) => Err(Error::InvalidArgument(
                "federation value is a table, not an object".to_string(),
            )),
        }
    }

    pub fn into_value<T: for<'de> Deserialize<'de>>(self) -> Result<T> {
        let bytes = self.into_object()?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

/// The status table's value: either a pointer at a table holding the
/// payload (dtype tags which kind), or the federation key itself -- a
/// sentinel meaning "the payload is inline in the object table at this
/// same key".
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
enum StatusValue {
    Table {
        name: String,
        namespace: String,
        dtype: String,
    },
    Key(String),
}

fn single_partition() -> Arc<Partitioner> {
    shared(|_key, _n| 0)
}

/// A rendezvous bound to one session. Cheap to obtain repeatedly via
/// [`crate::session::Session::federation`]; status/object tables are
/// (re)loaded from the catalog on every call rather than cached
/// separately, since `Partition::open`'s own environment cache already
/// avoids repeated LMDB opens for the same path.
pub struct Federation {
    session: Arc<SessionInner>,
    session_id: String,
}

impl Federation {
    pub(crate) fn new(session: Arc<SessionInner>) -> Federation {
        let session_id = session.session_id.clone();
        Federation { session, session_id }
    }

    fn federation_key(&self, name: &str, tag: &str, src: &Party, dst: &Party) -> String {
        format!(
            "{}-{}-{}-{}-{}-{}-{}",
            self.session_id,
            name,
            tag,
            src.role.as_str(),
            src.id,
            dst.role.as_str(),
            dst.id
        )
    }

    fn status_table(&self, party: &Party) -> Result<Table> {
        let name = format!("{FEDERATION_STATUS_PREFIX}.{}", party.table_suffix());
        self.session
            .register_table(&self.session_id, &name, 1, 0, 0, 0, false, false)
    }

    fn object_table(&self, party: &Party) -> Result<Table> {
        let name = format!("{FEDERATION_OBJECT_PREFIX}.{}", party.table_suffix());
        self.session
            .register_table(&self.session_id, &name, 1, 0, 0, 0, false, false)
    }

    fn write_status(&self, dst: &Party, key: &str, value: &StatusValue) -> Result<()> {
        let table = self.status_table(dst)?;
        let bytes = bincode::serialize(value)?;
        table.put(key.as_bytes(), &bytes, &single_partition())
    }

    fn wait_status(&self, dst: &Party, key: &str) -> Result<StatusValue> {
        let table = self.status_table(dst)?;
        let partitioner = single_partition();
        loop {
            if let Some(bytes) = table.get(key.as_bytes(), &partitioner)? {
                return Ok(bincode::deserialize(&bytes)?);
            }
            log::debug!("federation get: {key} not yet available, sleeping");
            thread::sleep(self.session.options.federation_poll_interval);
        }
    }

    fn ack_status(&self, dst: &Party, key: &str) -> Result<()> {
        let table = self.status_table(dst)?;
        table.delete(key.as_bytes(), &single_partition())?;
        Ok(())
    }

    /// Sends `value` for `(name, tag)` from `src` to every party in
    /// `parties`. `value` is `Option` only so a caller forwarding an
    /// already-optional upstream value doesn't need to unwrap it first --
    /// `None` is always rejected; real callers should just construct a
    /// [`FederationValue`].
    pub fn remote(
        &self,
        value: Option<FederationValue>,
        name: &str,
        tag: &str,
        src: &Party,
        parties: &[Party],
    ) -> Result<()> {
        let log_str = format!("federation.remote.{name}.{tag}");
        let value = value.ok_or_else(|| {
            Error::InvalidArgument(format!("[{log_str}] remote `None` to {} parties", parties.len()))
        })?;

        match value {
            FederationValue::Table(table) => {
                for dst in parties {
                    let key = self.federation_key(name, tag, src, dst);
                    let copy_name = self.session.fresh_name();
                    // Non-cleanup: the copy is now owned by whichever
                    // receiver eventually loads it with cleanup-on-drop.
                    // A cleanup-owning handle here would destroy it the
                    // moment this function returns, before any receiver
                    // has polled.
                    let copy = table.copy_as(copy_name, table.namespace().to_string(), false)?;
                    log::debug!(
                        "[{log_str}] remote table {}.{} as {}.{} to {:?}",
                        table.namespace(),
                        table.name(),
                        copy.namespace(),
                        copy.name(),
                        dst
                    );
                    self.write_status(
                        dst,
                        &key,
                        &StatusValue::Table {
                            name: copy.name().to_string(),
                            namespace: copy.namespace().to_string(),
                            dtype: DTYPE_TABLE.to_string(),
                        },
                    )?;
                }
                Ok(())
            }
            FederationValue::Object(bytes) => {
                let max = self.session.options.message_max_size;
                if bytes.len() > max {
                    let shard_name = self.session.fresh_name();
                    let shard = self
                        .session
                        .register_table(&self.session_id, &shard_name, 1, 0, 0, 0, false, false)?;
                    let chunks: Vec<(Vec<u8>, Vec<u8>)> = bytes
                        .chunks(max)
                        .enumerate()
                        .map(|(i, chunk)| ((i as u32).to_be_bytes().to_vec(), chunk.to_vec()))
                        .collect();
                    let num_chunks = chunks.len();
                    shard.put_all(chunks, &single_partition())?;
                    log::debug!(
                        "[{log_str}] remote object of {} bytes split into {num_chunks} chunks as {}.{}",
                        bytes.len(),
                        shard.namespace(),
                        shard.name()
                    );
                    for dst in parties {
                        let key = self.federation_key(name, tag, src, dst);
                        self.write_status(
                            dst,
                            &key,
                            &StatusValue::Table {
                                name: shard.name().to_string(),
                                namespace: shard.namespace().to_string(),
                                dtype: DTYPE_SPLIT_OBJECT.to_string(),
                            },
                        )?;
                    }
                    Ok(())
                } else {
                    log::debug!("[{log_str}] remote inline object of {} bytes", bytes.len());
                    for dst in parties {
                        let key = self.federation_key(name, tag, src, dst);
                        let object_table = self.object_table(dst)?;
                        object_table.put(key.as_bytes(), &bytes, &single_partition())?;
                        self.write_status(dst, &key, &StatusValue::Key(key.clone()))?;
                    }
                    Ok(())
                }
            }
        }
    }

    /// Receives `(name, tag)` from every party in `parties`, addressed to
    /// `dst`. Blocks per source party until its status entry appears,
    /// polling at `Options::federation_poll_interval`; never times out --
    /// callers impose their own bound if they need one.
    pub fn get(&self, name: &str, tag: &str, dst: &Party, parties: &[Party]) -> Result<Vec<FederationValue>> {
        let log_str = format!("federation.get.{name}.{tag}");
        let mut out = Vec::with_capacity(parties.len());
        for src in parties {
            let key = self.federation_key(name, tag, src, dst);
            let status = self.wait_status(dst, &key)?;
            let value = match status {
                StatusValue::Table { name: t_name, namespace: t_namespace, dtype } => {
                    let table = self.session.load_table(&t_namespace, &t_name, true)?;
                    log::debug!(
                        "[{log_str}] got table {}.{}, dtype={dtype}",
                        table.namespace(),
                        table.name()
                    );
                    if dtype == DTYPE_SPLIT_OBJECT {
                        let mut bytes = Vec::new();
                        for (_, chunk) in table.collect()? {
                            bytes.extend_from_slice(&chunk);
                        }
                        FederationValue::Object(bytes)
                    } else {
                        FederationValue::Table(table)
                    }
                }
                StatusValue::Key(object_key) => {
                    let object_table = self.object_table(dst)?;
                    let payload = object_table
                        .get(object_key.as_bytes(), &single_partition())?
                        .ok_or_else(|| Error::FederationMissingObject(object_key.clone()))?;
                    object_table.delete(object_key.as_bytes(), &single_partition())?;
                    log::debug!("[{log_str}] got inline object of {} bytes", payload.len());
                    FederationValue::Object(payload)
                }
            };
            self.ack_status(dst, &key)?;
            out.push(value);
        }
        Ok(out)
    }
}
