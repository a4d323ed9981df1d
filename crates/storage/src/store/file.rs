//! JSON file store shared between processes.
//!
//! The crawler daemon and one-shot CLI commands open the same file. Each
//! [`FileStore`] keeps the state it loaded plus a journal of its own changes.
//! On [`NodeStore::flush`] the journal is replayed onto the current file
//! contents under an exclusive lock on a sidecar `.lock` file, so changes made
//! by other processes in the meantime survive. Subscriber reads reload the
//! file when another process has written it.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::address::NodeAddress;
use crate::model::{ActivityLogEntry, Node, StatSample, Subscriber};

use super::memory::MemoryStore;
use super::state::{NodeRecord, StoreState, SubscriberOp};
use super::{NodeStore, Retention, StoreError, SubscriberStore};

/// Exclusive advisory lock, released on drop.
#[derive(Debug)]
struct FileLock(File);

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock()?;
        Ok(Self(file))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(error) = self.0.unlock() {
            tracing::debug!(%error, "failed to release store lock");
        }
    }
}

/// Identity of the file version last read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Result<Option<Self>, StoreError> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(Self {
                modified: meta.modified()?,
                len: meta.len(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Changes made through this handle and not yet written.
#[derive(Debug, Default)]
struct Journal {
    /// Nodes whose fields changed; the local record wins on merge.
    nodes: BTreeSet<NodeAddress>,
    samples: Vec<(NodeAddress, StatSample)>,
    activity: Vec<ActivityLogEntry>,
    subscribers: Vec<SubscriberOp>,
}

impl Journal {
    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.samples.is_empty()
            && self.activity.is_empty()
            && self.subscribers.is_empty()
    }

    /// Replay onto `target`, taking node fields from `local`.
    fn replay(&self, local: &StoreState, target: &mut StoreState, retention: &Retention) {
        for address in &self.nodes {
            let Some(record) = local.nodes.get(address) else {
                continue;
            };
            match target.nodes.get_mut(address) {
                Some(existing) => existing.node = record.node.clone(),
                None => {
                    target.nodes.insert(
                        address.clone(),
                        NodeRecord {
                            node: record.node.clone(),
                            samples: Vec::new(),
                        },
                    );
                }
            }
        }
        for (address, sample) in &self.samples {
            if let Err(error) =
                target.append_sample(address, sample.clone(), retention.samples_per_node)
            {
                tracing::debug!(%address, %error, "dropping sample of removed node");
            }
        }
        for entry in &self.activity {
            target.record_activity(entry.clone(), retention.activity_entries);
        }
        for op in &self.subscribers {
            target.apply_subscriber_op(op);
        }
        target.enforce_retention(retention);
    }
}

/// JSON file store. Loaded to memory on open, merged back on flush.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    inner: MemoryStore,
    journal: Mutex<Journal>,
    stamp: Mutex<Option<FileStamp>>,
}

impl FileStore {
    /// Load existing file or create empty store.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = Self::load_from_file(&path)?;
        let stamp = FileStamp::of(&path)?;

        tracing::debug!(path = %path.display(), nodes = state.nodes.len(), "opened store");

        Ok(Self {
            lock_path: path.with_extension("json.lock"),
            path,
            inner: MemoryStore::from_state(state),
            journal: Mutex::new(Journal::default()),
            stamp: Mutex::new(stamp),
        })
    }

    /// Create store, making parent directories if needed.
    pub fn new_with_create_dir(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::new(path)
    }

    /// Keep at most `retention` history, in memory and on disk.
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.inner.set_retention(retention);
        self
    }

    fn load_from_file(path: &Path) -> Result<StoreState, StoreError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreState::default());
            }
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn save_to_file(&self, state: &StoreState) -> Result<(), StoreError> {
        // Write to temp file first, then rename (atomic)
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let file = File::create(&tmp_path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer(writer, state)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Merge the journal onto the file contents under the lock and adopt the
    /// result. `edit` then runs on the merged state and returns how many
    /// records it changed. The file is written only when `write` is set and
    /// something changed; the journal is cleared only when written.
    fn sync_with(
        &self,
        write: bool,
        edit: impl FnOnce(&mut StoreState) -> usize,
    ) -> Result<usize, StoreError> {
        let _lock = FileLock::acquire(&self.lock_path)?;
        let mut journal = self.journal.lock();
        let mut state = self.inner.state().write();

        let mut merged = Self::load_from_file(&self.path)?;
        journal.replay(&state, &mut merged, &self.inner.retention());
        let changed = edit(&mut merged);

        if write && (changed > 0 || !journal.is_empty()) {
            self.save_to_file(&merged)?;
            *journal = Journal::default();
        }
        *state = merged;
        *self.stamp.lock() = FileStamp::of(&self.path)?;
        Ok(changed)
    }

    /// Pick up changes other processes wrote since the last read or write.
    fn reload_if_changed(&self) -> Result<(), StoreError> {
        let current = FileStamp::of(&self.path)?;
        if current.is_some() && current != *self.stamp.lock() {
            tracing::trace!(path = %self.path.display(), "store changed on disk, reloading");
            self.sync_with(false, |_| 0)?;
        }
        Ok(())
    }

    /// Apply a node-level change and journal the touched addresses.
    fn journaled<T>(
        &self,
        change: impl FnOnce(&MemoryStore) -> Result<T, StoreError>,
        touched: impl FnOnce(&T, &mut Journal),
    ) -> Result<T, StoreError> {
        let mut journal = self.journal.lock();
        let value = change(&self.inner)?;
        touched(&value, &mut journal);
        Ok(value)
    }

    pub fn is_dirty(&self) -> bool {
        !self.journal.lock().is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NodeStore for FileStore {
    fn node(&self, address: &NodeAddress) -> Result<Option<Node>, StoreError> {
        self.inner.node(address)
    }

    fn nodes(&self) -> Result<Vec<Node>, StoreError> {
        self.inner.nodes()
    }

    fn upsert_node(
        &self,
        address: &NodeAddress,
        now: u64,
        apply: &mut dyn FnMut(&mut Node),
    ) -> Result<Node, StoreError> {
        self.journaled(
            |inner| inner.upsert_node(address, now, apply),
            |_, journal| {
                journal.nodes.insert(address.clone());
            },
        )
    }

    fn update_node(
        &self,
        address: &NodeAddress,
        apply: &mut dyn FnMut(&mut Node),
    ) -> Result<Option<Node>, StoreError> {
        self.journaled(
            |inner| inner.update_node(address, apply),
            |updated, journal| {
                if updated.is_some() {
                    journal.nodes.insert(address.clone());
                }
            },
        )
    }

    fn set_credits_by_public_key(
        &self,
        public_key: &str,
        credits: u64,
    ) -> Result<usize, StoreError> {
        let mut journal = self.journal.lock();
        let updated = self
            .inner
            .state()
            .write()
            .set_credits_by_public_key(public_key, credits);
        let count = updated.len();
        journal.nodes.extend(updated);
        Ok(count)
    }

    fn append_sample(&self, address: &NodeAddress, sample: StatSample) -> Result<(), StoreError> {
        self.journaled(
            |inner| inner.append_sample(address, sample.clone()),
            |_, journal| journal.samples.push((address.clone(), sample.clone())),
        )
    }

    fn samples(&self, address: &NodeAddress) -> Result<Vec<StatSample>, StoreError> {
        self.inner.samples(address)
    }

    fn latest_sample(&self, address: &NodeAddress) -> Result<Option<StatSample>, StoreError> {
        self.inner.latest_sample(address)
    }

    fn record_activity(&self, entry: ActivityLogEntry) -> Result<(), StoreError> {
        self.journaled(
            |inner| inner.record_activity(entry.clone()),
            |_, journal| journal.activity.push(entry.clone()),
        )
    }

    fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityLogEntry>, StoreError> {
        self.inner.recent_activity(limit)
    }

    /// Runs against the current file contents and is written immediately.
    fn normalize_addresses(&self, rpc_port: u16) -> Result<usize, StoreError> {
        self.sync_with(true, |state| state.normalize_addresses(rpc_port))
    }

    fn flush(&self) -> Result<(), StoreError> {
        if self.is_dirty() {
            self.sync_with(true, |_| 0)?;
        }
        Ok(())
    }
}

impl FileStore {
    fn subscriber_change<T>(
        &self,
        change: impl FnOnce(&MemoryStore) -> Result<T, StoreError>,
        op: SubscriberOp,
    ) -> Result<T, StoreError> {
        self.reload_if_changed()?;
        self.journaled(change, |_, journal| journal.subscribers.push(op))
    }
}

impl SubscriberStore for FileStore {
    fn subscriber(&self, connect_code: &str) -> Result<Option<Subscriber>, StoreError> {
        self.reload_if_changed()?;
        self.inner.subscriber(connect_code)
    }

    fn subscriber_by_channel(&self, channel_id: &str) -> Result<Option<Subscriber>, StoreError> {
        self.reload_if_changed()?;
        self.inner.subscriber_by_channel(channel_id)
    }

    fn get_or_create_subscriber(
        &self,
        connect_code: &str,
        now: u64,
    ) -> Result<Subscriber, StoreError> {
        self.subscriber_change(
            |inner| inner.get_or_create_subscriber(connect_code, now),
            SubscriberOp::Create {
                connect_code: connect_code.to_string(),
                now,
            },
        )
    }

    fn link_channel(
        &self,
        connect_code: &str,
        channel_id: &str,
    ) -> Result<Option<Subscriber>, StoreError> {
        self.subscriber_change(
            |inner| inner.link_channel(connect_code, channel_id),
            SubscriberOp::Link {
                connect_code: connect_code.to_string(),
                channel_id: channel_id.to_string(),
            },
        )
    }

    fn watch(&self, connect_code: &str, address: &NodeAddress) -> Result<bool, StoreError> {
        self.subscriber_change(
            |inner| inner.watch(connect_code, address),
            SubscriberOp::Watch {
                connect_code: connect_code.to_string(),
                address: address.clone(),
            },
        )
    }

    fn unwatch(&self, connect_code: &str, address: &NodeAddress) -> Result<bool, StoreError> {
        self.subscriber_change(
            |inner| inner.unwatch(connect_code, address),
            SubscriberOp::Unwatch {
                connect_code: connect_code.to_string(),
                address: address.clone(),
            },
        )
    }

    fn watched_by(&self, connect_code: &str) -> Result<Vec<NodeAddress>, StoreError> {
        self.reload_if_changed()?;
        self.inner.watched_by(connect_code)
    }

    fn watchers(&self, address: &NodeAddress) -> Result<Vec<Subscriber>, StoreError> {
        self.reload_if_changed()?;
        self.inner.watchers(address)
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(error) = self.flush() {
            tracing::warn!(path = %self.path.display(), %error, "failed to save store on drop");
        }
    }
}
