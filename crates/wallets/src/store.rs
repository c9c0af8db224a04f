//! Session state shared by every adapter.
//!
//! A single [`SessionStore`] is created per application and injected into every wallet. It
//! holds the recorded account, the active chains, the relay sign-client handle and the
//! reconnect flags. The durable "reconnect on load" flag lives in a [`DurableStorage`] so it
//! survives restarts and can be cleared on its own.

use crate::{
    WalletType,
    events::{EventEmitter, Handler, Subscription},
    types::Key,
    walletconnect::SignClient,
};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Storage key of the durable reconnect flag.
pub const RECONNECT_SESSION_KEY: &str = "wallet-bridge-reconnect-session";

/// Key-value storage that outlives the process, like a browser's local storage.
pub trait DurableStorage: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> io::Result<()>;

    fn remove(&self, key: &str) -> io::Result<()>;
}

/// In-memory [`DurableStorage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// [`DurableStorage`] backed by a JSON object on disk.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored entries. Unparseable contents count as empty so the next write
    /// replaces them.
    fn read(&self) -> io::Result<BTreeMap<String, String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err),
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!(path = ?self.path, %err, "discarding unreadable durable storage");
            BTreeMap::new()
        }))
    }

    /// Replaces the file through a temporary sibling so readers never see a partial write.
    fn write(&self, entries: &BTreeMap<String, String>) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, entries).map_err(io::Error::other)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock();
        match self.read() {
            Ok(mut entries) => entries.remove(key),
            Err(err) => {
                warn!(path = ?self.path, %err, "failed to read durable storage");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read()?;
        entries.insert(key.to_string(), value.to_string());
        self.write(&entries)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read()?;
        if entries.remove(key).is_some() {
            self.write(&entries)?;
        }
        Ok(())
    }
}

/// Snapshot of the in-memory session state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    /// The account resolved by the last successful enable.
    pub account: Option<Key>,
    /// Chains the current connection was enabled for.
    pub active_chain_ids: Vec<String>,
    /// Whether the application should reconnect to `reconnect_connector`.
    pub reconnect: bool,
    pub reconnect_connector: Option<WalletType>,
}

/// The explicit session manager handed to every adapter.
pub struct SessionStore {
    state: RwLock<SessionState>,
    sign_client: RwLock<Option<Arc<dyn SignClient>>>,
    durable: Arc<dyn DurableStorage>,
    listeners: Arc<EventEmitter<(), SessionState>>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.state.read())
            .field("sign_client", &self.sign_client.read().is_some())
            .field("durable", &self.durable)
            .finish()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStorage::default()))
    }
}

impl SessionStore {
    pub fn new(durable: Arc<dyn DurableStorage>) -> Self {
        Self {
            state: RwLock::default(),
            sign_client: RwLock::default(),
            durable,
            listeners: Arc::default(),
        }
    }

    /// Returns a snapshot of the current state.
    pub fn get(&self) -> SessionState {
        self.state.read().clone()
    }

    /// Applies `f` to the state and notifies subscribers.
    pub fn update(&self, f: impl FnOnce(&mut SessionState)) {
        let snapshot = {
            let mut state = self.state.write();
            f(&mut state);
            state.clone()
        };
        self.listeners.emit(&(), &snapshot);
    }

    /// Registers `f` to run after every state change.
    pub fn subscribe(&self, f: impl Fn(&SessionState) + Send + Sync + 'static) -> Subscription {
        let handler: Handler<SessionState> = Arc::new(f);
        let id = self.listeners.on((), handler);
        let listeners = self.listeners.clone();
        Subscription::new(move || {
            listeners.off(&(), id);
        })
    }

    pub fn account(&self) -> Option<Key> {
        self.state.read().account.clone()
    }

    pub fn active_chain_ids(&self) -> Vec<String> {
        self.state.read().active_chain_ids.clone()
    }

    /// Records `key` as the connected account on `chain_id`.
    pub fn set_connected(&self, chain_id: &str, key: Key) {
        self.update(|state| {
            state.account = Some(key);
            if !state.active_chain_ids.iter().any(|id| id == chain_id) {
                state.active_chain_ids.push(chain_id.to_string());
            }
        });
    }

    /// Forgets the recorded account and active chains.
    pub fn clear_session(&self) {
        self.update(|state| {
            state.account = None;
            state.active_chain_ids.clear();
        });
    }

    pub fn sign_client(&self) -> Option<Arc<dyn SignClient>> {
        self.sign_client.read().clone()
    }

    pub fn set_sign_client(&self, client: Option<Arc<dyn SignClient>>) {
        *self.sign_client.write() = client;
    }

    /// Marks `connector` as the wallet to reconnect to, in memory and durably.
    pub fn set_reconnect(&self, connector: WalletType) {
        self.update(|state| {
            state.reconnect = true;
            state.reconnect_connector = Some(connector);
        });
        if let Err(err) = self.durable.set(RECONNECT_SESSION_KEY, "active") {
            warn!(%err, "failed to persist reconnect flag");
        }
    }

    /// Clears the in-memory reconnect flags and the durable one.
    pub fn clear_reconnect(&self) {
        self.update(|state| {
            state.reconnect = false;
            state.reconnect_connector = None;
        });
        if let Err(err) = self.durable.remove(RECONNECT_SESSION_KEY) {
            warn!(%err, "failed to clear reconnect flag");
        }
    }

    /// Whether a previous run asked to reconnect on load.
    pub fn should_reconnect(&self) -> bool {
        self.durable.get(RECONNECT_SESSION_KEY).is_some()
    }
}
