//! Workspace persistence: the local record and the archive record.
//!
//! Each record is its own JSON file, written via temp file and rename.
//! A record that cannot be read or parsed is logged and replaced by fresh
//! state rather than failing the session.

use crate::config::MindConfig;
use crate::context::FileContext;
use crate::graph::MemoryGraph;
use crate::katharsis::KatharsisMonitor;
use crate::latent::LatentQueue;
use crate::params::ParameterState;
use crate::session::AgentSession;
use crate::tiers::SensePill;
use cognilayer_core::{NodeId, Result, SessionKey, Turn};
use cognilayer_llm::Generator;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const RECORD_VERSION: u32 = 1;
pub const ACTIVE_FILE: &str = "active.json";
pub const ARCHIVE_FILE: &str = "archive.json";
pub const CONFIG_FILE: &str = "cognilayer.toml";

/// Local record: the active window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRecord {
    pub version: u32,
    pub turns: Vec<Turn>,
    pub next_turn_id: u64,
    #[serde(default)]
    pub files: FileContext,
    /// Nodes touched by the last turn; the next turn's feedback lands here.
    #[serde(default)]
    pub recent_nodes: Vec<NodeId>,
}

/// Archive record: pills, graph and the parameter snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub version: u32,
    pub pills: Vec<SensePill>,
    pub graph: MemoryGraph,
    pub params: ParameterState,
    #[serde(default)]
    pub katharsis: KatharsisMonitor,
    #[serde(default)]
    pub latent: LatentQueue,
}

trait Versioned {
    fn version(&self) -> u32;
}

impl Versioned for ActiveRecord {
    fn version(&self) -> u32 {
        self.version
    }
}

impl Versioned for ArchiveRecord {
    fn version(&self) -> u32 {
        self.version
    }
}

/// A directory holding one agent's records and config.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn active_path(&self) -> PathBuf {
        self.root.join(ACTIVE_FILE)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root.join(ARCHIVE_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn load_config(&self) -> MindConfig {
        MindConfig::load(&self.config_path())
    }

    /// Hydrate a session from the records, or create a fresh one.
    pub fn open(&self, key: SessionKey, config: MindConfig, generator: Arc<dyn Generator>) -> AgentSession {
        let active = hydrate::<ActiveRecord>(&self.active_path());
        let archive = hydrate::<ArchiveRecord>(&self.archive_path());
        if archive.is_none() {
            info!("Starting fresh archive in {}", self.root.display());
        }
        AgentSession::from_records(key, config, generator, active, archive)
    }

    /// Write both records.
    pub fn save(&self, session: &AgentSession) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let (active, archive) = session.to_records();
        write_json_atomic(&self.active_path(), &active)?;
        write_json_atomic(&self.archive_path(), &archive)?;
        Ok(())
    }
}

fn hydrate<T: DeserializeOwned + Versioned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(json) => match serde_json::from_str::<T>(&json) {
            Ok(record) if record.version() == RECORD_VERSION => {
                info!("Hydrated {}", path.display());
                Some(record)
            }
            Ok(record) => {
                warn!(
                    "{} has record version {}, expected {}; creating fresh",
                    path.display(),
                    record.version(),
                    RECORD_VERSION
                );
                None
            }
            Err(e) => {
                warn!("Failed to parse {}: {}, creating fresh", path.display(), e);
                None
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, creating fresh", path.display(), e);
            None
        }
    }
}

/// Serialize `value` next to `path` and rename it into place.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
