use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use odin_error::{ErrorCode, OdinError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

fn now_ns() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos()
}

/// A single recorded ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonically increasing position in the ledger, starting at 0.
    pub index: u64,
    /// The caller-supplied record, typically `{cid, meta}` per spec.md §4.10.
    pub record: Value,
    /// Wall-clock append time in nanoseconds since the Unix epoch.
    pub appended_ns: u128,
}

/// Filters accepted by [`Ledger::query`]. All present filters are ANDed.
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    /// Matches entries whose `record.map` field equals this value, when set.
    pub map: Option<String>,
    /// Matches entries whose `record.cid` starts with this prefix, when set.
    pub cid_prefix: Option<String>,
    /// Matches entries appended at or after this many nanoseconds since epoch.
    pub since_ns: Option<u128>,
    /// Caps the number of entries returned, newest first.
    pub limit: Option<usize>,
}

impl LedgerQuery {
    fn matches(&self, entry: &LedgerEntry) -> bool {
        if let Some(map) = &self.map {
            if entry.record.get("map").and_then(Value::as_str) != Some(map.as_str()) {
                return false;
            }
        }
        if let Some(prefix) = &self.cid_prefix {
            let cid = entry.record.get("cid").and_then(Value::as_str).unwrap_or("");
            if !cid.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(since) = self.since_ns {
            if entry.appended_ns < since {
                return false;
            }
        }
        true
    }
}

/// An append-only ledger of gateway activity records.
///
/// Per spec.md §4.10, appends are atomic with respect to readers: a
/// concurrent reader never observes a partially written entry.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Appends `record`, returning the entry it was assigned.
    async fn append(&self, record: Value) -> Result<LedgerEntry, OdinError>;

    /// Lists the most recent `limit` entries, newest first.
    async fn list(&self, limit: usize) -> Result<Vec<LedgerEntry>, OdinError>;

    /// Lists entries matching `query`, newest first.
    async fn query(&self, query: LedgerQuery) -> Result<Vec<LedgerEntry>, OdinError>;
}

/// In-memory ledger. Entries do not survive process restart.
#[derive(Default)]
pub struct MemoryLedger {
    entries: RwLock<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    /// Creates an empty in-memory ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Ledger for MemoryLedger {
    async fn append(&self, record: Value) -> Result<LedgerEntry, OdinError> {
        let mut entries = self.entries.write().await;
        let entry = LedgerEntry {
            index: entries.len() as u64,
            record,
            appended_ns: now_ns(),
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn list(&self, limit: usize) -> Result<Vec<LedgerEntry>, OdinError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    async fn query(&self, query: LedgerQuery) -> Result<Vec<LedgerEntry>, OdinError> {
        let entries = self.entries.read().await;
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(entries
            .iter()
            .rev()
            .filter(|e| query.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// File-backed ledger, appending newline-delimited JSON to `ledger.jsonl`.
///
/// Mirrors the original gateway's file ledger: the file carries a header
/// line followed by one JSON record per append, with the entry's index
/// derived from line position. Appends are serialized through an
/// in-process mutex so concurrent writers never interleave partial
/// lines; combined with `O_APPEND` semantics this keeps readers of the
/// file from ever observing a torn write.
pub struct FileLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

const LEDGER_HEADER: &str = "# odin ledger v1\n";

impl FileLedger {
    /// Opens (creating if absent) a file-backed ledger at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, OdinError> {
        let path = path.into();
        if tokio::fs::metadata(&path).await.is_err() {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    OdinError::new(ErrorCode::LedgerFailed, "failed to create ledger directory").with_source(e)
                })?;
            }
            tokio::fs::write(&path, LEDGER_HEADER).await.map_err(|e| {
                OdinError::new(ErrorCode::LedgerFailed, "failed to initialize ledger file").with_source(e)
            })?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    async fn read_all(&self) -> Result<Vec<LedgerEntry>, OdinError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| OdinError::new(ErrorCode::LedgerFailed, "failed to read ledger file").with_source(e))?;
        let mut entries = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line_no == 0 || line.is_empty() {
                continue;
            }
            let record: Value = serde_json::from_str(line).map_err(|e| {
                OdinError::new(ErrorCode::LedgerFailed, "corrupt ledger entry")
                    .with_context("line", line_no)
                    .with_source(e)
            })?;
            let appended_ns = record
                .get("_appended_ns")
                .and_then(Value::as_u64)
                .map(u128::from)
                .unwrap_or(0);
            let record = record
                .as_object()
                .map(|o| {
                    let mut o = o.clone();
                    o.remove("_appended_ns");
                    Value::Object(o)
                })
                .unwrap_or(record);
            entries.push(LedgerEntry {
                index: (line_no - 1) as u64,
                record,
                appended_ns,
            });
        }
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl Ledger for FileLedger {
    async fn append(&self, record: Value) -> Result<LedgerEntry, OdinError> {
        let _guard = self.write_lock.lock().await;
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| OdinError::new(ErrorCode::LedgerFailed, "failed to read ledger file").with_source(e))?;
        let index = contents.lines().filter(|l| !l.is_empty()).count().saturating_sub(1) as u64;
        let appended_ns = now_ns();
        let mut stamped = record.clone();
        if let Some(obj) = stamped.as_object_mut() {
            obj.insert("_appended_ns".to_string(), Value::from(appended_ns as u64));
        }
        let mut line = serde_json::to_string(&stamped)
            .map_err(|e| OdinError::new(ErrorCode::LedgerFailed, "failed to encode ledger entry").with_source(e))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| OdinError::new(ErrorCode::LedgerFailed, "failed to open ledger file").with_source(e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| OdinError::new(ErrorCode::LedgerFailed, "failed to append ledger entry").with_source(e))?;
        file.flush()
            .await
            .map_err(|e| OdinError::new(ErrorCode::LedgerFailed, "failed to flush ledger entry").with_source(e))?;

        Ok(LedgerEntry {
            index,
            record,
            appended_ns,
        })
    }

    async fn list(&self, limit: usize) -> Result<Vec<LedgerEntry>, OdinError> {
        let mut entries = self.read_all().await?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }

    async fn query(&self, query: LedgerQuery) -> Result<Vec<LedgerEntry>, OdinError> {
        let mut entries = self.read_all().await?;
        entries.reverse();
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(entries.into_iter().filter(|e| query.matches(e)).take(limit).collect())
    }
}
