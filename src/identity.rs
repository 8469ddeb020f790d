//! Device identity and SystemUpdateID tracking.

use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

const REHASH_INTERVAL_SECS: u64 = 30;
const UUID_PREFIX: &str = "65da942e-1984-3309";

struct IdentityState {
    content_hash: String,
    last_check: Instant,
}

/// Tracks the device UUID and `SystemUpdateID` counter described in §3/§4.3.
/// `system_update_id` is a bare atomic (readable without the mutex);
/// `uuid`/`content_hash`/`last_check` are serialized by one mutex.
pub struct Identity {
    media_root: PathBuf,
    path_hash: String,
    system_update_id: AtomicU32,
    state: Mutex<IdentityState>,
}

impl Identity {
    pub fn new(media_root: &Path) -> Self {
        let path_hash = hash_path(media_root);
        let content_hash = hash_directory(media_root);
        let initial_update_id = (unix_time() % 1_000_000) as u32;

        Self {
            media_root: media_root.to_path_buf(),
            path_hash,
            system_update_id: AtomicU32::new(initial_update_id),
            state: Mutex::new(IdentityState {
                content_hash,
                last_check: Instant::now(),
            }),
        }
    }

    pub fn system_update_id(&self) -> u32 {
        self.system_update_id.load(Ordering::SeqCst)
    }

    pub async fn uuid(&self) -> String {
        let state = self.state.lock().await;
        format_uuid(&self.path_hash, &state.content_hash)
    }

    /// Called from the Browse engine when ObjectID is "0" or "1": bumps
    /// SystemUpdateID, and if the re-hash window has elapsed, recomputes
    /// the content hash (and therefore the UUID, if it changed).
    pub async fn on_root_access(&self) -> u32 {
        let new_id = self.system_update_id.fetch_add(1, Ordering::SeqCst) + 1;

        let mut state = self.state.lock().await;
        if state.last_check.elapsed().as_secs() >= REHASH_INTERVAL_SECS {
            state.content_hash = hash_directory(&self.media_root);
            state.last_check = Instant::now();
        }

        new_id
    }
}

fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn format_uuid(path_hash: &str, content_hash: &str) -> String {
    format!(
        "{UUID_PREFIX}-{}-{}{}",
        &content_hash[0..4],
        &content_hash[4..12],
        &path_hash[0..4]
    )
}

fn hash_path(root: &Path) -> String {
    let abs = root
        .canonicalize()
        .unwrap_or_else(|_| root.to_path_buf());
    let digest = Md5::digest(abs.to_string_lossy().as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// MD5 of the newline-joined `rel:size:mtime_seconds` records over every
/// file under `root`, subdirectories and files each ordered lexically.
pub fn hash_directory(root: &Path) -> String {
    let mut records = Vec::new();
    if walk(root, root, &mut records).is_err() || records.is_empty() {
        let digest = Md5::digest(unix_time().to_string().as_bytes());
        return hex::encode(digest)[..12].to_string();
    }
    let digest = Md5::digest(records.join("\n").as_bytes());
    hex::encode(digest)[..12].to_string()
}

fn walk(root: &Path, dir: &Path, records: &mut Vec<String>) -> std::io::Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.is_dir() {
            subdirs.push(path);
        } else if metadata.is_file() {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            records.push(format!(
                "{}:{}:{}",
                rel.to_string_lossy(),
                metadata.len(),
                mtime
            ));
        }
    }
    subdirs.sort();
    for subdir in subdirs {
        let _ = walk(root, &subdir, records);
    }
    Ok(())
}
