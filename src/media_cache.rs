//! Local media directory consulted before any generation call.

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::config::CacheMode;
use crate::error::TrailerResult;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm", "mkv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => IMAGE_EXTENSIONS,
            MediaKind::Video => VIDEO_EXTENSIONS,
        }
    }

    /// MIME type for a file extension of this kind, falling back to PNG / MP4.
    pub fn mime_for_extension(self, ext: &str) -> &'static str {
        match (self, ext.to_ascii_lowercase().as_str()) {
            (MediaKind::Image, "jpg" | "jpeg") => "image/jpeg",
            (MediaKind::Image, "gif") => "image/gif",
            (MediaKind::Image, "webp") => "image/webp",
            (MediaKind::Image, _) => "image/png",
            (MediaKind::Video, "mov") => "video/quicktime",
            (MediaKind::Video, "webm") => "video/webm",
            (MediaKind::Video, "avi") => "video/x-msvideo",
            (MediaKind::Video, "mkv") => "video/x-matroska",
            (MediaKind::Video, _) => "video/mp4",
        }
    }

    /// File extension to store a payload of the given MIME type under.
    pub fn extension_for_mime(self, mime: &str) -> &'static str {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match (self, essence) {
            (MediaKind::Image, "image/jpeg") => "jpg",
            (MediaKind::Image, "image/gif") => "gif",
            (MediaKind::Image, "image/webp") => "webp",
            (MediaKind::Image, _) => "png",
            (MediaKind::Video, "video/quicktime") => "mov",
            (MediaKind::Video, "video/webm") => "webm",
            (MediaKind::Video, _) => "mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one generation request: its kind plus a fingerprint of what was asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: MediaKind,
    fingerprint: String,
}

impl CacheKey {
    pub fn new<S: AsRef<str>>(kind: MediaKind, prompt: &str, references: &[S]) -> Self {
        // Every field is length-prefixed so no split of the input can collide.
        fn field(hasher: &mut Sha256, bytes: &[u8]) {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }

        let mut hasher = Sha256::new();
        field(&mut hasher, kind.as_str().as_bytes());
        field(&mut hasher, prompt.as_bytes());
        hasher.update((references.len() as u64).to_le_bytes());
        for reference in references {
            field(&mut hasher, reference.as_ref().as_bytes());
        }
        let fingerprint = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        Self { kind, fingerprint }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn stem(&self) -> String {
        format!("{}-{}", self.kind, self.fingerprint)
    }
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Splits a base64 data URL into its MIME type and decoded payload.
pub fn decode_data_url(data_url: &str) -> Option<(String, Vec<u8>)> {
    let rest = data_url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

type BuildLocks = Arc<Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>>;

pub struct MediaCache {
    dir: PathBuf,
    mode: CacheMode,
    build_locks: BuildLocks,
}

/// Exclusive right to build one key. Dropping it releases the lock and forgets
/// the key once nobody else is waiting on it.
pub struct BuildGuard {
    locks: BuildLocks,
    key: CacheKey,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        drop(self.held.take());
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Waiters clone the slot under this same map lock, so a count of one is final.
        if locks
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

impl MediaCache {
    pub fn new(dir: impl Into<PathBuf>, mode: CacheMode) -> Self {
        Self {
            dir: dir.into(),
            mode,
            build_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Serializes builds of the same key. Hold the guard across lookup, generation and store.
    pub async fn lock(&self, key: &CacheKey) -> BuildGuard {
        let slot = {
            let mut locks = self.build_locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        // Created before waiting so a cancelled wait still prunes the entry.
        let mut guard = BuildGuard {
            locks: Arc::clone(&self.build_locks),
            key: key.clone(),
            held: None,
        };
        guard.held = Some(slot.lock_owned().await);
        guard
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.build_locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns a cached payload as a data URL. Read failures degrade to a miss.
    pub async fn find_existing(&self, key: &CacheKey) -> Option<String> {
        let names = match self.matching_files(key).await {
            Ok(names) => names,
            Err(err) => {
                warn!("Media cache unreadable at {}: {err}", self.dir.display());
                return None;
            }
        };

        let name = names.into_iter().next()?;
        let path = self.dir.join(&name);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Failed to read cached {} {}: {err}", key.kind, path.display());
                return None;
            }
        };

        info!("Found existing {}: {name}", key.kind);
        let ext = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Some(encode_data_url(key.kind.mime_for_extension(ext), &bytes))
    }

    /// Writes a freshly generated payload and returns where it landed.
    pub async fn store(&self, key: &CacheKey, bytes: &[u8], extension: &str) -> TrailerResult<PathBuf> {
        self.ensure_dir().await?;
        let stem = match self.mode {
            CacheMode::Keyed => key.stem(),
            CacheMode::Shared => format!(
                "{}-{}",
                key.kind,
                chrono::Utc::now().timestamp_millis()
            ),
        };
        let path = self.dir.join(format!("{stem}.{extension}"));
        fs::write(&path, bytes).await?;
        info!("Saved {} to: {}", key.kind, path.display());
        Ok(path)
    }

    async fn ensure_dir(&self) -> std::io::Result<()> {
        match fs::create_dir_all(&self.dir).await {
            Err(err) if err.kind() != ErrorKind::AlreadyExists => Err(err),
            _ => Ok(()),
        }
    }

    async fn matching_files(&self, key: &CacheKey) -> std::io::Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.ensure_dir().await?;
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        let wanted_stem = key.stem();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = Path::new(&name);
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !key.kind.extensions().contains(&ext.to_ascii_lowercase().as_str()) {
                continue;
            }
            if self.mode == CacheMode::Keyed
                && path.file_stem().and_then(|s| s.to_str()) != Some(wanted_stem.as_str())
            {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_key(prompt: &str) -> CacheKey {
        CacheKey::new(MediaKind::Image, prompt, &["https://ref/a.png", "https://ref/b.png"])
    }

    #[tokio::test]
    async fn stored_image_round_trips_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(dir.path(), CacheMode::Keyed);
        let key = image_key("hero shot");
        let payload = vec![0x89, b'P', b'N', b'G', 0, 1, 2, 255];

        cache.store(&key, &payload, "png").await.unwrap();
        let data_url = cache.find_existing(&key).await.unwrap();

        let (mime, bytes) = decode_data_url(&data_url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, payload);
    }

    #[tokio::test]
    async fn keyed_mode_misses_on_a_different_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(dir.path(), CacheMode::Keyed);
        cache.store(&image_key("a"), b"first", "png").await.unwrap();

        assert!(cache.find_existing(&image_key("b")).await.is_none());
        assert!(cache.find_existing(&image_key("a")).await.is_some());
    }

    #[tokio::test]
    async fn shared_mode_returns_any_file_of_the_kind() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b-later.jpg"), b"second").unwrap();
        std::fs::write(dir.path().join("a-first.JPG"), b"first").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        let cache = MediaCache::new(dir.path(), CacheMode::Shared);

        let data_url = cache.find_existing(&image_key("anything")).await.unwrap();
        let (mime, bytes) = decode_data_url(&data_url).unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(bytes, b"first");

        let video = CacheKey::new(MediaKind::Video, "anything", &["x"]);
        assert!(cache.find_existing(&video).await.is_none());
    }

    #[tokio::test]
    async fn missing_directory_is_created_and_reported_empty() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("generatedMedia");
        let cache = MediaCache::new(&dir, CacheMode::Shared);

        assert!(cache.find_existing(&image_key("x")).await.is_none());
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn unreadable_directory_degrades_to_a_miss() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("not-a-dir");
        std::fs::write(&file, b"").unwrap();
        let cache = MediaCache::new(&file, CacheMode::Shared);

        assert!(cache.find_existing(&image_key("x")).await.is_none());
    }

    #[test]
    fn unknown_extensions_fall_back_per_kind() {
        assert_eq!(MediaKind::Image.mime_for_extension("tiff"), "image/png");
        assert_eq!(MediaKind::Video.mime_for_extension("MOV"), "video/quicktime");
        assert_eq!(MediaKind::Video.mime_for_extension(""), "video/mp4");
        assert_eq!(MediaKind::Image.extension_for_mime("image/jpeg; charset=binary"), "jpg");
    }

    #[test]
    fn fingerprint_depends_on_every_input() {
        let base = CacheKey::new(MediaKind::Image, "p", &["a", "b"]);
        assert_eq!(base, CacheKey::new(MediaKind::Image, "p", &["a", "b"]));
        assert_ne!(base, CacheKey::new(MediaKind::Image, "p", &["b", "a"]));
        assert_ne!(base, CacheKey::new(MediaKind::Video, "p", &["a", "b"]));
        assert_ne!(base, CacheKey::new(MediaKind::Image, "p", &["ab"]));
        assert_eq!(base.fingerprint().len(), 64);
    }

    #[test]
    fn separator_bytes_in_a_prompt_cannot_shift_fields() {
        let split_prompt = CacheKey::new(MediaKind::Image, "p\0a", &["b"]);
        let split_refs = CacheKey::new(MediaKind::Image, "p", &["a", "b"]);
        assert_ne!(split_prompt, split_refs);

        let empty_ref = CacheKey::new(MediaKind::Image, "p", &[""]);
        let no_refs = CacheKey::new::<&str>(MediaKind::Image, "p", &[]);
        assert_ne!(empty_ref, no_refs);
    }

    #[tokio::test]
    async fn released_keys_are_forgotten() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(dir.path(), CacheMode::Keyed);

        for n in 0..1000 {
            let _guard = cache.lock(&image_key(&format!("scene {n}"))).await;
        }
        assert_eq!(cache.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn contended_key_is_kept_until_the_last_holder_leaves() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(MediaCache::new(dir.path(), CacheMode::Keyed));
        let key = image_key("shared");

        let first = cache.lock(&key).await;
        let waiter = tokio::spawn({
            let cache = Arc::clone(&cache);
            let key = key.clone();
            async move {
                let _second = cache.lock(&key).await;
            }
        });
        tokio::task::yield_now().await;
        assert_eq!(cache.tracked_keys(), 1);

        drop(first);
        assert_eq!(cache.tracked_keys(), 1, "the waiter still needs the slot");
        waiter.await.unwrap();
        assert_eq!(cache.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn abandoned_wait_does_not_leak_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(dir.path(), CacheMode::Keyed);
        let key = image_key("abandoned");

        let held = cache.lock(&key).await;
        let gave_up =
            tokio::time::timeout(std::time::Duration::from_millis(5), cache.lock(&key)).await;
        assert!(gave_up.is_err());

        drop(held);
        assert_eq!(cache.tracked_keys(), 0);
    }
}
