//! File-backed token store.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use tubekit_core::error::StorageError;
use tubekit_core::{Error, Result, TokenPair, TokenStore};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// On-disk layout: one JSON object keyed by the fixed token names.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTokens {
    access_token: String,
    refresh_token: String,
}

fn map_io(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |err| {
        StorageError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
        .into()
    }
}

/// Token store persisted to a JSON file so a session survives restarts.
///
/// Writers take an exclusive lock on a sibling `.lock` file, write a temp
/// file and rename it over the target, so a concurrent reader sees either
/// the old pair or the new one. Reads are served from an in-memory copy
/// that is replaced only after the file write succeeded.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    cache: RwLock<Option<TokenPair>>,
}

impl FileTokenStore {
    /// Open the store at `path`, loading any tokens already saved there.
    ///
    /// A missing or unreadable file is treated as an empty store.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let tokens = read_tokens(&path);
        debug!(present = tokens.is_some(), "Opened token file");

        Self {
            path,
            cache: RwLock::new(tokens),
        }
    }

    /// Returns the path of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file, picking up writes made by another process.
    pub fn reload(&self) -> Option<TokenPair> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        *cache = read_tokens(&self.path);
        cache.clone()
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn acquire_lock(&self) -> Result<File> {
        let lock_path = self.lock_path();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(map_io(parent))?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(map_io(&lock_path))?;

        lock_file.lock_exclusive().map_err(map_io(&lock_path))?;
        Ok(lock_file)
    }

    fn write_tokens(&self, pair: &TokenPair) -> Result<()> {
        let stored = StoredTokens {
            access_token: pair.access.as_str().to_string(),
            refresh_token: pair.refresh.as_str().to_string(),
        };
        let json = serde_json::to_string_pretty(&stored).map_err(|e| StorageError::Encode {
            message: e.to_string(),
        })?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = File::create(&temp_path).map_err(map_io(&temp_path))?;

        // Restrict permissions before any secret lands in the file
        #[cfg(unix)]
        {
            let mut perms = file.metadata().map_err(map_io(&temp_path))?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&temp_path, perms).map_err(map_io(&temp_path))?;
        }

        file.write_all(json.as_bytes()).map_err(map_io(&temp_path))?;
        file.sync_data().map_err(map_io(&temp_path))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(map_io(&self.path))?;
        Ok(())
    }
}

fn read_tokens(path: &Path) -> Option<TokenPair> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(err) if err.kind() == ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "Failed to read token file");
            return None;
        }
    };

    match serde_json::from_str::<StoredTokens>(&json) {
        Ok(stored) => Some(TokenPair::new(stored.access_token, stored.refresh_token)),
        Err(err) => {
            warn!(error = %err, path = %path.display(), "Ignoring malformed token file");
            None
        }
    }
}

impl TokenStore for FileTokenStore {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn save(&self, pair: TokenPair) -> Result<()> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let lock_file = self.acquire_lock()?;

        self.write_tokens(&pair)?;
        FileExt::unlock(&lock_file).map_err(map_io(&self.lock_path()))?;

        *cache = Some(pair);
        debug!("Saved tokens");
        Ok(())
    }

    fn pair(&self) -> Option<TokenPair> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn clear(&self) -> Result<()> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let lock_file = self.acquire_lock()?;

        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed token file"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(map_io(&self.path)(err)),
        }
        FileExt::unlock(&lock_file).map_err(map_io(&self.lock_path()))?;

        *cache = None;
        Ok(())
    }
}
