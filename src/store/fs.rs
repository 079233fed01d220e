//! Filesystem-backed session store.
//!
//! Each key is stored as `{dir}/{key}.json`. Writes are atomic
//! (temp file, fsync, rename) so a crash never leaves a torn blob.
//!
//! # Examples
//!
//! ```no_run
//! use ink_echo::store::FsSessionStore;
//!
//! let store = FsSessionStore::new("/tmp/ink-echo-sessions");
//! assert!(store.is_ok());
//! ```

use std::path::{Path, PathBuf};

use super::{SessionStore, decode, encode};
use crate::conversation::ConversationState;
use crate::error::{EchoError, Result};

/// Filesystem-backed session store.
#[derive(Debug, Clone)]
pub struct FsSessionStore {
    dir: PathBuf,
}

impl FsSessionStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`EchoError::Storage`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            EchoError::Storage(format!(
                "failed to create session directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the session files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Keep keys usable as file names.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl SessionStore for FsSessionStore {
    fn save(&self, key: &str, state: &ConversationState) -> Result<()> {
        let json = encode(state)?;
        let path = self.path_for(key);
        let tmp_path = self.dir.join(format!(".{}.tmp", sanitize_key(key)));

        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| {
            EchoError::Storage(format!(
                "failed to write temp file {}: {e}",
                tmp_path.display()
            ))
        })?;

        if let Ok(file) = std::fs::File::open(&tmp_path) {
            let _ = file.sync_all();
        }

        std::fs::rename(&tmp_path, &path).map_err(|e| {
            EchoError::Storage(format!(
                "failed to rename temp file to {}: {e}",
                path.display()
            ))
        })
    }

    fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.path_for(key);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(EchoError::Storage(format!(
                    "failed to read session file {}: {e}",
                    path.display()
                )));
            }
        };
        decode(key, &raw).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Message;

    fn temp_store() -> (tempfile::TempDir, FsSessionStore) {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => unreachable!("tempdir failed: {e}"),
        };
        let store = match FsSessionStore::new(dir.path().join("sessions")) {
            Ok(s) => s,
            Err(e) => unreachable!("store creation failed: {e}"),
        };
        (dir, store)
    }

    #[test]
    fn new_creates_directory() {
        let (_dir, store) = temp_store();
        assert!(store.dir().is_dir());
    }

    #[test]
    fn save_load_survives_new_instance() {
        let (_dir, store) = temp_store();
        let mut state = ConversationState::new("s1");
        state.turns = 3;
        state.history.push(Message::assistant("hello"));
        assert!(store.save("ink-echo-session", &state).is_ok());

        let reopened = match FsSessionStore::new(store.dir()) {
            Ok(s) => s,
            Err(e) => unreachable!("reopen failed: {e}"),
        };
        let blob = match reopened.load("ink-echo-session") {
            Ok(Some(v)) => v,
            other => unreachable!("expected blob, got {other:?}"),
        };
        assert_eq!(blob["turns"], 3);
        assert_eq!(blob["history"][0]["content"], "hello");
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let (_dir, store) = temp_store();
        assert!(store.save("k", &ConversationState::new("s")).is_ok());
        let names: Vec<String> = match std::fs::read_dir(store.dir()) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(e) => unreachable!("read_dir failed: {e}"),
        };
        assert_eq!(names, vec!["k.json".to_owned()]);
    }

    #[test]
    fn missing_file_loads_none() {
        let (_dir, store) = temp_store();
        assert!(matches!(store.load("absent"), Ok(None)));
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let (_dir, store) = temp_store();
        assert!(std::fs::write(store.dir().join("k.json"), "{{{").is_ok());
        assert!(matches!(store.load("k"), Err(EchoError::Storage(_))));
    }

    #[test]
    fn keys_are_sanitized_into_file_names() {
        assert_eq!(sanitize_key("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_key("ink-echo-session"), "ink-echo-session");
    }
}
