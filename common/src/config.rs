use camino::Utf8PathBuf;
use directories::UserDirs;

const DATA_DIR_NAME: &str = "EmbeddedDb";

/// Resolves the default on-disk root for database directories.
///
/// Mirrors the fallback chain most desktop tools use: prefer the user's
/// Documents folder, fall back to the home directory, and finally fall
/// back to the current directory if neither is available. Tests never
/// rely on this — they always point `EngineConfig::base_dir` at a
/// `tempfile::TempDir`.
pub fn default_data_dir() -> Utf8PathBuf {
    if let Some(user_dirs) = UserDirs::new() {
        if let Some(docs) = user_dirs.document_dir() {
            if let Ok(docs) = Utf8PathBuf::from_path_buf(docs.join(DATA_DIR_NAME)) {
                return docs;
            }
        }
        if let Ok(home) = Utf8PathBuf::from_path_buf(user_dirs.home_dir().join(DATA_DIR_NAME)) {
            return home;
        }
    }

    Utf8PathBuf::from(DATA_DIR_NAME)
}

/// Name of the always-present database, created at engine boot.
pub const DEFAULT_DATABASE: &str = "default";
