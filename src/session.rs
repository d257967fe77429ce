use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::{AppConfig, resolve_path};
use crate::icon_cache::IconCache;
use crate::localization::StringTables;
use crate::text_metrics::FontBook;

/// Everything one render shares: the configuration and the caches built
/// while drawing. Constructed by the caller and torn down with [`clear`].
///
/// [`clear`]: RenderSession::clear
pub struct RenderSession {
    pub config: AppConfig,
    pub icons: IconCache,
    pub fonts: FontBook,
    pub strings: StringTables,
    exists: Mutex<HashMap<PathBuf, bool>>,
}

impl RenderSession {
    pub fn new(config: AppConfig) -> Self {
        let fonts = FontBook::new(&config.base_dir);
        Self::with_fonts(config, fonts)
    }

    pub fn with_fonts(config: AppConfig, fonts: FontBook) -> Self {
        let strings = StringTables::new(&config.i18n_folder);
        Self {
            config,
            icons: IconCache::new(),
            fonts,
            strings,
            exists: Mutex::new(HashMap::new()),
        }
    }

    /// `Path::is_file`, remembered for the rest of the session.
    pub fn file_exists(&self, path: &Path) -> bool {
        if let Some(hit) = self.exists.lock().ok().and_then(|m| m.get(path).copied()) {
            return hit;
        }
        let found = path.is_file();
        if let Ok(mut map) = self.exists.lock() {
            map.insert(path.to_path_buf(), found);
        }
        found
    }

    /// Icon file for a POI: `IconOverrides[name]` first, then the index icon.
    /// Candidates that do not exist on disk are logged and skipped.
    pub fn resolve_icon_path(&self, poi_name: &str, index_icon: Option<&str>) -> Option<PathBuf> {
        let name = poi_name.trim();
        let overridden = self
            .config
            .icon_overrides
            .get(name)
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty());
        if let Some(raw) = overridden {
            let path = self.icon_path(raw);
            if self.file_exists(&path) {
                return Some(path);
            }
            tracing::warn!(poi = name, path = %path.display(), "icon override file missing");
        }
        let raw = index_icon.filter(|p| !p.trim().is_empty())?;
        let path = self.icon_path(raw);
        if self.file_exists(&path) {
            return Some(path);
        }
        tracing::warn!(poi = name, path = %path.display(), "icon file missing");
        None
    }

    fn icon_path(&self, raw: &str) -> PathBuf {
        resolve_path(&self.config.base_dir, &normalize_icon_ref(raw))
    }

    pub fn clear(&self) {
        self.icons.clear();
        self.fonts.clear();
        self.strings.clear();
        if let Ok(mut map) = self.exists.lock() {
            map.clear();
        }
    }
}

/// Index icon references are written relative to the repository root
/// (`assets/...`) while the tool runs one directory below it.
pub fn normalize_icon_ref(raw: &str) -> String {
    let raw = raw.trim();
    if Path::new(raw).is_absolute() {
        return raw.to_string();
    }
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("assets/") || lower.starts_with("assets\\") {
        format!("../{raw}")
    } else {
        raw.to_string()
    }
}
