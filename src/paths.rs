use std::path::PathBuf;
use std::sync::OnceLock;

static FUNDROAD_HOME: OnceLock<PathBuf> = OnceLock::new();

/// Returns the Fund Road home directory (`~/.fundroad/`).
/// Supports `$FUNDROAD_HOME` env override. Cached via `OnceLock`.
pub fn fundroad_home() -> &'static PathBuf {
    FUNDROAD_HOME.get_or_init(|| {
        if let Ok(val) = std::env::var("FUNDROAD_HOME") {
            let p = PathBuf::from(val);
            if !p.as_os_str().is_empty() {
                return p;
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fundroad")
    })
}

/// `~/.fundroad/logs/`
pub fn logs_dir() -> PathBuf {
    fundroad_home().join("logs")
}

/// `~/.fundroad/cache/`
pub fn cache_dir() -> PathBuf {
    fundroad_home().join("cache")
}
