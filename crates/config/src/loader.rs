use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::TryonConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["tryon.toml", "tryon.yaml", "tryon.yml", "tryon.json"];

static CONFIG_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);
static DATA_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Use `dir` instead of `~/.config/tryon/` for the rest of the process.
pub fn set_config_dir(dir: PathBuf) {
    if let Ok(mut slot) = CONFIG_DIR_OVERRIDE.write() {
        *slot = Some(dir);
    }
}

/// Use `dir` instead of the platform data directory for the rest of the process.
pub fn set_data_dir(dir: PathBuf) {
    if let Ok(mut slot) = DATA_DIR_OVERRIDE.write() {
        *slot = Some(dir);
    }
}

fn read_override(slot: &RwLock<Option<PathBuf>>) -> Option<PathBuf> {
    slot.read().ok().and_then(|guard| guard.clone())
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<TryonConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply
/// `TRYON_*` environment overrides.
///
/// Search order:
/// 1. `./tryon.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/tryon/tryon.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `TryonConfig::default()` if no config file is found or it
/// fails to parse.
pub fn discover_and_load() -> TryonConfig {
    let mut config = TryonConfig::default();
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => config = cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

/// Apply `TRYON_SERVICE_URL`, `TRYON_CONNECT_TIMEOUT_SECS` and
/// `TRYON_CACHE_TTL_HOURS` on top of a loaded config.
pub fn apply_env_overrides(config: &mut TryonConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("TRYON_SERVICE_URL").filter(|v| !v.trim().is_empty()) {
        config.service.url = url.trim().to_string();
    }
    if let Some(raw) = lookup("TRYON_CONNECT_TIMEOUT_SECS") {
        match raw.trim().parse() {
            Ok(secs) => config.service.connect_timeout_secs = secs,
            Err(_) => warn!(value = %raw, "ignoring invalid TRYON_CONNECT_TIMEOUT_SECS"),
        }
    }
    if let Some(raw) = lookup("TRYON_CACHE_TTL_HOURS") {
        match raw.trim().parse() {
            Ok(hours) => config.cache.ttl_hours = hours,
            Err(_) => warn!(value = %raw, "ignoring invalid TRYON_CACHE_TTL_HOURS"),
        }
    }
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/tryon/`).
pub fn config_dir() -> Option<PathBuf> {
    read_override(&CONFIG_DIR_OVERRIDE).or_else(|| {
        directories::ProjectDirs::from("", "", "tryon").map(|d| d.config_dir().to_path_buf())
    })
}

/// Returns the data directory used for the reference image cache.
pub fn data_dir() -> PathBuf {
    read_override(&DATA_DIR_OVERRIDE)
        .or_else(|| {
            directories::ProjectDirs::from("", "", "tryon").map(|d| d.data_dir().to_path_buf())
        })
        .unwrap_or_else(|| PathBuf::from(".tryon"))
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tryon.toml")
}

/// Write `contents` to the config path, creating parent directories.
///
/// Refuses to overwrite an existing file unless `force` is set. Returns the
/// path written to.
pub fn save_config(contents: &str, force: bool) -> anyhow::Result<PathBuf> {
    let path = find_or_default_config_path();
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, contents)?;
    debug!(path = %path.display(), "saved config");
    Ok(path)
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<TryonConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, crate::schema::CacheBackend};

    #[test]
    fn loads_each_supported_format() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("tryon.toml");
        std::fs::write(&toml_path, "[service]\nurl = \"ws://a:1\"\n").unwrap();
        assert_eq!(load_config(&toml_path).unwrap().service.url, "ws://a:1");

        let yaml_path = dir.path().join("tryon.yaml");
        std::fs::write(&yaml_path, "cache:\n  backend: memory\n").unwrap();
        assert_eq!(
            load_config(&yaml_path).unwrap().cache.backend,
            CacheBackend::Memory
        );

        let json_path = dir.path().join("tryon.json");
        std::fs::write(&json_path, r#"{"cache":{"ttl_hours":2}}"#).unwrap();
        assert_eq!(load_config(&json_path).unwrap().cache.ttl_hours, 2);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tryon.ini");
        std::fs::write(&path, "").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn env_overrides_apply_and_skip_garbage() {
        let mut config = TryonConfig::default();
        apply_env_overrides(&mut config, |name| match name {
            "TRYON_SERVICE_URL" => Some(" ws://remote:9000 ".into()),
            "TRYON_CONNECT_TIMEOUT_SECS" => Some("soon".into()),
            "TRYON_CACHE_TTL_HOURS" => Some("1".into()),
            _ => None,
        });
        assert_eq!(config.service.url, "ws://remote:9000");
        assert_eq!(config.service.connect_timeout_secs, 10);
        assert_eq!(config.cache.ttl_hours, 1);
    }

    #[test]
    fn huge_env_ttl_does_not_overflow() {
        let mut config = TryonConfig::default();
        apply_env_overrides(&mut config, |name| {
            (name == "TRYON_CACHE_TTL_HOURS").then(|| "6000000000000000".to_string())
        });
        assert_eq!(config.cache.ttl_hours, 6_000_000_000_000_000);
        assert_eq!(config.cache.ttl(), std::time::Duration::from_secs(u64::MAX));
    }
}
