/// Configuration system for dpdash.
///
/// Layered hierarchy, later layers winning at the key level:
///
/// 1. **Built-in defaults**: [`schema::DashConfig::default()`]
/// 2. **User global config**: `~/.dpdash/config.toml`
/// 3. **Project local config**: `.dpdash.toml` in the current directory
/// 4. **Environment variables**: `DPDASH_*` overrides
/// 5. **Command line**: `--url`, applied by the caller
///
/// Malformed files are skipped with a warning so a typo never keeps the
/// dashboard from starting.
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::DashConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// A resolved config plus the files that were skipped on the way.
///
/// Config is read before tracing is installed; the caller logs
/// `skipped` afterwards.
#[derive(Debug)]
pub struct Loaded {
    pub config: DashConfig,
    pub skipped: Vec<SkippedLayer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLayer {
    pub path: PathBuf,
    pub reason: String,
}

impl Loaded {
    /// Emit one warning per skipped file.
    pub fn log_skipped(&self) {
        for layer in &self.skipped {
            tracing::warn!(path = %layer.path.display(), error = %layer.reason, "ignoring config file");
        }
    }
}

/// Load the fully resolved configuration.
pub fn load() -> Loaded {
    let layers = [global_config_path(), project_config_path()];
    let mut loaded = load_layers(layers.iter().flatten().map(PathBuf::as_path));
    apply_env_overrides(&mut loaded.config);
    loaded
}

/// Merge the given TOML files over the defaults, in order. A layer that
/// fails to parse or to fit the schema is skipped, keeping the layers
/// before it.
pub fn load_layers<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Loaded {
    let mut loaded = Loaded {
        config: DashConfig::default(),
        skipped: Vec::new(),
    };
    let Ok(mut merged) = toml::Value::try_from(&loaded.config) else {
        return loaded;
    };

    for path in paths {
        let Ok(content) = fs::read_to_string(path) else {
            continue;
        };
        let resolved = toml::from_str::<toml::Value>(&content).and_then(|layer| {
            let mut candidate = merged.clone();
            merge_values(&mut candidate, layer);
            let config = candidate.clone().try_into::<DashConfig>()?;
            Ok((candidate, config))
        });
        match resolved {
            Ok((candidate, config)) => {
                merged = candidate;
                loaded.config = config;
            }
            Err(e) => loaded.skipped.push(SkippedLayer {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    loaded
}

/// Recursively overlay `overlay` onto `base`: tables merge key by key,
/// any other value replaces.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// `~/.dpdash`, home of the global config and the log file.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".dpdash"))
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".dpdash.toml"))
}

/// Path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply `DPDASH_*` overrides.
///
/// - `DPDASH_URL`: backend base URL
/// - `DPDASH_TIMEOUT_MS`: request timeout
/// - `DPDASH_POLL_SECS`: stats poll interval
/// - `DPDASH_LOG_LINES`: log page buffer size
/// - `DPDASH_LOG_LEVEL`: tracing level
fn apply_env_overrides(config: &mut DashConfig) {
    if let Ok(val) = std::env::var("DPDASH_URL")
        && !val.is_empty()
    {
        config.backend.url = val;
    }
    if let Ok(val) = std::env::var("DPDASH_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.backend.request_timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("DPDASH_POLL_SECS")
        && let Ok(secs) = val.parse::<u64>()
        && secs > 0
    {
        config.dashboard.poll_interval_secs = secs;
    }
    if let Ok(val) = std::env::var("DPDASH_LOG_LINES")
        && let Ok(lines) = val.parse::<usize>()
        && lines > 0
    {
        config.logs.buffer_lines = lines;
    }
    if let Ok(val) = std::env::var("DPDASH_LOG_LEVEL")
        && !val.is_empty()
    {
        config.logging.level = val.to_ascii_lowercase();
    }
}

// ---------------------------------------------------------------------------
// Config init / show
// ---------------------------------------------------------------------------

/// Write the annotated default config to `~/.dpdash/config.toml`.
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;
    write_default_config(&path, force)?;
    Ok(path)
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(path, DashConfig::default_toml()).context("failed to write config file")?;
    Ok(())
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config(config: &DashConfig) -> Result<String> {
    toml::to_string_pretty(config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_layers_yields_defaults() {
        let config = load_layers(std::iter::empty()).config;
        assert_eq!(config, DashConfig::default());
    }

    #[test]
    fn later_layers_override_keys_not_sections() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("project.toml");
        fs::write(
            &global,
            "[backend]\nurl = \"http://10.0.0.1:8080\"\nrequest_timeout_ms = 2000\n",
        )
        .unwrap();
        fs::write(&project, "[backend]\nurl = \"http://10.0.0.9:8080\"\n").unwrap();

        let config = load_layers([global.as_path(), project.as_path()]).config;
        assert_eq!(config.backend.url, "http://10.0.0.9:8080");
        assert_eq!(config.backend.request_timeout_ms, 2000);
    }

    #[test]
    fn malformed_layer_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.toml");
        let bad = dir.path().join("bad.toml");
        fs::write(&good, "[logs]\nbuffer_lines = 50\n").unwrap();
        fs::write(&bad, "[logs\nbuffer_lines = ").unwrap();

        let loaded = load_layers([good.as_path(), bad.as_path()]);
        assert_eq!(loaded.config.logs.buffer_lines, 50);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.skipped[0].path, bad);
    }

    #[test]
    fn type_mismatch_skips_only_that_layer() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("project.toml");
        fs::write(&global, "[backend]\nurl = \"http://10.0.0.1:9\"\n").unwrap();
        fs::write(
            &project,
            "[backend]\nurl = \"http://10.0.0.2:9\"\n[logs]\nbuffer_lines = \"many\"\n",
        )
        .unwrap();

        let loaded = load_layers([global.as_path(), project.as_path()]);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.skipped[0].path, project);
        let config = loaded.config;
        assert_eq!(config.backend.url, "http://10.0.0.1:9");
        assert_eq!(config.logs.buffer_lines, DashConfig::default().logs.buffer_lines);
    }

    #[test]
    fn missing_layer_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let loaded = load_layers([missing.as_path()]);
        assert_eq!(loaded.config, DashConfig::default());
        assert!(loaded.skipped.is_empty());
    }

    #[test]
    fn write_default_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        write_default_config(&path, false).unwrap();
        assert!(write_default_config(&path, false).is_err());
        write_default_config(&path, true).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        let _: DashConfig = toml::from_str(&written).unwrap();
    }

    #[test]
    fn show_effective_config_round_trips() {
        let text = show_effective_config(&DashConfig::default()).unwrap();
        let parsed: DashConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, DashConfig::default());
    }
}
