// ABOUTME: Version info, I/O sandbox configuration, and .env layering for the Flowby runtime

use std::path::{Path, PathBuf};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// I/O Sandboxing Configuration
// ============================================================================

/// Filesystem sandbox configuration
#[derive(Debug, Clone)]
pub struct FsConfig {
    pub allowed_paths: Vec<PathBuf>,
    pub max_file_size: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            allowed_paths: vec![
                PathBuf::from("./data"),
                PathBuf::from("./scripts"),
            ],
            // Default max file size: 10MB
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

/// Network sandbox configuration
#[derive(Debug, Clone, Default)]
pub struct NetConfig {
    /// Whether network I/O is enabled
    pub enabled: bool,
    /// Allowed network addresses (host:port format)
    /// Empty = no restrictions (if enabled=true)
    pub allowed_addresses: Vec<String>,
}

/// Combined I/O sandbox configuration
#[derive(Debug, Clone, Default)]
pub struct IoConfig {
    pub filesystem: FsConfig,
    pub network: NetConfig,
}

// ============================================================================
// .env layering
// ============================================================================

/// Resolves the directory `.env*` files are loaded from: `DOTENV_DIR` if set,
/// else the directory containing the script being run, else the current
/// working directory.
fn determine_env_directory(script_path: Option<&Path>) -> PathBuf {
    if let Ok(dir) = std::env::var("DOTENV_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(script) = script_path {
        if let Some(parent) = script.parent() {
            if !parent.as_os_str().is_empty() {
                return parent.to_path_buf();
            }
        }
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Loads `.env` (no override), then `.env.local` (override), then
/// `.env.{ENV or NODE_ENV or "development"}` (override), each layered on
/// top of whatever process environment already exists. Missing files are
/// silently skipped; a present-but-malformed file is logged and skipped.
pub fn load_environment(script_path: Option<&Path>) {
    let dir = determine_env_directory(script_path);

    // Snapshot the process environment as it existed before any file is
    // loaded, so the override loads below can restore it afterward —
    // process env always wins, even against `from_path_override`.
    let process_env: Vec<(String, String)> = std::env::vars().collect();
    let restore_process_env = || {
        for (key, value) in &process_env {
            std::env::set_var(key, value);
        }
    };

    let base = dir.join(".env");
    if base.exists() {
        if let Err(e) = dotenvy::from_path(&base) {
            tracing::warn!(path = %base.display(), error = %e, "failed to load .env");
        }
    }

    let local = dir.join(".env.local");
    if local.exists() {
        if let Err(e) = dotenvy::from_path_override(&local) {
            tracing::warn!(path = %local.display(), error = %e, "failed to load .env.local");
        }
        restore_process_env();
    }

    let env_name = std::env::var("ENV")
        .or_else(|_| std::env::var("NODE_ENV"))
        .unwrap_or_else(|_| "development".to_string());
    let named = dir.join(format!(".env.{}", env_name));
    if named.exists() {
        if let Err(e) = dotenvy::from_path_override(&named) {
            tracing::warn!(path = %named.display(), error = %e, "failed to load {}", named.display());
        }
        restore_process_env();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn load_environment_never_overwrites_a_preset_process_var() {
        let dir = std::env::temp_dir().join(format!("flowby-config-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(".env.local"), "FLOWBY_CONFIG_TEST_VAR=from_dotenv\n").unwrap();

        std::env::set_var("FLOWBY_CONFIG_TEST_VAR", "from_process");
        load_environment(Some(&dir.join("script.flow")));
        assert_eq!(std::env::var("FLOWBY_CONFIG_TEST_VAR").unwrap(), "from_process");

        std::env::remove_var("FLOWBY_CONFIG_TEST_VAR");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn determine_env_directory_prefers_dotenv_dir_var() {
        std::env::set_var("DOTENV_DIR", "/tmp/flowby-dotenv-test");
        let dir = determine_env_directory(Some(Path::new("/other/script.flow")));
        assert_eq!(dir, PathBuf::from("/tmp/flowby-dotenv-test"));
        std::env::remove_var("DOTENV_DIR");
    }

    #[test]
    fn determine_env_directory_falls_back_to_script_dir() {
        let dir = determine_env_directory(Some(Path::new("/scripts/hello.flow")));
        assert_eq!(dir, PathBuf::from("/scripts"));
    }
}
