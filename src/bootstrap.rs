//! Bootstrap helpers for tradegate.
//!
//! Env vars can be kept in `~/.tradegate/.env` so store selection
//! (`DATABASE_BACKEND`, `LIBSQL_*`) and trade limits are available before
//! anything else starts.
//!
//! File: `~/.tradegate/.env` (standard dotenvy format)

use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "tradegate=info";

/// Path to the tradegate-specific `.env` file: `~/.tradegate/.env`.
pub fn tradegate_env_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tradegate")
        .join(".env")
}

/// Load `./.env`, then `~/.tradegate/.env`.
///
/// dotenvy never overwrites existing env vars, so the effective priority is:
///
///   explicit env vars > `./.env` > `~/.tradegate/.env`
pub fn load_tradegate_env() {
    let _ = dotenvy::dotenv();
    load_env_file(&tradegate_env_path());
}

/// Load one dotenv file if it exists. Returns whether it was read.
pub fn load_env_file(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match dotenvy::from_path(path) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("Warning: failed to load {}: {}", path.display(), e);
            false
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over [`DEFAULT_LOG_FILTER`]; `json` switches to one JSON
/// object per line.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = installed {
        eprintln!("Warning: tracing subscriber already installed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_tradegate_env_path() {
        let path = tradegate_env_path();
        assert!(path.ends_with(".tradegate/.env"));
    }

    #[test]
    fn test_load_env_file_missing() {
        let dir = tempdir().unwrap();
        assert!(!load_env_file(&dir.path().join(".env")));
    }

    #[test]
    fn test_env_file_values_are_quoted_safely() {
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        std::fs::write(
            &env_path,
            "LIBSQL_PATH=\"/tmp/trade#gate.db\"\nDATABASE_BACKEND=memory\n",
        )
        .unwrap();

        let parsed: Vec<(String, String)> = dotenvy::from_path_iter(&env_path)
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert_eq!(
            parsed,
            vec![
                ("LIBSQL_PATH".to_string(), "/tmp/trade#gate.db".to_string()),
                ("DATABASE_BACKEND".to_string(), "memory".to_string()),
            ]
        );
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false);
        init_tracing(true);
    }
}
