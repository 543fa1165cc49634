// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::PathBuf;

/// Name of the persisted settings file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// The application data directory. Not created here; callers that write
/// into it create it first.
pub fn data_dir() -> PathBuf {
    resolve(
        std::env::var("XDG_DATA_HOME").ok(),
        std::env::var("HOME").ok(),
    )
}

/// Default location of the settings file.
pub fn config_path() -> PathBuf {
    data_dir().join(CONFIG_FILE)
}

fn resolve(xdg_data_home: Option<String>, home: Option<String>) -> PathBuf {
    // XDG data dir, then ~/.local/share
    let base = match (xdg_data_home.filter(|s| !s.is_empty()), home) {
        (Some(xdg), _) => PathBuf::from(xdg),
        (None, Some(home)) => PathBuf::from(home).join(".local").join("share"),
        (None, None) => std::env::temp_dir(),
    };
    base.join("flatscan")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_xdg_data_home() {
        let dir = resolve(Some("/data".into()), Some("/home/u".into()));
        assert_eq!(dir, PathBuf::from("/data/flatscan"));
    }

    #[test]
    fn falls_back_to_local_share() {
        let dir = resolve(Some(String::new()), Some("/home/u".into()));
        assert_eq!(dir, PathBuf::from("/home/u/.local/share/flatscan"));
    }
}
