//! Runtime configuration: an optional TOML file layered with `FIRE_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct FireConfig {
  /// SQLite database file.
  pub store_path: PathBuf,
  pub host:       String,
  pub port:       u16,
  /// Where extracted spreadsheets are written.
  pub output_dir: PathBuf,
}

impl FireConfig {
  /// Read `path` (if it exists), then the environment, over the defaults.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = ::config::Config::builder()
      .set_default("store_path", "fire.db")?
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("output_dir", ".")?
      .add_source(::config::File::from(path).required(false))
      .add_source(::config::Environment::with_prefix("FIRE"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: FireConfig = settings
      .try_deserialize()
      .context("failed to deserialise FireConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.output_dir = expand_tilde(&cfg.output_dir);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn file_values_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "store_path = \"/data/fire.db\"\nport = 9000").unwrap();

    let cfg = FireConfig::load(file.path()).unwrap();
    assert_eq!(cfg.store_path, PathBuf::from("/data/fire.db"));
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.output_dir, PathBuf::from("."));
  }

  #[test]
  fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = FireConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.store_path, PathBuf::from("fire.db"));
  }

  #[test]
  fn tilde_is_expanded() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/fire/fire.db")),
      PathBuf::from(home).join("fire/fire.db")
    );
    assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
  }
}
