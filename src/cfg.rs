use crate::backend::{Backend, Mode};
use serde::Deserialize;
use snafu::ResultExt;
use std::{
    fs,
    path::{Path, PathBuf},
};

const DEFAULT_CONFIG: &str = include_str!("../default_config.toml");

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    Name,
    Mtime,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub wp_dir: PathBuf,
    pub backend: Backend,
    pub mode: Mode,
    pub sort: SortKey,
    #[serde(default)]
    pub reverse: bool,
    pub thumb_width: u32,
    pub thumb_height: u32,
}

impl Config {
    fn load(path: &Path) -> Result<Self, Error> {
        fs::read(path)
            .context(ReadSnafu { path })
            .and_then(|buf| Self::from_slice(&buf))
    }

    pub fn load_or_write_default(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        match fs::metadata(path) {
            Ok(_) => (),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    let _ = fs::create_dir_all(parent);
                }
                fs::write(path, DEFAULT_CONFIG).context(ReadSnafu { path })?;
            }
            Err(source) => {
                return Err(Error::Read {
                    source,
                    path: path.to_owned(),
                })
            }
        };

        Self::load(path)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        let mut cfg: Config = toml::from_slice(slice).context(TomlSnafu)?;

        if let Ok(stripped) = cfg.wp_dir.strip_prefix("~") {
            if let Some(base) = directories::BaseDirs::new() {
                cfg.wp_dir = base.home_dir().join(stripped);
            }
        }

        Ok(cfg)
    }

    pub fn thumb_box(&self) -> (u32, u32) {
        (self.thumb_width, self.thumb_height)
    }
}

#[derive(snafu::Snafu, Debug)]
pub enum Error {
    #[snafu(display("Can't read config {}: {}", path.display(), source))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Malformed config: {}", source))]
    Toml { source: toml::de::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let cfg = Config::from_slice(DEFAULT_CONFIG.as_bytes()).unwrap();
        assert_eq!(cfg.backend, Backend::Swaybg);
        assert_eq!(cfg.mode, Mode::Fill);
        assert_eq!(cfg.sort, SortKey::Name);
        assert!(!cfg.reverse);
        assert_eq!(cfg.thumb_box(), (240, 135));
        // tilde got expanded away
        assert!(!cfg.wp_dir.starts_with("~"));
    }

    #[test]
    fn malformed_config_is_a_toml_error() {
        let err = Config::from_slice(b"wp-dir = 3").unwrap_err();
        assert!(matches!(err, Error::Toml { .. }));
    }
}
