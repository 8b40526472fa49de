use snafu::{OptionExt, Snafu};
use std::path::PathBuf;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("Can't locate home directory"))]
    NoHome,
}

/// Well-known per-user locations. The cmd file is a dotfile in the home
/// directory so compositor configs can exec it on startup.
pub struct AppPaths {
    pub config_file: PathBuf,
    pub thumb_dir: PathBuf,
    pub bg_dir: PathBuf,
    pub rt_dir: PathBuf,
    pub cmd_file: PathBuf,
}

impl AppPaths {
    pub fn get() -> Result<Self, Error> {
        let proj = directories::ProjectDirs::from("org", "wallset", env!("CARGO_PKG_NAME"))
            .context(NoHomeSnafu)?;
        let base = directories::BaseDirs::new().context(NoHomeSnafu)?;
        let rt_dir = proj
            .runtime_dir()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| std::env::temp_dir().join(concat!(env!("CARGO_PKG_NAME"), "-rt")));

        Ok(Self {
            config_file: proj.config_dir().join("config.toml"),
            thumb_dir: proj.cache_dir().join("thumbnails"),
            bg_dir: proj.data_dir().join("backgrounds"),
            rt_dir,
            cmd_file: base.home_dir().join(concat!(".", env!("CARGO_PKG_NAME"), "bg")),
        })
    }
}
