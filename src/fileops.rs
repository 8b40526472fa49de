use crate::thumbs;
use snafu::{ResultExt, Snafu};
use std::{
    path::{Path, PathBuf},
    process::Command,
};

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("Can't move {} to trash: {}", path.display(), source))]
    Trash {
        path: PathBuf,
        source: trash::Error,
    },

    #[snafu(display("Can't query mime type of {}: {}", path.display(), source))]
    MimeQuery {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Can't launch opener for {}: {}", path.display(), source))]
    Launch {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Trashes a wallpaper together with its cached thumbnail. A missing
/// thumbnail is not an error. The source goes first; if it can't be
/// deleted, its thumbnail stays too.
pub fn trash_with_thumbnail(path: &Path, thumb_dir: &Path) -> Result<(), Error> {
    trash::delete(path).context(TrashSnafu { path })?;

    let thumb = thumbs::thumbnail_path(thumb_dir, path);
    if thumb.is_file() {
        trash::delete(&thumb).context(TrashSnafu { path: thumb.clone() })?;
    }
    Ok(())
}

pub struct Opener {
    pub mime: String,
    pub desktop: Option<String>,
}

/// Resolves the file's mime type and its default handler through xdg-mime.
/// The handler lookup is best-effort, the mime query is not.
pub fn query_opener(path: &Path) -> Result<Opener, Error> {
    let out = Command::new("xdg-mime")
        .arg("query")
        .arg("filetype")
        .arg(path)
        .output()
        .context(MimeQuerySnafu { path })?;
    let mime = String::from_utf8_lossy(&out.stdout).trim().to_owned();

    let desktop = if mime.is_empty() {
        None
    } else {
        Command::new("xdg-mime")
            .arg("query")
            .arg("default")
            .arg(&mime)
            .output()
            .ok()
            .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_owned())
            .filter(|desktop| !desktop.is_empty())
    };

    Ok(Opener { mime, desktop })
}

/// Fire-and-forget open with the desktop's associated application.
pub fn open(path: &Path) -> Result<Opener, Error> {
    let opener = query_opener(path)?;
    Command::new("xdg-open")
        .arg(path)
        .spawn()
        .map(drop)
        .context(LaunchSnafu { path })?;
    Ok(opener)
}
