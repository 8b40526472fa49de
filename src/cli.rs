use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
pub struct Opt {
    #[structopt(subcommand)]
    pub cmd: Option<Command>,
    #[structopt(flatten)]
    pub cmd_config: CmdConfig,
}

#[derive(StructOpt, Debug)]
pub struct CmdConfig {
    /// Format output in json
    #[structopt(short, long)]
    pub json: bool,
}

#[derive(StructOpt, Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Print the current display assignments
    Status,

    /// List wallpapers in the configured folder with their cached thumbnails
    List,

    /// Generate missing thumbnails for the wallpaper folder
    Rescan,

    /// Assign an image to a display
    Set { display: String, path: PathBuf },

    /// Assign one image to every display, optionally forcing a fill mode
    SetAll {
        path: PathBuf,
        mode: Option<String>,
    },

    /// Assign a flat color (#rrggbb) to a display
    Color { display: String, color: String },

    /// Change the fill mode of a display
    Mode { display: String, mode: String },

    /// Split an image into one slice per display, left to right
    Split { path: PathBuf },

    /// Mirror the last assigned image horizontally
    Flip,

    /// Scale and center-crop an image to an exact size
    Crop {
        path: PathBuf,
        width: u32,
        height: u32,
    },

    /// Generate the backend command and run it
    Apply,

    /// Move a wallpaper and its cached thumbnail to the trash
    Trash { path: PathBuf },

    /// Open a wallpaper with the default application for its mime type
    Open { path: PathBuf },
}
