use crate::{
    assign::{Rgb, Table},
    backend,
    cfg::{self, Config},
    cli::Command,
    display, fileops,
    ipc::{self, FileEntry, Reply},
    thumbs,
    util::{self, AppPaths},
    watch_file::FileWatcher,
};
use snafu::ResultExt;
use std::path::PathBuf;
use tokio::{
    signal::unix::{signal, Signal, SignalKind},
    sync::mpsc,
    task,
};

#[derive(snafu::Snafu, Debug)]
pub enum Error {
    #[snafu(context(false), display("{}", source))]
    Bind { source: ipc::BindError },

    #[snafu(context(false), display("{}", source))]
    Config { source: cfg::Error },

    #[snafu(context(false), display("{}", source))]
    Paths { source: util::Error },

    #[snafu(context(false), display("Could not detect displays: {}", source))]
    Outputs { source: display::Error },

    #[snafu(display("Can't register signal: {}", source))]
    RegisterSignal { source: std::io::Error },
}

pub async fn run() -> Result<(), Error> {
    let app_paths = AppPaths::get()?;
    let mut cfg = Config::load_or_write_default(&app_paths.config_file)?;

    let (watch_task, mut cfg_reload) = FileWatcher::default().watch(app_paths.config_file.clone());
    task::spawn(watch_task);

    let displays = display::detect(cfg.backend)?;
    if displays.is_empty() {
        tracing::warn!("No active display detected, applying will be a no-op");
    }
    let mut state = AppState::new(Table::new(displays, cfg.mode));

    let mut listener = ipc::bind(&app_paths.rt_dir)?;

    match thumbs::refresh_thumbnails(
        &cfg.wp_dir,
        &app_paths.thumb_dir,
        cfg.thumb_box(),
        cfg.sort,
        cfg.reverse,
    ) {
        Ok(pairs) => tracing::info!(files = pairs.len(), "Scanned wallpaper folder"),
        Err(e) => tracing::error!("{}", e),
    }

    let mut term = signal(SignalKind::terminate()).context(RegisterSignalSnafu)?;
    let mut int = signal(SignalKind::interrupt()).context(RegisterSignalSnafu)?;

    loop {
        let loop_ = ControlLoop {
            cfg_reload: &mut cfg_reload,
            term: &mut term,
            int: &mut int,
            listener: &mut listener,
            paths: &app_paths,
            cfg: &cfg,
            state: &mut state,
        };

        tracing::debug!("Starting event loop");

        match loop_.run().await {
            LoopExit::Terminate => break Ok(()),
            // the table survives a reload, entries live as long as the
            // process does
            LoopExit::NewCfg(new_cfg) => {
                cfg = new_cfg;
            }
        }
    }
}

/// How the current image got onto the displays. A flipped split source has
/// to be cut again, repointing paths won't do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Single(PathBuf),
    Split(PathBuf),
}

/// Everything the dispatcher mutates. The old per-widget callbacks become
/// one command match over this.
#[derive(Debug)]
pub struct AppState {
    pub table: Table,
    pub selected: Option<Selection>,
    pub flip_armed: bool,
}

impl AppState {
    fn new(table: Table) -> Self {
        Self {
            table,
            selected: None,
            flip_armed: false,
        }
    }

    /// Every image assignment re-arms the flip.
    fn select(&mut self, selection: Selection) {
        self.selected = Some(selection);
        self.flip_armed = true;
    }
}

struct ControlLoop<'a> {
    cfg_reload: &'a mut mpsc::Receiver<Vec<u8>>,
    term: &'a mut Signal,
    int: &'a mut Signal,
    listener: &'a mut ipc::Listener,
    paths: &'a AppPaths,
    cfg: &'a Config,
    state: &'a mut AppState,
}

enum LoopExit {
    NewCfg(Config),
    Terminate,
}

impl ControlLoop<'_> {
    async fn run(mut self) -> LoopExit {
        loop {
            tokio::select! {
                Some(new_cfg) = self.cfg_reload.recv() => {
                    match Config::from_slice(&new_cfg) {
                        Ok(new_cfg) => {
                            tracing::info!("Reloaded config");
                            return LoopExit::NewCfg(new_cfg);
                        }
                        Err(e) => {
                            tracing::error!("{}", e);
                        }
                    }
                }

                Some(_) = self.term.recv() => {
                    return LoopExit::Terminate;
                }

                Some(_) = self.int.recv() => {
                    return LoopExit::Terminate;
                }

                req = self.listener.next_request() => {
                    let reply = self.dispatch(req.cmd.clone());
                    if let Err(e) = req.reply(reply).await {
                        tracing::debug!("Client hung up: {}", e);
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, cmd: Command) -> Reply {
        match handle_command(cmd, self.cfg, self.paths, self.state) {
            Ok(reply) => reply,
            Err(msg) => Reply::Failed(msg),
        }
    }
}

fn usable_image(path: PathBuf) -> Result<PathBuf, String> {
    if !path.is_file() || !thumbs::file_allowed(&path) {
        return Err(format!("Not a usable image: {}", path.display()));
    }
    Ok(path.canonicalize().unwrap_or(path))
}

fn handle_command(
    cmd: Command,
    cfg: &Config,
    paths: &AppPaths,
    state: &mut AppState,
) -> Result<Reply, String> {
    match cmd {
        Command::Status => Ok(Reply::Table(state.table.entries().to_vec())),

        Command::List => Ok(Reply::Files(
            thumbs::listing(&cfg.wp_dir, &paths.thumb_dir, cfg.sort, cfg.reverse)
                .into_iter()
                .map(|(source, thumbnail)| FileEntry { source, thumbnail })
                .collect(),
        )),

        Command::Rescan => {
            let pairs = thumbs::refresh_thumbnails(
                &cfg.wp_dir,
                &paths.thumb_dir,
                cfg.thumb_box(),
                cfg.sort,
                cfg.reverse,
            )
            .map_err(|e| e.to_string())?;
            Ok(Reply::Files(
                pairs
                    .into_iter()
                    .map(|(source, thumbnail)| FileEntry { source, thumbnail })
                    .collect(),
            ))
        }

        Command::Set { display, path } => {
            let path = usable_image(path)?;
            state
                .table
                .set_image(&display, path.clone())
                .map_err(|e| e.to_string())?;
            state.select(Selection::Single(path.clone()));
            let display_name = display.as_str();
            tracing::info!(
                display = display_name,
                path = %path.display(),
                "Assigned image"
            );
            Ok(Reply::Table(state.table.entries().to_vec()))
        }

        Command::SetAll { path, mode } => {
            let mode = mode
                .map(|mode| mode.parse())
                .transpose()
                .map_err(|e: backend::UnknownMode| e.to_string())?;
            let path = usable_image(path)?;
            state.table.set_all_images(&path, mode);
            state.select(Selection::Single(path.clone()));
            tracing::info!(path = %path.display(), "Assigned image to all displays");
            Ok(Reply::Table(state.table.entries().to_vec()))
        }

        Command::Color { display, color } => {
            let color: Rgb = color
                .parse()
                .map_err(|e: crate::assign::InvalidColor| e.to_string())?;
            state
                .table
                .set_color(&display, color)
                .map_err(|e| e.to_string())?;
            let display_name = display.as_str();
            tracing::info!(display = display_name, color = %color, "Assigned color");
            Ok(Reply::Table(state.table.entries().to_vec()))
        }

        Command::Mode { display, mode } => {
            let mode = mode
                .parse()
                .map_err(|e: backend::UnknownMode| e.to_string())?;
            state
                .table
                .set_mode(&display, mode)
                .map_err(|e| e.to_string())?;
            Ok(Reply::Table(state.table.entries().to_vec()))
        }

        Command::Split { path } => {
            let path = usable_image(path)?;
            let displays = state.table.displays();
            let slices =
                thumbs::split(&paths.bg_dir, &path, &displays).map_err(|e| e.to_string())?;
            state.table.assign_images(&slices);
            state.select(Selection::Split(path));
            tracing::info!(slices = slices.len(), "Split wallpaper across displays");
            Ok(Reply::Table(state.table.entries().to_vec()))
        }

        Command::Flip => {
            let selected = state
                .selected
                .clone()
                .ok_or_else(|| "No image selected, assign one first".to_owned())?;
            if !state.flip_armed {
                return Err(
                    "Already flipped this selection, assign an image again to flip back".to_owned(),
                );
            }

            match selected {
                Selection::Single(path) => {
                    let flipped =
                        thumbs::flip(&paths.bg_dir, &path).map_err(|e| e.to_string())?;
                    let moved = state.table.repoint_image(&path, &flipped);
                    state.selected = Some(Selection::Single(flipped.clone()));
                    tracing::info!(
                        path = %flipped.display(),
                        displays = moved,
                        "Flipped wallpaper"
                    );
                }
                Selection::Split(path) => {
                    let flipped =
                        thumbs::flip(&paths.bg_dir, &path).map_err(|e| e.to_string())?;
                    let displays = state.table.displays();
                    let slices = thumbs::split(&paths.bg_dir, &flipped, &displays)
                        .map_err(|e| e.to_string())?;
                    state.table.assign_images(&slices);
                    state.selected = Some(Selection::Split(flipped.clone()));
                    tracing::info!(
                        path = %flipped.display(),
                        slices = slices.len(),
                        "Flipped and re-split wallpaper"
                    );
                }
            }
            state.flip_armed = false;
            Ok(Reply::Table(state.table.entries().to_vec()))
        }

        Command::Crop {
            path,
            width,
            height,
        } => {
            let out = thumbs::scale_and_crop(&paths.bg_dir, &path, width, height)
                .map_err(|e| e.to_string())?;
            Ok(Reply::Produced(vec![out]))
        }

        Command::Apply => {
            let directives = backend::apply(cfg.backend, &state.table, &paths.cmd_file)
                .map_err(|e| e.to_string())?;
            if directives == 0 {
                tracing::info!("Nothing to apply");
            } else {
                tracing::info!(directives, "Applied assignments");
            }
            Ok(Reply::Applied { directives })
        }

        Command::Trash { path } => {
            fileops::trash_with_thumbnail(&path, &paths.thumb_dir).map_err(|e| e.to_string())?;
            tracing::info!(path = %path.display(), "Moved to trash");
            Ok(Reply::Unit)
        }

        Command::Open { path } => {
            let opener = fileops::open(&path).map_err(|e| e.to_string())?;
            Ok(Reply::Opener {
                mime: opener.mime,
                desktop: opener.desktop,
            })
        }
    }
}
