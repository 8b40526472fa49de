use crate::assign::{Source, Table};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    process::Command,
    str::FromStr,
};

/// The external background-setting mechanism. Swaybg is scriptable per
/// output, feh only knows one global command.
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    Swaybg,
    Feh,
}

#[derive(
    Deserialize, Serialize, Copy, Clone, Debug, PartialEq, Eq, derive_more::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[display(fmt = "stretch")]
    Stretch,
    #[display(fmt = "fit")]
    Fit,
    #[display(fmt = "fill")]
    Fill,
    #[display(fmt = "center")]
    Center,
    #[display(fmt = "tile")]
    Tile,
}

impl Mode {
    pub fn swaybg_keyword(self) -> &'static str {
        match self {
            Mode::Stretch => "stretch",
            Mode::Fit => "fit",
            Mode::Fill => "fill",
            Mode::Center => "center",
            Mode::Tile => "tile",
        }
    }

    /// feh spells the same semantics differently: --bg-scale stretches,
    /// --bg-max letterboxes.
    pub fn feh_keyword(self) -> &'static str {
        match self {
            Mode::Stretch => "scale",
            Mode::Fit => "max",
            Mode::Fill => "fill",
            Mode::Center => "center",
            Mode::Tile => "tile",
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("Unknown mode: {}", name))]
pub struct UnknownMode {
    name: String,
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // feh's spellings are accepted as aliases
        Ok(match s {
            "stretch" | "scale" => Mode::Stretch,
            "fit" | "max" => Mode::Fit,
            "fill" => Mode::Fill,
            "center" => Mode::Center,
            "tile" => Mode::Tile,
            _ => return UnknownModeSnafu { name: s }.fail(),
        })
    }
}

/// What an apply would run, before any side effect happens.
#[derive(Debug, PartialEq, Eq)]
pub enum Plan {
    /// Script contents for the cmd file, one swaybg invocation per sourced
    /// display.
    Script { contents: String, directives: usize },
    /// Single argv for feh.
    Argv(Vec<String>),
}

pub fn plan(backend: Backend, table: &Table) -> Option<Plan> {
    match backend {
        Backend::Swaybg => swaybg_script(table),
        Backend::Feh => feh_argv(table).map(Plan::Argv),
    }
}

fn swaybg_script(table: &Table) -> Option<Plan> {
    let mut lines = vec!["#!/usr/bin/env bash".to_owned(), "pkill swaybg".to_owned()];
    for ent in table.entries() {
        match &ent.source {
            Some(Source::Color(color)) => {
                lines.push(format!("swaybg -o {} -c{} &", ent.display.name, color));
            }
            Some(Source::Image(path)) => {
                lines.push(format!(
                    "swaybg -o {} -i '{}' -m {} &",
                    ent.display.name,
                    path.display(),
                    ent.mode.swaybg_keyword()
                ));
            }
            None => (),
        }
    }

    let directives = lines.len() - 2;
    if directives == 0 {
        return None;
    }

    let mut contents = lines.join("\n");
    contents.push('\n');
    Some(Plan::Script {
        contents,
        directives,
    })
}

fn feh_argv(table: &Table) -> Option<Vec<String>> {
    // feh can't set modes per display, the first entry wins for everything
    let mode = table.entries().first()?.mode;
    let mut argv = vec!["feh".to_owned(), format!("--bg-{}", mode.feh_keyword())];

    for ent in table.entries() {
        if let Some(Source::Image(path)) = &ent.source {
            argv.push(path.display().to_string());
        }
    }

    if argv.len() == 2 {
        None
    } else {
        Some(argv)
    }
}

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("Can't write command script {}: {}", path.display(), source))]
    WriteScript {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Can't launch {}: {}", program, source))]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

/// Realizes the current table: writes/marks the script (swaybg) or builds
/// the argv (feh), then spawns it fire-and-forget. Returns the number of
/// directives issued; zero means there was nothing to do.
pub fn apply(backend: Backend, table: &Table, cmd_file: &Path) -> Result<usize, Error> {
    match plan(backend, table) {
        None => Ok(0),
        Some(Plan::Script {
            contents,
            directives,
        }) => {
            fs::write(cmd_file, contents).context(WriteScriptSnafu { path: cmd_file })?;
            let mut perms = fs::metadata(cmd_file)
                .context(WriteScriptSnafu { path: cmd_file })?
                .permissions();
            perms.set_mode(0o755);
            fs::set_permissions(cmd_file, perms).context(WriteScriptSnafu { path: cmd_file })?;

            Command::new(cmd_file)
                .spawn()
                .map(drop)
                .context(SpawnSnafu {
                    program: cmd_file.display().to_string(),
                })?;
            Ok(directives)
        }
        Some(Plan::Argv(argv)) => {
            let paths = argv.len() - 2;
            Command::new(&argv[0])
                .args(&argv[1..])
                .spawn()
                .map(drop)
                .context(SpawnSnafu {
                    program: argv[0].clone(),
                })?;
            Ok(paths)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assign::Rgb, display::Display};
    use std::path::PathBuf;

    fn two_displays() -> Table {
        Table::new(
            vec![
                Display {
                    name: "DP-1".into(),
                    width: 1920,
                    height: 1080,
                },
                Display {
                    name: "DP-2".into(),
                    width: 1080,
                    height: 1920,
                },
            ],
            Mode::Fill,
        )
    }

    #[test]
    fn swaybg_script_one_directive_per_sourced_display() {
        let mut table = two_displays();
        table.set_image("DP-1", PathBuf::from("/wp/a.jpg")).unwrap();
        table.set_color("DP-2", "000000".parse::<Rgb>().unwrap()).unwrap();

        match plan(Backend::Swaybg, &table).unwrap() {
            Plan::Script {
                contents,
                directives,
            } => {
                assert_eq!(directives, 2);
                let lines: Vec<_> = contents.lines().collect();
                assert_eq!(lines[0], "#!/usr/bin/env bash");
                assert_eq!(lines[1], "pkill swaybg");
                assert_eq!(lines[2], "swaybg -o DP-1 -i '/wp/a.jpg' -m fill &");
                assert_eq!(lines[3], "swaybg -o DP-2 -c#000000 &");
                assert_eq!(lines.len(), 4);
            }
            other => panic!("expected script plan, got {:?}", other),
        }
    }

    #[test]
    fn swaybg_skips_unsourced_displays() {
        let mut table = two_displays();
        table.set_image("DP-2", PathBuf::from("/wp/b.png")).unwrap();

        match plan(Backend::Swaybg, &table).unwrap() {
            Plan::Script { directives, contents } => {
                assert_eq!(directives, 1);
                assert!(!contents.contains("-o DP-1"));
            }
            other => panic!("expected script plan, got {:?}", other),
        }
    }

    #[test]
    fn empty_table_produces_no_plan() {
        let table = Table::new(Vec::new(), Mode::Fill);
        assert_eq!(plan(Backend::Swaybg, &table), None);
        assert_eq!(plan(Backend::Feh, &table), None);
    }

    #[test]
    fn unsourced_table_produces_no_plan() {
        let table = two_displays();
        assert_eq!(plan(Backend::Swaybg, &table), None);
        assert_eq!(plan(Backend::Feh, &table), None);
    }

    #[test]
    fn feh_uses_first_displays_mode_for_everything() {
        let mut table = two_displays();
        table.set_image("DP-1", PathBuf::from("/wp/a.jpg")).unwrap();
        table.set_image("DP-2", PathBuf::from("/wp/b.jpg")).unwrap();
        table.set_mode("DP-1", Mode::Center).unwrap();
        table.set_mode("DP-2", Mode::Tile).unwrap();

        assert_eq!(
            plan(Backend::Feh, &table).unwrap(),
            Plan::Argv(vec![
                "feh".to_owned(),
                "--bg-center".to_owned(),
                "/wp/a.jpg".to_owned(),
                "/wp/b.jpg".to_owned(),
            ])
        );
    }

    #[test]
    fn feh_skips_color_entries() {
        let mut table = two_displays();
        table.set_color("DP-1", Rgb { r: 0, g: 0, b: 0 }).unwrap();
        table.set_image("DP-2", PathBuf::from("/wp/b.jpg")).unwrap();

        match plan(Backend::Feh, &table).unwrap() {
            Plan::Argv(argv) => assert_eq!(argv[2..], ["/wp/b.jpg".to_owned()]),
            other => panic!("expected argv plan, got {:?}", other),
        }
    }

    #[test]
    fn mode_aliases_parse() {
        assert_eq!("scale".parse::<Mode>().unwrap(), Mode::Stretch);
        assert_eq!("max".parse::<Mode>().unwrap(), Mode::Fit);
        assert_eq!("fill".parse::<Mode>().unwrap(), Mode::Fill);
        assert!("cover".parse::<Mode>().is_err());
    }
}
