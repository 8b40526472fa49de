use crate::{backend::Mode, display::Display};
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[display(fmt = "#{:02x}{:02x}{:02x}", r, g, b)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Snafu)]
#[snafu(display("Invalid color (expected #rrggbb): {}", input))]
pub struct InvalidColor {
    input: String,
}

impl FromStr for Rgb {
    type Err = InvalidColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        let mut channels = (0..3).map(|i| {
            hex.get(i * 2..i * 2 + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
        });

        match (hex.len(), channels.next(), channels.next(), channels.next()) {
            (6, Some(Some(r)), Some(Some(g)), Some(Some(b))) => Ok(Rgb { r, g, b }),
            _ => InvalidColorSnafu { input: s }.fail(),
        }
    }
}

/// What a display shows. An entry holds at most one source, so an image and
/// a color can never be active at the same time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Image(PathBuf),
    Color(Rgb),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub display: Display,
    pub source: Option<Source>,
    pub mode: Mode,
}

impl Entry {
    pub fn image(&self) -> Option<&Path> {
        match &self.source {
            Some(Source::Image(path)) => Some(path),
            _ => None,
        }
    }
}

/// Per-display assignment records. Created once per detected display at
/// startup; only the fields mutate afterwards.
#[derive(Debug, Clone)]
pub struct Table {
    entries: Vec<Entry>,
}

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("No display named {}", name))]
    UnknownDisplay { name: String },
}

impl Table {
    pub fn new(displays: Vec<Display>, mode: Mode) -> Self {
        Self {
            entries: displays
                .into_iter()
                .map(|display| Entry {
                    display,
                    source: None,
                    mode,
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn displays(&self) -> Vec<Display> {
        self.entries.iter().map(|ent| ent.display.clone()).collect()
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut Entry, Error> {
        self.entries
            .iter_mut()
            .find(|ent| ent.display.name == name)
            .ok_or_else(|| Error::UnknownDisplay {
                name: name.to_owned(),
            })
    }

    pub fn set_image(&mut self, name: &str, path: PathBuf) -> Result<(), Error> {
        self.entry_mut(name)?.source = Some(Source::Image(path));
        Ok(())
    }

    pub fn set_color(&mut self, name: &str, color: Rgb) -> Result<(), Error> {
        self.entry_mut(name)?.source = Some(Source::Color(color));
        Ok(())
    }

    pub fn set_mode(&mut self, name: &str, mode: Mode) -> Result<(), Error> {
        self.entry_mut(name)?.mode = mode;
        Ok(())
    }

    /// Pairs slices with entries in display order, shorter side wins.
    /// A slice replaces whatever the entry held, colors included.
    pub fn assign_images(&mut self, paths: &[PathBuf]) {
        for (ent, path) in self.entries.iter_mut().zip(paths) {
            ent.source = Some(Source::Image(path.clone()));
        }
    }

    /// One image everywhere, replacing colors too. Modes keep their
    /// per-display values unless a new one is given.
    pub fn set_all_images(&mut self, path: &Path, mode: Option<Mode>) {
        for ent in &mut self.entries {
            ent.source = Some(Source::Image(path.to_owned()));
            if let Some(mode) = mode {
                ent.mode = mode;
            }
        }
    }

    /// Repoints every entry showing `from` at `to`, returns how many moved.
    pub fn repoint_image(&mut self, from: &Path, to: &Path) -> usize {
        let mut moved = 0;
        for ent in &mut self.entries {
            if ent.image() == Some(from) {
                ent.source = Some(Source::Image(to.to_owned()));
                moved += 1;
            }
        }
        moved
    }
}
