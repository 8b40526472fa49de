use crate::backend::Backend;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use std::process::Command;

/// One detected output device. Immutable for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("Can't launch {}: {}", tool, source))]
    Launch {
        tool: &'static str,
        source: std::io::Error,
    },

    #[snafu(display("Can't parse swaymsg output: {}", source))]
    ParseOutputs { source: serde_json::Error },
}

pub trait Outputs {
    fn list(&mut self) -> Result<Vec<Display>, Error>;
}

impl From<Backend> for Box<dyn Outputs> {
    fn from(other: Backend) -> Self {
        match other {
            Backend::Swaybg => Box::new(Sway),
            Backend::Feh => Box::new(Xrandr),
        }
    }
}

/// Enumerates once at startup; the registry stays fixed for the process
/// lifetime.
pub fn detect(backend: Backend) -> Result<Vec<Display>, Error> {
    Box::<dyn Outputs>::from(backend).list()
}

pub struct Sway;

#[derive(Deserialize)]
struct GetOutputField {
    name: String,
    active: bool,
    rect: Rect,
}

#[derive(Deserialize)]
struct Rect {
    x: i32,
    width: u32,
    height: u32,
}

impl Outputs for Sway {
    fn list(&mut self) -> Result<Vec<Display>, Error> {
        let output = Command::new("swaymsg")
            .arg("-rt")
            .arg("get_outputs")
            .output()
            .context(LaunchSnafu { tool: "swaymsg" })?;

        let parsed: Vec<GetOutputField> =
            serde_json::from_slice(&output.stdout).context(ParseOutputsSnafu)?;

        let mut fields: Vec<_> = parsed.into_iter().filter(|field| field.active).collect();
        // left-to-right order, split across displays relies on it
        fields.sort_by_key(|field| field.rect.x);

        Ok(fields
            .into_iter()
            .map(|field| Display {
                name: field.name,
                width: field.rect.width,
                height: field.rect.height,
            })
            .collect())
    }
}

pub struct Xrandr;

impl Outputs for Xrandr {
    fn list(&mut self) -> Result<Vec<Display>, Error> {
        let output = Command::new("xrandr")
            .arg("--query")
            .output()
            .context(LaunchSnafu { tool: "xrandr" })?;

        Ok(parse_xrandr(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn parse_xrandr(out: &str) -> Vec<Display> {
    let mut found = Vec::new();
    for line in out.lines() {
        let mut words = line.split_whitespace();
        let name = match words.next() {
            Some(name) if !line.starts_with(char::is_whitespace) => name,
            _ => continue,
        };
        if words.next() != Some("connected") {
            continue;
        }

        // geometry token looks like 1920x1080+0+840, outputs that are
        // connected but off have none
        if let Some((width, height, x)) = words.find_map(parse_geometry) {
            found.push((
                x,
                Display {
                    name: name.to_owned(),
                    width,
                    height,
                },
            ));
        }
    }

    found.sort_by_key(|(x, _)| *x);
    found.into_iter().map(|(_, display)| display).collect()
}

fn parse_geometry(tok: &str) -> Option<(u32, u32, i32)> {
    let mut parts = tok.split('+');
    let size = parts.next()?;
    let x = parts.next()?.parse().ok()?;
    let _y: i32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let mut dims = size.split('x');
    let width = dims.next()?.parse().ok()?;
    let height = dims.next()?.parse().ok()?;
    if dims.next().is_some() {
        return None;
    }
    Some((width, height, x))
}
