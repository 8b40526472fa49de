use crate::{
    assign::{Entry, Source},
    cli::{CmdConfig, Command},
    ipc::{self, FileEntry, Reply},
    util::AppPaths,
};
use serde::Serialize;

enum Formatter {
    Json,
    Text,
}

impl Formatter {
    fn print_json<T>(t: &T)
    where
        T: Serialize,
    {
        let s = serde_json::to_string_pretty(t).expect("Can't serialize to json");
        println!("{}", s);
    }
}

fn render_entry(ent: &Entry) -> String {
    let source = match &ent.source {
        Some(Source::Image(path)) => format!("image {}", path.display()),
        Some(Source::Color(color)) => format!("color {}", color),
        None => "unset".to_owned(),
    };
    format!(
        "{} {}x{} mode={} {}",
        ent.display.name, ent.display.width, ent.display.height, ent.mode, source
    )
}

fn render_file(file: &FileEntry) -> String {
    match &file.thumbnail {
        Some(thumb) => format!("{}\t{}", file.source.display(), thumb.display()),
        None => format!("{}\t-", file.source.display()),
    }
}

pub async fn run(cmd: Command, cmd_config: CmdConfig) -> Result<(), anyhow::Error> {
    let formatter = if cmd_config.json {
        Formatter::Json
    } else {
        Formatter::Text
    };

    let paths = AppPaths::get()?;
    let reply = ipc::send_command(&ipc::sock_path(&paths.rt_dir), &cmd).await?;

    if let Reply::Failed(msg) = &reply {
        eprintln!("{}", msg);
        std::process::exit(1);
    }

    match formatter {
        Formatter::Json => Formatter::print_json(&reply),
        Formatter::Text => match reply {
            Reply::Table(entries) => {
                for ent in &entries {
                    println!("{}", render_entry(ent));
                }
            }
            Reply::Files(files) => {
                for file in &files {
                    println!("{}", render_file(file));
                }
            }
            Reply::Produced(paths) => {
                for path in &paths {
                    println!("{}", path.display());
                }
            }
            Reply::Applied { directives: 0 } => println!("nothing to apply"),
            Reply::Applied { directives } => println!("applied {} directives", directives),
            Reply::Opener { mime, desktop } => println!(
                "{} -> {}",
                mime,
                desktop.as_deref().unwrap_or("(no association)")
            ),
            Reply::Unit | Reply::Failed(_) => {}
        },
    }

    Ok(())
}
