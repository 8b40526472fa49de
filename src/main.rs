mod assign;
mod backend;
mod cfg;
mod cli;
mod client;
mod daemon;
mod display;
mod fileops;
mod ipc;
mod thumbs;
mod unix;
mod util;
mod watch_file;

use crate::cli::Opt;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

async fn run(opt: Opt) -> Result<(), anyhow::Error> {
    match opt.cmd {
        None => daemon::run().await?,
        Some(cmd) => client::run(cmd, opt.cmd_config).await?,
    };
    Ok(())
}

fn main() {
    let opt = Opt::from_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    if let Err(e) = rt.block_on(run(opt)) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
