include!("src/cli.rs");

const BIN: &str = "wallset";

fn main() {
    let mut opt = Opt::clap();

    let outdir = match std::env::var_os("OUT_DIR") {
        None => return,
        Some(outdir) => outdir,
    };

    use structopt::clap::Shell;
    for shell in &[Shell::Zsh, Shell::Bash, Shell::Fish] {
        opt.gen_completions(BIN, *shell, &outdir);
    }
}
