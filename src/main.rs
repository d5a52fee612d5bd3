use clap::Parser;

use crate::shell::{cli::Cli, start_shell};

mod shell;

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    start_shell(cli);
}
