use clap::Parser;
use std::process;

use ibd::cli::log::{execute, Cli};

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    if let Err(error) = execute(&cli, &mut stdout) {
        eprintln!("Error: {}", error);
        process::exit(1);
    }
}
