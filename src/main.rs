pub mod cli;
pub mod context;
pub mod convert;
pub mod engine;
pub mod error;
pub mod fastpath;
pub mod metadata;
pub mod model;
pub mod walker;

use colored::Colorize;

fn main() {
    let command_line_interface = cli::CommandLineInterface::load();
    if let Err(error) = command_line_interface.run() {
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
