//! Renders the kinflash(1) man page
//!
//! Usage: gen-manpage [output-dir], defaults to `target/man`

use clap::CommandFactory;
use std::fs;
use std::path::PathBuf;

#[path = "../cli.rs"]
mod cli;

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("target/man"));
    fs::create_dir_all(&output_dir)?;

    let mut page = Vec::new();
    clap_mangen::Man::new(cli::Cli::command()).render(&mut page)?;

    let output_path = output_dir.join("kinflash.1");
    fs::write(&output_path, page)?;
    println!("{}", output_path.display());

    Ok(())
}
