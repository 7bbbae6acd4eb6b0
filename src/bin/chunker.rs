use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use splitzip::chunk::{chunk_size_from_mib, merge_files, split_file};
use splitzip::cli::{ChunkerCli, ChunkerCommand};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = ChunkerCli::parse();
    cli.global.init_logging();
    let reporter = cli.global.reporter();

    let Some(command) = cli.command else {
        ChunkerCli::command().print_help()?;
        println!();
        return Ok(ExitCode::from(2));
    };

    match command {
        ChunkerCommand::Split { file, size } => {
            let chunk_size = chunk_size_from_mib(size)?;
            let parts = split_file(Path::new(&file), chunk_size, &reporter).await?;
            log::info!("wrote {} part(s) for {}", parts.len(), file);
        }
        ChunkerCommand::Merge { prefix, output } => {
            let output = output
                .map(PathBuf::from)
                .unwrap_or_else(|| ChunkerCommand::default_merge_output(&prefix));
            merge_files(Path::new(&prefix), &output, &reporter).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
