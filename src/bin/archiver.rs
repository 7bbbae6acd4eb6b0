use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use splitzip::archive::{unzip_archive, zip_path};
use splitzip::cli::{ArchiverCli, ArchiverCommand};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = ArchiverCli::parse();
    cli.global.init_logging();
    let reporter = cli.global.reporter();

    let Some(command) = cli.command else {
        ArchiverCli::command().print_help()?;
        println!();
        return Ok(ExitCode::from(2));
    };

    match command {
        ArchiverCommand::Zip { source, output } => {
            let output = output
                .map(PathBuf::from)
                .unwrap_or_else(|| ArchiverCommand::default_zip_output(&source));
            let summary = zip_path(Path::new(&source), &output, &reporter).await?;
            log::info!(
                "{} entries, {} -> {} bytes",
                summary.entries.len(),
                summary.uncompressed_bytes,
                summary.compressed_bytes
            );
        }
        ArchiverCommand::Unzip { zipfile, output } => {
            let summary = unzip_archive(Path::new(&zipfile), Path::new(&output), &reporter).await?;
            log::info!("{} file(s), {} bytes", summary.files, summary.bytes);
        }
    }

    Ok(ExitCode::SUCCESS)
}
