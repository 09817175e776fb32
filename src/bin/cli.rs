// Nitpicker - Gallery Browser & Downloader for Mobile
// Copyright (C) 2025 Nitpicker contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use nitpicker_core::download::lane::is_image;
use nitpicker_core::download::progress::format_bytes;
use nitpicker_core::{AlbumClient, CoreConfig, DownloadOrchestrator, HttpClient};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nitpicker-cli")]
#[command(about = "Nitpicker CLI - Desktop testing tool", long_about = None)]
struct Cli {
    /// Directory holding the database and the Downloads folder
    #[arg(long, default_value = ".nitpicker")]
    data_dir: PathBuf,

    /// JSON config file; overrides --data-dir when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "nitpicker_core=debug"
    #[arg(long)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search albums by artist
    Search {
        artist: String,
        /// Result page (1-based)
        #[arg(short, long)]
        page: Option<u32>,
    },
    /// List the files of an album
    Files {
        album_url: String,
    },
    /// Download an album and wait until every file settles
    Download {
        album_url: String,
        /// Folder name for the album
        #[arg(short, long)]
        album: String,
        /// Skip videos and other non-image files
        #[arg(long)]
        only_images: bool,
    },
    /// Show stored download tasks
    List,
    /// Retry a failed download
    Retry {
        id: String,
    },
    /// Cancel a download
    Cancel {
        id: String,
    },
    /// Forget completed and cancelled downloads
    Clean,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    nitpicker_core::logging::init(cli.log.as_deref());

    let config = match &cli.config {
        Some(path) => CoreConfig::load_or_default(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => CoreConfig::with_data_dir(&cli.data_dir),
    };

    match cli.command {
        Commands::Search { artist, page } => {
            let albums = album_client(&config)?;
            let found = match page {
                Some(page) => albums.page(&artist, page).await?,
                None => {
                    let first = albums.search(&artist).await?;
                    println!("{} page(s)", first.max_page);
                    first.albums
                }
            };
            for album in found {
                println!("{:>5} files  {}  {}", album.file_count, album.title, album.url);
            }
        }
        Commands::Files { album_url } => {
            for file in album_client(&config)?.files(&album_url).await? {
                println!("{:>10}  {}  {}", file.file_size, file.file_name, file.page_url);
            }
        }
        Commands::Download {
            album_url,
            album,
            only_images,
        } => {
            let mut files = album_client(&config)?.files(&album_url).await?;
            if only_images {
                files.retain(|file| is_image(&file.file_type));
            }
            if files.is_empty() {
                bail!("nothing to download from {}", album_url);
            }

            let orchestrator = DownloadOrchestrator::start(&config).await?;
            let ids = orchestrator.enqueue(&files, &album).await?;
            println!("Queued {} file(s) into '{}'", ids.len(), album);

            let mut progress = orchestrator.progress();
            loop {
                let rows: Vec<_> = progress
                    .current()
                    .into_iter()
                    .filter(|row| ids.contains(&row.id))
                    .collect();
                let done = rows.iter().filter(|row| row.status.is_settled()).count();
                let bytes: u64 = rows.iter().map(|row| row.downloaded_bytes).sum();
                println!("{}/{} settled, {}", done, rows.len(), format_bytes(bytes));
                if done == rows.len() {
                    break;
                }
                progress.changed().await?;
            }

            for row in progress.current().iter().filter(|row| ids.contains(&row.id)) {
                match &row.error {
                    Some(error) => println!("{:<10} {}  {}", row.status, row.file_name, error),
                    None => println!("{:<10} {}", row.status, row.file_name),
                }
            }
            orchestrator.shutdown().await;
        }
        Commands::List => {
            let orchestrator = DownloadOrchestrator::from_config(&config).await?;
            for row in orchestrator.progress().current() {
                println!(
                    "{:<12} {:>3}%  {:<24} {}  {}",
                    row.status.as_str(),
                    row.progress_percent,
                    row.id,
                    row.album_title,
                    row.file_name
                );
            }
        }
        Commands::Retry { id } => {
            let orchestrator = DownloadOrchestrator::from_config(&config).await?;
            orchestrator.retry_download(&id).await?;
            let mut progress = orchestrator.progress();
            while !progress.get(&id).map_or(true, |row| row.status.is_settled()) {
                progress.changed().await?;
            }
            if let Some(row) = progress.get(&id) {
                println!("{}: {}", id, row.status);
            }
            orchestrator.shutdown().await;
        }
        Commands::Cancel { id } => {
            let orchestrator = DownloadOrchestrator::from_config(&config).await?;
            orchestrator.cancel(&id).await?;
            println!("Cancelled {}", id);
        }
        Commands::Clean => {
            let orchestrator = DownloadOrchestrator::from_config(&config).await?;
            let removed = orchestrator.delete_completed_and_cancelled().await?;
            println!("Removed {} finished task(s)", removed);
        }
    }

    Ok(())
}

fn album_client(config: &CoreConfig) -> anyhow::Result<AlbumClient> {
    let client = HttpClient::from_core_config(config)?;
    Ok(AlbumClient::from_core_config(client, config)?)
}
