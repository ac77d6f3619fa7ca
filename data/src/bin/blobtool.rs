use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use blob_client::{BlobId, BlobSourceOption, LocalClient, ReadOptions};
use ::blob_config::{LogConfig, blob_config};
use clap::{Args, Parser, Subcommand};
use data::BlobDownloader;
use data::resume_token::{load_token, save_token};
use tracing_subscriber::EnvFilter;
use utils::ByteSize;

#[derive(Parser)]
#[clap(name = "blobtool", version, about = "Chunked, resumable reads from a local object store")]
struct BlobCommand {
    /// Directory served as the object store, laid out as <root>/<bucket>/<name>.
    #[clap(long, global = true, default_value = ".")]
    root: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

impl BlobCommand {
    fn run(self) -> Result<()> {
        let client = LocalClient::new(&self.root)?;
        self.command.run(client)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Writes a blob, or a byte range of it, to stdout.
    Cat(CatArg),
    /// Downloads a blob to a file, optionally stopping early and saving a resume token.
    Download(DownloadArg),
    /// Appends the rest of an interrupted download to a file.
    Resume(ResumeArg),
}

#[derive(Args)]
struct SourceArgs {
    /// Only read if the live generation matches.
    #[clap(long)]
    if_generation_match: Option<i64>,
    /// Only read if the live metageneration matches.
    #[clap(long)]
    if_metageneration_match: Option<i64>,
    /// Project billed for requester-pays buckets.
    #[clap(long)]
    user_project: Option<String>,
}

impl SourceArgs {
    fn read_options(&self) -> ReadOptions {
        let mut options = ReadOptions::new();
        if let Some(g) = self.if_generation_match {
            options.set(BlobSourceOption::IfGenerationMatch(g));
        }
        if let Some(m) = self.if_metageneration_match {
            options.set(BlobSourceOption::IfMetagenerationMatch(m));
        }
        if let Some(project) = &self.user_project {
            options.set(BlobSourceOption::UserProject(project.clone()));
        }
        options
    }
}

#[derive(Args)]
struct CatArg {
    /// Blob to read, as [gs://]bucket/name[#generation].
    blob: BlobId,
    /// First byte to read.
    #[clap(long, default_value_t = 0)]
    offset: u64,
    /// Number of bytes to read; reads to the end if not given.
    #[clap(long)]
    length: Option<u64>,
    /// Minimum size of each fetch, e.g. "256kib" or "2mib".
    #[clap(long)]
    chunk_size: Option<ByteSize>,
    #[clap(flatten)]
    source: SourceArgs,
}

#[derive(Args)]
struct DownloadArg {
    /// Blob to download, as [gs://]bucket/name[#generation].
    blob: BlobId,
    /// Output file.
    output: PathBuf,
    /// Stop after this many bytes and write a resume token.
    #[clap(long, requires = "token")]
    max_bytes: Option<u64>,
    /// Where to write the resume token.
    #[clap(long)]
    token: Option<PathBuf>,
    /// Minimum size of each fetch, e.g. "256kib" or "2mib".
    #[clap(long)]
    chunk_size: Option<ByteSize>,
    #[clap(flatten)]
    source: SourceArgs,
}

#[derive(Args)]
struct ResumeArg {
    /// Token written by an earlier `download --max-bytes`.
    token: PathBuf,
    /// File to append the remaining bytes to.
    output: PathBuf,
}

fn downloader(client: Arc<LocalClient>, chunk_size: Option<ByteSize>) -> BlobDownloader {
    let downloader = BlobDownloader::new(client);
    match chunk_size {
        Some(size) => downloader.with_chunk_size(size.as_usize()),
        None => downloader,
    }
}

/// The byte range read by `cat`; `None` reads the whole blob.
fn cat_range(offset: u64, length: Option<u64>) -> Option<Range<u64>> {
    match (offset, length) {
        (0, None) => None,
        (offset, None) => Some(offset..u64::MAX),
        (offset, Some(len)) => Some(offset..offset.saturating_add(len)),
    }
}

impl Command {
    fn run(self, client: Arc<LocalClient>) -> Result<()> {
        match self {
            Command::Cat(arg) => {
                let range = cat_range(arg.offset, arg.length);

                let stdout = std::io::stdout();
                let mut writer = BufWriter::new(stdout.lock());
                downloader(client, arg.chunk_size).download_to_writer(
                    &arg.blob,
                    &arg.source.read_options(),
                    range,
                    &mut writer,
                )?;
                writer.flush()?;
                Ok(())
            },
            Command::Download(arg) => {
                let downloader = downloader(client, arg.chunk_size);
                let options = arg.source.read_options();

                match (arg.max_bytes, arg.token) {
                    (Some(max_bytes), Some(token)) => {
                        let mut file = BufWriter::new(File::create(&arg.output)?);
                        let (n_bytes, state) = downloader.download_partial(&arg.blob, &options, max_bytes, &mut file)?;
                        save_token(&state, &token)?;
                        eprintln!("Wrote {n_bytes} bytes to {:?}; resume token saved to {token:?}", arg.output);
                    },
                    (Some(_), None) => bail!("--max-bytes requires --token"),
                    (None, _) => {
                        let n_bytes = downloader.download_to_path(&arg.blob, &options, &arg.output)?;
                        eprintln!("Wrote {n_bytes} bytes to {:?}", arg.output);
                    },
                }
                Ok(())
            },
            Command::Resume(arg) => {
                let state = load_token(&arg.token)?;
                let mut file = BufWriter::new(File::options().create(true).append(true).open(&arg.output)?);
                let n_bytes = downloader(client, None).resume_to_writer(&state, &mut file)?;
                eprintln!("Appended {n_bytes} bytes of {} to {:?}", state.blob(), arg.output);
                Ok(())
            },
        }
    }
}

fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    if config.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = BlobCommand::parse();
    init_logging(&blob_config().log);
    cli.run()
}
