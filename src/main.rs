#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::cast_precision_loss
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ftp_bridge::download::ParallelDownloader;
use ftp_bridge::{codec, transfer, Config, ConnectionTarget, Fetched, Status, TransferError};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use url::Url;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Seconds allowed for connecting and for each channel's I/O
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Largest payload accepted from the server, in bytes
    #[arg(long, global = true)]
    max_bytes: Option<u64>,

    /// Prompt for the password when the URI carries none
    #[arg(long, global = true)]
    ask_pass: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a file (base64 on stdout, raw bytes with --output)
    Get {
        uri: String,

        /// Write the decoded file here instead of printing base64
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download a text file with normalized line endings
    GetText {
        uri: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a local file
    Put {
        uri: String,

        /// Local file to send
        file: PathBuf,
    },

    /// Upload text, read from a file or from stdin
    PutText {
        uri: String,

        /// Local text file (stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Create a remote directory
    Mkdir { uri: String },

    /// List entry names in a remote directory
    Ls { uri: String },

    /// Download several files in parallel
    Fetch {
        /// File URIs to download
        #[arg(required = true)]
        uris: Vec<String>,

        /// Local destination directory
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,

        /// Hide progress bars
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show or change persisted settings
    Config {
        #[arg(long)]
        timeout: Option<u64>,

        #[arg(long)]
        max_bytes: Option<u64>,

        /// Concurrent downloads used by `fetch`
        #[arg(long)]
        parallel: Option<usize>,

        /// SHA256 fingerprint SFTP host keys must match
        #[arg(long)]
        host_fingerprint: Option<String>,

        /// Forget the pinned SFTP host fingerprint
        #[arg(long, conflicts_with = "host_fingerprint")]
        clear_fingerprint: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<TransferError>()
                .map_or(1, |err| err.kind().code());
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(max_bytes) = cli.max_bytes {
        config.max_transfer_bytes = max_bytes;
    }
    let ask_pass = cli.ask_pass;

    match cli.command {
        Commands::Get { uri, output } => {
            let uri = with_password(&uri, ask_pass)?;
            match transfer::fetch_file(&uri, &config).await? {
                Fetched::Content(encoded) => match output {
                    Some(path) => {
                        let bytes = codec::decode_binary(&encoded)?;
                        std::fs::write(&path, &bytes)
                            .with_context(|| format!("writing {}", path.display()))?;
                        println!(
                            "Saved {} to {}",
                            human_bytes::human_bytes(bytes.len() as f64),
                            path.display()
                        );
                    }
                    None => println!("{encoded}"),
                },
                Fetched::Empty => eprintln!("Remote file is empty"),
            }
        }
        Commands::GetText { uri, output } => {
            let uri = with_password(&uri, ask_pass)?;
            match transfer::fetch_text(&uri, &config).await? {
                Fetched::Content(text) => match output {
                    Some(path) => std::fs::write(&path, text)
                        .with_context(|| format!("writing {}", path.display()))?,
                    None => println!("{text}"),
                },
                Fetched::Empty => eprintln!("Remote file is empty"),
            }
        }
        Commands::Put { uri, file } => {
            let uri = with_password(&uri, ask_pass)?;
            let bytes =
                std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let status = transfer::store_file(&uri, &codec::encode_binary(&bytes), &config).await?;
            report_status(&uri, status)?;
        }
        Commands::PutText { uri, file } => {
            let uri = with_password(&uri, ask_pass)?;
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let status = transfer::store_text(&uri, &text, &config).await?;
            report_status(&uri, status)?;
        }
        Commands::Mkdir { uri } => {
            let uri = with_password(&uri, ask_pass)?;
            let status = transfer::make_directory(&uri, &config).await?;
            report_status(&uri, status)?;
        }
        Commands::Ls { uri } => {
            let uri = with_password(&uri, ask_pass)?;
            let names = transfer::list_directory(&uri, &config).await?;
            if names.is_empty() {
                eprintln!("No entries");
            }
            for name in names {
                println!("{name}");
            }
        }
        Commands::Fetch { uris, dest, quiet } => {
            let mut files = Vec::with_capacity(uris.len());
            for uri in &uris {
                let target = ConnectionTarget::parse(&with_password(uri, ask_pass)?)?;
                let filename = target
                    .remote_path
                    .rsplit('/')
                    .next()
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .with_context(|| format!("{uri} does not name a file"))?;
                files.push((target, dest.join(filename)));
            }

            println!("Downloading {} files to {}", files.len(), dest.display());
            let mut downloader = ParallelDownloader::new(&config);
            if quiet {
                downloader = downloader.hidden();
            }
            let results = downloader.download_files(files).await;

            let total = results.len();
            let mut successful = 0;
            for (path, result) in &results {
                match result {
                    Ok(_) => successful += 1,
                    Err(e) => eprintln!("✗ {}: {e}", path.display()),
                }
            }
            println!("Downloaded {}/{} files successfully", successful, total);
            if successful < total {
                bail!("{} downloads failed", total - successful);
            }
        }
        Commands::Config {
            timeout,
            max_bytes,
            parallel,
            host_fingerprint,
            clear_fingerprint,
        } => {
            // Start from the file, not from the per-run overrides above.
            let mut config = Config::load()?;
            let changed = timeout.is_some()
                || max_bytes.is_some()
                || parallel.is_some()
                || host_fingerprint.is_some()
                || clear_fingerprint;

            if let Some(timeout) = timeout {
                config.timeout_secs = timeout;
            }
            if let Some(max_bytes) = max_bytes {
                config.max_transfer_bytes = max_bytes;
            }
            if let Some(parallel) = parallel {
                config.parallel_downloads = parallel;
            }
            if host_fingerprint.is_some() {
                config.sftp_host_fingerprint = host_fingerprint;
            }
            if clear_fingerprint {
                config.sftp_host_fingerprint = None;
            }

            if changed {
                config.save()?;
                println!("Configuration saved successfully!");
            }
            if let Some(path) = Config::config_path() {
                println!("# {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Fill in a password from the terminal when asked to and the URI has none.
fn with_password(uri: &str, ask_pass: bool) -> Result<String> {
    if !ask_pass {
        return Ok(uri.to_string());
    }
    let mut url = Url::parse(uri).with_context(|| format!("invalid URI {uri}"))?;
    if url.password().is_some() {
        return Ok(uri.to_string());
    }

    print!("Password for {}@{}: ", url.username(), url.host_str().unwrap_or(""));
    io::stdout().flush()?;
    let password = rpassword::prompt_password("")?;
    if url.set_password(Some(&password)).is_err() {
        bail!("cannot attach a password to {uri}");
    }
    Ok(url.to_string())
}

fn report_status(uri: &str, status: Status) -> Result<()> {
    let target = ConnectionTarget::parse(uri)?;
    let path = target.remote_path;
    match status {
        Status::Created => println!("Created {path}"),
        Status::AlreadyExists => println!("{path} already exists"),
        Status::Conflict => bail!("{path} exists and is not a directory"),
    }
    Ok(())
}
