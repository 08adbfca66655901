use anyhow::{Context, Result, bail};
use bucketfs::cadapter::client::ObjectBackend;
use bucketfs::cadapter::localfs::LocalFsBackend;
use bucketfs::cadapter::s3::{S3Backend, S3Config, S3Credentials};
use bucketfs::{BucketFs, FileAttr, FileSystem, FsConfig};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Browse an object storage bucket as a file tree", long_about = None)]
struct Args {
    /// Serve objects from this local directory instead of S3
    #[arg(long, env = "BUCKETFS_LOCAL_ROOT", conflicts_with = "bucket")]
    local_root: Option<PathBuf>,

    /// S3 bucket name
    #[arg(long, env = "BUCKETFS_BUCKET")]
    bucket: Option<String>,

    /// S3 region
    #[arg(long, env = "BUCKETFS_REGION")]
    region: Option<String>,

    /// Custom S3 endpoint (MinIO, rustfs, ...)
    #[arg(long, env = "BUCKETFS_ENDPOINT")]
    endpoint: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long, env = "BUCKETFS_FORCE_PATH_STYLE")]
    force_path_style: bool,

    #[arg(long, env = "BUCKETFS_ACCESS_KEY_ID", default_value = "")]
    access_key_id: String,

    #[arg(long, env = "BUCKETFS_SECRET_ACCESS_KEY", default_value = "", hide_env_values = true)]
    secret_access_key: String,

    #[arg(long, env = "BUCKETFS_SESSION_TOKEN", hide_env_values = true)]
    session_token: Option<String>,

    /// Key prefix the tree is rooted at
    #[arg(long, env = "BUCKETFS_PREFIX", default_value = "")]
    prefix: String,

    /// Keys requested per listing call
    #[arg(long, default_value_t = 1000)]
    page_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List entries under a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
    },
    /// Show metadata of a path
    Stat { path: String },
    /// Print a whole file to stdout
    Cat { path: String },
    /// Print bytes [start, end) of a file using a single ranged fetch
    GetRange { path: String, start: u64, end: u64 },
    /// Upload a local file, or stdin when no source is given
    Put { path: String, source: Option<PathBuf> },
    /// Delete a file
    Rm { path: String },
    /// Accepted for tooling compatibility; object stores have no directories
    Mkdir { path: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = FsConfig {
        prefix: args.prefix.clone(),
        list_page_size: args.page_size,
        autofetch: true,
    };

    if let Some(root) = &args.local_root {
        return run(BucketFs::new(LocalFsBackend::new(root), config), args.command).await;
    }

    let Some(bucket) = args.bucket else {
        bail!("either --local-root or --bucket is required");
    };
    let backend = S3Backend::with_config(S3Config {
        bucket,
        region: args.region,
        endpoint: args.endpoint,
        force_path_style: args.force_path_style,
        credentials: S3Credentials {
            access_key_id: args.access_key_id,
            secret_access_key: args.secret_access_key,
            session_token: args.session_token,
        },
        ..Default::default()
    })
    .context("configuring S3 backend")?;
    run(BucketFs::new(backend, config), args.command).await
}

async fn run<B: ObjectBackend>(fs: BucketFs<B>, command: Command) -> Result<()> {
    debug!("using {fs}");
    let mut out = io::stdout();
    match command {
        Command::Ls { path } => {
            for entry in fs.read_dir(&path).await? {
                writeln!(out, "{}", format_attr(&entry))?;
            }
        }
        Command::Stat { path } => {
            writeln!(out, "{}", format_attr(&fs.stat(&path).await?))?;
        }
        Command::Cat { path } => {
            let mut file = fs.open(&path).await?;
            debug!(key = file.key(), size = file.len(), "streaming object");
            io::copy(&mut file, &mut out)?;
        }
        Command::GetRange { path, start, end } => {
            if start >= end {
                bail!("empty range {start}-{end}");
            }
            let mut reader = fs.open_range_cached(&path);
            reader.fetch(start, end).await?;
            let mut buf = vec![0u8; (end - start) as usize];
            let n = reader.read_full(&mut buf).await?;
            out.write_all(&buf[..n])?;
            reader.close();
        }
        Command::Put { path, source } => {
            let data = match source {
                Some(src) => tokio::fs::read(&src)
                    .await
                    .with_context(|| format!("reading {}", src.display()))?,
                None => {
                    let mut data = Vec::new();
                    io::stdin().read_to_end(&mut data)?;
                    data
                }
            };
            let mut writer = fs.create(&path).await?;
            writer.write_all(&data)?;
            writer.close().await?;
        }
        Command::Rm { path } => fs.remove(&path).await?,
        Command::Mkdir { path } => fs.mkdir_all(&path).await?,
    }
    out.flush()?;
    Ok(())
}

fn format_attr(attr: &FileAttr) -> String {
    let kind = if attr.is_dir() { 'd' } else { '-' };
    let mtime: DateTime<Local> = attr.mtime.into();
    format!(
        "{kind} {:>12} {} {}",
        attr.size,
        mtime.format("%Y-%m-%d %H:%M:%S"),
        attr.name
    )
}
