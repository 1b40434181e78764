use clap::{ArgAction, Parser};
use compose_scrub::{
    scrub_file, scrub_streaming, DigestAlgorithm, ScrubError, ScrubReport, Scrubber,
    TrailingNewline, MARKER, TARGET_PATH,
};
use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "compose-scrub",
    version,
    about = "Strip connection-string lines from docker-compose.yml blobs during a history rewrite",
    after_help = "Examples:\n  \
        compose-scrub docker-compose.yml                          # Print scrubbed file\n  \
        compose-scrub --in-place docker-compose.yml               # Rewrite file (tree-filter hosts)\n  \
        git cat-file blob HEAD:docker-compose.yml | compose-scrub --path docker-compose.yml -\n  \
        compose-scrub --digest sha256 docker-compose.yml out.yml  # Compute SHA-256 checksum"
)]
struct Cli {
    /// Blob content to scrub (or - for stdin)
    input: PathBuf,

    /// Optional output file (defaults to stdout)
    #[arg(conflicts_with = "in_place")]
    output: Option<PathBuf>,

    /// Logical path of the blob in the tree (defaults to INPUT without leading ./)
    #[arg(long)]
    path: Option<OsString>,

    /// Only blobs at exactly this path are scrubbed
    #[arg(long, env = "COMPOSE_SCRUB_TARGET", default_value = TARGET_PATH)]
    target: String,

    /// Lines containing this substring are removed
    #[arg(long, env = "COMPOSE_SCRUB_MARKER", default_value = MARKER)]
    marker: String,

    /// Keep a trailing newline instead of dropping it
    #[arg(long)]
    keep_trailing_newline: bool,

    /// Rewrite INPUT in place
    #[arg(long)]
    in_place: bool,

    /// Compute checksum of the scrubbed output (sha256, sha512)
    #[arg(long)]
    digest: Option<DigestAlgorithm>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so stdout stays reserved for blob content
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> compose_scrub::Result<()> {
    let trailing_newline = if cli.keep_trailing_newline {
        TrailingNewline::Preserve
    } else {
        TrailingNewline::Drop
    };
    let scrubber =
        Scrubber::new(cli.target.as_str(), cli.marker.as_str())?.with_trailing_newline(trailing_newline);

    let from_stdin = cli.input.as_os_str() == "-";
    let logical_path = match (&cli.path, from_stdin) {
        (Some(path), _) => path.clone(),
        (None, false) => default_logical_path(&cli.input),
        (None, true) => {
            return Err(ScrubError::InvalidConfig {
                details: "--path is required when reading from stdin".to_string(),
            })
        }
    };
    let logical_path = logical_path.as_encoded_bytes();

    if names_target_elsewhere(&cli.input, logical_path, &scrubber) {
        warn!(
            "{} is named like the target but its logical path is not {}; pass --path to scrub it",
            cli.input.display(),
            scrubber.target_path()
        );
    }

    if cli.in_place {
        if from_stdin {
            return Err(ScrubError::InvalidConfig {
                details: "--in-place cannot be used with stdin".to_string(),
            });
        }
        let report = scrub_file(&cli.input, logical_path, &scrubber, cli.digest)?;
        log_report(&report, cli.digest);
        if report.changed {
            info!("Written to {}", cli.input.display());
        }
        return Ok(());
    }

    let input: Box<dyn io::Read> = if from_stdin {
        Box::new(io::stdin().lock())
    } else {
        Box::new(File::open(&cli.input).map_err(|e| ScrubError::Io {
            path: cli.input.clone(),
            source: e,
        })?)
    };

    if let Some(output_path) = &cli.output {
        let mut output = File::create(output_path).map_err(|e| ScrubError::Io {
            path: output_path.clone(),
            source: e,
        })?;
        let report = scrub_streaming(input, &mut output, logical_path, &scrubber, cli.digest)?;
        log_report(&report, cli.digest);
        info!("Written to {}", output_path.display());
    } else {
        let mut output = io::stdout().lock();
        let report = scrub_streaming(input, &mut output, logical_path, &scrubber, cli.digest)?;
        log_report(&report, cli.digest);
    }

    Ok(())
}

/// INPUT as typed, minus any leading `./` components
fn default_logical_path(input: &Path) -> OsString {
    let mut components = input.components();
    while components.clone().next() == Some(Component::CurDir) {
        components.next();
    }
    components.as_path().as_os_str().to_owned()
}

/// True when INPUT's file name is the target but the logical path misses it
fn names_target_elsewhere(input: &Path, logical_path: &[u8], scrubber: &Scrubber) -> bool {
    let file_name_is_target = input
        .file_name()
        .is_some_and(|name| name == scrubber.target_path());
    file_name_is_target && !scrubber.matches(logical_path).unwrap_or(false)
}

fn log_report(report: &ScrubReport, digest_algorithm: Option<DigestAlgorithm>) {
    if report.rewritten {
        info!(
            lines_removed = report.lines_removed,
            bytes_in = report.bytes_in,
            bytes_out = report.bytes_out,
            "Scrubbed blob"
        );
    } else {
        info!("Path not targeted, blob passed through unchanged");
    }

    if let (Some(algorithm), Some(checksum)) = (digest_algorithm, &report.digest) {
        info!("{}: {}", algorithm.name(), checksum);
    }
}
