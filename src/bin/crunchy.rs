use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use camino::Utf8PathBuf;
use clap::Parser;
use miette::{IntoDiagnostic, WrapErr};
use tracing::{error, info};

use crunchy::app::App;
use crunchy::archive::ArchiveHttpClient;
use crunchy::config::{
    ConfigLoader, DEFAULT_CONFIG_PATH, DEFAULT_DOWNLOAD_DIR, DEFAULT_MAX_ITEMS,
    DEFAULT_MEDIA_GLOB, DEFAULT_RETRIES, DEFAULT_WORKERS, LEDGER_FILE_NAME, RunSettings,
    expand_home,
};
use crunchy::domain::TrackingStrategy;
use crunchy::error::CrunchyError;
use crunchy::logging;
use crunchy::output::{OutputMode, print_summary};
use crunchy::store::Library;
use crunchy::tracking::Tracker;

const EXAMPLES: &str = "\
Examples:
  crunchy                          # default config and directory
  crunchy -c custom.yaml           # custom config file
  crunchy -d /mnt/music            # custom download directory
  crunchy -n 10 -w 8               # 10 shows per collection, 8 parallel workers
  crunchy --dry-run                # preview what would be fetched
  crunchy --tracking scan          # treat existing directories as the record";

#[derive(Parser)]
#[command(name = "crunchy")]
#[command(about = "Fetch the latest shows of configured Internet Archive collections")]
#[command(version, author, after_help = EXAMPLES)]
struct Cli {
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, help = "YAML file with a `collections` list")]
    config: Utf8PathBuf,

    #[arg(short, long, default_value = DEFAULT_DOWNLOAD_DIR, help = "Base directory for fetched media")]
    download_dir: String,

    #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_ITEMS, help = "Newest items to consider per collection")]
    max_shows: usize,

    #[arg(short, long, default_value_t = DEFAULT_WORKERS, help = "Parallel fetch workers")]
    workers: usize,

    #[arg(long, help = "Report what would be fetched without writing anything")]
    dry_run: bool,

    #[arg(short, long, help = "Debug output on the console")]
    verbose: bool,

    #[arg(long, value_enum, default_value_t = TrackingStrategy::Ledger, help = "How already-fetched items are recognised")]
    tracking: TrackingStrategy,

    #[arg(long, help = "Ledger file [default: <log-dir>/downloaded_shows.json]")]
    ledger: Option<Utf8PathBuf>,

    #[arg(long, help = "Log directory [default: <download-dir>/logs]")]
    log_dir: Option<Utf8PathBuf>,

    #[arg(long, default_value = DEFAULT_MEDIA_GLOB, help = "Only files matching this pattern are transferred")]
    media_glob: String,

    #[arg(long, default_value_t = DEFAULT_RETRIES, help = "Retries per request during a transfer")]
    retries: u32,

    #[arg(long, help = "Print the run summary as JSON on stdout")]
    json: bool,

    #[arg(long, help = "Exit non-zero when any fetch failed")]
    fail_on_error: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<CrunchyError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CrunchyError) -> u8 {
    match error {
        CrunchyError::MissingConfig(_)
        | CrunchyError::ConfigRead(_)
        | CrunchyError::ConfigParse(_)
        | CrunchyError::NoCollections
        | CrunchyError::InvalidCollection(_)
        | CrunchyError::InvalidSetting(_) => 2,
        CrunchyError::FetchFailures(_) => 4,
        CrunchyError::Interrupted => 130,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let settings = build_settings(&cli)?;

    let log_guard = logging::init(&settings.log_dir, cli.verbose);
    if let Some(path) = log_guard.log_file() {
        info!(log_file = %path, "logging to file");
    }

    settings.validate()?;
    let config = ConfigLoader::resolve(&cli.config).inspect_err(|err| {
        error!(config = %cli.config, error = %err, "fatal configuration error");
    })?;
    info!(
        count = config.collections.len(),
        "loaded collections from config"
    );

    Library::new(settings.download_dir.clone()).ensure_root()?;
    info!(download_dir = %settings.download_dir, "download directory");
    info!(
        max_shows = settings.max_items,
        workers = settings.workers,
        tracking = %settings.tracking,
        media_glob = %settings.media_glob,
        "run settings"
    );
    if settings.dry_run {
        info!("dry run mode, nothing will be fetched");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(Arc::clone(&shutdown))?;

    let archive = ArchiveHttpClient::new()?.with_shutdown(Arc::clone(&shutdown));
    let tracker = Tracker::from_settings(&settings);
    let app = App::new(archive, tracker, &settings)?.with_shutdown(shutdown);

    let summary = app.run(&config.collections);
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    print_summary(mode, &summary).into_diagnostic()?;

    if summary.interrupted {
        return Err(CrunchyError::Interrupted.into());
    }
    if summary.has_failures() && cli.fail_on_error {
        return Err(CrunchyError::FetchFailures(summary.failed).into());
    }
    Ok(())
}

fn build_settings(cli: &Cli) -> Result<RunSettings, CrunchyError> {
    let mut settings = RunSettings::new(expand_home(&cli.download_dir)?);
    if let Some(log_dir) = &cli.log_dir {
        settings.log_dir = log_dir.clone();
        settings.ledger_path = log_dir.join(LEDGER_FILE_NAME);
    }
    if let Some(ledger) = &cli.ledger {
        settings.ledger_path = ledger.clone();
    }
    settings.max_items = cli.max_shows;
    settings.workers = cli.workers;
    settings.dry_run = cli.dry_run;
    settings.media_glob = cli.media_glob.clone();
    settings.retries = cli.retries;
    settings.tracking = cli.tracking;
    Ok(settings)
}

fn install_interrupt_handler(flag: Arc<AtomicBool>) -> miette::Result<()> {
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            eprintln!("\nSecond interrupt, exiting immediately.");
            std::process::exit(130);
        }
        eprintln!("\nInterrupt received, finishing in-flight fetches (Ctrl-C again to quit now)...");
    })
    .into_diagnostic()
    .wrap_err("failed to set interrupt handler")
}
