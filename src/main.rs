use clap::{Parser, Subcommand};
use face_emoji::detection::SidecarDetector;
use face_emoji::handler::{self, HandlerError, Services};
use face_emoji::imaging::{EmojiAssets, RustBackend};
use face_emoji::storage::FsStore;
use face_emoji::{config, event, output};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "face-emoji")]
#[command(about = "Cover every face in uploaded photos with an emoji matching its emotion")]
#[command(long_about = "\
Cover every face in uploaded photos with an emoji matching its emotion

A local directory plays the object store. Detection results are read from
sidecar files saved next to each image:

  bucket/
  ├── team/photo.jpg               # Uploaded image
  ├── team/photo.jpg.faces.json    # Saved DetectFaces response
  └── processed/photo.jpg          # Output (written by this tool)

Each face gets the emoji for its most confident emotion, resized to the
face box plus padding. Images without faces are skipped.

Run 'face-emoji gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory acting as the object store
    #[arg(long, default_value = "bucket", global = true)]
    bucket: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handle an upload notification (JSON file)
    Handle {
        /// Path to the event JSON
        event: PathBuf,
    },
    /// Process the given keys directly, skipping event filtering
    Process {
        /// Object keys relative to the bucket
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let app_config = match &cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        _ => config::load_config(cli.config.as_deref())?,
    };

    let keys = match cli.command {
        Command::Handle { event: path } => {
            let content = std::fs::read_to_string(path)?;
            let event = event::parse_event(&content)?;
            event::images_from_event(&event, &app_config)
        }
        Command::Process { keys } => keys,
        Command::GenConfig => return Ok(()),
    };

    init_thread_pool(&app_config.processing);

    let assets = EmojiAssets::new(&app_config.overlay.assets_dir);
    let missing = assets.missing();
    if !missing.is_empty() {
        let labels: Vec<&str> = missing.iter().map(|e| e.as_str()).collect();
        eprintln!(
            "warning: no emoji in {} for: {}",
            assets.dir().display(),
            labels.join(", ")
        );
    }

    let backend = RustBackend::new();
    let store = FsStore::new(&cli.bucket);
    let detector = SidecarDetector::new(&cli.bucket);
    let services = Services {
        backend: &backend,
        store: &store,
        detector: &detector,
        assets: &assets,
    };

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_process_event(&event);
        }
    });
    let result = handler::handle_keys(&keys, &services, &app_config, Some(tx));
    printer.join().ok();

    match result {
        Ok(summary) => {
            output::print_batch_summary(&summary);
            Ok(())
        }
        Err(HandlerError::Batch(batch)) => {
            output::print_batch_error(&batch);
            Err(batch.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_workers(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
