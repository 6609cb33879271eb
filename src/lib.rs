pub mod console;
pub mod motif;
pub mod objective;
pub mod remote;
pub mod rng;
pub mod save;
pub mod search;
pub mod settings;

/// dimensional analysis types
type Magnitude = f64;
type Weight = f64;

// candidate generation parameters
const NEXT_LEN: usize = 10;
const MIN_NEXTS: usize = 16;
const MAX_NEXTS: usize = 40;
const BACKFILL_COUNT: usize = 16;

// futures population parameters
const MIN_FUTURES: usize = 10;
const MAX_FUTURES: usize = 80;
const MIN_FUTURE_LENGTH: usize = 50;
const MAX_FUTURE_LENGTH: usize = 800;
const DROP_FUTURES: usize = 2;
const MUTATE_FUTURES: usize = 2;
const NFUTURES_STEP_FRAC: f64 = 0.05;
const DESIRED_LENGTH_STEP_FRAC: f64 = 0.10;

// motif reweighting parameters
const MOTIF_ALPHA: f64 = 0.8;
const MOTIF_MAX_FRAC: f64 = 0.1;
const MOTIF_MIN_FRAC: f64 = 0.00001;
const MOTIF_CLIP_ITERATIONS: usize = 64;

// backtracking parameters
const TRY_BACKTRACK_EVERY: usize = 18;
const MIN_BACKTRACK_DISTANCE: usize = 100;
const STUCK_THRESHOLD_FRAC: f64 = 0.5;
const OPPOSITE_SPANS: usize = 3;
const ABLATION_CANDIDATES: usize = 8;
const CHOP_CANDIDATES: usize = 8;
const RANDOM_CANDIDATES: usize = 8;

// persistence parameters. checkpoints double as clean resume points,
// so the window holds a few full backtrack cadences.
const CHECKPOINT_EVERY: usize = 500;

// distributed helper parameters
const HELPER_TIMEOUT_MS: u64 = 2_000;

/// trait for random generation, mainly (strictly?) for testing
pub trait Arbitrary {
    fn random() -> Self;
}

/// progress bar
pub fn progress(n: usize) -> indicatif::ProgressBar {
    let tick = std::time::Duration::from_secs(60);
    let style = "{spinner:.cyan} {elapsed} ~ {percent:>3}% {wide_bar:.cyan}";
    let style = indicatif::ProgressStyle::with_template(style).unwrap();
    let progress = indicatif::ProgressBar::new(n as u64);
    progress.set_style(style);
    progress.enable_steady_tick(tick);
    progress
}

/// initialize logging
pub fn init() {
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time)).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}
