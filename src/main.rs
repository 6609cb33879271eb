use clap::Parser;
use joyride::console::Machine;
use joyride::motif::Motifs;
use joyride::objective::Objectives;
use joyride::save::Snapshot;
use joyride::search::Engine;
use joyride::settings::Settings;
use std::path::PathBuf;

/// drive the toy console toward mined objectives, committing input
/// frames forever (or until the frame budget runs out)
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// cartridge name; decides the toy console's power-on state
    #[arg(long, default_value = "default")]
    game: String,

    /// objectives file mined from example play
    #[arg(long)]
    objectives: PathBuf,

    /// motifs file mined from example play
    #[arg(long)]
    motifs: PathBuf,

    /// optional TOML settings overriding the built-in tuning
    #[arg(long)]
    settings: Option<PathBuf>,

    /// snapshot path for checkpointing and resume
    #[arg(long, default_value = "joyride.pfstate")]
    snapshot: PathBuf,

    /// seed string for the keystream rng
    #[arg(long, default_value = "joyride")]
    seed: String,

    /// stop after this many committed frames (0 = run forever)
    #[arg(long, default_value_t = 0)]
    frames: usize,

    /// host helper duty on this port instead of searching
    #[arg(long)]
    serve: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    joyride::init();
    let args = Args::parse();
    let settings = match args.settings {
        Some(ref path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let objectives = Objectives::load(&args.objectives)?;
    let motifs = Motifs::load(&args.motifs)?;
    let machine = Machine::boot(&args.game);

    if let Some(port) = args.serve {
        let listener = std::net::TcpListener::bind(("0.0.0.0", port))?;
        joyride::remote::serve(listener, machine, objectives);
        return Ok(());
    }

    let fresh = || {
        Engine::new(
            &args.game,
            machine.clone(),
            objectives.clone(),
            motifs.clone(),
            settings.clone(),
            args.seed.as_bytes(),
        )
    };
    let engine = match args.snapshot.exists() {
        false => {
            log::info!("no snapshot at {}; starting fresh", args.snapshot.display());
            fresh()?
        }
        true => match Snapshot::read(&args.snapshot).and_then(|snapshot| fresh()?.restore(snapshot))
        {
            Ok(engine) => engine,
            Err(e) => {
                log::warn!("snapshot rejected ({}); warming up from cold", e);
                fresh()?
            }
        },
    };
    let mut engine = engine.recording(args.snapshot.clone());
    engine.run(args.frames)
}
