use super::evaluate;
use super::evaluate::Outcome;
use super::future::Population;
use super::improve;
use super::nexts;
use super::nexts::Next;
use super::nexts::Origin;
use crate::console::Emulator;
use crate::console::Input;
use crate::console::Memory;
use crate::console::Savestate;
use crate::motif::Motifs;
use crate::objective::Objectives;
use crate::remote::Helpers;
use crate::rng::Rng;
use crate::save::Snapshot;
use crate::settings::Settings;
use std::path::PathBuf;

/// a movenum plus the savestate taken there, allowing deterministic
/// rewind
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub movenum: usize,
    pub savestate: Savestate,
}

/// the search-and-commit loop. owns the master emulator, the rng, the
/// motif store, the futures population, and the movie; workers only
/// ever see value copies of emulator state, so ownership stays a tree
/// rooted here.
pub struct Engine<E: Emulator> {
    emulator: E,
    rng: Rng,
    objectives: Objectives,
    motifs: Motifs,
    population: Population,
    helpers: Helpers,
    settings: Settings,
    game: String,
    movie: Vec<Input>,
    subtitles: Vec<String>,
    memories: Vec<Memory>,
    checkpoints: Vec<Checkpoint>,
    watermark: usize,
    rounds: usize,
    rounds_since_backtrack: usize,
    stuck: usize,
    since_checkpoint: usize,
    record: Option<PathBuf>,
}

impl<E: Emulator + Sync> Engine<E> {
    pub fn new(
        game: &str,
        emulator: E,
        objectives: Objectives,
        motifs: Motifs,
        settings: Settings,
        seed: &[u8],
    ) -> anyhow::Result<Self> {
        settings.validate()?;
        anyhow::ensure!(!objectives.is_empty(), "no objectives to maximize");
        anyhow::ensure!(!motifs.is_empty(), "no motifs to sample");
        anyhow::ensure!(
            objectives.admits(&emulator.memory()),
            "objective token indexes past the end of RAM"
        );
        let motifs = motifs.tuned(
            settings.motif_alpha,
            settings.motif_min_frac,
            settings.motif_max_frac,
        );
        let helpers = match settings.helper_ports.is_empty() {
            true => Helpers::none(),
            false => Helpers::probe(&settings.helper_host, &settings.helper_ports),
        };
        let checkpoints = vec![Checkpoint {
            movenum: 0,
            savestate: emulator.save(),
        }];
        log::debug!(
            "engine for {} with {} local workers and {} helpers",
            game,
            num_cpus::get(),
            helpers.len(),
        );
        Ok(Self {
            rng: Rng::seeded(seed),
            population: Population::new(&settings),
            watermark: settings.watermark,
            game: game.to_string(),
            movie: Vec::new(),
            subtitles: Vec::new(),
            memories: Vec::new(),
            checkpoints,
            rounds: 0,
            rounds_since_backtrack: 0,
            stuck: 0,
            since_checkpoint: 0,
            record: None,
            emulator,
            objectives,
            motifs,
            helpers,
            settings,
        })
    }

    /// persist a snapshot at every checkpoint to this path
    pub fn recording(mut self, path: PathBuf) -> Self {
        self.record = Some(path);
        self
    }

    pub fn game(&self) -> &str {
        &self.game
    }
    pub fn movie(&self) -> &[Input] {
        &self.movie
    }
    pub fn subtitles(&self) -> &[String] {
        &self.subtitles
    }

    /// commit frames until the movie reaches the budget (0 runs
    /// without one)
    pub fn run(&mut self, frames: usize) -> anyhow::Result<()> {
        let bar = match frames {
            0 => None,
            n => Some(crate::progress(n)),
        };
        while frames == 0 || self.movie.len() < frames {
            self.round()?;
            if let Some(ref bar) = bar {
                bar.set_position(self.movie.len().min(frames) as u64);
            }
        }
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        Ok(())
    }

    /// one search round: either a backtrack that rewrites the tail of
    /// the movie, or the normal generate-score-commit cycle. either
    /// way exactly one candidate gets committed.
    pub fn round(&mut self) -> anyhow::Result<()> {
        self.rounds += 1;
        self.rounds_since_backtrack += 1;
        if self.due_for_backtrack() && self.backtrack()? {
            return Ok(());
        }
        self.population.populate(&self.motifs, &mut self.rng);
        let candidates = nexts::generate(
            self.population.futures(),
            &self.motifs,
            &mut self.rng,
            &self.settings,
        );
        self.select_and_commit(candidates)
    }

    /// score every candidate against the futures ensemble, commit the
    /// argmax, then let the winner's per-future totals drive length
    /// adaptation, working-set adaptation, pruning, and mutation
    fn select_and_commit(&mut self, candidates: Vec<Next>) -> anyhow::Result<()> {
        anyhow::ensure!(!candidates.is_empty(), "round with no candidates");
        let state = self.emulator.save();
        let outcomes = evaluate::evaluate(
            &self.emulator,
            &state,
            &candidates,
            self.population.futures(),
            &self.objectives,
            &self.helpers,
        );
        let choice = Self::select(&outcomes);
        let next = &candidates[choice];
        let outcome = &outcomes[choice];
        log::info!(
            "round {:>6} | {:>12} | score {:>+10.3} = {:+.3} + {:+.3} | futures {} | movie {}",
            self.rounds,
            next.explanation,
            outcome.ranking(),
            outcome.immediate,
            outcome.futsum(),
            self.population.nfutures(),
            self.movie.len() + next.inputs.len(),
        );
        log::debug!(
            "worst future {:+.3} best future {:+.3} motif mass {:.3}",
            outcome.worst(),
            outcome.best(),
            self.motifs.total(),
        );
        self.commit(next, outcome)?;
        match outcome.ranking() < 0. {
            true => self.stuck += 1,
            false => self.stuck = 0,
        }
        self.population.advance(next.inputs.len());
        self.population.adapt(&outcome.futures);
        self.population.cull(&outcome.futures, &mut self.rng);
        if self.since_checkpoint >= self.settings.checkpoint_every {
            self.checkpoint();
        }
        Ok(())
    }

    /// argmax over rankings, earliest index on ties. NaN ranks as
    /// negative infinity so a poisoned aggregation can never win.
    fn select(outcomes: &[Outcome]) -> usize {
        outcomes
            .iter()
            .enumerate()
            .fold(0, |best, (i, o)| match o.ranking() > outcomes[best].ranking() {
                true => i,
                false => best,
            })
    }

    /// append the winner to the movie frame by frame, credit its
    /// motif when it has one, and checkpoint on schedule
    fn commit(&mut self, next: &Next, outcome: &Outcome) -> anyhow::Result<()> {
        for &input in next.inputs.iter() {
            let memory = self.emulator.step(input);
            self.movie.push(input);
            self.subtitles.push(next.explanation.clone());
            self.memories.push(memory);
            self.since_checkpoint += 1;
        }
        if let Origin::Motif(id) = next.origin {
            let normalized = outcome.immediate / next.inputs.len().max(1) as f64;
            self.motifs.reweight(id, normalized);
        }
        Ok(())
    }

    /// record a rewind point and persist a snapshot. a checkpoint is
    /// also a clean resume point: the futures working set and the
    /// backtrack cadence counters restart here, so everything the
    /// snapshot does not persist is a deterministic function of what
    /// it does, and a resumed run replays the uninterrupted one
    /// byte for byte.
    fn checkpoint(&mut self) {
        self.since_checkpoint = 0;
        self.stuck = 0;
        self.rounds_since_backtrack = 0;
        self.population.reset();
        self.checkpoints.push(Checkpoint {
            movenum: self.movie.len(),
            savestate: self.emulator.save(),
        });
        if let Some(ref path) = self.record {
            match self.snapshot().write(path) {
                Ok(()) => log::debug!("snapshot at movenum {}", self.movie.len()),
                Err(e) => log::warn!("snapshot write failed ({}); continuing", e),
            }
        }
    }

    /// a streak of negative rounds triggers a backtrack early;
    /// otherwise one comes due on a fixed cadence
    fn due_for_backtrack(&self) -> bool {
        let streak =
            (self.settings.stuck_threshold_frac * self.settings.try_backtrack_every as f64) as usize;
        self.stuck >= streak.max(1)
            || self.rounds_since_backtrack >= self.settings.try_backtrack_every
    }

    /// rewind to an eligible checkpoint and let the improvement
    /// strategies compete against the span they would replace. commits
    /// through the normal selection path, so downstream bookkeeping is
    /// identical to any other round. returns false when there is
    /// nothing worth replaying.
    fn backtrack(&mut self) -> anyhow::Result<bool> {
        self.rounds_since_backtrack = 0;
        self.stuck = 0;
        let current = self.movie.len();
        // only the latest checkpoint is ever a rewind target: it is
        // the one snapshots persist, so a resumed run sees the same
        // candidate the uninterrupted run saw
        let checkpoint = self
            .checkpoints
            .last()
            .filter(|c| {
                c.movenum >= self.watermark
                    && c.movenum + self.settings.min_backtrack_distance <= current
            })
            .cloned();
        let Some(checkpoint) = checkpoint else {
            log::debug!("no checkpoint eligible for backtracking");
            return Ok(false);
        };
        let start = checkpoint.savestate.clone();
        let improveme = self.movie[checkpoint.movenum..].to_vec();
        let proposals = improve::replacements(
            &self.emulator,
            &start,
            &improveme,
            &self.motifs,
            &mut self.rng,
            &self.objectives,
        );
        let accepted = improve::vet(&self.emulator, &start, &improveme, proposals, &self.objectives);
        if accepted.is_empty() {
            log::debug!("no replacement improved on the span; keeping the movie");
            return Ok(false);
        }
        log::info!(
            "backtracking to movenum {} with {} replacements for {} frames",
            checkpoint.movenum,
            accepted.len(),
            improveme.len(),
        );
        self.emulator.load(&start);
        self.movie.truncate(checkpoint.movenum);
        self.subtitles.truncate(checkpoint.movenum);
        self.memories.truncate(checkpoint.movenum);
        self.checkpoints.retain(|c| c.movenum <= checkpoint.movenum);
        self.since_checkpoint = 0;
        let mut candidates = vec![Next::new(improveme, Origin::Improvise, "improveme")];
        candidates.extend(
            accepted
                .into_iter()
                .map(|good| Next::new(good.inputs, Origin::Improvise, good.strategy)),
        );
        self.select_and_commit(candidates)?;
        Ok(true)
    }

    /// capture everything a resume needs, including the rng bytes
    pub fn snapshot(&self) -> Snapshot {
        let checkpoint = self
            .checkpoints
            .last()
            .cloned()
            .expect("initial checkpoint always present");
        Snapshot {
            game: self.game.clone(),
            watermark: self.watermark as i32,
            movie: self.movie.clone(),
            subtitles: self.subtitles.clone(),
            memories: self.memories.clone(),
            checkpoint,
            motifs: self
                .motifs
                .weights()
                .map(|(w, inputs)| (w, inputs.to_vec()))
                .collect(),
            nfutures: self.population.nfutures() as u32,
            rng: self.rng.state(),
        }
    }

    /// rebuild an interrupted run from a snapshot: movie, memories,
    /// motif weights, working-set size, and the rng restored
    /// byte-exact, then the emulator replayed forward from the latest
    /// checkpoint so subsequent rounds reproduce the uninterrupted
    /// run. validation failures leave the caller to warm up cold.
    pub fn restore(mut self, snapshot: Snapshot) -> anyhow::Result<Self> {
        anyhow::ensure!(
            snapshot.game == self.game,
            "snapshot is for {} not {}",
            snapshot.game,
            self.game
        );
        anyhow::ensure!(snapshot.watermark >= 0, "negative watermark");
        anyhow::ensure!(
            snapshot.checkpoint.movenum <= snapshot.movie.len(),
            "checkpoint past end of movie"
        );
        anyhow::ensure!(
            snapshot.subtitles.len() == snapshot.movie.len(),
            "subtitles misaligned with movie"
        );
        anyhow::ensure!(
            snapshot.memories.len() == snapshot.movie.len(),
            "memories misaligned with movie"
        );
        let weights = {
            anyhow::ensure!(snapshot.motifs.len() == self.motifs.len(), "motif set changed");
            for ((_, ours), (_, theirs)) in self.motifs.weights().zip(snapshot.motifs.iter()) {
                anyhow::ensure!(ours == theirs.as_slice(), "motif inputs changed");
            }
            snapshot.motifs.iter().map(|(w, _)| *w).collect::<Vec<_>>()
        };
        self.motifs.restore(&weights)?;
        self.rng = Rng::restore(&snapshot.rng)?;
        self.population.set_nfutures(snapshot.nfutures as usize);
        self.watermark = snapshot.watermark as usize;
        self.emulator.load(&snapshot.checkpoint.savestate);
        for &input in snapshot.movie[snapshot.checkpoint.movenum..].iter() {
            self.emulator.step(input);
        }
        anyhow::ensure!(
            self.objectives.admits(&self.emulator.memory()),
            "objective token indexes past the end of RAM"
        );
        if let Some(last) = snapshot.memories.last() {
            anyhow::ensure!(
                *last == self.emulator.memory(),
                "replayed memory diverges from snapshot"
            );
        }
        self.since_checkpoint = snapshot.movie.len() - snapshot.checkpoint.movenum;
        self.movie = snapshot.movie;
        self.subtitles = snapshot.subtitles;
        self.memories = snapshot.memories;
        self.checkpoints = vec![snapshot.checkpoint];
        log::info!(
            "resumed {} at movenum {} from snapshot",
            self.game,
            self.movie.len()
        );
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Machine;
    use crate::motif::Motif;
    use crate::objective::Objective;
    use crate::objective::Token;

    fn objectives() -> Objectives {
        Objectives::from(vec![
            // scroll progress, score, and x position all increasing
            Objective::new(10., vec![Token::new(3, false, false), Token::new(2, false, false)]),
            Objective::new(2., vec![Token::new(4, false, false)]),
            Objective::new(0.1, vec![Token::new(0, false, false)]),
            // health decreasing is bad
            Objective::new(5., vec![Token::new(5, false, false)]),
        ])
    }

    fn motifs() -> Motifs {
        Motifs::from(vec![
            Motif::new(vec![Input::RIGHT; 10], 1.),
            Motif::new(vec![Input::RIGHT.press(Input::A); 10], 1.),
            Motif::new(vec![Input::LEFT; 5], 1.),
            Motif::new(
                vec![Input::UP, Input::UP, Input::RIGHT, Input::RIGHT, Input::RIGHT],
                1.,
            ),
            Motif::new(vec![Input::A, Input(0), Input::A, Input(0)], 1.),
        ])
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.min_nexts = 4;
        settings.max_nexts = 8;
        settings.backfill_count = 6;
        settings.min_futures = 4;
        settings.max_futures = 10;
        settings.min_future_length = 15;
        settings.max_future_length = 40;
        settings.drop_futures = 1;
        settings.mutate_futures = 1;
        settings.checkpoint_every = 120;
        settings.try_backtrack_every = 5;
        settings.min_backtrack_distance = 50;
        settings
    }

    fn engine(seed: &[u8]) -> Engine<Machine> {
        Engine::new(
            "toy cart",
            Machine::boot("toy cart"),
            objectives(),
            motifs(),
            settings(),
            seed,
        )
        .unwrap()
    }

    #[test]
    fn fixed_seed_means_identical_movies() {
        let mut a = engine(b"determinism");
        let mut b = engine(b"determinism");
        a.run(200).unwrap();
        b.run(200).unwrap();
        assert!(!a.movie().is_empty());
        assert_eq!(a.movie(), b.movie());
        assert_eq!(a.subtitles(), b.subtitles());
    }

    #[test]
    fn distinct_seeds_diverge() {
        let mut a = engine(b"seed one");
        let mut b = engine(b"seed two");
        a.run(200).unwrap();
        b.run(200).unwrap();
        assert_ne!(a.movie(), b.movie());
    }

    #[test]
    fn the_movie_makes_progress() {
        let mut engine = engine(b"progress");
        engine.run(400).unwrap();
        let first = &engine.memories[0];
        let last = engine.memories.last().unwrap();
        // scroll position strictly advanced under the scroll objective
        let begin = u16::from_le_bytes([first[2], first[3]]);
        let end = u16::from_le_bytes([last[2], last[3]]);
        assert!(end > begin || last[0] > first[0]);
    }

    #[test]
    fn rounds_commit_exactly_one_candidate() {
        let mut engine = engine(b"transaction");
        let before = engine.movie().len();
        engine.round().unwrap();
        let committed = engine.movie().len() - before;
        assert!(committed > 0);
        assert_eq!(engine.subtitles().len(), engine.movie().len());
        assert_eq!(engine.memories.len(), engine.movie().len());
    }

    #[test]
    fn checkpoints_land_on_schedule() {
        let mut engine = engine(b"checkpoints");
        engine.run(200).unwrap();
        assert!(engine.checkpoints.len() > 1);
        for pair in engine.checkpoints.windows(2) {
            assert!(pair[1].movenum > pair[0].movenum);
            assert!(pair[1].movenum - pair[0].movenum >= engine.settings.checkpoint_every);
        }
    }

    #[test]
    fn snapshot_resume_reproduces_the_uninterrupted_run() {
        let path = std::env::temp_dir().join(format!("joyride-resume-{}.pfstate", std::process::id()));
        let mut reference = engine(b"resume").recording(path.clone());
        reference.run(300).unwrap();
        // the interrupted run starts over from the last snapshot on
        // disk and must replay into the exact same movie
        let snapshot = Snapshot::read(&path).unwrap();
        assert!(snapshot.movie.len() < reference.movie().len());
        let mut resumed = engine(b"a different seed entirely").restore(snapshot).unwrap();
        resumed.run(300).unwrap();
        assert_eq!(resumed.movie(), reference.movie());
        assert_eq!(resumed.subtitles(), reference.subtitles());
        for _ in 0..5 {
            reference.round().unwrap();
            resumed.round().unwrap();
        }
        assert_eq!(resumed.movie(), reference.movie());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn foreign_snapshots_are_rejected() {
        let mut reference = engine(b"mismatch");
        reference.run(60).unwrap();
        let mut snapshot = reference.snapshot();
        snapshot.game = "some other cart".to_string();
        assert!(engine(b"mismatch").restore(snapshot).is_err());
    }

    #[test]
    fn nan_never_wins_selection() {
        let outcomes = vec![
            Outcome {
                immediate: f64::NAN,
                futures: vec![],
            },
            Outcome {
                immediate: -100.,
                futures: vec![],
            },
        ];
        assert_eq!(Engine::<Machine>::select(&outcomes), 1);
    }
}
