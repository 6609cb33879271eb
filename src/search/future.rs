use super::splice;
use crate::Magnitude;
use crate::console::Input;
use crate::motif::Motifs;
use crate::rng::Rng;
use crate::settings::Settings;

/// a longer input plan used to forecast the value of committing a
/// candidate. futures persist across rounds: each commit consumes
/// their prefix, population tops them back up, and adaptation tunes
/// how far ahead each one looks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Future {
    pub inputs: Vec<Input>,
    pub weighted: bool,
    pub desired: usize,
}

impl AsRef<[Input]> for Future {
    fn as_ref(&self) -> &[Input] {
        &self.inputs
    }
}

impl Future {
    /// extend with motif draws until the plan reaches its desired
    /// length, truncating the final draw's overhang
    fn refill(&mut self, motifs: &Motifs, rng: &mut Rng) {
        while self.inputs.len() < self.desired {
            let id = motifs.sample(rng, self.weighted);
            self.inputs.extend_from_slice(motifs.get(id).inputs());
        }
        self.inputs.truncate(self.desired);
    }
}

/// the working set of futures plus its adaptive target size. one
/// record per future: anything scored per-future lives in the round's
/// outcome vectors and dies with the round, so there is no parallel
/// array to shear out of alignment across prune and mutate.
#[derive(Debug, Clone)]
pub struct Population {
    futures: Vec<Future>,
    nfutures: usize,
    min_futures: usize,
    max_futures: usize,
    min_length: usize,
    max_length: usize,
    drop_futures: usize,
    mutate_futures: usize,
    nfutures_step: f64,
    length_step: f64,
}

impl Population {
    pub fn new(settings: &Settings) -> Self {
        Self {
            futures: Vec::new(),
            nfutures: (settings.min_futures + settings.max_futures) / 2,
            min_futures: settings.min_futures,
            max_futures: settings.max_futures,
            min_length: settings.min_future_length,
            max_length: settings.max_future_length,
            drop_futures: settings.drop_futures,
            mutate_futures: settings.mutate_futures,
            nfutures_step: settings.nfutures_step_frac,
            length_step: settings.desired_length_step_frac,
        }
    }

    pub fn futures(&self) -> &[Future] {
        &self.futures
    }
    pub fn len(&self) -> usize {
        self.futures.len()
    }
    pub fn is_empty(&self) -> bool {
        self.futures.is_empty()
    }
    pub fn nfutures(&self) -> usize {
        self.nfutures
    }

    /// snapshot resume clamps the restored target into bounds
    pub fn set_nfutures(&mut self, n: usize) {
        self.nfutures = n.clamp(self.min_futures, self.max_futures);
    }

    /// discard the working set. checkpoints do this so that the whole
    /// population is a deterministic function of the persisted state:
    /// a resumed run regenerates exactly the futures the uninterrupted
    /// run would have.
    pub fn reset(&mut self) {
        self.futures.clear();
    }

    /// drop the prefix that a commit just consumed
    pub fn advance(&mut self, frames: usize) {
        for future in self.futures.iter_mut() {
            future.inputs.drain(..frames.min(future.inputs.len()));
        }
    }

    /// top every future back up to its desired length and grow the
    /// set to the target size. fresh futures draw a uniform desired
    /// length, a coin-flip sampling mode, and motif-concatenated
    /// inputs; exact input duplicates are retried a few times since
    /// identical futures forecast nothing extra.
    pub fn populate(&mut self, motifs: &Motifs, rng: &mut Rng) {
        for future in self.futures.iter_mut() {
            future.refill(motifs, rng);
        }
        let mut retries = 0;
        while self.futures.len() < self.nfutures {
            let mut future = Future {
                inputs: Vec::new(),
                weighted: rng.bernoulli(0.5),
                desired: rng.between(self.min_length, self.max_length),
            };
            future.refill(motifs, rng);
            let duplicate = self.futures.iter().any(|f| f.inputs == future.inputs);
            if duplicate && retries < 3 {
                retries += 1;
                continue;
            }
            retries = 0;
            self.futures.push(future);
        }
        self.futures.truncate(self.nfutures);
    }

    /// per-future length adaptation plus working-set adaptation, from
    /// the chosen next's per-future totals. profitable futures look
    /// 10% further ahead, unprofitable ones pull back 10%; a mostly
    /// unprofitable round grows the set 5%, a mostly profitable one
    /// shrinks it 5%.
    pub fn adapt(&mut self, totals: &[Magnitude]) {
        assert!(totals.len() == self.futures.len(), "totals misaligned with futures");
        for (future, &total) in self.futures.iter_mut().zip(totals) {
            let stretched = (future.desired as f64 * (1. + self.length_step)) as usize;
            let shrunken = (future.desired as f64 * (1. - self.length_step)) as usize;
            future.desired = match total > 0. {
                true => stretched.max(future.desired + 1),
                false => shrunken.min(future.desired.saturating_sub(1)),
            }
            .clamp(self.min_length, self.max_length);
        }
        let profitable = totals.iter().filter(|&&t| t > 0.).count();
        let p = profitable as f64 / self.nfutures.max(1) as f64;
        if p < 0.4 {
            let grown = (self.nfutures as f64 * (1. + self.nfutures_step)) as usize;
            self.nfutures = grown.max(self.nfutures + 1).min(self.max_futures);
        } else if p > 0.6 {
            let shrunk = (self.nfutures as f64 * (1. - self.nfutures_step)) as usize;
            self.nfutures = shrunk
                .min(self.nfutures.saturating_sub(1))
                .max(self.min_futures);
        }
    }

    /// drop the weakest futures and clone mutants of the single best.
    /// the weakest drop_futures + mutate_futures totals go first
    /// (ties broken by ascending index), then the best survivor is
    /// duplicated mutate_futures times with random edits. totals are
    /// swap-erased in lockstep with the futures they score.
    pub fn cull(&mut self, totals: &[Magnitude], rng: &mut Rng) {
        assert!(totals.len() == self.futures.len(), "totals misaligned with futures");
        let mut totals = totals.to_vec();
        for _ in 0..(self.drop_futures + self.mutate_futures).min(self.futures.len()) {
            let weakest = Self::weakest(&totals);
            self.futures.swap_remove(weakest);
            totals.swap_remove(weakest);
        }
        if let Some(best) = Self::strongest(&totals) {
            for _ in 0..self.mutate_futures {
                let mutant = self.mutate(self.futures[best].clone(), rng);
                self.futures.push(mutant);
            }
        }
    }

    /// index of the minimum total, earliest index on ties
    fn weakest(totals: &[Magnitude]) -> usize {
        totals
            .iter()
            .enumerate()
            .fold(0, |min, (i, &t)| match t < totals[min] {
                true => i,
                false => min,
            })
    }

    fn strongest(totals: &[Magnitude]) -> Option<usize> {
        totals
            .iter()
            .enumerate()
            .fold(None, |max: Option<usize>, (i, &t)| match max {
                Some(m) if totals[m] >= t => Some(m),
                _ => Some(i),
            })
    }

    /// each edit lands independently: flip the sampling mode, truncate
    /// to a random prefix, mirror every frame, or reverse a random
    /// span
    fn mutate(&self, mut future: Future, rng: &mut Rng) -> Future {
        const P_EDIT: f64 = 0.25;
        if rng.bernoulli(P_EDIT) {
            future.weighted = !future.weighted;
        }
        if rng.bernoulli(P_EDIT) && future.inputs.len() > self.min_length {
            let keep = rng.between(self.min_length, future.inputs.len());
            future.inputs.truncate(keep);
        }
        if rng.bernoulli(P_EDIT) {
            let len = future.inputs.len();
            splice::dualize_span(&mut future.inputs, 0, len);
        }
        if rng.bernoulli(P_EDIT) && !future.inputs.is_empty() {
            let start = rng.uniform(future.inputs.len());
            let len = rng.between(2, future.inputs.len().max(2));
            splice::reverse_span(&mut future.inputs, start, len);
        }
        future
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arbitrary;

    fn population() -> (Population, Motifs, Rng) {
        let mut settings = Settings::default();
        settings.min_future_length = 10;
        settings.max_future_length = 40;
        settings.min_futures = 4;
        settings.max_futures = 16;
        let mut population = Population::new(&settings);
        population.set_nfutures(8);
        (population, Motifs::random(), Rng::seeded(b"futures"))
    }

    #[test]
    fn population_reaches_target_at_desired_lengths() {
        let (mut population, motifs, mut rng) = population();
        population.populate(&motifs, &mut rng);
        assert_eq!(population.len(), population.nfutures());
        for future in population.futures() {
            assert_eq!(future.inputs.len(), future.desired);
            assert!(future.desired >= 10);
            assert!(future.desired <= 40);
        }
    }

    #[test]
    fn advance_consumes_the_prefix() {
        let (mut population, motifs, mut rng) = population();
        population.populate(&motifs, &mut rng);
        let before = population.futures()[0].inputs.clone();
        population.advance(5);
        assert_eq!(population.futures()[0].inputs, before[5..].to_vec());
        population.populate(&motifs, &mut rng);
        assert_eq!(
            population.futures()[0].inputs[..before.len() - 5],
            before[5..]
        );
    }

    #[test]
    fn adaptation_stretches_winners_and_shrinks_losers() {
        let (mut population, motifs, mut rng) = population();
        population.populate(&motifs, &mut rng);
        let desired = population
            .futures()
            .iter()
            .map(|f| f.desired)
            .collect::<Vec<_>>();
        let mut totals = vec![0.; population.len()];
        totals[0] = 5.;
        population.adapt(&totals);
        let futures = population.futures();
        assert!(futures[0].desired > desired[0] || desired[0] == 40);
        assert!(futures[1].desired < desired[1] || desired[1] == 10);
    }

    #[test]
    fn mostly_unprofitable_rounds_grow_the_working_set() {
        let (mut population, motifs, mut rng) = population();
        population.populate(&motifs, &mut rng);
        let target = population.nfutures();
        population.adapt(&vec![-1.; population.len()]);
        assert!(population.nfutures() > target);
        let target = population.nfutures();
        population.populate(&motifs, &mut rng);
        population.adapt(&vec![1.; population.len()]);
        assert!(population.nfutures() < target);
    }

    #[test]
    fn weakest_breaks_ties_by_ascending_index() {
        let totals = vec![3., -2., 5., 0.];
        assert_eq!(Population::weakest(&totals), 1);
        // swap-erase and find the runner-up, as cull does
        let mut totals = totals;
        totals.swap_remove(1);
        assert_eq!(totals, vec![3., 0., 5.]);
        assert_eq!(Population::weakest(&totals), 1);
        assert_eq!(totals[Population::weakest(&totals)], 0.);
    }

    #[test]
    fn cull_keeps_futures_and_totals_aligned() {
        let (mut population, motifs, mut rng) = population();
        population.populate(&motifs, &mut rng);
        let n = population.len();
        let totals = (0..n).map(|i| i as f64 - 3.).collect::<Vec<_>>();
        population.cull(&totals, &mut rng);
        assert_eq!(
            population.len(),
            n - population.drop_futures - population.mutate_futures + population.mutate_futures
        );
    }

    #[test]
    fn set_nfutures_clamps_into_bounds() {
        let (mut population, _, _) = population();
        population.set_nfutures(1000);
        assert_eq!(population.nfutures(), 16);
        population.set_nfutures(0);
        assert_eq!(population.nfutures(), 4);
    }
}
