use super::future::Future;
use super::integral;
use super::nexts::Next;
use crate::Magnitude;
use crate::console::Emulator;
use crate::console::Input;
use crate::console::Savestate;
use crate::objective::Objectives;
use crate::remote::Helpers;
use crate::remote::Response;

/// everything we learn about one candidate in one round. the
/// per-future totals stay index-aligned with the population so the
/// winner's vector can drive adaptation and pruning afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub immediate: Magnitude,
    pub futures: Vec<Magnitude>,
}

impl Outcome {
    /// index-ordered reduction, so multi-threaded rounds sum in the
    /// same order as single-threaded ones
    pub fn futsum(&self) -> Magnitude {
        self.futures.iter().sum()
    }

    pub fn best(&self) -> Magnitude {
        self.futures
            .iter()
            .copied()
            .reduce(Magnitude::max)
            .unwrap_or(0.)
    }

    pub fn worst(&self) -> Magnitude {
        self.futures
            .iter()
            .copied()
            .reduce(Magnitude::min)
            .unwrap_or(0.)
    }

    pub fn score(&self) -> Magnitude {
        self.immediate + self.futsum()
    }

    /// NaN anywhere in the aggregation must never win a round
    pub fn ranking(&self) -> Magnitude {
        let score = self.score();
        match score.is_nan() {
            true => Magnitude::NEG_INFINITY,
            false => score,
        }
    }

    /// adopt a helper's answer, bounds-checked slot by slot
    fn merge(response: Response, nfutures: usize) -> Self {
        let mut futures = vec![0.; nfutures];
        for (i, &total) in response.per_future.iter().enumerate() {
            if i < futures.len() {
                futures[i] = total;
            }
        }
        Self {
            immediate: response.immediate,
            futures,
        }
    }
}

/// score one candidate from one state: walk the candidate and take
/// the immediate as one magnitude comparison between the walk's
/// starting and ending memories, then forecast every future from the
/// post-commit state. the per-future total folds the future's own
/// integral together with the sign-partitioned delta between the
/// post-commit memory and the future's terminal memory, so a future
/// that regresses key signals pays for it even when its integral nets
/// positive.
pub fn outcome<E: Emulator, F: AsRef<[Input]>>(
    emulator: &E,
    state: &Savestate,
    inputs: &[Input],
    futures: &[F],
    objectives: &Objectives,
) -> Outcome {
    let mut machine = emulator.clone();
    machine.load(state);
    let pre_memory = machine.memory();
    let mut post_memory = pre_memory.clone();
    for &input in inputs {
        post_memory = machine.step(input);
    }
    let immediate = objectives.evaluate(&pre_memory, &post_memory);
    let post_state = machine.save();
    let futures = futures
        .iter()
        .map(|future| {
            let (sum, terminal) =
                integral::integrate(&mut machine, &post_state, future.as_ref(), objectives);
            let (pos, neg) = objectives.delta(&post_memory, &terminal);
            sum + pos + neg
        })
        .collect::<Vec<_>>();
    Outcome { immediate, futures }
}

/// evaluate the whole round: helpers first when any are configured,
/// local workers for every candidate the helpers could not cover.
/// each local worker clones the master emulator and loads its own
/// copy of the round state, and results come back in candidate order
/// no matter how workers interleave.
pub fn evaluate<E: Emulator + Sync>(
    emulator: &E,
    state: &Savestate,
    nexts: &[Next],
    population: &[Future],
    objectives: &Objectives,
    helpers: &Helpers,
) -> Vec<Outcome> {
    use rayon::iter::IndexedParallelIterator;
    use rayon::iter::IntoParallelIterator;
    use rayon::iter::ParallelIterator;
    let remote = match helpers.is_empty() {
        true => nexts.iter().map(|_| None).collect::<Vec<_>>(),
        false => {
            let sequences = nexts.iter().map(|n| n.inputs.clone()).collect::<Vec<_>>();
            let futures = population
                .iter()
                .map(|f| f.inputs.clone())
                .collect::<Vec<_>>();
            helpers.dispatch(state, &sequences, &futures)
        }
    };
    remote
        .into_par_iter()
        .zip(nexts)
        .map(|(response, next)| match response {
            Some(response) => Outcome::merge(response, population.len()),
            None => outcome(emulator, state, &next.inputs, population, objectives),
        })
        .collect()
}
