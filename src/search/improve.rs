use super::integral;
use super::splice;
use crate::ABLATION_CANDIDATES;
use crate::CHOP_CANDIDATES;
use crate::Magnitude;
use crate::OPPOSITE_SPANS;
use crate::RANDOM_CANDIDATES;
use crate::console::Emulator;
use crate::console::Input;
use crate::console::Savestate;
use crate::motif::Motifs;
use crate::objective::Objectives;
use crate::rng::Rng;
use std::collections::HashSet;
use std::hash::Hash;
use std::hash::Hasher;

/// a proposed replacement for the span under improvement, tagged with
/// the strategy that produced it
#[derive(Debug, Clone)]
pub struct Improvement {
    pub inputs: Vec<Input>,
    pub strategy: &'static str,
}

impl Improvement {
    fn new(inputs: Vec<Input>, strategy: &'static str) -> Self {
        Self { inputs, strategy }
    }

    fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.inputs.hash(&mut hasher);
        hasher.finish()
    }
}

/// every strategy takes a crack at the span: fresh motif material,
/// mirrored and reversed variants, button ablations, and greedy span
/// deletion. candidates are deduplicated against each other and
/// against the span itself; all randomness comes from the engine rng
/// so a fixed seed proposes a fixed slate.
pub fn replacements<E: Emulator>(
    emulator: &E,
    start: &Savestate,
    improveme: &[Input],
    motifs: &Motifs,
    rng: &mut Rng,
    objectives: &Objectives,
) -> Vec<Improvement> {
    let mut pool = Vec::new();
    random(&mut pool, improveme.len(), motifs, rng);
    opposites(&mut pool, improveme, rng);
    ablation(&mut pool, improveme, rng);
    chop(&mut pool, emulator, start, improveme, rng, objectives);
    let mut seen = HashSet::new();
    seen.insert(Improvement::new(improveme.to_vec(), "improveme").fingerprint());
    pool.into_iter()
        .filter(|candidate| !candidate.inputs.is_empty())
        .filter(|candidate| seen.insert(candidate.fingerprint()))
        .collect()
}

/// motif-sampled sequences of the span's length
fn random(pool: &mut Vec<Improvement>, length: usize, motifs: &Motifs, rng: &mut Rng) {
    for _ in 0..RANDOM_CANDIDATES {
        let mut inputs = Vec::with_capacity(length);
        while inputs.len() < length {
            let id = motifs.sample(rng, true);
            inputs.extend_from_slice(motifs.get(id).inputs());
        }
        inputs.truncate(length);
        pool.push(Improvement::new(inputs, "random"));
    }
}

/// the span mirrored, reversed, both, and the same treatments applied
/// to random interior spans
fn opposites(pool: &mut Vec<Improvement>, improveme: &[Input], rng: &mut Rng) {
    let length = improveme.len();
    let mut whole = improveme.to_vec();
    splice::dualize_span(&mut whole, 0, length);
    pool.push(Improvement::new(whole.clone(), "dualize"));
    splice::reverse_span(&mut whole, 0, length);
    pool.push(Improvement::new(whole, "dualize-reverse"));
    let mut whole = improveme.to_vec();
    splice::reverse_span(&mut whole, 0, length);
    pool.push(Improvement::new(whole, "reverse"));
    for _ in 0..OPPOSITE_SPANS {
        let start = rng.uniform(length.max(1));
        let span = rng.between(2, length.max(2));
        let mut dualized = improveme.to_vec();
        splice::dualize_span(&mut dualized, start, span);
        pool.push(Improvement::new(dualized.clone(), "dualize-span"));
        splice::reverse_span(&mut dualized, start, span);
        pool.push(Improvement::new(dualized, "dualize-reverse-span"));
        let mut reversed = improveme.to_vec();
        splice::reverse_span(&mut reversed, start, span);
        pool.push(Improvement::new(reversed, "reverse-span"));
    }
}

/// strip button subsets across the whole span. the empty subset is a
/// no-op and never emitted.
fn ablation(pool: &mut Vec<Improvement>, improveme: &[Input], rng: &mut Rng) {
    const P_MASK: f64 = 0.25;
    for _ in 0..ABLATION_CANDIDATES {
        let mut keep = 0xFFu8;
        for bit in 0..8 {
            if rng.bernoulli(P_MASK) {
                keep &= !(1 << bit);
            }
        }
        if keep == 0xFF {
            continue;
        }
        let inputs = improveme.iter().map(|i| i.mask(keep)).collect::<Vec<_>>();
        if inputs != improveme {
            pool.push(Improvement::new(inputs, "ablation"));
        }
    }
}

/// greedily delete spans, biased short by drawing span lengths as
/// floor(len * u^2), as long as each deletion keeps the integral from
/// degrading
fn chop<E: Emulator>(
    pool: &mut Vec<Improvement>,
    emulator: &E,
    start: &Savestate,
    improveme: &[Input],
    rng: &mut Rng,
    objectives: &Objectives,
) {
    let mut machine = emulator.clone();
    let mut current = improveme.to_vec();
    let (mut integral, _) = integral::integrate(&mut machine, start, &current, objectives);
    for _ in 0..CHOP_CANDIDATES {
        let u = rng.next_f64_unit();
        let span = (current.len() as f64 * u * u) as usize;
        if span == 0 || span >= current.len() {
            continue;
        }
        let at = rng.uniform(current.len() - span + 1);
        let candidate = splice::chop(&current, at, span);
        let (chopped, _) = integral::integrate(&mut machine, start, &candidate, objectives);
        match chopped >= integral {
            true => {
                current = candidate;
                integral = chopped;
            }
            false => break,
        }
    }
    if current.len() < improveme.len() {
        pool.push(Improvement::new(current, "chop"));
    }
}

/// the acceptance rule: a replacement must integrate at least as well
/// as the span it replaces, must be positive in its own right, and
/// must land in a strictly better terminal memory
fn acceptable(
    end_integral: Magnitude,
    new_integral: Magnitude,
    n_minus_e: Magnitude,
) -> Option<Magnitude> {
    let accepted = new_integral >= end_integral && new_integral > 0. && n_minus_e > 0.;
    accepted.then(|| (new_integral - end_integral) + n_minus_e)
}

/// run the acceptance test over every proposal in parallel and rank
/// survivors best first. workers clone their own emulators; ties keep
/// proposal order so the ranking is deterministic.
pub fn vet<E: Emulator + Sync>(
    emulator: &E,
    start: &Savestate,
    improveme: &[Input],
    proposals: Vec<Improvement>,
    objectives: &Objectives,
) -> Vec<Improvement> {
    use rayon::iter::IntoParallelIterator;
    use rayon::iter::ParallelIterator;
    let mut machine = emulator.clone();
    let (end_integral, end_memory) = integral::integrate(&mut machine, start, improveme, objectives);
    let mut accepted = proposals
        .into_par_iter()
        .filter_map(|proposal| {
            let mut machine = emulator.clone();
            let (new_integral, new_memory) =
                integral::integrate(&mut machine, start, &proposal.inputs, objectives);
            let n_minus_e = objectives.evaluate(&end_memory, &new_memory);
            acceptable(end_integral, new_integral, n_minus_e).map(|score| (proposal, score))
        })
        .collect::<Vec<_>>();
    accepted.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    accepted.into_iter().map(|(proposal, _)| proposal).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arbitrary;
    use crate::console::Machine;
    use crate::objective::Objective;
    use crate::objective::Token;

    fn scroll() -> Objectives {
        Objectives::from(vec![Objective::new(
            1.,
            vec![Token::new(3, false, false), Token::new(2, false, false)],
        )])
    }

    fn position() -> Objectives {
        Objectives::from(vec![Objective::new(1., vec![Token::new(0, false, false)])])
    }

    #[test]
    fn acceptance_requires_all_three_conditions() {
        // better integral and better terminal memory
        assert_eq!(acceptable(1.0, 1.5, 0.3), Some(0.8));
        // better integral but worse terminal memory
        assert_eq!(acceptable(1.0, 2.0, -0.1), None);
        // equal integral is enough when the terminal memory improves
        assert_eq!(acceptable(1.0, 1.0, 0.5), Some(0.5));
        // a replacement that is not positive in its own right
        assert_eq!(acceptable(-2.0, -1.0, 0.5), None);
        assert_eq!(acceptable(1.0, 0.5, 0.5), None);
    }

    #[test]
    fn proposals_are_deduplicated_and_never_the_span_itself() {
        let machine = Machine::boot("improve");
        let start = machine.save();
        let improveme = vec![Input::LEFT; 60];
        let mut rng = Rng::seeded(b"improve");
        let proposals = replacements(
            &machine,
            &start,
            &improveme,
            &Motifs::random(),
            &mut rng,
            &scroll(),
        );
        assert!(!proposals.is_empty());
        let mut seen = HashSet::new();
        for proposal in proposals.iter() {
            assert!(proposal.inputs != improveme, "{} re-proposed the span", proposal.strategy);
            assert!(seen.insert(proposal.inputs.clone()));
        }
    }

    #[test]
    fn ablation_masks_buttons_without_noops() {
        let improveme = vec![Input::RIGHT.press(Input::A); 40];
        let mut rng = Rng::seeded(b"ablate");
        let mut pool = Vec::new();
        ablation(&mut pool, &improveme, &mut rng);
        for proposal in pool {
            assert!(proposal.inputs.len() == improveme.len());
            assert!(proposal.inputs != improveme);
        }
    }

    #[test]
    fn chopped_spans_are_strictly_shorter() {
        let machine = Machine::boot("chop");
        let start = machine.save();
        // wasted frames in the middle: chopping them cannot hurt
        let mut improveme = vec![Input::RIGHT; 30];
        improveme.extend(vec![Input(0); 30]);
        improveme.extend(vec![Input::RIGHT; 30]);
        let mut rng = Rng::seeded(b"chop");
        let mut pool = Vec::new();
        chop(&mut pool, &machine, &start, &improveme, &mut rng, &scroll());
        for proposal in pool {
            assert!(proposal.inputs.len() < improveme.len());
        }
    }

    #[test]
    fn vetting_prefers_genuine_improvements() {
        let machine = Machine::boot("vet");
        let start = machine.save();
        // the span walks away from the goal; holding right instead is
        // a strict improvement under the scroll objective
        let improveme = vec![Input::LEFT; 80];
        let proposals = vec![
            Improvement::new(vec![Input::RIGHT; 80], "better"),
            Improvement::new(vec![Input::LEFT; 80], "same"),
            Improvement::new(vec![Input(0); 80], "idle"),
        ];
        let accepted = vet(&machine, &start, &improveme, proposals, &position());
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].strategy, "better");
    }

    #[test]
    fn vetting_ranks_best_first() {
        let machine = Machine::boot("rank");
        let start = machine.save();
        let improveme = vec![Input(0); 60];
        let proposals = vec![
            Improvement::new(vec![Input::RIGHT; 30], "half"),
            Improvement::new(vec![Input::RIGHT; 60], "full"),
        ];
        let accepted = vet(&machine, &start, &improveme, proposals, &position());
        assert!(accepted.len() == 2);
        assert_eq!(accepted[0].strategy, "full");
    }
}
