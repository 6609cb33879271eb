use super::future::Future;
use crate::console::Input;
use crate::motif::Motifs;
use crate::rng::Rng;
use crate::settings::Settings;
use std::collections::HashSet;
use std::hash::Hash;
use std::hash::Hasher;

/// where a candidate came from. motif-born candidates remember their
/// id so a commit can feed credit back into the sampling weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// backfill draw from the motif store
    Motif(usize),
    /// prefix of a live future
    Future(usize),
    /// span replacement proposed while backtracking
    Improvise,
}

/// a short input sequence considered for immediate commit
#[derive(Debug, Clone)]
pub struct Next {
    pub inputs: Vec<Input>,
    pub origin: Origin,
    pub explanation: String,
}

impl Next {
    pub fn new(inputs: Vec<Input>, origin: Origin, explanation: &str) -> Self {
        Self {
            inputs,
            origin,
            explanation: explanation.to_string(),
        }
    }

    fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.inputs.hash(&mut hasher);
        hasher.finish()
    }
}

/// construct the round's candidates: every future contributes its
/// prefix, the motif store contributes weighted backfill draws, then
/// the deduplicated pool is subsampled into [min_nexts, max_nexts]
/// with half the quota reserved for futures-derived candidates. with
/// a fixed rng state the whole construction is reproducible.
pub fn generate(
    futures: &[Future],
    motifs: &Motifs,
    rng: &mut Rng,
    settings: &Settings,
) -> Vec<Next> {
    let mut pool = Vec::new();
    for (idx, future) in futures.iter().enumerate() {
        let prefix = future.inputs.iter().take(settings.next_len).copied();
        pool.push(Next::new(
            prefix.collect(),
            Origin::Future(idx),
            &format!("ftr-{}", idx),
        ));
    }
    for _ in 0..settings.backfill_count {
        let id = motifs.sample(rng, true);
        pool.push(Next::new(
            motifs.get(id).inputs().to_vec(),
            Origin::Motif(id),
            "backfill",
        ));
    }
    subsample(dedup(pool), rng, settings)
}

/// first occurrence wins, by input-bytes hash
fn dedup(pool: Vec<Next>) -> Vec<Next> {
    let mut seen = HashSet::new();
    pool.into_iter()
        .filter(|next| !next.inputs.is_empty())
        .filter(|next| seen.insert(next.fingerprint()))
        .collect()
}

/// shuffle each partition, take ceil(k/2) futures-derived, fill the
/// remainder from backfill, and top back up from futures-derived if
/// backfill runs short
fn subsample(pool: Vec<Next>, rng: &mut Rng, settings: &Settings) -> Vec<Next> {
    let k = pool.len().clamp(settings.min_nexts, settings.max_nexts);
    let (mut derived, mut backfill): (Vec<_>, Vec<_>) = pool
        .into_iter()
        .partition(|next| matches!(next.origin, Origin::Future(_)));
    rng.shuffle(&mut derived);
    rng.shuffle(&mut backfill);
    let mut taken = Vec::with_capacity(k);
    let half = k.div_ceil(2).min(derived.len());
    taken.extend(derived.drain(..half));
    let fill = (k - taken.len()).min(backfill.len());
    taken.extend(backfill.drain(..fill));
    let top = (k - taken.len()).min(derived.len());
    taken.extend(derived.drain(..top));
    taken
}
