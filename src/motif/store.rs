use crate::MOTIF_ALPHA;
use crate::MOTIF_CLIP_ITERATIONS;
use crate::MOTIF_MAX_FRAC;
use crate::MOTIF_MIN_FRAC;
use crate::Weight;
use crate::console::Input;
use crate::rng::Rng;

/// a short input sequence mined from example play, with the weight
/// that governs how often it gets sampled
#[derive(Debug, Clone, PartialEq)]
pub struct Motif {
    inputs: Vec<Input>,
    weight: Weight,
}

impl Motif {
    pub fn new(inputs: Vec<Input>, weight: Weight) -> Self {
        assert!(!inputs.is_empty(), "motif with no inputs");
        assert!(weight > 0., "motif weight must be strictly positive");
        Self { inputs, weight }
    }
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }
    pub fn weight(&self) -> Weight {
        self.weight
    }
}

/// the sampling store. weights drift as the engine learns which motifs
/// pay off, but every weight stays pinned inside
/// [min_frac * W, max_frac * W] so no motif can either starve or
/// monopolize the draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Motifs {
    motifs: Vec<Motif>,
    alpha: Weight,
    min_frac: Weight,
    max_frac: Weight,
}

impl Motifs {
    pub fn len(&self) -> usize {
        self.motifs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.motifs.is_empty()
    }
    pub fn get(&self, id: usize) -> &Motif {
        &self.motifs[id]
    }
    pub fn total(&self) -> Weight {
        self.motifs.iter().map(|m| m.weight).sum()
    }
    pub fn weights(&self) -> impl Iterator<Item = (Weight, &[Input])> {
        self.motifs.iter().map(|m| (m.weight, m.inputs.as_slice()))
    }

    /// override the default alpha and clipping band, e.g. from settings
    pub fn tuned(mut self, alpha: Weight, min_frac: Weight, max_frac: Weight) -> Self {
        assert!(0. < alpha && alpha < 1.);
        assert!(0. <= min_frac && min_frac < max_frac && max_frac <= 1.);
        self.alpha = alpha;
        self.min_frac = min_frac;
        self.max_frac = max_frac;
        self
    }

    /// byte-exact weight restoration on snapshot resume
    pub fn restore(&mut self, weights: &[Weight]) -> anyhow::Result<()> {
        anyhow::ensure!(
            weights.len() == self.motifs.len(),
            "snapshot carries {} motif weights for {} motifs",
            weights.len(),
            self.motifs.len()
        );
        for (motif, &weight) in self.motifs.iter_mut().zip(weights) {
            motif.weight = weight;
        }
        Ok(())
    }

    /// draw a motif id, proportional to weight or uniform. given a
    /// fixed rng state the draw is reproducible either way.
    pub fn sample(&self, rng: &mut Rng, weighted: bool) -> usize {
        assert!(!self.motifs.is_empty(), "sampling from empty motif store");
        match weighted {
            false => rng.uniform(self.motifs.len()),
            true => {
                let mut roll = rng.next_f64_unit() * self.total();
                for (id, motif) in self.motifs.iter().enumerate() {
                    roll -= motif.weight;
                    if roll <= 0. {
                        return id;
                    }
                }
                self.motifs.len() - 1
            }
        }
    }

    /// nudge a motif's weight by the sign of the commit it produced:
    /// shrink alpha divides good motifs' weights up, multiplies bad
    /// ones down, and the whole table is re-clipped afterwards
    pub fn reweight(&mut self, id: usize, delta: f64) {
        if delta > 0. {
            self.motifs[id].weight /= self.alpha;
        } else if delta < 0. {
            self.motifs[id].weight *= self.alpha;
        } else {
            return;
        }
        self.clip();
    }

    /// iteratively pin every weight into its fraction band. each pass
    /// moves W, so we repeat until stable up to a relative tolerance,
    /// with a hard iteration bound since an infeasible band
    /// (max_frac < 1/n) never settles.
    fn clip(&mut self) {
        const TOLERANCE: Weight = 1e-12;
        let mut clipped = 0usize;
        for _ in 0..MOTIF_CLIP_ITERATIONS {
            let total = self.total();
            let lo = self.min_frac * total;
            let hi = self.max_frac * total;
            let slack = total * TOLERANCE;
            let mut moved = 0usize;
            for motif in self.motifs.iter_mut() {
                if motif.weight < lo - slack {
                    motif.weight = lo;
                    moved += 1;
                } else if motif.weight > hi + slack {
                    motif.weight = hi;
                    moved += 1;
                }
            }
            clipped += moved;
            if moved == 0 {
                break;
            }
        }
        if clipped > 0 {
            log::warn!("clipped {} motif weights into band", clipped);
        }
    }

    /// parse the motif file format: one motif per line,
    /// `<weight> <byte> <byte> ...`, # comments and blanks skipped
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut motifs = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let weight = fields
                .next()
                .expect("split of non-empty line")
                .parse::<Weight>()
                .map_err(|e| anyhow::anyhow!("line {}: bad weight: {}", i + 1, e))?;
            anyhow::ensure!(weight > 0., "line {}: motif weight must be positive", i + 1);
            let inputs = fields
                .map(|f| f.parse::<u8>().map(Input::from))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow::anyhow!("line {}: bad input byte: {}", i + 1, e))?;
            anyhow::ensure!(!inputs.is_empty(), "line {}: motif with no inputs", i + 1);
            motifs.push(Motif::new(inputs, weight));
        }
        Ok(Self::from(motifs))
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }
}

impl From<Vec<Motif>> for Motifs {
    fn from(motifs: Vec<Motif>) -> Self {
        Self {
            motifs,
            alpha: MOTIF_ALPHA,
            min_frac: MOTIF_MIN_FRAC,
            max_frac: MOTIF_MAX_FRAC,
        }
    }
}
