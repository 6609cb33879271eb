use super::Token;
use crate::Magnitude;
use crate::Weight;
use crate::console::Memory;

/// one mined objective: a weight and an ordered list of memory
/// locations compared lexicographically under their per-token flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    weight: Weight,
    tokens: Vec<Token>,
}

impl Objective {
    pub fn new(weight: Weight, tokens: Vec<Token>) -> Self {
        assert!(!tokens.is_empty(), "objective over no tokens");
        Self { weight, tokens }
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// signed contribution of this objective across a transition.
    /// lexicographic order over the keyed bytes decides the sign; the
    /// magnitude is the rank difference at the first token where the
    /// two snapshots disagree, scaled by the weight.
    pub fn magnitude(&self, prev: &Memory, next: &Memory) -> Magnitude {
        self.tokens
            .iter()
            .map(|t| (t.rank(prev), t.rank(next)))
            .find(|(p, n)| p != n)
            .map(|(p, n)| self.weight * (n - p) as Magnitude)
            .unwrap_or(0.)
    }
}

/// the full set of weighted objectives mined from example play. pure:
/// identical snapshots in, identical magnitudes out, nothing mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Objectives(Vec<Objective>);

impl Objectives {
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// sum of per-objective contributions, in declaration order so the
    /// floating point reduction is reproducible
    pub fn evaluate(&self, prev: &Memory, next: &Memory) -> Magnitude {
        self.0.iter().map(|o| o.magnitude(prev, next)).sum()
    }

    /// the same contributions partitioned by sign, so that
    /// pos + neg == evaluate(prev, next) to reduction order
    pub fn delta(&self, prev: &Memory, next: &Memory) -> (Magnitude, Magnitude) {
        self.0
            .iter()
            .map(|o| o.magnitude(prev, next))
            .fold((0., 0.), |(pos, neg), m| match m > 0. {
                true => (pos + m, neg),
                false => (pos, neg + m),
            })
    }

    /// every token index must address the snapshot. checked against
    /// the first observed memory at startup and again on resume.
    pub fn admits(&self, memory: &Memory) -> bool {
        self.0
            .iter()
            .flat_map(|o| o.tokens())
            .all(|t| t.index() < memory.len())
    }

    /// parse the objectives file format: one objective per line,
    /// `<weight> <token> <token> ...`, with # comments and blank lines
    /// skipped. any malformed line is fatal.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut objectives = Vec::new();
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
            let tokens = fields
                .map(|f| f.parse::<u32>().map(Token::from))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow::anyhow!("line {}: bad token: {}", i + 1, e))?;
            anyhow::ensure!(!tokens.is_empty(), "line {}: objective over no tokens", i + 1);
            objectives.push(Objective::new(weight, tokens));
        }
        Ok(Self(objectives))
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }
}

impl From<Vec<Objective>> for Objectives {
    fn from(objectives: Vec<Objective>) -> Self {
        Self(objectives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(weight: Weight, token: Token) -> Objectives {
        Objectives::from(vec![Objective::new(weight, vec![token])])
    }

    #[test]
    fn identical_snapshots_are_null() {
        let objectives = single(1., Token::new(0, false, false));
        let memory = vec![9, 9, 9];
        assert_eq!(objectives.evaluate(&memory, &memory), 0.);
        assert_eq!(objectives.delta(&memory, &memory), (0., 0.));
    }

    #[test]
    fn increasing_byte_scores_positive() {
        let objectives = single(1., Token::new(0, false, false));
        let prev = vec![0, 0, 0];
        let next = vec![3, 0, 0];
        assert_eq!(objectives.evaluate(&prev, &next), 3.);
        assert_eq!(objectives.delta(&prev, &next), (3., 0.));
    }

    #[test]
    fn decreasing_flag_flips_the_sign() {
        let objectives = single(1., Token::new(2, true, false));
        let prev = vec![0, 0, 0];
        let next = vec![0, 0, 2];
        assert_eq!(objectives.evaluate(&prev, &next), -2.);
        assert_eq!(objectives.delta(&prev, &next), (0., -2.));
    }

    #[test]
    fn partition_sums_to_evaluation() {
        let objectives = Objectives::from(vec![
            Objective::new(1.5, vec![Token::new(0, false, false)]),
            Objective::new(2.0, vec![Token::new(1, true, false)]),
            Objective::new(0.5, vec![Token::new(2, false, true)]),
        ]);
        let prev = vec![10, 10, 0x7F];
        let next = vec![14, 30, 0x80];
        let (pos, neg) = objectives.delta(&prev, &next);
        assert!(pos >= 0.);
        assert!(neg <= 0.);
        assert_eq!(pos + neg, objectives.evaluate(&prev, &next));
    }

    #[test]
    fn lexicographic_tie_breaks_at_first_divergence() {
        let objective = Objective::new(
            1.,
            vec![Token::new(0, false, false), Token::new(1, false, false)],
        );
        let prev = vec![5, 9];
        let next = vec![5, 2];
        assert_eq!(objective.magnitude(&prev, &next), -7.);
    }

    #[test]
    fn parses_comments_and_legacy_tokens() {
        let text = "
            # mined objectives
            1.0 0 1        # plain indices
            -0.5 1073741826 # decreasing flag on index 2
        ";
        let objectives = Objectives::parse(text).unwrap();
        assert_eq!(objectives.len(), 2);
        assert!(objectives.admits(&vec![0; 3]));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(Objectives::parse("1.0 zero").is_err());
        assert!(Objectives::parse("notaweight 1").is_err());
        assert!(Objectives::parse("1.0").is_err());
    }

    #[test]
    fn admits_checks_every_index() {
        let objectives = single(1., Token::new(100, false, false));
        assert!(!objectives.admits(&vec![0; 50]));
        assert!(objectives.admits(&vec![0; 200]));
    }
}
