//! Literal path substitution

/// A set of literal `from >>> to` replacements applied in one pass
///
/// Longer patterns are tried first at every position, and replaced output is
/// never scanned again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    pairs: Vec<(String, String)>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a replacement; identity and duplicate patterns are ignored
    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let (from, to) = (from.into(), to.into());
        if from.is_empty() || from == to || self.pairs.iter().any(|(f, _)| *f == from) {
            return;
        }
        let at = self
            .pairs
            .iter()
            .position(|(f, _)| f.len() < from.len())
            .unwrap_or(self.pairs.len());
        self.pairs.insert(at, (from, to));
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Replace every occurrence of every pattern in `input`
    pub fn apply(&self, input: &[u8]) -> Vec<u8> {
        if self.pairs.is_empty() {
            return input.to_vec();
        }

        let mut out = Vec::with_capacity(input.len());
        let mut i = 0;
        'scan: while i < input.len() {
            for (from, to) in &self.pairs {
                if input[i..].starts_with(from.as_bytes()) {
                    out.extend_from_slice(to.as_bytes());
                    i += from.len();
                    continue 'scan;
                }
            }
            out.push(input[i]);
            i += 1;
        }
        out
    }
}
