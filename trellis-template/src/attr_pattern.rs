//! Attribute-name pattern automaton.
//!
//! Patterns such as `PART.PART` or `:PART` are compiled into a trie of states
//! keyed by character specs. `PART` is a dynamic segment matching any run of
//! non-symbol characters; symbol characters separate segments.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Placeholder token for a dynamic segment inside a pattern string.
pub const PART: &str = "PART";

/// One attribute pattern: the pattern string and its symbol characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributePatternDefinition {
    pub pattern: String,
    pub symbols: String,
}

impl AttributePatternDefinition {
    pub fn new(pattern: impl Into<String>, symbols: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            symbols: symbols.into(),
        }
    }
}

/// Result of matching a name: the winning pattern and the captured parts.
/// `pattern` is `None` when nothing matched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Interpretation {
    pub pattern: Option<String>,
    pub parts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CharSpec {
    chars: String,
    repeat: bool,
    is_symbol: bool,
    is_inverted: bool,
}

impl CharSpec {
    fn literal(ch: char) -> Self {
        Self {
            chars: ch.to_string(),
            repeat: false,
            is_symbol: false,
            is_inverted: false,
        }
    }

    fn symbol(ch: char) -> Self {
        Self {
            chars: ch.to_string(),
            repeat: false,
            is_symbol: true,
            is_inverted: false,
        }
    }

    /// Any run of characters that are not in `symbols`.
    fn dynamic(symbols: &str) -> Self {
        Self {
            chars: symbols.to_string(),
            repeat: true,
            is_symbol: false,
            is_inverted: true,
        }
    }

    fn has(&self, ch: char) -> bool {
        let hit = if self.repeat {
            self.chars.contains(ch)
        } else {
            let mut it = self.chars.chars();
            it.next() == Some(ch) && it.next().is_none()
        };
        hit != self.is_inverted
    }
}

/// Segment counts of one pattern, used to rank competing endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SegmentTypes {
    statics: usize,
    dynamics: usize,
    symbols: usize,
}

enum Segment {
    Static(String),
    Dynamic,
    Symbol(char),
}

#[derive(Debug)]
struct State {
    spec: Option<CharSpec>,
    next: Vec<usize>,
    types: Option<SegmentTypes>,
    /// Ids of the patterns passing through this state, in registration order.
    patterns: Vec<usize>,
    /// The pattern that ends here, if any.
    endpoint: Option<usize>,
}

impl State {
    fn new(spec: Option<CharSpec>) -> Self {
        Self {
            spec,
            next: Vec::new(),
            types: None,
            patterns: Vec::new(),
            endpoint: None,
        }
    }
}

/// Per-pattern capture bookkeeping during one interpretation.
#[derive(Default)]
struct Recorder {
    current: FxHashMap<usize, String>,
    parts: FxHashMap<usize, Vec<String>>,
}

impl Recorder {
    fn append(&mut self, pattern: usize, ch: char) {
        self.current.entry(pattern).or_default().push(ch);
    }

    fn flush(&mut self, pattern: usize) {
        if let Some(part) = self.current.remove(&pattern) {
            self.parts.entry(pattern).or_default().push(part);
        }
    }
}

const ROOT: usize = 0;

/// The compiled pattern automaton.
#[derive(Debug)]
pub struct SyntaxInterpreter {
    states: Vec<State>,
    patterns: Vec<String>,
}

impl Default for SyntaxInterpreter {
    fn default() -> Self {
        Self {
            states: vec![State::new(None)],
            patterns: Vec::new(),
        }
    }
}

impl SyntaxInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, defs: &[AttributePatternDefinition]) {
        for def in defs {
            let pattern_id = self.intern(&def.pattern);
            let (segments, types) = parse_segments(def);
            let mut current = ROOT;
            for segment in segments {
                match segment {
                    Segment::Static(text) => {
                        for ch in text.chars() {
                            current = self.append(current, CharSpec::literal(ch), pattern_id);
                        }
                    }
                    Segment::Dynamic => {
                        current = self.append(current, CharSpec::dynamic(&def.symbols), pattern_id);
                    }
                    Segment::Symbol(ch) => {
                        current = self.append(current, CharSpec::symbol(ch), pattern_id);
                    }
                }
            }
            let end = &mut self.states[current];
            if end.endpoint.is_none() {
                end.types = Some(types);
                end.endpoint = Some(pattern_id);
            }
        }
    }

    fn intern(&mut self, pattern: &str) -> usize {
        match self.patterns.iter().position(|p| p == pattern) {
            Some(id) => id,
            None => {
                self.patterns.push(pattern.to_string());
                self.patterns.len() - 1
            }
        }
    }

    /// Transition from `from` on `spec`, creating the child state if needed.
    fn append(&mut self, from: usize, spec: CharSpec, pattern: usize) -> usize {
        if !self.states[from].patterns.contains(&pattern) {
            self.states[from].patterns.push(pattern);
        }
        let existing = self.states[from]
            .next
            .iter()
            .copied()
            .find(|s| self.states[*s].spec.as_ref() == Some(&spec));
        match existing {
            Some(child) => {
                if !self.states[child].patterns.contains(&pattern) {
                    self.states[child].patterns.push(pattern);
                }
                child
            }
            None => {
                let repeat = spec.repeat;
                let mut state = State::new(Some(spec));
                state.patterns.push(pattern);
                self.states.push(state);
                let child = self.states.len() - 1;
                self.states[from].next.push(child);
                if repeat {
                    self.states[child].next.push(child);
                }
                child
            }
        }
    }

    /// Feed `name` through the automaton and pick the best endpoint:
    /// more static segments, then more dynamic, then more symbol segments.
    /// Remaining ties go to the earliest registered endpoint.
    pub fn interpret(&self, name: &str) -> Interpretation {
        let mut rec = Recorder::default();
        let mut frontier = vec![ROOT];
        for ch in name.chars() {
            frontier = self.next_states(&frontier, ch, &mut rec);
            if frontier.is_empty() {
                break;
            }
        }

        let best = frontier
            .into_iter()
            .filter_map(|s| {
                let state = &self.states[s];
                state.endpoint.map(|pattern| (state, pattern))
            })
            .min_by(|(a, pa), (b, pb)| {
                let ta = a.types.unwrap_or_default();
                let tb = b.types.unwrap_or_default();
                tb.statics
                    .cmp(&ta.statics)
                    .then(tb.dynamics.cmp(&ta.dynamics))
                    .then(tb.symbols.cmp(&ta.symbols))
                    .then(pa.cmp(pb))
            });
        let Some((state, pattern)) = best else {
            return Interpretation::default();
        };
        if !state.spec.as_ref().is_some_and(|s| s.is_symbol) {
            rec.flush(pattern);
        }
        Interpretation {
            pattern: Some(self.patterns[pattern].clone()),
            parts: rec.parts.remove(&pattern).unwrap_or_default(),
        }
    }

    fn next_states(&self, frontier: &[usize], ch: char, rec: &mut Recorder) -> Vec<usize> {
        let mut out = Vec::new();
        for state in frontier {
            for child in &self.states[*state].next {
                let child_state = &self.states[*child];
                let Some(spec) = &child_state.spec else { continue };
                if !spec.has(ch) {
                    continue;
                }
                out.push(*child);
                for pattern in &child_state.patterns {
                    if spec.is_symbol {
                        rec.flush(*pattern);
                    } else {
                        rec.append(*pattern, ch);
                    }
                }
            }
        }
        out
    }
}

fn parse_segments(def: &AttributePatternDefinition) -> (Vec<Segment>, SegmentTypes) {
    let chars: Vec<char> = def.pattern.chars().collect();
    let part: Vec<char> = PART.chars().collect();
    let is_symbol = |c: char| def.symbols.contains(c);
    let mut segments = Vec::new();
    let mut types = SegmentTypes::default();
    let (mut i, mut start) = (0, 0);

    while i < chars.len() {
        let c = chars[i];
        if !is_symbol(c) {
            if i == start && chars[i..].starts_with(&part) {
                i += part.len();
                start = i;
                segments.push(Segment::Dynamic);
                types.dynamics += 1;
            } else {
                i += 1;
            }
        } else if i != start {
            segments.push(Segment::Static(chars[start..i].iter().collect()));
            types.statics += 1;
            start = i;
        } else {
            segments.push(Segment::Symbol(c));
            types.symbols += 1;
            i += 1;
            start = i;
        }
    }
    if start != i {
        segments.push(Segment::Static(chars[start..i].iter().collect()));
        types.statics += 1;
    }
    (segments, types)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter(defs: &[(&str, &str)]) -> SyntaxInterpreter {
        let mut i = SyntaxInterpreter::new();
        let defs: Vec<_> = defs.iter().map(|(p, s)| AttributePatternDefinition::new(*p, *s)).collect();
        i.add(&defs);
        i
    }

    #[test]
    fn segments_count_by_kind() {
        let (segs, types) = parse_segments(&AttributePatternDefinition::new("PART.ref", "."));
        assert_eq!(segs.len(), 3);
        assert_eq!(
            types,
            SegmentTypes {
                statics: 1,
                dynamics: 1,
                symbols: 1
            }
        );
    }

    #[test]
    fn static_suffix_beats_dynamic() {
        let i = interpreter(&[("PART.PART", "."), ("PART.ref", ".")]);
        let r = i.interpret("foo.ref");
        assert_eq!(r.pattern.as_deref(), Some("PART.ref"));
        assert_eq!(r.parts, vec!["foo", "ref"]);
    }

    #[test]
    fn longer_pattern_through_the_same_states_does_not_win() {
        for defs in [
            [("PART.PART.PART", "."), ("PART.PART", ".")],
            [("PART.PART", "."), ("PART.PART.PART", ".")],
        ] {
            let i = interpreter(&defs);
            let r = i.interpret("a.b");
            assert_eq!(r.pattern.as_deref(), Some("PART.PART"));
            assert_eq!(r.parts, vec!["a", "b"]);

            let r = i.interpret("a.b.c");
            assert_eq!(r.pattern.as_deref(), Some("PART.PART.PART"));
            assert_eq!(r.parts, vec!["a", "b", "c"]);
        }
    }

    #[test]
    fn frontier_exhaustion_is_no_match() {
        let i = interpreter(&[("@PART", "@")]);
        assert_eq!(i.interpret("click"), Interpretation::default());
        assert_eq!(i.interpret("@"), Interpretation::default());
    }
}
