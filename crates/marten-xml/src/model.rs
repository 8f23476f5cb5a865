//! Content models and the cursor used to validate element content.
//!
//! [§ 3.2.1 Element Content](https://www.w3.org/TR/xml/#sec-element-content)
//!
//! A content particle is compiled into a Glushkov position automaton: one
//! position per name occurrence, with `first`, `last` and `follow` sets. The
//! [`ModelCursor`] tracks the set of positions that can have matched the
//! children seen so far, so non-deterministic models still validate.

use std::collections::BTreeSet;
use std::sync::Arc;

use strum_macros::Display;

/// The occurrence indicator after a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Occurrence {
    /// No indicator.
    #[strum(serialize = "")]
    ExactlyOnce,
    /// `?`
    #[strum(serialize = "?")]
    ZeroOrOne,
    /// `*`
    #[strum(serialize = "*")]
    ZeroOrMore,
    /// `+`
    #[strum(serialize = "+")]
    OneOrMore,
}

/// The body of a content particle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Particle {
    /// A single element type name.
    Name(String),
    /// [49] choice, `(a | b)`.
    Choice(Vec<ContentParticle>),
    /// [50] seq, `(a , b)`.
    Sequence(Vec<ContentParticle>),
}

/// [48] cp ::= (Name | choice | seq) ('?' | '*' | '+')?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentParticle {
    /// What the particle matches.
    pub particle: Particle,
    /// How often it may occur.
    pub occurrence: Occurrence,
}

impl ContentParticle {
    /// A name particle occurring exactly once.
    #[must_use]
    pub fn name(name: &str) -> Self {
        Self {
            particle: Particle::Name(name.to_string()),
            occurrence: Occurrence::ExactlyOnce,
        }
    }

    /// A choice group occurring exactly once.
    #[must_use]
    pub const fn choice(children: Vec<Self>) -> Self {
        Self {
            particle: Particle::Choice(children),
            occurrence: Occurrence::ExactlyOnce,
        }
    }

    /// A sequence group occurring exactly once.
    #[must_use]
    pub const fn sequence(children: Vec<Self>) -> Self {
        Self {
            particle: Particle::Sequence(children),
            occurrence: Occurrence::ExactlyOnce,
        }
    }

    /// The same particle with a different occurrence indicator.
    #[must_use]
    pub const fn with_occurrence(mut self, occurrence: Occurrence) -> Self {
        self.occurrence = occurrence;
        self
    }

    /// Names mentioned anywhere in the particle, in order of appearance.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.particle {
            Particle::Name(name) => out.push(name),
            Particle::Choice(children) | Particle::Sequence(children) => {
                for child in children {
                    child.collect_names(out);
                }
            }
        }
    }
}

/// Glushkov automaton of a content particle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton {
    names: Vec<String>,
    nullable: bool,
    first: BTreeSet<usize>,
    last: BTreeSet<usize>,
    follow: Vec<BTreeSet<usize>>,
}

struct Fragment {
    nullable: bool,
    first: BTreeSet<usize>,
    last: BTreeSet<usize>,
}

impl Automaton {
    /// Compile `particle`.
    #[must_use]
    pub fn new(particle: &ContentParticle) -> Self {
        let mut automaton = Self {
            names: Vec::new(),
            nullable: false,
            first: BTreeSet::new(),
            last: BTreeSet::new(),
            follow: Vec::new(),
        };
        let fragment = automaton.build(particle);
        automaton.nullable = fragment.nullable;
        automaton.first = fragment.first;
        automaton.last = fragment.last;
        automaton
    }

    fn build(&mut self, cp: &ContentParticle) -> Fragment {
        let mut fragment = match &cp.particle {
            Particle::Name(name) => {
                let position = self.names.len();
                self.names.push(name.clone());
                self.follow.push(BTreeSet::new());
                Fragment {
                    nullable: false,
                    first: BTreeSet::from([position]),
                    last: BTreeSet::from([position]),
                }
            }
            Particle::Choice(children) => {
                // An empty choice only occurs for `(#PCDATA)`.
                let mut fragment = Fragment {
                    nullable: children.is_empty(),
                    first: BTreeSet::new(),
                    last: BTreeSet::new(),
                };
                for child in children {
                    let child = self.build(child);
                    fragment.nullable |= child.nullable;
                    fragment.first.extend(child.first);
                    fragment.last.extend(child.last);
                }
                fragment
            }
            Particle::Sequence(children) => {
                let mut fragment = Fragment {
                    nullable: true,
                    first: BTreeSet::new(),
                    last: BTreeSet::new(),
                };
                for child in children {
                    let child = self.build(child);
                    for &position in &fragment.last {
                        self.follow[position].extend(child.first.iter().copied());
                    }
                    if fragment.nullable {
                        fragment.first.extend(child.first.iter().copied());
                    }
                    if child.nullable {
                        fragment.last.extend(child.last);
                    } else {
                        fragment.last = child.last;
                    }
                    fragment.nullable &= child.nullable;
                }
                fragment
            }
        };
        if matches!(cp.occurrence, Occurrence::ZeroOrMore | Occurrence::OneOrMore) {
            for &position in &fragment.last {
                self.follow[position].extend(fragment.first.iter().copied());
            }
        }
        if matches!(cp.occurrence, Occurrence::ZeroOrOne | Occurrence::ZeroOrMore) {
            fragment.nullable = true;
        }
        fragment
    }

    /// [Appendix E Deterministic Content Models](https://www.w3.org/TR/xml/#determinism)
    ///
    /// True if no start tag can match two different positions.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        std::iter::once(&self.first)
            .chain(self.follow.iter())
            .all(|set| {
                let mut seen = BTreeSet::new();
                set.iter().all(|&position| seen.insert(self.names[position].as_str()))
            })
    }

    fn candidates(&self, state: Option<&BTreeSet<usize>>) -> BTreeSet<usize> {
        match state {
            None => self.first.clone(),
            Some(positions) => positions
                .iter()
                .flat_map(|&position| self.follow[position].iter().copied())
                .collect(),
        }
    }

    fn accepts_end(&self, state: Option<&BTreeSet<usize>>) -> bool {
        match state {
            None => self.nullable,
            Some(positions) => positions.iter().any(|p| self.last.contains(p)),
        }
    }
}

/// Position within an element's content model.
#[derive(Debug, Clone)]
pub enum ModelCursor {
    /// `ANY`, or an element with no declaration to check against.
    Anything,
    /// `EMPTY`: only the end tag is acceptable.
    EmptyOnly,
    /// Element or mixed content.
    Automaton {
        /// The compiled model.
        automaton: Arc<Automaton>,
        /// Positions matched so far, `None` before the first child.
        state: Option<BTreeSet<usize>>,
    },
}

impl ModelCursor {
    /// A cursor at the start of `automaton`.
    #[must_use]
    pub const fn new(automaton: Arc<Automaton>) -> Self {
        Self::Automaton {
            automaton,
            state: None,
        }
    }

    /// Advance past a child element called `name`.
    ///
    /// Returns `false`, leaving the cursor unchanged, if `name` is not
    /// allowed here.
    pub fn next(&mut self, name: &str) -> bool {
        match self {
            Self::Anything => true,
            Self::EmptyOnly => false,
            Self::Automaton { automaton, state } => {
                let matched: BTreeSet<usize> = automaton
                    .candidates(state.as_ref())
                    .into_iter()
                    .filter(|&position| automaton.names[position] == name)
                    .collect();
                if matched.is_empty() {
                    return false;
                }
                *state = Some(matched);
                true
            }
        }
    }

    /// True if the element may end here.
    #[must_use]
    pub fn end(&self) -> bool {
        match self {
            Self::Anything | Self::EmptyOnly => true,
            Self::Automaton { automaton, state } => automaton.accepts_end(state.as_ref()),
        }
    }

    /// Sorted names acceptable next, followed by `</element>` if the
    /// element may end here.
    #[must_use]
    pub fn expected(&self, element: &str) -> Vec<String> {
        let mut names: Vec<String> = match self {
            Self::Anything | Self::EmptyOnly => Vec::new(),
            Self::Automaton { automaton, state } => automaton
                .candidates(state.as_ref())
                .into_iter()
                .map(|position| automaton.names[position].clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };
        if self.end() {
            names.push(format!("</{element}>"));
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(cp: &ContentParticle) -> ModelCursor {
        ModelCursor::new(Arc::new(Automaton::new(cp)))
    }

    #[test]
    fn test_choice_one_or_more() {
        let cp = ContentParticle::choice(vec![ContentParticle::name("b"), ContentParticle::name("c")])
            .with_occurrence(Occurrence::OneOrMore);
        let mut cursor = cursor(&cp);
        assert!(!cursor.end());
        assert!(cursor.next("c"));
        assert!(cursor.next("b"));
        assert!(!cursor.next("d"));
        assert!(cursor.end());
        assert_eq!(cursor.expected("a"), vec!["b", "c", "</a>"]);
    }

    #[test]
    fn test_sequence_with_optional() {
        // (a, b?, (c | d)+)
        let cp = ContentParticle::sequence(vec![
            ContentParticle::name("a"),
            ContentParticle::name("b").with_occurrence(Occurrence::ZeroOrOne),
            ContentParticle::choice(vec![ContentParticle::name("c"), ContentParticle::name("d")])
                .with_occurrence(Occurrence::OneOrMore),
        ]);
        let mut cursor = cursor(&cp);
        assert!(cursor.next("a"));
        assert!(!cursor.end());
        assert!(cursor.next("d"));
        assert!(cursor.next("c"));
        assert!(cursor.end());
        assert!(!cursor.next("b"));
    }

    #[test]
    fn test_non_deterministic_model_still_validates() {
        // ((a, b) | (a, c))
        let cp = ContentParticle::choice(vec![
            ContentParticle::sequence(vec![ContentParticle::name("a"), ContentParticle::name("b")]),
            ContentParticle::sequence(vec![ContentParticle::name("a"), ContentParticle::name("c")]),
        ]);
        let automaton = Automaton::new(&cp);
        assert!(!automaton.is_deterministic());
        let mut cursor = ModelCursor::new(Arc::new(automaton));
        assert!(cursor.next("a"));
        assert!(cursor.next("c"));
        assert!(cursor.end());
    }

    #[test]
    fn test_pcdata_only_mixed() {
        let cp = ContentParticle::choice(Vec::new()).with_occurrence(Occurrence::ZeroOrMore);
        let mut cursor = cursor(&cp);
        assert!(cursor.end());
        assert!(!cursor.next("b"));
        assert!(Automaton::new(&cp).is_deterministic());
    }
}
