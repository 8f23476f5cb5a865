//! The stack of open entities.
//!
//! [§ 4 Physical Structures](https://www.w3.org/TR/xml/#sec-physical-struct)
//!
//! "An XML document may consist of one or many storage units. These are
//! called entities; they all have content and are all (except for the
//! document entity and the external DTD subset) identified by entity name."
//!
//! The parser reads characters from the [`EntityStack`]. Opening a reference
//! pushes a fresh [`Entity`]; an exhausted entity is popped (and dropped)
//! automatically so the parser sees one continuous character stream, and
//! uses [`EntityId`]s to check that constructs begin and end in the same
//! entity.

use std::collections::VecDeque;
use std::fmt;

use marten_common::url::Url;

use crate::error::{EncodingError, Position};
use crate::source::CharacterSource;

/// Parse-local identity of one opened entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(u64);

/// What an open entity was opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    /// The document entity.
    Document,
    /// The external DTD subset.
    ExternalSubset,
    /// A general entity, by name.
    General(String),
    /// A parameter entity, by name.
    Parameter(String),
    /// An anonymous literal, e.g. an attribute default being re-read.
    Literal,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document entity"),
            Self::ExternalSubset => f.write_str("external subset"),
            Self::General(name) => write!(f, "&{name};"),
            Self::Parameter(name) => write!(f, "%{name};"),
            Self::Literal => f.write_str("literal"),
        }
    }
}

/// An opened entity: a character source plus what it was opened for.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    location: Option<Url>,
    source: CharacterSource,
    external: bool,
    /// The entities whose references led to this one, outermost first.
    ancestors: Vec<EntityKind>,
    /// Emit one space after the last character.
    trailing_space: bool,
    in_padding: bool,
    opened_in_decl_sep: bool,
}

impl Entity {
    /// Wrap an opened source.
    #[must_use]
    pub const fn new(
        id: EntityId,
        kind: EntityKind,
        source: CharacterSource,
        location: Option<Url>,
        external: bool,
    ) -> Self {
        Self {
            id,
            kind,
            location,
            source,
            external,
            ancestors: Vec::new(),
            trailing_space: false,
            in_padding: false,
            opened_in_decl_sep: false,
        }
    }

    /// [§ 4.4.8 Included as PE](https://www.w3.org/TR/xml/#as-PE)
    ///
    /// "its replacement text MUST be enlarged by the attachment of one
    /// leading and one following space (#x20) character". This sets up the
    /// following space; the leading one is pushed back by the caller.
    #[must_use]
    pub fn with_trailing_space(mut self) -> Self {
        self.trailing_space = true;
        if self.source.current().is_none() {
            self.in_padding = true;
        }
        self
    }

    /// Record the chain of entities that referenced this one.
    #[must_use]
    pub fn with_ancestors(mut self, ancestors: Vec<EntityKind>) -> Self {
        self.ancestors = ancestors;
        self
    }

    /// This entity's identity.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// What this entity was opened for.
    #[must_use]
    pub const fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Where the entity was read from, if anywhere.
    #[must_use]
    pub const fn location(&self) -> Option<&Url> {
        self.location.as_ref()
    }

    /// Set the location relative identifiers resolve against.
    pub fn set_location(&mut self, location: Url) {
        self.location = Some(location);
    }

    /// True for the document entity and entities read from a location.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        self.external
    }

    /// The underlying source, for encoding changes.
    pub const fn source_mut(&mut self) -> &mut CharacterSource {
        &mut self.source
    }

    /// The underlying source.
    #[must_use]
    pub const fn source(&self) -> &CharacterSource {
        &self.source
    }

    /// True if this entity was opened by a PE reference in a DeclSep.
    #[must_use]
    pub const fn opened_in_decl_sep(&self) -> bool {
        self.opened_in_decl_sep
    }

    fn current(&self) -> Option<char> {
        if self.in_padding {
            Some(' ')
        } else {
            self.source.current()
        }
    }

    fn advance(&mut self) -> Result<(), EncodingError> {
        if self.in_padding {
            self.in_padding = false;
            self.trailing_space = false;
            return Ok(());
        }
        self.source.advance()?;
        if self.source.current().is_none() && self.trailing_space {
            self.in_padding = true;
        }
        Ok(())
    }

    fn is_exhausted(&self) -> bool {
        self.current().is_none()
    }
}

/// Identity of the entity a construct started in, and whether that entity
/// was opened in a DeclSep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityMark {
    /// The entity the construct started in.
    pub id: EntityId,
    /// True if it was opened by a PE reference between declarations.
    pub decl_sep: bool,
}

/// The current entity, its suspended ancestors, and a pushback buffer read
/// before either.
#[derive(Debug)]
pub struct EntityStack {
    current: Entity,
    suspended: Vec<Entity>,
    /// Pushed-back characters, read before the current entity.
    lookahead: VecDeque<char>,
    next_id: u64,
}

impl EntityStack {
    /// Start a stack with the document entity. Use
    /// [`EntityStack::first_id`] for its id.
    #[must_use]
    pub const fn new(document: Entity) -> Self {
        Self {
            current: document,
            suspended: Vec::new(),
            lookahead: VecDeque::new(),
            next_id: 1,
        }
    }

    /// The id reserved for the entity passed to [`EntityStack::new`].
    #[must_use]
    pub const fn first_id() -> EntityId {
        EntityId(0)
    }

    /// A fresh id for an entity about to be pushed.
    pub const fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Suspend the current entity and make `entity` current.
    ///
    /// An entity that is already exhausted is dropped without being pushed.
    pub fn push(&mut self, entity: Entity) {
        if entity.is_exhausted() {
            return;
        }
        let previous = std::mem::replace(&mut self.current, entity);
        self.suspended.push(previous);
    }

    /// Drop exhausted entities until the current one has characters left
    /// or it is the last one.
    pub fn pop_until_nonempty(&mut self) {
        while self.current.is_exhausted() {
            let Some(previous) = self.suspended.pop() else {
                break;
            };
            self.current = previous;
        }
    }

    /// Push `text` back so it is read next, before the current character.
    pub fn pushback(&mut self, text: &str) {
        for c in text.chars().rev() {
            self.lookahead.push_front(c);
        }
    }

    /// The character the parser is positioned on.
    #[must_use]
    pub fn current_char(&self) -> Option<char> {
        self.lookahead
            .front()
            .copied()
            .or_else(|| self.current.current())
    }

    /// Move past the current character.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodingError`] if the entity cannot decode its next
    /// character.
    pub fn advance(&mut self) -> Result<(), EncodingError> {
        if self.lookahead.pop_front().is_some() {
            return Ok(());
        }
        self.current.advance()?;
        self.pop_until_nonempty();
        Ok(())
    }

    /// True if pushed-back characters are pending.
    #[must_use]
    pub fn has_lookahead(&self) -> bool {
        !self.lookahead.is_empty()
    }

    /// The entity being read.
    #[must_use]
    pub const fn current(&self) -> &Entity {
        &self.current
    }

    /// The entity being read, mutably.
    pub const fn current_mut(&mut self) -> &mut Entity {
        &mut self.current
    }

    /// The nearest open entity that is external (the document entity at
    /// the latest).
    #[must_use]
    pub fn current_external(&self) -> &Entity {
        std::iter::once(&self.current)
            .chain(self.suspended.iter().rev())
            .find(|entity| entity.external)
            .unwrap_or(&self.current)
    }

    /// The current entity and every entity whose reference led to it.
    ///
    /// Unlike the suspended stack this survives the popping of an entity
    /// whose last character was a reference, so a reference found here is
    /// a cycle even when the referring entity has already been dropped.
    #[must_use]
    pub fn branch(&self) -> Vec<EntityKind> {
        let mut branch = self.current.ancestors.clone();
        branch.push(self.current.kind.clone());
        branch
    }

    /// Number of suspended entities.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.suspended.len()
    }

    /// Mark the current entity as opened in a DeclSep.
    pub const fn flag_decl_sep(&mut self) {
        self.current.opened_in_decl_sep = true;
    }

    /// Identity of the current entity, for nesting checks.
    #[must_use]
    pub const fn mark(&self) -> EntityMark {
        EntityMark {
            id: self.current.id,
            decl_sep: self.current.opened_in_decl_sep,
        }
    }

    /// Where the parser is, for error messages.
    #[must_use]
    pub fn position(&self) -> Position {
        let entity = match &self.current.kind {
            EntityKind::Document => None,
            kind => Some(kind.to_string()),
        };
        Position {
            entity,
            line: self.current.source.line(),
            column: self.current.source.column(),
        }
    }
}
