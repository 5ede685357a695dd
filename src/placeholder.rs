use std::fmt::{self, Display};

use crate::TypeHint;

/// A typed stand-in for a value that is supplied later.
///
/// The builder never resolves a placeholder; it only checks that the slot it
/// lands in accepts the placeholder's type, then passes it through.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    hint: TypeHint,
}

impl Placeholder {
    /// A placeholder for a value of type `hint`.
    pub fn new(hint: TypeHint) -> Self {
        Self { hint }
    }

    /// The type of the value this placeholder stands for.
    pub fn type_hint(&self) -> &TypeHint {
        &self.hint
    }

    /// Whether the placeholder may fill a slot annotated with `candidate`.
    pub fn match_type_hint(&self, candidate: &TypeHint) -> bool {
        self.hint.is_subtype_of(candidate)
    }
}

impl Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Placeholder[{}]", self.hint)
    }
}
