//! Call resolution: matching argument lists against callables.

use thiserror::Error;

use crate::name::Name;
use crate::types::Type;

pub(crate) mod bind;

pub use bind::{CallBinding, bind_call};

/// One argument at a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Positional(Type),
    Keyword { name: Name, ty: Type },
}

impl Argument {
    pub(crate) fn ty(&self) -> Type {
        match self {
            Argument::Positional(ty) => *ty,
            Argument::Keyword { ty, .. } => *ty,
        }
    }
}

/// The argument list of a call site, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArguments {
    arguments: Vec<Argument>,
}

impl CallArguments {
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_positional(mut self, ty: Type) -> Self {
        self.arguments.push(Argument::Positional(ty));
        self
    }

    #[must_use]
    pub fn with_keyword(mut self, name: impl Into<Name>, ty: Type) -> Self {
        self.arguments.push(Argument::Keyword {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Argument> {
        self.arguments.iter()
    }
}

impl FromIterator<Argument> for CallArguments {
    fn from_iter<T: IntoIterator<Item = Argument>>(iter: T) -> Self {
        Self {
            arguments: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The arguments fit no overload of the callee, and no
    /// implementation signature could absorb them either. Carries the
    /// rendered signatures that were tried, for the diagnostic.
    #[error(
        "no overload of the callable matches the given arguments; tried {}",
        .candidates.join(", ")
    )]
    NoMatchingOverload { candidates: Vec<String> },
}
