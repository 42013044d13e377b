//! Callable signatures: parameter lists, parameter kinds, and return types.

use crate::Db;
use crate::name::Name;
use crate::types::Type;
use crate::types::display::DisplaySignature;

/// A single signature of a callable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    parameters: Parameters,

    /// The annotated return type. `None` means unannotated, which behaves
    /// like `Unknown` in every check.
    return_ty: Option<Type>,
}

impl Signature {
    pub fn new(parameters: Parameters, return_ty: Option<Type>) -> Self {
        Self {
            parameters,
            return_ty,
        }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn return_type(&self) -> Option<Type> {
        self.return_ty
    }

    pub fn display<'db>(&'db self, db: &'db dyn Db) -> DisplaySignature<'db> {
        DisplaySignature::new(db, self)
    }

    /// Rewrites every annotated type through `f`.
    #[must_use]
    pub(crate) fn map_types(&self, f: &mut dyn FnMut(Type) -> Type) -> Signature {
        Signature {
            parameters: Parameters {
                value: self
                    .parameters
                    .value
                    .iter()
                    .map(|parameter| Parameter {
                        annotated_ty: parameter.annotated_ty.map(&mut *f),
                        kind: parameter.kind.clone(),
                    })
                    .collect(),
                is_gradual: self.parameters.is_gradual,
            },
            return_ty: self.return_ty.map(f),
        }
    }
}

/// The parameter list of a signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Parameters {
    value: Vec<Parameter>,

    /// Whether this parameter list is the gradual form (`...`), which
    /// accepts any arguments.
    is_gradual: bool,
}

impl Parameters {
    pub fn new(parameters: impl IntoIterator<Item = Parameter>) -> Self {
        Self {
            value: parameters.into_iter().collect(),
            is_gradual: false,
        }
    }

    /// `(*args: Any, **kwargs: Any)`, the parameter list written `...`.
    pub fn gradual_form() -> Self {
        Self {
            value: vec![
                Parameter::variadic(Name::new_static("args")).with_annotated_type(Type::any()),
                Parameter::keyword_variadic(Name::new_static("kwargs"))
                    .with_annotated_type(Type::any()),
            ],
            is_gradual: true,
        }
    }

    pub fn is_gradual(&self) -> bool {
        self.is_gradual
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.value.iter()
    }

    /// Parameters fillable by position, in order.
    pub(crate) fn positional(&self) -> impl Iterator<Item = &Parameter> {
        self.value.iter().filter(|parameter| {
            matches!(
                parameter.kind,
                ParameterKind::PositionalOnly { .. } | ParameterKind::PositionalOrKeyword { .. }
            )
        })
    }

    pub(crate) fn variadic(&self) -> Option<&Parameter> {
        self.value
            .iter()
            .find(|parameter| matches!(parameter.kind, ParameterKind::Variadic { .. }))
    }

    pub(crate) fn keyword_variadic(&self) -> Option<&Parameter> {
        self.value
            .iter()
            .find(|parameter| matches!(parameter.kind, ParameterKind::KeywordVariadic { .. }))
    }

    /// The parameter addressable by keyword `name`, if any. Positional-only
    /// parameter names never participate in keyword matching.
    pub(crate) fn keyword_by_name(&self, name: &str) -> Option<(usize, &Parameter)> {
        self.value
            .iter()
            .enumerate()
            .find(|(_, parameter)| match &parameter.kind {
                ParameterKind::PositionalOrKeyword { name: n, .. }
                | ParameterKind::KeywordOnly { name: n, .. } => n == name,
                _ => false,
            })
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Parameter> {
        self.value.get(index)
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Parameter {
    /// The annotated type. `None` means unannotated.
    annotated_ty: Option<Type>,

    kind: ParameterKind,
}

impl Parameter {
    pub fn positional_only(name: Option<Name>) -> Self {
        Self {
            annotated_ty: None,
            kind: ParameterKind::PositionalOnly {
                name,
                default_ty: None,
            },
        }
    }

    pub fn positional_or_keyword(name: Name) -> Self {
        Self {
            annotated_ty: None,
            kind: ParameterKind::PositionalOrKeyword {
                name,
                default_ty: None,
            },
        }
    }

    pub fn variadic(name: Name) -> Self {
        Self {
            annotated_ty: None,
            kind: ParameterKind::Variadic { name },
        }
    }

    pub fn keyword_only(name: Name) -> Self {
        Self {
            annotated_ty: None,
            kind: ParameterKind::KeywordOnly {
                name,
                default_ty: None,
            },
        }
    }

    pub fn keyword_variadic(name: Name) -> Self {
        Self {
            annotated_ty: None,
            kind: ParameterKind::KeywordVariadic { name },
        }
    }

    #[must_use]
    pub fn with_annotated_type(mut self, ty: Type) -> Self {
        self.annotated_ty = Some(ty);
        self
    }

    #[must_use]
    pub fn with_default_type(mut self, default: Type) -> Self {
        match &mut self.kind {
            ParameterKind::PositionalOnly { default_ty, .. }
            | ParameterKind::PositionalOrKeyword { default_ty, .. }
            | ParameterKind::KeywordOnly { default_ty, .. } => *default_ty = Some(default),
            ParameterKind::Variadic { .. } | ParameterKind::KeywordVariadic { .. } => {
                debug_assert!(false, "variadic parameters cannot have default values");
            }
        }
        self
    }

    pub fn annotated_type(&self) -> Option<Type> {
        self.annotated_ty
    }

    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }

    pub fn name(&self) -> Option<&Name> {
        match &self.kind {
            ParameterKind::PositionalOnly { name, .. } => name.as_ref(),
            ParameterKind::PositionalOrKeyword { name, .. }
            | ParameterKind::Variadic { name }
            | ParameterKind::KeywordOnly { name, .. }
            | ParameterKind::KeywordVariadic { name } => Some(name),
        }
    }

    pub fn default_type(&self) -> Option<Type> {
        match &self.kind {
            ParameterKind::PositionalOnly { default_ty, .. }
            | ParameterKind::PositionalOrKeyword { default_ty, .. }
            | ParameterKind::KeywordOnly { default_ty, .. } => *default_ty,
            ParameterKind::Variadic { .. } | ParameterKind::KeywordVariadic { .. } => None,
        }
    }

    pub fn has_default(&self) -> bool {
        self.default_type().is_some()
    }

    pub(crate) fn is_variadic(&self) -> bool {
        matches!(self.kind, ParameterKind::Variadic { .. })
    }

    pub(crate) fn is_keyword_variadic(&self) -> bool {
        matches!(self.kind, ParameterKind::KeywordVariadic { .. })
    }

    pub(crate) fn is_keyword_only(&self) -> bool {
        matches!(self.kind, ParameterKind::KeywordOnly { .. })
    }

    pub(crate) fn is_positional_only(&self) -> bool {
        matches!(self.kind, ParameterKind::PositionalOnly { .. })
    }

    /// Whether a call can omit this parameter.
    pub(crate) fn is_optional(&self) -> bool {
        self.has_default() || self.is_variadic() || self.is_keyword_variadic()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    /// A parameter before `/`: fillable only by position.
    PositionalOnly {
        /// The name is display-only and never matches keywords.
        name: Option<Name>,
        default_ty: Option<Type>,
    },

    PositionalOrKeyword {
        name: Name,
        default_ty: Option<Type>,
    },

    /// `*args`. The annotated type is the element type.
    Variadic { name: Name },

    /// A parameter after `*`: fillable only by keyword.
    KeywordOnly {
        name: Name,
        default_ty: Option<Type>,
    },

    /// `**kwargs`. The annotated type is the value type.
    KeywordVariadic { name: Name },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup_skips_positional_only_names() {
        let parameters = Parameters::new([
            Parameter::positional_only(Some(Name::new_static("x"))),
            Parameter::positional_or_keyword(Name::new_static("y")),
            Parameter::keyword_only(Name::new_static("z")),
        ]);

        assert!(parameters.keyword_by_name("x").is_none());
        assert_eq!(parameters.keyword_by_name("y").map(|(i, _)| i), Some(1));
        assert_eq!(parameters.keyword_by_name("z").map(|(i, _)| i), Some(2));
    }

    #[test]
    fn gradual_form_has_both_variadics() {
        let parameters = Parameters::gradual_form();
        assert!(parameters.is_gradual());
        assert!(parameters.variadic().is_some());
        assert!(parameters.keyword_variadic().is_some());
        assert_eq!(parameters.variadic().and_then(Parameter::annotated_type), Some(Type::any()));
    }

    #[test]
    fn defaults_make_parameters_optional() {
        let required = Parameter::positional_or_keyword(Name::new_static("a"));
        let optional = Parameter::positional_or_keyword(Name::new_static("b"))
            .with_default_type(Type::IntLiteral(0));

        assert!(!required.is_optional());
        assert!(optional.is_optional());
    }
}
