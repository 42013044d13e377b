//! Binding a call site's arguments to the signatures of a callable.
//!
//! Overloads are tried in declaration order and the first feasible one
//! wins: the arguments must fit the parameter list shape and each
//! argument type must unify with its parameter's annotation. When no
//! overload is feasible but an implementation signature exists, the
//! call is bound loosely to the implementation (shape only); callers
//! report that case as a call issue.

use crate::Db;
use crate::types::call::{Argument, CallArguments, CallError};
use crate::types::generics::{SpecializationBuilder, map_typevars, replace_unbound_typevars};
use crate::types::signatures::{Parameter, ParameterKind, Signature};
use crate::types::{CallableType, Type};

/// The result of successfully binding a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallBinding {
    return_type: Type,
    matched_overload: Option<usize>,
}

impl CallBinding {
    pub fn return_type(&self) -> Type {
        self.return_type
    }

    /// The index of the overload that matched, in declaration order.
    /// `None` means the call fell back to the implementation signature
    /// without matching any overload.
    pub fn matched_overload(&self) -> Option<usize> {
        self.matched_overload
    }

    pub fn used_fallback(&self) -> bool {
        self.matched_overload.is_none()
    }
}

/// Binds `arguments` against `callable`.
pub fn bind_call(
    db: &dyn Db,
    callable: &CallableType,
    arguments: &CallArguments,
) -> Result<CallBinding, CallError> {
    let _span =
        tracing::trace_span!("bind_call", overloads = callable.signatures().len()).entered();

    for (index, signature) in callable.signatures().iter().enumerate() {
        let Some(matches) = match_parameters(signature, arguments) else {
            continue;
        };
        let Some(return_type) = check_types(db, signature, arguments, &matches) else {
            continue;
        };
        return Ok(CallBinding {
            return_type,
            matched_overload: Some(index),
        });
    }

    if callable.is_overloaded() {
        let implementation = callable.implementation().cloned().unwrap_or_else(|| {
            synthesized_implementation(db, callable)
        });
        if match_parameters(&implementation, arguments).is_some() {
            let return_type = implementation
                .return_type()
                .map_or(Type::unknown(), |return_type| {
                    map_typevars(db, return_type, &mut |_| Some(Type::unknown()))
                });
            return Ok(CallBinding {
                return_type,
                matched_overload: None,
            });
        }
    }

    Err(CallError::NoMatchingOverload {
        candidates: callable
            .signatures()
            .iter()
            .map(|signature| format!("`{}`", signature.display(db)))
            .collect(),
    })
}

/// Matches the shape of the argument list against the parameter list:
/// which parameter does each argument land on? Returns `None` when the
/// shapes are incompatible. An entry of `None` means the argument was
/// absorbed by a variadic parameter (or a gradual parameter list).
fn match_parameters(signature: &Signature, arguments: &CallArguments) -> Option<Vec<Option<usize>>> {
    let parameters = signature.parameters();
    if parameters.is_gradual() {
        return Some(vec![None; arguments.len()]);
    }

    let mut matches: Vec<Option<usize>> = Vec::with_capacity(arguments.len());
    let mut filled = vec![false; parameters.len()];
    let mut next_positional = 0;

    for argument in arguments.iter() {
        match argument {
            Argument::Positional(_) => {
                let positional_index = parameters
                    .iter()
                    .enumerate()
                    .skip(next_positional)
                    .find(|(_, parameter)| {
                        parameter.is_positional_only()
                            || matches!(parameter.kind(), ParameterKind::PositionalOrKeyword { .. })
                    })
                    .map(|(index, _)| index);
                match positional_index {
                    Some(index) => {
                        filled[index] = true;
                        next_positional = index + 1;
                        matches.push(Some(index));
                    }
                    // A positional argument never lands on a
                    // keyword-only parameter.
                    None => match parameters.iter().position(Parameter::is_variadic) {
                        Some(index) => matches.push(Some(index)),
                        None => return None,
                    },
                }
            }
            Argument::Keyword { name, .. } => match parameters.keyword_by_name(name) {
                Some((index, _)) => {
                    if filled[index] {
                        return None;
                    }
                    filled[index] = true;
                    matches.push(Some(index));
                }
                None => match parameters
                    .iter()
                    .position(Parameter::is_keyword_variadic)
                {
                    Some(index) => matches.push(Some(index)),
                    None => return None,
                },
            },
        }
    }

    // Every parameter without a default must have been filled.
    for (index, parameter) in parameters.iter().enumerate() {
        if !filled[index] && !parameter.is_optional() {
            return None;
        }
    }

    Some(matches)
}

/// Unifies the matched arguments against the signature's annotations.
/// Returns the specialized return type on success.
fn check_types(
    db: &dyn Db,
    signature: &Signature,
    arguments: &CallArguments,
    matches: &[Option<usize>],
) -> Option<Type> {
    let parameters = signature.parameters();
    let mut builder = SpecializationBuilder::default();
    for (argument, parameter_index) in arguments.iter().zip(matches) {
        let Some(parameter_index) = parameter_index else {
            continue;
        };
        let parameter = parameters.get(*parameter_index)?;
        let Some(annotated) = parameter.annotated_type() else {
            continue;
        };
        builder.infer(db, annotated, argument.ty()).ok()?;
    }
    let specialization = builder.build();

    Some(signature.return_type().map_or(Type::unknown(), |return_type| {
        replace_unbound_typevars(db, return_type, &specialization, Type::unknown())
    }))
}

/// Synthesizes an implementation signature for an overloaded callable
/// that has none, by merging the overloads positionwise.
///
/// Each overload's type variables are first renamed to canonical ones
/// in order of first appearance, so that two overloads using the same
/// variable in the same structural position contribute one variable to
/// the merged type rather than a union of alpha-equivalent copies.
pub(crate) fn synthesized_implementation(db: &dyn Db, callable: &CallableType) -> Signature {
    use crate::types::signatures::Parameters;

    let canonical: Vec<Signature> = callable
        .signatures()
        .iter()
        .map(|signature| canonicalize_signature(db, signature))
        .collect();

    let Some(longest) = canonical
        .iter()
        .max_by_key(|signature| signature.parameters().len())
    else {
        return Signature::new(Parameters::gradual_form(), Some(Type::unknown()));
    };

    // Overloads merge positionally over their common prefix; a shorter
    // overload simply lacks the trailing positions, which then become
    // optional in the merged signature. Only kind conflicts within the
    // prefix force the gradual form.
    let mergeable = canonical.iter().all(|signature| {
        !signature.parameters().is_gradual()
            && signature
                .parameters()
                .iter()
                .zip(longest.parameters().iter())
                .all(|(a, b)| {
                    std::mem::discriminant(a.kind()) == std::mem::discriminant(b.kind())
                })
    });

    let return_type = Some(Type::union(
        db,
        canonical
            .iter()
            .map(|signature| signature.return_type().unwrap_or(Type::unknown())),
    ));

    if !mergeable {
        return Signature::new(Parameters::gradual_form(), return_type);
    }

    let parameters = longest
        .parameters()
        .iter()
        .enumerate()
        .map(|(index, parameter)| {
            let mut in_every_overload = true;
            let annotated = Type::union(
                db,
                canonical
                    .iter()
                    .filter_map(|signature| match signature.parameters().get(index) {
                        Some(parameter) => {
                            Some(parameter.annotated_type().unwrap_or(Type::unknown()))
                        }
                        None => {
                            in_every_overload = false;
                            None
                        }
                    }),
            );
            let merged = parameter.clone().with_annotated_type(annotated);
            if in_every_overload {
                merged
            } else {
                merged.with_default_type(annotated)
            }
        })
        .collect::<Vec<_>>();
    Signature::new(Parameters::new(parameters), return_type)
}

/// Renames the type variables of a signature to the canonical sequence,
/// in order of first appearance across parameters then return type.
fn canonicalize_signature(db: &dyn Db, signature: &Signature) -> Signature {
    use crate::types::intern::TypeVarId;

    let mut mapping: Vec<(TypeVarId, TypeVarId)> = Vec::new();
    let mut next = 0;
    signature.map_types(&mut |ty| {
        map_typevars(db, ty, &mut |typevar| {
            let canonical = mapping
                .iter()
                .find(|(original, _)| *original == typevar)
                .map(|(_, canonical)| *canonical)
                .unwrap_or_else(|| {
                    let canonical = db.types().canonical_typevar(next);
                    next += 1;
                    mapping.push((typevar, canonical));
                    canonical
                });
            Some(Type::TypeVar(canonical))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ModuleDb;
    use crate::name::Name;
    use crate::types::generics::TypeVarType;
    use crate::types::signatures::Parameters;
    use crate::types::{CallableType, KnownClass};

    fn pos(name: &'static str, ty: Type) -> Parameter {
        Parameter::positional_or_keyword(Name::new_static(name)).with_annotated_type(ty)
    }

    #[test]
    fn simple_call_binds_and_returns() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);

        let callable = CallableType::single(Signature::new(
            Parameters::new([pos("x", int)]),
            Some(str_ty),
        ));

        let binding = bind_call(&db, &callable, &CallArguments::none().with_positional(int))
            .expect("call should bind");
        assert_eq!(binding.return_type(), str_ty);
        assert_eq!(binding.matched_overload(), Some(0));

        assert!(matches!(
            bind_call(&db, &callable, &CallArguments::none().with_positional(str_ty)),
            Err(CallError::NoMatchingOverload { .. })
        ));
    }

    #[test]
    fn keyword_arguments_bind_by_name() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);

        let callable = CallableType::single(Signature::new(
            Parameters::new([pos("x", int), pos("y", int)]),
            Some(int),
        ));

        let arguments = CallArguments::none()
            .with_positional(int)
            .with_keyword("y", int);
        assert!(bind_call(&db, &callable, &arguments).is_ok());

        // `x` passed twice.
        let arguments = CallArguments::none()
            .with_positional(int)
            .with_keyword("x", int);
        assert!(matches!(
            bind_call(&db, &callable, &arguments),
            Err(CallError::NoMatchingOverload { .. })
        ));

        // Unknown keyword.
        let arguments = CallArguments::none()
            .with_positional(int)
            .with_keyword("z", int);
        assert!(matches!(
            bind_call(&db, &callable, &arguments),
            Err(CallError::NoMatchingOverload { .. })
        ));
    }

    #[test]
    fn failed_call_reports_the_candidate_signatures() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);

        let callable = CallableType::overloaded(
            [
                Signature::new(Parameters::new([pos("x", int)]), Some(int)),
                Signature::new(Parameters::new([pos("x", str_ty)]), Some(str_ty)),
            ],
            None,
        );

        let error = bind_call(&db, &callable, &CallArguments::none())
            .expect_err("no overload accepts zero arguments");
        let message = error.to_string();
        assert!(message.contains("(x: int) -> int"));
        assert!(message.contains("(x: str) -> str"));
    }

    #[test]
    fn missing_required_argument_fails() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);

        let callable = CallableType::single(Signature::new(
            Parameters::new([pos("x", int), pos("y", int).with_default_type(Type::IntLiteral(0))]),
            Some(int),
        ));

        assert!(bind_call(&db, &callable, &CallArguments::none().with_positional(int)).is_ok());
        assert!(matches!(
            bind_call(&db, &callable, &CallArguments::none()),
            Err(CallError::NoMatchingOverload { .. })
        ));
    }

    #[test]
    fn positional_argument_never_fills_a_keyword_only_parameter() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);

        let callable = CallableType::single(Signature::new(
            Parameters::new([
                Parameter::keyword_only(Name::new_static("x")).with_annotated_type(int),
            ]),
            Some(int),
        ));

        assert!(matches!(
            bind_call(&db, &callable, &CallArguments::none().with_positional(int)),
            Err(CallError::NoMatchingOverload { .. })
        ));
        assert!(bind_call(&db, &callable, &CallArguments::none().with_keyword("x", int)).is_ok());
    }

    #[test]
    fn variadic_parameters_absorb_extra_arguments() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);

        let callable = CallableType::single(Signature::new(
            Parameters::new([
                pos("x", int),
                Parameter::variadic(Name::new_static("args")).with_annotated_type(int),
                Parameter::keyword_variadic(Name::new_static("kwargs")).with_annotated_type(int),
            ]),
            Some(int),
        ));

        let arguments = CallArguments::none()
            .with_positional(int)
            .with_positional(int)
            .with_positional(int)
            .with_keyword("extra", int);
        assert!(bind_call(&db, &callable, &arguments).is_ok());
    }

    #[test]
    fn overloads_resolve_in_declaration_order() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);
        let bool_ty = KnownClass::Bool.to_instance(&db);

        // `bool` fits both overloads; the first one declared must win.
        let callable = CallableType::overloaded(
            [
                Signature::new(Parameters::new([pos("x", int)]), Some(int)),
                Signature::new(Parameters::new([pos("x", int)]), Some(str_ty)),
            ],
            None,
        );
        let binding =
            bind_call(&db, &callable, &CallArguments::none().with_positional(bool_ty))
                .expect("call should bind");
        assert_eq!(binding.matched_overload(), Some(0));
        assert_eq!(binding.return_type(), int);
    }

    #[test]
    fn generic_call_specializes_the_return_type() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));

        let callable = CallableType::single(Signature::new(
            Parameters::new([pos("x", Type::TypeVar(t))]),
            Some(Type::TypeVar(t)),
        ));

        let binding = bind_call(&db, &callable, &CallArguments::none().with_positional(int))
            .expect("call should bind");
        assert_eq!(binding.return_type(), int);
    }

    #[test]
    fn unbound_return_typevar_resolves_to_unknown() {
        let db = ModuleDb::new();
        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));

        let callable = CallableType::single(Signature::new(
            Parameters::new([]),
            Some(Type::TypeVar(t)),
        ));

        let binding = bind_call(&db, &callable, &CallArguments::none())
            .expect("call should bind");
        assert_eq!(binding.return_type(), Type::unknown());
    }

    #[test]
    fn loose_fallback_to_the_implementation() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);
        let object = Type::object(&db);

        let callable = CallableType::overloaded(
            [
                Signature::new(Parameters::new([pos("x", int)]), Some(int)),
                Signature::new(Parameters::new([pos("x", str_ty)]), Some(str_ty)),
            ],
            Some(Signature::new(Parameters::new([pos("x", object)]), Some(object))),
        );

        // `None` matches neither overload, but the implementation's
        // shape accepts one argument.
        let binding =
            bind_call(&db, &callable, &CallArguments::none().with_positional(Type::None))
                .expect("fallback should bind");
        assert!(binding.used_fallback());
        assert_eq!(binding.return_type(), object);

        // Shape mismatches fail even against the implementation.
        assert!(matches!(
            bind_call(&db, &callable, &CallArguments::none()),
            Err(CallError::NoMatchingOverload { .. })
        ));
    }

    #[test]
    fn synthesized_implementation_merges_alpha_equivalent_typevars() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);

        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));
        let u = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("U")));

        // Both overloads return their (alpha-equivalent) type variable.
        let callable = CallableType::overloaded(
            [
                Signature::new(
                    Parameters::new([pos("x", int), pos("f", Type::TypeVar(t))]),
                    Some(Type::TypeVar(t)),
                ),
                Signature::new(
                    Parameters::new([pos("x", str_ty), pos("f", Type::TypeVar(u))]),
                    Some(Type::TypeVar(u)),
                ),
            ],
            None,
        );

        let implementation = synthesized_implementation(&db, &callable);
        let canonical = Type::TypeVar(db.types().canonical_typevar(0));
        // A single canonical variable, not a union of two copies.
        assert_eq!(implementation.return_type(), Some(canonical));
        assert_eq!(
            implementation.parameters().get(1).unwrap().annotated_type(),
            Some(canonical)
        );
        assert_eq!(
            implementation.parameters().get(0).unwrap().annotated_type(),
            Some(Type::union(&db, [int, str_ty]))
        );
    }

    #[test]
    fn arity_mismatched_overloads_merge_over_the_common_prefix() {
        let db = ModuleDb::new();

        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));
        let u = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("U")));

        // `(x: T, /) -> T` and `(x: U, y: U, /) -> U`.
        let callable = CallableType::overloaded(
            [
                Signature::new(
                    Parameters::new([Parameter::positional_only(Some(Name::new_static("x")))
                        .with_annotated_type(Type::TypeVar(t))]),
                    Some(Type::TypeVar(t)),
                ),
                Signature::new(
                    Parameters::new([
                        Parameter::positional_only(Some(Name::new_static("x")))
                            .with_annotated_type(Type::TypeVar(u)),
                        Parameter::positional_only(Some(Name::new_static("y")))
                            .with_annotated_type(Type::TypeVar(u)),
                    ]),
                    Some(Type::TypeVar(u)),
                ),
            ],
            None,
        );

        let implementation = synthesized_implementation(&db, &callable);
        assert!(!implementation.parameters().is_gradual());

        let canonical = Type::TypeVar(db.types().canonical_typevar(0));
        assert_eq!(
            implementation.parameters().get(0).unwrap().annotated_type(),
            Some(canonical)
        );
        // The trailing position is required by only one overload.
        let second = implementation.parameters().get(1).unwrap();
        assert_eq!(second.annotated_type(), Some(canonical));
        assert!(second.is_optional());
        assert_eq!(implementation.return_type(), Some(canonical));
    }

    #[test]
    fn calling_a_dataclass_binds_the_synthesized_init() {
        use crate::types::class::{Base, Class, ClassFlags, Declaration};

        let mut db = ModuleDb::new();
        let object = db.object_class();
        let int = KnownClass::Int.to_instance(&db);

        let point = db.add_class(
            Class::new("Point")
                .with_bases([Base::class(object)])
                .with_flags(ClassFlags::DATACLASS)
                .with_member("x", Declaration::variable(int))
                .with_member("y", Declaration::variable(int)),
        );

        let callable = Type::ClassLiteral(point)
            .into_callable(&db)
            .expect("class literals are callable");
        let arguments = CallArguments::none()
            .with_positional(int)
            .with_keyword("y", int);
        let binding = bind_call(&db, &callable, &arguments).expect("constructor should bind");
        assert_eq!(binding.return_type(), Type::instance(point));

        // A missing field is a missing required argument.
        assert!(matches!(
            bind_call(&db, &callable, &CallArguments::none().with_positional(int)),
            Err(CallError::NoMatchingOverload { .. })
        ));
    }

    #[test]
    fn fallback_through_synthesized_implementation_returns_unknown() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);

        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));

        let callable = CallableType::overloaded(
            [
                Signature::new(Parameters::new([pos("x", int)]), Some(Type::TypeVar(t))),
                Signature::new(Parameters::new([pos("x", str_ty)]), Some(Type::TypeVar(t))),
            ],
            None,
        );

        let binding =
            bind_call(&db, &callable, &CallArguments::none().with_positional(Type::None))
                .expect("fallback should bind");
        assert!(binding.used_fallback());
        assert_eq!(binding.return_type(), Type::unknown());
    }
}
