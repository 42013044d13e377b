//! Type variables and specializations of generic classes.

use smallvec::SmallVec;

use crate::Db;
use crate::name::Name;
use crate::types::class::ClassId;
use crate::types::intern::TypeVarId;
use crate::types::variance::TypeVarVariance;
use crate::types::{InstanceType, Type};

/// A type variable, as declared by `TypeVar(...)` or PEP 695 syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeVarType {
    pub name: Name,

    /// Upper bound: every assignment to this variable must be assignable
    /// to the bound.
    pub bound: Option<Type>,

    /// Constraints: the variable stands for exactly one of these types.
    /// Mutually exclusive with `bound`.
    pub constraints: Option<Box<[Type]>>,

    /// Explicitly declared variance. `None` means the variance is inferred
    /// from how the variable is used in the class body.
    pub variance: Option<TypeVarVariance>,

    /// A `TypeVarTuple` (`*Ts`): stands for a whole list of types. Only
    /// valid as the last type parameter of a class, where it absorbs the
    /// remaining type arguments; it has no variance of its own and its
    /// arguments compare invariantly.
    pub variadic: bool,
}

impl TypeVarType {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            bound: None,
            constraints: None,
            variance: None,
            variadic: false,
        }
    }

    /// A variadic type parameter list, `*Ts`.
    pub fn new_variadic(name: Name) -> Self {
        Self {
            variadic: true,
            ..Self::new(name)
        }
    }

    #[must_use]
    pub fn with_bound(mut self, bound: Type) -> Self {
        debug_assert!(self.constraints.is_none());
        self.bound = Some(bound);
        self
    }

    #[must_use]
    pub fn with_constraints(mut self, constraints: impl IntoIterator<Item = Type>) -> Self {
        debug_assert!(self.bound.is_none());
        self.constraints = Some(constraints.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_variance(mut self, variance: TypeVarVariance) -> Self {
        self.variance = Some(variance);
        self
    }
}

/// An assignment of types to the type parameters of a generic class or
/// signature, in parameter order.
///
/// When the last type parameter is variadic, every type argument past the
/// fixed parameters belongs to its packed tail; the two lists then differ
/// in length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Specialization {
    typevars: Box<[TypeVarId]>,
    types: Box<[Type]>,
    variadic: bool,
}

impl Specialization {
    pub fn new(
        typevars: impl IntoIterator<Item = TypeVarId>,
        types: impl IntoIterator<Item = Type>,
    ) -> Self {
        let typevars: Box<[TypeVarId]> = typevars.into_iter().collect();
        let types: Box<[Type]> = types.into_iter().collect();
        debug_assert_eq!(typevars.len(), types.len());
        Self {
            typevars,
            types,
            variadic: false,
        }
    }

    /// A specialization whose last type parameter is variadic and binds
    /// the tail of `types`, which may be empty.
    pub fn new_variadic(
        typevars: impl IntoIterator<Item = TypeVarId>,
        types: impl IntoIterator<Item = Type>,
    ) -> Self {
        let typevars: Box<[TypeVarId]> = typevars.into_iter().collect();
        let types: Box<[Type]> = types.into_iter().collect();
        debug_assert!(!typevars.is_empty());
        debug_assert!(types.len() + 1 >= typevars.len());
        Self {
            typevars,
            types,
            variadic: true,
        }
    }

    /// The specialization of `class` by `arguments`, packing the tail
    /// into a trailing variadic type parameter when the class has one.
    pub fn for_class(
        db: &dyn Db,
        class: ClassId,
        arguments: impl IntoIterator<Item = Type>,
    ) -> Self {
        let typevars = db.classes().class(class).type_params().to_vec();
        let variadic = typevars
            .last()
            .is_some_and(|typevar| db.types().typevar(*typevar).variadic);
        if variadic {
            Self::new_variadic(typevars, arguments)
        } else {
            Self::new(typevars, arguments)
        }
    }

    pub fn typevars(&self) -> &[TypeVarId] {
        &self.typevars
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub(crate) fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// The number of non-variadic type parameters.
    pub(crate) fn fixed_len(&self) -> usize {
        self.typevars.len() - usize::from(self.variadic)
    }

    pub fn get(&self, typevar: TypeVarId) -> Option<Type> {
        let index = self.typevars.iter().position(|tv| *tv == typevar)?;
        // The variadic parameter binds a list, not a single type.
        (index < self.fixed_len()).then(|| self.types[index])
    }

    /// The types bound by the trailing variadic parameter, if `typevar`
    /// is it.
    pub(crate) fn packed_tail(&self, typevar: TypeVarId) -> Option<&[Type]> {
        (self.variadic && self.typevars.last() == Some(&typevar))
            .then(|| &self.types[self.fixed_len()..])
    }

    pub(crate) fn map_types(&self, f: &mut dyn FnMut(Type) -> Type) -> Specialization {
        Specialization {
            typevars: self.typevars.clone(),
            types: self.types.iter().map(|ty| f(*ty)).collect(),
            variadic: self.variadic,
        }
    }

    /// Applies `self` to every type in `other`, yielding the composition
    /// used when walking specializations through an MRO. An occurrence of
    /// `self`'s variadic parameter splices its packed tail in place.
    pub(crate) fn apply_to(&self, db: &dyn Db, other: &Specialization) -> Specialization {
        let mut types = Vec::with_capacity(other.types.len());
        for ty in &other.types {
            if let Type::TypeVar(typevar) = ty {
                if let Some(tail) = self.packed_tail(*typevar) {
                    types.extend_from_slice(tail);
                    continue;
                }
            }
            types.push(apply_specialization(db, *ty, self));
        }
        Specialization {
            typevars: other.typevars.clone(),
            types: types.into(),
            variadic: other.variadic,
        }
    }
}

/// Substitutes the bindings of `specialization` into `ty`.
///
/// Type variables without a binding are left in place.
pub(crate) fn apply_specialization(db: &dyn Db, ty: Type, specialization: &Specialization) -> Type {
    map_typevars(db, ty, &mut |typevar| specialization.get(typevar))
}

/// Substitutes every unbound type variable in `ty` with `replacement`.
///
/// Used for recovery: a call that binds no value for a variable in the
/// return type resolves that variable to `Unknown`.
pub(crate) fn replace_unbound_typevars(
    db: &dyn Db,
    ty: Type,
    specialization: &Specialization,
    replacement: Type,
) -> Type {
    map_typevars(db, ty, &mut |typevar| {
        Some(specialization.get(typevar).unwrap_or(replacement))
    })
}

/// Structurally rewrites the type variables of `ty` via `lookup`.
pub(crate) fn map_typevars(
    db: &dyn Db,
    ty: Type,
    lookup: &mut dyn FnMut(TypeVarId) -> Option<Type>,
) -> Type {
    match ty {
        Type::TypeVar(typevar) => lookup(typevar).unwrap_or(ty),

        Type::Union(union) => {
            let elements = db.types().union_elements(union);
            Type::union(
                db,
                elements
                    .iter()
                    .map(|element| map_typevars(db, *element, lookup)),
            )
        }

        Type::NominalInstance(instance) => {
            let Some(specialization) = instance.specialization else {
                return ty;
            };
            let specialization = db.types().specialization(specialization);
            let mapped = specialization.map_types(&mut |argument| map_typevars(db, argument, lookup));
            Type::NominalInstance(InstanceType {
                class: instance.class,
                specialization: Some(db.types().intern_specialization(mapped)),
            })
        }

        Type::Callable(callable) => {
            let callable = db.types().callable(callable);
            let mapped = callable.map_types(&mut |ty| map_typevars(db, ty, lookup));
            Type::Callable(db.types().intern_callable(mapped))
        }

        _ => ty,
    }
}

/// An error produced when unifying argument types against parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SpecializationError;

/// Incrementally infers a [`Specialization`] by unifying actual types
/// against formal types that may mention type variables.
///
/// Two bindings for the same variable are reconciled by widening to the
/// more general one; mutually non-assignable bindings are a contradiction.
#[derive(Debug, Default)]
pub(crate) struct SpecializationBuilder {
    typevars: SmallVec<[TypeVarId; 4]>,
    types: SmallVec<[Type; 4]>,
}

impl SpecializationBuilder {
    pub(crate) fn infer(
        &mut self,
        db: &dyn Db,
        formal: Type,
        actual: Type,
    ) -> Result<(), SpecializationError> {
        match formal {
            Type::TypeVar(typevar) => self.bind(db, typevar, actual),

            Type::Union(union) => {
                let elements = db.types().union_elements(union);
                // A concrete alternative that already accepts the actual
                // type wins over binding a type variable.
                if elements
                    .iter()
                    .filter(|element| !matches!(element, Type::TypeVar(_)))
                    .any(|element| actual.is_assignable_to(db, *element))
                {
                    return Ok(());
                }
                let mut typevar_elements = elements
                    .iter()
                    .filter(|element| matches!(element, Type::TypeVar(_)));
                match (typevar_elements.next(), typevar_elements.next()) {
                    (Some(element), None) => self.infer(db, *element, actual),
                    _ => {
                        if actual.is_assignable_to(db, formal) {
                            Ok(())
                        } else {
                            Err(SpecializationError)
                        }
                    }
                }
            }

            Type::NominalInstance(formal_instance) => {
                let (Some(formal_spec), Type::NominalInstance(actual_instance)) =
                    (formal_instance.specialization, actual)
                else {
                    return self.check(db, formal, actual);
                };
                // Map the actual instance onto the formal class before
                // unifying the type arguments pairwise.
                let Some(actual_spec) = crate::types::class::specialization_of_base(
                    db,
                    actual_instance,
                    formal_instance.class,
                ) else {
                    return self.check(db, formal, actual);
                };
                let formal_spec = db.types().specialization(formal_spec);
                let Some(actual_spec) = actual_spec else {
                    // The actual type reaches the formal class without
                    // type arguments; nothing to learn.
                    return Ok(());
                };
                for (formal_arg, actual_arg) in
                    formal_spec.types().iter().zip(actual_spec.types())
                {
                    self.infer(db, *formal_arg, *actual_arg)?;
                }
                Ok(())
            }

            Type::Callable(formal_callable) => {
                let Type::Callable(actual_callable) = actual else {
                    return self.check(db, formal, actual);
                };
                let formal_callable = db.types().callable(formal_callable);
                let actual_callable = db.types().callable(actual_callable);
                let (Some(formal_sig), Some(actual_sig)) = (
                    formal_callable.single_signature(),
                    actual_callable.single_signature(),
                ) else {
                    return self.check(db, formal, actual);
                };
                for (formal_param, actual_param) in formal_sig
                    .parameters()
                    .iter()
                    .zip(actual_sig.parameters().iter())
                {
                    if let (Some(formal_ty), Some(actual_ty)) =
                        (formal_param.annotated_type(), actual_param.annotated_type())
                    {
                        self.infer(db, formal_ty, actual_ty)?;
                    }
                }
                if let (Some(formal_return), Some(actual_return)) =
                    (formal_sig.return_type(), actual_sig.return_type())
                {
                    self.infer(db, formal_return, actual_return)?;
                }
                Ok(())
            }

            _ => self.check(db, formal, actual),
        }
    }

    fn check(&self, db: &dyn Db, formal: Type, actual: Type) -> Result<(), SpecializationError> {
        if actual.is_assignable_to(db, formal) {
            Ok(())
        } else {
            Err(SpecializationError)
        }
    }

    fn bind(
        &mut self,
        db: &dyn Db,
        typevar: TypeVarId,
        actual: Type,
    ) -> Result<(), SpecializationError> {
        let definition = db.types().typevar(typevar);

        let value = if let Some(constraints) = &definition.constraints {
            // A constrained variable resolves to one of its constraints,
            // not to the actual type itself.
            let Some(constraint) = constraints
                .iter()
                .find(|constraint| actual.is_assignable_to(db, **constraint))
            else {
                return Err(SpecializationError);
            };
            *constraint
        } else {
            if let Some(bound) = definition.bound {
                if !actual.is_assignable_to(db, bound) {
                    return Err(SpecializationError);
                }
            }
            actual
        };

        match self.typevars.iter().position(|tv| *tv == typevar) {
            None => {
                self.typevars.push(typevar);
                self.types.push(value);
                Ok(())
            }
            Some(index) => {
                let existing = self.types[index];
                if value.is_assignable_to(db, existing) {
                    Ok(())
                } else if existing.is_assignable_to(db, value) {
                    self.types[index] = value;
                    Ok(())
                } else {
                    Err(SpecializationError)
                }
            }
        }
    }

    pub(crate) fn build(self) -> Specialization {
        Specialization::new(self.typevars, self.types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ModuleDb;
    use crate::types::KnownClass;

    #[test]
    fn specialization_lookup() {
        let db = ModuleDb::new();
        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));
        let u = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("U")));

        let spec = Specialization::new([t], [KnownClass::Int.to_instance(&db)]);
        assert_eq!(spec.get(t), Some(KnownClass::Int.to_instance(&db)));
        assert_eq!(spec.get(u), None);
    }

    #[test]
    fn variadic_specialization_packs_the_tail() {
        let db = ModuleDb::new();
        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));
        let ts = db
            .types()
            .add_typevar(TypeVarType::new_variadic(Name::new_static("Ts")));

        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);
        let bool_ty = KnownClass::Bool.to_instance(&db);
        let spec = Specialization::new_variadic([t, ts], [int, str_ty, bool_ty]);

        assert_eq!(spec.fixed_len(), 1);
        assert_eq!(spec.get(t), Some(int));
        // The variadic parameter binds a list, never a single type.
        assert_eq!(spec.get(ts), None);
        assert_eq!(spec.packed_tail(ts), Some(&[str_ty, bool_ty][..]));
        assert_eq!(spec.packed_tail(t), None);
    }

    #[test]
    fn variadic_tail_may_be_empty() {
        let db = ModuleDb::new();
        let ts = db
            .types()
            .add_typevar(TypeVarType::new_variadic(Name::new_static("Ts")));

        let spec = Specialization::new_variadic([ts], []);
        assert_eq!(spec.packed_tail(ts), Some(&[][..]));
    }

    #[test]
    fn apply_to_splices_the_packed_tail() {
        let db = ModuleDb::new();
        let ts = db
            .types()
            .add_typevar(TypeVarType::new_variadic(Name::new_static("Ts")));
        let us = db
            .types()
            .add_typevar(TypeVarType::new_variadic(Name::new_static("Us")));

        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);
        // `class Sub[*Ts](Row[*Ts])`: the derived specialization splices
        // its tail into the base's argument list.
        let derived = Specialization::new_variadic([ts], [int, str_ty]);
        let base = Specialization::new_variadic([us], [Type::TypeVar(ts)]);

        let composed = derived.apply_to(&db, &base);
        assert_eq!(composed.types(), &[int, str_ty]);
        assert_eq!(composed.packed_tail(us), Some(&[int, str_ty][..]));
    }

    #[test]
    fn apply_substitutes_bound_variables_only() {
        let db = ModuleDb::new();
        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));
        let u = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("U")));

        let spec = Specialization::new([t], [KnownClass::Str.to_instance(&db)]);
        let ty = Type::union(&db, [Type::TypeVar(t), Type::TypeVar(u)]);
        let applied = apply_specialization(&db, ty, &spec);

        let expected = Type::union(&db, [KnownClass::Str.to_instance(&db), Type::TypeVar(u)]);
        assert_eq!(applied, expected);
    }

    #[test]
    fn builder_widens_consistent_bindings() {
        let db = ModuleDb::new();
        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));

        let mut builder = SpecializationBuilder::default();
        builder
            .infer(&db, Type::TypeVar(t), Type::IntLiteral(1))
            .unwrap();
        builder
            .infer(&db, Type::TypeVar(t), KnownClass::Int.to_instance(&db))
            .unwrap();

        let spec = builder.build();
        assert_eq!(spec.get(t), Some(KnownClass::Int.to_instance(&db)));
    }

    #[test]
    fn builder_rejects_contradictions() {
        let db = ModuleDb::new();
        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));

        let mut builder = SpecializationBuilder::default();
        builder
            .infer(&db, Type::TypeVar(t), KnownClass::Int.to_instance(&db))
            .unwrap();
        assert_eq!(
            builder.infer(&db, Type::TypeVar(t), KnownClass::Str.to_instance(&db)),
            Err(SpecializationError)
        );
    }

    #[test]
    fn constrained_variable_resolves_to_a_constraint() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);
        let t = db.types().add_typevar(
            TypeVarType::new(Name::new_static("AnyStr")).with_constraints([int, str_ty]),
        );

        let mut builder = SpecializationBuilder::default();
        builder
            .infer(&db, Type::TypeVar(t), Type::IntLiteral(3))
            .unwrap();
        assert_eq!(builder.build().get(t), Some(int));
    }

    #[test]
    fn bounded_variable_rejects_types_outside_the_bound() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("N")).with_bound(int));

        let mut builder = SpecializationBuilder::default();
        assert_eq!(
            builder.infer(&db, Type::TypeVar(t), KnownClass::Str.to_instance(&db)),
            Err(SpecializationError)
        );
    }
}
