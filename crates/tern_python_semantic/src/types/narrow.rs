//! Type narrowing along control-flow edges.
//!
//! A branch condition is represented as a [`Predicate`]. Taking the
//! true edge applies the predicate positively, the false edge applies
//! it negatively; either way the result is a set of narrowing
//! constraints mapping places to narrower types.

use rustc_hash::FxHashMap;

use crate::Db;
use crate::flow::PlaceId;
use crate::types::class::ClassId;
use crate::types::generics::SpecializationBuilder;
use crate::types::variance::variance_of;
use crate::types::{InstanceType, KnownClass, Type, is_subclass_of};

/// The condition tested by a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `isinstance(place, class)`, or a `case C(...)` match pattern.
    IsInstance { place: PlaceId, class: ClassId },

    /// `place is None`.
    IsNone { place: PlaceId },

    /// `place == value` for a literal, or a `case value` singleton
    /// pattern. Negation removes the value only when it is a singleton.
    Equals { place: PlaceId, value: Type },

    /// A call to a user-defined type guard. The guard's author declares
    /// the narrowed type directly, so the true branch applies it
    /// unconditionally; the false branch learns nothing.
    TypeGuard { place: PlaceId, guarded: Type },

    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),

    /// A condition the checker cannot reason about; narrows nothing.
    Opaque,
}

pub(crate) type NarrowingConstraints = FxHashMap<PlaceId, Type>;

/// Evaluates `predicate` (negated if `positive` is false) against the
/// current types of the places it mentions.
pub(crate) fn narrow(
    db: &dyn Db,
    predicate: &Predicate,
    positive: bool,
    current_type_of: &dyn Fn(PlaceId) -> Type,
) -> NarrowingConstraints {
    match predicate {
        Predicate::IsInstance { place, class } => {
            let narrowed = narrow_isinstance(db, current_type_of(*place), *class, positive);
            FxHashMap::from_iter([(*place, narrowed)])
        }
        Predicate::IsNone { place } => {
            let narrowed = narrow_is_none(db, current_type_of(*place), positive);
            FxHashMap::from_iter([(*place, narrowed)])
        }
        Predicate::Equals { place, value } => {
            let narrowed = narrow_equals(db, current_type_of(*place), *value, positive);
            FxHashMap::from_iter([(*place, narrowed)])
        }
        Predicate::TypeGuard { place, guarded } => {
            if positive {
                FxHashMap::from_iter([(*place, *guarded)])
            } else {
                NarrowingConstraints::default()
            }
        }
        Predicate::Not(inner) => narrow(db, inner, !positive, current_type_of),
        Predicate::And(left, right) => {
            let left = narrow(db, left, positive, current_type_of);
            let right = narrow(db, right, positive, current_type_of);
            if positive {
                merge_and(db, left, right)
            } else {
                // `not (a and b)` is `not a or not b`.
                merge_or(db, left, right)
            }
        }
        Predicate::Or(left, right) => {
            let left = narrow(db, left, positive, current_type_of);
            let right = narrow(db, right, positive, current_type_of);
            if positive {
                merge_or(db, left, right)
            } else {
                merge_and(db, left, right)
            }
        }
        Predicate::Opaque => NarrowingConstraints::default(),
    }
}

/// Conjunction of two constraint sets: the more precise type wins. Two
/// incomparable constraints on the same place mean the conjunction is
/// unsatisfiable for it.
pub(crate) fn merge_and(
    db: &dyn Db,
    mut left: NarrowingConstraints,
    right: NarrowingConstraints,
) -> NarrowingConstraints {
    for (place, right_ty) in right {
        let merged = match left.get(&place) {
            None => right_ty,
            Some(&left_ty) => {
                if left_ty.is_assignable_to(db, right_ty) {
                    left_ty
                } else if right_ty.is_assignable_to(db, left_ty) {
                    right_ty
                } else {
                    Type::Never
                }
            }
        };
        left.insert(place, merged);
    }
    left
}

/// Disjunction of two constraint sets: only places constrained on both
/// sides stay constrained, to the union of the two types.
pub(crate) fn merge_or(
    db: &dyn Db,
    left: NarrowingConstraints,
    right: NarrowingConstraints,
) -> NarrowingConstraints {
    let mut merged = NarrowingConstraints::default();
    for (place, left_ty) in left {
        if let Some(&right_ty) = right.get(&place) {
            merged.insert(place, Type::union(db, [left_ty, right_ty]));
        }
    }
    merged
}

fn narrow_isinstance(db: &dyn Db, ty: Type, class: ClassId, positive: bool) -> Type {
    if let Some(elements) = ty.union_elements(db) {
        return Type::union(
            db,
            elements
                .iter()
                .map(|element| narrow_isinstance(db, *element, class, positive)),
        );
    }

    if positive {
        match ty {
            // `Any`/`Unknown` narrows down to the tested class.
            Type::Dynamic(_) => respecialized_instance(db, class, None),
            Type::NominalInstance(instance) => {
                if is_subclass_of(db, instance.class, class) {
                    ty
                } else if is_subclass_of(db, class, instance.class) {
                    // Narrowing to a subclass: the subclass's own type
                    // arguments are not knowable from the test.
                    respecialized_instance(db, class, Some(instance))
                } else {
                    Type::Never
                }
            }
            Type::None => match KnownClass::NoneType.to_class(db) {
                Some(none_class) if is_subclass_of(db, none_class, class) => ty,
                _ => Type::Never,
            },
            Type::IntLiteral(_) | Type::BooleanLiteral(_) | Type::StringLiteral(_) => {
                if ty
                    .literal_fallback_instance(db)
                    .is_some_and(|instance| narrow_isinstance(db, instance, class, true) != Type::Never)
                {
                    ty
                } else {
                    Type::Never
                }
            }
            _ => {
                if ty.is_assignable_to(db, Type::instance(class)) {
                    ty
                } else {
                    Type::Never
                }
            }
        }
    } else {
        // The negative branch removes definite instances; instances of
        // a superclass survive because a subclass value is still
        // possible at runtime only on the positive side.
        if ty.is_dynamic() || !ty.is_assignable_to(db, Type::instance(class)) {
            ty
        } else {
            Type::Never
        }
    }
}

/// An instance of `class` as narrowed to by an `isinstance` test.
/// Invariant type arguments cannot be trusted from the test alone and
/// become `Unknown`; covariant and contravariant arguments are carried
/// over from the scrutinee where they can be inferred, clamped to the
/// parameter's bound.
fn respecialized_instance(db: &dyn Db, class: ClassId, scrutinee: Option<InstanceType>) -> Type {
    let type_params = db.classes().class(class).type_params().to_vec();
    if type_params.is_empty() {
        return Type::instance(class);
    }

    let inferred = scrutinee.and_then(|scrutinee| {
        let scrutinee_spec = db.types().specialization(scrutinee.specialization?);
        // View the target class through the scrutinee's class to relate
        // the target's typevars to the scrutinee's concrete arguments.
        let view = crate::types::class::specialization_of_base(
            db,
            InstanceType {
                class,
                specialization: None,
            },
            scrutinee.class,
        )??;
        let mut builder = SpecializationBuilder::default();
        for (view_arg, concrete) in view.types().iter().zip(scrutinee_spec.types()) {
            builder.infer(db, *view_arg, *concrete).ok()?;
        }
        Some(builder.build())
    });

    let variances = variance_of(db, class);
    let arguments: Vec<Type> = type_params
        .iter()
        .enumerate()
        .map(|(index, &typevar)| {
            if variances.get(index).is_some_and(|variance| variance.is_invariant()) {
                return Type::unknown();
            }
            let Some(argument) = inferred.as_ref().and_then(|inferred| inferred.get(typevar))
            else {
                return Type::unknown();
            };
            let definition = db.types().typevar(typevar);
            match definition.bound {
                Some(bound) if !argument.is_assignable_to(db, bound) => bound,
                _ => argument,
            }
        })
        .collect();
    Type::generic_instance(db, class, arguments)
}

fn narrow_is_none(db: &dyn Db, ty: Type, positive: bool) -> Type {
    if let Some(elements) = ty.union_elements(db) {
        return Type::union(
            db,
            elements
                .iter()
                .map(|element| narrow_is_none(db, *element, positive)),
        );
    }

    if positive {
        match ty {
            Type::None => Type::None,
            Type::Dynamic(_) => Type::None,
            _ if Type::None.is_assignable_to(db, ty) => Type::None,
            _ => Type::Never,
        }
    } else {
        match ty {
            Type::None => Type::Never,
            _ => ty,
        }
    }
}

fn narrow_equals(db: &dyn Db, ty: Type, value: Type, positive: bool) -> Type {
    if let Some(elements) = ty.union_elements(db) {
        return Type::union(
            db,
            elements
                .iter()
                .map(|element| narrow_equals(db, *element, value, positive)),
        );
    }

    if positive {
        if value.is_assignable_to(db, ty) || ty.is_dynamic() {
            value
        } else if ty.is_assignable_to(db, value) {
            ty
        } else {
            Type::Never
        }
    } else {
        // Only a singleton comparison can eliminate a type on the
        // negative branch; `x != 1` tells us nothing about an `int`.
        if value.is_singleton() && ty == value {
            Type::Never
        } else {
            ty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ModuleDb;
    use crate::name::Name;
    use crate::types::class::{Base, Class, Declaration};
    use crate::types::generics::TypeVarType;
    use crate::types::signatures::{Parameters, Signature};

    fn place() -> PlaceId {
        PlaceId::from_index(0)
    }

    fn narrow_single(db: &dyn Db, predicate: &Predicate, positive: bool, current: Type) -> Type {
        let constraints = narrow(db, predicate, positive, &|_| current);
        constraints[&place()]
    }

    #[test]
    fn is_none_splits_optional() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let optional_int = Type::union(&db, [int, Type::None]);
        let predicate = Predicate::IsNone { place: place() };

        assert_eq!(narrow_single(&db, &predicate, true, optional_int), Type::None);
        assert_eq!(narrow_single(&db, &predicate, false, optional_int), int);
    }

    #[test]
    fn isinstance_filters_union_members() {
        let db = ModuleDb::new();
        let int_class = KnownClass::Int.to_class(&db).unwrap();
        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);
        let ty = Type::union(&db, [int, str_ty, Type::None]);

        let predicate = Predicate::IsInstance {
            place: place(),
            class: int_class,
        };
        assert_eq!(narrow_single(&db, &predicate, true, ty), int);
        assert_eq!(
            narrow_single(&db, &predicate, false, ty),
            Type::union(&db, [str_ty, Type::None])
        );
    }

    #[test]
    fn isinstance_narrows_to_subclass() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let animal = db.add_class(Class::new("Animal").with_bases([Base::class(object)]));
        let dog = db.add_class(Class::new("Dog").with_bases([Base::class(animal)]));

        let predicate = Predicate::IsInstance {
            place: place(),
            class: dog,
        };
        assert_eq!(
            narrow_single(&db, &predicate, true, Type::instance(animal)),
            Type::instance(dog)
        );
        // The negative branch keeps the superclass: other subclasses of
        // `Animal` are still possible.
        assert_eq!(
            narrow_single(&db, &predicate, false, Type::instance(animal)),
            Type::instance(animal)
        );
    }

    #[test]
    fn isinstance_narrows_dynamic_to_the_class() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let animal = db.add_class(Class::new("Animal").with_bases([Base::class(object)]));

        let predicate = Predicate::IsInstance {
            place: place(),
            class: animal,
        };
        assert_eq!(
            narrow_single(&db, &predicate, true, Type::any()),
            Type::instance(animal)
        );
        assert_eq!(narrow_single(&db, &predicate, false, Type::any()), Type::any());
    }

    #[test]
    fn isinstance_to_invariant_generic_loses_the_argument() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));
        let cell = db.add_class(
            Class::new("Cell")
                .with_type_params([t])
                .with_bases([Base::class(object)])
                .with_member("value", Declaration::variable(Type::TypeVar(t))),
        );

        let predicate = Predicate::IsInstance {
            place: place(),
            class: cell,
        };
        let narrowed = narrow_single(&db, &predicate, true, Type::any());
        assert_eq!(
            narrowed,
            Type::generic_instance(&db, cell, [Type::unknown()])
        );
    }

    #[test]
    fn isinstance_to_covariant_generic_carries_the_argument() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let int = KnownClass::Int.to_instance(&db);

        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));
        let getter = Declaration::method(Type::callable(
            &db,
            Signature::new(Parameters::new([]), Some(Type::TypeVar(t))),
        ));
        let box_class = db.add_class(
            Class::new("Box")
                .with_type_params([t])
                .with_bases([Base::class(object)])
                .with_member("get", getter),
        );
        let u = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("U")));
        let getter = Declaration::method(Type::callable(
            &db,
            Signature::new(Parameters::new([]), Some(Type::TypeVar(u))),
        ));
        let sub_box = db.add_class(
            Class::new("SubBox")
                .with_type_params([u])
                .with_bases([Base::generic(&db, box_class, [Type::TypeVar(u)])])
                .with_member("get", getter),
        );

        let scrutinee = Type::generic_instance(&db, box_class, [int]);
        let predicate = Predicate::IsInstance {
            place: place(),
            class: sub_box,
        };
        assert_eq!(
            narrow_single(&db, &predicate, true, scrutinee),
            Type::generic_instance(&db, sub_box, [int])
        );
    }

    #[test]
    fn equality_narrowing() {
        let db = ModuleDb::new();
        let ty = Type::union(&db, [Type::IntLiteral(1), Type::IntLiteral(2)]);
        let predicate = Predicate::Equals {
            place: place(),
            value: Type::IntLiteral(1),
        };
        assert_eq!(narrow_single(&db, &predicate, true, ty), Type::IntLiteral(1));
        // Int literals are not singletons; `!=` removes nothing.
        assert_eq!(narrow_single(&db, &predicate, false, ty), ty);

        let flags = Type::union(&db, [Type::BooleanLiteral(true), Type::None]);
        let predicate = Predicate::Equals {
            place: place(),
            value: Type::BooleanLiteral(true),
        };
        assert_eq!(
            narrow_single(&db, &predicate, false, flags),
            Type::None
        );
    }

    #[test]
    fn type_guard_applies_the_declared_type() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);
        let ty = Type::union(&db, [int, str_ty]);

        let predicate = Predicate::TypeGuard {
            place: place(),
            guarded: int,
        };
        assert_eq!(narrow_single(&db, &predicate, true, ty), int);
        // A failed guard proves nothing about the value.
        assert!(narrow(&db, &predicate, false, &|_| ty).is_empty());
    }

    #[test]
    fn conjunction_takes_the_tighter_constraint() {
        let db = ModuleDb::new();
        let int_class = KnownClass::Int.to_class(&db).unwrap();
        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);
        let ty = Type::union(&db, [int, str_ty, Type::None]);

        let predicate = Predicate::And(
            Box::new(Predicate::IsInstance {
                place: place(),
                class: int_class,
            }),
            Box::new(Predicate::Not(Box::new(Predicate::IsNone {
                place: place(),
            }))),
        );
        assert_eq!(narrow_single(&db, &predicate, true, ty), int);
        // `not (isinstance(x, int) and x is not None)`
        assert_eq!(
            narrow_single(&db, &predicate, false, ty),
            Type::union(&db, [str_ty, Type::None])
        );
    }
}
