//! Variance of type variables.
//!
//! The variance of a class's type parameter is either declared on the
//! `TypeVar` or inferred from how the parameter is used in the class body.
//! Inference assigns each occurrence a polarity (covariant in return
//! positions, contravariant in parameter positions, invariant under a
//! mutable attribute or an invariant type argument) and joins the
//! occurrences in the variance lattice.

use rustc_hash::FxHashSet;
use std::sync::Arc;

use crate::Db;
use crate::types::class::{ClassId, MemberKind};
use crate::types::intern::TypeVarId;
use crate::types::{CallableType, Type};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TypeVarVariance {
    /// The parameter admits neither narrower nor wider type arguments.
    Invariant,

    /// `C[B]` is assignable to `C[A]` when `B` is assignable to `A`.
    Covariant,

    /// `C[A]` is assignable to `C[B]` when `B` is assignable to `A`.
    Contravariant,

    /// The parameter is unused; any argument is compatible with any other.
    Bivariant,
}

impl TypeVarVariance {
    /// Flips the polarity: covariant becomes contravariant and vice versa.
    /// Invariant and bivariant are fixed points.
    pub(crate) const fn flip(self) -> Self {
        match self {
            TypeVarVariance::Invariant => TypeVarVariance::Invariant,
            TypeVarVariance::Covariant => TypeVarVariance::Contravariant,
            TypeVarVariance::Contravariant => TypeVarVariance::Covariant,
            TypeVarVariance::Bivariant => TypeVarVariance::Bivariant,
        }
    }

    /// Least upper bound in the variance lattice: bivariant at the bottom,
    /// invariant at the top.
    pub(crate) const fn join(self, other: Self) -> Self {
        match (self, other) {
            (TypeVarVariance::Bivariant, v) | (v, TypeVarVariance::Bivariant) => v,
            (TypeVarVariance::Invariant, _) | (_, TypeVarVariance::Invariant) => {
                TypeVarVariance::Invariant
            }
            (TypeVarVariance::Covariant, TypeVarVariance::Covariant) => TypeVarVariance::Covariant,
            (TypeVarVariance::Contravariant, TypeVarVariance::Contravariant) => {
                TypeVarVariance::Contravariant
            }
            (TypeVarVariance::Covariant, TypeVarVariance::Contravariant)
            | (TypeVarVariance::Contravariant, TypeVarVariance::Covariant) => {
                TypeVarVariance::Invariant
            }
        }
    }

    /// Composes an outer polarity with the variance of an inner position,
    /// as when a parameter occurs as the type argument of a nested generic.
    pub(crate) const fn compose(self, other: Self) -> Self {
        match (self, other) {
            (TypeVarVariance::Bivariant, _) | (_, TypeVarVariance::Bivariant) => {
                TypeVarVariance::Bivariant
            }
            (TypeVarVariance::Invariant, _) | (_, TypeVarVariance::Invariant) => {
                TypeVarVariance::Invariant
            }
            (TypeVarVariance::Covariant, v) => v,
            (TypeVarVariance::Contravariant, v) => v.flip(),
        }
    }

    pub(crate) const fn is_invariant(self) -> bool {
        matches!(self, TypeVarVariance::Invariant)
    }
}

/// Returns the variance of each type parameter of `class`, in declaration
/// order. Memoized; safe to recompute concurrently.
pub(crate) fn variance_of(db: &dyn Db, class: ClassId) -> Arc<[TypeVarVariance]> {
    if let Some(cached) = db.caches().variance.get(&class) {
        return cached.clone();
    }

    let _span = tracing::trace_span!("variance_of", class = %db.classes().class(class).name()).entered();

    let mut in_progress = FxHashSet::default();
    let computed = infer_class_variance(db, class, &mut in_progress);
    db.caches()
        .variance
        .entry(class)
        .or_insert_with(|| Arc::from(computed))
        .clone()
}

fn variance_of_recursive(
    db: &dyn Db,
    class: ClassId,
    in_progress: &mut FxHashSet<ClassId>,
) -> Arc<[TypeVarVariance]> {
    if let Some(cached) = db.caches().variance.get(&class) {
        return cached.clone();
    }
    if in_progress.contains(&class) {
        // Recursive class reference: contribute nothing from this cycle.
        let arity = db.classes().class(class).type_params().len();
        return vec![TypeVarVariance::Bivariant; arity].into();
    }
    let computed = infer_class_variance(db, class, in_progress);
    db.caches()
        .variance
        .entry(class)
        .or_insert_with(|| Arc::from(computed))
        .clone()
}

fn infer_class_variance(
    db: &dyn Db,
    class: ClassId,
    in_progress: &mut FxHashSet<ClassId>,
) -> Vec<TypeVarVariance> {
    in_progress.insert(class);

    let class_def = db.classes().class(class);
    let mut variances = Vec::with_capacity(class_def.type_params().len());

    for &typevar in class_def.type_params() {
        // A variadic parameter binds a list of types; the list compares
        // positionally and invariantly, so no per-parameter variance is
        // inferred for it.
        if db.types().typevar(typevar).variadic {
            variances.push(TypeVarVariance::Invariant);
            continue;
        }
        if let Some(declared) = db.types().typevar(typevar).variance {
            variances.push(declared);
            continue;
        }

        let mut variance = TypeVarVariance::Bivariant;
        for declaration in class_def.members().values() {
            let ty = declaration.ty();
            let occurrence = match declaration.kind() {
                // A mutable attribute both produces and consumes its type.
                MemberKind::Variable if !declaration.is_final() => {
                    if occurs_in(db, ty, typevar, TypeVarVariance::Covariant, in_progress)
                        != TypeVarVariance::Bivariant
                    {
                        TypeVarVariance::Invariant
                    } else {
                        TypeVarVariance::Bivariant
                    }
                }
                // Read-only positions: properties and final attributes.
                MemberKind::Variable | MemberKind::Property => {
                    occurs_in(db, ty, typevar, TypeVarVariance::Covariant, in_progress)
                }
                MemberKind::Method | MemberKind::ClassMethod | MemberKind::StaticMethod => {
                    occurs_in(db, ty, typevar, TypeVarVariance::Covariant, in_progress)
                }
            };
            variance = variance.join(occurrence);
        }

        // An unused parameter stays bivariant after the scan; it is
        // reported covariant, matching the behavior this engine models.
        if variance == TypeVarVariance::Bivariant {
            variance = TypeVarVariance::Covariant;
        }
        variances.push(variance);
    }

    in_progress.remove(&class);
    variances
}

/// The joined variance of all occurrences of `typevar` within `ty`,
/// starting from `polarity`.
fn occurs_in(
    db: &dyn Db,
    ty: Type,
    typevar: TypeVarId,
    polarity: TypeVarVariance,
    in_progress: &mut FxHashSet<ClassId>,
) -> TypeVarVariance {
    match ty {
        Type::TypeVar(tv) if tv == typevar => polarity,
        Type::TypeVar(_) => TypeVarVariance::Bivariant,

        Type::Union(union) => {
            let elements = db.types().union_elements(union);
            elements
                .iter()
                .map(|element| occurs_in(db, *element, typevar, polarity, in_progress))
                .fold(TypeVarVariance::Bivariant, TypeVarVariance::join)
        }

        Type::NominalInstance(instance) => {
            let Some(specialization) = instance.specialization else {
                return TypeVarVariance::Bivariant;
            };
            let specialization = db.types().specialization(specialization);
            let param_variances = variance_of_recursive(db, instance.class, in_progress);
            specialization
                .types()
                .iter()
                .zip(param_variances.iter())
                .map(|(argument, param_variance)| {
                    occurs_in(
                        db,
                        *argument,
                        typevar,
                        polarity.compose(*param_variance),
                        in_progress,
                    )
                })
                .fold(TypeVarVariance::Bivariant, TypeVarVariance::join)
        }

        Type::Callable(callable) => {
            let callable = db.types().callable(callable);
            occurs_in_callable(db, &callable, typevar, polarity, in_progress)
        }

        _ => TypeVarVariance::Bivariant,
    }
}

fn occurs_in_callable(
    db: &dyn Db,
    callable: &CallableType,
    typevar: TypeVarId,
    polarity: TypeVarVariance,
    in_progress: &mut FxHashSet<ClassId>,
) -> TypeVarVariance {
    let mut variance = TypeVarVariance::Bivariant;
    for signature in callable.signatures() {
        for parameter in signature.parameters().iter() {
            if let Some(annotated) = parameter.annotated_type() {
                variance = variance.join(occurs_in(
                    db,
                    annotated,
                    typevar,
                    polarity.flip(),
                    in_progress,
                ));
            }
        }
        if let Some(return_ty) = signature.return_type() {
            variance = variance.join(occurs_in(db, return_ty, typevar, polarity, in_progress));
        }
    }
    variance
}
