//! The type model and the assignability engine.

use std::sync::Arc;

use crate::Db;
use crate::types::builder::UnionBuilder;
use crate::types::class::{ClassId, MemberKind};
use crate::types::display::DisplayType;
use crate::types::generics::{Specialization, apply_specialization};
use crate::types::intern::{CallableId, SpecializationId, StringLiteralId, TypeVarId, UnionId};
use crate::types::mro::mro_of;
use crate::types::signatures::{Parameter, Signature};
use crate::types::variance::{TypeVarVariance, variance_of};

pub mod builder;
pub mod call;
pub mod class;
pub(crate) mod context;
pub mod diagnostic;
pub mod display;
pub mod generics;
pub mod intern;
pub mod mro;
pub mod narrow;
pub mod overrides;
pub mod protocol;
pub mod signatures;
pub mod variance;


/// A gradual type: either explicit `Any` or the checker's own `Unknown`,
/// the recovery type it infers where no reliable answer exists.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DynamicType {
    Any,
    Unknown,
}

impl std::fmt::Display for DynamicType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DynamicType::Any => f.write_str("Any"),
            DynamicType::Unknown => f.write_str("Unknown"),
        }
    }
}

/// An instance of a class, optionally specialized with type arguments.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceType {
    pub class: ClassId,
    pub specialization: Option<SpecializationId>,
}

/// The class described by a `type[...]` annotation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SubclassOfInner {
    Class(ClassId),
    Dynamic(DynamicType),
}

/// A callable: one or more overload signatures plus an optional
/// implementation signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallableType {
    signatures: Box<[Signature]>,
    implementation: Option<Signature>,
}

impl CallableType {
    pub fn single(signature: Signature) -> Self {
        Self {
            signatures: Box::new([signature]),
            implementation: None,
        }
    }

    pub fn overloaded(
        signatures: impl IntoIterator<Item = Signature>,
        implementation: Option<Signature>,
    ) -> Self {
        let signatures: Box<[Signature]> = signatures.into_iter().collect();
        debug_assert!(!signatures.is_empty());
        Self {
            signatures,
            implementation,
        }
    }

    /// The overload signatures, in declaration order.
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn implementation(&self) -> Option<&Signature> {
        self.implementation.as_ref()
    }

    pub fn is_overloaded(&self) -> bool {
        self.signatures.len() > 1
    }

    pub(crate) fn single_signature(&self) -> Option<&Signature> {
        match &*self.signatures {
            [signature] => Some(signature),
            _ => None,
        }
    }

    #[must_use]
    pub(crate) fn map_types(&self, f: &mut dyn FnMut(Type) -> Type) -> CallableType {
        CallableType {
            signatures: self
                .signatures
                .iter()
                .map(|signature| signature.map_types(f))
                .collect(),
            implementation: self
                .implementation
                .as_ref()
                .map(|signature| signature.map_types(f)),
        }
    }
}

/// Representation of a type: a sum of everything the checker reasons
/// about. Compound payloads are interned; `Type` itself is a small
/// `Copy` value with structural equality.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// `Any` or `Unknown`: consistent with every type in both directions.
    Dynamic(DynamicType),

    /// The empty set of values.
    Never,

    /// The `None` singleton.
    None,

    /// An instance of a class.
    NominalInstance(InstanceType),

    /// The class object itself, as in `x = int`.
    ClassLiteral(ClassId),

    /// `type[C]` or `type[Any]`.
    SubclassOf(SubclassOfInner),

    /// A union, normalized by [`UnionBuilder`].
    Union(UnionId),

    IntLiteral(i64),

    BooleanLiteral(bool),

    StringLiteral(StringLiteralId),

    Callable(CallableId),

    TypeVar(TypeVarId),
}

impl Type {
    pub const fn any() -> Self {
        Type::Dynamic(DynamicType::Any)
    }

    pub const fn unknown() -> Self {
        Type::Dynamic(DynamicType::Unknown)
    }

    pub const fn is_dynamic(self) -> bool {
        matches!(self, Type::Dynamic(_))
    }

    pub const fn is_unknown(self) -> bool {
        matches!(self, Type::Dynamic(DynamicType::Unknown))
    }

    pub const fn is_never(self) -> bool {
        matches!(self, Type::Never)
    }

    pub const fn instance(class: ClassId) -> Self {
        Type::NominalInstance(InstanceType {
            class,
            specialization: None,
        })
    }

    /// An instance of a generic class with the given type arguments.
    pub fn generic_instance(
        db: &dyn Db,
        class: ClassId,
        arguments: impl IntoIterator<Item = Type>,
    ) -> Self {
        let specialization = Specialization::for_class(db, class, arguments);
        Type::NominalInstance(InstanceType {
            class,
            specialization: Some(db.types().intern_specialization(specialization)),
        })
    }

    pub const fn subclass_of(class: ClassId) -> Self {
        Type::SubclassOf(SubclassOfInner::Class(class))
    }

    pub const fn subclass_of_unknown() -> Self {
        Type::SubclassOf(SubclassOfInner::Dynamic(DynamicType::Unknown))
    }

    pub fn string_literal(db: &dyn Db, value: &str) -> Self {
        Type::StringLiteral(db.types().intern_string(value))
    }

    pub fn union(db: &dyn Db, elements: impl IntoIterator<Item = Type>) -> Self {
        let mut builder = UnionBuilder::new(db);
        for element in elements {
            builder = builder.add(element);
        }
        builder.build()
    }

    pub fn callable(db: &dyn Db, signature: Signature) -> Self {
        Type::Callable(db.types().intern_callable(CallableType::single(signature)))
    }

    pub fn overloaded_callable(
        db: &dyn Db,
        signatures: impl IntoIterator<Item = Signature>,
        implementation: Option<Signature>,
    ) -> Self {
        Type::Callable(
            db.types()
                .intern_callable(CallableType::overloaded(signatures, implementation)),
        )
    }

    pub fn object(db: &dyn Db) -> Self {
        KnownClass::Object.to_instance(db)
    }

    /// The elements of this type if it is a union.
    pub(crate) fn union_elements(self, db: &dyn Db) -> Option<Arc<[Type]>> {
        match self {
            Type::Union(union) => Some(db.types().union_elements(union)),
            _ => None,
        }
    }

    /// A type is a singleton if it has exactly one inhabitant.
    pub(crate) fn is_singleton(self) -> bool {
        matches!(
            self,
            Type::None | Type::BooleanLiteral(_) | Type::ClassLiteral(_)
        )
    }

    /// A type is single-valued if all of its inhabitants compare equal.
    pub(crate) fn is_single_valued(self) -> bool {
        self.is_singleton() || matches!(self, Type::IntLiteral(_) | Type::StringLiteral(_))
    }

    /// The instance type a literal widens to.
    pub(crate) fn literal_fallback_instance(self, db: &dyn Db) -> Option<Type> {
        match self {
            Type::IntLiteral(_) => Some(KnownClass::Int.to_instance(db)),
            Type::BooleanLiteral(_) => Some(KnownClass::Bool.to_instance(db)),
            Type::StringLiteral(_) => Some(KnownClass::Str.to_instance(db)),
            Type::None => Some(KnownClass::NoneType.to_instance(db)),
            _ => None,
        }
    }

    /// Looks up `name` as an attribute of an instance of this type.
    /// Dataclass transforms contribute their synthesized methods here.
    pub(crate) fn instance_member(self, db: &dyn Db, name: &str) -> Option<(MemberKind, Type)> {
        match self {
            Type::NominalInstance(instance) => {
                let Some(found) = class::find_member_in_mro(db, instance.class, name, false)
                else {
                    let synthesized = match name {
                        "__init__" => class::synthesized_init_signature(db, instance.class),
                        "__replace__" => {
                            class::synthesized_replace_signature(db, instance.class)
                        }
                        _ => None,
                    }?;
                    return Some((MemberKind::Method, Type::callable(db, synthesized)));
                };
                let mut ty = found.declaration.ty();
                if let Some(owner_spec) = &found.specialization {
                    ty = apply_specialization(db, ty, owner_spec);
                }
                if let Some(own_spec) = instance.specialization {
                    ty = apply_specialization(db, ty, &db.types().specialization(own_spec));
                }
                Some((found.declaration.kind(), ty))
            }
            Type::IntLiteral(_)
            | Type::BooleanLiteral(_)
            | Type::StringLiteral(_)
            | Type::None => self
                .literal_fallback_instance(db)
                .and_then(|instance| instance.instance_member(db, name)),
            _ => None,
        }
    }

    /// The callable to bind when a value of this type is called. Class
    /// objects are called through their constructor signature.
    pub fn into_callable(self, db: &dyn Db) -> Option<CallableType> {
        match self {
            Type::Callable(callable) => Some((*db.types().callable(callable)).clone()),
            Type::ClassLiteral(class) => Some(CallableType::single(
                class::constructor_signature(db, class),
            )),
            _ => None,
        }
    }

    /// Whether a value of this type can be truthy. Used to decide whether
    /// an `__exit__` return type can suppress an exception.
    pub(crate) fn may_be_truthy(self, db: &dyn Db) -> bool {
        match self {
            Type::BooleanLiteral(value) => value,
            Type::None | Type::Never => false,
            Type::IntLiteral(value) => value != 0,
            Type::StringLiteral(value) => !db.types().string_literal(value).is_empty(),
            Type::Union(union) => db
                .types()
                .union_elements(union)
                .iter()
                .any(|element| element.may_be_truthy(db)),
            // Everything else, including `bool` and gradual types, may be.
            _ => true,
        }
    }

    pub fn display(self, db: &dyn Db) -> DisplayType<'_> {
        DisplayType::new(db, self)
    }

    /// Returns whether a value of type `self` is acceptable where `target`
    /// is expected, under gradual typing.
    pub fn is_assignable_to(self, db: &dyn Db, target: Type) -> bool {
        if self == target {
            return true;
        }

        match (self, target) {
            // Gradual types are consistent with everything, in both
            // directions.
            (Type::Dynamic(_), _) | (_, Type::Dynamic(_)) => true,

            (Type::Never, _) => true,
            (_, Type::Never) => false,

            // All elements of a union source must fit the target.
            (Type::Union(union), _) => db
                .types()
                .union_elements(union)
                .iter()
                .all(|element| element.is_assignable_to(db, target)),

            // A non-union source must fit some element of a union target.
            (_, Type::Union(union)) => db
                .types()
                .union_elements(union)
                .iter()
                .any(|element| self.is_assignable_to(db, *element)),

            (_, Type::NominalInstance(instance))
                if db.classes().class(instance.class).is_object() =>
            {
                true
            }

            // A type variable only accepts itself (handled by the equality
            // check above).
            (_, Type::TypeVar(_)) => false,

            (Type::TypeVar(typevar), _) => {
                let definition = db.types().typevar(typevar);
                if let Some(constraints) = &definition.constraints {
                    constraints
                        .iter()
                        .all(|constraint| constraint.is_assignable_to(db, target))
                } else if let Some(bound) = definition.bound {
                    bound.is_assignable_to(db, target)
                } else {
                    false
                }
            }

            (Type::NominalInstance(instance), Type::None) => {
                db.classes().class(instance.class).known() == Some(KnownClass::NoneType)
            }

            // Literals and `None` widen to their fallback class. Two
            // distinct literal values already failed the equality check.
            (
                Type::IntLiteral(_)
                | Type::BooleanLiteral(_)
                | Type::StringLiteral(_)
                | Type::None,
                _,
            ) => match target {
                Type::IntLiteral(_) | Type::BooleanLiteral(_) | Type::StringLiteral(_) => false,
                _ => self
                    .literal_fallback_instance(db)
                    .is_some_and(|instance| instance.is_assignable_to(db, target)),
            },

            (Type::NominalInstance(source), Type::NominalInstance(target)) => {
                nominal_instance_assignable(db, source, target)
            }

            (Type::ClassLiteral(class), Type::SubclassOf(inner)) => match inner {
                SubclassOfInner::Dynamic(_) => true,
                SubclassOfInner::Class(target_class) => is_subclass_of(db, class, target_class),
            },

            (Type::SubclassOf(source), Type::SubclassOf(target)) => match (source, target) {
                (SubclassOfInner::Dynamic(_), _) | (_, SubclassOfInner::Dynamic(_)) => true,
                (SubclassOfInner::Class(source), SubclassOfInner::Class(target)) => {
                    is_subclass_of(db, source, target)
                }
            },

            // A class object is an instance of `type`.
            (Type::ClassLiteral(_) | Type::SubclassOf(_), Type::NominalInstance(instance)) => {
                db.classes().class(instance.class).known() == Some(KnownClass::Type)
            }

            (Type::Callable(source), Type::Callable(target)) => {
                let source = db.types().callable(source);
                let target = db.types().callable(target);
                target.signatures().iter().all(|target_signature| {
                    source.signatures().iter().any(|source_signature| {
                        signature_assignable(db, source_signature, target_signature)
                    })
                })
            }

            _ => false,
        }
    }

    /// Two types are equivalent when each is assignable to the other.
    pub fn is_equivalent_to(self, db: &dyn Db, other: Type) -> bool {
        self.is_assignable_to(db, other) && other.is_assignable_to(db, self)
    }
}

/// Whether `class` has `target` in its MRO. An `Any`/`Unknown` entry in
/// the MRO makes every target possible.
pub(crate) fn is_subclass_of(db: &dyn Db, class: ClassId, target: ClassId) -> bool {
    let mro = mro_of(db, class);
    mro.iter().any(|entry| match entry {
        mro::ClassBase::Class(c, _) => *c == target,
        mro::ClassBase::Dynamic(_) => true,
    })
}

fn nominal_instance_assignable(db: &dyn Db, source: InstanceType, target: InstanceType) -> bool {
    let target_class = db.classes().class(target.class);

    if target_class.is_protocol() {
        return protocol::satisfies_protocol(db, Type::NominalInstance(source), target);
    }

    match class::specialization_of_base(db, source, target.class) {
        // Not an ancestor; only a dynamic entry in the MRO can save this.
        None => mro_of(db, source.class).contains_dynamic(),
        Some(source_view) => {
            let Some(target_spec) = target.specialization else {
                // Unspecialized target accepts any specialization.
                return true;
            };
            let Some(source_view) = source_view else {
                // The source reaches the target class without type
                // arguments; treat them as `Unknown`.
                return true;
            };
            let target_spec = db.types().specialization(target_spec);
            // A variadic tail compares positionally; differing lengths can
            // never match.
            if source_view.types().len() != target_spec.types().len() {
                return false;
            }
            let variances = variance_of(db, target.class);
            let fixed = target_spec.fixed_len();
            source_view
                .types()
                .iter()
                .zip(target_spec.types())
                .enumerate()
                .all(|(index, (source_arg, target_arg))| {
                    // The packed tail of a variadic parameter is invariant.
                    let variance = if index < fixed {
                        variances[index]
                    } else {
                        TypeVarVariance::Invariant
                    };
                    match variance {
                        TypeVarVariance::Covariant => source_arg.is_assignable_to(db, *target_arg),
                        TypeVarVariance::Contravariant => {
                            target_arg.is_assignable_to(db, *source_arg)
                        }
                        TypeVarVariance::Invariant => source_arg.is_equivalent_to(db, *target_arg),
                        TypeVarVariance::Bivariant => true,
                    }
                })
        }
    }
}

/// Whether `sub` can stand in for `sup`: contravariant parameter types,
/// covariant return type. Unannotated positions are gradual.
pub(crate) fn signature_assignable(db: &dyn Db, sub: &Signature, sup: &Signature) -> bool {
    if let (Some(sub_return), Some(sup_return)) = (sub.return_type(), sup.return_type()) {
        if !sub_return.is_assignable_to(db, sup_return) {
            return false;
        }
    }

    let sub_params = sub.parameters();
    let sup_params = sup.parameters();
    if sub_params.is_gradual() || sup_params.is_gradual() {
        return true;
    }

    let sub_positional: Vec<&Parameter> = sub_params.positional().collect();
    let sub_variadic = sub_params.variadic();

    let mut sup_positional_count = 0;
    for (index, sup_param) in sup_params.positional().enumerate() {
        sup_positional_count += 1;
        let Some(sub_param) = sub_positional.get(index).copied().or(sub_variadic) else {
            return false;
        };
        if !parameter_accepts(db, sub_param, sup_param) {
            return false;
        }
    }

    // Extra positional parameters of `sub` must be omittable.
    for sub_param in sub_positional.iter().skip(sup_positional_count) {
        if !sub_param.is_optional() {
            return false;
        }
    }

    if let Some(sup_variadic) = sup_params.variadic() {
        let Some(sub_variadic) = sub_variadic else {
            return false;
        };
        if !parameter_accepts(db, sub_variadic, sup_variadic) {
            return false;
        }
    }

    for sup_param in sup_params.iter().filter(|parameter| parameter.is_keyword_only()) {
        let Some(name) = sup_param.name() else {
            continue;
        };
        let sub_param = sub_params
            .keyword_by_name(name)
            .map(|(_, parameter)| parameter)
            .or_else(|| sub_params.keyword_variadic());
        let Some(sub_param) = sub_param else {
            return false;
        };
        if !parameter_accepts(db, sub_param, sup_param) {
            return false;
        }
    }

    // Required keyword-only parameters of `sub` must be fillable from `sup`.
    for sub_param in sub_params
        .iter()
        .filter(|parameter| parameter.is_keyword_only() && !parameter.has_default())
    {
        let Some(name) = sub_param.name() else {
            continue;
        };
        if sup_params.keyword_by_name(name).is_none() && sup_params.keyword_variadic().is_none() {
            return false;
        }
    }

    if let Some(sup_keyword_variadic) = sup_params.keyword_variadic() {
        let Some(sub_keyword_variadic) = sub_params.keyword_variadic() else {
            return false;
        };
        if !parameter_accepts(db, sub_keyword_variadic, sup_keyword_variadic) {
            return false;
        }
    }

    true
}

fn parameter_accepts(db: &dyn Db, sub: &Parameter, sup: &Parameter) -> bool {
    match (sub.annotated_type(), sup.annotated_type()) {
        (Some(sub_ty), Some(sup_ty)) => sup_ty.is_assignable_to(db, sub_ty),
        _ => true,
    }
}

/// Classes the checker knows by name and needs to resolve specially.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum_macros::EnumIter)]
pub enum KnownClass {
    Object,
    Int,
    Bool,
    Str,
    NoneType,
    Type,
}

impl KnownClass {
    pub const fn name(self) -> &'static str {
        match self {
            KnownClass::Object => "object",
            KnownClass::Int => "int",
            KnownClass::Bool => "bool",
            KnownClass::Str => "str",
            KnownClass::NoneType => "NoneType",
            KnownClass::Type => "type",
        }
    }

    pub fn to_class(self, db: &dyn Db) -> Option<ClassId> {
        db.classes().known_class(self)
    }

    /// An instance of this class, or `Unknown` if the class is not
    /// registered in the arena.
    pub fn to_instance(self, db: &dyn Db) -> Type {
        self.to_class(db).map_or(Type::unknown(), Type::instance)
    }
}

static_assertions::assert_eq_size!(Type, [u8; 16]);
