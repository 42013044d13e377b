//! The class model: descriptors, member declarations, and the class arena.

use bitflags::bitflags;

use crate::Db;
use crate::FxIndexMap;
use crate::name::Name;
use crate::types::generics::Specialization;
use crate::types::intern::{SpecializationId, TypeVarId};
use crate::types::mro::{ClassBase, mro_of};
use crate::types::signatures::{Parameter, Parameters, Signature};
use crate::types::{DynamicType, InstanceType, KnownClass, Type};

/// Handle to a class in the [`ClassStore`] arena.
///
/// Class identity is the handle: two structurally identical classes built
/// separately are distinct classes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ClassFlags: u8 {
        /// Decorated with `@final`; subclassing is an error.
        const FINAL             = 1 << 0;
        const ABSTRACT          = 1 << 1;
        /// A `Protocol` class; assignability to it is structural.
        const PROTOCOL          = 1 << 2;
        /// Decorated with `@dataclass` (or an equivalent transform).
        const DATACLASS         = 1 << 3;
        /// `@dataclass(frozen=True)`; implies `DATACLASS` semantics.
        const FROZEN_DATACLASS  = 1 << 4;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct MemberFlags: u8 {
        /// Declared `Final`; overriding it is an error.
        const FINAL       = 1 << 0;
        /// Carries an explicit `@override` decorator.
        const OVERRIDE    = 1 << 1;
        /// Synthesized by a class transform rather than written by hand.
        const SYNTHESIZED = 1 << 2;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Variable,
    Method,
    Property,
    ClassMethod,
    StaticMethod,
}

impl MemberKind {
    /// Whether two member kinds occupy the same "slot shape" for override
    /// purposes. Method-like kinds are interchangeable with each other.
    pub(crate) fn is_method_like(self) -> bool {
        matches!(
            self,
            MemberKind::Method | MemberKind::ClassMethod | MemberKind::StaticMethod
        )
    }

    pub(crate) fn is_property(self) -> bool {
        matches!(self, MemberKind::Property)
    }
}

/// A single member declaration in a class body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    kind: MemberKind,

    /// The annotated type. `None` means the member is unannotated.
    declared_ty: Option<Type>,

    /// The type inferred from the assigned value, for unannotated members.
    inferred_ty: Option<Type>,

    flags: MemberFlags,
}

impl Declaration {
    /// An annotated attribute.
    pub fn variable(ty: Type) -> Self {
        Self {
            kind: MemberKind::Variable,
            declared_ty: Some(ty),
            inferred_ty: None,
            flags: MemberFlags::empty(),
        }
    }

    /// An unannotated attribute whose type was inferred from its value.
    pub fn unannotated(inferred: Type) -> Self {
        Self {
            kind: MemberKind::Variable,
            declared_ty: None,
            inferred_ty: Some(inferred),
            flags: MemberFlags::empty(),
        }
    }

    pub fn method(ty: Type) -> Self {
        Self {
            kind: MemberKind::Method,
            declared_ty: Some(ty),
            inferred_ty: None,
            flags: MemberFlags::empty(),
        }
    }

    pub fn class_method(ty: Type) -> Self {
        Self {
            kind: MemberKind::ClassMethod,
            ..Self::method(ty)
        }
    }

    pub fn static_method(ty: Type) -> Self {
        Self {
            kind: MemberKind::StaticMethod,
            ..Self::method(ty)
        }
    }

    /// A property; `ty` is the getter's value type.
    pub fn property(ty: Type) -> Self {
        Self {
            kind: MemberKind::Property,
            declared_ty: Some(ty),
            inferred_ty: None,
            flags: MemberFlags::empty(),
        }
    }

    #[must_use]
    pub fn with_final(mut self) -> Self {
        self.flags |= MemberFlags::FINAL;
        self
    }

    #[must_use]
    pub fn with_override(mut self) -> Self {
        self.flags |= MemberFlags::OVERRIDE;
        self
    }

    #[must_use]
    pub fn with_synthesized(mut self) -> Self {
        self.flags |= MemberFlags::SYNTHESIZED;
        self
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn declared_type(&self) -> Option<Type> {
        self.declared_ty
    }

    pub fn inferred_type(&self) -> Option<Type> {
        self.inferred_ty
    }

    /// The effective type of the member: declared if annotated, inferred
    /// otherwise, `Unknown` as a last resort.
    pub fn ty(&self) -> Type {
        self.declared_ty
            .or(self.inferred_ty)
            .unwrap_or(Type::unknown())
    }

    pub fn is_annotated(&self) -> bool {
        self.declared_ty.is_some()
    }

    pub fn is_final(&self) -> bool {
        self.flags.contains(MemberFlags::FINAL)
    }

    pub fn is_override(&self) -> bool {
        self.flags.contains(MemberFlags::OVERRIDE)
    }

    pub fn is_synthesized(&self) -> bool {
        self.flags.contains(MemberFlags::SYNTHESIZED)
    }
}

/// A base class entry in a class definition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Base {
    Class {
        class: ClassId,
        /// Type arguments applied to the base, for `class C(A[int])`.
        specialization: Option<SpecializationId>,
    },
    /// An `Any`/`Unknown` base: the class hierarchy is not fully known.
    Dynamic(DynamicType),
}

impl Base {
    pub fn class(class: ClassId) -> Self {
        Base::Class {
            class,
            specialization: None,
        }
    }

    /// A generic base with explicit type arguments, e.g. `A[int]`.
    pub fn generic(db: &dyn Db, class: ClassId, arguments: impl IntoIterator<Item = Type>) -> Self {
        let specialization = Specialization::for_class(db, class, arguments);
        Base::Class {
            class,
            specialization: Some(db.types().intern_specialization(specialization)),
        }
    }

    pub fn unknown() -> Self {
        Base::Dynamic(DynamicType::Unknown)
    }

    pub fn any() -> Self {
        Base::Dynamic(DynamicType::Any)
    }
}

/// A class definition.
#[derive(Clone, Debug)]
pub struct Class {
    name: Name,
    type_params: Box<[TypeVarId]>,
    bases: Vec<Base>,
    /// Member declarations in declaration order.
    members: FxIndexMap<Name, Declaration>,
    flags: ClassFlags,
    known: Option<KnownClass>,
}

impl Class {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            type_params: Box::default(),
            bases: Vec::new(),
            members: FxIndexMap::default(),
            flags: ClassFlags::default(),
            known: None,
        }
    }

    #[must_use]
    pub fn with_type_params(mut self, type_params: impl IntoIterator<Item = TypeVarId>) -> Self {
        self.type_params = type_params.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_bases(mut self, bases: impl IntoIterator<Item = Base>) -> Self {
        self.bases = bases.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_member(mut self, name: impl Into<Name>, declaration: Declaration) -> Self {
        self.members.insert(name.into(), declaration);
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ClassFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub(crate) fn with_known(mut self, known: KnownClass) -> Self {
        self.known = Some(known);
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn type_params(&self) -> &[TypeVarId] {
        &self.type_params
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn bases(&self) -> &[Base] {
        &self.bases
    }

    pub fn members(&self) -> &FxIndexMap<Name, Declaration> {
        &self.members
    }

    pub fn own_member(&self, name: &str) -> Option<&Declaration> {
        self.members.get(name)
    }

    pub fn flags(&self) -> ClassFlags {
        self.flags
    }

    pub fn is_final(&self) -> bool {
        self.flags.contains(ClassFlags::FINAL)
    }

    pub fn is_protocol(&self) -> bool {
        self.flags.contains(ClassFlags::PROTOCOL)
    }

    pub fn is_dataclass(&self) -> bool {
        self.flags
            .intersects(ClassFlags::DATACLASS | ClassFlags::FROZEN_DATACLASS)
    }

    pub fn is_frozen_dataclass(&self) -> bool {
        self.flags.contains(ClassFlags::FROZEN_DATACLASS)
    }

    pub(crate) fn known(&self) -> Option<KnownClass> {
        self.known
    }

    pub(crate) fn is_object(&self) -> bool {
        self.known == Some(KnownClass::Object)
    }

    /// The annotated, non-synthesized instance attributes, in declaration
    /// order. These are the fields of a dataclass.
    pub(crate) fn dataclass_fields(&self) -> impl Iterator<Item = (&Name, &Declaration)> {
        self.members.iter().filter(|(_, declaration)| {
            declaration.kind() == MemberKind::Variable
                && declaration.is_annotated()
                && !declaration.is_synthesized()
        })
    }
}

/// Append-only arena of class definitions.
///
/// Built through `&mut` while the symbol table is constructed; read-only
/// for the rest of the analysis pass.
#[derive(Debug, Default)]
pub struct ClassStore {
    classes: Vec<Class>,
    known: rustc_hash::FxHashMap<KnownClass, ClassId>,
}

impl ClassStore {
    pub fn add(&mut self, class: Class) -> ClassId {
        let id = ClassId(u32::try_from(self.classes.len()).unwrap_or(u32::MAX));
        if let Some(known) = class.known() {
            self.known.insert(known, id);
        }
        self.classes.push(class);
        id
    }

    /// The arena id of a well-known class, if it has been registered.
    pub fn known_class(&self, known: KnownClass) -> Option<ClassId> {
        self.known.get(&known).copied()
    }

    #[track_caller]
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &Class)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(index, class)| (ClassId(u32::try_from(index).unwrap_or(u32::MAX)), class))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// A member found by walking a class's MRO.
#[derive(Debug, Clone)]
pub(crate) struct MemberInMro {
    pub(crate) owner: ClassId,
    /// The owner's specialization as seen from the starting class.
    pub(crate) specialization: Option<Specialization>,
    pub(crate) declaration: Declaration,
}

/// Finds `name` along the MRO of `class`, optionally skipping the class's
/// own declaration (for override checks).
///
/// Returns `None` both when the member does not exist and when a dynamic
/// MRO entry precedes any match: an unknown base could define anything,
/// so no reliable answer exists.
pub(crate) fn find_member_in_mro(
    db: &dyn Db,
    class: ClassId,
    name: &str,
    skip_own: bool,
) -> Option<MemberInMro> {
    let mro = mro_of(db, class);
    for entry in mro.iter() {
        match entry {
            ClassBase::Dynamic(_) => return None,
            ClassBase::Class(owner, specialization) => {
                if skip_own && *owner == class {
                    continue;
                }
                let owner_class = db.classes().class(*owner);
                if let Some(declaration) = owner_class.own_member(name) {
                    return Some(MemberInMro {
                        owner: *owner,
                        specialization: specialization
                            .map(|id| (*db.types().specialization(id)).clone()),
                        declaration: declaration.clone(),
                    });
                }
            }
        }
    }
    None
}

/// The specialization of `target` as seen from `instance`, if `target`
/// occurs in the MRO of the instance's class.
///
/// The outer `Option` answers "is `target` an ancestor at all"; the inner
/// one carries the type arguments, absent for non-generic ancestors.
pub(crate) fn specialization_of_base(
    db: &dyn Db,
    instance: InstanceType,
    target: ClassId,
) -> Option<Option<Specialization>> {
    // The MRO head entry never stores arguments for the class itself;
    // the instance carries them.
    if target == instance.class {
        return Some(
            instance
                .specialization
                .map(|id| (*db.types().specialization(id)).clone()),
        );
    }

    let mro = mro_of(db, instance.class);
    for entry in mro.iter() {
        if let ClassBase::Class(class, specialization) = entry {
            if *class == target {
                let entry_spec = specialization.map(|id| (*db.types().specialization(id)).clone());
                // The stored entry may mention the starting class's own
                // type parameters; resolve them through the instance.
                return Some(match (entry_spec, instance.specialization) {
                    (Some(entry_spec), Some(own)) => {
                        Some(db.types().specialization(own).apply_to(db, &entry_spec))
                    }
                    (entry_spec, _) => entry_spec,
                });
            }
        }
    }
    None
}

/// Whether `class` defines its own `__init__`, either explicitly or
/// through a dataclass transform that declares fields.
pub(crate) fn has_own_init(db: &dyn Db, class: ClassId) -> bool {
    let class_def = db.classes().class(class);
    if class_def.own_member("__init__").is_some() {
        return true;
    }
    class_def.is_dataclass() && class_def.dataclass_fields().next().is_some()
}

/// The `__init__` signature synthesized by a dataclass transform, if the
/// class gets one.
pub(crate) fn synthesized_init_signature(db: &dyn Db, class: ClassId) -> Option<Signature> {
    let class_def = db.classes().class(class);
    if !class_def.is_dataclass() || class_def.own_member("__init__").is_some() {
        return None;
    }
    let parameters = class_def
        .dataclass_fields()
        .map(|(name, declaration)| {
            Parameter::positional_or_keyword(name.clone()).with_annotated_type(declaration.ty())
        })
        .collect::<Vec<_>>();
    Some(Signature::new(Parameters::new(parameters), Some(Type::None)))
}

/// The `__replace__` signature synthesized for frozen dataclasses: the
/// same fields as `__init__`, all optional, returning a new instance.
pub(crate) fn synthesized_replace_signature(db: &dyn Db, class: ClassId) -> Option<Signature> {
    let class_def = db.classes().class(class);
    if !class_def.is_frozen_dataclass() {
        return None;
    }
    let parameters = class_def
        .dataclass_fields()
        .map(|(name, declaration)| {
            Parameter::keyword_only(name.clone())
                .with_annotated_type(declaration.ty())
                .with_default_type(declaration.ty())
        })
        .collect::<Vec<_>>();
    Some(Signature::new(
        Parameters::new(parameters),
        Some(Type::instance(class)),
    ))
}

/// The signature used when the class object itself is called: the
/// parameters of `__init__` (declared, inherited, or synthesized by a
/// dataclass transform), returning an instance of the class.
pub(crate) fn constructor_signature(db: &dyn Db, class: ClassId) -> Signature {
    let return_ty = Some(Type::instance(class));

    if let Some((_, member)) = Type::instance(class).instance_member(db, "__init__") {
        if let Type::Callable(callable) = member {
            if let Some(signature) = db.types().callable(callable).single_signature() {
                return Signature::new(signature.parameters().clone(), return_ty);
            }
        }
    }

    Signature::new(Parameters::new([]), return_ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ModuleDb;

    #[test]
    fn member_lookup_walks_the_mro() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let base = db.add_class(
            Class::new("Base")
                .with_bases([Base::class(object)])
                .with_member("value", Declaration::variable(Type::IntLiteral(0))),
        );
        let derived = db.add_class(Class::new("Derived").with_bases([Base::class(base)]));

        let found = find_member_in_mro(&db, derived, "value", false).unwrap();
        assert_eq!(found.owner, base);

        assert!(find_member_in_mro(&db, derived, "missing", false).is_none());
    }

    #[test]
    fn skip_own_finds_the_shadowed_declaration() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let base = db.add_class(
            Class::new("Base")
                .with_bases([Base::class(object)])
                .with_member("value", Declaration::variable(Type::IntLiteral(0))),
        );
        let derived = db.add_class(
            Class::new("Derived")
                .with_bases([Base::class(base)])
                .with_member("value", Declaration::variable(Type::IntLiteral(1))),
        );

        let own = find_member_in_mro(&db, derived, "value", false).unwrap();
        assert_eq!(own.owner, derived);
        let shadowed = find_member_in_mro(&db, derived, "value", true).unwrap();
        assert_eq!(shadowed.owner, base);
    }

    #[test]
    fn dynamic_base_hides_members() {
        let mut db = ModuleDb::new();
        let derived = db.add_class(Class::new("FromUnknown").with_bases([Base::unknown()]));
        assert!(find_member_in_mro(&db, derived, "anything", false).is_none());
    }

    #[test]
    fn own_class_arguments_come_from_the_instance() {
        use crate::types::generics::TypeVarType;

        let mut db = ModuleDb::new();
        let object = db.object_class();
        let int = KnownClass::Int.to_instance(&db);
        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));
        let box_class = db.add_class(
            Class::new("Box")
                .with_type_params([t])
                .with_bases([Base::class(object)]),
        );

        let Type::NominalInstance(instance) = Type::generic_instance(&db, box_class, [int]) else {
            panic!("expected a nominal instance");
        };
        let specialization = specialization_of_base(&db, instance, box_class)
            .unwrap()
            .unwrap();
        assert_eq!(specialization.get(t), Some(int));
    }

    #[test]
    fn dataclass_synthesizes_init_from_annotated_fields() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let int = KnownClass::Int.to_instance(&db);
        let point = db.add_class(
            Class::new("Point")
                .with_bases([Base::class(object)])
                .with_flags(ClassFlags::DATACLASS)
                .with_member("x", Declaration::variable(int))
                .with_member("y", Declaration::variable(int))
                .with_member("label", Declaration::unannotated(Type::string_literal(&db, "p"))),
        );

        let init = synthesized_init_signature(&db, point).unwrap();
        // Only annotated fields become parameters.
        assert_eq!(init.parameters().len(), 2);
        assert!(has_own_init(&db, point));
    }

    #[test]
    fn explicit_init_suppresses_synthesis() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let init_ty = Type::callable(
            &db,
            Signature::new(Parameters::new([]), Some(Type::None)),
        );
        let class = db.add_class(
            Class::new("Custom")
                .with_bases([Base::class(object)])
                .with_flags(ClassFlags::DATACLASS)
                .with_member("x", Declaration::variable(KnownClass::Int.to_instance(&db)))
                .with_member("__init__", Declaration::method(init_ty)),
        );

        assert!(synthesized_init_signature(&db, class).is_none());
        assert!(has_own_init(&db, class));
    }

    #[test]
    fn plain_class_has_no_own_init() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let class = db.add_class(Class::new("Plain").with_bases([Base::class(object)]));
        assert!(!has_own_init(&db, class));
    }

    #[test]
    fn frozen_dataclass_synthesizes_replace() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let point = db.add_class(
            Class::new("Frozen")
                .with_bases([Base::class(object)])
                .with_flags(ClassFlags::FROZEN_DATACLASS)
                .with_member("x", Declaration::variable(KnownClass::Int.to_instance(&db))),
        );

        let replace = synthesized_replace_signature(&db, point).unwrap();
        assert_eq!(replace.return_type(), Some(Type::instance(point)));
        assert!(replace.parameters().iter().all(Parameter::is_optional));
    }
}
