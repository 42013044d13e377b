//! Method resolution order: C3 linearization over the class arena.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::Db;
use crate::types::DynamicType;
use crate::types::class::{Base, ClassId};

/// One entry in a method resolution order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassBase {
    /// A proper class, with the type arguments it receives as seen from
    /// the class whose MRO this is.
    Class(ClassId, Option<crate::types::intern::SpecializationId>),

    /// An `Any`/`Unknown` entry: an unresolved base somewhere in the
    /// hierarchy.
    Dynamic(DynamicType),
}

impl ClassBase {
    /// Entries denote the same position in a hierarchy when they name the
    /// same class, regardless of type arguments.
    fn same_class(self, other: ClassBase) -> bool {
        match (self, other) {
            (ClassBase::Class(a, _), ClassBase::Class(b, _)) => a == b,
            (ClassBase::Dynamic(_), ClassBase::Dynamic(_)) => true,
            _ => false,
        }
    }
}

/// The method resolution order of a class, starting with the class itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mro(Box<[ClassBase]>);

impl Mro {
    pub fn iter(&self) -> std::slice::Iter<'_, ClassBase> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn contains_dynamic(&self) -> bool {
        self.0
            .iter()
            .any(|entry| matches!(entry, ClassBase::Dynamic(_)))
    }

    /// The fallback used when linearization fails: the class itself, an
    /// `Unknown` spacer, and `object`.
    fn fallback(db: &dyn Db, class: ClassId) -> Self {
        let mut entries = vec![
            ClassBase::Class(class, None),
            ClassBase::Dynamic(DynamicType::Unknown),
        ];
        if let Some(object) = db.classes().known_class(crate::types::KnownClass::Object) {
            entries.push(ClassBase::Class(object, None));
        }
        Mro(entries.into_boxed_slice())
    }
}

impl FromIterator<ClassBase> for Mro {
    fn from_iter<T: IntoIterator<Item = ClassBase>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Mro {
    type Item = &'a ClassBase;
    type IntoIter = std::slice::Iter<'a, ClassBase>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MroError {
    /// The same class is listed more than once in the direct bases.
    #[error("duplicate base class in class definition")]
    DuplicateBases(Box<[ClassId]>),

    /// The class participates in an inheritance cycle.
    #[error("cyclic class definition")]
    CyclicClassDefinition,

    /// The bases admit no consistent C3 linearization.
    #[error("cannot create a consistent method resolution order")]
    UnresolvableMro,
}

/// The MRO of `class`, falling back to `[class, Unknown, object]` when it
/// cannot be resolved. Memoized.
pub(crate) fn mro_of(db: &dyn Db, class: ClassId) -> Arc<Mro> {
    match try_mro_of(db, class) {
        Ok(mro) => mro,
        Err(_) => Arc::new(Mro::fallback(db, class)),
    }
}

/// Like [`mro_of`], but surfaces linearization failures for diagnostics.
pub(crate) fn try_mro_of(db: &dyn Db, class: ClassId) -> Result<Arc<Mro>, MroError> {
    let mut visiting = FxHashSet::default();
    mro_with(db, class, &mut visiting)
}

fn mro_with(
    db: &dyn Db,
    class: ClassId,
    visiting: &mut FxHashSet<ClassId>,
) -> Result<Arc<Mro>, MroError> {
    if let Some(cached) = db.caches().mro.get(&class) {
        return cached.clone();
    }
    if !visiting.insert(class) {
        return Err(MroError::CyclicClassDefinition);
    }

    let _span =
        tracing::trace_span!("mro_of", class = %db.classes().class(class).name()).entered();

    let result = compute_mro(db, class, visiting).map(Arc::new);
    visiting.remove(&class);

    db.caches()
        .mro
        .entry(class)
        .or_insert_with(|| result.clone())
        .clone()
}

fn compute_mro(
    db: &dyn Db,
    class: ClassId,
    visiting: &mut FxHashSet<ClassId>,
) -> Result<Mro, MroError> {
    let class_def = db.classes().class(class);
    let object = db.classes().known_class(crate::types::KnownClass::Object);

    let mut bases = class_def.bases().to_vec();
    if bases.is_empty() {
        // Implicit `object` base for every class except `object` itself.
        match object {
            Some(object) if object != class => bases.push(Base::class(object)),
            _ => return Ok(std::iter::once(ClassBase::Class(class, None)).collect()),
        }
    }

    let mut seen = FxHashSet::default();
    let duplicates: Vec<ClassId> = bases
        .iter()
        .filter_map(|base| match base {
            Base::Class { class, .. } if !seen.insert(*class) => Some(*class),
            _ => None,
        })
        .collect();
    if !duplicates.is_empty() {
        return Err(MroError::DuplicateBases(duplicates.into_boxed_slice()));
    }

    if let [single] = bases.as_slice() {
        // Fast path: single inheritance needs no merge.
        let mut entries = vec![ClassBase::Class(class, None)];
        entries.extend(linearized_base(db, single, visiting)?);
        return Ok(entries.into_iter().collect());
    }

    let mut sequences: Vec<VecDeque<ClassBase>> = Vec::with_capacity(bases.len() + 2);
    sequences.push(VecDeque::from([ClassBase::Class(class, None)]));
    for base in &bases {
        sequences.push(linearized_base(db, base, visiting)?.into());
    }
    sequences.push(bases.iter().map(|base| base_entry(base)).collect());

    c3_merge(sequences).ok_or(MroError::UnresolvableMro)
}

fn base_entry(base: &Base) -> ClassBase {
    match base {
        Base::Class {
            class,
            specialization,
        } => ClassBase::Class(*class, *specialization),
        Base::Dynamic(dynamic) => ClassBase::Dynamic(*dynamic),
    }
}

/// The MRO contributed by one direct base, with the base's declared type
/// arguments substituted through every inherited entry.
fn linearized_base(
    db: &dyn Db,
    base: &Base,
    visiting: &mut FxHashSet<ClassId>,
) -> Result<Vec<ClassBase>, MroError> {
    match base {
        Base::Dynamic(dynamic) => {
            let mut entries = vec![ClassBase::Dynamic(*dynamic)];
            if let Some(object) = db.classes().known_class(crate::types::KnownClass::Object) {
                entries.push(ClassBase::Class(object, None));
            }
            Ok(entries)
        }
        Base::Class {
            class: base_class,
            specialization,
        } => {
            let base_mro = mro_with(db, *base_class, visiting)?;
            let declared = specialization.map(|id| db.types().specialization(id));
            Ok(base_mro
                .iter()
                .map(|entry| match entry {
                    ClassBase::Dynamic(_) => *entry,
                    ClassBase::Class(c, _) if c == base_class => {
                        ClassBase::Class(*c, *specialization)
                    }
                    ClassBase::Class(c, entry_spec) => {
                        let composed = match (&declared, entry_spec) {
                            (Some(declared), Some(entry_spec)) => {
                                let entry_spec = db.types().specialization(*entry_spec);
                                Some(
                                    db.types()
                                        .intern_specialization(declared.apply_to(db, &entry_spec)),
                                )
                            }
                            (_, entry_spec) => *entry_spec,
                        };
                        ClassBase::Class(*c, composed)
                    }
                })
                .collect())
        }
    }
}

/// Implementation of the C3-merge algorithm, as described in
/// <https://docs.python.org/3/howto/mro.html#python-2-3-mro>.
fn c3_merge(mut sequences: Vec<VecDeque<ClassBase>>) -> Option<Mro> {
    let mut mro = Vec::new();

    loop {
        sequences.retain(|sequence| !sequence.is_empty());

        if sequences.is_empty() {
            return Some(mro.into_iter().collect());
        }

        // If the splitting of the candidate fails for every sequence,
        // the hierarchy is inconsistent.
        let mut candidate = None;
        'next_head: for sequence in &sequences {
            let head = sequence[0];
            for other in &sequences {
                if other
                    .iter()
                    .skip(1)
                    .any(|entry| entry.same_class(head))
                {
                    continue 'next_head;
                }
            }
            candidate = Some(head);
            break;
        }
        let candidate = candidate?;

        mro.push(candidate);
        for sequence in &mut sequences {
            if sequence
                .front()
                .is_some_and(|entry| entry.same_class(candidate))
            {
                sequence.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ModuleDb;
    use crate::types::KnownClass;
    use crate::types::class::Class;
    use crate::name::Name;
    use crate::types::Type;
    use crate::types::generics::TypeVarType;

    fn class_ids(mro: &Mro) -> Vec<Option<ClassId>> {
        mro.iter()
            .map(|entry| match entry {
                ClassBase::Class(class, _) => Some(*class),
                ClassBase::Dynamic(_) => None,
            })
            .collect()
    }

    #[test]
    fn object_mro_is_itself() {
        let db = ModuleDb::new();
        let object = db.object_class();
        let mro = mro_of(&db, object);
        assert_eq!(class_ids(&mro), vec![Some(object)]);
    }

    #[test]
    fn diamond_linearizes() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let a = db.add_class(Class::new("A"));
        let b = db.add_class(Class::new("B").with_bases([Base::class(a)]));
        let c = db.add_class(Class::new("C").with_bases([Base::class(a)]));
        let d = db.add_class(Class::new("D").with_bases([Base::class(b), Base::class(c)]));

        let mro = try_mro_of(&db, d).unwrap();
        assert_eq!(
            class_ids(&mro),
            vec![Some(d), Some(b), Some(c), Some(a), Some(object)]
        );
    }

    #[test]
    fn inconsistent_hierarchy_is_unresolvable() {
        let mut db = ModuleDb::new();
        let a = db.add_class(Class::new("A"));
        let b = db.add_class(Class::new("B").with_bases([Base::class(a)]));
        // `class C(A, B)` contradicts B's placement of A.
        let c = db.add_class(Class::new("C").with_bases([Base::class(a), Base::class(b)]));

        assert_eq!(try_mro_of(&db, c), Err(MroError::UnresolvableMro));
        // The fallback keeps member lookup alive.
        let fallback = mro_of(&db, c);
        assert!(fallback.contains_dynamic());
    }

    #[test]
    fn duplicate_bases_are_detected() {
        let mut db = ModuleDb::new();
        let a = db.add_class(Class::new("A"));
        let c = db.add_class(Class::new("C").with_bases([Base::class(a), Base::class(a)]));

        assert!(matches!(
            try_mro_of(&db, c),
            Err(MroError::DuplicateBases(_))
        ));
    }

    #[test]
    fn dynamic_base_contributes_a_dynamic_entry() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let c = db.add_class(Class::new("C").with_bases([Base::unknown()]));

        let mro = try_mro_of(&db, c).unwrap();
        assert_eq!(class_ids(&mro), vec![Some(c), None, Some(object)]);
        assert!(mro.contains_dynamic());
    }

    #[test]
    fn generic_base_arguments_flow_through_the_mro() {
        let mut db = ModuleDb::new();
        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));
        let container = db.add_class(Class::new("Container").with_type_params([t]));
        let int = KnownClass::Int.to_instance(&db);
        let int_box = db.add_class(
            Class::new("IntBox").with_bases([Base::generic(&db, container, [int])]),
        );

        let mro = try_mro_of(&db, int_box).unwrap();
        let container_entry = mro
            .iter()
            .find_map(|entry| match entry {
                ClassBase::Class(class, spec) if *class == container => Some(*spec),
                _ => None,
            })
            .unwrap()
            .unwrap();
        assert_eq!(db.types().specialization(container_entry).types(), &[int]);
    }

    #[test]
    fn transitive_generic_substitution() {
        let mut db = ModuleDb::new();
        let t = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("T")));
        let base = db.add_class(Class::new("BaseContainer").with_type_params([t]));

        let u = db
            .types()
            .add_typevar(TypeVarType::new(Name::new_static("U")));
        // class Middle[U](BaseContainer[U])
        let middle = db.add_class(
            Class::new("Middle")
                .with_type_params([u])
                .with_bases([Base::generic(&db, base, [Type::TypeVar(u)])]),
        );
        // class Leaf(Middle[str])
        let str_ty = KnownClass::Str.to_instance(&db);
        let leaf =
            db.add_class(Class::new("Leaf").with_bases([Base::generic(&db, middle, [str_ty])]));

        let mro = try_mro_of(&db, leaf).unwrap();
        let base_spec = mro
            .iter()
            .find_map(|entry| match entry {
                ClassBase::Class(class, spec) if *class == base => Some(*spec),
                _ => None,
            })
            .unwrap()
            .unwrap();
        // U was substituted with str on the way down.
        assert_eq!(db.types().specialization(base_spec).types(), &[str_ty]);
    }
}
