//! Interning of compound type payloads.
//!
//! `Type` is a small `Copy` value: every compound payload (union element
//! lists, callables, string literal values, specializations) lives in the
//! [`TypeStore`] and is referenced through a `u32` handle. Interning
//! canonicalizes payloads, so handle equality is structural equality.
//!
//! All tables take `&self` and are safe to use from multiple threads.
//! A lost race wastes an id but never produces two handles for the same
//! payload.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

use crate::name::Name;
use crate::types::CallableType;
use crate::types::Type;
use crate::types::generics::{Specialization, TypeVarType};

/// Handle to an interned union element list.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnionId(u32);

/// Handle to an interned callable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallableId(u32);

/// Handle to an interned string literal value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringLiteralId(u32);

/// Handle to an interned specialization (type arguments for a generic class).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecializationId(u32);

/// Identity of a type variable.
///
/// Type variables are registered rather than interned: two distinct
/// registrations with the same name are distinct variables.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVarId(u32);

/// A table interning one kind of payload.
#[derive(Debug)]
struct InternTable<T: ?Sized + Hash + Eq> {
    ids: DashMap<Arc<T>, u32, FxBuildHasher>,
    values: DashMap<u32, Arc<T>, FxBuildHasher>,
    next: AtomicU32,
}

impl<T: ?Sized + Hash + Eq> Default for InternTable<T> {
    fn default() -> Self {
        Self {
            ids: DashMap::default(),
            values: DashMap::default(),
            next: AtomicU32::new(0),
        }
    }
}

impl<T: ?Sized + Hash + Eq> InternTable<T> {
    fn intern(&self, value: Arc<T>) -> u32 {
        let id = *self
            .ids
            .entry(value.clone())
            .or_insert_with(|| self.next.fetch_add(1, Ordering::Relaxed));
        // The reverse mapping is published before the id escapes this call.
        self.values.entry(id).or_insert(value);
        id
    }

    #[track_caller]
    fn lookup(&self, id: u32) -> Arc<T> {
        match self.values.get(&id) {
            Some(entry) => entry.value().clone(),
            None => panic!("lookup of an id that was never interned in this store"),
        }
    }
}

/// Storage for all compound type payloads of one analysis pass.
#[derive(Debug, Default)]
pub struct TypeStore {
    unions: InternTable<[Type]>,
    callables: InternTable<CallableType>,
    strings: InternTable<str>,
    specializations: InternTable<Specialization>,

    typevars: DashMap<u32, Arc<TypeVarType>, FxBuildHasher>,
    next_typevar: AtomicU32,

    /// Type variables used when synthesizing an overload implementation:
    /// the variable for structural position `i` is allocated once and
    /// shared by every synthesis in this pass.
    canonical_typevars: DashMap<u32, TypeVarId, FxBuildHasher>,
}

impl TypeStore {
    pub fn intern_union(&self, elements: Vec<Type>) -> UnionId {
        UnionId(self.unions.intern(Arc::from(elements.into_boxed_slice())))
    }

    pub fn union_elements(&self, id: UnionId) -> Arc<[Type]> {
        self.unions.lookup(id.0)
    }

    pub fn intern_callable(&self, callable: CallableType) -> CallableId {
        CallableId(self.callables.intern(Arc::new(callable)))
    }

    pub fn callable(&self, id: CallableId) -> Arc<CallableType> {
        self.callables.lookup(id.0)
    }

    pub fn intern_string(&self, value: &str) -> StringLiteralId {
        StringLiteralId(self.strings.intern(Arc::from(value)))
    }

    pub fn string_literal(&self, id: StringLiteralId) -> Arc<str> {
        self.strings.lookup(id.0)
    }

    pub fn intern_specialization(&self, specialization: Specialization) -> SpecializationId {
        SpecializationId(self.specializations.intern(Arc::new(specialization)))
    }

    pub fn specialization(&self, id: SpecializationId) -> Arc<Specialization> {
        self.specializations.lookup(id.0)
    }

    /// Registers a fresh type variable. Never deduplicates.
    pub fn add_typevar(&self, typevar: TypeVarType) -> TypeVarId {
        let id = self.next_typevar.fetch_add(1, Ordering::Relaxed);
        self.typevars.insert(id, Arc::new(typevar));
        TypeVarId(id)
    }

    #[track_caller]
    pub fn typevar(&self, id: TypeVarId) -> Arc<TypeVarType> {
        match self.typevars.get(&id.0) {
            Some(entry) => entry.value().clone(),
            None => panic!("lookup of a type variable that was never registered"),
        }
    }

    /// The canonical type variable for structural position `index`.
    ///
    /// Used when unifying the type variables of several overloads by
    /// position: every overload's `i`-th distinct variable maps to the
    /// same canonical variable, so unioning their occurrences collapses.
    pub fn canonical_typevar(&self, index: u32) -> TypeVarId {
        if let Some(existing) = self.canonical_typevars.get(&index) {
            return *existing;
        }
        let id = self.add_typevar(TypeVarType::new(Name::from(format!("T{index}"))));
        *self.canonical_typevars.entry(index).or_insert(id)
    }
}
