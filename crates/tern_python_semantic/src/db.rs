//! The analysis-pass context.
//!
//! A [`ModuleDb`] owns everything one checking pass needs: the class
//! arena, the type store, the derived-fact caches, and the rule
//! selection. There is no global state; tests construct their own db.
//!
//! The symbol table is built through `&mut self`; analysis itself only
//! needs `&self`. Interning and memoization use interior, race-safe maps
//! whose recomputation is idempotent, so shared references may be handed
//! to several worker threads at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

use crate::lint::RuleSelection;
use crate::types::KnownClass;
use crate::types::class::{Base, Class, ClassId, ClassStore};
use crate::types::intern::TypeStore;
use crate::types::mro::{Mro, MroError};
use crate::types::variance::TypeVarVariance;

/// Memoized derived facts about classes.
///
/// Entries are pure functions of the (immutable) class arena: losing a
/// race costs a recomputation, never a different answer.
#[derive(Debug, Default)]
pub struct SemanticCaches {
    pub(crate) mro: DashMap<ClassId, Result<Arc<Mro>, MroError>, FxBuildHasher>,
    pub(crate) variance: DashMap<ClassId, Arc<[TypeVarVariance]>, FxBuildHasher>,
}

impl SemanticCaches {
    fn clear(&self) {
        self.mro.clear();
        self.variance.clear();
    }
}

/// Database giving access to semantic information about a module.
pub trait Db {
    fn classes(&self) -> &ClassStore;
    fn types(&self) -> &TypeStore;
    fn caches(&self) -> &SemanticCaches;
    fn rule_selection(&self) -> &RuleSelection;

    /// Cooperative cancellation: checked between top-level declarations.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// The concrete per-module analysis context.
#[derive(Debug)]
pub struct ModuleDb {
    classes: ClassStore,
    types: TypeStore,
    caches: SemanticCaches,
    rule_selection: RuleSelection,
    cancellation_token: Option<Arc<AtomicBool>>,
}

impl ModuleDb {
    /// Creates a db with the well-known classes pre-registered.
    pub fn new() -> Self {
        let mut classes = ClassStore::default();

        let object = classes.add(Class::new("object").with_known(KnownClass::Object));
        let int = classes.add(
            Class::new("int")
                .with_known(KnownClass::Int)
                .with_bases([Base::class(object)]),
        );
        classes.add(
            Class::new("bool")
                .with_known(KnownClass::Bool)
                .with_bases([Base::class(int)]),
        );
        classes.add(
            Class::new("str")
                .with_known(KnownClass::Str)
                .with_bases([Base::class(object)]),
        );
        classes.add(
            Class::new("NoneType")
                .with_known(KnownClass::NoneType)
                .with_bases([Base::class(object)]),
        );
        classes.add(
            Class::new("type")
                .with_known(KnownClass::Type)
                .with_bases([Base::class(object)]),
        );

        Self {
            classes,
            types: TypeStore::default(),
            caches: SemanticCaches::default(),
            rule_selection: RuleSelection::from_registry(crate::default_lint_registry()),
            cancellation_token: None,
        }
    }

    #[must_use]
    pub fn with_rule_selection(mut self, rule_selection: RuleSelection) -> Self {
        self.rule_selection = rule_selection;
        self
    }

    pub fn set_cancellation_token(&mut self, token: Arc<AtomicBool>) {
        self.cancellation_token = Some(token);
    }

    /// Adds a class to the arena. Bases must already be registered.
    ///
    /// Derived-fact caches are dropped: they may not refer to classes
    /// that did not exist when they were computed, but a cheap full clear
    /// keeps the invariant obvious.
    pub fn add_class(&mut self, class: Class) -> ClassId {
        self.caches.clear();
        self.classes.add(class)
    }

    #[track_caller]
    pub fn object_class(&self) -> ClassId {
        match self.classes.known_class(KnownClass::Object) {
            Some(object) => object,
            None => panic!("`object` is registered in every `ModuleDb`"),
        }
    }
}

impl Default for ModuleDb {
    fn default() -> Self {
        Self::new()
    }
}

impl Db for ModuleDb {
    fn classes(&self) -> &ClassStore {
        &self.classes
    }

    fn types(&self) -> &TypeStore {
        &self.types
    }

    fn caches(&self) -> &SemanticCaches {
        &self.caches
    }

    fn rule_selection(&self) -> &RuleSelection {
        &self.rule_selection
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation_token
            .as_ref()
            .is_some_and(|token| token.load(Ordering::Relaxed))
    }
}
