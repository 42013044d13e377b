use std::hash::BuildHasherDefault;
use std::sync::LazyLock;

use rustc_hash::FxHasher;

pub use crate::check::{FunctionBody, Module, check_module};
pub use crate::db::{Db, ModuleDb, SemanticCaches};
pub use crate::name::Name;

pub mod check;
pub mod db;
pub mod flow;
pub mod lint;
pub mod name;
pub mod types;

pub(crate) type FxIndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<FxHasher>>;
pub(crate) type FxOrderSet<V> = ordermap::OrderSet<V, BuildHasherDefault<FxHasher>>;

/// The lint registry of all rules this crate defines.
pub fn default_lint_registry() -> &'static lint::LintRegistry {
    static REGISTRY: LazyLock<lint::LintRegistry> = LazyLock::new(|| {
        let mut registry = lint::LintRegistryBuilder::default();
        types::diagnostic::register_lints(&mut registry);
        registry.build()
    });

    &REGISTRY
}
