//! Module-level checking: runs the override audit over every class and
//! the flow analysis over every function body, collecting diagnostics.

use crate::Db;
use crate::flow::{self, FlowGraph, PlaceTable};
use crate::name::Name;
use crate::types::class::ClassId;
use crate::types::context::CheckContext;
use crate::types::diagnostic::{GENERAL_TYPE_ISSUES, TypeCheckDiagnostics};
use crate::types::mro::try_mro_of;
use crate::types::overrides;

/// One function body, lowered to places and a flow graph.
#[derive(Debug, Clone)]
pub struct FunctionBody {
    name: Name,
    places: PlaceTable,
    graph: FlowGraph,
}

impl FunctionBody {
    pub fn new(name: impl Into<Name>, places: PlaceTable, graph: FlowGraph) -> Self {
        Self {
            name: name.into(),
            places,
            graph,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn places(&self) -> &PlaceTable {
        &self.places
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }
}

/// The checkable contents of one module.
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: Name,
    classes: Vec<ClassId>,
    functions: Vec<FunctionBody>,
}

impl Module {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            classes: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn add_class(&mut self, class: ClassId) {
        self.classes.push(class);
    }

    pub fn add_function(&mut self, function: FunctionBody) {
        self.functions.push(function);
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn classes(&self) -> &[ClassId] {
        &self.classes
    }

    pub fn functions(&self) -> &[FunctionBody] {
        &self.functions
    }
}

/// Checks every class and function of `module`.
///
/// Checking stops early, returning the diagnostics collected so far,
/// if the db's cancellation token is set.
pub fn check_module(db: &dyn Db, module: &Module) -> TypeCheckDiagnostics {
    let _span = tracing::debug_span!("check_module", module = %module.name()).entered();

    let mut diagnostics = TypeCheckDiagnostics::default();

    for &class in module.classes() {
        if db.is_cancelled() {
            return diagnostics;
        }
        let class_name = db.classes().class(class).name().clone();
        let _span = tracing::trace_span!("check_class", class = %class_name).entered();

        let context = CheckContext::new(db, class_name);
        if let Err(error) = try_mro_of(db, class) {
            context.report_lint(
                &GENERAL_TYPE_ISSUES,
                format_args!("cannot resolve the class's MRO: {error}"),
            );
        }
        overrides::check_class(&context, class);
        diagnostics.extend(context.finish());
    }

    for function in module.functions() {
        if db.is_cancelled() {
            return diagnostics;
        }
        let _span = tracing::trace_span!("check_function", function = %function.name()).entered();

        let context = CheckContext::new(db, function.name().clone());
        flow::analyze(&context, function.places(), function.graph());
        diagnostics.extend(context.finish());
    }

    diagnostics.shrink_to_fit();
    diagnostics
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::db::ModuleDb;
    use crate::flow::{EdgeKind, FlowNode};
    use crate::types::call::CallArguments;
    use crate::types::class::{Base, Class, Declaration};
    use crate::types::signatures::{Parameters, Signature};
    use crate::types::{KnownClass, Type};

    fn unreachable_function(db: &ModuleDb) -> FunctionBody {
        let never_callable = Type::callable(
            db,
            Signature::new(Parameters::new([]), Some(Type::Never)),
        );
        let mut graph = FlowGraph::new();
        let call = graph.add_node(FlowNode::Call {
            statement: 0,
            callee: never_callable,
            arguments: CallArguments::none(),
        });
        let after = graph.add_node(FlowNode::Statement { statement: 1 });
        graph.add_edge(graph.entry(), call, EdgeKind::Always);
        graph.add_edge(call, after, EdgeKind::Always);
        graph.add_edge(after, graph.exit(), EdgeKind::Always);
        FunctionBody::new("f", PlaceTable::default(), graph)
    }

    #[test]
    fn check_module_collects_class_and_function_diagnostics() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);

        let base = db.add_class(
            Class::new("Base")
                .with_bases([Base::class(object)])
                .with_member("value", Declaration::variable(int)),
        );
        let sub = db.add_class(
            Class::new("Sub")
                .with_bases([Base::class(base)])
                .with_member("value", Declaration::variable(str_ty)),
        );

        let mut module = Module::new("example");
        module.add_class(base);
        module.add_class(sub);
        module.add_function(unreachable_function(&db));

        let diagnostics = check_module(&db, &module);
        let rules: Vec<&str> = diagnostics
            .iter()
            .map(|diagnostic| diagnostic.rule().as_str())
            .collect();
        assert_eq!(
            rules,
            ["reportIncompatibleVariableOverride", "reportUnreachable"]
        );
    }

    #[test]
    fn unresolvable_mro_is_reported_once_per_class() {
        let mut db = ModuleDb::new();
        let object = db.object_class();
        let a = db.add_class(Class::new("A").with_bases([Base::class(object)]));
        let b = db.add_class(Class::new("B").with_bases([Base::class(a)]));
        // Inconsistent linearization: A before B contradicts B's MRO.
        let c = db.add_class(Class::new("C").with_bases([Base::class(a), Base::class(b)]));

        let mut module = Module::new("example");
        module.add_class(c);

        let diagnostics = check_module(&db, &module);
        assert_eq!(diagnostics.len(), 1);
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.rule(), "reportGeneralTypeIssues");
        assert!(diagnostic.message().contains("MRO"));
    }

    #[test]
    fn cancellation_stops_checking() {
        let mut db = ModuleDb::new();
        let token = Arc::new(AtomicBool::new(true));
        db.set_cancellation_token(token.clone());

        let mut module = Module::new("example");
        module.add_function(unreachable_function(&db));

        assert!(check_module(&db, &module).is_empty());

        token.store(false, Ordering::Relaxed);
        assert!(!check_module(&db, &module).is_empty());
    }
}
