//! Control-flow graphs of function bodies and the reachability
//! analysis over them.
//!
//! The graph is built per function. Nodes carry the statement index
//! they were lowered from, so diagnostics can point back into the
//! body. A worklist pass propagates an environment (place -> type)
//! forward through the graph: assignments overwrite, branch edges
//! narrow, joins union per place. Nodes whose environment never
//! becomes reachable are reported as unreachable code.

use rustc_hash::FxHashMap;

use crate::Db;
use crate::FxOrderSet;
use crate::name::Name;
use crate::types::Type;
use crate::types::call::{CallArguments, bind_call};
use crate::types::context::CheckContext;
use crate::types::diagnostic::{CALL_ISSUE, MATCH_NOT_EXHAUSTIVE, UNREACHABLE};
use crate::types::narrow::{Predicate, narrow};

/// A named location a type can be tracked for: a parameter or local.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceId(u32);

impl PlaceId {
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Place {
    name: Name,
    declared_ty: Type,
}

impl Place {
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn declared_type(&self) -> Type {
        self.declared_ty
    }
}

/// The places of one function body.
#[derive(Debug, Clone, Default)]
pub struct PlaceTable {
    places: Vec<Place>,
}

impl PlaceTable {
    pub fn add(&mut self, name: impl Into<Name>, declared_ty: Type) -> PlaceId {
        let id = PlaceId(u32::try_from(self.places.len()).unwrap_or(u32::MAX));
        self.places.push(Place {
            name: name.into(),
            declared_ty,
        });
        id
    }

    pub fn place(&self, id: PlaceId) -> &Place {
        &self.places[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, &Place)> {
        self.places
            .iter()
            .enumerate()
            .map(|(index, place)| (PlaceId(u32::try_from(index).unwrap_or(u32::MAX)), place))
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlowNodeId(u32);

impl FlowNodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node of the control-flow graph.
#[derive(Debug, Clone)]
pub enum FlowNode {
    Entry,
    Exit,

    /// A statement with no effect on the tracked environment.
    Statement { statement: u32 },

    Assign {
        statement: u32,
        place: PlaceId,
        ty: Type,
    },

    /// A conditional; successors use `IfTrue`/`IfFalse` edges.
    Branch {
        statement: u32,
        predicate: Predicate,
    },

    /// A call expression. The arguments are bound against the callee;
    /// control falls through unless the bound return type is `Never`.
    Call {
        statement: u32,
        callee: Type,
        arguments: CallArguments,
    },

    /// `assert_never(place)`: reachable only when the place has been
    /// narrowed to `Never`. Never falls through.
    AssertNever { statement: u32, place: PlaceId },

    /// A `raise`. Control continues only along `Suppress` edges, and
    /// only if the enclosing `with` statement's `__exit__` can return
    /// a truthy value.
    Raise { statement: u32 },
}

impl FlowNode {
    fn statement(&self) -> Option<u32> {
        match self {
            FlowNode::Entry | FlowNode::Exit => None,
            FlowNode::Statement { statement }
            | FlowNode::Assign { statement, .. }
            | FlowNode::Branch { statement, .. }
            | FlowNode::Call { statement, .. }
            | FlowNode::AssertNever { statement, .. }
            | FlowNode::Raise { statement } => Some(*statement),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    Always,
    IfTrue,
    IfFalse,

    /// An exception edge out of a `with` body. Taken only when the
    /// context manager's `__exit__` return type can be truthy.
    Suppress { exit_return: Type },
}

/// The control-flow graph of one function body.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    nodes: Vec<FlowNode>,
    successors: Vec<Vec<(FlowNodeId, EdgeKind)>>,
    entry: FlowNodeId,
    exit: FlowNodeId,
}

impl FlowGraph {
    pub fn new() -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            successors: Vec::new(),
            entry: FlowNodeId(0),
            exit: FlowNodeId(1),
        };
        graph.entry = graph.add_node(FlowNode::Entry);
        graph.exit = graph.add_node(FlowNode::Exit);
        graph
    }

    pub fn add_node(&mut self, node: FlowNode) -> FlowNodeId {
        let id = FlowNodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        self.successors.push(Vec::new());
        id
    }

    pub fn add_edge(&mut self, from: FlowNodeId, to: FlowNodeId, kind: EdgeKind) {
        self.successors[from.index()].push((to, kind));
    }

    pub fn entry(&self) -> FlowNodeId {
        self.entry
    }

    pub fn exit(&self) -> FlowNodeId {
        self.exit
    }

    pub fn node(&self, id: FlowNodeId) -> &FlowNode {
        &self.nodes[id.index()]
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for FlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

type Env = FxHashMap<PlaceId, Type>;

/// The result of analyzing one function's flow graph.
pub struct FlowAnalysis {
    envs: Vec<Option<Env>>,
    exit: FlowNodeId,
}

impl FlowAnalysis {
    /// The type of `place` on function exit, unioned over all paths.
    /// `None` when the exit is unreachable.
    pub fn exit_type(&self, place: PlaceId) -> Option<Type> {
        self.envs[self.exit.index()]
            .as_ref()
            .and_then(|env| env.get(&place).copied())
    }

    pub fn is_reachable(&self, node: FlowNodeId) -> bool {
        self.envs[node.index()].is_some()
    }
}

/// The return type of a context manager's `__exit__`, for deciding
/// whether it can suppress an exception. Managers of unknown type get
/// `Unknown`, which conservatively may suppress.
pub fn exit_return_type(db: &dyn Db, manager: Type) -> Type {
    if manager.is_dynamic() {
        return Type::unknown();
    }
    let Some((_, member)) = manager.instance_member(db, "__exit__") else {
        return Type::unknown();
    };
    match member {
        Type::Callable(callable) => Type::union(
            db,
            db.types()
                .callable(callable)
                .signatures()
                .iter()
                .map(|signature| signature.return_type().unwrap_or(Type::unknown())),
        ),
        Type::Dynamic(_) => Type::unknown(),
        _ => Type::unknown(),
    }
}

/// Runs the forward reachability analysis and reports unreachable
/// statements and failed exhaustiveness assertions.
pub(crate) fn analyze(
    context: &CheckContext,
    places: &PlaceTable,
    graph: &FlowGraph,
) -> FlowAnalysis {
    let db = context.db();

    let mut envs: Vec<Option<Env>> = vec![None; graph.len()];
    let initial: Env = places
        .iter()
        .map(|(place, definition)| (place, definition.declared_type()))
        .collect();
    envs[graph.entry().index()] = Some(initial);

    let mut worklist = vec![graph.entry()];
    while let Some(node_id) = worklist.pop() {
        let Some(env) = envs[node_id.index()].clone() else {
            continue;
        };

        // The environment as it is after the node's own effect.
        let mut out = env;
        let mut falls_through = true;
        match graph.node(node_id) {
            FlowNode::Assign { place, ty, .. } => {
                out.insert(*place, *ty);
            }
            FlowNode::Call {
                statement,
                callee,
                arguments,
            } => {
                if let Some(callable) = callee.into_callable(db) {
                    match bind_call(db, &callable, arguments) {
                        Ok(binding) => {
                            if binding.used_fallback() {
                                context.report_lint_at(
                                    &CALL_ISSUE,
                                    *statement,
                                    format_args!(
                                        "arguments match no overload of the callee; \
                                         the call binds to the implementation"
                                    ),
                                );
                            }
                            if binding.return_type().is_never() {
                                falls_through = false;
                            }
                        }
                        Err(error) => {
                            context.report_lint_at(
                                &CALL_ISSUE,
                                *statement,
                                format_args!("{error}"),
                            );
                        }
                    }
                }
            }
            FlowNode::AssertNever { statement, place } => {
                let residual = out.get(place).copied().unwrap_or(Type::unknown());
                if !residual.is_never() {
                    context.report_lint_at(
                        &MATCH_NOT_EXHAUSTIVE,
                        *statement,
                        format_args!(
                            "`assert_never` reached with type `{}`; some cases are not handled",
                            residual.display(db),
                        ),
                    );
                }
                falls_through = false;
            }
            FlowNode::Raise { .. } => {
                falls_through = false;
            }
            FlowNode::Entry
            | FlowNode::Exit
            | FlowNode::Statement { .. }
            | FlowNode::Branch { .. } => {}
        }

        for (successor, kind) in &graph.successors[node_id.index()] {
            let successor_env = match kind {
                EdgeKind::Always => {
                    if falls_through {
                        Some(out.clone())
                    } else {
                        None
                    }
                }
                EdgeKind::IfTrue | EdgeKind::IfFalse => {
                    let FlowNode::Branch { predicate, .. } = graph.node(node_id) else {
                        continue;
                    };
                    let positive = matches!(kind, EdgeKind::IfTrue);
                    let constraints = narrow(db, predicate, positive, &|place| {
                        out.get(&place).copied().unwrap_or(Type::unknown())
                    });
                    // A constraint of `Never` means this edge cannot be
                    // taken at runtime.
                    if constraints.values().any(|constraint| constraint.is_never()) {
                        None
                    } else {
                        let mut narrowed = out.clone();
                        narrowed.extend(constraints);
                        Some(narrowed)
                    }
                }
                EdgeKind::Suppress { exit_return } => {
                    if matches!(graph.node(node_id), FlowNode::Raise { .. })
                        && exit_return.may_be_truthy(db)
                    {
                        Some(out.clone())
                    } else {
                        None
                    }
                }
            };
            let Some(successor_env) = successor_env else {
                continue;
            };

            let merged = match &envs[successor.index()] {
                None => successor_env,
                Some(existing) => join_envs(db, existing, &successor_env),
            };
            if envs[successor.index()].as_ref() != Some(&merged) {
                envs[successor.index()] = Some(merged);
                worklist.push(*successor);
            }
        }
    }

    let mut unreachable: FxOrderSet<u32> = FxOrderSet::default();
    for (index, node) in graph.nodes.iter().enumerate() {
        if envs[index].is_some() {
            continue;
        }
        if let Some(statement) = node.statement() {
            unreachable.insert(statement);
        }
    }
    for statement in unreachable {
        context.report_lint_at(
            &UNREACHABLE,
            statement,
            format_args!("this code is unreachable"),
        );
    }

    FlowAnalysis {
        envs,
        exit: graph.exit(),
    }
}

/// Joins two environments at a merge point: per-place union.
fn join_envs(db: &dyn Db, left: &Env, right: &Env) -> Env {
    let mut merged = left.clone();
    for (place, right_ty) in right {
        let ty = match merged.get(place) {
            Some(&left_ty) => Type::union(db, [left_ty, *right_ty]),
            None => *right_ty,
        };
        merged.insert(*place, ty);
    }
    merged
}
