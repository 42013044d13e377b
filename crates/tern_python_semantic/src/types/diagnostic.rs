//! Diagnostics emitted by the type checker, and the lint rules that
//! control them.

use crate::declare_lint;
use crate::lint::{Level, LintName, LintRegistryBuilder, LintStatus, Severity};
use crate::name::Name;

/// Registers all lint rules of this crate.
pub fn register_lints(registry: &mut LintRegistryBuilder) {
    registry.register_lint(&CALL_ISSUE);
    registry.register_lint(&GENERAL_TYPE_ISSUES);
    registry.register_lint(&INCOMPATIBLE_METHOD_OVERRIDE);
    registry.register_lint(&INCOMPATIBLE_VARIABLE_OVERRIDE);
    registry.register_lint(&INCOMPATIBLE_UNANNOTATED_OVERRIDE);
    registry.register_lint(&IMPLICIT_OVERRIDE);
    registry.register_lint(&MATCH_NOT_EXHAUSTIVE);
    registry.register_lint(&UNREACHABLE);
}

declare_lint! {
    /// ## What it does
    /// Checks that call arguments match a signature of the callee, and
    /// that calls to an overloaded function match at least one overload.
    ///
    /// ## Why is this bad?
    /// A call that matches no signature raises `TypeError` at runtime.
    pub(crate) static CALL_ISSUE = {
        name: "reportCallIssue",
        summary: "detects calls whose arguments match no signature of the callee",
        status: LintStatus::stable("0.1.0"),
        default_level: Level::Error,
    }
}

declare_lint! {
    /// ## What it does
    /// Catches type errors that have no more specific rule, such as
    /// overriding a `Final` member, applying `@override` to a method
    /// with no base class counterpart, or inheriting conflicting
    /// `__init__` signatures from multiple bases.
    pub(crate) static GENERAL_TYPE_ISSUES = {
        name: "reportGeneralTypeIssues",
        summary: "detects general type inconsistencies",
        status: LintStatus::stable("0.1.0"),
        default_level: Level::Error,
    }
}

declare_lint! {
    /// ## What it does
    /// Checks that an overriding method's signature accepts every call
    /// the overridden method accepts.
    ///
    /// ## Why is this bad?
    /// Code holding a reference of the base type can call the override
    /// with arguments the override does not handle.
    pub(crate) static INCOMPATIBLE_METHOD_OVERRIDE = {
        name: "reportIncompatibleMethodOverride",
        summary: "detects method overrides incompatible with the overridden method",
        status: LintStatus::stable("0.1.0"),
        default_level: Level::Error,
    }
}

declare_lint! {
    /// ## What it does
    /// Checks that an overriding attribute is mutually assignable with
    /// the attribute it overrides, and that it does not change the kind
    /// of the member (for example a method overridden by a variable).
    ///
    /// ## Why is this bad?
    /// Mutable attributes behave invariantly; narrowing or widening the
    /// type in a subclass breaks reads or writes through the base type.
    pub(crate) static INCOMPATIBLE_VARIABLE_OVERRIDE = {
        name: "reportIncompatibleVariableOverride",
        summary: "detects attribute overrides incompatible with the overridden attribute",
        status: LintStatus::stable("0.1.0"),
        default_level: Level::Error,
    }
}

declare_lint! {
    /// ## What it does
    /// Checks that an override of an unannotated member keeps an
    /// equivalent inferred type.
    ///
    /// ## Why is this bad?
    /// Without an annotation the base member's inferred type is the
    /// only contract there is; silently changing it in a subclass hides
    /// a type conflict the author never declared.
    pub(crate) static INCOMPATIBLE_UNANNOTATED_OVERRIDE = {
        name: "reportIncompatibleUnannotatedOverride",
        summary: "detects overrides that change the type of an unannotated member",
        status: LintStatus::stable("0.1.0"),
        default_level: Level::Error,
    }
}

declare_lint! {
    /// ## What it does
    /// Checks that methods overriding a base class method carry the
    /// `@override` decorator.
    pub(crate) static IMPLICIT_OVERRIDE = {
        name: "reportImplicitOverride",
        summary: "detects overriding methods missing the `@override` decorator",
        status: LintStatus::stable("0.1.0"),
        default_level: Level::Ignore,
    }
}

declare_lint! {
    /// ## What it does
    /// Checks that exhaustiveness assertions hold: when `assert_never`
    /// is reached, the narrowed type of its argument must be `Never`.
    ///
    /// ## Why is this bad?
    /// A non-empty residual type means some case of a union or enum is
    /// not handled by the preceding `match` or `if` chain.
    pub(crate) static MATCH_NOT_EXHAUSTIVE = {
        name: "reportMatchNotExhaustive",
        summary: "detects non-exhaustive match statements checked with `assert_never`",
        status: LintStatus::stable("0.1.0"),
        default_level: Level::Error,
    }
}

declare_lint! {
    /// ## What it does
    /// Checks for code that can never be executed: statements after a
    /// call to a `NoReturn` function, after a `raise` whose context
    /// manager cannot suppress it, or on a branch whose condition
    /// narrows a value to `Never`.
    pub(crate) static UNREACHABLE = {
        name: "reportUnreachable",
        summary: "detects unreachable code",
        status: LintStatus::stable("0.1.0"),
        default_level: Level::Warn,
    }
}

/// Where a diagnostic points: a class or function by name, and
/// optionally a statement index within a function body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    owner: Name,
    statement: Option<u32>,
}

impl Span {
    pub fn owner(owner: Name) -> Self {
        Self {
            owner,
            statement: None,
        }
    }

    pub fn statement(owner: Name, statement: u32) -> Self {
        Self {
            owner,
            statement: Some(statement),
        }
    }

    pub fn owner_name(&self) -> &Name {
        &self.owner
    }

    pub fn statement_index(&self) -> Option<u32> {
        self.statement
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.statement {
            Some(statement) => write!(f, "{}:{statement}", self.owner),
            None => write!(f, "{}", self.owner),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    rule: LintName,
    severity: Severity,
    span: Span,
    message: String,
}

impl Diagnostic {
    pub(crate) fn new(rule: LintName, severity: Severity, span: Span, message: String) -> Self {
        Self {
            rule,
            severity,
            span,
            message,
        }
    }

    pub fn rule(&self) -> LintName {
        self.rule
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} [{}]", self.span, self.message, self.rule)
    }
}

/// The diagnostics collected while checking one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCheckDiagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl TypeCheckDiagnostics {
    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn extend(&mut self, other: TypeCheckDiagnostics) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.diagnostics.shrink_to_fit();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl IntoIterator for TypeCheckDiagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

impl<'a> IntoIterator for &'a TypeCheckDiagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.iter()
    }
}
