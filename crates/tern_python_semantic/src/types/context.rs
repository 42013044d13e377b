use std::cell::RefCell;
use std::fmt;

use crate::Db;
use crate::lint::{LintId, LintMetadata};
use crate::name::Name;
use crate::types::diagnostic::{Diagnostic, Span, TypeCheckDiagnostics};

/// Context for checking one class or function body. Collects the
/// diagnostics reported while checking; [`CheckContext::finish`]
/// surrenders them.
pub(crate) struct CheckContext<'db> {
    db: &'db dyn Db,
    owner: Name,
    diagnostics: RefCell<TypeCheckDiagnostics>,
}

impl<'db> CheckContext<'db> {
    pub(crate) fn new(db: &'db dyn Db, owner: Name) -> Self {
        Self {
            db,
            owner,
            diagnostics: RefCell::new(TypeCheckDiagnostics::default()),
        }
    }

    pub(crate) fn db(&self) -> &'db dyn Db {
        self.db
    }

    /// Reports a lint located at the owner as a whole.
    pub(crate) fn report_lint(&self, lint: &'static LintMetadata, message: fmt::Arguments) {
        self.report_lint_at_span(lint, Span::owner(self.owner.clone()), message);
    }

    /// Reports a lint located at a statement of the owner's body.
    pub(crate) fn report_lint_at(
        &self,
        lint: &'static LintMetadata,
        statement: u32,
        message: fmt::Arguments,
    ) {
        self.report_lint_at_span(lint, Span::statement(self.owner.clone(), statement), message);
    }

    fn report_lint_at_span(
        &self,
        lint: &'static LintMetadata,
        span: Span,
        message: fmt::Arguments,
    ) {
        let Some(severity) = self.db.rule_selection().severity(LintId::of(lint)) else {
            return;
        };
        self.diagnostics.borrow_mut().push(Diagnostic::new(
            lint.name(),
            severity,
            span,
            message.to_string(),
        ));
    }

    pub(crate) fn finish(self) -> TypeCheckDiagnostics {
        let mut diagnostics = self.diagnostics.into_inner();
        diagnostics.shrink_to_fit();
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ModuleDb;
    use crate::lint::Severity;
    use crate::types::diagnostic::UNREACHABLE;

    #[test]
    fn report_lint_respects_rule_selection() {
        let db = ModuleDb::new();
        let context = CheckContext::new(&db, Name::new_static("f"));
        context.report_lint_at(&UNREACHABLE, 3, format_args!("code is unreachable"));

        let diagnostics = context.finish();
        assert_eq!(diagnostics.len(), 1);
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.rule(), UNREACHABLE.name());
        assert_eq!(diagnostic.severity(), Severity::Warning);
        assert_eq!(diagnostic.span().statement_index(), Some(3));
    }

    #[test]
    fn disabled_lints_are_not_reported() {
        use crate::lint::Level;

        let mut selection = crate::lint::RuleSelection::from_registry(crate::default_lint_registry());
        selection.set_level(LintId::of(&UNREACHABLE), Level::Ignore);
        let db = ModuleDb::new().with_rule_selection(selection);

        let context = CheckContext::new(&db, Name::new_static("f"));
        context.report_lint(&UNREACHABLE, format_args!("code is unreachable"));
        assert!(context.finish().is_empty());
    }
}
