use std::fmt::Formatter;
use std::hash::Hasher;
use std::ops::Deref;

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Declares a lint rule together with its metadata.
///
/// The documentation comment becomes the rule's long-form documentation;
/// the `name` is the identifier users write in their configuration.
#[macro_export]
macro_rules! declare_lint {
    (
        $(#[doc = $doc:literal])+
        $vis: vis static $ident: ident = {
            name: $name: literal,
            summary: $summary: literal,
            status: $status: expr,
            default_level: $default_level: expr $(,)?
        }
    ) => {
        $(#[doc = $doc])+
        #[allow(clippy::needless_raw_string_hashes)]
        $vis static $ident: $crate::lint::LintMetadata = $crate::lint::LintMetadata {
            name: $crate::lint::LintName::of($name),
            summary: $summary,
            documentation: concat!($($doc, '\n',)+),
            status: $status,
            default_level: $default_level,
        };
    };
}

/// The metadata of a single lint rule.
#[derive(Debug, Clone)]
pub struct LintMetadata {
    /// The unique identifier of the lint, used in configuration and diagnostics.
    pub name: LintName,

    /// A one-sentence summary of what the lint catches.
    pub summary: &'static str,

    /// The long-form documentation, rendered from the declaration's doc comment.
    pub documentation: &'static str,

    pub status: LintStatus,

    /// The level at which the lint fires unless configured otherwise.
    pub default_level: Level,
}

impl LintMetadata {
    pub fn name(&self) -> LintName {
        self.name
    }

    pub fn summary(&self) -> &str {
        self.summary
    }

    pub fn documentation(&self) -> &str {
        self.documentation.trim()
    }

    pub fn status(&self) -> &LintStatus {
        &self.status
    }

    pub fn default_level(&self) -> Level {
        self.default_level
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LintName(&'static str);

impl LintName {
    pub const fn of(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Deref for LintName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl std::fmt::Display for LintName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl PartialEq<str> for LintName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for LintName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LintStatus {
    /// The lint has been added recently and is still subject to change.
    Preview { since: &'static str },

    /// The lint is stable.
    Stable { since: &'static str },

    /// The lint has been deprecated and will be removed.
    Deprecated {
        since: &'static str,
        reason: &'static str,
    },
}

impl LintStatus {
    pub const fn preview(since: &'static str) -> Self {
        LintStatus::Preview { since }
    }

    pub const fn stable(since: &'static str) -> Self {
        LintStatus::Stable { since }
    }

    pub const fn deprecated(since: &'static str, reason: &'static str) -> Self {
        LintStatus::Deprecated { since, reason }
    }

    pub const fn is_deprecated(&self) -> bool {
        matches!(self, LintStatus::Deprecated { .. })
    }
}

/// The default or configured level of a lint.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Level {
    /// The lint is disabled and never fires.
    Ignore,

    /// Violations are reported as warnings.
    Warn,

    /// Violations are reported as errors.
    Error,
}

impl Level {
    pub const fn is_error(self) -> bool {
        matches!(self, Level::Error)
    }

    pub const fn severity(self) -> Option<Severity> {
        match self {
            Level::Ignore => None,
            Level::Warn => Some(Severity::Warning),
            Level::Error => Some(Severity::Error),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Ignore => f.write_str("ignore"),
            Level::Warn => f.write_str("warn"),
            Level::Error => f.write_str("error"),
        }
    }
}

/// The severity of an emitted diagnostic.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// A unique identifier for a lint rule.
///
/// Implemented as a wrapper around the metadata's address: every lint is
/// a `static`, so the address is unique for the lifetime of the program.
#[derive(Copy, Clone, Debug)]
pub struct LintId {
    definition: &'static LintMetadata,
}

impl LintId {
    pub const fn of(definition: &'static LintMetadata) -> Self {
        LintId { definition }
    }
}

impl PartialEq for LintId {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.definition, other.definition)
    }
}

impl Eq for LintId {}

impl std::hash::Hash for LintId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::from_ref(self.definition).hash(state);
    }
}

impl Deref for LintId {
    type Target = LintMetadata;

    fn deref(&self) -> &Self::Target {
        self.definition
    }
}

#[derive(Default, Debug)]
pub struct LintRegistryBuilder {
    /// Lints in registration order.
    lints: Vec<LintId>,
    by_name: FxHashMap<&'static str, LintId>,
}

impl LintRegistryBuilder {
    #[track_caller]
    pub fn register_lint(&mut self, lint: &'static LintMetadata) {
        assert_eq!(
            self.by_name.insert(lint.name.as_str(), LintId::of(lint)),
            None,
            "duplicate lint registration for `{name}`",
            name = lint.name,
        );
        self.lints.push(LintId::of(lint));
    }

    pub fn build(self) -> LintRegistry {
        LintRegistry {
            lints: self.lints,
            by_name: self.by_name,
        }
    }
}

#[derive(Default, Debug, Clone)]
pub struct LintRegistry {
    lints: Vec<LintId>,
    by_name: FxHashMap<&'static str, LintId>,
}

impl LintRegistry {
    /// Looks up a lint by its name.
    pub fn get(&self, code: &str) -> Result<LintId, GetLintError> {
        match self.by_name.get(code) {
            Some(lint) => {
                if let LintStatus::Deprecated { reason, .. } = lint.status {
                    Err(GetLintError::Deprecated {
                        name: lint.name,
                        reason,
                    })
                } else {
                    Ok(*lint)
                }
            }
            None => Err(GetLintError::Unknown(code.to_string())),
        }
    }

    /// All registered lints, in registration order.
    pub fn lints(&self) -> &[LintId] {
        &self.lints
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GetLintError {
    #[error("unknown rule `{0}`")]
    Unknown(String),

    #[error("rule `{name}` has been deprecated: {reason}")]
    Deprecated { name: LintName, reason: &'static str },
}

/// The resolved severity for every known lint.
///
/// This is the only configuration surface the checker consults: a lint
/// that resolves to no severity is skipped entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSelection {
    /// Lints that fire, and at which severity. Absent lints are ignored.
    lints: FxHashMap<LintId, Severity>,
}

impl RuleSelection {
    /// Creates a selection with all lints of `registry` at their default level.
    pub fn from_registry(registry: &LintRegistry) -> Self {
        let lints = registry
            .lints()
            .iter()
            .filter_map(|lint| lint.default_level().severity().map(|severity| (*lint, severity)))
            .collect();

        RuleSelection { lints }
    }

    /// Creates a selection from defaults plus user overrides of the form
    /// `(rule name, level)`.
    ///
    /// Each unresolvable rule name produces one error; the override is
    /// otherwise ignored and the rule keeps its default level.
    pub fn with_overrides<'a>(
        registry: &LintRegistry,
        overrides: impl IntoIterator<Item = (&'a str, Level)>,
    ) -> (Self, Vec<GetLintError>) {
        let mut selection = Self::from_registry(registry);
        let mut errors = Vec::new();

        for (name, level) in overrides {
            match registry.get(name) {
                Ok(lint) => selection.set_level(lint, level),
                Err(error) => errors.push(error),
            }
        }

        (selection, errors)
    }

    pub fn set_level(&mut self, lint: LintId, level: Level) {
        match level.severity() {
            Some(severity) => {
                self.lints.insert(lint, severity);
            }
            None => {
                self.lints.remove(&lint);
            }
        }
    }

    /// Returns the configured severity for `lint`, or `None` if it is disabled.
    pub fn severity(&self, lint: LintId) -> Option<Severity> {
        self.lints.get(&lint).copied()
    }

    pub fn is_enabled(&self, lint: LintId) -> bool {
        self.severity(lint).is_some()
    }
}
