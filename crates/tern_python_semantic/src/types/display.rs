//! Display implementations for types.

use std::fmt::{self, Display, Formatter, Write};

use crate::Db;
use crate::types::signatures::{ParameterKind, Signature};
use crate::types::{DynamicType, SubclassOfInner, Type};

pub struct DisplayType<'db> {
    db: &'db dyn Db,
    ty: Type,
}

impl<'db> DisplayType<'db> {
    pub(crate) fn new(db: &'db dyn Db, ty: Type) -> Self {
        Self { db, ty }
    }
}

impl Display for DisplayType<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let db = self.db;
        match self.ty {
            Type::Dynamic(dynamic) => dynamic.fmt(f),
            Type::Never => f.write_str("Never"),
            Type::None => f.write_str("None"),
            Type::NominalInstance(instance) => {
                f.write_str(db.classes().class(instance.class).name())?;
                if let Some(specialization) = instance.specialization {
                    let specialization = db.types().specialization(specialization);
                    f.write_char('[')?;
                    for (index, argument) in specialization.types().iter().enumerate() {
                        if index > 0 {
                            f.write_str(", ")?;
                        }
                        argument.display(db).fmt(f)?;
                    }
                    f.write_char(']')?;
                }
                Ok(())
            }
            Type::ClassLiteral(class) => {
                write!(f, "<class '{}'>", db.classes().class(class).name())
            }
            Type::SubclassOf(SubclassOfInner::Class(class)) => {
                write!(f, "type[{}]", db.classes().class(class).name())
            }
            Type::SubclassOf(SubclassOfInner::Dynamic(DynamicType::Any)) => {
                f.write_str("type[Any]")
            }
            Type::SubclassOf(SubclassOfInner::Dynamic(DynamicType::Unknown)) => {
                f.write_str("type[Unknown]")
            }
            Type::Union(union) => {
                for (index, element) in db.types().union_elements(union).iter().enumerate() {
                    if index > 0 {
                        f.write_str(" | ")?;
                    }
                    element.display(db).fmt(f)?;
                }
                Ok(())
            }
            Type::IntLiteral(value) => write!(f, "Literal[{value}]"),
            Type::BooleanLiteral(true) => f.write_str("Literal[True]"),
            Type::BooleanLiteral(false) => f.write_str("Literal[False]"),
            Type::StringLiteral(value) => {
                write!(f, "Literal[\"{}\"]", db.types().string_literal(value))
            }
            Type::Callable(callable) => {
                let callable = db.types().callable(callable);
                if callable.is_overloaded() {
                    f.write_str("Overload[")?;
                    for (index, signature) in callable.signatures().iter().enumerate() {
                        if index > 0 {
                            f.write_str(", ")?;
                        }
                        display_signature(db, signature, f)?;
                    }
                    f.write_char(']')
                } else if let Some(signature) = callable.single_signature() {
                    display_signature(db, signature, f)
                } else {
                    Ok(())
                }
            }
            Type::TypeVar(typevar) => f.write_str(&db.types().typevar(typevar).name),
        }
    }
}

pub struct DisplaySignature<'db> {
    db: &'db dyn Db,
    signature: &'db Signature,
}

impl<'db> DisplaySignature<'db> {
    pub(crate) fn new(db: &'db dyn Db, signature: &'db Signature) -> Self {
        Self { db, signature }
    }
}

impl Display for DisplaySignature<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        display_signature(self.db, self.signature, f)
    }
}

fn display_signature(db: &dyn Db, signature: &Signature, f: &mut Formatter<'_>) -> fmt::Result {
    f.write_char('(')?;
    if signature.parameters().is_gradual() {
        f.write_str("...")?;
    } else {
        for (index, parameter) in signature.parameters().iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            match parameter.kind() {
                ParameterKind::Variadic { .. } => f.write_char('*')?,
                ParameterKind::KeywordVariadic { .. } => f.write_str("**")?,
                _ => {}
            }
            match parameter.name() {
                Some(name) => f.write_str(name)?,
                None => f.write_char('_')?,
            }
            if let Some(annotated) = parameter.annotated_type() {
                write!(f, ": {}", annotated.display(db))?;
            }
            if parameter.has_default() {
                f.write_str(" = ...")?;
            }
        }
    }
    f.write_str(") -> ")?;
    match signature.return_type() {
        Some(return_type) => return_type.display(db).fmt(f),
        None => f.write_str("Unknown"),
    }
}
