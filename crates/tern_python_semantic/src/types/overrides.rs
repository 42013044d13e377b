//! Override compatibility checking between a class and its bases.

use itertools::Itertools;

use crate::types::class::{
    ClassId, Declaration, MemberInMro, find_member_in_mro, has_own_init,
};
use crate::types::context::CheckContext;
use crate::types::diagnostic::{
    GENERAL_TYPE_ISSUES, IMPLICIT_OVERRIDE, INCOMPATIBLE_METHOD_OVERRIDE,
    INCOMPATIBLE_UNANNOTATED_OVERRIDE, INCOMPATIBLE_VARIABLE_OVERRIDE,
};
use crate::types::generics::apply_specialization;
use crate::types::{Type, is_subclass_of};

/// Checks every member of `class` against the members it overrides.
pub(crate) fn check_class(context: &CheckContext, class: ClassId) {
    let db = context.db();
    let class_def = db.classes().class(class);

    for (name, declaration) in class_def.members() {
        // Constructors are covered by the multiple-inheritance check
        // below; a subclass is always allowed to change its own.
        if name == "__init__" || name == "__new__" {
            continue;
        }

        let Some(base) = find_member_in_mro(db, class, name, true) else {
            if declaration.is_override() {
                context.report_lint(
                    &GENERAL_TYPE_ISSUES,
                    format_args!(
                        "`{name}` is decorated with `@override` but no base class defines it"
                    ),
                );
            }
            continue;
        };

        check_member(context, name, declaration, &base);
    }

    check_inherited_init(context, class);
}

fn check_member(context: &CheckContext, name: &str, declaration: &Declaration, base: &MemberInMro) {
    let db = context.db();
    let base_class = db.classes().class(base.owner);
    let base_declaration = &base.declaration;

    if base_declaration.is_final() {
        context.report_lint(
            &GENERAL_TYPE_ISSUES,
            format_args!(
                "`{name}` overrides a `Final` member of `{base}`",
                base = base_class.name(),
            ),
        );
        return;
    }

    let mut base_ty = base_declaration.ty();
    if let Some(specialization) = &base.specialization {
        base_ty = apply_specialization(db, base_ty, specialization);
    }
    let own_ty = declaration.ty();

    let base_is_method = base_declaration.kind().is_method_like();
    let own_is_method = declaration.kind().is_method_like();

    if base_is_method != own_is_method {
        context.report_lint(
            &INCOMPATIBLE_VARIABLE_OVERRIDE,
            format_args!(
                "`{name}` overrides a {base_kind} of `{base}` with a {own_kind}",
                base = base_class.name(),
                base_kind = if base_is_method { "method" } else { "non-method attribute" },
                own_kind = if own_is_method { "method" } else { "non-method attribute" },
            ),
        );
        return;
    }

    if own_is_method {
        if !own_ty.is_assignable_to(db, base_ty) {
            context.report_lint(
                &INCOMPATIBLE_METHOD_OVERRIDE,
                format_args!(
                    "`{name}` overrides `{base}.{name}` with an incompatible signature",
                    base = base_class.name(),
                ),
            );
        }
        if !declaration.is_override() && !declaration.is_synthesized() {
            context.report_lint(
                &IMPLICIT_OVERRIDE,
                format_args!(
                    "`{name}` overrides `{base}.{name}` without an `@override` decorator",
                    base = base_class.name(),
                ),
            );
        }
        return;
    }

    if declaration.kind().is_property() || base_declaration.kind().is_property() {
        // Properties are read-only; a covariant override is sound.
        if !own_ty.is_assignable_to(db, base_ty) {
            context.report_lint(
                &INCOMPATIBLE_VARIABLE_OVERRIDE,
                format_args!(
                    "property `{name}` overrides `{base}.{name}` with an incompatible type",
                    base = base_class.name(),
                ),
            );
        }
        return;
    }

    if !declaration.is_annotated() {
        // An unannotated override has only its inferred type to offer;
        // it must keep the base's type exactly. Inferred literals widen
        // to their class first, as an assignment would.
        let own = own_ty.literal_fallback_instance(db).unwrap_or(own_ty);
        let base_ty = base_ty.literal_fallback_instance(db).unwrap_or(base_ty);
        if !own.is_equivalent_to(db, base_ty) {
            context.report_lint(
                &INCOMPATIBLE_UNANNOTATED_OVERRIDE,
                format_args!(
                    "unannotated `{name}` changes the type of `{base}.{name}`",
                    base = base_class.name(),
                ),
            );
        }
        return;
    }

    // Mutable attributes behave invariantly.
    if !own_ty.is_equivalent_to(db, base_ty) {
        context.report_lint(
            &INCOMPATIBLE_VARIABLE_OVERRIDE,
            format_args!(
                "`{name}` overrides attribute `{base}.{name}` with a non-equivalent type",
                base = base_class.name(),
            ),
        );
    }
}

/// A class inheriting `__init__` from several unrelated bases must not
/// receive conflicting constructor signatures. Bases without an
/// `__init__` of their own are transparent for this check.
fn check_inherited_init(context: &CheckContext, class: ClassId) {
    let db = context.db();
    let class_def = db.classes().class(class);

    if has_own_init(db, class) {
        return;
    }

    let initializers: Vec<(ClassId, Type)> = class_def
        .bases()
        .iter()
        .filter_map(|base| {
            let crate::types::class::Base::Class {
                class: base_class, ..
            } = base
            else {
                return None;
            };
            if !has_own_init(db, *base_class) {
                return None;
            }
            let ty = Type::instance(*base_class).instance_member(db, "__init__")?.1;
            Some((*base_class, ty))
        })
        .collect();

    for ((left_class, left_ty), (right_class, right_ty)) in initializers.iter().tuple_combinations()
    {
        if is_subclass_of(db, *left_class, *right_class)
            || is_subclass_of(db, *right_class, *left_class)
        {
            continue;
        }
        if !left_ty.is_assignable_to(db, *right_ty) && !right_ty.is_assignable_to(db, *left_ty) {
            context.report_lint(
                &GENERAL_TYPE_ISSUES,
                format_args!(
                    "`{left}` and `{right}` define incompatible `__init__` signatures \
                     and neither overrides the other",
                    left = db.classes().class(*left_class).name(),
                    right = db.classes().class(*right_class).name(),
                ),
            );
            return;
        }
    }
}
