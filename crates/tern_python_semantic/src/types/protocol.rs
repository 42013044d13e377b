//! Structural assignability against `Protocol` classes.

use std::collections::BTreeSet;

use crate::Db;
use crate::name::Name;
use crate::types::class::ClassId;
use crate::types::mro::{ClassBase, mro_of};
use crate::types::{InstanceType, Type};

/// The names a protocol requires, collected along its MRO. Constructor
/// members are not part of the structural contract, and `object`'s
/// members are satisfied by every type.
pub(crate) fn interface_member_names(db: &dyn Db, class: ClassId) -> BTreeSet<Name> {
    let mut names = BTreeSet::new();
    for entry in mro_of(db, class).iter() {
        let ClassBase::Class(entry_class, _) = entry else {
            continue;
        };
        let entry_class = db.classes().class(*entry_class);
        if entry_class.is_object() {
            continue;
        }
        for name in entry_class.members().keys() {
            if name == "__init__" || name == "__new__" {
                continue;
            }
            names.insert(name.clone());
        }
    }
    names
}

/// Whether `source` structurally satisfies the protocol instance
/// `protocol`: every member of the protocol's interface must exist on
/// `source` with a compatible type. Methods and properties are checked
/// covariantly; mutable attributes must match in both directions.
pub(crate) fn satisfies_protocol(db: &dyn Db, source: Type, protocol: InstanceType) -> bool {
    let protocol_ty = Type::NominalInstance(protocol);
    for name in interface_member_names(db, protocol.class) {
        let Some((protocol_kind, protocol_member)) = protocol_ty.instance_member(db, &name) else {
            continue;
        };
        let Some((_, source_member)) = source.instance_member(db, &name) else {
            return false;
        };
        let compatible = if protocol_kind.is_method_like() || protocol_kind.is_property() {
            source_member.is_assignable_to(db, protocol_member)
        } else {
            source_member.is_equivalent_to(db, protocol_member)
        };
        if !compatible {
            return false;
        }
    }
    true
}
