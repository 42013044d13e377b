//! Builder for normalized union types.
//!
//! Adding an element flattens nested unions, drops `Never`, skips
//! elements already covered by an existing element, and removes
//! existing elements that the new one covers. `Literal[True]` and
//! `Literal[False]` together collapse to `bool`.

use smallvec::SmallVec;

use crate::Db;
use crate::types::{KnownClass, Type};

pub struct UnionBuilder<'db> {
    db: &'db dyn Db,
    elements: SmallVec<[Type; 4]>,
}

impl<'db> UnionBuilder<'db> {
    pub fn new(db: &'db dyn Db) -> Self {
        Self {
            db,
            elements: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn add(mut self, ty: Type) -> Self {
        match ty {
            Type::Union(union) => {
                for element in self.db.types().union_elements(union).iter() {
                    self = self.add(*element);
                }
                self
            }
            Type::Never => self,
            Type::BooleanLiteral(value)
                if self
                    .elements
                    .contains(&Type::BooleanLiteral(!value)) =>
            {
                self.elements
                    .retain(|element| !matches!(element, Type::BooleanLiteral(_)));
                let bool_instance = KnownClass::Bool.to_instance(self.db);
                self.add(bool_instance)
            }
            _ => {
                // Gradual elements neither absorb nor get absorbed; a
                // union may legitimately contain `int | Any`.
                if !ty.is_dynamic() {
                    if self.elements.iter().any(|element| {
                        !element.is_dynamic() && ty.is_assignable_to(self.db, *element)
                    }) {
                        return self;
                    }
                    self.elements.retain(|element| {
                        element.is_dynamic() || !element.is_assignable_to(self.db, ty)
                    });
                } else if self.elements.contains(&ty) {
                    return self;
                }
                self.elements.push(ty);
                self
            }
        }
    }

    pub fn build(self) -> Type {
        match self.elements.as_slice() {
            [] => Type::Never,
            [element] => *element,
            _ => Type::Union(self.db.types().intern_union(self.elements.into_vec())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ModuleDb;

    #[test]
    fn empty_union_is_never() {
        let db = ModuleDb::new();
        assert_eq!(UnionBuilder::new(&db).build(), Type::Never);
    }

    #[test]
    fn single_element_collapses() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        assert_eq!(UnionBuilder::new(&db).add(int).build(), int);
    }

    #[test]
    fn never_is_the_identity() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let ty = UnionBuilder::new(&db).add(Type::Never).add(int).build();
        assert_eq!(ty, int);
    }

    #[test]
    fn nested_unions_flatten() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let str_ty = KnownClass::Str.to_instance(&db);
        let inner = Type::union(&db, [int, str_ty]);
        let ty = Type::union(&db, [inner, Type::None]);
        let elements = ty.union_elements(&db).unwrap();
        assert_eq!(&*elements, &[int, str_ty, Type::None]);
    }

    #[test]
    fn literals_are_absorbed_by_their_class() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        assert_eq!(Type::union(&db, [Type::IntLiteral(1), int]), int);
        // The wider element also wins when it arrives second.
        assert_eq!(Type::union(&db, [int, Type::IntLiteral(1)]), int);
    }

    #[test]
    fn duplicate_elements_are_deduplicated() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        assert_eq!(Type::union(&db, [int, int]), int);
    }

    #[test]
    fn both_bool_literals_collapse_to_bool() {
        let db = ModuleDb::new();
        let ty = Type::union(
            &db,
            [Type::BooleanLiteral(true), Type::BooleanLiteral(false)],
        );
        assert_eq!(ty, KnownClass::Bool.to_instance(&db));
    }

    #[test]
    fn dynamic_elements_are_kept() {
        let db = ModuleDb::new();
        let int = KnownClass::Int.to_instance(&db);
        let ty = Type::union(&db, [int, Type::any()]);
        let elements = ty.union_elements(&db).unwrap();
        assert_eq!(&*elements, &[int, Type::any()]);
    }
}
