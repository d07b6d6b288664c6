//! The selection node.

use serde::{Deserialize, Serialize};

use crate::field::{LinkedField, ScalarField};
use crate::fragment::{Condition, InlineFragment};

/// One node of a selection tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    Scalar(ScalarField),
    Linked(LinkedField),
    Fragment(InlineFragment),
    Condition(Condition),
}

impl Selection {
    /// The nested selections, empty for scalars.
    pub fn children(&self) -> &[Selection] {
        match self {
            Selection::Scalar(_) => &[],
            Selection::Linked(field) => &field.selections,
            Selection::Fragment(fragment) => &fragment.selections,
            Selection::Condition(condition) => &condition.selections,
        }
    }

    /// True for a field selection marked requisite.
    pub fn is_requisite(&self) -> bool {
        match self {
            Selection::Scalar(field) => field.requisite,
            Selection::Linked(field) => field.requisite,
            Selection::Fragment(_) | Selection::Condition(_) => false,
        }
    }
}

impl From<ScalarField> for Selection {
    fn from(field: ScalarField) -> Self {
        Selection::Scalar(field)
    }
}

impl From<LinkedField> for Selection {
    fn from(field: LinkedField) -> Self {
        Selection::Linked(field)
    }
}

impl From<InlineFragment> for Selection {
    fn from(fragment: InlineFragment) -> Self {
        Selection::Fragment(fragment)
    }
}

impl From<Condition> for Selection {
    fn from(condition: Condition) -> Self {
        Selection::Condition(condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_reaches_through_every_kind() {
        let leaf: Selection = ScalarField::new("name").into();
        assert!(leaf.children().is_empty());

        let linked: Selection = LinkedField::new("friend").select(vec![leaf.clone()]).into();
        assert_eq!(linked.children().len(), 1);

        let fragment: Selection = InlineFragment::on("User", vec![leaf.clone()]).into();
        assert_eq!(fragment.children().len(), 1);

        let condition: Selection = Condition::include_if("show", vec![leaf]).into();
        assert_eq!(condition.children().len(), 1);
    }

    #[test]
    fn requisite_applies_to_fields_only() {
        let scalar: Selection = ScalarField::new("id").requisite().into();
        assert!(scalar.is_requisite());
        let fragment: Selection = InlineFragment::on("User", Vec::new()).into();
        assert!(!fragment.is_requisite());
    }
}
