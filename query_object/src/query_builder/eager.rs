use crate::contract::EagerConstraint;
use crate::query_builder::builder::Query;
use std::fmt;

/// One node of the eager-load tree: a relation of the parent model, an
/// optional constraint on the related query, and the relations to load below it.
#[derive(Clone)]
pub struct EagerLoad {
    pub relation: String,
    pub constraint: Option<EagerConstraint<Query>>,
    pub nested: Vec<EagerLoad>,
}

impl EagerLoad {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            constraint: None,
            nested: Vec::new(),
        }
    }

    /// Insert `segments` (a split dotted path) into `loads`, merging with
    /// nodes that already exist. A constraint only ever lands on the last segment.
    pub(crate) fn insert(
        loads: &mut Vec<EagerLoad>,
        segments: &[&str],
        constraint: Option<EagerConstraint<Query>>,
    ) {
        let Some((head, rest)) = segments.split_first() else {
            return;
        };

        let index = match loads.iter().position(|load| load.relation == *head) {
            Some(index) => index,
            None => {
                loads.push(EagerLoad::new(*head));
                loads.len() - 1
            }
        };

        if rest.is_empty() {
            if constraint.is_some() {
                loads[index].constraint = constraint;
            }
        } else {
            Self::insert(&mut loads[index].nested, rest, constraint);
        }
    }

    /// Dotted paths of every node in this subtree, parents first
    pub fn paths(&self) -> Vec<String> {
        let mut paths = vec![self.relation.clone()];
        for child in &self.nested {
            paths.extend(
                child
                    .paths()
                    .into_iter()
                    .map(|path| format!("{}.{}", self.relation, path)),
            );
        }
        paths
    }
}

impl fmt::Debug for EagerLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerLoad")
            .field("relation", &self.relation)
            .field("constrained", &self.constraint.is_some())
            .field("nested", &self.nested)
            .finish()
    }
}
