//! Table creation order.
//!
//! Entity `B` must exist before `A` whenever `A` has a many-to-one
//! relationship to `B`. Kahn's algorithm linearizes that graph; ties are
//! broken by registration order so output is deterministic.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use sqlentity_core::{EntityMetadata, EntityType, RelationshipKind};

/// Indexes into the registration-ordered entity list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CreationOrder {
    pub order: Vec<usize>,
    pub cyclic: bool,
}

/// Sort `entities` so every many-to-one target precedes its owner.
///
/// Self references and targets outside `entities` impose no ordering. When
/// the graph has a cycle, the registration order is returned as-is.
pub(crate) fn creation_order(entities: &[Arc<EntityMetadata>]) -> CreationOrder {
    let index: HashMap<EntityType, usize> = entities
        .iter()
        .enumerate()
        .map(|(i, m)| (m.entity_type(), i))
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); entities.len()];
    let mut in_degree = vec![0usize; entities.len()];
    let mut seen = HashSet::new();
    for (owner, metadata) in entities.iter().enumerate() {
        for relationship in metadata.relationships() {
            if relationship.kind() != RelationshipKind::ManyToOne {
                continue;
            }
            let Some(&target) = index.get(&relationship.target()) else {
                continue;
            };
            if target != owner && seen.insert((target, owner)) {
                dependents[target].push(owner);
                in_degree[owner] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..entities.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(entities.len());
    while let Some(next) = queue.pop_front() {
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if order.len() == entities.len() {
        CreationOrder {
            order,
            cyclic: false,
        }
    } else {
        CreationOrder {
            order: (0..entities.len()).collect(),
            cyclic: true,
        }
    }
}
