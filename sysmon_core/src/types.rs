//! Observed entities and the immutable snapshot the sampler publishes.

use serde::Serialize;
use std::collections::{btree_map, BTreeMap};

/// One socket owned by a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub local_address: String,
    pub local_port: u16,
    pub remote_address: String,
    pub remote_port: u16,
    pub state: String,
}

/// One observed process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub name: String,
    pub id: u32,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub thread_count: u32,
    pub endpoints: Vec<Endpoint>,
}

impl Entity {
    /// An entity with only its identity filled in; every attribute starts at zero/empty.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id,
            cpu_percent: 0.0,
            memory_percent: 0.0,
            thread_count: 0,
            endpoints: Vec::new(),
        }
    }
}

/// Complete point-in-time view of all entities, keyed and iterated by id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    entities: BTreeMap<u32, Entity>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Entities in snapshot order (ascending id).
    pub fn iter(&self) -> btree_map::Values<'_, u32, Entity> {
        self.entities.values()
    }
}

impl FromIterator<Entity> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self {
            entities: iter.into_iter().map(|e| (e.id, e)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Entity;
    type IntoIter = btree_map::Values<'a, u32, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
