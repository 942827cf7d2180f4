//! Regions: identified subsets of mesh entities and their lazy set algebra.
//!
//! Physical regions are tagged on the mesh. Derived regions (unions, exclusions, skins) are
//! stored as definitions and resolved against the current mesh whenever their entities are
//! needed, so they always reflect the operands' current entity sets.
//!
//! Set operations act per dimension on the entities a region declares. The
//! [closure](EntitySet::closure) adds the edges and vertices bounding faces and edges, which is
//! what DOF-carrying operations such as constraints work with.

use crate::mesh::Mesh;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId(pub usize);

impl Display for RegionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vertices, edges and faces of a mesh, by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    pub vertices: BTreeSet<usize>,
    pub edges: BTreeSet<usize>,
    pub faces: BTreeSet<usize>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn union(&self, other: &EntitySet) -> EntitySet {
        EntitySet {
            vertices: self.vertices.union(&other.vertices).copied().collect(),
            edges: self.edges.union(&other.edges).copied().collect(),
            faces: self.faces.union(&other.faces).copied().collect(),
        }
    }

    pub fn difference(&self, other: &EntitySet) -> EntitySet {
        EntitySet {
            vertices: self.vertices.difference(&other.vertices).copied().collect(),
            edges: self.edges.difference(&other.edges).copied().collect(),
            faces: self.faces.difference(&other.faces).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty() && self.faces.is_empty()
    }

    /// The highest dimension with at least one entity, `None` for an empty set.
    pub fn dimension(&self) -> Option<usize> {
        if !self.faces.is_empty() {
            Some(2)
        } else if !self.edges.is_empty() {
            Some(1)
        } else if !self.vertices.is_empty() {
            Some(0)
        } else {
            None
        }
    }

    /// The set together with all edges and vertices bounding its faces and edges.
    pub fn closure(&self, mesh: &Mesh) -> EntitySet {
        let mut closure = self.clone();
        for &face in &self.faces {
            closure.edges.extend(mesh.face_edges(face).iter().copied());
            closure.vertices.extend(mesh.face(face).vertices().iter().copied());
        }
        for &edge in &closure.edges.clone() {
            closure.vertices.extend(mesh.edges()[edge]);
        }
        closure
    }
}

/// How a region's entities are obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionDefinition {
    /// Entities tagged on the mesh.
    Physical,
    Union(Vec<RegionId>),
    Exclusion { base: RegionId, subtrahend: RegionId },
    /// Boundary entities one dimension lower than the operand's.
    Skin(RegionId),
}

/// The derived region definitions of a model.
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    definitions: BTreeMap<RegionId, RegionDefinition>,
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn definition(&self, region: RegionId) -> Option<&RegionDefinition> {
        self.definitions.get(&region)
    }

    pub fn is_known(&self, mesh: &Mesh, region: RegionId) -> bool {
        self.definitions.contains_key(&region) || mesh.physical_region(region).is_some()
    }

    /// An id above every id known to the mesh and the table.
    pub fn fresh_id(&self, mesh: &Mesh) -> RegionId {
        let max_defined = self.definitions.keys().next_back().map(|id| id.0);
        let max_physical = mesh.physical_region_ids().map(|id| id.0).max();
        match max_defined.max(max_physical) {
            Some(max) => RegionId(max + 1),
            None => RegionId(1),
        }
    }

    fn check_operands(&self, mesh: &Mesh, definition: &RegionDefinition) {
        let operands: Vec<RegionId> = match definition {
            RegionDefinition::Physical => Vec::new(),
            RegionDefinition::Union(operands) => operands.clone(),
            RegionDefinition::Exclusion { base, subtrahend } => vec![*base, *subtrahend],
            RegionDefinition::Skin(operand) => vec![*operand],
        };
        for operand in operands {
            assert!(
                self.is_known(mesh, operand),
                "region {} is used in a region definition but is not defined",
                operand
            );
        }
    }

    /// Stores a definition under a caller-chosen id, replacing any previous definition.
    ///
    /// # Panics
    ///
    /// Panics if an operand is unknown.
    pub fn define(&mut self, mesh: &Mesh, region: RegionId, definition: RegionDefinition) {
        self.check_operands(mesh, &definition);
        self.definitions.insert(region, definition);
    }

    fn define_fresh(&mut self, mesh: &Mesh, definition: RegionDefinition) -> RegionId {
        let region = self.fresh_id(mesh);
        self.define(mesh, region, definition);
        region
    }

    pub fn union(&mut self, mesh: &Mesh, regions: &[RegionId]) -> RegionId {
        self.define_fresh(mesh, RegionDefinition::Union(regions.to_vec()))
    }

    pub fn exclusion(&mut self, mesh: &Mesh, base: RegionId, subtrahend: RegionId) -> RegionId {
        self.define_fresh(mesh, RegionDefinition::Exclusion { base, subtrahend })
    }

    pub fn skin(&mut self, mesh: &Mesh, region: RegionId) -> RegionId {
        self.define_fresh(mesh, RegionDefinition::Skin(region))
    }

    /// Computes the entities of a region on the given mesh.
    ///
    /// # Panics
    ///
    /// Panics if the region or one of its operands is unknown, or if its definition is cyclic.
    pub fn resolve(&self, mesh: &Mesh, region: RegionId) -> EntitySet {
        let mut stack = Vec::new();
        self.resolve_recursively(mesh, region, &mut stack)
    }

    fn resolve_recursively(&self, mesh: &Mesh, region: RegionId, stack: &mut Vec<RegionId>) -> EntitySet {
        assert!(
            !stack.contains(&region),
            "cyclic region definition: {} depends on itself",
            region
        );
        stack.push(region);
        let entities = match self.definitions.get(&region) {
            None | Some(RegionDefinition::Physical) => mesh
                .physical_region(region)
                .cloned()
                .unwrap_or_else(|| panic!("region {} is not defined on the mesh", region)),
            Some(RegionDefinition::Union(operands)) => operands
                .iter()
                .map(|&operand| self.resolve_recursively(mesh, operand, stack))
                .fold(EntitySet::new(), |acc, set| acc.union(&set)),
            Some(RegionDefinition::Exclusion { base, subtrahend }) => {
                let base = self.resolve_recursively(mesh, *base, stack);
                let subtrahend = self.resolve_recursively(mesh, *subtrahend, stack);
                base.difference(&subtrahend)
            }
            Some(RegionDefinition::Skin(operand)) => {
                let operand = self.resolve_recursively(mesh, *operand, stack);
                let mut skin = EntitySet::new();
                match operand.dimension() {
                    Some(2) => skin.edges = mesh.boundary_edges(&operand.faces),
                    Some(1) => skin.vertices = mesh.boundary_vertices(&operand.edges),
                    _ => {}
                }
                skin
            }
        };
        stack.pop();
        entities
    }
}
