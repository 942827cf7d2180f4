//! Field declarations: basis type, per-region orders and constraints, coefficient storage.

use crate::dof::CoefficientKey;
use crate::expression::{Array, Expr, Leaf};
use crate::region::RegionId;
use crate::shape_function::FieldType;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldId(pub usize);

/// Per-region configuration with latest-write-wins semantics.
///
/// Entries are kept in declaration order. Setting an entry for a region that already has one
/// replaces it and moves it to the end, so iterating in order and letting later entries
/// overwrite earlier ones yields the effective configuration of every entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionConfig<T> {
    entries: Vec<(RegionId, T)>,
}

impl<T> Default for RegionConfig<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> RegionConfig<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, region: RegionId, value: T) {
        self.remove(region);
        self.entries.push((region, value));
    }

    pub fn remove(&mut self, region: RegionId) -> Option<T> {
        let position = self.entries.iter().position(|(r, _)| *r == region)?;
        Some(self.entries.remove(position).1)
    }

    pub fn get(&self, region: RegionId) -> Option<&T> {
        self.entries
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, value)| value)
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &T)> {
        self.entries.iter().map(|(region, value)| (*region, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A fixed-value constraint on the DOFs of a region.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Zero,
    /// One placeholder-free expression per field value component.
    Value(Array),
}

/// A declared unknown field.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    field_type: FieldType,
    orders: RegionConfig<u32>,
    constraints: RegionConfig<Constraint>,
    values: FxHashMap<CoefficientKey, f64>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            orders: RegionConfig::new(),
            constraints: RegionConfig::new(),
            values: FxHashMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn orders(&self) -> &RegionConfig<u32> {
        &self.orders
    }

    pub fn constraints(&self) -> &RegionConfig<Constraint> {
        &self.constraints
    }

    /// # Panics
    ///
    /// Panics if the field's basis family does not support the order.
    pub fn set_order(&mut self, region: RegionId, order: u32) {
        self.field_type.family().check_order(order);
        self.orders.set(region, order);
    }

    /// Fixes the DOFs on the closure of a region, replacing a previous constraint on the same
    /// region.
    ///
    /// # Panics
    ///
    /// Panics if the constraint value contains placeholders, field values or normals, or if its
    /// number of entries differs from the field's value length.
    pub fn set_constraint(&mut self, region: RegionId, constraint: Constraint) {
        if let Constraint::Value(value) = &constraint {
            self.check_point_values(value);
        }
        self.constraints.set(region, constraint);
    }

    /// # Panics
    ///
    /// Panics if the array does not hold one entry per value component, or if an entry depends
    /// on anything but coordinates, parameters and constants.
    pub(crate) fn check_point_values(&self, value: &Array) {
        assert_eq!(
            value.len(),
            self.field_type.value_len(),
            "values of field '{}' must have {} entries",
            self.name,
            self.field_type.value_len()
        );
        for entry in value.entries() {
            let mut valid = true;
            entry.visit_leaves(&mut |leaf| {
                valid &= !matches!(
                    leaf,
                    Expr::Dof(_) | Expr::Test(_) | Expr::Field(_) | Expr::Normal(_)
                )
            });
            assert!(
                valid,
                "field values may only depend on coordinates, parameters and constants"
            );
        }
    }

    pub fn remove_constraint(&mut self, region: RegionId) -> Option<Constraint> {
        self.constraints.remove(region)
    }

    /// The stored coefficient, zero if it has never been set.
    pub fn coefficient(&self, key: &CoefficientKey) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    pub fn set_coefficient(&mut self, key: CoefficientKey, value: f64) {
        self.values.insert(key, value);
    }

    pub fn clear_coefficients(&mut self) {
        self.values.clear();
    }

    pub fn num_stored_coefficients(&self) -> usize {
        self.values.len()
    }
}

/// A lightweight reference to a declared field, used to build expressions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FieldHandle {
    id: FieldId,
    value_len: usize,
}

impl FieldHandle {
    pub(crate) fn new(id: FieldId, value_len: usize) -> Self {
        Self { id, value_len }
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    /// Number of scalar values of the field at a point.
    pub fn value_len(&self) -> usize {
        self.value_len
    }

    fn column(&self, make: impl Fn(Leaf) -> Expr) -> Array {
        let entries = (0..self.value_len)
            .map(|component| {
                make(Leaf {
                    field: self.id,
                    component,
                    derivative: None,
                })
            })
            .collect();
        Array::column(entries)
    }

    /// The unknown placeholder of the field.
    pub fn dof(&self) -> Array {
        self.column(Expr::Dof)
    }

    /// The test function placeholder of the field.
    pub fn tf(&self) -> Array {
        self.column(Expr::Test)
    }

    /// The current value of the field.
    pub fn value(&self) -> Array {
        self.column(Expr::Field)
    }
}
