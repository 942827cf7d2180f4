//! The declaration surface: a mesh with its regions, fields and parameters.
//!
//! Declarations are side-effect free until a formulation is assembled or solved, and region
//! definitions are resolved against the mesh whenever they are used.

use crate::dof::FieldDiscretization;
use crate::error::InterpolationError;
use crate::expression::{Array, Expr, ParameterId};
use crate::field::{Constraint, Field, FieldHandle, FieldId};
use crate::mesh::Mesh;
use crate::region::{EntitySet, RegionDefinition, RegionId, RegionTable};
use crate::shape_function::FieldType;
use log::debug;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Model {
    mesh: Mesh,
    regions: RegionTable,
    fields: Vec<Field>,
    parameters: Vec<(String, f64)>,
}

impl Model {
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            regions: RegionTable::new(),
            fields: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Replaces the mesh. Region definitions are kept and resolved against the new mesh, field
    /// values are discarded.
    pub fn replace_mesh(&mut self, mesh: Mesh) {
        debug!(
            "Replacing mesh ({} faces) with a mesh of {} faces",
            self.mesh.faces().len(),
            mesh.faces().len()
        );
        self.mesh = mesh;
        for field in &mut self.fields {
            field.clear_coefficients();
        }
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    /// Declares a field, e.g. `add_field("v", "h1xy")`.
    ///
    /// # Panics
    ///
    /// Panics if the type name is unknown.
    pub fn add_field(&mut self, name: impl Into<String>, type_name: &str) -> FieldHandle {
        let field_type = FieldType::parse(type_name);
        let id = FieldId(self.fields.len());
        self.fields.push(Field::new(name, field_type));
        FieldHandle::new(id, field_type.value_len())
    }

    pub fn field(&self, field: &FieldHandle) -> &Field {
        &self.fields[field.id().0]
    }

    pub fn field_mut(&mut self, field: &FieldHandle) -> &mut Field {
        &mut self.fields[field.id().0]
    }

    /// Fields in id order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    /// Resolved orders of every field on the current mesh, indexed by field id.
    pub fn discretizations(&self) -> Vec<FieldDiscretization> {
        self.fields
            .iter()
            .map(|field| FieldDiscretization::new(&self.mesh, &self.regions, field))
            .collect()
    }

    fn check_region(&self, region: RegionId) {
        assert!(
            self.regions.is_known(&self.mesh, region),
            "region {} is not defined",
            region
        );
    }

    /// # Panics
    ///
    /// Panics if the region is unknown or the order is invalid for the field's family.
    pub fn set_order(&mut self, field: &FieldHandle, region: RegionId, order: u32) {
        self.check_region(region);
        self.field_mut(field).set_order(region, order);
    }

    /// Fixes the field to zero on the region.
    pub fn set_constraint(&mut self, field: &FieldHandle, region: RegionId) {
        self.check_region(region);
        self.field_mut(field).set_constraint(region, Constraint::Zero);
    }

    /// Fixes the field to a value on the region.
    ///
    /// # Panics
    ///
    /// Panics if the region is unknown or if the value is not a placeholder-free expression of
    /// coordinates and parameters with one entry per field value component.
    pub fn set_constraint_value(&mut self, field: &FieldHandle, region: RegionId, value: impl Into<Array>) {
        self.check_region(region);
        self.field_mut(field)
            .set_constraint(region, Constraint::Value(value.into()));
    }

    pub fn remove_constraint(&mut self, field: &FieldHandle, region: RegionId) {
        self.field_mut(field).remove_constraint(region);
    }

    /// Sets the coefficients of a field on the closure of a region from point values, e.g. to
    /// provide an initial guess.
    pub fn set_value(&mut self, field: &FieldHandle, region: RegionId, value: impl Into<Array>) {
        self.check_region(region);
        let value = value.into();
        self.field(field).check_point_values(&value);
        let discretization = FieldDiscretization::new(&self.mesh, &self.regions, self.field(field));
        let entities = self.regions.resolve(&self.mesh, region).closure(&self.mesh);
        let parameters = self.parameter_values();
        let coefficients = discretization.project(&self.mesh, &entities, value.entries(), &parameters);
        let field = self.field_mut(field);
        for (key, value) in coefficients {
            field.set_coefficient(key, value);
        }
    }

    pub fn region_union(&mut self, regions: &[RegionId]) -> RegionId {
        self.regions.union(&self.mesh, regions)
    }

    pub fn region_exclusion(&mut self, base: RegionId, subtrahend: RegionId) -> RegionId {
        self.regions.exclusion(&self.mesh, base, subtrahend)
    }

    pub fn region_skin(&mut self, region: RegionId) -> RegionId {
        self.regions.skin(&self.mesh, region)
    }

    /// Stores a region definition under a chosen id.
    pub fn define_region(&mut self, region: RegionId, definition: RegionDefinition) {
        self.regions.define(&self.mesh, region, definition);
    }

    /// The entities of a region on the current mesh.
    pub fn resolve_region(&self, region: RegionId) -> EntitySet {
        self.regions.resolve(&self.mesh, region)
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, value: f64) -> ParameterId {
        self.parameters.push((name.into(), value));
        ParameterId(self.parameters.len() - 1)
    }

    /// The parameter as an expression leaf.
    pub fn parameter_expr(&self, parameter: ParameterId) -> Expr {
        assert!(parameter.0 < self.parameters.len(), "unknown parameter {:?}", parameter);
        Expr::parameter(parameter)
    }

    pub fn set_parameter(&mut self, parameter: ParameterId, value: f64) {
        self.parameters[parameter.0].1 = value;
    }

    pub fn parameter(&self, parameter: ParameterId) -> f64 {
        self.parameters[parameter.0].1
    }

    pub fn parameter_name(&self, parameter: ParameterId) -> &str {
        &self.parameters[parameter.0].0
    }

    /// Values of all parameters, indexed by id.
    pub fn parameter_values(&self) -> Vec<f64> {
        self.parameters.iter().map(|(_, value)| *value).collect()
    }

    /// Integrates a placeholder-free scalar expression over a region with a quadrature rule
    /// exact for polynomials of the given degree.
    pub fn integrate(&self, region: RegionId, expr: &Expr, degree: usize) -> eyre::Result<f64> {
        crate::integrate::integrate(self, region, expr, degree)
    }

    /// Evaluates an array of expressions at a point of a region's faces.
    pub fn interpolate(&self, region: RegionId, array: &Array, point: &[f64]) -> Result<Vec<f64>, InterpolationError> {
        crate::interpolate::interpolate(self, region, array, point)
    }

    /// Writes a field on a region, with the format chosen by the path's extension.
    pub fn write(&self, field: &FieldHandle, region: RegionId, path: impl AsRef<Path>) -> eyre::Result<()> {
        crate::io::write(self, field, region, path.as_ref())
    }
}
