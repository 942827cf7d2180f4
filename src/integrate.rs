//! Integration of placeholder-free expressions over regions.

use crate::evaluation::{integration_domains, quadrature_points, FaceField, PointEnvironment};
use crate::expression::{evaluate, Expr};
use crate::field::FieldId;
use crate::model::Model;
use crate::region::RegionId;
use rayon::prelude::*;

/// Integrates a scalar expression over a region with a quadrature rule exact for polynomials
/// of the given degree.
///
/// Integrals over edge regions are boundary integrals, where `normal()` is the outward normal
/// of the adjacent face. Over vertex regions the point values are summed.
///
/// # Panics
///
/// Panics if the expression contains unknown or test placeholders, or if the region is
/// unknown.
pub fn integrate(model: &Model, region: RegionId, expr: &Expr, degree: usize) -> eyre::Result<f64> {
    assert!(
        !expr.has_placeholder(),
        "only expressions without unknown or test placeholders can be integrated"
    );
    let mesh = model.mesh();
    assert!(model.regions().is_known(mesh, region), "region {} is not defined", region);

    let entities = model.resolve_region(region);
    let domains = integration_domains(mesh, &entities);
    let mut field_ids: Vec<FieldId> = expr.field_leaves().iter().map(|leaf| leaf.field).collect();
    field_ids.sort_unstable();
    field_ids.dedup();
    let discretizations = model.discretizations();
    let parameters = model.parameter_values();

    let domain_integrals = domains
        .par_iter()
        .with_min_len(64)
        .map(|domain| {
            let face = domain.face();
            let mut points = Vec::new();
            quadrature_points(mesh, domain, degree, &mut points)?;
            let mut fields: Vec<FaceField> = field_ids
                .iter()
                .map(|&id| FaceField::new(mesh, face, id, &model.fields()[id.0], &discretizations[id.0]))
                .collect();
            let mut integral = 0.0;
            for point in &points {
                for field in &mut fields {
                    field.evaluate_at(point);
                }
                let environment = PointEnvironment {
                    point,
                    parameters: &parameters,
                    fields: &fields,
                };
                integral += point.weight * evaluate(expr, &environment);
            }
            Ok(integral)
        })
        .collect::<eyre::Result<Vec<f64>>>()?;

    // Sequential sum in domain order
    Ok(domain_integrals.iter().sum())
}
