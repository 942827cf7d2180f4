//! Steady laminar flow of water through a channel with a backward-facing step.
//!
//! The inflow velocity is ramped up and every iterate is written to `data/laminar_flow_step/`.

use std::path::Path;

use weakform::expression::{array2x1, div, dot, grad, normal, norm, y};
use weakform::formulation::Formulation;
use weakform::mesh::procedural::{create_step_channel_mesh, StepChannelRegions};
use weakform::model::Model;
use weakform::nonlinear::{NonlinearSettings, RampedSolver};
use weakform::region::RegionId;
use weakform::solve::DenseLu;

fn main() -> eyre::Result<()> {
    let (l_thin, h_thin, l_thick, h_thick) = (2e-3, 1e-3, 12e-3, 1e-3);
    let (mu, rho) = (8.9e-4, 1000.0);
    let regions = StepChannelRegions {
        fluid: RegionId(1),
        inlet: RegionId(2),
        outlet: RegionId(3),
    };

    let mesh = create_step_channel_mesh(l_thin, h_thin, l_thick, h_thick, [4, 24, 4, 4], regions);
    let mut model = Model::new(mesh);
    let skin = model.region_skin(regions.fluid);
    let openings = model.region_union(&[regions.inlet, regions.outlet]);
    let wall = model.region_exclusion(skin, openings);

    let v = model.add_field("v", "h1xy");
    let p = model.add_field("p", "h1");
    model.set_order(&v, regions.fluid, 2);
    model.set_order(&p, regions.fluid, 1);

    let velocity = model.add_parameter("velocity", 0.0);
    let profile = model.parameter_expr(velocity) * y() * (h_thin - y()) * (4.0 / (h_thin * h_thin));
    model.set_constraint(&v, wall);
    model.set_constraint_value(&v, regions.inlet, array2x1(profile, 0.0));
    model.set_constraint(&p, regions.outlet);

    // Newton linearization of the convective term around the current velocity
    let (dv, w, v_k) = (v.dof(), v.tf(), v.value());
    let convection = rho
        * (dot(&grad(&dv).matmul(&v_k), &w) + dot(&grad(&v_k).matmul(&dv), &w)
            - dot(&grad(&v_k).matmul(&v_k), &w));
    let mut formulation = Formulation::new();
    formulation.add_term(
        regions.fluid,
        mu * dot(&grad(&dv), &grad(&w)) + convection - p.dof().into_scalar() * div(&w)
            + div(&dv) * p.tf().into_scalar(),
    );

    let out_dir = Path::new("data/laminar_flow_step");
    std::fs::create_dir_all(out_dir)?;
    let flux = dot(&v.value(), &normal());
    let speed = norm(&v.value());

    let settings = NonlinearSettings {
        initial: 0.1,
        target: 0.3,
        increment: 0.008,
        tolerance: 1e-10,
        ..Default::default()
    };
    let report = RampedSolver::new(settings)
        .with_observer(|model, record| {
            let write = || -> eyre::Result<()> {
                model.write(&v, regions.fluid, out_dir.join("v.vtk"))?;
                model.write(&p, regions.fluid, out_dir.join("p.vtk"))?;
                let inflow = model.integrate(regions.inlet, &flux, 4)?;
                let outflow = model.integrate(regions.outlet, &flux, 4)?;
                println!(
                    "iteration {:3}: velocity = {:.3}, change = {:.3e}, inflow = {:.4e}, outflow = {:.4e}",
                    record.iteration, record.parameter, record.change, inflow, outflow
                );
                Ok(())
            };
            if let Err(err) = write() {
                eprintln!("Failed to write iteration {}: {}", record.iteration, err);
            }
        })
        .solve(
            &mut model,
            &formulation,
            &mut DenseLu,
            |model, s| model.set_parameter(velocity, s),
            |model| model.integrate(regions.fluid, &speed, 2),
        )?;

    println!("{:?} after {} iterations", report.outcome, report.iterations);
    let probe = model.interpolate(regions.fluid, &v.value(), &[5e-3, 1e-3])?;
    println!("v(5e-3, 1e-3) = [{:.6}, {:.6}]", probe[0], probe[1]);
    Ok(())
}
