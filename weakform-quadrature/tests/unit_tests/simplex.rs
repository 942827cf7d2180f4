use weakform_quadrature::integrate;
use weakform_quadrature::simplex::triangle_gauss_for_degree;

use matrixcompare::assert_scalar_eq;
use proptest::prelude::*;

fn factorial(n: u32) -> f64 {
    (1..=n).map(f64::from).product()
}

/// Exact integral of x^a y^b over the reference triangle.
fn triangle_monomial_integral(a: u32, b: u32) -> f64 {
    factorial(a) * factorial(b) / factorial(a + b + 2)
}

#[test]
fn triangle_rules_integrate_total_degree_exactly() {
    for degree in 0..=14u32 {
        let rule = triangle_gauss_for_degree(degree as usize);
        assert!(rule.0.iter().all(|&w| w > 0.0));
        for a in 0..=degree {
            for b in 0..=(degree - a) {
                let estimated = integrate(&rule, |&[x, y]| x.powi(a as i32) * y.powi(b as i32));
                assert_scalar_eq!(estimated, triangle_monomial_integral(a, b), comp = abs, tol = 1e-14);
            }
        }
    }
}

proptest! {
    #[test]
    fn triangle_points_lie_inside_reference_triangle(degree in 0usize..20) {
        let (_, points) = triangle_gauss_for_degree(degree);
        for [x, y] in points {
            prop_assert!(x > 0.0 && y > 0.0 && x + y < 1.0);
        }
    }
}
