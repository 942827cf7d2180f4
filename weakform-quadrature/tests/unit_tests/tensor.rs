use weakform_quadrature::integrate;
use weakform_quadrature::tensor::{quadrilateral_gauss, quadrilateral_gauss_for_degree};

use matrixcompare::assert_scalar_eq;

fn monomial_integral_1d(alpha: i32) -> f64 {
    (1.0 - (-1.0f64).powi(alpha + 1)) / (alpha as f64 + 1.0)
}

#[test]
fn quadrilateral_gauss_rules_satisfy_expected_accuracy() {
    for n in 1..=12 {
        // Polynomial degree that the rule integrates exactly *along each dimension*
        let expected_polynomial_degree = 2 * n - 1;
        let rule = quadrilateral_gauss(n);

        assert_eq!(rule.0.len(), n * n);
        assert!(rule.0.iter().all(|&w| w > 0.0));

        for alpha in 0..=expected_polynomial_degree as i32 {
            for beta in 0..=expected_polynomial_degree as i32 {
                let expected = monomial_integral_1d(alpha) * monomial_integral_1d(beta);
                let estimated_integral = integrate(&rule, |&[x, y]| x.powi(alpha) * y.powi(beta));
                assert_scalar_eq!(estimated_integral, expected, comp = abs, tol = 1e-13);
            }
        }
    }
}

#[test]
fn quadrilateral_rule_for_degree_has_area_four() {
    for degree in 0..6 {
        let rule = quadrilateral_gauss_for_degree(degree);
        assert_scalar_eq!(rule.0.iter().sum::<f64>(), 4.0, comp = abs, tol = 1e-14);
    }
}
