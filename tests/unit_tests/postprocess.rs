use matrixcompare::assert_scalar_eq;
use weakform::error::InterpolationError;
use weakform::expression::{array2x1, dot, grad, normal, x, y, Array, Expr};
use weakform::interpolate::FaceLocator;
use weakform::mesh::procedural::{create_unit_square_quad_mesh, create_unit_square_triangle_mesh};
use weakform::model::Model;
use weakform::region::RegionId;
use nalgebra::Point2;

#[test]
fn integrals_of_coordinate_expressions() {
    for mesh in [create_unit_square_quad_mesh(3), create_unit_square_triangle_mesh(3)] {
        let model = Model::new(mesh);
        let one = Expr::constant(1.0);
        assert_scalar_eq!(model.integrate(RegionId(1), &one, 0).unwrap(), 1.0, comp = abs, tol = 1e-13);
        assert_scalar_eq!(model.integrate(RegionId(2), &one, 0).unwrap(), 4.0, comp = abs, tol = 1e-13);
        let xy2 = x() * y() * y();
        assert_scalar_eq!(model.integrate(RegionId(1), &xy2, 3).unwrap(), 1.0 / 6.0, comp = abs, tol = 1e-13);
    }
}

#[test]
fn boundary_flux_of_a_constant_vector_field_vanishes() {
    let model = Model::new(create_unit_square_quad_mesh(4));
    let flux = dot(&array2x1(2.0, -1.0), &normal());
    assert_scalar_eq!(model.integrate(RegionId(2), &flux, 1).unwrap(), 0.0, comp = abs, tol = 1e-13);

    // Divergence theorem for v = (x, y): the flux equals twice the area
    let flux = dot(&array2x1(x(), y()), &normal());
    assert_scalar_eq!(model.integrate(RegionId(2), &flux, 2).unwrap(), 2.0, comp = abs, tol = 1e-13);
}

#[test]
fn normals_point_outward_on_each_side() {
    let mut mesh = create_unit_square_quad_mesh(2);
    // Left side, vertices at x = 0
    mesh.tag_edges(RegionId(5), [[0, 3], [3, 6]]);
    let model = Model::new(mesh);
    let nx = normal().entry(0, 0).clone();
    assert_scalar_eq!(model.integrate(RegionId(5), &nx, 0).unwrap(), -1.0, comp = abs, tol = 1e-13);
}

#[test]
fn vertex_regions_sum_point_values() {
    let mut mesh = create_unit_square_quad_mesh(2);
    // Vertices (0, 0), (1, 0) and (1, 1)
    mesh.tag_vertices(RegionId(5), [0, 2, 8]);
    let model = Model::new(mesh);
    let value = 1.0 + x() + 10.0 * y();
    assert_scalar_eq!(model.integrate(RegionId(5), &value, 0).unwrap(), 1.0 + 2.0 + 12.0, comp = abs, tol = 1e-13);
}

#[test]
fn integrals_of_field_values_and_gradients() {
    let mut model = Model::new(create_unit_square_triangle_mesh(4));
    let u = model.add_field("u", "h1");
    model.set_order(&u, RegionId(1), 2);
    model.set_value(&u, RegionId(1), x() * x() + y());

    let value = u.value().into_scalar();
    assert_scalar_eq!(model.integrate(RegionId(1), &value, 2).unwrap(), 1.0 / 3.0 + 0.5, comp = abs, tol = 1e-12);
    let gradient_squared = dot(&grad(&u.value()), &grad(&u.value()));
    // |grad u|^2 = 4 x^2 + 1
    assert_scalar_eq!(
        model.integrate(RegionId(1), &gradient_squared, 2).unwrap(),
        4.0 / 3.0 + 1.0,
        comp = abs,
        tol = 1e-12
    );
}

#[test]
fn parameters_enter_post_processing() {
    let mut model = Model::new(create_unit_square_quad_mesh(1));
    let c = model.add_parameter("c", 3.0);
    let expr = model.parameter_expr(c) * x();
    assert_scalar_eq!(model.integrate(RegionId(1), &expr, 1).unwrap(), 1.5, comp = abs, tol = 1e-14);
    model.set_parameter(c, -2.0);
    assert_scalar_eq!(model.integrate(RegionId(1), &expr, 1).unwrap(), -1.0, comp = abs, tol = 1e-14);
}

#[test]
#[should_panic]
fn placeholders_cannot_be_integrated() {
    let mut model = Model::new(create_unit_square_quad_mesh(1));
    let u = model.add_field("u", "h1");
    let _ = model.integrate(RegionId(1), &u.tf().into_scalar(), 1);
}

#[test]
fn interpolation_inside_the_region() {
    let mut model = Model::new(create_unit_square_quad_mesh(4));
    let v = model.add_field("v", "h1xy");
    model.set_value(&v, RegionId(1), array2x1(x(), 2.0 * y()));
    let array = Array::column(vec![v.value().entry(0, 0).clone(), x() * y(), Expr::constant(7.0)]);

    let values = model.interpolate(RegionId(1), &array, &[0.3, 0.7]).unwrap();
    assert_eq!(values.len(), 3);
    assert_scalar_eq!(values[0], 0.3, comp = abs, tol = 1e-12);
    assert_scalar_eq!(values[1], 0.21, comp = abs, tol = 1e-14);
    assert_scalar_eq!(values[2], 7.0, comp = abs, tol = 1e-14);

    // A vanishing third coordinate lies in the mesh plane
    let in_plane = model.interpolate(RegionId(1), &array, &[0.3, 0.7, 0.0]).unwrap();
    assert_eq!(in_plane, values);

    // Points on shared edges and vertices are found
    let on_vertex = model.interpolate(RegionId(1), &v.value(), &[0.5, 0.5]).unwrap();
    assert_scalar_eq!(on_vertex[1], 1.0, comp = abs, tol = 1e-12);
}

#[test]
fn interpolation_outside_the_region_is_an_error() {
    let mut mesh = create_unit_square_quad_mesh(2);
    mesh.tag_faces(RegionId(5), [0]);
    let model = Model::new(mesh);
    let array = Array::scalar(x());

    let outside = model.interpolate(RegionId(1), &array, &[1.5, 0.5]);
    assert_eq!(
        outside,
        Err(InterpolationError::PointOutsideRegion {
            point: [1.5, 0.5],
            region: RegionId(1)
        })
    );

    // Inside the mesh but outside the bottom-left face
    assert!(model.interpolate(RegionId(5), &array, &[0.25, 0.25]).is_ok());
    assert!(model.interpolate(RegionId(5), &array, &[0.75, 0.75]).is_err());
}

#[test]
fn interpolation_off_the_mesh_plane_is_an_error() {
    let model = Model::new(create_unit_square_quad_mesh(2));
    let array = Array::scalar(x() + y());

    let far = model.interpolate(RegionId(1), &array, &[0.5, 0.5, 1000.0]);
    assert_eq!(
        far,
        Err(InterpolationError::PointOutsideRegion {
            point: [0.5, 0.5],
            region: RegionId(1)
        })
    );
    assert!(model.interpolate(RegionId(1), &array, &[0.5, 0.5, -1e-3]).is_err());
    let in_plane = model.interpolate(RegionId(1), &array, &[0.5, 0.5, 0.0]).unwrap();
    assert_scalar_eq!(in_plane[0], 1.0, comp = abs, tol = 1e-12);
}

#[test]
#[should_panic]
fn interpolation_points_need_two_or_three_coordinates() {
    let model = Model::new(create_unit_square_quad_mesh(1));
    let _ = model.interpolate(RegionId(1), &Array::scalar(x()), &[0.5]);
}

#[test]
fn face_locator_prefers_the_lowest_face_index() {
    let mesh = create_unit_square_triangle_mesh(2);
    let locator = FaceLocator::new(&mesh, 0..mesh.faces().len());
    // The center is a vertex shared by several faces
    let (face, _) = locator.locate(&mesh, &Point2::new(0.5, 0.5)).unwrap();
    let containing: Vec<usize> = (0..mesh.faces().len())
        .filter(|&f| mesh.faces()[f].vertices().contains(&4))
        .collect();
    assert_eq!(face, containing[0]);
    assert!(locator.locate(&mesh, &Point2::new(-0.1, 0.5)).is_none());
}
