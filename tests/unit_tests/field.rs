use matrixcompare::assert_scalar_eq;
use weakform::dof::{CoefficientKey, Entity, FieldDiscretization};
use weakform::expression::{array2x1, x, y, Expr};
use weakform::field::{Constraint, RegionConfig};
use weakform::mesh::procedural::create_unit_square_quad_mesh;
use weakform::model::Model;
use weakform::region::RegionId;

fn vertex_key(vertex: usize, component: usize) -> CoefficientKey {
    CoefficientKey {
        entity: Entity::Vertex(vertex),
        function: 0,
        component,
    }
}

#[test]
fn region_config_latest_write_wins() {
    let mut config = RegionConfig::new();
    config.set(RegionId(1), 2);
    config.set(RegionId(2), 3);
    config.set(RegionId(1), 4);
    assert_eq!(config.len(), 2);
    assert_eq!(config.get(RegionId(1)), Some(&4));
    // Re-setting moves the entry to the end
    let order: Vec<RegionId> = config.iter().map(|(region, _)| region).collect();
    assert_eq!(order, vec![RegionId(2), RegionId(1)]);

    assert_eq!(config.remove(RegionId(2)), Some(3));
    assert_eq!(config.remove(RegionId(2)), None);
    assert_eq!(config.len(), 1);
    assert!(config.get(RegionId(5)).is_none());
}

#[test]
fn later_constraints_take_precedence_on_shared_entities() {
    let mut mesh = create_unit_square_quad_mesh(2);
    mesh.tag_vertices(RegionId(5), [0]);
    let mut model = Model::new(mesh);
    let u = model.add_field("u", "h1");
    model.set_constraint_value(&u, RegionId(2), Expr::constant(1.0));
    model.set_constraint_value(&u, RegionId(5), Expr::constant(2.0));

    let fixed = |model: &Model| {
        let field = model.field(&u);
        let discretization = FieldDiscretization::new(model.mesh(), model.regions(), field);
        discretization.constrained_coefficients(model.mesh(), model.regions(), field, &model.parameter_values())
    };

    let coefficients = fixed(&model);
    assert_eq!(coefficients[&vertex_key(0, 0)], 2.0);
    assert_eq!(coefficients[&vertex_key(1, 0)], 1.0);
    // The interior vertex is free
    assert!(!coefficients.contains_key(&vertex_key(4, 0)));

    // Replacing the boundary constraint moves it behind the vertex constraint
    model.set_constraint_value(&u, RegionId(2), Expr::constant(3.0));
    let coefficients = fixed(&model);
    assert_eq!(coefficients[&vertex_key(0, 0)], 3.0);
    assert_eq!(coefficients[&vertex_key(1, 0)], 3.0);

    model.remove_constraint(&u, RegionId(2));
    let coefficients = fixed(&model);
    assert_eq!(coefficients.len(), 1);
    assert_eq!(
        model.field(&u).constraints().get(RegionId(5)),
        Some(&Constraint::Value(Expr::constant(2.0).into()))
    );
}

#[test]
fn constraint_values_may_depend_on_parameters() {
    let mut model = Model::new(create_unit_square_quad_mesh(2));
    let u = model.add_field("u", "h1");
    let scale = model.add_parameter("scale", 2.0);
    let value = model.parameter_expr(scale) * x();
    model.set_constraint_value(&u, RegionId(2), value);

    let field = model.field(&u);
    let discretization = FieldDiscretization::new(model.mesh(), model.regions(), field);
    let coefficients =
        discretization.constrained_coefficients(model.mesh(), model.regions(), field, &model.parameter_values());
    // Vertex 2 sits at (1, 0)
    assert_scalar_eq!(coefficients[&vertex_key(2, 0)], 2.0, comp = abs, tol = 1e-14);

    model.set_parameter(scale, -1.0);
    let field = model.field(&u);
    let coefficients =
        discretization.constrained_coefficients(model.mesh(), model.regions(), field, &model.parameter_values());
    assert_scalar_eq!(coefficients[&vertex_key(2, 0)], -1.0, comp = abs, tol = 1e-14);
}

#[test]
fn set_value_reproduces_functions_in_the_basis() {
    let mut model = Model::new(create_unit_square_quad_mesh(3));
    let u = model.add_field("u", "h1");
    model.set_order(&u, RegionId(1), 2);
    model.set_value(&u, RegionId(1), x() * x() * y() - 2.0 * y() * y() + 1.0);

    let value = u.value();
    for point in [[0.1, 0.2], [0.5, 0.5], [0.77, 0.31], [1.0, 0.0]] {
        let [px, py] = point;
        let interpolated = model.interpolate(RegionId(1), &value, &point).unwrap();
        let expected = px * px * py - 2.0 * py * py + 1.0;
        assert_scalar_eq!(interpolated[0], expected, comp = abs, tol = 1e-10);
    }
}

#[test]
fn set_value_of_vector_field() {
    let mut model = Model::new(create_unit_square_quad_mesh(2));
    let v = model.add_field("v", "h1xy");
    model.set_value(&v, RegionId(1), array2x1(x() + y(), x() - 3.0));
    let values = model.interpolate(RegionId(1), &v.value(), &[0.3, 0.6]).unwrap();
    assert_scalar_eq!(values[0], 0.9, comp = abs, tol = 1e-12);
    assert_scalar_eq!(values[1], -2.7, comp = abs, tol = 1e-12);
}

#[test]
fn orders_resolve_with_latest_declaration_winning() {
    let mut mesh = create_unit_square_quad_mesh(2);
    // Faces 0 and 1 form the bottom row
    mesh.tag_faces(RegionId(5), [0, 1]);
    let mut model = Model::new(mesh);
    let u = model.add_field("u", "h1");
    model.set_order(&u, RegionId(1), 2);
    model.set_order(&u, RegionId(5), 4);

    let discretization = FieldDiscretization::new(model.mesh(), model.regions(), model.field(&u));
    assert_eq!(discretization.face_order(0), 4);
    assert_eq!(discretization.face_order(1), 4);
    assert_eq!(discretization.face_order(2), 2);
    assert_eq!(discretization.face_order(3), 2);

    // Edges between rows take the maximum of their faces
    let shared = model.mesh().find_edge(3, 4).unwrap();
    assert_eq!(discretization.edge_order(shared), 4);
    let top = model.mesh().find_edge(6, 7).unwrap();
    assert_eq!(discretization.edge_order(top), 2);

    // Declaring the whole domain again overrides the bottom row
    model.set_order(&u, RegionId(1), 3);
    let discretization = FieldDiscretization::new(model.mesh(), model.regions(), model.field(&u));
    assert!((0..4).all(|face| discretization.face_order(face) == 3));
}

#[test]
fn unset_orders_use_the_family_default() {
    let mut model = Model::new(create_unit_square_quad_mesh(2));
    let u = model.add_field("u", "h1");
    let c = model.add_field("c", "one");
    for field in [&u, &c] {
        let discretization = FieldDiscretization::new(model.mesh(), model.regions(), model.field(field));
        let expected = if *field == u { 1 } else { 0 };
        assert!((0..4).all(|face| discretization.face_order(face) == expected));
    }
    model.set_order(&c, RegionId(1), 0);
}

#[test]
#[should_panic]
fn constraint_values_need_one_entry_per_component() {
    let mut model = Model::new(create_unit_square_quad_mesh(2));
    let v = model.add_field("v", "h1xy");
    model.set_constraint_value(&v, RegionId(2), Expr::constant(1.0));
}

#[test]
#[should_panic]
fn constraint_values_cannot_depend_on_fields() {
    let mut model = Model::new(create_unit_square_quad_mesh(2));
    let u = model.add_field("u", "h1");
    let w = model.add_field("w", "h1");
    model.set_constraint_value(&u, RegionId(2), w.value());
}

#[test]
#[should_panic]
fn constraints_on_unknown_regions_panic() {
    let mut model = Model::new(create_unit_square_quad_mesh(2));
    let u = model.add_field("u", "h1");
    model.set_constraint(&u, RegionId(9));
}

#[test]
#[should_panic]
fn unknown_field_types_panic() {
    let mut model = Model::new(create_unit_square_quad_mesh(2));
    model.add_field("u", "h3");
}
