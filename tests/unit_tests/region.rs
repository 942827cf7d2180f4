use std::collections::BTreeSet;

use weakform::mesh::procedural::{create_step_channel_mesh, create_unit_square_quad_mesh, StepChannelRegions};
use weakform::mesh::Mesh;
use weakform::model::Model;
use weakform::region::{EntitySet, RegionDefinition, RegionId, RegionTable};

use proptest::collection::btree_set;
use proptest::prelude::*;

fn step_channel_model() -> Model {
    let regions = StepChannelRegions {
        fluid: RegionId(1),
        inlet: RegionId(2),
        outlet: RegionId(3),
    };
    Model::new(create_step_channel_mesh(2e-3, 1e-3, 12e-3, 1e-3, [2, 6, 2, 2], regions))
}

#[test]
fn fresh_ids_are_above_every_known_id() {
    let mut mesh = create_unit_square_quad_mesh(2);
    let table = RegionTable::new();
    assert_eq!(table.fresh_id(&mesh), RegionId(3));
    mesh.tag_vertices(RegionId(10), [0]);
    assert_eq!(table.fresh_id(&mesh), RegionId(11));

    let mut model = Model::new(mesh);
    let union = model.region_union(&[RegionId(1), RegionId(10)]);
    assert_eq!(union, RegionId(11));
    let skin = model.region_skin(RegionId(1));
    assert_eq!(skin, RegionId(12));
    assert_eq!(model.regions().definition(skin), Some(&RegionDefinition::Skin(RegionId(1))));
}

#[test]
fn skin_of_faces_is_the_boundary() {
    let mut model = Model::new(create_unit_square_quad_mesh(3));
    let skin = model.region_skin(RegionId(1));
    let resolved = model.resolve_region(skin);
    assert!(resolved.faces.is_empty());
    assert!(resolved.vertices.is_empty());
    assert_eq!(resolved.edges, model.resolve_region(RegionId(2)).edges);
}

#[test]
fn skin_of_open_edge_path_is_its_endpoints() {
    let mut mesh = create_unit_square_quad_mesh(3);
    // Bottom side: vertices 0, 1, 2, 3
    mesh.tag_edges(RegionId(5), [[0, 1], [1, 2], [2, 3]]);
    let mut model = Model::new(mesh);
    let skin = model.region_skin(RegionId(5));
    let vertices: Vec<usize> = model.resolve_region(skin).vertices.into_iter().collect();
    assert_eq!(vertices, vec![0, 3]);

    // A closed loop has no endpoints
    let closed = model.region_skin(RegionId(2));
    assert!(model.resolve_region(closed).is_empty());
}

#[test]
fn channel_wall_excludes_inlet_and_outlet() {
    let mut model = step_channel_model();
    let skin = model.region_skin(RegionId(1));
    let openings = model.region_union(&[RegionId(2), RegionId(3)]);
    let wall = model.region_exclusion(skin, openings);

    let wall_edges = model.resolve_region(wall).edges;
    let skin_edges = model.resolve_region(skin).edges;
    assert_eq!(wall_edges.len(), skin_edges.len() - 6);
    for opening in [RegionId(2), RegionId(3)] {
        let edges = model.resolve_region(opening).edges;
        assert!(edges.is_disjoint(&wall_edges));
    }

    // The closure of the wall contains the corner vertices shared with the openings
    let inlet_vertices = model.resolve_region(RegionId(2)).closure(model.mesh()).vertices;
    let wall_vertices = model.resolve_region(wall).closure(model.mesh()).vertices;
    assert_eq!(inlet_vertices.intersection(&wall_vertices).count(), 2);
}

#[test]
fn regions_follow_mesh_replacement() {
    let mut model = Model::new(create_unit_square_quad_mesh(2));
    let skin = model.region_skin(RegionId(1));
    assert_eq!(model.resolve_region(skin).edges.len(), 8);
    model.replace_mesh(create_unit_square_quad_mesh(4));
    assert_eq!(model.resolve_region(skin).edges.len(), 16);
}

#[test]
#[should_panic]
fn defining_with_unknown_operand_panics() {
    let mut model = Model::new(create_unit_square_quad_mesh(2));
    model.region_union(&[RegionId(1), RegionId(42)]);
}

#[test]
#[should_panic(expected = "cyclic")]
fn cyclic_definitions_panic_on_resolution() {
    let mut model = Model::new(create_unit_square_quad_mesh(2));
    model.define_region(RegionId(10), RegionDefinition::Union(vec![RegionId(1)]));
    model.define_region(RegionId(11), RegionDefinition::Skin(RegionId(10)));
    model.define_region(RegionId(10), RegionDefinition::Union(vec![RegionId(11)]));
    model.resolve_region(RegionId(10));
}

/// A unit square mesh and two random face subsets tagged as regions 10 and 11.
fn tagged_mesh() -> impl Strategy<Value = (Mesh, BTreeSet<usize>, BTreeSet<usize>)> {
    (1usize..5).prop_flat_map(|n| {
        let num_faces = n * n;
        (Just(n), btree_set(0..num_faces, 0..=num_faces), btree_set(0..num_faces, 0..=num_faces)).prop_map(
            |(n, a, b)| {
                let mut mesh = create_unit_square_quad_mesh(n);
                mesh.tag_faces(RegionId(10), a.iter().copied());
                mesh.tag_faces(RegionId(11), b.iter().copied());
                (mesh, a, b)
            },
        )
    })
}

proptest! {
    #[test]
    fn region_algebra_matches_set_operations((mesh, a, b) in tagged_mesh()) {
        let mut model = Model::new(mesh);
        let ab = model.region_union(&[RegionId(10), RegionId(11)]);
        let ba = model.region_union(&[RegionId(11), RegionId(10)]);
        let a_minus_b = model.region_exclusion(RegionId(10), RegionId(11));
        let a_minus_a = model.region_exclusion(RegionId(10), RegionId(10));

        let expected_union: BTreeSet<usize> = a.union(&b).copied().collect();
        let expected_difference: BTreeSet<usize> = a.difference(&b).copied().collect();
        prop_assert_eq!(&model.resolve_region(ab).faces, &expected_union);
        prop_assert_eq!(model.resolve_region(ab), model.resolve_region(ba));
        prop_assert_eq!(&model.resolve_region(a_minus_b).faces, &expected_difference);
        prop_assert_eq!(model.resolve_region(a_minus_a), EntitySet::new());
    }

    #[test]
    fn skin_edges_are_adjacent_to_exactly_one_face((mesh, a, _b) in tagged_mesh()) {
        let mut model = Model::new(mesh);
        let skin = model.region_skin(RegionId(10));
        let resolved = model.resolve_region(skin);
        let mesh = model.mesh();
        for &edge in &resolved.edges {
            let inside = mesh.edge_faces(edge).iter().filter(|&&face| a.contains(&face)).count();
            prop_assert_eq!(inside, 1);
        }
        // Every edge of the subset with a single adjacent face in it belongs to the skin
        for &face in &a {
            for &edge in mesh.face_edges(face) {
                let inside = mesh.edge_faces(edge).iter().filter(|&&other| a.contains(&other)).count();
                prop_assert_eq!(inside == 1, resolved.edges.contains(&edge));
            }
        }
    }
}
