use nlfem::discretization::FiniteElementDiscretization;
use nlfem::element::ElementType;
use nlfem::mesh::procedural::{create_rectangular_uniform_quad_mesh, create_rectangular_uniform_tri_mesh};
use nlfem::quadrature::{tensor_gauss, triangle};
use nlfem::quadrature_space::PartialQuadratureSpace;
use proptest::collection::vec;
use proptest::prelude::*;

#[test]
fn offsets_follow_element_order() {
    let mut mesh = create_rectangular_uniform_quad_mesh(4.0, 1.0, 4, 1).unwrap();
    mesh.set_attribute(1, 2);
    let fed = FiniteElementDiscretization::new(mesh);

    let first = PartialQuadratureSpace::with_default_rules(&fed, 1);
    assert_eq!(first.id(), 1);
    assert_eq!(first.elements(), &[0, 2, 3]);
    assert_eq!(first.number_of_integration_points(), 12);
    assert_eq!(first.offset(0), 0);
    assert_eq!(first.offset(2), 4);
    assert_eq!(first.offset(3), 8);
    assert_eq!(first.try_offset(1), None);
    assert!(!first.contains(1));

    let second = PartialQuadratureSpace::with_default_rules(&fed, 2);
    assert_eq!(second.number_of_elements(), 1);
    assert_eq!(second.integration_points(1), 0..4);
}

#[test]
fn custom_rule_selector() {
    let mesh = create_rectangular_uniform_tri_mesh(1.0, 1.0, 1, 1).unwrap();
    let fed = FiniteElementDiscretization::new(mesh);
    let space = PartialQuadratureSpace::new(&fed, 1, |element_type| match element_type {
        ElementType::Tri3 => triangle(2),
        _ => tensor_gauss(2, 3),
    });
    assert_eq!(space.number_of_integration_points(), 6);
    assert_eq!(space.integration_points(1), 3..6);
    assert_eq!(space.integration_rule(ElementType::Tri3).unwrap().number_of_points(), 3);
    assert!(space.integration_rule(ElementType::Quad4).is_none());
}

#[test]
fn empty_region() {
    let mesh = create_rectangular_uniform_quad_mesh(1.0, 1.0, 2, 2).unwrap();
    let fed = FiniteElementDiscretization::new(mesh);
    let space = PartialQuadratureSpace::with_default_rules(&fed, 5);
    assert_eq!(space.number_of_elements(), 0);
    assert_eq!(space.number_of_integration_points(), 0);
}

#[test]
#[should_panic(expected = "does not belong to the quadrature space of material 1")]
fn offset_of_foreign_element_panics() {
    let mut mesh = create_rectangular_uniform_quad_mesh(2.0, 1.0, 2, 1).unwrap();
    mesh.set_attribute(1, 2);
    let fed = FiniteElementDiscretization::new(mesh);
    let space = PartialQuadratureSpace::with_default_rules(&fed, 1);
    space.offset(1);
}

#[test]
fn partitions_only_see_their_elements() {
    let mesh = create_rectangular_uniform_quad_mesh(4.0, 1.0, 4, 1).unwrap();
    let fed = FiniteElementDiscretization::partitioned(mesh, 1, 2).unwrap();
    let space = PartialQuadratureSpace::with_default_rules(&fed, 1);
    assert_eq!(space.elements(), &[2, 3]);
    assert_eq!(space.offset(2), 0);
    assert_eq!(space.number_of_integration_points(), 8);
}

proptest! {
    #[test]
    fn offsets_are_contiguous_and_disjoint(attributes in vec(0..3usize, 1..20)) {
        let mut mesh = create_rectangular_uniform_quad_mesh(1.0, 1.0, attributes.len(), 1).unwrap();
        for (cell, &attribute) in attributes.iter().enumerate() {
            mesh.set_attribute(cell, attribute);
        }
        let fed = FiniteElementDiscretization::new(mesh);

        let mut total_elements = 0;
        for id in 0..3 {
            let space = PartialQuadratureSpace::with_default_rules(&fed, id);
            let mut next = 0;
            for &element in space.elements() {
                prop_assert_eq!(attributes[element], id);
                let points = space.integration_points(element);
                prop_assert_eq!(points.start, next);
                prop_assert!(points.end > points.start);
                prop_assert!(points.end <= space.number_of_integration_points());
                next = points.end;
            }
            prop_assert_eq!(next, space.number_of_integration_points());
            prop_assert!(space.elements().windows(2).all(|w| w[0] < w[1]));
            total_elements += space.number_of_elements();
        }
        prop_assert_eq!(total_elements, attributes.len());
    }
}
