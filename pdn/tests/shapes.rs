use std::cell::RefCell;
use std::rc::Rc;

use float_eq::assert_float_eq;
use pdn::db::WireShapeType;
use pdn::grid::{GridComponent, GridComponentType};
use pdn::index::ShapeTreeMap;
use pdn::{Shape, ShapeType};
use pdngeom::Rect;

mod common;
use common::{layer, setup_block, setup_tech};

#[test]
fn obstructions_from_technology_rules() {
    let tech = setup_tech();
    let m1 = layer(&tech, "m1");
    let m2 = layer(&tech, "m2");

    let rail = Shape::new(&tech, m1, None, Rect::from_coords(0, 0, 100, 10), WireShapeType::Stripe);
    assert_eq!(rail.obstruction(), Rect::from_coords(-5, 0, 105, 10));

    let strap = Shape::new(&tech, m2, None, Rect::from_coords(0, 0, 10, 100), WireShapeType::Stripe);
    assert_eq!(strap.obstruction(), Rect::from_coords(-3, -3, 13, 103));
    assert!(!strap.is_wrong_way(&tech));

    let wrong_way = Shape::new(&tech, m2, None, Rect::from_coords(0, 0, 100, 10), WireShapeType::Stripe);
    assert!(wrong_way.is_wrong_way(&tech));
}

#[test]
fn written_shapes_read_back() {
    let tech = setup_tech();
    let (mut block, vdd, wire) = setup_block();
    let m1 = layer(&tech, "m1");

    let rail = Shape::new(&tech, m1, Some(vdd), Rect::from_coords(0, 0, 100, 10), WireShapeType::FollowPin);
    rail.write_to_db(&mut block, wire, false, false, &tech).unwrap();
    let strap = Shape::new(&tech, m1, Some(vdd), Rect::from_coords(0, 50, 100, 60), WireShapeType::Stripe);
    strap.write_to_db(&mut block, wire, true, true, &tech).unwrap();

    let map = Shape::populate_map_from_db(&block, vdd, &tech).unwrap();
    assert_eq!(map.len(), 1);
    let tree = &map[&m1];
    assert_eq!(tree.len(), 2);
    let mut rects: Vec<Rect> = tree.values().map(|shape| shape.borrow().rect()).collect();
    rects.sort();
    assert_eq!(
        rects,
        vec![Rect::from_coords(0, 0, 100, 10), Rect::from_coords(0, 50, 100, 60)]
    );
    for shape in tree.values() {
        let shape = shape.borrow();
        assert_eq!(shape.net(), Some(vdd));
        assert!(shape.obstruction().contains(&shape.rect()));
    }
    assert_eq!(block.net(vdd).unwrap().bterms().len(), 1);
}

#[test]
fn grid_shapes_are_cut_around_blockages() {
    let tech = setup_tech();
    let (block, vdd, _) = setup_block();
    let m1 = layer(&tech, "m1");

    let straps = GridComponent::new(GridComponentType::Strap, "core");
    let kept = straps.add_shape(Shape::new(
        &tech,
        m1,
        Some(vdd),
        Rect::from_coords(0, 100, 200, 110),
        WireShapeType::Stripe,
    ));
    straps.add_shape(Shape::new(
        &tech,
        m1,
        Some(vdd),
        Rect::from_coords(0, 0, 200, 10),
        WireShapeType::Stripe,
    ));
    assert_eq!(kept.borrow().display_text(&tech, &block), "VDD:m1:Strap:core");

    let mut obstructions = ShapeTreeMap::new();
    obstructions
        .entry(m1)
        .or_default()
        .insert_obstruction(Rc::new(RefCell::new(Shape::new_obstruction(
            Some(m1),
            Rect::from_coords(80, -20, 120, 20),
            ShapeType::BlockObs,
        ))));

    assert_eq!(straps.cut_shapes(&obstructions, None, &tech), 1);
    assert_eq!(straps.shape_count(), 3);
    let shapes = straps.shapes();
    let tree = &shapes[&m1];
    assert!(tree.contains(&kept));
    let mut pieces: Vec<Rect> = tree
        .values()
        .filter(|shape| !Rc::ptr_eq(shape, &kept))
        .map(|shape| shape.borrow().rect())
        .collect();
    pieces.sort();
    assert_eq!(
        pieces,
        vec![Rect::from_coords(0, 0, 80, 10), Rect::from_coords(120, 0, 200, 10)]
    );
}

#[test]
fn microns_follow_database_units() {
    let tech = setup_tech();
    assert_float_eq!(tech.to_microns(1500), 1.5, abs <= 1e-12);
    assert_float_eq!(tech.to_microns(-5), -0.005, abs <= 1e-12);
    assert_eq!(
        pdn::shape::rect_text(&Rect::from_coords(-5, 0, 105, 10), tech.dbu_per_micron()),
        "(-0.0050, 0.0000) - (0.1050, 0.0100)"
    );
}
