use std::rc::Rc;

use pdn::via::db::{DbVia, GenerateVia};
use pdn::{Connect, ConnectConfig};
use pdngeom::{Point, Rect};

mod common;
use common::{drawn_rects, layer, setup_block, setup_tech, stripe, via_count};

#[test]
fn two_by_two_via() {
    let tech = setup_tech();
    let (mut block, vdd, wire) = setup_block();
    let connect = Rc::new(Connect::new(&tech, "m1", "m2", ConnectConfig::default()).unwrap());

    let lower = stripe(&tech, "m1", Some(vdd), Rect::from_coords(0, 0, 100, 20));
    let upper = stripe(&tech, "m2", Some(vdd), Rect::from_coords(40, -40, 60, 60));
    let via = connect.make_via(Some(vdd), &lower, &upper).unwrap();
    assert!(via.borrow().is_valid(&tech));

    via.borrow().write_to_db(&mut block, wire, &tech).unwrap();
    assert_eq!(via_count(&block, vdd), 1);
    assert!(block.find_via("M1M2_GEN_2x2_8_8_2_2_2_2").is_some());
    assert!(drawn_rects(&block, vdd, layer(&tech, "m1")).is_empty());
}

#[test]
fn narrow_metal_falls_back_to_minimum_enclosure() {
    let tech = setup_tech();
    let (mut block, _, wire) = setup_block();
    let connect = Connect::new(&tech, "m1", "m2", ConnectConfig::default()).unwrap();

    let via = connect.make_db_via(
        &tech,
        Rect::from_coords(0, 0, 100, 6),
        Rect::from_coords(40, -40, 60, 60),
    );
    assert!(matches!(via, DbVia::Generate(_)));
    let shapes = via
        .generate(&mut block, wire, Default::default(), 50, 3)
        .unwrap();
    assert!(block.find_via("M1M2_GEN_1x3_8_8_2_0_0_2").is_some());
    assert_eq!(
        shapes.bottom.into_iter().collect::<Vec<_>>(),
        vec![Rect::from_coords(38, 1, 62, 5)]
    );
}

#[test]
fn missing_minimum_cuts_gives_dummy_via() {
    let tech = setup_tech();
    let (mut block, vdd, wire) = setup_block();
    let connect = Connect::new(&tech, "m3", "m4", ConnectConfig::default()).unwrap();

    let via = connect.make_db_via(
        &tech,
        Rect::from_coords(0, 0, 100, 40),
        Rect::from_coords(40, 0, 48, 10),
    );
    assert!(matches!(via, DbVia::Dummy(_)));
    let shapes = via
        .generate(&mut block, wire, Default::default(), 44, 5)
        .unwrap();
    assert!(shapes.is_empty());
    assert_eq!(via_count(&block, vdd), 0);

    // Two cuts fit once the upper strap is long enough.
    let via = connect.make_db_via(
        &tech,
        Rect::from_coords(0, 0, 100, 40),
        Rect::from_coords(40, 0, 48, 40),
    );
    assert!(matches!(via, DbVia::Generate(_)));
}

#[test]
fn disjoint_shapes_give_dummy_via() {
    let tech = setup_tech();
    let connect = Connect::new(&tech, "m1", "m2", ConnectConfig::default()).unwrap();
    let via = connect.make_db_via(
        &tech,
        Rect::from_coords(0, 0, 100, 20),
        Rect::from_coords(200, -40, 220, 60),
    );
    assert!(matches!(via, DbVia::Dummy(_)));
}

#[test]
fn split_cuts_snap_to_tracks() {
    let tech = setup_tech();
    let (mut block, vdd, wire) = setup_block();
    let config = ConnectConfig::from_toml("split_cuts = { m1 = 20 }").unwrap();
    let connect = Connect::new(&tech, "m1", "m2", config).unwrap();

    let via = connect.make_db_via(
        &tech,
        Rect::from_coords(0, 0, 100, 60),
        Rect::from_coords(40, -40, 60, 100),
    );
    assert!(matches!(via, DbVia::SplitCut(_)));
    assert!(!via.requires_patch());

    let shapes = via
        .generate(&mut block, wire, Default::default(), 50, 30)
        .unwrap();
    assert_eq!(via_count(&block, vdd), 6);
    let centers: Vec<Point> = shapes.bottom.iter().map(|rect| rect.center()).collect();
    let mut ys: Vec<i64> = centers.iter().map(|p| p.y).collect();
    ys.sort();
    ys.dedup();
    assert_eq!(ys, vec![5, 25, 45]);
    assert!(centers.iter().all(|p| p.x == 46 || p.x == 54));
}

#[test]
fn stacked_via_patches_ongrid_layers() {
    let tech = setup_tech();
    let (mut block, vdd, wire) = setup_block();
    let config = ConnectConfig::from_toml(r#"ongrid = ["m2"]"#).unwrap();
    let connect = Connect::new(&tech, "m1", "m3", config).unwrap();

    let lower = Rect::from_coords(0, 0, 100, 20);
    let upper = Rect::from_coords(25, -10, 85, 30);
    let via = connect.make_db_via(&tech, lower, upper);
    let DbVia::Stacked(stacked) = &via else {
        panic!("expected a stacked via, got {via:?}");
    };
    assert_eq!(stacked.vias().len(), 2);

    let shapes = via
        .generate(&mut block, wire, Default::default(), 55, 10)
        .unwrap();
    assert_eq!(via_count(&block, vdd), 2);
    assert_eq!(
        drawn_rects(&block, vdd, layer(&tech, "m2")),
        vec![Rect::from_coords(22, 2, 83, 18)]
    );
    assert_eq!(
        shapes.bottom.into_iter().collect::<Vec<_>>(),
        vec![Rect::from_coords(27, 2, 83, 18)]
    );
    assert_eq!(
        shapes.top.into_iter().collect::<Vec<_>>(),
        vec![Rect::from_coords(22, 2, 78, 18)]
    );
}

#[test]
fn stacked_via_without_ongrid_layers_is_not_patched() {
    let tech = setup_tech();
    let (mut block, vdd, wire) = setup_block();
    let connect = Connect::new(&tech, "m1", "m3", ConnectConfig::default()).unwrap();
    let via = connect.make_db_via(
        &tech,
        Rect::from_coords(0, 0, 100, 20),
        Rect::from_coords(25, -10, 85, 30),
    );
    via.generate(&mut block, wire, Default::default(), 55, 10)
        .unwrap();
    assert_eq!(via_count(&block, vdd), 2);
    assert!(drawn_rects(&block, vdd, layer(&tech, "m2")).is_empty());
}

#[test]
fn via_generation_is_deterministic() {
    let tech = setup_tech();
    let (mut block, vdd, _) = setup_block();
    let connect = Connect::new(&tech, "m1", "m3", ConnectConfig::default()).unwrap();
    let lower = Rect::from_coords(0, 0, 100, 20);
    let upper = Rect::from_coords(25, -10, 85, 30);

    let first = connect.make_db_via(&tech, lower, upper);
    let second = connect.make_db_via(&tech, lower, upper);
    assert_eq!(first, second);

    let a = block.create_swire(vdd).unwrap();
    let b = block.create_swire(vdd).unwrap();
    let shapes_a = first.generate(&mut block, a, Default::default(), 55, 10).unwrap();
    let shapes_b = second.generate(&mut block, b, Default::default(), 55, 10).unwrap();
    assert_eq!(shapes_a, shapes_b);
    assert_eq!(
        block.swire(a).unwrap().boxes(),
        block.swire(b).unwrap().boxes()
    );
}
