use std::rc::Rc;

use pdn::via::db::DbVia;
use pdn::via::generator::ViaGenerator;
use pdn::{Connect, ConnectConfig};
use pdngeom::Rect;

mod common;
use common::{drawn_rects, layer, setup_block, setup_tech, stripe, via_count};

fn m2m3<'a>(tech: &'a pdn::Tech, width: i64) -> ViaGenerator<'a> {
    let rule = tech
        .via_rules()
        .iter()
        .find(|rule| rule.name.as_str() == "M2M3_GEN")
        .unwrap();
    ViaGenerator::from_rule(
        tech,
        rule,
        Rect::from_coords(0, -100, width, 100),
        Rect::from_coords(-100, 0, 100, width),
    )
}

#[test]
fn array_spacing_groups_cuts() {
    let tech = setup_tech();
    let mut via = m2m3(&tech, 60);
    via.determine_rows_and_columns(false, false);

    assert!(via.is_cut_array());
    assert_eq!((via.core_rows(), via.core_columns()), (3, 3));
    assert_eq!((via.array_cores_x(), via.array_cores_y()), (2, 2));
    assert_eq!((via.end_rows(), via.end_columns()), (0, 0));
    assert_eq!(via.array_spacing_x(), 10);
    assert_eq!(via.total_cuts(), 36);
    assert!(via.check_constraints());
    assert!(matches!(via.generate(), DbVia::Array(_)));
}

#[test]
fn array_spacing_adds_end_groups() {
    let tech = setup_tech();
    let mut via = m2m3(&tech, 70);
    via.determine_rows_and_columns(false, false);

    assert_eq!((via.array_cores_x(), via.array_cores_y()), (2, 2));
    assert_eq!((via.end_rows(), via.end_columns()), (1, 1));
    assert_eq!((via.rows(), via.columns()), (7, 7));
    assert_eq!(via.total_cuts(), 49);
}

#[test]
fn small_arrays_are_not_grouped() {
    let tech = setup_tech();
    let mut via = m2m3(&tech, 20);
    via.determine_rows_and_columns(false, false);
    assert!(!via.is_cut_array());
    assert_eq!((via.rows(), via.columns()), (2, 2));
}

#[test]
fn split_cuts_are_never_grouped() {
    let tech = setup_tech();
    let mut via = m2m3(&tech, 60);
    via.set_split_cut_array(false, true);
    via.determine_rows_and_columns(false, false);
    assert!(via.is_split_cut_array());
    assert!(!via.is_cut_array());
    assert_eq!((via.rows(), via.columns()), (7, 7));
    assert!(matches!(via.generate(), DbVia::SplitCut(_)));
}

#[test]
fn array_via_is_patched_when_written() {
    let tech = setup_tech();
    let (mut block, vdd, wire) = setup_block();
    let connect = Rc::new(Connect::new(&tech, "m2", "m3", ConnectConfig::default()).unwrap());

    let lower = stripe(&tech, "m2", Some(vdd), Rect::from_coords(0, -100, 60, 100));
    let upper = stripe(&tech, "m3", Some(vdd), Rect::from_coords(-100, 0, 100, 60));
    let via = connect.make_via(Some(vdd), &lower, &upper).unwrap();
    via.borrow().write_to_db(&mut block, wire, &tech).unwrap();

    assert_eq!(via_count(&block, vdd), 4);
    assert_eq!(block.via_count(), 1);
    let patch = vec![Rect::from_coords(3, 3, 57, 57)];
    assert_eq!(drawn_rects(&block, vdd, layer(&tech, "m2")), patch);
    assert_eq!(drawn_rects(&block, vdd, layer(&tech, "m3")), patch);
}

#[test]
fn array_via_with_end_groups_is_written() {
    let tech = setup_tech();
    let (mut block, vdd, wire) = setup_block();
    let connect = Connect::new(&tech, "m2", "m3", ConnectConfig::default()).unwrap();
    let via = connect.make_db_via(
        &tech,
        Rect::from_coords(0, -100, 70, 100),
        Rect::from_coords(-100, 0, 100, 70),
    );
    assert!(matches!(via, DbVia::Array(_)));
    pdn::via::db::GenerateVia::generate(&via, &mut block, wire, Default::default(), 35, 35)
        .unwrap();
    assert_eq!(via_count(&block, vdd), 9);
    assert_eq!(block.via_count(), 4);
}

#[test]
fn grouped_arrays_respect_max_rows_and_columns() {
    let tech = setup_tech();
    let mut via = m2m3(&tech, 60);
    via.set_max_rows(5);
    via.set_max_columns(5);
    via.determine_rows_and_columns(false, false);

    assert!(via.is_cut_array());
    assert_eq!((via.array_cores_x(), via.array_cores_y()), (1, 1));
    assert_eq!((via.end_rows(), via.end_columns()), (2, 2));
    assert_eq!((via.rows(), via.columns()), (5, 5));
    assert_eq!(via.total_cuts(), 25);
    assert!(via.check_constraints());
}

#[test]
fn max_rows_limit_applies_through_config() {
    let tech = setup_tech();
    let config = ConnectConfig::from_toml("max_rows = 1\nmax_columns = 1").unwrap();
    let connect = Connect::new(&tech, "m2", "m3", config).unwrap();
    let (m2, m3) = (layer(&tech, "m2"), layer(&tech, "m3"));
    let mut generators = connect.generators(
        &tech,
        Rect::from_coords(0, -100, 60, 100),
        Rect::from_coords(-100, 0, 100, 60),
        m2,
        m3,
    );
    assert_eq!(generators.len(), 1);
    let via = &mut generators[0];
    via.determine_rows_and_columns(false, false);
    assert_eq!(via.total_cuts(), 1);
    assert!(!via.is_cut_array());
}
