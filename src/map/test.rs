use geo::{coord, Line, Rect};

use crate::geom::{Jumper, StreetKind, StreetSegment, Tile, TripLine};
use crate::map::{JumperIndex, MapData, MemoryMapData};

fn street(id: u64, start_node: u64, end_node: u64, length: f64, x0: f64, x1: f64) -> StreetSegment {
    StreetSegment::new(
        id,
        id,
        start_node,
        end_node,
        length,
        false,
        StreetKind::Residential,
        Line::new(coord! { x: x0, y: 0.0 }, coord! { x: x1, y: 0.0 }),
    )
}

fn chain(id: u64, start_node: u64, end_node: u64, length: f64) -> Jumper {
    Jumper {
        start_node,
        end_node,
        length,
        segments: vec![id],
    }
}

#[test]
fn trip_line_query_is_scoped_to_the_envelope() {
    let map = MemoryMapData::default();

    map.insert_trip_line(TripLine::from_endpoints(
        1,
        10,
        1,
        20.0,
        (0.0001, -0.001),
        (0.0001, 0.001),
    ));
    map.insert_trip_line(TripLine::from_endpoints(
        2,
        11,
        1,
        20.0,
        (5.0, -0.001),
        (5.0, 0.001),
    ));

    let near = Rect::new(coord! { x: 0.0, y: -0.01 }, coord! { x: 0.001, y: 0.01 });
    let lines = map.trip_lines(&near).unwrap();

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].id, 1);

    let everywhere = Rect::new(coord! { x: -10.0, y: -10.0 }, coord! { x: 10.0, y: 10.0 });
    assert_eq!(map.trip_lines(&everywhere).unwrap().len(), 2);
}

#[test]
fn street_lookup_by_id() {
    let map = MemoryMapData::default();
    map.insert_street_segment(street(7, 10, 11, 100.0, 0.0, 0.001));

    let found = map.street_segment(7).unwrap().expect("street indexed");
    assert_eq!(found.start_node, 10);
    assert_eq!(found.end_node, 11);

    assert!(map.street_segment(8).unwrap().is_none());
}

#[test]
fn short_streets_register_as_jumpers() {
    let map = MemoryMapData::default();

    // below the 60m minimum trackable length
    map.insert_street_segment(street(7, 10, 11, 40.0, 0.0, 0.0004));
    // long enough to carry its own trip lines
    map.insert_street_segment(street(8, 11, 12, 100.0, 0.0004, 0.0014));

    assert!(map.jumper(10, 11).unwrap().is_some());
    assert!(map.jumper(11, 12).unwrap().is_none());
}

#[test]
fn jumper_index_stitches_adjacent_chains() {
    let mut index = JumperIndex::new();

    index.insert(chain(1, 10, 11, 40.0));
    index.insert(chain(2, 11, 12, 30.0));

    let stitched = index.get(10, 12).expect("chains stitched on insert");
    assert_eq!(stitched.segments, vec![1, 2]);
    assert_eq!(stitched.length, 70.0);

    // the original chains survive alongside the merged one
    assert!(index.get(10, 11).is_some());
    assert!(index.get(11, 12).is_some());

    // a later chain extends the merged one too
    index.insert(chain(3, 12, 13, 20.0));
    let extended = index.get(10, 13).expect("merged chain extended");
    assert_eq!(extended.length, 90.0);
    assert_eq!(extended.segments, vec![1, 2, 3]);
}

#[test]
fn reversed_chains_do_not_stitch_into_loops() {
    let mut index = JumperIndex::new();

    index.insert(chain(1, 10, 11, 40.0));
    index.insert(chain(2, 11, 10, 40.0));

    assert!(index.get(10, 10).is_none());
    assert!(index.get(11, 11).is_none());
    assert_eq!(index.len(), 2);
}

#[test]
fn duplicate_chain_keys_are_ignored() {
    let mut index = JumperIndex::new();

    index.insert(chain(1, 10, 11, 40.0));
    index.insert(chain(9, 10, 11, 99.0));

    assert_eq!(index.len(), 1);
    assert_eq!(index.get(10, 11).unwrap().segments, vec![1]);
}

#[test]
fn tile_residency_gates_reflect_marks() {
    let map = MemoryMapData::default();
    let tile = Tile { x: 1024, y: 1024 };

    assert!(!map.tile_loaded(&tile));
    assert!(!map.loading_in_flight());

    map.set_loading(true);
    assert!(map.loading_in_flight());

    map.mark_tile_loaded(tile);
    assert!(map.tile_loaded(&tile));
    // other loads may still be in flight
    assert!(map.loading_in_flight());
}

#[test]
fn zone_offset_is_constant_for_memory_maps() {
    let map = MemoryMapData::new(3_600_000, 60.0);
    assert_eq!(map.zone_offset(0.0, 0.0).unwrap(), 3_600_000);
}
