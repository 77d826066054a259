//! City topology validation tests
//!
//! Tests the stock city layout, topology queries and infrastructure edits

use traffic_planner::simulation::{
    CityTopology, Heading, InfrastructureEdit, Junction, JunctionId, JunctionKind, Orientation,
    Position, Street, StreetId, LANE_EXPANSION_WIDTH, MAX_LANES,
};

fn crossing_topology(kind: JunctionKind) -> CityTopology {
    CityTopology::new(
        vec![
            Street {
                name: "Test Avenue".to_string(),
                origin: Position::new(100.0, 0.0),
                width: 80.0,
                height: 800.0,
                lane_count: 2,
                orientation: Orientation::Vertical,
            },
            Street {
                name: "Test Road".to_string(),
                origin: Position::new(0.0, 100.0),
                width: 900.0,
                height: 80.0,
                lane_count: 2,
                orientation: Orientation::Horizontal,
            },
        ],
        vec![Junction {
            name: "Test Crossing".to_string(),
            position: Position::new(140.0, 140.0),
            kind,
            has_signal: kind == JunctionKind::Signal,
        }],
        Vec::new(),
    )
}

#[test]
fn test_default_city_layout() {
    let city = CityTopology::default_city();
    assert_eq!(city.streets.len(), 8);
    assert_eq!(city.junctions.len(), 16);
    assert_eq!(city.obstacles.len(), 20);

    assert_eq!(city.streets_with(Orientation::Vertical).count(), 4);
    assert_eq!(city.streets_with(Orientation::Horizontal).count(), 4);
    assert_eq!(city.signal_junctions().count(), 9);

    city.validate().expect("Default city should be valid");
}

#[test]
fn test_lookup_by_name() {
    let city = CityTopology::default_city();
    assert_eq!(city.street_by_name("Main Street"), Some(StreetId(0)));
    assert_eq!(city.street_by_name("Central Avenue"), Some(StreetId(6)));
    assert_eq!(city.junction_by_name("Mango Junction"), Some(JunctionId(0)));
    assert_eq!(city.junction_by_name("Pear Crossing"), Some(JunctionId(15)));
    assert_eq!(city.street_by_name("Nowhere Lane"), None);

    let peach = city.junction(JunctionId(5)).unwrap();
    assert_eq!(peach.name, "Peach Junction");
    assert_eq!(peach.position, Position::new(340.0, 340.0));
    assert!(peach.is_signalised());
}

#[test]
fn test_street_lanes() {
    let city = CityTopology::default_city();
    let pine = city.street(StreetId(2)).unwrap();
    assert_eq!(pine.lane_count, 3);
    assert_eq!(pine.thickness(), 100.0);
    assert_eq!(pine.center_line(), 550.0);

    assert_eq!(pine.lane_at(&Position::new(510.0, 300.0)), 0);
    assert_eq!(pine.lane_at(&Position::new(550.0, 300.0)), 1);
    assert_eq!(pine.lane_at(&Position::new(590.0, 300.0)), 2);
    // Outside the band clamps to the nearest lane
    assert_eq!(pine.lane_at(&Position::new(650.0, 300.0)), 2);

    let center = pine.lane_center(1);
    assert!((center - 550.0).abs() < 1e-4);
}

#[test]
fn test_drivable_area() {
    let city = crossing_topology(JunctionKind::Signal);
    assert!(city.is_drivable(&Position::new(140.0, 400.0)));
    assert!(city.is_drivable(&Position::new(600.0, 140.0)));
    // Inside the band but on the curb
    assert!(!city.is_drivable(&Position::new(102.0, 400.0)));
    // Off every street
    assert!(!city.is_drivable(&Position::new(400.0, 400.0)));
    // Slightly beyond the canvas edge along the street is still drivable
    assert!(city.is_drivable(&Position::new(140.0, -10.0)));
    assert!(!city.is_drivable(&Position::new(140.0, -30.0)));
}

#[test]
fn test_street_lookup_by_position() {
    let city = crossing_topology(JunctionKind::Signal);
    let on_road = city.street_at(&Position::new(600.0, 140.0)).map(|(id, _)| id);
    assert_eq!(on_road, Some(StreetId(1)));
    // At the crossing the first listed street wins
    let (id, street) = city.street_at(&Position::new(140.0, 140.0)).unwrap();
    assert_eq!(id, StreetId(0));
    assert_eq!(street.name, "Test Avenue");
    let horizontal = city
        .street_at_oriented(&Position::new(140.0, 140.0), Orientation::Horizontal)
        .map(|(id, _)| id);
    assert_eq!(horizontal, Some(StreetId(1)));
    assert!(city.street_at(&Position::new(400.0, 400.0)).is_none());
}

#[test]
fn test_street_towards_junction() {
    let city = crossing_topology(JunctionKind::Signal);
    let crossing = Position::new(140.0, 140.0);
    for heading in Heading::ALL {
        assert!(city.has_street_towards(&crossing, heading));
    }

    let off_grid = Position::new(400.0, 400.0);
    assert!(!city.has_street_towards(&off_grid, Heading::Up));
}

#[test]
fn test_obstacle_margin() {
    let city = CityTopology::default_city();
    // Inside the first building
    assert!(city.hits_obstacle(&Position::new(50.0, 50.0), 0.0));
    // Just outside it, but within a bus-sized margin
    assert!(!city.hits_obstacle(&Position::new(85.0, 50.0), 0.0));
    assert!(city.hits_obstacle(&Position::new(85.0, 50.0), 10.0));
}

#[test]
fn test_lane_expansion_edit() {
    let mut city = CityTopology::default_city();
    let main = city.street_by_name("Main Street").unwrap();
    let before = city.street(main).unwrap().width;

    city.apply_edit(&InfrastructureEdit::SetLaneCount {
        street: main,
        lanes: 4,
    })
    .unwrap();
    let street = city.street(main).unwrap();
    assert_eq!(street.lane_count, 4);
    assert_eq!(street.width, before + 2.0 * LANE_EXPANSION_WIDTH);

    // Lane counts above the ceiling are clamped
    city.apply_edit(&InfrastructureEdit::SetLaneCount {
        street: main,
        lanes: 9,
    })
    .unwrap();
    let street = city.street(main).unwrap();
    assert_eq!(street.lane_count, MAX_LANES);
    assert_eq!(street.width, before + 3.0 * LANE_EXPANSION_WIDTH);
}

#[test]
fn test_junction_kind_edit() {
    let mut city = CityTopology::default_city();
    let mango = city.junction_by_name("Mango Junction").unwrap();

    city.apply_edit(&InfrastructureEdit::SetJunctionKind {
        junction: mango,
        kind: JunctionKind::Roundabout,
    })
    .unwrap();
    let junction = city.junction(mango).unwrap();
    assert_eq!(junction.kind, JunctionKind::Roundabout);
    assert!(!junction.has_signal);
    assert_eq!(city.signal_junctions().count(), 8);

    let apple = city.junction_by_name("Apple Crossing").unwrap();
    city.apply_edit(&InfrastructureEdit::SetJunctionKind {
        junction: apple,
        kind: JunctionKind::Signal,
    })
    .unwrap();
    assert!(city.junction(apple).unwrap().has_signal);
    assert_eq!(city.signal_junctions().count(), 9);
}

#[test]
fn test_edit_unknown_entity_fails() {
    let mut city = CityTopology::default_city();
    let result = city.apply_edit(&InfrastructureEdit::SetLaneCount {
        street: StreetId(42),
        lanes: 3,
    });
    assert!(result.is_err());

    let result = city.apply_edit(&InfrastructureEdit::SetJunctionKind {
        junction: JunctionId(99),
        kind: JunctionKind::Stop,
    });
    assert!(result.is_err());
}

#[test]
fn test_topology_json_loading() {
    let city = CityTopology::default_city();
    let json = serde_json::to_string(&city).unwrap();
    let loaded = CityTopology::from_json_str(&json).unwrap();
    assert_eq!(loaded, city);

    // A junction away from any crossing is rejected
    let mut broken = crossing_topology(JunctionKind::Stop);
    broken.junctions[0].position = Position::new(400.0, 400.0);
    let json = serde_json::to_string(&broken).unwrap();
    assert!(CityTopology::from_json_str(&json).is_err());

    assert!(CityTopology::from_json_str("{ not json").is_err());
}

#[test]
fn test_invalid_lane_count_rejected() {
    let mut city = crossing_topology(JunctionKind::Signal);
    city.streets[0].lane_count = 0;
    assert!(city.validate().is_err());

    city.streets[0].lane_count = MAX_LANES + 1;
    assert!(city.validate().is_err());
}
