use fabric_common::db::core::DeviceDb;
use fabric_common::db::delay::Delay;
use fabric_common::util::config::LookaheadConfig;
use fabric_common::util::generator::{GridLayout, generate_grid_device};
use fabric_common::util::hash::ContentHash;
use fabric_common::util::logger;
use fabric_router::{DeviceGraph, Lookahead, RoutingGraph};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn grid(layout: &GridLayout) -> DeviceDb {
    logger::try_init();
    generate_grid_device(layout)
}

fn build(db: &DeviceDb, config: &LookaheadConfig) -> Lookahead {
    let graph = DeviceGraph::new(db).unwrap();
    let mut rng = StdRng::seed_from_u64(config.seed);
    Lookahead::build(&graph, config, &mut rng).unwrap()
}

fn estimate(db: &DeviceDb, lookahead: &Lookahead, src: &str, dst: &str) -> Option<Delay> {
    let graph = DeviceGraph::new(db).unwrap();
    let src = db.find_wire(src).unwrap();
    let dst = db.find_wire(dst).unwrap();
    lookahead.estimate_delay(&graph, src, dst)
}

#[test]
fn driver_to_sink_three_tiles_away() {
    let db = grid(&GridLayout::new(5, 5, Delay::new(1)));
    let lookahead = build(&db, &LookaheadConfig::default());

    assert_eq!(
        estimate(&db, &lookahead, "X_X1Y2/O", "B_X4Y2/I"),
        Some(Delay::new(3))
    );
}

#[test]
fn estimates_track_manhattan_distance() {
    let db = grid(&GridLayout::new(5, 5, Delay::new(1)));
    let lookahead = build(&db, &LookaheadConfig::default());

    for sy in 0..5 {
        for dy in 0..5 {
            let src = format!("X_X1Y{}/O", sy);
            let dst = format!("B_X4Y{}/I", dy);
            let d = estimate(&db, &lookahead, &src, &dst).unwrap();
            let manhattan = 3 + (sy - dy as i32).unsigned_abs();
            assert!(
                d.ps() >= manhattan && d.ps() <= manhattan + 1,
                "{} -> {}: {:?}",
                src,
                dst,
                d
            );
        }
    }
}

#[test]
fn same_wire_costs_nothing() {
    let db = grid(&GridLayout::new(5, 5, Delay::new(1)));
    let lookahead = build(&db, &LookaheadConfig::default());
    for name in ["X_X1Y0/O", "G_X2Y3/R", "B_X4Y4/I", "G_X0Y0/FEED"] {
        assert_eq!(estimate(&db, &lookahead, name, name), Some(Delay::ZERO));
    }
}

#[test]
fn pass_through_wire_follows_its_chain() {
    let db = grid(&GridLayout::new(5, 5, Delay::new(1)));
    let lookahead = build(&db, &LookaheadConfig::default());
    assert!(estimate(&db, &lookahead, "G_X2Y2/FEED", "B_X4Y2/I").is_some());
    assert_eq!(
        estimate(&db, &lookahead, "G_X2Y2/FEED", "G_X2Y2/R"),
        Some(Delay::ZERO)
    );
}

#[test]
fn dead_end_source_is_unreachable() {
    let db = grid(&GridLayout::new(5, 5, Delay::new(1)));
    let lookahead = build(&db, &LookaheadConfig::default());
    assert_eq!(estimate(&db, &lookahead, "B_X4Y1/I", "X_X1Y1/O"), None);
}

#[test]
fn disconnected_islands_are_unreachable() {
    let mut layout = GridLayout::new(5, 5, Delay::new(1));
    layout.cut_after_column = Some(2);
    let db = grid(&layout);
    let lookahead = build(&db, &LookaheadConfig::default());

    assert_eq!(estimate(&db, &lookahead, "X_X1Y2/O", "B_X4Y2/I"), None);
    assert_eq!(estimate(&db, &lookahead, "X_X1Y0/O", "B_X4Y4/I"), None);
}

#[test]
fn long_wires_shortcut_driver_to_sink() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("lookahead.csv");
    let mut layout = GridLayout::new(5, 5, Delay::new(1));
    layout.long_wire_span = Some(3);
    let db = grid(&layout);
    let config = LookaheadConfig {
        csv_dump: Some(csv.to_str().unwrap().to_string()),
        ..LookaheadConfig::default()
    };
    let lookahead = build(&db, &config);

    // R -> LE, then the node lands on the sink column's R
    for y in 0..5 {
        let src = format!("X_X1Y{}/O", y);
        let dst = format!("B_X4Y{}/I", y);
        assert_eq!(estimate(&db, &lookahead, &src, &dst), Some(Delay::new(1)));
    }

    // the node sits at its west end, in the driver's own tile
    let text = std::fs::read_to_string(&csv).unwrap();
    assert!(text.lines().any(|l| l == "X,R,X,LE,0,0,1"));
    assert!(text.lines().any(|l| l == "X,R,B,R,3,0,1"));

    let serial = build(
        &db,
        &LookaheadConfig {
            parallel: false,
            ..LookaheadConfig::default()
        },
    );
    let hash = db.content_hash().unwrap();
    assert_eq!(
        lookahead.to_bytes(hash).unwrap(),
        serial.to_bytes(hash).unwrap()
    );
}

#[test]
fn csv_dump_lists_driver_and_sink_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("lookahead.csv");
    let db = grid(&GridLayout::new(5, 5, Delay::new(1)));
    let config = LookaheadConfig {
        csv_dump: Some(csv.to_str().unwrap().to_string()),
        ..LookaheadConfig::default()
    };
    build(&db, &config);

    let text = std::fs::read_to_string(&csv).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("src_type,src_wire,dest_type,dest_wire,delta_x,delta_y,delay")
    );
    let rows: Vec<Vec<&str>> = lines.map(|l| l.split(',').collect()).collect();
    assert!(rows.iter().all(|r| r.len() == 7));
    assert!(rows.iter().any(|r| r[0] == "X" && r[2] == "G"));
    assert!(rows.iter().any(|r| r[0] == "G" && r[2] == "B"));
    assert!(
        rows.iter()
            .any(|r| r[..6] == ["X", "R", "B", "R", "3", "0"] && r[6] == "3")
    );
}

#[test]
fn serial_and_parallel_builds_match() {
    let db = grid(&GridLayout::new(6, 5, Delay::new(2)));
    let hash = db.content_hash().unwrap();
    let parallel = build(&db, &LookaheadConfig::default());
    let serial = build(
        &db,
        &LookaheadConfig {
            parallel: false,
            ..LookaheadConfig::default()
        },
    );
    assert_eq!(
        parallel.to_bytes(hash).unwrap(),
        serial.to_bytes(hash).unwrap()
    );
}

#[test]
fn snapshot_round_trip_preserves_estimates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("device.lookahead");
    let db = grid(&GridLayout::new(5, 5, Delay::new(1)));
    let graph = DeviceGraph::new(&db).unwrap();
    let lookahead = build(&db, &LookaheadConfig::default());

    lookahead.write(&path, graph.database_hash()).unwrap();
    let restored = Lookahead::read(&path, graph.database_hash())
        .unwrap()
        .expect("snapshot should match its own database");

    assert_eq!(restored.cost_map().len(), lookahead.cost_map().len());
    for (src, dst) in [
        ("X_X1Y2/O", "B_X4Y2/I"),
        ("X_X1Y0/O", "B_X4Y3/I"),
        ("G_X2Y2/FEED", "B_X4Y1/I"),
    ] {
        assert_eq!(
            estimate(&db, &restored, src, dst),
            estimate(&db, &lookahead, src, dst)
        );
    }
}

#[test]
fn snapshot_for_another_database_is_a_miss() {
    let db = grid(&GridLayout::new(5, 5, Delay::new(1)));
    let graph = DeviceGraph::new(&db).unwrap();
    let bytes = build(&db, &LookaheadConfig::default())
        .to_bytes(graph.database_hash())
        .unwrap();

    assert!(Lookahead::from_bytes(&bytes, graph.database_hash()).is_some());
    let other = ContentHash::from_bytes(b"some other device");
    assert!(Lookahead::from_bytes(&bytes, other).is_none());
    assert!(Lookahead::from_bytes(&bytes[..bytes.len() / 2], graph.database_hash()).is_none());
    assert!(Lookahead::from_bytes(&[], graph.database_hash()).is_none());
}

#[test]
fn init_builds_once_then_loads() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("device.lookahead");
    let db = grid(&GridLayout::new(5, 5, Delay::new(1)));
    let graph = DeviceGraph::new(&db).unwrap();
    let config = LookaheadConfig::default();

    let mut rng = StdRng::seed_from_u64(1);
    let built = Lookahead::init(&graph, &config, &cache, &mut rng).unwrap();
    assert!(cache.exists());

    let mut rng = StdRng::seed_from_u64(1);
    let loaded = Lookahead::init(&graph, &config, &cache, &mut rng).unwrap();
    let src = db.find_wire("X_X1Y2/O").unwrap();
    let dst = db.find_wire("B_X4Y2/I").unwrap();
    assert_eq!(
        loaded.estimate_delay(&graph, src, dst),
        built.estimate_delay(&graph, src, dst)
    );
}

#[test]
fn init_without_write_leaves_no_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("device.lookahead");
    let db = grid(&GridLayout::new(4, 3, Delay::new(1)));
    let graph = DeviceGraph::new(&db).unwrap();
    let config = LookaheadConfig {
        write_cache: false,
        ..LookaheadConfig::default()
    };

    let mut rng = StdRng::seed_from_u64(1);
    Lookahead::init(&graph, &config, &cache, &mut rng).unwrap();
    assert!(!cache.exists());
}
