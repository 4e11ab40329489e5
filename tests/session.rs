use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use geo_types::{Geometry, Point, polygon};

use mapfilter::{
    ApplicationCoordinator, Crs, Evaluator, Feature, FilterConfig, GeometryKind,
    LocalEvaluationSink, Operand, OperatorSpec, QueryPayload, RemoteQuerySink, Reproject, Shape,
    SinkId, WebMercator, serialize_text,
};

struct Session {
    coordinator: ApplicationCoordinator,
    local: SinkId,
    tiles: SinkId,
    reprojector: Arc<dyn Reproject>,
}

fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
    Geometry::Polygon(polygon![
        (x: x0, y: y0), (x: x0 + size, y: y0), (x: x0 + size, y: y0 + size), (x: x0, y: y0 + size)
    ])
}

fn session() -> Session {
    let reprojector: Arc<dyn Reproject> = Arc::new(WebMercator);
    let mut coordinator = ApplicationCoordinator::new(Crs::wgs84(), reprojector.clone());
    let features = vec![
        Feature::new("small", square(4.0, 4.0, 1.0), Crs::wgs84()),
        Feature::new("large", square(-20.0, -20.0, 60.0), Crs::wgs84()),
        Feature::new("away", Geometry::Point(Point::new(100.0, 60.0)), Crs::wgs84()),
    ];
    let local = coordinator.add_sink(LocalEvaluationSink::new("local", features, reprojector.clone()));
    let tiles = coordinator.add_sink(RemoteQuerySink::text(
        "tiles",
        &FilterConfig::default(),
        reprojector.clone(),
    ));
    Session {
        coordinator,
        local,
        tiles,
        reprojector,
    }
}

impl Session {
    fn local(&self) -> &LocalEvaluationSink {
        self.coordinator.sink(self.local).unwrap()
    }

    fn tiles(&self) -> &RemoteQuerySink {
        self.coordinator.sink(self.tiles).unwrap()
    }

    fn evaluate(&self, geometry: Geometry<f64>) -> bool {
        let evaluator = Evaluator::new(self.reprojector.as_ref());
        evaluator
            .evaluate(self.coordinator.tree(), &Feature::new("probe", geometry, Crs::wgs84()))
            .unwrap()
    }
}

#[test]
fn test_point_intersects() {
    let mut s = session();
    let spec = OperatorSpec::new(GeometryKind::Point, Operand::Intersects, None).unwrap();
    let ctrl = s.coordinator.add_operator(spec).unwrap();
    ctrl.finish_draw(Shape::point(1.0, 1.0, Crs::wgs84()).unwrap(), || {}).unwrap();
    assert!(s.coordinator.drain().is_empty());

    let tree = s.coordinator.tree();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.groups().next().unwrap().predicates().len(), 1);

    assert!(s.evaluate(square(0.0, 0.0, 2.0)));
    assert!(!s.evaluate(square(5.0, 5.0, 2.0)));
    assert_eq!(s.local().visible_ids(), vec!["large"]);
}

#[test]
fn test_point_distance_within_serializes_dwithin() {
    let mut s = session();
    let spec = OperatorSpec::parse("point", "dwithin", None).unwrap();
    assert_eq!(spec.distance, Some(500_000.0));
    let ctrl = s.coordinator.add_operator(spec).unwrap();
    ctrl.finish_draw(Shape::point(-100.0, 40.0, Crs::wgs84()).unwrap(), || {}).unwrap();
    s.coordinator.drain();

    let cql = serialize_text(
        s.coordinator.tree(),
        &FilterConfig::default().query_options(),
        s.reprojector.as_ref(),
    )
    .unwrap()
    .unwrap();
    assert!(cql.contains("DWITHIN(the_geom, POINT(-100 40), 500000, meters)"));
    assert_eq!(s.tiles().tile_params().get("CQL_FILTER"), Some(&cql));
}

#[test]
fn test_within_or_contains() {
    let mut s = session();
    let within = OperatorSpec::new(GeometryKind::Polygon, Operand::Within, None).unwrap();
    let contains = OperatorSpec::new(GeometryKind::Polygon, Operand::Contains, None).unwrap();

    let a = s.coordinator.add_operator(within).unwrap();
    let b = s.coordinator.add_operator(contains).unwrap();
    a.finish_draw(Shape::new(square(0.0, 0.0, 10.0), Crs::wgs84()).unwrap(), || {})
        .unwrap();
    b.finish_draw(Shape::new(square(30.0, 30.0, 1.0), Crs::wgs84()).unwrap(), || {})
        .unwrap();
    s.coordinator.drain();
    assert_eq!(s.coordinator.tree().len(), 2);

    // inside the first shape only
    assert!(s.evaluate(square(4.0, 4.0, 1.0)));
    // encloses the second shape only
    assert!(s.evaluate(square(25.0, 25.0, 10.0)));
    // neither
    assert!(!s.evaluate(square(50.0, 50.0, 1.0)));

    assert_eq!(s.local().visible_ids(), vec!["small", "large"]);
    let cql = s.tiles().tile_params()["CQL_FILTER"].clone();
    assert!(cql.starts_with("(WITHIN(the_geom, POLYGON("));
    assert!(cql.contains(") OR (CONTAINS(the_geom, POLYGON("));
}

#[test]
fn test_clear_removes_every_handle_once() {
    let mut s = session();
    let removals = Arc::new(AtomicUsize::new(0));
    let spec = OperatorSpec::new(GeometryKind::Point, Operand::Intersects, None).unwrap();

    for x in [1.0, 2.0] {
        let ctrl = s.coordinator.add_operator(spec).unwrap();
        let counter = removals.clone();
        ctrl.finish_draw(Shape::point(x, x, Crs::wgs84()).unwrap(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    s.coordinator.drain();
    assert_eq!(s.coordinator.tree().len(), 2);

    assert!(s.coordinator.clear().is_empty());
    s.coordinator.drain();

    assert!(s.coordinator.tree().is_empty());
    assert_eq!(removals.load(Ordering::SeqCst), 2);
    assert!(s.evaluate(square(500.0, 500.0, 1.0)));
    assert_eq!(s.local().visible(), &[true, true, true]);
    assert_eq!(s.tiles().last_payload(), Some(&QueryPayload::Text(None)));
    assert!(!s.tiles().tile_params().contains_key("CQL_FILTER"));
}

#[test]
fn test_clear_before_drain_removes_pending_shape() {
    let mut s = session();
    let removals = Arc::new(AtomicUsize::new(0));
    let spec = OperatorSpec::new(GeometryKind::Point, Operand::Intersects, None).unwrap();
    let ctrl = s.coordinator.add_operator(spec).unwrap();
    let counter = removals.clone();
    let handle = ctrl
        .finish_draw(Shape::point(4.5, 4.5, Crs::wgs84()).unwrap(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(s.coordinator.clear().is_empty());
    s.coordinator.drain();

    assert!(s.coordinator.tree().is_empty());
    assert_eq!(removals.load(Ordering::SeqCst), 1);
    assert!(handle.is_removed());
    assert_eq!(s.local().visible_ids(), vec!["small", "large", "away"]);
    assert_eq!(s.tiles().last_payload(), Some(&QueryPayload::Text(None)));
}

#[test]
fn test_translate_cadence() {
    let mut s = session();
    let spec = OperatorSpec::new(GeometryKind::Point, Operand::Intersects, None).unwrap();
    let ctrl = s.coordinator.add_operator(spec).unwrap();
    ctrl.finish_draw(Shape::point(1.0, 1.0, Crs::wgs84()).unwrap(), || {}).unwrap();
    s.coordinator.drain();
    let local_before = s.local().applications();
    let tiles_before = s.tiles().applications();

    ctrl.start_translate().unwrap();
    for step in 0..5 {
        ctrl.translate(Shape::point(1.0 + step as f64, 1.0, Crs::wgs84()).unwrap())
            .unwrap();
    }
    ctrl.finish_translate(Shape::point(4.5, 4.5, Crs::wgs84()).unwrap()).unwrap();
    s.coordinator.drain();

    assert_eq!(s.local().applications() - local_before, 6);
    assert_eq!(s.tiles().applications() - tiles_before, 1);
    assert_eq!(
        s.tiles().tile_params()["CQL_FILTER"],
        "(INTERSECTS(the_geom, POINT(4.5 4.5)))"
    );
}

#[test]
fn test_intermediate_positions_filter_local_features_only() {
    let mut s = session();
    let spec = OperatorSpec::new(GeometryKind::Point, Operand::Intersects, None).unwrap();
    let ctrl = s.coordinator.add_operator(spec).unwrap();
    ctrl.finish_draw(Shape::point(-10.0, -10.0, Crs::wgs84()).unwrap(), || {}).unwrap();
    s.coordinator.drain();
    let live_query = s.tiles().last_payload().cloned();

    ctrl.start_translate().unwrap();
    ctrl.translate(Shape::point(4.5, 4.5, Crs::wgs84()).unwrap()).unwrap();
    s.coordinator.drain();

    assert_eq!(s.local().visible_ids(), vec!["small", "large"]);
    assert_eq!(s.tiles().last_payload().cloned(), live_query);
}

#[test]
fn test_removed_interaction_is_closed() {
    let mut s = session();
    let spec = OperatorSpec::new(GeometryKind::Point, Operand::Disjoint, None).unwrap();
    let ctrl = s.coordinator.add_operator(spec).unwrap();
    let handle = ctrl.finish_draw(Shape::point(4.5, 4.5, Crs::wgs84()).unwrap(), || {}).unwrap();
    s.coordinator.drain();
    assert_eq!(s.local().visible_ids(), vec!["away"]);

    handle.remove().unwrap();
    s.coordinator.drain();
    assert!(s.coordinator.tree().is_empty());
    assert!(ctrl.start_translate().is_err());
    assert!(handle.remove().is_err());
    assert_eq!(s.local().visible_ids(), vec!["small", "large", "away"]);
}

#[test]
fn test_structured_sink_follows_view_projection() {
    let reprojector: Arc<dyn Reproject> = Arc::new(WebMercator);
    let config = FilterConfig::default();
    let mut coordinator = ApplicationCoordinator::from_config(&config, reprojector.clone());
    let wfs = coordinator.add_sink(RemoteQuerySink::structured("wfs", &config, reprojector.clone()));
    let tiles = coordinator.add_sink(RemoteQuerySink::text("tiles", &config, reprojector));

    let center = WebMercator::forward((-100.0, 40.0).into());
    let spec = OperatorSpec::parse("point", "dwithin", Some(1000.0)).unwrap();
    let ctrl = coordinator.add_operator(spec).unwrap();
    ctrl.finish_draw(Shape::point(center.x, center.y, Crs::web_mercator()).unwrap(), || {})
        .unwrap();
    coordinator.drain();

    let tiles = coordinator.sink::<RemoteQuerySink>(tiles).unwrap();
    assert_eq!(
        tiles.tile_params()["CQL_FILTER"],
        "(DWITHIN(the_geom, POINT(-100 40), 1000, meters))"
    );

    let wfs = coordinator.sink::<RemoteQuerySink>(wfs).unwrap();
    let Some(QueryPayload::Document(Some(doc))) = wfs.last_payload() else {
        panic!("expected a query document");
    };
    let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
    assert_eq!(json["or"][0]["and"][0]["relation"]["srsName"], "EPSG:3857");
    assert!(wfs.request_body().contains("<ogc:DWithin>"));

    let overlays = coordinator.overlays();
    assert_eq!(overlays.len(), 1);
    let buffer = overlays[0].1.buffer.as_ref().unwrap();
    assert_eq!(buffer.exterior().0.len(), config.circle_segments + 1);
}
