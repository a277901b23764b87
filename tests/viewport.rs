use geocluster::{
    ClusterConfig, ClusterManager, ClusterManagerBuilder, CountKind, LatLngBounds, Marker,
    MarkerOptions, StaticViewport,
};
use std::time::{Duration, Instant};

const DEBOUNCE: Duration = Duration::from_millis(100);

fn orange_county(zoom: u32) -> StaticViewport {
    StaticViewport::new(zoom, LatLngBounds::new(33.0, -118.5, 34.5, -117.0))
}

fn crime() -> MarkerOptions {
    MarkerOptions::new().category("crime")
}

/// A cluster of three near Santa Ana plus a lone marker further east.
fn populated(viewport: StaticViewport) -> ClusterManager<StaticViewport> {
    let _ = env_logger::builder().is_test(true).try_init();
    ClusterManagerBuilder::new()
        .markers(
            [
                Marker::new(33.7510, -117.8505),
                Marker::new(33.7520, -117.8510),
                Marker::new(33.7530, -117.8520),
                Marker::new(34.2000, -117.2000),
            ],
            crime(),
        )
        .build(viewport)
        .expect("Failed to build manager")
}

#[test]
fn test_update_markers_is_idempotent() {
    let mut manager = populated(orange_county(8));
    assert_eq!(manager.count("crime", CountKind::Visible), 2);
    assert!(!manager.drain_render_changes().is_empty());

    manager.update_markers();
    assert!(manager.drain_render_changes().is_empty());
    assert_eq!(manager.count("crime", CountKind::Visible), 2);
    assert_eq!(manager.count("crime", CountKind::Cluster), 1);
}

#[test]
fn test_panning_away_unrenders_after_debounce() {
    let start = Instant::now();
    let mut manager = populated(orange_county(8));
    manager.on_attached(start);
    manager.drain_render_changes();

    manager.viewport_mut().pan_to(-33.86, 151.21);
    manager.on_center_changed(start);
    assert_eq!(manager.next_deadline(), Some(start + DEBOUNCE));
    assert!(!manager.poll(start + Duration::from_millis(99)));
    assert_eq!(manager.count("crime", CountKind::Visible), 2);

    assert!(manager.poll(start + DEBOUNCE));
    assert_eq!(manager.count("crime", CountKind::Visible), 0);
    assert_eq!(manager.drain_render_changes().len(), 2);
    assert!(manager.next_deadline().is_none());

    manager.viewport_mut().pan_to(33.75, -117.75);
    manager.on_center_changed(start + Duration::from_secs(1));
    assert!(manager.poll(start + Duration::from_secs(1) + DEBOUNCE));
    assert_eq!(manager.count("crime", CountKind::Visible), 2);
}

#[test]
fn test_padding_keeps_nearby_markers() {
    let near_edge = Marker::new(33.75, -116.0);

    let mut padded = populated(orange_county(8));
    let id = padded.add_marker(near_edge.clone(), crime()).unwrap();
    padded.recluster(None);
    assert!(padded.marker(id).unwrap().is_rendered());

    let mut tight = ClusterManagerBuilder::new()
        .config(ClusterConfig::default().with_padding(0.0))
        .build(orange_county(8))
        .unwrap();
    let id = tight.add_marker(near_edge, crime()).unwrap();
    tight.recluster(None);
    assert!(!tight.marker(id).unwrap().is_rendered());
    assert!(!tight.meta(id).unwrap().visible);
}

#[test]
fn test_drag_suppresses_reconcile() {
    let start = Instant::now();
    let mut manager = populated(orange_county(8));
    manager.on_attached(start);

    manager.on_center_changed(start);
    assert!(manager.next_deadline().is_some());
    manager.on_drag_start();
    assert!(manager.next_deadline().is_none());

    manager.viewport_mut().pan_to(-33.86, 151.21);
    manager.on_center_changed(start + Duration::from_millis(10));
    assert!(manager.next_deadline().is_none());
    assert!(!manager.poll(start + Duration::from_secs(1)));
    assert_eq!(manager.count("crime", CountKind::Visible), 2);

    let released = start + Duration::from_secs(2);
    manager.on_drag_end(released);
    assert_eq!(manager.next_deadline(), Some(released + DEBOUNCE));
    assert!(manager.poll(released + DEBOUNCE));
    assert_eq!(manager.count("crime", CountKind::Visible), 0);
}

#[test]
fn test_rapid_moves_supersede_each_other() {
    let start = Instant::now();
    let mut manager = populated(orange_county(8));
    manager.on_attached(start);

    manager.on_center_changed(start);
    manager.on_center_changed(start + Duration::from_millis(80));
    assert_eq!(
        manager.next_deadline(),
        Some(start + Duration::from_millis(180))
    );
    assert!(!manager.poll(start + Duration::from_millis(150)));
    assert!(manager.poll(start + Duration::from_millis(180)));
    assert!(!manager.poll(start + Duration::from_millis(400)));
}

#[test]
fn test_zoom_change_switches_precision_immediately() {
    let start = Instant::now();
    let mut manager = populated(orange_county(8));
    manager.on_attached(start);
    assert_eq!(manager.precision(), 10);

    manager.viewport_mut().set_zoom(10);
    manager.on_zoom_changed(start);
    assert_eq!(manager.precision(), 12);
    assert!(manager.index().has_level(12));
    assert!(manager.next_deadline().is_none());
    assert_eq!(manager.count("crime", CountKind::Cluster), 1);
    assert_eq!(manager.count("crime", CountKind::Visible), 2);

    let late = manager
        .add_marker(Marker::new(33.7515, -117.8507), crime())
        .unwrap();
    assert!(manager.index().key_of(late, 10).is_some());
    assert!(manager.index().key_of(late, 12).is_some());

    manager.viewport_mut().set_zoom(8);
    manager.on_zoom_changed(start);
    assert_eq!(manager.precision(), 10);
    assert_eq!(manager.index().stats(10).member_count, 5);
    assert_eq!(manager.count("crime", CountKind::Cluster), 1);
}

#[test]
fn test_same_precision_zoom_debounces() {
    let start = Instant::now();
    let mut manager = ClusterManagerBuilder::new()
        .zoom_to_precision(|zoom| if zoom < 10 { 10 } else { 12 })
        .build(orange_county(8))
        .unwrap();
    manager.on_attached(start);

    manager.viewport_mut().set_zoom(9);
    manager.on_zoom_changed(start);
    assert_eq!(manager.precision(), 10);
    assert_eq!(manager.next_deadline(), Some(start + DEBOUNCE));
}

#[test]
fn test_requests_before_attach_are_deferred() {
    let start = Instant::now();
    let mut manager = populated(orange_county(8));
    assert!(!manager.is_attached());

    manager.hide(Some("crime"), None, start);
    assert!(manager.next_deadline().is_none());
    assert!(!manager.poll(start + Duration::from_secs(1)));
    assert_eq!(manager.count("crime", CountKind::Visible), 2);

    let attached = start + Duration::from_secs(2);
    manager.on_attached(attached);
    assert_eq!(manager.next_deadline(), Some(attached + DEBOUNCE));
    assert!(manager.poll(attached + DEBOUNCE));
    assert_eq!(manager.count("crime", CountKind::Visible), 0);
}

#[test]
fn test_unready_viewport_renders_nothing() {
    let mut manager = populated(StaticViewport::unready(8));
    assert_eq!(manager.count("crime", CountKind::Total), 4);
    assert_eq!(manager.count("crime", CountKind::Cluster), 1);
    assert_eq!(manager.count("crime", CountKind::Visible), 0);

    manager
        .viewport_mut()
        .set_bounds(LatLngBounds::new(33.0, -118.5, 34.5, -117.0));
    manager.update_markers();
    assert_eq!(manager.count("crime", CountKind::Visible), 2);
}

#[test]
fn test_viewport_across_antimeridian() {
    let viewport = StaticViewport::new(8, LatLngBounds::new(-5.0, 175.0, 5.0, -175.0));
    let mut manager = ClusterManager::new(viewport).unwrap();
    let east = manager.add_marker(Marker::new(0.0, 179.0), crime()).unwrap();
    let west = manager.add_marker(Marker::new(0.0, -179.0), crime()).unwrap();
    let far = manager.add_marker(Marker::new(0.0, 0.0), crime()).unwrap();
    manager.recluster(None);

    assert!(manager.marker(east).unwrap().is_rendered());
    assert!(manager.marker(west).unwrap().is_rendered());
    assert!(!manager.marker(far).unwrap().is_rendered());
    assert_eq!(manager.count("crime", CountKind::Visible), 2);
}

#[test]
fn test_padding_keeps_markers_near_the_pole() {
    let viewport = StaticViewport::new(10, LatLngBounds::new(89.0, -0.1, 90.0, 0.1));
    for padding in [0.0, 200.0] {
        let mut manager = ClusterManagerBuilder::new()
            .config(ClusterConfig::default().with_padding(padding))
            .zoom_to_precision(|_| 20)
            .build(viewport.clone())
            .unwrap();
        assert_eq!(manager.precision(), 20);
        let id = manager.add_marker(Marker::new(89.5, 0.0), crime()).unwrap();
        manager.recluster(None);
        assert!(manager.marker(id).unwrap().is_rendered(), "padding {padding}");
        assert_eq!(manager.count("crime", CountKind::Visible), 1);
    }
}

#[test]
fn test_zoom_during_drag_waits_for_release() {
    let start = Instant::now();
    let mut manager = ClusterManagerBuilder::new()
        .zoom_to_precision(|zoom| if zoom < 10 { 10 } else { 12 })
        .build(orange_county(8))
        .unwrap();
    manager.on_attached(start);
    manager.on_drag_start();

    manager.viewport_mut().set_zoom(9);
    manager.on_zoom_changed(start);
    assert_eq!(manager.precision(), 10);
    assert!(manager.next_deadline().is_none());
    assert!(!manager.poll(start + Duration::from_secs(1)));

    let released = start + Duration::from_secs(2);
    manager.on_drag_end(released);
    assert_eq!(manager.next_deadline(), Some(released + DEBOUNCE));
    assert!(manager.poll(released + DEBOUNCE));
}
