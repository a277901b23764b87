use geocluster::{ClusterConfig, IconColor};
use std::collections::BTreeMap;

#[test]
fn test_partial_toml_uses_defaults() {
    let config = ClusterConfig::from_toml(
        r#"
        padding = 64.0
        move_debounce_ms = 250

        [icon_color]
        crime = "ff0000"
        traffic = "ffaa00"
        "#,
    )
    .unwrap();

    assert_eq!(config.padding, 64.0);
    assert_eq!(config.move_debounce_ms, 250);
    assert_eq!(config.recluster_debounce_ms, 100);
    assert_eq!(config.precision, 2);
    assert_eq!(config.icon_color.for_category("traffic"), "ffaa00");
    assert_eq!(config.icon_color.for_category("weather"), "00CC00");
}

#[test]
fn test_toml_roundtrip() {
    let mut colors = BTreeMap::new();
    colors.insert("crime".to_string(), "ff0000".to_string());
    let config = ClusterConfig::default()
        .with_precision(4)
        .with_cluster_by_distance(false)
        .with_icon_color(IconColor::PerCategory(colors));

    let text = config.to_toml().unwrap();
    assert_eq!(ClusterConfig::from_toml(&text).unwrap(), config);
}

#[test]
fn test_invalid_toml_is_rejected() {
    assert!(ClusterConfig::from_toml("padding = -5.0").is_err());
    assert!(ClusterConfig::from_toml("cluster_distance_factor = 0.0").is_err());
    assert!(ClusterConfig::from_toml("precision = \"high\"").is_err());
}
