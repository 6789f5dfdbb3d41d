use super::*;

#[test]
fn defaults_validate() {
    let cfg = PlaybackConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.upscale_join_timeout_ms, 50);
    assert_eq!(cfg.join_timeout(), Duration::from_millis(50));
}

#[test]
fn json_overrides_and_defaults_merge() {
    let cfg = PlaybackConfig::from_json_str(
        r#"{
            "panel": { "width": 64, "height": 32 },
            "rotation": 270,
            "background": { "r": 1, "g": 2, "b": 3 }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.panel, PanelSize { width: 64, height: 32 });
    assert_eq!(cfg.rotation, Rotation::Deg270);
    assert_eq!(cfg.background, Rgb8::new(1, 2, 3));
    assert_eq!(cfg.idle_tick_ms, 100);
}

#[test]
fn invalid_configs_are_rejected() {
    assert!(PlaybackConfig::from_json_str(r#"{ "rotation": 45 }"#).is_err());
    assert!(PlaybackConfig::from_json_str(r#"{ "upscale_join_timeout_ms": 0 }"#).is_err());
    assert!(PlaybackConfig::from_json_str(r#"{ "worker_cores": [1, 1] }"#).is_err());
    assert!(PlaybackConfig::from_json_str(r#"{ "unknown_key": true }"#).is_err());
    assert!(
        PlaybackConfig::from_json_str(r#"{ "swap_notice": true, "swap_notice_size": 4 }"#)
            .is_err()
    );
    // A small size only matters once the notice is enabled.
    assert!(PlaybackConfig::from_json_str(r#"{ "swap_notice_size": 4 }"#).is_ok());
    assert!(PlaybackConfig::from_json_str(r#"{ "panel": { "width": 0, "height": 8 } }"#).is_err());
}

#[test]
fn background_generation_only_moves_on_change() {
    let settings = RuntimeSettings::from_config(&PlaybackConfig::default());
    assert_eq!(settings.background(), (Rgb8::BLACK, 0));
    assert_eq!(settings.set_background(Rgb8::BLACK), 0);
    assert_eq!(settings.set_background(Rgb8::new(9, 9, 9)), 1);
    assert_eq!(settings.set_background(Rgb8::new(9, 9, 9)), 1);
    assert_eq!(settings.set_background(Rgb8::new(1, 9, 9)), 2);
}

#[test]
fn rotation_is_mutable() {
    let settings = RuntimeSettings::from_config(&PlaybackConfig::default());
    settings.set_rotation(Rotation::Deg90);
    assert_eq!(settings.rotation(), Rotation::Deg90);
}
