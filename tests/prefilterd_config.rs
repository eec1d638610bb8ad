use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use ocean_prefilter::config::DaemonConfig;
use ocean_prefilter::HistogramMode;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PREFILTER_CONFIG",
        "PREFILTER_CAMERA_URL",
        "PREFILTER_MAX_FREQUENCY_HZ",
        "PREFILTER_THRESHOLD",
        "PREFILTER_DEBUG",
        "PREFILTER_TRIGGER_ON_MOTION",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_to_a_synthetic_camera() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = DaemonConfig::load().expect("load config");
    assert_eq!(cfg.attributes.camera_name, "camera");
    assert_eq!(cfg.cameras.len(), 1);
    assert_eq!(cfg.cameras[0].url, "stub://camera");
    assert_eq!(cfg.resources().unwrap().cameras.list(), vec!["camera"]);
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "cameras": [
            {"name": "bow", "url": "stub://bow", "width": 320, "height": 240},
            {"name": "stern", "url": "stub://stern"}
        ],
        "prefilter": {
            "camera_name": "bow",
            "max_frequency_hz": 5,
            "threshold": 0.3,
            "excluded_region": [250, 350, 580, 480],
            "chosen_labels": {"boat": 0.5}
        }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("PREFILTER_CONFIG", file.path());
    std::env::set_var("PREFILTER_THRESHOLD", "0.4");
    std::env::set_var("PREFILTER_TRIGGER_ON_MOTION", "true");
    std::env::set_var("PREFILTER_CAMERA_URL", "stub://bow-override");

    let cfg = DaemonConfig::load().expect("load config");
    assert_eq!(cfg.cameras.len(), 2);
    assert_eq!(cfg.cameras[0].url, "stub://bow-override");
    assert_eq!((cfg.cameras[0].width, cfg.cameras[0].height), (320, 240));
    assert_eq!((cfg.cameras[1].width, cfg.cameras[1].height), (640, 480));
    assert_eq!(cfg.attributes.max_frequency_hz, 5.0);
    assert_eq!(cfg.attributes.threshold, 0.4);
    assert!(cfg.attributes.trigger_on_motion);
    assert!(!cfg.attributes.debug);
    assert_eq!(cfg.attributes.excluded_region, vec![250, 350, 580, 480]);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[[cameras]]
name = "mast"
url = "stub://mast"

[prefilter]
camera_name = "mast"
histogram_mode = "color"
tile_width = 160
tile_height = 60
"#;
    file.write_all(toml.as_bytes()).expect("write config");
    std::env::set_var("PREFILTER_CONFIG", file.path());

    let cfg = DaemonConfig::load().expect("load config");
    assert_eq!(cfg.attributes.camera_name, "mast");
    assert_eq!(cfg.attributes.histogram_mode, HistogramMode::Color);
    assert_eq!(cfg.attributes.tile_width, Some(160));
    assert_eq!(cfg.attributes.tile_height, Some(60));

    clear_env();
}

#[test]
fn rejects_invalid_overrides_and_unknown_camera() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PREFILTER_MAX_FREQUENCY_HZ", "fast");
    assert!(DaemonConfig::load().is_err());
    clear_env();

    std::env::set_var("PREFILTER_THRESHOLD", "2.0");
    let err = DaemonConfig::load().unwrap_err();
    assert!(err.to_string().contains("threshold"));
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{"cameras": [{"name": "bow", "url": "stub://bow"}], "prefilter": {"camera_name": "stern"}}"#)
        .expect("write config");
    std::env::set_var("PREFILTER_CONFIG", file.path());
    let err = DaemonConfig::load().unwrap_err();
    assert!(err.to_string().contains("stern"));

    clear_env();
}

#[test]
fn detector_name_is_rejected_by_daemon() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{"prefilter": {"camera_name": "camera", "detector_name": "spotter"}}"#)
        .expect("write config");
    std::env::set_var("PREFILTER_CONFIG", file.path());
    let err = DaemonConfig::load().unwrap_err();
    assert!(err.to_string().contains("detector_name spotter"));

    clear_env();
}
