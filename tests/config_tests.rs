use media_frame::config::Configuration;
use std::path::PathBuf;

#[test]
fn empty_document_uses_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    assert_eq!(cfg.dwell_seconds, 3);
    assert_eq!(cfg.address_port, 3000);
    assert_eq!(cfg.loader_max_concurrent_decodes, 2);
    assert!(cfg.buttons.enabled);
    assert_eq!(cfg.buttons.pause_key, "KEY_F1");
    assert_eq!(cfg.video.ffmpeg, PathBuf::from("ffmpeg"));
    assert!(cfg.validated().is_ok());
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
media-dir: "/srv/media"
active-playlist-dir: "/srv/playlists/active"
inactive-playlist-dir: "/srv/playlists/inactive"
address-file: "/run/ip.txt"
address-port: 8080
dwell-seconds: 5
loader-max-concurrent-decodes: 4
video:
  ffprobe: "/opt/ff/ffprobe"
buttons:
  enabled: false
  device: "/dev/input/event3"
  debounce-ms: 50
window:
  title: "Kitchen"
  fullscreen: false
"#;
    let cfg = serde_yaml::from_str::<Configuration>(yaml)
        .unwrap()
        .validated()
        .unwrap();
    assert_eq!(cfg.media_dir, PathBuf::from("/srv/media"));
    assert_eq!(cfg.active_playlist_dir, PathBuf::from("/srv/playlists/active"));
    assert_eq!(cfg.address_file, PathBuf::from("/run/ip.txt"));
    assert_eq!(cfg.address_port, 8080);
    assert_eq!(cfg.dwell_seconds, 5);
    assert_eq!(cfg.loader_max_concurrent_decodes, 4);
    assert_eq!(cfg.video.ffprobe, PathBuf::from("/opt/ff/ffprobe"));
    assert_eq!(cfg.video.ffmpeg, PathBuf::from("ffmpeg"));
    assert!(!cfg.buttons.enabled);
    assert_eq!(cfg.buttons.device, Some(PathBuf::from("/dev/input/event3")));
    assert_eq!(cfg.buttons.debounce_ms, 50);
    assert_eq!(cfg.window.title, "Kitchen");
    assert!(!cfg.window.fullscreen);
    assert!(cfg.window.hide_cursor);
}

#[test]
fn zero_dwell_is_rejected() {
    let cfg: Configuration = serde_yaml::from_str("dwell-seconds: 0").unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("dwell-seconds"));
}

#[test]
fn zero_decode_concurrency_is_rejected() {
    let cfg: Configuration = serde_yaml::from_str("loader-max-concurrent-decodes: 0").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn shared_playlist_slots_are_rejected() {
    let yaml = r#"
active-playlist-dir: "/p"
inactive-playlist-dir: "/p"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn duplicate_button_keys_are_rejected() {
    let yaml = r#"
buttons:
  pause-key: KEY_F1
  menu-key: KEY_F1
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(format!("{err:#}").contains("more than once"));
}

#[test]
fn unknown_top_level_field_is_rejected() {
    let res = serde_yaml::from_str::<Configuration>("photo-library-path: /photos");
    assert!(res.is_err());
}

#[test]
fn loads_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "dwell-seconds: 7\naddress-port: 80\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.dwell_seconds, 7);
    assert_eq!(cfg.address_port, 80);
}
