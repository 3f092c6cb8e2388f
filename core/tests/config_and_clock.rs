//! Configuration loading, the playback clock and driver command parsing.

use rewind_core::{
    arena::{ArenaInput, Button},
    clock::{PlaybackClock, DEFAULT_SPEED, MAX_SPEED, MIN_SPEED},
    command::ControlCommand,
    config::{RewindConfig, CONFIG_FILE},
    replay::Pace,
};
use std::path::PathBuf;

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("rewind-config-{}", uuid::Uuid::new_v4()))
}

#[test]
fn config_loads_and_resolves_save_dir() {
    let dir = temp_dir();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(CONFIG_FILE),
        r#"{
            "save_dir": "runs",
            "speed": 4.0,
            "classifier": { "opaque": ["TileMap"], "exclusions": { "Arena": ["net"] } }
        }"#,
    )
    .unwrap();

    let config = RewindConfig::load(dir.to_str().unwrap()).unwrap();
    assert_eq!(config.save_dir, dir.join("runs"), "relative save_dir sits under the data dir");
    assert_eq!(config.speed, 4.0);
    assert_eq!(config.tick_rate, 60.0, "missing fields fall back to defaults");
    assert!(config.classifier.is_opaque("TileMap"));
    assert!(config.classifier.is_excluded("Arena", "net"));
    assert!(!config.classifier.is_excluded("Player", "net"));
}

#[test]
fn config_errors_name_the_file() {
    let dir = temp_dir();
    let err = RewindConfig::load(dir.to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains(CONFIG_FILE), "got: {err}");

    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(CONFIG_FILE), "{ not json").unwrap();
    let err = RewindConfig::load(dir.to_str().unwrap()).unwrap_err();
    assert!(err.to_string().starts_with("Cannot parse"), "got: {err}");
}

#[test]
fn clock_clamps_speed_and_stops_when_paused() {
    let mut clock = PlaybackClock::default();
    assert_eq!(clock.speed, DEFAULT_SPEED);
    assert_eq!(clock.ticks_per_second(), 90.0);

    clock.set_speed(1_000.0);
    assert_eq!(clock.speed, MAX_SPEED);
    clock.set_speed(0.0);
    assert_eq!(clock.speed, MIN_SPEED);
    clock.set_speed(f64::NAN);
    assert_eq!(clock.speed, DEFAULT_SPEED);

    clock.pause();
    assert_eq!(clock.ticks_per_second(), 0.0);
    clock.resume();
    assert!(clock.ticks_per_second() > 0.0);
}

#[test]
fn speed_dial_steps_between_presets() {
    let mut clock = PlaybackClock::default();
    assert_eq!(clock.step_dial(1), 2.0);
    assert_eq!(clock.step_dial(1), 4.0);
    assert_eq!(clock.step_dial(-3), 1.0);
    assert_eq!(clock.step_dial(-10), 0.1, "the dial stops at the slowest preset");
    assert_eq!(clock.step_dial(50), 10.0, "the dial stops at the fastest preset");

    clock.set_speed(3.0);
    assert_eq!(clock.step_dial(0), 2.0, "an off-dial speed snaps to the nearest preset");
}

/// Dial deltas come straight from driver commands and may be huge.
#[test]
fn speed_dial_saturates_on_extreme_deltas() {
    let mut clock = PlaybackClock::default();
    assert_eq!(clock.step_dial(i32::MAX), 10.0);
    assert_eq!(clock.step_dial(i32::MAX), 10.0, "already at the top, still no overflow");
    assert_eq!(clock.step_dial(i32::MIN), 0.1);
    assert_eq!(clock.step_dial(i32::MIN), 0.1);
}

#[test]
fn control_commands_parse_from_json_lines() {
    let step: ControlCommand<ArenaInput> =
        serde_json::from_str(r#"{"cmd":"step","event":{"keys":["right","fire"]}}"#).unwrap();
    assert_eq!(
        step,
        ControlCommand::Step { event: ArenaInput::new(&[Button::Right, Button::Fire]) }
    );

    let replay: ControlCommand<ArenaInput> =
        serde_json::from_str(r#"{"cmd":"replay","name":"autosave/x","pace":"direct"}"#).unwrap();
    assert_eq!(
        replay,
        ControlCommand::Replay { name: "autosave/x".into(), pace: Pace::Direct }
    );

    let save: ControlCommand<ArenaInput> = serde_json::from_str(r#"{"cmd":"save"}"#).unwrap();
    assert_eq!(save, ControlCommand::Save { label: String::new() }, "label defaults to empty");

    let bad = serde_json::from_str::<ControlCommand<ArenaInput>>(r#"{"cmd":"rewind"}"#);
    assert!(bad.is_err());
}
