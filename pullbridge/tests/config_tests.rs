// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! Configuration loading and validation.

use std::time::Duration;

use pullbridge::{AspectRatio, Error, MessagePumpConfig, PumpConfig};

#[test]
fn defaults_match_documented_values() {
    let config = PumpConfig::default();
    assert_eq!(config.pull_timeout, Duration::from_millis(100));
    assert_eq!(config.channel_capacity, 4);
    assert_eq!(config.fallback_bits_per_pixel, 32);
    assert_eq!(
        config.aspect_ratios,
        vec![
            AspectRatio::new(16, 9),
            AspectRatio::new(4, 3),
            AspectRatio::new(1, 1)
        ]
    );
    assert!(config.validate().is_ok());

    let bus = MessagePumpConfig::default();
    assert!(bus.stop_on_eos);
    assert!(!bus.stop_on_error);
    assert!(bus.validate().is_ok());
}

#[test]
fn json_round_trip_uses_milliseconds() {
    let config = PumpConfig::default()
        .with_pull_timeout(Duration::from_millis(40))
        .with_aspect_ratios(vec![AspectRatio::new(21, 9), AspectRatio::SQUARE])
        .with_thread_name("camera-0");

    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["pull_timeout_ms"], 40);
    assert_eq!(json["aspect_ratios"][0]["width"], 21);

    let parsed = PumpConfig::from_json_str(&json.to_string()).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn missing_fields_take_defaults() {
    let config = PumpConfig::from_json_str(r#"{ "channel_capacity": 8 }"#).unwrap();
    assert_eq!(config.channel_capacity, 8);
    assert_eq!(config.pull_timeout, Duration::from_millis(100));
    assert_eq!(config.thread_name, "pullbridge-pump");

    let bus = MessagePumpConfig::from_json_str(r#"{ "stop_on_error": true }"#).unwrap();
    assert!(bus.stop_on_error);
    assert_eq!(bus.pop_timeout, Duration::from_millis(100));
}

#[test]
fn out_of_range_values_are_rejected() {
    for json in [
        r#"{ "pull_timeout_ms": 0 }"#,
        r#"{ "channel_capacity": 0 }"#,
        r#"{ "fallback_bits_per_pixel": 0 }"#,
        r#"{ "aspect_ratios": [{ "width": 16, "height": 0 }] }"#,
    ] {
        assert!(
            matches!(PumpConfig::from_json_str(json), Err(Error::Config(_))),
            "accepted {json}"
        );
    }
    assert!(matches!(
        MessagePumpConfig::from_json_str(r#"{ "pop_timeout_ms": 0 }"#),
        Err(Error::Config(_))
    ));
}

#[test]
fn malformed_documents_are_reported() {
    assert!(matches!(
        PumpConfig::from_json_str("{ pull_timeout_ms: "),
        Err(Error::Json(_))
    ));
    assert!(matches!(
        PumpConfig::from_json_str(r#"{ "pull_timeout_ms": "fast" }"#),
        Err(Error::Json(_))
    ));
}
