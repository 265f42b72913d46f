//! End-to-end telemetry behavior: payload contents, delivery mode
//! cadence and hostname resolution, all on the virtual clock.

mod common;

use common::{good_train, node, GOOD_BODY, PREFIX};
use thnode_core::{
    DeliveryMode, NodeAddr, ResolutionStatus, ResolveOutcome, TimerId,
};
use thnode_sim::{frame_bytes, pulse_train, run_for, SimPlatform};

#[test]
fn first_cycle_posts_confirmed_reading() {
    let mut platform = SimPlatform::joined(PREFIX);
    platform.capture_scripts.push_back(good_train());
    platform.confirm_responses.push_back(2);
    let mut node = node(platform);

    run_for(&mut node, 2_000);

    let sent = &node.platform_mut().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].mode, DeliveryMode::Confirmed);
    assert_eq!(sent[0].body, GOOD_BODY);
    assert_eq!(sent[0].addr, NodeAddr::sink_for_prefix(&PREFIX));
    assert_eq!(sent[0].port, 5683);
    assert_eq!(sent[0].path, "/th12");

    assert!(node.state().sink_reachable);
    assert_eq!(node.state().resolution, ResolutionStatus::Ok);
    assert_eq!(node.state().consecutive_report_failures, 0);
    assert_eq!(node.state().wake_count, 1);
}

#[test]
fn reachability_check_cadence() {
    // Defaults: 10 s interval, a check every 6th post. With the first
    // check succeeding, posts 1..=5 go unconfirmed while post 6 checks
    // again.
    let mut platform = SimPlatform::joined(PREFIX);
    for _ in 0..7 {
        platform.capture_scripts.push_back(good_train());
    }
    platform.confirm_responses.push_back(2);
    platform.confirm_responses.push_back(2);
    let mut node = node(platform);

    run_for(&mut node, 65_000);

    let sent = &node.platform_mut().sent;
    assert_eq!(sent.len(), 7);
    assert_eq!(sent[0].mode, DeliveryMode::Confirmed);
    for report in &sent[1..6] {
        assert_eq!(report.mode, DeliveryMode::Unconfirmed);
    }
    assert_eq!(sent[6].mode, DeliveryMode::Confirmed);
}

#[test]
fn battery_field_appears_after_warmup() {
    // The monitor needs 30 s to settle; posts before that omit "vb".
    let mut platform = SimPlatform::joined(PREFIX);
    platform.battery = 2950;
    for _ in 0..7 {
        platform.capture_scripts.push_back(good_train());
    }
    platform.confirm_responses.push_back(2);
    platform.confirm_responses.push_back(2);
    let mut node = node(platform);

    run_for(&mut node, 65_000);

    let sent = &node.platform_mut().sent;
    assert_eq!(sent.len(), 7);
    for report in &sent[..3] {
        assert!(!report.body.contains("vb"), "early post: {}", report.body);
    }
    for report in &sent[3..] {
        assert!(report.body.contains("\"vb\":\"2950mV\""), "late post: {}", report.body);
    }
}

#[test]
fn negative_temperature_payload() {
    // -4.2 C at 41.5% humidity: sign-magnitude temperature integer byte.
    let mut platform = SimPlatform::joined(PREFIX);
    platform
        .capture_scripts
        .push_back(pulse_train(&frame_bytes(41, 5, 0x84, 2), 40));
    platform.confirm_responses.push_back(2);
    let mut node = node(platform);

    run_for(&mut node, 2_000);

    let sent = &node.platform_mut().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].body,
        "{\"eui\":\"00124b0001020304\",\"t\":\"-4.2C\",\"h\":\"41.5%\"}"
    );
}

#[test]
fn hostname_resolution_failure_then_success() {
    let sink = NodeAddr([
        0xfd, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x99,
    ]);
    let mut platform = SimPlatform::joined(PREFIX);
    platform.capture_scripts.push_back(good_train());
    platform.capture_scripts.push_back(good_train());
    platform.resolve_script.push_back(ResolveOutcome::NotFound);
    platform.resolve_script.push_back(ResolveOutcome::Found(sink));
    platform.confirm_responses.push_back(2);
    let mut node = node(platform);
    node.update_config(|cfg| {
        cfg.sink_host.push_str("sink.example").unwrap();
    })
    .unwrap();

    run_for(&mut node, 12_000);

    // First cycle never sends: the hostname did not resolve. The second
    // cycle re-checks because resolution is not settled.
    let sent = &node.platform_mut().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].mode, DeliveryMode::Confirmed);
    assert_eq!(sent[0].addr, sink);

    assert_eq!(node.state().resolution, ResolutionStatus::Ok);
    assert!(node.state().sink_reachable);
    assert_eq!(node.state().consecutive_report_failures, 0);
}

#[test]
fn unconfirmed_reply_cuts_awake_window_short() {
    let mut platform = SimPlatform::joined(PREFIX);
    platform.capture_scripts.push_back(good_train());
    platform.capture_scripts.push_back(good_train());
    platform.confirm_responses.push_back(2);
    platform.unconfirmed_replies.push_back(1);
    let mut node = node(platform);

    run_for(&mut node, 12_000);

    assert_eq!(node.platform_mut().sent.len(), 2);
    assert_eq!(node.state().wake_count, 2);
    assert!(node
        .platform_mut()
        .cancelled
        .contains(&TimerId::SleepAfterPost));
}

#[test]
fn static_sink_address_wins_over_mesh_default() {
    let sink = NodeAddr([
        0xfd, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x42,
    ]);
    let mut platform = SimPlatform::joined(PREFIX);
    platform.capture_scripts.push_back(good_train());
    platform.confirm_responses.push_back(2);
    let mut node = node(platform);
    node.update_config(|cfg| cfg.sink_address = sink).unwrap();

    run_for(&mut node, 2_000);

    let sent = &node.platform_mut().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].addr, sink);
}
