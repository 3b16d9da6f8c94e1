//! Integration tests for the payload → decode → fetch → write → commit
//! pipeline, driven through `UpdateAgent::handle_message` with mock ports.

use super::mock_ports::{
    firmware, MockChannel, MockPartition, MockResource, MockSystem, RecordingSink,
};

use ota_agent::app::events::AgentEvent;
use ota_agent::app::service::{UpdateAgent, UpdateOutcome};
use ota_agent::error::{DecodeError, FetchError, UpdateError, WriteError};
use ota_agent::fsm::UpdateState;
use ota_agent::ota::ImageMagicVerifier;
use ota_agent::version::VersionId;

const URL: &str = "https://host/fw.bin";
const ANNOUNCE_V1: &[u8] = br#"{"version":"v1.0.0","url":"https://host/fw.bin"}"#;
const IMAGE_LEN: usize = 204_800;

type Agent = UpdateAgent<MockChannel, MockPartition, MockSystem>;

fn agent_with(channel: MockChannel) -> Agent {
    UpdateAgent::new(
        VersionId::from("v0.0.1"),
        channel,
        MockPartition::new(1024 * 1024),
        MockSystem::default(),
    )
}

// ── Scenario A: new version, full image → commit + one restart ─

#[test]
fn scenario_a_commits_and_restarts_once() {
    let image = firmware(IMAGE_LEN);
    let mut agent = agent_with(MockChannel::with(URL, MockResource::ok(image.clone())));
    let mut sink = RecordingSink::new();

    let outcome = agent.handle_message(ANNOUNCE_V1, &mut sink);

    assert_eq!(outcome, UpdateOutcome::Restarting(VersionId::from("v1.0.0")));
    assert_eq!(agent.system().restarts, 1);
    assert_eq!(agent.sequencer().partition().boot, image);
    assert_eq!(agent.state(), UpdateState::Restarting);
    assert_eq!(
        sink.states(),
        vec![
            UpdateState::Validating,
            UpdateState::Comparing,
            UpdateState::Fetching,
            UpdateState::Writing,
            UpdateState::Finalizing,
            UpdateState::Restarting,
        ]
    );
    assert!(sink.contains(&AgentEvent::UpdateCommitted(VersionId::from("v1.0.0"))));
    assert_eq!(agent.fetcher().channel().live_connections(), 0);
}

#[test]
fn messages_after_restart_are_ignored() {
    let mut agent = agent_with(MockChannel::with(URL, MockResource::ok(firmware(IMAGE_LEN))));
    let mut sink = RecordingSink::new();
    agent.handle_message(ANNOUNCE_V1, &mut sink);

    let again = agent.handle_message(br#"{"version":"v2.0.0","url":"https://host/fw.bin"}"#, &mut sink);

    assert_eq!(again, UpdateOutcome::Ignored);
    assert_eq!(agent.system().restarts, 1);
    assert_eq!(agent.fetcher().channel().opened.len(), 1);
}

#[test]
fn progress_is_reported_every_ten_percent() {
    let mut agent = agent_with(MockChannel::with(URL, MockResource::ok(firmware(IMAGE_LEN))));
    let mut sink = RecordingSink::new();
    agent.handle_message(ANNOUNCE_V1, &mut sink);

    let progress = sink.progress();
    assert_eq!(progress.len(), 10);
    assert_eq!(progress.last(), Some(&(IMAGE_LEN as u64)));
}

// ── Scenario B: stream ends early → ShortWrite, no commit ─────

#[test]
fn scenario_b_short_stream_is_rejected_without_commit() {
    let mut res = MockResource::ok(firmware(100_000));
    res.declared = Some(IMAGE_LEN as i64);
    let mut agent = agent_with(MockChannel::with(URL, res));
    let mut sink = RecordingSink::new();

    let outcome = agent.handle_message(ANNOUNCE_V1, &mut sink);

    assert_eq!(
        outcome,
        UpdateOutcome::Rejected {
            stage: UpdateState::Writing,
            error: UpdateError::Write(WriteError::ShortWrite(100_000, 204_800)),
        }
    );
    assert_eq!(agent.state(), UpdateState::Idle);
    assert_eq!(agent.system().restarts, 0);
    assert!(agent.sequencer().partition().boot_unchanged());
    assert_eq!(agent.sequencer().partition().aborts, 1);
    assert!(!agent.sequencer().is_busy());
    assert_eq!(agent.fetcher().channel().live_connections(), 0);
}

// ── Scenario C: same version → nothing fetched ────────────────

#[test]
fn scenario_c_already_current_skips_fetch() {
    let mut agent = agent_with(MockChannel::with(URL, MockResource::ok(firmware(16))));
    let mut sink = RecordingSink::new();

    let outcome = agent.handle_message(
        br#"{"version":"v0.0.1","url":"https://host/fw.bin"}"#,
        &mut sink,
    );

    assert_eq!(outcome, UpdateOutcome::AlreadyCurrent(VersionId::from("v0.0.1")));
    assert!(agent.fetcher().channel().opened.is_empty());
    assert!(sink.contains(&AgentEvent::AlreadyCurrent(VersionId::from("v0.0.1"))));
    assert_eq!(agent.state(), UpdateState::Idle);
}

#[test]
fn older_announced_version_still_updates() {
    let mut agent = UpdateAgent::new(
        VersionId::from("v2.0.0"),
        MockChannel::with(URL, MockResource::ok(firmware(4096))),
        MockPartition::new(1024 * 1024),
        MockSystem::default(),
    );
    let outcome = agent.handle_message(ANNOUNCE_V1, &mut RecordingSink::new());
    assert_eq!(outcome, UpdateOutcome::Restarting(VersionId::from("v1.0.0")));
}

// ── Scenario D: non-HTTPS URL → no connection ─────────────────

#[test]
fn scenario_d_plain_http_never_connects() {
    let mut agent = agent_with(MockChannel::new());
    let mut sink = RecordingSink::new();

    let outcome = agent.handle_message(
        br#"{"version":"v1.0.0","url":"http://host/fw.bin"}"#,
        &mut sink,
    );

    assert_eq!(
        outcome,
        UpdateOutcome::Rejected {
            stage: UpdateState::Fetching,
            error: UpdateError::Fetch(FetchError::NonSecureUrl),
        }
    );
    assert!(agent.fetcher().channel().opened.is_empty());
    assert_eq!(agent.state(), UpdateState::Idle);
}

// ── Other failure paths ───────────────────────────────────────

#[test]
fn malformed_payload_fails_in_validating() {
    let mut agent = agent_with(MockChannel::new());
    let outcome = agent.handle_message(b"{not json", &mut RecordingSink::new());
    assert_eq!(
        outcome,
        UpdateOutcome::Rejected {
            stage: UpdateState::Validating,
            error: UpdateError::Decode(DecodeError::MalformedPayload),
        }
    );
    assert_eq!(agent.state(), UpdateState::Idle);
}

#[test]
fn missing_url_fails_in_validating() {
    let mut agent = agent_with(MockChannel::new());
    let outcome = agent.handle_message(br#"{"version":"v1.0.0"}"#, &mut RecordingSink::new());
    assert_eq!(
        outcome,
        UpdateOutcome::Rejected {
            stage: UpdateState::Validating,
            error: UpdateError::Decode(DecodeError::MissingField("url")),
        }
    );
}

#[test]
fn http_404_is_bad_status() {
    let mut res = MockResource::ok(firmware(16));
    res.status = 404;
    let mut agent = agent_with(MockChannel::with(URL, res));
    let outcome = agent.handle_message(ANNOUNCE_V1, &mut RecordingSink::new());
    assert_eq!(
        outcome,
        UpdateOutcome::Rejected {
            stage: UpdateState::Fetching,
            error: UpdateError::Fetch(FetchError::BadStatus(404)),
        }
    );
    assert_eq!(agent.fetcher().channel().live_connections(), 0);
}

#[test]
fn missing_content_length_is_unknown_length() {
    let mut res = MockResource::ok(firmware(16));
    res.declared = None;
    let mut agent = agent_with(MockChannel::with(URL, res));
    let outcome = agent.handle_message(ANNOUNCE_V1, &mut RecordingSink::new());
    assert_eq!(
        outcome,
        UpdateOutcome::Rejected {
            stage: UpdateState::Fetching,
            error: UpdateError::Fetch(FetchError::UnknownLength),
        }
    );
}

#[test]
fn unreachable_host_is_connect_failed() {
    let mut agent = agent_with(MockChannel::new());
    let outcome = agent.handle_message(ANNOUNCE_V1, &mut RecordingSink::new());
    assert_eq!(
        outcome,
        UpdateOutcome::Rejected {
            stage: UpdateState::Fetching,
            error: UpdateError::Fetch(FetchError::ConnectFailed),
        }
    );
}

#[test]
fn oversized_image_is_insufficient_space() {
    let mut agent = UpdateAgent::new(
        VersionId::from("v0.0.1"),
        MockChannel::with(URL, MockResource::ok(firmware(8192))),
        MockPartition::new(4096),
        MockSystem::default(),
    );
    let outcome = agent.handle_message(ANNOUNCE_V1, &mut RecordingSink::new());
    assert_eq!(
        outcome,
        UpdateOutcome::Rejected {
            stage: UpdateState::Writing,
            error: UpdateError::Write(WriteError::InsufficientSpace),
        }
    );
    assert_eq!(agent.sequencer().partition().begins, 0);
}

#[test]
fn platform_integrity_failure_does_not_commit() {
    let mut partition = MockPartition::new(1024 * 1024);
    partition.fail_complete = true;
    let mut agent = UpdateAgent::new(
        VersionId::from("v0.0.1"),
        MockChannel::with(URL, MockResource::ok(firmware(10_000))),
        partition,
        MockSystem::default(),
    );
    let outcome = agent.handle_message(ANNOUNCE_V1, &mut RecordingSink::new());
    assert_eq!(
        outcome,
        UpdateOutcome::Rejected {
            stage: UpdateState::Finalizing,
            error: UpdateError::Write(WriteError::VerificationFailed),
        }
    );
    assert!(agent.sequencer().partition().boot_unchanged());
    assert_eq!(agent.system().restarts, 0);
}

#[test]
fn magic_verifier_rejects_non_firmware_body() {
    let mut agent = agent_with(MockChannel::with(
        URL,
        MockResource::ok(b"<html>not found</html>".to_vec()),
    ))
    .with_verifier(Box::new(ImageMagicVerifier::new()));
    let outcome = agent.handle_message(ANNOUNCE_V1, &mut RecordingSink::new());
    assert_eq!(
        outcome,
        UpdateOutcome::Rejected {
            stage: UpdateState::Finalizing,
            error: UpdateError::Write(WriteError::VerificationFailed),
        }
    );
    assert!(agent.sequencer().partition().boot_unchanged());
    assert_eq!(agent.sequencer().partition().aborts, 1);
}

#[test]
fn magic_verifier_accepts_firmware() {
    let mut agent = agent_with(MockChannel::with(URL, MockResource::ok(firmware(9000))))
        .with_verifier(Box::new(ImageMagicVerifier::new()));
    let outcome = agent.handle_message(ANNOUNCE_V1, &mut RecordingSink::new());
    assert_eq!(outcome, UpdateOutcome::Restarting(VersionId::from("v1.0.0")));
}

// ── One session at a time ─────────────────────────────────────

#[test]
fn retry_after_failure_opens_a_fresh_single_session() {
    let mut res = MockResource::ok(firmware(IMAGE_LEN));
    res.fail_at = Some(50_000);
    let mut agent = agent_with(MockChannel::with(URL, res));
    let mut sink = RecordingSink::new();

    let first = agent.handle_message(ANNOUNCE_V1, &mut sink);
    assert!(matches!(
        first,
        UpdateOutcome::Rejected {
            error: UpdateError::Write(WriteError::IoFault),
            ..
        }
    ));

    let second = agent.handle_message(ANNOUNCE_V1, &mut sink);
    assert!(matches!(second, UpdateOutcome::Rejected { .. }));

    let part = agent.sequencer().partition();
    assert_eq!(part.begins, 2);
    assert_eq!(part.overlapping_begins, 0);
    assert!(part.boot_unchanged());
}

#[test]
fn failure_event_names_the_stage() {
    let mut agent = agent_with(MockChannel::new());
    let mut sink = RecordingSink::new();
    agent.handle_message(ANNOUNCE_V1, &mut sink);
    assert!(sink.contains(&AgentEvent::UpdateFailed {
        stage: UpdateState::Fetching,
        error: UpdateError::Fetch(FetchError::ConnectFailed),
    }));
    assert_eq!(sink.states().last(), Some(&UpdateState::Idle));
}
