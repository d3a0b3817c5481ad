use codegate_otp::domain::types::{DenyReason, ValidationOutcome};
use codegate_otp::usecase::issue::IssueCodeInput;

use crate::helpers::harness;

fn issue_for(email: &str, h: &crate::helpers::Harness) -> String {
    h.state
        .issue_usecase()
        .execute(IssueCodeInput {
            email: Some(email.to_owned()),
        })
        .unwrap()
        .code
        .to_string()
}

#[tokio::test]
async fn code_is_granted_once_within_ttl() {
    let h = harness(false);
    let code = issue_for("alice@example.com", &h);

    h.clock.advance(5);
    let validate = h.state.validate_usecase();
    assert_eq!(validate.execute(&code), ValidationOutcome::Granted);
    assert_eq!(
        validate.execute(&code),
        ValidationOutcome::Denied(DenyReason::Invalid)
    );

    let sent = h.notifier.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.com");
    assert_eq!(sent[0].code.as_str(), code);
    assert_eq!(sent[0].valid_for_secs, 15);
}

#[tokio::test]
async fn code_past_ttl_is_expired_and_removed() {
    let h = harness(false);
    let code = issue_for("bob@example.com", &h);

    h.clock.advance(20);
    assert_eq!(
        h.state.validate_usecase().execute(&code),
        ValidationOutcome::Denied(DenyReason::Expired)
    );
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn wrong_length_is_rejected_without_touching_store() {
    let h = harness(false);
    let code = issue_for("carol@example.com", &h);

    assert_eq!(
        h.state.validate_usecase().execute("12345"),
        ValidationOutcome::Denied(DenyReason::Malformed)
    );
    assert_eq!(h.store.len(), 1);
    assert_eq!(
        h.state.validate_usecase().execute(&code),
        ValidationOutcome::Granted
    );
}

#[tokio::test]
async fn validation_trims_only_surrounding_whitespace() {
    let h = harness(false);
    let code = issue_for("dave@example.com", &h);
    let spaced = format!("{} {} {}", &code[..3], &code[3..6], &code[6..]);

    assert_eq!(
        h.state.validate_usecase().execute(&spaced),
        ValidationOutcome::Denied(DenyReason::Malformed)
    );
    assert_eq!(h.store.len(), 1);

    assert_eq!(
        h.state.validate_usecase().execute(&format!("  {code}\n")),
        ValidationOutcome::Granted
    );
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn failed_delivery_keeps_code_valid() {
    use std::sync::Arc;

    use codegate_otp::state::AppState;

    use crate::helpers::{FailingNotifier, ManualClock, test_store};

    let store = test_store(ManualClock::new());
    let state = AppState::new(Arc::clone(&store), Arc::new(FailingNotifier), false);
    let output = state
        .issue_usecase()
        .execute(IssueCodeInput {
            email: Some("erin@example.com".to_owned()),
        })
        .unwrap();

    output.delivery.unwrap().await.unwrap();
    assert_eq!(
        state.validate_usecase().execute(output.code.as_str()),
        ValidationOutcome::Granted
    );
}

#[tokio::test]
async fn sweep_purges_only_expired_codes() {
    let h = harness(false);
    issue_for("old@example.com", &h);
    h.clock.advance(10);
    let fresh = issue_for("new@example.com", &h);
    h.clock.advance(10);

    assert_eq!(h.store.sweep(h.store.now()), 1);
    assert_eq!(h.store.len(), 1);
    assert_eq!(
        h.state.validate_usecase().execute(&fresh),
        ValidationOutcome::Granted
    );
}

#[tokio::test]
async fn sweeper_purges_expired_codes_without_traffic() {
    use std::time::Duration;

    use codegate_otp::usecase::sweep::spawn_sweeper;

    let h = harness(false);
    issue_for("idle@example.com", &h);
    h.clock.advance(20);
    assert_eq!(h.store.len(), 1);

    let sweeper = spawn_sweeper(std::sync::Arc::clone(&h.store), Duration::from_millis(5));
    for _ in 0..200 {
        if h.store.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    sweeper.abort();

    assert!(h.store.is_empty());
}
