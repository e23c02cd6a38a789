//! Moderation Integration Tests
//!
//! Reviews driven through the orchestrator: verdicts, re-queueing and
//! recommendations fetched at dequeue time.

mod common;

use common::*;
use modbot::domain::MessageRef;

const MODERATOR: u64 = 500;

/// A user-filed Health / Vaccines report with the given harm answer
async fn queued_report(
    orchestrator: &modbot::Orchestrator,
    gateway: &modbot::adapters::InMemoryGateway,
    harm_choice: &str,
) -> MessageRef {
    let target = post(gateway, 42, "poster", "vaccines rewrite your DNA").await;
    file_report(orchestrator, 300, target, &["1", "2", "1", harm_choice, "1"]).await;
    target
}

async fn replies_to_moderator(gateway: &modbot::adapters::InMemoryGateway) -> Vec<String> {
    gateway.sent_to(dm_channel(MODERATOR)).await
}

#[tokio::test]
async fn test_empty_queue() {
    let gateway = gateway().await;
    let orchestrator = orchestrator(&gateway).await;

    converse(&orchestrator, MODERATOR, "mod", &["moderate"]).await;

    assert_eq!(
        replies_to_moderator(&gateway).await,
        vec!["No pending reports.".to_string()]
    );

    // No session was left behind: the next message outside a flow is ignored
    converse(&orchestrator, MODERATOR, "mod", &["yes"]).await;
    assert_eq!(replies_to_moderator(&gateway).await.len(), 1);
}

#[tokio::test]
async fn test_skip_requeues_at_original_priority() {
    let gateway = gateway().await;
    let orchestrator = orchestrator(&gateway).await;
    queued_report(&orchestrator, &gateway, "4").await;
    assert_eq!(orchestrator.queue_summary().await.lanes[1].count, 1);

    converse(&orchestrator, MODERATOR, "mod", &["moderate"]).await;
    assert_eq!(orchestrator.pending_count().await, 0);

    converse(&orchestrator, MODERATOR, "mod", &["skip", "3"]).await;

    let replies = replies_to_moderator(&gateway).await;
    assert!(replies.iter().any(|r| r == "You skipped this review due to: Requires escalation."));
    assert_eq!(replies.last().unwrap(), "Returning to queue.");

    let summary = orchestrator.queue_summary().await;
    assert_eq!(summary.total, 1);
    assert_eq!(summary.lanes[1].count, 1);

    // No verdict for a skipped review
    let mod_channel = gateway.sent_to(MOD_CHANNEL).await;
    assert!(!mod_channel.iter().any(|m| m.contains("has been moderated")));
}

#[tokio::test]
async fn test_escalate_requeues() {
    let gateway = gateway().await;
    let orchestrator = orchestrator(&gateway).await;
    queued_report(&orchestrator, &gateway, "2").await;

    converse(&orchestrator, MODERATOR, "mod", &["moderate", "yes", "ok", "3"]).await;

    assert_eq!(orchestrator.queue_summary().await.lanes[0].count, 1);
    assert!(gateway.reactions().await.is_empty());
}

#[tokio::test]
async fn test_remove_emits_verdict_and_reaction() {
    let gateway = gateway().await;
    let orchestrator = orchestrator(&gateway).await;
    let target = queued_report(&orchestrator, &gateway, "2").await;

    converse(&orchestrator, MODERATOR, "mod", &["moderate"]).await;
    let replies = replies_to_moderator(&gateway).await;
    // Redacted preview, then the intake prompt
    assert!(replies[0].starts_with("```"));
    assert!(replies[0].contains("Report ID: 0"));
    assert!(!replies[0].contains("rewrite your DNA"));
    assert_eq!(replies[1], "New reported content available.");

    converse(&orchestrator, MODERATOR, "mod", &["yes"]).await;
    let summary = replies_to_moderator(&gateway).await.pop().unwrap();
    assert!(summary.contains("Potential imminent harm: physical"));
    assert!(summary.contains("Content metadata: Msg: \"vaccines rewrite your DNA\""));

    converse(&orchestrator, MODERATOR, "mod", &["next", "1"]).await;
    assert_eq!(
        replies_to_moderator(&gateway).await.last().unwrap(),
        "Content has been removed. Review complete."
    );

    let verdict = gateway.sent_to(MOD_CHANNEL).await.pop().unwrap();
    assert_eq!(verdict, "Report ID: 0\nhas been moderated.\nVerdict: Removed.");
    assert_eq!(gateway.reactions().await, vec![(target, "❌".to_string())]);
    assert_eq!(orchestrator.pending_count().await, 0);
}

#[tokio::test]
async fn test_allow_emits_verdict_without_reaction() {
    let gateway = gateway().await;
    let orchestrator = orchestrator(&gateway).await;
    queued_report(&orchestrator, &gateway, "1").await;

    converse(&orchestrator, MODERATOR, "mod", &["moderate", "YES", "", "2"]).await;

    let verdict = gateway.sent_to(MOD_CHANNEL).await.pop().unwrap();
    assert!(verdict.ends_with("Verdict: Allowed."));
    assert!(gateway.reactions().await.is_empty());
    assert_eq!(orchestrator.pending_count().await, 0);
}

#[tokio::test]
async fn test_invalid_action_keeps_review_open() {
    let gateway = gateway().await;
    let orchestrator = orchestrator(&gateway).await;
    queued_report(&orchestrator, &gateway, "1").await;

    converse(&orchestrator, MODERATOR, "mod", &["moderate", "yes", "ok", "7"]).await;
    let replies = replies_to_moderator(&gateway).await;
    assert!(replies.iter().any(|r| r.starts_with("Invalid action")));

    converse(&orchestrator, MODERATOR, "mod", &["2"]).await;
    assert!(gateway
        .sent_to(MOD_CHANNEL)
        .await
        .iter()
        .any(|m| m.ends_with("Verdict: Allowed.")));
}

#[tokio::test]
async fn test_cancel_mid_review_returns_report() {
    let gateway = gateway().await;
    let orchestrator = orchestrator(&gateway).await;
    queued_report(&orchestrator, &gateway, "3").await;

    converse(&orchestrator, MODERATOR, "mod", &["moderate", "yes", "cancel"]).await;

    assert_eq!(orchestrator.queue_summary().await.lanes[0].count, 1);
    assert!(replies_to_moderator(&gateway)
        .await
        .last()
        .unwrap()
        .contains("returned to the queue"));
}

#[tokio::test]
async fn test_recommendation_fetched_for_user_report() {
    let gateway = gateway().await;
    let llm = ScriptedLlm::new(vec![(
        "do you recommend",
        Some("2. Remove Content. Claims about DNA changes are false."),
    )]);
    let orchestrator = orchestrator(&gateway)
        .await
        .with_categorizer(categorizer(llm.clone()));
    queued_report(&orchestrator, &gateway, "1").await;

    converse(&orchestrator, MODERATOR, "mod", &["moderate", "yes"]).await;

    let summary = replies_to_moderator(&gateway).await.pop().unwrap();
    assert!(summary.contains(
        "The Auto-Mod bot made this recommendation: Remove Content. Claims about DNA changes are false."
    ));
    assert_eq!(llm.calls().len(), 1);
    assert!(llm.calls()[0].contains("Imminent Harm: none"));
}

#[tokio::test]
async fn test_two_moderators_take_different_reports() {
    let gateway = gateway().await;
    let orchestrator = orchestrator(&gateway).await;
    queued_report(&orchestrator, &gateway, "2").await;
    queued_report(&orchestrator, &gateway, "1").await;

    converse(&orchestrator, MODERATOR, "mod", &["moderate"]).await;
    converse(&orchestrator, MODERATOR + 1, "mod2", &["moderate"]).await;

    assert_eq!(orchestrator.pending_count().await, 0);
    let first = gateway.sent_to(dm_channel(MODERATOR)).await;
    let second = gateway.sent_to(dm_channel(MODERATOR + 1)).await;
    assert!(first[0].contains("Report ID: 0"));
    assert!(second[0].contains("Report ID: 1"));
}
