// tests/antiraid_sanction.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use fusion_guard::antiraid::{
    AbuseDetector, ActionEvent, ActionType, ActorKey, AntiRaid, SanctionExecutor,
    SanctionOutcome, SanctionState, ScopeId,
};
use fusion_guard::config::AntiRaidConfig;

use common::RecordingModeration;

const GUILD: ScopeId = ScopeId(900);

fn service(moderation: Arc<RecordingModeration>) -> Arc<AntiRaid> {
    AntiRaid::from_config(&AntiRaidConfig::default(), moderation).unwrap()
}

fn event(actor: u64, action_type: ActionType, ms: i64) -> ActionEvent {
    ActionEvent {
        actor: ActorKey(actor),
        action_type,
        at: common::t(ms),
        scope: GUILD,
    }
}

#[tokio::test]
async fn burst_over_threshold_sanctions_exactly_once() {
    let moderation = Arc::new(RecordingModeration::default());
    let ar = service(moderation.clone());

    let mut outcomes = Vec::new();
    for i in 0..8 {
        let report = ar.handle(event(1, ActionType::RoleDelete, i * 1_000)).await;
        assert_eq!(report.verdict.triggered, i >= 5);
        if let Some(s) = report.sanction {
            assert_eq!(s.reason, "mass role deletion");
            outcomes.push(s.outcome);
        }
    }

    assert_eq!(
        outcomes,
        vec![
            SanctionOutcome::Applied,
            SanctionOutcome::Suppressed,
            SanctionOutcome::Suppressed
        ]
    );
    assert_eq!(
        moderation.calls(),
        vec![(GUILD, ActorKey(1), "mass role deletion".to_string())]
    );
    assert_eq!(
        ar.executor().state(GUILD, ActorKey(1)),
        Some(SanctionState::Sanctioned)
    );
}

#[tokio::test]
async fn non_triggering_events_carry_no_sanction() {
    let moderation = Arc::new(RecordingModeration::default());
    let ar = service(moderation.clone());
    let report = ar.handle(event(2, ActionType::Ban, 0)).await;
    assert!(!report.verdict.triggered);
    assert!(report.sanction.is_none());
    assert_eq!(report.scope, GUILD);
    assert!(moderation.calls().is_empty());
}

#[tokio::test]
async fn failed_ban_is_retried_by_next_trigger() {
    let moderation = Arc::new(RecordingModeration::failing(1));
    let ar = service(moderation.clone());

    ar.handle(event(3, ActionType::ChannelDelete, 0)).await;
    ar.handle(event(3, ActionType::ChannelDelete, 1_000)).await;
    let first = ar.handle(event(3, ActionType::ChannelDelete, 2_000)).await;
    let first = first.sanction.unwrap();
    assert!(matches!(first.outcome, SanctionOutcome::Failed(_)));
    assert_eq!(ar.executor().state(GUILD, ActorKey(3)), None);

    let second = ar.handle(event(3, ActionType::ChannelDelete, 3_000)).await;
    assert_eq!(second.sanction.unwrap().outcome, SanctionOutcome::Applied);
    assert_eq!(moderation.calls().len(), 2);
    assert_eq!(
        ar.executor().state(GUILD, ActorKey(3)),
        Some(SanctionState::Sanctioned)
    );
}

#[tokio::test]
async fn each_action_type_uses_its_reason() {
    let moderation = Arc::new(RecordingModeration::default());
    let ar = service(moderation.clone());

    for (actor, kind) in [
        (10, ActionType::ChannelDelete),
        (11, ActionType::Ban),
        (12, ActionType::MessageSend),
    ] {
        let threshold = ar.detector().limit(kind).unwrap().threshold as i64;
        for i in 0..threshold {
            ar.handle(event(actor, kind, i * 10)).await;
        }
    }
    let reasons: Vec<_> = moderation.calls().into_iter().map(|c| c.2).collect();
    assert_eq!(
        reasons,
        vec!["mass channel deletion", "rapid multi-ban", "message flood"]
    );
}

#[tokio::test]
async fn unban_reset_allows_another_sanction() {
    let moderation = Arc::new(RecordingModeration::default());
    let ar = service(moderation.clone());
    for i in 0..3 {
        ar.handle(event(4, ActionType::Ban, i * 100)).await;
    }
    assert!(ar.executor().reset(GUILD, ActorKey(4)));

    let report = ar.handle(event(4, ActionType::Ban, 400)).await;
    assert_eq!(report.sanction.unwrap().outcome, SanctionOutcome::Applied);
    assert_eq!(moderation.calls().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_triggers_race_to_a_single_ban() {
    let moderation = Arc::new(RecordingModeration::slow(Duration::from_millis(50)));
    let detector = Arc::new(AbuseDetector::with_defaults());
    let ar = AntiRaid::new(
        detector,
        SanctionExecutor::new(moderation.clone(), Duration::from_secs(5)),
    );

    // 40 wiadomości naraz – wszystko po 15. przekracza próg
    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let ar = ar.clone();
            tokio::spawn(async move { ar.handle(event(5, ActionType::MessageSend, i)).await })
        })
        .collect();
    let reports = futures_util::future::join_all(tasks).await;

    let mut applied = 0;
    let mut suppressed = 0;
    for r in reports {
        match r.unwrap().sanction.map(|s| s.outcome) {
            Some(SanctionOutcome::Applied) => applied += 1,
            Some(SanctionOutcome::Suppressed) => suppressed += 1,
            Some(SanctionOutcome::Failed(e)) => panic!("unexpected failure: {e}"),
            None => {}
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(suppressed, 40 - 15);
    assert_eq!(moderation.calls().len(), 1);
    assert_eq!(ar.detector().count(ActorKey(5), ActionType::MessageSend), 40);
}

#[tokio::test(start_paused = true)]
async fn slow_platform_times_out_and_frees_claim() {
    let moderation = Arc::new(RecordingModeration::slow(Duration::from_secs(60)));
    let ar = AntiRaid::new(
        Arc::new(AbuseDetector::with_defaults()),
        SanctionExecutor::new(moderation.clone(), Duration::from_secs(2)),
    );
    for i in 0..2 {
        ar.handle(event(6, ActionType::Ban, i)).await;
    }
    let report = ar.handle(event(6, ActionType::Ban, 2)).await;
    assert!(matches!(
        report.sanction.unwrap().outcome,
        SanctionOutcome::Failed(fusion_guard::antiraid::SanctionError::Timeout(_))
    ));
    assert_eq!(ar.executor().state(GUILD, ActorKey(6)), None);
}
