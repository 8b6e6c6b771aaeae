use super::*;
use crate::core::automation::defaults::seed_defaults;
use crate::core::automation::notify::StoreNotifier;
use crate::core::clock::ManualClock;
use crate::core::store::types::{LeadFields, NewAppointment};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct RecordingSms {
    sent: std::sync::Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingSms {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SmsSender for RecordingSms {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("gateway unavailable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

struct Harness {
    store: CrmStore,
    clock: ManualClock,
    sms: Arc<RecordingSms>,
    engine: AutomationEngine,
}

const T0: &str = "2026-03-10T09:00:00Z";

async fn harness() -> Harness {
    let store = CrmStore::open_in_memory().unwrap();
    let clock = ManualClock::at(T0);
    seed_defaults(&store, clock.now()).await.unwrap();
    let sms = Arc::new(RecordingSms::default());
    let engine = AutomationEngine::new(
        store.clone(),
        Arc::new(clock.clone()),
        sms.clone(),
        Arc::new(StoreNotifier::new(store.clone())),
        AutomationSettings {
            sender_name: "Agence du Port".to_string(),
            ..Default::default()
        },
    );
    Harness {
        store,
        clock,
        sms,
        engine,
    }
}

impl Harness {
    async fn lead(&self, fields: LeadFields) -> Lead {
        self.store.create_lead(fields, self.clock.now()).await.unwrap()
    }

    async fn call(&self, lead_id: &str, outcome: &str, at: DateTime<Utc>) {
        self.store
            .add_interaction(
                NewInteraction {
                    lead_id: lead_id.to_string(),
                    kind: InteractionKind::Call,
                    direction: Direction::Outbound,
                    outcome: outcome.to_string(),
                    body: None,
                    timestamp: Some(format_ts(at)),
                },
                at,
            )
            .await
            .unwrap();
    }

    async fn sms_log(&self, lead_id: &str) -> Vec<String> {
        self.store
            .list_interactions(lead_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|i| i.kind == InteractionKind::Sms)
            .map(|i| i.outcome)
            .collect()
    }
}

fn contact(name: &str) -> LeadFields {
    LeadFields {
        name: name.to_string(),
        phone: Some("06 12 34 56 78".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn no_answer_fires_once_after_cooldown() {
    let h = harness().await;
    let lead = h.lead(contact("Martin")).await;
    h.call(&lead.id, "no_answer", h.clock.now()).await;

    // Inside the cool-down: nothing yet.
    h.clock.advance(Duration::minutes(5));
    let report = h.engine.run_cycle().await;
    assert_eq!(report.rules_evaluated, 5);
    assert_eq!(report.matches, 0);
    assert!(h.sms.sent().is_empty());

    h.clock.advance(Duration::minutes(15));
    let report = h.engine.run_cycle().await;
    assert_eq!(report.matches, 1);
    assert_eq!(report.actions_executed, 2);
    assert_eq!(report.errors, 0);

    let sent = h.sms.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+33612345678");
    assert!(sent[0].1.starts_with("Bonjour Martin,"));
    assert!(sent[0].1.ends_with("Agence du Port"));
    assert_eq!(h.sms_log(&lead.id).await, vec!["sent"]);

    let updated = h.store.get_lead(&lead.id).await.unwrap().unwrap();
    assert_eq!(updated.next_action.as_deref(), Some("2026-03-12T09:20:00Z"));

    // Later cycles leave the lead alone.
    for _ in 0..3 {
        h.clock.advance(Duration::minutes(30));
        let report = h.engine.run_cycle().await;
        assert_eq!(report.matches, 0);
    }
    assert_eq!(h.sms.sent().len(), 1);
}

#[tokio::test]
async fn duplicate_calls_fire_once_per_cycle() {
    let h = harness().await;
    let lead = h.lead(contact("Martin")).await;
    let at = h.clock.now();
    h.call(&lead.id, "no_answer", at).await;
    h.call(&lead.id, "no_answer", at).await;

    h.clock.advance(Duration::hours(1));
    let report = h.engine.run_cycle().await;
    assert_eq!(report.matches, 1);
    assert_eq!(h.sms.sent().len(), 1);

    h.clock.advance(Duration::hours(1));
    let report = h.engine.run_cycle().await;
    assert_eq!(report.matches, 0);
    assert_eq!(h.sms.sent().len(), 1);
}

#[tokio::test]
async fn answered_call_after_no_answer_cancels_trigger() {
    let h = harness().await;
    let lead = h.lead(contact("Martin")).await;
    h.call(&lead.id, "no_answer", h.clock.now()).await;
    h.call(&lead.id, "answered", h.clock.now() + Duration::minutes(2))
        .await;

    h.clock.advance(Duration::hours(1));
    h.engine.run_cycle().await;
    assert!(h.sms.sent().is_empty());
}

#[tokio::test]
async fn fresh_no_answer_after_answered_call_fires_again() {
    let h = harness().await;
    let lead = h.lead(contact("Martin")).await;
    h.call(&lead.id, "no_answer", h.clock.now()).await;

    h.clock.advance(Duration::hours(1));
    let report = h.engine.run_cycle().await;
    assert_eq!(report.matches, 1);
    assert_eq!(h.sms.sent().len(), 1);

    h.clock.advance(Duration::days(1));
    h.call(&lead.id, "answered", h.clock.now()).await;
    h.engine.run_cycle().await;
    assert_eq!(h.sms.sent().len(), 1);

    h.clock.advance(Duration::days(1));
    let second = h.clock.now();
    h.call(&lead.id, "no_answer", second).await;
    h.clock.advance(Duration::hours(1));
    let report = h.engine.run_cycle().await;
    assert_eq!(report.matches, 1);
    assert_eq!(h.sms.sent().len(), 2);
    assert_eq!(h.sms_log(&lead.id).await, vec!["sent", "sent"]);

    let call = h
        .store
        .list_interactions(&lead.id)
        .await
        .unwrap()
        .into_iter()
        .find(|i| i.kind == InteractionKind::Call && i.timestamp == format_ts(second))
        .unwrap();
    let rule = h
        .store
        .list_rules(false)
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.trigger == "outcome:no_answer")
        .unwrap();
    assert!(
        h.store
            .is_handled(&rule.id, SubjectKind::Interaction, &call.id)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn calls_outside_scan_window_are_ignored() {
    let h = harness().await;
    let lead = h.lead(contact("Martin")).await;
    h.call(&lead.id, "voicemail", h.clock.now()).await;

    h.clock.advance(Duration::days(8));
    h.engine.run_cycle().await;
    assert!(h.sms.sent().is_empty());
}

#[tokio::test]
async fn voicemail_uses_its_template_and_one_day_follow_up() {
    let h = harness().await;
    let lead = h.lead(contact("Bernard")).await;
    h.call(&lead.id, "voicemail", h.clock.now()).await;

    h.clock.advance(Duration::minutes(30));
    h.engine.run_cycle().await;

    let sent = h.sms.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("message vocal"));
    let updated = h.store.get_lead(&lead.id).await.unwrap().unwrap();
    assert_eq!(updated.next_action.as_deref(), Some("2026-03-11T09:30:00Z"));
}

#[tokio::test]
async fn booked_lead_gets_one_confirmation_and_reminders() {
    let h = harness().await;
    let lead = h
        .lead(LeadFields {
            status: LeadStatus::Booked,
            ..contact("Durand")
        })
        .await;
    let appointment = NewAppointment {
        lead_id: Some(lead.id.clone()),
        prospect_id: None,
        title: "Estimation maison".to_string(),
        location: None,
        starts_at: "2026-03-13T14:00:00Z".to_string(),
        ends_at: None,
        notes: None,
    }
    .validate()
    .unwrap();
    h.store
        .create_appointment(appointment, h.clock.now())
        .await
        .unwrap();

    for _ in 0..4 {
        h.engine.run_cycle().await;
        h.clock.advance(Duration::minutes(10));
    }

    let sent = h.sms.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("\"Estimation maison\""));
    assert!(sent[0].1.contains("13/03/2026 14:00 UTC"));
    assert_eq!(h.sms_log(&lead.id).await, vec!["confirmation_sent"]);

    let reminders: Vec<String> = h
        .store
        .list_interactions(&lead.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|i| i.kind == InteractionKind::Reminder)
        .map(|i| i.timestamp)
        .collect();
    assert_eq!(
        reminders,
        vec!["2026-03-12T14:00:00Z", "2026-03-13T12:00:00Z"]
    );
}

#[tokio::test]
async fn booked_lead_with_prior_confirmation_is_left_alone() {
    let h = harness().await;
    let lead = h
        .lead(LeadFields {
            status: LeadStatus::Booked,
            ..contact("Durand")
        })
        .await;
    h.store
        .add_interaction(
            NewInteraction {
                lead_id: lead.id.clone(),
                kind: InteractionKind::Sms,
                direction: Direction::Outbound,
                outcome: "confirmation_sent".to_string(),
                body: None,
                timestamp: None,
            },
            h.clock.now(),
        )
        .await
        .unwrap();

    let report = h.engine.run_cycle().await;
    assert_eq!(report.matches, 0);
    assert!(h.sms.sent().is_empty());
}

#[tokio::test]
async fn flagged_leads_are_never_messaged() {
    let h = harness().await;
    let bad = h
        .lead(LeadFields {
            bad_number: true,
            ..contact("Faux numéro")
        })
        .await;
    let dnc = h
        .lead(LeadFields {
            do_not_contact: true,
            status: LeadStatus::Booked,
            ..contact("Opposition")
        })
        .await;
    h.call(&bad.id, "no_answer", h.clock.now()).await;

    h.clock.advance(Duration::hours(1));
    for _ in 0..2 {
        let report = h.engine.run_cycle().await;
        assert_eq!(report.skipped, 2);
        assert_eq!(report.actions_executed, 0);
    }
    assert!(h.sms.sent().is_empty());
    assert!(h.sms_log(&bad.id).await.is_empty());
    assert!(h.sms_log(&dnc.id).await.is_empty());
}

#[tokio::test]
async fn uncontacted_delivery_notifies_operator_once() {
    let h = harness().await;
    let lead = h.lead(contact("Leroy")).await;
    h.store
        .create_delivery(&lead.id, "Cabinet Morel", h.clock.now())
        .await
        .unwrap();

    h.clock.advance(Duration::hours(23));
    h.engine.run_cycle().await;
    assert!(h.store.list_notifications(false).await.unwrap().is_empty());

    h.clock.advance(Duration::hours(2));
    h.engine.run_cycle().await;
    h.engine.run_cycle().await;

    let notes = h.store.list_notifications(false).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].subject, "Livraison sans contact");
    assert!(notes[0].message.contains("Leroy"));
    assert!(notes[0].message.contains("Cabinet Morel"));
    assert!(notes[0].message.contains("10/03/2026"));
}

#[tokio::test]
async fn scheduled_reminder_does_not_count_as_delivery_contact() {
    let h = harness().await;
    let lead = h.lead(contact("Leroy")).await;
    h.store
        .create_delivery(&lead.id, "Cabinet Morel", h.clock.now())
        .await
        .unwrap();
    h.store
        .add_interaction(
            NewInteraction {
                lead_id: lead.id.clone(),
                kind: InteractionKind::Reminder,
                direction: Direction::Outbound,
                outcome: "scheduled".to_string(),
                body: Some("Relancer".to_string()),
                timestamp: Some(format_ts(h.clock.now() + Duration::days(5))),
            },
            h.clock.now(),
        )
        .await
        .unwrap();

    h.clock.advance(Duration::hours(30));
    h.engine.run_cycle().await;

    let notes = h.store.list_notifications(false).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].subject, "Livraison sans contact");
}

#[tokio::test]
async fn idle_new_lead_notifies_operator() {
    let h = harness().await;
    let idle = h.lead(contact("Garnier")).await;
    let moving = h
        .lead(LeadFields {
            status: LeadStatus::Contacted,
            ..contact("Roux")
        })
        .await;

    h.clock.advance(Duration::days(8));
    let report = h.engine.run_cycle().await;
    assert_eq!(report.matches, 1);

    let notes = h.store.list_notifications(true).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].message.starts_with("Garnier"));
    assert!(!notes[0].message.contains(&moving.name));
    assert!(
        h.store
            .is_handled(&notes[0].rule_id.clone().unwrap(), SubjectKind::Lead, &idle.id)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn broken_rules_are_skipped_without_blocking_others() {
    let h = harness().await;
    let now = h.clock.now();
    h.store
        .create_rule("Inconnue", "outcome:busy", &serde_json::json!([]), true, now)
        .await
        .unwrap();
    h.store
        .create_rule(
            "Cassée",
            "outcome:no_answer",
            &serde_json::json!({ "type": "teleport" }),
            true,
            now,
        )
        .await
        .unwrap();
    let lead = h.lead(contact("Martin")).await;
    h.call(&lead.id, "no_answer", now).await;

    h.clock.advance(Duration::hours(1));
    let report = h.engine.run_cycle().await;
    assert_eq!(report.rules_evaluated, 7);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.matches, 1);
    assert_eq!(h.sms.sent().len(), 1);
}

#[tokio::test]
async fn failed_send_is_retried_next_cycle() {
    let h = harness().await;
    let lead = h.lead(contact("Martin")).await;
    h.call(&lead.id, "no_answer", h.clock.now()).await;
    h.clock.advance(Duration::hours(1));

    h.sms.fail.store(true, Ordering::SeqCst);
    let report = h.engine.run_cycle().await;
    assert_eq!(report.errors, 1);
    assert!(h.sms_log(&lead.id).await.is_empty());

    h.sms.fail.store(false, Ordering::SeqCst);
    let report = h.engine.run_cycle().await;
    assert_eq!(report.errors, 0);
    assert_eq!(h.sms_log(&lead.id).await, vec!["sent"]);
}

#[tokio::test]
async fn lead_without_phone_counts_as_error() {
    let h = harness().await;
    let lead = h
        .lead(LeadFields {
            name: "Sans numéro".to_string(),
            ..Default::default()
        })
        .await;
    h.call(&lead.id, "no_answer", h.clock.now()).await;
    h.clock.advance(Duration::hours(1));

    let report = h.engine.run_cycle().await;
    assert_eq!(report.errors, 1);
    assert_eq!(report.actions_executed, 0);
}

#[tokio::test]
async fn overlapping_cycles_are_refused() {
    let h = harness().await;
    let guard = h.engine.cycle_lock.lock().await;
    assert!(h.engine.is_busy());
    assert!(h.engine.try_run_cycle().await.is_none());
    drop(guard);

    let report = h.engine.try_run_cycle().await.unwrap();
    assert_eq!(report.started_at, T0);
    assert_eq!(h.engine.last_report().await, Some(report));
}

#[tokio::test]
async fn runner_runs_immediately_and_stops() {
    let h = harness().await;
    let mut runner = AutomationRunner::new(h.engine.clone(), std::time::Duration::from_secs(3600));
    assert!(!runner.is_running());

    runner.start();
    assert!(runner.is_running());
    let mut waited = 0;
    while h.engine.last_report().await.is_none() {
        assert!(waited < 200, "first cycle never ran");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        waited += 1;
    }

    runner.stop().await;
    assert!(!runner.is_running());
}
