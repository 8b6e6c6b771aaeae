//! Rule runner: matches trigger conditions against recent CRM rows and
//! executes the action steps bound to each active rule.

pub mod action;
pub mod defaults;
pub mod notify;
pub mod render;
pub mod sms;
pub mod trigger;

#[cfg(test)]
mod tests;

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use self::action::{ActionStep, parse_steps};
use self::notify::OperatorNotifier;
use self::render::render;
use self::sms::SmsSender;
use self::trigger::Trigger;
use crate::core::clock::{Clock, format_ts, parse_ts};
use crate::core::config::CrmConfig;
use crate::core::export::links::normalize_phone;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::pipeline::{Direction, InteractionKind, LeadStatus};
use crate::core::store::types::{Delivery, Interaction, Lead, NewInteraction, Rule};
use crate::core::store::{CrmStore, SubjectKind};

const DELIVERY_CONTACT_WINDOW_HOURS: i64 = 24;
const LEAD_IDLE_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct AutomationSettings {
    /// A call must be at least this old before its outcome fires.
    pub cooldown: Duration,
    /// Calls older than this are ignored.
    pub scan_window: Duration,
    /// Signature available to templates as `{{sender}}`.
    pub sender_name: String,
}

impl AutomationSettings {
    pub fn from_config(config: &CrmConfig) -> Self {
        Self {
            cooldown: Duration::minutes(config.automation.cooldown_minutes),
            scan_window: Duration::days(config.automation.scan_window_days),
            sender_name: config.sms.sender.clone(),
        }
    }
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self::from_config(&CrmConfig::default())
    }
}

/// Counters for one pass over the active rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub started_at: String,
    pub finished_at: String,
    pub rules_evaluated: usize,
    pub matches: usize,
    pub actions_executed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// A row a rule fired on. Outcome triggers fire once per matching call.
enum Subject {
    Lead(Lead),
    Call { call: Interaction, lead: Lead },
    Delivery { delivery: Delivery, lead: Lead },
}

impl Subject {
    fn kind(&self) -> SubjectKind {
        match self {
            Subject::Lead(_) => SubjectKind::Lead,
            Subject::Call { .. } => SubjectKind::Interaction,
            Subject::Delivery { .. } => SubjectKind::Delivery,
        }
    }

    fn id(&self) -> &str {
        match self {
            Subject::Lead(lead) => &lead.id,
            Subject::Call { call, .. } => &call.id,
            Subject::Delivery { delivery, .. } => &delivery.id,
        }
    }

    fn lead(&self) -> &Lead {
        match self {
            Subject::Lead(lead) => lead,
            Subject::Call { lead, .. } => lead,
            Subject::Delivery { lead, .. } => lead,
        }
    }
}

enum Firing {
    Executed(usize),
    Skipped(&'static str),
}

#[derive(Clone)]
pub struct AutomationEngine {
    store: CrmStore,
    clock: Arc<dyn Clock>,
    sms: Arc<dyn SmsSender>,
    notifier: Arc<dyn OperatorNotifier>,
    settings: AutomationSettings,
    cycle_lock: Arc<Mutex<()>>,
    last_report: Arc<RwLock<Option<CycleReport>>>,
}

impl AutomationEngine {
    pub fn new(
        store: CrmStore,
        clock: Arc<dyn Clock>,
        sms: Arc<dyn SmsSender>,
        notifier: Arc<dyn OperatorNotifier>,
        settings: AutomationSettings,
    ) -> Self {
        Self {
            store,
            clock,
            sms,
            notifier,
            settings,
            cycle_lock: Arc::new(Mutex::new(())),
            last_report: Arc::new(RwLock::new(None)),
        }
    }

    /// Run one cycle, waiting for any cycle already in progress.
    pub async fn run_cycle(&self) -> CycleReport {
        let _guard = self.cycle_lock.lock().await;
        self.cycle().await
    }

    /// Run one cycle unless another is in progress.
    pub async fn try_run_cycle(&self) -> Option<CycleReport> {
        let _guard = self.cycle_lock.try_lock().ok()?;
        Some(self.cycle().await)
    }

    pub fn is_busy(&self) -> bool {
        self.cycle_lock.try_lock().is_err()
    }

    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    async fn cycle(&self) -> CycleReport {
        let now = self.clock.now();
        let mut report = CycleReport {
            started_at: format_ts(now),
            ..Default::default()
        };

        match self.store.list_rules(true).await {
            Ok(rules) => {
                for rule in rules {
                    report.rules_evaluated += 1;
                    self.evaluate_rule(&rule, now, &mut report).await;
                }
            }
            Err(e) => {
                error!("Automation cycle could not load rules: {}", e);
                report.errors += 1;
            }
        }

        report.finished_at = format_ts(self.clock.now());
        if report.matches > 0 || report.errors > 0 {
            info!(
                rules = report.rules_evaluated,
                matches = report.matches,
                actions = report.actions_executed,
                skipped = report.skipped,
                errors = report.errors,
                "Automation cycle finished"
            );
        } else {
            debug!(rules = report.rules_evaluated, "Automation cycle found nothing to do");
        }
        *self.last_report.write().await = Some(report.clone());
        report
    }

    async fn evaluate_rule(&self, rule: &Rule, now: DateTime<Utc>, report: &mut CycleReport) {
        let Some(trigger) = Trigger::parse(&rule.trigger) else {
            warn!(rule = %rule.id, trigger = %rule.trigger, "Unknown trigger, skipping rule");
            report.skipped += 1;
            return;
        };
        let steps = match parse_steps(&rule.action) {
            Ok(steps) => steps,
            Err(e) => {
                warn!(rule = %rule.id, error = %e, "Malformed rule action, skipping rule");
                report.skipped += 1;
                return;
            }
        };

        let subjects = match self.find_subjects(trigger, now).await {
            Ok(subjects) => subjects,
            Err(e) => {
                warn!(rule = %rule.id, error = %e, "Trigger query failed");
                report.errors += 1;
                return;
            }
        };

        // At most one firing per lead per rule in a cycle.
        let mut seen = HashSet::new();
        for subject in subjects {
            match self.store.is_handled(&rule.id, subject.kind(), subject.id()).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        rule = %rule.id,
                        subject = %subject.id(),
                        error = %e,
                        "Handled lookup failed"
                    );
                    report.errors += 1;
                    continue;
                }
            }
            if !seen.insert(subject.lead().id.clone()) {
                continue;
            }

            report.matches += 1;
            match self.fire(rule, trigger, &steps, &subject, now).await {
                Ok(Firing::Executed(count)) => report.actions_executed += count,
                Ok(Firing::Skipped(reason)) => {
                    debug!(rule = %rule.id, subject = %subject.id(), "Skipped: {}", reason);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(
                        rule = %rule.id,
                        subject = %subject.id(),
                        error = %e,
                        "Automation action failed"
                    );
                    report.errors += 1;
                }
            }
        }
    }

    async fn find_subjects(&self, trigger: Trigger, now: DateTime<Utc>) -> Result<Vec<Subject>> {
        let mut subjects = Vec::new();
        match trigger {
            Trigger::Call(outcome) => {
                let calls = self
                    .store
                    .latest_calls_with_outcome(
                        outcome.as_str(),
                        now - self.settings.scan_window,
                        now - self.settings.cooldown,
                    )
                    .await?;
                for call in calls {
                    if let Some(lead) = self.store.get_lead(&call.lead_id).await? {
                        subjects.push(Subject::Call { call, lead });
                    }
                }
            }
            Trigger::Booked => {
                for lead in self.store.list_leads(Some(LeadStatus::Booked)).await? {
                    let confirmed = self
                        .store
                        .has_interaction(&lead.id, InteractionKind::Sms, trigger.sms_outcome())
                        .await?;
                    if !confirmed {
                        subjects.push(Subject::Lead(lead));
                    }
                }
            }
            Trigger::DeliveryUncontacted => {
                let cutoff = now - Duration::hours(DELIVERY_CONTACT_WINDOW_HOURS);
                for delivery in self.store.uncontacted_deliveries(cutoff, now).await? {
                    if let Some(lead) = self.store.get_lead(&delivery.lead_id).await? {
                        subjects.push(Subject::Delivery { delivery, lead });
                    }
                }
            }
            Trigger::LeadIdle => {
                let cutoff = now - Duration::days(LEAD_IDLE_DAYS);
                for lead in self
                    .store
                    .leads_created_before(LeadStatus::New, cutoff)
                    .await?
                {
                    subjects.push(Subject::Lead(lead));
                }
            }
        }
        Ok(subjects)
    }

    /// Execute every step for one subject, then record the handled marker.
    async fn fire(
        &self,
        rule: &Rule,
        trigger: Trigger,
        steps: &[ActionStep],
        subject: &Subject,
        now: DateTime<Utc>,
    ) -> Result<Firing> {
        let lead = subject.lead();
        if lead.bad_number {
            return Ok(Firing::Skipped("lead flagged bad number"));
        }
        if lead.do_not_contact {
            return Ok(Firing::Skipped("lead flagged do not contact"));
        }

        let vars = self.template_vars(subject, now).await?;
        let mut executed = 0;
        for step in steps {
            self.execute_step(rule, trigger, step, lead, &vars, now)
                .await
                .map_err(|e| e.context(format!("step {}", step.name())))?;
            executed += 1;
        }

        self.store
            .mark_handled(&rule.id, subject.kind(), subject.id(), now)
            .await?;
        info!(
            rule = %rule.id,
            subject = %subject.id(),
            steps = executed,
            "Rule '{}' fired",
            rule.name
        );
        Ok(Firing::Executed(executed))
    }

    async fn execute_step(
        &self,
        rule: &Rule,
        trigger: Trigger,
        step: &ActionStep,
        lead: &Lead,
        vars: &HashMap<&str, String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match step {
            ActionStep::SendSms { template } => {
                let Some(phone) = lead.phone.as_deref().and_then(normalize_phone) else {
                    bail!("lead has no usable phone number");
                };
                let Some(template) = self.store.get_template(template).await? else {
                    bail!("template '{}' not found", template);
                };
                let body = render(&template.body, vars);
                self.sms.send(&phone, &body).await?;
                self.store
                    .add_interaction(
                        NewInteraction {
                            lead_id: lead.id.clone(),
                            kind: InteractionKind::Sms,
                            direction: Direction::Outbound,
                            outcome: trigger.sms_outcome().to_string(),
                            body: Some(body),
                            timestamp: None,
                        },
                        now,
                    )
                    .await?;
            }
            ActionStep::ScheduleFollowUp { days } => {
                self.store
                    .set_lead_next_action(&lead.id, now + Duration::days(*days), now)
                    .await?;
            }
            ActionStep::ScheduleReminders { hours_before } => {
                let Some(appointment) = self.store.next_appointment_for_lead(&lead.id, now).await?
                else {
                    debug!(lead = %lead.id, "No upcoming appointment, no reminders scheduled");
                    return Ok(());
                };
                let Some(starts_at) = parse_ts(&appointment.starts_at) else {
                    bail!("appointment {} has an invalid start time", appointment.id);
                };
                for hours in hours_before {
                    let at = starts_at - Duration::hours(*hours);
                    if at <= now {
                        continue;
                    }
                    self.store
                        .add_interaction(
                            NewInteraction {
                                lead_id: lead.id.clone(),
                                kind: InteractionKind::Reminder,
                                direction: Direction::Outbound,
                                outcome: "scheduled".to_string(),
                                body: Some(format!(
                                    "Rappel {} h avant : {}",
                                    hours, appointment.title
                                )),
                                timestamp: Some(format_ts(at)),
                            },
                            now,
                        )
                        .await?;
                }
            }
            ActionStep::SetStatus { status } => {
                self.store.set_lead_status(&lead.id, *status, now).await?;
            }
            ActionStep::NotifyOperator { message } => {
                let message = render(message, vars);
                self.notifier
                    .notify(&rule.id, &rule.name, &message, now)
                    .await?;
            }
        }
        Ok(())
    }

    async fn template_vars(
        &self,
        subject: &Subject,
        now: DateTime<Utc>,
    ) -> Result<HashMap<&'static str, String>> {
        let lead = subject.lead();
        let mut vars = HashMap::from([
            ("name", lead.name.clone()),
            ("phone", lead.phone.clone().unwrap_or_default()),
            ("email", lead.email.clone().unwrap_or_default()),
            ("status", lead.status.as_str().to_string()),
            ("sender", self.settings.sender_name.clone()),
        ]);
        if let Subject::Delivery { delivery, .. } = subject {
            vars.insert("recipient", delivery.recipient.clone());
            vars.insert("delivery_date", display_time(&delivery.created_at));
        }
        if let Some(appointment) = self.store.next_appointment_for_lead(&lead.id, now).await? {
            vars.insert("appointment_time", display_time(&appointment.starts_at));
            vars.insert("appointment_title", appointment.title);
            vars.insert(
                "appointment_location",
                appointment.location.unwrap_or_default(),
            );
        }
        Ok(vars)
    }
}

/// `dd/mm/yyyy HH:MM` in UTC for message bodies.
fn display_time(ts: &str) -> String {
    match parse_ts(ts) {
        Some(t) => t.format("%d/%m/%Y %H:%M UTC").to_string(),
        None => ts.to_string(),
    }
}

/// Background loop around an [`AutomationEngine`]: one cycle immediately,
/// then one per interval, until stopped.
pub struct AutomationRunner {
    engine: AutomationEngine,
    interval: std::time::Duration,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl AutomationRunner {
    pub fn new(engine: AutomationEngine, interval: std::time::Duration) -> Self {
        Self {
            engine,
            interval,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.cancel = CancellationToken::new();
        let cancel = self.cancel.clone();
        let engine = self.engine.clone();
        let period = self.interval;

        info!("Starting automation runner every {:?}", period);
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if engine.try_run_cycle().await.is_none() {
                            debug!("Automation cycle already in progress, skipping tick");
                        }
                    }
                }
            }
            info!("Automation runner stopped");
        }));
    }

    /// Cancel the loop and wait for an in-flight cycle to finish.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!("Automation runner task ended abnormally: {}", e);
        }
    }
}

#[async_trait::async_trait]
impl LifecycleComponent for AutomationRunner {
    async fn on_start(&mut self) -> Result<()> {
        self.start();
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        self.stop().await;
        Ok(())
    }
}
