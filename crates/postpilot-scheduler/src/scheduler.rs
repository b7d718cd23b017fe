//! Timer registry.
//!
//! Each bound task arms one timer per rule. Cron rules recur per their
//! expression; date rules fire once; a one-shot already in the past is
//! skipped without error. Every fire spawns an independent invocation,
//! so a slow or failing action never delays other timers (or the same
//! task's next fire).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use postpilot_store::Store;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::binder::BoundTask;
use crate::rules::ScheduleRule;

/// Armed timer registry.
pub struct Scheduler {
    timers: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Arm timers for every rule of every task.
    pub fn schedule(tasks: Vec<BoundTask>, store: Arc<Store>) -> Self {
        let now = Utc::now();
        let mut timers = Vec::new();

        for task in tasks {
            let task = Arc::new(task);
            for rule in task.rules.clone() {
                match rule {
                    ScheduleRule::Date { timestamp } if timestamp <= now => {
                        debug!(
                            "task '{}' one-shot {} is in the past, not armed",
                            task.task_name, timestamp
                        );
                    }
                    ScheduleRule::Date { timestamp } => {
                        info!("  - {} -> {}", task.task_name, timestamp);
                        timers.push(tokio::spawn(run_once(
                            Arc::clone(&task),
                            Arc::clone(&store),
                            timestamp,
                        )));
                    }
                    ScheduleRule::Cron {
                        expression,
                        schedule,
                    } => {
                        if let Some(next) = schedule.upcoming(Utc).next() {
                            info!("  - {} [{}] -> {}", task.task_name, expression, next);
                        }
                        timers.push(tokio::spawn(run_recurring(
                            Arc::clone(&task),
                            Arc::clone(&store),
                            schedule,
                        )));
                    }
                }
            }
        }

        Self { timers }
    }

    /// Number of armed timers.
    pub fn armed_timers(&self) -> usize {
        self.timers.len()
    }

    /// Abort all armed timers. In-flight invocations are not awaited.
    pub fn shutdown(&self) {
        for timer in &self.timers {
            timer.abort();
        }
    }
}

async fn run_once(task: Arc<BoundTask>, store: Arc<Store>, at: DateTime<Utc>) {
    sleep_until(at).await;
    fire(task, store);
}

async fn run_recurring(task: Arc<BoundTask>, store: Arc<Store>, schedule: cron::Schedule) {
    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            debug!("task '{}' cron schedule exhausted", task.task_name);
            return;
        };
        sleep_until(next).await;
        fire(Arc::clone(&task), Arc::clone(&store));
    }
}

/// Sleep until a wall-clock instant (no-op when it already passed).
async fn sleep_until(at: DateTime<Utc>) {
    if let Ok(wait) = (at - Utc::now()).to_std() {
        tokio::time::sleep(wait).await;
    }
}

/// Spawn one invocation. The timer task never awaits it; completion and
/// failure are observed only through logs.
fn fire(task: Arc<BoundTask>, store: Arc<Store>) {
    tokio::spawn(async move {
        info!("running {} for {}", task.task_name, task.context.account_name);
        match task.action.execute(&task.context, &store).await {
            Ok(()) => info!("{} done", task.task_name),
            Err(e) => error!("{} failed: {e}", task.task_name),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse_rules;
    use async_trait::async_trait;
    use postpilot_actions::{Action, ActionContext};
    use postpilot_channels::{FileStoreClient, InstagramSession};
    use postpilot_core::config::{Config, ScheduleSpec, TaskDefinition};
    use postpilot_core::error::{PostPilotError, Result};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Sends the merged args of every invocation down a channel.
    struct RecordingAction {
        tx: mpsc::UnboundedSender<Value>,
    }

    #[async_trait]
    impl Action for RecordingAction {
        fn name(&self) -> &str {
            "recording"
        }

        fn load_from_config(&self, _config: &Config, _task_def: &TaskDefinition) -> Result<Value> {
            Ok(json!({}))
        }

        async fn execute(&self, ctx: &ActionContext, _store: &Store) -> Result<()> {
            self.tx.send(ctx.args.clone()).ok();
            Ok(())
        }
    }

    struct FailingAction;

    #[async_trait]
    impl Action for FailingAction {
        fn name(&self) -> &str {
            "failing"
        }

        fn load_from_config(&self, _config: &Config, _task_def: &TaskDefinition) -> Result<Value> {
            Ok(json!({}))
        }

        async fn execute(&self, _ctx: &ActionContext, _store: &Store) -> Result<()> {
            Err(PostPilotError::Task("boom".into()))
        }
    }

    fn context(account: &str) -> ActionContext {
        ActionContext {
            account_name: account.to_string(),
            session: Arc::new(InstagramSession::new(account)),
            files: Arc::new(FileStoreClient::new("test-token")),
            args: json!({ "account_name": account }),
        }
    }

    fn rules_of(mode: &str, spec: &str) -> Vec<ScheduleRule> {
        parse_rules(&[ScheduleSpec {
            mode: mode.to_string(),
            spec: spec.to_string(),
        }])
        .expect("rule parses")
    }

    fn bound(task_name: &str, action: Arc<dyn Action>, rules: Vec<ScheduleRule>) -> BoundTask {
        BoundTask {
            task_name: task_name.to_string(),
            action,
            context: context("A1"),
            rules,
        }
    }

    #[tokio::test]
    async fn test_past_one_shot_arms_no_timer() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let task = bound(
            "t1",
            Arc::new(RecordingAction { tx }),
            rules_of("date", "2001-01-01T00:00:00Z"),
        );

        let scheduler = Scheduler::schedule(vec![task], Arc::new(Store::new()));
        assert_eq!(scheduler.armed_timers(), 0);
    }

    #[tokio::test]
    async fn test_cron_rule_arms_exactly_one_timer() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let task = bound(
            "t1",
            Arc::new(RecordingAction { tx }),
            rules_of("cron", "0 * * * *"),
        );

        let scheduler = Scheduler::schedule(vec![task], Arc::new(Store::new()));
        assert_eq!(scheduler.armed_timers(), 1);
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_one_timer_per_rule() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut rules = rules_of("cron", "0 * * * *");
        rules.extend(rules_of("date", "2099-01-01T00:00:00Z"));
        let task = bound("t1", Arc::new(RecordingAction { tx }), rules);

        let scheduler = Scheduler::schedule(vec![task], Arc::new(Store::new()));
        assert_eq!(scheduler.armed_timers(), 2);
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_future_one_shot_fires_with_account_args() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let soon = Utc::now() + chrono::Duration::seconds(30);
        let task = bound(
            "t1",
            Arc::new(RecordingAction { tx }),
            vec![ScheduleRule::Date { timestamp: soon }],
        );

        let scheduler = Scheduler::schedule(vec![task], Arc::new(Store::new()));
        assert_eq!(scheduler.armed_timers(), 1);

        let args = tokio::time::timeout(Duration::from_secs(120), rx.recv())
            .await
            .expect("invocation fired")
            .expect("channel open");
        assert_eq!(args["account_name"], json!("A1"));
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_invocation_does_not_break_other_timers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let soon = Utc::now() + chrono::Duration::seconds(10);
        let later = Utc::now() + chrono::Duration::seconds(20);

        let failing = bound(
            "bad",
            Arc::new(FailingAction),
            vec![ScheduleRule::Date { timestamp: soon }],
        );
        let healthy = bound(
            "good",
            Arc::new(RecordingAction { tx }),
            vec![ScheduleRule::Date { timestamp: later }],
        );

        let scheduler = Scheduler::schedule(vec![failing, healthy], Arc::new(Store::new()));
        assert_eq!(scheduler.armed_timers(), 2);

        let args = tokio::time::timeout(Duration::from_secs(120), rx.recv())
            .await
            .expect("healthy task fired")
            .expect("channel open");
        assert_eq!(args["account_name"], json!("A1"));
        scheduler.shutdown();
    }
}
