//! Progress lines on stderr, driven by the event bus

use colored::Colorize;
use council_application::EventSubscription;
use council_domain::{Event, EventKind};
use serde_json::Value;

/// Prints one line per notable event until the bus goes away
pub struct ProgressReporter {
    subscription: EventSubscription,
}

impl ProgressReporter {
    pub fn new(subscription: EventSubscription) -> Self {
        Self { subscription }
    }

    pub async fn run(mut self) {
        while let Some(event) = self.subscription.recv().await {
            let Some(line) = describe(&event) else {
                continue;
            };
            let line = match event.kind {
                EventKind::RunFailed | EventKind::StepFailed | EventKind::WorkerFailed => {
                    line.red().to_string()
                }
                kind if kind.is_problem() => line.yellow().to_string(),
                EventKind::StepCompleted | EventKind::RunCompleted => line.green().to_string(),
                EventKind::DecisionRecorded => line.bold().to_string(),
                _ => line.dimmed().to_string(),
            };
            eprintln!("{}", line);
        }
    }
}

fn text(payload: &Value, key: &str) -> String {
    match &payload[key] {
        Value::String(s) => s.clone(),
        Value::Null => "?".to_string(),
        other => other.to_string(),
    }
}

/// Plain-text description of an event, or `None` for chatty ones
pub fn describe(event: &Event) -> Option<String> {
    let step = event.step_name.as_deref().unwrap_or("-");
    let worker = event.worker_id.as_ref().map_or("-", |w| w.as_str());
    let p = &event.payload;

    let line = match event.kind {
        EventKind::RunStarted => {
            let steps: Vec<String> = p["steps"]
                .as_array()
                .map(|steps| steps.iter().filter_map(|s| s.as_str().map(String::from)).collect())
                .unwrap_or_default();
            format!("run started: {} step(s) [{}]", steps.len(), steps.join(", "))
        }
        EventKind::RunCompleted => format!("run completed: {} step(s)", text(p, "steps")),
        EventKind::RunFailed => format!("run failed: {}", text(p, "error")),
        EventKind::StepStarted => format!("> {} ({})", step, text(p, "kind")),
        EventKind::StepCompleted => format!(
            "< {} {} in {}ms",
            step,
            text(p, "status"),
            text(p, "duration_ms")
        ),
        EventKind::StepFailed => format!(
            "! {} failed under '{}': {}",
            step,
            text(p, "policy"),
            text(p, "error")
        ),
        EventKind::StepRetry => format!(
            "! {} retrying (attempt {}/{}) in {}ms",
            step,
            text(p, "attempt"),
            text(p, "max_attempts"),
            text(p, "delay_ms")
        ),
        EventKind::StepFallback => format!("! {} recovered by fallback", step),
        EventKind::WorkerFailed => format!("  {} failed in {}: {}", worker, step, text(p, "error")),
        EventKind::DebatePhase => format!("  {}: {}", step, text(p, "phase")),
        EventKind::DebateConverged => format!("  {} converged in round {}", step, text(p, "round")),
        EventKind::DecisionRecorded => format!(
            "  {} decided: {} ({}, {})",
            step,
            worker,
            text(p, "method"),
            text(p, "resolution")
        ),
        EventKind::ContextSummarized => format!("  history summarized ({} folded)", text(p, "folded")),
        EventKind::ContextOverflowWarning => format!(
            "! history over budget, dropped {} message(s): {}",
            text(p, "dropped"),
            text(p, "reason")
        ),
        EventKind::WorkerStarted
        | EventKind::WorkerCompleted
        | EventKind::ProposalSubmitted
        | EventKind::VoteCast => return None,
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_application::EventBus;
    use council_domain::{EventDraft, WorkerId};
    use serde_json::json;

    #[test]
    fn test_describe_progress_events() {
        let bus = EventBus::new();
        let started = bus.publish(
            EventDraft::new(EventKind::RunStarted).payload(json!({ "steps": ["draft", "review"] })),
        );
        assert_eq!(describe(&started).unwrap(), "run started: 2 step(s) [draft, review]");

        let step = bus.publish(
            EventDraft::new(EventKind::StepStarted)
                .step("draft")
                .payload(json!({ "index": 0, "kind": "solo", "policy": "halt" })),
        );
        assert_eq!(describe(&step).unwrap(), "> draft (solo)");

        let done = bus.publish(
            EventDraft::new(EventKind::StepCompleted)
                .step("draft")
                .payload(json!({ "status": "success", "duration_ms": 12 })),
        );
        assert_eq!(describe(&done).unwrap(), "< draft success in 12ms");
    }

    #[test]
    fn test_describe_problems_and_decisions() {
        let bus = EventBus::new();
        let retry = bus.publish(
            EventDraft::new(EventKind::StepRetry)
                .step("draft")
                .payload(json!({ "attempt": 2, "max_attempts": 3, "delay_ms": 500 })),
        );
        assert_eq!(
            describe(&retry).unwrap(),
            "! draft retrying (attempt 2/3) in 500ms"
        );

        let decision = bus.publish(
            EventDraft::new(EventKind::DecisionRecorded)
                .step("review")
                .worker(WorkerId::new("critic"))
                .payload(json!({ "method": "majority", "resolution": "votes" })),
        );
        assert_eq!(
            describe(&decision).unwrap(),
            "  review decided: critic (majority, votes)"
        );
    }

    #[test]
    fn test_chatty_events_are_skipped() {
        let bus = EventBus::new();
        for kind in [EventKind::WorkerStarted, EventKind::VoteCast, EventKind::ProposalSubmitted] {
            assert!(describe(&bus.publish(EventDraft::new(kind))).is_none());
        }
    }

    #[test]
    fn test_missing_payload_fields_render_as_placeholder() {
        let bus = EventBus::new();
        let failed = bus.publish(EventDraft::new(EventKind::RunFailed));
        assert_eq!(describe(&failed).unwrap(), "run failed: ?");
    }
}
