use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::step::Step;
use crate::turn::Turn;

/// Discriminant for `EventBus::subscribe` / the routing key under which an
/// `EventEnvelope` is dispatched. Separate from the payload so subscriber
/// lists can be keyed without matching on the payload's own tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TurnStart,
    StepExecute,
    StepResult,
    TurnCompleted,
    TurnFailed,
}

/// Type-specific payload carried by an `EventEnvelope`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    #[serde(rename = "turn.start")]
    TurnStart { turn: Turn },
    #[serde(rename = "step.execute")]
    StepExecute { step: Step },
    #[serde(rename = "step.result")]
    StepResult { step: Step },
    #[serde(rename = "turn.completed")]
    TurnCompleted { turn: Turn },
    #[serde(rename = "turn.failed")]
    TurnFailed { turn: Turn },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::TurnStart { .. } => EventType::TurnStart,
            EventPayload::StepExecute { .. } => EventType::StepExecute,
            EventPayload::StepResult { .. } => EventType::StepResult,
            EventPayload::TurnCompleted { .. } => EventType::TurnCompleted,
            EventPayload::TurnFailed { .. } => EventType::TurnFailed,
        }
    }
}

/// The common wrapper for every cross-component event. Every handler
/// invocation receives an owned clone of one of these; there is no
/// redelivery and no persistence — at-most-once delivery per
/// (handler, envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub spec_version: u32,
    pub timestamp: DateTime<Utc>,
    pub trace_id: Uuid,
    pub turn_id: Uuid,
    #[serde(default)]
    pub plan_id: Option<Uuid>,
    #[serde(default)]
    pub step_id: Option<Uuid>,
    pub payload: EventPayload,
}

const SPEC_VERSION: u32 = 1;

impl EventEnvelope {
    pub fn new(
        trace_id: Uuid,
        turn_id: Uuid,
        plan_id: Option<Uuid>,
        step_id: Option<Uuid>,
        payload: EventPayload,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            spec_version: SPEC_VERSION,
            timestamp: Utc::now(),
            trace_id,
            turn_id,
            plan_id,
            step_id,
            payload,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}
