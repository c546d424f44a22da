use contracts::{Event, EventType, SCHEMA_VERSION_V1};
use serde_json::Value;

use super::CoherenceEngine;
use crate::{mix_replay_hash, mix_state_hash, synthetic_timestamp};

impl CoherenceEngine {
    pub(super) fn push_event(
        &mut self,
        event_type: EventType,
        source: &str,
        details: Option<Value>,
    ) -> Event {
        let tick = self.status.current_tick;
        if tick != self.last_event_tick {
            self.last_event_tick = tick;
            self.sequence_in_tick = 0;
        }
        self.sequence_in_tick = self.sequence_in_tick.saturating_add(1);
        let event_id = format!("evt_{tick:06}_{:04}", self.sequence_in_tick);
        let event = Event {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: self.status.run_id.clone(),
            tick,
            created_at: synthetic_timestamp(tick, self.sequence_in_tick),
            event_id: event_id.clone(),
            sequence_in_tick: self.sequence_in_tick,
            event_type,
            source: source.to_string(),
            details,
        };
        self.event_log.push(event.clone());
        self.replay_hash = mix_replay_hash(self.replay_hash, &event_id, tick, self.sequence_in_tick);
        self.state_hash = mix_state_hash(self.state_hash, tick, self.sequence_in_tick);
        event
    }

    /// Full ordered event log since construction.
    pub fn events(&self) -> &[Event] {
        &self.event_log
    }

    pub fn replay_hash(&self) -> u64 {
        self.replay_hash
    }

    pub fn state_hash(&self) -> u64 {
        self.state_hash
    }

    /// Open a cursor over the event log. The subscriber sees every event
    /// appended after this call, in append order, via
    /// [`CoherenceEngine::poll_events`].
    pub fn subscribe(&mut self) -> u64 {
        let id = self.next_subscription_id;
        self.next_subscription_id = self.next_subscription_id.saturating_add(1);
        self.subscriptions.insert(id, self.event_log.len());
        id
    }

    /// Drain everything appended since the subscription's last poll.
    /// Unknown cursors return an empty batch.
    pub fn poll_events(&mut self, subscription_id: u64) -> Vec<Event> {
        let Some(cursor) = self.subscriptions.get_mut(&subscription_id) else {
            return Vec::new();
        };
        let drained = self.event_log[*cursor..].to_vec();
        *cursor = self.event_log.len();
        drained
    }

    /// Cancel a subscription. Returns whether the cursor existed.
    pub fn unsubscribe(&mut self, subscription_id: u64) -> bool {
        self.subscriptions.remove(&subscription_id).is_some()
    }
}
