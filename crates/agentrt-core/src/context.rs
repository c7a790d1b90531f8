//! Per-turn state store: `turn_id -> Turn` and `plan_id -> Plan`, each
//! behind its own per-entity lock so a step result and a turn timeout can
//! never race on the same Turn.
//!
//! Grounded on the gateway's `SessionLockMap` keyed-mutex-map idiom
//! (`crates/gateway/src/runtime/session_lock.rs`), adapted from a pure lock
//! gate into a combined storage+lock map: here the map owns the Turn
//! itself rather than guarding access to storage kept elsewhere.

use std::collections::HashMap;
use std::sync::Arc;

use agentrt_domain::plan::Plan;
use agentrt_domain::turn::Turn;
use agentrt_memory::MemoryManager;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Maintains the map of live turns and their plans, and hands out the
/// `MemoryManager` the core's step executor bridges `MEMORY_OP` steps
/// through.
pub struct ContextManager {
    turns: RwLock<HashMap<Uuid, Arc<AsyncMutex<Turn>>>>,
    plans: RwLock<HashMap<Uuid, Plan>>,
    memory: Arc<MemoryManager>,
}

impl ContextManager {
    pub fn new(memory: Arc<MemoryManager>) -> Self {
        Self {
            turns: RwLock::new(HashMap::new()),
            plans: RwLock::new(HashMap::new()),
            memory,
        }
    }

    pub fn create_turn(&self, turn: Turn) {
        let turn_id = turn.turn_id;
        self.turns.write().insert(turn_id, Arc::new(AsyncMutex::new(turn)));
    }

    /// Insert `turn` only if no turn with this id exists yet. Returns
    /// `false` without touching the existing entry when one does, so a
    /// caller that just re-sent a `turn_id` it used before can detect the
    /// duplicate and hand back the original turn instead of clobbering it.
    pub fn create_turn_if_absent(&self, turn: Turn) -> bool {
        use std::collections::hash_map::Entry;
        match self.turns.write().entry(turn.turn_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(AsyncMutex::new(turn)));
                true
            }
        }
    }

    pub async fn get_turn(&self, turn_id: Uuid) -> Option<Turn> {
        let entry = self.turns.read().get(&turn_id).cloned()?;
        let guard = entry.lock().await;
        Some(guard.clone())
    }

    /// Overwrite a turn's full state. Used when a caller already holds a
    /// locally-mutated copy and wants to write it back wholesale, rather
    /// than going through `update_turn`'s mutator closure.
    pub async fn save_turn(&self, turn: Turn) {
        let entry = {
            let guard = self.turns.read();
            guard.get(&turn.turn_id).cloned()
        };
        match entry {
            Some(entry) => *entry.lock().await = turn,
            None => self.create_turn(turn),
        }
    }

    /// Mutate a turn under its per-turn lock, so a concurrent step result
    /// and a turn-timeout watchdog can never interleave their writes.
    /// Returns `None` if no turn with this id has been created.
    pub async fn update_turn(&self, turn_id: Uuid, mutator: impl FnOnce(&mut Turn)) -> Option<Turn> {
        let entry = self.turns.read().get(&turn_id).cloned()?;
        let mut guard = entry.lock().await;
        mutator(&mut guard);
        Some(guard.clone())
    }

    pub fn save_plan(&self, plan: Plan) {
        self.plans.write().insert(plan.plan_id, plan);
    }

    pub fn get_plan(&self, plan_id: Uuid) -> Option<Plan> {
        self.plans.read().get(&plan_id).cloned()
    }

    pub fn get_memory_manager(&self) -> Arc<MemoryManager> {
        self.memory.clone()
    }

    /// Completed turns belonging to `session_id`, oldest first, capped at
    /// `limit`. Used by TurnManager to assemble conversational history for
    /// a new turn on the same session.
    pub async fn history_for_session(&self, session_id: &str, limit: u32) -> Vec<Turn> {
        let entries: Vec<Arc<AsyncMutex<Turn>>> = self.turns.read().values().cloned().collect();
        let mut matching = Vec::new();
        for entry in entries {
            let turn = entry.lock().await.clone();
            if turn.session_id.as_deref() == Some(session_id) && turn.status.is_terminal() {
                matching.push(turn);
            }
        }
        matching.sort_by_key(|t| t.created_at);
        let skip = matching.len().saturating_sub(limit as usize);
        matching.split_off(skip)
    }
}
