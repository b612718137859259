//! Master clock and ordered future-event queue.
//!
//! Time is `committed + relative`: the CPU charges bus cycles into `relative`
//! and the run loop commits them in one go once the horizon is reached. Events
//! are plain tags; the owner of the scheduler pops due events and dispatches
//! them itself.

use std::collections::BTreeMap;
use std::fmt;

pub const PRIORITY_IRQ: u32 = 0x00;
pub const PRIORITY_VIDEO: u32 = 0x01;
pub const PRIORITY_STALL: u32 = 0x08;
pub const PRIORITY_DMA: u32 = 0x10;
pub const PRIORITY_GENERIC: u32 = 0x20;

/// Queue position: `(when, priority, insertion order)`.
type Key = (u64, u32, u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired<K> {
    pub id: EventId,
    pub kind: K,
    /// Cycles between the trigger point and the commit that reached it.
    pub late: u64,
}

#[derive(Debug, Clone)]
struct Slot<K> {
    name: &'static str,
    kind: K,
    priority: u32,
    pending: Option<Key>,
}

#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    cycles: u64,
    relative: u64,
    next_event: u64,
    seq: u64,
    slots: Vec<Slot<K>>,
    queue: BTreeMap<Key, EventId>,
}

impl<K: Copy> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy> Scheduler<K> {
    pub fn new() -> Self {
        Self {
            cycles: 0,
            relative: 0,
            next_event: u64::MAX,
            seq: 0,
            slots: Vec::new(),
            queue: BTreeMap::new(),
        }
    }

    /// Creates an event slot. Slots live as long as the scheduler and are
    /// (re)scheduled by id.
    pub fn register(&mut self, name: &'static str, kind: K, priority: u32) -> EventId {
        self.slots.push(Slot {
            name,
            kind,
            priority,
            pending: None,
        });
        EventId(self.slots.len() - 1)
    }

    /// Drops every pending event and rewinds the clock to zero.
    pub fn reset(&mut self) {
        self.queue.clear();
        for slot in &mut self.slots {
            slot.pending = None;
        }
        self.cycles = 0;
        self.relative = 0;
        self.seq = 0;
        self.next_event = u64::MAX;
    }

    /// Current master cycle, including cycles not yet committed.
    pub fn cycle(&self) -> u64 {
        self.cycles + self.relative
    }

    pub fn committed(&self) -> u64 {
        self.cycles
    }

    pub fn relative(&self) -> u64 {
        self.relative
    }

    /// Charges cycles ahead of the committed clock.
    pub fn add_relative(&mut self, cycles: u64) {
        self.relative += cycles;
    }

    /// Distance from the committed clock to the earliest pending event.
    pub fn next_event(&self) -> u64 {
        self.next_event
    }

    pub fn any_event_due(&self) -> bool {
        self.relative >= self.next_event
    }

    /// Jumps the uncommitted delta forward to the next event boundary.
    pub fn skip_to_horizon(&mut self) {
        if self.next_event != u64::MAX && self.relative < self.next_event {
            self.relative = self.next_event;
        }
    }

    /// Schedules `id` to fire `delay` cycles from now. A negative delay lets a
    /// late callback keep its period. Scheduling a pending event moves it.
    pub fn schedule(&mut self, id: EventId, delay: i64) {
        let now = self.cycle() as i64;
        self.insert(id, (now + delay).max(0) as u64);
    }

    pub fn reschedule(&mut self, id: EventId, delay: i64) {
        self.deschedule(id);
        self.schedule(id, delay);
    }

    /// Schedules `id` at an absolute master cycle.
    pub fn schedule_abs(&mut self, id: EventId, when: u64) {
        self.insert(id, when);
    }

    pub fn deschedule(&mut self, id: EventId) {
        if let Some(key) = self.slots[id.0].pending.take() {
            self.queue.remove(&key);
            self.refresh_horizon();
        }
    }

    pub fn is_scheduled(&self, id: EventId) -> bool {
        self.slots[id.0].pending.is_some()
    }

    /// Cycles left before `id` fires, measured from the current master cycle.
    pub fn until(&self, id: EventId) -> Option<u64> {
        self.slots[id.0]
            .pending
            .map(|(when, _, _)| when.saturating_sub(self.cycle()))
    }

    /// Moves the uncommitted delta plus `extra` cycles into the committed clock.
    pub fn advance(&mut self, extra: u64) {
        self.cycles += self.relative + extra;
        self.relative = 0;
        self.refresh_horizon();
    }

    /// Removes the earliest event whose trigger point has been committed.
    pub fn pop_due(&mut self) -> Option<Fired<K>> {
        let (&key, &id) = self.queue.iter().next()?;
        if key.0 > self.cycles {
            return None;
        }
        self.queue.remove(&key);
        let slot = &mut self.slots[id.0];
        slot.pending = None;
        let fired = Fired {
            id,
            kind: slot.kind,
            late: self.cycles - key.0,
        };
        self.refresh_horizon();
        Some(fired)
    }

    pub fn name(&self, id: EventId) -> &'static str {
        self.slots[id.0].name
    }

    fn insert(&mut self, id: EventId, when: u64) {
        let slot = &mut self.slots[id.0];
        if let Some(old) = slot.pending.take() {
            self.queue.remove(&old);
        }
        let key = (when, slot.priority, self.seq);
        self.seq += 1;
        slot.pending = Some(key);
        self.queue.insert(key, id);
        self.refresh_horizon();
    }

    fn refresh_horizon(&mut self) {
        self.next_event = match self.queue.keys().next() {
            Some(&(when, _, _)) => when.saturating_sub(self.cycles),
            None => u64::MAX,
        };
    }
}

impl<K> fmt::Display for Scheduler<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Cycle: {} (+{}), NextEvent: {}",
            self.cycles, self.relative, self.next_event
        )?;
        for (&(when, priority, _), id) in &self.queue {
            writeln!(
                f,
                "  {:<12} when={} (in {}) prio={:#04x}",
                self.slots[id.0].name,
                when,
                when.saturating_sub(self.cycles),
                priority
            )?;
        }
        Ok(())
    }
}
