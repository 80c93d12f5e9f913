// Purpose: Records synchronization events of a scenario run and the relations between them.
//
// Every primitive reports a begin/finish pair per operation. The profile keeps
// a logical clock, a stack of unfinished events per thread, and derives the
// relations a viewer needs: which lock blocks were held, which post woke which
// wait, who created and who joined which thread. Unfinished events can be
// aborted at shutdown, which is how a hung scenario is reported.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::thread::ThreadTag;

mod view;

//-----------------------------------------------------------------------------
// Event model
//-----------------------------------------------------------------------------

/// Kind of synchronization point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOp {
    ThreadCreate,
    ThreadJoin,
    LockAcquire,
    LockTryAcquire,
    LockRelease,
    SemWait,
    SemPost,
    CondWait,
    CondSignal,
    CondBroadcast,
    BarrierWait,
    Access,
}

impl SyncOp {
    /// Name used in profile output.
    pub fn name(&self) -> &'static str {
        match self {
            SyncOp::ThreadCreate => "thread_create",
            SyncOp::ThreadJoin => "thread_join",
            SyncOp::LockAcquire => "lock_acquire",
            SyncOp::LockTryAcquire => "lock_try_acquire",
            SyncOp::LockRelease => "lock_release",
            SyncOp::SemWait => "sem_wait",
            SyncOp::SemPost => "sem_post",
            SyncOp::CondWait => "cond_wait",
            SyncOp::CondSignal => "cond_signal",
            SyncOp::CondBroadcast => "cond_broadcast",
            SyncOp::BarrierWait => "barrier_wait",
            SyncOp::Access => "access",
        }
    }

    /// Trace viewer category.
    pub fn category(&self) -> &'static str {
        match self {
            SyncOp::ThreadCreate | SyncOp::ThreadJoin => "threads",
            SyncOp::LockAcquire | SyncOp::LockTryAcquire | SyncOp::LockRelease => "locks",
            SyncOp::SemWait | SyncOp::SemPost => "semaphores",
            SyncOp::CondWait | SyncOp::CondSignal | SyncOp::CondBroadcast => "condition variables",
            SyncOp::BarrierWait => "barriers",
            SyncOp::Access => "access",
        }
    }
}

/// Lifecycle of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Begun and not yet returned; the thread may be blocked in it.
    Waiting,
    Finished,
    /// Never finished; closed at shutdown.
    Aborted,
}

/// A single recorded synchronization event.
#[derive(Debug, Clone, Serialize)]
pub struct SyncEvent {
    pub op: SyncOp,
    /// Name of the primitive, variable or thread the event acts on.
    pub object: String,
    /// Index of the thread that performed the event.
    pub thread: usize,
    pub value: Option<String>,
    pub start: u64,
    pub stop: Option<u64>,
    pub status: EventStatus,
}

/// A causal edge between two threads (e.g. a post that satisfied a wait).
#[derive(Debug, Clone, Serialize)]
pub struct FlowLink {
    pub name: &'static str,
    pub arg_name: &'static str,
    pub object: String,
    pub from_thread: usize,
    pub from_time: u64,
    pub to_thread: usize,
    pub to_time: u64,
}

/// Interval during which a thread held a lock.
#[derive(Debug, Clone, Serialize)]
pub struct LockBlock {
    pub lock: String,
    pub thread: usize,
    pub start: u64,
    pub stop: u64,
}

/// Instant annotation, e.g. the abort warning.
#[derive(Debug, Clone, Serialize)]
pub struct Mark {
    pub name: String,
    pub category: String,
    pub time: u64,
}

/// An unfinished event, as seen from outside the scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    pub thread: String,
    pub op: SyncOp,
    pub object: String,
    pub since: u64,
}

/// A lock currently held by a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldLock {
    pub thread: String,
    pub lock: String,
}

/// Handle returned by [`SyncProfile::begin`] and consumed by the finish calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct EventTicket(Option<usize>);

//-----------------------------------------------------------------------------
// Recorder state
//-----------------------------------------------------------------------------

#[derive(Debug)]
struct ThreadEntry {
    tag: ThreadTag,
    pending: Vec<usize>,
    held: Vec<(String, u64)>,
}

#[derive(Debug, Default)]
struct ProfileState {
    clock: u64,
    threads: Vec<ThreadEntry>,
    index: HashMap<ThreadId, usize>,
    events: Vec<SyncEvent>,
    links: Vec<FlowLink>,
    blocks: Vec<LockBlock>,
    marks: Vec<Mark>,
    // Posts and signals that found no waiter yet, keyed by source op and object.
    unmatched: HashMap<(SyncOp, String), usize>,
}

impl ProfileState {
    fn tick(&mut self) -> u64 {
        let now = self.clock;
        self.clock += 1;
        now
    }

    fn thread_index(&mut self, tag: ThreadTag) -> usize {
        if let Some(idx) = self.index.get(&tag.id()) {
            return *idx;
        }
        let idx = self.threads.len();
        self.index.insert(tag.id(), idx);
        self.threads.push(ThreadEntry {
            tag,
            pending: Vec::new(),
            held: Vec::new(),
        });
        idx
    }

    fn thread_name(&self, idx: usize) -> String {
        self.threads
            .get(idx)
            .map(|t| t.tag.to_string())
            .unwrap_or_else(|| format!("#{}", idx))
    }

    fn begin(&mut self, op: SyncOp, object: &str) -> usize {
        let thread = self.thread_index(ThreadTag::current());
        let start = self.tick();
        let id = self.events.len();
        self.events.push(SyncEvent {
            op,
            object: object.to_owned(),
            thread,
            value: None,
            start,
            stop: None,
            status: EventStatus::Waiting,
        });
        self.threads[thread].pending.push(id);
        self.link_on_begin(id);
        id
    }

    fn finish(&mut self, id: usize, value: Option<String>) -> bool {
        if self.events[id].status != EventStatus::Waiting {
            // aborted while the thread was still inside the call
            return false;
        }
        let stop = self.tick();
        let event = &mut self.events[id];
        event.status = EventStatus::Finished;
        event.stop = Some(stop);
        if value.is_some() {
            event.value = value;
        }
        let thread = event.thread;
        let op = event.op;
        let object = event.object.clone();

        let pending = &mut self.threads[thread].pending;
        if let Some(pos) = pending.iter().rposition(|e| *e == id) {
            pending.remove(pos);
        }
        if op == SyncOp::LockAcquire {
            self.threads[thread].held.push((object, stop));
        }
        true
    }

    fn link_on_begin(&mut self, id: usize) {
        let event = self.events[id].clone();
        match event.op {
            SyncOp::LockRelease => {
                self.link_pending_tops(&event, SyncOp::LockAcquire, "lock released", "lock");
                self.close_lock_block(&event);
            }
            SyncOp::BarrierWait => {
                self.link_pending_tops(&event, SyncOp::BarrierWait, "barrier reached", "barrier");
            }
            SyncOp::SemPost => {
                self.link_source(id, &[SyncOp::SemWait], "semaphore increment", "semaphore");
            }
            SyncOp::SemWait => {
                self.link_destination(id, SyncOp::SemPost, "semaphore increment", "semaphore");
            }
            SyncOp::CondSignal | SyncOp::CondBroadcast => {
                self.link_source(id, &[SyncOp::CondWait], "condition satisfied", "condition variable");
            }
            SyncOp::CondWait => {
                self.link_destination(id, SyncOp::CondSignal, "condition satisfied", "condition variable");
            }
            _ => {}
        }
    }

    /// Link `event` to every other thread whose innermost pending event is
    /// `waiting_op` on the same object.
    fn link_pending_tops(&mut self, event: &SyncEvent, waiting_op: SyncOp, name: &'static str, arg_name: &'static str) {
        let mut new_links = Vec::new();
        for (idx, entry) in self.threads.iter().enumerate() {
            if idx == event.thread {
                continue;
            }
            let Some(top) = entry.pending.last() else { continue };
            let waiting = &self.events[*top];
            if waiting.op == waiting_op && waiting.object == event.object {
                new_links.push(FlowLink {
                    name,
                    arg_name,
                    object: event.object.clone(),
                    from_thread: event.thread,
                    from_time: event.start,
                    to_thread: idx,
                    to_time: event.start + 1,
                });
            }
        }
        self.links.extend(new_links);
    }

    fn link_source(&mut self, id: usize, waits: &[SyncOp], name: &'static str, arg_name: &'static str) {
        let source = self.events[id].clone();
        let now = self.clock;
        let mut found = false;
        for (idx, entry) in self.threads.iter().enumerate() {
            for pending in &entry.pending {
                let waiting = &self.events[*pending];
                if waits.contains(&waiting.op) && waiting.object == source.object {
                    found = true;
                    self.links.push(FlowLink {
                        name,
                        arg_name,
                        object: source.object.clone(),
                        from_thread: source.thread,
                        from_time: source.start,
                        to_thread: idx,
                        to_time: now,
                    });
                }
            }
        }
        if !found {
            let key = match source.op {
                SyncOp::CondBroadcast => SyncOp::CondSignal,
                op => op,
            };
            self.unmatched.insert((key, source.object), id);
        }
    }

    fn link_destination(&mut self, id: usize, source_op: SyncOp, name: &'static str, arg_name: &'static str) {
        let dest = self.events[id].clone();
        if let Some(src) = self.unmatched.remove(&(source_op, dest.object.clone())) {
            let source = &self.events[src];
            self.links.push(FlowLink {
                name,
                arg_name,
                object: dest.object,
                from_thread: source.thread,
                from_time: source.start,
                to_thread: dest.thread,
                to_time: dest.start,
            });
        }
    }

    fn close_lock_block(&mut self, release: &SyncEvent) {
        let held = &mut self.threads[release.thread].held;
        if let Some(pos) = held.iter().rposition(|(lock, _)| *lock == release.object) {
            let (lock, start) = held.remove(pos);
            self.blocks.push(LockBlock {
                lock,
                thread: release.thread,
                start,
                stop: release.start,
            });
        }
    }
}

//-----------------------------------------------------------------------------
// Public recorder
//-----------------------------------------------------------------------------

/// Shared recorder of synchronization events for one scenario run.
///
/// Cloning is cheap; all clones record into the same profile. A disabled
/// profile accepts every call and records nothing, so it adds no ordering
/// between the threads that report to it.
#[derive(Debug, Clone)]
pub struct SyncProfile {
    inner: Option<Arc<Mutex<ProfileState>>>,
}

impl SyncProfile {
    /// Create a recording profile.
    pub fn new() -> Self {
        Self {
            inner: Some(Arc::new(Mutex::new(ProfileState::default()))),
        }
    }

    /// Create a profile that records nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Record the start of an operation by the calling thread.
    pub fn begin(&self, op: SyncOp, object: &str) -> EventTicket {
        EventTicket(self.inner.as_ref().map(|state| state.lock().begin(op, object)))
    }

    /// Record that the operation returned.
    pub fn finish(&self, ticket: EventTicket) {
        self.finish_inner(ticket, None);
    }

    /// Record that the operation returned with an observed value.
    pub fn finish_with(&self, ticket: EventTicket, value: impl ToString) {
        self.finish_inner(ticket, Some(value.to_string()));
    }

    /// Record the outcome of a non-blocking acquisition.
    ///
    /// A successful attempt opens a lock block just like a blocking acquire.
    pub fn finish_try(&self, ticket: EventTicket, acquired: bool) {
        let (Some(state), EventTicket(Some(id))) = (&self.inner, ticket) else {
            return;
        };
        let mut state = state.lock();
        let value = if acquired { "acquired" } else { "busy" };
        if state.finish(id, Some(value.to_owned())) && acquired {
            let event = &state.events[id];
            let (thread, object, stop) = (event.thread, event.object.clone(), event.stop.unwrap_or_default());
            state.threads[thread].held.push((object, stop));
        }
    }

    /// Finish a thread-creation event and link it to the new thread.
    pub fn finish_create(&self, ticket: EventTicket, child: ThreadTag) {
        let (Some(state), EventTicket(Some(id))) = (&self.inner, ticket) else {
            return;
        };
        let mut state = state.lock();
        let name = child.to_string();
        if !state.finish(id, Some(name.clone())) {
            return;
        }
        let child_idx = state.thread_index(child);
        let creator = &state.events[id];
        let link = FlowLink {
            name: "thread started",
            arg_name: "thread",
            object: name,
            from_thread: creator.thread,
            from_time: creator.start,
            to_thread: child_idx,
            to_time: creator.stop.unwrap_or(creator.start),
        };
        state.links.push(link);
    }

    /// Finish a join event and link the joined thread's end to the joiner.
    pub fn finish_join(&self, ticket: EventTicket, joined: ThreadId) {
        let (Some(state), EventTicket(Some(id))) = (&self.inner, ticket) else {
            return;
        };
        let mut state = state.lock();
        if !state.finish(id, None) {
            return;
        }
        let Some(joined_idx) = state.index.get(&joined).copied() else {
            return;
        };
        let joiner = &state.events[id];
        let stop = joiner.stop.unwrap_or(joiner.start);
        let link = FlowLink {
            name: "thread finished",
            arg_name: "thread",
            object: joiner.object.clone(),
            from_thread: joined_idx,
            from_time: stop.saturating_sub(1),
            to_thread: joiner.thread,
            to_time: stop,
        };
        state.links.push(link);
    }

    /// Record an instantaneous access to a shared variable.
    pub fn access(&self, object: &str, value: impl ToString) {
        if let Some(state) = &self.inner {
            let mut state = state.lock();
            let id = state.begin(SyncOp::Access, object);
            state.finish(id, Some(value.to_string()));
        }
    }

    /// Abort every unfinished event and close every open lock block.
    ///
    /// Returns the number of aborted events. A single global warning mark is
    /// added when anything was aborted.
    pub fn abort_pending(&self) -> usize {
        let Some(state) = &self.inner else { return 0 };
        let mut state = state.lock();
        let now = state.tick();
        let mut aborted = 0;
        let mut blocks = Vec::new();
        for (idx, entry) in state.threads.iter_mut().enumerate() {
            for (lock, start) in entry.held.drain(..) {
                blocks.push(LockBlock {
                    lock,
                    thread: idx,
                    start,
                    stop: now,
                });
            }
        }
        let pending: Vec<usize> = state
            .threads
            .iter_mut()
            .flat_map(|entry| entry.pending.drain(..).rev().collect::<Vec<_>>())
            .collect();
        for id in pending {
            let event = &mut state.events[id];
            event.status = EventStatus::Aborted;
            event.stop = Some(now);
            aborted += 1;
        }
        state.blocks.extend(blocks);
        if aborted > 0 {
            warn!(aborted, "unfinished synchronization events at shutdown");
            state.marks.push(Mark {
                name: "Event(s) aborted".to_owned(),
                category: "WARNING".to_owned(),
                time: now,
            });
        }
        aborted
    }

    //-------------------------------------------------------------------------
    // Snapshots
    //-------------------------------------------------------------------------

    /// Every event recorded so far, in start order.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.inner
            .as_ref()
            .map(|state| state.lock().events.clone())
            .unwrap_or_default()
    }

    /// Unfinished events of every thread, innermost last.
    pub fn pending(&self) -> Vec<PendingEvent> {
        let Some(state) = &self.inner else { return Vec::new() };
        let state = state.lock();
        let mut out = Vec::new();
        for (idx, entry) in state.threads.iter().enumerate() {
            for id in &entry.pending {
                let event = &state.events[*id];
                out.push(PendingEvent {
                    thread: state.thread_name(idx),
                    op: event.op,
                    object: event.object.clone(),
                    since: event.start,
                });
            }
        }
        out
    }

    /// Locks currently held, per thread.
    pub fn held_locks(&self) -> Vec<HeldLock> {
        let Some(state) = &self.inner else { return Vec::new() };
        let state = state.lock();
        let mut out = Vec::new();
        for (idx, entry) in state.threads.iter().enumerate() {
            for (lock, _) in &entry.held {
                out.push(HeldLock {
                    thread: state.thread_name(idx),
                    lock: lock.clone(),
                });
            }
        }
        out
    }

    /// Number of recorded events per operation kind.
    pub fn occurrences(&self) -> BTreeMap<SyncOp, usize> {
        let mut counts = BTreeMap::new();
        if let Some(state) = &self.inner {
            for event in &state.lock().events {
                *counts.entry(event.op).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn links(&self) -> Vec<FlowLink> {
        self.inner
            .as_ref()
            .map(|state| state.lock().links.clone())
            .unwrap_or_default()
    }

    pub fn lock_blocks(&self) -> Vec<LockBlock> {
        self.inner
            .as_ref()
            .map(|state| state.lock().blocks.clone())
            .unwrap_or_default()
    }

    pub fn marks(&self) -> Vec<Mark> {
        self.inner
            .as_ref()
            .map(|state| state.lock().marks.clone())
            .unwrap_or_default()
    }

    /// Display names of the threads seen so far, indexed like [`SyncEvent::thread`].
    pub fn thread_names(&self) -> Vec<String> {
        let Some(state) = &self.inner else { return Vec::new() };
        let state = state.lock();
        (0..state.threads.len()).map(|idx| state.thread_name(idx)).collect()
    }

    fn finish_inner(&self, ticket: EventTicket, value: Option<String>) {
        if let (Some(state), EventTicket(Some(id))) = (&self.inner, ticket) {
            state.lock().finish(id, value);
        }
    }
}
