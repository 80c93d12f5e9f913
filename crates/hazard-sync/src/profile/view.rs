// Purpose: Renders a sync profile as a text report or as a Chrome trace-viewer document.

use std::fmt::Write as _;

use serde_json::{json, Map, Value};

use super::{EventStatus, SyncProfile};

/// Width of the operation column in the occurrence table.
const OCCURRENCE_COLUMN: usize = 24;

impl SyncProfile {
    /// Plain-text report: one line per completed event, then the occurrence
    /// table and any warning marks.
    pub fn render_text(&self) -> String {
        let names = self.thread_names();
        let mut out = String::new();

        for event in self.events() {
            let thread = names.get(event.thread).map(String::as_str).unwrap_or("?");
            let status = match event.status {
                EventStatus::Waiting => "waiting",
                EventStatus::Finished => "",
                EventStatus::Aborted => "aborted",
            };
            let _ = write!(out, "{:>6}  {:<16} {} {}", event.start, thread, event.op.name(), event.object);
            if let Some(value) = &event.value {
                let _ = write!(out, " = {}", value);
            }
            if !status.is_empty() {
                let _ = write!(out, " [{}]", status);
            }
            out.push('\n');
        }

        out.push_str("\nSynchronization point occurrences:\n");
        for (op, count) in self.occurrences() {
            let _ = writeln!(out, "{:<width$}{}", op.name(), count, width = OCCURRENCE_COLUMN);
        }

        for mark in self.marks() {
            let _ = writeln!(out, "{}: {} (scope global, time {})", mark.category, mark.name, mark.time);
        }
        out
    }

    /// Chrome trace-viewer document (`{"traceEvents": [...]}`).
    ///
    /// Events become B/E slices, lock hold intervals become "locked by"
    /// slices, causal links become s/f flow pairs and marks become global
    /// instant events. Thread ids start at 1.
    pub fn chrome_trace(&self) -> Value {
        let mut trace = ChromeTrace::default();

        for event in self.events() {
            let Some(stop) = event.stop else { continue };
            let mut args = Map::new();
            args.insert("object".into(), json!(event.object));
            if let Some(value) = &event.value {
                args.insert("value".into(), json!(value));
            }
            args.insert("status".into(), json!(event.status));
            trace.slice(event.op.category(), event.op.name(), event.thread, event.start, stop, Value::Object(args));
        }

        for block in self.lock_blocks() {
            let name = format!("locked by {}", block.lock);
            trace.slice(
                "synchronization flow",
                &name,
                block.thread,
                block.start,
                block.stop,
                json!({ "lock": block.lock }),
            );
        }

        for link in self.links() {
            let mut args = Map::new();
            args.insert(link.arg_name.into(), json!(link.object));
            trace.flow(link.name, link.from_thread, link.from_time, link.to_thread, link.to_time, Value::Object(args));
        }

        for mark in self.marks() {
            trace.instant(&mark.name, &mark.category, mark.time);
        }

        json!({ "traceEvents": trace.events })
    }
}

#[derive(Default)]
struct ChromeTrace {
    events: Vec<Value>,
    next_id: u64,
}

impl ChromeTrace {
    fn event(&self, name: &str, category: &str, thread: usize, phase: &str, ts: u64, args: Value) -> Value {
        json!({
            "cat": category,
            "name": name,
            "pid": 1,
            "tid": thread + 1,
            "ph": phase,
            "id": self.next_id,
            "ts": ts,
            "args": args,
        })
    }

    fn slice(&mut self, category: &str, name: &str, thread: usize, start: u64, stop: u64, args: Value) {
        self.next_id += 1;
        let begin = self.event(name, category, thread, "B", start, args);
        let end = self.event(name, category, thread, "E", stop.max(start), json!({}));
        self.events.push(begin);
        self.events.push(end);
    }

    fn flow(&mut self, name: &str, from_thread: usize, from: u64, to_thread: usize, to: u64, args: Value) {
        self.next_id += 1;
        let category = "synchronization flow";
        let start = self.event(name, category, from_thread, "s", from, args);
        let finish = self.event(name, category, to_thread, "f", to.max(from), json!({}));
        self.events.push(start);
        self.events.push(finish);
    }

    fn instant(&mut self, name: &str, category: &str, ts: u64) {
        self.next_id += 1;
        let mut mark = self.event(name, category, 0, "I", ts, json!({}));
        mark["s"] = json!("g");
        self.events.push(mark);
    }
}
