// Purpose: Identifies the calling OS thread for ownership checks and profiling.

use std::fmt;
use std::thread::{self, ThreadId};

/// Identity of an OS thread: its id plus the name it was spawned with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadTag {
    id: ThreadId,
    name: Option<String>,
}

impl ThreadTag {
    /// Tag of the calling thread.
    pub fn current() -> Self {
        let current = thread::current();
        Self {
            id: current.id(),
            name: current.name().map(str::to_owned),
        }
    }

    /// Tag for a thread known by id and name, e.g. one just spawned.
    pub fn new(id: ThreadId, name: Option<String>) -> Self {
        Self { id, name }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// True when this tag names the calling thread.
    pub fn is_current(&self) -> bool {
        self.id == thread::current().id()
    }
}

impl fmt::Display for ThreadTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{:?}", self.id),
        }
    }
}
