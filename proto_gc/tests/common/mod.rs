//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use proto_gc::{Handle, Heap, Trace, Tracer};
use std::cell::RefCell;
use std::rc::Rc;

/// Lifecycle events observed by test objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Finalized(usize),
    FinalizedPaged(usize),
    Dropped(usize),
}

/// Shared event log.
#[derive(Default)]
pub struct Log {
    events: RefCell<Vec<Event>>,
}

impl Log {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Number of times `id` was dropped.
    pub fn drops_of(&self, id: usize) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| **event == Event::Dropped(id))
            .count()
    }

    /// Number of times `id` was finalized.
    pub fn finalizations_of(&self, id: usize) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| **event == Event::Finalized(id))
            .count()
    }

    /// Total number of objects dropped.
    pub fn dropped(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, Event::Dropped(_)))
            .count()
    }

    /// Total number of objects finalized.
    pub fn finalized(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, Event::Finalized(_)))
            .count()
    }
}

/// A managed object with outgoing slots, logging its lifecycle.
pub struct Obj {
    pub id: usize,
    pub slots: RefCell<Vec<Handle<Obj>>>,
    log: Rc<Log>,
}

unsafe impl Trace for Obj {
    fn trace(&self, tracer: &mut dyn Tracer) {
        self.slots.trace(tracer);
    }

    fn finalize(&mut self) {
        self.log.push(Event::Finalized(self.id));
    }

    fn finalize_paged(&mut self) {
        self.log.push(Event::FinalizedPaged(self.id));
    }
}

impl Drop for Obj {
    fn drop(&mut self) {
        self.log.push(Event::Dropped(self.id));
    }
}

/// Allocate a cyclic-capable object.
pub fn obj(heap: &Heap, log: &Rc<Log>, id: usize) -> Handle<Obj> {
    heap.alloc(Obj {
        id,
        slots: RefCell::new(Vec::new()),
        log: Rc::clone(log),
    })
}

/// Allocate an object declared acyclic.
pub fn green_obj(heap: &Heap, log: &Rc<Log>, id: usize) -> Handle<Obj> {
    heap.alloc_acyclic(Obj {
        id,
        slots: RefCell::new(Vec::new()),
        log: Rc::clone(log),
    })
}

/// Add an edge `from -> to`.
pub fn link(from: &Handle<Obj>, to: &Handle<Obj>) {
    from.slots.borrow_mut().push(to.clone());
}

/// Drop every outgoing edge of `from`.
pub fn unlink_all(from: &Handle<Obj>) {
    let slots = std::mem::take(&mut *from.slots.borrow_mut());
    drop(slots);
}

/// Build a ring of `k` objects with ids `0..k` and return a handle to each.
pub fn ring(heap: &Heap, log: &Rc<Log>, k: usize) -> Vec<Handle<Obj>> {
    let nodes: Vec<_> = (0..k).map(|id| obj(heap, log, id)).collect();
    for i in 0..k {
        link(&nodes[i], &nodes[(i + 1) % k]);
    }
    nodes
}
