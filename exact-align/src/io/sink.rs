use crate::align::types::HitEvent;

/// Per-thread receiver of alignment events.
pub trait HitSink {
    fn report(&mut self, event: HitEvent);
}

/// Builds one sink per worker thread. `slots` is 1 for unpaired runs and 2
/// for paired runs.
pub trait HitSinkFactory: Sync {
    type Sink: HitSink + Send;

    fn create(&self, slots: usize) -> Self::Sink;
}

/// Buffers events in memory; the pipeline drains it after every read so
/// output order follows input order.
#[derive(Debug, Default)]
pub struct VecSink {
    slots: usize,
    events: Vec<HitEvent>,
}

impl VecSink {
    pub fn new(slots: usize) -> Self {
        Self { slots, events: Vec::new() }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn events(&self) -> &[HitEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<HitEvent> {
        std::mem::take(&mut self.events)
    }
}

impl HitSink for VecSink {
    fn report(&mut self, event: HitEvent) {
        self.events.push(event);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VecSinkFactory;

impl HitSinkFactory for VecSinkFactory {
    type Sink = VecSink;

    fn create(&self, slots: usize) -> VecSink {
        VecSink::new(slots)
    }
}
