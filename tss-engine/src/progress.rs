//! Optional instrumentation hook every protocol implementation calls into
//! at each stage/round boundary. A no-op by default; pass a concrete
//! [`Tracer`] (e.g. [`PerfProfiler`]) to `set_progress_tracer` to observe
//! protocol execution (spec §4.5 "StateListener").

/// Instrumentation callback trait. All methods have no-op defaults so
/// implementors only need to override the ones they care about.
pub trait Tracer {
    fn protocol_begins(&mut self) {}
    fn protocol_ends(&mut self) {}
    fn round_begins(&mut self) {}
    fn stage(&mut self, _name: &'static str) {}
    fn send_msg(&mut self) {}
    fn msg_sent(&mut self) {}
    fn receive_msgs(&mut self) {}
    fn msgs_received(&mut self) {}
}

impl Tracer for () {}

/// Blanket forwarding impl so call sites can write `tracer.stage("...")`
/// directly on an `Option<&mut dyn Tracer>`, without unwrapping first.
impl Tracer for Option<&mut dyn Tracer> {
    fn protocol_begins(&mut self) {
        if let Some(t) = self {
            t.protocol_begins()
        }
    }
    fn protocol_ends(&mut self) {
        if let Some(t) = self {
            t.protocol_ends()
        }
    }
    fn round_begins(&mut self) {
        if let Some(t) = self {
            t.round_begins()
        }
    }
    fn stage(&mut self, name: &'static str) {
        if let Some(t) = self {
            t.stage(name)
        }
    }
    fn send_msg(&mut self) {
        if let Some(t) = self {
            t.send_msg()
        }
    }
    fn msg_sent(&mut self) {
        if let Some(t) = self {
            t.msg_sent()
        }
    }
    fn receive_msgs(&mut self) {
        if let Some(t) = self {
            t.receive_msgs()
        }
    }
    fn msgs_received(&mut self) {
        if let Some(t) = self {
            t.msgs_received()
        }
    }
}

/// A stage the profiler recorded, with its wall-clock duration.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: &'static str,
    pub duration: core::time::Duration,
}

/// Collects wall-clock timings of every stage/round, for offline analysis
/// of where a protocol run spent its time.
#[derive(Default)]
pub struct PerfProfiler {
    stages: Vec<Stage>,
    current: Option<(&'static str, std::time::Instant)>,
    protocol_started: Option<std::time::Instant>,
}

impl PerfProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    fn close_current(&mut self) {
        if let Some((name, started)) = self.current.take() {
            self.stages.push(Stage {
                name,
                duration: started.elapsed(),
            });
        }
    }

    /// Stages recorded so far, in order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Total wall-clock time between `protocol_begins` and `protocol_ends`.
    pub fn total_time(&self) -> Option<core::time::Duration> {
        self.protocol_started.map(|t| t.elapsed())
    }
}

impl Tracer for PerfProfiler {
    fn protocol_begins(&mut self) {
        self.protocol_started = Some(std::time::Instant::now());
    }
    fn protocol_ends(&mut self) {
        self.close_current();
    }
    fn stage(&mut self, name: &'static str) {
        self.close_current();
        self.current = Some((name, std::time::Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_tracer_is_a_no_op() {
        let mut tracer: Option<&mut dyn Tracer> = None;
        tracer.protocol_begins();
        tracer.stage("does nothing");
        tracer.protocol_ends();
    }

    #[test]
    fn profiler_records_stages() {
        let mut profiler = PerfProfiler::new();
        let mut tracer: Option<&mut dyn Tracer> = Some(&mut profiler);
        tracer.protocol_begins();
        tracer.stage("first");
        tracer.stage("second");
        tracer.protocol_ends();
        assert_eq!(profiler.stages().len(), 2);
        assert_eq!(profiler.stages()[0].name, "first");
    }
}
