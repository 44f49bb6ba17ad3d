//! Trace counters and per-node events.
//!
//! Every step returns a [`TraceReport`]. Individual events (foot fallbacks,
//! boundary clamps, walk cap hits) are additionally handed to a
//! [`DiagnosticsSink`]; the default [`LogSink`] forwards them to the `log`
//! facade.

use std::fmt;
use std::sync::Arc;

use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::types::{ElementIndex, NodeIndex};

/// Counters accumulated over one trace call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceReport {
    /// Nodes that went through the foot search.
    pub nodes_traced: usize,
    /// Nodes passed through unchanged because of the Dirichlet mask.
    pub dirichlet_nodes: usize,
    /// Traced nodes whose displacement was exactly zero.
    pub stationary_nodes: usize,
    /// Foot searches that hit the cap and fell back to a first-order step.
    pub foot_fallbacks: usize,
    /// Final samples clamped onto the domain boundary.
    pub boundary_clamps: usize,
    /// Walks that hit the step cap (any walk, not only the final one).
    pub walk_cap_hits: usize,
    /// Boundary leaps taken by all walks.
    pub leaps: usize,
    /// Elements visited by all walks.
    pub walk_steps: usize,
    /// Foot iterations summed over nodes.
    pub foot_iterations: usize,
    /// Substeps covered by this report.
    pub substeps: usize,
    /// Antidiffusion sweeps applied, summed over fields.
    pub antidiffusion_sweeps: usize,
}

impl TraceReport {
    /// Add another report's counters to this one.
    pub fn merge(&mut self, other: &TraceReport) {
        self.nodes_traced += other.nodes_traced;
        self.dirichlet_nodes += other.dirichlet_nodes;
        self.stationary_nodes += other.stationary_nodes;
        self.foot_fallbacks += other.foot_fallbacks;
        self.boundary_clamps += other.boundary_clamps;
        self.walk_cap_hits += other.walk_cap_hits;
        self.leaps += other.leaps;
        self.walk_steps += other.walk_steps;
        self.foot_iterations += other.foot_iterations;
        self.substeps += other.substeps;
        self.antidiffusion_sweeps += other.antidiffusion_sweeps;
    }

    pub fn merged(mut self, other: TraceReport) -> Self {
        self.merge(&other);
        self
    }

    /// Average foot iterations per traced node.
    pub fn mean_foot_iterations(&self) -> f64 {
        if self.nodes_traced == 0 {
            0.0
        } else {
            self.foot_iterations as f64 / self.nodes_traced as f64
        }
    }

    /// True if any node degraded (foot fallback or walk cap hit).
    pub fn has_degradations(&self) -> bool {
        self.foot_fallbacks > 0 || self.walk_cap_hits > 0
    }

    /// One-line human readable summary.
    pub fn summary_line(&self) -> String {
        format!(
            "traced {} nodes ({} dirichlet, {} stationary) in {} substep(s): \
             {:.2} foot iters/node, {} fallbacks, {} boundary clamps, {} walk cap hits, {} leaps",
            self.nodes_traced,
            self.dirichlet_nodes,
            self.stationary_nodes,
            self.substeps,
            self.mean_foot_iterations(),
            self.foot_fallbacks,
            self.boundary_clamps,
            self.walk_cap_hits,
            self.leaps
        )
    }
}

impl fmt::Display for TraceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary_line())
    }
}

/// A noteworthy per-node event.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    /// The foot search hit the iteration cap.
    FootFallback { node: NodeIndex, iterations: usize },
    /// The final sample was clamped onto the boundary.
    BoundaryClamp {
        node: NodeIndex,
        element: ElementIndex,
        point: Vec<f64>,
    },
    /// A walk hit the step cap.
    WalkCapHit {
        node: NodeIndex,
        element: ElementIndex,
        point: Vec<f64>,
    },
}

impl TraceEvent {
    pub fn node(&self) -> NodeIndex {
        match self {
            TraceEvent::FootFallback { node, .. }
            | TraceEvent::BoundaryClamp { node, .. }
            | TraceEvent::WalkCapHit { node, .. } => *node,
        }
    }
}

/// Receiver of trace events; called concurrently when tracing in parallel.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, event: &TraceEvent);

    /// Called once per `advect` with the accumulated report.
    fn step_finished(&self, _report: &TraceReport) {}
}

impl<S: DiagnosticsSink + ?Sized> DiagnosticsSink for Arc<S> {
    fn record(&self, event: &TraceEvent) {
        (**self).record(event);
    }

    fn step_finished(&self, report: &TraceReport) {
        (**self).step_finished(report);
    }
}

/// Forwards events to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn record(&self, event: &TraceEvent) {
        match event {
            TraceEvent::FootFallback { node, iterations } => {
                trace!("{node}: foot search stopped after {iterations} iterations, first-order fallback");
            }
            TraceEvent::BoundaryClamp { node, element, point } => {
                trace!("{node}: foot {point:?} clamped onto boundary of {element}");
            }
            TraceEvent::WalkCapHit { node, element, point } => {
                trace!("{node}: walk to {point:?} hit the step cap in {element}");
            }
        }
    }

    fn step_finished(&self, report: &TraceReport) {
        if report.has_degradations() {
            warn!("{}", report.summary_line());
        } else {
            debug!("{}", report.summary_line());
        }
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn record(&self, _event: &TraceEvent) {}
}

/// Keeps all events and reports in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<TraceEvent>>,
    reports: Mutex<Vec<TraceReport>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, sorted by node for deterministic inspection.
    pub fn events(&self) -> Vec<TraceEvent> {
        let mut events = self.events.lock().clone();
        events.sort_by_key(TraceEvent::node);
        events
    }

    pub fn reports(&self) -> Vec<TraceReport> {
        self.reports.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&TraceEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
        self.reports.lock().clear();
    }
}

impl DiagnosticsSink for CollectingSink {
    fn record(&self, event: &TraceEvent) {
        self.events.lock().push(event.clone());
    }

    fn step_finished(&self, report: &TraceReport) {
        self.reports.lock().push(*report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_mean() {
        let a = TraceReport {
            nodes_traced: 4,
            foot_iterations: 10,
            leaps: 1,
            substeps: 1,
            ..Default::default()
        };
        let b = TraceReport {
            nodes_traced: 6,
            foot_iterations: 20,
            foot_fallbacks: 2,
            substeps: 1,
            ..Default::default()
        };
        let total = a.merged(b);
        assert_eq!(total.nodes_traced, 10);
        assert_eq!(total.foot_fallbacks, 2);
        assert_eq!(total.substeps, 2);
        assert_eq!(total.mean_foot_iterations(), 3.0);
        assert!(total.has_degradations());
        assert!(!a.has_degradations());
    }

    #[test]
    fn test_mean_of_empty_report() {
        assert_eq!(TraceReport::default().mean_foot_iterations(), 0.0);
    }

    #[test]
    fn test_summary_mentions_counts() {
        let report = TraceReport {
            nodes_traced: 12,
            boundary_clamps: 3,
            substeps: 1,
            ..Default::default()
        };
        let line = report.to_string();
        assert!(line.contains("traced 12 nodes"));
        assert!(line.contains("3 boundary clamps"));
    }

    #[test]
    fn test_collecting_sink_through_arc() {
        let sink = Arc::new(CollectingSink::new());
        let shared: Box<dyn DiagnosticsSink> = Box::new(Arc::clone(&sink));
        shared.record(&TraceEvent::FootFallback {
            node: NodeIndex::new(7),
            iterations: 96,
        });
        shared.record(&TraceEvent::BoundaryClamp {
            node: NodeIndex::new(2),
            element: ElementIndex::new(1),
            point: vec![0.0, 1.0],
        });
        shared.step_finished(&TraceReport::default());

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].node(), NodeIndex::new(2));
        assert_eq!(sink.count(|e| matches!(e, TraceEvent::FootFallback { .. })), 1);
        assert_eq!(sink.reports().len(), 1);

        sink.clear();
        assert!(sink.events().is_empty());
    }
}
