//! Diagnostic events emitted by the cleanup, construction and conflation
//! operators.
//!
//! Operators take a `&mut Diagnostics` sink instead of writing to a global
//! logger only, so their decisions (which join candidate won, which leaf was
//! pruned, where a river endpoint moved) can be inspected by callers and
//! tests. Every recorded event is mirrored to the `log` facade.

use std::fmt;

/// A single decision taken by one of the topology operators.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// A reach ended within tolerance of several inlets; `chosen` won the
    /// tangent-alignment tie-break and `discarded` were left alone.
    AmbiguousJoin {
        reach: usize,
        outlet: [f64; 2],
        chosen: usize,
        discarded: Vec<(usize, f64)>,
    },
    /// A cycle of reaches with no outlet was opened by promoting `reach` to a root.
    CycleBroken { reach: usize },
    /// A short leaf reach was removed.
    PrunedLeaf { length: f64, centroid: [f64; 2] },
    /// A short interior reach was collapsed into its parent.
    MergedReach { length: f64, centroid: [f64; 2] },
    /// A boundary segment endpoint was moved onto a river endpoint.
    BoundaryEndpointMoved {
        segment: usize,
        from: [f64; 2],
        to: [f64; 2],
    },
    /// A river endpoint was moved onto a boundary segment.
    RiverEndpointSnapped {
        segment: usize,
        from: [f64; 2],
        to: [f64; 2],
    },
    /// A split request coincided with an earlier one on the same segment.
    DuplicateSnapDropped { segment: usize, at: [f64; 2] },
    /// A boundary segment was split into `pieces` segments.
    SegmentSplit { segment: usize, pieces: usize },
    /// A reach was dropped before forest construction.
    ReachFiltered { reach: usize, reason: FilterReason },
    /// A whole river was dropped for having too few reaches.
    RiverDropped { reaches: usize },
}

/// Why a reach was filtered out of the input set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    /// The reach does not touch the (buffered) polygon set.
    OutsideBoundary,
    /// The reach is longer than the configured limit.
    TooLong,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::OutsideBoundary => write!(f, "outside boundary"),
            FilterReason::TooLong => write!(f, "too long"),
        }
    }
}

impl DiagnosticEvent {
    fn log(&self) {
        match self {
            DiagnosticEvent::AmbiguousJoin {
                reach,
                outlet,
                chosen,
                discarded,
            } => {
                log::debug!(
                    "reach {reach} ending at {outlet:?} has {} candidate parents; chose {chosen}",
                    discarded.len() + 1
                );
                for (candidate, dot) in discarded {
                    log::debug!("  discarded {candidate} with dot product = {dot}");
                }
            }
            DiagnosticEvent::CycleBroken { reach } => {
                log::warn!("reach {reach} is part of a cycle with no outlet; promoted to root");
            }
            DiagnosticEvent::PrunedLeaf { length, centroid } => {
                log::info!("cleaned leaf segment of length: {length} at centroid {centroid:?}");
            }
            DiagnosticEvent::MergedReach { length, centroid } => {
                log::info!("cleaned inner segment of length {length} at centroid {centroid:?}");
            }
            DiagnosticEvent::BoundaryEndpointMoved { segment, from, to } => {
                log::debug!("moving boundary segment {segment} endpoint {from:?} to river at {to:?}");
            }
            DiagnosticEvent::RiverEndpointSnapped { segment, from, to } => {
                log::info!("snapped river: {from:?} to {to:?} on boundary segment {segment}");
            }
            DiagnosticEvent::DuplicateSnapDropped { segment, at } => {
                log::debug!("dropping duplicate split of segment {segment} at {at:?}");
            }
            DiagnosticEvent::SegmentSplit { segment, pieces } => {
                log::debug!("split boundary segment {segment} into {pieces} pieces");
            }
            DiagnosticEvent::ReachFiltered { reach, reason } => {
                log::debug!("filtered reach {reach}: {reason}");
            }
            DiagnosticEvent::RiverDropped { reaches } => {
                log::info!("removing river with {reaches} reaches");
            }
        }
    }
}

/// Ordered collection of diagnostic events.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    events: Vec<DiagnosticEvent>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event and mirror it to the log.
    pub fn record(&mut self, event: DiagnosticEvent) {
        event.log();
        self.events.push(event);
    }

    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Count events matching a predicate.
    pub fn count(&self, pred: impl Fn(&DiagnosticEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(*e)).count()
    }

    /// Drain all events, leaving the sink empty.
    pub fn take(&mut self) -> Vec<DiagnosticEvent> {
        std::mem::take(&mut self.events)
    }
}
