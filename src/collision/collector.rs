//! Early-out-driven accumulation of query results.

use crate::body::Body;
use crate::collision::TransformedShape;
use crate::math::Real;
use smallvec::SmallVec;

/// Trait of query result types that can be fed to a collector.
///
/// Each result kind defines an ordering key, the *early-out fraction*: a
/// smaller fraction is a better hit. Ray and shape casts use the hit
/// fraction; shape-vs-shape overlaps use the negated penetration depth so
/// the deepest hit comes first.
pub trait CollectResult {
    /// The early-out fraction a collector starts out with for this result
    /// kind (nothing collected yet).
    const INITIAL_EARLY_OUT_FRACTION: Real;

    /// The fraction at which no better hit can possibly be found; reaching
    /// it stops the query.
    const SHOULD_EARLY_OUT_FRACTION: Real;

    /// The ordering key of this result.
    fn early_out_fraction(&self) -> Real;
}

/// The mutable bookkeeping every collector carries: the current early-out
/// threshold and the transformed shape being processed (only valid during a
/// single [`CollisionCollector::add_hit`] call).
pub struct CollectorState {
    early_out_fraction: Real,
    context: Option<TransformedShape>,
}

impl CollectorState {
    /// Creates the state for result type `R`.
    pub fn new<R: CollectResult>() -> CollectorState {
        CollectorState {
            early_out_fraction: R::INITIAL_EARLY_OUT_FRACTION,
            context: None,
        }
    }
}

/// Virtual interface that collects multiple results from a collision query.
///
/// Collectors drive cooperative cancellation: once the early-out fraction
/// reaches the result kind's stop sentinel, callers check
/// [`Self::should_early_out`] at each candidate boundary and abandon the
/// remaining work.
pub trait CollisionCollector<R: CollectResult> {
    /// Access to the collector bookkeeping.
    fn state(&self) -> &CollectorState;
    /// Mutable access to the collector bookkeeping.
    fn state_mut(&mut self) -> &mut CollectorState;

    /// Adds a hit. Implementations may assume the caller already verified
    /// the hit beats the current early-out fraction where the query kind
    /// promises that.
    fn add_hit(&mut self, result: R);

    /// Called after a body (identified in the broad phase) is locked and
    /// before any [`Self::add_hit`] for it, so body-level context (e.g. its
    /// velocity) can be captured under lock.
    fn on_body(&mut self, _body: &Body) {}

    /// Called after the last [`Self::add_hit`] for a body; runs before the
    /// caller reads back the early-out fraction so the collector can still
    /// modify it.
    fn on_body_end(&mut self) {}

    /// Resets the early-out fraction to the result kind's initial value.
    fn reset(&mut self) {
        self.state_mut().early_out_fraction = R::INITIAL_EARLY_OUT_FRACTION;
    }

    /// Resets the early-out fraction to a specific value.
    fn reset_early_out_fraction(&mut self, fraction: Real) {
        self.state_mut().early_out_fraction = fraction;
    }

    /// Forces the collision detection to stop as soon as possible.
    fn force_early_out(&mut self) {
        self.state_mut().early_out_fraction = R::SHOULD_EARLY_OUT_FRACTION;
    }

    /// Whether the query should stop: no better hit can be collected.
    fn should_early_out(&self) -> bool {
        self.state().early_out_fraction <= R::SHOULD_EARLY_OUT_FRACTION
    }

    /// The current early-out threshold: hits with a fraction at or above it
    /// can be skipped.
    fn early_out_fraction(&self) -> Real {
        self.state().early_out_fraction
    }

    /// Tightens the early-out fraction. Monotonic: the new fraction must not
    /// be larger than the current one.
    fn update_early_out_fraction(&mut self, fraction: Real) {
        debug_assert!(fraction <= self.state().early_out_fraction);
        self.state_mut().early_out_fraction = fraction;
    }

    /// Sets the transformed shape the next hits belong to.
    fn set_context(&mut self, context: Option<TransformedShape>) {
        self.state_mut().context = context;
    }

    /// The transformed shape the current hit belongs to, if any.
    fn context(&self) -> Option<&TransformedShape> {
        self.state().context.as_ref()
    }
}

/// Collector that stores every hit; call [`Self::sort`] for hits ordered
/// best first.
pub struct AllHitCollector<R: CollectResult> {
    state: CollectorState,
    /// All hits collected so far, in candidate order.
    pub hits: SmallVec<[R; 8]>,
}

impl<R: CollectResult> AllHitCollector<R> {
    /// Creates an empty collector.
    pub fn new() -> Self {
        AllHitCollector {
            state: CollectorState::new::<R>(),
            hits: SmallVec::new(),
        }
    }

    /// Whether any hit was collected.
    pub fn had_hit(&self) -> bool {
        !self.hits.is_empty()
    }

    /// Sorts the hits on their early-out fraction, best hit first.
    pub fn sort(&mut self) {
        self.hits.sort_by(|a, b| {
            a.early_out_fraction()
                .partial_cmp(&b.early_out_fraction())
                .unwrap_or(core::cmp::Ordering::Equal)
        });
    }
}

impl<R: CollectResult> Default for AllHitCollector<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CollectResult> CollisionCollector<R> for AllHitCollector<R> {
    fn state(&self) -> &CollectorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CollectorState {
        &mut self.state
    }

    fn add_hit(&mut self, result: R) {
        self.hits.push(result);
    }
}

/// Collector that keeps only the best (smallest early-out fraction) hit,
/// tightening the threshold as better hits arrive.
pub struct ClosestHitCollector<R: CollectResult> {
    state: CollectorState,
    /// The best hit so far.
    pub hit: Option<R>,
}

impl<R: CollectResult> ClosestHitCollector<R> {
    /// Creates an empty collector.
    pub fn new() -> Self {
        ClosestHitCollector {
            state: CollectorState::new::<R>(),
            hit: None,
        }
    }

    /// Whether a hit was collected.
    pub fn had_hit(&self) -> bool {
        self.hit.is_some()
    }
}

impl<R: CollectResult> Default for ClosestHitCollector<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CollectResult> CollisionCollector<R> for ClosestHitCollector<R> {
    fn state(&self) -> &CollectorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CollectorState {
        &mut self.state
    }

    fn add_hit(&mut self, result: R) {
        let early_out = result.early_out_fraction();
        if self.hit.is_none() || early_out < self.early_out_fraction() {
            self.update_early_out_fraction(early_out);
            self.hit = Some(result);
        }
    }
}

/// Collector that keeps the closest hit for each body the query touches.
/// The early-out threshold resets between bodies (via
/// [`CollisionCollector::on_body`] / [`CollisionCollector::on_body_end`])
/// so every body contributes its own closest hit.
pub struct ClosestHitPerBodyCollector<R: CollectResult> {
    state: CollectorState,
    /// One closest hit per body that was hit, in body order.
    pub hits: Vec<R>,
    current: Option<R>,
    previous_early_out_fraction: Real,
}

impl<R: CollectResult> ClosestHitPerBodyCollector<R> {
    /// Creates an empty collector.
    pub fn new() -> Self {
        ClosestHitPerBodyCollector {
            state: CollectorState::new::<R>(),
            hits: Vec::new(),
            current: None,
            previous_early_out_fraction: R::INITIAL_EARLY_OUT_FRACTION,
        }
    }
}

impl<R: CollectResult> Default for ClosestHitPerBodyCollector<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CollectResult> CollisionCollector<R> for ClosestHitPerBodyCollector<R> {
    fn state(&self) -> &CollectorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CollectorState {
        &mut self.state
    }

    fn on_body(&mut self, _body: &Body) {
        // Remember the threshold, then widen it so this body gets a chance
        // to report its own closest hit.
        self.previous_early_out_fraction = self.early_out_fraction();
        self.reset();
    }

    fn on_body_end(&mut self) {
        if let Some(hit) = self.current.take() {
            self.hits.push(hit);
        }
        let previous = self.previous_early_out_fraction;
        self.reset_early_out_fraction(previous);
    }

    fn add_hit(&mut self, result: R) {
        let early_out = result.early_out_fraction();
        if self.current.is_none() || early_out < self.early_out_fraction() {
            self.update_early_out_fraction(early_out);
            self.current = Some(result);
        }
    }
}

/// Collector that stops the query at the first hit.
pub struct AnyHitCollector<R: CollectResult> {
    state: CollectorState,
    /// The hit that stopped the query.
    pub hit: Option<R>,
}

impl<R: CollectResult> AnyHitCollector<R> {
    /// Creates an empty collector.
    pub fn new() -> Self {
        AnyHitCollector {
            state: CollectorState::new::<R>(),
            hit: None,
        }
    }

    /// Whether a hit was collected.
    pub fn had_hit(&self) -> bool {
        self.hit.is_some()
    }
}

impl<R: CollectResult> Default for AnyHitCollector<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CollectResult> CollisionCollector<R> for AnyHitCollector<R> {
    fn state(&self) -> &CollectorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CollectorState {
        &mut self.state
    }

    fn add_hit(&mut self, result: R) {
        self.hit = Some(result);
        self.force_early_out();
    }
}
