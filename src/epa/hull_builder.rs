//! Incremental convex hull used by the expanding polytope algorithm.
//!
//! Triangles live in a fixed-capacity arena and are addressed by index; a
//! free list recycles slots and a binary heap orders the live triangles by
//! their distance to the origin. Removed triangles are tombstoned instead of
//! being taken out of the heap, since that would require re-heapifying: they
//! are recycled when their heap entry is popped.

use crate::math::{Real, Vector};
use arrayvec::ArrayVec;
use core::cmp::Ordering;
use std::collections::BinaryHeap;

/// Max number of triangles in the hull.
pub const MAX_TRIANGLES: usize = 256;

/// Max number of points in the hull.
///
/// Due to the Euler characteristic we know that V - E + F = 2. We only have
/// triangles which are always fully connected (E = F * 3 / 2), so
/// V = F / 2 + 2, which is approximately F / 2.
pub const MAX_POINTS: usize = MAX_TRIANGLES / 2;

/// Max number of edges tracked while walking a silhouette.
pub const MAX_EDGE_LENGTH: usize = 128;

/// Minimum area of a triangle before it is kept out of the priority queue.
const MIN_TRIANGLE_AREA: Real = 1.0e-10;

/// Epsilon used to determine if a point is interior to a triangle.
const BARYCENTRIC_EPSILON: Real = 1.0e-3;

/// Index of a triangle in the arena.
pub type TriangleId = u32;

/// One directed edge of a hull triangle.
#[derive(Clone, Copy)]
pub struct Edge {
    /// The triangle on the other side of this edge, with the index of the
    /// matching edge inside it.
    pub neighbor: Option<(TriangleId, usize)>,
    /// Index in the point list of the vertex this edge starts at.
    pub start_idx: usize,
}

/// A triangle of the hull with its cached origin-distance data.
pub struct Triangle {
    /// The three edges of this triangle.
    pub edges: [Edge; 3],
    /// Normal of this triangle (not normalized).
    pub normal: Vector,
    /// Center of the triangle.
    pub centroid: Vector,
    /// Distance squared from the origin to the triangle plane, negative when
    /// the origin is on the back side.
    pub closest_len_sqr: Real,
    /// Barycentric coordinates of the closest point to the origin.
    pub lambda: [Real; 2],
    /// Whether `lambda` is relative to vertex 0 (otherwise vertex 1).
    pub lambda_relative_to_0: bool,
    /// Whether the closest point to the origin is interior to the triangle.
    pub closest_point_interior: bool,
    /// Tombstone flag, the triangle is no longer part of the hull.
    pub removed: bool,
    /// Whether the triangle was pushed into the priority queue.
    pub in_queue: bool,
}

impl Triangle {
    fn new(i0: usize, i1: usize, i2: usize, positions: &[Vector]) -> Triangle {
        debug_assert!(i0 != i1 && i0 != i2 && i1 != i2);

        let mut tri = Triangle {
            edges: [
                Edge { neighbor: None, start_idx: i0 },
                Edge { neighbor: None, start_idx: i1 },
                Edge { neighbor: None, start_idx: i2 },
            ],
            normal: Vector::zeros(),
            centroid: Vector::zeros(),
            closest_len_sqr: Real::MAX,
            lambda: [0.0; 2],
            lambda_relative_to_0: true,
            closest_point_interior: false,
            removed: false,
            in_queue: false,
        };

        let v0 = positions[i0];
        let v1 = positions[i1];
        let v2 = positions[i2];

        tri.centroid = (v0 + v1 + v2) / 3.0;

        let e10 = v1 - v0;
        let e20 = v2 - v0;
        let e21 = v2 - v1;

        // The most accurate normal is calculated from the two shortest
        // edges, see https://box2d.org/posts/2014/01/troublesome-triangle/.
        // Picking the shorter of e20/e21 and combining it with e10 suffices.
        let e20_dot_e20 = e20.dot(&e20);
        let e21_dot_e21 = e21.dot(&e21);
        if e20_dot_e20 < e21_dot_e21 {
            // Use edges e10 and e20.
            tri.normal = e10.cross(&e20);

            let normal_len_sqr = tri.normal.norm_squared();
            if normal_len_sqr > MIN_TRIANGLE_AREA {
                // Distance between triangle and origin:
                // distance = (centroid - origin) . normal / |normal|.
                // This is much more accurate than going through barycentric
                // coordinates. The sign records which side the origin is on.
                let c_dot_n = tri.centroid.dot(&tri.normal);
                tri.closest_len_sqr = c_dot_n.abs() * c_dot_n / normal_len_sqr;

                // Closest point to origin with barycentric coordinates:
                //
                // v = y0 + l0 * (y1 - y0) + l1 * (y2 - y0)
                // v . (y1 - y0) = 0
                // v . (y2 - y0) = 0
                //
                // | y10.y10  y20.y10 | | l0 | = | -y0.y10 |
                // | y10.y20  y20.y20 | | l1 |   | -y0.y20 |
                //
                // Solved with Cramer's rule:
                let e10_dot_e10 = e10.norm_squared();
                let e10_dot_e20 = e10.dot(&e20);
                let determinant = e10_dot_e10 * e20_dot_e20 - e10_dot_e20 * e10_dot_e20;

                // A zero determinant means a linearly dependent system: the
                // triangle is degenerate.
                if determinant > 0.0 {
                    let v0_dot_e10 = v0.dot(&e10);
                    let v0_dot_e20 = v0.dot(&e20);
                    let l0 = (e10_dot_e20 * v0_dot_e20 - e20_dot_e20 * v0_dot_e10) / determinant;
                    let l1 = (e10_dot_e20 * v0_dot_e10 - e10_dot_e10 * v0_dot_e20) / determinant;
                    tri.lambda = [l0, l1];
                    tri.lambda_relative_to_0 = true;

                    // For a convex hull containing the origin every face
                    // contains the origin's projection, but with coplanar
                    // triangles only one has it as an interior point. Only
                    // those triangles go into the priority queue so contact
                    // points are computed from the most accurate one.
                    if l0 > -BARYCENTRIC_EPSILON
                        && l1 > -BARYCENTRIC_EPSILON
                        && l0 + l1 < 1.0 + BARYCENTRIC_EPSILON
                    {
                        tri.closest_point_interior = true;
                    }
                }
            }
        } else {
            // Use edges e10 and e21.
            tri.normal = e10.cross(&e21);

            let normal_len_sqr = tri.normal.norm_squared();
            if normal_len_sqr > MIN_TRIANGLE_AREA {
                let c_dot_n = tri.centroid.dot(&tri.normal);
                tri.closest_len_sqr = c_dot_n.abs() * c_dot_n / normal_len_sqr;

                // Same as above but with y1 as the reference vertex:
                //
                // | y10.y10  -y21.y10 | | l0 | = |  y1.y10 |
                // | -y10.y21  y21.y21 | | l1 |   | -y1.y21 |
                let e10_dot_e10 = e10.norm_squared();
                let e10_dot_e21 = e10.dot(&e21);
                let determinant = e10_dot_e10 * e21_dot_e21 - e10_dot_e21 * e10_dot_e21;
                if determinant > 0.0 {
                    let v1_dot_e10 = v1.dot(&e10);
                    let v1_dot_e21 = v1.dot(&e21);
                    let l0 = (e21_dot_e21 * v1_dot_e10 - e10_dot_e21 * v1_dot_e21) / determinant;
                    let l1 = (e10_dot_e21 * v1_dot_e10 - e10_dot_e10 * v1_dot_e21) / determinant;
                    tri.lambda = [l0, l1];
                    tri.lambda_relative_to_0 = false;

                    if l0 > -BARYCENTRIC_EPSILON
                        && l1 > -BARYCENTRIC_EPSILON
                        && l0 + l1 < 1.0 + BARYCENTRIC_EPSILON
                    {
                        tri.closest_point_interior = true;
                    }
                }
            }
        }

        tri
    }

    /// Whether this triangle faces `position`.
    #[inline]
    pub fn is_facing(&self, position: Vector) -> bool {
        debug_assert!(!self.removed);
        self.normal.dot(&(position - self.centroid)) > 0.0
    }

    /// Whether this triangle faces the origin.
    #[inline]
    pub fn is_facing_origin(&self) -> bool {
        debug_assert!(!self.removed);
        self.normal.dot(&self.centroid) < 0.0
    }

    /// The edge following `index`.
    #[inline]
    fn next_edge(&self, index: usize) -> &Edge {
        &self.edges[(index + 1) % 3]
    }
}

/// Heap entry ordering live triangles by their distance to the origin (the
/// heap is a max-heap, so the key is negated to pop the closest first).
#[derive(Copy, Clone, PartialEq)]
struct ClosestTriangle {
    id: TriangleId,
    neg_dist_sqr: Real,
}

impl Eq for ClosestTriangle {}

impl PartialOrd for ClosestTriangle {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClosestTriangle {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        if self.neg_dist_sqr < other.neg_dist_sqr {
            Ordering::Less
        } else if self.neg_dist_sqr > other.neg_dist_sqr {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

/// List of silhouette edges collected while adding a point.
pub type Edges = ArrayVec<Edge, MAX_EDGE_LENGTH>;

/// Triangles created by one call to [`HullBuilder::add_point`].
pub type NewTriangles = ArrayVec<TriangleId, MAX_EDGE_LENGTH>;

/// The incremental hull. Point storage is owned by the caller and passed to
/// each method so the point list can keep growing while the hull exists.
pub struct HullBuilder {
    triangles: Vec<Triangle>,
    free_list: Vec<TriangleId>,
    queue: BinaryHeap<ClosestTriangle>,
}

impl HullBuilder {
    /// Creates an empty builder with preallocated storage.
    pub fn new() -> HullBuilder {
        HullBuilder {
            triangles: Vec::with_capacity(MAX_TRIANGLES),
            free_list: Vec::new(),
            queue: BinaryHeap::with_capacity(MAX_TRIANGLES),
        }
    }

    /// Initializes the hull with two back-to-back triangles over the first
    /// three points.
    pub fn initialize(&mut self, positions: &[Vector], i0: usize, i1: usize, i2: usize) {
        self.triangles.clear();
        self.free_list.clear();
        self.queue.clear();

        let t1 = self.create_triangle(positions, i0, i1, i2).expect("empty arena");
        let t2 = self.create_triangle(positions, i0, i2, i1).expect("empty arena");

        self.link_triangle(t1, 0, t2, 2);
        self.link_triangle(t1, 1, t2, 1);
        self.link_triangle(t1, 2, t2, 0);

        // Both initial triangles always enter the priority queue.
        self.push_queue(t1);
        self.push_queue(t2);
    }

    /// Access a triangle by id.
    #[inline]
    pub fn triangle(&self, id: TriangleId) -> &Triangle {
        &self.triangles[id as usize]
    }

    /// Whether the queue still holds a triangle to process.
    #[inline]
    pub fn has_next_triangle(&self) -> bool {
        !self.queue.is_empty()
    }

    /// The id of the closest triangle in the queue without removing it.
    #[inline]
    pub fn peek_closest_triangle(&self) -> Option<TriangleId> {
        self.queue.peek().map(|e| e.id)
    }

    /// Removes and returns the id of the closest triangle in the queue.
    #[inline]
    pub fn pop_closest_triangle(&mut self) -> Option<TriangleId> {
        self.queue.pop().map(|e| e.id)
    }

    /// Finds the live triangle that `position` is the furthest in front of.
    ///
    /// This only works as long as all points have been added with
    /// `add_point(.., Real::MAX, ..)`.
    pub fn find_facing_triangle(
        &self,
        position: Vector,
        out_best_dist_sqr: &mut Real,
    ) -> Option<TriangleId> {
        let mut best = None;
        let mut best_dist_sqr: Real = 0.0;

        for entry in self.queue.iter() {
            let tri = &self.triangles[entry.id as usize];
            if !tri.removed {
                let dot = tri.normal.dot(&(position - tri.centroid));
                if dot > 0.0 {
                    let dist_sqr = dot * dot / tri.normal.norm_squared();
                    if dist_sqr > best_dist_sqr {
                        best = Some(entry.id);
                        best_dist_sqr = dist_sqr;
                    }
                }
            }
        }

        *out_best_dist_sqr = best_dist_sqr;
        best
    }

    /// Adds point `index` of `positions` to the hull.
    ///
    /// `facing_triangle` must face the new point. All triangles facing the
    /// point are removed, and the hole is filled with triangles connecting
    /// the silhouette to the new point; those are returned in
    /// `out_triangles`. Returns false on failure, in which case the hull is
    /// no longer usable (the old triangles have already been unlinked).
    pub fn add_point(
        &mut self,
        positions: &[Vector],
        facing_triangle: TriangleId,
        index: usize,
        closest_dist_sqr: Real,
        out_triangles: &mut NewTriangles,
    ) -> bool {
        let position = positions[index];

        // Find the edge loop of the triangles that are not facing the new
        // vertex.
        let mut edges = Edges::new();
        if !self.find_edge(facing_triangle, position, &mut edges) {
            return false;
        }

        // Create the new triangles.
        let num_edges = edges.len();
        for i in 0..num_edges {
            let Some(new_id) = self.create_triangle(
                positions,
                edges[i].start_idx,
                edges[(i + 1) % num_edges].start_idx,
                index,
            ) else {
                return false;
            };
            out_triangles.push(new_id);

            let tri = &self.triangles[new_id as usize];
            // Interior-and-closer triangles feed the main algorithm; back
            // facing ones (negative distance) are needed while the origin is
            // not yet inside the hull.
            if (tri.closest_point_interior && tri.closest_len_sqr < closest_dist_sqr)
                || tri.closest_len_sqr < 0.0
            {
                self.push_queue(new_id);
            }
        }

        // Link the edges.
        for i in 0..num_edges {
            if let Some((neighbor, neighbor_edge)) = edges[i].neighbor {
                self.link_triangle(out_triangles[i], 0, neighbor, neighbor_edge);
            }
            self.link_triangle(out_triangles[i], 1, out_triangles[(i + 1) % num_edges], 2);
        }

        true
    }

    /// Returns a triangle slot to the free pool. The triangle must be
    /// removed and unlinked, and must no longer be referenced by the queue.
    pub fn free_triangle(&mut self, id: TriangleId) {
        let tri = &self.triangles[id as usize];
        debug_assert!(tri.removed);
        debug_assert!(tri.edges.iter().all(|e| e.neighbor.is_none()));

        self.free_list.push(id);
    }

    fn create_triangle(
        &mut self,
        positions: &[Vector],
        i0: usize,
        i1: usize,
        i2: usize,
    ) -> Option<TriangleId> {
        let tri = Triangle::new(i0, i1, i2, positions);

        if let Some(id) = self.free_list.pop() {
            self.triangles[id as usize] = tri;
            Some(id)
        } else if self.triangles.len() < MAX_TRIANGLES {
            self.triangles.push(tri);
            Some((self.triangles.len() - 1) as TriangleId)
        } else {
            // Arena full.
            None
        }
    }

    fn push_queue(&mut self, id: TriangleId) {
        let tri = &mut self.triangles[id as usize];
        tri.in_queue = true;
        self.queue.push(ClosestTriangle {
            id,
            neg_dist_sqr: -tri.closest_len_sqr,
        });
    }

    fn link_triangle(&mut self, t1: TriangleId, edge1: usize, t2: TriangleId, edge2: usize) {
        debug_assert!(edge1 < 3 && edge2 < 3);

        // The edges must not be connected yet and their vertices must match.
        debug_assert!(self.triangles[t1 as usize].edges[edge1].neighbor.is_none());
        debug_assert!(self.triangles[t2 as usize].edges[edge2].neighbor.is_none());
        debug_assert!(
            self.triangles[t1 as usize].edges[edge1].start_idx
                == self.triangles[t2 as usize].next_edge(edge2).start_idx
        );
        debug_assert!(
            self.triangles[t2 as usize].edges[edge2].start_idx
                == self.triangles[t1 as usize].next_edge(edge1).start_idx
        );

        self.triangles[t1 as usize].edges[edge1].neighbor = Some((t2, edge2));
        self.triangles[t2 as usize].edges[edge2].neighbor = Some((t1, edge1));
    }

    fn unlink_triangle(&mut self, id: TriangleId) {
        for i in 0..3 {
            if let Some((neighbor, neighbor_edge)) = self.triangles[id as usize].edges[i].neighbor {
                // Validate that the neighbor points back to us.
                debug_assert!(
                    self.triangles[neighbor as usize].edges[neighbor_edge].neighbor == Some((id, i))
                );

                self.triangles[neighbor as usize].edges[neighbor_edge].neighbor = None;
                self.triangles[id as usize].edges[i].neighbor = None;
            }
        }

        // If this triangle never entered the priority queue its slot can be
        // recycled right away; otherwise it is recycled when popped.
        if !self.triangles[id as usize].in_queue {
            self.free_triangle(id);
        }
    }

    /// Given one triangle facing `vertex`, walks the hull and collects the
    /// boundary edges of all triangles facing the vertex, flagging those
    /// triangles as removed. Returns false when the silhouette is not a
    /// single connected loop, which happens when numerical precision runs
    /// out on nearly coplanar triangles.
    fn find_edge(&mut self, facing_triangle: TriangleId, vertex: Vector, out_edges: &mut Edges) -> bool {
        debug_assert!(out_edges.is_empty());
        debug_assert!(self.triangles[facing_triangle as usize].is_facing(vertex));

        self.triangles[facing_triangle as usize].removed = true;

        // Explicit DFS stack instead of recursion.
        struct StackEntry {
            triangle: TriangleId,
            edge: usize,
            iter: isize,
        }
        let mut stack: ArrayVec<StackEntry, MAX_EDGE_LENGTH> = ArrayVec::new();
        stack.push(StackEntry {
            triangle: facing_triangle,
            edge: 0,
            iter: -1, // Incremented before use, so edge 0 comes first.
        });

        // The start index we expect for the next boundary edge; a mismatch
        // means the boundary has split into islands.
        let mut next_expected_start_idx: Option<usize> = None;

        loop {
            let top = stack.len() - 1;
            let entry = &mut stack[top];

            entry.iter += 1;
            if entry.iter >= 3 {
                // All edges visited, this triangle is interior to the
                // silhouette: unlink it and pop the stack.
                let id = entry.triangle;
                let _ = stack.pop();
                self.unlink_triangle(id);
                if stack.is_empty() {
                    break;
                }
            } else {
                let edge_idx = (entry.edge + entry.iter as usize) % 3;
                let triangle = entry.triangle;
                let edge = self.triangles[triangle as usize].edges[edge_idx];
                if let Some((neighbor_id, neighbor_edge)) = edge.neighbor {
                    if !self.triangles[neighbor_id as usize].removed {
                        if self.triangles[neighbor_id as usize].is_facing(vertex) {
                            // Vertex in front: this triangle goes too.
                            self.triangles[neighbor_id as usize].removed = true;
                            stack.push(StackEntry {
                                triangle: neighbor_id,
                                edge: neighbor_edge,
                                // Incremented before use; the edge we came
                                // through needs no revisit.
                                iter: 0,
                            });
                        } else {
                            // The new point is so close to the hull that some
                            // nearly coplanar triangles classified on both
                            // sides: the boundary is disconnected and we
                            // abort the insertion. (When there are islands
                            // there are at least 2 disconnects, so testing
                            // first vs last edge is not needed.)
                            if let Some(expected) = next_expected_start_idx {
                                if edge.start_idx != expected {
                                    return false;
                                }
                            }
                            next_expected_start_idx = Some(
                                self.triangles[neighbor_id as usize].edges[neighbor_edge].start_idx,
                            );

                            // Vertex behind, keep the edge.
                            out_edges.push(edge);
                        }
                    }
                }
            }
        }

        debug_assert!(
            out_edges.is_empty() || Some(out_edges[0].start_idx) == next_expected_start_idx
        );

        // Starting from two back-to-back triangles and adding a point on
        // their plane can classify the point in front of both, removing
        // everything and leaving an empty edge list. Failing the insertion
        // reports no collision (the shapes touch in a single point, zero
        // penetration).
        out_edges.len() >= 3
    }
}

impl Default for HullBuilder {
    fn default() -> Self {
        Self::new()
    }
}
