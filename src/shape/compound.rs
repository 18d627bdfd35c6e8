//! Compound shapes holding transformed children.
//!
//! Children are iterated linearly with a per-child bounding box test; an
//! internal acceleration tree belongs to the spatial-index layer, not to
//! this crate.

use crate::bounding_volume::Aabb;
use crate::collision::{
    CollidePointResult, CollideShapeResult, CollideShapeSettings, CollisionCollector,
    CollisionDispatch, RayCast, RayCastResult, RayCastSettings, ShapeCast, ShapeCastResult,
    ShapeCastSettings, ShapeFilter, TransformedShape,
};
use crate::math::{Isometry, Point, Real, Rotation, Translation, Vector};
use crate::shape::{
    scale_helpers, Shape, ShapeError, ShapeRef, ShapeSubType, ShapeType, SubShapeId,
    SubShapeIdCreator, SupportingFace, TrianglesContext,
};
use num::Bounded;
use std::sync::Arc;

/// Settings to build a [`StaticCompound`].
#[derive(Default)]
pub struct StaticCompoundShapeSettings {
    children: Vec<(Point, Rotation, ShapeRef)>,
}

impl StaticCompoundShapeSettings {
    /// Creates empty settings.
    pub fn new() -> StaticCompoundShapeSettings {
        StaticCompoundShapeSettings::default()
    }

    /// Adds a child shape at the given pose (in the space the compound is
    /// created in).
    pub fn add_shape(&mut self, position: Point, rotation: Rotation, shape: ShapeRef) {
        self.children.push((position, rotation, shape));
    }

    /// Builds the compound. At least two children are required; a compound
    /// of one shape should be that shape.
    pub fn build(&self) -> Result<ShapeRef, ShapeError> {
        if self.children.len() < 2 {
            return Err(ShapeError::TooFewChildren(self.children.len()));
        }

        // Volume-weighted center of mass over the children's own centers.
        let mut total_volume = 0.0;
        let mut center_of_mass = Vector::zeros();
        for (position, rotation, shape) in &self.children {
            let volume = shape.volume();
            let child_com = position.coords + rotation * shape.center_of_mass().coords;
            center_of_mass += volume * child_com;
            total_volume += volume;
        }
        if total_volume > 0.0 {
            center_of_mass /= total_volume;
        }

        // Store the children relative to the compound's center of mass,
        // center-of-mass to center-of-mass.
        let children: Vec<CompoundChild> = self
            .children
            .iter()
            .map(|(position, rotation, shape)| CompoundChild {
                position: Point::from(
                    position.coords + rotation * shape.center_of_mass().coords - center_of_mass,
                ),
                rotation: *rotation,
                shape: shape.clone(),
            })
            .collect();

        let sub_shape_bits = num_bits_for(children.len());
        let total_bits = sub_shape_bits
            + children
                .iter()
                .map(|c| c.shape.sub_shape_id_bits_recursive())
                .max()
                .unwrap_or(0);
        if total_bits > SubShapeId::MAX_BITS {
            return Err(ShapeError::SubShapeIdBitsExhausted(total_bits));
        }

        let mut local_bounds = Aabb::new_invalid();
        let mut inner_radius = Real::max_value();
        for child in &children {
            local_bounds = local_bounds.merged(
                &child
                    .shape
                    .local_bounds()
                    .transform_by(&child.local_transform(&Vector::repeat(1.0))),
            );
            inner_radius = inner_radius.min(child.shape.inner_radius());
        }

        Ok(Arc::new(StaticCompound {
            children,
            local_bounds,
            inner_radius,
            center_of_mass: Point::from(center_of_mass),
            sub_shape_bits,
        }))
    }
}

/// Number of bits needed to store a child index.
fn num_bits_for(num_children: usize) -> u32 {
    debug_assert!(num_children >= 2);
    usize::BITS - (num_children - 1).leading_zeros()
}

/// A child of a [`StaticCompound`], stored relative to the compound's
/// center of mass.
pub struct CompoundChild {
    /// The child shape.
    pub shape: ShapeRef,
    /// Center of mass position of the child.
    pub position: Point,
    /// Rotation of the child.
    pub rotation: Rotation,
}

impl CompoundChild {
    /// The child's center-of-mass transform inside the compound, with the
    /// compound's local-space scale applied to the child position.
    #[inline]
    pub fn local_transform(&self, scale: &Vector) -> Isometry {
        Isometry::from_parts(
            Translation::from(scale.component_mul(&self.position.coords)),
            self.rotation,
        )
    }
}

/// A fixed set of posed child shapes behaving as one shape.
pub struct StaticCompound {
    children: Vec<CompoundChild>,
    local_bounds: Aabb,
    inner_radius: Real,
    center_of_mass: Point,
    sub_shape_bits: u32,
}

impl StaticCompound {
    /// The children of this compound.
    #[inline]
    pub fn children(&self) -> &[CompoundChild] {
        &self.children
    }

    /// Number of sub-shape id bits one level of this compound consumes.
    #[inline]
    pub fn sub_shape_id_bits(&self) -> u32 {
        self.sub_shape_bits
    }

    /// The child addressed by the leading bits of `sub_shape_id`, with the
    /// remainder of the id.
    fn pop_child(&self, sub_shape_id: SubShapeId) -> Option<(&CompoundChild, SubShapeId)> {
        let (index, remainder) = sub_shape_id.pop_id(self.sub_shape_bits);
        let child = self.children.get(index as usize);
        debug_assert!(child.is_some(), "invalid sub-shape id");
        child.map(|c| (c, remainder))
    }
}

impl Shape for StaticCompound {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Compound
    }

    fn sub_type(&self) -> ShapeSubType {
        ShapeSubType::StaticCompound
    }

    fn center_of_mass(&self) -> Point {
        self.center_of_mass
    }

    fn local_bounds(&self) -> Aabb {
        self.local_bounds
    }

    fn sub_shape_id_bits_recursive(&self) -> u32 {
        self.sub_shape_bits
            + self
                .children
                .iter()
                .map(|c| c.shape.sub_shape_id_bits_recursive())
                .max()
                .unwrap_or(0)
    }

    fn inner_radius(&self) -> Real {
        self.inner_radius
    }

    fn surface_normal(&self, sub_shape_id: SubShapeId, local_surface_position: &Point) -> Vector {
        let Some((child, remainder)) = self.pop_child(sub_shape_id) else {
            return Vector::y();
        };
        let child_transform = child.local_transform(&Vector::repeat(1.0));
        let child_position = child_transform.inverse_transform_point(local_surface_position);
        child.rotation * child.shape.surface_normal(remainder, &child_position)
    }

    fn supporting_face(
        &self,
        sub_shape_id: SubShapeId,
        direction: &Vector,
        scale: &Vector,
        center_of_mass_transform: &Isometry,
        out_vertices: &mut SupportingFace,
    ) {
        let Some((child, remainder)) = self.pop_child(sub_shape_id) else {
            return;
        };
        let child_transform = child.local_transform(scale);
        child.shape.supporting_face(
            remainder,
            &child.rotation.inverse_transform_vector(direction),
            scale,
            &(center_of_mass_transform * child_transform),
            out_vertices,
        );
    }

    fn cast_ray(
        &self,
        ray: &RayCast,
        sub_shape_id_creator: SubShapeIdCreator,
        hit: &mut RayCastResult,
    ) -> bool {
        let mut had_hit = false;
        for (i, child) in self.children.iter().enumerate() {
            let child_transform = child.local_transform(&Vector::repeat(1.0));

            // Cheap reject on the child's bounds, limited to the best hit
            // found so far.
            let child_bounds = child.shape.local_bounds().transform_by(&child_transform);
            if child_bounds
                .cast_local_ray(&ray.origin, &ray.direction, hit.fraction)
                .is_none()
            {
                continue;
            }

            let child_ray = ray.transformed(&child_transform.inverse());
            let creator = sub_shape_id_creator.push_id(i as u32, self.sub_shape_bits);
            had_hit |= child.shape.cast_ray(&child_ray, creator, hit);
        }
        had_hit
    }

    fn cast_ray_with_collector(
        &self,
        ray: &RayCast,
        settings: &RayCastSettings,
        sub_shape_id_creator: SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<RayCastResult>,
        shape_filter: &dyn ShapeFilter,
    ) {
        for (i, child) in self.children.iter().enumerate() {
            if collector.should_early_out() {
                break;
            }

            let child_transform = child.local_transform(&Vector::repeat(1.0));
            let child_bounds = child.shape.local_bounds().transform_by(&child_transform);
            if child_bounds
                .cast_local_ray(&ray.origin, &ray.direction, collector.early_out_fraction())
                .is_none()
            {
                continue;
            }

            let child_ray = ray.transformed(&child_transform.inverse());
            let creator = sub_shape_id_creator.push_id(i as u32, self.sub_shape_bits);
            child
                .shape
                .cast_ray_with_collector(&child_ray, settings, creator, collector, shape_filter);
        }
    }

    fn collide_point(
        &self,
        point: &Point,
        sub_shape_id_creator: SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<CollidePointResult>,
        shape_filter: &dyn ShapeFilter,
    ) {
        for (i, child) in self.children.iter().enumerate() {
            if collector.should_early_out() {
                break;
            }

            let child_transform = child.local_transform(&Vector::repeat(1.0));
            let child_bounds = child.shape.local_bounds().transform_by(&child_transform);
            if !child_bounds.contains_local_point(point) {
                continue;
            }

            let child_point = child_transform.inverse_transform_point(point);
            let creator = sub_shape_id_creator.push_id(i as u32, self.sub_shape_bits);
            child
                .shape
                .collide_point(&child_point, creator, collector, shape_filter);
        }
    }

    fn collect_transformed_shapes(
        &self,
        bounds: &Aabb,
        transformed_shape: &TransformedShape,
        collector: &mut dyn CollisionCollector<TransformedShape>,
        shape_filter: &dyn ShapeFilter,
    ) {
        for (i, child) in self.children.iter().enumerate() {
            if collector.should_early_out() {
                break;
            }

            let scale = transformed_shape.scale;
            let child_ts = TransformedShape {
                position: transformed_shape.position
                    + transformed_shape.rotation * scale.component_mul(&child.position.coords),
                rotation: transformed_shape.rotation * child.rotation,
                shape: child.shape.clone(),
                scale,
                body_id: transformed_shape.body_id,
                sub_shape_id_creator: transformed_shape
                    .sub_shape_id_creator
                    .push_id(i as u32, self.sub_shape_bits),
            };

            if !child_ts.world_bounds().intersects(bounds) {
                continue;
            }

            child
                .shape
                .collect_transformed_shapes(bounds, &child_ts, collector, shape_filter);
        }
    }

    fn get_triangles_start(
        &self,
        bounds: &Aabb,
        position_com: &Point,
        rotation: &Rotation,
        scale: &Vector,
    ) -> TrianglesContext {
        let mut context = TrianglesContext::new(Vec::new(), false);
        let transform = Isometry::from_parts(Translation::from(position_com.coords), *rotation);
        for child in &self.children {
            let child_transform = transform * child.local_transform(scale);
            let child_position = Point::from(child_transform.translation.vector);
            let child_rotation = child_transform.rotation;
            context.append(child.shape.get_triangles_start(
                bounds,
                &child_position,
                &child_rotation,
                scale,
            ));
        }
        context
    }

    fn volume(&self) -> Real {
        // Overlap between children is not accounted for.
        self.children.iter().map(|c| c.shape.volume()).sum()
    }

    fn is_valid_scale(&self, scale: &Vector) -> bool {
        if scale_helpers::is_zero_scale(scale) {
            return false;
        }
        self.children.iter().all(|child| {
            // A non-uniform scale through a rotated child would shear it.
            (scale_helpers::is_uniform_scale(scale)
                || child.rotation == Rotation::identity())
                && child.shape.is_valid_scale(scale)
        })
    }

    fn make_scale_valid(&self, scale: &Vector) -> Vector {
        let mut scale = scale_helpers::make_non_zero_scale(scale);
        if !self.is_valid_scale(&scale) {
            scale = scale_helpers::make_uniform_scale(&scale);
        }
        scale
    }
}

/// Collides a compound (shape 1) against any other shape by dispatching
/// each child against shape 2.
pub(crate) fn collide_compound_vs_shape(
    dispatch: &CollisionDispatch,
    shape1: &dyn Shape,
    shape2: &dyn Shape,
    scale1: &Vector,
    scale2: &Vector,
    center_of_mass_transform1: &Isometry,
    center_of_mass_transform2: &Isometry,
    sub_shape_id_creator1: SubShapeIdCreator,
    sub_shape_id_creator2: SubShapeIdCreator,
    settings: &CollideShapeSettings,
    collector: &mut dyn CollisionCollector<CollideShapeResult>,
    shape_filter: &dyn ShapeFilter,
) {
    let Some(compound) = shape1.downcast_ref::<StaticCompound>() else {
        debug_assert!(false, "collide_compound_vs_shape called on a non-compound");
        return;
    };

    // Bounds of shape 2 in the compound's space, inflated by the separation
    // distance, to cull children.
    let transform_2_to_1 = center_of_mass_transform1.inverse() * center_of_mass_transform2;
    let mut bounds2_in_1 = shape2
        .local_bounds()
        .scaled(scale2)
        .transform_by(&transform_2_to_1);
    bounds2_in_1.expand_by(settings.max_separation_distance);

    let bits = compound.sub_shape_id_bits();
    for (i, child) in compound.children().iter().enumerate() {
        if collector.should_early_out() {
            break;
        }

        let child_transform = child.local_transform(scale1);
        let child_bounds = child
            .shape
            .local_bounds()
            .scaled(scale1)
            .transform_by(&child_transform);
        if !child_bounds.intersects(&bounds2_in_1) {
            continue;
        }

        dispatch.collide_shape_vs_shape(
            child.shape.as_ref(),
            shape2,
            scale1,
            scale2,
            &(center_of_mass_transform1 * child_transform),
            center_of_mass_transform2,
            sub_shape_id_creator1.push_id(i as u32, bits),
            sub_shape_id_creator2,
            settings,
            collector,
            shape_filter,
        );
    }
}

/// Casts a shape against a compound (shape 2) by dispatching the cast
/// against each child.
pub(crate) fn cast_shape_vs_compound(
    dispatch: &CollisionDispatch,
    shape_cast: &ShapeCast,
    settings: &ShapeCastSettings,
    shape: &ShapeRef,
    scale: &Vector,
    shape_filter: &dyn ShapeFilter,
    center_of_mass_transform2: &Isometry,
    sub_shape_id_creator1: SubShapeIdCreator,
    sub_shape_id_creator2: SubShapeIdCreator,
    collector: &mut dyn CollisionCollector<ShapeCastResult>,
) {
    let Some(compound) = shape.downcast_ref::<StaticCompound>() else {
        debug_assert!(false, "cast_shape_vs_compound called on a non-compound");
        return;
    };

    // The cast is local to the compound: sweep its bounds along the cast
    // direction to cull children.
    let mut sweep_bounds = shape_cast.shape_world_bounds;
    let mut shifted = sweep_bounds;
    shifted.mins += shape_cast.direction;
    shifted.maxs += shape_cast.direction;
    sweep_bounds = sweep_bounds.merged(&shifted);

    let bits = compound.sub_shape_id_bits();
    for (i, child) in compound.children().iter().enumerate() {
        if collector.should_early_out() {
            break;
        }

        let child_transform = child.local_transform(scale);
        let child_bounds = child
            .shape
            .local_bounds()
            .scaled(scale)
            .transform_by(&child_transform);
        if !child_bounds.intersects(&sweep_bounds) {
            continue;
        }

        let child_cast = shape_cast.post_transformed(&child_transform.inverse());
        dispatch.cast_shape_vs_shape_local_space(
            &child_cast,
            settings,
            &child.shape,
            scale,
            shape_filter,
            &(center_of_mass_transform2 * child_transform),
            sub_shape_id_creator1,
            sub_shape_id_creator2.push_id(i as u32, bits),
            collector,
        );
    }
}
