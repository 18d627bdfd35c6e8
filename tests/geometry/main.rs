mod box_ray_cast;
mod closest_points;
mod compound_reversal;
mod epa_box_box;
mod narrow_phase_scene;
mod shape_cast;
mod surface_queries;
