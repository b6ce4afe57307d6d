mod point_clouds;
pub(crate) use point_clouds::{sample_cube_pointcloud, sample_shifted_pair};
