pub mod feedback;
pub mod fixed_points;
pub mod plans;
pub mod preferences;
pub mod users;
