//! Plan management and read paths over stored itineraries.

pub mod export;
pub mod service;

pub use export::{PlanView, export_plan, export_title, load_plan_view, plan_itinerary};
pub use service::{
    MAX_TRIP_DAYS, PlanInput, add_fixed_point, archive_plan, create_plan, delete_plan,
    list_fixed_points, list_plans, owned_plan, remove_fixed_point, set_preferences,
    submit_feedback, update_plan, validate_fixed_point,
};
