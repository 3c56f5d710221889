// Recurring event lifecycle
// Month generation, range expansion and request-side actions.

pub mod actions;
pub mod expander;
pub mod generator;

pub use actions::{CreatedEvent, DeleteOutcome, EditScope, EventActions, UpdateOutcome};
pub use expander::RangeExpander;
pub use generator::{InstanceGenerator, MonthPlan, MonthPlanner};
