pub mod applications;
pub mod dashboard;
pub mod roster;
