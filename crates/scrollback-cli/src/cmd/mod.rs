pub mod check;
pub mod completions;
pub mod diff;
pub mod render;
pub mod sim;
