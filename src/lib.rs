// Ideaforge - iterative idea refinement
// Library exports

pub mod config;
pub mod providers;
pub mod refine;
pub mod server;
pub mod session;
