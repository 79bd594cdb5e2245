pub mod grid;
pub mod record;
pub mod route;

pub use grid::*;
pub use record::*;
pub use route::*;
