pub mod demand;
pub mod model;
pub mod route_data_ops;
pub mod routing;

pub use demand::*;
pub use model::*;
pub use route_data_ops::*;
pub use routing::*;
