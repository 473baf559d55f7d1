pub mod route_data_bmc;

pub use route_data_bmc::*;
