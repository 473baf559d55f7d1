pub mod route_planner;

#[cfg(test)]
pub mod test_objects;
