// Domain layer: command vocabulary, request values and the ports the planner talks through.

pub mod model;
pub mod ports;
