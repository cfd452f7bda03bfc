//! Control surface for a running sentinel: health, the watched-address
//! registry, pipeline status and a synthetic alert for checking delivery.

pub mod routes;
pub mod state;
