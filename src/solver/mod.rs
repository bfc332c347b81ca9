//! Rate solver - constraint evaluation, rationing and changepoint prediction

pub mod changepoint;
pub mod constraint;
pub mod pool;
pub mod rates;

pub use changepoint::{next_changepoint, Changepoint, ChangepointSource};
pub use constraint::evaluate;
pub use pool::{build_pools, Pool, PoolMap};
pub use rates::{resolve, RateSolution};
