pub mod constant_product;
pub mod fixed_point;
pub mod slippage;
pub mod stats;
pub mod tick_math;
