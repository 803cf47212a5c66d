pub mod liquidity;
pub mod migration;
pub mod quoter;
pub mod sampling;
pub mod series;
pub mod service;
pub mod summary;
pub mod vault;
