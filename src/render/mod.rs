pub mod encode;
pub mod engine;
pub mod pool;
pub mod sink;
pub mod target;
