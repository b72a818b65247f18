mod metrics;

pub use metrics::{cut, imbalance, is_balanced, km1, quality};
