pub mod capacitance;
pub mod segmentation;
pub mod statistics;
