pub mod batch;
pub mod hydrometer;
pub mod maintenance;
pub mod reading;
