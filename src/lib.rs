pub mod cine_pipeline;
pub mod logger;
