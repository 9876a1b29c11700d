pub mod config;
pub mod error;
pub mod model;
pub mod server;

pub use config::AppConfig;
pub use error::ServiceError;
pub use model::{
    GenerationRequest, GenerationResponse, GenerationService, Generator, ModelArtifacts,
    SamplingParams, load_generator,
};
pub use server::build_router;
