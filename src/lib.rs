pub mod error;
pub mod config;
pub mod tensor;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod preprocess;
pub mod classify;
pub mod encode;

// Convenience re-exports
pub use error::{Error, ErrorKind, Result};
pub use config::{ServerConfig, TaxonomySource};
pub use tensor::{BatchTensor, ImageTensor, StageTensor, ValueRange};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::{Network, ModelMetadata, InputType};
pub use preprocess::{preprocess, PipelineOptions, PreprocessedImage};
pub use classify::oracle::{ClassificationOracle, DenseOracle};
pub use classify::taxonomy::LabelTaxonomy;
pub use classify::meanings::{MeaningTable, NO_MEANING};
pub use classify::orchestrator::{classify, classify_image, ClassificationResult, Prediction, ServiceContext};
pub use encode::ResultEncoder;
