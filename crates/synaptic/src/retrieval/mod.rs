//! Query-time retrieval: depth detection, the reflex pipeline, answer
//! reconstruction and context formatting

pub mod context;
pub mod depth;
pub mod pipeline;
pub mod reconstruction;
pub mod types;

pub use context::{format_context, no_match_context};
pub use depth::detect_depth;
pub use pipeline::{ActivationStrategy, PipelineConfig, ReflexPipeline};
pub use reconstruction::{Reconstruction, reconstruct_answer};
pub use types::{DepthLevel, RetrievalResult, RetrievalSubgraph, ScoreBreakdown, SynthesisMethod};
