// branchscope: control-flow graphs, mutation distances and decision probes
//
// Builds one graph per method from a resolved instruction stream, precomputes
// structural distances to mutation sites, plans the probes that report
// decision outcomes at run time and keeps a per-run registry of decisions.

pub mod bytecode;
pub mod cfg;
pub mod config;
pub mod distance;
pub mod error;
pub mod instrument;
pub mod pipeline;
pub mod registry;
pub mod trace;

pub use bytecode::{MethodBody, MethodKey};
pub use cfg::{ControlFlowGraph, Vertex, VertexKind};
pub use config::AnalysisConfig;
pub use distance::{MethodGraph, Path, PathStep};
pub use error::{CfgError, ClassError, ConfigError, FrameError, InstrumentError};
pub use pipeline::{analyze_class, Analyzer, ClassGraphs};
pub use registry::{GraphPool, Registry};
