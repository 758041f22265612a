//! Per-class analysis pass
//!
//! Build, precompute and instrument every usable method of one class, then
//! record the results in the registry. Runs once per class; the result is
//! frozen in [`ClassGraphs`] and only read afterwards.

use crate::bytecode::MethodBody;
use crate::cfg::{minimize, validate, Cfg, CfgBuilder};
use crate::config::AnalysisConfig;
use crate::distance::MethodGraph;
use crate::error::{CfgError, ClassError, InstrumentError};
use crate::instrument::{instrument, InstrumentedMethod};
use crate::registry::{GraphPool, Registry};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything the pass produced for one method
#[derive(Debug, Clone)]
pub struct MethodAnalysis {
    pub graph: MethodGraph,
    /// `None` when instrumentation is disabled, the method was already
    /// instrumented, or its probes could not be encoded
    pub instrumented: Option<InstrumentedMethod>,
    /// Decision-only graph, when `minimize_graphs` is set
    pub minimal: Option<Cfg>,
}

/// What happened to one method of the class
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodOutcome {
    Analyzed,
    /// Flow analysis failed; the method is left uninstrumented
    Unanalyzable { reason: String },
    /// Filtered out by access flags, name or configuration
    Excluded,
}

/// Frozen result of analyzing one class, keyed by method id
#[derive(Debug, Clone, Default)]
pub struct ClassGraphs {
    pub methods: BTreeMap<String, MethodAnalysis>,
    pub outcomes: BTreeMap<String, MethodOutcome>,
}

impl ClassGraphs {
    pub fn method(&self, method_id: &str) -> Option<&MethodAnalysis> {
        self.methods.get(method_id)
    }

    pub fn outcome(&self, method_id: &str) -> Option<&MethodOutcome> {
        self.outcomes.get(method_id)
    }

    /// Decision vertices over all analyzed methods
    pub fn decision_count(&self) -> usize {
        self.methods
            .values()
            .map(|m| m.graph.decision_vertices().count())
            .sum()
    }
}

/// Run the pass over `bodies`, all of which must belong to `class_name`
///
/// Every included body is validated before the registry is touched, so a
/// malformed body fails the whole class without leaving partial entries
/// behind and a later retry starts clean. An unanalyzable method is
/// recorded as such and the remaining methods are processed. Which methods
/// are usable, constructors included, is the registry's policy.
pub fn analyze_class(
    class_name: &str,
    bodies: &[MethodBody],
    registry: &Registry,
    config: &AnalysisConfig,
) -> Result<ClassGraphs, ClassError> {
    let included = check_class(class_name, bodies, registry, config)?;

    let mut result = ClassGraphs::default();
    let builder = CfgBuilder::new(registry);

    for (body, included) in bodies.iter().zip(included) {
        let method_id = body.method_id();
        if !included {
            debug!(class = class_name, method = %method_id, "method excluded");
            result.outcomes.insert(method_id, MethodOutcome::Excluded);
            continue;
        }

        let cfg = match builder.build(body) {
            Ok(cfg) => cfg,
            Err(err @ CfgError::Unanalyzable { .. }) => {
                warn!(class = class_name, method = %method_id, error = %err, "method left uninstrumented");
                result.outcomes.insert(
                    method_id,
                    MethodOutcome::Unanalyzable {
                        reason: err.to_string(),
                    },
                );
                continue;
            }
            Err(source) => {
                return Err(ClassError::Malformed {
                    class: class_name.to_string(),
                    method: method_id,
                    source,
                })
            }
        };

        registry.record_usable(class_name, &method_id);
        if cfg.is_branchless() {
            registry.record_branchless(class_name, &method_id);
        }

        let minimal = config.minimize_graphs.then(|| minimize(cfg.graph()));
        let graph = if config.compute_distances {
            MethodGraph::precompute(cfg)
        } else {
            MethodGraph::structural(cfg)
        };

        let instrumented = if config.instrument {
            instrument_once(&graph, body, registry)
        } else {
            None
        };

        result.outcomes.insert(method_id.clone(), MethodOutcome::Analyzed);
        result.methods.insert(
            method_id,
            MethodAnalysis {
                graph,
                instrumented,
                minimal,
            },
        );
    }

    info!(
        class = class_name,
        methods = result.methods.len(),
        decisions = result.decision_count(),
        "class analyzed"
    );
    Ok(result)
}

/// Reject foreign and malformed bodies; returns which bodies to analyze
fn check_class(
    class_name: &str,
    bodies: &[MethodBody],
    registry: &Registry,
    config: &AnalysisConfig,
) -> Result<Vec<bool>, ClassError> {
    let mut included = Vec::with_capacity(bodies.len());
    for body in bodies {
        if body.class_name != class_name {
            return Err(ClassError::ForeignMethod {
                class: class_name.to_string(),
                method: body.method_id(),
                declared: body.class_name.clone(),
            });
        }
        let keep = is_included(body, registry, config);
        if keep {
            validate(body).map_err(|source| ClassError::Malformed {
                class: class_name.to_string(),
                method: body.method_id(),
                source,
            })?;
        }
        included.push(keep);
    }
    Ok(included)
}

fn is_included(body: &MethodBody, registry: &Registry, config: &AnalysisConfig) -> bool {
    !config.is_excluded(&body.method_name) && registry.is_usable_method(&body.method_id(), body.access)
}

/// Instrument unless already done; a repeat request is a no-op
fn instrument_once(
    graph: &MethodGraph,
    body: &MethodBody,
    registry: &Registry,
) -> Option<InstrumentedMethod> {
    match instrument(graph, body, registry) {
        Ok(instrumented) => Some(instrumented),
        Err(InstrumentError::AlreadyInstrumented(method)) => {
            debug!(%method, "already instrumented, skipping");
            None
        }
        Err(err) => {
            warn!(method = %graph.key(), error = %err, "method left uninstrumented");
            None
        }
    }
}

/// One search run's shared analysis state
///
/// Owns the registry and the compute-once pool, so any number of threads
/// can ask for a class and exactly one of them analyzes it.
#[derive(Debug, Default)]
pub struct Analyzer {
    registry: Registry,
    pool: GraphPool,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            registry: Registry::new().with_constructors(config.analyze_constructors),
            pool: GraphPool::new(),
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Graphs of `class_name`, analyzing `bodies` on first request
    pub fn class_graphs(
        &self,
        class_name: &str,
        bodies: &[MethodBody],
    ) -> Result<Arc<ClassGraphs>, ClassError> {
        self.pool.get_or_build(class_name, || {
            analyze_class(class_name, bodies, &self.registry, &self.config)
        })
    }

    /// Graphs of a class analyzed earlier
    pub fn cached(&self, class_name: &str) -> Option<Arc<ClassGraphs>> {
        self.pool.get(class_name)
    }
}
