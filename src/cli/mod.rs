// CLI command definitions for the inspection binary

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// branchscope - control-flow and distance analysis for method bodies
///
/// Reads method bodies from JSON, builds their control-flow graphs and
/// prints graphs, distances, probe edit lists or registry statistics.
#[derive(Parser, Debug, Clone)]
#[command(name = "branchscope")]
#[command(author, version, about)]
#[command(long_about = "branchscope builds per-method control-flow graphs from resolved \
instruction streams, precomputes structural distances to mutation sites and \
plans decision probes.

Input is a JSON file holding one method body or an array of them.")]
pub struct Cli {
    /// Analysis configuration file (JSON)
    #[arg(global = true, long, env = "BRANCHSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(global = true, long, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Human,
    /// Compact JSON for programmatic consumption
    Json,
    /// Formatted JSON with indentation
    Pretty,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the control-flow graph of a method
    Cfg(CfgArgs),

    /// Show diameter and mutation distances of a method
    Distances(DistancesArgs),

    /// Show the probe edit list of a method
    Instrument(InstrumentArgs),

    /// Analyze every class in a file and show registry statistics
    Registry(RegistryArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct CfgArgs {
    /// JSON file with method bodies
    pub input: PathBuf,

    /// Method name or name plus descriptor (default: first method)
    #[arg(long)]
    pub method: Option<String>,

    /// Graph format
    #[arg(long, value_enum)]
    pub format: Option<CfgFormat>,

    /// Show only entry, exit, decision and mutant vertices
    #[arg(long)]
    pub minimal: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DistancesArgs {
    /// JSON file with method bodies
    pub input: PathBuf,

    /// Method name or name plus descriptor (default: first method)
    #[arg(long)]
    pub method: Option<String>,

    /// Executed path as `vertex:local_distance,...`
    #[arg(long)]
    pub path: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct InstrumentArgs {
    /// JSON file with method bodies
    pub input: PathBuf,

    /// Method name or name plus descriptor (default: first method)
    #[arg(long)]
    pub method: Option<String>,

    /// Also print the spliced instruction sequence
    #[arg(long)]
    pub rewritten: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RegistryArgs {
    /// JSON file with method bodies
    pub input: PathBuf,
}

/// CFG output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfgFormat {
    /// Human-readable text
    Human,
    /// Graphviz DOT format
    Dot,
    /// JSON export
    Json,
}

// ============================================================================
// Input Loading
// ============================================================================

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum InputFile {
    Many(Vec<branchscope::bytecode::MethodBody>),
    One(branchscope::bytecode::MethodBody),
}

/// Parse a JSON document holding one method body or an array of them
pub fn parse_bodies(text: &str) -> serde_json::Result<Vec<branchscope::bytecode::MethodBody>> {
    Ok(match serde_json::from_str(text)? {
        InputFile::Many(bodies) => bodies,
        InputFile::One(body) => vec![body],
    })
}

/// Pick a method by bare name or by name plus descriptor
pub fn select_method<'a>(
    bodies: &'a [branchscope::bytecode::MethodBody],
    method: Option<&str>,
) -> Option<&'a branchscope::bytecode::MethodBody> {
    match method {
        None => bodies.first(),
        Some(name) => bodies
            .iter()
            .find(|b| b.method_id() == name)
            .or_else(|| bodies.iter().find(|b| b.method_name == name)),
    }
}

// ============================================================================
// Command Handlers
// ============================================================================

pub mod cmds {
    use super::*;
    use crate::output::{self, JsonError, JsonResponse};
    use anyhow::{Context, Result};
    use branchscope::bytecode::MethodBody;
    use branchscope::cfg::{self, CfgBuilder, ControlFlowGraph, VertexId};
    use branchscope::config::AnalysisConfig;
    use branchscope::distance::{MethodGraph, Path};
    use branchscope::instrument::{self, Emitted};
    use branchscope::pipeline::{Analyzer, MethodOutcome};
    use branchscope::registry::Registry;
    use serde::Serialize;
    use std::collections::BTreeMap;

    /// Print `data` in the requested JSON flavor
    fn emit_json<T: Serialize>(format: OutputFormat, data: T) {
        let response = JsonResponse::new(data);
        match format {
            OutputFormat::Pretty => println!("{}", response.to_pretty_json()),
            _ => println!("{}", response.to_json()),
        }
    }

    /// Report an error in the requested format and exit
    fn fail(format: OutputFormat, err: JsonError, exit_code: i32) -> ! {
        if format == OutputFormat::Human {
            output::error(&err.message);
            if let Some(hint) = &err.remediation {
                output::info(&format!("Hint: {}", hint));
            }
        } else {
            emit_json(format, err);
        }
        std::process::exit(exit_code);
    }

    fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
        AnalysisConfig::resolve(cli.config.as_deref()).context("Failed to load analysis configuration")
    }

    fn load_bodies(cli: &Cli, input: &std::path::Path) -> Result<Vec<MethodBody>> {
        if !input.exists() {
            fail(
                cli.output,
                JsonError::input_not_found(&input.display().to_string()),
                output::EXIT_FILE_NOT_FOUND,
            );
        }
        let text = std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        match parse_bodies(&text) {
            Ok(bodies) => Ok(bodies),
            Err(e) => fail(
                cli.output,
                JsonError::invalid_input(&format!("{}: {}", input.display(), e)),
                output::EXIT_VALIDATION,
            ),
        }
    }

    fn load_method(cli: &Cli, input: &std::path::Path, method: Option<&str>) -> Result<MethodBody> {
        let bodies = load_bodies(cli, input)?;
        match select_method(&bodies, method) {
            Some(body) => Ok(body.clone()),
            None => fail(
                cli.output,
                JsonError::method_not_found(method.unwrap_or("<first>")),
                output::EXIT_NOT_FOUND,
            ),
        }
    }

    fn build(cli: &Cli, body: &MethodBody, registry: &Registry) -> ControlFlowGraph {
        match CfgBuilder::new(registry).build(body) {
            Ok(graph) => graph,
            Err(e) => fail(cli.output, JsonError::cfg_error(&e.to_string()), output::EXIT_VALIDATION),
        }
    }

    pub fn cfg(args: &CfgArgs, cli: &Cli) -> Result<()> {
        let body = load_method(cli, &args.input, args.method.as_deref())?;
        let registry = Registry::new();
        let built = build(cli, &body, &registry);
        let graph = if args.minimal {
            cfg::minimize(built.graph())
        } else {
            built.graph().clone()
        };
        let method = body.key().to_string();

        let format = match (args.format, cli.output) {
            (Some(format), _) => format,
            (None, OutputFormat::Human) => CfgFormat::Human,
            (None, _) => CfgFormat::Json,
        };

        match format {
            CfgFormat::Dot => println!("{}", cfg::export_dot(&graph)),
            CfgFormat::Json => emit_json(cli.output, cfg::export_json(&graph, &method)),
            CfgFormat::Human => {
                let export = cfg::export_json(&graph, &method);
                output::header(&format!("CFG for {}", method));
                output::field("vertices", export.vertices.len());
                output::field("edges", export.edges.len());
                if let Some(entry) = export.entry {
                    output::field("entry", entry);
                }
                output::field("exits", format!("{:?}", export.exits));
                println!();
                for vertex in &export.vertices {
                    let mut line = format!("  {:>4} {:<14} {}", vertex.id, vertex.kind, vertex.label);
                    if let Some(id) = vertex.branch_id {
                        line.push_str(&format!("  branch={}", id));
                    }
                    if !vertex.mutation_ids.is_empty() {
                        line.push_str(&format!("  mutants={:?}", vertex.mutation_ids));
                    }
                    println!("{}", line);
                    for edge in export.edges.iter().filter(|e| e.from == vertex.id) {
                        println!("         -> {} ({})", edge.to, edge.kind);
                    }
                }
                let unreachable = cfg::reachability::unreachable_vertex_ids(&graph);
                if !unreachable.is_empty() {
                    println!();
                    output::warn(&format!("unreachable from entry: {:?}", unreachable));
                }
            }
        }
        Ok(())
    }

    #[derive(Debug, Serialize)]
    struct MutationReport {
        mutation_id: u64,
        vertex: VertexId,
        initial_distance: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        control_distance: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        branch_distance: Option<f64>,
    }

    #[derive(Debug, Serialize)]
    struct DistanceReport {
        method: String,
        diameter: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        mutations: Vec<MutationReport>,
    }

    pub fn distances(args: &DistancesArgs, cli: &Cli) -> Result<()> {
        let body = load_method(cli, &args.input, args.method.as_deref())?;
        let path = match args.path.as_deref().map(str::parse::<Path>) {
            None => None,
            Some(Ok(path)) => Some(path),
            Some(Err(e)) => fail(cli.output, JsonError::invalid_path(&e.to_string()), output::EXIT_USAGE),
        };

        let registry = Registry::new();
        let graph = MethodGraph::precompute(build(cli, &body, &registry));

        let mutations = graph
            .mutations()
            .filter_map(|id| {
                let vertex = graph.mutation_vertex(id)?.id;
                Some(MutationReport {
                    mutation_id: id,
                    vertex,
                    initial_distance: graph.initial_distance(vertex),
                    control_distance: path.as_ref().map(|p| graph.control_distance_to_mutation(p, id)),
                    branch_distance: path.as_ref().map(|p| graph.branch_distance_to_mutation(p, id)),
                })
            })
            .collect();

        let report = DistanceReport {
            method: body.key().to_string(),
            diameter: graph.diameter(),
            path: path.as_ref().map(ToString::to_string),
            mutations,
        };

        if cli.output != OutputFormat::Human {
            emit_json(cli.output, report);
            return Ok(());
        }

        output::header(&format!("Distances for {}", report.method));
        output::field("diameter", report.diameter);
        if let Some(path) = &report.path {
            output::field("path", path);
        }
        if report.mutations.is_empty() {
            output::info("no mutations in this method");
        }
        for m in &report.mutations {
            let mut line = format!(
                "  mutant {:>4} at {:>4}  initial={}",
                m.mutation_id, m.vertex, m.initial_distance
            );
            if let (Some(control), Some(branch)) = (m.control_distance, m.branch_distance) {
                line.push_str(&format!("  control={}  branch={}", control, branch));
            }
            println!("{}", line);
        }
        Ok(())
    }

    pub fn instrument(args: &InstrumentArgs, cli: &Cli) -> Result<()> {
        let body = load_method(cli, &args.input, args.method.as_deref())?;
        let registry = Registry::new();
        let graph = MethodGraph::structural(build(cli, &body, &registry));
        let result = match instrument::instrument(&graph, &body, &registry) {
            Ok(result) => result,
            Err(e) => fail(cli.output, JsonError::cfg_error(&e.to_string()), output::EXIT_VALIDATION),
        };

        if cli.output != OutputFormat::Human {
            #[derive(Serialize)]
            struct Report<'a> {
                #[serde(flatten)]
                method: &'a instrument::InstrumentedMethod,
                #[serde(skip_serializing_if = "Option::is_none")]
                rewritten: Option<instrument::RewrittenMethod>,
            }
            let rewritten = args.rewritten.then(|| result.rewrite());
            emit_json(
                cli.output,
                Report {
                    method: &result,
                    rewritten,
                },
            );
            return Ok(());
        }

        output::header(&format!("Probes for {}", result.key));
        output::field("probes", result.probe_count());
        output::field("max_stack", format!("{} -> {}", body.max_stack, result.max_stack));
        for vertex in &result.skipped {
            output::warn(&format!("decision at {} left unprobed", vertex));
        }
        println!();
        for edit in &result.edits {
            let ops: Vec<String> = edit.probe.ops.iter().map(ToString::to_string).collect();
            println!("  before {:>4}: {}", edit.before, ops.join("; "));
        }

        if args.rewritten {
            println!();
            output::header("Rewritten code");
            for (at, item) in result.rewrite().code.iter().enumerate() {
                match item {
                    Emitted::Probe(op) => println!("  {:>4}   + {}", at, op),
                    Emitted::Original { origin, instruction } => {
                        println!("  {:>4} {:>3} {:?}", at, origin, instruction.opcode)
                    }
                }
            }
        }
        Ok(())
    }

    #[derive(Debug, Serialize)]
    struct MethodReport {
        method: String,
        outcome: String,
        decisions: u32,
        branchless: bool,
        probes: usize,
    }

    #[derive(Debug, Serialize)]
    struct RegistryReport {
        total_branches: u32,
        branchless_methods: Vec<String>,
        classes: BTreeMap<String, Vec<MethodReport>>,
    }

    pub fn registry(args: &RegistryArgs, cli: &Cli) -> Result<()> {
        let config = load_config(cli)?;
        let bodies = load_bodies(cli, &args.input)?;

        let mut by_class: BTreeMap<String, Vec<MethodBody>> = BTreeMap::new();
        for body in bodies {
            by_class.entry(body.class_name.clone()).or_default().push(body);
        }

        let analyzer = Analyzer::new(config);
        let mut classes = BTreeMap::new();
        for (class, bodies) in &by_class {
            let graphs = match analyzer.class_graphs(class, bodies) {
                Ok(graphs) => graphs,
                Err(e) => {
                    output::warn(&e.to_string());
                    continue;
                }
            };
            let methods = graphs
                .outcomes
                .iter()
                .map(|(method, outcome)| {
                    let entry = analyzer
                        .registry()
                        .method_entry(&branchscope::bytecode::MethodKey::new(class.as_str(), method.as_str()));
                    MethodReport {
                        method: method.clone(),
                        outcome: match outcome {
                            MethodOutcome::Analyzed => "analyzed".to_string(),
                            MethodOutcome::Excluded => "excluded".to_string(),
                            MethodOutcome::Unanalyzable { reason } => format!("unanalyzable: {}", reason),
                        },
                        decisions: entry.as_ref().map_or(0, |e| e.decision_count),
                        branchless: entry.as_ref().is_some_and(|e| e.is_branchless),
                        probes: graphs
                            .method(method)
                            .and_then(|m| m.instrumented.as_ref())
                            .map_or(0, |i| i.probe_count()),
                    }
                })
                .collect();
            classes.insert(class.clone(), methods);
        }

        let report = RegistryReport {
            total_branches: analyzer.registry().total_branches(),
            branchless_methods: analyzer
                .registry()
                .branchless_methods()
                .iter()
                .map(ToString::to_string)
                .collect(),
            classes,
        };

        if cli.output != OutputFormat::Human {
            emit_json(cli.output, report);
            return Ok(());
        }

        output::header("Registry");
        output::field("classes", report.classes.len());
        output::field("total_branches", report.total_branches);
        output::field("branchless", report.branchless_methods.len());
        for (class, methods) in &report.classes {
            println!();
            println!("  {}", class);
            for m in methods {
                println!(
                    "    {:<32} {:<10} decisions={} probes={}",
                    m.method, m.outcome, m.decisions, m.probes
                );
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
