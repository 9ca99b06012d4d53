//! Workflow Engine
//!
//! The engine owns a validated configuration and drives runs across the
//! workflow graph: members and squads are graph nodes, edges carry
//! condition labels, and each node's structured output may propose its
//! successor. Model and custom-tool capabilities are constructor-injected
//! (a [`ModelFactory`] and a [`ModuleLoader`]) so the engine itself never
//! reaches for a network client or a shared library directly.
//!
//! Runs are bounded by a hard visit cap so a cyclic graph cannot spin
//! forever; hitting the cap ends the run silently with the last result as
//! final.

pub mod harness;

use futures::future::try_join_all;
use sdk::errors::EngineError;
use sdk::tool::{ModuleLoader, Tool};
use sdk::types::StructuredOutput;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{SquadDefinition, SquadMode, WorkflowConfig, WorkflowGraph};
use crate::llm::ModelFactory;
use crate::memory::MemoryStore;
use crate::observer::{EventKind, Observer};
use crate::runner::MemberRunner;
use crate::tools::ToolRegistry;

/// Hard per-run visit cap bounding cyclic graphs
const MAX_NODE_VISITS: usize = 50;

/// Result of executing one graph node
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeResult {
    /// A member node ran once
    Member {
        /// Node (member) name
        node: String,
        /// The member's parsed output
        output: StructuredOutput,
        /// Successor proposed by this node
        next_hint: Option<String>,
    },

    /// A squad node ran all its members
    Squad {
        /// Node (squad) name
        node: String,
        /// Execution mode the squad ran under
        mode: SquadMode,
        /// Per-member outputs, in declaration order
        outputs: Vec<MemberOutput>,
        /// Successor proposed by this node
        next_hint: Option<String>,
    },
}

/// One member's output within a squad result
#[derive(Debug, Clone, Serialize)]
pub struct MemberOutput {
    /// Member name
    pub member: String,

    /// The member's parsed output
    pub output: StructuredOutput,
}

impl NodeResult {
    /// The graph node this result belongs to
    pub fn node(&self) -> &str {
        match self {
            NodeResult::Member { node, .. } | NodeResult::Squad { node, .. } => node,
        }
    }

    /// The successor this node proposed, if any
    pub fn next_hint(&self) -> Option<&str> {
        match self {
            NodeResult::Member { next_hint, .. } | NodeResult::Squad { next_hint, .. } => {
                next_hint.as_deref()
            }
        }
    }

    /// Visit every `(member, output)` pair in this result, squads in
    /// declaration order.
    pub fn member_outputs(&self) -> Vec<(&str, &StructuredOutput)> {
        match self {
            NodeResult::Member { node, output, .. } => vec![(node.as_str(), output)],
            NodeResult::Squad { outputs, .. } => outputs
                .iter()
                .map(|o| (o.member.as_str(), &o.output))
                .collect(),
        }
    }
}

/// Everything one graph run produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    /// Run identifier
    pub run_id: String,

    /// Workflow name
    pub workflow: String,

    /// Input fed to the entry node
    pub input: String,

    /// Node results in visit order
    pub results: Vec<NodeResult>,

    /// Name of the last visited node, if any node ran
    pub final_node: Option<String>,
}

impl RunRecord {
    /// The final node's result, if any node ran
    pub fn final_result(&self) -> Option<&NodeResult> {
        self.results.last()
    }
}

/// Capabilities resolved once per engine, on first run
struct Loaded {
    runners: HashMap<String, Arc<MemberRunner>>,
    memory: Arc<MemoryStore>,
}

/// Drives workflow runs over a validated configuration
pub struct Engine {
    config: WorkflowConfig,
    factory: Arc<dyn ModelFactory>,
    loader: Arc<dyn ModuleLoader>,
    observer: Arc<Observer>,
    loaded: Option<Loaded>,
}

impl Engine {
    /// Create an engine over a configuration, validating it first.
    ///
    /// Configuration problems surface here, before any model call.
    pub fn new(
        config: WorkflowConfig,
        factory: Arc<dyn ModelFactory>,
        loader: Arc<dyn ModuleLoader>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let observer = Arc::new(Observer::from_config(&config.observability));
        Ok(Self {
            config,
            factory,
            loader,
            observer,
            loaded: None,
        })
    }

    /// The engine's configuration
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// The engine's event sink
    pub fn observer(&self) -> &Arc<Observer> {
        &self.observer
    }

    /// Resolve model and tool capabilities. Idempotent; called implicitly by
    /// the run entry points.
    ///
    /// # Errors
    ///
    /// Custom-tool resolution failures and members referencing unknown tool
    /// names are fatal here.
    pub fn load(&mut self) -> Result<(), EngineError> {
        if self.loaded.is_some() {
            return Ok(());
        }

        let options = self
            .config
            .llm
            .as_ref()
            .ok_or_else(|| EngineError::MissingField("llm".to_string()))?;
        let model = self.factory.build(options)?;
        info!("Engine loaded model '{}'", model.name());

        let mut registry =
            ToolRegistry::with_builtins(&self.config.tools, Arc::clone(&self.observer));
        registry.load_custom_tools(
            &self.config.tools.custom,
            &self.config.base_dir,
            self.loader.as_ref(),
        )?;

        let memory = Arc::new(MemoryStore::new());
        let mut runners = HashMap::new();
        for member in self.config.member_list() {
            let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(member.tools.len());
            for name in &member.tools {
                let tool = registry.get(name)?;
                tools.push(registry.wrap(tool, &member.name));
            }
            runners.insert(
                member.name.clone(),
                Arc::new(MemberRunner::new(
                    member.clone(),
                    Arc::clone(&model),
                    tools,
                    Arc::clone(&memory),
                    Arc::clone(&self.observer),
                )),
            );
        }

        self.loaded = Some(Loaded { runners, memory });
        Ok(())
    }

    /// Shared memory, once loaded
    pub fn memory(&self) -> Option<&Arc<MemoryStore>> {
        self.loaded.as_ref().map(|l| &l.memory)
    }

    /// Run the graph once. Ad-hoc runs carry the fixed run id "single";
    /// harness runs carry their test's name instead.
    pub async fn run_once(&mut self, input: &str) -> Result<RunRecord, EngineError> {
        self.run_graph(input, "single").await
    }

    /// Run the graph from its entry node until no successor resolves or the
    /// visit cap is reached.
    pub async fn run_graph(&mut self, input: &str, run_id: &str) -> Result<RunRecord, EngineError> {
        self.load()?;
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| EngineError::Config("engine failed to load".to_string()))?;
        let graph = self
            .config
            .workflow
            .as_ref()
            .ok_or_else(|| EngineError::MissingField("workflow".to_string()))?;

        info!("Run '{}' starting at '{}'", run_id, graph.entry);
        self.observer.record(EventKind::RunStart {
            run_id: run_id.to_string(),
            input: input.to_string(),
        });

        let mut results: Vec<NodeResult> = Vec::new();
        let mut context: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        let mut current = Some(graph.entry.clone());

        while let Some(node) = current {
            if results.len() == MAX_NODE_VISITS {
                warn!(
                    "Run '{}' reached the {}-node visit cap, ending",
                    run_id, MAX_NODE_VISITS
                );
                break;
            }

            self.observer.record(EventKind::NodeStart { node: node.clone() });
            let result = self.execute_node(loaded, &node, input, &context).await?;
            self.observer.record(EventKind::NodeEnd { node: node.clone() });

            context.insert(node.clone(), serde_json::to_value(&result)?);
            current = resolve_next(graph, &node, result.next_hint());
            results.push(result);
        }

        let final_node = results.last().map(|r| r.node().to_string());
        info!("Run '{}' ended at {:?}", run_id, final_node);
        self.observer.record(EventKind::RunEnd {
            run_id: run_id.to_string(),
            final_node: final_node.clone(),
        });
        self.observer
            .flush_report(&self.config.base_dir, &self.config.name)?;

        Ok(RunRecord {
            run_id: run_id.to_string(),
            workflow: self.config.name.clone(),
            input: input.to_string(),
            results,
            final_node,
        })
    }

    async fn execute_node(
        &self,
        loaded: &Loaded,
        node: &str,
        input: &str,
        context: &BTreeMap<String, serde_json::Value>,
    ) -> Result<NodeResult, EngineError> {
        if let Some(runner) = loaded.runners.get(node) {
            let output = runner.run(input, context).await?;
            let next_hint = output.next.clone();
            return Ok(NodeResult::Member {
                node: node.to_string(),
                output,
                next_hint,
            });
        }

        let squad = self
            .config
            .squads
            .iter()
            .find(|s| s.name == node)
            .ok_or_else(|| EngineError::UnknownNode(node.to_string()))?;
        self.execute_squad(loaded, squad, input, context).await
    }

    /// Run a squad node.
    ///
    /// Parallel mode fans out every member concurrently and joins fail-fast;
    /// outputs keep declaration order regardless of completion order, and
    /// the squad's hint is the first non-empty one scanned in declaration
    /// order. Sequential mode chains members, each output's content feeding
    /// the next member's input, and the squad's hint is the last member's.
    async fn execute_squad(
        &self,
        loaded: &Loaded,
        squad: &SquadDefinition,
        input: &str,
        context: &BTreeMap<String, serde_json::Value>,
    ) -> Result<NodeResult, EngineError> {
        let mut runners = Vec::with_capacity(squad.members.len());
        for name in &squad.members {
            let runner = loaded
                .runners
                .get(name)
                .ok_or_else(|| EngineError::UnknownNode(name.clone()))?;
            runners.push((name.as_str(), runner));
        }

        let outputs = match squad.mode {
            SquadMode::Parallel => {
                let turns = runners.iter().map(|(name, runner)| async move {
                    runner.run(input, context).await.map(|output| MemberOutput {
                        member: name.to_string(),
                        output,
                    })
                });
                try_join_all(turns).await?
            }
            SquadMode::Sequential => {
                let mut outputs = Vec::with_capacity(runners.len());
                let mut turn_input = input.to_string();
                for (name, runner) in runners {
                    let output = runner.run(&turn_input, context).await?;
                    turn_input = output.content.clone();
                    outputs.push(MemberOutput {
                        member: name.to_string(),
                        output,
                    });
                }
                outputs
            }
        };

        let next_hint = match squad.mode {
            SquadMode::Parallel => outputs.iter().find_map(|o| o.output.next.clone()),
            SquadMode::Sequential => outputs.last().and_then(|o| o.output.next.clone()),
        };

        Ok(NodeResult::Squad {
            node: squad.name.clone(),
            mode: squad.mode,
            outputs,
            next_hint,
        })
    }
}

/// Resolve the node to visit after `from`.
///
/// With no declared steps the emitted hint is followed directly. With
/// declared steps, a hint prefers a step whose `to` or `when` matches it;
/// otherwise (or with no hint) only an `always` step from this node is
/// eligible. No match means the run ends.
pub fn resolve_next(graph: &WorkflowGraph, from: &str, hint: Option<&str>) -> Option<String> {
    if graph.steps.is_empty() {
        return hint.map(str::to_string);
    }

    if let Some(hint) = hint {
        if let Some(step) = graph
            .steps
            .iter()
            .find(|s| s.from == from && (s.to == hint || s.when == hint))
        {
            return Some(step.to.clone());
        }
    }

    graph
        .steps
        .iter()
        .find(|s| s.from == from && s.when == sdk::types::ALWAYS)
        .map(|s| s.to.clone())
}
