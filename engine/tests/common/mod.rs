//! Shared fixtures for integration tests: a scripted model factory that
//! routes canned responses per member, plus configuration builders.

// Each integration test binary compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use sdk::errors::EngineError;
use sdk::tool::{ModuleLoader, Tool};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use troupe_engine::config::{
    LlmOptions, MemberDefinition, ObservabilityConfig, SquadDefinition, SquadMode, ToolsConfig,
    WorkflowConfig, WorkflowGraph, WorkflowStep,
};
use troupe_engine::llm::{ChunkStream, Completion, LanguageModel, Message, MessageRole, ModelFactory};

/// Deterministic model: responses are scripted per member, keyed on the
/// member's persona in the system message. Members without a script get the
/// default response. Every turn's input is recorded for assertions.
pub struct ScriptedModel {
    scripts: Mutex<HashMap<String, VecDeque<String>>>,
    delays: HashMap<String, Duration>,
    default: String,
    turns: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    fn member_for(&self, messages: &[Message]) -> String {
        let system = messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        system
            .strip_prefix("You are ")
            .and_then(|rest| rest.split('.').next())
            .unwrap_or("unknown")
            .to_string()
    }

    /// `(member, input)` pairs in invocation order
    pub fn turns(&self) -> Vec<(String, String)> {
        self.turns.lock().unwrap().clone()
    }

    /// Inputs a given member received, in order
    pub fn inputs_for(&self, member: &str) -> Vec<String> {
        self.turns()
            .into_iter()
            .filter(|(m, _)| m == member)
            .map(|(_, input)| input)
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, messages: &[Message]) -> Result<Completion, EngineError> {
        let member = self.member_for(messages);
        let input = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.turns.lock().unwrap().push((member.clone(), input));

        if let Some(delay) = self.delays.get(&member) {
            tokio::time::sleep(*delay).await;
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&member)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(response) => Ok(Completion::new(response)),
            None if self.default.is_empty() => {
                Err(EngineError::Llm(format!("no script for member '{member}'")))
            }
            None => Ok(Completion::new(self.default.clone())),
        }
    }

    async fn stream(&self, messages: &[Message]) -> Result<ChunkStream, EngineError> {
        let completion = self.invoke(messages).await?;
        Ok(futures::stream::once(async move { Ok(completion) }).boxed())
    }
}

/// Factory handing the same scripted model to every member
pub struct ScriptedFactory {
    model: Arc<ScriptedModel>,
}

impl ScriptedFactory {
    pub fn new(default: &str) -> Self {
        Self {
            model: Arc::new(ScriptedModel {
                scripts: Mutex::new(HashMap::new()),
                delays: HashMap::new(),
                default: default.to_string(),
                turns: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue responses for one member, consumed in order.
    pub fn script(self, member: &str, responses: &[&str]) -> Self {
        self.model.scripts.lock().unwrap().insert(
            member.to_string(),
            responses.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Delay every response from one member.
    pub fn delay(mut self, member: &str, delay: Duration) -> Self {
        let model = Arc::get_mut(&mut self.model).expect("delay() must precede handle()");
        model.delays.insert(member.to_string(), delay);
        self
    }

    pub fn handle(&self) -> Arc<ScriptedModel> {
        Arc::clone(&self.model)
    }
}

impl ModelFactory for ScriptedFactory {
    fn build(&self, _options: &LlmOptions) -> Result<Arc<dyn LanguageModel>, EngineError> {
        Ok(Arc::clone(&self.model) as Arc<dyn LanguageModel>)
    }
}

/// Loader for workflows that declare no custom tools
pub struct NoopLoader;

impl ModuleLoader for NoopLoader {
    fn load(&self, module: &Path, _export: &str) -> Result<Arc<dyn Tool>, EngineError> {
        Err(EngineError::LibraryLoadFailed(module.display().to_string()))
    }
}

pub fn member(name: &str) -> MemberDefinition {
    MemberDefinition {
        name: name.to_string(),
        role: format!("You are {name}."),
        tools: vec![],
        memory_id: "shared".to_string(),
    }
}

pub fn squad(name: &str, members: &[&str], mode: SquadMode) -> SquadDefinition {
    SquadDefinition {
        name: name.to_string(),
        members: members.iter().map(|m| m.to_string()).collect(),
        mode,
    }
}

pub fn step(from: &str, to: &str, when: &str) -> WorkflowStep {
    WorkflowStep {
        from: from.to_string(),
        to: to.to_string(),
        when: when.to_string(),
    }
}

pub fn config(
    members: Vec<MemberDefinition>,
    squads: Vec<SquadDefinition>,
    entry: &str,
    steps: Vec<WorkflowStep>,
) -> WorkflowConfig {
    WorkflowConfig {
        name: "it".to_string(),
        version: Some("1".to_string()),
        llm: Some(LlmOptions {
            model: "stub".to_string(),
            temperature: None,
        }),
        members: Some(members),
        squads,
        workflow: Some(WorkflowGraph {
            entry: entry.to_string(),
            steps,
        }),
        observability: ObservabilityConfig::default(),
        tools: ToolsConfig::default(),
        tests: vec![],
        base_dir: std::path::PathBuf::from("."),
    }
}
