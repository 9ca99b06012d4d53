//! Regression Test Harness
//!
//! Runs every test declared in the workflow configuration through the full
//! graph and checks its assertions against what each member said. Results
//! are persisted as a JSON document plus a Markdown summary under the
//! workflow's reports directory.
//!
//! A test with an unknown assertion kind is recorded as failed rather than
//! raised, so one bad declaration never aborts the remaining tests.

use sdk::errors::EngineError;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use super::{Engine, RunRecord};
use crate::config::{Assertion, TestDefinition};

/// Characters of member text kept in a failed assertion's snippet
const SNIPPET_CHARS: usize = 200;

/// Outcome of one assertion
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    /// Assertion kind as declared
    pub kind: String,

    /// Target member name
    pub target: String,

    /// Expected value
    pub value: String,

    /// Whether the assertion held
    pub passed: bool,

    /// Snippet (first 200 chars) of the text the assertion was checked
    /// against; absent only when the target produced no output or the
    /// assertion kind is unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,

    /// Failure marker, e.g. for an unknown assertion kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of one test: its definition, the full run, and every assertion
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// The test as declared
    pub definition: TestDefinition,

    /// Everything the graph run produced
    pub run: RunRecord,

    /// Per-assertion outcomes, in declaration order
    pub assertions: Vec<AssertionResult>,
}

impl TestResult {
    /// True when every assertion held
    pub fn passed(&self) -> bool {
        self.assertions.iter().all(|a| a.passed)
    }
}

/// Outcome of a full harness invocation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    /// Workflow name
    pub workflow: String,

    /// Per-test outcomes, in declaration order
    pub results: Vec<TestResult>,
}

impl TestReport {
    /// True when every test passed
    pub fn passed(&self) -> bool {
        self.results.iter().all(TestResult::passed)
    }

    /// Count of passed tests
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }
}

impl Engine {
    /// Run every declared test and persist the report.
    ///
    /// # Errors
    ///
    /// - `NoTestsDefined` when the configuration declares no tests
    /// - Run failures (LLM or tool capability) propagate and abort the
    ///   harness; assertion failures do not
    pub async fn run_tests(&mut self) -> Result<TestReport, EngineError> {
        let tests = self.config.tests.clone();
        if tests.is_empty() {
            return Err(EngineError::NoTestsDefined);
        }

        let mut results = Vec::with_capacity(tests.len());
        for (index, definition) in tests.into_iter().enumerate() {
            let run_id = if definition.name.is_empty() {
                format!("test-{}", index + 1)
            } else {
                definition.name.clone()
            };
            info!("Harness running test '{}'", run_id);

            let run = self.run_graph(&definition.input, &run_id).await?;
            let assertions = evaluate_assertions(&definition.asserts, &run);
            results.push(TestResult {
                definition,
                run,
                assertions,
            });
        }

        let report = TestReport {
            workflow: self.config.name.clone(),
            results,
        };
        self.persist_report(&report)?;
        info!(
            "Harness finished: {}/{} tests passed",
            report.passed_count(),
            report.results.len()
        );
        Ok(report)
    }

    fn persist_report(&self, report: &TestReport) -> Result<(), EngineError> {
        let dir = self.reports_dir();
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(report)?;
        fs::write(dir.join("tests.json"), json)?;
        fs::write(dir.join("tests.md"), render_summary(report))?;
        Ok(())
    }

    /// Directory test reports are persisted under
    pub fn reports_dir(&self) -> PathBuf {
        self.config
            .base_dir
            .join("reports")
            .join(&self.config.name)
    }
}

/// Evaluate assertions against a flat mapping from member name to the text
/// that member produced (squad outputs flatten per constituent member; a
/// member visited twice keeps its latest text).
fn evaluate_assertions(asserts: &[Assertion], run: &RunRecord) -> Vec<AssertionResult> {
    let mut texts: HashMap<&str, &str> = HashMap::new();
    for result in &run.results {
        for (member, output) in result.member_outputs() {
            texts.insert(member, output.assertion_text());
        }
    }

    asserts
        .iter()
        .map(|assertion| evaluate_one(assertion, &texts))
        .collect()
}

fn evaluate_one(assertion: &Assertion, texts: &HashMap<&str, &str>) -> AssertionResult {
    let mut result = AssertionResult {
        kind: assertion.kind.clone(),
        target: assertion.target.clone(),
        value: assertion.value.clone(),
        passed: false,
        actual: None,
        message: None,
    };

    if assertion.kind != "contains" {
        result.message = Some(format!("unknown assertion type '{}'", assertion.kind));
        return result;
    }

    match texts.get(assertion.target.as_str()) {
        Some(text) => {
            result.passed = text.contains(&assertion.value);
            result.actual = Some(snippet(text));
        }
        None => {
            result.message = Some(format!(
                "member '{}' produced no output in this run",
                assertion.target
            ));
        }
    }

    result
}

fn snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(SNIPPET_CHARS).collect();
    out.push('…');
    out
}

/// Render the Markdown summary: per test, the input, the final node, and an
/// assertion checklist.
fn render_summary(report: &TestReport) -> String {
    let mut out = format!(
        "# {} — test report\n\n{}/{} tests passed\n",
        report.workflow,
        report.passed_count(),
        report.results.len()
    );

    for result in &report.results {
        let status = if result.passed() { "PASS" } else { "FAIL" };
        out.push_str(&format!(
            "\n## {} — {status}\n\n- input: {}\n- final node: {}\n",
            result.run.run_id,
            result.definition.input,
            result.run.final_node.as_deref().unwrap_or("(none)"),
        ));
        for assertion in &result.assertions {
            let mark = if assertion.passed { "x" } else { " " };
            out.push_str(&format!(
                "- [{mark}] {} {} \"{}\"",
                assertion.target, assertion.kind, assertion.value
            ));
            if let Some(message) = &assertion.message {
                out.push_str(&format!(" ({message})"));
            }
            out.push('\n');
        }
    }

    out
}
