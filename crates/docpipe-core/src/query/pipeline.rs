//! Pipeline stages and plan assembly.

use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use tracing::debug;

use super::join::JoinSpec;
use super::predicate::{Conjunction, MatchInput, PredicateSet};

/// Counter field written by the count stage.
pub const COUNT_FIELD: &str = "n";

/// A single aggregation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Join a referenced collection.
    Lookup(JoinSpec),
    /// Filter documents.
    Match(Value),
    /// Remove field paths.
    Unset(Vec<String>),
    /// Replace the stream with a single `{field: count}` document.
    Count(String),
    /// Skip documents.
    Skip(u64),
    /// Limit the number of documents.
    Limit(u64),
    /// Order documents.
    Sort(Value),
    /// Any other stage document, passed through verbatim.
    Raw(Value),
}

impl Stage {
    /// Compile to a stage document.
    pub fn to_document(&self) -> Value {
        match self {
            Stage::Lookup(join) => join.to_stage(),
            Stage::Match(filter) => json!({ "$match": filter }),
            Stage::Unset(paths) => json!({ "$unset": paths }),
            Stage::Count(field) => json!({ "$count": field }),
            Stage::Skip(n) => json!({ "$skip": n }),
            Stage::Limit(n) => json!({ "$limit": n }),
            Stage::Sort(spec) => json!({ "$sort": spec }),
            Stage::Raw(doc) => doc.clone(),
        }
    }

    /// Stage operator name, e.g. `$match`.
    pub fn name(&self) -> Option<String> {
        match self {
            Stage::Lookup(_) => Some("$lookup".to_string()),
            Stage::Match(_) => Some("$match".to_string()),
            Stage::Unset(_) => Some("$unset".to_string()),
            Stage::Count(_) => Some("$count".to_string()),
            Stage::Skip(_) => Some("$skip".to_string()),
            Stage::Limit(_) => Some("$limit".to_string()),
            Stage::Sort(_) => Some("$sort".to_string()),
            Stage::Raw(doc) => doc.as_object().and_then(|o| o.keys().next().cloned()),
        }
    }
}

impl From<Value> for Stage {
    fn from(doc: Value) -> Self {
        Stage::Raw(doc)
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

/// Mutable plan state of one query builder.
///
/// The plan is re-derived from this state on every [`PlanBuilder::plan`] call,
/// so mutations between calls accumulate.
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    joins: Vec<JoinSpec>,
    stages: Vec<Stage>,
    predicates: PredicateSet,
    unset: Vec<String>,
}

impl PlanBuilder {
    /// Create a plan seeded with joins and unset paths.
    pub fn new(joins: Vec<JoinSpec>, unset: Vec<String>) -> Self {
        Self {
            joins,
            unset,
            ..Self::default()
        }
    }

    /// Add match conditions. See [`PredicateSet::match_conditions`].
    pub fn match_conditions(
        &mut self,
        input: impl Into<MatchInput>,
        conjunction: Conjunction,
        append: bool,
    ) -> &mut Self {
        self.predicates.match_conditions(input, conjunction, append);
        self
    }

    /// Append a custom stage, placed after joins and before the match stage.
    pub fn stage(&mut self, stage: impl Into<Stage>) -> &mut Self {
        self.stages.push(stage.into());
        self
    }

    /// Append several custom stages.
    pub fn stages(&mut self, stages: impl IntoIterator<Item = Stage>) -> &mut Self {
        self.stages.extend(stages);
        self
    }

    /// Append a join after the existing ones.
    pub fn join(&mut self, join: JoinSpec) -> &mut Self {
        self.joins.push(join);
        self
    }

    /// Add paths to the unset list.
    pub fn unset<I, S>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            let path = path.into();
            if !self.unset.contains(&path) {
                self.unset.push(path);
            }
        }
        self
    }

    /// Current predicates.
    pub fn predicates(&self) -> &PredicateSet {
        &self.predicates
    }

    /// Current joins.
    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    /// Current unset paths.
    pub fn unset_paths(&self) -> &[String] {
        &self.unset
    }

    /// Assemble the pipeline: joins, custom stages, match, unset.
    pub fn plan(&self) -> Vec<Stage> {
        let mut plan = Vec::with_capacity(self.joins.len() + self.stages.len() + 2);
        plan.extend(self.joins.iter().cloned().map(Stage::Lookup));
        plan.extend(self.stages.iter().cloned());
        if !self.predicates.is_empty() {
            plan.push(Stage::Match(self.predicates.to_document()));
        }
        if !self.unset.is_empty() {
            plan.push(Stage::Unset(self.unset.clone()));
        }

        debug!(
            joins = self.joins.len(),
            stages = self.stages.len(),
            has_match = !self.predicates.is_empty(),
            unset = self.unset.len(),
            "Assembled pipeline"
        );
        plan
    }
}

/// Documents of a plan, for logging or a store driver.
pub fn plan_documents(plan: &[Stage]) -> Vec<Value> {
    plan.iter().map(Stage::to_document).collect()
}
