//! Match predicate composition.

use serde_json::{Map, Value};

/// Conjunction bucket a condition is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conjunction {
    /// All conditions must match (`$and`).
    #[default]
    And,
    /// At least one condition must match (`$or`).
    Or,
}

impl Conjunction {
    /// Operator key in the match document.
    pub fn key(&self) -> &'static str {
        match self {
            Conjunction::And => "$and",
            Conjunction::Or => "$or",
        }
    }
}

/// One condition document or a list of them.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchInput {
    /// A single condition document.
    One(Map<String, Value>),
    /// Several condition documents.
    Many(Vec<Value>),
}

impl MatchInput {
    /// Check if the input carries no condition.
    pub fn is_empty(&self) -> bool {
        match self {
            MatchInput::One(doc) => doc.is_empty(),
            MatchInput::Many(list) => list.is_empty(),
        }
    }
}

impl From<Map<String, Value>> for MatchInput {
    fn from(doc: Map<String, Value>) -> Self {
        MatchInput::One(doc)
    }
}

impl From<Vec<Value>> for MatchInput {
    fn from(list: Vec<Value>) -> Self {
        MatchInput::Many(list)
    }
}

impl From<Value> for MatchInput {
    /// Objects become a single condition, arrays a list. Anything else is empty.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(doc) => MatchInput::One(doc),
            Value::Array(list) => MatchInput::Many(list),
            _ => MatchInput::Many(Vec::new()),
        }
    }
}

/// Accumulated match conditions, keyed by conjunction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateSet {
    root: Map<String, Value>,
}

impl PredicateSet {
    /// Create an empty predicate set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add conditions.
    ///
    /// With `append` the input is pushed into the conjunction's bucket (lists
    /// element by element). Without it the whole set is replaced: a list becomes
    /// `{"$and": list}` and a single document is used as-is. Empty input is ignored.
    pub fn match_conditions(
        &mut self,
        input: impl Into<MatchInput>,
        conjunction: Conjunction,
        append: bool,
    ) {
        let input = input.into();
        if input.is_empty() {
            return;
        }

        if !append {
            self.root = match input {
                MatchInput::One(doc) => doc,
                MatchInput::Many(list) => {
                    let mut root = Map::new();
                    root.insert("$and".to_string(), Value::Array(list));
                    root
                }
            };
            return;
        }

        let bucket = self
            .root
            .entry(conjunction.key())
            .or_insert_with(|| Value::Array(Vec::new()));

        // A replaced root may hold a non-array under the key.
        if !bucket.is_array() {
            let existing = bucket.take();
            *bucket = Value::Array(vec![existing]);
        }

        if let Value::Array(items) = bucket {
            match input {
                MatchInput::One(doc) => items.push(Value::Object(doc)),
                MatchInput::Many(list) => items.extend(list),
            }
        }
    }

    /// Append one condition to the `$and` bucket.
    pub fn and(&mut self, condition: impl Into<MatchInput>) {
        self.match_conditions(condition, Conjunction::And, true);
    }

    /// Check if no condition has been added.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// The match document.
    pub fn to_document(&self) -> Value {
        Value::Object(self.root.clone())
    }
}
