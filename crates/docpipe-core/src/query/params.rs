//! Request parameter parsing.
//!
//! Turns raw string parameters into typed execution intent and the match
//! predicates they imply.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::warn;

use super::pipeline::PlanBuilder;
use super::predicate::Conjunction;
use crate::catalog::EntityDef;
use crate::config::{FilterMode, DEFAULT_LIMIT};

/// Parameter names with a fixed meaning. Every other name is a field filter.
pub const RESERVED_PARAMS: [&str; 6] = ["filter", "limit", "offset", "id", "ids", "excluded"];

/// `limit` value that disables pagination.
pub const FULL_LIMIT: &str = "full";

/// Raw request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    values: BTreeMap<String, String>,
}

impl RequestParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Remove a parameter.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Get a parameter; empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Iterate over all parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for RequestParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Page size requested by `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// No limit (`limit=full`).
    Full,
    /// At most this many documents; zero means no limit stage.
    Count(u64),
}

impl Limit {
    /// Parse a `limit` value, falling back to `default` when absent or unparsable.
    pub fn parse(raw: Option<&str>, default: u64) -> Self {
        match raw {
            None => Limit::Count(default),
            Some(FULL_LIMIT) => Limit::Full,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(n) => Limit::Count(n),
                Err(_) => {
                    warn!(limit = %raw, default, "Unparsable limit, using default");
                    Limit::Count(default)
                }
            },
        }
    }

    /// The limit stage value, if one applies.
    pub fn as_stage_value(&self) -> Option<u64> {
        match self {
            Limit::Full | Limit::Count(0) => None,
            Limit::Count(n) => Some(*n),
        }
    }
}

/// Resolved execution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecIntent {
    /// Single-document lookup; pagination is skipped.
    pub is_one: bool,
    /// Maximum documents to return.
    pub limit: Option<u64>,
    /// Documents to skip.
    pub skip: u64,
}

impl ExecIntent {
    /// Intent for a single-document lookup.
    pub fn one() -> Self {
        Self {
            is_one: true,
            ..Self::default()
        }
    }

    /// Intent for a paginated list.
    pub fn page(limit: Option<u64>, skip: u64) -> Self {
        Self {
            is_one: false,
            limit,
            skip,
        }
    }
}

/// Typed view of the request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedParams {
    /// Free-text filter.
    pub filter: Option<String>,
    /// Requested page size.
    pub limit: Limit,
    /// Documents to skip.
    pub offset: u64,
    /// Single identity.
    pub id: Option<String>,
    /// Identity set.
    pub ids: Option<Vec<String>>,
    /// Identities to exclude.
    pub excluded: Option<Vec<String>>,
    /// Non-reserved parameters, by field name.
    pub field_filters: BTreeMap<String, String>,
}

impl ParsedParams {
    /// Parse request parameters with the default page size.
    pub fn parse(params: &RequestParams) -> Self {
        Self::parse_with_default(params, DEFAULT_LIMIT)
    }

    /// Parse request parameters.
    pub fn parse_with_default(params: &RequestParams, default_limit: u64) -> Self {
        let offset = match params.get("offset") {
            None => 0,
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                warn!(offset = %raw, "Unparsable offset, using 0");
                0
            }),
        };

        let field_filters = params
            .iter()
            .filter(|(key, value)| !RESERVED_PARAMS.contains(key) && !value.is_empty())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Self {
            filter: params.get("filter").map(String::from),
            limit: Limit::parse(params.get("limit"), default_limit),
            offset,
            id: params.get("id").map(String::from),
            ids: params.get("ids").and_then(|raw| parse_id_list("ids", raw)),
            excluded: params
                .get("excluded")
                .and_then(|raw| parse_id_list("excluded", raw)),
            field_filters,
        }
    }

    /// Execution intent implied by the parameters.
    pub fn intent(&self) -> ExecIntent {
        if self.id.is_some() {
            return ExecIntent::one();
        }
        ExecIntent::page(self.limit.as_stage_value(), self.offset)
    }

    /// Add the predicates implied by the parameters to a plan.
    ///
    /// `id` wins over `ids`, which wins over the filter branch. The filter branch
    /// only touches fields in `filter_fields`.
    pub fn apply(
        &self,
        plan: &mut PlanBuilder,
        entity: &EntityDef,
        filter_fields: &[String],
        mode: FilterMode,
    ) {
        let identity = entity.identity_field.as_str();

        if let Some(id) = &self.id {
            plan.match_conditions(
                json!({ identity: convert_identity(entity, id) }),
                Conjunction::And,
                true,
            );
            return;
        }

        if let Some(ids) = self.ids.as_ref().filter(|ids| !ids.is_empty()) {
            plan.match_conditions(
                json!({ identity: { "$in": convert_identities(entity, ids) } }),
                Conjunction::And,
                true,
            );
            return;
        }

        if let Some(text) = &self.filter {
            if !filter_fields.is_empty() {
                let pattern = mode.pattern(text);
                let ors: Vec<Value> = filter_fields
                    .iter()
                    .map(|field| json!({ field: { "$regex": pattern, "$options": "i" } }))
                    .collect();
                plan.match_conditions(json!({ "$or": ors }), Conjunction::And, true);
            }
        }

        for (field, value) in &self.field_filters {
            if !filter_fields.contains(field) {
                continue;
            }
            plan.match_conditions(
                json!({ field: { "$regex": mode.pattern(value), "$options": "i" } }),
                Conjunction::And,
                true,
            );
        }

        if let Some(excluded) = self.excluded.as_ref().filter(|ids| !ids.is_empty()) {
            plan.match_conditions(
                json!({ identity: { "$nin": convert_identities(entity, excluded) } }),
                Conjunction::And,
                true,
            );
        }
    }
}

/// Parse a JSON-encoded identity list. Strings and numbers are accepted.
fn parse_id_list(param: &str, raw: &str) -> Option<Vec<String>> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(param = %param, error = %e, "Invalid JSON in identity list, ignoring");
            return None;
        }
    };

    let Value::Array(items) = value else {
        warn!(param = %param, "Identity list is not an array, ignoring");
        return None;
    };

    Some(
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                other => {
                    warn!(param = %param, value = %other, "Skipping non-scalar identity");
                    None
                }
            })
            .collect(),
    )
}

/// Convert a raw identifier to the entity's identity representation.
///
/// Unparsable identifiers are kept as plain strings.
pub fn convert_identity(entity: &EntityDef, raw: &str) -> Value {
    match entity.identity_kind.parse(raw) {
        Some(value) => value,
        None => {
            warn!(
                entity = %entity.name,
                id = %raw,
                kind = ?entity.identity_kind,
                "Identifier does not match identity kind, matching as string"
            );
            Value::String(raw.to_string())
        }
    }
}

fn convert_identities(entity: &EntityDef, raw: &[String]) -> Vec<Value> {
    raw.iter().map(|id| convert_identity(entity, id)).collect()
}
