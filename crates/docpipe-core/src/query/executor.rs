//! Query builder and execution engine.
//!
//! A [`QueryBuilder`] owns the plan state of one request. [`QueryBuilder::exec`]
//! runs the count and data pipelines concurrently, hydrates rows into `T`,
//! applies the configured transform and wraps everything in a [`QueryResponse`].
//! Failures never escape: they are logged and turned into a 500 envelope.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use super::join::JoinSpec;
use super::pipeline::{PlanBuilder, Stage, COUNT_FIELD};
use super::predicate::{Conjunction, MatchInput};
use super::params::ExecIntent;
use crate::catalog::ResolvedEntity;
use crate::envelope::QueryResponse;
use crate::error::Error;
use crate::store::{Document, DocumentStore};

/// Synchronous per-document transform.
pub type Transform<T> = Arc<dyn Fn(T) -> Result<T, Error> + Send + Sync>;

/// Asynchronous per-document transform.
pub type AsyncTransform<T> = Arc<dyn Fn(T) -> BoxFuture<'static, Result<T, Error>> + Send + Sync>;

/// Construction options for a [`QueryBuilder`].
pub struct QueryOptions<T> {
    select: Vec<String>,
    initial_match: Option<Value>,
    stages: Vec<Stage>,
    transform: Option<Transform<T>>,
    async_transform: Option<AsyncTransform<T>>,
    timeout: Option<Duration>,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            select: Vec::new(),
            initial_match: None,
            stages: Vec::new(),
            transform: None,
            async_transform: None,
            timeout: None,
        }
    }
}

impl<T> QueryOptions<T> {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep these hidden paths in the output. Joined fields need the full `alias.field` path.
    pub fn select<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Seed the builder with match conditions (appended under `$and`).
    pub fn with_match(mut self, condition: Value) -> Self {
        self.initial_match = Some(condition);
        self
    }

    /// Add a custom stage.
    pub fn stage(mut self, stage: impl Into<Stage>) -> Self {
        self.stages.push(stage.into());
        self
    }

    /// Transform every hydrated document.
    pub fn transform<F>(self, f: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.try_transform(move |doc| Ok(f(doc)))
    }

    /// Transform every hydrated document, failing the query on error.
    pub fn try_transform<F>(mut self, f: F) -> Self
    where
        F: Fn(T) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }

    /// Transform every hydrated document asynchronously, one at a time in order.
    ///
    /// Ignored when a synchronous transform is also set.
    pub fn async_transform<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        self.async_transform = Some(Arc::new(move |doc| f(doc).boxed()));
        self
    }

    /// Bound each execution by a timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Builds and executes the pipeline for one entity and one request.
pub struct QueryBuilder<T> {
    entity: Arc<ResolvedEntity>,
    store: Arc<dyn DocumentStore>,
    plan: PlanBuilder,
    transform: Option<Transform<T>>,
    async_transform: Option<AsyncTransform<T>>,
    timeout: Option<Duration>,
}

impl<T> QueryBuilder<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Create a builder seeded with the entity's joins and pruned hidden fields.
    pub fn new(
        entity: Arc<ResolvedEntity>,
        store: Arc<dyn DocumentStore>,
        options: QueryOptions<T>,
    ) -> Self {
        let unset = entity.pruner.prune(&options.select);
        let mut plan = PlanBuilder::new(entity.joins.clone(), unset);
        if let Some(condition) = options.initial_match {
            plan.match_conditions(condition, Conjunction::And, true);
        }
        plan.stages(options.stages);

        Self {
            entity,
            store,
            plan,
            transform: options.transform,
            async_transform: options.async_transform,
            timeout: options.timeout,
        }
    }

    /// The entity this builder queries.
    pub fn entity(&self) -> &Arc<ResolvedEntity> {
        &self.entity
    }

    /// Add match conditions. See [`crate::query::PredicateSet::match_conditions`].
    pub fn match_conditions(
        &mut self,
        input: impl Into<MatchInput>,
        conjunction: Conjunction,
        append: bool,
    ) -> &mut Self {
        self.plan.match_conditions(input, conjunction, append);
        self
    }

    /// Add a custom stage.
    pub fn stage(&mut self, stage: impl Into<Stage>) -> &mut Self {
        self.plan.stage(stage);
        self
    }

    /// Add a join after the schema-derived ones.
    pub fn join(&mut self, join: JoinSpec) -> &mut Self {
        self.plan.join(join);
        self
    }

    /// Strip additional paths from the output.
    pub fn unset<I, S>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plan.unset(paths);
        self
    }

    /// Current execution timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Set or clear the execution timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// The mutable plan state.
    pub fn plan_mut(&mut self) -> &mut PlanBuilder {
        &mut self.plan
    }

    pub(crate) fn take_plan(&mut self) -> PlanBuilder {
        std::mem::take(&mut self.plan)
    }

    pub(crate) fn restore_plan(&mut self, plan: PlanBuilder) {
        self.plan = plan;
    }

    /// Assemble the current pipeline.
    pub fn plan(&self) -> Vec<Stage> {
        self.plan.plan()
    }

    /// Execute the query.
    ///
    /// Always returns an envelope: failures and timeouts become
    /// `{data: [], meta: {total: 0}}` with status 500.
    pub async fn exec(&self, intent: ExecIntent) -> QueryResponse<T> {
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.try_exec(intent))
                .await
                .map_err(|_| Error::Store(format!("query timed out after {:?}", limit)))
                .and_then(|r| r),
            None => self.try_exec(intent).await,
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                error!(
                    entity = %self.entity.name(),
                    collection = %self.entity.collection(),
                    error = %e,
                    "Query execution failed"
                );
                QueryResponse::internal_error()
            }
        }
    }

    /// Execute the query, surfacing errors.
    pub async fn try_exec(&self, intent: ExecIntent) -> Result<QueryResponse<T>, Error> {
        let plan = self.plan.plan();

        let mut count_plan = plan.clone();
        count_plan.push(Stage::Count(COUNT_FIELD.to_string()));

        let mut data_plan = plan;
        if !intent.is_one {
            if intent.skip > 0 {
                data_plan.push(Stage::Skip(intent.skip));
            }
            if let Some(limit) = intent.limit.filter(|n| *n > 0) {
                data_plan.push(Stage::Limit(limit));
            }
        }

        let collection = self.entity.collection();
        debug!(
            collection = %collection,
            is_one = intent.is_one,
            limit = ?intent.limit,
            skip = intent.skip,
            stages = data_plan.len(),
            "Executing query"
        );

        let (count_rows, rows) = tokio::try_join!(
            self.store.aggregate(collection, &count_plan),
            self.store.aggregate(collection, &data_plan)
        )?;

        let total = count_rows
            .first()
            .and_then(|row| row.get(COUNT_FIELD))
            .and_then(|n| n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)))
            .unwrap_or(0);

        let docs = rows
            .into_iter()
            .map(hydrate::<T>)
            .collect::<Result<Vec<_>, _>>()?;

        if intent.is_one {
            let doc = match docs.into_iter().next() {
                Some(doc) => Some(self.apply_transform(doc).await?),
                None => None,
            };
            return Ok(QueryResponse::one(doc, total));
        }

        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            out.push(self.apply_transform(doc).await?);
        }
        Ok(QueryResponse::many(out, total))
    }

    /// Apply the synchronous transform if set, otherwise the asynchronous one.
    async fn apply_transform(&self, doc: T) -> Result<T, Error> {
        if let Some(transform) = &self.transform {
            return transform(doc);
        }
        if let Some(transform) = &self.async_transform {
            return transform(doc).await;
        }
        Ok(doc)
    }
}

fn hydrate<T: DeserializeOwned>(row: Document) -> Result<T, Error> {
    serde_json::from_value(Value::Object(row)).map_err(|e| Error::Hydration(e.to_string()))
}
