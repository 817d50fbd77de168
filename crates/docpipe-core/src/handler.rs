//! Request handler: middleware, parameter parsing and execution for one request.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::catalog::{EntityRegistry, ResolvedEntity};
use crate::config::HandlerConfig;
use crate::envelope::QueryResponse;
use crate::error::Error;
use crate::query::{
    FilterPolicyRegistry, ParsedParams, PlanBuilder, QueryBuilder, QueryOptions, RequestParams,
};
use crate::store::DocumentStore;

/// State handed to middleware before parameters are parsed.
#[derive(Debug)]
pub struct ExecContext {
    /// Entity being queried.
    pub entity: Arc<ResolvedEntity>,
    /// Raw request parameters; changes are seen by the parser.
    pub params: RequestParams,
    /// Plan state of the request's builder.
    pub plan: PlanBuilder,
}

/// A middleware decision to stop the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Status code of the response.
    pub status: u16,
    /// Message placed in the envelope's `error` field.
    pub message: String,
}

impl Rejection {
    /// Create a rejection with a status code.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 401 Unauthorized.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    /// 403 Forbidden.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

/// A hook run before every execution, in registration order.
pub trait ExecMiddleware: Send + Sync {
    /// Inspect or modify the request. Returning `Err` stops it.
    fn before_exec(&self, ctx: &mut ExecContext) -> Result<(), Rejection>;
}

impl<F> ExecMiddleware for F
where
    F: Fn(&mut ExecContext) -> Result<(), Rejection> + Send + Sync,
{
    fn before_exec(&self, ctx: &mut ExecContext) -> Result<(), Rejection> {
        self(ctx)
    }
}

enum MiddlewareOutcome {
    Continue(ExecContext),
    Rejected(Rejection),
    Failed(String),
}

/// Entry point for fluent collection queries.
///
/// Holds the start-up registries and the store; construct one per process and
/// share it behind an `Arc`.
#[derive(Clone)]
pub struct FluentHandler {
    registry: Arc<EntityRegistry>,
    policies: Arc<FilterPolicyRegistry>,
    store: Arc<dyn DocumentStore>,
    middleware: Arc<Vec<Arc<dyn ExecMiddleware>>>,
    config: HandlerConfig,
}

impl FluentHandler {
    /// Create a handler.
    pub fn new(
        registry: Arc<EntityRegistry>,
        policies: Arc<FilterPolicyRegistry>,
        store: Arc<dyn DocumentStore>,
        config: HandlerConfig,
    ) -> Self {
        Self {
            registry,
            policies,
            store,
            middleware: Arc::new(Vec::new()),
            config,
        }
    }

    /// Append a middleware hook.
    pub fn with_middleware(mut self, middleware: impl ExecMiddleware + 'static) -> Self {
        Arc::make_mut(&mut self.middleware).push(Arc::new(middleware));
        self
    }

    /// The entity registry.
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// The filter policy registry.
    pub fn policies(&self) -> &FilterPolicyRegistry {
        &self.policies
    }

    /// Handler configuration.
    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Create a builder for an entity, using the configured query timeout.
    pub fn builder<T>(&self, entity: &str, options: QueryOptions<T>) -> Result<QueryBuilder<T>, Error>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let entity = self.registry.resolved(entity)?;
        let mut builder = QueryBuilder::new(entity, Arc::clone(&self.store), options);
        if builder.timeout().is_none() {
            builder.set_timeout(self.config.query_timeout);
        }
        Ok(builder)
    }

    /// Run middleware, apply request parameters to the builder and execute it.
    pub async fn exec<T>(&self, mut builder: QueryBuilder<T>, params: RequestParams) -> QueryResponse<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let entity = Arc::clone(builder.entity());

        let params = if self.middleware.is_empty() {
            params
        } else {
            let ctx = ExecContext {
                entity: Arc::clone(&entity),
                params,
                plan: builder.take_plan(),
            };
            match self.run_middleware(ctx).await {
                MiddlewareOutcome::Continue(ctx) => {
                    builder.restore_plan(ctx.plan);
                    ctx.params
                }
                MiddlewareOutcome::Rejected(rejection) => {
                    debug!(entity = %entity.name(), status = rejection.status, "Request rejected by middleware");
                    return QueryResponse::failure(rejection.status).with_error(rejection.message);
                }
                MiddlewareOutcome::Failed(reason) => {
                    error!(entity = %entity.name(), reason = %reason, "Middleware failed");
                    return QueryResponse::internal_error();
                }
            }
        };

        let parsed = ParsedParams::parse_with_default(&params, self.config.default_limit);
        parsed.apply(
            builder.plan_mut(),
            &entity.def,
            self.policies.fields_for(entity.name()),
            self.config.filter_mode,
        );

        if builder.timeout().is_none() {
            builder.set_timeout(self.config.query_timeout);
        }
        builder.exec(parsed.intent()).await
    }

    /// Query a collection by name, returning raw JSON documents.
    ///
    /// Fails only when no entity is registered for the collection.
    pub async fn exec_collection(
        &self,
        collection: &str,
        params: RequestParams,
    ) -> Result<QueryResponse<Value>, Error> {
        let entity = self
            .registry
            .by_collection(collection)
            .ok_or_else(|| Error::UnknownEntity(collection.to_string()))?;
        let builder = self.builder::<Value>(entity.name(), QueryOptions::new())?;
        Ok(self.exec(builder, params).await)
    }

    /// Run the middleware chain on the blocking pool under the configured timeout.
    async fn run_middleware(&self, mut ctx: ExecContext) -> MiddlewareOutcome {
        let chain = Arc::clone(&self.middleware);
        let task = tokio::task::spawn_blocking(move || {
            for middleware in chain.iter() {
                middleware.before_exec(&mut ctx)?;
            }
            Ok::<_, Rejection>(ctx)
        });

        match tokio::time::timeout(self.config.middleware_timeout, task).await {
            Ok(Ok(Ok(ctx))) => MiddlewareOutcome::Continue(ctx),
            Ok(Ok(Err(rejection))) => MiddlewareOutcome::Rejected(rejection),
            Ok(Err(join_error)) => MiddlewareOutcome::Failed(join_error.to_string()),
            Err(_) => {
                warn!(
                    timeout_ms = self.config.middleware_timeout.as_millis() as u64,
                    "Middleware chain timed out"
                );
                MiddlewareOutcome::Failed("middleware timed out".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, FieldType, ScalarType};
    use crate::query::{Conjunction, Stage};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn handler(config: HandlerConfig) -> FluentHandler {
        let registry = EntityRegistry::builder()
            .register(
                EntityDef::new("Account", "accounts")
                    .with_field(
                        FieldDef::new("name", FieldType::scalar(ScalarType::String)).filterable(),
                    )
                    .with_field(
                        FieldDef::new("secret", FieldType::scalar(ScalarType::String)).hidden(),
                    ),
            )
            .unwrap()
            .build();
        let policies = FilterPolicyRegistry::builder()
            .register("Account", None)
            .build(&registry)
            .unwrap();

        let store = MemoryStore::new();
        store
            .insert_many(
                "accounts",
                ["ann", "annie", "bob"].iter().enumerate().map(|(i, name)| {
                    json!({"_id": {"$oid": format!("{:024x}", i + 1)}, "name": name, "secret": "s"})
                }),
            )
            .unwrap();

        FluentHandler::new(Arc::new(registry), Arc::new(policies), Arc::new(store), config)
    }

    fn params(pairs: &[(&str, &str)]) -> RequestParams {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_exec_collection_filter() {
        let handler = handler(HandlerConfig::default());
        let response = handler
            .exec_collection("accounts", params(&[("filter", "ANN")]))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body.meta.total, 2);
        let docs = response.body.data.as_many().unwrap();
        assert!(docs.iter().all(|d| d.get("secret").is_none()));
    }

    #[tokio::test]
    async fn test_exec_collection_by_id() {
        let handler = handler(HandlerConfig::default());
        let id = format!("{:024x}", 3);
        let response = handler
            .exec_collection("accounts", params(&[("id", id.as_str())]))
            .await
            .unwrap();

        assert_eq!(response.body.meta.total, 1);
        let doc = response.body.data.as_one().unwrap();
        assert_eq!(doc["name"], "bob");
        assert_eq!(doc["_id"], json!({"$oid": id}));
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let handler = handler(HandlerConfig::default());
        let result = handler.exec_collection("nope", RequestParams::new()).await;
        assert!(matches!(result, Err(Error::UnknownEntity(_))));
        assert!(handler.builder::<Value>("Nope", QueryOptions::new()).is_err());
    }

    #[tokio::test]
    async fn test_middleware_can_mutate_params_and_plan() {
        let rewrite = |ctx: &mut ExecContext| -> Result<(), Rejection> {
            ctx.params.insert("limit", "1");
            ctx.plan
                .match_conditions(json!({"name": {"$ne": "bob"}}), Conjunction::And, true);
            Ok(())
        };
        let handler = handler(HandlerConfig::default()).with_middleware(rewrite);

        let response = handler
            .exec_collection("accounts", RequestParams::new())
            .await
            .unwrap();
        assert_eq!(response.body.meta.total, 2);
        assert_eq!(response.body.data.len(), 1);
    }

    #[tokio::test]
    async fn test_middleware_rejection() {
        let handler = handler(HandlerConfig::default())
            .with_middleware(|_: &mut ExecContext| -> Result<(), Rejection> { Ok(()) })
            .with_middleware(|_: &mut ExecContext| -> Result<(), Rejection> {
                Err(Rejection::forbidden("no access"))
            });

        let response = handler
            .exec_collection("accounts", RequestParams::new())
            .await
            .unwrap();
        assert_eq!(response.status, 403);
        assert_eq!(response.body.error.as_deref(), Some("no access"));
        assert!(response.body.data.is_empty());
    }

    #[tokio::test]
    async fn test_middleware_timeout() {
        let config = HandlerConfig::default().middleware_timeout(Duration::from_millis(20));
        let slow = |_: &mut ExecContext| -> Result<(), Rejection> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        };
        let handler = handler(config).with_middleware(slow);

        let response = handler
            .exec_collection("accounts", RequestParams::new())
            .await
            .unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.body.meta.total, 0);
    }

    #[tokio::test]
    async fn test_builder_keeps_custom_stages() {
        let handler = handler(HandlerConfig::default());
        let mut builder = handler
            .builder::<Value>("Account", QueryOptions::new())
            .unwrap();
        builder.stage(Stage::Sort(json!({"name": -1})));

        let response = handler.exec(builder, params(&[("limit", "full")])).await;
        let names: Vec<_> = response
            .body
            .data
            .as_many()
            .unwrap()
            .iter()
            .filter_map(|d| d.get("name").and_then(Value::as_str).map(String::from))
            .collect();
        assert_eq!(names, ["bob", "annie", "ann"]);
    }
}
