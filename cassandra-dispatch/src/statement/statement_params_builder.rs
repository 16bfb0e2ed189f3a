use bytes::Bytes;
use derivative::Derivative;
use std::sync::Arc;

use crate::consistency::Consistency;
use crate::retry::RetryPolicy;
use crate::statement::StatementParams;
use crate::types::RoutingKey;

#[derive(Default, Derivative)]
#[derivative(Debug)]
pub struct StatementParamsBuilder {
    consistency: Option<Consistency>,
    values: Bytes,
    is_idempotent: bool,
    keyspace: Option<String>,
    routing_key: Option<RoutingKey>,
    #[derivative(Debug = "ignore")]
    retry_policy: Option<Arc<dyn RetryPolicy + Send + Sync>>,
}

impl StatementParamsBuilder {
    pub fn new() -> StatementParamsBuilder {
        Default::default()
    }

    /// Sets new statement consistency
    #[must_use]
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = Some(consistency);
        self
    }

    /// Sets new statement values.
    #[must_use]
    pub fn with_values(mut self, values: impl Into<Bytes>) -> Self {
        self.values = values.into();
        self
    }

    /// Marks the statement as idempotent or not
    #[must_use]
    pub fn with_idempotent(mut self, value: bool) -> Self {
        self.is_idempotent = value;
        self
    }

    /// Marks the statement as idempotent.
    #[must_use]
    pub fn idempotent(self) -> Self {
        self.with_idempotent(true)
    }

    /// Sets query keyspace.
    #[must_use]
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    /// Sets the routing key used by token-aware load balancing.
    #[must_use]
    pub fn with_routing_key(mut self, routing_key: RoutingKey) -> Self {
        self.routing_key = Some(routing_key);
        self
    }

    /// Sets custom statement retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: Arc<dyn RetryPolicy + Send + Sync>) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }

    #[must_use]
    pub fn build(self) -> StatementParams {
        StatementParams {
            consistency: self.consistency,
            values: self.values,
            is_idempotent: self.is_idempotent,
            keyspace: self.keyspace,
            routing_key: self.routing_key,
            retry_policy: self.retry_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use std::sync::Arc;

    use crate::consistency::Consistency;
    use crate::retry::FallthroughRetryPolicy;
    use crate::statement::StatementParamsBuilder;
    use crate::types::RoutingKey;

    #[test]
    fn should_build_params() {
        let params = StatementParamsBuilder::new()
            .with_consistency(Consistency::LocalQuorum)
            .with_values(vec![1, 2, 3])
            .with_keyspace("ks")
            .with_routing_key(RoutingKey::from(vec![7]))
            .with_retry_policy(Arc::new(FallthroughRetryPolicy))
            .idempotent()
            .build();

        assert_eq!(params.consistency, Some(Consistency::LocalQuorum));
        assert_eq!(params.values, Bytes::from_static(&[1, 2, 3]));
        assert_eq!(params.keyspace.as_deref(), Some("ks"));
        assert_eq!(params.routing_key, Some(RoutingKey::from(vec![7])));
        assert!(params.is_idempotent);
        assert!(params.retry_policy.is_some());
    }

    #[test]
    fn should_default_to_session_consistency() {
        let params = StatementParamsBuilder::new().build();

        assert_eq!(params.consistency, None);
        assert!(!params.is_idempotent);
        assert!(params.retry_policy.is_none());
    }
}
