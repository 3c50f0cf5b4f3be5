//! Routed model calls.
//!
//! The gateway owns one client and one call pool per tier. For each call it
//! audits the routing decision, waits for a pool slot, applies the tier
//! timeout, retries rate-limited or transient failures with exponential
//! backoff, and records usage. Every wait also selects on the caller's
//! cancellation token.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::{ModelClient, ModelError, ModelRequest, ModelResponse};
use crate::config::AnalysisConfig;
use crate::cost::CostLedger;
use crate::models::{
    AuditAction, AuditDetail, AuditEvent, AuditScope, ModelTier, RoutingDecision, SubAnalysis,
    UsageEvent,
};
use crate::pipeline::model_router::ModelRouter;
use crate::pipeline::traits::{AuditSink, UsageSink};

/// Who a call is made for, and how to stop it.
#[derive(Clone)]
pub struct CallContext {
    pub case_id: Option<String>,
    pub document_id: Option<String>,
    pub cancel: CancellationToken,
    pub ledger: Arc<CostLedger>,
}

impl CallContext {
    pub fn new(case_id: Option<&str>, document_id: Option<&str>, cancel: CancellationToken, ledger: Arc<CostLedger>) -> Self {
        Self {
            case_id: case_id.map(str::to_string),
            document_id: document_id.map(str::to_string),
            cancel,
            ledger,
        }
    }

    fn scope(&self) -> AuditScope {
        AuditScope {
            case_id: self.case_id.clone(),
            document_id: self.document_id.clone(),
        }
    }

    fn log_id(&self) -> &str {
        self.document_id
            .as_deref()
            .or(self.case_id.as_deref())
            .unwrap_or("unknown")
    }
}

/// One client per tier.
#[derive(Clone)]
pub struct TierClients {
    pub cheap: Arc<dyn ModelClient>,
    pub high_reasoning: Arc<dyn ModelClient>,
}

impl TierClients {
    /// The same client for both tiers.
    pub fn shared(client: Arc<dyn ModelClient>) -> Self {
        Self {
            cheap: Arc::clone(&client),
            high_reasoning: client,
        }
    }

    fn get(&self, tier: ModelTier) -> &Arc<dyn ModelClient> {
        match tier {
            ModelTier::Cheap => &self.cheap,
            ModelTier::HighReasoning => &self.high_reasoning,
        }
    }
}

pub struct ModelGateway {
    config: Arc<AnalysisConfig>,
    router: ModelRouter,
    clients: TierClients,
    cheap_pool: Semaphore,
    high_pool: Semaphore,
    audit: Arc<dyn AuditSink>,
    usage: Arc<dyn UsageSink>,
}

impl ModelGateway {
    pub fn new(
        config: Arc<AnalysisConfig>,
        clients: TierClients,
        audit: Arc<dyn AuditSink>,
        usage: Arc<dyn UsageSink>,
    ) -> Self {
        Self {
            router: ModelRouter::new(Arc::clone(&config)),
            cheap_pool: Semaphore::new(config.tiers.cheap.max_concurrent_calls),
            high_pool: Semaphore::new(config.tiers.high_reasoning.max_concurrent_calls),
            config,
            clients,
            audit,
            usage,
        }
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn pool(&self, tier: ModelTier) -> &Semaphore {
        match tier {
            ModelTier::Cheap => &self.cheap_pool,
            ModelTier::HighReasoning => &self.high_pool,
        }
    }

    /// Run one routed call to completion, failure or cancellation.
    pub async fn complete(
        &self,
        decision: &RoutingDecision,
        system: &str,
        prompt: &str,
        ctx: &CallContext,
    ) -> Result<ModelResponse, ModelError> {
        self.audit_event(AuditEvent::new(
            AuditAction::ModelRouting,
            ctx.scope(),
            AuditDetail::Routing {
                decision: decision.clone(),
            },
        ));
        tracing::debug!(
            id = ctx.log_id(),
            task = decision.task_type.as_str(),
            tier = decision.tier.as_str(),
            reason = decision.reason.as_str(),
            "Routing model call"
        );

        let request = ModelRequest {
            task: decision.task_type,
            model_id: decision.model_id.clone(),
            system: system.to_string(),
            prompt: prompt.to_string(),
            max_tokens: decision.estimated_output_tokens,
        };

        let outcome = self.call_with_retry(decision, &request, ctx).await;
        self.record_usage(decision, &outcome, ctx);

        if let Err(e) = &outcome {
            self.audit_event(AuditEvent::new(
                AuditAction::ModelCallFailed,
                ctx.scope(),
                AuditDetail::Failure {
                    step: SubAnalysis::for_task(decision.task_type),
                    reason: e.to_string(),
                },
            ));
        }
        outcome
    }

    async fn call_with_retry(
        &self,
        decision: &RoutingDecision,
        request: &ModelRequest,
        ctx: &CallContext,
    ) -> Result<ModelResponse, ModelError> {
        if ctx.cancel.is_cancelled() {
            return Err(ModelError::Cancelled);
        }
        let _permit = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(ModelError::Cancelled),
            permit = self.pool(decision.tier).acquire() => {
                permit.map_err(|_| ModelError::Transport("tier call pool closed".into()))?
            }
        };

        let client = self.clients.get(decision.tier);
        let timeout_secs = self.config.tiers.get(decision.tier).timeout_secs;
        let max_retries = self.config.concurrency.max_retries;
        let mut attempt: u32 = 0;

        loop {
            if ctx.cancel.is_cancelled() {
                return Err(ModelError::Cancelled);
            }
            let result = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => Err(ModelError::Cancelled),
                r = tokio::time::timeout(Duration::from_secs(timeout_secs), client.complete(request)) => {
                    r.unwrap_or(Err(ModelError::Timeout(timeout_secs)))
                }
            };

            match result {
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        id = ctx.log_id(),
                        tier = decision.tier.as_str(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Model call failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = ctx.cancel.cancelled() => return Err(ModelError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// `base · 2^attempt`, capped.
    fn backoff(&self, attempt: u32) -> Duration {
        let c = &self.config.concurrency;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(c.backoff_base_ms.saturating_mul(factor).min(c.backoff_max_ms))
    }

    fn record_usage(
        &self,
        decision: &RoutingDecision,
        outcome: &Result<ModelResponse, ModelError>,
        ctx: &CallContext,
    ) {
        let (tokens, cost) = match outcome {
            Ok(response) => {
                let input = response.input_tokens.unwrap_or(decision.estimated_input_tokens);
                let output = response.output_tokens.unwrap_or(decision.estimated_output_tokens);
                (input + output, self.router.estimate_cost(decision.tier, input, output))
            }
            Err(_) => (0, 0.0),
        };
        ctx.ledger.record(cost, tokens, ctx.case_id.as_deref().unwrap_or("none"));

        let event = UsageEvent {
            task_type: decision.task_type,
            model_tier: decision.tier,
            model_id: decision.model_id.clone(),
            tokens,
            estimated_cost: cost,
            case_id: ctx.case_id.clone(),
            document_id: ctx.document_id.clone(),
            succeeded: outcome.is_ok(),
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.usage.record_usage(&event) {
            tracing::error!(id = ctx.log_id(), error = %e, "Failed to record model usage");
        }
    }

    fn audit_event(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(&event) {
            tracing::error!(
                action = event.action.as_str(),
                error = %e,
                "Failed to write audit record"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::mock::{MockModelClient, RecordingSinks};
    use crate::models::{AnalysisTask, TaskType};

    fn gateway(client: Arc<MockModelClient>, sinks: &Arc<RecordingSinks>) -> ModelGateway {
        let mut config = AnalysisConfig::with_defaults();
        config.concurrency.backoff_base_ms = 1;
        config.concurrency.backoff_max_ms = 2;
        ModelGateway::new(
            Arc::new(config),
            TierClients::shared(client),
            Arc::clone(sinks) as Arc<dyn AuditSink>,
            Arc::clone(sinks) as Arc<dyn UsageSink>,
        )
    }

    fn ctx() -> CallContext {
        CallContext::new(Some("case-1"), Some("doc-1"), CancellationToken::new(), Arc::new(CostLedger::unbounded()))
    }

    fn classification_decision(g: &ModelGateway) -> RoutingDecision {
        g.router().route(&AnalysisTask {
            task_type: TaskType::Classification,
            input_chars: 4_000,
            complexity: 0.2,
        })
    }

    #[tokio::test]
    async fn successful_call_records_usage_and_routing_audit() {
        let client = Arc::new(MockModelClient::new());
        client.respond(TaskType::Classification, "{\"ok\":true}");
        let sinks = Arc::new(RecordingSinks::default());
        let g = gateway(Arc::clone(&client), &sinks);
        let ctx = ctx();

        let decision = classification_decision(&g);
        let response = g.complete(&decision, "sys", "prompt", &ctx).await.unwrap();
        assert_eq!(response.content, "{\"ok\":true}");

        let usage = sinks.usage();
        assert_eq!(usage.len(), 1);
        assert!(usage[0].succeeded);
        assert_eq!(usage[0].tokens, 1_300);
        assert_eq!(usage[0].case_id.as_deref(), Some("case-1"));
        assert_eq!(sinks.actions(), vec![AuditAction::ModelRouting]);
        assert_eq!(ctx.ledger.total_tokens(), 1_300);
    }

    #[tokio::test]
    async fn rate_limit_is_retried_then_succeeds() {
        let client = Arc::new(MockModelClient::new());
        client.fail(TaskType::Classification, ModelError::RateLimited);
        client.fail(TaskType::Classification, ModelError::RateLimited);
        client.respond(TaskType::Classification, "{}");
        let sinks = Arc::new(RecordingSinks::default());
        let g = gateway(Arc::clone(&client), &sinks);

        let decision = classification_decision(&g);
        assert!(g.complete(&decision, "s", "p", &ctx()).await.is_ok());
        assert_eq!(client.call_count(TaskType::Classification), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let client = Arc::new(MockModelClient::new());
        for _ in 0..10 {
            client.fail(TaskType::Classification, ModelError::RateLimited);
        }
        let sinks = Arc::new(RecordingSinks::default());
        let g = gateway(Arc::clone(&client), &sinks);

        let decision = classification_decision(&g);
        let err = g.complete(&decision, "s", "p", &ctx()).await.unwrap_err();
        assert_eq!(err, ModelError::RateLimited);
        // One call plus three retries.
        assert_eq!(client.call_count(TaskType::Classification), 4);
        assert_eq!(
            sinks.actions(),
            vec![AuditAction::ModelRouting, AuditAction::ModelCallFailed]
        );
        assert!(!sinks.usage()[0].succeeded);
    }

    #[tokio::test]
    async fn malformed_is_not_retried() {
        let client = Arc::new(MockModelClient::new());
        client.fail(TaskType::Classification, ModelError::MalformedResponse("x".into()));
        let sinks = Arc::new(RecordingSinks::default());
        let g = gateway(Arc::clone(&client), &sinks);

        let decision = classification_decision(&g);
        assert!(g.complete(&decision, "s", "p", &ctx()).await.is_err());
        assert_eq!(client.call_count(TaskType::Classification), 1);
    }

    #[tokio::test]
    async fn cancelled_before_call() {
        let client = Arc::new(MockModelClient::new());
        client.respond(TaskType::Classification, "{}");
        let sinks = Arc::new(RecordingSinks::default());
        let g = gateway(Arc::clone(&client), &sinks);
        let ctx = ctx();
        ctx.cancel.cancel();

        let decision = classification_decision(&g);
        let err = g.complete(&decision, "s", "p", &ctx).await.unwrap_err();
        assert_eq!(err, ModelError::Cancelled);
        assert_eq!(client.call_count(TaskType::Classification), 0);
    }

    #[tokio::test]
    async fn cancelled_token_never_reaches_client() {
        let client = Arc::new(MockModelClient::new());
        client.respond(TaskType::Classification, "{}");
        let sinks = Arc::new(RecordingSinks::default());
        let g = gateway(Arc::clone(&client), &sinks);
        let decision = classification_decision(&g);

        for _ in 0..200 {
            let ctx = ctx();
            ctx.cancel.cancel();
            let err = g.complete(&decision, "s", "p", &ctx).await.unwrap_err();
            assert_eq!(err, ModelError::Cancelled);
        }
        assert_eq!(client.call_count(TaskType::Classification), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let client = Arc::new(MockModelClient::new());
        client.respond_after(TaskType::Classification, "{}", Duration::from_secs(600));
        let sinks = Arc::new(RecordingSinks::default());
        let g = gateway(Arc::clone(&client), &sinks);

        let decision = classification_decision(&g);
        let err = g.complete(&decision, "s", "p", &ctx()).await.unwrap_err();
        assert_eq!(err, ModelError::Timeout(30));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let client = Arc::new(MockModelClient::new());
        let sinks = Arc::new(RecordingSinks::default());
        let mut config = AnalysisConfig::with_defaults();
        config.concurrency.backoff_base_ms = 500;
        config.concurrency.backoff_max_ms = 8_000;
        let g = ModelGateway::new(
            Arc::new(config),
            TierClients::shared(client),
            Arc::clone(&sinks) as Arc<dyn AuditSink>,
            sinks as Arc<dyn UsageSink>,
        );
        assert_eq!(g.backoff(0), Duration::from_millis(500));
        assert_eq!(g.backoff(2), Duration::from_millis(2_000));
        assert_eq!(g.backoff(10), Duration::from_millis(8_000));
        assert_eq!(g.backoff(200), Duration::from_millis(8_000));
    }
}
