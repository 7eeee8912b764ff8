//! @ai:module:intent Uniform "run one test case, return output and cost" contract over any workflow
//! @ai:module:layer application
//! @ai:module:public_api WorkflowTrait, CostMapperTrait, Executor, Execution, WorkflowRun, FnWorkflow, MeteredFnWorkflow
//! @ai:module:stateless true

use crate::config::LlmConfig;
use anyhow::Result;
use std::future::Future;
use std::marker::PhantomData;

/// @ai:intent Output of one workflow invocation plus the raw usage it reported
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRun<O, U> {
    pub output: O,
    /// Usage across every internal call the workflow made; None when not metered
    pub usage: Option<U>,
}

impl<O, U> WorkflowRun<O, U> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: U) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// @ai:intent The workflow under test
///
/// Errors are reported as a failed test case; they never abort the run.
pub trait WorkflowTrait: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;
    type Usage: Send;

    /// @ai:intent Produce the output for one test case input
    /// @ai:effects depends on the workflow
    fn run(
        &self,
        input: &Self::Input,
        llm: Option<&LlmConfig>,
    ) -> impl Future<Output = Result<WorkflowRun<Self::Output, Self::Usage>>> + Send;
}

/// @ai:intent Convert a workflow's usage record into USD
pub trait CostMapperTrait<U>: Send + Sync {
    fn map_cost(&self, usage: &U) -> f64;
}

impl<U, F> CostMapperTrait<U> for F
where
    F: Fn(&U) -> f64 + Send + Sync,
{
    fn map_cost(&self, usage: &U) -> f64 {
        self(usage)
    }
}

/// @ai:intent Result of one executor invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Execution<O> {
    pub output: O,
    pub cost: f64,
}

/// @ai:intent Wraps a workflow and its optional cost mapper
pub struct Executor<W: WorkflowTrait> {
    workflow: W,
    cost_mapper: Option<Box<dyn CostMapperTrait<W::Usage>>>,
}

impl<W: WorkflowTrait> Executor<W> {
    /// @ai:intent Executor whose invocations always cost zero
    /// @ai:effects pure
    pub fn new(workflow: W) -> Self {
        Self {
            workflow,
            cost_mapper: None,
        }
    }

    /// @ai:intent Executor that prices each invocation's usage
    /// @ai:effects pure
    pub fn with_cost_mapper(workflow: W, mapper: impl CostMapperTrait<W::Usage> + 'static) -> Self {
        Self {
            workflow,
            cost_mapper: Some(Box::new(mapper)),
        }
    }

    /// @ai:intent Run the workflow once and map its usage to exactly one cost value
    /// @ai:post Ok(execution) implies execution.cost is finite and >= 0
    /// @ai:effects depends on the workflow
    pub async fn execute(
        &self,
        input: &W::Input,
        llm: Option<&LlmConfig>,
    ) -> Result<Execution<W::Output>> {
        let run = self.workflow.run(input, llm).await?;

        let cost = match (&self.cost_mapper, &run.usage) {
            (Some(mapper), Some(usage)) => mapper.map_cost(usage),
            _ => 0.0,
        };

        if !cost.is_finite() || cost < 0.0 {
            anyhow::bail!("cost mapper returned an invalid cost: {}", cost);
        }

        Ok(Execution {
            output: run.output,
            cost,
        })
    }
}

/// @ai:intent Adapt an async closure `input -> output` into an unmetered workflow
pub struct FnWorkflow<I, O, F> {
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O, F, Fut> FnWorkflow<I, O, F>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<O>>,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<I, O, F, Fut> WorkflowTrait for FnWorkflow<I, O, F>
where
    I: Clone + Send + Sync,
    O: Send,
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O>> + Send,
{
    type Input = I;
    type Output = O;
    type Usage = ();

    async fn run(&self, input: &I, _llm: Option<&LlmConfig>) -> Result<WorkflowRun<O, ()>> {
        let output = (self.f)(input.clone()).await?;
        Ok(WorkflowRun::new(output))
    }
}

/// @ai:intent Adapt an async closure that also reports usage
pub struct MeteredFnWorkflow<I, O, U, F> {
    f: F,
    _marker: PhantomData<fn(I) -> (O, U)>,
}

impl<I, O, U, F, Fut> MeteredFnWorkflow<I, O, U, F>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<WorkflowRun<O, U>>>,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<I, O, U, F, Fut> WorkflowTrait for MeteredFnWorkflow<I, O, U, F>
where
    I: Clone + Send + Sync,
    O: Send,
    U: Send,
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<WorkflowRun<O, U>>> + Send,
{
    type Input = I;
    type Output = O;
    type Usage = U;

    async fn run(&self, input: &I, _llm: Option<&LlmConfig>) -> Result<WorkflowRun<O, U>> {
        (self.f)(input.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct Tokens {
        calls: u32,
        tokens: u32,
    }

    fn metered() -> MeteredFnWorkflow<
        u32,
        u32,
        Tokens,
        impl Fn(u32) -> std::future::Ready<Result<WorkflowRun<u32, Tokens>>> + Send + Sync,
    > {
        MeteredFnWorkflow::new(|n: u32| {
            std::future::ready(Ok(WorkflowRun::new(n * 2).with_usage(Tokens {
                calls: 3,
                tokens: 1000 * n,
            })))
        })
    }

    #[tokio::test]
    async fn test_unmetered_workflow_costs_zero() {
        let executor = Executor::new(FnWorkflow::new(|s: String| async move {
            Ok(s.to_uppercase())
        }));

        let execution = executor.execute(&"acme".to_string(), None).await.unwrap();
        assert_eq!(execution.output, "ACME");
        assert_eq!(execution.cost, 0.0);
    }

    #[tokio::test]
    async fn test_cost_mapper_sees_whole_usage_record() {
        let executor = Executor::with_cost_mapper(metered(), |usage: &Tokens| {
            usage.tokens as f64 * 0.000001 + usage.calls as f64 * 0.01
        });

        let execution = executor.execute(&5, None).await.unwrap();
        assert_eq!(execution.output, 10);
        assert!((execution.cost - (0.005 + 0.03)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_usage_without_mapper_costs_zero() {
        let execution = Executor::new(metered()).execute(&1, None).await.unwrap();
        assert_eq!(execution.cost, 0.0);
    }

    #[tokio::test]
    async fn test_invalid_cost_fails_the_invocation() {
        let negative = Executor::with_cost_mapper(metered(), |_: &Tokens| -1.0);
        let err = negative.execute(&1, None).await.unwrap_err();
        assert!(err.to_string().contains("invalid cost"));

        let nan = Executor::with_cost_mapper(metered(), |_: &Tokens| f64::NAN);
        assert!(nan.execute(&1, None).await.is_err());
    }

    #[tokio::test]
    async fn test_workflow_error_propagates() {
        let executor = Executor::new(FnWorkflow::new(|_: u32| async move {
            Err::<u32, _>(anyhow::anyhow!("upstream timeout"))
        }));

        let err = executor.execute(&1, None).await.unwrap_err();
        assert_eq!(err.to_string(), "upstream timeout");
    }
}
