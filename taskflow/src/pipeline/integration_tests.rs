//! Integration tests for pipeline execution.

#[cfg(test)]
mod tests {
    use crate::cache::{Fingerprint, InMemoryTaskCache, TaskCache};
    use crate::events::CollectingEventSink;
    use crate::pipeline::{PipelineBuilder, RunState};
    use crate::task::{CachePolicy, RetryPolicy, Task};
    use crate::testing::{CallCounter, MockOperation};
    use crate::utils::{Clock, ManualClock};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn step(name: &str, output: u32) -> (Task<u32, u32>, CallCounter) {
        let op = MockOperation::succeeding(output);
        let counter = op.counter();
        (Task::new(name, op), counter)
    }

    #[tokio::test]
    async fn test_retry_bound() {
        let op: MockOperation<u32> = MockOperation::failing("unreachable host");
        let counter = op.counter();
        let pipeline = PipelineBuilder::<u32>::new("bound")
            .then(Task::new("fetch", op).with_retry(RetryPolicy::new(3)))
            .build()
            .unwrap();

        let err = pipeline.run(0).await.unwrap_err();

        assert_eq!(counter.get(), 3);
        assert_eq!(err.task_name, "fetch");
        assert_eq!(err.attempts(), 3);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let op = MockOperation::flaky(2, 11u32);
        let counter = op.counter();
        let pipeline = PipelineBuilder::<u32>::new("flaky")
            .then(Task::new("fetch", op).with_retry(RetryPolicy::new(3)))
            .build()
            .unwrap();

        assert_eq!(pipeline.run(0).await.unwrap(), 11);
        assert_eq!(counter.get(), 3);
    }

    #[tokio::test]
    async fn test_short_circuit_on_exhausted_task() {
        let sink = Arc::new(CollectingEventSink::new());
        let (first, first_calls) = step("fetch", 1);
        let failing: MockOperation<u32> = MockOperation::failing("bad rows");
        let second_calls = failing.counter();
        let (third, third_calls) = step("write_local", 3);
        let (fourth, fourth_calls) = step("write_remote", 4);

        let pipeline = PipelineBuilder::<u32>::new("etl")
            .then(first)
            .then(Task::new("clean", failing).with_retry(RetryPolicy::new(2)))
            .then(third)
            .then(fourth)
            .with_event_sink(sink.clone())
            .build()
            .unwrap();

        let run = pipeline.execute(0).await;

        assert!(!run.is_success());
        assert_eq!(first_calls.get(), 1);
        assert_eq!(second_calls.get(), 2);
        assert_eq!(third_calls.get(), 0);
        assert_eq!(fourth_calls.get(), 0);

        assert!(matches!(run.state, RunState::Failed { task_index: 1, .. }));
        let err = run.result.unwrap_err();
        assert_eq!(err.pipeline, "etl");
        assert_eq!(err.task_index, 1);
        assert_eq!(err.task_name, "clean");
        assert_eq!(err.attempts(), 2);

        assert_eq!(sink.count("pipeline.failed"), 1);
        assert_eq!(sink.count("pipeline.completed"), 0);
        assert_eq!(
            sink.state_changes().last().map(|(from, _)| from.clone()),
            Some(RunState::Running { task_index: 1 })
        );
    }

    #[tokio::test]
    async fn test_successful_run_reports_states() {
        let sink = Arc::new(CollectingEventSink::new());
        let (first, _) = step("a", 1);
        let (second, _) = step("b", 2);
        let pipeline = PipelineBuilder::<u32>::new("ok")
            .then(first)
            .then(second)
            .with_event_sink(sink.clone())
            .build()
            .unwrap();

        let run = pipeline.execute(0).await;

        assert_eq!(run.state, RunState::Succeeded);
        assert_eq!(run.pipeline, "ok");
        assert_eq!(run.result.unwrap(), 2);

        assert_eq!(
            sink.state_changes(),
            vec![
                (RunState::Pending, RunState::Running { task_index: 0 }),
                (
                    RunState::Running { task_index: 0 },
                    RunState::Running { task_index: 1 }
                ),
                (RunState::Running { task_index: 1 }, RunState::Succeeded),
            ]
        );
        assert_eq!(sink.count("pipeline.started"), 1);
        assert_eq!(sink.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_each_run_gets_fresh_id() {
        let (only, _) = step("a", 1);
        let pipeline = PipelineBuilder::<u32>::new("ids").then(only).build().unwrap();

        let first = pipeline.execute(0).await;
        let second = pipeline.execute(0).await;

        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl_across_runs() {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(InMemoryTaskCache::new());
        let fetch = MockOperation::succeeding("payload".to_string());
        let fetch_calls = fetch.counter();
        let (clean, clean_calls) = {
            let op = MockOperation::succeeding(7u32);
            let counter = op.counter();
            (Task::<String, u32>::new("clean", op), counter)
        };

        let pipeline = PipelineBuilder::<String>::new("cached")
            .then(Task::new("fetch", fetch).with_cache(CachePolicy::from_secs(3600)))
            .then(clean)
            .with_cache(cache.clone())
            .with_clock(clock.clone())
            .build()
            .unwrap();

        let input = "https://example.com/data.csv.gz".to_string();
        assert_eq!(pipeline.run(input.clone()).await.unwrap(), 7);
        clock.advance(Duration::from_secs(1800));
        assert_eq!(pipeline.run(input.clone()).await.unwrap(), 7);

        assert_eq!(fetch_calls.get(), 1);
        assert_eq!(clean_calls.get(), 2);

        let fingerprint = Fingerprint::compute("fetch", &input).unwrap();
        assert_eq!(
            cache.lookup(&fingerprint, clock.now()).await.unwrap(),
            Some(serde_json::json!("payload"))
        );

        clock.advance(Duration::from_secs(3600));
        pipeline.run(input).await.unwrap();
        assert_eq!(fetch_calls.get(), 2);
    }

    #[tokio::test]
    async fn test_pipelines_share_injected_cache() {
        let cache: Arc<dyn TaskCache> = Arc::new(InMemoryTaskCache::new());
        let fetch = MockOperation::succeeding(3u32);
        let calls = fetch.counter();
        let task = Task::new("fetch", fetch).with_cache(CachePolicy::one_day());

        let first = PipelineBuilder::<u32>::new("first")
            .then(task.clone())
            .with_cache(Arc::clone(&cache))
            .build()
            .unwrap();
        let second = PipelineBuilder::<u32>::new("second")
            .then(task)
            .with_cache(cache)
            .build()
            .unwrap();

        first.run(1).await.unwrap();
        second.run(1).await.unwrap();

        assert_eq!(calls.get(), 1);
    }
}
