//! End-to-end tests for the tutoring pipeline against a canned generator.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fixture_path, CannedGenerator, CASUAL_REPLY, FINAL_ANSWER};
use futures::StreamExt;
use tutor_orchestrator::{
    Config, QuestionType, ResponseCache, Stage, Subject, Tutor, TutorError, TutoringRequest,
};

fn tutor_with(generator: &Arc<CannedGenerator>) -> Tutor {
    Tutor::new(generator.clone(), Arc::new(ResponseCache::new()))
}

/// Tests that the sample config loads successfully.
#[test]
fn test_sample_config_loads() {
    let config = Config::load_from_file(&fixture_path("tutor.json")).expect("Failed to load config");

    assert_eq!(config.model, "gemini-2.5-flash");
    assert_eq!(config.max_tokens, 1024);
    assert_eq!(config.api_key_env, "TUTOR_TEST_API_KEY");
    assert_eq!(config.generation_timeout(), Some(Duration::from_secs(5)));
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.rate_limit.requests_per_minute, 3);
}

#[tokio::test]
async fn test_subject_question_full_run() {
    let generator = Arc::new(CannedGenerator::new());
    let tutor = tutor_with(&generator);
    let request = TutoringRequest::new("What is velocity?", "physics").unwrap();

    let outcome = tutor.run(&request).await.unwrap();
    let state = outcome.state.expect("fresh run keeps its state");

    assert_eq!(outcome.response, FINAL_ANSWER);
    assert_eq!(generator.calls(), 4);
    assert_eq!(state.question_type, QuestionType::Subject);
    assert_eq!(state.topic_identified, "Topic: Kinematics | Subtopic: Velocity");
    assert_eq!(state.analogy, "A car heading north at 60 km/h.");
    assert_eq!(state.current_stage(), Stage::End);
    assert_eq!(state.generation_calls(), 4);
}

#[tokio::test]
async fn test_greeting_takes_one_call() {
    let generator = Arc::new(CannedGenerator::new());
    let tutor = tutor_with(&generator);

    let reply = tutor.run_pipeline("hi", "chemistry").await.unwrap();

    assert_eq!(reply.response, CASUAL_REPLY);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_cache_hit_skips_every_stage() {
    let generator = Arc::new(CannedGenerator::new());
    let tutor = tutor_with(&generator);
    let first = TutoringRequest::new("What is velocity?", "physics").unwrap();
    let second = TutoringRequest::new("  WHAT IS VELOCITY?  ", "Physics").unwrap();

    tutor.run(&first).await.unwrap();
    let outcome = tutor.run(&second).await.unwrap();

    assert!(outcome.cached);
    assert!(outcome.state.is_none());
    assert_eq!(outcome.response, FINAL_ANSWER);
    assert_eq!(generator.calls(), 4);

    let stats = tutor.cache().stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_same_question_different_subjects_are_cached_separately() {
    let generator = Arc::new(CannedGenerator::new());
    let tutor = tutor_with(&generator);

    tutor.run_pipeline("What is energy?", "physics").await.unwrap();
    tutor.run_pipeline("What is energy?", "chemistry").await.unwrap();

    assert_eq!(generator.calls(), 8);
    assert_eq!(tutor.cache().len(), 2);
}

#[tokio::test]
async fn test_tutors_sharing_a_cache_share_answers() {
    let generator = Arc::new(CannedGenerator::new());
    let cache = Arc::new(ResponseCache::new());
    let physics = Tutor::new(generator.clone(), Arc::clone(&cache));
    let other = Tutor::new(generator.clone(), Arc::clone(&cache));

    physics.run_pipeline("What is velocity?", "physics").await.unwrap();
    let reply = other.run_pipeline("what is velocity?", "physics").await.unwrap();

    assert_eq!(reply.response, FINAL_ANSWER);
    assert_eq!(generator.calls(), 4);
}

#[tokio::test]
async fn test_concurrent_requests_store_one_entry() {
    let generator = Arc::new(CannedGenerator::slow(Duration::from_millis(10)));
    let tutor = tutor_with(&generator);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let tutor = tutor.clone();
            tokio::spawn(async move { tutor.run_pipeline("What is velocity?", "physics").await })
        })
        .collect();

    for handle in handles {
        let reply = handle.await.unwrap().unwrap();
        assert_eq!(reply.response, FINAL_ANSWER);
    }

    assert_eq!(tutor.cache().len(), 1);
    assert!(generator.calls() >= 4);
}

#[tokio::test]
async fn test_stream_and_blocking_runs_agree() {
    let generator = Arc::new(CannedGenerator::new());
    let streaming = tutor_with(&generator);
    let blocking = tutor_with(&generator);
    let request = TutoringRequest::new("What is velocity?", "physics").unwrap();

    let chunks: Vec<String> = streaming
        .run_stream(request.clone())
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;
    let outcome = blocking.run(&request).await.unwrap();

    assert!(chunks.len() > 1);
    assert_eq!(chunks.concat(), outcome.response);
    assert_eq!(
        streaming.cache().get(Subject::Physics, "what is velocity?").as_deref(),
        Some(FINAL_ANSWER)
    );
}

#[tokio::test]
async fn test_failure_surfaces_and_leaves_cache_empty() {
    let generator = Arc::new(CannedGenerator::failing());
    let tutor = tutor_with(&generator);

    let err = tutor
        .run_pipeline("What is velocity?", "physics")
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert!(!err.is_client_error());
    assert_eq!(generator.calls(), 1);
    assert!(tutor.cache().is_empty());
}

#[tokio::test]
async fn test_slow_generator_hits_timeout() {
    let generator = Arc::new(CannedGenerator::slow(Duration::from_secs(5)));
    let tutor = tutor_with(&generator).with_timeout(Some(Duration::from_millis(50)));

    let err = tutor
        .run_pipeline("What is velocity?", "physics")
        .await
        .unwrap_err();

    assert!(matches!(err, TutorError::GenerationTimeout { .. }));
    assert!(tutor.cache().is_empty());
}
