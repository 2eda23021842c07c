//! End-to-end tests against the live Gemini API.
//!
//! These use real clips in `./test_cases/` (`style.mp4`, `target.mp4`) and
//! spend API quota. They are gated behind `E2E_ENABLED` and need
//! `GEMINI_API_KEY`.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e -- --nocapture

use std::path::PathBuf;
use std::sync::Arc;
use vid2prompt::{
    generate_from_paths, generate_from_uris, list_models, GenerationConfig,
    GenerationProgressCallback, InstructionTemplate, MediaRole, Stage,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip unless E2E_ENABLED and GEMINI_API_KEY are set and both clips exist.
/// Evaluates to `(style, target, api_key)`.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let Ok(key) = std::env::var("GEMINI_API_KEY") else {
            println!("SKIP: GEMINI_API_KEY is not set");
            return;
        };
        let style = test_cases_dir().join("style.mp4");
        let target = test_cases_dir().join("target.mp4");
        for p in [&style, &target] {
            if !p.exists() {
                println!("SKIP: test clip not found: {}", p.display());
                return;
            }
        }
        (style, target, key)
    }};
}

fn assert_prompt_quality(prompt: &str, context: &str) {
    assert!(!prompt.trim().is_empty(), "[{context}] prompt is empty");
    assert!(
        prompt.len() >= 50,
        "[{context}] prompt suspiciously short: {} bytes",
        prompt.len()
    );
    println!("[{context}] ✓  {} chars", prompt.len());
}

#[derive(Default)]
struct StageLog(std::sync::Mutex<Vec<Stage>>);

impl GenerationProgressCallback for StageLog {
    fn on_stage_start(&self, stage: Stage) {
        self.0.lock().unwrap().push(stage);
    }
}

// ── Live tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_models_listing() {
    let (_, _, key) = e2e_skip_unless_ready!();
    let config = GenerationConfig::builder().api_key(key).build().unwrap();

    let models = list_models(&config).await.expect("listing should succeed");
    assert!(
        models.iter().any(|m| m.supports_generation()),
        "at least one model should support generateContent"
    );
}

#[tokio::test]
async fn test_generate_from_local_clips() {
    let (style, target, key) = e2e_skip_unless_ready!();
    let log = Arc::new(StageLog::default());
    let config = GenerationConfig::builder()
        .api_key(key)
        .progress_callback(log.clone())
        .build()
        .unwrap();

    let output = generate_from_paths(&style, &target, &config)
        .await
        .expect("generation should succeed");

    assert_prompt_quality(&output.result, "paths");
    assert_eq!(output.style.display_name.as_deref(), Some(MediaRole::Style.display_name()));
    assert!(output.stats.poll_queries >= 2);

    let stages = log.0.lock().unwrap();
    assert_eq!(stages.first(), Some(&Stage::Storing));
    assert_eq!(stages.last(), Some(&Stage::Generating));
}

#[tokio::test]
async fn test_reference_reuses_uploaded_files() {
    let (style, target, key) = e2e_skip_unless_ready!();
    let config = GenerationConfig::builder()
        .api_key(key)
        .instruction(InstructionTemplate::StyleOnly)
        .build()
        .unwrap();

    let first = generate_from_paths(&style, &target, &config)
        .await
        .expect("upload run should succeed");

    let second = generate_from_uris(&first.style.uri, &first.target.uri, &config)
        .await
        .expect("reference run should succeed");

    assert_prompt_quality(&second.result, "uris");
}
