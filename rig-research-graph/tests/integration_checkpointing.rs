//! Integration tests for checkpointing the research workflow
//!
//! - the interrupt checkpoint is persisted by the configured checkpointer
//! - a new workflow instance resumes from a file checkpoint
//! - checkpoints from another run are rejected

mod common;

use std::sync::Arc;

use common::{fixture, EXPECTED_REPORT};
use rig_research_graph::pregel::checkpoint::{Checkpointer, FileCheckpointer, MemoryCheckpointer};
use rig_research_graph::pregel::{PregelConfig, PregelError};
use rig_research_graph::research::{
    ResearchConfig, ResearchGraphState, ResearchGraphUpdate, ResearchWorkflowBuilder,
};

#[tokio::test]
async fn test_interrupt_checkpoint_is_saved() {
    let fx = fixture();
    let checkpointer = Arc::new(MemoryCheckpointer::<ResearchGraphState>::new());
    let workflow = ResearchWorkflowBuilder::new(fx.ctx.clone())
        .checkpointer(checkpointer.clone())
        .build()
        .unwrap();
    assert!(workflow.has_checkpointer());

    let paused = workflow
        .invoke(ResearchGraphState::new("Rust", 2))
        .await
        .unwrap();
    assert!(paused.is_interrupted());

    let saved = checkpointer.latest().await.unwrap().expect("saved checkpoint");
    assert!(saved.is_interrupt());
    assert_eq!(saved.workflow_id, workflow.workflow_id());
    assert_eq!(saved.state.analysts.len(), 2);
    assert_eq!(checkpointer.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_resume_from_file_checkpoint_in_new_instance() {
    let dir = tempfile::tempdir().unwrap();
    let run_id = "research-run-1";

    let first = fixture();
    let workflow = ResearchWorkflowBuilder::new(first.ctx.clone())
        .checkpointer(Arc::new(FileCheckpointer::new(dir.path(), run_id, true)))
        .build()
        .unwrap()
        .with_workflow_id(run_id);
    let paused = workflow
        .invoke(ResearchGraphState::new("Rust async runtimes", 3))
        .await
        .unwrap();
    assert!(paused.is_interrupted());
    drop(workflow);

    let second = fixture();
    let restored = ResearchWorkflowBuilder::new(second.ctx.clone())
        .checkpointer(Arc::new(FileCheckpointer::new(dir.path(), run_id, true)))
        .build()
        .unwrap()
        .with_workflow_id(run_id);
    let done = restored
        .resume_latest(Some(ResearchGraphUpdate::feedback(None)))
        .await
        .unwrap()
        .expect("checkpoint on disk");

    assert!(done.is_completed());
    assert_eq!(done.state.final_report.as_deref(), Some(EXPECTED_REPORT));
    // the panel came from the checkpoint, not a second generation
    assert_eq!(common::panel_requests(&second.model), 0);
}

#[tokio::test]
async fn test_resume_rejects_foreign_checkpoint() {
    let fx = fixture();
    let workflow = ResearchWorkflowBuilder::new(fx.ctx.clone())
        .build()
        .unwrap()
        .with_workflow_id("run-a");
    let paused = workflow
        .invoke(ResearchGraphState::new("Rust", 2))
        .await
        .unwrap();

    let other = ResearchWorkflowBuilder::new(fx.ctx.clone())
        .build()
        .unwrap()
        .with_workflow_id("run-b");
    let err = other
        .resume(paused.checkpoint.unwrap(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PregelError::CheckpointMismatch { .. }));
}

#[tokio::test]
async fn test_periodic_checkpoints_during_interviews() {
    let fx = fixture();
    let config = ResearchConfig::default().with_engine(PregelConfig::default().with_checkpoint_interval(1));
    let ctx = Arc::new((*fx.ctx).clone().with_config(config));
    let checkpointer = Arc::new(MemoryCheckpointer::<ResearchGraphState>::new());
    let workflow = ResearchWorkflowBuilder::new(ctx)
        .checkpointer(checkpointer.clone())
        .build()
        .unwrap();

    let paused = workflow
        .invoke(ResearchGraphState::new("Rust", 2))
        .await
        .unwrap();
    let done = workflow
        .resume(paused.checkpoint.unwrap(), Some(ResearchGraphUpdate::feedback(None)))
        .await
        .unwrap();
    assert!(done.is_completed());

    let saved = checkpointer.list().await.unwrap();
    assert!(saved.len() > 1);
    let latest = checkpointer.latest().await.unwrap().unwrap();
    assert!(!latest.is_interrupt());
}

#[tokio::test]
async fn test_resume_latest_without_checkpointer() {
    let fx = fixture();
    let workflow = ResearchWorkflowBuilder::new(fx.ctx.clone()).build().unwrap();
    assert!(workflow.resume_latest(None).await.unwrap().is_none());
}
