//! Tests for goto_job detours and resume jobs

use crate::helpers::*;
use pipejob::CommandResult;

#[tokio::test]
async fn test_goto_job_inserts_unscheduled_job_after_current() {
    let yaml = r#"
pipeline:
  name: detour
  runs: [main, last]
  jobs:
    - name: main
      steps:
        - name: a
          command: echo a
          else_action: goto_job
          else_job: side
        - name: b
          command: echo b
    - name: side
      steps:
        - name: s
          command: echo side
    - name: last
      steps:
        - name: l
          command: echo last
"#;

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;

    assert_pipeline_completed(&result);
    assert_job_order(&result, &["main", "side", "main__resume_1", "last"]);
    assert_commands(&result, &["echo a", "echo side", "echo b", "echo last"]);
}

#[tokio::test]
async fn test_goto_job_reuses_scheduled_entry() {
    let yaml = r#"
pipeline:
  name: no-duplicate
  jobs:
    - name: main
      steps:
        - name: a
          command: echo a
          else_action: goto_job
          else_job: side
        - name: b
          command: echo b
    - name: side
      steps:
        - name: s
          command: echo side
"#;

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;

    assert_pipeline_completed(&result);
    assert_job_order(&result, &["main", "side", "main__resume_1"]);
    assert_eq!(count_runs(&result, "echo side"), 1);
    assert_eq!(count_runs(&result, "echo b"), 1);
}

#[tokio::test]
async fn test_goto_job_backwards_reruns_the_interrupted_job() {
    let yaml = r#"
pipeline:
  name: rerun
  runs: [setup, main]
  jobs:
    - name: setup
      steps:
        - name: prepare
          command: echo setup
    - name: main
      steps:
        - name: check
          command: check
          conditions:
            - pattern: "retry"
              action: goto_job
              job: setup
        - name: after
          command: echo after
"#;

    let runner = MockRunner::new()
        .respond("check", CommandResult::success("retry\n"))
        .respond("check", CommandResult::success("ok\n"));
    let result = run_pipeline_with_mock(yaml, runner).await;

    assert_pipeline_completed(&result);
    assert_job_order(&result, &["setup", "main", "setup", "main__resume_1", "main"]);
    assert_commands(
        &result,
        &[
            "echo setup",
            "check",
            "echo setup",
            "echo after",
            "check",
            "echo after",
        ],
    );
}

#[tokio::test]
async fn test_goto_job_from_last_step_has_no_resume() {
    let yaml = r#"
pipeline:
  name: tail-jump
  runs: [main]
  jobs:
    - name: main
      steps:
        - name: only
          command: echo main
          else_action: goto_job
          else_job: cleanup
    - name: cleanup
      steps:
        - name: c
          command: echo cleanup
"#;

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;

    assert_pipeline_completed(&result);
    assert_job_order(&result, &["main", "cleanup"]);
}

#[tokio::test]
async fn test_nested_detours_resume_in_order() {
    let yaml = r#"
pipeline:
  name: nested
  runs: [main]
  jobs:
    - name: main
      steps:
        - name: m1
          command: echo m1
          else_action: goto_job
          else_job: outer
        - name: m2
          command: echo m2
    - name: outer
      steps:
        - name: o1
          command: echo o1
          else_action: goto_job
          else_job: inner
        - name: o2
          command: echo o2
    - name: inner
      steps:
        - name: i1
          command: echo i1
"#;

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;

    assert_pipeline_completed(&result);
    assert_job_order(
        &result,
        &["main", "outer", "inner", "outer__resume_2", "main__resume_1"],
    );
    assert_commands(&result, &["echo m1", "echo o1", "echo i1", "echo o2", "echo m2"]);
}

#[tokio::test]
async fn test_resume_job_is_not_a_jump_target() {
    let yaml = r#"
pipeline:
  name: resume-target
  jobs:
    - name: main
      steps:
        - name: a
          command: echo a
          else_action: goto_job
          else_job: side
        - name: b
          command: echo b
    - name: side
      steps:
        - name: s
          command: echo side
          else_action: goto_job
          else_job: main__resume_1
"#;

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;

    assert_exit_code(&result, 6);
    assert_commands(&result, &["echo a", "echo side"]);
    assert!(result.log.contains("goto_job target 'main__resume_1' not found"));
}

#[tokio::test]
async fn test_goto_unknown_job_aborts() {
    let yaml = r#"
pipeline:
  name: unknown-job
  jobs:
    - name: main
      steps:
        - name: a
          command: echo a
          when:
            - contains: "a"
              action: goto_job
              job: nowhere
        - name: b
          command: echo b
"#;

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;

    assert_exit_code(&result, 6);
    assert_commands(&result, &["echo a"]);
}
