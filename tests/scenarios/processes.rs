//! End-to-end scenarios against real child processes

use crate::helpers::*;
use pipejob::core::RuleSource;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_save_output_and_goto_step_with_real_shell() {
    let yaml = r#"
pipeline:
  name: real-alpha
  jobs:
    - name: main
      steps:
        - name: step1
          command: echo "alpha"
          save_output: out1
          conditions:
            - pattern: "alpha"
              action: goto_step
              step: step3
        - name: step2
          command: echo "step2 ran"
        - name: step3
          command: echo "GOT {{out1}}"
"#;

    let result = run_pipeline_with_shell(yaml).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.output(), "alpha\nGOT alpha\n");
    assert!(!result.log.contains("step2 ran"));
}

#[tokio::test]
async fn test_idle_timeout_kills_silent_command() {
    let yaml = r#"
pipeline:
  name: idle
  jobs:
    - name: main
      steps:
        - name: quiet
          command: sleep 10
          idle_timeout: 2s
          on_timeout: goto_step
          on_timeout_step: recover
        - name: skipped
          command: echo skipped
        - name: recover
          command: echo recovered
"#;

    let started = Instant::now();
    let result = run_pipeline_with_shell(yaml).await;

    assert_pipeline_completed(&result);
    assert!(started.elapsed() < Duration::from_secs(8));

    let quiet = result
        .command_result("sleep 10")
        .expect("sleep should have been reported");
    assert_eq!(quiet.exit_code, 124);
    assert!(quiet.timed_out);

    assert_eq!(result.branches(), vec![("quiet".to_string(), RuleSource::Timeout)]);
    assert_commands(&result, &["sleep 10", "echo recovered"]);
}

#[tokio::test]
async fn test_total_timeout_without_handler_fails_run() {
    let yaml = r#"
pipeline:
  name: total-timeout
  jobs:
    - name: main
      steps:
        - name: chatty
          command: "while true; do echo tick; sleep 0.2; done"
          timeout: 1s
"#;

    let result = run_pipeline_with_shell(yaml).await;

    assert_exit_code(&result, 5);
    assert!(result.output().contains("tick"));
}

#[tokio::test]
async fn test_runs_order_with_real_shell() {
    let yaml = r#"
pipeline:
  name: real-order
  runs: [second, first]
  jobs:
    - name: first
      steps:
        - name: one
          command: echo first
    - name: second
      steps:
        - name: two
          command: echo second
"#;

    let result = run_pipeline_with_shell(yaml).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.output(), "second\nfirst\n");
}
