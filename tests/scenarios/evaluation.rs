//! Tests for rule precedence: conditions, when, else_action, on_timeout

use crate::helpers::*;
use pipejob::core::RuleSource;
use pipejob::CommandResult;

#[tokio::test]
async fn test_legacy_condition_wins_over_when() {
    let yaml = r#"
pipeline:
  name: precedence
  jobs:
    - name: main
      steps:
        - name: check
          command: echo ready
          conditions:
            - pattern: "^ready"
              action: goto_step
              step: by-condition
          when:
            - contains: "ready"
              action: goto_step
              step: by-when
          else_action: fail
        - name: by-when
          command: echo when
          else_action: drop
        - name: by-condition
          command: echo condition
"#;

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;

    assert_pipeline_completed(&result);
    assert_commands(&result, &["echo ready", "echo condition"]);
    assert_eq!(
        result.branches(),
        vec![("check".to_string(), RuleSource::Condition(0))]
    );
}

#[tokio::test]
async fn test_first_matching_condition_wins() {
    let yaml = r#"
pipeline:
  name: first-condition
  jobs:
    - name: main
      steps:
        - name: check
          command: echo abc
          conditions:
            - pattern: "zzz"
              action: fail
            - pattern: "b"
              action: continue
            - pattern: "c"
              action: fail
"#;

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;

    assert_pipeline_completed(&result);
    assert_eq!(
        result.branches(),
        vec![("check".to_string(), RuleSource::Condition(1))]
    );
}

#[tokio::test]
async fn test_when_wins_over_else() {
    let yaml = r#"
pipeline:
  name: when-else
  jobs:
    - name: main
      steps:
        - name: check
          command: echo ok
          when:
            - equals: "  ok  "
              action: continue
          else_action: fail
"#;

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.branches(), vec![("check".to_string(), RuleSource::When(0))]);
}

#[tokio::test]
async fn test_else_applies_to_successful_steps() {
    let yaml = r#"
pipeline:
  name: else-success
  jobs:
    - name: main
      steps:
        - name: check
          command: echo fine
          when:
            - contains: "broken"
              action: fail
          else_action: drop
        - name: unreachable
          command: echo unreachable
"#;

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;

    assert_eq!(result.exit_code(), 0);
    assert_commands(&result, &["echo fine"]);
    assert_eq!(result.branches(), vec![("check".to_string(), RuleSource::Else)]);
}

#[tokio::test]
async fn test_else_shadows_on_timeout() {
    let yaml = r#"
pipeline:
  name: else-timeout
  jobs:
    - name: main
      steps:
        - name: slow
          command: slow
          timeout: 1s
          else_action: goto_step
          else_step: after-else
          on_timeout: goto_step
          on_timeout_step: after-timeout
        - name: after-timeout
          command: echo timeout branch
        - name: after-else
          command: echo else branch
"#;

    let runner = MockRunner::new().respond("slow", CommandResult::timed_out(""));
    let result = run_pipeline_with_mock(yaml, runner).await;

    assert_pipeline_completed(&result);
    assert_commands(&result, &["slow", "echo else branch"]);
}

#[tokio::test]
async fn test_on_timeout_only_for_timed_out_steps() {
    let yaml = r#"
pipeline:
  name: timeout-only
  jobs:
    - name: main
      steps:
        - name: slow
          command: slow
          timeout: 1s
          on_timeout: goto_step
          on_timeout_step: recover
        - name: normal
          command: echo normal
        - name: recover
          command: echo recover
"#;

    let result = run_pipeline_with_mock(
        yaml,
        MockRunner::new().respond("slow", CommandResult::timed_out("partial\n")),
    )
    .await;
    assert_pipeline_completed(&result);
    assert_commands(&result, &["slow", "echo recover"]);
    assert_eq!(result.branches(), vec![("slow".to_string(), RuleSource::Timeout)]);

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;
    assert_pipeline_completed(&result);
    assert_commands(&result, &["slow", "echo normal", "echo recover"]);
    assert!(result.branches().is_empty());
}

#[tokio::test]
async fn test_timeout_without_handler_is_unmatched_failure() {
    let yaml = r#"
pipeline:
  name: timeout-unhandled
  jobs:
    - name: main
      steps:
        - name: slow
          command: slow
          timeout: 1s
"#;

    let runner = MockRunner::new().respond("slow", CommandResult::timed_out(""));
    let result = run_pipeline_with_mock(yaml, runner).await;

    assert_exit_code(&result, 5);
}

#[tokio::test]
async fn test_when_exit_code_can_catch_timeouts() {
    let yaml = r#"
pipeline:
  name: timeout-exit-code
  jobs:
    - name: main
      steps:
        - name: slow
          command: slow
          when:
            - exit_code: 124
              action: drop
          on_timeout: fail
"#;

    let runner = MockRunner::new().respond("slow", CommandResult::timed_out(""));
    let result = run_pipeline_with_mock(yaml, runner).await;

    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.branches(), vec![("slow".to_string(), RuleSource::When(0))]);
}

#[tokio::test]
async fn test_all_and_any_groups() {
    let yaml = r#"
pipeline:
  name: groups
  jobs:
    - name: main
      steps:
        - name: report
          command: report
          when:
            - all:
                - contains: "tests passed"
                - regex: "coverage: 9[0-9]%"
              action: goto_step
              step: ship
            - any:
                - contains: "flaky"
                - exit_code: 3
              action: goto_step
              step: retry
          else_action: fail
        - name: retry
          command: echo retry
          else_action: drop
        - name: ship
          command: echo ship
"#;

    let runner = MockRunner::new().respond(
        "report",
        CommandResult::success("tests passed\ncoverage: 93%\n"),
    );
    let result = run_pipeline_with_mock(yaml, runner).await;
    assert_pipeline_completed(&result);
    assert_commands(&result, &["report", "echo ship"]);

    let runner = MockRunner::new().respond(
        "report",
        CommandResult::exited("tests passed\ncoverage: 71%\n", 3),
    );
    let result = run_pipeline_with_mock(yaml, runner).await;
    assert_eq!(result.exit_code(), 0);
    assert_commands(&result, &["report", "echo retry"]);
    assert_eq!(
        result.branches(),
        vec![
            ("report".to_string(), RuleSource::When(1)),
            ("retry".to_string(), RuleSource::Else),
        ]
    );
}

#[tokio::test]
async fn test_rule_operands_are_interpolated() {
    let yaml = r#"
pipeline:
  name: interpolated-rules
  variables:
    EXPECTED: "v2"
  jobs:
    - name: main
      steps:
        - name: check
          command: echo running v2
          when:
            - regex: "^running {{EXPECTED}}"
              action: drop
          else_action: fail
"#;

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;

    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.branches(), vec![("check".to_string(), RuleSource::When(0))]);
}

#[tokio::test]
async fn test_invalid_regex_aborts_when_evaluated() {
    let yaml = r#"
pipeline:
  name: bad-regex
  jobs:
    - name: main
      steps:
        - name: check
          command: echo anything
          conditions:
            - pattern: "("
              action: continue
"#;

    let result = run_pipeline_with_mock(yaml, MockRunner::new()).await;

    assert_exit_code(&result, 6);
    assert_commands(&result, &["echo anything"]);
}
