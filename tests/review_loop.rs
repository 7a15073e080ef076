//! Review loop behaviour against a scripted provider

mod common;

use clip_review::config::{GridOptions, ReviewConfig};
use clip_review::processing::{reorder, GridBatcher};
use clip_review::review::review_loop::{frame_units, grid_units, BRAND_EXPOSURE};
use clip_review::review::{finalize, IssueLocation, ReviewLoop};
use clip_review::{ReviewError, Severity};
use common::scripted_client::{self, ScriptedClient};
use common::synthetic_video::samples_at;

fn eight_samples() -> Vec<clip_review::sampling::Sample> {
    samples_at(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0])
}

#[test]
fn stops_at_the_first_violating_unit() {
    let samples = eight_samples();
    let order = reorder(samples.len());
    let units = frame_units(&samples, &order);
    let client = ScriptedClient::new(vec![
        Ok(scripted_client::clean()),
        Ok(scripted_client::clean()),
        Ok(scripted_client::violation(&[("content compliance", "rude gesture", "high")])),
    ]);

    let raw = ReviewLoop::new(&client, &ReviewConfig::default()).run(&units).unwrap();

    assert_eq!(client.calls(), 3);
    assert_eq!(raw.calls, 3);
    assert!(raw.stopped_early);
    assert_eq!(raw.units_total, 8);
    assert_eq!(raw.issues.len(), 1);
    // third unit visited is order[2] == 6
    assert_eq!(raw.issues[0].location, IssueLocation::Frame(6));
    assert_eq!(raw.issues[0].timestamp, 6.0);
    assert_eq!(raw.issues[0].severity, Severity::High);
    assert!(!raw.is_compliant);
}

#[test]
fn frames_are_visited_in_bisection_order() {
    let samples = eight_samples();
    let order = reorder(samples.len());
    let units = frame_units(&samples, &order);
    let client = ScriptedClient::always_clean();

    let raw = ReviewLoop::new(&client, &ReviewConfig::default()).run(&units).unwrap();

    assert!(raw.is_compliant);
    assert!(!raw.stopped_early);
    assert_eq!(raw.calls, 8);
    let prompts = client.prompts();
    assert!(prompts[0].starts_with("This is the frame at 0m4.0s"));
    assert!(prompts[1].starts_with("This is the frame at 0m2.0s"));
    assert!(prompts[7].starts_with("This is the frame at 0m0.0s"));
}

#[test]
fn three_consecutive_failures_exhaust_the_budget() {
    let samples = eight_samples();
    let order = reorder(samples.len());
    let units = frame_units(&samples, &order);
    let client = ScriptedClient::always_failing(8);

    let err = ReviewLoop::new(&client, &ReviewConfig::default()).run(&units).unwrap_err();

    assert_eq!(client.calls(), 3);
    match err {
        ReviewError::ErrorBudgetExhausted { consecutive, calls, .. } => {
            assert_eq!(consecutive, 3);
            assert_eq!(calls, 3);
        }
        other => panic!("expected budget exhaustion, got {other:?}"),
    }
}

#[test]
fn an_answered_call_resets_the_error_count() {
    let samples = eight_samples();
    let order = reorder(samples.len());
    let units = frame_units(&samples, &order);
    let client = ScriptedClient::new(vec![
        Err(scripted_client::timeout()),
        Err(scripted_client::timeout()),
        Ok(scripted_client::clean()),
        Err(scripted_client::timeout()),
        Err(scripted_client::timeout()),
        Ok(scripted_client::clean()),
        Err(scripted_client::timeout()),
        Err(scripted_client::timeout()),
    ]);

    let raw = ReviewLoop::new(&client, &ReviewConfig::default()).run(&units).unwrap();

    assert_eq!(client.calls(), 8);
    assert_eq!(raw.units_reviewed, 2);
    assert!(raw.issues.is_empty());
}

#[test]
fn rejected_credentials_abort_immediately() {
    let samples = eight_samples();
    let order = reorder(samples.len());
    let units = frame_units(&samples, &order);
    let client = ScriptedClient::new(vec![Err(scripted_client::unauthorized())]);

    let err = ReviewLoop::new(&client, &ReviewConfig::default()).run(&units).unwrap_err();

    assert_eq!(client.calls(), 1);
    assert!(matches!(err, ReviewError::ProviderRejected { status: Some(401), .. }));
}

#[test]
fn transcribed_competitor_becomes_a_critical_issue() {
    let samples = eight_samples();
    let order = reorder(samples.len());
    let units = frame_units(&samples, &order);
    let client = ScriptedClient::always(scripted_client::transcribes(&["WidgetSmith Pro", "clock"]));
    let config = ReviewConfig::default();

    let raw = ReviewLoop::new(&client, &config).run(&units).unwrap();

    assert_eq!(client.calls(), 1);
    assert_eq!(raw.issues.len(), 1);
    let issue = &raw.issues[0];
    assert_eq!(issue.category, BRAND_EXPOSURE);
    assert_eq!(issue.severity, Severity::Critical);
    assert!(issue.description.contains("widgetsmith"));
    assert_eq!(issue.timestamp, 4.0);

    let result = finalize(&raw, &config.scoring);
    assert!(!result.is_compliant);
    assert_eq!(result.overall_score, 60);
}

#[test]
fn flagged_reply_without_issues_still_gets_keyword_check() {
    let samples = eight_samples();
    let units = frame_units(&samples, &[0]);
    let client = ScriptedClient::always(
        r#"{"visible_content": ["Locket widget"], "has_issue": true, "issues": []}"#,
    );

    let raw = ReviewLoop::new(&client, &ReviewConfig::default()).run(&units).unwrap();

    assert_eq!(raw.issues.len(), 1);
    assert_eq!(raw.issues[0].category, BRAND_EXPOSURE);
}

#[test]
fn list_valued_description_does_not_hide_a_competitor() {
    let samples = eight_samples();
    let units = frame_units(&samples, &[2]);
    let client = ScriptedClient::always(
        r#"{"visible_content":["WidgetSmith Pro"],"has_issue":false,"description":["home screen"],"issues":[]}"#,
    );
    let config = ReviewConfig::default();

    let raw = ReviewLoop::new(&client, &config).run(&units).unwrap();

    assert_eq!(raw.issues.len(), 1);
    assert_eq!(raw.issues[0].category, BRAND_EXPOSURE);
    assert_eq!(raw.issues[0].severity, Severity::Critical);
    let result = finalize(&raw, &config.scoring);
    assert!(!result.is_compliant);
    assert_eq!(result.overall_score, 60);
}

#[test]
fn list_valued_suggestion_keeps_the_critical_issue() {
    let samples = eight_samples();
    let units = frame_units(&samples, &[5]);
    let client = ScriptedClient::always(
        r#"```json
{"visible_content": [], "has_issue": true, "issues": [{"category": "content compliance",
 "description": "nudity", "severity": "critical", "suggestion": ["cut the scene", "re-shoot"]}]}
```"#,
    );
    let config = ReviewConfig::default();

    let raw = ReviewLoop::new(&client, &config).run(&units).unwrap();

    assert_eq!(raw.issues.len(), 1);
    assert_eq!(raw.issues[0].severity, Severity::Critical);
    assert_eq!(raw.issues[0].suggestion, "cut the scene; re-shoot");
    assert_eq!(raw.issues[0].timestamp, 5.0);
    assert!(!finalize(&raw, &config.scoring).is_compliant);
}

#[test]
fn unparsable_reply_counts_as_no_issue() {
    let samples = eight_samples();
    let order = reorder(samples.len());
    let units = frame_units(&samples, &order);
    let client = ScriptedClient::new(vec![
        Ok("Sorry, I can't help with that.".to_string()),
        Ok(scripted_client::clean()),
        Ok(scripted_client::violation(&[("brand", "competitor logo", "critical")])),
    ]);

    let raw = ReviewLoop::new(&client, &ReviewConfig::default()).run(&units).unwrap();

    assert_eq!(client.calls(), 3);
    assert_eq!(raw.units_reviewed, 3);
    assert_eq!(raw.issues.len(), 1);
}

#[test]
fn missing_severity_defaults_by_unit_kind() {
    let reply = r#"{"has_issue": true, "issues": [{"category": "other", "description": "odd"}]}"#;

    let samples = eight_samples();
    let client = ScriptedClient::always(reply);
    let raw = ReviewLoop::new(&client, &ReviewConfig::default())
        .run(&frame_units(&samples, &[3]))
        .unwrap();
    assert_eq!(raw.issues[0].severity, Severity::Low);

    let mut batcher = GridBatcher::new(&GridOptions {
        enabled: true,
        cols: 2,
        cell_width: 64,
        show_labels: true,
    });
    let batches = batcher.batch(&samples);
    let client = ScriptedClient::always(reply);
    let raw = ReviewLoop::new(&client, &ReviewConfig::default())
        .run(&grid_units(&batches))
        .unwrap();
    assert_eq!(raw.issues[0].severity, Severity::Medium);
}

#[test]
fn keeps_going_when_early_stop_is_off() {
    let samples = eight_samples();
    let order = reorder(samples.len());
    let units = frame_units(&samples, &order);
    let client = ScriptedClient::always(scripted_client::violation(&[("brand", "logo", "low")]));
    let mut config = ReviewConfig::default();
    config.review.stop_on_first_violation = false;

    let raw = ReviewLoop::new(&client, &config).run(&units).unwrap();

    assert_eq!(client.calls(), 8);
    assert_eq!(raw.issues.len(), 8);
    assert!(!raw.stopped_early);
}

#[test]
fn grid_issues_resolve_to_cell_timestamps() {
    let samples = samples_at(&[0.0, 2.5, 5.0, 7.5, 10.0, 12.5, 15.0, 17.5]);
    let mut batcher = GridBatcher::new(&GridOptions {
        enabled: true,
        cols: 2,
        cell_width: 64,
        show_labels: true,
    });
    let batches = batcher.batch(&samples);
    assert_eq!(batches.len(), 2);

    let client = ScriptedClient::new(vec![
        Ok(scripted_client::clean()),
        Ok(scripted_client::grid_violation("[00:12.50]", "high")),
    ]);
    let raw = ReviewLoop::new(&client, &ReviewConfig::default())
        .run(&grid_units(&batches))
        .unwrap();

    assert_eq!(client.calls(), 2);
    assert_eq!(raw.samples_analyzed, 8);
    assert_eq!(raw.issues.len(), 1);
    assert_eq!(raw.issues[0].timestamp, 12.5);
    assert_eq!(raw.issues[0].location, IssueLocation::Cell("[00:12.50]".to_string()));

    let prompts = client.prompts();
    assert!(prompts[0].starts_with("This is a 2x2 grid of 4 frames"));
    assert!(prompts[1].contains("10.0s ~ 17.5s"));
}
