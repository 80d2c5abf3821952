//! JSON decoding of engine output, as emitted by the sync engine executable.

use rstest::rstest;
use todu_core::types::{SyncOptions, SyncResult, SyncStrategy, TemplateRunSummary};

#[rstest]
#[case::empty("{}", 0, 0)]
#[case::totals_only(r#"{"totals":{"created":3,"errors":1},"duration_ms":12}"#, 0, 1)]
#[case::with_projects(
    r#"{"projects":[{"project_id":"work","created":1,"updated":2,"skipped":0,"errors":0}],"totals":{"created":1,"updated":2,"skipped":0,"errors":0},"duration_ms":40}"#,
    1,
    0
)]
fn sync_result_decodes(#[case] json: &str, #[case] projects: usize, #[case] errors: usize) {
    let result: SyncResult = serde_json::from_str(json).expect("decode");
    assert_eq!(result.projects.len(), projects);
    assert_eq!(result.totals.errors, errors);
}

#[test]
fn template_summary_decodes_details() {
    let json = r#"{
        "processed": 2,
        "tasks_created": 1,
        "skipped": 1,
        "failed": 0,
        "details": [
            {"template_id": "tpl-1", "status": "created", "task_id": "task-9"},
            {"template_id": "tpl-2", "status": "skipped", "message": "not due"}
        ]
    }"#;
    let summary: TemplateRunSummary = serde_json::from_str(json).expect("decode");
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.details[0].task_id.as_deref(), Some("task-9"));
    assert_eq!(summary.details[1].message.as_deref(), Some("not due"));
}

#[test]
fn options_omit_unset_fields() {
    let options = SyncOptions {
        project_ids: vec!["work".to_string()],
        strategy: Some(SyncStrategy::Bidirectional),
        ..SyncOptions::default()
    };
    let value = serde_json::to_value(&options).expect("encode");
    assert_eq!(value["strategy"], "bidirectional");
    assert!(value.get("system_id").is_none());
}
