pub(crate) const FEEDBACK_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS feedback (
    key           TEXT PRIMARY KEY,
    created_at    TEXT NOT NULL,
    overall_score REAL NOT NULL,
    body_json     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_feedback_created_at ON feedback(created_at);
"#;
