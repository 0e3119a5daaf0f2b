/// Relational layout of interactions and their grading trees.
///
/// Composite rows keep their children in `component_map`, a JSON object keyed
/// `"<kind>:<index>"`, and their operations in `actions`, a JSON array of tokens.
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS grades (
    entity_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    min_grade REAL NOT NULL,
    max_grade REAL NOT NULL,
    grade REAL,
    step_amount REAL NOT NULL,
    normalized_grade REAL
);

CREATE TABLE IF NOT EXISTS grading_blocks (
    entity_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    min_grade REAL NOT NULL,
    max_grade REAL NOT NULL,
    grade REAL,
    normalized_grade REAL,
    component_map TEXT NOT NULL,
    actions TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS grading_method_instances (
    entity_id TEXT PRIMARY KEY,
    template_id TEXT NOT NULL,
    name TEXT NOT NULL,
    min_grade REAL NOT NULL,
    max_grade REAL NOT NULL,
    grade REAL,
    normalized_grade REAL,
    component_map TEXT NOT NULL,
    actions TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS interactions (
    aggregate_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    item_type TEXT NOT NULL,
    created_at TEXT NOT NULL,
    is_liked INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS reviews (
    review_id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    aggregate_id TEXT NOT NULL UNIQUE
        REFERENCES interactions(aggregate_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS ratings (
    rating_id TEXT PRIMARY KEY,
    grade REAL,
    min_grade REAL NOT NULL,
    max_grade REAL NOT NULL,
    normalized_grade REAL,
    is_complex_grading INTEGER NOT NULL,
    gradable_id TEXT,
    gradable_type TEXT CHECK (gradable_type IN ('grade', 'method', 'block')),
    created_at TEXT NOT NULL,
    aggregate_id TEXT NOT NULL UNIQUE
        REFERENCES interactions(aggregate_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS grading_methods (
    template_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    definition TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_interactions_item ON interactions(item_type, item_id);
CREATE INDEX IF NOT EXISTS idx_interactions_user ON interactions(user_id);
"#;
