//! SQL schema for the appraisal SQLite store.
//!
//! Executed once at connection startup. Migrations, when needed, are gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS forms (
    form_id            INTEGER PRIMARY KEY AUTOINCREMENT,
    code               TEXT NOT NULL DEFAULT '',
    title              TEXT NOT NULL,
    title_en           TEXT,
    kpi_weight         INTEGER NOT NULL DEFAULT 0,
    comp_weight        INTEGER NOT NULL DEFAULT 0,
    ta_weight          INTEGER NOT NULL DEFAULT 0,
    total_weight       INTEGER NOT NULL DEFAULT 100,
    calc_method        INTEGER NOT NULL DEFAULT 0,
    score_scheme       INTEGER NOT NULL DEFAULT 0,
    kpi_config_start   TEXT,     -- YYYY-MM-DD
    kpi_config_end     TEXT,
    eval_start         TEXT,
    eval_end           TEXT,
    other_leave_start  TEXT,
    other_leave_end    TEXT,
    annual_leave_start TEXT,
    annual_leave_end   TEXT,
    remark             TEXT,
    created_at         TEXT NOT NULL
);

-- Read-only mirror of the person directory; only names are needed.
CREATE TABLE IF NOT EXISTS people (
    person_id INTEGER PRIMARY KEY,
    name      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assignments (
    assignment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    form_id       INTEGER NOT NULL REFERENCES forms(form_id),
    person_id     INTEGER NOT NULL,
    status        INTEGER NOT NULL DEFAULT 0,   -- 0 draft, 1 submitted
    due_date      TEXT,
    lock_version  INTEGER NOT NULL DEFAULT 0,   -- bumped to take the row lock
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    UNIQUE (form_id, person_id),
    CHECK  (status IN (0, 1))
);

CREATE TABLE IF NOT EXISTS kpi_items (
    kpi_id         INTEGER PRIMARY KEY AUTOINCREMENT,
    assignment_id  INTEGER NOT NULL REFERENCES assignments(assignment_id),
    idx            INTEGER NOT NULL DEFAULT 0,
    code           TEXT NOT NULL DEFAULT '',
    title          TEXT NOT NULL DEFAULT '',
    max_score      REAL NOT NULL DEFAULT 0,
    weight         INTEGER NOT NULL DEFAULT 0,
    expected_score REAL NOT NULL DEFAULT 0,
    score          REAL NOT NULL DEFAULT 0,
    note           TEXT NOT NULL DEFAULT '',
    measure        TEXT NOT NULL DEFAULT '',
    criteria       TEXT NOT NULL DEFAULT '',
    unit           TEXT NOT NULL DEFAULT ''
);

-- Weights are stored as ratios (0.3 means 30 %).
CREATE TABLE IF NOT EXISTS competency_items (
    competency_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    form_id        INTEGER NOT NULL REFERENCES forms(form_id),
    idx            INTEGER NOT NULL DEFAULT 0,
    title          TEXT NOT NULL DEFAULT '',
    max_score      REAL NOT NULL DEFAULT 0,
    weight         REAL NOT NULL DEFAULT 0,
    full_total     REAL NOT NULL DEFAULT 0,
    expected_score REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS competency_scores (
    assignment_id INTEGER NOT NULL REFERENCES assignments(assignment_id),
    competency_id INTEGER NOT NULL REFERENCES competency_items(competency_id),
    score         REAL NOT NULL DEFAULT 0,
    note          TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (assignment_id, competency_id)
);

CREATE TABLE IF NOT EXISTS ta_scores (
    assignment_id INTEGER PRIMARY KEY REFERENCES assignments(assignment_id),
    full_score    REAL NOT NULL DEFAULT 0,
    score         REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS dev_plan_items (
    dev_plan_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    assignment_id INTEGER NOT NULL REFERENCES assignments(assignment_id),
    idx           INTEGER NOT NULL DEFAULT 0,
    content       TEXT NOT NULL DEFAULT '',
    priority      TEXT NOT NULL DEFAULT '',
    timing        TEXT,
    remarks       TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS additional_answers (
    assignment_id INTEGER PRIMARY KEY REFERENCES assignments(assignment_id),
    q1            TEXT NOT NULL DEFAULT '',
    q2            TEXT NOT NULL DEFAULT '',
    q3            TEXT NOT NULL DEFAULT '',
    q4            TEXT NOT NULL DEFAULT '',
    q5            TEXT NOT NULL DEFAULT ''
);

-- NULL form_id marks a global band.
CREATE TABLE IF NOT EXISTS grade_bands (
    grade_band_id INTEGER PRIMARY KEY AUTOINCREMENT,
    form_id       INTEGER REFERENCES forms(form_id),
    min_pct       REAL NOT NULL,
    max_pct       REAL NOT NULL,
    grade         TEXT NOT NULL,
    CHECK (min_pct <= max_pct)
);

CREATE TABLE IF NOT EXISTS eval_steps (
    step_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    assignment_id INTEGER NOT NULL REFERENCES assignments(assignment_id),
    idx           INTEGER NOT NULL,             -- 1-based
    evaluator_id  INTEGER NOT NULL,
    status        INTEGER NOT NULL DEFAULT 0,   -- 0 pending, 1 active, 2 done
    eval_date     TEXT,
    updated_at    TEXT NOT NULL,
    UNIQUE (assignment_id, idx),
    CHECK  (status IN (0, 1, 2))
);

-- At most one active step per assignment.
CREATE UNIQUE INDEX IF NOT EXISTS eval_steps_one_active
    ON eval_steps(assignment_id) WHERE status = 1;

CREATE INDEX IF NOT EXISTS kpi_items_assignment_idx   ON kpi_items(assignment_id);
CREATE INDEX IF NOT EXISTS competency_items_form_idx  ON competency_items(form_id);
CREATE INDEX IF NOT EXISTS dev_plan_assignment_idx    ON dev_plan_items(assignment_id);
CREATE INDEX IF NOT EXISTS grade_bands_form_idx       ON grade_bands(form_id);

PRAGMA user_version = 1;
";
