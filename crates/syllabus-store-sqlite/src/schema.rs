//! SQL schema for the syllabus SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Content hierarchy ─────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS books (
    book_id    TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS chapters (
    chapter_id    TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    display_order INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    deleted_at    TEXT
);

-- A chapter may be shared by several books.
CREATE TABLE IF NOT EXISTS books_chapters (
    book_id    TEXT NOT NULL REFERENCES books(book_id),
    chapter_id TEXT NOT NULL REFERENCES chapters(chapter_id),
    created_at TEXT NOT NULL,
    deleted_at TEXT,
    PRIMARY KEY (book_id, chapter_id)
);

CREATE TABLE IF NOT EXISTS topics (
    topic_id      TEXT PRIMARY KEY,
    chapter_id    TEXT NOT NULL REFERENCES chapters(chapter_id),
    name          TEXT NOT NULL,
    display_order INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    deleted_at    TEXT
);

CREATE TABLE IF NOT EXISTS learning_objectives (
    lo_id         TEXT PRIMARY KEY,
    topic_id      TEXT NOT NULL REFERENCES topics(topic_id),
    name          TEXT NOT NULL,
    display_order INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    deleted_at    TEXT
);

CREATE TABLE IF NOT EXISTS assignments (
    assignment_id TEXT PRIMARY KEY,
    topic_id      TEXT NOT NULL REFERENCES topics(topic_id),
    name          TEXT NOT NULL,
    display_order INTEGER NOT NULL DEFAULT 0,
    instruction   TEXT,
    max_grade     INTEGER,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    deleted_at    TEXT
);

CREATE INDEX IF NOT EXISTS topics_chapter_idx      ON topics(chapter_id);
CREATE INDEX IF NOT EXISTS books_chapters_chap_idx ON books_chapters(chapter_id);

-- ── Study plans ───────────────────────────────────────────────────────────

-- Masters have no master_study_plan_id and no target; copies have both.
CREATE TABLE IF NOT EXISTS study_plans (
    study_plan_id        TEXT PRIMARY KEY,
    master_study_plan_id TEXT REFERENCES study_plans(study_plan_id),
    name                 TEXT NOT NULL,
    study_plan_type      TEXT NOT NULL,   -- 'COURSE' | 'INDIVIDUAL'
    course_id            TEXT NOT NULL,
    book_id              TEXT NOT NULL,
    target_kind          TEXT,            -- 'course' | 'class' | 'student'
    target_id            TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL,
    deleted_at           TEXT,
    CHECK ((master_study_plan_id IS NULL) = (target_kind IS NULL)),
    CHECK ((target_kind IS NULL) = (target_id IS NULL))
);

-- At most one live copy per (master, target).
CREATE UNIQUE INDEX IF NOT EXISTS study_plans_copy_target_idx
    ON study_plans(master_study_plan_id, target_kind, target_id)
    WHERE deleted_at IS NULL AND master_study_plan_id IS NOT NULL;

CREATE INDEX IF NOT EXISTS study_plans_book_idx   ON study_plans(book_id);
CREATE INDEX IF NOT EXISTS study_plans_course_idx ON study_plans(course_id);

CREATE TABLE IF NOT EXISTS course_study_plans (
    course_id     TEXT NOT NULL,
    study_plan_id TEXT NOT NULL REFERENCES study_plans(study_plan_id),
    created_at    TEXT NOT NULL,
    deleted_at    TEXT,
    PRIMARY KEY (course_id, study_plan_id)
);

CREATE TABLE IF NOT EXISTS class_study_plans (
    class_id      TEXT NOT NULL,
    study_plan_id TEXT NOT NULL REFERENCES study_plans(study_plan_id),
    created_at    TEXT NOT NULL,
    deleted_at    TEXT,
    PRIMARY KEY (class_id, study_plan_id)
);

CREATE TABLE IF NOT EXISTS student_study_plans (
    student_id    TEXT NOT NULL,
    study_plan_id TEXT NOT NULL REFERENCES study_plans(study_plan_id),
    created_at    TEXT NOT NULL,
    deleted_at    TEXT,
    PRIMARY KEY (student_id, study_plan_id)
);

-- The flatten key is unique per plan including soft-deleted rows; imports
-- revive a deleted row instead of inserting a second one.
CREATE TABLE IF NOT EXISTS study_plan_items (
    study_plan_item_id        TEXT PRIMARY KEY,
    study_plan_id             TEXT NOT NULL REFERENCES study_plans(study_plan_id),
    content_structure         TEXT NOT NULL,   -- JSON ContentStructure
    content_structure_flatten TEXT NOT NULL,
    topic_id                  TEXT NOT NULL,
    display_order             INTEGER NOT NULL DEFAULT 0,
    available_from            TEXT,
    available_to              TEXT,
    start_date                TEXT,
    end_date                  TEXT,
    copy_study_plan_item_id   TEXT REFERENCES study_plan_items(study_plan_item_id),
    completed_at              TEXT,
    created_at                TEXT NOT NULL,
    updated_at                TEXT NOT NULL,
    deleted_at                TEXT,
    UNIQUE (study_plan_id, content_structure_flatten)
);

CREATE INDEX IF NOT EXISTS items_copy_idx  ON study_plan_items(copy_study_plan_item_id);
CREATE INDEX IF NOT EXISTS items_topic_idx ON study_plan_items(study_plan_id, topic_id);

CREATE TABLE IF NOT EXISTS import_tasks (
    task_id       TEXT PRIMARY KEY,
    study_plan_id TEXT NOT NULL REFERENCES study_plans(study_plan_id),
    status        TEXT NOT NULL,   -- 'PENDING' | 'IN_PROGRESS' | 'COMPLETED' | 'FAILED'
    error_detail  TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

-- ── Outbox ────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS content_events (
    event_id     TEXT PRIMARY KEY,
    payload      TEXT NOT NULL,    -- JSON ContentEvent
    created_at   TEXT NOT NULL,
    attempts     INTEGER NOT NULL DEFAULT 0,
    locked_until TEXT,
    delivered_at TEXT,
    last_error   TEXT
);

CREATE INDEX IF NOT EXISTS content_events_pending_idx
    ON content_events(delivered_at, created_at);

PRAGMA user_version = 1;
";
