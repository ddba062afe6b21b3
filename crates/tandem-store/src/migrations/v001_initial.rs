//! v001 -- Initial schema creation.
//!
//! Creates the five core tables: `students`, `supervisors`, `projects`,
//! `partnership_requests`, and `applications`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Students
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS students (
    id                 TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    display_name       TEXT NOT NULL,
    partner_id         TEXT,                        -- nullable FK -> students(id)
    partnership_status TEXT NOT NULL DEFAULT 'none',
    created_at         TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Supervisors
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS supervisors (
    id               TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    display_name     TEXT NOT NULL,
    max_capacity     INTEGER NOT NULL DEFAULT 0,
    current_capacity INTEGER NOT NULL DEFAULT 0,
    is_active        INTEGER NOT NULL DEFAULT 1,    -- boolean 0/1
    is_approved      INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    created_at       TEXT NOT NULL,

    CHECK (current_capacity >= 0 AND current_capacity <= max_capacity)
);

-- ----------------------------------------------------------------
-- Projects
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS projects (
    id               TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    title            TEXT NOT NULL,
    supervisor_id    TEXT NOT NULL,                 -- FK -> supervisors(id)
    co_supervisor_id TEXT,                          -- nullable FK -> supervisors(id)
    status           TEXT NOT NULL DEFAULT 'active',
    created_at       TEXT NOT NULL,

    FOREIGN KEY (supervisor_id) REFERENCES supervisors(id)
);

CREATE INDEX IF NOT EXISTS idx_projects_supervisor ON projects(supervisor_id);

-- ----------------------------------------------------------------
-- Partnership requests (append-only audit trail)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS partnership_requests (
    id           TEXT PRIMARY KEY NOT NULL,         -- UUID v4
    kind         TEXT NOT NULL,                     -- 'student' | 'supervisor'
    requester_id TEXT NOT NULL,
    target_id    TEXT NOT NULL,
    project_id   TEXT,                              -- set for supervisor requests
    status       TEXT NOT NULL DEFAULT 'pending',
    created_at   TEXT NOT NULL,
    responded_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_requests_requester_status
    ON partnership_requests(requester_id, status);
CREATE INDEX IF NOT EXISTS idx_requests_target_status
    ON partnership_requests(target_id, status);
CREATE INDEX IF NOT EXISTS idx_requests_project_status
    ON partnership_requests(project_id, status);

-- ----------------------------------------------------------------
-- Applications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS applications (
    id          TEXT PRIMARY KEY NOT NULL,          -- UUID v4
    student_id  TEXT NOT NULL,                      -- FK -> students(id)
    project_id  TEXT NOT NULL,                      -- FK -> projects(id)
    partner_id  TEXT,                               -- partner at application time
    has_partner INTEGER NOT NULL DEFAULT 0,         -- boolean 0/1
    status      TEXT NOT NULL DEFAULT 'pending',
    created_at  TEXT NOT NULL,

    FOREIGN KEY (student_id) REFERENCES students(id),
    FOREIGN KEY (project_id) REFERENCES projects(id)
);

CREATE INDEX IF NOT EXISTS idx_applications_student
    ON applications(student_id, status);
"#;

/// Apply the v001 schema.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
