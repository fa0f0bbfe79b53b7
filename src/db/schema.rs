//! Database schema and migrations for sharegate.
//!
//! Migrations are applied sequentially when the database is first opened or
//! upgraded. All timestamp columns hold [`crate::datetime::DB_FORMAT`] text
//! written by the application.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: users and their session/verification tokens
    r#"
CREATE TABLE users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    email         TEXT NOT NULL UNIQUE,
    password      TEXT NOT NULL,           -- Argon2 hash
    first_name    TEXT,
    last_name     TEXT,
    role          TEXT NOT NULL DEFAULT 'CLIENT',  -- 'CLIENT', 'OPERATIONS'
    is_verified   INTEGER NOT NULL DEFAULT 0,
    is_active     INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL
);

CREATE INDEX idx_users_role ON users(role);

CREATE TABLE refresh_tokens (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token       TEXT NOT NULL UNIQUE,
    expires_at  TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    revoked_at  TEXT
);

CREATE INDEX idx_refresh_tokens_user ON refresh_tokens(user_id);

CREATE TABLE verification_tokens (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token       TEXT NOT NULL UNIQUE,
    expires_at  TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX idx_verification_tokens_user ON verification_tokens(user_id);
"#,
    // v2: uploaded files
    r#"
CREATE TABLE files (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id        INTEGER NOT NULL REFERENCES users(id),
    original_name   TEXT NOT NULL,
    declared_type   TEXT NOT NULL,          -- 'DOCX', 'XLSX', 'PPTX'
    size_bytes      INTEGER NOT NULL,
    description     TEXT,
    blob_ref        TEXT NOT NULL UNIQUE,
    created_at      TEXT NOT NULL
);

CREATE INDEX idx_files_owner ON files(owner_id);
CREATE INDEX idx_files_created ON files(created_at);
"#,
    // v3: share links
    r#"
CREATE TABLE share_links (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    token           TEXT NOT NULL UNIQUE,
    file_id         INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    created_by      INTEGER NOT NULL REFERENCES users(id),
    created_at      TEXT NOT NULL,
    expires_at      TEXT,
    max_downloads   INTEGER CHECK (max_downloads IS NULL OR max_downloads >= 1),
    download_count  INTEGER NOT NULL DEFAULT 0 CHECK (download_count >= 0),
    is_active       INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX idx_share_links_file ON share_links(file_id);
CREATE INDEX idx_share_links_creator ON share_links(created_by);
"#,
];
