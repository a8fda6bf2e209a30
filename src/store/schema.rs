pub const SCHEMA: &str = r#"
-- Accounts; auth_level holds the role rank
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    auth_level INTEGER NOT NULL,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password TEXT NOT NULL                -- argon2id hash with embedded salt
);

-- Literature citations
CREATE TABLE IF NOT EXISTS citations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    creator_id INTEGER NOT NULL REFERENCES users(id),
    authors TEXT NOT NULL,
    year INTEGER NOT NULL,
    journal TEXT NOT NULL,
    doi TEXT NOT NULL UNIQUE,             -- normalized DOI, or a URL for citations without one
    ads TEXT NOT NULL DEFAULT ''
);

-- Sample measurements reported by a citation
CREATE TABLE IF NOT EXISTS data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    citation_id INTEGER NOT NULL REFERENCES citations(id),
    creator_id INTEGER NOT NULL REFERENCES users(id),
    sample_type TEXT NOT NULL,
    element TEXT NOT NULL
);

-- Append-only edit ledger. Rows outlive the items they describe,
-- so item_id is not a foreign key.
CREATE TABLE IF NOT EXISTS edits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    datetime TEXT NOT NULL,
    "table" TEXT NOT NULL,
    item_id INTEGER NOT NULL,
    "column" TEXT,
    old_value TEXT,
    new_value TEXT
);

-- Process-wide settings
CREATE TABLE IF NOT EXISTS attrs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    value TEXT NOT NULL
);

-- Login sessions; the bearer token is only stored hashed
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,
    token_lookup TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    last_used_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_data_citation ON data(citation_id);
CREATE INDEX IF NOT EXISTS idx_edits_item ON edits("table", item_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_lookup ON sessions(token_lookup);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
"#;
