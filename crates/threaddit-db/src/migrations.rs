use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS roles (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            slug        TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS subposts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            description TEXT,
            logo        TEXT,
            created_by  INTEGER REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- subpost_id NULL means the role applies to every subpost
        CREATE TABLE IF NOT EXISTS user_roles (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            role_id     INTEGER NOT NULL REFERENCES roles(id),
            subpost_id  INTEGER REFERENCES subposts(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, role_id, subpost_id)
        );

        CREATE INDEX IF NOT EXISTS idx_user_roles_subpost
            ON user_roles(subpost_id, user_id);

        CREATE TABLE IF NOT EXISTS subscriptions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            subpost_id  INTEGER NOT NULL REFERENCES subposts(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_subscriptions_user
            ON subscriptions(user_id, subpost_id);

        CREATE TABLE IF NOT EXISTS posts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            subpost_id  INTEGER NOT NULL REFERENCES subposts(id),
            user_id     INTEGER REFERENCES users(id),
            title       TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id     INTEGER NOT NULL REFERENCES posts(id),
            user_id     INTEGER REFERENCES users(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE VIEW IF NOT EXISTS subpost_info AS
            SELECT
                s.id,
                s.name,
                s.description,
                s.logo,
                (SELECT COUNT(*) FROM subscriptions m WHERE m.subpost_id = s.id) AS members_count,
                (SELECT COUNT(*) FROM posts p WHERE p.subpost_id = s.id) AS posts_count,
                (SELECT COUNT(*) FROM comments c
                    JOIN posts p ON c.post_id = p.id
                    WHERE p.subpost_id = s.id) AS comments_count
            FROM subposts s;

        INSERT OR IGNORE INTO roles (slug) VALUES ('admin');
        INSERT OR IGNORE INTO roles (slug) VALUES ('mod');
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
