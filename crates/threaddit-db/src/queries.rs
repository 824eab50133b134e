use crate::Database;
use crate::models::{NewSubpost, SubpostInfoRow, SubpostPatch, SubpostRow, UserRow};
use crate::query::{InfoFilter, InfoOrder, InfoQuery, Page};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row};
use threaddit_types::models::Role;

const SUBPOST_COLUMNS: &str = "id, name, description, logo, created_by, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO users (username) VALUES (?1)", [username])?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, created_at FROM users WHERE username = ?1",
                [username],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Roles --

    /// Grant `role` to a user, scoped to `subpost_id` or global when `None`.
    /// Granting a role the user already holds is a no-op.
    pub fn grant_role(&self, user_id: i64, role: Role, subpost_id: Option<i64>) -> Result<()> {
        self.with_conn(|conn| insert_role(conn, user_id, role, subpost_id))
    }

    pub fn add_moderator(&self, user_id: i64, subpost_id: i64) -> Result<()> {
        self.grant_role(user_id, Role::Mod, Some(subpost_id))
    }

    /// Remove every role the user holds on this subpost. Returns rows deleted.
    pub fn remove_subpost_roles(&self, user_id: i64, subpost_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM user_roles WHERE user_id = ?1 AND subpost_id = ?2",
                [user_id, subpost_id],
            )?;
            Ok(deleted)
        })
    }

    /// True when the user holds any of `roles` for `subpost_id` or globally.
    pub fn has_any_role(&self, user_id: i64, roles: &[Role], subpost_id: Option<i64>) -> Result<bool> {
        if roles.is_empty() {
            return Ok(false);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (3..roles.len() + 3).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT EXISTS(
                    SELECT 1 FROM user_roles ur
                    JOIN roles r ON r.id = ur.role_id
                    WHERE ur.user_id = ?1
                      AND (ur.subpost_id IS NULL OR ur.subpost_id = ?2)
                      AND r.slug IN ({})
                )",
                placeholders.join(", ")
            );

            let slugs: Vec<&str> = roles.iter().map(Role::as_str).collect();
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&user_id, &subpost_id];
            params.extend(slugs.iter().map(|s| s as &dyn rusqlite::types::ToSql));

            let exists: bool = conn.query_row(&sql, params.as_slice(), |row| row.get(0))?;
            Ok(exists)
        })
    }

    pub fn moderator_usernames(&self, subpost_id: i64) -> Result<Vec<String>> {
        self.with_conn(|conn| query_moderators(conn, subpost_id))
    }

    // -- Subposts --

    /// Insert a subpost and make its creator a moderator, atomically.
    pub fn create_subpost(&self, new: &NewSubpost) -> Result<SubpostRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO subposts (name, description, logo, created_by) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![new.name, new.description, new.logo, new.created_by],
            )?;
            let id = tx.last_insert_rowid();
            insert_role(&tx, new.created_by, Role::Mod, Some(id))?;
            let row = query_subpost_by_id(&tx, id)?
                .ok_or_else(|| anyhow!("Subpost {} vanished after insert", id))?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_subpost_by_id(&self, id: i64) -> Result<Option<SubpostRow>> {
        self.with_conn(|conn| query_subpost_by_id(conn, id))
    }

    pub fn get_subpost_by_name(&self, name: &str) -> Result<Option<SubpostRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {SUBPOST_COLUMNS} FROM subposts WHERE name = ?1"),
                [name],
                subpost_from_row,
            )
            .optional()
        })
    }

    pub fn list_subposts_by_name(&self) -> Result<Vec<SubpostRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {SUBPOST_COLUMNS} FROM subposts ORDER BY name ASC, id ASC"))?;
            let rows = stmt
                .query_map([], subpost_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply a partial update. Returns the updated row, or `None` if the
    /// subpost does not exist.
    pub fn update_subpost(&self, id: i64, patch: &SubpostPatch) -> Result<Option<SubpostRow>> {
        self.with_conn(|conn| {
            if !patch.is_empty() {
                conn.execute(
                    "UPDATE subposts
                     SET description = COALESCE(?2, description),
                         logo = COALESCE(?3, logo)
                     WHERE id = ?1",
                    rusqlite::params![id, patch.description, patch.logo],
                )?;
            }
            query_subpost_by_id(conn, id)
        })
    }

    // -- Aggregates --

    pub fn query_subpost_info(&self, query: &InfoQuery) -> Result<Vec<SubpostInfoRow>> {
        let (sql, params) = query.to_sql();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    Ok(SubpostInfoRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        logo: row.get(3)?,
                        members_count: row.get(4)?,
                        posts_count: row.get(5)?,
                        comments_count: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_subpost_info_by_name(&self, name: &str) -> Result<Option<SubpostInfoRow>> {
        let query = InfoQuery::new(InfoFilter::NameEquals(name.to_string()), InfoOrder::Name);
        Ok(self.query_subpost_info(&query)?.into_iter().next())
    }

    // -- Subscriptions --

    /// Subscribe a user, replacing any existing row for the pair so exactly
    /// one remains.
    pub fn subscribe(&self, user_id: i64, subpost_id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM subscriptions WHERE user_id = ?1 AND subpost_id = ?2",
                [user_id, subpost_id],
            )?;
            tx.execute(
                "INSERT INTO subscriptions (user_id, subpost_id) VALUES (?1, ?2)",
                [user_id, subpost_id],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Returns false when the user was not subscribed.
    pub fn unsubscribe(&self, user_id: i64, subpost_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM subscriptions WHERE user_id = ?1 AND subpost_id = ?2",
                [user_id, subpost_id],
            )?;
            Ok(deleted > 0)
        })
    }

    pub fn is_subscribed(&self, user_id: i64, subpost_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE user_id = ?1 AND subpost_id = ?2)",
                [user_id, subpost_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Subposts the user belongs to, oldest subscription first.
    pub fn subscribed_subposts(&self, user_id: i64, page: Page) -> Result<Vec<SubpostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.name, s.description, s.logo, s.created_by, s.created_at
                 FROM subscriptions m
                 JOIN subposts s ON s.id = m.subpost_id
                 WHERE m.user_id = ?1
                 ORDER BY m.id ASC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, page.limit, page.offset], subpost_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn insert_role(conn: &Connection, user_id: i64, role: Role, subpost_id: Option<i64>) -> Result<()> {
    // UNIQUE treats NULLs as distinct, so global grants need an explicit check.
    conn.execute(
        "INSERT INTO user_roles (user_id, role_id, subpost_id)
         SELECT ?1, r.id, ?3 FROM roles r
         WHERE r.slug = ?2
           AND NOT EXISTS (
               SELECT 1 FROM user_roles ur
               WHERE ur.user_id = ?1 AND ur.role_id = r.id AND ur.subpost_id IS ?3
           )",
        rusqlite::params![user_id, role.as_str(), subpost_id],
    )?;
    Ok(())
}

fn query_subpost_by_id(conn: &Connection, id: i64) -> Result<Option<SubpostRow>> {
    conn.query_row(
        &format!("SELECT {SUBPOST_COLUMNS} FROM subposts WHERE id = ?1"),
        [id],
        subpost_from_row,
    )
    .optional()
}

fn query_moderators(conn: &Connection, subpost_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT u.username
         FROM user_roles ur
         JOIN roles r ON r.id = ur.role_id
         JOIN users u ON u.id = ur.user_id
         WHERE ur.subpost_id = ?1 AND r.slug = 'mod'
         ORDER BY u.username ASC",
    )?;

    let names = stmt
        .query_map([subpost_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;

    Ok(names)
}

fn subpost_from_row(row: &Row<'_>) -> rusqlite::Result<SubpostRow> {
    Ok(SubpostRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        logo: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice").unwrap();
        (db, alice)
    }

    fn new_subpost(name: &str, creator: i64) -> NewSubpost {
        NewSubpost {
            name: format!("t/{}", name),
            description: Some(format!("all about {}", name)),
            logo: None,
            created_by: creator,
        }
    }

    fn subscription_rows(db: &Database, user_id: i64, subpost_id: i64) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE user_id = ?1 AND subpost_id = ?2",
                [user_id, subpost_id],
                |row| row.get(0),
            )?)
        })
        .unwrap()
    }

    fn add_posts(db: &Database, subpost_id: i64, count: usize) {
        db.with_conn(|conn| {
            for i in 0..count {
                conn.execute(
                    "INSERT INTO posts (subpost_id, title) VALUES (?1, ?2)",
                    rusqlite::params![subpost_id, format!("post {}", i)],
                )?;
            }
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn creating_a_subpost_makes_the_creator_a_moderator() {
        let (db, alice) = seeded();
        let row = db.create_subpost(&new_subpost("rust", alice)).unwrap();

        assert_eq!(row.name, "t/rust");
        assert_eq!(row.created_by, Some(alice));
        assert!(db.has_any_role(alice, &[Role::Mod], Some(row.id)).unwrap());
        assert_eq!(db.moderator_usernames(row.id).unwrap(), vec!["alice".to_string()]);
    }

    #[test]
    fn duplicate_names_fail_without_leaving_roles_behind() {
        let (db, alice) = seeded();
        db.create_subpost(&new_subpost("rust", alice)).unwrap();
        assert!(db.create_subpost(&new_subpost("rust", alice)).is_err());

        let roles: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM user_roles", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(roles, 1);
    }

    #[test]
    fn role_checks_respect_scope() {
        let (db, alice) = seeded();
        let bob = db.create_user("bob").unwrap();
        let rust = db.create_subpost(&new_subpost("rust", alice)).unwrap();
        let go = db.create_subpost(&new_subpost("golang", bob)).unwrap();

        assert!(!db.has_any_role(alice, &[Role::Admin, Role::Mod], Some(go.id)).unwrap());
        assert!(db.has_any_role(alice, &[Role::Admin, Role::Mod], Some(rust.id)).unwrap());
        assert!(!db.has_any_role(alice, &[Role::Admin], Some(rust.id)).unwrap());
        assert!(!db.has_any_role(alice, &[], Some(rust.id)).unwrap());

        db.grant_role(bob, Role::Admin, None).unwrap();
        db.grant_role(bob, Role::Admin, None).unwrap();
        assert!(db.has_any_role(bob, &[Role::Admin], Some(rust.id)).unwrap());
        assert!(db.has_any_role(bob, &[Role::Admin], None).unwrap());

        let global_grants: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM user_roles WHERE subpost_id IS NULL",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(global_grants, 1);
    }

    #[test]
    fn removing_roles_only_touches_that_subpost() {
        let (db, alice) = seeded();
        let rust = db.create_subpost(&new_subpost("rust", alice)).unwrap();
        let go = db.create_subpost(&new_subpost("golang", alice)).unwrap();

        assert_eq!(db.remove_subpost_roles(alice, rust.id).unwrap(), 1);
        assert!(db.moderator_usernames(rust.id).unwrap().is_empty());
        assert_eq!(db.moderator_usernames(go.id).unwrap(), vec!["alice".to_string()]);
        assert_eq!(db.remove_subpost_roles(alice, rust.id).unwrap(), 0);
    }

    #[test]
    fn resubscribing_keeps_a_single_row() {
        let (db, alice) = seeded();
        let rust = db.create_subpost(&new_subpost("rust", alice)).unwrap();

        db.subscribe(alice, rust.id).unwrap();
        db.subscribe(alice, rust.id).unwrap();
        assert_eq!(subscription_rows(&db, alice, rust.id), 1);
        assert!(db.is_subscribed(alice, rust.id).unwrap());

        assert!(db.unsubscribe(alice, rust.id).unwrap());
        assert!(!db.unsubscribe(alice, rust.id).unwrap());
        assert_eq!(subscription_rows(&db, alice, rust.id), 0);
    }

    #[test]
    fn subscribed_subposts_are_paginated() {
        let (db, alice) = seeded();
        for name in ["aaa", "bbb", "ccc", "ddd"] {
            let row = db.create_subpost(&new_subpost(name, alice)).unwrap();
            db.subscribe(alice, row.id).unwrap();
        }

        let page = db.subscribed_subposts(alice, Page::new(2, 1)).unwrap();
        let names: Vec<_> = page.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["t/bbb", "t/ccc"]);
    }

    #[test]
    fn info_view_counts_members_posts_and_comments() {
        let (db, alice) = seeded();
        let bob = db.create_user("bob").unwrap();
        let rust = db.create_subpost(&new_subpost("rust", alice)).unwrap();
        db.subscribe(alice, rust.id).unwrap();
        db.subscribe(bob, rust.id).unwrap();
        add_posts(&db, rust.id, 3);
        db.with_conn(|conn| {
            conn.execute("INSERT INTO comments (post_id, content) VALUES (1, 'hi')", [])?;
            Ok(())
        })
        .unwrap();

        let info = db.get_subpost_info_by_name("t/rust").unwrap().unwrap();
        assert_eq!(info.members_count, Some(2));
        assert_eq!(info.posts_count, Some(3));
        assert_eq!(info.comments_count, Some(1));
        assert!(db.get_subpost_info_by_name("t/none").unwrap().is_none());
    }

    #[test]
    fn rankings_order_and_paginate_independently() {
        let (db, alice) = seeded();
        let bob = db.create_user("bob").unwrap();
        let quiet = db.create_subpost(&new_subpost("quiet", alice)).unwrap();
        let busy = db.create_subpost(&new_subpost("busy", alice)).unwrap();
        let crowded = db.create_subpost(&new_subpost("crowded", alice)).unwrap();

        db.subscribe(alice, crowded.id).unwrap();
        db.subscribe(bob, crowded.id).unwrap();
        db.subscribe(alice, busy.id).unwrap();
        add_posts(&db, busy.id, 4);
        add_posts(&db, quiet.id, 1);

        let members = db.query_subpost_info(&InfoQuery::by_members(Page::new(10, 0))).unwrap();
        let names: Vec<_> = members.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["t/crowded", "t/busy", "t/quiet"]);

        let posts = db.query_subpost_info(&InfoQuery::by_posts(Page::new(2, 0))).unwrap();
        let names: Vec<_> = posts.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["t/busy", "t/quiet"]);

        let skipped = db.query_subpost_info(&InfoQuery::by_posts(Page::new(10, 2))).unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].name, "t/crowded");
    }

    #[test]
    fn search_is_case_insensitive_and_literal() {
        let (db, alice) = seeded();
        for name in ["RustLang", "rusty", "golang", "100_percent"] {
            db.create_subpost(&new_subpost(name, alice)).unwrap();
        }

        let search = |needle: &str| {
            let query = InfoQuery::new(InfoFilter::NameContains(needle.into()), InfoOrder::Name);
            db.query_subpost_info(&query)
                .unwrap()
                .into_iter()
                .map(|r| r.name)
                .collect::<Vec<_>>()
        };

        assert_eq!(search("RUST"), vec!["t/RustLang", "t/rusty"]);
        assert_eq!(search("").len(), 4);
        assert_eq!(search("0_p"), vec!["t/100_percent"]);
        assert!(search("%").is_empty());
    }

    #[test]
    fn search_folds_non_ascii_letters() {
        let (db, alice) = seeded();
        for name in ["Über", "ÉCOLE", "plain"] {
            db.create_subpost(&new_subpost(name, alice)).unwrap();
        }

        let search = |needle: &str| {
            let query = InfoQuery::new(InfoFilter::NameContains(needle.into()), InfoOrder::Name);
            db.query_subpost_info(&query)
                .unwrap()
                .into_iter()
                .map(|r| r.name)
                .collect::<Vec<_>>()
        };

        assert_eq!(search("über"), vec!["t/Über"]);
        assert_eq!(search("ÜBER"), vec!["t/Über"]);
        assert_eq!(search("éco"), vec!["t/ÉCOLE"]);
    }

    #[test]
    fn partial_update_keeps_untouched_columns() {
        let (db, alice) = seeded();
        let rust = db.create_subpost(&new_subpost("rust", alice)).unwrap();

        let updated = db
            .update_subpost(
                rust.id,
                &SubpostPatch {
                    description: None,
                    logo: Some("/media/logo.png".into()),
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.logo.as_deref(), Some("/media/logo.png"));
        assert_eq!(updated.description.as_deref(), Some("all about rust"));

        assert!(db.update_subpost(999, &SubpostPatch::default()).unwrap().is_none());
    }

    #[test]
    fn listing_by_name_is_alphabetical() {
        let (db, alice) = seeded();
        for name in ["zeta", "alpha", "mid"] {
            db.create_subpost(&new_subpost(name, alice)).unwrap();
        }
        let names: Vec<_> = db
            .list_subposts_by_name()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["t/alpha", "t/mid", "t/zeta"]);
    }
}
