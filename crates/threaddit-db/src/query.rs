//! Query description for the `subpost_info` aggregate view.
//!
//! Filtering, ordering and pagination are independent fields; [`InfoQuery::to_sql`]
//! compiles them into one parameterized statement.

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;

/// SQL name of the Unicode lowercase function used for name search.
const CASEFOLD: &str = "casefold";

/// Register `casefold(text)` on a connection. SQLite's own `LIKE` and
/// `lower()` only fold ASCII.
pub(crate) fn register_casefold(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        CASEFOLD,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoFilter {
    All,
    /// Case-insensitive substring match. `%` and `_` match literally.
    NameContains(String),
    NameEquals(String),
    HasMembers,
    HasPosts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoOrder {
    Name,
    MembersDesc,
    PostsDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoQuery {
    pub filter: InfoFilter,
    pub order: InfoOrder,
    pub page: Option<Page>,
}

impl InfoQuery {
    pub fn new(filter: InfoFilter, order: InfoOrder) -> Self {
        Self {
            filter,
            order,
            page: None,
        }
    }

    pub fn paged(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    /// Most members first, skipping rows without a member count.
    pub fn by_members(page: Page) -> Self {
        Self::new(InfoFilter::HasMembers, InfoOrder::MembersDesc).paged(page)
    }

    /// Most posts first, skipping rows without a post count.
    pub fn by_posts(page: Page) -> Self {
        Self::new(InfoFilter::HasPosts, InfoOrder::PostsDesc).paged(page)
    }

    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::from(
            "SELECT id, name, description, logo, members_count, posts_count, comments_count
             FROM subpost_info",
        );
        let mut params = Vec::new();

        match &self.filter {
            InfoFilter::All => {}
            InfoFilter::NameContains(needle) => {
                let folded = needle.to_lowercase();
                params.push(Value::Text(format!("%{}%", escape_like(&folded))));
                sql.push_str(&format!(
                    " WHERE {CASEFOLD}(name) LIKE ?{} ESCAPE '\\'",
                    params.len()
                ));
            }
            InfoFilter::NameEquals(name) => {
                params.push(Value::Text(name.clone()));
                sql.push_str(&format!(" WHERE name = ?{}", params.len()));
            }
            InfoFilter::HasMembers => sql.push_str(" WHERE members_count IS NOT NULL"),
            InfoFilter::HasPosts => sql.push_str(" WHERE posts_count IS NOT NULL"),
        }

        sql.push_str(match self.order {
            InfoOrder::Name => " ORDER BY name ASC, id ASC",
            InfoOrder::MembersDesc => " ORDER BY members_count DESC, id ASC",
            InfoOrder::PostsDesc => " ORDER BY posts_count DESC, id ASC",
        });

        if let Some(page) = self.page {
            params.push(Value::Integer(i64::from(page.limit)));
            params.push(Value::Integer(i64::from(page.offset)));
            sql.push_str(&format!(
                " LIMIT ?{} OFFSET ?{}",
                params.len() - 1,
                params.len()
            ));
        }

        (sql, params)
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaged_name_listing_has_no_params() {
        let (sql, params) = InfoQuery::new(InfoFilter::All, InfoOrder::Name).to_sql();
        assert!(sql.ends_with("ORDER BY name ASC, id ASC"));
        assert!(!sql.contains("WHERE"));
        assert!(params.is_empty());
    }

    #[test]
    fn paging_binds_after_filter() {
        let (sql, params) = InfoQuery::new(InfoFilter::NameContains("RU".into()), InfoOrder::Name)
            .paged(Page::new(5, 10))
            .to_sql();
        assert!(sql.contains("casefold(name) LIKE ?1 ESCAPE"));
        assert!(sql.ends_with("LIMIT ?2 OFFSET ?3"));
        assert_eq!(
            params,
            vec![
                Value::Text("%ru%".into()),
                Value::Integer(5),
                Value::Integer(10)
            ]
        );
    }

    #[test]
    fn casefold_lowercases_beyond_ascii() {
        let conn = Connection::open_in_memory().unwrap();
        register_casefold(&conn).unwrap();
        let folded: String = conn
            .query_row("SELECT casefold('ÜBER Straße')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "über straße");
        let null: Option<String> = conn
            .query_row("SELECT casefold(NULL)", [], |row| row.get(0))
            .unwrap();
        assert_eq!(null, None);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn ranking_presets() {
        let (sql, _) = InfoQuery::by_members(Page::new(10, 0)).to_sql();
        assert!(sql.contains("members_count IS NOT NULL"));
        assert!(sql.contains("ORDER BY members_count DESC"));

        let (sql, _) = InfoQuery::by_posts(Page::new(10, 0)).to_sql();
        assert!(sql.contains("posts_count IS NOT NULL"));
        assert!(sql.contains("ORDER BY posts_count DESC"));
    }
}
