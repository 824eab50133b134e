//! Database row types. These map directly to SQLite rows and stay distinct
//! from the threaddit-types API views.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct SubpostRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct SubpostInfoRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub members_count: Option<i64>,
    pub posts_count: Option<i64>,
    pub comments_count: Option<i64>,
}

/// Values for a subpost about to be inserted. `name` is already prefixed.
#[derive(Debug, Clone)]
pub struct NewSubpost {
    pub name: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub created_by: i64,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct SubpostPatch {
    pub description: Option<String>,
    pub logo: Option<String>,
}

impl SubpostPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.logo.is_none()
    }
}
