use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use threaddit_db::Database;
use threaddit_db::models::{SubpostInfoRow, SubpostRow};
use threaddit_types::api::{SubpostInfoView, SubpostView};

/// Build the base view of a subpost. `viewer` controls whether
/// `has_subscribed` is filled in.
pub fn subpost_view(
    db: &Database,
    row: SubpostRow,
    viewer: Option<i64>,
) -> anyhow::Result<SubpostView> {
    let mod_list = db.moderator_usernames(row.id)?;
    let has_subscribed = match viewer {
        Some(user_id) => Some(db.is_subscribed(user_id, row.id)?),
        None => None,
    };

    Ok(SubpostView {
        id: row.id,
        created_at: parse_timestamp(&row.created_at, row.id),
        name: row.name,
        description: row.description,
        logo: row.logo,
        created_by: row.created_by,
        mod_list,
        has_subscribed,
    })
}

pub fn info_view(row: SubpostInfoRow) -> SubpostInfoView {
    SubpostInfoView {
        id: row.id,
        name: row.name,
        description: row.description,
        logo: row.logo,
        subscriber_count: row.members_count,
        posts_count: row.posts_count,
        comments_count: row.comments_count,
    }
}

fn parse_timestamp(raw: &str, subpost_id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on subpost {}: {}", raw, subpost_id, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn sqlite_timestamps_parse_as_utc() {
        let ts = parse_timestamp("2024-03-05 14:30:00", 1);
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 3, 5));
        assert_eq!(ts.hour(), 14);

        assert_eq!(parse_timestamp("garbage", 1), DateTime::<Utc>::default());
    }
}
