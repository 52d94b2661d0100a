//! Counter side effects fired on document writes.
//!
//! These run as spawned reactive handlers, at-least-once and
//! order-independent. Each handler takes explicit before/after shapes so
//! insert, update, delete, and no-change writes are all handled.

use crate::orm::{member_counts, memberships};
use crate::role::MembershipRole;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};

pub const SCOPE_TOTAL: &str = "total";

/// Named unseen-activity counters carried on each membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnseenCounter {
    BoardThreads,
    BoardPosts,
    GalleryItems,
    LinkItems,
}

impl UnseenCounter {
    fn column(&self) -> memberships::Column {
        match self {
            Self::BoardThreads => memberships::Column::UnseenThreads,
            Self::BoardPosts => memberships::Column::UnseenPosts,
            Self::GalleryItems => memberships::Column::UnseenGalleryItems,
            Self::LinkItems => memberships::Column::UnseenLinkItems,
        }
    }

    fn bump_expr(&self) -> &'static str {
        match self {
            Self::BoardThreads => "unseen_threads + 1",
            Self::BoardPosts => "unseen_posts + 1",
            Self::GalleryItems => "unseen_gallery_items + 1",
            Self::LinkItems => "unseen_link_items + 1",
        }
    }
}

/// Day key for the per-day role counters. UTC is the calendar convention.
pub fn today_key() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Pure delta computation for one membership write.
///
/// No-op writes (role unchanged) contribute nothing. An unrecognized role
/// value is tolerated silently on either side of the write.
pub fn role_count_deltas(
    before: Option<&str>,
    after: Option<&str>,
) -> Vec<(&'static str, i64)> {
    let before = before.and_then(MembershipRole::from_str);
    let after = after.and_then(MembershipRole::from_str);
    if before == after {
        return Vec::new();
    }
    let mut deltas = Vec::new();
    if let Some(b) = before {
        deltas.push((b.as_str(), -1));
    }
    if let Some(a) = after {
        deltas.push((a.as_str(), 1));
    }
    deltas
}

/// Keeps the lifetime and per-day role counters consistent with a
/// membership create / role change / delete.
pub async fn on_membership_write(
    db: &DatabaseConnection,
    gffft_id: i64,
    before: Option<String>,
    after: Option<String>,
) {
    for (role, delta) in role_count_deltas(before.as_deref(), after.as_deref()) {
        for scope in [SCOPE_TOTAL.to_owned(), today_key()] {
            if let Err(e) = bump_member_count(db, gffft_id, &scope, role, delta).await {
                log::error!(
                    "member count update failed for gffft {} {}/{}: {}",
                    gffft_id,
                    scope,
                    role,
                    e
                );
            }
        }
    }
}

async fn bump_member_count(
    db: &DatabaseConnection,
    gffft_id: i64,
    scope: &str,
    role: &str,
    delta: i64,
) -> Result<(), DbErr> {
    let expr = if delta >= 0 {
        format!("count + {}", delta)
    } else {
        format!("count - {}", -delta)
    };
    let res = member_counts::Entity::update_many()
        .col_expr(member_counts::Column::Count, Expr::cust(&expr))
        .filter(
            Condition::all()
                .add(member_counts::Column::GffftId.eq(gffft_id))
                .add(member_counts::Column::Scope.eq(scope))
                .add(member_counts::Column::Role.eq(role)),
        )
        .exec(db)
        .await?;
    if res.rows_affected == 0 {
        // First write for this (scope, role); seed the row.
        member_counts::Entity::insert(member_counts::ActiveModel {
            gffft_id: Set(gffft_id),
            scope: Set(scope.to_owned()),
            role: Set(role.to_owned()),
            count: Set(delta),
        })
        .exec(db)
        .await?;
    }
    Ok(())
}

/// Increments a named counter for every member of the gffft.
/// The acting member's own counter is incremented too.
pub async fn bump_unseen(db: &DatabaseConnection, gffft_id: i64, counter: UnseenCounter) {
    let res = memberships::Entity::update_many()
        .col_expr(counter.column(), Expr::cust(counter.bump_expr()))
        .filter(memberships::Column::GffftId.eq(gffft_id))
        .exec(db)
        .await;
    if let Err(e) = res {
        log::error!("unseen counter bump failed for gffft {}: {}", gffft_id, e);
    }
}

/// Zeroes exactly the calling member's counter. Only ever invoked with an
/// authenticated caller; anonymous viewers never reset.
pub async fn reset_unseen(
    db: &DatabaseConnection,
    gffft_id: i64,
    member_id: &str,
    counter: UnseenCounter,
) -> Result<(), DbErr> {
    memberships::Entity::update_many()
        .col_expr(counter.column(), Expr::value(0))
        .filter(
            Condition::all()
                .add(memberships::Column::GffftId.eq(gffft_id))
                .add(memberships::Column::MemberId.eq(member_id)),
        )
        .exec(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn replay(history: &[(Option<&str>, Option<&str>)]) -> HashMap<&'static str, i64> {
        let mut totals = HashMap::new();
        for (before, after) in history {
            for (role, delta) in role_count_deltas(*before, *after) {
                *totals.entry(role).or_insert(0) += delta;
            }
        }
        totals.retain(|_, v| *v != 0);
        totals
    }

    #[test]
    fn test_create_then_promote_then_delete_nets_zero() {
        let totals = replay(&[
            (None, Some("member")),
            (Some("member"), Some("owner")),
            (Some("owner"), None),
        ]);
        assert!(totals.is_empty());
    }

    #[test]
    fn test_create_and_promote() {
        let totals = replay(&[(None, Some("member")), (Some("member"), Some("admin"))]);
        assert_eq!(totals.get("admin"), Some(&1));
        assert_eq!(totals.get("member"), None);
    }

    #[test]
    fn test_noop_write_touches_nothing() {
        assert!(role_count_deltas(Some("member"), Some("member")).is_empty());
        assert!(role_count_deltas(None, None).is_empty());
    }

    #[test]
    fn test_unrecognized_role_is_silent() {
        assert!(role_count_deltas(None, Some("sysop")).is_empty());
        assert!(role_count_deltas(Some("sysop"), Some("sysop")).is_empty());
        // A recognized side still counts even when the other side is junk.
        let deltas = role_count_deltas(Some("sysop"), Some("member"));
        assert_eq!(deltas, vec![("member", 1)]);
    }

    #[test]
    fn test_today_key_shape() {
        let key = today_key();
        assert_eq!(key.len(), 10);
        assert_eq!(key.as_bytes()[4], b'-');
        assert_eq!(key.as_bytes()[7], b'-');
    }
}
