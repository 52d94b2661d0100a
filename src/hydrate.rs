//! Batch resolution of stored author references.
//!
//! Runs between data access and response serialization: collect the user
//! ids a page of items refers to, resolve them in one query, and fall
//! back to an explicit placeholder identity for anything absent.

use crate::orm::users;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const DELETED_PLACEHOLDER: &str = "(deleted)";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorHandle {
    pub id: String,
    pub username: String,
}

impl AuthorHandle {
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            username: DELETED_PLACEHOLDER.to_owned(),
        }
    }
}

pub async fn resolve_authors<I>(
    db: &DatabaseConnection,
    ids: I,
) -> Result<HashMap<String, AuthorHandle>, DbErr>
where
    I: IntoIterator<Item = String>,
{
    let unique: HashSet<String> = ids.into_iter().collect();
    if unique.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = users::Entity::find()
        .filter(users::Column::Id.is_in(unique))
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|u| {
            (
                u.id.to_owned(),
                AuthorHandle {
                    id: u.id,
                    username: u.username,
                },
            )
        })
        .collect())
}

/// Absence degrades to the placeholder identity, never a hard failure.
pub fn author_or_placeholder(map: &HashMap<String, AuthorHandle>, id: &str) -> AuthorHandle {
    map.get(id)
        .cloned()
        .unwrap_or_else(|| AuthorHandle::placeholder(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_for_absent_author() {
        let mut map = HashMap::new();
        map.insert(
            "u1".to_owned(),
            AuthorHandle {
                id: "u1".to_owned(),
                username: "plum".to_owned(),
            },
        );
        assert_eq!(author_or_placeholder(&map, "u1").username, "plum");
        let missing = author_or_placeholder(&map, "gone");
        assert_eq!(missing.id, "gone");
        assert_eq!(missing.username, DELETED_PLACEHOLDER);
    }
}
