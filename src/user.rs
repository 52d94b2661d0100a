use crate::middleware::ClientCtx;
use crate::orm::users;
use actix_web::{error, get, Error, HttpResponse, Responder};
use chrono::prelude::Utc;
use rand::Rng;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};
use serde::Serialize;

const USERNAME_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";
const USERNAME_SUFFIX_LENGTH: usize = 8;
const MAX_USERNAME_ATTEMPTS: usize = 100;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJson {
    pub id: String,
    pub username: String,
    pub created_at: chrono::NaiveDateTime,
}

impl UserJson {
    pub fn from_model(user: &users::Model) -> Self {
        Self {
            id: user.id.to_owned(),
            username: user.username.to_owned(),
            created_at: user.created_at,
        }
    }
}

pub fn generate_username<R: Rng>(rng: &mut R) -> String {
    let suffix: String = (0..USERNAME_SUFFIX_LENGTH)
        .map(|_| USERNAME_ALPHABET[rng.gen_range(0..USERNAME_ALPHABET.len())] as char)
        .collect();
    format!("user-{}", suffix)
}

async fn generate_unique_username(db: &DatabaseConnection) -> Result<String, DbErr> {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_USERNAME_ATTEMPTS {
        let candidate = generate_username(&mut rng);
        let taken = users::Entity::find()
            .filter(users::Column::Username.eq(candidate.to_owned()))
            .one(db)
            .await?;
        if taken.is_none() {
            return Ok(candidate);
        }
    }
    Err(DbErr::Custom("username space exhausted".to_owned()))
}

/// Users are created lazily on first authenticated request, with a
/// generated unique username.
pub async fn get_or_create_user(db: &DatabaseConnection, uid: &str) -> Result<users::Model, DbErr> {
    if let Some(user) = users::Entity::find_by_id(uid.to_owned()).one(db).await? {
        return Ok(user);
    }
    let now = Utc::now().naive_utc();
    let user = users::Model {
        id: uid.to_owned(),
        username: generate_unique_username(db).await?,
        created_at: now,
        updated_at: now,
    };
    users::Entity::insert(users::ActiveModel {
        id: Set(user.id.to_owned()),
        username: Set(user.username.to_owned()),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .exec(db)
    .await?;
    log::info!("created user {} as {}", user.id, user.username);
    Ok(user)
}

pub async fn find_user_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find()
        .filter(users::Column::Username.eq(username.to_owned()))
        .one(db)
        .await
}

#[get("/api/users/me")]
pub async fn view_me(client: ClientCtx) -> Result<impl Responder, Error> {
    client.require_id()?;
    let user = client
        .get_user()
        .ok_or_else(|| error::ErrorUnauthorized("authentication required"))?;
    Ok(HttpResponse::Ok().json(UserJson::from_model(&user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_shape() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let name = generate_username(&mut rng);
            let suffix = name.strip_prefix("user-").expect("prefix");
            assert_eq!(suffix.len(), USERNAME_SUFFIX_LENGTH);
            assert!(suffix.bytes().all(|b| USERNAME_ALPHABET.contains(&b)));
        }
    }
}
