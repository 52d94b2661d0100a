use crate::get_db_pool;
use crate::gffft::require_gffft;
use crate::middleware::ClientCtx;
use crate::orm::{bookmarks, gfffts};
use crate::refs;
use actix_web::{delete, error, get, post, web, Error, HttpResponse, Responder};
use chrono::prelude::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkJson {
    pub id: i64,
    #[serde(rename = "ref")]
    pub gffft_ref: String,
    pub name: String,
    pub created_at: chrono::NaiveDateTime,
}

impl BookmarkJson {
    fn from_model(b: &bookmarks::Model) -> Self {
        Self {
            id: b.id,
            gffft_ref: b.gffft_ref.to_owned(),
            name: b.name.to_owned(),
            created_at: b.created_at,
        }
    }
}

/// Saves a gffft for a user; used on explicit saves and on community
/// creation (the owner gets one automatically).
pub async fn create_bookmark(
    db: &DatabaseConnection,
    user_id: &str,
    gffft: &gfffts::Model,
) -> Result<bookmarks::Model, DbErr> {
    let target = refs::gffft_ref(&gffft.user_id, gffft.id);
    if let Some(existing) = bookmarks::Entity::find()
        .filter(
            Condition::all()
                .add(bookmarks::Column::UserId.eq(user_id.to_owned()))
                .add(bookmarks::Column::GffftRef.eq(target.to_owned())),
        )
        .one(db)
        .await?
    {
        return Ok(existing);
    }
    let now = Utc::now().naive_utc();
    let res = bookmarks::Entity::insert(bookmarks::ActiveModel {
        user_id: Set(user_id.to_owned()),
        gffft_ref: Set(target.to_owned()),
        name: Set(gffft.name.to_owned()),
        created_at: Set(now),
        ..Default::default()
    })
    .exec(db)
    .await?;
    Ok(bookmarks::Model {
        id: res.last_insert_id,
        user_id: user_id.to_owned(),
        gffft_ref: target,
        name: gffft.name.to_owned(),
        created_at: now,
    })
}

#[get("/api/users/me/bookmarks")]
pub async fn view_bookmarks(client: ClientCtx) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let rows = bookmarks::Entity::find()
        .filter(bookmarks::Column::UserId.eq(caller))
        .order_by_desc(bookmarks::Column::Id)
        .all(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    // The stored name is a snapshot from save time; refresh from the
    // live rows where the target still resolves.
    let gids: Vec<i64> = rows
        .iter()
        .filter_map(|b| refs::parse_gffft_ref(&b.gffft_ref))
        .map(|(_, gid)| gid)
        .collect();
    let live_names: std::collections::HashMap<i64, String> = if gids.is_empty() {
        std::collections::HashMap::new()
    } else {
        gfffts::Entity::find()
            .filter(gfffts::Column::Id.is_in(gids))
            .all(db)
            .await
            .map_err(error::ErrorInternalServerError)?
            .into_iter()
            .map(|g| (g.id, g.name))
            .collect()
    };

    let out: Vec<BookmarkJson> = rows
        .iter()
        .map(|b| {
            let mut json = BookmarkJson::from_model(b);
            if let Some((_, gid)) = refs::parse_gffft_ref(&b.gffft_ref) {
                if let Some(name) = live_names.get(&gid) {
                    json.name = name.to_owned();
                }
            }
            json
        })
        .collect();
    Ok(HttpResponse::Ok().json(out))
}

#[derive(Deserialize)]
pub struct NewBookmarkForm {
    pub uid: String,
    pub gid: i64,
}

#[post("/api/users/me/bookmarks")]
pub async fn create_bookmark_route(
    client: ClientCtx,
    form: web::Json<NewBookmarkForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(get_db_pool(), &uid, form.gid).await?;
    let bookmark = create_bookmark(get_db_pool(), &caller, &gffft)
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().json(BookmarkJson::from_model(&bookmark)))
}

#[delete("/api/users/me/bookmarks/{id}")]
pub async fn delete_bookmark(
    client: ClientCtx,
    path: web::Path<i64>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let id = path.into_inner();
    let bookmark = bookmarks::Entity::find_by_id(id)
        .one(get_db_pool())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Bookmark not found."))?;
    if bookmark.user_id != caller {
        return Err(error::ErrorForbidden("Not your bookmark."));
    }
    bookmarks::Entity::delete_many()
        .filter(bookmarks::Column::Id.eq(id))
        .exec(get_db_pool())
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::NoContent().finish())
}
