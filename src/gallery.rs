use crate::gffft::{
    clamp_page_size, get_membership, require_approved_membership, require_gffft, DEFAULT_SLUG,
};
use crate::get_db_pool;
use crate::hydrate::{author_or_placeholder, resolve_authors, AuthorHandle};
use crate::middleware::ClientCtx;
use crate::orm::{galleries, gallery_items, gallery_likes, gfffts};
use crate::role::can_mutate_item;
use crate::counters;
use actix_multipart::Multipart;
use actix_web::{delete, error, get, post, web, Error, HttpResponse, Responder};
use chrono::prelude::Utc;
use futures::{StreamExt, TryStreamExt};
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub async fn get_or_create_default(
    db: &DatabaseConnection,
    gffft: &gfffts::Model,
) -> Result<galleries::Model, Error> {
    if let Some(gallery) = galleries::Entity::find()
        .filter(
            Condition::all()
                .add(galleries::Column::GffftId.eq(gffft.id))
                .add(galleries::Column::Slug.eq(DEFAULT_SLUG)),
        )
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
    {
        return Ok(gallery);
    }
    let now = Utc::now().naive_utc();
    let res = galleries::Entity::insert(galleries::ActiveModel {
        gffft_id: Set(gffft.id),
        slug: Set(DEFAULT_SLUG.to_owned()),
        item_count: Set(0),
        created_at: Set(now),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(galleries::Model {
        id: res.last_insert_id,
        gffft_id: gffft.id,
        slug: DEFAULT_SLUG.to_owned(),
        item_count: 0,
        created_at: now,
    })
}

pub async fn require_gallery(
    db: &DatabaseConnection,
    gffft: &gfffts::Model,
    mid: i64,
) -> Result<galleries::Model, Error> {
    let gallery = galleries::Entity::find_by_id(mid)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Gallery not found."))?;
    if gallery.gffft_id != gffft.id {
        return Err(error::ErrorNotFound("Gallery not found."));
    }
    Ok(gallery)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItemJson {
    pub id: i64,
    pub author: AuthorHandle,
    pub file_ref: String,
    pub filename: String,
    pub description: Option<String>,
    pub like_count: i32,
    pub created_at: chrono::NaiveDateTime,
}

impl GalleryItemJson {
    fn from_model(m: &gallery_items::Model, author: AuthorHandle) -> Self {
        Self {
            id: m.id,
            author,
            file_ref: m.file_ref.to_owned(),
            filename: m.filename.to_owned(),
            description: m.description.to_owned(),
            like_count: m.like_count,
            created_at: m.created_at,
        }
    }
}

async fn read_text_field(field: &mut actix_multipart::Field) -> Result<String, Error> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(error::ErrorBadRequest)?;
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf).map_err(error::ErrorBadRequest)
}

/// Multipart upload of a gallery item. The file bytes are consumed and
/// discarded here; a stored-file reference is minted and persisted, and
/// the storage pipeline owns the bytes.
#[post("/api/galleries")]
pub async fn create_gallery_item(
    client: ClientCtx,
    mut payload: Multipart,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();

    let mut uid: Option<String> = None;
    let mut gid: Option<i64> = None;
    let mut mid: Option<i64> = None;
    let mut description: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut have_file = false;

    while let Some(mut field) = payload.try_next().await.map_err(error::ErrorBadRequest)? {
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or("")
            .to_owned();
        match name.as_str() {
            "uid" => uid = Some(read_text_field(&mut field).await?),
            "gid" => {
                gid = Some(
                    read_text_field(&mut field)
                        .await?
                        .parse()
                        .map_err(error::ErrorBadRequest)?,
                )
            }
            "mid" => {
                mid = Some(
                    read_text_field(&mut field)
                        .await?
                        .parse()
                        .map_err(error::ErrorBadRequest)?,
                )
            }
            "description" => description = Some(read_text_field(&mut field).await?),
            "file" => {
                let ct = field.content_type();
                if ct.type_() != mime::IMAGE && ct.type_() != mime::VIDEO {
                    return Err(error::ErrorUnsupportedMediaType(
                        "Gallery items must be images or video.",
                    ));
                }
                filename = field
                    .content_disposition()
                    .get_filename()
                    .map(str::to_owned);
                have_file = true;
                // Drain the stream.
                while let Some(chunk) = field.next().await {
                    chunk.map_err(error::ErrorBadRequest)?;
                }
            }
            _ => {}
        }
    }

    let uid = uid.ok_or_else(|| error::ErrorUnprocessableEntity("Missing uid."))?;
    let gid = gid.ok_or_else(|| error::ErrorUnprocessableEntity("Missing gid."))?;
    if !have_file {
        return Err(error::ErrorUnprocessableEntity("Missing file."));
    }

    let uid = client.resolve_uid(&uid)?;
    let gffft = require_gffft(db, &uid, gid).await?;
    require_approved_membership(db, gffft.id, &caller).await?;
    let gallery = match mid {
        Some(mid) => require_gallery(db, &gffft, mid).await?,
        None => get_or_create_default(db, &gffft).await?,
    };

    let file_ref = format!("files/{}", Uuid::new_v4());
    let now = Utc::now().naive_utc();
    let res = gallery_items::Entity::insert(gallery_items::ActiveModel {
        gallery_id: Set(gallery.id),
        user_id: Set(caller.to_owned()),
        file_ref: Set(file_ref.to_owned()),
        filename: Set(filename.unwrap_or_default()),
        description: Set(description),
        like_count: Set(0),
        created_at: Set(now),
        deleted_at: Set(None),
        deleted_by: Set(None),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;

    galleries::Entity::update_many()
        .col_expr(galleries::Column::ItemCount, Expr::cust("item_count + 1"))
        .filter(galleries::Column::Id.eq(gallery.id))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    actix_web::rt::spawn(counters::bump_unseen(
        db,
        gffft.id,
        counters::UnseenCounter::GalleryItems,
    ));

    let item = gallery_items::Entity::find_by_id(res.last_insert_id)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorInternalServerError("Item vanished after insert."))?;
    let authors = resolve_authors(db, [caller.to_owned()])
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().json(GalleryItemJson::from_model(
        &item,
        author_or_placeholder(&authors, &caller),
    )))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeJson {
    pub item_id: i64,
    pub liked: bool,
    pub like_count: i32,
}

#[derive(Deserialize)]
pub struct LikeForm {
    pub uid: String,
    pub gid: i64,
    pub mid: i64,
    pub iid: i64,
}

/// Toggles the caller's like on a gallery item.
#[post("/api/galleries/like")]
pub async fn like_gallery_item(
    client: ClientCtx,
    form: web::Json<LikeForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(db, &uid, form.gid).await?;
    require_approved_membership(db, gffft.id, &caller).await?;
    let gallery = require_gallery(db, &gffft, form.mid).await?;

    let item = gallery_items::Entity::find_by_id(form.iid)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .filter(|i| i.gallery_id == gallery.id)
        .ok_or_else(|| error::ErrorNotFound("Gallery item not found."))?;

    let existing = gallery_likes::Entity::find_by_id((item.id, caller.to_owned()))
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let (expr, liked, count) = if let Some(like) = existing {
        gallery_likes::Entity::delete_many()
            .filter(
                Condition::all()
                    .add(gallery_likes::Column::ItemId.eq(like.item_id))
                    .add(gallery_likes::Column::UserId.eq(like.user_id)),
            )
            .exec(db)
            .await
            .map_err(error::ErrorInternalServerError)?;
        ("like_count - 1", false, item.like_count - 1)
    } else {
        gallery_likes::Entity::insert(gallery_likes::ActiveModel {
            item_id: Set(item.id),
            user_id: Set(caller.to_owned()),
            created_at: Set(Utc::now().naive_utc()),
        })
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
        ("like_count + 1", true, item.like_count + 1)
    };
    gallery_items::Entity::update_many()
        .col_expr(gallery_items::Column::LikeCount, Expr::cust(expr))
        .filter(gallery_items::Column::Id.eq(item.id))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().json(LikeJson {
        item_id: item.id,
        liked,
        like_count: count.max(0),
    }))
}

#[derive(Deserialize)]
pub struct ItemPageQuery {
    pub max: Option<u64>,
    pub offset: Option<u64>,
}

#[get("/api/users/{uid}/gfffts/{gid}/galleries/{mid}/items")]
pub async fn view_gallery_items(
    client: ClientCtx,
    path: web::Path<(String, i64, i64)>,
    query: web::Query<ItemPageQuery>,
) -> Result<impl Responder, Error> {
    let (uid, gid, mid) = path.into_inner();
    let db = get_db_pool();
    let uid = client.resolve_uid(&uid)?;
    let gffft = require_gffft(db, &uid, gid).await?;
    let gallery = require_gallery(db, &gffft, mid).await?;

    let rows = gallery_items::Entity::find()
        .filter(
            Condition::all()
                .add(gallery_items::Column::GalleryId.eq(gallery.id))
                .add(gallery_items::Column::DeletedAt.is_null()),
        )
        .order_by_desc(gallery_items::Column::Id)
        .offset(query.offset.unwrap_or(0))
        .limit(clamp_page_size(query.max))
        .all(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let authors = resolve_authors(db, rows.iter().map(|i| i.user_id.to_owned()))
        .await
        .map_err(error::ErrorInternalServerError)?;
    let out: Vec<GalleryItemJson> = rows
        .iter()
        .map(|i| GalleryItemJson::from_model(i, author_or_placeholder(&authors, &i.user_id)))
        .collect();

    if let Some(caller) = client.identity()? {
        if let Err(e) = counters::reset_unseen(
            db,
            gffft.id,
            &caller,
            counters::UnseenCounter::GalleryItems,
        )
        .await
        {
            log::error!("unseen reset failed for {}: {}", caller, e);
        }
    }

    Ok(HttpResponse::Ok().json(out))
}

#[delete("/api/users/{uid}/gfffts/{gid}/galleries/{mid}/items/{iid}")]
pub async fn delete_gallery_item(
    client: ClientCtx,
    path: web::Path<(String, i64, i64, i64)>,
) -> Result<impl Responder, Error> {
    let (uid, gid, mid, iid) = path.into_inner();
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&uid)?;
    let gffft = require_gffft(db, &uid, gid).await?;
    let gallery = require_gallery(db, &gffft, mid).await?;
    let item = gallery_items::Entity::find_by_id(iid)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .filter(|i| i.gallery_id == gallery.id)
        .ok_or_else(|| error::ErrorNotFound("Gallery item not found."))?;

    let caller_role = get_membership(db, gffft.id, &caller)
        .await
        .map_err(error::ErrorInternalServerError)?
        .map(|m| m.role)
        .unwrap_or_default();
    if !can_mutate_item(&caller_role, &caller, &item.user_id) {
        return Err(error::ErrorForbidden(
            "Only the author or the owner may delete this item.",
        ));
    }

    // Soft delete; the gallery item count stays put.
    gallery_items::Entity::update(gallery_items::ActiveModel {
        id: Set(item.id),
        deleted_at: Set(Some(Utc::now().naive_utc())),
        deleted_by: Set(Some(caller)),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::NoContent().finish())
}
