use crate::gffft::{
    clamp_page_size, get_membership, require_approved_membership, require_gffft, DEFAULT_SLUG,
};
use crate::get_db_pool;
use crate::hydrate::{author_or_placeholder, resolve_authors, AuthorHandle, DELETED_PLACEHOLDER};
use crate::link_set::normalize_url;
use crate::middleware::ClientCtx;
use crate::orm::{collection_posts, collection_reactions, collections, gfffts, links};
use crate::role::can_mutate_item;
use actix_web::{delete, error, get, post, web, Error, HttpResponse, Responder};
use chrono::prelude::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PostKind {
    Media,
    Thread,
    Link,
    Page,
}

impl PostKind {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "media" => Some(Self::Media),
            "thread" => Some(Self::Thread),
            "link" => Some(Self::Link),
            "page" => Some(Self::Page),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Media => "media",
            Self::Thread => "thread",
            Self::Link => "link",
            Self::Page => "page",
        }
    }
}

pub async fn get_or_create_default(
    db: &DatabaseConnection,
    gffft: &gfffts::Model,
) -> Result<collections::Model, Error> {
    if let Some(collection) = collections::Entity::find()
        .filter(
            Condition::all()
                .add(collections::Column::GffftId.eq(gffft.id))
                .add(collections::Column::Slug.eq(DEFAULT_SLUG)),
        )
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
    {
        return Ok(collection);
    }
    let now = Utc::now().naive_utc();
    let res = collections::Entity::insert(collections::ActiveModel {
        gffft_id: Set(gffft.id),
        slug: Set(DEFAULT_SLUG.to_owned()),
        post_count: Set(0),
        created_at: Set(now),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(collections::Model {
        id: res.last_insert_id,
        gffft_id: gffft.id,
        slug: DEFAULT_SLUG.to_owned(),
        post_count: 0,
        created_at: now,
    })
}

pub async fn require_collection(
    db: &DatabaseConnection,
    gffft: &gfffts::Model,
    cid: i64,
) -> Result<collections::Model, Error> {
    let collection = collections::Entity::find_by_id(cid)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Collection not found."))?;
    if collection.gffft_id != gffft.id {
        return Err(error::ErrorNotFound("Collection not found."));
    }
    Ok(collection)
}

async fn require_collection_post(
    db: &DatabaseConnection,
    collection_id: i64,
    pid: i64,
) -> Result<collection_posts::Model, Error> {
    let post = collection_posts::Entity::find_by_id(pid)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Collection post not found."))?;
    if post.collection_id != collection_id {
        return Err(error::ErrorNotFound("Collection post not found."));
    }
    Ok(post)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPostJson {
    pub id: i64,
    pub kind: String,
    pub author: AuthorHandle,
    pub body: Option<String>,
    pub file_ref: Option<String>,
    pub link_url: Option<String>,
    pub reply_count: i32,
    pub created_at: chrono::NaiveDateTime,
    pub deleted: bool,
}

#[derive(Deserialize)]
pub struct NewCollectionPostForm {
    pub uid: String,
    pub gid: i64,
    pub cid: Option<i64>,
    pub kind: String,
    pub body: Option<String>,
    pub url: Option<String>,
}

#[post("/api/collections")]
pub async fn create_collection_post(
    client: ClientCtx,
    form: web::Json<NewCollectionPostForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(db, &uid, form.gid).await?;
    require_approved_membership(db, gffft.id, &caller).await?;
    let collection = match form.cid {
        Some(cid) => require_collection(db, &gffft, cid).await?,
        None => get_or_create_default(db, &gffft).await?,
    };

    let kind = PostKind::from_str(&form.kind)
        .ok_or_else(|| error::ErrorBadRequest("Unknown post kind."))?;

    // Link posts carry a deduplicated link row; media posts mint a
    // stored-file reference for the upload pipeline to fill.
    let link_id = match kind {
        PostKind::Link => {
            let raw = form
                .url
                .as_deref()
                .ok_or_else(|| error::ErrorUnprocessableEntity("A link post needs a url."))?;
            let (normalized, domain) = normalize_url(raw)?;
            Some(find_or_insert_link(db, &normalized, &domain).await?)
        }
        _ => None,
    };
    let file_ref = match kind {
        PostKind::Media => Some(format!("files/{}", Uuid::new_v4())),
        _ => None,
    };
    let body = form.body.as_deref().map(str::trim).map(str::to_owned);
    if kind != PostKind::Link && kind != PostKind::Media && body.as_deref().unwrap_or("").is_empty()
    {
        return Err(error::ErrorUnprocessableEntity("A post needs a body."));
    }

    let now = Utc::now().naive_utc();
    let res = collection_posts::Entity::insert(collection_posts::ActiveModel {
        collection_id: Set(collection.id),
        parent_id: Set(None),
        kind: Set(kind.as_str().to_owned()),
        user_id: Set(caller.to_owned()),
        body: Set(body),
        link_id: Set(link_id),
        file_ref: Set(file_ref),
        reply_count: Set(0),
        created_at: Set(now),
        deleted_at: Set(None),
        deleted_by: Set(None),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;

    collections::Entity::update_many()
        .col_expr(collections::Column::PostCount, Expr::cust("post_count + 1"))
        .filter(collections::Column::Id.eq(collection.id))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "id": res.last_insert_id })))
}

async fn find_or_insert_link(
    db: &DatabaseConnection,
    normalized: &str,
    domain: &str,
) -> Result<i64, Error> {
    if let Some(link) = links::Entity::find()
        .filter(links::Column::Url.eq(normalized))
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
    {
        links::Entity::update_many()
            .col_expr(links::Column::SaveCount, Expr::cust("save_count + 1"))
            .filter(links::Column::Id.eq(link.id))
            .exec(db)
            .await
            .map_err(error::ErrorInternalServerError)?;
        return Ok(link.id);
    }
    let now = Utc::now().naive_utc();
    let res = links::Entity::insert(links::ActiveModel {
        url: Set(normalized.to_owned()),
        domain: Set(domain.to_owned()),
        title: Set(None),
        description: Set(None),
        image: Set(None),
        save_count: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(res.last_insert_id)
}

#[derive(Deserialize)]
pub struct ReplyForm {
    pub uid: String,
    pub gid: i64,
    pub cid: i64,
    pub pid: i64,
    pub body: String,
}

#[post("/api/collections/reply")]
pub async fn reply_collection_post(
    client: ClientCtx,
    form: web::Json<ReplyForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(db, &uid, form.gid).await?;
    require_approved_membership(db, gffft.id, &caller).await?;
    let collection = require_collection(db, &gffft, form.cid).await?;
    let parent = require_collection_post(db, collection.id, form.pid).await?;

    let body = form.body.trim().to_owned();
    if body.is_empty() {
        return Err(error::ErrorUnprocessableEntity("A reply needs a body."));
    }

    let now = Utc::now().naive_utc();
    collection_posts::Entity::insert(collection_posts::ActiveModel {
        collection_id: Set(collection.id),
        parent_id: Set(Some(parent.id)),
        kind: Set(PostKind::Thread.as_str().to_owned()),
        user_id: Set(caller.to_owned()),
        body: Set(Some(body)),
        link_id: Set(None),
        file_ref: Set(None),
        reply_count: Set(0),
        created_at: Set(now),
        deleted_at: Set(None),
        deleted_by: Set(None),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;

    collection_posts::Entity::update_many()
        .col_expr(
            collection_posts::Column::ReplyCount,
            Expr::cust("reply_count + 1"),
        )
        .filter(collection_posts::Column::Id.eq(parent.id))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    collections::Entity::update_many()
        .col_expr(collections::Column::PostCount, Expr::cust("post_count + 1"))
        .filter(collections::Column::Id.eq(collection.id))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::NoContent().finish())
}

#[derive(Deserialize)]
pub struct ReactForm {
    pub uid: String,
    pub gid: i64,
    pub cid: i64,
    pub pid: i64,
    pub reaction: String,
}

/// Toggles the caller's reaction on a collection post. Reacting again
/// with the same symbol removes it; a different symbol replaces it.
#[post("/api/collections/react")]
pub async fn react_collection_post(
    client: ClientCtx,
    form: web::Json<ReactForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(db, &uid, form.gid).await?;
    require_approved_membership(db, gffft.id, &caller).await?;
    let collection = require_collection(db, &gffft, form.cid).await?;
    let post = require_collection_post(db, collection.id, form.pid).await?;

    let existing = collection_reactions::Entity::find_by_id((post.id, caller.to_owned()))
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    match existing {
        Some(r) if r.reaction == form.reaction => {
            collection_reactions::Entity::delete_many()
                .filter(
                    Condition::all()
                        .add(collection_reactions::Column::PostId.eq(post.id))
                        .add(collection_reactions::Column::UserId.eq(caller)),
                )
                .exec(db)
                .await
                .map_err(error::ErrorInternalServerError)?;
        }
        Some(_) => {
            collection_reactions::Entity::update(collection_reactions::ActiveModel {
                post_id: Set(post.id),
                user_id: Set(caller),
                reaction: Set(form.reaction.to_owned()),
                ..Default::default()
            })
            .exec(db)
            .await
            .map_err(error::ErrorInternalServerError)?;
        }
        None => {
            collection_reactions::Entity::insert(collection_reactions::ActiveModel {
                post_id: Set(post.id),
                user_id: Set(caller),
                reaction: Set(form.reaction.to_owned()),
                created_at: Set(Utc::now().naive_utc()),
            })
            .exec(db)
            .await
            .map_err(error::ErrorInternalServerError)?;
        }
    }
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Deserialize)]
pub struct PostPageQuery {
    pub max: Option<u64>,
    pub offset: Option<u64>,
}

#[get("/api/users/{uid}/gfffts/{gid}/collections/{cid}/posts")]
pub async fn view_collection_posts(
    client: ClientCtx,
    path: web::Path<(String, i64, i64)>,
    query: web::Query<PostPageQuery>,
) -> Result<impl Responder, Error> {
    let (uid, gid, cid) = path.into_inner();
    let db = get_db_pool();
    let uid = client.resolve_uid(&uid)?;
    let gffft = require_gffft(db, &uid, gid).await?;
    let collection = require_collection(db, &gffft, cid).await?;

    // Top-level posts only; replies hang off their parent and are
    // fetched separately.
    let rows = collection_posts::Entity::find()
        .filter(
            Condition::all()
                .add(collection_posts::Column::CollectionId.eq(collection.id))
                .add(collection_posts::Column::ParentId.is_null())
                .add(collection_posts::Column::DeletedAt.is_null()),
        )
        .order_by_desc(collection_posts::Column::Id)
        .offset(query.offset.unwrap_or(0))
        .limit(clamp_page_size(query.max))
        .all(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    let link_ids: Vec<i64> = rows.iter().filter_map(|p| p.link_id).collect();
    let link_urls: std::collections::HashMap<i64, String> = if link_ids.is_empty() {
        std::collections::HashMap::new()
    } else {
        links::Entity::find()
            .filter(links::Column::Id.is_in(link_ids))
            .all(db)
            .await
            .map_err(error::ErrorInternalServerError)?
            .into_iter()
            .map(|l| (l.id, l.url))
            .collect()
    };
    let authors = resolve_authors(db, rows.iter().map(|p| p.user_id.to_owned()))
        .await
        .map_err(error::ErrorInternalServerError)?;

    let out: Vec<CollectionPostJson> = rows
        .iter()
        .map(|p| CollectionPostJson {
            id: p.id,
            kind: p.kind.to_owned(),
            author: author_or_placeholder(&authors, &p.user_id),
            body: p.body.to_owned(),
            file_ref: p.file_ref.to_owned(),
            link_url: p.link_id.and_then(|id| link_urls.get(&id).cloned()),
            reply_count: p.reply_count,
            created_at: p.created_at,
            deleted: false,
        })
        .collect();
    Ok(HttpResponse::Ok().json(out))
}

#[get("/api/users/{uid}/gfffts/{gid}/collections/{cid}/posts/{pid}/replies")]
pub async fn view_collection_replies(
    client: ClientCtx,
    path: web::Path<(String, i64, i64, i64)>,
    query: web::Query<PostPageQuery>,
) -> Result<impl Responder, Error> {
    let (uid, gid, cid, pid) = path.into_inner();
    let db = get_db_pool();
    let uid = client.resolve_uid(&uid)?;
    let gffft = require_gffft(db, &uid, gid).await?;
    let collection = require_collection(db, &gffft, cid).await?;
    let parent = require_collection_post(db, collection.id, pid).await?;

    let rows = collection_posts::Entity::find()
        .filter(collection_posts::Column::ParentId.eq(parent.id))
        .order_by_asc(collection_posts::Column::Id)
        .offset(query.offset.unwrap_or(0))
        .limit(clamp_page_size(query.max))
        .all(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let authors = resolve_authors(db, rows.iter().map(|p| p.user_id.to_owned()))
        .await
        .map_err(error::ErrorInternalServerError)?;

    let out: Vec<CollectionPostJson> = rows
        .iter()
        .map(|p| {
            let deleted = p.deleted_at.is_some();
            CollectionPostJson {
                id: p.id,
                kind: p.kind.to_owned(),
                author: if deleted {
                    AuthorHandle::placeholder(&p.user_id)
                } else {
                    author_or_placeholder(&authors, &p.user_id)
                },
                body: if deleted {
                    Some(DELETED_PLACEHOLDER.to_owned())
                } else {
                    p.body.to_owned()
                },
                file_ref: p.file_ref.to_owned(),
                link_url: None,
                reply_count: p.reply_count,
                created_at: p.created_at,
                deleted,
            }
        })
        .collect();
    Ok(HttpResponse::Ok().json(out))
}

#[delete("/api/users/{uid}/gfffts/{gid}/collections/{cid}/posts/{pid}")]
pub async fn delete_collection_post(
    client: ClientCtx,
    path: web::Path<(String, i64, i64, i64)>,
) -> Result<impl Responder, Error> {
    let (uid, gid, cid, pid) = path.into_inner();
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&uid)?;
    let gffft = require_gffft(db, &uid, gid).await?;
    let collection = require_collection(db, &gffft, cid).await?;
    let post = require_collection_post(db, collection.id, pid).await?;

    let caller_role = get_membership(db, gffft.id, &caller)
        .await
        .map_err(error::ErrorInternalServerError)?
        .map(|m| m.role)
        .unwrap_or_default();
    if !can_mutate_item(&caller_role, &caller, &post.user_id) {
        return Err(error::ErrorForbidden(
            "Only the author or the owner may delete this post.",
        ));
    }

    // Soft delete; the collection's post count stays put.
    collection_posts::Entity::update(collection_posts::ActiveModel {
        id: Set(post.id),
        deleted_at: Set(Some(Utc::now().naive_utc())),
        deleted_by: Set(Some(caller)),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_kind_round_trip() {
        for kind in ["media", "thread", "link", "page"] {
            assert_eq!(PostKind::from_str(kind).unwrap().as_str(), kind);
        }
    }

    #[test]
    fn test_post_kind_rejects_unknown() {
        assert_eq!(PostKind::from_str("video"), None);
        assert_eq!(PostKind::from_str(""), None);
        assert_eq!(PostKind::from_str("Media"), None);
    }
}
