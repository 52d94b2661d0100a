use crate::gffft::{
    clamp_page_size, get_membership, require_approved_membership, require_gffft, DEFAULT_SLUG,
};
use crate::get_db_pool;
use crate::hydrate::{author_or_placeholder, resolve_authors, AuthorHandle};
use crate::middleware::ClientCtx;
use crate::orm::{gfffts, link_set_items, link_sets, links, posts, threads};
use crate::role::can_mutate_item;
use crate::{board, counters, refs};
use actix_web::{delete, error, get, post, web, Error, HttpResponse, Responder};
use chrono::prelude::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical form used for link deduplication: scheme and host
/// lowercased by the parser, fragment dropped, everything else kept.
/// Only http(s) links are accepted.
pub fn normalize_url(raw: &str) -> Result<(String, String), Error> {
    let mut parsed = url::Url::parse(raw.trim()).map_err(error::ErrorUnprocessableEntity)?;
    match parsed.scheme() {
        "http" | "https" => {}
        _ => return Err(error::ErrorUnprocessableEntity("Only http(s) links.")),
    }
    parsed.set_fragment(None);
    let domain = parsed
        .host_str()
        .ok_or_else(|| error::ErrorUnprocessableEntity("A link needs a host."))?
        .to_owned();
    Ok((parsed.to_string(), domain))
}

pub async fn get_or_create_default(
    db: &DatabaseConnection,
    gffft: &gfffts::Model,
) -> Result<link_sets::Model, Error> {
    if let Some(link_set) = link_sets::Entity::find()
        .filter(
            Condition::all()
                .add(link_sets::Column::GffftId.eq(gffft.id))
                .add(link_sets::Column::Slug.eq(DEFAULT_SLUG)),
        )
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
    {
        return Ok(link_set);
    }
    let now = Utc::now().naive_utc();
    let res = link_sets::Entity::insert(link_sets::ActiveModel {
        gffft_id: Set(gffft.id),
        slug: Set(DEFAULT_SLUG.to_owned()),
        item_count: Set(0),
        created_at: Set(now),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(link_sets::Model {
        id: res.last_insert_id,
        gffft_id: gffft.id,
        slug: DEFAULT_SLUG.to_owned(),
        item_count: 0,
        created_at: now,
    })
}

pub async fn require_link_set(
    db: &DatabaseConnection,
    gffft: &gfffts::Model,
    mid: i64,
) -> Result<link_sets::Model, Error> {
    let link_set = link_sets::Entity::find_by_id(mid)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Link set not found."))?;
    if link_set.gffft_id != gffft.id {
        return Err(error::ErrorNotFound("Link set not found."));
    }
    Ok(link_set)
}

/// Saving a link is three qualifying events at once: the item itself
/// plus the generated discussion thread and its first post.
pub fn link_save_unseen_counters() -> [counters::UnseenCounter; 3] {
    [
        counters::UnseenCounter::LinkItems,
        counters::UnseenCounter::BoardThreads,
        counters::UnseenCounter::BoardPosts,
    ]
}

/// Links are shared rows deduplicated by normalized url; saving an
/// already-known link bumps its save count instead of inserting a twin.
async fn get_or_create_link(
    db: &DatabaseConnection,
    normalized: &str,
    domain: &str,
    title: Option<String>,
) -> Result<links::Model, Error> {
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
        return Ok(link);
    }
    let now = Utc::now().naive_utc();
    let res = links::Entity::insert(links::ActiveModel {
        url: Set(normalized.to_owned()),
        domain: Set(domain.to_owned()),
        title: Set(title.to_owned()),
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
    Ok(links::Model {
        id: res.last_insert_id,
        url: normalized.to_owned(),
        domain: domain.to_owned(),
        title,
        description: None,
        image: None,
        save_count: 1,
        created_at: now,
        updated_at: now,
    })
}

/// Each saved link gets a discussion thread on the gffft's default
/// board, recorded on the item as a reference path.
async fn create_discussion_thread(
    db: &DatabaseConnection,
    gffft: &gfffts::Model,
    caller: &str,
    link: &links::Model,
) -> Result<String, Error> {
    let default_board = board::get_or_create_default(db, gffft).await?;
    let subject = link
        .title
        .to_owned()
        .unwrap_or_else(|| link.url.to_owned());
    let now = Utc::now().naive_utc();
    let thread_res = threads::Entity::insert(threads::ActiveModel {
        board_id: Set(default_board.id),
        user_id: Set(caller.to_owned()),
        subject: Set(subject),
        first_post_ref: Set(None),
        latest_post_ref: Set(None),
        post_count: Set(1),
        created_at: Set(now),
        deleted_at: Set(None),
        deleted_by: Set(None),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    let tid = thread_res.last_insert_id;
    let post_res = posts::Entity::insert(posts::ActiveModel {
        thread_id: Set(tid),
        user_id: Set(caller.to_owned()),
        body: Set(link.url.to_owned()),
        created_at: Set(now),
        deleted_at: Set(None),
        deleted_by: Set(None),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    let pref = refs::post_ref(
        &gffft.user_id,
        gffft.id,
        default_board.id,
        tid,
        post_res.last_insert_id,
    );
    threads::Entity::update_many()
        .col_expr(
            threads::Column::FirstPostRef,
            Expr::value(Some(pref.to_owned())),
        )
        .col_expr(threads::Column::LatestPostRef, Expr::value(Some(pref)))
        .filter(threads::Column::Id.eq(tid))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    board::bump_board_counts(db, default_board.id, true, true).await;
    Ok(refs::thread_ref(
        &gffft.user_id,
        gffft.id,
        default_board.id,
        tid,
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSetItemJson {
    pub id: i64,
    pub author: AuthorHandle,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub thread_ref: Option<String>,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Deserialize)]
pub struct NewLinkForm {
    pub uid: String,
    pub gid: i64,
    pub mid: Option<i64>,
    pub url: String,
    pub title: Option<String>,
}

#[post("/api/link-sets")]
pub async fn create_link_set_item(
    client: ClientCtx,
    form: web::Json<NewLinkForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(db, &uid, form.gid).await?;
    require_approved_membership(db, gffft.id, &caller).await?;
    let link_set = match form.mid {
        Some(mid) => require_link_set(db, &gffft, mid).await?,
        None => get_or_create_default(db, &gffft).await?,
    };

    let (normalized, domain) = normalize_url(&form.url)?;
    let link = get_or_create_link(db, &normalized, &domain, form.title.to_owned()).await?;
    let thread_ref = create_discussion_thread(db, &gffft, &caller, &link).await?;

    let now = Utc::now().naive_utc();
    let res = link_set_items::Entity::insert(link_set_items::ActiveModel {
        link_set_id: Set(link_set.id),
        link_id: Set(link.id),
        user_id: Set(caller.to_owned()),
        thread_ref: Set(Some(thread_ref.to_owned())),
        created_at: Set(now),
        deleted_at: Set(None),
        deleted_by: Set(None),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;

    link_sets::Entity::update_many()
        .col_expr(link_sets::Column::ItemCount, Expr::cust("item_count + 1"))
        .filter(link_sets::Column::Id.eq(link_set.id))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    for counter in link_save_unseen_counters() {
        actix_web::rt::spawn(counters::bump_unseen(db, gffft.id, counter));
    }

    let authors = resolve_authors(db, [caller.to_owned()])
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().json(LinkSetItemJson {
        id: res.last_insert_id,
        author: author_or_placeholder(&authors, &caller),
        url: link.url,
        domain: link.domain,
        title: link.title,
        thread_ref: Some(thread_ref),
        created_at: now,
    }))
}

#[derive(Deserialize)]
pub struct ItemPageQuery {
    pub max: Option<u64>,
    pub offset: Option<u64>,
}

#[get("/api/users/{uid}/gfffts/{gid}/link-sets/{mid}/items")]
pub async fn view_link_set_items(
    client: ClientCtx,
    path: web::Path<(String, i64, i64)>,
    query: web::Query<ItemPageQuery>,
) -> Result<impl Responder, Error> {
    let (uid, gid, mid) = path.into_inner();
    let db = get_db_pool();
    let uid = client.resolve_uid(&uid)?;
    let gffft = require_gffft(db, &uid, gid).await?;
    let link_set = require_link_set(db, &gffft, mid).await?;

    let rows = link_set_items::Entity::find()
        .filter(
            Condition::all()
                .add(link_set_items::Column::LinkSetId.eq(link_set.id))
                .add(link_set_items::Column::DeletedAt.is_null()),
        )
        .order_by_desc(link_set_items::Column::Id)
        .offset(query.offset.unwrap_or(0))
        .limit(clamp_page_size(query.max))
        .all(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    let link_ids: Vec<i64> = rows.iter().map(|i| i.link_id).collect();
    let link_rows: HashMap<i64, links::Model> = if link_ids.is_empty() {
        HashMap::new()
    } else {
        links::Entity::find()
            .filter(links::Column::Id.is_in(link_ids))
            .all(db)
            .await
            .map_err(error::ErrorInternalServerError)?
            .into_iter()
            .map(|l| (l.id, l))
            .collect()
    };
    let authors = resolve_authors(db, rows.iter().map(|i| i.user_id.to_owned()))
        .await
        .map_err(error::ErrorInternalServerError)?;

    let out: Vec<LinkSetItemJson> = rows
        .iter()
        .map(|i| {
            let link = link_rows.get(&i.link_id);
            LinkSetItemJson {
                id: i.id,
                author: author_or_placeholder(&authors, &i.user_id),
                url: link.map(|l| l.url.to_owned()).unwrap_or_default(),
                domain: link.map(|l| l.domain.to_owned()).unwrap_or_default(),
                title: link.and_then(|l| l.title.to_owned()),
                thread_ref: i.thread_ref.to_owned(),
                created_at: i.created_at,
            }
        })
        .collect();

    if let Some(caller) = client.identity()? {
        if let Err(e) =
            counters::reset_unseen(db, gffft.id, &caller, counters::UnseenCounter::LinkItems).await
        {
            log::error!("unseen reset failed for {}: {}", caller, e);
        }
    }

    Ok(HttpResponse::Ok().json(out))
}

#[delete("/api/users/{uid}/gfffts/{gid}/link-sets/{mid}/items/{iid}")]
pub async fn delete_link_set_item(
    client: ClientCtx,
    path: web::Path<(String, i64, i64, i64)>,
) -> Result<impl Responder, Error> {
    let (uid, gid, mid, iid) = path.into_inner();
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&uid)?;
    let gffft = require_gffft(db, &uid, gid).await?;
    let link_set = require_link_set(db, &gffft, mid).await?;
    let item = link_set_items::Entity::find_by_id(iid)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .filter(|i| i.link_set_id == link_set.id)
        .ok_or_else(|| error::ErrorNotFound("Link set item not found."))?;

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

    // Soft delete; the link's save count and the set's item count stay
    // put.
    link_set_items::Entity::update(link_set_items::ActiveModel {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_strips_fragment_and_lowercases_host() {
        let (url, domain) = normalize_url("HTTPS://Example.COM/a/b?q=1#frag").unwrap();
        assert_eq!(url, "https://example.com/a/b?q=1");
        assert_eq!(domain, "example.com");
    }

    #[test]
    fn test_normalize_url_rejects_non_http() {
        assert!(normalize_url("ftp://example.com/file").is_err());
        assert!(normalize_url("not a url").is_err());
        assert!(normalize_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_link_save_announces_generated_thread() {
        let counters = link_save_unseen_counters();
        assert!(counters.contains(&crate::counters::UnseenCounter::LinkItems));
        assert!(counters.contains(&crate::counters::UnseenCounter::BoardThreads));
        assert!(counters.contains(&crate::counters::UnseenCounter::BoardPosts));
    }

    #[test]
    fn test_normalize_url_is_stable() {
        let (a, _) = normalize_url("https://example.com/page#one").unwrap();
        let (b, _) = normalize_url("https://EXAMPLE.com/page#two").unwrap();
        assert_eq!(a, b);
    }
}
