use crate::fruit::generate_unique_fruit_code;
use crate::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::{gfffts, memberships};
use crate::role::{is_approved_role, MembershipRole, ROLE_OWNER};
use crate::{bookmark, counters, refs};
use actix_web::{error, get, patch, post, put, web, Error, HttpResponse, Responder};
use chrono::prelude::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};

/// Well-known slug for the lazily created per-gffft feature instances.
pub const DEFAULT_SLUG: &str = "default";

pub const FEATURE_BOARDS: &str = "boards";
pub const FEATURE_GALLERIES: &str = "galleries";
pub const FEATURE_LINK_SETS: &str = "link-sets";
pub const FEATURE_NOTEBOOKS: &str = "notebooks";
pub const FEATURE_CALENDARS: &str = "calendars";
pub const FEATURE_COLLECTIONS: &str = "collections";
pub const FEATURE_FRUIT_CODE: &str = "fruit-code";

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GffftJson {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub description: Option<String>,
    pub intro: Option<String>,
    pub fruit_code: Option<String>,
    pub enabled: bool,
    pub features: Vec<String>,
    pub created_at: chrono::NaiveDateTime,
}

impl GffftJson {
    pub fn from_model(g: &gfffts::Model) -> Self {
        Self {
            id: g.id,
            uid: g.user_id.to_owned(),
            name: g.name.to_owned(),
            description: g.description.to_owned(),
            intro: g.intro.to_owned(),
            fruit_code: g.fruit_code.to_owned(),
            enabled: g.enabled,
            features: features_list(g),
            created_at: g.created_at,
        }
    }
}

pub async fn get_gffft(
    db: &DatabaseConnection,
    uid: &str,
    gid: i64,
) -> Result<Option<gfffts::Model>, DbErr> {
    gfffts::Entity::find()
        .filter(
            Condition::all()
                .add(gfffts::Column::Id.eq(gid))
                .add(gfffts::Column::UserId.eq(uid.to_owned())),
        )
        .one(db)
        .await
}

/// Resolves a gffft through its ownership chain, 404 when absent.
pub async fn require_gffft(
    db: &DatabaseConnection,
    uid: &str,
    gid: i64,
) -> Result<gfffts::Model, Error> {
    get_gffft(db, uid, gid)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Gffft not found."))
}

pub async fn get_membership(
    db: &DatabaseConnection,
    gid: i64,
    member_id: &str,
) -> Result<Option<memberships::Model>, DbErr> {
    memberships::Entity::find_by_id((gid, member_id.to_owned()))
        .one(db)
        .await
}

/// Membership gate for member actions: the caller must hold a membership
/// that is neither pending nor rejected.
pub async fn require_approved_membership(
    db: &DatabaseConnection,
    gid: i64,
    caller_id: &str,
) -> Result<memberships::Model, Error> {
    let membership = get_membership(db, gid, caller_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorForbidden("Not a member of this gffft."))?;
    if !is_approved_role(&membership.role) {
        return Err(error::ErrorForbidden("Membership is not approved."));
    }
    Ok(membership)
}

pub fn features_list(g: &gfffts::Model) -> Vec<String> {
    serde_json::from_str(&g.features).unwrap_or_default()
}

/// Enabling appends the feature reference if missing; disabling removes
/// the reference without touching the underlying instance.
pub fn toggle_feature(mut list: Vec<String>, fref: &str, enabled: bool) -> (Vec<String>, bool) {
    let present = list.iter().any(|r| r == fref);
    if enabled && !present {
        list.push(fref.to_owned());
        (list, true)
    } else if !enabled && present {
        list.retain(|r| r != fref);
        (list, true)
    } else {
        (list, false)
    }
}

pub fn clamp_page_size(requested: Option<u64>) -> u64 {
    match requested {
        Some(0) | None => DEFAULT_PAGE_SIZE,
        Some(n) => n.min(MAX_PAGE_SIZE),
    }
}

/// Prefix search term: lowercased, with LIKE metacharacters stripped.
pub fn search_prefix(q: Option<&str>) -> Option<String> {
    let cleaned: String = q?
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '%' && *c != '_')
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGffftForm {
    pub name: String,
    pub description: Option<String>,
    pub initial_handle: String,
}

#[post("/api/gfffts")]
pub async fn create_gffft(
    client: ClientCtx,
    form: web::Json<NewGffftForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();

    let name = form.name.trim().to_owned();
    if name.is_empty() {
        return Err(error::ErrorUnprocessableEntity("Gffft name is required."));
    }
    let handle = form.initial_handle.trim().to_owned();
    if handle.is_empty() {
        return Err(error::ErrorUnprocessableEntity("A display handle is required."));
    }

    let fruit_code = generate_unique_fruit_code(db).await?;
    let now = Utc::now().naive_utc();
    let res = gfffts::Entity::insert(gfffts::ActiveModel {
        user_id: Set(caller.to_owned()),
        name: Set(name.to_owned()),
        name_lower: Set(name.to_lowercase()),
        description: Set(form.description.to_owned()),
        intro: Set(None),
        fruit_code: Set(Some(fruit_code)),
        enabled: Set(true),
        features: Set("[]".to_owned()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    let gid = res.last_insert_id;

    // The creator is the sole initial member.
    memberships::Entity::insert(memberships::ActiveModel {
        gffft_id: Set(gid),
        member_id: Set(caller.to_owned()),
        role: Set(ROLE_OWNER.to_owned()),
        handle: Set(handle),
        unseen_threads: Set(0),
        unseen_posts: Set(0),
        unseen_gallery_items: Set(0),
        unseen_link_items: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    actix_web::rt::spawn(counters::on_membership_write(
        db,
        gid,
        None,
        Some(ROLE_OWNER.to_owned()),
    ));

    let gffft = require_gffft(db, &caller, gid).await?;
    bookmark::create_bookmark(db, &caller, &gffft)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(GffftJson::from_model(&gffft)))
}

/// Typed partial update; only the provided fields are written.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GffftPatchForm {
    pub gid: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub intro: Option<String>,
    pub enabled: Option<bool>,
}

#[put("/api/gfffts")]
pub async fn update_gffft(
    client: ClientCtx,
    form: web::Json<GffftPatchForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let gffft = require_gffft(db, &caller, form.gid).await?;

    let mut patch = gfffts::ActiveModel {
        id: Set(gffft.id),
        updated_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };
    if let Some(name) = &form.name {
        let name = name.trim().to_owned();
        if name.is_empty() {
            return Err(error::ErrorUnprocessableEntity("Gffft name is required."));
        }
        patch.name_lower = Set(name.to_lowercase());
        patch.name = Set(name);
    }
    if let Some(description) = &form.description {
        patch.description = Set(Some(description.to_owned()));
    }
    if let Some(intro) = &form.intro {
        patch.intro = Set(Some(intro.to_owned()));
    }
    if let Some(enabled) = form.enabled {
        patch.enabled = Set(enabled);
    }
    gfffts::Entity::update(patch)
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Deserialize)]
pub struct BrowseQuery {
    pub q: Option<String>,
    pub max: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GffftListItemJson {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub description: Option<String>,
}

#[get("/api/gfffts")]
pub async fn browse_gfffts(query: web::Query<BrowseQuery>) -> Result<impl Responder, Error> {
    let mut find = gfffts::Entity::find().filter(gfffts::Column::Enabled.eq(true));
    // Prefix search orders by the indexed field; plain browse is
    // newest-first since ids are store-monotonic.
    find = match search_prefix(query.q.as_deref()) {
        Some(prefix) => find
            .filter(gfffts::Column::NameLower.like(&format!("{}%", prefix)))
            .order_by_asc(gfffts::Column::NameLower),
        None => find.order_by_desc(gfffts::Column::Id),
    };
    let rows = find
        .offset(query.offset.unwrap_or(0))
        .limit(clamp_page_size(query.max))
        .all(get_db_pool())
        .await
        .map_err(error::ErrorInternalServerError)?;
    let out: Vec<GffftListItemJson> = rows
        .iter()
        .map(|g| GffftListItemJson {
            id: g.id,
            uid: g.user_id.to_owned(),
            name: g.name.to_owned(),
            description: g.description.to_owned(),
        })
        .collect();
    Ok(HttpResponse::Ok().json(out))
}

#[derive(Deserialize)]
pub struct FruitCodeForm {
    pub uid: String,
    pub gid: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FruitCodeJson {
    pub fruit_code: Option<String>,
}

#[put("/api/gfffts/fruit-code")]
pub async fn rotate_fruit_code(
    client: ClientCtx,
    form: web::Json<FruitCodeForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(db, &uid, form.gid).await?;

    let role = get_membership(db, gffft.id, &caller)
        .await
        .map_err(error::ErrorInternalServerError)?
        .and_then(|m| MembershipRole::from_str(&m.role));
    if role != Some(MembershipRole::Owner) {
        // Non-owners get the unchanged code back, not an error.
        return Ok(HttpResponse::Ok().json(FruitCodeJson {
            fruit_code: gffft.fruit_code,
        }));
    }

    let code = generate_unique_fruit_code(db).await?;
    gfffts::Entity::update(gfffts::ActiveModel {
        id: Set(gffft.id),
        fruit_code: Set(Some(code.to_owned())),
        updated_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().json(FruitCodeJson {
        fruit_code: Some(code),
    }))
}

#[derive(Deserialize)]
pub struct FeatureToggleForm {
    pub uid: String,
    pub gid: i64,
    pub feature: String,
    pub enabled: bool,
}

#[patch("/api/gfffts/features")]
pub async fn toggle_gffft_feature(
    client: ClientCtx,
    form: web::Json<FeatureToggleForm>,
) -> Result<impl Responder, Error> {
    let caller = client.require_id()?;
    let db = get_db_pool();
    let uid = client.resolve_uid(&form.uid)?;
    let gffft = require_gffft(db, &uid, form.gid).await?;

    let role = get_membership(db, gffft.id, &caller)
        .await
        .map_err(error::ErrorInternalServerError)?
        .and_then(|m| MembershipRole::from_str(&m.role));
    if role != Some(MembershipRole::Owner) {
        return Err(error::ErrorForbidden("Only the owner may toggle features."));
    }

    // Enabling lazily creates the default instance; disabling leaves it
    // in place so the data is retained.
    let fref = match form.feature.as_str() {
        FEATURE_BOARDS => {
            let board = crate::board::get_or_create_default(db, &gffft).await?;
            refs::feature_ref(&gffft.user_id, gffft.id, FEATURE_BOARDS, board.id)
        }
        FEATURE_GALLERIES => {
            let gallery = crate::gallery::get_or_create_default(db, &gffft).await?;
            refs::feature_ref(&gffft.user_id, gffft.id, FEATURE_GALLERIES, gallery.id)
        }
        FEATURE_LINK_SETS => {
            let link_set = crate::link_set::get_or_create_default(db, &gffft).await?;
            refs::feature_ref(&gffft.user_id, gffft.id, FEATURE_LINK_SETS, link_set.id)
        }
        FEATURE_NOTEBOOKS => {
            let notebook = crate::notebook::get_or_create_default(db, &gffft).await?;
            refs::feature_ref(&gffft.user_id, gffft.id, FEATURE_NOTEBOOKS, notebook.id)
        }
        FEATURE_CALENDARS => {
            let calendar = crate::calendar::get_or_create_default(db, &gffft).await?;
            refs::feature_ref(&gffft.user_id, gffft.id, FEATURE_CALENDARS, calendar.id)
        }
        FEATURE_COLLECTIONS => {
            let collection = crate::collection::get_or_create_default(db, &gffft).await?;
            refs::feature_ref(&gffft.user_id, gffft.id, FEATURE_COLLECTIONS, collection.id)
        }
        FEATURE_FRUIT_CODE => {
            format!("{}/fruit-code", refs::gffft_ref(&gffft.user_id, gffft.id))
        }
        _ => return Err(error::ErrorBadRequest("Unknown feature.")),
    };

    let (list, changed) = toggle_feature(features_list(&gffft), &fref, form.enabled);
    if changed {
        let features = serde_json::to_string(&list).map_err(error::ErrorInternalServerError)?;
        gfffts::Entity::update(gfffts::ActiveModel {
            id: Set(gffft.id),
            features: Set(features),
            updated_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        })
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    }
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_page_size() {
        assert_eq!(clamp_page_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(0)), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(5)), 5);
        assert_eq!(clamp_page_size(Some(100)), 100);
        assert_eq!(clamp_page_size(Some(5000)), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_search_prefix() {
        assert_eq!(search_prefix(None), None);
        assert_eq!(search_prefix(Some("  ")), None);
        assert_eq!(search_prefix(Some("%_")), None);
        assert_eq!(search_prefix(Some(" Gar%den_ ")), Some("garden".to_owned()));
    }

    #[test]
    fn test_toggle_feature_idempotent() {
        let fref = "users/u/gfffts/1/boards/2";
        let (list, changed) = toggle_feature(Vec::new(), fref, true);
        assert!(changed);
        assert_eq!(list, vec![fref.to_owned()]);
        // Enabling again changes nothing.
        let (list, changed) = toggle_feature(list, fref, true);
        assert!(!changed);
        assert_eq!(list.len(), 1);
        let (list, changed) = toggle_feature(list, fref, false);
        assert!(changed);
        assert!(list.is_empty());
        let (_, changed) = toggle_feature(list, fref, false);
        assert!(!changed);
    }
}
