use crate::gffft::DEFAULT_SLUG;
use crate::orm::{gfffts, notebooks};
use actix_web::{error, Error};
use chrono::prelude::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection};

pub async fn get_or_create_default(
    db: &DatabaseConnection,
    gffft: &gfffts::Model,
) -> Result<notebooks::Model, Error> {
    if let Some(notebook) = notebooks::Entity::find()
        .filter(
            Condition::all()
                .add(notebooks::Column::GffftId.eq(gffft.id))
                .add(notebooks::Column::Slug.eq(DEFAULT_SLUG)),
        )
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
    {
        return Ok(notebook);
    }
    let now = Utc::now().naive_utc();
    let res = notebooks::Entity::insert(notebooks::ActiveModel {
        gffft_id: Set(gffft.id),
        slug: Set(DEFAULT_SLUG.to_owned()),
        created_at: Set(now),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;
    Ok(notebooks::Model {
        id: res.last_insert_id,
        gffft_id: gffft.id,
        slug: DEFAULT_SLUG.to_owned(),
        created_at: now,
    })
}
