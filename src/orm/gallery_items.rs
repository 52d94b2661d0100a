use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "gallery_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub gallery_id: i64,
    pub user_id: String,
    /// Opaque stored-file reference; the upload pipeline owns the bytes.
    pub file_ref: String,
    pub filename: String,
    pub description: Option<String>,
    /// Derived from the likes set.
    pub like_count: i32,
    pub created_at: DateTime,
    pub deleted_at: Option<DateTime>,
    pub deleted_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::galleries::Entity",
        from = "Column::GalleryId",
        to = "super::galleries::Column::Id"
    )]
    Galleries,
    #[sea_orm(has_many = "super::gallery_likes::Entity")]
    GalleryLikes,
}

impl Related<super::galleries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Galleries.def()
    }
}

impl Related<super::gallery_likes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GalleryLikes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
