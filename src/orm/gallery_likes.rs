use sea_orm::entity::prelude::*;

/// One row per (item, user); the likes set behind an item's like_count.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "gallery_likes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub item_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::gallery_items::Entity",
        from = "Column::ItemId",
        to = "super::gallery_items::Column::Id"
    )]
    GalleryItems,
}

impl Related<super::gallery_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GalleryItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
