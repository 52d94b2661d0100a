use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "galleries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub gffft_id: i64,
    pub slug: String,
    pub item_count: i32,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::gfffts::Entity",
        from = "Column::GffftId",
        to = "super::gfffts::Column::Id"
    )]
    Gfffts,
    #[sea_orm(has_many = "super::gallery_items::Entity")]
    GalleryItems,
}

impl Related<super::gfffts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Gfffts.def()
    }
}

impl Related<super::gallery_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GalleryItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
