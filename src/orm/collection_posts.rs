use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "collection_posts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub collection_id: i64,
    /// Set for replies; top-level posts have no parent.
    pub parent_id: Option<i64>,
    /// media | thread | link | page
    pub kind: String,
    pub user_id: String,
    pub body: Option<String>,
    pub link_id: Option<i64>,
    pub file_ref: Option<String>,
    pub reply_count: i32,
    pub created_at: DateTime,
    pub deleted_at: Option<DateTime>,
    pub deleted_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collections::Entity",
        from = "Column::CollectionId",
        to = "super::collections::Column::Id"
    )]
    Collections,
    #[sea_orm(has_many = "super::collection_reactions::Entity")]
    CollectionReactions,
}

impl Related<super::collections::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Collections.def()
    }
}

impl Related<super::collection_reactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectionReactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
