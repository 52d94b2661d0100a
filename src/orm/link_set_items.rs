use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "link_set_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub link_set_id: i64,
    pub link_id: i64,
    pub user_id: String,
    /// Generated discussion thread, as a reference path.
    pub thread_ref: Option<String>,
    pub created_at: DateTime,
    pub deleted_at: Option<DateTime>,
    pub deleted_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::link_sets::Entity",
        from = "Column::LinkSetId",
        to = "super::link_sets::Column::Id"
    )]
    LinkSets,
    #[sea_orm(
        belongs_to = "super::links::Entity",
        from = "Column::LinkId",
        to = "super::links::Column::Id"
    )]
    Links,
}

impl Related<super::link_sets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LinkSets.def()
    }
}

impl Related<super::links::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Links.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
