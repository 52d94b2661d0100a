use sea_orm::entity::prelude::*;

/// Shared link records, deduplicated across all link sets by normalized
/// URL. Carries whatever page metadata the fetch pipeline supplied.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    /// How many items reference this link.
    pub save_count: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::link_set_items::Entity")]
    LinkSetItems,
}

impl Related<super::link_set_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LinkSetItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
