use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub owner_username: String,

    /// Capital value, e.g. "paris". Always differs from `destination`.
    pub origin: String,

    pub destination: String,

    /// RFC3339. Posts whose departure has passed no longer accept changes.
    pub departure_at: String,

    /// Declared seat count, 1..=100.
    pub capacity: i32,

    /// Denormalized seat counter. The membership row count is the source
    /// of truth; this is reconciled inside every capacity transaction.
    pub engaged_count: i32,

    /// Persisted lifecycle state: "open" or "closed". Full/departed are
    /// derived at read time.
    pub status: String,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerUsername",
        to = "super::users::Column::Username",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_many = "super::post_members::Entity")]
    PostMembers,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::post_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostMembers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
