use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{items, prelude::*};

pub struct ItemRepository {
    conn: DatabaseConnection,
}

impl ItemRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        owner_id: i32,
        name: &str,
        description: Option<&str>,
        price: f64,
    ) -> Result<items::Model> {
        let active = items::ActiveModel {
            name: Set(name.to_string()),
            description: Set(description.map(ToString::to_string)),
            price: Set(price),
            owner_id: Set(owner_id),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert item")
    }

    pub async fn list_for_owner(&self, owner_id: i32) -> Result<Vec<items::Model>> {
        Items::find()
            .filter(items::Column::OwnerId.eq(owner_id))
            .order_by_asc(items::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list items for owner")
    }
}
