use crate::{
    db::DbPool,
    entities::{
        bom_line::{self, Entity as BomLines},
        product::Entity as Products,
    },
    errors::ServiceError,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Availability of one component toward building the parent set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentAvailability {
    pub component_code: String,
    pub quantity_per_set: i64,
    pub current_stock: i64,
    pub possible_sets: i64,
    /// True when this component is (one of) the binding constraints.
    pub limiting: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildableSets {
    pub parent_code: String,
    pub possible_sets: i64,
    pub components: Vec<ComponentAvailability>,
}

/// Resolves how many units of a set product its component stock can build.
///
/// One level only: a set whose component is itself a set is not exploded
/// recursively. Component stock comes from the product cache the movement
/// write path maintains.
#[derive(Clone)]
pub struct BomService {
    db_pool: Arc<DbPool>,
}

impl BomService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Registers a component requirement for a set product.
    pub async fn add_component(
        &self,
        parent_code: &str,
        component_code: &str,
        quantity_per_set: i64,
    ) -> Result<bom_line::Model, ServiceError> {
        if quantity_per_set <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "quantity_per_set must be positive, got {}",
                quantity_per_set
            )));
        }
        if parent_code == component_code {
            return Err(ServiceError::ValidationError(format!(
                "Product {} cannot be a component of itself",
                parent_code
            )));
        }

        let db = self.db_pool.as_ref();

        for code in [parent_code, component_code] {
            Products::find_by_id(code.to_string())
                .one(db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::not_found(format!("Product {}", code)))?;
        }

        let existing = BomLines::find()
            .filter(bom_line::Column::ParentCode.eq(parent_code))
            .filter(bom_line::Column::ComponentCode.eq(component_code))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "BOM line ({}, {}) already exists",
                parent_code, component_code
            )));
        }

        let line = bom_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            parent_code: Set(parent_code.to_string()),
            component_code: Set(component_code.to_string()),
            quantity_per_set: Set(quantity_per_set),
            ..Default::default()
        };
        line.insert(db).await.map_err(ServiceError::db_error)
    }

    pub async fn get_components(
        &self,
        parent_code: &str,
    ) -> Result<Vec<bom_line::Model>, ServiceError> {
        BomLines::find()
            .filter(bom_line::Column::ParentCode.eq(parent_code))
            .order_by_asc(bom_line::Column::ComponentCode)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Computes the maximum buildable quantity of a set product:
    /// `min(floor(component_stock / quantity_per_set))` across components,
    /// zero when the set has no components.
    pub async fn resolve_buildable_sets(
        &self,
        parent_code: &str,
    ) -> Result<BuildableSets, ServiceError> {
        let db = self.db_pool.as_ref();

        Products::find_by_id(parent_code.to_string())
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found(format!("Product {}", parent_code)))?;

        let lines = self.get_components(parent_code).await?;

        let mut components = Vec::with_capacity(lines.len());
        for line in &lines {
            let component = Products::find_by_id(line.component_code.clone())
                .one(db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::not_found(format!("Product {}", line.component_code))
                })?;

            let stock = component.current_stock.max(0);
            components.push(ComponentAvailability {
                component_code: line.component_code.clone(),
                quantity_per_set: line.quantity_per_set,
                current_stock: component.current_stock,
                possible_sets: stock / line.quantity_per_set,
                limiting: false,
            });
        }

        let possible_sets = components
            .iter()
            .map(|c| c.possible_sets)
            .min()
            .unwrap_or(0);
        for component in &mut components {
            component.limiting = component.possible_sets == possible_sets;
        }

        Ok(BuildableSets {
            parent_code: parent_code.to_string(),
            possible_sets,
            components,
        })
    }
}
