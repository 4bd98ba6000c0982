//! Category reference data

use crate::error::AppError;
use evently_core::{Category, CategoryRepository};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub name: String,
}

impl CategoryRequest {
    fn name(&self) -> Result<&str, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("name must not be blank".to_string()));
        }
        Ok(name)
    }
}

pub struct CategoryService {
    categories: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(categories: Arc<dyn CategoryRepository>) -> Self {
        Self { categories }
    }

    pub async fn list(&self) -> Result<Vec<Category>, AppError> {
        Ok(self.categories.list_categories().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Category, AppError> {
        self.categories
            .get_category(id)
            .await?
            .ok_or_else(|| AppError::not_found("Category"))
    }

    pub async fn create(&self, req: CategoryRequest) -> Result<Category, AppError> {
        Ok(self.categories.create_category(req.name()?).await?)
    }

    pub async fn update(&self, id: Uuid, req: CategoryRequest) -> Result<Category, AppError> {
        Ok(self.categories.update_category(id, req.name()?).await?)
    }

    /// Fails with a conflict while events still reference the category
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        Ok(self.categories.delete_category(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evently_core::MemoryStore;

    fn request(name: &str) -> CategoryRequest {
        CategoryRequest {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_crud() {
        let service = CategoryService::new(Arc::new(MemoryStore::new()));

        let created = service.create(request("  Art ")).await.unwrap();
        assert_eq!(created.name, "Art");
        assert!(matches!(
            service.create(request("Art")).await,
            Err(AppError::AlreadyExists(_))
        ));

        let renamed = service.update(created.id, request("Design")).await.unwrap();
        assert_eq!(renamed.name, "Design");
        assert_eq!(service.list().await.unwrap().len(), 1);

        service.delete(created.id).await.unwrap();
        assert!(matches!(
            service.get(created.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let service = CategoryService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            service.create(request("   ")).await,
            Err(AppError::Validation(_))
        ));
    }
}
