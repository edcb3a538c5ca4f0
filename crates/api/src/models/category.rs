//! Product categories.

use chrono::{DateTime, Utc};
use serde::Serialize;

use ecom_core::CategoryId;

/// A catalog category. Categories nest through `parent_id`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal category reference embedded in other payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

/// A category with its resolved parent and direct children.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub parent: Option<CategoryRef>,
    pub children: Vec<CategoryRef>,
}

impl CategoryNode {
    /// Resolve parents and children within a flat category list.
    ///
    /// Parents outside `categories` (for example inactive ones filtered out
    /// by the caller) are left unresolved.
    #[must_use]
    pub fn build_tree(categories: Vec<Category>) -> Vec<Self> {
        let refs: Vec<(CategoryRef, Option<CategoryId>)> = categories
            .iter()
            .map(|c| {
                (
                    CategoryRef {
                        id: c.id,
                        name: c.name.clone(),
                    },
                    c.parent_id,
                )
            })
            .collect();

        categories
            .into_iter()
            .map(|category| {
                let parent = category.parent_id.and_then(|pid| {
                    refs.iter()
                        .find(|(r, _)| r.id == pid)
                        .map(|(r, _)| r.clone())
                });
                let children = refs
                    .iter()
                    .filter(|(_, parent_id)| *parent_id == Some(category.id))
                    .map(|(r, _)| r.clone())
                    .collect();
                Self {
                    category,
                    parent,
                    children,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i32, name: &str, parent: Option<i32>) -> Category {
        Category {
            id: CategoryId::new(id),
            name: name.to_string(),
            description: None,
            image_url: None,
            parent_id: parent.map(CategoryId::new),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_tree_links_parents_and_children() {
        let nodes = CategoryNode::build_tree(vec![
            category(1, "Electronics", None),
            category(2, "Phones", Some(1)),
            category(3, "Laptops", Some(1)),
            category(4, "Books", None),
        ]);

        let electronics = nodes.iter().find(|n| n.category.id.as_i32() == 1);
        let electronics = electronics.map(|n| n.children.iter().map(|c| c.name.as_str()).collect::<Vec<_>>());
        assert_eq!(electronics, Some(vec!["Phones", "Laptops"]));

        let phones = nodes.iter().find(|n| n.category.id.as_i32() == 2);
        assert_eq!(
            phones.and_then(|n| n.parent.clone()),
            Some(CategoryRef {
                id: CategoryId::new(1),
                name: "Electronics".to_string()
            })
        );
    }

    #[test]
    fn test_build_tree_leaves_missing_parent_unresolved() {
        let nodes = CategoryNode::build_tree(vec![category(5, "Orphan", Some(99))]);
        assert_eq!(nodes.len(), 1);
        assert!(nodes.iter().all(|n| n.parent.is_none() && n.children.is_empty()));
    }
}
