//! Menu repository: categories and items, each kept in an explicit
//! display order.
//!
//! Positions within one scope (all categories, or the items of one
//! category) are kept dense `1..N`. Every mutation queues a `menu` webhook
//! in the same transaction and publishes a change event after commit.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::DbState;
use crate::error::{KitchenError, KitchenResult};
use crate::events::{Change, ChangeEvent, ChangeFeed, ChangeKind};
use crate::models::{category_from_row, MenuCategory, MenuItem, MenuItemRow, MENU_ITEM_COLUMNS};
use crate::outbox::{self, Topic};
use crate::settings;
use crate::webhook;

/// Image shown for items saved without one.
pub const DEFAULT_ITEM_IMAGE: &str = "/images/dish-placeholder.png";

const ENTITY_ITEM: &str = "menu_item";
const ENTITY_CATEGORY: &str = "menu_category";

/// The ordered collection a reorder applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ReorderScope {
    Categories,
    Items {
        #[serde(alias = "categoryId")]
        category_id: String,
    },
}

impl ReorderScope {
    fn entity(&self) -> &'static str {
        match self {
            ReorderScope::Categories => ENTITY_CATEGORY,
            ReorderScope::Items { .. } => ENTITY_ITEM,
        }
    }
}

/// Item fields as submitted by the editor. `id` is absent for new items.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, alias = "category_id", alias = "category")]
    pub category_id: String,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default, alias = "is_veg")]
    pub is_veg: bool,
}

fn default_available() -> bool {
    true
}

impl MenuItemDraft {
    fn validate(&self) -> KitchenResult<()> {
        if self.name.trim().is_empty()
            || self.description.trim().is_empty()
            || self.category_id.trim().is_empty()
        {
            return Err(KitchenError::validation("Please fill in all required fields"));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(KitchenError::validation("Price must be greater than zero"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row access
// ---------------------------------------------------------------------------

const ITEM_COLUMNS_JOINED: &str = "i.id, i.name, i.description, i.price, i.image, \
     i.category_id, i.available, i.is_veg, i.position";

fn fetch_category(conn: &Connection, id: &str) -> KitchenResult<MenuCategory> {
    conn.query_row(
        "SELECT id, name, position FROM menu_categories WHERE id = ?1",
        params![id],
        category_from_row,
    )
    .optional()?
    .ok_or_else(|| KitchenError::not_found("menu category", id))
    .and_then(MenuCategory::try_from)
}

fn fetch_item(conn: &Connection, id: &str) -> KitchenResult<MenuItem> {
    conn.query_row(
        &format!("SELECT {MENU_ITEM_COLUMNS} FROM menu_items WHERE id = ?1"),
        params![id],
        MenuItemRow::from_row,
    )
    .optional()?
    .ok_or_else(|| KitchenError::not_found("menu item", id))
    .and_then(MenuItem::try_from)
}

fn scope_ids(conn: &Connection, scope: &ReorderScope) -> KitchenResult<Vec<String>> {
    let ids = match scope {
        ReorderScope::Categories => {
            let mut stmt =
                conn.prepare("SELECT id FROM menu_categories ORDER BY position, rowid")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            ids
        }
        ReorderScope::Items { category_id } => {
            let mut stmt = conn.prepare(
                "SELECT id FROM menu_items WHERE category_id = ?1 ORDER BY position, rowid",
            )?;
            let ids = stmt
                .query_map(params![category_id], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            ids
        }
    };
    Ok(ids)
}

fn write_positions(conn: &Connection, scope: &ReorderScope, ids: &[String]) -> KitchenResult<()> {
    let sql = match scope {
        ReorderScope::Categories => "UPDATE menu_categories SET position = ?1 WHERE id = ?2",
        ReorderScope::Items { .. } => "UPDATE menu_items SET position = ?1 WHERE id = ?2",
    };
    let mut stmt = conn.prepare(sql)?;
    for (idx, id) in ids.iter().enumerate() {
        stmt.execute(params![idx as i64 + 1, id])?;
    }
    Ok(())
}

/// Close the gaps left by a delete or a move.
fn compact(conn: &Connection, scope: &ReorderScope) -> KitchenResult<()> {
    let ids = scope_ids(conn, scope)?;
    write_positions(conn, scope, &ids)
}

fn next_position(conn: &Connection, scope: &ReorderScope) -> KitchenResult<i64> {
    let max: i64 = match scope {
        ReorderScope::Categories => conn.query_row(
            "SELECT COALESCE(MAX(position), 0) FROM menu_categories",
            [],
            |row| row.get(0),
        )?,
        ReorderScope::Items { category_id } => conn.query_row(
            "SELECT COALESCE(MAX(position), 0) FROM menu_items WHERE category_id = ?1",
            params![category_id],
            |row| row.get(0),
        )?,
    };
    Ok(max + 1)
}

fn enqueue_menu_event(
    conn: &Connection,
    entity_id: &str,
    action: &str,
    entity: &str,
    item: Value,
) -> KitchenResult<()> {
    let kitchen_name = settings::kitchen_name(conn)?;
    let payload = webhook::menu_payload(action, entity, item, &kitchen_name);
    outbox::enqueue(conn, Topic::Menu, entity_id, action, &payload)?;
    Ok(())
}

fn ensure_permutation(current: &[String], requested: &[String]) -> KitchenResult<()> {
    let wanted: HashSet<&str> = current.iter().map(String::as_str).collect();
    let given: HashSet<&str> = requested.iter().map(String::as_str).collect();
    if requested.len() != current.len() || given.len() != requested.len() || wanted != given {
        return Err(KitchenError::validation(
            "Reorder must list every entry of the scope exactly once",
        ));
    }
    Ok(())
}

fn clean_name(name: &str, what: &str) -> KitchenResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(KitchenError::validation(format!("{what} name is required")));
    }
    Ok(name.to_string())
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

pub struct MenuRepository {
    db: Arc<DbState>,
    feed: ChangeFeed,
}

impl MenuRepository {
    pub fn new(db: Arc<DbState>, feed: ChangeFeed) -> Self {
        Self { db, feed }
    }

    pub fn list_categories(&self) -> KitchenResult<Vec<MenuCategory>> {
        let rows = self.db.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, position FROM menu_categories ORDER BY position, rowid",
            )?;
            let rows = stmt
                .query_map([], category_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(MenuCategory::try_from).collect()
    }

    /// Items of one category, or the whole menu in category order.
    pub fn list_items(&self, category_id: Option<&str>) -> KitchenResult<Vec<MenuItem>> {
        let rows = self.db.read(|conn| {
            let rows = match category_id {
                Some(category_id) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {MENU_ITEM_COLUMNS} FROM menu_items
                         WHERE category_id = ?1 ORDER BY position, rowid"
                    ))?;
                    let rows = stmt
                        .query_map(params![category_id], MenuItemRow::from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {ITEM_COLUMNS_JOINED} FROM menu_items i
                         JOIN menu_categories c ON c.id = i.category_id
                         ORDER BY c.position, i.position, i.rowid"
                    ))?;
                    let rows = stmt
                        .query_map([], MenuItemRow::from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(rows)
        })?;
        rows.into_iter().map(MenuItem::try_from).collect()
    }

    pub fn get_item(&self, id: &str) -> KitchenResult<MenuItem> {
        self.db.read(|conn| fetch_item(conn, id))
    }

    pub fn create_category(&self, name: &str) -> KitchenResult<MenuCategory> {
        let name = clean_name(name, "Category")?;
        let category = self.db.write(|tx| {
            let category = MenuCategory {
                id: Uuid::new_v4().to_string(),
                name,
                position: next_position(tx, &ReorderScope::Categories)?,
            };
            tx.execute(
                "INSERT INTO menu_categories (id, name, position) VALUES (?1, ?2, ?3)",
                params![category.id, category.name, category.position],
            )?;
            enqueue_menu_event(
                tx,
                &category.id,
                "create",
                ENTITY_CATEGORY,
                serde_json::to_value(&category)?,
            )?;
            Ok(category)
        })?;
        info!(category_id = %category.id, name = %category.name, "Menu category created");
        self.feed.publish(ChangeEvent::new(
            ChangeKind::Insert,
            Change::Category(category.clone()),
        ));
        Ok(category)
    }

    pub fn rename_category(&self, id: &str, name: &str) -> KitchenResult<MenuCategory> {
        let name = clean_name(name, "Category")?;
        let category = self.db.write(|tx| {
            let current = fetch_category(tx, id)?;
            tx.execute(
                "UPDATE menu_categories SET name = ?1 WHERE id = ?2",
                params![name, id],
            )?;
            let category = MenuCategory { name, ..current };
            enqueue_menu_event(
                tx,
                id,
                "update",
                ENTITY_CATEGORY,
                serde_json::to_value(&category)?,
            )?;
            Ok(category)
        })?;
        info!(category_id = %id, name = %category.name, "Menu category renamed");
        self.feed.publish(ChangeEvent::new(
            ChangeKind::Update,
            Change::Category(category.clone()),
        ));
        Ok(category)
    }

    /// Remove an empty category. Categories that still hold items are
    /// rejected with [`KitchenError::CategoryNotEmpty`].
    pub fn delete_category(&self, id: &str) -> KitchenResult<()> {
        self.db.write(|tx| {
            let category = fetch_category(tx, id)?;
            let items: i64 = tx.query_row(
                "SELECT COUNT(*) FROM menu_items WHERE category_id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            if items > 0 {
                return Err(KitchenError::CategoryNotEmpty {
                    id: id.to_string(),
                    items,
                });
            }
            tx.execute("DELETE FROM menu_categories WHERE id = ?1", params![id])?;
            compact(tx, &ReorderScope::Categories)?;
            enqueue_menu_event(
                tx,
                id,
                "delete",
                ENTITY_CATEGORY,
                json!({ "id": category.id, "name": category.name }),
            )
        })?;
        info!(category_id = %id, "Menu category deleted");
        self.feed.publish(ChangeEvent::new(
            ChangeKind::Delete,
            Change::CategoryRemoved { id: id.to_string() },
        ));
        Ok(())
    }

    /// Create or update an item. New items, and items moved to another
    /// category, are appended at the end of their category.
    pub fn upsert_item(&self, draft: MenuItemDraft) -> KitchenResult<MenuItem> {
        draft.validate()?;
        let category_id = draft.category_id.trim().to_string();
        let existing_id = draft
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let (item, kind) = self.db.write(|tx| {
            fetch_category(tx, &category_id)?;
            let target_scope = ReorderScope::Items {
                category_id: category_id.clone(),
            };
            let existing = match &existing_id {
                Some(id) => Some(fetch_item(tx, id)?),
                None => None,
            };
            let position = match &existing {
                Some(current) if current.category_id == category_id => current.position,
                _ => next_position(tx, &target_scope)?,
            };
            let image = draft
                .image
                .as_deref()
                .map(str::trim)
                .filter(|i| !i.is_empty())
                .unwrap_or(DEFAULT_ITEM_IMAGE)
                .to_string();
            let item = MenuItem {
                id: existing_id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                name: draft.name.trim().to_string(),
                description: draft.description.trim().to_string(),
                price: draft.price,
                image,
                category_id: category_id.clone(),
                available: draft.available,
                is_veg: draft.is_veg,
                position,
            };

            let kind = match &existing {
                Some(current) => {
                    tx.execute(
                        "UPDATE menu_items
                         SET name = ?1, description = ?2, price = ?3, image = ?4,
                             category_id = ?5, available = ?6, is_veg = ?7, position = ?8
                         WHERE id = ?9",
                        params![
                            item.name,
                            item.description,
                            item.price,
                            item.image,
                            item.category_id,
                            item.available,
                            item.is_veg,
                            item.position,
                            item.id
                        ],
                    )?;
                    if current.category_id != item.category_id {
                        compact(
                            tx,
                            &ReorderScope::Items {
                                category_id: current.category_id.clone(),
                            },
                        )?;
                    }
                    ChangeKind::Update
                }
                None => {
                    tx.execute(
                        "INSERT INTO menu_items (
                            id, name, description, price, image, category_id,
                            available, is_veg, position
                         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        params![
                            item.id,
                            item.name,
                            item.description,
                            item.price,
                            item.image,
                            item.category_id,
                            item.available,
                            item.is_veg,
                            item.position
                        ],
                    )?;
                    ChangeKind::Insert
                }
            };
            let action = if kind == ChangeKind::Insert { "create" } else { "update" };
            enqueue_menu_event(tx, &item.id, action, ENTITY_ITEM, serde_json::to_value(&item)?)?;
            Ok((item, kind))
        })?;

        info!(item_id = %item.id, name = %item.name, category_id = %item.category_id, kind = ?kind, "Menu item saved");
        self.feed
            .publish(ChangeEvent::new(kind, Change::MenuItem(item.clone())));
        Ok(item)
    }

    pub fn delete_item(&self, id: &str) -> KitchenResult<()> {
        self.db.write(|tx| {
            let item = fetch_item(tx, id)?;
            tx.execute("DELETE FROM menu_items WHERE id = ?1", params![id])?;
            compact(
                tx,
                &ReorderScope::Items {
                    category_id: item.category_id.clone(),
                },
            )?;
            enqueue_menu_event(
                tx,
                id,
                "delete",
                ENTITY_ITEM,
                json!({ "item_id": item.id, "item_name": item.name }),
            )
        })?;
        info!(item_id = %id, "Menu item deleted");
        self.feed.publish(ChangeEvent::new(
            ChangeKind::Delete,
            Change::MenuItemRemoved { id: id.to_string() },
        ));
        Ok(())
    }

    /// Flip the item's availability and return the new record.
    pub fn toggle_availability(&self, id: &str) -> KitchenResult<MenuItem> {
        let item = self.db.write(|tx| {
            let current = fetch_item(tx, id)?;
            let available = !current.available;
            tx.execute(
                "UPDATE menu_items SET available = ?1 WHERE id = ?2",
                params![available, id],
            )?;
            let item = MenuItem {
                available,
                ..current
            };
            enqueue_menu_event(
                tx,
                id,
                "toggle_availability",
                ENTITY_ITEM,
                json!({
                    "item_id": item.id,
                    "item_name": item.name,
                    "available": item.available,
                }),
            )?;
            Ok(item)
        })?;
        info!(item_id = %id, available = item.available, "Menu item availability toggled");
        self.feed.publish(ChangeEvent::new(
            ChangeKind::Update,
            Change::MenuItem(item.clone()),
        ));
        Ok(item)
    }

    /// Persist a new display order for `scope`. `ordered_ids` must list every
    /// entry of the scope exactly once; positions become `index + 1`. The
    /// whole batch commits or none of it does.
    pub fn reorder(&self, scope: &ReorderScope, ordered_ids: &[String]) -> KitchenResult<()> {
        self.db.write(|tx| {
            if let ReorderScope::Items { category_id } = scope {
                fetch_category(tx, category_id)?;
            }
            let current = scope_ids(tx, scope)?;
            ensure_permutation(&current, ordered_ids)?;
            if current == ordered_ids {
                debug!(scope = ?scope, "Reorder is a no-op");
            }
            write_positions(tx, scope, ordered_ids)?;
            let entity_id = match scope {
                ReorderScope::Categories => "categories".to_string(),
                ReorderScope::Items { category_id } => category_id.clone(),
            };
            enqueue_menu_event(
                tx,
                &entity_id,
                "reorder",
                scope.entity(),
                json!({ "scope": scope, "ids": ordered_ids }),
            )
        })?;
        info!(scope = ?scope, count = ordered_ids.len(), "Menu reordered");
        self.feed.publish(ChangeEvent::new(
            ChangeKind::Update,
            Change::Reordered {
                scope: scope.clone(),
                ids: ordered_ids.to_vec(),
            },
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn repo() -> (Arc<DbState>, MenuRepository) {
        let db = Arc::new(db::open_in_memory().unwrap());
        (db.clone(), MenuRepository::new(db, ChangeFeed::default()))
    }

    fn draft(name: &str, category_id: &str) -> MenuItemDraft {
        MenuItemDraft {
            id: None,
            name: name.into(),
            description: format!("House {name}"),
            price: 180.0,
            image: None,
            category_id: category_id.into(),
            available: true,
            is_veg: true,
        }
    }

    fn names(items: &[MenuItem]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn reorder_categories_writes_dense_positions() {
        let (_db, repo) = repo();
        let a = repo.create_category("Starters").unwrap();
        let b = repo.create_category("Mains").unwrap();
        let c = repo.create_category("Desserts").unwrap();
        assert_eq!((a.position, b.position, c.position), (1, 2, 3));

        repo.reorder(
            &ReorderScope::Categories,
            &[c.id.clone(), a.id.clone(), b.id.clone()],
        )
        .unwrap();
        let listed = repo.list_categories().unwrap();
        let order: Vec<_> = listed.iter().map(|c| (c.name.as_str(), c.position)).collect();
        assert_eq!(order, vec![("Desserts", 1), ("Starters", 2), ("Mains", 3)]);
    }

    #[test]
    fn reorder_rejects_partial_lists_and_leaves_order_untouched() {
        let (_db, repo) = repo();
        let cat = repo.create_category("Mains").unwrap();
        let x = repo.upsert_item(draft("Dal Makhani", &cat.id)).unwrap();
        let y = repo.upsert_item(draft("Jeera Rice", &cat.id)).unwrap();
        let scope = ReorderScope::Items {
            category_id: cat.id.clone(),
        };

        for bad in [
            vec![x.id.clone()],
            vec![x.id.clone(), x.id.clone()],
            vec![x.id.clone(), "stranger".to_string()],
        ] {
            assert!(matches!(
                repo.reorder(&scope, &bad),
                Err(KitchenError::Validation(_))
            ));
        }
        assert_eq!(
            names(&repo.list_items(Some(&cat.id)).unwrap()),
            vec!["Dal Makhani", "Jeera Rice"]
        );

        repo.reorder(&scope, &[y.id.clone(), x.id.clone()]).unwrap();
        assert_eq!(
            names(&repo.list_items(Some(&cat.id)).unwrap()),
            vec!["Jeera Rice", "Dal Makhani"]
        );
    }

    #[test]
    fn toggle_twice_restores_availability() {
        let (_db, repo) = repo();
        let cat = repo.create_category("Breads").unwrap();
        let item = repo.upsert_item(draft("Garlic Naan", &cat.id)).unwrap();
        assert!(item.available);
        assert!(!repo.toggle_availability(&item.id).unwrap().available);
        assert!(repo.toggle_availability(&item.id).unwrap().available);
        assert!(repo.get_item(&item.id).unwrap().available);
    }

    #[test]
    fn delete_category_with_items_is_rejected() {
        let (_db, repo) = repo();
        let cat = repo.create_category("Curries").unwrap();
        let item = repo.upsert_item(draft("Kadai Paneer", &cat.id)).unwrap();
        let err = repo.delete_category(&cat.id).unwrap_err();
        assert!(matches!(err, KitchenError::CategoryNotEmpty { items: 1, .. }));
        assert_eq!(repo.list_items(Some(&cat.id)).unwrap().len(), 1);

        repo.delete_item(&item.id).unwrap();
        repo.delete_category(&cat.id).unwrap();
        assert!(repo.list_categories().unwrap().is_empty());
    }

    #[test]
    fn upsert_appends_and_moving_compacts_old_category() {
        let (_db, repo) = repo();
        let starters = repo.create_category("Starters").unwrap();
        let mains = repo.create_category("Mains").unwrap();
        let samosa = repo.upsert_item(draft("Samosa", &starters.id)).unwrap();
        let tikka = repo.upsert_item(draft("Paneer Tikka", &starters.id)).unwrap();
        let curry = repo.upsert_item(draft("Chole", &mains.id)).unwrap();
        assert_eq!((samosa.position, tikka.position, curry.position), (1, 2, 1));
        assert_eq!(samosa.image, DEFAULT_ITEM_IMAGE);

        let mut moved = draft("Samosa Chaat", &mains.id);
        moved.id = Some(samosa.id.clone());
        moved.price = 90.0;
        let moved = repo.upsert_item(moved).unwrap();
        assert_eq!(moved.position, 2);
        assert_eq!(repo.get_item(&tikka.id).unwrap().position, 1);

        let all = repo.list_items(None).unwrap();
        assert_eq!(names(&all), vec!["Paneer Tikka", "Chole", "Samosa Chaat"]);
    }

    #[test]
    fn upsert_validates_required_fields() {
        let (_db, repo) = repo();
        let cat = repo.create_category("Drinks").unwrap();
        let mut missing = draft("Lassi", &cat.id);
        missing.description = " ".into();
        assert!(matches!(
            repo.upsert_item(missing),
            Err(KitchenError::Validation(_))
        ));
        let mut free = draft("Water", &cat.id);
        free.price = 0.0;
        assert!(repo.upsert_item(free).is_err());
        assert!(matches!(
            repo.upsert_item(draft("Chai", "no-such-category")),
            Err(KitchenError::NotFound { .. })
        ));
        assert!(repo.create_category("   ").is_err());
    }

    #[test]
    fn mutations_queue_menu_webhooks() {
        let (db, repo) = repo();
        let cat = repo.create_category("Sweets").unwrap();
        let item = repo.upsert_item(draft("Gulab Jamun", &cat.id)).unwrap();
        repo.toggle_availability(&item.id).unwrap();
        repo.delete_item(&item.id).unwrap();

        let rows: Vec<(String, String, String)> = db
            .read(|conn| {
                let mut stmt =
                    conn.prepare("SELECT topic, action, payload FROM outbox ORDER BY id")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .unwrap();
        let actions: Vec<_> = rows.iter().map(|(_, a, _)| a.as_str()).collect();
        assert_eq!(actions, vec!["create", "create", "toggle_availability", "delete"]);
        assert!(rows.iter().all(|(topic, _, _)| topic == "menu"));

        let toggle: Value = serde_json::from_str(&rows[2].2).unwrap();
        assert_eq!(toggle["entity"], "menu_item");
        assert_eq!(toggle["item"]["item_name"], "Gulab Jamun");
        assert_eq!(toggle["item"]["available"], false);
    }

    #[test]
    fn malformed_item_row_fails_closed() {
        let (db, repo) = repo();
        let cat = repo.create_category("Snacks").unwrap();
        let item = repo.upsert_item(draft("Vada Pav", &cat.id)).unwrap();
        db.read(|conn| {
            conn.execute(
                "UPDATE menu_items SET available = 7 WHERE id = ?1",
                params![item.id],
            )?;
            Ok(())
        })
        .unwrap();
        assert!(matches!(
            repo.list_items(Some(&cat.id)),
            Err(KitchenError::Deserialization { .. })
        ));
    }

    #[test]
    fn scope_deserializes_from_tagged_json() {
        let scope: ReorderScope =
            serde_json::from_value(json!({"scope": "items", "categoryId": "cat-1"})).unwrap();
        assert_eq!(
            scope,
            ReorderScope::Items {
                category_id: "cat-1".into()
            }
        );
        let scope: ReorderScope = serde_json::from_value(json!({"scope": "categories"})).unwrap();
        assert_eq!(scope, ReorderScope::Categories);
    }
}
