use serde::Deserialize;
use serde_json::{json, Value};

use super::{normalize_payload, parse_payload, required, Kitchen};
use crate::menu::{MenuItemDraft, ReorderScope};
use crate::notify::{self, Notification};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CategoryFilterPayload {
    #[serde(default, alias = "category_id", alias = "category")]
    category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryNamePayload {
    #[serde(default, alias = "category_id", alias = "id")]
    category_id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryIdPayload {
    #[serde(alias = "category_id", alias = "id")]
    category_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemIdPayload {
    #[serde(alias = "item_id", alias = "id")]
    item_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderPayload {
    #[serde(flatten)]
    scope: ReorderScope,
    #[serde(alias = "ordered_ids", alias = "orderedIds")]
    ids: Vec<String>,
}

fn parse_category_filter(arg0: Option<Value>) -> Result<Option<String>, String> {
    let arg0 = arg0.filter(|v| !v.is_null());
    let parsed: CategoryFilterPayload =
        parse_payload(normalize_payload(arg0, "categoryId"), "category")?;
    Ok(parsed
        .category_id
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

fn parse_item_id(arg0: Option<Value>) -> Result<String, String> {
    let parsed: ItemIdPayload = parse_payload(normalize_payload(arg0, "itemId"), "menu item")?;
    required(parsed.item_id, "itemId")
}

pub fn menu_get_categories(kitchen: &Kitchen) -> Value {
    match kitchen.menu.list_categories() {
        Ok(categories) => notify::ok(categories, Notification::success("Menu loaded", "")),
        Err(e) => notify::failure("Failed to load categories", &e),
    }
}

pub fn menu_get_items(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let category_id = match parse_category_filter(arg0) {
        Ok(id) => id,
        Err(e) => return notify::failure_message("Error", e),
    };
    match kitchen.menu.list_items(category_id.as_deref()) {
        Ok(items) => notify::ok(items, Notification::success("Menu loaded", "")),
        Err(e) => notify::failure("Failed to load menu items", &e),
    }
}

pub fn menu_create_category(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let parsed: CategoryNamePayload =
        match parse_payload(normalize_payload(arg0, "name"), "category") {
            Ok(p) => p,
            Err(e) => return notify::failure_message("Error", e),
        };
    match kitchen.menu.create_category(&parsed.name) {
        Ok(category) => notify::ok(
            category,
            Notification::success("Success", "Category added successfully"),
        ),
        Err(e) => notify::failure("Failed to add category", &e),
    }
}

pub fn menu_rename_category(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let parsed: CategoryNamePayload = match parse_payload(arg0.unwrap_or(Value::Null), "category")
    {
        Ok(p) => p,
        Err(e) => return notify::failure_message("Error", e),
    };
    let Some(category_id) = parsed.category_id.filter(|id| !id.trim().is_empty()) else {
        return notify::failure_message("Error", "Missing categoryId");
    };
    match kitchen.menu.rename_category(category_id.trim(), &parsed.name) {
        Ok(category) => notify::ok(
            category,
            Notification::success("Success", "Category updated successfully"),
        ),
        Err(e) => notify::failure("Failed to update category", &e),
    }
}

pub fn menu_delete_category(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let parsed: CategoryIdPayload =
        match parse_payload(normalize_payload(arg0, "categoryId"), "category") {
            Ok(p) => p,
            Err(e) => return notify::failure_message("Error", e),
        };
    match kitchen.menu.delete_category(parsed.category_id.trim()) {
        Ok(()) => notify::ok(
            json!({ "categoryId": parsed.category_id.trim() }),
            Notification::success("Success", "Category deleted successfully"),
        ),
        Err(e) => notify::failure("Failed to delete category", &e),
    }
}

pub fn menu_save_item(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let draft: MenuItemDraft = match parse_payload(arg0.unwrap_or(Value::Null), "menu item") {
        Ok(d) => d,
        Err(e) => return notify::failure_message("Error", e),
    };
    let is_update = draft.id.as_deref().is_some_and(|id| !id.trim().is_empty());
    match kitchen.menu.upsert_item(draft) {
        Ok(item) => notify::ok(
            item,
            Notification::success(
                "Success",
                if is_update {
                    "Item updated successfully"
                } else {
                    "Item added successfully"
                },
            ),
        ),
        Err(e) => notify::failure("Failed to save item", &e),
    }
}

pub fn menu_delete_item(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let item_id = match parse_item_id(arg0) {
        Ok(id) => id,
        Err(e) => return notify::failure_message("Error", e),
    };
    match kitchen.menu.delete_item(&item_id) {
        Ok(()) => notify::ok(
            json!({ "itemId": item_id }),
            Notification::success("Success", "Item deleted successfully"),
        ),
        Err(e) => notify::failure("Failed to delete item", &e),
    }
}

pub fn menu_toggle_availability(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let item_id = match parse_item_id(arg0) {
        Ok(id) => id,
        Err(e) => return notify::failure_message("Error", e),
    };
    match kitchen.menu.toggle_availability(&item_id) {
        Ok(item) => {
            let description = format!(
                "{} is now {}",
                item.name,
                if item.available { "available" } else { "unavailable" }
            );
            notify::ok(item, Notification::success("Success", description))
        }
        Err(e) => notify::failure("Failed to update availability", &e),
    }
}

pub fn menu_reorder(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let parsed: ReorderPayload = match parse_payload(arg0.unwrap_or(Value::Null), "reorder") {
        Ok(p) => p,
        Err(e) => return notify::failure_message("Error", e),
    };
    match kitchen.menu.reorder(&parsed.scope, &parsed.ids) {
        Ok(()) => notify::ok(
            json!({ "scope": parsed.scope, "ids": parsed.ids }),
            Notification::success("Success", "Order updated successfully"),
        ),
        Err(e) => notify::failure("Failed to update order", &e),
    }
}
