use serde_json::{json, Value};

use super::Kitchen;
use crate::notify::{self, Notification};
use crate::outbox;

pub fn outbox_get_status(kitchen: &Kitchen) -> Value {
    match kitchen.db.read(outbox::stats) {
        Ok(stats) => notify::ok(stats, Notification::success("Webhook queue loaded", "")),
        Err(e) => notify::failure("Failed to load webhook queue", &e),
    }
}

pub fn outbox_retry_failed(kitchen: &Kitchen) -> Value {
    match kitchen.db.read(outbox::retry_failed) {
        Ok(count) => notify::ok(
            json!({ "requeued": count }),
            Notification::success("Success", format!("{count} webhook(s) queued for retry")),
        ),
        Err(e) => notify::failure("Failed to retry webhooks", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::menu::menu_create_category;
    use crate::commands::test_support::kitchen;

    #[test]
    fn status_counts_pending_rows_and_retry_requeues_failed() {
        let kitchen = kitchen();
        menu_create_category(&kitchen, Some(json!("Specials")));
        let status = outbox_get_status(&kitchen);
        assert_eq!(status["data"]["pending"], 1);

        kitchen
            .db
            .read(|conn| {
                conn.execute("UPDATE outbox SET status = 'failed', retry_count = 5", [])?;
                Ok(())
            })
            .unwrap();
        let retried = outbox_retry_failed(&kitchen);
        assert_eq!(retried["data"]["requeued"], 1);
        assert_eq!(outbox_get_status(&kitchen)["data"]["pending"], 1);
    }
}
