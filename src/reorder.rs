//! Optimistic drag-reorder for one menu scope.
//!
//! The board applies a move locally first, then persists it. If the write
//! fails the previous order is restored and the error is handed back.

use tracing::warn;

use crate::error::{KitchenError, KitchenResult};
use crate::menu::{MenuRepository, ReorderScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
    Settled,
    PendingWrite,
}

#[derive(Debug)]
pub struct ReorderBoard {
    scope: ReorderScope,
    ids: Vec<String>,
    state: BoardState,
}

impl ReorderBoard {
    pub fn new(scope: ReorderScope, ids: Vec<String>) -> Self {
        Self {
            scope,
            ids,
            state: BoardState::Settled,
        }
    }

    /// Board seeded with the current stored order for `scope`.
    pub fn load(repo: &MenuRepository, scope: ReorderScope) -> KitchenResult<Self> {
        let ids = match &scope {
            ReorderScope::Categories => repo
                .list_categories()?
                .into_iter()
                .map(|c| c.id)
                .collect(),
            ReorderScope::Items { category_id } => repo
                .list_items(Some(category_id))?
                .into_iter()
                .map(|i| i.id)
                .collect(),
        };
        Ok(Self::new(scope, ids))
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn scope(&self) -> &ReorderScope {
        &self.scope
    }

    pub fn state(&self) -> BoardState {
        self.state
    }

    /// Move the entry at `from` to `to`, then call `persist` with the new
    /// order. On failure the snapshot taken before the move is restored.
    /// The board is `PendingWrite` only while `persist` runs; `&mut self`
    /// rules out a second move overlapping it.
    pub fn move_entry<F>(&mut self, from: usize, to: usize, persist: F) -> KitchenResult<()>
    where
        F: FnOnce(&ReorderScope, &[String]) -> KitchenResult<()>,
    {
        let len = self.ids.len();
        if from >= len || to >= len {
            return Err(KitchenError::validation(format!(
                "Move {from} -> {to} is out of range for {len} entries"
            )));
        }
        if from == to {
            return Ok(());
        }

        let snapshot = self.ids.clone();
        let moved = self.ids.remove(from);
        self.ids.insert(to, moved);
        self.state = BoardState::PendingWrite;

        let result = persist(&self.scope, &self.ids);
        self.state = BoardState::Settled;
        if let Err(e) = &result {
            warn!(scope = ?self.scope, error = %e, "Reorder failed, restoring previous order");
            self.ids = snapshot;
        }
        result
    }

    /// Persist through the menu repository.
    pub fn move_and_save(
        &mut self,
        repo: &MenuRepository,
        from: usize,
        to: usize,
    ) -> KitchenResult<()> {
        self.move_entry(from, to, |scope, ids| repo.reorder(scope, ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::events::ChangeFeed;
    use std::sync::Arc;

    fn board() -> ReorderBoard {
        ReorderBoard::new(
            ReorderScope::Categories,
            vec!["a".into(), "b".into(), "c".into()],
        )
    }

    #[test]
    fn successful_move_settles_with_new_order() {
        let mut board = board();
        let mut seen = Vec::new();
        board
            .move_entry(2, 0, |_, ids| {
                seen = ids.to_vec();
                Ok(())
            })
            .unwrap();
        assert_eq!(board.ids(), ["c", "a", "b"]);
        assert_eq!(seen, vec!["c", "a", "b"]);
        assert_eq!(board.state(), BoardState::Settled);
    }

    #[test]
    fn failed_write_restores_snapshot() {
        let mut board = board();
        let err = board
            .move_entry(0, 2, |_, _| Err(KitchenError::Lock("busy".into())))
            .unwrap_err();
        assert!(matches!(err, KitchenError::Lock(_)));
        assert_eq!(board.ids(), ["a", "b", "c"]);
        assert_eq!(board.state(), BoardState::Settled);
    }

    #[test]
    fn next_move_after_failed_write_starts_from_snapshot() {
        let mut board = board();
        assert!(board
            .move_entry(0, 2, |_, _| Err(KitchenError::Lock("busy".into())))
            .is_err());
        board.move_entry(2, 1, |_, _| Ok(())).unwrap();
        assert_eq!(board.ids(), ["a", "c", "b"]);
        assert_eq!(board.state(), BoardState::Settled);
    }

    #[test]
    fn out_of_range_move_is_rejected_without_persisting() {
        let mut board = board();
        let result = board.move_entry(0, 3, |_, _| panic!("must not persist"));
        assert!(result.is_err());
        assert!(board.move_entry(1, 1, |_, _| panic!("no-op")).is_ok());
    }

    #[test]
    fn board_round_trips_through_repository() {
        let db = Arc::new(db::open_in_memory().unwrap());
        let repo = MenuRepository::new(db, ChangeFeed::default());
        for name in ["Soups", "Grills", "Rice"] {
            repo.create_category(name).unwrap();
        }
        let mut board = ReorderBoard::load(&repo, ReorderScope::Categories).unwrap();
        board.move_and_save(&repo, 2, 0).unwrap();

        let stored: Vec<_> = repo
            .list_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(stored, vec!["Rice", "Soups", "Grills"]);
        let reloaded = ReorderBoard::load(&repo, ReorderScope::Categories).unwrap();
        assert_eq!(reloaded.ids(), board.ids());
    }
}
