//! Cursor pagination shared by threads, replies and notifications.
//!
//! Collections are keyed by their `seq` column, ascending from oldest to
//! newest. `before` walks towards older items and `after` towards newer
//! ones; cursors are exclusive and an empty cursor starts from the newest
//! (`before`) or oldest (`after`) end.

use crate::error::{AppError, AppResult};
use crate::forum::ids;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Before,
    After,
}

/// Order items are handed back to clients in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOrder {
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceRequest {
    pub direction: Direction,
    pub cursor: Option<i64>,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice<T> {
    pub items: Vec<T>,
    pub first_cursor: String,
    pub last_cursor: String,
}

impl SliceRequest {
    pub fn new(
        before: Option<&str>,
        after: Option<&str>,
        limit: i32,
        max_limit: i32,
    ) -> AppResult<Self> {
        let (direction, raw) = match (before, after) {
            (Some(c), None) => (Direction::Before, c),
            (None, Some(c)) => (Direction::After, c),
            (Some(_), Some(_)) => {
                return Err(AppError::bad_request(
                    "only one of 'before' or 'after' may be set",
                ))
            }
            (None, None) => {
                return Err(AppError::bad_request(
                    "either 'before' or 'after' is required",
                ))
            }
        };

        if limit < 1 {
            return Err(AppError::bad_request("limit must be at least 1"));
        }

        let cursor = match raw.trim() {
            "" => None,
            c => Some(
                ids::decode(c)
                    .map_err(|e| AppError::bad_request(format!("invalid cursor '{}': {}", c, e)))?,
            ),
        };

        Ok(Self {
            direction,
            cursor,
            limit: i64::from(limit.min(max_limit.max(1))),
        })
    }

    /// SQL comparison against the key column.
    pub fn comparison(&self) -> &'static str {
        match self.direction {
            Direction::Before => "<",
            Direction::After => ">",
        }
    }

    /// Value bound against `comparison()`; open ends use the extremes.
    pub fn bound(&self) -> i64 {
        match (self.direction, self.cursor) {
            (_, Some(c)) => c,
            (Direction::Before, None) => i64::MAX,
            (Direction::After, None) => -1,
        }
    }

    /// SQL ordering that yields the items nearest to the cursor first.
    pub fn sql_order(&self) -> &'static str {
        match self.direction {
            Direction::Before => "DESC",
            Direction::After => "ASC",
        }
    }

    /// Builds the slice from rows fetched in `sql_order()`.
    pub fn finish<T>(
        &self,
        mut rows: Vec<T>,
        order: DisplayOrder,
        key: impl Fn(&T) -> i64,
    ) -> Slice<T> {
        let fetched_newest_first = self.direction == Direction::Before;
        if fetched_newest_first != (order == DisplayOrder::NewestFirst) {
            rows.reverse();
        }

        let first_cursor = rows.first().map(|r| ids::encode(key(r))).unwrap_or_default();
        let last_cursor = rows.last().map(|r| ids::encode(key(r))).unwrap_or_default();

        Slice {
            items: rows,
            first_cursor,
            last_cursor,
        }
    }
}

impl<T> Slice<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            items: self.items.into_iter().map(f).collect(),
            first_cursor: self.first_cursor,
            last_cursor: self.last_cursor,
        }
    }
}
