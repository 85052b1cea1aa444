//! Pointer gesture state machine for header drag-to-reorder and column resize.
//!
//! ```text
//! Idle ──press header──▶ Pressed ──move ≥ threshold──▶ Dragging ──up──▶ Idle
//!   │                       └──up──▶ Idle (click)
//!   └──press handle──▶ Resizing ──move──▶ Resizing ──up──▶ Idle
//! ```
//!
//! The grid only forwards drag/up events while [`GestureController::is_capturing`]
//! is true, and every path back to `Idle` is a plain state assignment.

use tracing::trace;

/// Move one element: remove at `from`, insert at `to`. Not a swap.
pub fn array_move<T>(list: &mut Vec<T>, from: usize, to: usize) {
    if from >= list.len() || from == to {
        return;
    }
    let item = list.remove(from);
    let to = to.min(list.len());
    list.insert(to, item);
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Pointer down on a header, not yet far enough to be a drag.
    Pressed { key: String, origin_x: u16 },
    Dragging {
        active_key: String,
        over_key: Option<String>,
    },
    Resizing {
        key: String,
        start_width: u32,
        start_x: u16,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureOutcome {
    /// Press and release without a drag.
    Click(String),
    /// Drop on a different column.
    Reorder { active: String, over: String },
    /// Live width while resizing.
    Resize { key: String, width: u32 },
}

#[derive(Debug, Clone)]
pub struct GestureController {
    state: Gesture,
    threshold: u16,
    units_per_cell: u32,
    min_width: u32,
}

impl GestureController {
    pub fn new(threshold: u16, units_per_cell: u32, min_width: u32) -> Self {
        Self {
            state: Gesture::Idle,
            threshold,
            units_per_cell: units_per_cell.max(1),
            min_width,
        }
    }

    pub fn state(&self) -> &Gesture {
        &self.state
    }

    /// True while a gesture owns the pointer.
    pub fn is_capturing(&self) -> bool {
        self.state != Gesture::Idle
    }

    /// Key of the column being dragged.
    pub fn active_id(&self) -> Option<&str> {
        match &self.state {
            Gesture::Dragging { active_key, .. } => Some(active_key),
            _ => None,
        }
    }

    pub fn over_id(&self) -> Option<&str> {
        match &self.state {
            Gesture::Dragging { over_key, .. } => over_key.as_deref(),
            _ => None,
        }
    }

    pub fn resizing_key(&self) -> Option<&str> {
        match &self.state {
            Gesture::Resizing { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Ignored unless idle; only one gesture at a time.
    pub fn press_header(&mut self, key: &str, x: u16) {
        if self.is_capturing() {
            return;
        }
        self.transition(Gesture::Pressed {
            key: key.to_string(),
            origin_x: x,
        });
    }

    pub fn press_resize_handle(&mut self, key: &str, current_width: u32, x: u16) {
        if self.is_capturing() {
            return;
        }
        self.transition(Gesture::Resizing {
            key: key.to_string(),
            start_width: current_width,
            start_x: x,
        });
    }

    /// `over` is the column key under the pointer, if any.
    pub fn pointer_move(&mut self, x: u16, over: Option<&str>) -> Option<GestureOutcome> {
        match &mut self.state {
            Gesture::Idle => None,
            Gesture::Pressed { key, origin_x } => {
                if x.abs_diff(*origin_x) >= self.threshold {
                    let next = Gesture::Dragging {
                        active_key: key.clone(),
                        over_key: over.map(str::to_string),
                    };
                    self.transition(next);
                }
                None
            }
            Gesture::Dragging { over_key, .. } => {
                *over_key = over.map(str::to_string);
                None
            }
            Gesture::Resizing {
                key,
                start_width,
                start_x,
            } => {
                let delta = (x as i64 - *start_x as i64) * self.units_per_cell as i64;
                let width = (*start_width as i64 + delta).max(self.min_width as i64) as u32;
                Some(GestureOutcome::Resize {
                    key: key.clone(),
                    width,
                })
            }
        }
    }

    /// Ends any gesture and returns to `Idle`.
    pub fn pointer_up(&mut self, x: u16, over: Option<&str>) -> Option<GestureOutcome> {
        let outcome = match &self.state {
            Gesture::Idle => None,
            Gesture::Pressed { key, .. } => Some(GestureOutcome::Click(key.clone())),
            Gesture::Dragging { active_key, .. } => over
                .filter(|over| *over != active_key.as_str())
                .map(|over| GestureOutcome::Reorder {
                    active: active_key.clone(),
                    over: over.to_string(),
                }),
            Gesture::Resizing { .. } => match self.pointer_move(x, over) {
                Some(resize @ GestureOutcome::Resize { .. }) => Some(resize),
                _ => None,
            },
        };
        self.transition(Gesture::Idle);
        outcome
    }

    pub fn cancel(&mut self) {
        self.transition(Gesture::Idle);
    }

    fn transition(&mut self, next: Gesture) {
        if self.state != next {
            trace!(from = ?self.state, to = ?next, "gesture");
            self.state = next;
        }
    }
}

impl Default for GestureController {
    fn default() -> Self {
        Self::new(2, 10, crate::layout::TABLE_COLUMN_MIN_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_move_is_not_a_swap() {
        let mut v = vec!["a", "b", "c", "d"];
        array_move(&mut v, 0, 2);
        assert_eq!(v, vec!["b", "c", "a", "d"]);
        array_move(&mut v, 3, 0);
        assert_eq!(v, vec!["d", "b", "c", "a"]);
        array_move(&mut v, 9, 0);
        assert_eq!(v, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_press_without_drag_is_a_click() {
        let mut g = GestureController::default();
        g.press_header("name", 10);
        g.pointer_move(11, Some("name"));
        assert_eq!(g.active_id(), None);
        assert_eq!(
            g.pointer_up(11, Some("name")),
            Some(GestureOutcome::Click("name".into()))
        );
        assert!(!g.is_capturing());
    }

    #[test]
    fn test_drag_past_threshold_and_drop_reorders() {
        let mut g = GestureController::default();
        g.press_header("name", 10);
        g.pointer_move(14, Some("amount"));
        assert_eq!(g.active_id(), Some("name"));
        assert_eq!(g.over_id(), Some("amount"));
        assert_eq!(
            g.pointer_up(30, Some("status")),
            Some(GestureOutcome::Reorder {
                active: "name".into(),
                over: "status".into()
            })
        );
        assert_eq!(g.state(), &Gesture::Idle);
    }

    #[test]
    fn test_drop_on_same_key_or_outside_clears_without_reorder() {
        let mut g = GestureController::default();
        g.press_header("name", 10);
        g.pointer_move(20, Some("amount"));
        assert_eq!(g.pointer_up(10, Some("name")), None);
        assert_eq!(g.active_id(), None);

        g.press_header("name", 10);
        g.pointer_move(20, None);
        assert_eq!(g.pointer_up(20, None), None);
        assert!(!g.is_capturing());
    }

    #[test]
    fn test_second_press_while_capturing_is_ignored() {
        let mut g = GestureController::default();
        g.press_header("name", 10);
        g.pointer_move(20, Some("amount"));
        g.press_header("amount", 20);
        assert_eq!(g.active_id(), Some("name"));
        g.cancel();
        assert_eq!(g.state(), &Gesture::Idle);
    }

    #[test]
    fn test_resize_is_live_and_clamped() {
        let mut g = GestureController::new(2, 10, 100);
        g.press_resize_handle("amount", 200, 40);
        assert_eq!(g.resizing_key(), Some("amount"));
        assert_eq!(
            g.pointer_move(45, None),
            Some(GestureOutcome::Resize {
                key: "amount".into(),
                width: 250
            })
        );
        assert_eq!(
            g.pointer_move(20, None),
            Some(GestureOutcome::Resize {
                key: "amount".into(),
                width: 100
            })
        );
        assert_eq!(
            g.pointer_up(42, None),
            Some(GestureOutcome::Resize {
                key: "amount".into(),
                width: 220
            })
        );
        assert!(!g.is_capturing());
    }
}
