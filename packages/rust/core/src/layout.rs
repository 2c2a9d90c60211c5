//! Deterministic placement of fragments on the recipe canvas.

use recipeforge_shared::LayoutConfig;

/// Where one fragment goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: i64,
    pub y: i64,
    pub label_top: i64,
}

/// Layout state for one build. Fragments fill a row left to right and wrap
/// every `break_every` fragments.
#[derive(Debug, Clone)]
pub struct LayoutCursor {
    config: LayoutConfig,
    x: i64,
    y: i64,
    label_top: i64,
    steps: u32,
    rows: u32,
}

impl LayoutCursor {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            x: config.base_x,
            y: config.base_y,
            label_top: config.label_top,
            steps: 0,
            rows: 0,
        }
    }

    /// Position for the next fragment.
    ///
    /// The row check runs before emitting, so the very first call already
    /// starts a new row one `row_height` below `base_y`.
    pub fn advance(&mut self) -> Position {
        if self.steps.checked_rem(self.config.break_every) == Some(0) {
            self.y += self.config.row_height;
            self.x = self.config.base_x;
            self.rows += 1;
        }

        let position = Position {
            x: self.x,
            y: self.y,
            label_top: self.label_top,
        };

        self.x += self.config.step_width;
        self.label_top += self.config.label_step;
        self.steps += 1;
        position
    }

    /// `Label.left` for a fragment at `position`.
    pub fn label_left(&self, position: Position) -> i64 {
        position.x - self.config.label_offset
    }

    /// Fragments placed so far.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Row breaks taken so far.
    pub fn rows(&self) -> u32 {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_steps_fill_one_row() {
        let mut cursor = LayoutCursor::new(LayoutConfig::default());
        let positions: Vec<_> = (0..3).map(|_| cursor.advance()).collect();

        let xs: Vec<_> = positions.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![300, 480, 660]);
        assert!(positions.iter().all(|p| p.y == 220));
        assert_eq!(cursor.rows(), 1);

        let tops: Vec<_> = positions.iter().map(|p| p.label_top).collect();
        assert_eq!(tops, vec![100, 149, 198]);
        assert_eq!(cursor.label_left(positions[1]), 462);
    }

    #[test]
    fn fourth_step_wraps() {
        let mut cursor = LayoutCursor::new(LayoutConfig::default());
        for _ in 0..3 {
            cursor.advance();
        }
        let fourth = cursor.advance();
        assert_eq!((fourth.x, fourth.y), (300, 340));
        assert_eq!(fourth.label_top, 247);
        assert_eq!(cursor.rows(), 2);
        assert_eq!(cursor.steps(), 4);
    }

    #[test]
    fn zero_break_every_never_wraps() {
        let config = LayoutConfig {
            break_every: 0,
            ..LayoutConfig::default()
        };
        let mut cursor = LayoutCursor::new(config);
        let positions: Vec<_> = (0..5).map(|_| cursor.advance()).collect();
        assert!(positions.iter().all(|p| p.y == 100));
        assert_eq!(positions[4].x, 300 + 4 * 180);
        assert_eq!(cursor.rows(), 0);
    }
}
