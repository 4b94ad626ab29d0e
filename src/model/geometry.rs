//! Screen/grid coordinate math for the isometric diamond layout, shared by
//! every viewer for hit-testing. The diamond is the standard 2:1 shape:
//! `half_w` is twice `half_h`. Levels stack `3 * half_h` apart vertically.

/// Top-left anchor the whole lozenge is laid out from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Origin {
    pub x: i32,
    pub y: i32,
}

impl Origin {
    pub fn new(x: i32, y: i32) -> Self {
        Origin { x, y }
    }
}

/// Picks the diamond containing a screen point on the given level. Both
/// axes floor toward negative infinity, so points above or left of the
/// lozenge land on negative cells rather than snapping to zero.
pub fn screen_to_grid(
    x: i32,
    y: i32,
    origin: Origin,
    half_w: i32,
    half_h: i32,
    level: i32,
) -> (i32, i32) {
    let a = (x - origin.x - half_w) as i64;
    let b = (y - origin.y - 3 * half_h * (level + 1)) as i64;
    let (w, h) = (half_w as i64, half_h as i64);

    // col = floor(a / 2w + b / 2h), row = floor((2b - a) / 2w)
    let col = (a * h + b * w).div_euclid(2 * w * h);
    let row = (2 * b - a).div_euclid(2 * w);

    (col as i32, row as i32)
}

/// The screen point of a cell's top corner: the exact inverse of
/// `screen_to_grid`, offset down the level stack.
pub fn grid_to_screen(
    col: i32,
    row: i32,
    level: i32,
    origin: Origin,
    half_w: i32,
    half_h: i32,
) -> (i32, i32) {
    let x = origin.x + half_w + half_w * (col - row);
    let y = origin.y + 3 * half_h * (level + 1) + half_h * (col + row);
    (x, y)
}

/// The sample point hit-tests should probe for a cell: its diamond center.
pub fn tile_center(
    col: i32,
    row: i32,
    level: i32,
    origin: Origin,
    half_w: i32,
    half_h: i32,
) -> (i32, i32) {
    let (x, y) = grid_to_screen(col, row, level, origin, half_w, half_h);
    (x, y + half_h)
}

/// Bounding box of the full lozenge, for scroll-range sizing.
pub fn required_extent(
    rows: usize,
    cols: usize,
    levs: usize,
    half_w: i32,
    half_h: i32,
) -> (i32, i32) {
    let span = (rows + cols) as i32;
    let width = span * half_w;
    let height = span * half_h + 3 * half_h * levs as i32;
    (width, height)
}
