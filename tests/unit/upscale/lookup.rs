use super::*;

fn panel(w: u32, h: u32) -> PanelSize {
    PanelSize::new(w, h).unwrap()
}

#[test]
fn square_source_fills_square_panel() {
    let t = UpscaleTables::build(64, 64, panel(720, 720), Rotation::Deg0).unwrap();
    assert_eq!((t.scaled_width, t.scaled_height), (720, 720));
    assert_eq!((t.offset_x, t.offset_y), (0, 0));
    assert!(!t.has_borders);
    assert_eq!(t.source_xy(0, 0), (0, 0));
    assert_eq!(t.source_xy(719, 719), (63, 63));
    assert_eq!(t.source_xy(11, 12), (11 * 64 / 720, 12 * 64 / 720));
}

#[test]
fn wide_source_is_letterboxed_vertically() {
    let t = UpscaleTables::build(4, 2, panel(8, 8), Rotation::Deg0).unwrap();
    assert_eq!((t.scaled_width, t.scaled_height), (8, 4));
    assert_eq!((t.offset_x, t.offset_y), (0, 2));
    assert!(t.has_borders);
    assert_eq!(t.source_xy(7, 3), (3, 1));
}

#[test]
fn quarter_turn_swaps_fit_axis() {
    // A 4x2 source rotated a quarter turn is 2 wide and 4 tall on screen.
    let t = UpscaleTables::build(4, 2, panel(8, 8), Rotation::Deg90).unwrap();
    assert_eq!((t.scaled_width, t.scaled_height), (4, 8));
    assert_eq!((t.offset_x, t.offset_y), (2, 0));
}

#[test]
fn rotation_moves_source_corners() {
    let p = panel(3, 3);
    let last = 2;
    // Where does source (0, 0) land for each rotation?
    let find = |rot: Rotation| {
        let t = UpscaleTables::build(3, 3, p, rot).unwrap();
        let mut hit = None;
        for y in 0..3 {
            for x in 0..3 {
                if t.source_xy(x, y) == (0, 0) {
                    hit = Some((x, y));
                }
            }
        }
        hit.unwrap()
    };
    assert_eq!(find(Rotation::Deg0), (0, 0));
    assert_eq!(find(Rotation::Deg90), (last, 0));
    assert_eq!(find(Rotation::Deg180), (last, last));
    assert_eq!(find(Rotation::Deg270), (0, last));
}

#[test]
fn every_lookup_stays_in_bounds() {
    for rot in [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270] {
        let t = UpscaleTables::build(7, 3, panel(50, 37), rot).unwrap();
        for y in 0..t.scaled_height {
            for x in 0..t.scaled_width {
                let (sx, sy) = t.source_xy(x, y);
                assert!(sx < 7 && sy < 3, "{rot:?} ({x},{y}) -> ({sx},{sy})");
            }
        }
    }
}

#[test]
fn empty_sizes_are_rejected() {
    assert!(UpscaleTables::build(0, 3, panel(4, 4), Rotation::Deg0).is_err());
}

#[test]
fn matches_tracks_size_and_rotation() {
    let t = UpscaleTables::build(4, 2, panel(8, 8), Rotation::Deg0).unwrap();
    assert!(t.matches(4, 2, Rotation::Deg0));
    assert!(!t.matches(4, 2, Rotation::Deg180));
    assert!(!t.matches(2, 4, Rotation::Deg0));
}
