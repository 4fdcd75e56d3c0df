//! Collision engine (C10): bounding-box refresh and pixel-perfect checks.
//!
//! Grounded on `Collision.cpp`'s `RefreshInstanceBbox`, `CollisionCheck`,
//! `CollisionPointCheck`, and `CollisionRectangleCheck`, translated into
//! idiomatic Rust rather than transliterated line for line. The full asset
//! decoder (C4) is out of scope, so sprite geometry and pixel masks are
//! modeled here at interface level via [`CollisionMap`] rather than pulled
//! from a decoded sprite table.

use std::f64::consts::PI;

use crate::runtime::instance_table::Instance;

/// A single collision frame: its bounding box in local (unscaled) sprite
/// space and a row-major lit/unlit pixel mask.
pub struct CollisionMap {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub width: i32,
    pub pixels: Vec<bool>,
}

impl CollisionMap {
    fn lit(&self, x: i32, y: i32) -> bool {
        if x < self.left || x > self.right || y < self.top || y > self.bottom {
            return false;
        }
        let idx = (y * self.width + x) as usize;
        self.pixels.get(idx).copied().unwrap_or(false)
    }
}

/// The collision-relevant subset of a sprite's geometry: its origin and,
/// per frame, a collision map. `separate_collision` selects per-frame maps
/// (indexed by `image_index % frame count`) instead of one shared map.
pub struct SpriteGeometry {
    pub origin_x: f64,
    pub origin_y: f64,
    pub separate_collision: bool,
    pub collision_maps: Vec<CollisionMap>,
}

impl SpriteGeometry {
    fn map_for(&self, image_index: f64) -> Option<&CollisionMap> {
        if self.collision_maps.is_empty() {
            return None;
        }
        if self.separate_collision {
            let frame = (image_index as i64).rem_euclid(self.collision_maps.len() as i64) as usize;
            self.collision_maps.get(frame)
        } else {
            self.collision_maps.first()
        }
    }
}

/// Resolves an instance's effective collision sprite: `mask_index` if set,
/// else `sprite_index`, else none.
pub trait SpriteLookup {
    fn sprite(&self, index: i32) -> Option<&SpriteGeometry>;
}

fn effective_sprite<'a>(i: &Instance, lookup: &'a dyn SpriteLookup) -> Option<&'a SpriteGeometry> {
    let idx = if i.mask_index != -1 { i.mask_index } else { i.sprite_index };
    if idx < 0 {
        None
    } else {
        lookup.sprite(idx)
    }
}

/// Round-half-to-even ("banker's rounding"), matching the x86 FISTP
/// instruction the original runner relied on.
pub fn d_round(d: f64) -> i32 {
    let down = d.floor() as i32;
    let frac = d - down as f64;
    if frac < 0.5 {
        down
    } else if frac > 0.5 {
        down + 1
    } else {
        down + (down & 1)
    }
}

/// Rotate point `(px, py)` by the angle whose sine/cosine are `(s, c)`
/// around center `(cx, cy)`.
fn rotate_around(px: f64, py: f64, cx: f64, cy: f64, s: f64, c: f64) -> (f64, f64) {
    let dx = px - cx;
    let dy = py - cy;
    (dx * c - dy * s + cx, dx * s + dy * c + cy)
}

/// Recompute `i`'s bounding box from its sprite geometry if the stale flag
/// is set, per `Collision.cpp::RefreshInstanceBbox`.
pub fn refresh_bbox(i: &mut Instance, lookup: &dyn SpriteLookup) {
    if !i.bbox_is_stale {
        return;
    }

    let sprite = effective_sprite(i, lookup);
    let map = sprite.and_then(|s| s.map_for(i.image_index).map(|m| (s, m)));

    match map {
        None => {
            i.bbox_left = -100_000;
            i.bbox_top = -100_000;
            i.bbox_right = -100_000;
            i.bbox_bottom = -100_000;
        }
        Some((s, m)) => {
            let mut tl_x = (i.x - s.origin_x * i.image_xscale) + (m.left as f64 * i.image_xscale);
            let mut tl_y = (i.y - s.origin_y * i.image_yscale) + (m.top as f64 * i.image_yscale);
            let mut br_x = tl_x + ((m.right + 1 - m.left) as f64 * i.image_xscale) - 1.0;
            let mut br_y = tl_y + ((m.bottom + 1 - m.top) as f64 * i.image_yscale) - 1.0;

            if i.image_xscale <= 0.0 {
                std::mem::swap(&mut tl_x, &mut br_x);
            }
            if i.image_yscale <= 0.0 {
                std::mem::swap(&mut tl_y, &mut br_y);
            }

            if i.image_angle != 0.0 {
                let tr = (br_x, tl_y);
                let bl = (tl_x, br_y);
                let angle = -i.image_angle * PI / 180.0;
                let (s_a, c_a) = (angle.sin(), angle.cos());

                let (tl_x2, tl_y2) = rotate_around(tl_x, tl_y, i.x, i.y, s_a, c_a);
                let (tr_x2, tr_y2) = rotate_around(tr.0, tr.1, i.x, i.y, s_a, c_a);
                let (bl_x2, bl_y2) = rotate_around(bl.0, bl.1, i.x, i.y, s_a, c_a);
                let (br_x2, br_y2) = rotate_around(br_x, br_y, i.x, i.y, s_a, c_a);

                let xs = [tl_x2, tr_x2, bl_x2, br_x2];
                let ys = [tl_y2, tr_y2, bl_y2, br_y2];
                i.bbox_left = d_round(xs.iter().cloned().fold(f64::INFINITY, f64::min));
                i.bbox_right = d_round(xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max));
                i.bbox_top = d_round(ys.iter().cloned().fold(f64::INFINITY, f64::min));
                i.bbox_bottom = d_round(ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max));
            } else {
                i.bbox_left = d_round(tl_x);
                i.bbox_right = d_round(br_x);
                i.bbox_top = d_round(tl_y);
                i.bbox_bottom = d_round(br_y);
            }
        }
    }

    i.bbox_is_stale = false;
}

fn local_point(
    i: &Instance,
    s: &SpriteGeometry,
    x: f64,
    y: f64,
    cx: f64,
    cy: f64,
    sin_a: f64,
    cos_a: f64,
) -> (i32, i32) {
    let (rx, ry) = rotate_around(x, y, cx, cy, sin_a, cos_a);
    let lx = s.origin_x + ((rx - cx) / i.image_xscale);
    let ly = s.origin_y + ((ry - cy) / i.image_yscale);
    (lx as i32, ly as i32)
}

/// Pixel-perfect collision test between two instances.
///
/// Refreshes both bounding boxes, rejects on bbox disjointness, then tests
/// every pixel in the intersected window against both collision maps in
/// each instance's local frame.
pub fn collision_check(a: &mut Instance, b: &mut Instance, lookup: &dyn SpriteLookup) -> bool {
    refresh_bbox(a, lookup);
    refresh_bbox(b, lookup);

    if a.bbox_right < b.bbox_left || b.bbox_right < a.bbox_left {
        return false;
    }
    if a.bbox_bottom < b.bbox_top || b.bbox_bottom < a.bbox_top {
        return false;
    }

    let (sprite_a, sprite_b) = match (effective_sprite(a, lookup), effective_sprite(b, lookup)) {
        (Some(sa), Some(sb)) => (sa, sb),
        _ => return false,
    };
    let (map_a, map_b) = match (sprite_a.map_for(a.image_index), sprite_b.map_for(b.image_index)) {
        (Some(ma), Some(mb)) => (ma, mb),
        _ => return false,
    };

    let c_top = a.bbox_top.max(b.bbox_top);
    let c_bottom = a.bbox_bottom.min(b.bbox_bottom);
    let c_left = a.bbox_left.max(b.bbox_left);
    let c_right = a.bbox_right.min(b.bbox_right);

    let x1 = d_round(a.x);
    let y1 = d_round(a.y);
    let x2 = d_round(b.x);
    let y2 = d_round(b.y);
    let angle_a = a.image_angle * PI / 180.0;
    let angle_b = b.image_angle * PI / 180.0;
    let (sin_a, cos_a) = (angle_a.sin(), angle_a.cos());
    let (sin_b, cos_b) = (angle_b.sin(), angle_b.cos());

    for y in c_top..=c_bottom {
        for x in c_left..=c_right {
            let (nax, nay) =
                local_point(a, sprite_a, x as f64, y as f64, x1 as f64, y1 as f64, sin_a, cos_a);
            if map_a.lit(nax, nay) {
                let (nbx, nby) =
                    local_point(b, sprite_b, x as f64, y as f64, x2 as f64, y2 as f64, sin_b, cos_b);
                if map_b.lit(nbx, nby) {
                    return true;
                }
            }
        }
    }
    false
}

/// Point-vs-instance pixel-perfect check.
pub fn collision_point_check(i: &mut Instance, x: i32, y: i32, lookup: &dyn SpriteLookup) -> bool {
    refresh_bbox(i, lookup);
    if i.bbox_right < x || x < i.bbox_left || i.bbox_bottom < y || y < i.bbox_top {
        return false;
    }

    let sprite = match effective_sprite(i, lookup) {
        Some(s) => s,
        None => return false,
    };
    let map = match sprite.map_for(i.image_index) {
        Some(m) => m,
        None => return false,
    };

    let angle = i.image_angle * PI / 180.0;
    let (sin_a, cos_a) = (angle.sin(), angle.cos());
    let (rx, ry) = rotate_around(x as f64, y as f64, i.x, i.y, sin_a, cos_a);
    let lx = d_round(sprite.origin_x + ((rx - i.x) / i.image_xscale));
    let ly = d_round(sprite.origin_y + ((ry - i.y) / i.image_yscale));
    map.lit(lx, ly)
}

/// Rectangle-vs-instance check. `pixel_perfect = false` returns on bbox
/// intersection alone.
pub fn collision_rectangle_check(
    i: &mut Instance,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    pixel_perfect: bool,
    lookup: &dyn SpriteLookup,
) -> bool {
    refresh_bbox(i, lookup);
    if i.bbox_right < x1 || x2 < i.bbox_left || i.bbox_bottom < y1 || y2 < i.bbox_top {
        return false;
    }
    if !pixel_perfect {
        return true;
    }

    let sprite = match effective_sprite(i, lookup) {
        Some(s) => s,
        None => return false,
    };
    let map = match sprite.map_for(i.image_index) {
        Some(m) => m,
        None => return false,
    };

    let angle = i.image_angle * PI / 180.0;
    let (sin_a, cos_a) = (angle.sin(), angle.cos());
    let center_x = d_round(i.x) as f64;
    let center_y = d_round(i.y) as f64;

    let c_top = i.bbox_top.max(y1);
    let c_bottom = i.bbox_bottom.min(y2);
    let c_left = i.bbox_left.max(x1);
    let c_right = i.bbox_right.min(x2);

    for y in c_top..=c_bottom {
        for x in c_left..=c_right {
            let (rx, ry) = rotate_around(x as f64, y as f64, center_x, center_y, sin_a, cos_a);
            let lx = (sprite.origin_x + ((rx - center_x) / i.image_xscale)) as i32;
            let ly = (sprite.origin_y + ((ry - center_y) / i.image_yscale)) as i32;
            if map.lit(lx, ly) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::instance_table::InstanceTable;

    struct OneSprite(SpriteGeometry);
    impl SpriteLookup for OneSprite {
        fn sprite(&self, _index: i32) -> Option<&SpriteGeometry> {
            Some(&self.0)
        }
    }

    fn solid_1x1_sprite() -> SpriteGeometry {
        SpriteGeometry {
            origin_x: 0.0,
            origin_y: 0.0,
            separate_collision: false,
            collision_maps: vec![CollisionMap {
                left: 0,
                top: 0,
                right: 0,
                bottom: 0,
                width: 1,
                pixels: vec![true],
            }],
        }
    }

    #[test]
    fn half_pixel_position_rounds_to_even() {
        let mut t = InstanceTable::new();
        let r = t.add(1, 0.5, 0.5, 0);
        let i = t.get_mut(r).unwrap();
        i.sprite_index = 0;
        let lookup = OneSprite(solid_1x1_sprite());
        refresh_bbox(i, &lookup);
        assert_eq!(i.bbox_left, 0);
        assert_eq!(i.bbox_top, 0);
    }

    #[test]
    fn no_sprite_collapses_bbox_to_sentinel() {
        let mut t = InstanceTable::new();
        let r = t.add(1, 0.0, 0.0, 0);
        let i = t.get_mut(r).unwrap();
        struct NoSprite;
        impl SpriteLookup for NoSprite {
            fn sprite(&self, _index: i32) -> Option<&SpriteGeometry> {
                None
            }
        }
        refresh_bbox(i, &NoSprite);
        assert_eq!(i.bbox_left, -100_000);
        assert_eq!(i.bbox_bottom, -100_000);
    }

    #[test]
    fn collision_check_is_symmetric() {
        let mut t = InstanceTable::new();
        let ra = t.add(1, 0.0, 0.0, 0);
        let rb = t.add(2, 0.0, 0.0, 0);
        let lookup = OneSprite(solid_1x1_sprite());

        {
            let a = t.get_mut(ra).unwrap();
            a.sprite_index = 0;
        }
        {
            let b = t.get_mut(rb).unwrap();
            b.sprite_index = 0;
        }

        let mut a = t.get(ra).unwrap().clone();
        let mut b = t.get(rb).unwrap().clone();
        let ab = collision_check(&mut a, &mut b, &lookup);
        let mut a2 = t.get(ra).unwrap().clone();
        let mut b2 = t.get(rb).unwrap().clone();
        let ba = collision_check(&mut b2, &mut a2, &lookup);
        assert_eq!(ab, ba);
        assert!(ab);
    }
}
