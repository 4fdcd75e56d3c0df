//! Fixed identifier tables: built-in game values, instance variables, and
//! internal functions, plus the per-compilation asset-name scope (C6
//! "variable term forms" / "identifier classification").

/// Built-in global properties, in id order. Order is part of the bytecode
/// contract: `game_value_id` returns the position in this list.
const GAME_VALUES: &[&str] = &[
    "room", "score", "lives", "health", "debug_mode", "instance_count", "mouse_x", "mouse_y",
    "keyboard_key", "keyboard_lastkey", "fps", "current_time", "room_width", "room_height",
    "view_xview", "view_yview", "working_directory", "program_directory", "os_type",
];

/// Built-in per-instance properties, in id order.
const INSTANCE_VARS: &[&str] = &[
    "x", "y", "xprevious", "yprevious", "xstart", "ystart", "hspeed", "vspeed", "speed",
    "direction", "gravity", "gravity_direction", "friction", "sprite_index", "mask_index",
    "image_index", "image_speed", "image_xscale", "image_yscale", "image_angle", "image_alpha",
    "image_blend", "solid", "visible", "persistent", "depth", "bbox_left", "bbox_top",
    "bbox_right", "bbox_bottom", "path_index", "path_position", "path_speed", "path_scale",
    "path_orientation", "path_endaction", "timeline_index", "timeline_position",
    "timeline_speed", "timeline_running", "timeline_loop", "alarm",
];

/// Built-in functions the compiler can resolve a call-position identifier
/// against, in id order. Not an exhaustive standard library (the spec's
/// explicit non-goal); only the hooks needed to exercise call emission.
const INTERNAL_FUNCS: &[&str] = &[
    "show_debug_message",
    "instance_create",
    "instance_destroy",
    "instance_exists",
    "instance_number",
    "instance_position",
    "place_meeting",
    "random",
    "random_range",
    "floor",
    "round",
    "abs",
    "sqrt",
    "point_distance",
    "point_direction",
    "string",
    "real",
];

/// Position of `name` in `GAME_VALUES`, if any.
pub fn game_value_id(name: &str) -> Option<u8> {
    GAME_VALUES.iter().position(|n| *n == name).map(|i| i as u8)
}

/// Position of `name` in `INSTANCE_VARS`, if any.
pub fn instance_var_id(name: &str) -> Option<u8> {
    INSTANCE_VARS.iter().position(|n| *n == name).map(|i| i as u8)
}

/// Whether `name` is the `alarm` instance variable, which requires an array
/// index (spec.md section 4.5).
pub fn is_alarm(name: &str) -> bool {
    name == "alarm"
}

/// Position of `name` in `INTERNAL_FUNCS`, if any.
pub fn internal_func_id(name: &str) -> Option<u16> {
    INTERNAL_FUNCS.iter().position(|n| *n == name).map(|i| i as u16)
}

/// One named, existence-flagged asset table entry, as the loader produces it
/// for scripts, objects, sprites, and the rest of the asset-name lookup
/// precedence chain (spec.md section 4.4).
#[derive(Debug, Clone)]
pub struct NamedAsset {
    pub name: String,
    pub exists: bool,
}

/// The asset-name and script-name tables available while compiling one
/// translation unit. Empty by default: the asset decoder (C4) is explicitly
/// out of scope, so a caller that has not decoded full asset tables yet
/// simply resolves no asset names and no scripts, which surfaces as
/// `CompileError::UnknownCall` for any call or bare asset-name reference.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub scripts: Vec<NamedAsset>,
    pub objects: Vec<NamedAsset>,
    pub sprites: Vec<NamedAsset>,
    pub sounds: Vec<NamedAsset>,
    pub backgrounds: Vec<NamedAsset>,
    pub paths: Vec<NamedAsset>,
    pub fonts: Vec<NamedAsset>,
    pub timelines: Vec<NamedAsset>,
    pub rooms: Vec<NamedAsset>,
}

impl Scope {
    pub fn empty() -> Self {
        Scope::default()
    }

    /// Resolve a user script by name, case-sensitive, first `exists` match.
    pub fn resolve_script(&self, name: &str) -> Option<u16> {
        first_existing(&self.scripts, name).map(|i| i as u16)
    }

    /// Asset-name lookup precedence: object, sprite, sound, background,
    /// path, font, timeline, script, room; first match wins.
    pub fn resolve_asset_name(&self, name: &str) -> Option<u32> {
        first_existing(&self.objects, name)
            .or_else(|| first_existing(&self.sprites, name))
            .or_else(|| first_existing(&self.sounds, name))
            .or_else(|| first_existing(&self.backgrounds, name))
            .or_else(|| first_existing(&self.paths, name))
            .or_else(|| first_existing(&self.fonts, name))
            .or_else(|| first_existing(&self.timelines, name))
            .or_else(|| first_existing(&self.scripts, name))
            .or_else(|| first_existing(&self.rooms, name))
            .map(|i| i as u32)
    }
}

fn first_existing(table: &[NamedAsset], name: &str) -> Option<usize> {
    table.iter().position(|a| a.exists && a.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_value_ids_are_stable_by_position() {
        assert_eq!(game_value_id("room"), Some(0));
        assert_eq!(game_value_id("not_a_game_value"), None);
    }

    #[test]
    fn alarm_is_flagged_as_requiring_an_index() {
        assert!(is_alarm("alarm"));
        assert!(!is_alarm("x"));
    }

    #[test]
    fn asset_precedence_prefers_object_over_sprite() {
        let mut scope = Scope::empty();
        scope.sprites.push(NamedAsset { name: "thing".into(), exists: true });
        scope.objects.push(NamedAsset { name: "thing".into(), exists: true });
        assert_eq!(scope.resolve_asset_name("thing"), Some(0));
    }

    #[test]
    fn deleted_assets_are_skipped() {
        let mut scope = Scope::empty();
        scope.objects.push(NamedAsset { name: "thing".into(), exists: false });
        assert_eq!(scope.resolve_asset_name("thing"), None);
    }
}
