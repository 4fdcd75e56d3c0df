//! Shared small integer and id type aliases.

/// Index into the constant pool, the field name table, or the code-object
/// table. All three are contractually required to fit in 22 bits.
pub type PoolIndex = u32;

/// A 32-bit monotonic instance id.
pub type InstanceId = u32;

/// An asset table index (object, sprite, sound, ...).
pub type AssetIndex = i32;

/// Maximum value a constant-pool or code-object index may take (22 bits).
pub const MAX_22_BIT: u32 = 0x3F_FFFF;

/// Maximum value a plain literal-int VAL may encode directly (kind `01`).
pub const MAX_LITERAL_INT: u32 = 0x3F_FFFF;
