/// Occupancy values used by loaded map files.
pub const UNKNOWN: i8 = -1;
pub const FREE: i8 = 0;
pub const OCCUPIED: i8 = 100;

pub const DEFAULT_OCCUPIED_THRESH: f32 = 0.65;
pub const DEFAULT_FREE_THRESH: f32 = 0.196;

/// Cost values stored in the master costmap.
pub const COST_FREE: u8 = 0;
pub const COST_INSCRIBED: u8 = 253;
pub const COST_LETHAL: u8 = 254;
pub const COST_UNKNOWN: u8 = 255;

/// Alias used in query responses when a cost could not be determined.
pub const NO_INFORMATION: u8 = COST_UNKNOWN;
