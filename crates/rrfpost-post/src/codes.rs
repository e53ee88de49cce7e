//! Firmware code constants and command families.
//!
//! Codes are decimal throughout: fractional codes select firmware variants
//! (`G59.1` is its own frame, `M3.9` is the wait-for-spindle variant of
//! `M3`), so comparisons and arithmetic happen on `f64`, never on integers.

/// Well-known G codes.
pub mod gcode {
    /// Rapid move.
    pub const RAPID: f64 = 0.0;
    /// Linear feed move.
    pub const LINEAR: f64 = 1.0;
    /// Dwell.
    pub const DWELL: f64 = 4.0;
    /// Firmware-defined safe retract.
    pub const PARK: f64 = 27.0;
    /// Home all axes.
    pub const HOME: f64 = 28.0;
    /// Absolute distance mode.
    pub const ABSOLUTE: f64 = 90.0;
    /// Millimeter units.
    pub const MILLIMETERS: f64 = 21.0;
    /// Feed per minute.
    pub const FEED_PER_MIN: f64 = 94.0;
    /// Operator-guided probe, optionally saving into a frame (`W`).
    pub const PROBE_OPERATOR: f64 = 6600.0;
    /// Probe the toolsetter reference surface.
    pub const PROBE_REFERENCE_SURFACE: f64 = 6511.0;
}

/// Well-known M codes.
pub mod mcode {
    /// Pass one tool table entry to the firmware.
    pub const ADD_TOOL: f64 = 4000.0;
    /// Check the firmware version against the post-processor.
    pub const VERSION_CHECK: f64 = 4005.0;
    /// Enable rotation compensation for the active frame.
    pub const ENABLE_ROTATION_COMPENSATION: f64 = 5011.0;
    /// Enable variable spindle speed control.
    pub const VSSC_ENABLE: f64 = 7000.0;
    /// Disable variable spindle speed control.
    pub const VSSC_DISABLE: f64 = 7001.0;
    /// Show a confirmable dialog to the operator.
    pub const SHOW_DIALOG: f64 = 3000.0;
}

/// Well-known field keys.
pub mod field {
    /// X axis.
    pub const X: &str = "X";
    /// Y axis.
    pub const Y: &str = "Y";
    /// Z axis.
    pub const Z: &str = "Z";
    /// Arc centre offset along X.
    pub const ARC_X: &str = "I";
    /// Arc centre offset along Y.
    pub const ARC_Y: &str = "J";
    /// Arc centre offset along Z.
    pub const ARC_Z: &str = "K";
    /// Arc radius.
    pub const ARC_R: &str = "R";
    /// Feed rate.
    pub const FEED: &str = "F";
    /// Tool index.
    pub const TOOL: &str = "T";
    /// Spindle RPM.
    pub const RPM: &str = "S";
    /// Work coordinate frame ordinal.
    pub const FRAME: &str = "W";
}

/// Rapid motion codes; feed words on these are dropped.
pub const RAPID_MOVES: &[f64] = &[0.0];
/// Linear-family motion codes.
pub const LINEAR_MOVES: &[f64] = &[0.0, 1.0];
/// Arc-family motion codes.
pub const ARC_MOVES: &[f64] = &[2.0, 3.0];
/// Canned drilling cycles, handled as opaque motion.
pub const CANNED_CYCLES: &[f64] = &[73.0, 81.0, 83.0];
/// M codes that start the spindle.
pub const SPINDLE_START: &[f64] = &[3.0, 4.0];
/// M codes that stop the spindle.
pub const SPINDLE_STOP: &[f64] = &[5.0];
/// Fractional code offset selecting the firmware's wait-for-speed spindle
/// variants (`M3` becomes `M3.9`).
pub const SPINDLE_WAIT_SUFFIX: f64 = 0.9;
/// M codes that change the tool.
pub const TOOL_CHANGES: &[f64] = &[6.0];
/// Work coordinate frame select codes, in frame order.
pub const FRAME_CHANGES: &[f64] = &[54.0, 55.0, 56.0, 57.0, 58.0, 59.0, 59.1, 59.2, 59.3];
/// Deny-listed G codes, dropped without output.
pub const UNSUPPORTED: &[f64] = &[98.0, 99.0];

/// Whether `code` is any motion command (linear, arc or canned cycle).
pub fn is_move(code: f64) -> bool {
    LINEAR_MOVES.contains(&code) || ARC_MOVES.contains(&code) || CANNED_CYCLES.contains(&code)
}

/// Whether `code` is a rapid move.
pub fn is_rapid(code: f64) -> bool {
    RAPID_MOVES.contains(&code)
}

/// Frame ordinal (1-based) for a frame select code.
///
/// Ordinals follow the position in [`FRAME_CHANGES`], so the fractional
/// codes `59.1`..`59.3` map to frames 7..9.
pub fn frame_ordinal(code: f64) -> Option<u16> {
    FRAME_CHANGES
        .iter()
        .position(|c| *c == code)
        .map(|i| (i + 1) as u16)
}
