//! The emitter core: machine state, category dispatch and the safety
//! policies applied while writing output.
//!
//! One [`Post`] owns its formatters, machine state, tool registry and
//! section buffer for exactly one generation run. The run section is
//! written by a single traversal of the source operations; the preamble
//! and postamble are composed afterwards, once the full tool and frame
//! sets are known.

use chrono::Utc;
use rrfpost_core::{
    sanitize_quoted, Accepts, Command, CommandFormat, Ctrl, FieldFormat, FormatError, Operation,
    OperationKind, Params, Placement, Section, SectionBuffer, Style, ToolDescriptor, ToolRegistry,
    Value, Word,
};
use rrfpost_settings::{PostSettings, ProbeMode};
use tracing::debug;

use crate::codes::{self, field, gcode, mcode};
use crate::error::{PostError, PostResult};

/// Name reported in the generated header.
pub const GENERATOR: &str = "rrfpost";
/// Version reported in the header and checked against the firmware.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Machine modal state tracked across one generation run.
#[derive(Debug, Default)]
struct MachineState {
    active_frame: Option<u16>,
    /// Frames in arrival order, duplicates preserved on revisit.
    used_frames: Vec<u16>,
    spindle_running: bool,
    /// Whether an X or Y word has been emitted in the current operation.
    xy_seen: bool,
    /// A rendered Z-only move held until the cut location is known.
    pending_z: Option<String>,
}

/// The stateful emission engine. One instance per generation run.
pub struct Post {
    settings: PostSettings,
    state: MachineState,
    tools: ToolRegistry,
    sections: SectionBuffer,
    g: CommandFormat,
    m: CommandFormat,
    t: CommandFormat,
}

fn g_format() -> CommandFormat {
    let axis = |prefix| FieldFormat::new(prefix, Style::Fixed(3));
    CommandFormat::new("G", Style::Fixed(3))
        .ctrl(Ctrl::FORCE)
        .modal_group(&[0.0, 1.0, 2.0, 3.0])
        .field(axis(field::X))
        .field(axis(field::Y))
        .field(axis(field::Z))
        .field(axis(field::ARC_X).ctrl(Ctrl::NONZERO))
        .field(axis(field::ARC_Y).ctrl(Ctrl::NONZERO))
        .field(axis(field::ARC_Z).ctrl(Ctrl::NONZERO))
        .field(axis(field::ARC_R).ctrl(Ctrl::NONZERO))
        .field(FieldFormat::new(field::FEED, Style::Fixed(3)).ctrl(Ctrl::NONZERO))
        .field(FieldFormat::new(field::ARC_R, Style::Quoted).accepts(Accepts::Text))
        .field(FieldFormat::new(field::FRAME, Style::Fixed(0)))
}

fn m_format() -> CommandFormat {
    // Prefixes shared between a quoted text form and a numeric form are
    // resolved by type, text first.
    let quoted = |prefix| {
        FieldFormat::new(prefix, Style::Quoted)
            .accepts(Accepts::Text)
            .ctrl(Ctrl::FORCE)
    };
    CommandFormat::new("M", Style::Fixed(3))
        .ctrl(Ctrl::FORCE)
        .field(FieldFormat::new("I", Style::Plain).ctrl(Ctrl::FORCE))
        .field(quoted("P"))
        .field(FieldFormat::new("P", Style::Fixed(0)).ctrl(Ctrl::FORCE))
        .field(quoted("R"))
        .field(FieldFormat::new("R", Style::Fixed(3)).ctrl(Ctrl::FORCE))
        .field(FieldFormat::new(field::TOOL, Style::Fixed(0)).ctrl(Ctrl::FORCE))
        .field(quoted(field::RPM))
        .field(FieldFormat::new(field::RPM, Style::Fixed(0)).ctrl(Ctrl::FORCE))
        .field(quoted("V"))
        .field(FieldFormat::new("V", Style::Fixed(0)).ctrl(Ctrl::FORCE))
}

fn t_format() -> CommandFormat {
    CommandFormat::new("T", Style::Fixed(3)).ctrl(Ctrl::FORCE)
}

impl Post {
    /// A fresh engine for one generation run.
    pub fn new(settings: PostSettings) -> Self {
        let mut post = Self {
            settings,
            state: MachineState::default(),
            tools: ToolRegistry::new(),
            sections: SectionBuffer::new(),
            g: g_format(),
            m: m_format(),
            t: t_format(),
        };
        post.header();
        post
    }

    /// The tools registered so far, in registration order.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Traverse the source operations, writing the run section.
    pub fn process(&mut self, operations: &[Operation]) -> PostResult<()> {
        self.sections.begin(Section::Run, Placement::Append);
        let result = operations.iter().try_for_each(|op| self.operation(op));
        self.sections.end();
        result
    }

    /// Emit preamble and postamble and return the whole program text.
    pub fn finish(mut self) -> PostResult<String> {
        self.preamble()?;
        self.postamble()?;
        Ok(self.sections.finalize())
    }

    /// Rapid move helper for host bindings.
    pub fn rapid(&mut self, x: f64, y: f64, z: f64) -> PostResult<()> {
        self.command(
            &Command::g(gcode::RAPID)
                .with(field::X, x)
                .with(field::Y, y)
                .with(field::Z, z),
        )
    }

    /// Linear move helper for host bindings.
    pub fn linear(&mut self, x: f64, y: f64, z: f64, feed: f64) -> PostResult<()> {
        self.command(
            &Command::g(gcode::LINEAR)
                .with(field::X, x)
                .with(field::Y, y)
                .with(field::Z, z)
                .with(field::FEED, feed),
        )
    }

    /// Dispatch one canonical command to its category handler.
    pub fn command(&mut self, command: &Command) -> PostResult<()> {
        match command.word {
            Word::G => self.g_command(command.code, &command.params),
            Word::M => self.m_command(command.code, &command.params),
        }
    }

    fn operation(&mut self, op: &Operation) -> PostResult<()> {
        self.sections.blank();
        match &op.kind {
            OperationKind::Dialog { text } => self.on_dialog(text)?,
            OperationKind::Fixture => self.on_fixture(),
            OperationKind::ToolController(tool) => self.on_tool_controller(tool)?,
            OperationKind::Milling => self.on_milling(&op.label)?,
        }
        for (index, command) in op.commands.iter().enumerate() {
            self.command(command).map_err(|e| e.at(&op.label, index))?;
        }
        Ok(())
    }

    fn g_command(&mut self, code: f64, params: &Params) -> PostResult<()> {
        if codes::UNSUPPORTED.contains(&code) {
            debug!(code, "dropping unsupported code");
            return Ok(());
        }
        if code == gcode::PARK {
            self.on_park(params)
        } else if let Some(frame) = codes::frame_ordinal(code) {
            self.on_frame_switch(frame, code, params)
        } else if codes::is_move(code) {
            self.on_move(code, params)
        } else {
            self.emit_g(code, params)
        }
    }

    fn m_command(&mut self, code: f64, params: &Params) -> PostResult<()> {
        if codes::TOOL_CHANGES.contains(&code) {
            if let Some(tool) = params.get(field::TOOL) {
                let tool = tool.clone();
                return self.on_tool_change(&tool);
            }
        }
        if codes::SPINDLE_START.contains(&code) || codes::SPINDLE_STOP.contains(&code) {
            self.on_spindle(code, params)
        } else {
            self.emit_m(code, params)
        }
    }

    /// Park retracts and stops the spindle; the firmware preserves none of
    /// the tool, feed or spindle state across it.
    fn on_park(&mut self, params: &Params) -> PostResult<()> {
        self.force_tool();
        self.force_feed();
        self.force_spindle();
        self.state.spindle_running = false;
        self.emit_g(gcode::PARK, params)
    }

    fn on_frame_switch(&mut self, frame: u16, code: f64, params: &Params) -> PostResult<()> {
        self.state.used_frames.push(frame);

        if self.state.active_frame.is_some() {
            self.sections.comment("Park ready for WCS change");
            self.on_park(&Params::new())?;
            self.sections.blank();
        }

        self.sections.comment(format!("Switch to WCS {frame}"));
        self.emit_g(code, params)?;
        self.state.active_frame = Some(frame);
        self.sections.blank();

        // With the frame active, probing and rotation compensation apply
        // to it implicitly.
        if self.settings.probe_mode == ProbeMode::OnChange {
            self.probe(None)?;
            self.state.spindle_running = false;
        }
        self.sections.comment("Enable rotation compensation if necessary");
        self.emit_m(mcode::ENABLE_ROTATION_COMPENSATION, &Params::new())
    }

    fn on_move(&mut self, code: f64, params: &Params) -> PostResult<()> {
        // Linear and arc geometry are independent modal families; never
        // let one silently inherit stale values across a family switch.
        if codes::LINEAR_MOVES.contains(&code) {
            self.force_arc_fields();
        }
        if codes::ARC_MOVES.contains(&code) {
            self.force_linear_fields();
        }

        let Some(mut out) = self.g.emit(code, params)? else {
            return Ok(());
        };
        if out.changed.is_empty() {
            return Ok(());
        }

        if out.changed.contains_key(field::FEED) {
            // A feed-only line has no motion; hold the feed for the next
            // axis-bearing move instead.
            if out.changed.len() == 1 {
                self.force_feed();
                return Ok(());
            }
            // Rapids follow machine limits; their feed word is meaningless.
            if codes::is_rapid(code) {
                out.remove(field::FEED);
                self.force_feed();
            }
        }

        if !self.state.xy_seen {
            let z_changed = out.changed.contains_key(field::Z);
            let xy_changed =
                out.changed.contains_key(field::X) || out.changed.contains_key(field::Y);
            if z_changed && !xy_changed {
                // Last one wins; a replaced pending move is never emitted.
                debug!(line = %out.line(), "deferring Z-only move until XY");
                self.state.pending_z = Some(out.line());
                return Ok(());
            }
            if xy_changed {
                self.state.xy_seen = true;
                if let Some(line) = self.state.pending_z.take() {
                    self.sections.blank();
                    self.sections.comment("Deferred Z move");
                    self.sections.command(line);
                    self.sections.blank();
                }
            }
        }

        self.sections.command(out.line());
        Ok(())
    }

    /// Tool changes reach the firmware as a bare tool select; the firmware
    /// parks, stops the spindle and runs its own change workflow.
    fn on_tool_change(&mut self, tool: &Value) -> PostResult<()> {
        let index = tool
            .as_number()
            .ok_or_else(|| FormatError::UnrenderableValue {
                prefix: field::TOOL.to_string(),
                value: tool.to_string(),
            })?;
        if let Some(out) = self.t.emit(index, &Params::new())? {
            self.sections.command(out.line());
        }
        self.state.spindle_running = false;
        self.sections.blank();
        Ok(())
    }

    fn on_spindle(&mut self, code: f64, params: &Params) -> PostResult<()> {
        let rpm_requested = params
            .get(field::RPM)
            .and_then(Value::as_number)
            .is_some_and(|rpm| rpm != 0.0);
        if codes::SPINDLE_START.contains(&code) && rpm_requested {
            self.sections
                .comment("Start spindle at requested RPM and wait for it to accelerate");
            self.state.spindle_running = true;
        }
        if codes::SPINDLE_STOP.contains(&code) {
            self.sections
                .comment("Stop spindle and wait for it to decelerate");
            self.state.spindle_running = false;
        }
        // Fractional variant that waits for the speed to stabilise.
        self.emit_m(code + codes::SPINDLE_WAIT_SUFFIX, params)
    }

    fn on_dialog(&mut self, text: &str) -> PostResult<()> {
        self.sections.comment("Output confirmable dialog to operator");
        let params = Params::new()
            .with("R", GENERATOR)
            .with("S", sanitize_quoted(text));
        self.emit_m(mcode::SHOW_DIALOG, &params)
    }

    /// Fixture markers leave machine modal state unknown.
    fn on_fixture(&mut self) {
        self.force_tool();
        self.force_feed();
        self.force_spindle();
        self.state.spindle_running = false;
    }

    fn on_tool_controller(&mut self, tool: &ToolDescriptor) -> PostResult<()> {
        self.sections.comment(format!("TC: {}", tool.name));
        self.tools.register(tool.clone())?;
        Ok(())
    }

    fn on_milling(&mut self, label: &str) -> PostResult<()> {
        self.sections.comment(format!("Begin Operation: {label}"));
        if !self.state.spindle_running && !self.settings.allow_zero_rpm {
            return Err(PostError::SpindleNotRunning {
                operation: label.to_string(),
            });
        }
        // Operations may arrive out of the modal order the machine last
        // saw; re-announce every group from scratch.
        self.state.xy_seen = false;
        self.force_all();
        Ok(())
    }

    fn probe(&mut self, frame: Option<u16>) -> PostResult<()> {
        let params = match frame {
            Some(n) => {
                self.sections
                    .comment(format!("Probe origin and save in WCS {n}"));
                Params::new().with(field::FRAME, f64::from(n))
            }
            None => {
                self.sections.comment("Probe origin in current WCS");
                Params::new()
            }
        };
        self.emit_g(gcode::PROBE_OPERATOR, &params)?;
        self.sections.blank();
        Ok(())
    }

    fn header(&mut self) {
        self.sections.begin(Section::Pre, Placement::Append);
        self.sections
            .comment(format!("Generated by {GENERATOR} v{VERSION}"));
        self.sections.comment(format!("Output Time: {}", Utc::now()));
        self.sections.blank();
        self.sections.comment(
            "WARNING: This gcode was generated to target a singular firmware configuration.",
        );
        self.sections.comment(
            "The firmware implements safety checks and spindle controls this gcode assumes to exist.",
        );
        self.sections
            .comment("DO NOT RUN THIS GCODE ON A MACHINE OR FIRMWARE WITHOUT THESE CHECKS!");
        self.sections.blank();
        self.sections.end();
    }

    fn preamble(&mut self) -> PostResult<()> {
        self.sections.begin(Section::Pre, Placement::Append);
        let result = self.preamble_inner();
        self.sections.end();
        result
    }

    fn preamble_inner(&mut self) -> PostResult<()> {
        self.sections.comment("Begin preamble");

        if self.settings.version_check {
            self.sections.blank();
            self.sections
                .comment("Check firmware version matches the post-processor");
            self.emit_m(mcode::VERSION_CHECK, &Params::new().with("V", VERSION))?;
        }

        if self.settings.output_tools && !self.tools.is_empty() {
            self.sections.blank();
            self.sections.comment("Pass tool details to firmware");
            let table: Vec<Params> = self
                .tools
                .iter()
                .map(|tool| {
                    let name: String = tool.name.chars().take(32).collect();
                    Params::new()
                        .with("P", f64::from(tool.index))
                        .with("R", tool.radius)
                        .with("S", sanitize_quoted(&name))
                })
                .collect();
            for params in &table {
                self.emit_m(mcode::ADD_TOOL, params)?;
            }
            self.sections.blank();
        }

        if self.settings.output_job_setup {
            if self.settings.home_before_start {
                self.sections.comment("Home before start");
                self.emit_g(gcode::HOME, &Params::new())?;
                self.sections.blank();
            }

            self.sections.comment("Probe reference surface if necessary");
            self.emit_g(gcode::PROBE_REFERENCE_SURFACE, &Params::new())?;
            self.sections.blank();

            self.sections
                .comment(format!("WCS Probing Mode: {}", self.settings.probe_mode));
            self.sections.blank();
            if self.settings.probe_mode == ProbeMode::AtStart {
                // Revisited frames appear, and probe, once per visit.
                for frame in self.state.used_frames.clone() {
                    self.probe(Some(frame))?;
                }
            }
        }

        self.sections.comment("Movement configuration");
        self.emit_g(gcode::ABSOLUTE, &Params::new())?;
        self.emit_g(gcode::MILLIMETERS, &Params::new())?;
        self.emit_g(gcode::FEED_PER_MIN, &Params::new())?;
        self.sections.blank();

        if self.settings.vssc.enabled {
            self.sections
                .comment("Enable Variable Spindle Speed Control");
            let params = Params::new()
                .with("P", self.settings.vssc.period_ms)
                .with("V", self.settings.vssc.variance_rpm);
            self.emit_m(mcode::VSSC_ENABLE, &params)?;
        }
        Ok(())
    }

    fn postamble(&mut self) -> PostResult<()> {
        self.sections.begin(Section::Post, Placement::Append);
        let result = self.postamble_inner();
        self.sections.end();
        result
    }

    fn postamble_inner(&mut self) -> PostResult<()> {
        self.sections.blank();
        self.sections.comment("Begin postamble");
        self.sections.blank();
        self.sections.comment("Park at user-defined location");
        self.on_park(&Params::new())?;
        self.sections.blank();

        if self.settings.vssc.enabled {
            self.sections
                .comment("Disable Variable Spindle Speed Control");
            self.emit_m(mcode::VSSC_DISABLE, &Params::new())?;
            self.sections.blank();
        }

        self.sections.comment("Double-check spindle is stopped!");
        self.on_spindle(codes::SPINDLE_STOP[0], &Params::new())
    }

    fn emit_g(&mut self, code: f64, params: &Params) -> PostResult<()> {
        if let Some(out) = self.g.emit(code, params)? {
            self.sections.command(out.line());
        }
        Ok(())
    }

    fn emit_m(&mut self, code: f64, params: &Params) -> PostResult<()> {
        if let Some(out) = self.m.emit(code, params)? {
            self.sections.command(out.line());
        }
        Ok(())
    }

    fn force_feed(&mut self) {
        self.g.reset(&[field::FEED]);
    }

    fn force_tool(&mut self) {
        self.t.reset(&[field::TOOL]);
    }

    fn force_spindle(&mut self) {
        self.m.reset(&[field::RPM]);
    }

    fn force_arc_fields(&mut self) {
        self.g
            .reset(&[field::ARC_X, field::ARC_Y, field::ARC_Z, field::ARC_R]);
    }

    fn force_linear_fields(&mut self) {
        self.g.reset(&[field::X, field::Y, field::Z]);
    }

    fn force_all(&mut self) {
        self.force_feed();
        self.force_tool();
        self.force_spindle();
        self.force_arc_fields();
        self.force_linear_fields();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> PostSettings {
        PostSettings {
            allow_zero_rpm: true,
            version_check: false,
            output_job_setup: false,
            vssc: rrfpost_settings::VsscSettings {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn run_lines(post: Post) -> Vec<String> {
        post.finish()
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_spindle_start_uses_wait_variant() {
        let mut post = Post::new(quiet());
        post.command(&Command::m(3.0).with("S", 10000.0)).unwrap();
        let lines = run_lines(post);
        assert!(lines.iter().any(|l| l == "M3.9 S10000"));
        assert!(!lines.iter().any(|l| l.starts_with("M3 ")));
    }

    #[test]
    fn test_tool_change_emits_tool_select_only() {
        let mut post = Post::new(quiet());
        post.command(&Command::m(6.0).with("T", 2.0)).unwrap();
        let lines = run_lines(post);
        assert!(lines.iter().any(|l| l == "T2"));
        assert!(!lines.iter().any(|l| l.starts_with("M6")));
    }

    #[test]
    fn test_unsupported_codes_dropped() {
        let mut post = Post::new(quiet());
        post.command(&Command::g(98.0)).unwrap();
        post.command(&Command::g(99.0)).unwrap();
        let lines = run_lines(post);
        assert!(!lines.iter().any(|l| l.starts_with("G98") || l.starts_with("G99")));
    }

    #[test]
    fn test_frame_switch_tracks_used_frames() {
        let mut post = Post::new(quiet());
        post.command(&Command::g(54.0)).unwrap();
        post.command(&Command::g(55.0)).unwrap();
        post.command(&Command::g(54.0)).unwrap();
        assert_eq!(post.state.used_frames, vec![1, 2, 1]);
        assert_eq!(post.state.active_frame, Some(1));
    }

    #[test]
    fn test_move_helpers_render_axis_words() {
        let mut post = Post::new(quiet());
        post.rapid(5.0, 5.0, 10.0).unwrap();
        post.linear(10.0, 5.0, 2.0, 300.0).unwrap();
        let lines = run_lines(post);
        assert!(lines.iter().any(|l| l == "G0 X5 Y5 Z10"));
        // Y is unchanged and stays silent.
        assert!(lines.iter().any(|l| l == "G1 X10 Z2 F300"));
    }

    #[test]
    fn test_dialog_sanitizes_text() {
        let mut post = Post::new(quiet());
        let ops = [Operation::new(
            "Note",
            OperationKind::Dialog {
                text: "check <clamps> \"now\"".to_string(),
            },
        )];
        post.process(&ops).unwrap();
        let lines = run_lines(post);
        assert!(lines
            .iter()
            .any(|l| l == "M3000 R\"rrfpost\" S\"check clamps \"\"now\"\"\""));
    }
}
