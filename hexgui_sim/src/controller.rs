//! Mock hexapod controller.
//!
//! [`MockController`] reproduces the externally visible behavior of the real
//! controller: the Standby / Enabled / Fault state machine, command
//! acknowledgement, point-to-point motion and the status registers in its
//! telemetry. Faults are not generated on their own; tests and the operator
//! inject them through [`Injection`].

use hexgui_common::consts::{
    MAX_ACCEL_LIMIT, MAX_ACTUATOR_RANGE_MIC, MAX_ANGULAR_VEL_LIMIT, MAX_LINEAR_VEL_LIMIT,
    NUM_DRIVE, NUM_STRUT,
};
use hexgui_common::controller::{
    ApplicationStatus, CommandKind, CommandSource, ControllerConfig, ControllerState, CopleyStatus,
    EnabledSubstate, HexapodKind, InputPins, LatchingFault, LimitDirection, Pose, StateTrigger,
    StatusWord, SubstateTrigger, TelemetryFrame, WireCommand,
};
use hexgui_common::wire::ControllerMessage;
use tracing::{debug, info, warn};

use crate::motion::{pose_to_struts, step_pose, step_struts};

/// Strut current while drives are enabled [A].
pub const STRUT_CURRENT: f64 = 0.8;

/// Drive bus voltage [V].
pub const BUS_VOLTAGE: f64 = 330.0;

/// Maximum strut speed [µm/s].
pub const STRUT_SPEED: f64 = 500.0;

/// Default pivot x, y, z [µm].
pub const PIVOT: [f64; 3] = [0.0, 0.0, -703_000.0];

/// Copley status reported by an idle healthy drive.
const COPLEY_STATUS_IDLE: u32 = 0xF000;

const STATUS_WORD_DRIVES_ON: u16 = 0x637;
const STATUS_WORD_DRIVES_OFF: u16 = 0x670;

/// Overtravel applied when a limit switch is forced [µm].
const OVERTRAVEL_UM: f64 = 100.0;

/// Externally forced condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Injection {
    /// Open or close the safety interlock chain.
    InterlockOpen(bool),
    /// Drive one strut past its travel so the switch trips.
    StrutOvertravel {
        strut: usize,
        direction: LimitDirection,
    },
    /// Set latching fault bits on one strut.
    LatchedFault { strut: usize, bits: LatchingFault },
    /// EtherCAT network down or back up.
    EthercatDown(bool),
    /// Clear latched faults and restart in Standby.
    PowerCycle,
    /// Stop publishing telemetry while true.
    Silence(bool),
    /// Acknowledge commands without executing them while true.
    AckOnly(bool),
    /// Swallow commands without acknowledging them while true.
    DropAcks(bool),
    /// Close the current link.
    DropLink,
}

/// Reply to one received command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    /// `None` when acknowledgements are being dropped.
    pub ack: Option<ControllerMessage>,
    /// New configuration to publish, if the command changed it.
    pub config: Option<ControllerConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    Pose(Pose),
    Struts([f64; NUM_STRUT]),
}

/// Simulated controller.
#[derive(Debug, Clone)]
pub struct MockController {
    hexapod: HexapodKind,
    state: ControllerState,
    config: ControllerConfig,
    csc_commander: bool,

    pose: Pose,
    commanded_pose: Pose,
    struts: [f64; NUM_STRUT],
    strut_commanded: [f64; NUM_STRUT],
    strut_accel: [f64; NUM_STRUT],
    /// Target stored by position/offset/raw commands, consumed by Move.
    pending_target: Option<Target>,
    /// Target of the move in progress.
    active_target: Option<Target>,
    /// Move accepted this cycle; the first frame reports it before stepping.
    move_starting: bool,

    masked: Option<LimitDirection>,
    interlock_open: bool,
    ethercat_down: bool,
    latched: [LatchingFault; NUM_STRUT],

    silenced: bool,
    ack_only: bool,
    drop_acks: bool,
    drop_link: bool,
    /// Command frames seen on the link, dropped ones included.
    received: u64,
}

impl MockController {
    pub fn new(hexapod: HexapodKind) -> Self {
        Self {
            hexapod,
            state: ControllerState::Standby,
            config: Self::initial_config(hexapod),
            csc_commander: false,
            pose: Pose::default(),
            commanded_pose: Pose::default(),
            struts: [0.0; NUM_STRUT],
            strut_commanded: [0.0; NUM_STRUT],
            strut_accel: [0.0; NUM_STRUT],
            pending_target: None,
            active_target: None,
            move_starting: false,
            masked: None,
            interlock_open: false,
            ethercat_down: false,
            latched: [LatchingFault::empty(); NUM_STRUT],
            silenced: false,
            ack_only: false,
            drop_acks: false,
            drop_link: false,
            received: 0,
        }
    }

    fn initial_config(hexapod: HexapodKind) -> ControllerConfig {
        ControllerConfig {
            acceleration_strut: MAX_ACCEL_LIMIT,
            vel_xy: MAX_LINEAR_VEL_LIMIT,
            vel_z: MAX_LINEAR_VEL_LIMIT,
            vel_uv: MAX_ANGULAR_VEL_LIMIT,
            vel_w: MAX_ANGULAR_VEL_LIMIT,
            max_displacement_strut: MAX_ACTUATOR_RANGE_MIC,
            max_velocity_strut: STRUT_SPEED,
            pose_limits: hexapod.pose_limits(),
            pivot: PIVOT,
            drives_enabled: false,
        }
    }

    #[inline]
    pub const fn hexapod(&self) -> HexapodKind {
        self.hexapod
    }

    #[inline]
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[inline]
    pub const fn pose(&self) -> Pose {
        self.pose
    }

    #[inline]
    pub const fn masked(&self) -> Option<LimitDirection> {
        self.masked
    }

    #[inline]
    pub const fn commands_received(&self) -> u64 {
        self.received
    }

    /// Whether the link should be closed; clears the request.
    pub fn take_link_drop(&mut self) -> bool {
        std::mem::take(&mut self.drop_link)
    }

    // ─── Fault conditions ───────────────────────────────────────────

    fn extend_hit(&self, strut: usize) -> bool {
        self.struts[strut] > self.config.max_displacement_strut
    }

    fn retract_hit(&self, strut: usize) -> bool {
        self.struts[strut] < -self.config.max_displacement_strut
    }

    fn limit_hit(&self, direction: LimitDirection) -> bool {
        (0..NUM_STRUT).any(|i| match direction {
            LimitDirection::Extend => self.extend_hit(i),
            LimitDirection::Retract => self.retract_hit(i),
        })
    }

    fn unmasked_limit_hit(&self) -> bool {
        [LimitDirection::Extend, LimitDirection::Retract]
            .into_iter()
            .any(|d| self.masked != Some(d) && self.limit_hit(d))
    }

    fn latched_any(&self) -> bool {
        self.latched.iter().any(|l| !l.is_empty())
    }

    /// Any condition that forces the Fault state.
    fn fault_active(&self) -> bool {
        self.interlock_open || self.ethercat_down || self.latched_any() || self.unmasked_limit_hit()
    }

    fn enter_fault(&mut self, why: &str) {
        warn!(reason = why, "mock controller entering Fault");
        self.state = ControllerState::Fault;
        self.active_target = None;
        self.pending_target = None;
        self.config.drives_enabled = false;
    }

    // ─── Commands ───────────────────────────────────────────────────

    /// Execute one command and build the acknowledgement.
    pub fn handle_command(&mut self, wire: &WireCommand) -> CommandReply {
        self.received += 1;
        if self.drop_acks {
            debug!(counter = wire.counter, "dropping command");
            return CommandReply {
                ack: None,
                config: None,
            };
        }

        let Some(kind) = CommandKind::from_wire(wire) else {
            return CommandReply {
                ack: Some(ControllerMessage::rejected(
                    wire.counter,
                    format!("unknown command code {:#06x}", wire.code),
                )),
                config: None,
            };
        };

        if self.ack_only {
            debug!(command = kind.name(), "acknowledging without executing");
            return CommandReply {
                ack: Some(ControllerMessage::accepted(wire.counter)),
                config: None,
            };
        }

        let config_before = self.config.clone();
        let result = self.execute(&kind);

        // A stored target only survives the command that set it.
        if !kind.sets_target() {
            self.pending_target = None;
        }

        let ack = match result {
            Ok(()) => {
                info!(command = kind.name(), "command executed");
                ControllerMessage::accepted(wire.counter)
            }
            Err(reason) => {
                warn!(command = kind.name(), reason, "command rejected");
                ControllerMessage::rejected(wire.counter, reason)
            }
        };
        let config = (self.config != config_before).then(|| self.config.clone());
        CommandReply {
            ack: Some(ack),
            config,
        }
    }

    fn execute(&mut self, kind: &CommandKind) -> Result<(), &'static str> {
        if self.csc_commander && !matches!(kind, CommandKind::SwitchCommandSource(_)) {
            return Err("CSC is the commander");
        }

        match *kind {
            CommandKind::SetState(trigger) => self.set_state(trigger),
            CommandKind::SetEnabledSubstate { trigger, .. } => match trigger {
                SubstateTrigger::Move => self.start_move(),
                SubstateTrigger::Stop => {
                    if !self.state.is_enabled() {
                        return Err("not enabled");
                    }
                    self.active_target = None;
                    self.state = ControllerState::ENABLED_ENTRY;
                    Ok(())
                }
            },
            CommandKind::SetPosition(pose) => {
                self.assert_stationary()?;
                self.pending_target = Some(Target::Pose(pose));
                Ok(())
            }
            CommandKind::SetPositionOffset(offset) => {
                self.assert_stationary()?;
                self.pending_target = Some(Target::Pose(self.pose.offset_by(&offset)));
                Ok(())
            }
            CommandKind::SetRawPosition { struts } => {
                self.assert_stationary()?;
                self.pending_target = Some(Target::Struts(struts));
                Ok(())
            }
            CommandKind::SetPivot { x, y, z } => {
                self.assert_standby_or_stationary()?;
                self.config.pivot = [x, y, z];
                Ok(())
            }
            CommandKind::SwitchCommandSource(source) => {
                self.csc_commander = source == CommandSource::Csc;
                Ok(())
            }
            CommandKind::MaskLimitSwitch(direction) => {
                if matches!(
                    self.state,
                    ControllerState::Enabled(EnabledSubstate::MovingPointToPoint)
                ) {
                    return Err("cannot mask while moving");
                }
                self.masked = Some(direction);
                Ok(())
            }
            CommandKind::EnableDrives(on) => {
                self.assert_standby_or_stationary()?;
                self.config.drives_enabled = on;
                Ok(())
            }
            CommandKind::ConfigAcceleration(accel) => {
                self.assert_standby_or_stationary()?;
                check_positive(accel, MAX_ACCEL_LIMIT)?;
                self.config.acceleration_strut = accel;
                Ok(())
            }
            CommandKind::ConfigVelocity { xy, uv, z, w } => {
                self.assert_standby_or_stationary()?;
                check_positive(xy, MAX_LINEAR_VEL_LIMIT)?;
                check_positive(uv, MAX_ANGULAR_VEL_LIMIT)?;
                check_positive(z, MAX_LINEAR_VEL_LIMIT)?;
                check_positive(w, MAX_ANGULAR_VEL_LIMIT)?;
                self.config.vel_xy = xy;
                self.config.vel_z = z;
                self.config.vel_uv = uv;
                self.config.vel_w = w;
                Ok(())
            }
        }
    }

    fn set_state(&mut self, trigger: StateTrigger) -> Result<(), &'static str> {
        match (trigger, self.state) {
            (StateTrigger::Enable, ControllerState::Standby) => {
                if self.fault_active() {
                    return Err("fault condition present");
                }
                self.state = ControllerState::ENABLED_ENTRY;
                self.config.drives_enabled = true;
                Ok(())
            }
            (StateTrigger::Standby, ControllerState::Enabled(_)) => {
                self.active_target = None;
                self.state = ControllerState::Standby;
                self.config.drives_enabled = false;
                Ok(())
            }
            (StateTrigger::Standby | StateTrigger::ClearError, ControllerState::Fault) => {
                // Accepted either way; the state only changes once the
                // conditions are gone.
                if !self.fault_active() {
                    self.state = ControllerState::Standby;
                }
                Ok(())
            }
            _ => Err("command not allowed in current state"),
        }
    }

    fn start_move(&mut self) -> Result<(), &'static str> {
        self.assert_stationary()?;
        let Some(target) = self.pending_target else {
            return Err("must set the position or offset first");
        };
        match target {
            Target::Pose(pose) => {
                self.commanded_pose = pose;
                self.strut_commanded = pose_to_struts(&pose);
            }
            Target::Struts(struts) => self.strut_commanded = struts,
        }
        self.strut_accel = [self.config.acceleration_strut; NUM_STRUT];
        self.active_target = Some(target);
        self.move_starting = true;
        self.state = ControllerState::Enabled(EnabledSubstate::MovingPointToPoint);
        Ok(())
    }

    fn assert_stationary(&self) -> Result<(), &'static str> {
        if self.state.is_stationary() {
            Ok(())
        } else {
            Err("not enabled and stationary")
        }
    }

    fn assert_standby_or_stationary(&self) -> Result<(), &'static str> {
        if self.state.is_stationary() || self.state == ControllerState::Standby {
            Ok(())
        } else {
            Err("not in standby or enabled and stationary")
        }
    }

    // ─── Injection ──────────────────────────────────────────────────

    pub fn inject(&mut self, injection: Injection) {
        info!(?injection, "injecting");
        match injection {
            Injection::InterlockOpen(open) => self.interlock_open = open,
            Injection::StrutOvertravel { strut, direction } => {
                if strut < NUM_STRUT {
                    let travel = self.config.max_displacement_strut + OVERTRAVEL_UM;
                    self.struts[strut] = match direction {
                        LimitDirection::Extend => travel,
                        LimitDirection::Retract => -travel,
                    };
                }
            }
            Injection::LatchedFault { strut, bits } => {
                if strut < NUM_STRUT {
                    self.latched[strut] |= bits;
                }
            }
            Injection::EthercatDown(down) => self.ethercat_down = down,
            Injection::PowerCycle => {
                self.latched = [LatchingFault::empty(); NUM_STRUT];
                self.active_target = None;
                self.pending_target = None;
                self.config.drives_enabled = false;
                self.state = ControllerState::Standby;
            }
            Injection::Silence(on) => self.silenced = on,
            Injection::AckOnly(on) => self.ack_only = on,
            Injection::DropAcks(on) => self.drop_acks = on,
            Injection::DropLink => self.drop_link = true,
        }
    }

    // ─── Telemetry ──────────────────────────────────────────────────

    /// Advance one cycle and build the telemetry frame.
    ///
    /// Returns `None` while silenced; the controller still advances.
    pub fn tick(&mut self, tai: f64) -> Option<TelemetryFrame> {
        if self.state.is_enabled() && self.fault_active() {
            self.enter_fault("fault condition while enabled");
        }

        let moving = self.advance_motion();

        if let Some(direction) = self.masked {
            let within_travel = self
                .struts
                .iter()
                .all(|s| s.abs() <= self.config.max_displacement_strut);
            if within_travel && !self.limit_hit(direction) {
                info!(?direction, "limit switch unmasked");
                self.masked = None;
            }
        }

        let frame = self.build_frame(tai, moving);
        (!self.silenced).then_some(frame)
    }

    fn advance_motion(&mut self) -> bool {
        if self.state != ControllerState::Enabled(EnabledSubstate::MovingPointToPoint) {
            return false;
        }
        if std::mem::take(&mut self.move_starting) {
            return true;
        }
        let done = match self.active_target {
            Some(Target::Pose(target)) => {
                let done = step_pose(&mut self.pose, &target);
                self.struts = pose_to_struts(&self.pose);
                done
            }
            Some(Target::Struts(target)) => step_struts(&mut self.struts, &target),
            None => true,
        };
        if done {
            self.active_target = None;
            self.state = ControllerState::ENABLED_ENTRY;
        }
        !done
    }

    fn build_frame(&self, tai: f64, moving: bool) -> TelemetryFrame {
        let (state, substate) = match self.state {
            ControllerState::Standby => (0, 0),
            ControllerState::Enabled(sub) => (2, sub as u8),
            ControllerState::Fault => (3, 0),
        };

        let mut app = ApplicationStatus::EUI_CONNECTED | ApplicationStatus::SYNC_MODE;
        app.set(ApplicationStatus::CSC_COMMAND_SOURCE, self.csc_commander);
        app.set(ApplicationStatus::SAFETY_INTERLOCK, self.interlock_open);
        app.set(ApplicationStatus::ETHERCAT_PROBLEM, self.ethercat_down);
        app.set(ApplicationStatus::DRIVE_FAULT, self.latched_any());
        app.set(
            ApplicationStatus::EXTEND_LIMIT_SWITCH,
            self.limit_hit(LimitDirection::Extend),
        );
        app.set(
            ApplicationStatus::RETRACT_LIMIT_SWITCH,
            self.limit_hit(LimitDirection::Retract),
        );

        let drives_on = self.config.drives_enabled;
        let mut status_word = [0u16; NUM_STRUT];
        let mut copley_status = [0u32; NUM_STRUT];
        let mut latching_fault = [0u16; NUM_STRUT];
        for i in 0..NUM_STRUT {
            let mut word = StatusWord::from_bits_truncate(if drives_on {
                STATUS_WORD_DRIVES_ON
            } else {
                STATUS_WORD_DRIVES_OFF
            });
            word.set(StatusWord::IN_MOTION, moving);
            word.set(StatusWord::FAULT_LATCHED, !self.latched[i].is_empty());
            status_word[i] = word.bits();

            let mut copley = CopleyStatus::from_bits_truncate(COPLEY_STATUS_IDLE);
            copley.set(CopleyStatus::EXTEND_LIMIT_ACTIVE, self.extend_hit(i));
            copley.set(CopleyStatus::RETRACT_LIMIT_ACTIVE, self.retract_hit(i));
            copley_status[i] = copley.bits();

            latching_fault[i] = self.latched[i].bits();
        }

        let mut input_pins = [InputPins::NOMINAL.0; NUM_DRIVE];
        for (drive, pins) in input_pins.iter_mut().enumerate() {
            for slot in 0..2 {
                let strut = drive * 2 + slot;
                let offset = if slot == 0 { 5 } else { 15 };
                if self.interlock_open {
                    *pins &= !(0b001 << offset);
                }
                if self.extend_hit(strut) {
                    *pins &= !(0b010 << offset);
                }
                if self.retract_hit(strut) {
                    *pins &= !(0b100 << offset);
                }
            }
        }

        let current = if drives_on { STRUT_CURRENT } else { 0.0 };
        TelemetryFrame {
            timestamp: tai,
            state,
            enabled_substate: substate,
            application_status: app.bits(),
            strut_position: self.struts,
            strut_position_error: [0.0; NUM_STRUT],
            strut_commanded_position: self.strut_commanded,
            strut_commanded_accel: self.strut_accel,
            motor_current: [current; NUM_STRUT],
            bus_voltage: [BUS_VOLTAGE; NUM_DRIVE],
            pose: self.pose,
            commanded_pose: self.commanded_pose,
            status_word,
            latching_fault,
            copley_status,
            input_pins,
        }
    }
}

fn check_positive(value: f64, max: f64) -> Result<(), &'static str> {
    if value > 0.0 && value <= max {
        Ok(())
    } else {
        Err("value not in range (0, max]")
    }
}
