//! Operator confirmation capability.
//!
//! Dangerous commands ask before transmission. The console answers from
//! stdin; headless callers pass a closure or one of the fixed answers.

use hexgui_common::controller::{CommandKind, CommandSource, MotionPattern, SubstateTrigger};

/// Synchronous yes/no question to the operator.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Accepts every prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Declines every prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverConfirm;

impl Confirm for NeverConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Question asked before `kind` is sent while `commander` holds authority.
/// `None` when no confirmation is needed.
pub fn prompt_for(kind: &CommandKind, commander: CommandSource) -> Option<String> {
    if !kind.is_dangerous(commander) {
        return None;
    }
    let prompt = match kind {
        CommandKind::SetRawPosition { struts } => format!(
            "Raw strut move bypasses the pose kinematics. Targets [µm]: {struts:?}. Proceed?"
        ),
        CommandKind::SetPivot { x, y, z } => {
            format!("Change the pivot to ({x}, {y}, {z}) µm? This affects every later move.")
        }
        CommandKind::SetEnabledSubstate {
            trigger: SubstateTrigger::Move,
            pattern: MotionPattern::Async,
        } => "Asynchronous move: struts travel independently. Proceed?".to_string(),
        CommandKind::SwitchCommandSource(CommandSource::Gui) => {
            "The automated system (CSC) holds command authority. Take it over?".to_string()
        }
        other => format!("Send {}?", other.name()),
    };
    Some(prompt)
}

// ─── Tests ──────────────────────────────────────────────────────────
