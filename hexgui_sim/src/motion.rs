//! Motion model of the simulated hexapod.
//!
//! Motion is a fixed step per cycle toward the target, per axis; there is
//! no velocity profile. The pose to strut mapping is a linear stand-in for
//! the real kinematics, good enough to make strut telemetry follow pose
//! moves.

use hexgui_common::consts::NUM_STRUT;
use hexgui_common::controller::Pose;

/// Translation step per cycle [µm].
pub const CYCLE_MOVE_POSITION_UM: f64 = 100.0;

/// Rotation step per cycle [deg].
pub const CYCLE_MOVE_POSITION_DEG: f64 = 0.01;

/// Strut step per cycle for raw strut moves [µm].
pub const CYCLE_MOVE_STRUT_UM: f64 = 100.0;

const DEG_TO_UM_SCALE_FACTOR: f64 = 1e3;

/// Advance `current` toward `target` by at most `step`.
///
/// Returns whether the target is reached, and the new position.
pub fn move_toward(current: f64, target: f64, step: f64) -> (bool, f64) {
    if current == target {
        return (true, current);
    }

    let direction = (target - current).signum();
    let next = current + direction * step;
    if (direction > 0.0 && next >= target) || (direction < 0.0 && next <= target) {
        (true, target)
    } else {
        (false, next)
    }
}

/// Advance every pose axis one cycle toward `target`.
///
/// Returns whether all six axes have arrived.
pub fn step_pose(current: &mut Pose, target: &Pose) -> bool {
    let mut axes = current.to_array();
    let goal = target.to_array();
    let mut done = true;
    for (i, axis) in axes.iter_mut().enumerate() {
        let step = if i < 3 {
            CYCLE_MOVE_POSITION_UM
        } else {
            CYCLE_MOVE_POSITION_DEG
        };
        let (arrived, next) = move_toward(*axis, goal[i], step);
        *axis = next;
        done &= arrived;
    }
    *current = Pose::from_array(axes);
    done
}

/// Advance every strut one cycle toward `target`.
pub fn step_struts(current: &mut [f64; NUM_STRUT], target: &[f64; NUM_STRUT]) -> bool {
    let mut done = true;
    for (strut, goal) in current.iter_mut().zip(target) {
        let (arrived, next) = move_toward(*strut, *goal, CYCLE_MOVE_STRUT_UM);
        *strut = next;
        done &= arrived;
    }
    done
}

/// Strut lengths [µm] for a hexapod pose.
///
/// Even struts pick up x and ry, odd struts y and rx; all share z·√3 and rz.
pub fn pose_to_struts(pose: &Pose) -> [f64; NUM_STRUT] {
    let z = pose.z * 3f64.sqrt();
    let rz = pose.rz * DEG_TO_UM_SCALE_FACTOR;
    let even = z + rz + pose.x + pose.ry * DEG_TO_UM_SCALE_FACTOR;
    let odd = z + rz + pose.y + pose.rx * DEG_TO_UM_SCALE_FACTOR;
    std::array::from_fn(|i| if i % 2 == 0 { even } else { odd })
}
