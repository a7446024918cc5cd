// host.rs — Opaque host-side types the patch reads but never owns.
//
// The real definitions live in the host assembly. This module mirrors just
// the surface the rotation policy touches: the player motor's current mode
// (a public field) and a read-only view used to look the player up in the
// scene and to read the mod options each frame.

use std::cell::Cell;
use std::rc::Rc;

use crate::config::SteeringOptions;

/// Movement mode of the player motor. `Glide` is the secondary vehicle
/// mode, which carries its own (steeper) forward bias.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotorMode {
    Walk,
    Dive,
    Glide,
}

/// The host's player/motor component. Only `motor_mode` is ever read.
#[derive(Debug)]
pub struct PlayerMotor {
    pub motor_mode: Cell<MotorMode>,
}

impl PlayerMotor {
    pub fn new(mode: MotorMode) -> Self {
        Self {
            motor_mode: Cell::new(mode),
        }
    }
}

/// Read-only view of the host scene and options store.
///
/// `options()` returns `None` while the options accessor itself is not up
/// yet; that counts as both toggles off. `find_player()` returning `None`
/// only means "not spawned yet" and is retried freely on later frames.
pub trait HostView {
    fn options(&self) -> Option<SteeringOptions>;
    fn find_player(&self) -> Option<Rc<PlayerMotor>>;
}
