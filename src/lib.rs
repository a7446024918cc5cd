// lib.rs — VR hand-steering patch for the host's underwater swim motor.
//
// Two halves, wired together by the mod bootstrap (which lives outside
// this crate):
//   1. patcher: rewrites one call inside the motor's UpdateMove body so
//      the rotation it computes comes from us instead (il + patcher).
//   2. steering: the replacement computation itself — steer by the VR
//      right-hand controller when the optional rig plugin is installed,
//      reproduce the host's original math when it is not.
//
// The patch is applied once at load time; HandSteering::rotation then runs
// once per frame inside the host's own update call. Everything here is
// single-threaded by contract with the host's game loop (hence the
// Cell/RefCell state on HandSteering).

pub mod config;
pub mod host;
pub mod il;
pub mod math;
pub mod patcher;
pub mod steering;

pub use config::SteeringOptions;
pub use host::{HostView, MotorMode, PlayerMotor};
pub use il::{Inst, MethodRef, Op, Operand};
pub use math::{Orientation, Vec3};
pub use patcher::{
    apply_move_update_patch, find_window, replace_at, OpMatch, PatchError, MOVE_UPDATE_SHAPE,
    MULTIPLY_OFFSET,
};
pub use steering::{
    HandSteering, NoSteering, ResolveError, RigFactory, RigRegistry, SteeringRig, RIG_PROVIDER,
};
