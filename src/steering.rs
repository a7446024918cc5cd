// steering.rs — Optional-dependency resolution and the replacement rotation
// computation for the swim motor.
//
// The VR rig ships as a separate plugin we cannot link against, so it is
// reached through the SteeringRig capability trait and a name-keyed plugin
// registry instead of a direct reference. Every lookup failure degrades to
// the host's original rotation math; once a failure is known to be
// permanent the policy disables itself for the rest of the process and
// stays silent afterwards. rotation() never panics and never surfaces an
// error to the host.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use once_cell::unsync::OnceCell;
use thiserror::Error;

use crate::config::SteeringOptions;
use crate::host::{HostView, MotorMode, PlayerMotor};
use crate::math::{self, Orientation, Vec3};

/// Well-known registry name of the VR rig provider (the analogue of the
/// rig plugin's fully qualified type name).
pub const RIG_PROVIDER: &str = "vr_rig.camera_rig";

/// Pitch offsets cancelling the host's forward bias, in degrees. The glide
/// vehicle sits steeper than free swimming.
const DIVE_PITCH_DEG: f32 = 45.0;
const GLIDE_PITCH_DEG: f32 = 60.0;

// ============================================================
// Capability surface
// ============================================================

/// Optional capability exposed by the VR rig plugin.
pub trait SteeringRig {
    /// World orientation of the right-hand controller, or `None` while the
    /// controller is untracked or the rig is torn down.
    fn try_controller_orientation(&self) -> Option<Orientation>;
}

/// Null object used when no rig plugin is installed.
pub struct NoSteering;

impl SteeringRig for NoSteering {
    fn try_controller_orientation(&self) -> Option<Orientation> {
        None
    }
}

/// Factory producing the live rig instance, if one exists in the scene yet.
pub type RigFactory = Rc<dyn Fn() -> Option<Rc<dyn SteeringRig>>>;

/// Name-keyed plugin registry. Rig plugins register a factory whenever
/// they load (possibly after us, hence the interior mutability); the
/// policy looks the factory up under RIG_PROVIDER and instantiates
/// through it.
#[derive(Default)]
pub struct RigRegistry {
    factories: RefCell<HashMap<String, RigFactory>>,
}

impl RigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, factory: RigFactory) {
        self.factories.borrow_mut().insert(name.into(), factory);
    }

    /// Run the named factory. `Err(ProviderMissing)` when no plugin has
    /// registered under `name`; `Ok(None)` when the plugin is present but
    /// its rig instance does not exist yet.
    pub fn instantiate(&self, name: &str) -> Result<Option<Rc<dyn SteeringRig>>, ResolveError> {
        // Clone the factory out so the map is not borrowed while it runs
        // (a factory may register further providers).
        let factory = self
            .factories
            .borrow()
            .get(name)
            .cloned()
            .ok_or(ResolveError::ProviderMissing)?;
        Ok(factory())
    }
}

/// Resolution failures. Only `ProviderMissing` is recoverable; the other
/// two latch the policy off for the rest of the process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("rig provider not registered (is the VR rig plugin installed?)")]
    ProviderMissing,
    #[error("rig instance unavailable (is the VR rig plugin installed?)")]
    RigUnavailable,
    #[error("right controller not found on the rig")]
    ControllerLost,
}

// ============================================================
// Rotation policy
// ============================================================

/// Long-lived policy object: resolves and caches the rig, reads the host
/// view each frame, and computes the replacement rotation. Constructed
/// once at mod load and shared with the patched call site.
///
/// Single-threaded by contract, like the host's game loop; the unsync
/// interior mutability below is deliberate.
pub struct HandSteering {
    registry: Rc<RigRegistry>,
    host: Rc<dyn HostView>,
    /// Set at most once, never cleared; `disabled` short-circuits it.
    rig: OnceCell<Rc<dyn SteeringRig>>,
    /// Terminal-failure latch. Once set, rotation() is identity forever.
    disabled: Cell<bool>,
    /// Weak cache of the player motor; a dead ref just means "look again".
    player: RefCell<Weak<PlayerMotor>>,
    /// Whether the provider-missing error has been logged for the current
    /// failure stretch; cleared when the provider finally shows up.
    missing_logged: Cell<bool>,
}

impl HandSteering {
    pub fn new(registry: Rc<RigRegistry>, host: Rc<dyn HostView>) -> Self {
        Self {
            registry,
            host,
            rig: OnceCell::new(),
            disabled: Cell::new(false),
            player: RefCell::new(Weak::new()),
            missing_logged: Cell::new(false),
        }
    }

    pub fn disabled(&self) -> bool {
        self.disabled.get()
    }

    /// Host-component startup event: resolve opportunistically and
    /// silently, since the rig plugin may legitimately not have loaded
    /// yet at that point.
    pub fn on_component_start(&self) {
        self.resolve(false);
    }

    /// Try to locate and cache the rig instance and the player motor.
    /// Idempotent: anything already cached is left alone. A missing
    /// provider is logged only when `log_on_failure` is set, and only once
    /// per failure stretch.
    pub fn resolve(&self, log_on_failure: bool) {
        if self.disabled.get() {
            return;
        }

        if self.rig.get().is_none() {
            match self.registry.instantiate(RIG_PROVIDER) {
                Ok(Some(rig)) => {
                    self.missing_logged.set(false);
                    let _ = self.rig.set(rig);
                }
                Ok(None) => {
                    // Plugin present, rig not constructed yet. Not an error
                    // at resolve time; rotation() escalates if it stays gone.
                    self.missing_logged.set(false);
                }
                Err(err) => {
                    if log_on_failure && !self.missing_logged.replace(true) {
                        log::error!("[STEER] {err}");
                    }
                }
            }
        }

        // Warm the player cache alongside; cheap to re-acquire but
        // pointless to search for every frame.
        self.cached_player();
    }

    /// Cached player motor, re-acquired through the host when the weak ref
    /// is dead. `None` only means "not spawned yet".
    fn cached_player(&self) -> Option<Rc<PlayerMotor>> {
        if let Some(player) = self.player.borrow().upgrade() {
            return Some(player);
        }
        let found = self.host.find_player();
        if let Some(player) = &found {
            *self.player.borrow_mut() = Rc::downgrade(player);
        }
        found
    }

    fn motor_mode(&self) -> Option<MotorMode> {
        self.cached_player().map(|p| p.motor_mode.get())
    }

    /// Feature gate, evaluated fresh on every call:
    /// - both toggles off        -> inactive
    /// - underwater toggle on    -> active in any mode
    /// - glide toggle alone      -> active only while actually gliding
    fn steering_active(&self, options: &SteeringOptions) -> bool {
        if !options.any_enabled() {
            return false;
        }
        if options.steer_underwater {
            return true;
        }
        self.motor_mode() == Some(MotorMode::Glide)
    }

    /// Flip the terminal latch and emit the one error line for it.
    fn disable(&self, why: ResolveError) {
        self.disabled.set(true);
        log::error!("[STEER] hand steering disabled: {why}");
    }

    /// Controller orientation, driving the terminal transitions: no rig
    /// even after a forced resolve, or a rig with no controller, both
    /// permanently disable the feature.
    fn controller_orientation(&self) -> Option<Orientation> {
        if self.rig.get().is_none() {
            self.resolve(true);
        }
        let Some(rig) = self.rig.get() else {
            self.disable(ResolveError::RigUnavailable);
            return None;
        };
        match rig.try_controller_orientation() {
            Some(orientation) => Some(orientation),
            None => {
                self.disable(ResolveError::ControllerLost);
                None
            }
        }
    }

    /// Replacement for the rotation computation inside UpdateMove. Same
    /// arguments and return type as the multiply call it replaces.
    ///
    /// Falls back to the host's original math (`player_forward` applied to
    /// `input_dir`) whenever the feature is off, the player is not in a
    /// steering-eligible mode, or the rig is gone for good.
    pub fn rotation(&self, player_forward: Orientation, input_dir: Vec3) -> Vec3 {
        let fallback = math::rotate(&player_forward, &input_dir);

        if self.disabled.get() {
            return fallback;
        }
        let options = self.host.options().unwrap_or_default();
        if !self.steering_active(&options) {
            return fallback;
        }

        let Some(controller) = self.controller_orientation() else {
            return fallback;
        };

        // 60° cancels the glide vehicle's steeper bias, 45° the default
        // swim bias.
        let pitch = if options.steer_glide && self.motor_mode() == Some(MotorMode::Glide) {
            GLIDE_PITCH_DEG
        } else {
            DIVE_PITCH_DEG
        };

        math::rotate(&(controller * math::pitch_up(pitch)), &input_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_glm as glm;

    struct TestHost {
        options: Cell<Option<SteeringOptions>>,
        player: RefCell<Option<Rc<PlayerMotor>>>,
    }

    impl TestHost {
        fn new(options: Option<SteeringOptions>, mode: Option<MotorMode>) -> Rc<Self> {
            Rc::new(Self {
                options: Cell::new(options),
                player: RefCell::new(mode.map(|m| Rc::new(PlayerMotor::new(m)))),
            })
        }
    }

    impl HostView for TestHost {
        fn options(&self) -> Option<SteeringOptions> {
            self.options.get()
        }

        fn find_player(&self) -> Option<Rc<PlayerMotor>> {
            self.player.borrow().clone()
        }
    }

    struct FixedRig(Orientation);

    impl SteeringRig for FixedRig {
        fn try_controller_orientation(&self) -> Option<Orientation> {
            Some(self.0)
        }
    }

    fn registry_with_rig(rig: Rc<dyn SteeringRig>) -> Rc<RigRegistry> {
        let registry = Rc::new(RigRegistry::new());
        registry.register(RIG_PROVIDER, Rc::new(move || Some(rig.clone())));
        registry
    }

    fn both_on() -> SteeringOptions {
        SteeringOptions {
            steer_underwater: true,
            steer_glide: true,
        }
    }

    fn close(a: &Vec3, b: &Vec3) {
        assert!((a - b).norm() < 1e-5, "{a:?} != {b:?}");
    }

    fn tilted(forward: &Orientation, degrees: f32, dir: &Vec3) -> Vec3 {
        math::rotate(&(forward * math::pitch_up(degrees)), dir)
    }

    #[test]
    fn flags_off_is_exact_passthrough() {
        let host = TestHost::new(Some(SteeringOptions::default()), Some(MotorMode::Dive));
        let steer = HandSteering::new(registry_with_rig(Rc::new(FixedRig(math::identity()))), host);

        let forward = math::pitch_up(30.0);
        let dir = glm::vec3(0.5, 0.0, 1.0);
        close(&steer.rotation(forward, dir), &math::rotate(&forward, &dir));
        assert!(!steer.disabled());
    }

    #[test]
    fn missing_options_accessor_counts_as_all_off() {
        let host = TestHost::new(None, Some(MotorMode::Dive));
        let steer = HandSteering::new(registry_with_rig(Rc::new(FixedRig(math::identity()))), host);

        let dir = glm::vec3(0.0, 0.0, 1.0);
        close(&steer.rotation(math::identity(), dir), &dir);
    }

    #[test]
    fn glide_flag_alone_requires_glide_mode() {
        let options = SteeringOptions {
            steer_underwater: false,
            steer_glide: true,
        };
        let host = TestHost::new(Some(options), Some(MotorMode::Dive));
        let controller = math::pitch_up(10.0);
        let steer = HandSteering::new(registry_with_rig(Rc::new(FixedRig(controller))), host.clone());

        let forward = math::identity();
        let dir = glm::vec3(0.0, 0.0, 1.0);

        // Diving: gate closed, passthrough.
        close(&steer.rotation(forward, dir), &dir);

        // Switch to the glide vehicle: gate opens, 60° offset.
        host.player
            .borrow()
            .as_ref()
            .unwrap()
            .motor_mode
            .set(MotorMode::Glide);
        close(&steer.rotation(forward, dir), &tilted(&controller, 60.0, &dir));
    }

    #[test]
    fn underwater_steering_uses_the_45_degree_offset() {
        let controller = math::pitch_up(-20.0);
        let host = TestHost::new(Some(both_on()), Some(MotorMode::Dive));
        let steer = HandSteering::new(registry_with_rig(Rc::new(FixedRig(controller))), host);

        let dir = glm::vec3(0.0, 0.0, 1.0);
        close(
            &steer.rotation(math::identity(), dir),
            &tilted(&controller, 45.0, &dir),
        );
    }

    #[test]
    fn glide_mode_without_glide_flag_stays_at_45_degrees() {
        let options = SteeringOptions {
            steer_underwater: true,
            steer_glide: false,
        };
        let controller = math::identity();
        let host = TestHost::new(Some(options), Some(MotorMode::Glide));
        let steer = HandSteering::new(registry_with_rig(Rc::new(FixedRig(controller))), host);

        let dir = glm::vec3(0.0, 0.0, 1.0);
        close(
            &steer.rotation(math::identity(), dir),
            &tilted(&controller, 45.0, &dir),
        );
    }

    #[test]
    fn missing_provider_disables_permanently() {
        let host = TestHost::new(Some(both_on()), Some(MotorMode::Dive));
        let registry = Rc::new(RigRegistry::new());
        let steer = HandSteering::new(registry.clone(), host);

        let forward = math::pitch_up(5.0);
        let dir = glm::vec3(0.0, 0.0, 1.0);
        let fallback = math::rotate(&forward, &dir);

        close(&steer.rotation(forward, dir), &fallback);
        assert!(steer.disabled());

        // Even a rig arriving later cannot re-enable the feature.
        registry.register(
            RIG_PROVIDER,
            Rc::new(|| Some(Rc::new(FixedRig(math::identity())) as Rc<dyn SteeringRig>)),
        );
        close(&steer.rotation(forward, dir), &fallback);
        assert!(steer.disabled());
    }

    #[test]
    fn untracked_controller_disables_permanently() {
        let host = TestHost::new(Some(both_on()), Some(MotorMode::Dive));
        // NoSteering is exactly "a rig with no controller".
        let steer = HandSteering::new(registry_with_rig(Rc::new(NoSteering)), host);

        let dir = glm::vec3(1.0, 0.0, 0.0);
        close(&steer.rotation(math::identity(), dir), &dir);
        assert!(steer.disabled());
        close(&steer.rotation(math::identity(), dir), &dir);
    }

    #[test]
    fn disabled_ignores_later_option_changes() {
        let host = TestHost::new(Some(SteeringOptions::default()), Some(MotorMode::Dive));
        let steer = HandSteering::new(Rc::new(RigRegistry::new()), host.clone());

        // Force the terminal transition by enabling the feature with no
        // provider registered.
        host.options.set(Some(both_on()));
        let dir = glm::vec3(0.0, 0.0, 1.0);
        close(&steer.rotation(math::identity(), dir), &dir);
        assert!(steer.disabled());

        // Toggling options afterwards changes nothing.
        host.options.set(Some(SteeringOptions::default()));
        close(&steer.rotation(math::identity(), dir), &dir);
        host.options.set(Some(both_on()));
        close(&steer.rotation(math::identity(), dir), &dir);
        assert!(steer.disabled());
    }

    #[test]
    fn resolve_is_idempotent_after_success() {
        let host = TestHost::new(Some(both_on()), Some(MotorMode::Dive));
        let registry = Rc::new(RigRegistry::new());
        let calls = Rc::new(Cell::new(0u32));
        let counter = calls.clone();
        registry.register(
            RIG_PROVIDER,
            Rc::new(move || {
                counter.set(counter.get() + 1);
                Some(Rc::new(FixedRig(math::identity())) as Rc<dyn SteeringRig>)
            }),
        );

        let steer = HandSteering::new(registry, host);
        steer.on_component_start();
        assert_eq!(calls.get(), 1);

        // Further resolves and rotations reuse the cached rig.
        steer.resolve(true);
        steer.resolve(false);
        let dir = glm::vec3(0.0, 0.0, 1.0);
        let _ = steer.rotation(math::identity(), dir);
        let _ = steer.rotation(math::identity(), dir);
        assert_eq!(calls.get(), 1);
        assert!(!steer.disabled());
    }

    #[test]
    fn player_cache_reacquires_after_despawn() {
        let options = SteeringOptions {
            steer_underwater: false,
            steer_glide: true,
        };
        let host = TestHost::new(Some(options), Some(MotorMode::Glide));
        let steer = HandSteering::new(
            registry_with_rig(Rc::new(FixedRig(math::identity()))),
            host.clone(),
        );

        let dir = glm::vec3(0.0, 0.0, 1.0);
        let steered = tilted(&math::identity(), 60.0, &dir);
        close(&steer.rotation(math::identity(), dir), &steered);

        // Player despawns: the gate closes but nothing is terminal.
        *host.player.borrow_mut() = None;
        close(&steer.rotation(math::identity(), dir), &dir);
        assert!(!steer.disabled());

        // Respawn: the weak cache is re-acquired and steering resumes.
        *host.player.borrow_mut() = Some(Rc::new(PlayerMotor::new(MotorMode::Glide)));
        close(&steer.rotation(math::identity(), dir), &steered);
    }
}
