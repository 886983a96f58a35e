//! Queued craft behaviours.
//!
//! A [`Mission`] is one unit of behaviour with a lifecycle:
//!
//! 1. created by a factory (`Mission::goto_location`, `Mission::snooze`, ...)
//! 2. placed in a craft's queue by `add_mission` / `set_mission`, subject to
//!    the placement rules in [`MissionType::blockers`]
//! 3. `start` runs each time the mission becomes the queue front
//! 4. `update` runs every tick while it is the front
//! 5. once finished it is popped and the next mission starts in the same
//!    tick
//!
//! While at the front, the mission also answers the mover's request for the
//! next goal (see [`Goal`]).
//!
//! # Example
//!
//! ```
//! use glam::IVec3;
//! use skyway_core::config::MoverConfig;
//! use skyway_core::mission::{Mission, MissionType};
//!
//! let config = MoverConfig::default();
//! let mission = Mission::goto_location(IVec3::new(4, 4, 5), &config).picking_nearest();
//! assert_eq!(mission.mission_type(), MissionType::GotoLocation);
//! assert!(!mission.is_cancelled());
//! ```

mod behaviour;
pub(crate) mod path;
pub mod queue;

use std::collections::VecDeque;
use std::fmt;

use bitflags::bitflags;
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::MoverConfig;
use crate::entity::{BuildingId, CraftId};

// =============================================================================
// Mission types and placement classes
// =============================================================================

bitflags! {
    /// Physical conditions that can refuse a mission.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Blockers: u8 {
        /// Craft is a wreck
        const CRASHED = 1 << 0;
        /// Craft is skidding after a landing
        const SLIDING = 1 << 1;
        /// Craft is in free fall
        const FALLING = 1 << 2;
        /// Craft is being carried by another craft
        const CARRIED = 1 << 3;
    }
}

impl Blockers {
    /// Conditions that make a craft physically uncontrollable.
    pub const DOWNED: Self = Self::CRASHED.union(Self::SLIDING).union(Self::FALLING);
}

/// Tag of a mission kind, without payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionType {
    /// Travel to a tile
    GotoLocation,
    /// Travel to and dock with a building
    GotoBuilding,
    /// Stay close to another craft
    FollowVehicle,
    /// Pick up a downed craft and bring it home
    RecoverVehicle,
    /// Pursue another craft
    AttackVehicle,
    /// Circle a building
    AttackBuilding,
    /// Restart the mission behind this one
    RestartNextMission,
    /// Wait for a number of ticks
    Snooze,
    /// Launch from the current building
    TakeOff,
    /// Descend onto a pad and dock
    Land,
    /// Go down as a wreck
    Crash,
    /// Visit random destinations
    Patrol,
    /// Leave the map through a portal
    GotoPortal,
    /// Infiltrate or subvert a building
    InfiltrateSubvert,
    /// Offer a service at a building
    OfferService,
    /// Jump with a teleporter
    Teleport,
    /// Destroy the craft after a delay
    SelfDestruct,
}

impl MissionType {
    /// Whether a mission of this kind may be spliced in front of an
    /// in-progress take-off or landing.
    #[must_use]
    pub const fn is_front_insertable(self) -> bool {
        matches!(self, Self::Snooze | Self::RestartNextMission)
    }

    /// Conditions under which `add_mission` refuses this kind.
    #[must_use]
    pub const fn blockers(self) -> Blockers {
        match self {
            Self::Snooze | Self::RestartNextMission | Self::Crash | Self::SelfDestruct => {
                Blockers::empty()
            }
            Self::GotoLocation | Self::Land => Blockers::DOWNED,
            Self::GotoBuilding
            | Self::FollowVehicle
            | Self::RecoverVehicle
            | Self::AttackVehicle
            | Self::AttackBuilding
            | Self::TakeOff
            | Self::Patrol
            | Self::GotoPortal
            | Self::InfiltrateSubvert
            | Self::OfferService
            | Self::Teleport => Blockers::DOWNED.union(Blockers::CARRIED),
        }
    }

    /// Conditions under which `set_mission` refuses this kind.
    #[must_use]
    pub const fn set_blockers(self) -> Blockers {
        match self {
            Self::Crash | Self::Snooze | Self::SelfDestruct => Blockers::empty(),
            _ => Blockers::DOWNED.union(Blockers::CARRIED),
        }
    }

    /// Take-off and landing survive an unforced queue clear.
    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(self, Self::TakeOff | Self::Land)
    }
}

impl fmt::Display for MissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// Mission payloads
// =============================================================================

/// A mission kind with its payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionKind {
    /// Travel to a tile.
    GotoLocation {
        /// Destination tile
        target: IVec3,
        /// Jump with a teleporter first when charged
        allow_teleporter: bool,
        /// Settle for the nearest reachable tile
        pick_nearest: bool,
        /// The nearest reachable tile was picked
        picked_nearest: bool,
        /// Re-plans left before giving up
        reroute_attempts: u32,
    },
    /// Travel to and dock with a building.
    GotoBuilding {
        /// Destination, or the craft's home when `None`
        target: Option<BuildingId>,
        /// Jump with a teleporter first when charged
        allow_teleporter: bool,
        /// Re-plans left before giving up
        reroute_attempts: u32,
    },
    /// Stay close to another craft.
    FollowVehicle {
        /// Followed craft; cleared when it dies
        target: Option<CraftId>,
    },
    /// Pick up a downed craft.
    RecoverVehicle {
        /// Craft to recover; cleared when it dies
        target: Option<CraftId>,
        /// Pick-up done
        attached: bool,
    },
    /// Pursue another craft.
    AttackVehicle {
        /// Attacked craft; cleared when it dies
        target: Option<CraftId>,
        /// Keep attacking once the target is downed
        attack_crashed: bool,
    },
    /// Circle a building.
    AttackBuilding {
        /// Attacked building
        target: BuildingId,
    },
    /// Restart the mission behind this one.
    RestartNextMission,
    /// Wait.
    Snooze {
        /// Ticks left
        remaining: u32,
    },
    /// Launch from a building.
    TakeOff {
        /// Building being left
        building: Option<BuildingId>,
        /// Tile to climb to after launch
        target: Option<IVec3>,
    },
    /// Descend onto a pad and dock.
    Land {
        /// Building to dock with
        building: BuildingId,
    },
    /// Go down as a wreck.
    Crash,
    /// Visit random destinations.
    Patrol {
        /// Stay near the home building
        home: bool,
        /// Destinations left
        counter: u32,
    },
    /// Leave the map through a portal.
    GotoPortal {
        /// Portal tile, or the nearest portal when `None`
        target: Option<IVec3>,
        /// The craft has left
        departed: bool,
    },
    /// Infiltrate or subvert a building.
    InfiltrateSubvert {
        /// Target building
        target: BuildingId,
        /// Subvert rather than infiltrate
        subvert: bool,
        /// A trip to the building was queued
        dispatched: bool,
        /// Outcome reported
        done: bool,
    },
    /// Offer a service at a building.
    OfferService {
        /// Target building, or the current / home building when `None`
        target: Option<BuildingId>,
        /// A trip to the building was queued
        dispatched: bool,
        /// Outcome reported
        done: bool,
    },
    /// Jump with a teleporter.
    Teleport {
        /// Jump target, or a random tile when `None`
        target: Option<IVec3>,
    },
    /// Destroy the craft after a delay.
    SelfDestruct {
        /// Ticks left
        remaining: u32,
    },
}

impl MissionKind {
    /// Returns the payload-free tag.
    #[must_use]
    pub const fn mission_type(&self) -> MissionType {
        match self {
            Self::GotoLocation { .. } => MissionType::GotoLocation,
            Self::GotoBuilding { .. } => MissionType::GotoBuilding,
            Self::FollowVehicle { .. } => MissionType::FollowVehicle,
            Self::RecoverVehicle { .. } => MissionType::RecoverVehicle,
            Self::AttackVehicle { .. } => MissionType::AttackVehicle,
            Self::AttackBuilding { .. } => MissionType::AttackBuilding,
            Self::RestartNextMission => MissionType::RestartNextMission,
            Self::Snooze { .. } => MissionType::Snooze,
            Self::TakeOff { .. } => MissionType::TakeOff,
            Self::Land { .. } => MissionType::Land,
            Self::Crash => MissionType::Crash,
            Self::Patrol { .. } => MissionType::Patrol,
            Self::GotoPortal { .. } => MissionType::GotoPortal,
            Self::InfiltrateSubvert { .. } => MissionType::InfiltrateSubvert,
            Self::OfferService { .. } => MissionType::OfferService,
            Self::Teleport { .. } => MissionType::Teleport,
            Self::SelfDestruct { .. } => MissionType::SelfDestruct,
        }
    }

    /// Craft this mission refers to, if any.
    #[must_use]
    pub const fn target_craft(&self) -> Option<CraftId> {
        match self {
            Self::FollowVehicle { target }
            | Self::RecoverVehicle { target, .. }
            | Self::AttackVehicle { target, .. } => *target,
            _ => None,
        }
    }
}

// =============================================================================
// Mission
// =============================================================================

/// Where the craft should head next, as produced by the front mission.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Goal {
    /// Position to move to.
    pub position: Vec3,
    /// Facing to turn to. Overridden by the travel direction when the
    /// position differs from the craft's.
    pub facing: f32,
}

/// One queued behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    kind: MissionKind,
    pub(crate) planned_path: VecDeque<IVec3>,
    cancelled: bool,
}

impl Mission {
    fn new(kind: MissionKind) -> Self {
        Self {
            kind,
            planned_path: VecDeque::new(),
            cancelled: false,
        }
    }

    /// Travel to `target`.
    #[must_use]
    pub fn goto_location(target: IVec3, config: &MoverConfig) -> Self {
        Self::new(MissionKind::GotoLocation {
            target,
            allow_teleporter: false,
            pick_nearest: false,
            picked_nearest: false,
            reroute_attempts: config.missions.reroute_attempts,
        })
    }

    /// Travel to and dock with `target`, or the craft's home when `None`.
    #[must_use]
    pub fn goto_building(target: Option<BuildingId>, config: &MoverConfig) -> Self {
        Self::new(MissionKind::GotoBuilding {
            target,
            allow_teleporter: false,
            reroute_attempts: config.missions.reroute_attempts,
        })
    }

    /// Stay close to `target`.
    #[must_use]
    pub fn follow_vehicle(target: CraftId) -> Self {
        Self::new(MissionKind::FollowVehicle {
            target: Some(target),
        })
    }

    /// Pick up the downed `target`, then head home.
    #[must_use]
    pub fn recover_vehicle(target: CraftId) -> Self {
        Self::new(MissionKind::RecoverVehicle {
            target: Some(target),
            attached: false,
        })
    }

    /// Pursue `target` until it is downed.
    #[must_use]
    pub fn attack_vehicle(target: CraftId) -> Self {
        Self::new(MissionKind::AttackVehicle {
            target: Some(target),
            attack_crashed: false,
        })
    }

    /// Circle `target`.
    #[must_use]
    pub fn attack_building(target: BuildingId) -> Self {
        Self::new(MissionKind::AttackBuilding { target })
    }

    /// Restart whatever mission is behind this one.
    #[must_use]
    pub fn restart_next_mission() -> Self {
        Self::new(MissionKind::RestartNextMission)
    }

    /// Wait for `ticks`.
    #[must_use]
    pub fn snooze(ticks: u32) -> Self {
        Self::new(MissionKind::Snooze { remaining: ticks })
    }

    /// Launch from the building the craft is in.
    #[must_use]
    pub fn take_off() -> Self {
        Self::new(MissionKind::TakeOff {
            building: None,
            target: None,
        })
    }

    /// Descend onto `building`'s pad and dock.
    #[must_use]
    pub fn land(building: BuildingId) -> Self {
        Self::new(MissionKind::Land { building })
    }

    /// Go down as a wreck.
    #[must_use]
    pub fn crash_land() -> Self {
        Self::new(MissionKind::Crash)
    }

    /// Visit `counter` random destinations, near home when `home`.
    #[must_use]
    pub fn patrol(home: bool, counter: u32) -> Self {
        Self::new(MissionKind::Patrol { home, counter })
    }

    /// Leave the map through `target`, or the nearest portal when `None`.
    #[must_use]
    pub fn goto_portal(target: Option<IVec3>) -> Self {
        Self::new(MissionKind::GotoPortal {
            target,
            departed: false,
        })
    }

    /// Infiltrate (or subvert) `target`.
    #[must_use]
    pub fn infiltrate_or_subvert(target: BuildingId, subvert: bool) -> Self {
        Self::new(MissionKind::InfiltrateSubvert {
            target,
            subvert,
            dispatched: false,
            done: false,
        })
    }

    /// Offer a service at `target`, or the current / home building.
    #[must_use]
    pub fn offer_service(target: Option<BuildingId>) -> Self {
        Self::new(MissionKind::OfferService {
            target,
            dispatched: false,
            done: false,
        })
    }

    /// Jump near `target`, or to a random tile when `None`.
    #[must_use]
    pub fn teleport(target: Option<IVec3>) -> Self {
        Self::new(MissionKind::Teleport { target })
    }

    /// Destroy the craft once the configured timer runs out.
    #[must_use]
    pub fn self_destruct(config: &MoverConfig) -> Self {
        Self::new(MissionKind::SelfDestruct {
            remaining: config
                .ticks_per_hour()
                .saturating_mul(config.missions.self_destruct_hours),
        })
    }

    // -------------------------------------------------------------------------
    // Builders
    // -------------------------------------------------------------------------

    /// Allows a teleporter jump for travel missions.
    #[must_use]
    pub fn with_teleporter(mut self) -> Self {
        match &mut self.kind {
            MissionKind::GotoLocation {
                allow_teleporter, ..
            }
            | MissionKind::GotoBuilding {
                allow_teleporter, ..
            } => *allow_teleporter = true,
            _ => {}
        }
        self
    }

    /// Lets `GotoLocation` settle for the nearest reachable tile.
    #[must_use]
    pub fn picking_nearest(mut self) -> Self {
        if let MissionKind::GotoLocation { pick_nearest, .. } = &mut self.kind {
            *pick_nearest = true;
        }
        self
    }

    /// Overrides the re-route budget of a travel mission.
    #[must_use]
    pub fn with_reroute_attempts(mut self, attempts: u32) -> Self {
        match &mut self.kind {
            MissionKind::GotoLocation {
                reroute_attempts, ..
            }
            | MissionKind::GotoBuilding {
                reroute_attempts, ..
            } => *reroute_attempts = attempts,
            _ => {}
        }
        self
    }

    /// Keeps attacking once the target is downed.
    #[must_use]
    pub fn attacking_crashed(mut self) -> Self {
        if let MissionKind::AttackVehicle { attack_crashed, .. } = &mut self.kind {
            *attack_crashed = true;
        }
        self
    }

    /// Pre-seeds the planned path.
    #[must_use]
    pub fn with_planned_path(mut self, path: impl IntoIterator<Item = IVec3>) -> Self {
        self.planned_path = path.into_iter().collect();
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Kind and payload.
    #[must_use]
    pub const fn kind(&self) -> &MissionKind {
        &self.kind
    }

    /// Payload-free tag.
    #[must_use]
    pub const fn mission_type(&self) -> MissionType {
        self.kind.mission_type()
    }

    /// Cached path of the active leg.
    #[must_use]
    pub const fn planned_path(&self) -> &VecDeque<IVec3> {
        &self.planned_path
    }

    /// Whether the mission was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Marks the mission cancelled. Takes effect at the next finish check.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Drops references to a craft that no longer exists.
    pub fn forget_craft(&mut self, id: CraftId) {
        match &mut self.kind {
            MissionKind::FollowVehicle { target }
            | MissionKind::RecoverVehicle { target, .. }
            | MissionKind::AttackVehicle { target, .. } => {
                if *target == Some(id) {
                    *target = None;
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MissionKind::GotoLocation { target, .. } => {
                write!(f, "GotoLocation({}, {}, {})", target.x, target.y, target.z)
            }
            MissionKind::Snooze { remaining } => write!(f, "Snooze({remaining})"),
            kind => write!(f, "{}", kind.mission_type()),
        }
    }
}
