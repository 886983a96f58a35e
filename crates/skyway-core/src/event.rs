//! Fire-and-forget notifications raised while craft update.
//!
//! The movement engine decides *when* something noteworthy happens; what it
//! looks or sounds like is up to whoever drains the events. A few variants
//! ([`CraftEvent::Attached`], [`CraftEvent::Released`],
//! [`CraftEvent::Stowed`]) also carry cross-craft effects that the
//! [`Airspace`](crate::airspace::Airspace) applies after the batch.

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::entity::{BuildingId, CraftId};

/// Something that happened to a craft.
///
/// # Variants
///
/// - `Destroyed`: The craft died
/// - `CrashLanded` / `SmokeStarted` / `SmokeCleared`: Wreck cues
/// - `DebrisDoodad`: A badly damaged craft shed debris
/// - `SceneryCollapsed`: A falling craft plowed through terrain
/// - `EnteredBuilding` / `LeftBuilding`: Docking
/// - `Attached` / `Released` / `Stowed`: Carry links
/// - `Teleported` / `DepartedThroughPortal`: Map exits and jumps
/// - `Infiltrated` / `ServiceOffered`: Mission outcomes for outer layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CraftEvent {
    /// The craft was destroyed.
    Destroyed {
        /// Destroyed craft
        craft: CraftId,
        /// Who shot it down, if anyone
        attacker: Option<CraftId>,
        /// Suppress the explosion cue (off-map falls)
        silent: bool,
    },
    /// The craft came to rest as a wreck.
    CrashLanded {
        /// Wrecked craft
        craft: CraftId,
        /// Where it came to rest
        position: Vec3,
    },
    /// Wreck smoke should start.
    SmokeStarted {
        /// Smoking craft
        craft: CraftId,
    },
    /// Wreck smoke should stop.
    SmokeCleared {
        /// Craft that stopped smoking
        craft: CraftId,
    },
    /// A falling or sliding craft shed a piece of debris.
    DebrisDoodad {
        /// Craft shedding debris
        craft: CraftId,
        /// Where the debris appears
        position: Vec3,
    },
    /// Scenery was damaged or destroyed by a falling craft.
    SceneryCollapsed {
        /// Craft that hit the scenery
        craft: CraftId,
        /// Tile of the scenery
        tile: IVec3,
        /// Removed outright rather than left damaged
        destroyed: bool,
    },
    /// The craft docked.
    EnteredBuilding {
        /// Docking craft
        craft: CraftId,
        /// Building entered
        building: BuildingId,
    },
    /// The craft launched from a building.
    LeftBuilding {
        /// Launching craft
        craft: CraftId,
        /// Building left
        building: BuildingId,
    },
    /// A carrier picked up another craft.
    Attached {
        /// Carrying craft
        carrier: CraftId,
        /// Carried craft
        carried: CraftId,
    },
    /// A carrier let go of the craft it was carrying.
    Released {
        /// Carrying craft
        carrier: CraftId,
        /// Released craft
        carried: CraftId,
    },
    /// A carrier docked, taking its load with it.
    Stowed {
        /// Carrying craft
        carrier: CraftId,
        /// Carried craft
        carried: CraftId,
        /// Building entered
        building: BuildingId,
    },
    /// The craft jumped with its teleporter.
    Teleported {
        /// Jumping craft
        craft: CraftId,
        /// Position before the jump
        from: Vec3,
        /// Position after the jump
        to: Vec3,
    },
    /// The craft left the map through a portal.
    DepartedThroughPortal {
        /// Departing craft
        craft: CraftId,
        /// Portal tile
        portal: IVec3,
    },
    /// The craft infiltrated or subverted a building.
    Infiltrated {
        /// Infiltrating craft
        craft: CraftId,
        /// Target building
        building: BuildingId,
        /// Subversion rather than infiltration
        subvert: bool,
    },
    /// The craft offered its service at a building.
    ServiceOffered {
        /// Servicing craft
        craft: CraftId,
        /// Building where the service is offered
        building: BuildingId,
    },
}

impl CraftEvent {
    /// Returns the craft the event is primarily about.
    #[must_use]
    pub const fn primary_craft(&self) -> CraftId {
        match self {
            Self::Destroyed { craft, .. }
            | Self::CrashLanded { craft, .. }
            | Self::SmokeStarted { craft }
            | Self::SmokeCleared { craft }
            | Self::DebrisDoodad { craft, .. }
            | Self::SceneryCollapsed { craft, .. }
            | Self::EnteredBuilding { craft, .. }
            | Self::LeftBuilding { craft, .. }
            | Self::Teleported { craft, .. }
            | Self::DepartedThroughPortal { craft, .. }
            | Self::Infiltrated { craft, .. }
            | Self::ServiceOffered { craft, .. } => *craft,
            Self::Attached { carrier, .. }
            | Self::Released { carrier, .. }
            | Self::Stowed { carrier, .. } => *carrier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_craft_of_carry_links_is_carrier() {
        let event = CraftEvent::Attached {
            carrier: CraftId::new(1),
            carried: CraftId::new(2),
        };
        assert_eq!(event.primary_craft(), CraftId::new(1));
    }

    #[test]
    fn serialization_roundtrip() {
        let event = CraftEvent::SceneryCollapsed {
            craft: CraftId::new(3),
            tile: IVec3::new(1, 2, 3),
            destroyed: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: CraftEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
