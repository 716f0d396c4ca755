//! KHR-3HV humanoid: 22 servos on two daisy-chained buses.
//!
//! Head and the left limbs share the left bus, Waist and the right limbs the
//! right one. Both buses carry IDs 1 to 10, so a servo is always addressed
//! through its [`Side`], never by ID alone.
//!
//! ```ignore
//! let mut robot = Robot::new(kondo::with_ics(lrx, ltx), kondo::with_ics(rrx, rtx));
//! robot.set_position(Joint::LeftKnee, 8200)?;
//!
//! let (left, right) = robot.sides_mut();
//! std::thread::scope(|s| {
//!     s.spawn(|| left.set_free(Joint::Head));
//!     s.spawn(|| right.set_free(Joint::Waist));
//! });
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use hal::serial::{Read, Write};
use serde::{Deserialize, Serialize};

use super::{Bus, Motor};
use crate::eeprom::Eeprom;
use crate::error::{Error, Result};
use crate::position::{MAXIMUM_POSITION, MINIMUM_POSITION};
use crate::protocol::{Controller, SubCommand, MAX_ID};

/// Number of joints on the robot.
pub const JOINT_COUNT: usize = 22;
/// Number of servos on each bus.
pub const SIDE_LEN: usize = 11;

/// Every joint of the robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Joint {
    Head,
    Waist,
    LeftShoulderRoll,
    LeftShoulderPitch,
    LeftElbowRoll,
    LeftElbowPitch,
    LeftHipRoll,
    LeftHipPitch,
    LeftHipYaw,
    LeftKnee,
    LeftAnkleRoll,
    LeftAnklePitch,
    RightShoulderRoll,
    RightShoulderPitch,
    RightElbowRoll,
    RightElbowPitch,
    RightHipRoll,
    RightHipPitch,
    RightHipYaw,
    RightKnee,
    RightAnkleRoll,
    RightAnklePitch,
}

/// Joints of the left bus, in slot order.
pub static LEFT_JOINTS: [Joint; SIDE_LEN] = [
    Joint::Head,
    Joint::LeftShoulderRoll,
    Joint::LeftShoulderPitch,
    Joint::LeftElbowRoll,
    Joint::LeftElbowPitch,
    Joint::LeftHipRoll,
    Joint::LeftHipPitch,
    Joint::LeftHipYaw,
    Joint::LeftKnee,
    Joint::LeftAnkleRoll,
    Joint::LeftAnklePitch,
];

/// Joints of the right bus, in slot order.
pub static RIGHT_JOINTS: [Joint; SIDE_LEN] = [
    Joint::Waist,
    Joint::RightShoulderRoll,
    Joint::RightShoulderPitch,
    Joint::RightElbowRoll,
    Joint::RightElbowPitch,
    Joint::RightHipRoll,
    Joint::RightHipPitch,
    Joint::RightHipYaw,
    Joint::RightKnee,
    Joint::RightAnkleRoll,
    Joint::RightAnklePitch,
];

impl Joint {
    /// All joints in enumeration order.
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::Head,
        Joint::Waist,
        Joint::LeftShoulderRoll,
        Joint::LeftShoulderPitch,
        Joint::LeftElbowRoll,
        Joint::LeftElbowPitch,
        Joint::LeftHipRoll,
        Joint::LeftHipPitch,
        Joint::LeftHipYaw,
        Joint::LeftKnee,
        Joint::LeftAnkleRoll,
        Joint::LeftAnklePitch,
        Joint::RightShoulderRoll,
        Joint::RightShoulderPitch,
        Joint::RightElbowRoll,
        Joint::RightElbowPitch,
        Joint::RightHipRoll,
        Joint::RightHipPitch,
        Joint::RightHipYaw,
        Joint::RightKnee,
        Joint::RightAnkleRoll,
        Joint::RightAnklePitch,
    ];

    /// Bus the joint's servo is wired to.
    pub fn side(self) -> Bus {
        use self::Joint::*;
        match self {
            Head | LeftShoulderRoll | LeftShoulderPitch | LeftElbowRoll | LeftElbowPitch
            | LeftHipRoll | LeftHipPitch | LeftHipYaw | LeftKnee | LeftAnkleRoll
            | LeftAnklePitch => Bus::Left,
            Waist | RightShoulderRoll | RightShoulderPitch | RightElbowRoll | RightElbowPitch
            | RightHipRoll | RightHipPitch | RightHipYaw | RightKnee | RightAnkleRoll
            | RightAnklePitch => Bus::Right,
        }
    }

    /// Position of the joint in its side's motor array.
    pub fn slot(self) -> usize {
        use self::Joint::*;
        match self {
            Head | Waist => 0,
            LeftShoulderRoll | RightShoulderRoll => 1,
            LeftShoulderPitch | RightShoulderPitch => 2,
            LeftElbowRoll | RightElbowRoll => 3,
            LeftElbowPitch | RightElbowPitch => 4,
            LeftHipRoll | RightHipRoll => 5,
            LeftHipPitch | RightHipPitch => 6,
            LeftHipYaw | RightHipYaw => 7,
            LeftKnee | RightKnee => 8,
            LeftAnkleRoll | RightAnkleRoll => 9,
            LeftAnklePitch | RightAnklePitch => 10,
        }
    }

    /// Factory servo ID. IDs follow the chain order, so this is the slot.
    pub fn default_id(self) -> u8 {
        self.slot() as u8
    }

    /// Name used in ID tables.
    pub fn name(self) -> &'static str {
        use self::Joint::*;
        match self {
            Head => "Head",
            Waist => "Waist",
            LeftShoulderRoll => "LeftShoulderRoll",
            LeftShoulderPitch => "LeftShoulderPitch",
            LeftElbowRoll => "LeftElbowRoll",
            LeftElbowPitch => "LeftElbowPitch",
            LeftHipRoll => "LeftHipRoll",
            LeftHipPitch => "LeftHipPitch",
            LeftHipYaw => "LeftHipYaw",
            LeftKnee => "LeftKnee",
            LeftAnkleRoll => "LeftAnkleRoll",
            LeftAnklePitch => "LeftAnklePitch",
            RightShoulderRoll => "RightShoulderRoll",
            RightShoulderPitch => "RightShoulderPitch",
            RightElbowRoll => "RightElbowRoll",
            RightElbowPitch => "RightElbowPitch",
            RightHipRoll => "RightHipRoll",
            RightHipPitch => "RightHipPitch",
            RightHipYaw => "RightHipYaw",
            RightKnee => "RightKnee",
            RightAnkleRoll => "RightAnkleRoll",
            RightAnklePitch => "RightAnklePitch",
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Joint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Joint> {
        Joint::ALL
            .iter()
            .find(|j| j.name() == s)
            .cloned()
            .ok_or_else(|| Error::UnknownJoint(s.to_string()))
    }
}

/// Joint name to servo ID overrides, for robots not wired with factory IDs.
///
/// ```yaml
/// LeftShoulderRoll: 1
/// LeftShoulderPitch: 2
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdTable(pub BTreeMap<String, u8>);

/// One bus: its controller and the servos chained on it.
pub struct Side<RX, TX> {
    bus: Bus,
    controller: Controller<RX, TX>,
    motors: [Motor; SIDE_LEN],
}

impl<RX, TX> Side<RX, TX>
where
    RX: Read<u8>,
    RX::Error: fmt::Debug,
    TX: Write<u8>,
    TX::Error: fmt::Debug,
{
    fn new(bus: Bus, controller: Controller<RX, TX>) -> Side<RX, TX> {
        let joints = match bus {
            Bus::Left => &LEFT_JOINTS,
            Bus::Right => &RIGHT_JOINTS,
        };
        Side {
            bus,
            controller,
            motors: joints.map(|j| Motor::new(j.default_id())),
        }
    }

    /// Bus this side drives.
    pub fn bus(&self) -> Bus {
        self.bus
    }
    /// Joints of this side in slot order.
    pub fn joints(&self) -> &'static [Joint; SIDE_LEN] {
        match self.bus {
            Bus::Left => &LEFT_JOINTS,
            Bus::Right => &RIGHT_JOINTS,
        }
    }
    /// Cached state of `joint`, which must belong to this side.
    pub fn motor(&self, joint: Joint) -> Result<&Motor> {
        self.check(joint)?;
        Ok(&self.motors[joint.slot()])
    }
    /// The bus controller, for commands addressed by raw ID.
    pub fn controller(&mut self) -> &mut Controller<RX, TX> {
        &mut self.controller
    }

    /// Move `joint` to `target` and return the position it reports.
    pub fn set_position(&mut self, joint: Joint, target: u16) -> Result<u16> {
        if !(MINIMUM_POSITION..=MAXIMUM_POSITION).contains(&target) {
            return Err(Error::parameter(
                "position",
                u32::from(target),
                u32::from(MINIMUM_POSITION),
                u32::from(MAXIMUM_POSITION),
            ));
        }
        let (controller, motor) = self.split(joint)?;
        motor.set_position(controller, target)
    }
    /// Like [`Side::set_position`], but skips the bus and returns `None` when
    /// `target` is within `deadband` of the last target sent to `joint`.
    pub fn set_position_deduped(&mut self, joint: Joint, target: u16, deadband: u16) -> Result<Option<u16>> {
        if let Some(last) = self.motor(joint)?.last_sent() {
            if last.abs_diff(target) < deadband {
                trace!("{}: {} is within {} of {}, skipped", joint, target, deadband, last);
                return Ok(None);
            }
        }
        self.set_position(joint, target).map(Some)
    }
    /// Release the torque of `joint` and return its position.
    pub fn set_free(&mut self, joint: Joint) -> Result<u16> {
        let (controller, motor) = self.split(joint)?;
        motor.set_free(controller)
    }
    /// Set the speed parameter of `joint` (0 to 127).
    pub fn set_speed(&mut self, joint: Joint, speed: u8) -> Result<Vec<u8>> {
        let (controller, motor) = self.split(joint)?;
        motor.set_speed(controller, speed)
    }
    /// Read stretch, speed, current or temperature of `joint` into its cache.
    pub fn refresh(&mut self, joint: Joint, sc: SubCommand) -> Result<u8> {
        let (controller, motor) = self.split(joint)?;
        motor.refresh(controller, sc)
    }
    /// Read, parse and cache the EEPROM image of `joint`.
    pub fn read_eeprom(&mut self, joint: Joint) -> Result<&Eeprom> {
        let (controller, motor) = self.split(joint)?;
        motor.read_eeprom(controller)
    }
    /// Write `record` to `joint`, preserving the reserved bytes of the cached
    /// image. The image is read first when none is cached.
    pub fn write_eeprom(&mut self, joint: Joint, record: &Eeprom) -> Result<Vec<u8>> {
        let (controller, motor) = self.split(joint)?;
        motor.write_eeprom(controller, record)
    }

    fn check(&self, joint: Joint) -> Result<()> {
        if joint.side() != self.bus {
            return Err(Error::WrongBus(joint.name()));
        }
        Ok(())
    }
    fn split(&mut self, joint: Joint) -> Result<(&mut Controller<RX, TX>, &mut Motor)> {
        self.check(joint)?;
        Ok((&mut self.controller, &mut self.motors[joint.slot()]))
    }
}

/// The whole robot: one [`Side`] per bus.
pub struct Robot<RX, TX> {
    left: Side<RX, TX>,
    right: Side<RX, TX>,
}

impl<RX, TX> Robot<RX, TX>
where
    RX: Read<u8>,
    RX::Error: fmt::Debug,
    TX: Write<u8>,
    TX::Error: fmt::Debug,
{
    /// Bind the two bus controllers. Every servo starts with its factory ID.
    pub fn new(left: Controller<RX, TX>, right: Controller<RX, TX>) -> Robot<RX, TX> {
        Robot {
            left: Side::new(Bus::Left, left),
            right: Side::new(Bus::Right, right),
        }
    }
    /// Release both controllers, left first.
    pub fn release(self) -> (Controller<RX, TX>, Controller<RX, TX>) {
        (self.left.controller, self.right.controller)
    }

    /// The side driving `bus`.
    pub fn side(&self, bus: Bus) -> &Side<RX, TX> {
        match bus {
            Bus::Left => &self.left,
            Bus::Right => &self.right,
        }
    }
    /// Mutable access to the side driving `bus`.
    pub fn side_mut(&mut self, bus: Bus) -> &mut Side<RX, TX> {
        match bus {
            Bus::Left => &mut self.left,
            Bus::Right => &mut self.right,
        }
    }
    /// Both sides at once, left first, to drive the buses in parallel.
    pub fn sides_mut(&mut self) -> (&mut Side<RX, TX>, &mut Side<RX, TX>) {
        (&mut self.left, &mut self.right)
    }

    /// Cached state of `joint`.
    pub fn motor(&self, joint: Joint) -> &Motor {
        &self.side(joint.side()).motors[joint.slot()]
    }

    /// Reassign servo IDs from `table`.
    ///
    /// The table is checked in full before any ID changes, so a bad entry
    /// leaves every motor as it was.
    pub fn apply_id_table(&mut self, table: &IdTable) -> Result<()> {
        let mut updates = Vec::with_capacity(table.0.len());
        for (name, &id) in table.0.iter() {
            let joint: Joint = name.parse()?;
            if id > MAX_ID {
                return Err(Error::parameter("id", u32::from(id), 0, u32::from(MAX_ID)));
            }
            updates.push((joint, id));
        }
        for (joint, id) in updates {
            let side = self.side_mut(joint.side());
            let motor = &mut side.motors[joint.slot()];
            if motor.id() != id {
                info!("{}: id {} -> {}", joint, motor.id(), id);
                motor.set_id(id);
            }
        }
        Ok(())
    }

    /// See [`Side::set_position`].
    pub fn set_position(&mut self, joint: Joint, target: u16) -> Result<u16> {
        self.side_mut(joint.side()).set_position(joint, target)
    }
    /// See [`Side::set_position_deduped`].
    pub fn set_position_deduped(&mut self, joint: Joint, target: u16, deadband: u16) -> Result<Option<u16>> {
        self.side_mut(joint.side())
            .set_position_deduped(joint, target, deadband)
    }
    /// Release the torque of `joint` and return its position.
    pub fn set_free(&mut self, joint: Joint) -> Result<u16> {
        self.side_mut(joint.side()).set_free(joint)
    }
    /// Set the speed parameter of `joint` (0 to 127).
    pub fn set_speed(&mut self, joint: Joint, speed: u8) -> Result<Vec<u8>> {
        self.side_mut(joint.side()).set_speed(joint, speed)
    }
    /// See [`Side::refresh`].
    pub fn refresh(&mut self, joint: Joint, sc: SubCommand) -> Result<u8> {
        self.side_mut(joint.side()).refresh(joint, sc)
    }
    /// See [`Side::read_eeprom`].
    pub fn read_eeprom(&mut self, joint: Joint) -> Result<&Eeprom> {
        self.side_mut(joint.side()).read_eeprom(joint)
    }
    /// See [`Side::write_eeprom`].
    pub fn write_eeprom(&mut self, joint: Joint, record: &Eeprom) -> Result<Vec<u8>> {
        self.side_mut(joint.side()).write_eeprom(joint, record)
    }
}
