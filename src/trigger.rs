//! Trigger roles, the software-trigger coordinator and the ring topology.
//!
//! ```text
//!   SW ──out──▶ HW1 ──out──▶ HW2 ──out──▶ … ──▶ HWn
//!    ▲                                          │
//!    └──────────── software trigger ◀── callback┘
//! ```
//!
//! The software device is seeded once at startup. Every later software trigger
//! is fired from the callback of the last hardware device (the one holding
//! [`Role::Retrigger`]).

use std::collections::HashMap;
use std::sync::Arc;

use ring_core::{DeviceAddress, DeviceResult, SoftwareTrigger};

use crate::error::{RingError, RingResult};

/// What a hardware-triggered device does once its frame wait returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Report only.
    Plain,
    /// Fire the software device's trigger, then report.
    Retrigger,
}

/// Role of every hardware device; the last entry retriggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    order: Vec<DeviceAddress>,
    roles: HashMap<DeviceAddress, Role>,
    retrigger: DeviceAddress,
}

impl RoleAssignment {
    /// Assign roles over `hardware_devices` in trigger order.
    ///
    /// Fails with [`RingError::NoHardwareDevices`] on an empty list.
    pub fn new(hardware_devices: &[DeviceAddress]) -> RingResult<Self> {
        let last = hardware_devices.last().ok_or(RingError::NoHardwareDevices)?;
        let roles = hardware_devices
            .iter()
            .map(|address| {
                let role = if address == last {
                    Role::Retrigger
                } else {
                    Role::Plain
                };
                (address.clone(), role)
            })
            .collect();
        Ok(Self {
            order: hardware_devices.to_vec(),
            roles,
            retrigger: last.clone(),
        })
    }

    /// Role of `address`, `None` if it is not a started hardware device.
    pub fn role_of(&self, address: &DeviceAddress) -> Option<Role> {
        self.roles.get(address).copied()
    }

    /// The device bound to the retrigger callback.
    pub fn retrigger_device(&self) -> &DeviceAddress {
        &self.retrigger
    }

    /// Hardware devices in trigger order.
    pub fn devices(&self) -> &[DeviceAddress] {
        &self.order
    }

    /// Devices with their roles, in trigger order.
    pub fn iter(&self) -> impl Iterator<Item = (&DeviceAddress, Role)> + '_ {
        self.order.iter().map(move |a| {
            let role = if *a == self.retrigger {
                Role::Retrigger
            } else {
                Role::Plain
            };
            (a, role)
        })
    }
}

/// Issues software trigger edges to the seed device.
///
/// Cheap to clone; every clone fires the same device.
#[derive(Clone)]
pub struct TriggerCoordinator {
    target: DeviceAddress,
    trigger: Arc<dyn SoftwareTrigger>,
}

impl TriggerCoordinator {
    /// Coordinator firing through `trigger`.
    pub fn new(trigger: Arc<dyn SoftwareTrigger>) -> Self {
        Self {
            target: trigger.address().clone(),
            trigger,
        }
    }

    /// Address of the software-triggered device.
    pub fn target(&self) -> &DeviceAddress {
        &self.target
    }

    /// Send one software trigger edge. Does not wait for the exposure.
    pub fn fire_software_trigger(&self) -> DeviceResult<()> {
        tracing::trace!(device = %self.target, "Firing software trigger");
        self.trigger.fire()
    }
}

impl std::fmt::Debug for TriggerCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerCoordinator")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// How a trigger travels along one edge of the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Digital output line to trigger input.
    Hardware,
    /// Frame callback fires a software trigger.
    Software,
}

/// One producer to consumer hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEdge {
    /// Device whose frame causes the trigger.
    pub from: DeviceAddress,
    /// Device that gets triggered.
    pub to: DeviceAddress,
    /// Transport of the trigger.
    pub kind: EdgeKind,
}

/// Producer to consumer edges of the ring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerWiring {
    edges: Vec<TriggerEdge>,
}

impl TriggerWiring {
    /// Chain `software` through `hardware` in order and close the ring back
    /// to `software`.
    pub fn ring(software: &DeviceAddress, hardware: &[DeviceAddress]) -> Self {
        let Some(last) = hardware.last() else {
            return Self::default();
        };
        let mut edges = Vec::with_capacity(hardware.len() + 1);
        let mut upstream = software;
        for address in hardware {
            edges.push(TriggerEdge {
                from: upstream.clone(),
                to: address.clone(),
                kind: EdgeKind::Hardware,
            });
            upstream = address;
        }
        edges.push(TriggerEdge {
            from: last.clone(),
            to: software.clone(),
            kind: EdgeKind::Software,
        });
        Self { edges }
    }

    /// All edges, ring order.
    pub fn edges(&self) -> &[TriggerEdge] {
        &self.edges
    }

    /// Edges that are trigger cables.
    pub fn hardware_edges(&self) -> impl Iterator<Item = &TriggerEdge> {
        self.edges.iter().filter(|e| e.kind == EdgeKind::Hardware)
    }

    /// The closing edge back to the software device.
    pub fn software_edge(&self) -> Option<&TriggerEdge> {
        self.edges.iter().find(|e| e.kind == EdgeKind::Software)
    }
}

impl std::fmt::Display for TriggerWiring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut edges = self.edges.iter().peekable();
        if let Some(first) = edges.peek() {
            write!(f, "{}", first.from)?;
        }
        for edge in edges {
            let arrow = match edge.kind {
                EdgeKind::Hardware => "->",
                EdgeKind::Software => "=>",
            };
            write!(f, " {} {}", arrow, edge.to)?;
        }
        Ok(())
    }
}
