//! NVMe over Fibre Channel discovery.
//!
//! ```text
//! <adapter>/nvme-of                                   nvme-discovery-controllers
//! <adapter>/nvme-of/controller@<id>,ffff              nvme-controllers
//! <adapter>/nvme-of/controller@<addr>,ffff:nqn=<nqn>  get-namespace-list
//! <adapter>/nvme-of/controller@<addr>,ffff:nqn=<nqn>/namespace@<nsid>
//! ```
//!
//! Each level is opened, queried and closed before the next one is opened.

use super::node::OpenNode;
use super::tables::{
    MAX_NVME_ENTRIES, NVME_CONTROLLER_RECORD_LEN, NvmeController, be_u32s, be_u64s,
    nvme_controllers,
};
use crate::error::DiskError;
use crate::path::DevicePath;
use crate::registry::Registry;
use alloc::string::ToString;
use alloc::vec::Vec;
use ieee1275_client::Firmware;
use log::debug;

pub const DISCOVERY_CONTROLLERS: &str = "nvme-discovery-controllers";
pub const CONTROLLERS: &str = "nvme-controllers";
pub const NAMESPACES: &str = "get-namespace-list";

/// Registers every namespace reachable through the adapter's NVMe-oF layer,
/// plus each controller path itself.
///
/// Only a failure at the discovery level is an error; an unreachable
/// controller is skipped.
pub fn enumerate<F: Firmware + ?Sized>(
    firmware: &mut F,
    registry: &mut Registry,
    path: &str,
) -> Result<usize, DiskError> {
    let layer = DevicePath::new(path).node("nvme-of");
    let discovery = discovery_controllers(firmware, &layer.to_string())?;
    debug!(target: "ofdisk", "NVMeoF: found {} discovery controllers", discovery.len());

    let mut found = 0;
    for id in discovery {
        let discovery_path = layer
            .clone()
            .child("controller", format_args!("{id:x},ffff"))
            .to_string();
        let controllers = match list_controllers(firmware, &discovery_path) {
            Ok(controllers) => controllers,
            Err(e) => {
                debug!(target: "ofdisk", "{discovery_path}: {e}");
                continue;
            }
        };
        debug!(target: "ofdisk", "NVMeoF: found {} nvme controllers", controllers.len());

        for controller in controllers {
            let controller_path = layer
                .clone()
                .child(
                    "controller",
                    format_args!("{},ffff", controller.transport_address),
                )
                .args(format_args!("nqn={}", controller.nqn));
            let controller_name = controller_path.to_string();
            debug!(
                target: "ofdisk",
                "NVMeoF: controller {:#x} at {controller_name}",
                controller.id
            );
            let namespaces = match list_namespaces(firmware, &controller_name) {
                Ok(namespaces) => namespaces,
                Err(e) => {
                    debug!(target: "ofdisk", "{controller_name}: {e}");
                    continue;
                }
            };
            debug!(target: "ofdisk", "NVMeoF: found {} namespaces", namespaces.len());

            for namespace in namespaces {
                let disk = controller_path
                    .clone()
                    .child("namespace", format_args!("{namespace:x}"))
                    .to_string();
                registry.register(&disk, &disk);
                found += 1;
            }
            registry.register(&controller_name, &controller_name);
        }
    }
    Ok(found)
}

fn discovery_controllers<F: Firmware + ?Sized>(
    firmware: &mut F,
    path: &str,
) -> Result<Vec<u64>, DiskError> {
    let mut node = OpenNode::open(firmware, path)?;
    let mut rets = [0; 2];
    node.call(DISCOVERY_CONTROLLERS, &mut [], &mut rets)?;
    let table = node.table(DISCOVERY_CONTROLLERS, rets[0], rets[1], 8, MAX_NVME_ENTRIES)?;
    Ok(be_u64s(table).collect())
}

fn list_controllers<F: Firmware + ?Sized>(
    firmware: &mut F,
    path: &str,
) -> Result<Vec<NvmeController>, DiskError> {
    let mut node = OpenNode::open(firmware, path)?;
    let mut rets = [0; 2];
    node.call(CONTROLLERS, &mut [], &mut rets)?;
    let table = node.table(
        CONTROLLERS,
        rets[0],
        rets[1],
        NVME_CONTROLLER_RECORD_LEN,
        MAX_NVME_ENTRIES,
    )?;
    Ok(nvme_controllers(table))
}

fn list_namespaces<F: Firmware + ?Sized>(
    firmware: &mut F,
    path: &str,
) -> Result<Vec<u32>, DiskError> {
    let mut node = OpenNode::open(firmware, path)?;
    let mut rets = [0; 2];
    node.call(NAMESPACES, &mut [], &mut rets)?;
    let table = node.table(NAMESPACES, rets[0], rets[1], 4, MAX_NVME_ENTRIES)?;
    Ok(be_u32s(table).collect())
}
