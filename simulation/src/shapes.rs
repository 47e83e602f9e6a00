//! Generated topologies for exercising the engine
//!
//! Provides builders for common shapes of N devices:
//! - Line: each device connected to the next
//! - Ring: a line closed back onto the first device
//! - Star: the first device connected to every other
//! - Full mesh: every device connected to every other
//! - Random: configurable connection probability, no isolated devices
//!
//! The first device is a router; the rest cycle through switch, pc, and
//! server.

use std::fmt::Write as _;

use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};

use netsim_core::{ConnectionSpec, DeviceId, DeviceKind, DeviceSpec, EngineResult};
use netsim_engine::NetworkEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Shape {
    Line,
    Ring,
    Star,
    FullMesh,
    Random,
}

/// Devices and the edges between them, by index, before anything is placed
#[derive(Debug, Clone)]
pub struct TopologyPlan {
    pub devices: Vec<DeviceSpec>,
    pub edges: Vec<(usize, usize)>,
}

impl TopologyPlan {
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn are_connected(&self, a: usize, b: usize) -> bool {
        self.edges.iter().any(|&(x, y)| (x, y) == (a, b) || (x, y) == (b, a))
    }

    pub fn neighbors(&self, index: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter_map(|&(a, b)| match index {
                i if i == a => Some(b),
                i if i == b => Some(a),
                _ => None,
            })
            .collect()
    }

    /// Place the devices and connections in `engine`, returning the ids
    /// assigned to the devices in plan order.
    ///
    /// Each edge claims the next unused default interface on both ends; a
    /// device that has run out links without naming an interface.
    pub async fn apply(&self, engine: &NetworkEngine) -> EngineResult<Vec<DeviceId>> {
        let mut ids = Vec::with_capacity(self.devices.len());
        for spec in &self.devices {
            ids.push(engine.add_device(spec.clone()).await?.id);
        }

        let mut used = vec![0usize; self.devices.len()];
        for &(a, b) in &self.edges {
            let spec = ConnectionSpec::new(ids[a].clone(), ids[b].clone())
                .via(self.next_interface(a, &mut used), self.next_interface(b, &mut used));
            engine.add_connection(spec).await?;
        }
        Ok(ids)
    }

    fn next_interface(&self, index: usize, used: &mut [usize]) -> String {
        let names = self.devices[index].kind.default_interfaces();
        let name = names.get(used[index]).map(|iface| iface.name.clone()).unwrap_or_default();
        used[index] += 1;
        name
    }

    /// Print a simple ASCII view of the plan
    pub fn visualize(&self) -> String {
        let mut output = String::new();
        output.push_str("Topology:\n");
        let _ = writeln!(output, "  Devices: {}", self.device_count());
        let _ = writeln!(output, "  Edges: {}\n", self.edge_count());

        for (index, device) in self.devices.iter().enumerate() {
            let neighbors: Vec<&str> = self
                .neighbors(index)
                .into_iter()
                .map(|n| self.devices[n].name.as_str())
                .collect();
            let _ = writeln!(
                output,
                "  {} ({}) -> [{}]",
                device.name,
                device.kind,
                neighbors.join(", ")
            );
        }
        output
    }
}

/// Builder for generated topologies
pub struct ShapeBuilder {
    device_count: usize,
}

impl ShapeBuilder {
    /// Create a builder for `device_count` devices (at least one)
    pub fn new(device_count: usize) -> Self {
        Self {
            device_count: device_count.max(1),
        }
    }

    pub fn build(self, shape: Shape, connection_probability: f64) -> TopologyPlan {
        match shape {
            Shape::Line => self.line(),
            Shape::Ring => self.ring(),
            Shape::Star => self.star(),
            Shape::FullMesh => self.full_mesh(),
            Shape::Random => self.random(connection_probability),
        }
    }

    fn plan(&self, edges: Vec<(usize, usize)>) -> TopologyPlan {
        TopologyPlan {
            devices: device_specs(self.device_count),
            edges,
        }
    }

    /// R1 - S1 - PC1 - SRV1 - ...
    pub fn line(self) -> TopologyPlan {
        let edges = (1..self.device_count).map(|i| (i - 1, i)).collect();
        self.plan(edges)
    }

    /// A line whose last device links back to the first. Rings of fewer
    /// than three devices are lines.
    pub fn ring(self) -> TopologyPlan {
        let n = self.device_count;
        let mut edges: Vec<(usize, usize)> = (1..n).map(|i| (i - 1, i)).collect();
        if n > 2 {
            edges.push((n - 1, 0));
        }
        self.plan(edges)
    }

    /// The router in the centre, connected to every other device
    pub fn star(self) -> TopologyPlan {
        let edges = (1..self.device_count).map(|i| (0, i)).collect();
        self.plan(edges)
    }

    pub fn full_mesh(self) -> TopologyPlan {
        let n = self.device_count;
        let edges = (0..n).flat_map(|i| ((i + 1)..n).map(move |j| (i, j))).collect();
        self.plan(edges)
    }

    /// Random edges with the given probability, using the thread RNG
    pub fn random(self, connection_probability: f64) -> TopologyPlan {
        self.random_with(connection_probability, &mut rand::rng())
    }

    /// Random edges drawn from `rng`. Any device left without a neighbour
    /// is connected to another device chosen at random.
    pub fn random_with<R: Rng>(self, connection_probability: f64, rng: &mut R) -> TopologyPlan {
        let n = self.device_count;
        let mut plan = self.plan(Vec::new());

        for i in 0..n {
            for j in (i + 1)..n {
                if rng.random::<f64>() < connection_probability {
                    plan.edges.push((i, j));
                }
            }
        }

        if n > 1 {
            for i in 0..n {
                if plan.neighbors(i).is_empty() {
                    let mut other = rng.random_range(0..n - 1);
                    if other >= i {
                        other += 1;
                    }
                    plan.edges.push((i.min(other), i.max(other)));
                }
            }
        }

        plan
    }
}

/// Device kind for the device at `index`
pub fn kind_at(index: usize) -> DeviceKind {
    const CYCLE: [DeviceKind; 3] = [DeviceKind::Switch, DeviceKind::Pc, DeviceKind::Server];
    match index {
        0 => DeviceKind::Router,
        i => CYCLE[(i - 1) % CYCLE.len()],
    }
}

fn name_prefix(kind: DeviceKind) -> &'static str {
    match kind {
        DeviceKind::Router => "R",
        DeviceKind::Switch => "S",
        DeviceKind::Pc => "PC",
        DeviceKind::Server => "SRV",
    }
}

fn device_specs(count: usize) -> Vec<DeviceSpec> {
    let mut per_kind = [0usize; 4];
    (0..count)
        .map(|index| {
            let kind = kind_at(index);
            let slot = DeviceKind::ALL.iter().position(|k| *k == kind).unwrap_or(0);
            per_kind[slot] += 1;

            // Lay devices out on a circle so viewers have something sensible
            let angle = index as f64 / count as f64 * std::f64::consts::TAU;
            DeviceSpec::new(kind, format!("{}{}", name_prefix(kind), per_kind[slot]))
                .at(400.0 + 300.0 * angle.cos(), 300.0 + 300.0 * angle.sin())
        })
        .collect()
}
