//! Truth entities stored per simulated event
//!
//! A [`TruthInfoContainer`] holds three keyed collections: particles,
//! vertices and showers. Keys are integer ids; by convention primary
//! particles and vertices carry positive ids and secondaries negative ones.
//! Collections iterate in key order.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};

/// Ordered map from id to particle
pub type ParticleMap = BTreeMap<i32, Particle>;
/// Ordered map from id to vertex
pub type VertexMap = BTreeMap<i32, Vertex>;
/// Ordered map from id to shower
pub type ShowerMap = BTreeMap<i32, Shower>;

/// A simulated particle (track)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Particle {
    pub track_id: i32,
    pub vtx_id: i32,
    pub parent_id: i32,
    pub primary_id: i32,
    /// PDG particle code
    pub pid: i32,
    pub name: String,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
    pub barcode: i32,
}

impl Particle {
    pub fn new(track_id: i32, pid: i32, name: impl Into<String>) -> Self {
        Self {
            track_id,
            pid,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the four-momentum
    pub fn with_momentum(mut self, px: f64, py: f64, pz: f64, e: f64) -> Self {
        self.px = px;
        self.py = py;
        self.pz = pz;
        self.e = e;
        self
    }
}

/// A production or interaction vertex
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Vertex {
    pub id: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub t: f64,
    /// Physics process that created the vertex
    pub process: i32,
}

impl Vertex {
    pub fn new(id: i32, x: f64, y: f64, z: f64, t: f64) -> Self {
        Self {
            id,
            x,
            y,
            z,
            t,
            process: 0,
        }
    }
}

/// Energy deposit summary of a particle cascade
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Shower {
    pub id: i32,
    pub parent_particle_id: i32,
    pub parent_shower_id: i32,
    pub position: [f32; 3],
    /// Upper triangle of the position covariance
    pub covariance: [f32; 6],
    /// Deposited energy per detector volume
    pub edep: BTreeMap<i32, f32>,
    /// Ionization energy per detector volume
    pub eion: BTreeMap<i32, f32>,
    pub light_yield: BTreeMap<i32, f32>,
    pub particle_ids: BTreeSet<i32>,
    /// Hit ids per detector volume
    pub hit_ids: BTreeMap<i32, BTreeSet<u64>>,
}

impl Shower {
    pub fn new(id: i32, parent_particle_id: i32) -> Self {
        Self {
            id,
            parent_particle_id,
            ..Default::default()
        }
    }
}

/// Per-event truth record with three keyed collections
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TruthInfoContainer {
    particles: ParticleMap,
    vertices: VertexMap,
    showers: ShowerMap,
}

impl TruthInfoContainer {
    /// Class name recorded on branches holding this record type
    pub const CLASS_NAME: &'static str = "PHG4TruthInfoContainer";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn particle_map(&self) -> &ParticleMap {
        &self.particles
    }

    pub fn vertex_map(&self) -> &VertexMap {
        &self.vertices
    }

    pub fn shower_map(&self) -> &ShowerMap {
        &self.showers
    }

    /// Insert a particle, returning the one previously stored under `id`
    pub fn add_particle(&mut self, id: i32, particle: Particle) -> Option<Particle> {
        self.particles.insert(id, particle)
    }

    pub fn add_vertex(&mut self, id: i32, vertex: Vertex) -> Option<Vertex> {
        self.vertices.insert(id, vertex)
    }

    pub fn add_shower(&mut self, id: i32, shower: Shower) -> Option<Shower> {
        self.showers.insert(id, shower)
    }

    /// Remove every entity, keeping the container for reuse
    pub fn clear(&mut self) {
        self.particles.clear();
        self.vertices.clear();
        self.showers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty() && self.vertices.is_empty() && self.showers.is_empty()
    }
}
