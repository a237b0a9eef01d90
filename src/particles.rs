// --- File: particles.rs ---
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::error::SolverError;

pub const FLAG_MEMBRANE: u32 = 1 << 0;

// --- GPU Data Structure ---
// One point mass. `repr(C)` and explicit padding keep it 64 bytes with no implicit holes,
// so slices can be handed to wgpu through `bytemuck::cast_slice` unchanged.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: Vec3,
    pub inverse_mass: f32,
    pub previous_position: Vec3,
    pub radius: f32,
    pub velocity: Vec3,
    pub organism: u32,
    pub flags: u32,
    pub _padding: [u32; 3],
}

impl Particle {
    pub fn new(position: Vec3, inverse_mass: f32, radius: f32, organism: u32, membrane: bool) -> Self {
        Self {
            position,
            inverse_mass,
            previous_position: position,
            radius,
            velocity: Vec3::ZERO,
            organism,
            flags: if membrane { FLAG_MEMBRANE } else { 0 },
            _padding: [0; 3],
        }
    }

    #[inline]
    pub fn is_membrane(&self) -> bool {
        self.flags & FLAG_MEMBRANE != 0
    }

    /// Position on the simulation plane (x, z).
    #[inline]
    pub fn planar(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.z)
    }

    /// Position blended between the last two solved states.
    #[inline]
    pub fn interpolated(&self, alpha: f32) -> Vec3 {
        self.previous_position.lerp(self.position, alpha.clamp(0.0, 1.0))
    }
}

/// Flat, pre-sized particle array. Slots past `len()` are zeroed and never touched by the
/// solver.
#[derive(Debug)]
pub struct ParticleStore {
    particles: Vec<Particle>,
    active: usize,
}

impl ParticleStore {
    pub fn with_capacity(capacity: usize) -> Result<Self, SolverError> {
        let mut particles = Vec::new();
        particles.try_reserve_exact(capacity)?;
        particles.resize(capacity, Particle::zeroed());
        Ok(Self {
            particles,
            active: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    pub fn len(&self) -> usize {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.particles[..self.active]
    }

    pub fn as_mut_slice(&mut self) -> &mut [Particle] {
        &mut self.particles[..self.active]
    }

    /// Writes a block into the free region directly after the active range and activates it.
    /// Returns the index of the first written particle, or `None` when the block does not fit.
    pub fn append(&mut self, block: &[Particle]) -> Option<usize> {
        let start = self.active;
        let end = start.checked_add(block.len())?;
        if end > self.particles.len() {
            return None;
        }
        self.particles[start..end].copy_from_slice(block);
        self.active = end;
        Some(start)
    }

    /// Deactivates every slot. Storage stays allocated.
    pub fn clear(&mut self) {
        self.particles[..self.active].fill(Particle::zeroed());
        self.active = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_gpu_friendly() {
        assert_eq!(std::mem::size_of::<Particle>(), 64);
        let zero = Particle::zeroed();
        let bytes: &[u8] = bytemuck::bytes_of(&zero);
        assert_eq!(bytes.len(), 64);
    }

    #[test]
    fn append_refuses_overflow() {
        let mut store = ParticleStore::with_capacity(3).unwrap();
        assert_eq!(store.capacity(), 3);
        assert!(store.is_empty());
        let block = [Particle::new(Vec3::ONE, 1.0, 0.1, 0, true); 2];
        assert_eq!(store.append(&block), Some(0));
        assert_eq!(store.append(&block), None);
        assert_eq!(store.len(), 2);
        assert!(store.as_slice()[1].is_membrane());

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 3);
        assert_eq!(store.append(&block), Some(0));
    }

    #[test]
    fn interpolation_clamps_alpha() {
        let mut particle = Particle::new(Vec3::ZERO, 1.0, 0.1, 0, false);
        particle.position = Vec3::new(2.0, 0.0, 0.0);
        assert_eq!(particle.interpolated(0.5).x, 1.0);
        assert_eq!(particle.interpolated(3.0).x, 2.0);
    }
}
