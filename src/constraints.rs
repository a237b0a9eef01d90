// --- File: constraints.rs ---
use bytemuck::{Pod, Zeroable};

use crate::error::SolverError;

/// What a distance constraint models. Stored as `u32` in [`Constraint::kind`].
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Unused slot in an organism's fixed stride.
    Padding = 0,
    /// Skeleton ring edges and radial struts.
    Skeleton = 1,
    /// Adjacent membrane points.
    Membrane = 2,
    /// Membrane points two apart; resists folding.
    Bending = 3,
    /// Membrane to skeleton springs.
    Attachment = 4,
}

impl ConstraintKind {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Skeleton,
            2 => Self::Membrane,
            3 => Self::Bending,
            4 => Self::Attachment,
            _ => Self::Padding,
        }
    }
}

// --- GPU Data Structure ---
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Constraint {
    pub a: u32,
    pub b: u32,
    pub rest_length: f32,
    pub compliance: f32,
    // XPBD accumulated multiplier, reset every tick.
    pub lambda: f32,
    pub kind: u32,
}

impl Constraint {
    pub fn new(a: u32, b: u32, rest_length: f32, compliance: f32, kind: ConstraintKind) -> Self {
        Self {
            a,
            b,
            rest_length,
            compliance,
            lambda: 0.0,
            kind: kind as u32,
        }
    }

    /// A self-referencing, zero-effect slot.
    pub fn padding(anchor: u32) -> Self {
        Self::new(anchor, anchor, 0.0, 0.0, ConstraintKind::Padding)
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.a != self.b
    }

    #[inline]
    pub fn kind(&self) -> ConstraintKind {
        ConstraintKind::from_raw(self.kind)
    }
}

/// Flat, pre-sized constraint array with a uniform per-organism stride.
#[derive(Debug)]
pub struct ConstraintStore {
    constraints: Vec<Constraint>,
    active: usize,
}

impl ConstraintStore {
    pub fn with_capacity(capacity: usize) -> Result<Self, SolverError> {
        let mut constraints = Vec::new();
        constraints.try_reserve_exact(capacity)?;
        constraints.resize(capacity, Constraint::zeroed());
        Ok(Self {
            constraints,
            active: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.constraints.len()
    }

    pub fn len(&self) -> usize {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    pub fn as_slice(&self) -> &[Constraint] {
        &self.constraints[..self.active]
    }

    pub fn as_mut_slice(&mut self) -> &mut [Constraint] {
        &mut self.constraints[..self.active]
    }

    pub fn append(&mut self, block: &[Constraint]) -> Option<usize> {
        let start = self.active;
        let end = start.checked_add(block.len())?;
        if end > self.constraints.len() {
            return None;
        }
        self.constraints[start..end].copy_from_slice(block);
        self.active = end;
        Some(start)
    }

    /// Deactivates every slot. Storage stays allocated.
    pub fn clear(&mut self) {
        self.constraints[..self.active].fill(Constraint::zeroed());
        self.active = 0;
    }
}
