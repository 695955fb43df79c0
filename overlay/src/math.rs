//! Rigid-body math for device and panel poses.
//!
//! Core types:
//! - `Vec3`: 3D vector
//! - `Quat`: rotation quaternion
//! - `Pose`: 4x4 rigid transform, row-major in the VR runtime's convention
//!   (column vectors, translation in the fourth column)

use std::ops::{Add, Mul, Neg, Sub};

// ── Vec3 ─────────────────────────────────────────────────────

/// 3D vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const X: Self = Self {
        x: 1.0,
        y: 0.0,
        z: 0.0,
    };
    pub const Y: Self = Self {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };
    pub const Z: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn normalize(self) -> Self {
        let len = self.length();
        if len < 1e-12 {
            return Self::ZERO;
        }
        self * (1.0 / len)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ── Quat ─────────────────────────────────────────────────────

/// Quaternion for rotations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quat {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// The all-zero quaternion, produced from an invalid (all-zero) basis.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 0.0,
    };

    /// Rotation of `angle` radians around `axis`.
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let axis = axis.normalize();
        let (s, c) = (angle * 0.5).sin_cos();
        Self {
            x: axis.x * s,
            y: axis.y * s,
            z: axis.z * s,
            w: c,
        }
    }

    /// True for the all-zero quaternion or any non-finite component.
    /// Tracking reports such rotations for invalid samples.
    pub fn is_degenerate(&self) -> bool {
        let finite = self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite();
        !finite || (self.x == 0.0 && self.y == 0.0 && self.z == 0.0 && self.w == 0.0)
    }

    /// Hamilton product `self * other` (apply `other` first).
    pub fn mul(&self, other: &Self) -> Self {
        let (a, b) = (self, other);
        Self {
            w: a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
            x: a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            y: a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            z: a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        }
    }

    /// Rotate a vector by this quaternion.
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        // v + 2 * (w * cross(q, v) + cross(q, cross(q, v)))
        let qv = Vec3::new(self.x, self.y, self.z);
        let uv = qv.cross(v);
        let uuv = qv.cross(uv);
        v + (uv * self.w + uuv) * 2.0
    }
}

// ── Pose ─────────────────────────────────────────────────────

/// A 4x4 rigid transform stored row-major, as exchanged with the VR runtime.
///
/// Points transform as column vectors: `world = pose * local`. The rotation
/// basis lives in the upper-left 3x3 block and the translation in the fourth
/// column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub rows: [[f64; 4]; 4],
}

impl Pose {
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Build from a flattened row-major 4x4 (16 values).
    pub fn from_row_major(m: [f64; 16]) -> Self {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            row.copy_from_slice(&m[r * 4..r * 4 + 4]);
        }
        Self { rows }
    }

    /// Build from a runtime-provided slice. Returns `None` for the empty
    /// slice the runtime reports for an untracked device, or any slice
    /// that is not exactly 16 values.
    pub fn from_slice(m: &[f64]) -> Option<Self> {
        let arr: [f64; 16] = m.try_into().ok()?;
        Some(Self::from_row_major(arr))
    }

    /// Flatten back to row-major order.
    pub fn to_row_major(&self) -> [f64; 16] {
        let mut out = [0.0; 16];
        for (r, row) in self.rows.iter().enumerate() {
            out[r * 4..r * 4 + 4].copy_from_slice(row);
        }
        out
    }

    pub fn from_translation(t: Vec3) -> Self {
        let mut p = Self::IDENTITY;
        p.rows[0][3] = t.x;
        p.rows[1][3] = t.y;
        p.rows[2][3] = t.z;
        p
    }

    /// Compose a rotation and translation.
    pub fn from_rotation_translation(q: &Quat, t: Vec3) -> Self {
        let (x, y, z, w) = (q.x, q.y, q.z, q.w);
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);
        Self {
            rows: [
                [1.0 - 2.0 * (yy + zz), 2.0 * (xy - wz), 2.0 * (xz + wy), t.x],
                [2.0 * (xy + wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz - wx), t.y],
                [2.0 * (xz - wy), 2.0 * (yz + wx), 1.0 - 2.0 * (xx + yy), t.z],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Build from basis columns and a translation.
    pub fn from_basis(x_axis: Vec3, y_axis: Vec3, z_axis: Vec3, t: Vec3) -> Self {
        Self {
            rows: [
                [x_axis.x, y_axis.x, z_axis.x, t.x],
                [x_axis.y, y_axis.y, z_axis.y, t.y],
                [x_axis.z, y_axis.z, z_axis.z, t.z],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// World-space position (translation column).
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.rows[0][3], self.rows[1][3], self.rows[2][3])
    }

    /// First rotation basis column (local +X in world space).
    pub fn basis_x(&self) -> Vec3 {
        self.column(0)
    }

    /// Second rotation basis column (local +Y in world space).
    pub fn basis_y(&self) -> Vec3 {
        self.column(1)
    }

    /// Third rotation basis column (local +Z in world space).
    pub fn basis_z(&self) -> Vec3 {
        self.column(2)
    }

    /// Pointing direction of a tracked device: local -Z in world space.
    pub fn forward(&self) -> Vec3 {
        -self.basis_z()
    }

    fn column(&self, c: usize) -> Vec3 {
        Vec3::new(self.rows[0][c], self.rows[1][c], self.rows[2][c])
    }

    /// Matrix product `self * other`.
    pub fn mul(&self, other: &Self) -> Self {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.rows[r][k] * other.rows[k][c]).sum();
            }
        }
        Self { rows }
    }

    /// Transform a point (w = 1).
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let r = &self.rows;
        Vec3::new(
            r[0][0] * p.x + r[0][1] * p.y + r[0][2] * p.z + r[0][3],
            r[1][0] * p.x + r[1][1] * p.y + r[1][2] * p.z + r[1][3],
            r[2][0] * p.x + r[2][1] * p.y + r[2][2] * p.z + r[2][3],
        )
    }

    /// Transform a direction (w = 0).
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.transform_point(v) - self.translation()
    }

    /// Inverse of a rigid transform: transpose the rotation block and
    /// rotate the negated translation. Returns `None` when the rotation
    /// block is singular or any element is non-finite.
    pub fn inverse(&self) -> Option<Self> {
        if !self.is_finite() {
            return None;
        }
        let (bx, by, bz) = (self.basis_x(), self.basis_y(), self.basis_z());
        let det = bx.dot(by.cross(bz));
        if det.abs() < 1e-12 {
            return None;
        }

        let t = self.translation();
        let mut inv = Self::IDENTITY;
        for r in 0..3 {
            for c in 0..3 {
                inv.rows[r][c] = self.rows[c][r];
            }
        }
        inv.rows[0][3] = -bx.dot(t);
        inv.rows[1][3] = -by.dot(t);
        inv.rows[2][3] = -bz.dot(t);
        Some(inv)
    }

    /// Rotation part as a quaternion, with each basis column normalized.
    /// An all-zero basis yields `Quat::ZERO`.
    pub fn rotation(&self) -> Quat {
        let (bx, by, bz) = (self.basis_x(), self.basis_y(), self.basis_z());
        let (sx, sy, sz) = (bx.length(), by.length(), bz.length());
        if sx < 1e-12 || sy < 1e-12 || sz < 1e-12 {
            return Quat::ZERO;
        }
        let (bx, by, bz) = (bx * (1.0 / sx), by * (1.0 / sy), bz * (1.0 / sz));
        // m[r][c] with columns bx, by, bz
        let (m00, m01, m02) = (bx.x, by.x, bz.x);
        let (m10, m11, m12) = (bx.y, by.y, bz.y);
        let (m20, m21, m22) = (bx.z, by.z, bz.z);

        let trace = m00 + m11 + m22;
        if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Quat {
                w: 0.25 * s,
                x: (m21 - m12) / s,
                y: (m02 - m20) / s,
                z: (m10 - m01) / s,
            }
        } else if m00 > m11 && m00 > m22 {
            let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
            Quat {
                w: (m21 - m12) / s,
                x: 0.25 * s,
                y: (m01 + m10) / s,
                z: (m02 + m20) / s,
            }
        } else if m11 > m22 {
            let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
            Quat {
                w: (m02 - m20) / s,
                x: (m01 + m10) / s,
                y: 0.25 * s,
                z: (m12 + m21) / s,
            }
        } else {
            let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
            Quat {
                w: (m10 - m01) / s,
                x: (m02 + m20) / s,
                y: (m12 + m21) / s,
                z: 0.25 * s,
            }
        }
    }

    pub fn is_finite(&self) -> bool {
        self.rows.iter().flatten().all(|v| v.is_finite())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
pub(crate) fn assert_pose_close(a: &Pose, b: &Pose, eps: f64) {
    for r in 0..4 {
        for c in 0..4 {
            assert!(
                (a.rows[r][c] - b.rows[r][c]).abs() < eps,
                "pose mismatch at [{r}][{c}]: {} vs {}",
                a.rows[r][c],
                b.rows[r][c]
            );
        }
    }
}
