//! 4x4 transform matrix with lazy classification and a cached inverse.
//!
//! Storage is column-major (`m[col * 4 + row]`) in 32-bit floats. Every
//! mutation ORs in the geometry flags it implies and marks the derived state
//! (type, inverse) stale; the type is then recomputed on demand and used to
//! pick a cheap inversion routine where one applies.

use std::f32::consts::PI;

bitflags::bitflags! {
    /// Geometry properties accumulated by the operations applied to a matrix.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MatrixFlags: u32 {
        /// Arbitrary contents.
        const GENERAL = 0x1;
        /// A rotation was applied.
        const ROTATION = 0x2;
        /// A translation was applied.
        const TRANSLATION = 0x4;
        /// A scale equal on all axes was applied.
        const UNIFORM_SCALE = 0x8;
        /// A non-uniform scale was applied.
        const GENERAL_SCALE = 0x10;
        /// The z row or column is not trivial.
        const GENERAL_3D = 0x20;
        /// The bottom row is not `[0, 0, 0, 1]`.
        const PERSPECTIVE = 0x40;
        /// The last inversion attempt failed.
        const SINGULAR = 0x80;
    }
}

impl MatrixFlags {
    const ANGLE_PRESERVING: Self = Self::ROTATION
        .union(Self::TRANSLATION)
        .union(Self::UNIFORM_SCALE);
    const LENGTH_PRESERVING: Self = Self::ROTATION.union(Self::TRANSLATION);
    const AFFINE_3D: Self = Self::ROTATION
        .union(Self::TRANSLATION)
        .union(Self::UNIFORM_SCALE)
        .union(Self::GENERAL_SCALE)
        .union(Self::GENERAL_3D);

    /// True when no flag outside `allowed` is set.
    fn only(self, allowed: Self) -> bool {
        self.difference(allowed).is_empty()
    }
}

/// Classification used to select multiplication and inversion fast paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatrixType {
    /// No known structure.
    General,
    /// The identity.
    Identity,
    /// 3D scale and translation.
    ThreeDNoRot,
    /// Projective bottom row.
    Perspective,
    /// 2D affine.
    TwoD,
    /// 2D scale and translation.
    TwoDNoRot,
    /// 3D affine.
    ThreeD,
}

/// How much derived state is stale. Each level implies the ones below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Dirty {
    Clean,
    Inverse,
    Type,
    Flags,
}

/// Column-major identity elements.
pub const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Column-major 4x4 float matrix.
#[derive(Clone, Copy, Debug)]
pub struct Matrix {
    m: [f32; 16],
    inv: [f32; 16],
    ty: MatrixType,
    flags: MatrixFlags,
    dirty: Dirty,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// Only the 16 elements take part in equality; cached state does not.
impl PartialEq for Matrix {
    fn eq(&self, other: &Self) -> bool {
        self.m == other.m
    }
}

impl std::ops::Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Matrix) -> Matrix {
        Matrix::multiply(&self, &rhs)
    }
}

impl Matrix {
    /// The identity matrix.
    pub fn identity() -> Self {
        Self {
            m: IDENTITY,
            inv: IDENTITY,
            ty: MatrixType::Identity,
            flags: MatrixFlags::empty(),
            dirty: Dirty::Inverse,
        }
    }

    /// Matrix from column-major elements.
    pub fn from_array(array: [f32; 16]) -> Self {
        let mut m = Self::identity();
        m.init_from_array(array);
        m
    }

    /// Reset to the identity.
    pub fn init_identity(&mut self) {
        *self = Self::identity();
    }

    /// Replace the elements. Nothing is assumed about the new contents.
    pub fn init_from_array(&mut self, array: [f32; 16]) {
        self.m = array;
        self.flags = MatrixFlags::GENERAL;
        self.dirty = Dirty::Flags;
    }

    /// Column-major elements.
    pub fn as_array(&self) -> &[f32; 16] {
        &self.m
    }

    /// Element at `row`, `col`.
    pub fn element(&self, row: usize, col: usize) -> f32 {
        self.m[col * 4 + row]
    }

    /// Row-major copy of the elements.
    pub fn transpose(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        for row in 0..4 {
            for col in 0..4 {
                out[row * 4 + col] = self.m[col * 4 + row];
            }
        }
        out
    }

    /// `a * b`, so that `b` is applied to points first.
    pub fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
        let flags = a.flags | b.flags;
        let m = if flags.only(MatrixFlags::AFFINE_3D) {
            multiply_3x4(&a.m, &b.m)
        } else {
            multiply_4x4(&a.m, &b.m)
        };
        Matrix {
            m,
            inv: a.inv,
            ty: a.ty,
            flags,
            dirty: Dirty::Type,
        }
    }

    /// Post-multiply by a raw array of unknown shape.
    pub fn multiply_array(&mut self, array: &[f32; 16]) {
        self.flags |= MatrixFlags::GENERAL;
        self.dirty = Dirty::Flags;
        self.m = multiply_4x4(&self.m, array);
    }

    fn multiply_array_with_flags(&mut self, array: &[f32; 16], flags: MatrixFlags) {
        self.flags |= flags;
        self.mark_dirty(Dirty::Type);
        self.m = if self.flags.only(MatrixFlags::AFFINE_3D) {
            multiply_3x4(&self.m, array)
        } else {
            multiply_4x4(&self.m, array)
        };
    }

    fn mark_dirty(&mut self, level: Dirty) {
        self.dirty = self.dirty.max(level);
    }

    /// Post-multiply by a translation.
    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        let m = &mut self.m;
        m[12] = m[0] * x + m[4] * y + m[8] * z + m[12];
        m[13] = m[1] * x + m[5] * y + m[9] * z + m[13];
        m[14] = m[2] * x + m[6] * y + m[10] * z + m[14];
        m[15] = m[3] * x + m[7] * y + m[11] * z + m[15];
        self.flags |= MatrixFlags::TRANSLATION;
        self.mark_dirty(Dirty::Type);
    }

    /// Post-multiply by a scale.
    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        for i in 0..4 {
            self.m[i] *= x;
            self.m[4 + i] *= y;
            self.m[8 + i] *= z;
        }
        if (x - y).abs() < 1e-8 && (x - z).abs() < 1e-8 {
            self.flags |= MatrixFlags::UNIFORM_SCALE;
        } else {
            self.flags |= MatrixFlags::GENERAL_SCALE;
        }
        self.mark_dirty(Dirty::Type);
    }

    /// Rotate by `angle` degrees around the axis `(x, y, z)`.
    ///
    /// A degenerate axis (length at most `1e-4`) leaves the matrix unchanged.
    pub fn rotate(&mut self, angle: f32, x: f32, y: f32, z: f32) {
        let radians = angle * PI / 180.0;
        let (s, c) = radians.sin_cos();
        let mut r = IDENTITY;
        let at = |row: usize, col: usize| col * 4 + row;

        if x == 0.0 && y == 0.0 && z != 0.0 {
            r[at(0, 0)] = c;
            r[at(1, 1)] = c;
            let s = if z < 0.0 { -s } else { s };
            r[at(0, 1)] = -s;
            r[at(1, 0)] = s;
        } else if x == 0.0 && y != 0.0 && z == 0.0 {
            r[at(0, 0)] = c;
            r[at(2, 2)] = c;
            let s = if y < 0.0 { -s } else { s };
            r[at(0, 2)] = s;
            r[at(2, 0)] = -s;
        } else if x != 0.0 && y == 0.0 && z == 0.0 {
            r[at(1, 1)] = c;
            r[at(2, 2)] = c;
            let s = if x < 0.0 { -s } else { s };
            r[at(1, 2)] = -s;
            r[at(2, 1)] = s;
        } else {
            let mag = (x * x + y * y + z * z).sqrt();
            if mag <= 1.0e-4 {
                return;
            }
            let (x, y, z) = (x / mag, y / mag, z / mag);
            let one_c = 1.0 - c;

            r[at(0, 0)] = one_c * x * x + c;
            r[at(0, 1)] = one_c * x * y - z * s;
            r[at(0, 2)] = one_c * z * x + y * s;

            r[at(1, 0)] = one_c * x * y + z * s;
            r[at(1, 1)] = one_c * y * y + c;
            r[at(1, 2)] = one_c * y * z - x * s;

            r[at(2, 0)] = one_c * z * x - y * s;
            r[at(2, 1)] = one_c * y * z + x * s;
            r[at(2, 2)] = one_c * z * z + c;
        }

        self.multiply_array_with_flags(&r, MatrixFlags::ROTATION);
    }

    /// Post-multiply by a perspective frustum.
    pub fn frustum(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        let x = (2.0 * near) / (right - left);
        let y = (2.0 * near) / (top - bottom);
        let a = (right + left) / (right - left);
        let b = (top + bottom) / (top - bottom);
        let c = -(far + near) / (far - near);
        let d = -(2.0 * far * near) / (far - near);

        #[rustfmt::skip]
        let f = [
            x,   0.0, 0.0,  0.0,
            0.0, y,   0.0,  0.0,
            a,   b,   c,   -1.0,
            0.0, 0.0, d,    0.0,
        ];
        self.multiply_array_with_flags(&f, MatrixFlags::PERSPECTIVE);
    }

    /// Symmetric frustum from a vertical field of view in degrees.
    pub fn perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        let ymax = near * (fov_y * PI / 360.0).tan();
        self.frustum(-ymax * aspect, ymax * aspect, -ymax, ymax, near, far);
    }

    /// Post-multiply by an orthographic projection.
    pub fn ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        #[rustfmt::skip]
        let o = [
            2.0 / (right - left), 0.0, 0.0, 0.0,
            0.0, 2.0 / (top - bottom), 0.0, 0.0,
            0.0, 0.0, -2.0 / (far - near), 0.0,
            -(right + left) / (right - left),
            -(top + bottom) / (top - bottom),
            -(far + near) / (far - near),
            1.0,
        ];
        self.multiply_array_with_flags(
            &o,
            MatrixFlags::GENERAL_SCALE | MatrixFlags::TRANSLATION,
        );
    }

    /// Map a `width_2d` x `height_2d` top-left-origin plane onto the cross
    /// section of the given frustum at depth `z_2d`.
    #[allow(clippy::too_many_arguments)]
    pub fn view_2d_in_frustum(
        &mut self,
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        z_2d: f32,
        width_2d: f32,
        height_2d: f32,
    ) {
        let left_2d = left / near * z_2d;
        let right_2d = right / near * z_2d;
        let bottom_2d = bottom / near * z_2d;
        let top_2d = top / near * z_2d;

        let width_scale = (right_2d - left_2d) / width_2d;
        let height_scale = (top_2d - bottom_2d) / height_2d;

        self.translate(left_2d, top_2d, -z_2d);
        self.scale(width_scale, -height_scale, width_scale);
    }

    /// [`Matrix::view_2d_in_frustum`] for a symmetric perspective projection.
    pub fn view_2d_in_perspective(
        &mut self,
        fov_y: f32,
        aspect: f32,
        near: f32,
        z_2d: f32,
        width_2d: f32,
        height_2d: f32,
    ) {
        let top = near * (fov_y * PI / 360.0).tan();
        self.view_2d_in_frustum(
            -top * aspect,
            top * aspect,
            -top,
            top,
            near,
            z_2d,
            width_2d,
            height_2d,
        );
    }

    /// Transform a homogeneous point.
    pub fn transform_point(&self, x: f32, y: f32, z: f32, w: f32) -> [f32; 4] {
        let m = &self.m;
        [
            m[0] * x + m[4] * y + m[8] * z + m[12] * w,
            m[1] * x + m[5] * y + m[9] * z + m[13] * w,
            m[2] * x + m[6] * y + m[10] * z + m[14] * w,
            m[3] * x + m[7] * y + m[11] * z + m[15] * w,
        ]
    }

    /// The inverse, or `None` when the matrix is singular.
    pub fn get_inverse(&mut self) -> Option<Matrix> {
        if self.update_inverse() {
            Some(Matrix::from_array(self.inv))
        } else {
            None
        }
    }

    /// The inverse, falling back to the identity for singular matrices.
    pub fn inverse_or_identity(&mut self) -> Matrix {
        self.get_inverse().unwrap_or_default()
    }

    /// Recompute the cached inverse if stale. Returns false when singular,
    /// in which case the cached inverse is the identity.
    pub fn update_inverse(&mut self) -> bool {
        if self.dirty != Dirty::Clean {
            self.update_type_and_flags();
            let inverted = match self.ty {
                MatrixType::General | MatrixType::Perspective => invert_general(&self.m),
                MatrixType::Identity => Some(IDENTITY),
                MatrixType::ThreeDNoRot => invert_3d_no_rotation(&self.m, self.flags),
                MatrixType::TwoDNoRot => invert_2d_no_rotation(&self.m, self.flags),
                MatrixType::TwoD | MatrixType::ThreeD => invert_3d(&self.m, self.flags),
            };
            match inverted {
                Some(inv) => {
                    self.inv = inv;
                    self.flags.remove(MatrixFlags::SINGULAR);
                }
                None => {
                    self.inv = IDENTITY;
                    self.flags.insert(MatrixFlags::SINGULAR);
                }
            }
            self.dirty = Dirty::Clean;
        }
        !self.flags.contains(MatrixFlags::SINGULAR)
    }

    /// Classification, recomputed when stale.
    pub fn matrix_type(&mut self) -> MatrixType {
        self.update_type_and_flags();
        self.ty
    }

    /// Geometry flags, recomputed when stale.
    pub fn flags(&mut self) -> MatrixFlags {
        self.update_type_and_flags();
        self.flags
    }

    /// Whether the matrix classifies as the identity.
    pub fn is_identity(&mut self) -> bool {
        self.matrix_type() == MatrixType::Identity
    }

    /// Whether anything beyond scale and translation may have been applied.
    pub fn has_rotation(&mut self) -> bool {
        self.flags().intersects(
            MatrixFlags::GENERAL
                | MatrixFlags::ROTATION
                | MatrixFlags::GENERAL_3D
                | MatrixFlags::PERSPECTIVE,
        )
    }

    /// Whether only rotations and translations were applied.
    pub fn is_length_preserving(&mut self) -> bool {
        self.flags().only(MatrixFlags::LENGTH_PRESERVING)
    }

    /// Whether a non-uniform scale was applied.
    pub fn is_general_scale(&mut self) -> bool {
        self.flags().contains(MatrixFlags::GENERAL_SCALE)
    }

    fn update_type_and_flags(&mut self) {
        match self.dirty {
            Dirty::Flags => self.analyse_from_scratch(),
            Dirty::Type => self.analyse_from_flags(),
            Dirty::Inverse | Dirty::Clean => return,
        }
        self.dirty = Dirty::Inverse;
    }

    fn analyse_from_scratch(&mut self) {
        let m = &self.m;
        let mut mask = 0u32;
        for (i, v) in m.iter().enumerate() {
            if *v == 0.0 {
                mask |= zero(i);
            }
        }
        for i in [0, 5, 10, 15] {
            if m[i] == 1.0 {
                mask |= one(i);
            }
        }

        let mut flags = MatrixFlags::empty();
        if mask & MASK_NO_TRX != MASK_NO_TRX {
            flags |= MatrixFlags::TRANSLATION;
        }

        let ty = if mask == MASK_IDENTITY {
            MatrixType::Identity
        } else if mask & MASK_2D_NO_ROT == MASK_2D_NO_ROT {
            if mask & MASK_NO_2D_SCALE != MASK_NO_2D_SCALE {
                flags |= MatrixFlags::GENERAL_SCALE;
            }
            MatrixType::TwoDNoRot
        } else if mask & MASK_2D == MASK_2D {
            let mm = m[0] * m[0] + m[1] * m[1];
            let m4m4 = m[4] * m[4] + m[5] * m[5];
            let mm4 = m[0] * m[4] + m[1] * m[5];
            if sq(mm - 1.0) > sq(1e-6) || sq(m4m4 - 1.0) > sq(1e-6) {
                flags |= MatrixFlags::GENERAL_SCALE;
            }
            if sq(mm4) > sq(1e-6) {
                flags |= MatrixFlags::GENERAL_3D;
            } else {
                flags |= MatrixFlags::ROTATION;
            }
            MatrixType::TwoD
        } else if mask & MASK_3D_NO_ROT == MASK_3D_NO_ROT {
            if sq(m[0] - m[5]) < sq(1e-6) && sq(m[0] - m[10]) < sq(1e-6) {
                if sq(m[0] - 1.0) > sq(1e-6) {
                    flags |= MatrixFlags::UNIFORM_SCALE;
                }
            } else {
                flags |= MatrixFlags::GENERAL_SCALE;
            }
            MatrixType::ThreeDNoRot
        } else if mask & MASK_3D == MASK_3D {
            let c0 = [m[0], m[1], m[2]];
            let c1 = [m[4], m[5], m[6]];
            let c2 = [m[8], m[9], m[10]];
            let (l0, l1, l2) = (dot3(c0, c0), dot3(c1, c1), dot3(c2, c2));
            if sq(l0 - l1) < sq(1e-6) && sq(l0 - l2) < sq(1e-6) {
                if sq(l0 - 1.0) > sq(1e-6) {
                    flags |= MatrixFlags::UNIFORM_SCALE;
                }
            } else {
                flags |= MatrixFlags::GENERAL_SCALE;
            }
            if sq(dot3(c0, c1)) < sq(1e-6) {
                let cp = cross3(c0, c1);
                let d = [cp[0] - c2[0], cp[1] - c2[1], cp[2] - c2[2]];
                if dot3(d, d) < sq(1e-6) {
                    flags |= MatrixFlags::ROTATION;
                } else {
                    flags |= MatrixFlags::GENERAL_3D;
                }
            } else {
                flags |= MatrixFlags::GENERAL_3D;
            }
            MatrixType::ThreeD
        } else if mask & MASK_PERSPECTIVE == MASK_PERSPECTIVE && m[11] == -1.0 {
            flags |= MatrixFlags::GENERAL;
            MatrixType::Perspective
        } else {
            flags |= MatrixFlags::GENERAL;
            MatrixType::General
        };

        self.flags = flags;
        self.ty = ty;
    }

    fn analyse_from_flags(&mut self) {
        let m = &self.m;
        let flags = self.flags;
        self.ty = if flags.only(MatrixFlags::empty()) {
            MatrixType::Identity
        } else if flags.only(
            MatrixFlags::TRANSLATION | MatrixFlags::UNIFORM_SCALE | MatrixFlags::GENERAL_SCALE,
        ) {
            if m[10] == 1.0 && m[14] == 0.0 {
                MatrixType::TwoDNoRot
            } else {
                MatrixType::ThreeDNoRot
            }
        } else if flags.only(MatrixFlags::AFFINE_3D) {
            if m[8] == 0.0
                && m[9] == 0.0
                && m[2] == 0.0
                && m[6] == 0.0
                && m[10] == 1.0
                && m[14] == 0.0
            {
                MatrixType::TwoD
            } else {
                MatrixType::ThreeD
            }
        } else if m[4] == 0.0
            && m[12] == 0.0
            && m[1] == 0.0
            && m[13] == 0.0
            && m[2] == 0.0
            && m[6] == 0.0
            && m[3] == 0.0
            && m[7] == 0.0
            && m[11] == -1.0
            && m[15] == 0.0
        {
            MatrixType::Perspective
        } else {
            MatrixType::General
        };
    }
}

const fn zero(i: usize) -> u32 {
    1 << i
}

const fn one(i: usize) -> u32 {
    1 << (i + 16)
}

const MASK_NO_TRX: u32 = zero(12) | zero(13) | zero(14);
const MASK_NO_2D_SCALE: u32 = one(0) | one(5);

const MASK_IDENTITY: u32 = one(0)
    | zero(4)
    | zero(8)
    | zero(12)
    | zero(1)
    | one(5)
    | zero(9)
    | zero(13)
    | zero(2)
    | zero(6)
    | one(10)
    | zero(14)
    | zero(3)
    | zero(7)
    | zero(11)
    | one(15);

const MASK_2D_NO_ROT: u32 = zero(4)
    | zero(8)
    | zero(1)
    | zero(9)
    | zero(2)
    | zero(6)
    | one(10)
    | zero(14)
    | zero(3)
    | zero(7)
    | zero(11)
    | one(15);

const MASK_2D: u32 = zero(8)
    | zero(9)
    | zero(2)
    | zero(6)
    | one(10)
    | zero(14)
    | zero(3)
    | zero(7)
    | zero(11)
    | one(15);

const MASK_3D_NO_ROT: u32 = zero(4)
    | zero(8)
    | zero(1)
    | zero(9)
    | zero(2)
    | zero(6)
    | zero(3)
    | zero(7)
    | zero(11)
    | one(15);

const MASK_3D: u32 = zero(3) | zero(7) | zero(11) | one(15);

const MASK_PERSPECTIVE: u32 = zero(4)
    | zero(12)
    | zero(1)
    | zero(13)
    | zero(2)
    | zero(6)
    | zero(3)
    | zero(7)
    | zero(15);

fn sq(v: f32) -> f32 {
    v * v
}

fn dot3(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross3(u: [f32; 3], v: [f32; 3]) -> [f32; 3] {
    [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ]
}

fn multiply_4x4(a: &[f32; 16], b: &[f32; 16]) -> [f32; 16] {
    let mut r = [0.0; 16];
    for i in 0..4 {
        let (ai0, ai1, ai2, ai3) = (a[i], a[4 + i], a[8 + i], a[12 + i]);
        for j in 0..4 {
            r[j * 4 + i] =
                ai0 * b[j * 4] + ai1 * b[j * 4 + 1] + ai2 * b[j * 4 + 2] + ai3 * b[j * 4 + 3];
        }
    }
    r
}

/// Product of two matrices whose bottom row is `0 0 0 1`.
fn multiply_3x4(a: &[f32; 16], b: &[f32; 16]) -> [f32; 16] {
    let mut r = [0.0; 16];
    for i in 0..3 {
        let (ai0, ai1, ai2, ai3) = (a[i], a[4 + i], a[8 + i], a[12 + i]);
        for j in 0..3 {
            r[j * 4 + i] = ai0 * b[j * 4] + ai1 * b[j * 4 + 1] + ai2 * b[j * 4 + 2];
        }
        r[12 + i] = ai0 * b[12] + ai1 * b[13] + ai2 * b[14] + ai3;
    }
    r[15] = 1.0;
    r
}

/// Gauss-Jordan elimination with partial pivoting.
fn invert_general(m: &[f32; 16]) -> Option<[f32; 16]> {
    let mut rows = [[0.0f32; 8]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for c in 0..4 {
            row[c] = m[c * 4 + r];
        }
        row[4 + r] = 1.0;
    }

    for col in 0..4 {
        let pivot = (col..4)
            .max_by(|&a, &b| rows[a][col].abs().total_cmp(&rows[b][col].abs()))
            .unwrap_or(col);
        rows.swap(col, pivot);
        if rows[col][col] == 0.0 {
            return None;
        }
        for r in col + 1..4 {
            let factor = rows[r][col] / rows[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..8 {
                rows[r][c] -= factor * rows[col][c];
            }
        }
    }

    for col in (0..4).rev() {
        let s = 1.0 / rows[col][col];
        for c in 4..8 {
            rows[col][c] *= s;
        }
        for r in 0..col {
            let factor = rows[r][col];
            for c in 4..8 {
                rows[r][c] -= factor * rows[col][c];
            }
        }
    }

    let mut out = [0.0; 16];
    for (r, row) in rows.iter().enumerate() {
        for c in 0..4 {
            out[c * 4 + r] = row[4 + c];
        }
    }
    Some(out)
}

/// Cofactor inverse of the upper 3x3 plus translation.
fn invert_3d_general(m: &[f32; 16]) -> Option<[f32; 16]> {
    let at = |r: usize, c: usize| m[c * 4 + r];
    let mut pos = 0.0f32;
    let mut neg = 0.0f32;
    for t in [
        at(0, 0) * at(1, 1) * at(2, 2),
        at(1, 0) * at(2, 1) * at(0, 2),
        at(2, 0) * at(0, 1) * at(1, 2),
        -at(2, 0) * at(1, 1) * at(0, 2),
        -at(1, 0) * at(0, 1) * at(2, 2),
        -at(0, 0) * at(2, 1) * at(1, 2),
    ] {
        if t >= 0.0 {
            pos += t;
        } else {
            neg += t;
        }
    }
    let det = pos + neg;
    if det * det < 1e-25 {
        return None;
    }
    let det = 1.0 / det;

    let mut out = IDENTITY;
    let mut set = |r: usize, c: usize, v: f32| out[c * 4 + r] = v;
    set(0, 0, (at(1, 1) * at(2, 2) - at(2, 1) * at(1, 2)) * det);
    set(0, 1, -(at(0, 1) * at(2, 2) - at(2, 1) * at(0, 2)) * det);
    set(0, 2, (at(0, 1) * at(1, 2) - at(1, 1) * at(0, 2)) * det);
    set(1, 0, -(at(1, 0) * at(2, 2) - at(2, 0) * at(1, 2)) * det);
    set(1, 1, (at(0, 0) * at(2, 2) - at(2, 0) * at(0, 2)) * det);
    set(1, 2, -(at(0, 0) * at(1, 2) - at(1, 0) * at(0, 2)) * det);
    set(2, 0, (at(1, 0) * at(2, 1) - at(2, 0) * at(1, 1)) * det);
    set(2, 1, -(at(0, 0) * at(2, 1) - at(2, 0) * at(0, 1)) * det);
    set(2, 2, (at(0, 0) * at(1, 1) - at(1, 0) * at(0, 1)) * det);
    invert_translation(m, &mut out);
    Some(out)
}

/// Fill the translation column of `out` given its inverted upper 3x3.
fn invert_translation(m: &[f32; 16], out: &mut [f32; 16]) {
    let (tx, ty, tz) = (m[12], m[13], m[14]);
    for r in 0..3 {
        out[12 + r] = -(tx * out[r] + ty * out[4 + r] + tz * out[8 + r]);
    }
}

fn invert_3d(m: &[f32; 16], flags: MatrixFlags) -> Option<[f32; 16]> {
    if !flags.only(MatrixFlags::ANGLE_PRESERVING) {
        return invert_3d_general(m);
    }

    let mut out = IDENTITY;
    if flags.contains(MatrixFlags::UNIFORM_SCALE) {
        let scale = m[0] * m[0] + m[4] * m[4] + m[8] * m[8];
        if scale == 0.0 {
            return None;
        }
        let scale = 1.0 / scale;
        for r in 0..3 {
            for c in 0..3 {
                out[c * 4 + r] = scale * m[r * 4 + c];
            }
        }
    } else if flags.contains(MatrixFlags::ROTATION) {
        for r in 0..3 {
            for c in 0..3 {
                out[c * 4 + r] = m[r * 4 + c];
            }
        }
    } else {
        out[12] = -m[12];
        out[13] = -m[13];
        out[14] = -m[14];
        return Some(out);
    }

    if flags.contains(MatrixFlags::TRANSLATION) {
        invert_translation(m, &mut out);
    }
    Some(out)
}

fn invert_3d_no_rotation(m: &[f32; 16], flags: MatrixFlags) -> Option<[f32; 16]> {
    if m[0] == 0.0 || m[5] == 0.0 || m[10] == 0.0 {
        return None;
    }
    let mut out = IDENTITY;
    out[0] = 1.0 / m[0];
    out[5] = 1.0 / m[5];
    out[10] = 1.0 / m[10];
    if flags.contains(MatrixFlags::TRANSLATION) {
        out[12] = -(m[12] * out[0]);
        out[13] = -(m[13] * out[5]);
        out[14] = -(m[14] * out[10]);
    }
    Some(out)
}

fn invert_2d_no_rotation(m: &[f32; 16], flags: MatrixFlags) -> Option<[f32; 16]> {
    if m[0] == 0.0 || m[5] == 0.0 {
        return None;
    }
    let mut out = IDENTITY;
    out[0] = 1.0 / m[0];
    out[5] = 1.0 / m[5];
    if flags.contains(MatrixFlags::TRANSLATION) {
        out[12] = -(m[12] * out[0]);
        out[13] = -(m[13] * out[5]);
    }
    Some(out)
}

#[cfg(test)]
#[path = "../../tests/unit/transform/matrix.rs"]
mod tests;
