use binrw::binrw;
use cgmath::{Deg, InnerSpace, Matrix4, Transform, Vector3, Vector4, Zero};

/// One full turn in the MT5 fixed-point angle encoding.
pub const ANGLE_FULL_TURN: f32 = 65536.0;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub struct Mt5Vector3(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], raw[2]))]
    #[bw(map = |v: &Vector3<f32>| [v.x, v.y, v.z])]
    pub Vector3<f32>,
);

impl Mt5Vector3 {
    pub fn to_slice(&self) -> [f32; 3] {
        let v = &self.0;
        [v.x, v.y, v.z]
    }
}

impl Default for Mt5Vector3 {
    fn default() -> Self {
        Self(Vector3::zero())
    }
}

/// Fixed-point rotation triple as stored in node records.
#[binrw]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[brw(little)]
pub struct Mt5Rotation {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Mt5Rotation {
    pub fn to_degrees(&self) -> Vector3<f32> {
        Vector3::new(
            fixed_to_degrees(self.x),
            fixed_to_degrees(self.y),
            fixed_to_degrees(self.z),
        )
    }

    pub fn from_degrees(degrees: Vector3<f32>) -> Self {
        Self {
            x: degrees_to_fixed(degrees.x),
            y: degrees_to_fixed(degrees.y),
            z: degrees_to_fixed(degrees.z),
        }
    }
}

pub fn fixed_to_degrees(value: i32) -> f32 {
    value as f32 / ANGLE_FULL_TURN * 360.0
}

pub fn degrees_to_fixed(degrees: f32) -> i32 {
    (degrees / 360.0 * ANGLE_FULL_TURN).round() as i32
}

/// Local transform of a node: scale, then rotate about X, Y, Z, then translate.
pub fn local_transform(
    position: Vector3<f32>,
    rotation_degrees: Vector3<f32>,
    scale: Vector3<f32>,
) -> Matrix4<f32> {
    Matrix4::from_translation(position)
        * Matrix4::from_angle_z(Deg(rotation_degrees.z))
        * Matrix4::from_angle_y(Deg(rotation_degrees.y))
        * Matrix4::from_angle_x(Deg(rotation_degrees.x))
        * Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z)
}

pub fn transform_position(matrix: &Matrix4<f32>, v: Vector3<f32>) -> Vector3<f32> {
    let p = matrix * Vector4::new(v.x, v.y, v.z, 1.0);
    Vector3::new(p.x, p.y, p.z)
}

/// Transform a normal by the linear part of `matrix` and renormalize.
/// Zero-length input stays zero.
pub fn transform_normal(matrix: &Matrix4<f32>, n: Vector3<f32>) -> Vector3<f32> {
    let t = matrix.transform_vector(n);
    if t.magnitude2() > f32::EPSILON {
        t.normalize()
    } else {
        t
    }
}

/// Unnormalized face normal following counter-clockwise winding.
pub fn face_cross(a: Vector3<f32>, b: Vector3<f32>, c: Vector3<f32>) -> Vector3<f32> {
    (b - a).cross(c - a)
}

pub fn face_area(a: Vector3<f32>, b: Vector3<f32>, c: Vector3<f32>) -> f32 {
    face_cross(a, b, c).magnitude() * 0.5
}

/// Unit face normal, or `None` for a triangle with no area.
pub fn face_normal(a: Vector3<f32>, b: Vector3<f32>, c: Vector3<f32>) -> Option<Vector3<f32>> {
    let n = face_cross(a, b, c);
    if n.magnitude2() > f32::EPSILON * f32::EPSILON {
        Some(n.normalize())
    } else {
        None
    }
}

/// Angle between two directions in degrees, or `None` when either has no length.
pub fn angle_between_degrees(a: Vector3<f32>, b: Vector3<f32>) -> Option<f32> {
    let la = a.magnitude();
    let lb = b.magnitude();
    if la <= f32::EPSILON || lb <= f32::EPSILON {
        return None;
    }
    let cos = (a.dot(b) / (la * lb)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}
