//! Frame and quaternion algebra.
//!
//! All alignment tests share one tolerance, [`EPS`], applied to vector
//! lengths and to the cosine between unit vectors.

use std::f64::consts::PI;

use crate::mjcf::{AngleUnit, Compiler, Frame, Orientation};
use crate::util::{DMat3, DQuat, DVec3, Transform};

pub const EPS: f64 = 1e-10;

/// Rotation taking `v` onto `axis`.
pub fn align_vector_to_axis(v: DVec3, axis: DVec3) -> DQuat {
    if v.length() < EPS || axis.length() < EPS {
        return DQuat::IDENTITY;
    }
    let from = v.normalize();
    let to = axis.normalize();
    let cos = from.dot(to);
    if cos > 1.0 - EPS {
        DQuat::IDENTITY
    } else if cos < -1.0 + EPS {
        DQuat::from_axis_angle(perpendicular(from), PI)
    } else {
        DQuat::from_rotation_arc(from, to)
    }
}

/// Unit vector perpendicular to the unit vector `v`.
fn perpendicular(v: DVec3) -> DVec3 {
    let helper = if v.x.abs() < 0.9 { DVec3::X } else { DVec3::Y };
    v.cross(helper).normalize()
}

/// Rotation taking the +Z long axis onto `direction`.
pub fn vector_to_quaternion(direction: DVec3) -> DQuat {
    if direction.length() < EPS {
        return DQuat::IDENTITY;
    }
    let to = direction.normalize();
    let cos = to.z;
    if cos > 1.0 - EPS {
        DQuat::IDENTITY
    } else if cos < -1.0 + EPS {
        DQuat::from_axis_angle(DVec3::X, PI)
    } else {
        DQuat::from_rotation_arc(DVec3::Z, to)
    }
}

/// `parent * own`. With `preserve_scale` the scales multiply per
/// component and the parent scale applies to the child translation;
/// otherwise the result is rigid.
pub fn compose_frame(parent: &Transform, own: &Transform, preserve_scale: bool) -> Transform {
    let rotation = (parent.rotation * own.rotation).normalize();
    if preserve_scale {
        Transform {
            translation: parent.translation + parent.rotation * (parent.scale * own.translation),
            rotation,
            scale: parent.scale * own.scale,
        }
    } else {
        Transform::new(parent.translation + parent.rotation * own.translation, rotation)
    }
}

fn to_radians(angle: f64, compiler: &Compiler) -> f64 {
    match compiler.angle {
        AngleUnit::Degree => angle.to_radians(),
        AngleUnit::Radian => angle,
    }
}

/// Resolve an MJCF orientation into a unit quaternion.
pub fn resolve_orientation(orientation: Option<&Orientation>, compiler: &Compiler) -> DQuat {
    let Some(orientation) = orientation else {
        return DQuat::IDENTITY;
    };
    match *orientation {
        Orientation::Quat([w, x, y, z]) => {
            let q = DQuat::from_xyzw(x, y, z, w);
            if q.length() < EPS {
                DQuat::IDENTITY
            } else {
                q.normalize()
            }
        }
        Orientation::AxisAngle([x, y, z, angle]) => {
            let axis = DVec3::new(x, y, z);
            if axis.length() < EPS {
                return DQuat::IDENTITY;
            }
            DQuat::from_axis_angle(axis.normalize(), to_radians(angle, compiler))
        }
        Orientation::XyAxes([x0, x1, x2, y0, y1, y2]) => {
            let x = DVec3::new(x0, x1, x2);
            let y = DVec3::new(y0, y1, y2);
            if x.length() < EPS {
                return DQuat::IDENTITY;
            }
            let x = x.normalize();
            let y = y - x * x.dot(y);
            if y.length() < EPS {
                return DQuat::IDENTITY;
            }
            let y = y.normalize();
            let z = x.cross(y);
            DQuat::from_mat3(&DMat3::from_cols(x, y, z)).normalize()
        }
        Orientation::ZAxis(z) => vector_to_quaternion(DVec3::from_array(z)),
        Orientation::Euler(angles) => {
            let mut q = DQuat::IDENTITY;
            for (axis_char, angle) in compiler.eulerseq.chars().zip(angles) {
                let axis = match axis_char.to_ascii_lowercase() {
                    'x' => DVec3::X,
                    'y' => DVec3::Y,
                    'z' => DVec3::Z,
                    _ => continue,
                };
                let r = DQuat::from_axis_angle(axis, to_radians(angle, compiler));
                q = if axis_char.is_ascii_lowercase() { q * r } else { r * q };
            }
            q.normalize()
        }
    }
}

/// Rigid transform of a `pos` + orientation pair.
pub fn frame_transform(pos: DVec3, orientation: Option<&Orientation>, compiler: &Compiler) -> Transform {
    Transform::new(pos, resolve_orientation(orientation, compiler))
}

/// Local transform of an element nested in `frames` (outermost first).
pub fn local_transform(
    pos: DVec3,
    orientation: Option<&Orientation>,
    frames: &[Frame],
    compiler: &Compiler,
) -> Transform {
    let own = frame_transform(pos, orientation, compiler);
    frames.iter().rev().fold(own, |acc, frame| {
        let outer = frame_transform(frame.pos, frame.orientation.as_ref(), compiler);
        compose_frame(&outer, &acc, false)
    })
}

/// Rigid transform placing a two-endpoint primitive: midpoint position and
/// +Z along `end - start`. Returns the transform and the endpoint distance.
pub fn fromto_transform(fromto: &[f64; 6]) -> (Transform, f64) {
    let start = DVec3::new(fromto[0], fromto[1], fromto[2]);
    let end = DVec3::new(fromto[3], fromto[4], fromto[5]);
    let dir = end - start;
    (Transform::new((start + end) * 0.5, vector_to_quaternion(dir)), dir.length())
}

/// Eigen-decomposition of a symmetric 3x3 matrix (cyclic Jacobi).
/// Returns eigenvalues and a right-handed rotation whose columns are the
/// matching eigenvectors.
pub fn symmetric_eigen(m: DMat3) -> (DVec3, DQuat) {
    let mut a = m.to_cols_array_2d();
    let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    for _ in 0..50 {
        let off = a[0][1].powi(2) + a[0][2].powi(2) + a[1][2].powi(2);
        if off < EPS * EPS {
            break;
        }
        for (p, q) in [(0usize, 1usize), (0, 2), (1, 2)] {
            if a[p][q].abs() < EPS * EPS {
                continue;
            }
            let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
            let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
            let c = 1.0 / (t * t + 1.0).sqrt();
            let s = t * c;
            let mut next = a;
            for k in 0..3 {
                next[k][p] = c * a[k][p] - s * a[k][q];
                next[k][q] = s * a[k][p] + c * a[k][q];
            }
            let rotated = next;
            for k in 0..3 {
                next[p][k] = c * rotated[p][k] - s * rotated[q][k];
                next[q][k] = s * rotated[p][k] + c * rotated[q][k];
            }
            a = next;
            for row in v.iter_mut() {
                let (vp, vq) = (row[p], row[q]);
                row[p] = c * vp - s * vq;
                row[q] = s * vp + c * vq;
            }
        }
    }
    let values = DVec3::new(a[0][0], a[1][1], a[2][2]);
    // v[row][col]: eigenvector i is column i.
    let col = |i: usize| DVec3::new(v[0][i], v[1][i], v[2][i]);
    let (c0, c1) = (col(0), col(1));
    let mut c2 = col(2);
    if c0.cross(c1).dot(c2) < 0.0 {
        c2 = -c2;
    }
    (values, DQuat::from_mat3(&DMat3::from_cols(c0, c1, c2)).normalize())
}
