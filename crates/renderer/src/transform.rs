//! Transform presets drawn each frame.

use glam::{Mat4, Vec3};

/// Straight RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub(crate) fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: f64::from(self.r),
            g: f64::from(self.g),
            b: f64::from(self.b),
            a: f64::from(self.a),
        }
    }
}

/// Background behind the shapes.
pub const CLEAR_COLOR: Rgba = Rgba::new(0.4, 0.4, 0.1, 1.0);

/// Affine transform applied to the base quad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformKind {
    Identity,
    Translate { offset: Vec3 },
    /// Rotation about `axis`, angle in degrees.
    Rotate { degrees: f32, axis: Vec3 },
    Scale { factors: Vec3 },
    /// 2D shear: `x' = x + xy * y`, `y' = y + yx * x`.
    Shear { xy: f32, yx: f32 },
}

impl TransformKind {
    pub fn matrix(&self) -> Mat4 {
        match *self {
            TransformKind::Identity => Mat4::IDENTITY,
            TransformKind::Translate { offset } => Mat4::from_translation(offset),
            TransformKind::Rotate { degrees, axis } => {
                Mat4::from_axis_angle(axis.normalize(), degrees.to_radians())
            }
            TransformKind::Scale { factors } => Mat4::from_scale(factors),
            TransformKind::Shear { xy, yx } => {
                let mut matrix = Mat4::IDENTITY;
                matrix.y_axis.x = xy;
                matrix.x_axis.y = yx;
                matrix
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransformKind::Identity => "identity",
            TransformKind::Translate { .. } => "translate",
            TransformKind::Rotate { .. } => "rotate",
            TransformKind::Scale { .. } => "scale",
            TransformKind::Shear { .. } => "shear",
        }
    }
}

/// One draw instance: a transform and the color it is outlined in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformPreset {
    pub kind: TransformKind,
    pub color: Rgba,
}

impl TransformPreset {
    pub const fn new(kind: TransformKind, color: Rgba) -> Self {
        Self { kind, color }
    }

    pub fn matrix(&self) -> Mat4 {
        self.kind.matrix()
    }
}

/// Presets in draw order. Later entries are drawn over earlier ones, so the
/// order decides the visual stacking; reorder deliberately.
pub const PRESETS: [TransformPreset; 5] = [
    TransformPreset::new(TransformKind::Identity, Rgba::new(1.0, 0.0, 0.0, 1.0)),
    TransformPreset::new(
        TransformKind::Translate {
            offset: Vec3::new(0.3, 0.0, 0.0),
        },
        Rgba::new(1.0, 0.5, 0.5, 1.0),
    ),
    TransformPreset::new(
        TransformKind::Rotate {
            degrees: 45.0,
            axis: Vec3::Z,
        },
        Rgba::new(0.0, 1.0, 0.0, 1.0),
    ),
    TransformPreset::new(
        TransformKind::Scale {
            factors: Vec3::new(1.5, 1.5, 1.0),
        },
        Rgba::new(0.0, 0.0, 1.0, 1.0),
    ),
    TransformPreset::new(
        TransformKind::Shear { xy: 0.5, yx: 0.2 },
        Rgba::new(0.0, 1.0, 1.0, 1.0),
    ),
];

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec4};

    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn identity_leaves_points_unchanged() {
        let matrix = TransformKind::Identity.matrix();
        for point in [
            Vec4::new(0.1, -0.1, 0.0, 1.0),
            Vec4::new(-3.5, 2.25, 7.0, 1.0),
            Vec4::new(0.0, 0.0, 0.0, 0.0),
        ] {
            assert_eq!(matrix * point, point);
        }
    }

    #[test]
    fn rotate_half_turn_flips_x_axis() {
        let matrix = TransformKind::Rotate {
            degrees: 180.0,
            axis: Vec3::Z,
        }
        .matrix();
        let rotated = matrix.transform_point3(Vec3::X);
        assert!(rotated.truncate().abs_diff_eq(Vec2::new(-1.0, 0.0), EPSILON));
    }

    #[test]
    fn rotation_axis_is_normalised() {
        let unit = TransformKind::Rotate {
            degrees: 90.0,
            axis: Vec3::Z,
        }
        .matrix();
        let scaled = TransformKind::Rotate {
            degrees: 90.0,
            axis: Vec3::new(0.0, 0.0, 4.0),
        }
        .matrix();
        assert!(unit.abs_diff_eq(scaled, EPSILON));
    }

    #[test]
    fn shear_sets_only_off_diagonal_terms() {
        let matrix = TransformKind::Shear { xy: 0.5, yx: 0.2 }.matrix();
        let identity = Mat4::IDENTITY.to_cols_array_2d();
        let sheared = matrix.to_cols_array_2d();
        for column in 0..4 {
            for row in 0..4 {
                match (column, row) {
                    (1, 0) => assert_eq!(sheared[column][row], 0.5),
                    (0, 1) => assert_eq!(sheared[column][row], 0.2),
                    _ => assert_eq!(sheared[column][row], identity[column][row]),
                }
            }
        }
        let point = matrix.transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert!(point.abs_diff_eq(Vec3::new(1.5, 1.2, 0.0), EPSILON));
    }

    #[test]
    fn translate_and_scale_follow_affine_construction() {
        let moved = TransformKind::Translate {
            offset: Vec3::new(0.3, 0.0, 0.0),
        }
        .matrix()
        .transform_point3(Vec3::new(0.1, 0.1, 0.0));
        assert!(moved.abs_diff_eq(Vec3::new(0.4, 0.1, 0.0), EPSILON));

        let scaled = TransformKind::Scale {
            factors: Vec3::new(1.5, 1.5, 1.0),
        }
        .matrix()
        .transform_point3(Vec3::new(0.1, -0.1, 0.0));
        assert!(scaled.abs_diff_eq(Vec3::new(0.15, -0.15, 0.0), EPSILON));
    }

    #[test]
    fn presets_cover_each_kind_in_order() {
        let labels: Vec<_> = PRESETS.iter().map(|preset| preset.kind.label()).collect();
        assert_eq!(
            labels,
            ["identity", "translate", "rotate", "scale", "shear"]
        );
        for preset in PRESETS {
            for component in preset.color.to_array() {
                assert!((0.0..=1.0).contains(&component));
            }
        }
    }
}
