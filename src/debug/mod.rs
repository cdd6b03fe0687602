//! Live-editable scene parameters
//!
//! A [`DebugParameterSet`] is a flat table of named values, each bound to one
//! property of a scene node. Every write goes through [`DebugParameterSet::write`],
//! which validates the value, clamps numbers to the slider range, pushes the
//! result into the scene and remembers it. The imgui panel in [`panel`] is just
//! one client of this table.

pub mod panel;

use crate::{
    composer::ComposedScene,
    error::ParamError,
    gfx::{
        color::Color,
        scene::{NodeId, Scene},
    },
};

pub use panel::debug_panel;

/// World axis of a light position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Scene property a parameter writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamTarget {
    MaterialColor(NodeId),
    /// Changes the compiled program when it crosses zero, so it invalidates
    DisplacementScale(NodeId),
    DisplacementBias(NodeId),
    LightPosition { node: NodeId, axis: Axis },
    LightIntensity(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    Color,
    Slider { min: f32, max: f32, step: Option<f32> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// `#rrggbb`
    Color(String),
    Number(f32),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f32> {
        match self {
            ParamValue::Number(value) => Some(*value),
            ParamValue::Color(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub group: &'static str,
    pub kind: ParamKind,
    pub target: ParamTarget,
    pub value: ParamValue,
}

impl ParamKind {
    /// Clamps to the range and snaps to the step, if any
    ///
    /// The step grid is anchored at zero and the snapped value is rounded to
    /// the step's decimal places, so a 0.01 step stores 0.2 and not 0.19999993.
    pub fn constrain(&self, value: f32) -> f32 {
        match *self {
            ParamKind::Slider { min, max, step } => match step {
                Some(step) if step > 0.0 => snap_to_step(value, step).clamp(min, max),
                _ => value.clamp(min, max),
            },
            ParamKind::Color => value,
        }
    }
}

fn snap_to_step(value: f32, step: f32) -> f32 {
    let snapped = (value / step).round() * step;
    let decimals = (-step.log10()).ceil().clamp(0.0, 6.0) as i32;
    let scale = 10f32.powi(decimals);
    (snapped * scale).round() / scale
}

pub const SAND_SURFACE_COLOR: &str = "sand_surface_color";
pub const SAND_BOTTOM_COLOR: &str = "sand_bottom_color";
pub const DISPLACEMENT_BIAS: &str = "displacement_bias";
pub const DISPLACEMENT_SCALE: &str = "displacement_scale";
pub const LIGHT_X: &str = "light_x";
pub const LIGHT_Y: &str = "light_y";
pub const LIGHT_Z: &str = "light_z";
pub const DIRECTIONAL_INTENSITY: &str = "dir_intensity";
pub const HEMISPHERE_INTENSITY: &str = "hemi_intensity";

const DISPLACEMENT_RANGE: ParamKind = ParamKind::Slider {
    min: -1.0,
    max: 1.0,
    step: Some(0.01),
};
const POSITION_RANGE: ParamKind = ParamKind::Slider {
    min: 0.0,
    max: 15.0,
    step: None,
};
const INTENSITY_RANGE: ParamKind = ParamKind::Slider {
    min: 0.0,
    max: 5.0,
    step: Some(0.01),
};

#[derive(Debug, Clone, Default)]
pub struct DebugParameterSet {
    params: Vec<ParamSpec>,
}

impl DebugParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a parameter; its value is taken as-is, not pushed to the scene
    pub fn register(&mut self, spec: ParamSpec) {
        if let Some(existing) = self.params.iter_mut().find(|p| p.name == spec.name) {
            log::warn!("Replacing debug parameter '{}'", spec.name);
            *existing = spec;
        } else {
            self.params.push(spec);
        }
    }

    /// The garden's panel: sand colors, displacement and both lights
    ///
    /// Initial values are read back from the scene, so the panel starts out
    /// showing what is drawn.
    pub fn for_garden(garden: &ComposedScene) -> Self {
        let scene = &garden.scene;
        let nodes = &garden.nodes;
        let mut set = Self::new();

        let material_color = |id: NodeId| {
            scene
                .find(id)
                .and_then(|node| node.as_mesh())
                .map(|mesh| mesh.material.color)
                .unwrap_or(Color::WHITE)
                .to_hex()
        };
        let displacement = scene
            .find(nodes.top_sand)
            .and_then(|node| node.as_mesh())
            .and_then(|mesh| mesh.material.displacement())
            .map(|d| (d.scale, d.bias))
            .unwrap_or((0.0, 0.0));
        let light = |id: NodeId| scene.find(id);
        let light_position = light(nodes.directional_light)
            .map(|node| node.transform.position)
            .unwrap_or_else(|| cgmath::Vector3::new(0.0, 0.0, 0.0));
        let intensity = |id: NodeId| {
            light(id)
                .and_then(|node| node.as_light())
                .map(|light| light.intensity())
                .unwrap_or(0.0)
        };

        let mut add = |name: &'static str,
                       label: &'static str,
                       group: &'static str,
                       kind: ParamKind,
                       target: ParamTarget,
                       value: ParamValue| {
            set.register(ParamSpec {
                name,
                label,
                group,
                kind,
                target,
                value,
            })
        };

        add(
            SAND_SURFACE_COLOR,
            "sandSurfaceColor",
            "Sand Color",
            ParamKind::Color,
            ParamTarget::MaterialColor(nodes.top_sand),
            ParamValue::Color(material_color(nodes.top_sand)),
        );
        add(
            SAND_BOTTOM_COLOR,
            "sandBottomColor",
            "Sand Color",
            ParamKind::Color,
            ParamTarget::MaterialColor(nodes.bottom_sand),
            ParamValue::Color(material_color(nodes.bottom_sand)),
        );
        add(
            DISPLACEMENT_BIAS,
            "Bias",
            "Displacement",
            DISPLACEMENT_RANGE,
            ParamTarget::DisplacementBias(nodes.top_sand),
            ParamValue::Number(displacement.1),
        );
        add(
            DISPLACEMENT_SCALE,
            "Scale",
            "Displacement",
            DISPLACEMENT_RANGE,
            ParamTarget::DisplacementScale(nodes.top_sand),
            ParamValue::Number(displacement.0),
        );
        for (name, label, axis, value) in [
            (LIGHT_X, "x", Axis::X, light_position.x),
            (LIGHT_Y, "y", Axis::Y, light_position.y),
            (LIGHT_Z, "z", Axis::Z, light_position.z),
        ] {
            add(
                name,
                label,
                "Light",
                POSITION_RANGE,
                ParamTarget::LightPosition {
                    node: nodes.directional_light,
                    axis,
                },
                ParamValue::Number(value),
            );
        }
        add(
            DIRECTIONAL_INTENSITY,
            "Dir intsty",
            "Light",
            INTENSITY_RANGE,
            ParamTarget::LightIntensity(nodes.directional_light),
            ParamValue::Number(intensity(nodes.directional_light)),
        );
        add(
            HEMISPHERE_INTENSITY,
            "Hemi intsty",
            "Light",
            INTENSITY_RANGE,
            ParamTarget::LightIntensity(nodes.hemisphere_light),
            ParamValue::Number(intensity(nodes.hemisphere_light)),
        );

        set
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.get(name).map(|p| &p.value)
    }

    /// Group names in registration order, without repeats
    pub fn groups(&self) -> Vec<&'static str> {
        let mut groups: Vec<&'static str> = Vec::new();
        for param in &self.params {
            if !groups.contains(&param.group) {
                groups.push(param.group);
            }
        }
        groups
    }

    /// Validates `value`, applies it to the scene and stores it
    ///
    /// Returns the value actually applied, which for sliders may have been
    /// clamped or snapped. A rejected write leaves both the scene and the
    /// stored value untouched.
    pub fn write(
        &mut self,
        scene: &mut Scene,
        name: &str,
        value: ParamValue,
    ) -> Result<ParamValue, ParamError> {
        let spec = self
            .params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| ParamError::UnknownParameter(name.to_string()))?;

        let applied = match (spec.kind, value) {
            (ParamKind::Color, ParamValue::Color(hex)) => {
                let color =
                    Color::from_hex(&hex).ok_or_else(|| ParamError::InvalidColor(hex.clone()))?;
                apply_color(scene, spec, color)?;
                ParamValue::Color(color.to_hex())
            }
            (ParamKind::Slider { .. }, ParamValue::Number(raw)) if raw.is_finite() => {
                let number = spec.kind.constrain(raw);
                apply_number(scene, spec, number)?;
                ParamValue::Number(number)
            }
            (ParamKind::Color, _) => {
                return Err(ParamError::TypeMismatch {
                    name: name.to_string(),
                    expected: "color",
                })
            }
            (ParamKind::Slider { .. }, _) => {
                return Err(ParamError::TypeMismatch {
                    name: name.to_string(),
                    expected: "finite number",
                })
            }
        };

        log::debug!("Debug parameter '{}' = {:?}", name, applied);
        spec.value = applied.clone();
        Ok(applied)
    }
}

fn apply_color(scene: &mut Scene, spec: &ParamSpec, color: Color) -> Result<(), ParamError> {
    let ParamTarget::MaterialColor(id) = spec.target else {
        return Err(ParamError::TypeMismatch {
            name: spec.name.to_string(),
            expected: "number",
        });
    };
    let mesh = scene
        .find_mut(id)
        .and_then(|node| node.as_mesh_mut())
        .ok_or_else(|| ParamError::MissingTarget(spec.name.to_string()))?;
    mesh.material.color = color;
    Ok(())
}

fn apply_number(scene: &mut Scene, spec: &ParamSpec, value: f32) -> Result<(), ParamError> {
    let missing = || ParamError::MissingTarget(spec.name.to_string());
    let no_displacement = || ParamError::MissingField {
        name: spec.name.to_string(),
        field: "displacement",
    };

    match spec.target {
        ParamTarget::MaterialColor(_) => Err(ParamError::TypeMismatch {
            name: spec.name.to_string(),
            expected: "color",
        }),
        ParamTarget::DisplacementScale(id) => {
            let mesh = scene
                .find_mut(id)
                .and_then(|node| node.as_mesh_mut())
                .ok_or_else(missing)?;
            let displacement = mesh.material.displacement_mut().ok_or_else(no_displacement)?;
            displacement.scale = value;
            mesh.material.invalidate();
            Ok(())
        }
        ParamTarget::DisplacementBias(id) => {
            let mesh = scene
                .find_mut(id)
                .and_then(|node| node.as_mesh_mut())
                .ok_or_else(missing)?;
            let displacement = mesh.material.displacement_mut().ok_or_else(no_displacement)?;
            displacement.bias = value;
            Ok(())
        }
        ParamTarget::LightPosition { node, axis } => {
            let node = scene
                .find_mut(node)
                .filter(|node| node.as_light().is_some())
                .ok_or_else(missing)?;
            let position = &mut node.transform.position;
            match axis {
                Axis::X => position.x = value,
                Axis::Y => position.y = value,
                Axis::Z => position.z = value,
            }
            Ok(())
        }
        ParamTarget::LightIntensity(id) => {
            let light = scene
                .find_mut(id)
                .and_then(|node| node.as_light_mut())
                .ok_or_else(missing)?;
            light.set_intensity(value);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        composer::compose_scene, config::GardenConfig, gfx::resources::material::TextureSet,
    };

    fn garden() -> ComposedScene {
        compose_scene(&GardenConfig::default().with_verteces(4), &TextureSet::pending())
    }

    fn top_material(garden: &ComposedScene) -> &crate::gfx::resources::material::Material {
        &garden
            .scene
            .find(garden.nodes.top_sand)
            .unwrap()
            .as_mesh()
            .unwrap()
            .material
    }

    #[test]
    fn test_garden_panel_layout() {
        let garden = garden();
        let set = DebugParameterSet::for_garden(&garden);
        assert_eq!(set.params().len(), 9);
        assert_eq!(set.groups(), vec!["Sand Color", "Displacement", "Light"]);
        assert_eq!(
            set.value(SAND_SURFACE_COLOR),
            Some(&ParamValue::Color("#ded5ca".into()))
        );
        assert_eq!(set.value(LIGHT_Y), Some(&ParamValue::Number(12.0)));
        assert_eq!(set.get(DIRECTIONAL_INTENSITY).unwrap().label, "Dir intsty");
    }

    #[test]
    fn test_color_write_reaches_material() {
        let mut garden = garden();
        let mut set = DebugParameterSet::for_garden(&garden);
        let applied = set
            .write(&mut garden.scene, SAND_SURFACE_COLOR, ParamValue::Color("#1E4D40".into()))
            .unwrap();
        assert_eq!(applied, ParamValue::Color("#1e4d40".into()));
        assert_eq!(top_material(&garden).color.to_hex(), "#1e4d40");
    }

    #[test]
    fn test_invalid_color_is_rejected() {
        let mut garden = garden();
        let mut set = DebugParameterSet::for_garden(&garden);
        let err = set
            .write(&mut garden.scene, SAND_BOTTOM_COLOR, ParamValue::Color("beige".into()))
            .unwrap_err();
        assert_eq!(err, ParamError::InvalidColor("beige".into()));
        assert_eq!(
            set.value(SAND_BOTTOM_COLOR),
            Some(&ParamValue::Color("#beaaa3".into()))
        );
    }

    #[test]
    fn test_scale_write_invalidates_material() {
        let mut garden = garden();
        let mut set = DebugParameterSet::for_garden(&garden);
        garden
            .scene
            .find_mut(garden.nodes.top_sand)
            .unwrap()
            .as_mesh_mut()
            .unwrap()
            .material
            .sync_program();
        assert!(!top_material(&garden).needs_update());

        set.write(&mut garden.scene, DISPLACEMENT_SCALE, ParamValue::Number(0.5))
            .unwrap();
        let material = top_material(&garden);
        assert!(material.needs_update());
        assert_eq!(material.displacement().unwrap().scale, 0.5);
    }

    #[test]
    fn test_bias_write_keeps_program() {
        let mut garden = garden();
        let mut set = DebugParameterSet::for_garden(&garden);
        garden
            .scene
            .find_mut(garden.nodes.top_sand)
            .unwrap()
            .as_mesh_mut()
            .unwrap()
            .material
            .sync_program();
        set.write(&mut garden.scene, DISPLACEMENT_BIAS, ParamValue::Number(0.2))
            .unwrap();
        let material = top_material(&garden);
        assert!(!material.needs_update());
        assert_eq!(material.displacement().unwrap().bias, 0.2);
    }

    #[test]
    fn test_snapped_values_sit_on_the_step_grid() {
        for (raw, expected) in [(0.2, 0.2), (-0.3, -0.3), (0.456, 0.46), (-0.999, -1.0), (0.07, 0.07)] {
            assert_eq!(DISPLACEMENT_RANGE.constrain(raw), expected, "raw {raw}");
        }
        assert_eq!(INTENSITY_RANGE.constrain(0.61), 0.61);
        assert_eq!(INTENSITY_RANGE.constrain(7.5), 5.0);
        assert_eq!(POSITION_RANGE.constrain(3.3), 3.3);
    }

    #[test]
    fn test_out_of_range_numbers_are_clamped_and_snapped() {
        let mut garden = garden();
        let mut set = DebugParameterSet::for_garden(&garden);
        let scene = &mut garden.scene;
        assert_eq!(
            set.write(scene, DISPLACEMENT_SCALE, ParamValue::Number(3.0)),
            Ok(ParamValue::Number(1.0))
        );
        assert_eq!(
            set.write(scene, LIGHT_X, ParamValue::Number(-4.0)),
            Ok(ParamValue::Number(0.0))
        );
        let snapped = set
            .write(scene, HEMISPHERE_INTENSITY, ParamValue::Number(1.234))
            .unwrap()
            .as_number()
            .unwrap();
        assert!((snapped - 1.23).abs() < 1e-5);
    }

    #[test]
    fn test_light_writes_move_and_dim_lights() {
        let mut garden = garden();
        let mut set = DebugParameterSet::for_garden(&garden);
        set.write(&mut garden.scene, LIGHT_Z, ParamValue::Number(3.5))
            .unwrap();
        set.write(&mut garden.scene, DIRECTIONAL_INTENSITY, ParamValue::Number(2.0))
            .unwrap();
        let sun = garden.scene.lighting().directional.unwrap();
        assert_eq!(sun.position.z, 3.5);
        assert_eq!(sun.intensity, 2.0);
    }

    #[test]
    fn test_rejected_writes() {
        let mut garden = garden();
        let mut set = DebugParameterSet::for_garden(&garden);
        assert_eq!(
            set.write(&mut garden.scene, "fog", ParamValue::Number(1.0)),
            Err(ParamError::UnknownParameter("fog".into()))
        );
        assert!(matches!(
            set.write(&mut garden.scene, LIGHT_X, ParamValue::Color("#ffffff".into())),
            Err(ParamError::TypeMismatch { .. })
        ));
        assert!(matches!(
            set.write(&mut garden.scene, LIGHT_X, ParamValue::Number(f32::NAN)),
            Err(ParamError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_scale_on_undisplaced_material_reports_missing_field() {
        let mut garden = garden();
        let mut set = DebugParameterSet::new();
        set.register(ParamSpec {
            name: "floor_scale",
            label: "Scale",
            group: "Floor",
            kind: DISPLACEMENT_RANGE,
            target: ParamTarget::DisplacementScale(garden.nodes.floor),
            value: ParamValue::Number(0.0),
        });
        assert_eq!(
            set.write(&mut garden.scene, "floor_scale", ParamValue::Number(0.1)),
            Err(ParamError::MissingField {
                name: "floor_scale".into(),
                field: "displacement",
            })
        );
    }
}
