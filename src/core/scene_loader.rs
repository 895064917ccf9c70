// Copyright @yucwang 2026

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::core::bsdf::BSDF;
use crate::core::scene::{IntegratorSettings, RendererSettings, Scene, SceneObject};
use crate::emitters::point::PointEmitter;
use crate::error::SceneLoadError;
use crate::materials::lambertian_diffuse::LambertianDiffuseBSDF;
use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;
use crate::math::transform::Transform;
use crate::sensors::perspective::PerspectiveCamera;
use crate::shapes::rectangle::Rectangle;
use std::sync::Arc;

/// Turns a scene file into a `Scene`. Resources are not loaded yet; the
/// caller runs `Scene::load_resources` afterwards.
pub trait SceneLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Scene, SceneLoadError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XmlSceneLoader;

impl SceneLoader for XmlSceneLoader {
    fn load(&self, path: &Path) -> Result<Scene, SceneLoadError> {
        let xml = fs::read_to_string(path)?;
        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut scene = parse_scene(&xml, &base_dir)?;
        scene.set_path(path.to_path_buf());
        Ok(scene)
    }
}

type Attributes = HashMap<String, String>;

/// Shape element being read, finished on its closing tag.
struct ShapeBuilder {
    id: Option<String>,
    bsdf: Option<String>,
    to_world: Transform,
    radiance: Option<RGBSpectrum>,
}

struct SceneParser {
    scene: Scene,
    defaults: HashMap<String, String>,
    bsdfs: HashMap<String, Arc<dyn BSDF>>,
    shape: Option<ShapeBuilder>,
}

pub fn parse_scene(xml: &str, base_dir: &Path) -> Result<Scene, SceneLoadError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut parser = SceneParser {
        scene: Scene::new(),
        defaults: HashMap::new(),
        bsdfs: HashMap::new(),
        shape: None,
    };
    parser.scene.set_base_dir(base_dir.to_path_buf());

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => parser.start_element(&e)?,
            Ok(Event::Empty(e)) => {
                parser.start_element(&e)?;
                parser.end_element(e.name().as_ref())?;
            }
            Ok(Event::End(e)) => parser.end_element(e.name().as_ref())?,
            Err(e) => return Err(SceneLoadError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if parser.shape.is_some() {
        return Err(SceneLoadError::Xml("unterminated <shape>".to_string()));
    }
    Ok(parser.scene)
}

impl SceneParser {
    fn attributes(&self, e: &BytesStart) -> Result<Attributes, SceneLoadError> {
        let mut out = Attributes::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| SceneLoadError::Xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr.unescape_value().map_err(|e| SceneLoadError::Xml(e.to_string()))?;
            out.insert(key, resolve_value(&value, &self.defaults));
        }
        Ok(out)
    }

    fn start_element(&mut self, e: &BytesStart) -> Result<(), SceneLoadError> {
        let attrs = self.attributes(e)?;
        match e.name().as_ref() {
            b"default" => {
                if let (Some(k), Some(v)) = (attrs.get("name"), attrs.get("value")) {
                    self.defaults.insert(k.clone(), v.clone());
                }
            }
            b"renderer" => {
                let settings = parse_renderer(&attrs, self.scene.renderer_settings())?;
                *self.scene.renderer_settings_mut() = settings;
            }
            b"integrator" => {
                let settings = parse_integrator(&attrs)?;
                self.scene.set_integrator_settings(settings);
            }
            b"sensor" => self.parse_sensor(&attrs)?,
            b"bsdf" => self.parse_bsdf(&attrs)?,
            b"shape" => {
                let shape_type = attrs.get("type").map(String::as_str).unwrap_or("");
                if shape_type != "rectangle" {
                    return Err(SceneLoadError::Unsupported { kind: "shape", name: shape_type.to_string() });
                }
                self.shape = Some(ShapeBuilder {
                    id: attrs.get("id").cloned(),
                    bsdf: attrs.get("bsdf").cloned(),
                    to_world: Transform::default(),
                    radiance: None,
                });
            }
            b"translate" | b"scale" | b"rotate" => {
                let name = e.name().as_ref().to_vec();
                if let Some(shape) = self.shape.as_mut() {
                    let step = parse_transform(&name, &attrs)?;
                    shape.to_world = step.compose(&shape.to_world);
                }
            }
            b"emitter" => self.parse_emitter(&attrs)?,
            _ => {}
        }
        Ok(())
    }

    fn end_element(&mut self, name: &[u8]) -> Result<(), SceneLoadError> {
        if name != b"shape" {
            return Ok(());
        }
        let shape = match self.shape.take() {
            Some(shape) => shape,
            None => return Ok(()),
        };

        let material = match &shape.bsdf {
            Some(id) => self.bsdfs.get(id)
                .cloned()
                .ok_or_else(|| SceneLoadError::UnknownReference(id.clone()))?,
            None => Arc::new(LambertianDiffuseBSDF::new(RGBSpectrum::new(0.5, 0.5, 0.5))) as Arc<dyn BSDF>,
        };
        let geometry = Arc::new(Rectangle::new(shape.to_world));
        let mut object = match shape.radiance {
            Some(radiance) => SceneObject::with_emission(geometry, material, radiance),
            None => SceneObject::new(geometry, material),
        };
        if let Some(id) = shape.id {
            object = object.with_name(id);
        }
        self.scene.add_object(object);
        Ok(())
    }

    fn parse_sensor(&mut self, attrs: &Attributes) -> Result<(), SceneLoadError> {
        let sensor_type = attrs.get("type").map(String::as_str).unwrap_or("perspective");
        if sensor_type != "perspective" {
            return Err(SceneLoadError::Unsupported { kind: "sensor", name: sensor_type.to_string() });
        }
        let origin = parse_vec3(required(attrs, "origin", "sensor.origin")?)?;
        let target = parse_vec3(required(attrs, "target", "sensor.target")?)?;
        let up = match attrs.get("up") {
            Some(v) => parse_vec3(v)?,
            None => Vector3f::new(0.0, 1.0, 0.0),
        };
        let fov_deg = match attrs.get("fov") {
            Some(v) => parse_float(v)?,
            None => 45.0,
        };
        let width = parse_usize(required(attrs, "width", "sensor.width")?)?;
        let height = parse_usize(required(attrs, "height", "sensor.height")?)?;

        let camera = PerspectiveCamera::new(origin, target, up, fov_deg.to_radians(), width, height);
        self.scene.set_camera(Arc::new(camera));
        Ok(())
    }

    fn parse_bsdf(&mut self, attrs: &Attributes) -> Result<(), SceneLoadError> {
        let bsdf_type = attrs.get("type").map(String::as_str).unwrap_or("");
        if bsdf_type != "diffuse" {
            return Err(SceneLoadError::Unsupported { kind: "bsdf", name: bsdf_type.to_string() });
        }
        let id = required(attrs, "id", "bsdf.id")?.clone();
        let reflectance = match attrs.get("reflectance") {
            Some(v) => parse_spectrum(v)?,
            None => RGBSpectrum::new(0.5, 0.5, 0.5),
        };
        self.bsdfs.insert(id, Arc::new(LambertianDiffuseBSDF::new(reflectance)));
        Ok(())
    }

    fn parse_emitter(&mut self, attrs: &Attributes) -> Result<(), SceneLoadError> {
        let emitter_type = attrs.get("type").map(String::as_str).unwrap_or("");
        match (emitter_type, self.shape.as_mut()) {
            ("area", Some(shape)) => {
                shape.radiance = Some(parse_spectrum(required(attrs, "radiance", "emitter.radiance")?)?);
            }
            ("point", None) => {
                let position = parse_vec3(required(attrs, "position", "emitter.position")?)?;
                let intensity = parse_spectrum(required(attrs, "intensity", "emitter.intensity")?)?;
                self.scene.add_emitter(Arc::new(PointEmitter::new(position, intensity)));
            }
            _ => {
                return Err(SceneLoadError::Unsupported { kind: "emitter", name: emitter_type.to_string() });
            }
        }
        Ok(())
    }
}

fn parse_renderer(attrs: &Attributes, current: &RendererSettings) -> Result<RendererSettings, SceneLoadError> {
    let mut settings = current.clone();
    for (key, value) in attrs {
        match key.as_str() {
            "spp" => settings.spp = parse_u32(value)?,
            "spp_step" => settings.spp_step = parse_u32(value)?,
            "checkpoint_interval" => {
                let minutes = value.parse::<f64>()
                    .map_err(|_| SceneLoadError::Parse(format!("invalid float: {}", value)))?;
                if !(minutes >= 0.0) {
                    return Err(SceneLoadError::Parse(format!("invalid checkpoint interval: {}", value)));
                }
                settings.checkpoint_interval = minutes;
            }
            "enable_resume_render" => settings.enable_resume_render = parse_bool(value)?,
            "strict_resume" => settings.strict_resume = parse_bool(value)?,
            "output_directory" => settings.output_directory = PathBuf::from(value),
            "output_file" => settings.output_file = PathBuf::from(value),
            "hdr_output_file" => settings.hdr_output_file = Some(PathBuf::from(value)),
            "resume_render_file" => settings.resume_render_file = PathBuf::from(value),
            "seed" => settings.seed = value.parse::<u64>()
                .map_err(|_| SceneLoadError::Parse(format!("invalid integer: {}", value)))?,
            _ => {}
        }
    }
    Ok(settings)
}

fn parse_integrator(attrs: &Attributes) -> Result<IntegratorSettings, SceneLoadError> {
    let max_bounces = match attrs.get("max_bounces") {
        Some(v) => parse_u32(v)?,
        None => 64,
    };
    let min_bounces = match attrs.get("min_bounces") {
        Some(v) => parse_u32(v)?,
        None => 0,
    };
    match attrs.get("type").map(String::as_str).unwrap_or("bidirectional") {
        "bidirectional" => {
            let light_tracing = match attrs.get("light_tracing") {
                Some(v) => parse_bool(v)?,
                None => true,
            };
            Ok(IntegratorSettings::Bidirectional { max_bounces, min_bounces, light_tracing })
        }
        "path" => Ok(IntegratorSettings::Path { max_bounces, min_bounces }),
        other => Err(SceneLoadError::Unsupported { kind: "integrator", name: other.to_string() }),
    }
}

fn parse_transform(name: &[u8], attrs: &Attributes) -> Result<Transform, SceneLoadError> {
    let component = |key: &str, default: Float| -> Result<Float, SceneLoadError> {
        match attrs.get(key) {
            Some(v) => parse_float(v),
            None => Ok(default),
        }
    };
    match name {
        b"translate" => Ok(Transform::translate(
            Vector3f::new(component("x", 0.0)?, component("y", 0.0)?, component("z", 0.0)?))),
        b"scale" => {
            let s = match attrs.get("value") {
                Some(v) => {
                    let u = parse_float(v)?;
                    Vector3f::new(u, u, u)
                }
                None => Vector3f::new(component("x", 1.0)?, component("y", 1.0)?, component("z", 1.0)?),
            };
            Ok(Transform::scale(s))
        }
        _ => {
            let axis = Vector3f::new(component("x", 0.0)?, component("y", 0.0)?, component("z", 0.0)?);
            let angle = parse_float(required(attrs, "angle", "rotate.angle")?)?;
            Ok(Transform::rotate(axis, angle))
        }
    }
}

fn required<'a>(attrs: &'a Attributes, key: &str, field: &'static str) -> Result<&'a String, SceneLoadError> {
    attrs.get(key).ok_or(SceneLoadError::MissingField(field))
}

fn resolve_value(raw: &str, defaults: &HashMap<String, String>) -> String {
    let mut out = raw.to_string();
    for (k, v) in defaults {
        out = out.replace(&format!("${}", k), v);
    }
    out
}

fn parse_float(value: &str) -> Result<Float, SceneLoadError> {
    value.trim().parse::<Float>().map_err(|_| SceneLoadError::Parse(format!("invalid float: {}", value)))
}

fn parse_u32(value: &str) -> Result<u32, SceneLoadError> {
    value.trim().parse::<u32>().map_err(|_| SceneLoadError::Parse(format!("invalid integer: {}", value)))
}

fn parse_usize(value: &str) -> Result<usize, SceneLoadError> {
    value.trim().parse::<usize>().map_err(|_| SceneLoadError::Parse(format!("invalid integer: {}", value)))
}

fn parse_bool(value: &str) -> Result<bool, SceneLoadError> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(SceneLoadError::Parse(format!("invalid boolean: {}", value))),
    }
}

fn parse_vec3(value: &str) -> Result<Vector3f, SceneLoadError> {
    let mut parts = value.split(',').map(|s| s.trim()).filter(|s| !s.is_empty());
    let x = parts.next().ok_or_else(|| SceneLoadError::Parse("invalid vec3".to_string()))?;
    let y = parts.next().ok_or_else(|| SceneLoadError::Parse("invalid vec3".to_string()))?;
    let z = parts.next().ok_or_else(|| SceneLoadError::Parse("invalid vec3".to_string()))?;
    if parts.next().is_some() {
        return Err(SceneLoadError::Parse(format!("invalid vec3: {}", value)));
    }
    Ok(Vector3f::new(parse_float(x)?, parse_float(y)?, parse_float(z)?))
}

/// Either a single gray value or `r, g, b`.
fn parse_spectrum(value: &str) -> Result<RGBSpectrum, SceneLoadError> {
    if value.contains(',') {
        parse_vec3(value)
    } else {
        let v = parse_float(value)?;
        Ok(RGBSpectrum::new(v, v, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shape::Shape;
    use crate::math::constants::Vector2f;

    const BOX_SCENE: &str = r#"
        <scene>
            <default name="res" value="16"/>
            <default name="light" value="4"/>
            <renderer spp="32" spp_step="8" checkpoint_interval="1.5"
                      enable_resume_render="true" output_directory="out"
                      output_file="box.png" hdr_output_file="box.exr" seed="9"/>
            <integrator type="bidirectional" max_bounces="6" min_bounces="2" light_tracing="false"/>
            <sensor type="perspective" origin="0, -3, 2" target="0, 0, 0.5" up="0, 0, 1"
                    fov="60" width="$res" height="$res"/>
            <bsdf type="diffuse" id="white" reflectance="0.7"/>
            <shape type="rectangle" bsdf="white" id="floor">
                <scale x="2" y="2"/>
            </shape>
            <shape type="rectangle" bsdf="white" id="light">
                <scale value="0.5"/>
                <rotate x="1" angle="180"/>
                <translate z="2"/>
                <emitter type="area" radiance="$light, $light, $light"/>
            </shape>
            <emitter type="point" position="0, 0, 1" intensity="2"/>
        </scene>
    "#;

    #[test]
    fn test_parse_scene() {
        let scene = parse_scene(BOX_SCENE, Path::new("/scenes")).expect("parse");

        let settings = scene.renderer_settings();
        assert_eq!(settings.spp, 32);
        assert_eq!(settings.spp_step, 8);
        assert_eq!(settings.checkpoint_interval, 1.5);
        assert!(settings.enable_resume_render);
        assert!(!settings.strict_resume);
        assert_eq!(settings.seed, 9);
        assert_eq!(settings.hdr_output_file, Some(PathBuf::from("box.exr")));
        assert_eq!(scene.output_path(&settings.output_file), PathBuf::from("/scenes/out/box.png"));
        assert_eq!(*scene.integrator_settings(),
                   IntegratorSettings::Bidirectional { max_bounces: 6, min_bounces: 2, light_tracing: false });

        let camera = scene.camera().expect("camera");
        assert_eq!((camera.width(), camera.height()), (16, 16));

        assert_eq!(scene.objects().len(), 2);
        assert_eq!(scene.objects()[0].name.as_deref(), Some("floor"));
        assert!(!scene.objects()[0].is_emissive());
        assert_eq!(scene.objects()[1].emission, RGBSpectrum::new(4.0, 4.0, 4.0));
        assert_eq!(scene.emitters().len(), 1);

        // The light quad ends up at z = 2, facing down.
        let light = &scene.objects()[1].shape;
        let sample = light.sample(&Vector2f::new(0.5, 0.5));
        assert!((sample.intersection().p().z - 2.0).abs() < 1e-5);
        assert!(sample.intersection().geo_normal().z < -0.99);
        assert!((light.surface_area() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_loaded_scene_is_traceable() {
        let mut scene = parse_scene(BOX_SCENE, Path::new("/scenes")).expect("parse");
        scene.load_resources().expect("resources");
        let world = scene.build_world().expect("world");
        assert_eq!(world.emitter_count(), 2);
        assert_eq!(world.object_emitter(1), Some(0));
    }

    #[test]
    fn test_errors() {
        let unknown_ref = r#"<scene><shape type="rectangle" bsdf="missing"/></scene>"#;
        assert!(matches!(parse_scene(unknown_ref, Path::new(".")),
                         Err(SceneLoadError::UnknownReference(ref id)) if id == "missing"));

        let unsupported = r#"<scene><shape type="sphere"/></scene>"#;
        assert!(matches!(parse_scene(unsupported, Path::new(".")),
                         Err(SceneLoadError::Unsupported { kind: "shape", .. })));

        let missing = r#"<scene><sensor type="perspective" origin="0,0,0" target="0,0,1" height="4"/></scene>"#;
        assert!(matches!(parse_scene(missing, Path::new(".")),
                         Err(SceneLoadError::MissingField("sensor.width"))));

        let bad_value = r#"<scene><renderer spp="many"/></scene>"#;
        assert!(matches!(parse_scene(bad_value, Path::new(".")), Err(SceneLoadError::Parse(_))));

        let malformed = r#"<scene><renderer spp="1"></scene>"#;
        assert!(matches!(parse_scene(malformed, Path::new(".")), Err(SceneLoadError::Xml(_))));
    }

    #[test]
    fn test_loader_sets_scene_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("box.xml");
        fs::write(&path, BOX_SCENE).expect("write scene");

        let scene = XmlSceneLoader.load(&path).expect("load");
        assert_eq!(scene.path(), path.as_path());
        assert_eq!(scene.base_dir(), dir.path());

        assert!(matches!(XmlSceneLoader.load(&dir.path().join("missing.xml")), Err(SceneLoadError::Io(_))));
    }
}
