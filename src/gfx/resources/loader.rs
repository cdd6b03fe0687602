//! Background asset loading
//!
//! Models and textures are read and decoded on worker threads so the frame
//! loop never blocks on disk. Results come back in two ways:
//!
//! - textures fill their [`TextureHandle`] in place; materials holding the
//!   handle pick the pixels up on the next frame
//! - models arrive over a oneshot channel wrapped in a [`PendingModel`] that
//!   the frame loop polls once per tick
//!
//! A failed load is reported once (a warning for textures, a
//! [`ModelLoad::Failed`] for models) and never retried.

use std::{
    future::Future,
    path::{Path, PathBuf},
    pin::Pin,
    task::{Context, Poll},
};

use futures::channel::oneshot;

use crate::{
    error::AssetError,
    gfx::{
        geometry::{calculate_vertex_normals, GeometryData},
        resources::{
            material::Material,
            texture::{TextureHandle, TextureImage, MAX_TEXTURE_DIMENSION},
        },
        scene::node::{MeshNode, Node, Transform},
    },
};

/// Outcome of a model load
#[derive(Debug)]
pub enum ModelLoad {
    /// Root node of the imported hierarchy
    Loaded(Node),
    Failed(AssetError),
}

/// Model load in flight
///
/// Poll it from the frame loop with [`PendingModel::try_recv`], or `.await` it.
pub struct PendingModel {
    path: PathBuf,
    receiver: oneshot::Receiver<ModelLoad>,
    finished: bool,
}

impl PendingModel {
    /// Wraps the receiving half of a load job
    pub fn from_receiver(path: impl Into<PathBuf>, receiver: oneshot::Receiver<ModelLoad>) -> Self {
        Self {
            path: path.into(),
            receiver,
            finished: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once the result has been handed out
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the result the first time it is available, `None` otherwise
    pub fn try_recv(&mut self) -> Option<ModelLoad> {
        if self.finished {
            return None;
        }
        let outcome = match self.receiver.try_recv() {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return None,
            Err(oneshot::Canceled) => ModelLoad::Failed(AssetError::Cancelled {
                path: self.path.clone(),
            }),
        };
        self.finished = true;
        Some(outcome)
    }
}

impl Future for PendingModel {
    type Output = ModelLoad;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let path = self.path.clone();
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(result) => {
                self.finished = true;
                Poll::Ready(result.unwrap_or(ModelLoad::Failed(AssetError::Cancelled { path })))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Spawns load jobs on worker threads
#[derive(Debug, Clone, Default)]
pub struct AssetLoader;

impl AssetLoader {
    pub fn new() -> Self {
        Self
    }

    /// Starts importing a model; returns immediately
    pub fn load_model(&self, path: impl Into<PathBuf>) -> PendingModel {
        let path = path.into();
        let (sender, receiver) = oneshot::channel();
        let job_path = path.clone();

        log::info!("Loading model '{}'", path.display());
        let spawned = std::thread::Builder::new()
            .name("model-loader".into())
            .spawn(move || {
                let outcome = match import_model(&job_path) {
                    Ok(node) => ModelLoad::Loaded(node),
                    Err(err) => ModelLoad::Failed(err),
                };
                // The receiver may be gone if the app shut down first
                let _ = sender.send(outcome);
            });
        if let Err(err) = spawned {
            // The sender was dropped with the closure; polling reports a cancellation
            log::error!("Could not spawn loader for '{}': {}", path.display(), err);
        }

        PendingModel::from_receiver(path, receiver)
    }

    /// Starts decoding a texture; the returned handle fills in when done
    pub fn load_texture(&self, path: impl Into<PathBuf>, label: &str) -> TextureHandle {
        let path = path.into();
        let handle = TextureHandle::pending(label);
        let target = handle.clone();

        let spawned = std::thread::Builder::new()
            .name("texture-loader".into())
            .spawn(move || match decode_texture(&path) {
                Ok(image) => {
                    log::debug!(
                        "Texture '{}' ready ({}x{})",
                        target.label(),
                        image.width,
                        image.height
                    );
                    target.fulfill(image);
                }
                Err(err) => log::warn!("Texture '{}' unavailable: {}", target.label(), err),
            });
        if let Err(err) = spawned {
            log::error!("Could not spawn loader for texture '{}': {}", label, err);
        }

        handle
    }
}

/// Reads and decodes an image file into RGBA8
///
/// Images with a side over [`MAX_TEXTURE_DIMENSION`] are scaled down, keeping
/// the aspect ratio, so the upload always fits the device.
pub fn decode_texture(path: &Path) -> Result<TextureImage, AssetError> {
    let image = image::open(path).map_err(|source| AssetError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let longest = width.max(height);
    if longest <= MAX_TEXTURE_DIMENSION {
        return Ok(rgba.into());
    }

    let scale = MAX_TEXTURE_DIMENSION as f64 / longest as f64;
    let fit = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, MAX_TEXTURE_DIMENSION);
    let (new_width, new_height) = (fit(width), fit(height));
    log::info!(
        "Scaling '{}' from {}x{} to {}x{}",
        path.display(),
        width,
        height,
        new_width,
        new_height
    );
    Ok(image::imageops::resize(&rgba, new_width, new_height, image::imageops::FilterType::Triangle).into())
}

/// Imports a model synchronously, choosing the importer by file extension
///
/// Supports glTF (`.gltf`, `.glb`) and Wavefront OBJ (`.obj`).
pub fn import_model(path: &Path) -> Result<Node, AssetError> {
    std::fs::metadata(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let mut root = match extension.as_deref() {
        Some("gltf") | Some("glb") => import_gltf(path)?,
        Some("obj") => import_obj(path)?,
        _ => {
            return Err(AssetError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    let mut meshes = 0;
    root.for_each_mesh_mut(&mut |_| meshes += 1);
    if meshes == 0 {
        return Err(AssetError::EmptyModel {
            path: path.to_path_buf(),
        });
    }

    log::info!("Imported '{}' ({} meshes)", path.display(), meshes);
    Ok(root)
}

fn model_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("model")
        .to_string()
}

fn import_gltf(path: &Path) -> Result<Node, AssetError> {
    let (document, buffers, _images) = gltf::import(path).map_err(|source| AssetError::Gltf {
        path: path.to_path_buf(),
        source,
    })?;

    let children = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene
            .nodes()
            .map(|node| convert_gltf_node(&node, &buffers))
            .collect(),
        None => Vec::new(),
    };

    Ok(Node::group(model_name(path), children))
}

fn convert_gltf_node(node: &gltf::Node, buffers: &[gltf::buffer::Data]) -> Node {
    let (translation, rotation, scale) = node.transform().decomposed();
    let transform = Transform {
        position: translation.into(),
        rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
        scale: scale.into(),
    };

    let name = node.name().unwrap_or("node").to_string();
    let mut children: Vec<Node> = Vec::new();

    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh.name().unwrap_or(&name).to_string();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::debug!("Skipping non-triangle primitive in mesh '{}'", mesh_name);
                continue;
            }
            match read_gltf_primitive(&primitive, buffers) {
                Some(geometry) => children.push(Node::mesh(
                    format!("{}.{}", mesh_name, primitive.index()),
                    MeshNode::new(geometry, Material::new(&mesh_name)),
                )),
                None => log::warn!("Mesh '{}' has a primitive without positions", mesh_name),
            }
        }
    }

    children.extend(node.children().map(|child| convert_gltf_node(&child, buffers)));

    Node::group(name, children).with_transform(transform)
}

fn read_gltf_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> Option<GeometryData> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));

    let vertices: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    let normals = match reader.read_normals() {
        Some(normals) => normals.collect(),
        None => calculate_vertex_normals(&vertices, &indices),
    };
    let tex_coords = match reader.read_tex_coords(0) {
        Some(coords) => coords.into_f32().collect(),
        None => vec![[0.0, 0.0]; vertices.len()],
    };

    Some(GeometryData {
        vertices,
        tex_coords,
        normals,
        indices,
    })
}

fn import_obj(path: &Path) -> Result<Node, AssetError> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|source| AssetError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    let children = models
        .into_iter()
        .filter(|model| !model.mesh.indices.is_empty())
        .map(|model| {
            let mesh = model.mesh;
            let vertices: Vec<[f32; 3]> = mesh
                .positions
                .chunks_exact(3)
                .map(|p| [p[0], p[1], p[2]])
                .collect();

            let normals = if mesh.normals.len() == mesh.positions.len() {
                mesh.normals
                    .chunks_exact(3)
                    .map(|n| [n[0], n[1], n[2]])
                    .collect()
            } else {
                calculate_vertex_normals(&vertices, &mesh.indices)
            };

            // OBJ puts v = 0 at the bottom of the image
            let tex_coords = if mesh.texcoords.len() / 2 == vertices.len() {
                mesh.texcoords
                    .chunks_exact(2)
                    .map(|t| [t[0], 1.0 - t[1]])
                    .collect()
            } else {
                vec![[0.0, 0.0]; vertices.len()]
            };

            let geometry = GeometryData {
                vertices,
                tex_coords,
                normals,
                indices: mesh.indices,
            };
            Node::mesh(model.name.clone(), MeshNode::new(geometry, Material::new(&model.name)))
        })
        .collect();

    Ok(Node::group(model_name(path), children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("zen-garden-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    const QUAD_OBJ: &str = "o quad\n\
        v -1 0 -1\nv 1 0 -1\nv 1 0 1\nv -1 0 1\n\
        vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
        f 1/1 2/2 3/3 4/4\n";

    #[test]
    fn test_obj_import_triangulates_and_computes_normals() {
        let path = temp_file("quad.obj", QUAD_OBJ.as_bytes());
        let root = import_model(&path).unwrap();

        assert_eq!(root.name, "quad");
        assert_eq!(root.children().len(), 1);
        let mesh = root.children()[0].as_mesh().unwrap();
        assert_eq!(mesh.geometry.triangle_count(), 2);
        assert_eq!(mesh.geometry.normals.len(), mesh.geometry.vertex_count());
        for normal in &mesh.geometry.normals {
            assert!(normal[1].abs() > 0.99);
        }
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = import_model(Path::new("/nonexistent/zen/board.glb")).unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let path = temp_file("board.fbx", b"not a model");
        let err = import_model(&path).unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_obj_without_faces_is_empty() {
        let path = temp_file("points.obj", b"o points\nv 0 0 0\nv 1 0 0\n");
        let err = import_model(&path).unwrap_err();
        assert!(matches!(err, AssetError::EmptyModel { .. }));
    }

    #[test]
    fn test_pending_model_reports_exactly_once() {
        let path = temp_file("async-quad.obj", QUAD_OBJ.as_bytes());
        let mut pending = AssetLoader::new().load_model(&path);

        let mut outcome = None;
        for _ in 0..500 {
            if let Some(result) = pending.try_recv() {
                outcome = Some(result);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(matches!(outcome, Some(ModelLoad::Loaded(_))));
        assert!(pending.is_finished());
        assert!(pending.try_recv().is_none());
    }

    #[test]
    fn test_pending_model_can_be_awaited() {
        let path = temp_file("awaited-quad.obj", QUAD_OBJ.as_bytes());
        let outcome = pollster::block_on(AssetLoader::new().load_model(&path));
        let ModelLoad::Loaded(root) = outcome else {
            panic!("quad failed to load");
        };
        assert_eq!(root.children().len(), 1);

        let missing = pollster::block_on(AssetLoader::new().load_model("/nonexistent/zen/board.obj"));
        assert!(matches!(missing, ModelLoad::Failed(AssetError::Io { .. })));
    }

    #[test]
    fn test_failed_texture_stays_pending() {
        let handle = AssetLoader::new().load_texture("/nonexistent/zen/sand.png", "sand");
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!handle.is_ready());
    }

    #[test]
    fn test_texture_decodes_in_background() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let path = temp_file("tiny.png", &png);

        let handle = AssetLoader::new().load_texture(&path, "tiny");
        for _ in 0..500 {
            if handle.is_ready() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        let image = handle.image().unwrap();
        assert_eq!((image.width, image.height), (2, 3));
        assert_eq!(&image.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_oversized_texture_is_scaled_to_fit_the_device() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(5000, 10, image::Rgba([200, 180, 160, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let path = temp_file("wide.png", &png);

        let image = decode_texture(&path).unwrap();
        assert_eq!((image.width, image.height), (MAX_TEXTURE_DIMENSION, 8));
        assert_eq!(image.pixels.len(), (image.width * image.height * 4) as usize);
        for (channel, expected) in image.pixels[..4].iter().zip([200u8, 180, 160, 255]) {
            assert!(channel.abs_diff(expected) <= 1);
        }
    }
}
