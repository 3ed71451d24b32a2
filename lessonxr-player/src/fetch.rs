//! Asset byte fetching and decoding
//!
//! Loaders ask an `AssetFetcher` for decoded facts about a source (image
//! dimensions, model bounds, audio duration) rather than raw bytes. Decoding
//! is CPU-bound and runs on the blocking pool.

use crate::error::{Error, Result};
use crate::scene::Aabb;
use async_trait::async_trait;
use glam::Vec3;
use std::io::Cursor;
use std::path::PathBuf;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Decoded image header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

/// Model summary read from a glTF/GLB document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInfo {
    /// Union of all primitive bounds (unit cube when the model declares none)
    pub bounds: Aabb,
    pub mesh_count: usize,
}

#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch_image(&self, uri: &str) -> Result<ImageInfo>;

    async fn fetch_model(&self, uri: &str) -> Result<ModelInfo>;

    /// Duration of an audio source in seconds
    async fn probe_audio(&self, uri: &str) -> Result<f64>;
}

/// Lower-cased extension of the last path segment, ignoring query and fragment
pub fn uri_extension(uri: &str) -> Option<String> {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Read image dimensions without decoding pixels
pub fn decode_image_info(bytes: &[u8]) -> Result<ImageInfo> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| Error::Decode(format!("image: {}", e)))?;
    Ok(ImageInfo { width, height })
}

/// Read mesh bounds from accessor min/max (buffers are not loaded)
pub fn decode_model_info(bytes: &[u8]) -> Result<ModelInfo> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|e| Error::Decode(format!("gltf: {}", e)))?;

    let mut bounds: Option<Aabb> = None;
    let mut mesh_count = 0;
    for mesh in gltf.meshes() {
        mesh_count += 1;
        for primitive in mesh.primitives() {
            let bb = primitive.bounding_box();
            let prim = Aabb::new(Vec3::from_array(bb.min), Vec3::from_array(bb.max));
            bounds = Some(match bounds {
                Some(b) => b.union(&prim),
                None => prim,
            });
        }
    }

    if mesh_count == 0 {
        return Err(Error::Decode("gltf: document contains no meshes".to_string()));
    }
    Ok(ModelInfo {
        bounds: bounds.unwrap_or_else(Aabb::unit),
        mesh_count,
    })
}

/// Duration from container metadata, or by walking packets when absent
pub fn decode_audio_duration(bytes: Vec<u8>, extension: Option<&str>) -> Result<f64> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("audio: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::Decode("audio: no audio track found".to_string()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    if let (Some(frames), Some(rate)) = (params.n_frames, params.sample_rate) {
        if rate > 0 {
            return Ok(frames as f64 / rate as f64);
        }
    }

    let time_base = params
        .time_base
        .or_else(|| params.sample_rate.map(|r| symphonia::core::units::TimeBase::new(1, r)))
        .ok_or_else(|| Error::Decode("audio: unknown time base".to_string()))?;

    let mut total: u64 = 0;
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() == track_id {
            total += packet.dur;
        }
    }
    let time = time_base.calc_time(total);
    Ok(time.seconds as f64 + time.frac)
}

/// Fetcher for local files and http(s) URLs
///
/// Relative references resolve against `base_url` when set, otherwise
/// against `base_dir`.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: reqwest::Client,
    base_dir: PathBuf,
    base_url: Option<String>,
}

impl SourceFetcher {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Fetch(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_dir: base_dir.into(),
            base_url: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    async fn fetch_bytes(&self, uri: &str) -> Result<Vec<u8>> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return self.fetch_http(uri).await;
        }
        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(tokio::fs::read(path).await?);
        }
        if let Some(base) = &self.base_url {
            return self
                .fetch_http(&format!("{}/{}", base, uri.trim_start_matches('/')))
                .await;
        }

        let path = self.base_dir.join(uri);
        debug!(path = %path.display(), "Reading asset file");
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", path.display(), e)))
    }

    async fn fetch_http(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "Fetching asset");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(Error::Fetch(format!("{}: HTTP {}", url, response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

async fn decode_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Decode(format!("decode task failed: {}", e)))?
}

#[async_trait]
impl AssetFetcher for SourceFetcher {
    async fn fetch_image(&self, uri: &str) -> Result<ImageInfo> {
        let bytes = self.fetch_bytes(uri).await?;
        decode_blocking(move || decode_image_info(&bytes)).await
    }

    async fn fetch_model(&self, uri: &str) -> Result<ModelInfo> {
        let bytes = self.fetch_bytes(uri).await?;
        decode_blocking(move || decode_model_info(&bytes)).await
    }

    async fn probe_audio(&self, uri: &str) -> Result<f64> {
        let bytes = self.fetch_bytes(uri).await?;
        let ext = uri_extension(uri);
        decode_blocking(move || decode_audio_duration(bytes, ext.as_deref())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal glTF JSON with one triangle whose POSITION accessor carries min/max
    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "buffers": [ { "uri": "triangle.bin", "byteLength": 36 } ],
        "bufferViews": [ { "buffer": 0, "byteLength": 36 } ],
        "accessors": [ {
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
            "min": [-1.0, 0.0, -0.5], "max": [1.0, 4.0, 0.5]
        } ],
        "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 } } ] } ]
    }"#;

    #[test]
    fn test_uri_extension() {
        assert_eq!(uri_extension("room.GLB"), Some("glb".to_string()));
        assert_eq!(
            uri_extension("https://cdn.example.org/a/pano.jpg?sig=abc#x"),
            Some("jpg".to_string())
        );
        assert_eq!(uri_extension("https://cdn.example.org/a/pano"), None);
        assert_eq!(uri_extension(".hidden"), None);
    }

    #[test]
    fn test_decode_model_bounds() {
        let info = decode_model_info(TRIANGLE_GLTF.as_bytes()).unwrap();
        assert_eq!(info.mesh_count, 1);
        assert_eq!(info.bounds.min, Vec3::new(-1.0, 0.0, -0.5));
        assert_eq!(info.bounds.max_dimension(), 4.0);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_model_info(b"not a model").is_err());
        assert!(decode_image_info(b"not an image").is_err());
        assert!(decode_audio_duration(b"not audio".to_vec(), Some("mp3")).is_err());
    }

    #[test]
    fn test_image_aspect() {
        let info = ImageInfo {
            width: 4096,
            height: 2048,
        };
        assert_eq!(info.aspect(), 2.0);
    }
}
