//! `stats.json` support.
//!
//! ```text
//! {
//!   "vertices": 1234,
//!   "faces": 2460,
//!   "bbox": { "min": [x, y, z], "max": [x, y, z] }
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use mesh_types::MeshStats;

use crate::error::{IoError, IoResult};

/// Write mesh statistics as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
///
/// # Example
///
/// ```no_run
/// use mesh_io::write_stats;
/// use mesh_types::{IndexedMesh, MeshStats};
///
/// let stats = MeshStats::from_mesh(&IndexedMesh::new());
/// write_stats(&stats, "out/stats.json").unwrap();
/// ```
pub fn write_stats<P: AsRef<Path>>(stats: &MeshStats, path: P) -> IoResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, stats)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Read mesh statistics written by [`write_stats`].
///
/// # Errors
///
/// Returns an error if the file is missing or is not a valid stats document.
pub fn read_stats<P: AsRef<Path>>(path: P) -> IoResult<MeshStats> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::from_open(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mesh_types::BoundingBox;
    use serde_json::Value;

    fn sample() -> MeshStats {
        MeshStats {
            vertices: 12,
            faces: 20,
            bbox: BoundingBox {
                min: [-0.5, -0.25, 1.0],
                max: [0.5, 0.25, 2.0],
            },
        }
    }

    #[test]
    fn schema_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        write_stats(&sample(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains('\n'), "stats should be pretty-printed");
        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["vertices"], 12);
        assert_eq!(json["faces"], 20);
        assert_eq!(json["bbox"]["min"][1].as_f64().unwrap(), -0.25);
        assert_eq!(json["bbox"]["max"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        write_stats(&sample(), &path).unwrap();
        assert_eq!(read_stats(&path).unwrap(), sample());
    }

    #[test]
    fn read_rejects_wrong_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, r#"{"vertices": 3}"#).unwrap();
        assert!(matches!(read_stats(&path), Err(IoError::Json(_))));
    }

    #[test]
    fn read_missing_file() {
        assert!(matches!(
            read_stats("does_not_exist/stats.json"),
            Err(IoError::FileNotFound { .. })
        ));
    }
}
