//! Survey point-cloud export.

use chrono::{DateTime, Utc};
use flight_core::Point3;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Writes `.pts` files, one `x y z` line per point.
#[derive(Debug, Clone)]
pub struct CaptureWriter {
    dir: PathBuf,
}

impl CaptureWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(at: DateTime<Utc>) -> String {
        format!("sample_{}.pts", at.format("%Y%m%dT%H%M%S%.6f"))
    }

    pub async fn write(&self, points: &[Point3], at: DateTime<Utc>) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(at));
        tokio::fs::write(&path, render(points)).await?;
        Ok(path)
    }
}

fn render(points: &[Point3]) -> String {
    let mut out = String::with_capacity(points.len() * 32);
    for p in points {
        let _ = writeln!(out, "{:.4} {:.4} {:.4}", p.x, p.y, p.z);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_uses_microsecond_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
            + chrono::Duration::microseconds(42);
        assert_eq!(CaptureWriter::file_name(at), "sample_20240309T140507.000042.pts");
    }

    #[tokio::test]
    async fn writes_one_line_per_point() {
        let dir = std::env::temp_dir().join(format!("flight-capture-{}", std::process::id()));
        let writer = CaptureWriter::new(&dir);
        let points = vec![Point3::new(1.0, -2.5, 3.25), Point3::new(0.0, 0.0, 0.0)];
        let path = writer.write(&points, Utc::now()).await.unwrap();
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text, "1.0000 -2.5000 3.2500\n0.0000 0.0000 0.0000\n");
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
