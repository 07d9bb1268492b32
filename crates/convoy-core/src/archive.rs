//! Reading files out of charts
//!
//! A chart reference is either an unpacked directory or a `.tgz` archive whose
//! entries live under a top-level `<chart-name>/` directory.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tar::Archive;
use walkdir::WalkDir;

use crate::chart::is_archive_path;
use crate::error::{CoreError, Result};

/// Read `file` from a chart, `None` if the chart does not contain it
pub fn read_chart_file(chartref: &Path, chart_name: &str, file: &str) -> Result<Option<Vec<u8>>> {
    if chartref.is_dir() {
        let path = chartref.join(file);
        if !path.is_file() {
            return Ok(None);
        }
        return Ok(Some(std::fs::read(path)?));
    }

    if is_archive_path(chartref) && chartref.is_file() {
        let entry = format!("{}/{}", chart_name, file);
        return read_file_from_archive(chartref, &entry);
    }

    Ok(None)
}

/// Read a specific entry from a gzipped tarball
pub fn read_file_from_archive(archive_path: &Path, file_path: &str) -> Result<Option<Vec<u8>>> {
    let file = File::open(archive_path)?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    let entries = archive.entries().map_err(|e| CoreError::Archive {
        message: format!("{}: {}", archive_path.display(), e),
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| CoreError::Archive {
            message: format!("{}: {}", archive_path.display(), e),
        })?;
        let path = entry.path()?.to_string_lossy().to_string();
        let path = path.trim_start_matches("./");

        if path == file_path {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(Some(content));
        }
    }

    Ok(None)
}

/// Every file under `dir` of a chart, as chart-relative paths sorted by path
pub fn read_chart_dir(
    chartref: &Path,
    chart_name: &str,
    dir: &str,
) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();

    if chartref.is_dir() {
        let root = chartref.join(dir);
        if !root.is_dir() {
            return Ok(files);
        }
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let rel = path
                .strip_prefix(chartref)
                .unwrap_or(path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((rel, std::fs::read(path)?));
        }
    } else if is_archive_path(chartref) && chartref.is_file() {
        let prefix = format!("{}/{}/", chart_name, dir.trim_end_matches('/'));
        let file = File::open(chartref)?;
        let mut archive = Archive::new(GzDecoder::new(file));
        let entries = archive.entries().map_err(|e| CoreError::Archive {
            message: format!("{}: {}", chartref.display(), e),
        })?;

        for entry in entries {
            let mut entry = entry.map_err(|e| CoreError::Archive {
                message: format!("{}: {}", chartref.display(), e),
            })?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry.path()?.to_string_lossy().to_string();
            let path = path.trim_start_matches("./");
            if let Some(rel) = path.strip_prefix(&format!("{}/", chart_name)) {
                if path.starts_with(&prefix) {
                    let rel = rel.to_string();
                    let mut content = Vec::new();
                    entry.read_to_end(&mut content)?;
                    files.push((rel, content));
                }
            }
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}


#[cfg(test)]
mod tests {
    use super::test_support::write_archive;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("convoy-values.yaml"), "dev: {a: 1}\n").unwrap();

        let content = read_chart_file(dir.path(), "web", "convoy-values.yaml").unwrap();
        assert_eq!(content.as_deref(), Some("dev: {a: 1}\n".as_bytes()));
        assert!(read_chart_file(dir.path(), "web", "missing.yaml").unwrap().is_none());
    }

    #[test]
    fn test_read_from_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("web-1.0.0.tgz");
        write_archive(
            &archive,
            &[
                ("web/Chart.yaml", "name: web\nversion: 1.0.0\n"),
                ("web/convoy-values.yaml", "prod: {replicas: 3}\n"),
            ],
        );

        let content = read_chart_file(&archive, "web", "convoy-values.yaml")
            .unwrap()
            .unwrap();
        assert_eq!(String::from_utf8(content).unwrap(), "prod: {replicas: 3}\n");
        assert!(read_chart_file(&archive, "web", "convoy-secrets.yaml").unwrap().is_none());
    }

    #[test]
    fn test_read_dir_from_directory_and_archive() {
        let dir = TempDir::new().unwrap();
        let chart = dir.path().join("web");
        std::fs::create_dir_all(chart.join("templates/extra")).unwrap();
        std::fs::write(chart.join("templates/service.yaml"), "kind: Service\n").unwrap();
        std::fs::write(chart.join("templates/extra/job.yaml"), "kind: Job\n").unwrap();
        std::fs::write(chart.join("values.yaml"), "a: 1\n").unwrap();

        let files = read_chart_dir(&chart, "web", "templates").unwrap();
        let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["templates/extra/job.yaml", "templates/service.yaml"]);

        let archive = dir.path().join("web-1.0.0.tgz");
        write_archive(
            &archive,
            &[
                ("web/values.yaml", "a: 1\n"),
                ("web/templates/service.yaml", "kind: Service\n"),
                ("web/templates/deployment.yaml", "kind: Deployment\n"),
            ],
        );
        let files = read_chart_dir(&archive, "web", "templates").unwrap();
        assert_eq!(
            files,
            vec![
                ("templates/deployment.yaml".to_string(), b"kind: Deployment\n".to_vec()),
                ("templates/service.yaml".to_string(), b"kind: Service\n".to_vec()),
            ]
        );
        assert!(read_chart_dir(&archive, "web", "crds").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_reference_kind() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nothing-here.tgz");
        assert!(read_chart_file(&missing, "web", "convoy-values.yaml").unwrap().is_none());
    }
}
