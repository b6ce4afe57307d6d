use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::io::write_ply;
use crate::pipeline::Alignment;

/// Writes the source, target and result clouds of an alignment as
/// `source.ply`, `target.ply` and `result.ply` under `out_dir`, creating the
/// directory if needed.
///
/// # Returns
///
/// The paths of the written files, in that order.
pub fn write_scene<P: AsRef<Path>>(alignment: &Alignment, out_dir: P) -> Result<[PathBuf; 3]> {
    let out_dir = out_dir.as_ref();
    std::fs::create_dir_all(out_dir)?;

    let paths = [
        out_dir.join("source.ply"),
        out_dir.join("target.ply"),
        out_dir.join("result.ply"),
    ];
    for (path, cloud) in paths
        .iter()
        .zip([&alignment.source, &alignment.target, &alignment.result])
    {
        write_ply(path, cloud)?;
        tracing::info!(path = %path.display(), points = cloud.len(), "wrote");
    }

    Ok(paths)
}
