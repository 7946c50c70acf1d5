//! Dumps every annotation of a dataset to a single JSON file, in raw
//! zero-based pixel coordinates. Handy for inspecting label quality without
//! paying for image decodes.
//!
//! Usage: `voc2json <dataset-root> <output.json>`

use std::fs::File;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vocdet::dataset::voc::VocDetection;
use vocdet::error::DatasetError;
use vocdet::LabeledBox;

#[derive(Serialize)]
struct AnnotationDump {
    id: String,
    boxes: Vec<LabeledBox>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let usage = "usage: voc2json <dataset-root> <output.json>";
    let root = args.next().context(usage)?;
    let output = args.next().context(usage)?;

    let dataset = VocDetection::new(&root)?;
    info!(items = dataset.len(), "dumping annotations");

    let dumps = (0..dataset.len())
        .into_par_iter()
        .map(|index| {
            let (id, boxes) = dataset.pull_annotation(index)?;
            Ok(AnnotationDump { id, boxes })
        })
        .collect::<Result<Vec<_>, DatasetError>>()?;

    let file = File::create(&output).with_context(|| format!("failed to create {output}"))?;
    serde_json::to_writer_pretty(file, &dumps).context("failed to write annotation dump")?;
    info!(%output, "wrote annotation dump");
    Ok(())
}
