use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use crate::report;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct Manager {
    work_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        let work_dir = work_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(work_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { work_dir, cfg })
    }

    pub fn synthesize_batch(&self) -> Result<()> {
        let batch_idx = self
            .batch_indices()
            .context("failed to list batch files")?
            .last()
            .map_or(0, |last| last + 1);

        let mut engine = Engine::new(self.cfg.clone(), batch_idx);
        let batch = engine
            .generate_batch()
            .with_context(|| format!("failed to generate batch {batch_idx}"))?;

        let batch_file = self.batch_file(batch_idx);
        batch
            .save(&batch_file)
            .with_context(|| format!("failed to save {batch_file:?}"))?;
        log::info!("saved {batch_file:?}");

        Ok(())
    }

    pub fn analyze_batches(&self) -> Result<()> {
        let mut analyzer = Analyzer::new(self.cfg.clone());

        let batch_indices = self.batch_indices().context("failed to list batch files")?;
        if batch_indices.is_empty() {
            log::warn!("no batches found in {:?}", self.work_dir);
        }
        for batch_idx in batch_indices {
            analyzer
                .add_file(self.batch_file(batch_idx))
                .context("failed to add file")?;
        }

        let analysis = analyzer.analyze();
        report::save_all(
            analyzer.rows(),
            &analysis,
            &self.work_dir.join("metrics.csv"),
            &self.work_dir.join("demyelination.csv"),
            &self.work_dir.join("report.md"),
        )
        .context("failed to save results")?;

        Ok(())
    }

    pub fn clean(&self) -> Result<()> {
        for file in self.batch_files().context("failed to list batch files")? {
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            log::info!("removed {file:?}");
        }
        for name in ["metrics.csv", "demyelination.csv", "report.md"] {
            let file = self.work_dir.join(name);
            if file.exists() {
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
                log::info!("removed {file:?}");
            }
        }
        Ok(())
    }

    fn batch_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.work_dir.join("batch-*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let files = glob(pattern)
            .context("failed to glob batch files")?
            .filter_map(Result::ok)
            .collect();
        Ok(files)
    }

    /// Sorted indices of the batch files present, gaps allowed.
    fn batch_indices(&self) -> Result<Vec<usize>> {
        let mut indices = Vec::new();
        for file in self.batch_files()? {
            let batch_idx =
                batch_index(&file).with_context(|| format!("invalid batch file name {file:?}"))?;
            indices.push(batch_idx);
        }
        indices.sort_unstable();
        Ok(indices)
    }

    fn batch_file(&self, batch_idx: usize) -> PathBuf {
        self.work_dir.join(format!("batch-{batch_idx:04}.msgpack"))
    }
}

fn batch_index(file: &Path) -> Option<usize> {
    file.file_stem()?
        .to_str()?
        .strip_prefix("batch-")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_index_parses_file_names() {
        assert_eq!(batch_index(Path::new("/tmp/run/batch-0000.msgpack")), Some(0));
        assert_eq!(batch_index(Path::new("batch-0042.msgpack")), Some(42));
        assert_eq!(batch_index(Path::new("batch-12345.msgpack")), Some(12345));
        assert_eq!(batch_index(Path::new("batch-old.msgpack")), None);
        assert_eq!(batch_index(Path::new("metrics.csv")), None);
    }
}
