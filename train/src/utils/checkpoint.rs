use crate::{common::*, config::LoadCheckpoint};
use regex::Regex;

pub const FILE_STRFTIME: &str = "%Y-%m-%d-%H-%M-%S.%3f%z";

/// Save parameters to a checkpoint file.
pub fn save_checkpoint(
    vs: &nn::VarStore,
    checkpoint_dir: &Path,
    epoch: usize,
    valid_acc: f64,
) -> Result<()> {
    let filename = format!(
        "{}_{:06}_{:08.5}.ckpt",
        Local::now().format(FILE_STRFTIME),
        epoch,
        valid_acc
    );
    let path = checkpoint_dir.join(filename);
    vs.save(&path)
        .with_context(|| format!("failed to save checkpoint '{}'", path.display()))?;
    Ok(())
}

/// Load parameters from a directory with specified checkpoint loading
/// method. Loading is partial, so a backbone checkpoint with a
/// different classification head still applies.
pub fn try_load_checkpoint(
    vs: &mut nn::VarStore,
    logging_dir: &Path,
    load_checkpoint: &LoadCheckpoint,
) -> Result<()> {
    let checkpoint_filename_regex =
        Regex::new(r"^(\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2}\.\d{3}[+-]\d{4})_\d{6}_\d+\.\d+\.ckpt$")
            .unwrap();

    let path = match load_checkpoint {
        LoadCheckpoint::Disabled => {
            info!("checkpoint loading is disabled");
            None
        }
        LoadCheckpoint::FromRecent => {
            let paths: Vec<_> =
                glob::glob(&format!("{}/*/checkpoints/*.ckpt", logging_dir.display()))
                    .unwrap()
                    .try_collect()?;
            let paths = paths
                .into_iter()
                .filter_map(|path| {
                    let file_name = path.file_name()?.to_str()?;
                    let captures = checkpoint_filename_regex.captures(file_name)?;
                    let datetime_str = captures.get(1)?.as_str();
                    let datetime = DateTime::parse_from_str(datetime_str, FILE_STRFTIME).ok()?;
                    Some((path, datetime))
                })
                .collect_vec();
            let checkpoint_file = paths
                .into_iter()
                .max_by_key(|(_path, datetime)| *datetime)
                .map(|(path, _datetime)| path);

            if checkpoint_file.is_none() {
                warn!("no checkpoint file found");
            }

            checkpoint_file
        }
        LoadCheckpoint::FromFile { file } => {
            if file.is_file() {
                Some(file.to_owned())
            } else {
                warn!("{} is not a file", file.display());
                None
            }
        }
    };

    if let Some(path) = path {
        info!("load checkpoint file {}", path.display());
        vs.load_partial(path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_checkpoint_is_discovered_and_loaded() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("sign-dl-ckpt-{}", std::process::id()));
        let checkpoint_dir = dir.join("run").join("checkpoints");
        fs::create_dir_all(&checkpoint_dir)?;

        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();
        let _ = root.ones("weight", &[4]);
        save_checkpoint(&vs, &checkpoint_dir, 3, 0.875)?;

        // discovery must match the saved filename regardless of the
        // local timezone offset sign; a parameter left at its fresh
        // value means the checkpoint was silently skipped
        let mut vs2 = nn::VarStore::new(Device::Cpu);
        let root2 = vs2.root();
        let weight = root2.zeros("weight", &[4]);
        try_load_checkpoint(&mut vs2, &dir, &LoadCheckpoint::FromRecent)?;
        assert_eq!(weight, Tensor::ones(&[4], (Kind::Float, Device::Cpu)));

        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn missing_file_is_skipped() -> Result<()> {
        let mut vs = nn::VarStore::new(Device::Cpu);
        try_load_checkpoint(
            &mut vs,
            Path::new("/nonexistent"),
            &LoadCheckpoint::FromFile {
                file: PathBuf::from("/nonexistent/model.ckpt"),
            },
        )?;
        Ok(())
    }
}
