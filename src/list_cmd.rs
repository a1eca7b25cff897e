use crate::fs::walk_files;
use anyhow::Context;
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
pub(crate) struct FileListing {
    pub(crate) paths: Vec<PathBuf>,
    pub(crate) output_file: Option<PathBuf>,
}

impl FileListing {
    pub(crate) fn count(&self) -> usize {
        self.paths.len()
    }
}

pub(crate) fn main(directory: &String, output_dir: &String, dry_run: &bool) -> anyhow::Result<()> {
    let now = chrono::Local::now().naive_local();
    let listing = list_files(Path::new(directory), Path::new(output_dir), now, *dry_run)?;
    match &listing.output_file {
        Some(output_file) => println!("Saved {} files to {output_file:?}", listing.count()),
        None => println!("No files found in {directory}"),
    }
    Ok(())
}

/// Writes the absolute path of every file below `folder`, one per line, to a
/// new timestamped file in `output_dir`. A missing or empty folder writes
/// nothing.
pub(crate) fn list_files(
    folder: &Path,
    output_dir: &Path,
    now: NaiveDateTime,
    dry_run: bool,
) -> anyhow::Result<FileListing> {
    if !folder.is_dir() {
        error!("Folder does not exist: {folder:?}");
        return Ok(FileListing::default());
    }
    let folder = std::path::absolute(folder).with_context(|| format!("Unable to resolve {folder:?}"))?;
    let paths = walk_files(&folder);
    for p in &paths {
        debug!("Found file: {p:?}");
    }
    if paths.is_empty() {
        warn!("Folder is empty: {folder:?}");
        return Ok(FileListing::default());
    }

    let output_file = output_dir.join(output_file_name(&folder, now));
    if dry_run {
        debug!("Dry run: would write {} paths to {output_file:?}", paths.len());
    } else {
        fs::create_dir_all(output_dir).with_context(|| format!("Unable to create directory {output_dir:?}"))?;
        let mut contents = String::new();
        for p in &paths {
            contents.push_str(&p.to_string_lossy());
            contents.push('\n');
        }
        fs::write(&output_file, contents).with_context(|| format!("Unable to write file {output_file:?}"))?;
        info!("Saved file list to {output_file:?}");
    }
    info!("Found {} files", paths.len());
    Ok(FileListing {
        paths,
        output_file: Some(output_file),
    })
}

fn output_file_name(folder: &Path, now: NaiveDateTime) -> String {
    let folder_name = folder
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "root".to_string());
    format!("{folder_name}_files_{}.txt", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::NaiveDate;

    fn fixed_time() -> anyhow::Result<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .and_then(|d| d.and_hms_opt(7, 8, 9))
            .ok_or_else(|| anyhow!("bad date"))
    }

    #[test]
    fn test_output_file_name() -> anyhow::Result<()> {
        assert_eq!(
            output_file_name(Path::new("/media/Movies/"), fixed_time()?),
            "Movies_files_20240506_070809.txt"
        );
        Ok(())
    }

    #[test]
    fn test_list_files() -> anyhow::Result<()> {
        crate::test_util::setup_log();
        let dir = tempfile::tempdir()?;
        let library = dir.path().join("Library");
        fs::create_dir_all(library.join("MovieA"))?;
        fs::write(library.join("MovieA/MovieA.mkv"), "")?;
        fs::write(library.join("MovieA/MovieA.nfo"), "")?;
        fs::write(library.join("top.txt"), "")?;
        let out = dir.path().join("mergeLog");

        let listing = list_files(&library, &out, fixed_time()?, false)?;
        assert_eq!(listing.count(), 3);
        let output_file = listing.output_file.ok_or_else(|| anyhow!("no output file"))?;
        assert_eq!(output_file, out.join("Library_files_20240506_070809.txt"));
        let contents = fs::read_to_string(&output_file)?;
        let lines = contents.lines().collect::<Vec<&str>>();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| Path::new(l).is_absolute()));
        assert!(lines.iter().any(|l| l.ends_with("MovieA.nfo")));
        assert_eq!(listing.paths.len(), 3);
        Ok(())
    }

    #[test]
    fn test_missing_and_empty_folders() -> anyhow::Result<()> {
        crate::test_util::setup_log();
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("mergeLog");
        let listing = list_files(&dir.path().join("missing"), &out, fixed_time()?, false)?;
        assert_eq!(listing.count(), 0);
        assert!(listing.output_file.is_none());

        fs::create_dir_all(dir.path().join("empty"))?;
        let listing = list_files(&dir.path().join("empty"), &out, fixed_time()?, false)?;
        assert_eq!(listing.count(), 0);
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn test_list_mirror_output() -> anyhow::Result<()> {
        crate::test_util::setup_log();
        let dir = tempfile::tempdir()?;
        let listing = crate::test_util::write_listing(
            dir.path(),
            "tree.txt",
            &["|——Show", "| |-Season 1", "| | |-e1.mkv", "| | |-e2.mkv", "| |-tvshow.nfo"],
        )?;
        let root = dir.path().join("mirror");
        crate::mirror_cmd::run(&listing, &root, &Default::default(), &mut |_| {})?;

        let out = dir.path().join("mergeLog");
        let files = list_files(&root, &out, fixed_time()?, true)?;
        assert_eq!(files.count(), 3);
        assert!(!out.exists());
        Ok(())
    }
}
