#[cfg(test)]
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static INIT: Once = Once::new();

#[cfg(test)]
pub(crate) fn setup_log() {
    INIT.call_once(|| {
        use tracing::Level;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let filter = tracing_subscriber::filter::Targets::new().with_default(Level::DEBUG);
        let registry_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_test_writer();
        tracing_subscriber::registry()
            .with(registry_layer)
            .with(filter)
            .init();
    });
}

/// Writes a UTF-8 tree listing, one entry per line.
#[cfg(test)]
pub(crate) fn write_listing(dir: &Path, name: &str, lines: &[&str]) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, lines.join("\n"))?;
    Ok(path)
}

/// Every directory and file below `root` as a `/` separated relative path.
#[cfg(test)]
pub(crate) fn relative_entries(root: &Path) -> Vec<String> {
    fn visit(entries: &mut Vec<String>, dir: &Path, root: &Path) {
        let Ok(reader) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in reader.flatten() {
            let path = entry.path();
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<String>>()
                .join("/");
            entries.push(relative);
            if path.is_dir() {
                visit(entries, &path, root);
            }
        }
    }
    let mut entries = vec![];
    visit(&mut entries, root, root);
    entries.sort();
    entries
}
