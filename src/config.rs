use anyhow::{Context, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use yaml_rust2::yaml::Hash;
use yaml_rust2::{Yaml, YamlEmitter, YamlLoader};

pub(crate) const MIRROR_SECTION: &str = "mirror_115_tree";

const DEFAULT_CONFIG: &str = "
mirror_115_tree:
  target_folder: ''
  export_folder: ''
  fix_garbled: false
  fault_policy: abort
  ansi_codepage: gbk
  encodings: [utf-8, gbk, ansi, mbcs, gb2312]
";

fn default_config() -> Yaml {
    YamlLoader::load_from_str(DEFAULT_CONFIG)
        .ok()
        .and_then(|docs| docs.into_iter().next())
        .unwrap_or_else(|| Yaml::Hash(Hash::new()))
}

/// Settings kept between runs, stored as YAML sections of key/value pairs.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    path: PathBuf,
    root: Yaml,
}

impl Config {
    /// Loads `path` with every default filled in. A missing or unreadable
    /// file gives the defaults.
    pub(crate) fn load(path: &Path) -> Self {
        let defaults = default_config();
        let root = match read_yaml(path) {
            Ok(Some(loaded)) => merge_config(&defaults, Some(&loaded)),
            Ok(None) => {
                debug!("No config at {path:?}, using defaults");
                defaults
            }
            Err(e) => {
                warn!("Failed to load config file {path:?}: {e:#}");
                defaults
            }
        };
        Config {
            path: path.to_path_buf(),
            root,
        }
    }

    pub(crate) fn save(&self) -> anyhow::Result<()> {
        let mut out_str = String::new();
        {
            let mut emitter = YamlEmitter::new(&mut out_str);
            emitter
                .dump(&self.root)
                .map_err(|e| anyhow!("Unable to write config YAML: {e}"))?;
        }
        let out_str = out_str.trim_start_matches("---").trim_start_matches('\n').to_string() + "\n";
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| format!("Unable to create directory {parent:?}"))?;
        }
        fs::write(&self.path, out_str).with_context(|| format!("Unable to save config file {:?}", self.path))?;
        debug!("Saved config to {:?}", self.path);
        Ok(())
    }

    pub(crate) fn get(&self, section: &str, key: &str) -> &Yaml {
        &self.root[section][key]
    }

    /// A non-empty string value.
    pub(crate) fn get_str(&self, section: &str, key: &str) -> Option<String> {
        self.get(section, key)
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub(crate) fn get_bool(&self, section: &str, key: &str) -> Option<bool> {
        self.get(section, key).as_bool()
    }

    pub(crate) fn get_str_list(&self, section: &str, key: &str) -> Option<Vec<String>> {
        self.get(section, key).as_vec().map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
    }

    pub(crate) fn set(&mut self, section: &str, key: &str, value: Yaml) {
        if !matches!(self.root, Yaml::Hash(_)) {
            self.root = Yaml::Hash(Hash::new());
        }
        let Yaml::Hash(root) = &mut self.root else {
            return;
        };
        let section_key = Yaml::String(section.to_string());
        if !matches!(root.get(&section_key), Some(Yaml::Hash(_))) {
            root.insert(section_key.clone(), Yaml::Hash(Hash::new()));
        }
        if let Some(Yaml::Hash(section_hash)) = root.get_mut(&section_key) {
            let key = Yaml::String(key.to_string());
            match section_hash.get_mut(&key) {
                Some(slot) => *slot = value,
                None => {
                    section_hash.insert(key, value);
                }
            }
        }
    }
}

fn read_yaml(path: &Path) -> anyhow::Result<Option<Yaml>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path).with_context(|| format!("Unable to read {path:?}"))?;
    let docs = YamlLoader::load_from_str(&s).map_err(|e| anyhow!("Could not parse YAML: {e}"))?;
    Ok(docs.into_iter().next())
}

/// Fills in every default missing from `loaded`, recursing into sections.
/// Keys only present in `loaded` are kept as they are.
fn merge_config(default: &Yaml, loaded: Option<&Yaml>) -> Yaml {
    let Yaml::Hash(default_hash) = default else {
        return match loaded {
            Some(Yaml::Null) | Some(Yaml::BadValue) | None => default.clone(),
            Some(v) => v.clone(),
        };
    };
    let mut result = match loaded {
        Some(Yaml::Hash(h)) => h.clone(),
        _ => Hash::new(),
    };
    for (key, value) in default_hash {
        let merged = merge_config(value, result.get(key));
        match result.get_mut(key) {
            Some(slot) => *slot = merged,
            None => {
                result.insert(key.clone(), merged);
            }
        }
    }
    Yaml::Hash(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() -> anyhow::Result<()> {
        crate::test_util::setup_log();
        let dir = tempfile::tempdir()?;
        let config = Config::load(&dir.path().join("config.yaml"));
        assert_eq!(config.get_str(MIRROR_SECTION, "target_folder"), None);
        assert_eq!(config.get_bool(MIRROR_SECTION, "fix_garbled"), Some(false));
        assert_eq!(config.get_str(MIRROR_SECTION, "fault_policy"), Some("abort".to_string()));
        assert_eq!(
            config.get_str_list(MIRROR_SECTION, "encodings"),
            Some(vec![
                "utf-8".to_string(),
                "gbk".to_string(),
                "ansi".to_string(),
                "mbcs".to_string(),
                "gb2312".to_string(),
            ])
        );
        Ok(())
    }

    #[test]
    fn test_merge_keeps_user_values() -> anyhow::Result<()> {
        crate::test_util::setup_log();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "mirror_115_tree:\n  fix_garbled: true\n  target_folder: /data/tree.txt\nexport_symlink:\n  thread_count: 4\n",
        )?;
        let config = Config::load(&path);
        assert_eq!(config.get_bool(MIRROR_SECTION, "fix_garbled"), Some(true));
        assert_eq!(
            config.get_str(MIRROR_SECTION, "target_folder"),
            Some("/data/tree.txt".to_string())
        );
        assert_eq!(config.get_str(MIRROR_SECTION, "ansi_codepage"), Some("gbk".to_string()));
        assert_eq!(config.get("export_symlink", "thread_count").as_i64(), Some(4));
        Ok(())
    }

    #[test]
    fn test_unparsable_file_gives_defaults() -> anyhow::Result<()> {
        crate::test_util::setup_log();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");
        fs::write(&path, "mirror_115_tree: [unclosed\n")?;
        let config = Config::load(&path);
        assert_eq!(config.get_bool(MIRROR_SECTION, "fix_garbled"), Some(false));
        Ok(())
    }

    #[test]
    fn test_set_and_save() -> anyhow::Result<()> {
        crate::test_util::setup_log();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/config.yaml");
        let mut config = Config::load(&path);
        config.set(MIRROR_SECTION, "export_folder", Yaml::String("/mnt/mirror".to_string()));
        config.set(MIRROR_SECTION, "fix_garbled", Yaml::Boolean(true));
        config.set("other", "key", Yaml::String("value".to_string()));
        config.save()?;

        let reloaded = Config::load(&path);
        assert_eq!(
            reloaded.get_str(MIRROR_SECTION, "export_folder"),
            Some("/mnt/mirror".to_string())
        );
        assert_eq!(reloaded.get_bool(MIRROR_SECTION, "fix_garbled"), Some(true));
        assert_eq!(reloaded.get_str("other", "key"), Some("value".to_string()));
        assert_eq!(reloaded.get_str(MIRROR_SECTION, "fault_policy"), Some("abort".to_string()));
        Ok(())
    }
}
