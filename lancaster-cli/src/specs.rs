//! File/directory spec parsing: `path`, `path::alias`, `dir::subdir`,
//! `dir:::subdir` (triple colon recurses).

use std::path::{Path, PathBuf};

use lancaster_tarball::FileSpec;
use walkdir::WalkDir;

/// One parsed `--serve`/`--id`/`--ls` argument, before filesystem expansion.
struct ParsedSpec {
    local_path: PathBuf,
    alias: Option<String>,
    recursive: bool,
}

fn parse_one(spec: &str) -> ParsedSpec {
    if let Some((local, alias)) = spec.split_once(":::") {
        return ParsedSpec {
            local_path: PathBuf::from(local),
            alias: Some(alias.to_owned()),
            recursive: true,
        };
    }
    if let Some((local, alias)) = spec.split_once("::") {
        return ParsedSpec {
            local_path: PathBuf::from(local),
            alias: Some(alias.to_owned()),
            recursive: false,
        };
    }
    ParsedSpec {
        local_path: PathBuf::from(spec),
        alias: None,
        recursive: false,
    }
}

/// Expands a list of spec strings into the ordered [`FileSpec`] list a
/// server reads from, walking directories as `::`/`:::` direct.
pub fn expand_specs(specs: &[String]) -> Result<Vec<FileSpec>, String> {
    let mut out = Vec::new();
    for spec in specs {
        expand_one(&parse_one(spec), &mut out)?;
    }
    if out.is_empty() {
        return Err("no files matched the given specs".into());
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

fn expand_one(parsed: &ParsedSpec, out: &mut Vec<FileSpec>) -> Result<(), String> {
    let metadata = std::fs::metadata(&parsed.local_path)
        .map_err(|e| format!("{}: {e}", parsed.local_path.display()))?;

    if metadata.is_file() {
        let recorded = parsed
            .alias
            .clone()
            .unwrap_or_else(|| file_name_of(&parsed.local_path));
        out.push(FileSpec {
            path: recorded,
            local_path: parsed.local_path.clone(),
        });
        return Ok(());
    }

    let prefix = parsed
        .alias
        .clone()
        .unwrap_or_else(|| file_name_of(&parsed.local_path));

    let walker = WalkDir::new(&parsed.local_path).max_depth(if parsed.recursive {
        usize::MAX
    } else {
        1
    });

    for entry in walker {
        let entry = entry.map_err(|e| e.to_string())?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(&parsed.local_path)
            .expect("walkdir entries are under the root they were walked from");
        let recorded = join_forward_slash(&prefix, relative);
        out.push(FileSpec {
            path: recorded,
            local_path: entry.path().to_path_buf(),
        });
    }
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn join_forward_slash(prefix: &str, relative: &Path) -> String {
    let mut parts = vec![prefix.to_owned()];
    parts.extend(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_path_uses_its_own_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("a.txt");
        std::fs::write(&f, b"x").unwrap();

        let specs = expand_specs(&[f.display().to_string()]).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].path, "a.txt");
    }

    #[test]
    fn aliased_path_uses_the_alias() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("a.txt");
        std::fs::write(&f, b"x").unwrap();

        let spec = format!("{}::renamed.txt", f.display());
        let specs = expand_specs(&[spec]).unwrap();
        assert_eq!(specs[0].path, "renamed.txt");
    }

    #[test]
    fn non_recursive_dir_spec_skips_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("top.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/deep.txt"), b"y").unwrap();

        let spec = format!("{}::data", dir.path().display());
        let specs = expand_specs(&[spec]).unwrap();
        let paths: Vec<_> = specs.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["data/top.txt"]);
    }

    #[test]
    fn recursive_dir_spec_includes_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("top.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/deep.txt"), b"y").unwrap();

        let spec = format!("{}:::data", dir.path().display());
        let specs = expand_specs(&[spec]).unwrap();
        let mut paths: Vec<_> = specs.iter().map(|f| f.path.clone()).collect();
        paths.sort();
        assert_eq!(paths, vec!["data/nested/deep.txt", "data/top.txt"]);
    }

    #[test]
    fn empty_spec_list_expansion_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        let spec = dir.path().join("empty").display().to_string();
        assert!(expand_specs(&[spec]).is_err());
    }
}
