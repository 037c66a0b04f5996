//! Reading and writing operator documents.

use std::fs;
use std::path::Path;

use nutcracker_core::{NutError, Result};
use nutcracker_tensor::OperatorSite;

use crate::document::OperatorDocument;

/// Descends a slash-delimited location inside a container document.
pub fn lookup_location<'a>(
    root: &'a serde_yaml::Value,
    location: &str,
) -> Result<&'a serde_yaml::Value> {
    let mut node = root;
    for name in location.split('/').filter(|name| !name.is_empty()) {
        node = node
            .get(name)
            .ok_or_else(|| NutError::NoSuchLocation(location.to_string()))?;
    }
    Ok(node)
}

fn insert_at(
    node: &mut serde_yaml::Value,
    segments: &[&str],
    location: &str,
    value: serde_yaml::Value,
) -> Result<()> {
    match segments {
        [] => {
            *node = value;
            Ok(())
        }
        [name, rest @ ..] => {
            if node.is_null() {
                *node = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
            }
            let mapping = node
                .as_mapping_mut()
                .ok_or_else(|| NutError::NoSuchLocation(location.to_string()))?;
            let key = serde_yaml::Value::String((*name).to_string());
            if !mapping.contains_key(&key) {
                mapping.insert(key.clone(), serde_yaml::Value::Null);
            }
            let child = mapping.get_mut(&key).expect("the key was just ensured");
            insert_at(child, rest, location, value)
        }
    }
}

/// Places a value at a slash-delimited location inside a container
/// document, creating intermediate mappings as needed. The write-side
/// counterpart of [`lookup_location`]; descending through a non-mapping
/// node fails with the same location error.
pub fn insert_at_location(
    root: &mut serde_yaml::Value,
    location: &str,
    value: serde_yaml::Value,
) -> Result<()> {
    let segments: Vec<&str> = location
        .split('/')
        .filter(|name| !name.is_empty())
        .collect();
    insert_at(root, &segments, location, value)
}

/// Parses an operator from YAML text, optionally nested at a location.
pub fn read_operator_from_str(
    text: &str,
    location: Option<&str>,
) -> Result<Vec<OperatorSite>> {
    let document = match location {
        Some(location) => {
            let root: serde_yaml::Value = serde_yaml::from_str(text)?;
            let node = lookup_location(&root, location)?;
            serde_yaml::from_value::<OperatorDocument>(node.clone())?
        }
        None => serde_yaml::from_str(text)?,
    };
    document.to_operator_sites()
}

/// Reads an operator from a YAML file.
pub fn read_operator_from_file(
    path: impl AsRef<Path>,
    location: Option<&str>,
) -> Result<Vec<OperatorSite>> {
    let text = fs::read_to_string(path)?;
    read_operator_from_str(&text, location)
}

/// Serializes an operator to YAML text.
pub fn write_operator_to_string(sites: &[OperatorSite]) -> Result<String> {
    Ok(serde_yaml::to_string(&OperatorDocument::from_operator_sites(sites))?)
}

/// Writes an operator to a YAML file, refusing to clobber an existing file
/// unless asked to.
pub fn write_operator_to_file(
    path: impl AsRef<Path>,
    sites: &[OperatorSite],
    overwrite: bool,
) -> Result<()> {
    let path = path.as_ref();
    if !overwrite && path.exists() {
        return Err(NutError::OutputFileAlreadyExists(
            path.display().to_string(),
        ));
    }
    fs::write(path, write_operator_to_string(sites)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELD_OPERATOR: &str = r#"
sequence: [1, 2]
sites:
  - physical dimension: 2
    left dimension: 1
    right dimension: 1
    matrices:
      - from: 1
        to: 1
        data: [-1, 0, 0, 1]
  - physical dimension: 2
    left dimension: 1
    right dimension: 1
    matrices:
      - from: 1
        to: 1
        data: [0, [0, -1], [0, 1], 0]
"#;

    #[test]
    fn test_read_operator() {
        let sites = read_operator_from_str(FIELD_OPERATOR, None).unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].matrix(0)[[0, 0]].re, -1.0);
        assert_eq!(sites[1].matrix(0)[[0, 1]].im, -1.0);
    }

    #[test]
    fn test_location_lookup() {
        let nested = format!("results:\n  hamiltonian:\n{}", indent(FIELD_OPERATOR, 4));
        let sites =
            read_operator_from_str(&nested, Some("results/hamiltonian")).unwrap();
        assert_eq!(sites.len(), 2);

        let err = read_operator_from_str(&nested, Some("results/missing")).unwrap_err();
        assert!(matches!(err, NutError::NoSuchLocation(_)));
    }

    fn indent(text: &str, spaces: usize) -> String {
        text.lines()
            .map(|line| {
                if line.is_empty() {
                    String::new()
                } else {
                    format!("{}{}", " ".repeat(spaces), line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_insert_at_location_round_trip() {
        let mut root = serde_yaml::Value::Null;
        insert_at_location(&mut root, "results/run1", serde_yaml::to_value(3.5).unwrap())
            .unwrap();
        insert_at_location(&mut root, "results/run2", serde_yaml::to_value(4.5).unwrap())
            .unwrap();

        let first = lookup_location(&root, "results/run1").unwrap();
        assert_eq!(first.as_f64(), Some(3.5));
        let second = lookup_location(&root, "results/run2").unwrap();
        assert_eq!(second.as_f64(), Some(4.5));
    }

    #[test]
    fn test_insert_replaces_an_existing_entry() {
        let mut root: serde_yaml::Value = serde_yaml::from_str("results:\n  run1: 1.0").unwrap();
        insert_at_location(&mut root, "results/run1", serde_yaml::to_value(2.0).unwrap())
            .unwrap();
        assert_eq!(
            lookup_location(&root, "results/run1").unwrap().as_f64(),
            Some(2.0)
        );
    }

    #[test]
    fn test_insert_through_a_scalar_fails() {
        let mut root: serde_yaml::Value = serde_yaml::from_str("results: 1").unwrap();
        let err = insert_at_location(&mut root, "results/run1", serde_yaml::Value::Null)
            .unwrap_err();
        assert!(matches!(err, NutError::NoSuchLocation(_)));
    }

    #[test]
    fn test_overwrite_protection() {
        let directory = std::env::temp_dir().join("nutcracker_yaml_io_test");
        fs::create_dir_all(&directory).unwrap();
        let path = directory.join("operator.yaml");
        let sites = read_operator_from_str(FIELD_OPERATOR, None).unwrap();

        write_operator_to_file(&path, &sites, true).unwrap();
        let err = write_operator_to_file(&path, &sites, false).unwrap_err();
        assert!(matches!(err, NutError::OutputFileAlreadyExists(_)));
        write_operator_to_file(&path, &sites, true).unwrap();

        let round_trip = read_operator_from_file(&path, None).unwrap();
        assert_eq!(round_trip, sites);
        fs::remove_file(&path).ok();
    }
}
