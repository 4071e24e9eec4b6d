//! Merging of cloud-init user data documents.

use serde_yaml::{Mapping, Value};

use crate::{Error, Result};

pub const CLOUD_CONFIG_MARKER: &str = "#cloud-config\n";

/// Merge `additional` into `base`.
///
/// Keys only in `additional` are copied over. Where both sides hold
/// sequences, `additional`'s entries come first. Nested mappings merge
/// recursively. Any other collision is won by `additional`. When one side
/// is empty the other is validated and returned with the marker line.
pub fn merge(base: &str, additional: &str) -> Result<String> {
    match (base.trim().is_empty(), additional.trim().is_empty()) {
        (true, true) => Ok(String::new()),
        (false, true) => normalized(base, "base"),
        (true, false) => normalized(additional, "additional"),
        (false, false) => {
            let mut merged = parse(base, "base")?;
            merge_mappings(&mut merged, parse(additional, "additional")?);
            let body = serde_yaml::to_string(&Value::Mapping(merged))
                .map_err(|e| Error::MalformedDocument(format!("could not serialize merged user data: {e}")))?;
            Ok(format!("{CLOUD_CONFIG_MARKER}{body}"))
        }
    }
}

fn strip_marker(doc: &str) -> &str {
    doc.strip_prefix(CLOUD_CONFIG_MARKER).unwrap_or(doc)
}

fn parse(doc: &str, which: &str) -> Result<Mapping> {
    match serde_yaml::from_str::<Value>(strip_marker(doc)) {
        Ok(Value::Mapping(mapping)) => Ok(mapping),
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(_) => Err(Error::MalformedDocument(format!("{which} user data is not a mapping"))),
        Err(e) => Err(Error::MalformedDocument(format!("could not parse {which} user data as YAML: {e}"))),
    }
}

fn normalized(doc: &str, which: &str) -> Result<String> {
    parse(doc, which)?;
    if doc.starts_with(CLOUD_CONFIG_MARKER) {
        Ok(doc.to_string())
    } else {
        Ok(format!("{CLOUD_CONFIG_MARKER}{doc}"))
    }
}

fn merge_mappings(base: &mut Mapping, additional: Mapping) {
    for (key, value) in additional {
        let Some(existing) = base.get_mut(&key) else {
            base.insert(key, value);
            continue;
        };
        match (existing, value) {
            (Value::Sequence(current), Value::Sequence(mut extra)) => {
                extra.append(current);
                *current = extra;
            }
            (Value::Mapping(current), Value::Mapping(extra)) => merge_mappings(current, extra),
            (slot, value) => *slot = value,
        }
    }
}
